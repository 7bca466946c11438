//! Puppet: data ownership and the per-frame pipeline.
//!
//! Methods:
//! - load / from_bytes (INP container → validated model)
//! - update (physics → parameters → transforms), draw (parameters → transforms → draw list)
//! - reset_drivers, prune_textures, property accessors

use std::path::Path;

use hashbrown::HashMap;

use crate::config::Config;
use crate::drawlist::{
    CompositeVars, DrawAlloc, DrawCmd, DrawList, DrawState, MaskVars, PartVars,
};
use crate::error::Result;
use crate::format::read_inp;
use crate::ids::{NodeId, TextureSlot};
use crate::math::{Vec2, Vtx, VtxData};
use crate::node::{MaskBinding, NodeKind, NodeTree};
use crate::param::Parameter;
use crate::physics::PhysicsEnv;
use crate::schema::parse_puppet_json;
use crate::texture::Texture;
use crate::texture_cache::TextureCache;

/// Authoring metadata.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PuppetMeta {
    pub name: String,
    pub version: String,
    pub rigger: Option<String>,
    pub artist: Option<String>,
    pub rights: Option<String>,
    pub copyright: Option<String>,
    pub license_url: Option<String>,
    pub contact: Option<String>,
    pub reference: Option<String>,
    pub thumbnail_id: Option<u32>,
    pub preserve_pixels: bool,
}

#[derive(Debug)]
pub struct Puppet {
    meta: PuppetMeta,
    physics_enabled: bool,
    pixels_per_meter: f32,
    gravity: f32,
    max_physics_step: f32,
    nodes: NodeTree,
    params: Vec<Parameter>,
    textures: TextureCache,
    drawlist: DrawList,
    extensions: Vec<(String, Vec<u8>)>,
}

fn sanitize_delta(delta: f32) -> f32 {
    if delta.is_finite() && delta > 0.0 {
        delta
    } else {
        0.0
    }
}

impl Puppet {
    /// Load a puppet file (`.inp` / `.inx`) with default configuration.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        Self::load_with_config(path, &Config::default())
    }

    pub fn load_with_config(path: impl AsRef<Path>, cfg: &Config) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)?;
        log::debug!("loading puppet from {}", path.display());
        Self::from_bytes_with_config(&bytes, cfg)
    }

    /// Load a puppet from an in-memory INP buffer with default configuration.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Self::from_bytes_with_config(bytes, &Config::default())
    }

    pub fn from_bytes_with_config(bytes: &[u8], cfg: &Config) -> Result<Self> {
        let file = read_inp(bytes)?;

        let mut textures = TextureCache::new();
        for tex in &file.textures {
            textures.push(Texture::from_encoded(&tex.data, tex.encoding)?);
        }

        let parsed = parse_puppet_json(&file.json, textures.len())?;
        let mut puppet = Self {
            meta: parsed.meta,
            physics_enabled: cfg.physics_enabled,
            pixels_per_meter: cfg.pixels_per_meter,
            gravity: cfg.gravity,
            max_physics_step: cfg.max_physics_step,
            nodes: parsed.nodes,
            params: parsed.params,
            textures,
            drawlist: DrawList::new(cfg.use_base_vertex),
            extensions: file.extensions,
        };
        if let Some(ppm) = parsed.pixels_per_meter {
            puppet.set_pixels_per_meter(ppm);
        }
        if let Some(g) = parsed.gravity {
            puppet.set_gravity(g);
        }
        for node in puppet.nodes.nodes() {
            if let NodeKind::SimplePhysics(driver) = &node.kind {
                if !puppet.params.iter().any(|p| p.uuid == driver.param) {
                    log::warn!(
                        "physics node '{}' drives unknown parameter {}",
                        node.name,
                        driver.param
                    );
                }
            }
        }
        puppet.evaluate();

        log::debug!(
            "loaded puppet '{}': {} nodes, {} parameters, {} textures",
            puppet.meta.name,
            puppet.nodes.len(),
            puppet.params.len(),
            puppet.textures.len()
        );
        Ok(puppet)
    }

    pub fn meta(&self) -> &PuppetMeta {
        &self.meta
    }

    /// Name of the puppet as specified by its author.
    pub fn name(&self) -> &str {
        &self.meta.name
    }

    /// Vendor extension payloads carried by the file.
    pub fn extensions(&self) -> &[(String, Vec<u8>)] {
        &self.extensions
    }

    pub fn physics_enabled(&self) -> bool {
        self.physics_enabled
    }

    pub fn set_physics_enabled(&mut self, value: bool) {
        self.physics_enabled = value;
    }

    pub fn pixels_per_meter(&self) -> f32 {
        self.pixels_per_meter
    }

    /// Ignored (with a warning) unless finite and positive.
    pub fn set_pixels_per_meter(&mut self, value: f32) {
        if value.is_finite() && value > 0.0 {
            self.pixels_per_meter = value;
        } else {
            log::warn!("ignoring invalid pixels-per-meter {value}");
        }
    }

    pub fn gravity(&self) -> f32 {
        self.gravity
    }

    /// Ignored (with a warning) unless finite.
    pub fn set_gravity(&mut self, value: f32) {
        if value.is_finite() {
            self.gravity = value;
        } else {
            log::warn!("ignoring invalid gravity {value}");
        }
    }

    pub fn nodes(&self) -> &NodeTree {
        &self.nodes
    }

    pub fn parameters(&self) -> &[Parameter] {
        &self.params
    }

    pub fn parameter_mut(&mut self, index: usize) -> Option<&mut Parameter> {
        self.params.get_mut(index)
    }

    pub fn find_parameter(&self, name: &str) -> Option<usize> {
        self.params.iter().position(|p| p.name() == name)
    }

    pub fn texture_cache(&self) -> &TextureCache {
        &self.textures
    }

    pub fn drawlist(&self) -> &DrawList {
        &self.drawlist
    }

    pub fn drawlist_mut(&mut self) -> &mut DrawList {
        &mut self.drawlist
    }

    /// Reset node offsets, apply every active parameter, then recompute transforms.
    fn evaluate(&mut self) {
        self.nodes.reset_offsets();
        for param in self.params.iter().filter(|p| p.active()) {
            let normalized = param.normalized_value();
            for binding in &param.bindings {
                if let Some(node) = self.nodes.find_mut(binding.node) {
                    binding.apply(&param.axis_points, normalized, &mut node.offsets);
                }
            }
        }
        self.nodes.update_world();
    }

    fn physics_anchor(&self, idx: usize) -> Vec2 {
        let node = &self.nodes.nodes()[idx];
        match &node.kind {
            NodeKind::SimplePhysics(d) if d.local_only => node.local_matrix().translation(),
            _ => node.world.translation(),
        }
    }

    fn step_drivers(&mut self, dt: f32) {
        let env = PhysicsEnv {
            gravity: self.gravity,
            pixels_per_meter: self.pixels_per_meter,
            max_step: self.max_physics_step,
        };
        let mut outputs: Vec<(u32, Vec2)> = Vec::new();
        for idx in 0..self.nodes.len() {
            if !matches!(self.nodes.nodes()[idx].kind, NodeKind::SimplePhysics(_))
                || !self.nodes.is_effectively_enabled(idx)
            {
                continue;
            }
            let anchor = self.physics_anchor(idx);
            if let NodeKind::SimplePhysics(driver) = &mut self.nodes.nodes_mut()[idx].kind {
                driver.step(anchor, dt, &env);
                outputs.push((driver.param, driver.output(anchor)));
            }
        }
        for (uuid, value) in outputs {
            if let Some(param) = self.params.iter_mut().find(|p| p.uuid == uuid) {
                param.set_value(value);
            }
        }
    }

    /// Advance the puppet by `delta` seconds. Non-finite or negative deltas count as 0.
    pub fn update(&mut self, delta: f32) {
        let dt = sanitize_delta(delta);
        self.evaluate();
        if self.physics_enabled {
            self.step_drivers(dt);
            self.evaluate();
        }
    }

    /// Return every physics driver to rest and write its rest output to the driven parameter.
    pub fn reset_drivers(&mut self) {
        let mut outputs = Vec::new();
        for idx in 0..self.nodes.len() {
            let anchor = self.physics_anchor(idx);
            if let NodeKind::SimplePhysics(driver) = &mut self.nodes.nodes_mut()[idx].kind {
                driver.reset();
                outputs.push((driver.param, driver.output(anchor)));
            }
        }
        for (uuid, value) in outputs {
            if let Some(param) = self.params.iter_mut().find(|p| p.uuid == uuid) {
                param.set_value(value);
            }
        }
        self.evaluate();
    }

    /// Remove textures no part references and remap part slots accordingly.
    /// Returns how many textures were removed.
    pub fn prune_textures(&mut self) -> usize {
        let mut referenced = vec![false; self.textures.len()];
        for node in self.nodes.nodes() {
            if let Some(part) = node.as_part() {
                for slot in part.textures.iter().flatten() {
                    if let Some(r) = referenced.get_mut(slot.0 as usize) {
                        *r = true;
                    }
                }
            }
        }
        let before = self.textures.len();
        let remap = self.textures.prune(&referenced);
        for node in self.nodes.nodes_mut() {
            if let NodeKind::Part(part) = &mut node.kind {
                for slot in &mut part.textures {
                    *slot = slot.and_then(|s| remap.get(s.0 as usize).copied().flatten());
                }
            }
        }
        self.drawlist.remap_sources(&remap);
        before - self.textures.len()
    }

    /// Build this frame's draw list from the current parameter values.
    ///
    /// The time delta is accepted for symmetry with `update`; drawing does not advance time.
    pub fn draw(&mut self, _delta: f32) {
        self.evaluate();
        self.drawlist.clear();

        let mut allocs: HashMap<NodeId, DrawAlloc> = HashMap::new();
        let mut vertices: Vec<VtxData> = Vec::new();
        for idx in 0..self.nodes.len() {
            let node = &self.nodes.nodes()[idx];
            let Some(part) = node.as_part() else {
                continue;
            };
            if !self.nodes.is_effectively_enabled(idx) {
                continue;
            }
            vertices.clear();
            vertices.extend(
                node.world_vertices(&part.mesh)
                    .zip(&part.mesh.uvs)
                    .map(|(p, uv)| VtxData {
                        vtx: Vtx::from_xy(p),
                        uv: *uv,
                    }),
            );
            let alloc = self.drawlist.allocate(&vertices, &part.mesh.indices);
            allocs.insert(node.id, alloc);
        }

        let root = 0;
        if !self.nodes.is_empty() && self.nodes.nodes()[root].enabled {
            let order = self.nodes.drawables(root);
            for idx in order {
                self.emit(idx, &allocs);
            }
        }
        log::trace!(
            "drew puppet '{}': {} commands, {} allocations",
            self.meta.name,
            self.drawlist.commands().len(),
            self.drawlist.allocations().len()
        );
    }

    fn emit_masks(
        &mut self,
        masks: &[MaskBinding],
        threshold: f32,
        allocs: &HashMap<NodeId, DrawAlloc>,
    ) -> usize {
        let mut emitted = 0;
        for mask in masks {
            let Some(alloc) = allocs.get(&mask.source) else {
                continue;
            };
            let sources: Vec<TextureSlot> = self
                .nodes
                .find(mask.source)
                .and_then(|n| n.as_part())
                .map(|p| p.textures.iter().take(1).flatten().copied().collect())
                .unwrap_or_default();
            let mut cmd = DrawCmd::for_alloc(DrawState::DefineMask, alloc)
                .with_sources(&sources)
                .with_mask_vars(MaskVars {
                    mask_threshold: threshold,
                });
            cmd.mask_mode = mask.mode;
            self.drawlist.push(cmd);
            emitted += 1;
        }
        emitted
    }

    fn emit(&mut self, idx: usize, allocs: &HashMap<NodeId, DrawAlloc>) {
        let node = &self.nodes.nodes()[idx];
        let opacity_offset = node.offsets.opacity;
        match &node.kind {
            NodeKind::Part(part) => {
                let Some(alloc) = allocs.get(&node.id).copied() else {
                    return;
                };
                let part = part.clone();
                let masked = self.emit_masks(&part.masks, part.mask_threshold, allocs) > 0;
                let state = if masked {
                    DrawState::MaskedDraw
                } else {
                    DrawState::Normal
                };
                let mut cmd = DrawCmd::for_alloc(state, &alloc).with_part_vars(PartVars {
                    tint: part.tint,
                    opacity: (part.opacity * opacity_offset).clamp(0.0, 1.0),
                    screen_tint: part.screen_tint,
                    mask_threshold: part.mask_threshold,
                });
                for (dst, src) in cmd.sources.iter_mut().zip(&part.textures) {
                    *dst = *src;
                }
                cmd.blend_mode = part.blend_mode;
                self.drawlist.push(cmd);
            }
            NodeKind::Composite(comp) => {
                let comp = comp.clone();
                let children = self.nodes.drawables(idx);
                if children.is_empty() {
                    return;
                }
                self.drawlist.push(DrawCmd::new(DrawState::CompositeBegin));
                for child in children {
                    self.emit(child, allocs);
                }
                self.drawlist.push(DrawCmd::new(DrawState::CompositeEnd));
                self.emit_masks(&comp.masks, comp.mask_threshold, allocs);
                let mut blit =
                    DrawCmd::new(DrawState::CompositeBlit).with_composite_vars(CompositeVars {
                        tint: comp.tint,
                        opacity: (comp.opacity * opacity_offset).clamp(0.0, 1.0),
                        screen_tint: comp.screen_tint,
                    });
                blit.blend_mode = comp.blend_mode;
                self.drawlist.push(blit);
            }
            _ => {}
        }
    }
}
