//! Puppet JSON payload: serde schema and conversion into the core model.
//!
//! Notes:
//! - Unknown fields are ignored; unknown node types load as plain groups.
//! - Bindings whose node is missing, whose property is unknown, or whose
//!   deform grid does not match the target mesh are dropped with a warning.
//! - Everything else that is inconsistent is a load error.

use serde::Deserialize;

use crate::drawlist::{BlendMode, MaskMode};
use crate::error::{PuppetError, Result};
use crate::ids::{NodeId, TextureSlot};
use crate::math::{Transform, Vec2};
use crate::node::{Composite, MaskBinding, Mesh, Node, NodeKind, NodeTree, Part};
use crate::param::{fill_unset, Binding, BindingTarget, BindingValues, InterpolateMode, Parameter};
use crate::physics::{MapMode, PendulumDriver, PhysicsModel};
use crate::puppet::PuppetMeta;

/// Texture id meaning "no texture" in part attachment lists.
const NO_TEXTURE: u32 = u32::MAX;

/// Result of parsing a puppet payload.
#[derive(Debug)]
pub struct ParsedPuppet {
    pub meta: PuppetMeta,
    pub pixels_per_meter: Option<f32>,
    pub gravity: Option<f32>,
    pub nodes: NodeTree,
    pub params: Vec<Parameter>,
}

/// Parse and validate a puppet JSON payload against `texture_count` available textures.
pub fn parse_puppet_json(s: &str, texture_count: usize) -> Result<ParsedPuppet> {
    let raw: RawPuppet = serde_json::from_str(s)?;

    let mut nodes = Vec::new();
    flatten_nodes(raw.nodes, None, &mut nodes);
    let mut seen = hashbrown::HashSet::with_capacity(nodes.len());
    for (n, _, _) in &nodes {
        if !seen.insert(n.uuid) {
            return Err(PuppetError::DuplicateNode(NodeId(n.uuid)));
        }
    }
    let tree_nodes = nodes
        .into_iter()
        .map(|n| convert_node(n, texture_count))
        .collect::<Result<Vec<_>>>()?;
    let tree = NodeTree::from_nodes(tree_nodes);
    validate_masks(&tree)?;

    let params = raw
        .param
        .into_iter()
        .map(|p| convert_param(p, &tree))
        .collect::<Result<Vec<_>>>()?;

    let meta = PuppetMeta {
        name: raw.meta.name,
        version: raw.meta.version,
        rigger: raw.meta.rigger,
        artist: raw.meta.artist,
        rights: raw.meta.rights,
        copyright: raw.meta.copyright,
        license_url: raw.meta.license_url,
        contact: raw.meta.contact,
        reference: raw.meta.reference,
        thumbnail_id: raw.meta.thumbnail_id.filter(|id| *id != NO_TEXTURE),
        preserve_pixels: raw.meta.preserve_pixels,
    };

    Ok(ParsedPuppet {
        meta,
        pixels_per_meter: raw.physics.as_ref().and_then(|p| p.pixels_per_meter),
        gravity: raw.physics.as_ref().and_then(|p| p.gravity),
        nodes: tree,
        params,
    })
}

type FlatNode = (RawNode, Option<usize>, Vec<usize>);

/// Pre-order flattening; children's `parent` indices point into `out`.
fn flatten_nodes(mut raw: RawNode, parent: Option<usize>, out: &mut Vec<FlatNode>) {
    let idx = out.len();
    let children = std::mem::take(&mut raw.children);
    out.push((raw, parent, Vec::new()));
    for child in children {
        let child_idx = out.len();
        out[idx].2.push(child_idx);
        flatten_nodes(child, Some(idx), out);
    }
}

fn pairs(flat: &[f32], what: &str, node: &str) -> Result<Vec<Vec2>> {
    if flat.len() % 2 != 0 {
        return Err(PuppetError::InvalidMesh {
            node: node.to_string(),
            reason: format!("{what} has an odd number of components"),
        });
    }
    Ok(flat.chunks_exact(2).map(|c| Vec2::new(c[0], c[1])).collect())
}

fn convert_mesh(raw: RawMesh, node: &str) -> Result<Mesh> {
    let verts = pairs(&raw.verts, "verts", node)?;
    let uvs = pairs(&raw.uvs, "uvs", node)?;
    let invalid = |reason: String| PuppetError::InvalidMesh {
        node: node.to_string(),
        reason,
    };
    if verts.len() != uvs.len() {
        return Err(invalid(format!(
            "{} vertices but {} uvs",
            verts.len(),
            uvs.len()
        )));
    }
    if raw.indices.len() % 3 != 0 {
        return Err(invalid(format!(
            "index count {} is not a multiple of 3",
            raw.indices.len()
        )));
    }
    if let Some(bad) = raw.indices.iter().find(|i| **i as usize >= verts.len()) {
        return Err(invalid(format!(
            "index {bad} out of range for {} vertices",
            verts.len()
        )));
    }
    Ok(Mesh {
        verts,
        uvs,
        indices: raw.indices,
    })
}

fn convert_masks(raw: Vec<RawMask>) -> Vec<MaskBinding> {
    raw.into_iter()
        .map(|m| MaskBinding {
            source: NodeId(m.source),
            mode: m.mode,
        })
        .collect()
}

fn convert_node(
    (raw, parent, children): FlatNode,
    texture_count: usize,
) -> Result<Node> {
    let kind = match raw.kind.as_str() {
        "Part" => {
            let mesh = convert_mesh(raw.mesh.unwrap_or_default(), &raw.name)?;
            let mut textures = Vec::new();
            for id in raw.textures.unwrap_or_default() {
                if id == NO_TEXTURE {
                    textures.push(None);
                } else if (id as usize) < texture_count {
                    textures.push(Some(TextureSlot(id)));
                } else {
                    return Err(PuppetError::InvalidMesh {
                        node: raw.name.clone(),
                        reason: format!("texture {id} out of range ({texture_count} textures)"),
                    });
                }
            }
            textures.truncate(crate::drawlist::MAX_ATTACHMENTS);
            NodeKind::Part(Part {
                mesh,
                textures,
                blend_mode: raw.blend_mode.unwrap_or_default(),
                tint: raw.tint.unwrap_or([1.0; 3]),
                screen_tint: raw.screen_tint.unwrap_or([0.0; 3]),
                opacity: raw.opacity.unwrap_or(1.0),
                mask_threshold: raw.mask_threshold.unwrap_or(0.5),
                masks: convert_masks(raw.masks.unwrap_or_default()),
            })
        }
        "Composite" => NodeKind::Composite(Composite {
            blend_mode: raw.blend_mode.unwrap_or_default(),
            tint: raw.tint.unwrap_or([1.0; 3]),
            screen_tint: raw.screen_tint.unwrap_or([0.0; 3]),
            opacity: raw.opacity.unwrap_or(1.0),
            mask_threshold: raw.mask_threshold.unwrap_or(0.5),
            masks: convert_masks(raw.masks.unwrap_or_default()),
        }),
        "SimplePhysics" => {
            let mut driver = PendulumDriver::new(raw.param.unwrap_or(u32::MAX));
            driver.model = raw.model_type.unwrap_or_default();
            if driver.model == PhysicsModel::SpringPendulum {
                log::debug!("node '{}': spring pendulum evaluated as rigid", raw.name);
            }
            driver.map_mode = raw.map_mode.unwrap_or_default();
            driver.gravity = raw.gravity.unwrap_or(driver.gravity);
            driver.length = raw.length.unwrap_or(driver.length);
            driver.frequency = raw.frequency.unwrap_or(driver.frequency);
            driver.angle_damping = raw.angle_damping.unwrap_or(driver.angle_damping);
            driver.output_scale = raw.output_scale.map(Vec2::from).unwrap_or(Vec2::ONE);
            driver.local_only = raw.local_only.unwrap_or(false);
            NodeKind::SimplePhysics(driver)
        }
        "Node" => NodeKind::Group,
        other => {
            log::debug!("node '{}': type {other} loaded as a plain node", raw.name);
            NodeKind::Group
        }
    };

    let mut node = Node::new(NodeId(raw.uuid), raw.name, kind);
    node.enabled = raw.enabled;
    node.zsort = raw.zsort;
    node.transform = raw.transform;
    node.lock_to_root = raw.lock_to_root;
    node.parent = parent;
    node.children = children;
    Ok(node)
}

fn validate_masks(tree: &NodeTree) -> Result<()> {
    for node in tree.nodes() {
        let masks = match &node.kind {
            NodeKind::Part(p) => &p.masks,
            NodeKind::Composite(c) => &c.masks,
            _ => continue,
        };
        for m in masks {
            if tree.find(m.source).is_none() {
                return Err(PuppetError::UnknownNode(
                    m.source,
                    format!("mask on '{}'", node.name),
                ));
            }
        }
    }
    Ok(())
}

fn validate_axis(axis: &[f32], name: &str) -> Result<()> {
    let invalid = |reason: &str| PuppetError::InvalidParameter {
        name: name.to_string(),
        reason: reason.to_string(),
    };
    if axis.is_empty() {
        return Err(invalid("axis has no keypoints"));
    }
    if axis.iter().any(|p| !p.is_finite() || *p < 0.0 || *p > 1.0) {
        return Err(invalid("axis keypoints must be finite and within [0,1]"));
    }
    if axis.windows(2).any(|w| w[1] < w[0]) {
        return Err(invalid("axis keypoints must be sorted"));
    }
    if axis[0] != 0.0 || (axis.len() > 1 && axis[axis.len() - 1] != 1.0) {
        return Err(invalid("axis keypoints must start at 0 and end at 1"));
    }
    Ok(())
}

fn convert_param(raw: RawParam, tree: &NodeTree) -> Result<Parameter> {
    let mut param = Parameter::new(
        raw.uuid,
        raw.name.clone(),
        raw.is_vec2,
        Vec2::from(raw.min),
        Vec2::from(raw.max),
    );
    param.set_active(raw.active);
    param.set_defaults(Vec2::from(raw.defaults));
    param.reset();

    let mut axes = raw.axis_points;
    axes.resize(2, vec![0.0]);
    if !raw.is_vec2 || axes[1].is_empty() {
        axes[1] = vec![0.0];
    }
    for axis in &axes {
        validate_axis(axis, &raw.name)?;
    }
    param.axis_points = [axes[0].clone(), axes[1].clone()];

    let (nx, ny) = (param.axis_points[0].len(), param.axis_points[1].len());
    for b in raw.bindings {
        if let Some(binding) = convert_binding(b, &param, nx, ny, tree)? {
            param.bindings.push(binding);
        }
    }
    Ok(param)
}

fn grid_shape_ok<T>(grid: &[Vec<T>], nx: usize, ny: usize) -> bool {
    grid.len() == nx && grid.iter().all(|col| col.len() == ny)
}

fn convert_binding(
    raw: RawBinding,
    param: &Parameter,
    nx: usize,
    ny: usize,
    tree: &NodeTree,
) -> Result<Option<Binding>> {
    let node_id = NodeId(raw.node);
    let Some(node) = tree.find(node_id) else {
        log::warn!(
            "parameter '{}': dropping binding to missing node {node_id}",
            param.name()
        );
        return Ok(None);
    };
    let Some(target) = BindingTarget::from_name(&raw.param_name) else {
        log::warn!(
            "parameter '{}': dropping binding to unsupported property '{}'",
            param.name(),
            raw.param_name
        );
        return Ok(None);
    };

    let mut is_set = raw
        .is_set
        .unwrap_or_else(|| vec![vec![true; ny]; nx]);
    if !grid_shape_ok(&is_set, nx, ny) {
        return Err(PuppetError::InvalidParameter {
            name: param.name().to_string(),
            reason: format!("isSet grid of '{}' does not match axis points", raw.param_name),
        });
    }
    let shape_err = || PuppetError::InvalidParameter {
        name: param.name().to_string(),
        reason: format!("value grid of '{}' does not match axis points", raw.param_name),
    };

    let values = match (target, raw.values) {
        (BindingTarget::Deform, RawGrid::Deform(grid)) => {
            let Some(part) = node.as_part() else {
                log::warn!(
                    "parameter '{}': dropping deform binding on non-part '{}'",
                    param.name(),
                    node.name
                );
                return Ok(None);
            };
            let vcount = part.mesh.verts.len();
            let mut grid: Vec<Vec<Vec<Vec2>>> = grid
                .into_iter()
                .map(|col| {
                    col.into_iter()
                        .map(|pt| pt.into_iter().map(Vec2::from).collect())
                        .collect()
                })
                .collect();
            if !grid_shape_ok(&grid, nx, ny) {
                return Err(shape_err());
            }
            if grid.iter().flatten().any(|pt| pt.len() != vcount) {
                log::warn!(
                    "parameter '{}': dropping deform binding on '{}' (vertex count mismatch)",
                    param.name(),
                    node.name
                );
                return Ok(None);
            }
            fill_unset(
                &mut grid,
                &mut is_set,
                &param.axis_points,
                || vec![Vec2::ZERO; vcount],
                |a, b, t| a.iter().zip(b).map(|(a, b)| a.lerp(*b, t)).collect(),
            );
            BindingValues::Deform(grid)
        }
        (BindingTarget::Deform, RawGrid::Scalar(_)) => return Err(shape_err()),
        (_, RawGrid::Scalar(mut grid)) => {
            if !grid_shape_ok(&grid, nx, ny) {
                return Err(shape_err());
            }
            fill_unset(
                &mut grid,
                &mut is_set,
                &param.axis_points,
                || target.identity(),
                |a, b, t| a + (b - a) * t,
            );
            BindingValues::Scalar(grid)
        }
        (_, RawGrid::Deform(_)) => return Err(shape_err()),
    };

    Ok(Some(Binding {
        node: node_id,
        target,
        values,
        interpolate: raw.interpolate_mode.unwrap_or_default(),
    }))
}

// ----- JSON schema (serde) -----

#[derive(Debug, Deserialize)]
struct RawPuppet {
    #[serde(default)]
    meta: RawMeta,
    #[serde(default)]
    physics: Option<RawPhysics>,
    nodes: RawNode,
    #[serde(default)]
    param: Vec<RawParam>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawMeta {
    name: String,
    version: String,
    rigger: Option<String>,
    artist: Option<String>,
    rights: Option<String>,
    copyright: Option<String>,
    #[serde(rename = "licenseURL")]
    license_url: Option<String>,
    contact: Option<String>,
    reference: Option<String>,
    #[serde(rename = "thumbnailId")]
    thumbnail_id: Option<u32>,
    #[serde(rename = "preservePixels")]
    preserve_pixels: bool,
}

#[derive(Debug, Deserialize)]
struct RawPhysics {
    #[serde(rename = "pixelsPerMeter")]
    pixels_per_meter: Option<f32>,
    gravity: Option<f32>,
}

fn yes() -> bool {
    true
}

#[derive(Debug, Deserialize)]
struct RawNode {
    uuid: u32,
    #[serde(default)]
    name: String,
    #[serde(rename = "type", default = "node_type")]
    kind: String,
    #[serde(default = "yes")]
    enabled: bool,
    #[serde(default)]
    zsort: f32,
    #[serde(default)]
    transform: Transform,
    #[serde(rename = "lockToRoot", default)]
    lock_to_root: bool,
    #[serde(default)]
    children: Vec<RawNode>,

    // Part / Composite
    mesh: Option<RawMesh>,
    textures: Option<Vec<u32>>,
    blend_mode: Option<BlendMode>,
    tint: Option<[f32; 3]>,
    #[serde(rename = "screenTint")]
    screen_tint: Option<[f32; 3]>,
    opacity: Option<f32>,
    mask_threshold: Option<f32>,
    masks: Option<Vec<RawMask>>,

    // SimplePhysics
    param: Option<u32>,
    model_type: Option<PhysicsModel>,
    map_mode: Option<MapMode>,
    gravity: Option<f32>,
    length: Option<f32>,
    frequency: Option<f32>,
    angle_damping: Option<f32>,
    output_scale: Option<[f32; 2]>,
    local_only: Option<bool>,
}

fn node_type() -> String {
    "Node".to_string()
}

#[derive(Debug, Default, Deserialize)]
struct RawMesh {
    #[serde(default)]
    verts: Vec<f32>,
    #[serde(default)]
    uvs: Vec<f32>,
    #[serde(default)]
    indices: Vec<u32>,
}

#[derive(Debug, Deserialize)]
struct RawMask {
    source: u32,
    #[serde(default)]
    mode: MaskMode,
}

#[derive(Debug, Deserialize)]
struct RawParam {
    uuid: u32,
    name: String,
    #[serde(default = "yes")]
    active: bool,
    #[serde(default)]
    is_vec2: bool,
    #[serde(default)]
    min: [f32; 2],
    #[serde(default = "unit")]
    max: [f32; 2],
    #[serde(default)]
    defaults: [f32; 2],
    #[serde(default = "default_axes")]
    axis_points: Vec<Vec<f32>>,
    #[serde(default)]
    bindings: Vec<RawBinding>,
}

fn unit() -> [f32; 2] {
    [1.0, 1.0]
}

fn default_axes() -> Vec<Vec<f32>> {
    vec![vec![0.0, 1.0], vec![0.0]]
}

#[derive(Debug, Deserialize)]
struct RawBinding {
    node: u32,
    param_name: String,
    values: RawGrid,
    #[serde(rename = "isSet")]
    is_set: Option<Vec<Vec<bool>>>,
    interpolate_mode: Option<InterpolateMode>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawGrid {
    // Put the scalar shape first; deform grids fail it on the innermost array.
    Scalar(Vec<Vec<f32>>),
    Deform(Vec<Vec<Vec<[f32; 2]>>>),
}
