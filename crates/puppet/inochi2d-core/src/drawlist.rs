//! Draw list: the per-frame output consumed by rendering backends.
//!
//! A frame is a flat list of [`DrawCmd`]s plus shared vertex/index buffers.
//! Every drawable mesh is appended once as a [`DrawAlloc`]; commands refer to
//! allocations by id and carry the offsets needed to issue an indexed draw.
//!
//! With base-vertex mode on, stored indices are mesh-local and a renderer must
//! pass `vtx_offset` as the base vertex. With it off, indices are rebased at
//! append time and can be drawn directly.

use bytemuck::{Pod, Zeroable};
use serde::{Deserialize, Serialize};

use crate::ids::TextureSlot;
use crate::math::VtxData;

/// Number of texture attachments a command can reference.
pub const MAX_ATTACHMENTS: usize = 8;

/// Size of the per-command uniform blob.
pub const VARS_SIZE: usize = 64;

/// Allocation id used by commands that draw no mesh of their own.
pub const NO_ALLOC: u32 = u32::MAX;

/// What a command asks the renderer to do.
#[repr(u32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum DrawState {
    #[default]
    Normal = 0,
    DefineMask = 1,
    MaskedDraw = 2,
    CompositeBegin = 3,
    CompositeEnd = 4,
    CompositeBlit = 5,
}

#[repr(u32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MaskMode {
    #[default]
    Mask = 0,
    #[serde(alias = "DodgeMask")]
    Dodge = 1,
}

#[repr(u32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BlendMode {
    #[default]
    Normal = 0x00,
    Multiply = 0x01,
    Screen = 0x02,
    Overlay = 0x03,
    Darken = 0x04,
    Lighten = 0x05,
    ColorDodge = 0x06,
    LinearDodge = 0x07,
    AddGlow = 0x08,
    ColorBurn = 0x09,
    HardLight = 0x0A,
    SoftLight = 0x0B,
    Difference = 0x0C,
    Exclusion = 0x0D,
    Subtract = 0x0E,
    Inverse = 0x0F,
    DestinationIn = 0x10,
    #[serde(alias = "ClipToLower")]
    SourceIn = 0x11,
    #[serde(alias = "SliceFromLower")]
    SourceOut = 0x12,
}

/// Discriminates the layout of [`DrawCmd::vars`].
#[repr(u32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum VarsKind {
    #[default]
    None = 0,
    Part = 1,
    Mask = 2,
    Composite = 3,
}

/// Uniforms of a part draw (`VarsKind::Part`).
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct PartVars {
    pub tint: [f32; 3],
    pub opacity: f32,
    pub screen_tint: [f32; 3],
    pub mask_threshold: f32,
}

/// Uniforms of a mask definition (`VarsKind::Mask`).
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct MaskVars {
    pub mask_threshold: f32,
}

/// Uniforms of a composite blit (`VarsKind::Composite`).
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct CompositeVars {
    pub tint: [f32; 3],
    pub opacity: f32,
    pub screen_tint: [f32; 3],
}

/// A mesh appended to the draw list.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct DrawAlloc {
    pub vtx_offset: u32,
    pub idx_offset: u32,
    pub idx_count: u32,
    pub vtx_count: u32,
    pub alloc_id: u32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct DrawCmd {
    pub sources: [Option<TextureSlot>; MAX_ATTACHMENTS],
    pub state: DrawState,
    pub blend_mode: BlendMode,
    pub mask_mode: MaskMode,
    pub alloc_id: u32,
    pub vtx_offset: u32,
    pub idx_offset: u32,
    pub elem_count: u32,
    pub kind: VarsKind,
    pub vars: [u8; VARS_SIZE],
}

impl DrawCmd {
    /// A command with no mesh, textures or payload.
    pub fn new(state: DrawState) -> Self {
        Self {
            sources: [None; MAX_ATTACHMENTS],
            state,
            blend_mode: BlendMode::Normal,
            mask_mode: MaskMode::Mask,
            alloc_id: NO_ALLOC,
            vtx_offset: 0,
            idx_offset: 0,
            elem_count: 0,
            kind: VarsKind::None,
            vars: [0; VARS_SIZE],
        }
    }

    /// A command drawing the whole of `alloc`.
    pub fn for_alloc(state: DrawState, alloc: &DrawAlloc) -> Self {
        Self {
            alloc_id: alloc.alloc_id,
            vtx_offset: alloc.vtx_offset,
            idx_offset: alloc.idx_offset,
            elem_count: alloc.idx_count,
            ..Self::new(state)
        }
    }

    pub fn with_sources(mut self, slots: &[TextureSlot]) -> Self {
        for (dst, slot) in self.sources.iter_mut().zip(slots) {
            *dst = Some(*slot);
        }
        self
    }

    fn with_vars<T: Pod>(mut self, kind: VarsKind, vars: &T) -> Self {
        let bytes = bytemuck::bytes_of(vars);
        self.vars = [0; VARS_SIZE];
        self.vars[..bytes.len()].copy_from_slice(bytes);
        self.kind = kind;
        self
    }

    pub fn with_part_vars(self, vars: PartVars) -> Self {
        self.with_vars(VarsKind::Part, &vars)
    }

    pub fn with_mask_vars(self, vars: MaskVars) -> Self {
        self.with_vars(VarsKind::Mask, &vars)
    }

    pub fn with_composite_vars(self, vars: CompositeVars) -> Self {
        self.with_vars(VarsKind::Composite, &vars)
    }

    fn read_vars<T: Pod>(&self, kind: VarsKind) -> Option<T> {
        (self.kind == kind)
            .then(|| bytemuck::pod_read_unaligned(&self.vars[..std::mem::size_of::<T>()]))
    }

    pub fn part_vars(&self) -> Option<PartVars> {
        self.read_vars(VarsKind::Part)
    }

    pub fn mask_vars(&self) -> Option<MaskVars> {
        self.read_vars(VarsKind::Mask)
    }

    pub fn composite_vars(&self) -> Option<CompositeVars> {
        self.read_vars(VarsKind::Composite)
    }
}

#[derive(Clone, Debug, Default)]
pub struct DrawList {
    use_base_vertex: bool,
    generation: u64,
    vertices: Vec<VtxData>,
    indices: Vec<u32>,
    commands: Vec<DrawCmd>,
    allocations: Vec<DrawAlloc>,
}

impl DrawList {
    pub fn new(use_base_vertex: bool) -> Self {
        Self {
            use_base_vertex,
            ..Self::default()
        }
    }

    pub fn use_base_vertex(&self) -> bool {
        self.use_base_vertex
    }

    /// Takes effect for meshes allocated after the call; the next frame is fully consistent.
    pub fn set_use_base_vertex(&mut self, value: bool) {
        self.use_base_vertex = value;
    }

    /// Bumped whenever the command list is rebuilt or rewritten.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Drop all frame data. The base-vertex mode is kept.
    pub fn clear(&mut self) {
        self.generation = self.generation.wrapping_add(1);
        self.vertices.clear();
        self.indices.clear();
        self.commands.clear();
        self.allocations.clear();
    }

    /// Append a mesh and return its allocation. The id is the allocation's index in this frame.
    pub fn allocate(&mut self, vertices: &[VtxData], indices: &[u32]) -> DrawAlloc {
        let alloc = DrawAlloc {
            vtx_offset: self.vertices.len() as u32,
            idx_offset: self.indices.len() as u32,
            idx_count: indices.len() as u32,
            vtx_count: vertices.len() as u32,
            alloc_id: self.allocations.len() as u32,
        };
        self.vertices.extend_from_slice(vertices);
        if self.use_base_vertex {
            self.indices.extend_from_slice(indices);
        } else {
            self.indices
                .extend(indices.iter().map(|i| i + alloc.vtx_offset));
        }
        self.allocations.push(alloc);
        alloc
    }

    pub fn push(&mut self, cmd: DrawCmd) {
        self.commands.push(cmd);
    }

    /// Rewrite command texture slots after the texture cache was compacted.
    /// `remap[old]` is the new slot, or None when the texture is gone.
    pub fn remap_sources(&mut self, remap: &[Option<TextureSlot>]) {
        self.generation = self.generation.wrapping_add(1);
        for cmd in &mut self.commands {
            for src in &mut cmd.sources {
                *src = src.and_then(|s| remap.get(s.0 as usize).copied().flatten());
            }
        }
    }

    pub fn commands(&self) -> &[DrawCmd] {
        &self.commands
    }

    pub fn vertices(&self) -> &[VtxData] {
        &self.vertices
    }

    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    pub fn allocations(&self) -> &[DrawAlloc] {
        &self.allocations
    }

    pub fn vertex_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }

    pub fn index_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.indices)
    }

    /// Indices of `alloc` with the base vertex applied, independent of the list's mode.
    pub fn resolved_indices(&self, alloc: &DrawAlloc) -> Vec<u32> {
        let start = alloc.idx_offset as usize;
        let slice = &self.indices[start..start + alloc.idx_count as usize];
        if self.use_base_vertex {
            slice.iter().map(|i| i + alloc.vtx_offset).collect()
        } else {
            slice.to_vec()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vars_blob_reads_back_only_for_matching_kind() {
        let vars = PartVars {
            tint: [1.0, 0.5, 0.25],
            opacity: 0.75,
            screen_tint: [0.0; 3],
            mask_threshold: 0.5,
        };
        let cmd = DrawCmd::new(DrawState::Normal).with_part_vars(vars);
        assert_eq!(cmd.kind, VarsKind::Part);
        assert_eq!(cmd.part_vars(), Some(vars));
        assert_eq!(cmd.composite_vars(), None);
        assert!(cmd.vars[std::mem::size_of::<PartVars>()..].iter().all(|b| *b == 0));
    }

    #[test]
    fn remap_sources_follows_compaction() {
        let mut list = DrawList::new(false);
        list.push(DrawCmd::new(DrawState::Normal).with_sources(&[TextureSlot(0), TextureSlot(2)]));
        let before = list.generation();
        list.remap_sources(&[None, None, Some(TextureSlot(0))]);
        assert_ne!(list.generation(), before);
        let cmd = &list.commands()[0];
        assert_eq!(cmd.sources[0], None);
        assert_eq!(cmd.sources[1], Some(TextureSlot(0)));
    }

    #[test]
    fn blend_mode_parses_authoring_names() {
        let m: BlendMode = serde_json::from_str("\"ClipToLower\"").unwrap();
        assert_eq!(m, BlendMode::SourceIn);
        let m: MaskMode = serde_json::from_str("\"DodgeMask\"").unwrap();
        assert_eq!(m, MaskMode::Dodge);
    }
}
