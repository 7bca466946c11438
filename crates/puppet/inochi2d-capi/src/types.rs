//! `#[repr(C)]` interop types mirroring `include/inochi2d.h`.
#![allow(non_camel_case_types)]

use inochi2d_core::{
    BlendMode, DrawAlloc, DrawCmd, DrawState, MaskMode, Vec2, VtxData, MAX_ATTACHMENTS, VARS_SIZE,
};

use crate::texture::TextureHandle;

/// `in_vec2_t`
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct in_vec2_t {
    pub x: f32,
    pub y: f32,
}

impl From<Vec2> for in_vec2_t {
    fn from(v: Vec2) -> Self {
        Self { x: v.x, y: v.y }
    }
}

impl From<in_vec2_t> for Vec2 {
    fn from(v: in_vec2_t) -> Self {
        Vec2::new(v.x, v.y)
    }
}

/// `in_vtxdata_t`; the core vertex record already has the header's layout.
pub type in_vtxdata_t = VtxData;

/// `in_drawalloc_t`
pub type in_drawalloc_t = DrawAlloc;

pub type in_drawstate_t = DrawState;
pub type in_mask_mode_t = MaskMode;
pub type in_blend_mode_t = BlendMode;

/// `in_drawcmd_t`: a core command with texture slots resolved to handles.
#[repr(C)]
#[derive(Clone, Copy, Debug)]
pub struct in_drawcmd_t {
    pub sources: [*mut TextureHandle; MAX_ATTACHMENTS],
    pub state: in_drawstate_t,
    pub blend_mode: in_blend_mode_t,
    pub mask_mode: in_mask_mode_t,
    pub alloc_id: u32,
    pub vtx_offset: u32,
    pub idx_offset: u32,
    pub elem_count: u32,
    pub kind: u32,
    pub vars: [u8; VARS_SIZE],
}

impl in_drawcmd_t {
    pub(crate) fn from_core(
        cmd: &DrawCmd,
        resolve: impl Fn(inochi2d_core::TextureSlot) -> *mut TextureHandle,
    ) -> Self {
        Self {
            sources: cmd
                .sources
                .map(|slot| slot.map_or(std::ptr::null_mut(), &resolve)),
            state: cmd.state,
            blend_mode: cmd.blend_mode,
            mask_mode: cmd.mask_mode,
            alloc_id: cmd.alloc_id,
            vtx_offset: cmd.vtx_offset,
            idx_offset: cmd.idx_offset,
            elem_count: cmd.elem_count,
            kind: cmd.kind as u32,
            vars: cmd.vars,
        }
    }
}
