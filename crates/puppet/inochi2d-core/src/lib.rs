//! Inochi2D puppet runtime core (engine-agnostic).
//!
//! Loads INP/INX puppets, evaluates parameters and pendulum physics, and
//! produces a [`DrawList`] that a rendering backend can consume directly.
//! The C ABI lives in the `inochi2d-capi` crate; this crate has no FFI.

pub mod config;
pub mod drawlist;
pub mod error;
pub mod format;
pub mod ids;
pub mod math;
pub mod node;
pub mod param;
pub mod physics;
pub mod puppet;
pub mod schema;
pub mod texture;
pub mod texture_cache;

// Re-exports for consumers (adapters)
pub use config::Config;
pub use drawlist::{
    BlendMode, DrawAlloc, DrawCmd, DrawList, DrawState, MaskMode, VarsKind, MAX_ATTACHMENTS,
    NO_ALLOC, VARS_SIZE,
};
pub use error::{PuppetError, Result};
pub use format::{is_inp, read_inp, write_inp, InpFile, InpTexture, TextureEncoding};
pub use ids::{NodeId, TextureSlot};
pub use math::{Transform, Vec2, Vtx, VtxData};
pub use param::{InterpolateMode, Parameter};
pub use puppet::{Puppet, PuppetMeta};
pub use texture::{RendererId, Resource, SharedTexture, Texture, MAX_TEXTURE_SIZE};
pub use texture_cache::TextureCache;
