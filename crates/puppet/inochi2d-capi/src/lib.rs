//! C ABI for the Inochi2D puppet runtime (`include/inochi2d.h`).
//!
//! Conventions shared by every entry point:
//! - handles are reference counted (`in_retain` / `in_release`) and checked
//!   for null and kind before use;
//! - failures and panics never cross the boundary: they are logged, stored as
//!   the thread's last error and turned into a zero/null return;
//! - strings and arrays returned by accessors are owned by the handle they
//!   came from.
//!
//! The crate is also built as an `rlib` so Rust tests can call the ABI directly.

pub mod drawlist;
pub mod error;
pub mod object;
pub mod parameter;
pub mod puppet;
pub mod texture;
pub mod types;

pub use drawlist::{
    in_drawlist_get_allocations, in_drawlist_get_commands, in_drawlist_get_index_data,
    in_drawlist_get_use_base_vertex, in_drawlist_get_vertex_data, in_drawlist_set_use_base_vertex,
    DrawListHandle,
};
pub use error::in_get_last_error;
pub use object::{in_release, in_retain, ObjectKind};
pub use parameter::{
    in_parameter_get_active, in_parameter_get_dimensions, in_parameter_get_max_value,
    in_parameter_get_min_value, in_parameter_get_name, in_parameter_get_normalized_value,
    in_parameter_get_value, in_parameter_set_normalized_value, in_parameter_set_value,
    ParameterHandle,
};
pub use puppet::{
    in_puppet_draw, in_puppet_free, in_puppet_get_drawlist, in_puppet_get_gravity,
    in_puppet_get_name, in_puppet_get_parameters, in_puppet_get_physics_enabled,
    in_puppet_get_pixels_per_meter, in_puppet_get_texture_cache, in_puppet_load,
    in_puppet_load_from_memory, in_puppet_reset_drivers, in_puppet_set_gravity,
    in_puppet_set_physics_enabled, in_puppet_set_pixels_per_meter, in_puppet_update,
    PuppetHandle,
};
pub use texture::{
    in_resource_get_id, in_resource_get_length, in_resource_set_id, in_texture_cache_get_size,
    in_texture_cache_get_texture, in_texture_cache_get_textures, in_texture_cache_prune,
    in_texture_flip_vertically, in_texture_from_resource, in_texture_get_channels,
    in_texture_get_height, in_texture_get_pixels, in_texture_get_width, in_texture_pad,
    in_texture_premultiply, in_texture_unpremultiply, ResourceHandle, TextureCacheHandle,
    TextureHandle,
};
pub use types::{in_drawalloc_t, in_drawcmd_t, in_vec2_t, in_vtxdata_t};
