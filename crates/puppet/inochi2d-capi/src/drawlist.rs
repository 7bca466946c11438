//! Drawlist handles and entry points.
//!
//! Vertex, index and allocation arrays point straight into the puppet's
//! draw list. Commands are converted on request because their texture
//! references become texture handles. Every returned array stays valid
//! until the next draw, base-vertex change or prune.

use std::ffi::c_void;
use std::ptr;
use std::sync::{Mutex, MutexGuard};

use crate::error::{guard, CapiError, CapiResult};
use crate::object::{self, borrow, into_raw, Object, ObjectHeader, ObjectKind};
use crate::puppet::{lock, SharedPuppet};
use crate::texture::TextureCacheHandle;
use crate::types::{in_drawalloc_t, in_drawcmd_t, in_vtxdata_t};

/// `in_drawlist_t`
#[repr(C)]
pub struct DrawListHandle {
    header: ObjectHeader,
    core: SharedPuppet,
    textures: *mut TextureCacheHandle,
    commands: Mutex<CommandCache>,
}

/// Commands converted for the ABI, tagged with the core list generation they came from.
#[derive(Default)]
struct CommandCache {
    generation: Option<u64>,
    commands: Vec<in_drawcmd_t>,
}

unsafe impl Object for DrawListHandle {
    const KIND: ObjectKind = ObjectKind::DrawList;
}

impl DrawListHandle {
    /// Takes a reference to `textures` to resolve command sources.
    pub(crate) fn new(core: SharedPuppet, textures: *mut TextureCacheHandle) -> *mut DrawListHandle {
        // SAFETY: `textures` was just created by the owning puppet.
        unsafe { object::retain(textures.cast()) };
        into_raw(Self {
            header: ObjectHeader::new::<Self>(),
            core,
            textures,
            commands: Mutex::new(CommandCache::default()),
        })
    }

    fn commands(&self) -> CapiResult<MutexGuard<'_, CommandCache>> {
        self.commands.lock().map_err(|_| CapiError::Poisoned)
    }
}

impl Drop for DrawListHandle {
    fn drop(&mut self) {
        // SAFETY: taken in `new`.
        unsafe { object::release(self.textures.cast()) };
    }
}

/// Stores the element count of `items` in `out` (if non-null) and returns
/// the array, or null when it is empty.
unsafe fn export<T>(items: &[T], len: usize, out: *mut u32) -> *mut T {
    if let Some(out) = out.as_mut() {
        *out = len as u32;
    }
    if items.is_empty() {
        ptr::null_mut()
    } else {
        items.as_ptr().cast_mut()
    }
}

/// # Safety
/// `obj` must be null or a live handle.
#[no_mangle]
pub unsafe extern "C" fn in_drawlist_get_use_base_vertex(obj: *mut DrawListHandle) -> bool {
    guard("in_drawlist_get_use_base_vertex", false, || {
        let list = borrow(obj, "drawlist")?;
        let use_base_vertex = lock(&list.core)?.drawlist().use_base_vertex();
        Ok(use_base_vertex)
    })
}

/// Applies to meshes appended by the next draw.
///
/// # Safety
/// `obj` must be null or a live handle.
#[no_mangle]
pub unsafe extern "C" fn in_drawlist_set_use_base_vertex(obj: *mut DrawListHandle, value: bool) {
    guard("in_drawlist_set_use_base_vertex", (), || {
        let list = borrow(obj, "drawlist")?;
        lock(&list.core)?.drawlist_mut().set_use_base_vertex(value);
        Ok(())
    })
}

/// Gets the commands of the last draw. Owned by the drawlist.
///
/// The array is converted once per frame: repeated calls return the same
/// array untouched until the next draw or prune, which rebuild it in place.
/// Readers must not hold it across those calls on another thread.
///
/// # Safety
/// `obj` must be null or a live handle; `count` must be null or writable.
#[no_mangle]
pub unsafe extern "C" fn in_drawlist_get_commands(
    obj: *mut DrawListHandle,
    count: *mut u32,
) -> *mut in_drawcmd_t {
    guard("in_drawlist_get_commands", ptr::null_mut(), || {
        let list = borrow(obj, "drawlist")?;
        let cache = borrow(list.textures, "texture cache")?;
        let puppet = lock(&list.core)?;
        let draw = puppet.drawlist();
        let mut converted = list.commands()?;
        if converted.generation != Some(draw.generation()) {
            let handles = cache.handles()?;
            converted.commands.clear();
            converted.commands.extend(draw.commands().iter().map(|cmd| {
                in_drawcmd_t::from_core(cmd, |slot| {
                    handles
                        .get(slot.0 as usize)
                        .copied()
                        .unwrap_or(ptr::null_mut())
                })
            }));
            converted.generation = Some(draw.generation());
        }
        let out = export(&converted.commands[..], converted.commands.len(), count);
        Ok(out)
    })
}

/// Gets the vertex buffer of the last draw. `bytes` receives its size in bytes.
///
/// # Safety
/// `obj` must be null or a live handle; `bytes` must be null or writable.
#[no_mangle]
pub unsafe extern "C" fn in_drawlist_get_vertex_data(
    obj: *mut DrawListHandle,
    bytes: *mut u32,
) -> *mut in_vtxdata_t {
    guard("in_drawlist_get_vertex_data", ptr::null_mut(), || {
        let list = borrow(obj, "drawlist")?;
        let puppet = lock(&list.core)?;
        let draw = puppet.drawlist();
        Ok(export(draw.vertices(), draw.vertex_bytes().len(), bytes))
    })
}

/// Gets the `u32` index buffer of the last draw. `bytes` receives its size in bytes.
///
/// # Safety
/// `obj` must be null or a live handle; `bytes` must be null or writable.
#[no_mangle]
pub unsafe extern "C" fn in_drawlist_get_index_data(
    obj: *mut DrawListHandle,
    bytes: *mut u32,
) -> *mut c_void {
    guard("in_drawlist_get_index_data", ptr::null_mut(), || {
        let list = borrow(obj, "drawlist")?;
        let puppet = lock(&list.core)?;
        let draw = puppet.drawlist();
        Ok(export(draw.indices(), draw.index_bytes().len(), bytes).cast())
    })
}

/// Gets the mesh allocations of the last draw. Owned by the drawlist.
///
/// # Safety
/// `obj` must be null or a live handle; `count` must be null or writable.
#[no_mangle]
pub unsafe extern "C" fn in_drawlist_get_allocations(
    obj: *mut DrawListHandle,
    count: *mut u32,
) -> *mut in_drawalloc_t {
    guard("in_drawlist_get_allocations", ptr::null_mut(), || {
        let list = borrow(obj, "drawlist")?;
        let puppet = lock(&list.core)?;
        let allocs = puppet.drawlist().allocations();
        Ok(export(allocs, allocs.len(), count))
    })
}
