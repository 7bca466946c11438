//! Texture cache, resource and texture entry points.

use std::ffi::c_void;
use std::ptr;
use std::sync::{Arc, Mutex, MutexGuard, RwLockReadGuard, RwLockWriteGuard};

use inochi2d_core::{Resource, SharedTexture, Texture};

use crate::error::{guard, CapiError, CapiResult};
use crate::object::{self, borrow, into_raw, Object, ObjectHeader, ObjectKind};
use crate::puppet::{lock, SharedPuppet};

/// `in_texture_t`; also usable as `in_resource_t`.
#[repr(C)]
pub struct TextureHandle {
    header: ObjectHeader,
    texture: SharedTexture,
}

unsafe impl Object for TextureHandle {
    const KIND: ObjectKind = ObjectKind::Texture;
}

impl TextureHandle {
    fn new(texture: SharedTexture) -> *mut TextureHandle {
        into_raw(Self {
            header: ObjectHeader::new::<Self>(),
            texture,
        })
    }

    fn read(&self) -> CapiResult<RwLockReadGuard<'_, Texture>> {
        self.texture.read().map_err(|_| CapiError::Poisoned)
    }

    fn write(&self) -> CapiResult<RwLockWriteGuard<'_, Texture>> {
        self.texture.write().map_err(|_| CapiError::Poisoned)
    }
}

/// Opaque `in_resource_t`. Every resource handle starts with an [`ObjectHeader`].
#[repr(C)]
pub struct ResourceHandle {
    _private: [u8; 0],
}

/// Resolve a resource handle to the object implementing it.
unsafe fn resource<'a>(ptr: *const ResourceHandle) -> CapiResult<&'a TextureHandle> {
    let header = object::header(ptr.cast()).ok_or(CapiError::NullHandle("resource"))?;
    if !header.kind().is_resource() {
        return Err(CapiError::wrong_kind(ObjectKind::Texture, header.kind()));
    }
    borrow(ptr.cast::<TextureHandle>(), "resource")
}

/// `in_texture_cache_t`: one texture handle per cache slot, in slot order.
#[repr(C)]
pub struct TextureCacheHandle {
    header: ObjectHeader,
    core: SharedPuppet,
    handles: Mutex<Vec<*mut TextureHandle>>,
}

unsafe impl Object for TextureCacheHandle {
    const KIND: ObjectKind = ObjectKind::TextureCache;
}

impl TextureCacheHandle {
    pub(crate) fn new(core: SharedPuppet, textures: &[SharedTexture]) -> *mut TextureCacheHandle {
        let handles = textures
            .iter()
            .map(|t| TextureHandle::new(Arc::clone(t)))
            .collect();
        into_raw(Self {
            header: ObjectHeader::new::<Self>(),
            core,
            handles: Mutex::new(handles),
        })
    }

    pub(crate) fn handles(&self) -> CapiResult<MutexGuard<'_, Vec<*mut TextureHandle>>> {
        self.handles.lock().map_err(|_| CapiError::Poisoned)
    }

    /// Rebuild the handle list after the core cache changed. Handles of
    /// surviving textures are kept; handles of removed ones are released.
    fn sync(&self, textures: &[SharedTexture]) -> CapiResult<()> {
        let mut handles = self.handles()?;
        let mut old = std::mem::take(&mut *handles);
        for tex in textures {
            // SAFETY: every pointer in `old` is a live handle owned by this cache.
            let pos = old
                .iter()
                .position(|h| Arc::ptr_eq(unsafe { &(**h).texture }, tex));
            let handle = match pos {
                Some(i) => old.swap_remove(i),
                None => TextureHandle::new(Arc::clone(tex)),
            };
            handles.push(handle);
        }
        for stale in old {
            // SAFETY: the cache held one reference to each stale handle.
            unsafe { object::release(stale.cast()) };
        }
        Ok(())
    }
}

impl Drop for TextureCacheHandle {
    fn drop(&mut self) {
        let handles = match self.handles.get_mut() {
            Ok(h) => std::mem::take(h),
            Err(poisoned) => std::mem::take(poisoned.into_inner()),
        };
        for h in handles {
            // SAFETY: the cache held one reference to each handle.
            unsafe { object::release(h.cast()) };
        }
    }
}

/// Gets the amount of textures in the cache.
///
/// # Safety
/// `obj` must be null or a live handle.
#[no_mangle]
pub unsafe extern "C" fn in_texture_cache_get_size(obj: *mut TextureCacheHandle) -> u32 {
    guard("in_texture_cache_get_size", 0, || {
        let cache = borrow(obj, "texture cache")?;
        Ok(cache.handles()?.len() as u32)
    })
}

/// Gets the texture in `slot`, or null if `slot` is out of range.
///
/// # Safety
/// `obj` must be null or a live handle.
#[no_mangle]
pub unsafe extern "C" fn in_texture_cache_get_texture(
    obj: *mut TextureCacheHandle,
    slot: u32,
) -> *mut TextureHandle {
    guard("in_texture_cache_get_texture", ptr::null_mut(), || {
        let cache = borrow(obj, "texture cache")?;
        let handles = cache.handles()?;
        Ok(handles
            .get(slot as usize)
            .copied()
            .unwrap_or(ptr::null_mut()))
    })
}

/// Gets the cache-owned array of textures. The array is valid until the next prune.
///
/// # Safety
/// `obj` must be null or a live handle; `count` must be null or writable.
#[no_mangle]
pub unsafe extern "C" fn in_texture_cache_get_textures(
    obj: *mut TextureCacheHandle,
    count: *mut u32,
) -> *mut *mut TextureHandle {
    guard("in_texture_cache_get_textures", ptr::null_mut(), || {
        let cache = borrow(obj, "texture cache")?;
        let mut handles = cache.handles()?;
        if let Some(count) = count.as_mut() {
            *count = handles.len() as u32;
        }
        if handles.is_empty() {
            return Ok(ptr::null_mut());
        }
        Ok(handles.as_mut_ptr())
    })
}

/// Removes textures no part references. Surviving texture handles stay valid.
///
/// # Safety
/// `obj` must be null or a live handle.
#[no_mangle]
pub unsafe extern "C" fn in_texture_cache_prune(obj: *mut TextureCacheHandle) {
    guard("in_texture_cache_prune", (), || {
        let cache = borrow(obj, "texture cache")?;
        let mut puppet = lock(&cache.core)?;
        let removed = puppet.prune_textures();
        cache.sync(puppet.texture_cache().textures())?;
        log::debug!("pruned {removed} textures");
        Ok(())
    })
}

/// Gets the length of the resource's data in bytes.
///
/// # Safety
/// `obj` must be null or a live handle.
#[no_mangle]
pub unsafe extern "C" fn in_resource_get_length(obj: *mut ResourceHandle) -> u32 {
    guard("in_resource_get_length", 0, || {
        Ok(resource(obj)?.read()?.byte_len() as u32)
    })
}

/// Gets the renderer id of the resource (null until one is set).
///
/// # Safety
/// `obj` must be null or a live handle.
#[no_mangle]
pub unsafe extern "C" fn in_resource_get_id(obj: *mut ResourceHandle) -> *mut c_void {
    guard("in_resource_get_id", ptr::null_mut(), || {
        Ok(resource(obj)?.read()?.renderer_id() as *mut c_void)
    })
}

/// Sets the renderer id of the resource.
///
/// # Safety
/// `obj` must be null or a live handle.
#[no_mangle]
pub unsafe extern "C" fn in_resource_set_id(obj: *mut ResourceHandle, value: *mut c_void) {
    guard("in_resource_set_id", (), || {
        resource(obj)?.write()?.set_renderer_id(value as usize);
        Ok(())
    })
}

/// Gets the texture behind a resource, or null if the resource is not a texture.
///
/// # Safety
/// `obj` must be null or a live handle.
#[no_mangle]
pub unsafe extern "C" fn in_texture_from_resource(obj: *mut ResourceHandle) -> *mut TextureHandle {
    guard("in_texture_from_resource", ptr::null_mut(), || {
        let header = object::header(obj.cast()).ok_or(CapiError::NullHandle("resource"))?;
        if header.kind() != ObjectKind::Texture {
            return Err(CapiError::wrong_kind(ObjectKind::Texture, header.kind()));
        }
        Ok(obj.cast())
    })
}

/// # Safety
/// `obj` must be null or a live handle.
#[no_mangle]
pub unsafe extern "C" fn in_texture_get_width(obj: *mut TextureHandle) -> u32 {
    guard("in_texture_get_width", 0, || {
        Ok(borrow(obj, "texture")?.read()?.width())
    })
}

/// # Safety
/// `obj` must be null or a live handle.
#[no_mangle]
pub unsafe extern "C" fn in_texture_get_height(obj: *mut TextureHandle) -> u32 {
    guard("in_texture_get_height", 0, || {
        Ok(borrow(obj, "texture")?.read()?.height())
    })
}

/// # Safety
/// `obj` must be null or a live handle.
#[no_mangle]
pub unsafe extern "C" fn in_texture_get_channels(obj: *mut TextureHandle) -> u32 {
    guard("in_texture_get_channels", 0, || {
        Ok(borrow(obj, "texture")?.read()?.channels())
    })
}

/// Flips the texture's rows. Some engines read textures bottom-up.
///
/// # Safety
/// `obj` must be null or a live handle.
#[no_mangle]
pub unsafe extern "C" fn in_texture_flip_vertically(obj: *mut TextureHandle) {
    guard("in_texture_flip_vertically", (), || {
        borrow(obj, "texture")?.write()?.flip_vertically();
        Ok(())
    })
}

/// # Safety
/// `obj` must be null or a live handle.
#[no_mangle]
pub unsafe extern "C" fn in_texture_premultiply(obj: *mut TextureHandle) {
    guard("in_texture_premultiply", (), || {
        borrow(obj, "texture")?.write()?.premultiply();
        Ok(())
    })
}

/// # Safety
/// `obj` must be null or a live handle.
#[no_mangle]
pub unsafe extern "C" fn in_texture_unpremultiply(obj: *mut TextureHandle) {
    guard("in_texture_unpremultiply", (), || {
        borrow(obj, "texture")?.write()?.unpremultiply();
        Ok(())
    })
}

/// Grows the texture by a transparent border of `thickness` pixels.
/// Invalidates pointers previously returned by `in_texture_get_pixels`.
///
/// # Safety
/// `obj` must be null or a live handle.
#[no_mangle]
pub unsafe extern "C" fn in_texture_pad(obj: *mut TextureHandle, thickness: u32) {
    guard("in_texture_pad", (), || {
        borrow(obj, "texture")?.write()?.pad(thickness)?;
        Ok(())
    })
}

/// Gets the texture's tightly packed pixels (`width * height * channels` bytes).
///
/// # Safety
/// `obj` must be null or a live handle.
#[no_mangle]
pub unsafe extern "C" fn in_texture_get_pixels(obj: *mut TextureHandle) -> *mut c_void {
    guard("in_texture_get_pixels", ptr::null_mut(), || {
        let texture = borrow(obj, "texture")?;
        let mut tex = texture.write()?;
        Ok(tex.pixels_mut().as_mut_ptr().cast())
    })
}
