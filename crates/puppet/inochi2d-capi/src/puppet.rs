//! Puppet handles and entry points.
//!
//! A puppet handle owns one reference to each of its sub-object handles
//! (parameters, texture cache, drawlist). Sub-objects share the puppet core,
//! so a caller that retains one can keep using it after the puppet is gone.

use std::ffi::{c_char, CStr, CString};
use std::ptr;
use std::sync::{Arc, Mutex, MutexGuard};

use inochi2d_core::Puppet;

use crate::drawlist::DrawListHandle;
use crate::error::{guard, CapiError, CapiResult};
use crate::object::{self, borrow, into_raw, Object, ObjectHeader, ObjectKind};
use crate::parameter::ParameterHandle;
use crate::texture::TextureCacheHandle;

pub(crate) type SharedPuppet = Arc<Mutex<Puppet>>;

pub(crate) fn lock(core: &SharedPuppet) -> CapiResult<MutexGuard<'_, Puppet>> {
    core.lock().map_err(|_| CapiError::Poisoned)
}

/// NUL-terminated copy of `s`; interior NULs are dropped.
pub(crate) fn c_string(s: &str) -> CString {
    CString::new(s.replace('\0', "")).unwrap_or_default()
}

/// `in_puppet_t`
#[repr(C)]
pub struct PuppetHandle {
    header: ObjectHeader,
    core: SharedPuppet,
    name: CString,
    parameters: Vec<*mut ParameterHandle>,
    textures: *mut TextureCacheHandle,
    drawlist: *mut DrawListHandle,
}

unsafe impl Object for PuppetHandle {
    const KIND: ObjectKind = ObjectKind::Puppet;
}

impl PuppetHandle {
    fn new(puppet: Puppet) -> *mut PuppetHandle {
        let name = c_string(puppet.name());
        let param_names: Vec<CString> = puppet
            .parameters()
            .iter()
            .map(|p| c_string(p.name()))
            .collect();
        let textures = puppet.texture_cache().textures().to_vec();
        let core: SharedPuppet = Arc::new(Mutex::new(puppet));

        let parameters = param_names
            .into_iter()
            .enumerate()
            .map(|(i, name)| ParameterHandle::new(Arc::clone(&core), i, name))
            .collect();
        let textures = TextureCacheHandle::new(Arc::clone(&core), &textures);
        let drawlist = DrawListHandle::new(Arc::clone(&core), textures);
        into_raw(Self {
            header: ObjectHeader::new::<Self>(),
            core,
            name,
            parameters,
            textures,
            drawlist,
        })
    }

    fn puppet(&self) -> CapiResult<MutexGuard<'_, Puppet>> {
        lock(&self.core)
    }
}

impl Drop for PuppetHandle {
    fn drop(&mut self) {
        // SAFETY: the puppet holds one reference to each sub-object.
        unsafe {
            for p in self.parameters.drain(..) {
                object::release(p.cast());
            }
            object::release(self.drawlist.cast());
            object::release(self.textures.cast());
        }
    }
}

/// Loads a puppet file. Returns null on failure; see `in_get_last_error`.
///
/// # Safety
/// `file` must be null or a NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn in_puppet_load(file: *const c_char) -> *mut PuppetHandle {
    guard("in_puppet_load", ptr::null_mut(), || {
        if file.is_null() {
            return Err(CapiError::NullHandle("file"));
        }
        let path = CStr::from_ptr(file)
            .to_str()
            .map_err(|_| CapiError::InvalidPath)?;
        let puppet = Puppet::load(path)?;
        Ok(PuppetHandle::new(puppet))
    })
}

/// Loads a puppet from `length` bytes at `data`. Returns null on failure.
///
/// # Safety
/// `data` must be null or point to `length` readable bytes.
#[no_mangle]
pub unsafe extern "C" fn in_puppet_load_from_memory(
    data: *const u8,
    length: u32,
) -> *mut PuppetHandle {
    guard("in_puppet_load_from_memory", ptr::null_mut(), || {
        let bytes = if length == 0 {
            &[][..]
        } else if data.is_null() {
            return Err(CapiError::NullHandle("data"));
        } else {
            std::slice::from_raw_parts(data, length as usize)
        };
        let puppet = Puppet::from_bytes(bytes)?;
        Ok(PuppetHandle::new(puppet))
    })
}

/// Gives up the caller's reference to the puppet. Other references
/// (from `in_retain`) keep it alive.
///
/// # Safety
/// `obj` must be null or a live handle the caller holds a reference to.
#[no_mangle]
pub unsafe extern "C" fn in_puppet_free(obj: *mut PuppetHandle) {
    guard("in_puppet_free", (), || {
        borrow(obj, "puppet")?;
        object::release(obj.cast());
        Ok(())
    })
}

/// Gets the name of the puppet as specified by its author. Owned by the puppet.
///
/// # Safety
/// `obj` must be null or a live handle.
#[no_mangle]
pub unsafe extern "C" fn in_puppet_get_name(obj: *mut PuppetHandle) -> *const c_char {
    guard("in_puppet_get_name", ptr::null(), || {
        Ok(borrow(obj, "puppet")?.name.as_ptr())
    })
}

/// # Safety
/// `obj` must be null or a live handle.
#[no_mangle]
pub unsafe extern "C" fn in_puppet_get_physics_enabled(obj: *mut PuppetHandle) -> bool {
    guard("in_puppet_get_physics_enabled", false, || {
        Ok(borrow(obj, "puppet")?.puppet()?.physics_enabled())
    })
}

/// # Safety
/// `obj` must be null or a live handle.
#[no_mangle]
pub unsafe extern "C" fn in_puppet_set_physics_enabled(obj: *mut PuppetHandle, value: bool) {
    guard("in_puppet_set_physics_enabled", (), || {
        borrow(obj, "puppet")?.puppet()?.set_physics_enabled(value);
        Ok(())
    })
}

/// # Safety
/// `obj` must be null or a live handle.
#[no_mangle]
pub unsafe extern "C" fn in_puppet_get_pixels_per_meter(obj: *mut PuppetHandle) -> f32 {
    guard("in_puppet_get_pixels_per_meter", 0.0, || {
        Ok(borrow(obj, "puppet")?.puppet()?.pixels_per_meter())
    })
}

/// Values that are not finite and positive are ignored.
///
/// # Safety
/// `obj` must be null or a live handle.
#[no_mangle]
pub unsafe extern "C" fn in_puppet_set_pixels_per_meter(obj: *mut PuppetHandle, value: f32) {
    guard("in_puppet_set_pixels_per_meter", (), || {
        borrow(obj, "puppet")?.puppet()?.set_pixels_per_meter(value);
        Ok(())
    })
}

/// # Safety
/// `obj` must be null or a live handle.
#[no_mangle]
pub unsafe extern "C" fn in_puppet_get_gravity(obj: *mut PuppetHandle) -> f32 {
    guard("in_puppet_get_gravity", 0.0, || {
        Ok(borrow(obj, "puppet")?.puppet()?.gravity())
    })
}

/// Non-finite values are ignored.
///
/// # Safety
/// `obj` must be null or a live handle.
#[no_mangle]
pub unsafe extern "C" fn in_puppet_set_gravity(obj: *mut PuppetHandle, value: f32) {
    guard("in_puppet_set_gravity", (), || {
        borrow(obj, "puppet")?.puppet()?.set_gravity(value);
        Ok(())
    })
}

/// Advances physics and parameters by `delta` seconds.
///
/// # Safety
/// `obj` must be null or a live handle.
#[no_mangle]
pub unsafe extern "C" fn in_puppet_update(obj: *mut PuppetHandle, delta: f32) {
    guard("in_puppet_update", (), || {
        borrow(obj, "puppet")?.puppet()?.update(delta);
        Ok(())
    })
}

/// Rebuilds the puppet's draw list. Invalidates arrays previously returned by the drawlist.
///
/// # Safety
/// `obj` must be null or a live handle.
#[no_mangle]
pub unsafe extern "C" fn in_puppet_draw(obj: *mut PuppetHandle, delta: f32) {
    guard("in_puppet_draw", (), || {
        borrow(obj, "puppet")?.puppet()?.draw(delta);
        Ok(())
    })
}

/// # Safety
/// `obj` must be null or a live handle.
#[no_mangle]
pub unsafe extern "C" fn in_puppet_reset_drivers(obj: *mut PuppetHandle) {
    guard("in_puppet_reset_drivers", (), || {
        borrow(obj, "puppet")?.puppet()?.reset_drivers();
        Ok(())
    })
}

/// Gets the puppet-owned texture cache.
///
/// # Safety
/// `obj` must be null or a live handle.
#[no_mangle]
pub unsafe extern "C" fn in_puppet_get_texture_cache(
    obj: *mut PuppetHandle,
) -> *mut TextureCacheHandle {
    guard("in_puppet_get_texture_cache", ptr::null_mut(), || {
        Ok(borrow(obj, "puppet")?.textures)
    })
}

/// Gets the puppet-owned array of parameters.
///
/// # Safety
/// `obj` must be null or a live handle; `count` must be null or writable.
#[no_mangle]
pub unsafe extern "C" fn in_puppet_get_parameters(
    obj: *mut PuppetHandle,
    count: *mut u32,
) -> *mut *mut ParameterHandle {
    guard("in_puppet_get_parameters", ptr::null_mut(), || {
        let handle = borrow(obj, "puppet")?;
        if let Some(count) = count.as_mut() {
            *count = handle.parameters.len() as u32;
        }
        if handle.parameters.is_empty() {
            return Ok(ptr::null_mut());
        }
        Ok(handle.parameters.as_ptr().cast_mut())
    })
}

/// Gets the puppet-owned drawlist.
///
/// # Safety
/// `obj` must be null or a live handle.
#[no_mangle]
pub unsafe extern "C" fn in_puppet_get_drawlist(obj: *mut PuppetHandle) -> *mut DrawListHandle {
    guard("in_puppet_get_drawlist", ptr::null_mut(), || {
        Ok(borrow(obj, "puppet")?.drawlist)
    })
}
