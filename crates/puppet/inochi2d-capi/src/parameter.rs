//! Parameter handles and entry points.

use std::ffi::{c_char, CString};
use std::ptr;

use inochi2d_core::{Parameter, Vec2};

use crate::error::{guard, CapiError, CapiResult};
use crate::object::{borrow, into_raw, Object, ObjectHeader, ObjectKind};
use crate::puppet::{lock, SharedPuppet};
use crate::types::in_vec2_t;

/// `in_parameter_t`: the parameter at `index` of a shared puppet.
#[repr(C)]
pub struct ParameterHandle {
    header: ObjectHeader,
    core: SharedPuppet,
    index: usize,
    name: CString,
}

unsafe impl Object for ParameterHandle {
    const KIND: ObjectKind = ObjectKind::Parameter;
}

impl ParameterHandle {
    pub(crate) fn new(core: SharedPuppet, index: usize, name: CString) -> *mut ParameterHandle {
        into_raw(Self {
            header: ObjectHeader::new::<Self>(),
            core,
            index,
            name,
        })
    }

    fn with<R>(&self, f: impl FnOnce(&mut Parameter) -> R) -> CapiResult<R> {
        let mut puppet = lock(&self.core)?;
        let param = puppet
            .parameter_mut(self.index)
            .ok_or(CapiError::NullHandle("parameter"))?;
        Ok(f(param))
    }
}

unsafe fn param<'a>(obj: *mut ParameterHandle) -> CapiResult<&'a ParameterHandle> {
    borrow(obj, "parameter")
}

/// Gets the parameter's name. Owned by the parameter.
///
/// # Safety
/// `obj` must be null or a live handle.
#[no_mangle]
pub unsafe extern "C" fn in_parameter_get_name(obj: *mut ParameterHandle) -> *const c_char {
    guard("in_parameter_get_name", ptr::null(), || {
        Ok(param(obj)?.name.as_ptr())
    })
}

/// # Safety
/// `obj` must be null or a live handle.
#[no_mangle]
pub unsafe extern "C" fn in_parameter_get_active(obj: *mut ParameterHandle) -> bool {
    guard("in_parameter_get_active", false, || {
        param(obj)?.with(|p| p.active())
    })
}

/// 1 for a scalar parameter, 2 for a 2D one.
///
/// # Safety
/// `obj` must be null or a live handle.
#[no_mangle]
pub unsafe extern "C" fn in_parameter_get_dimensions(obj: *mut ParameterHandle) -> u32 {
    guard("in_parameter_get_dimensions", 0, || {
        param(obj)?.with(|p| p.dimensions())
    })
}

/// # Safety
/// `obj` must be null or a live handle.
#[no_mangle]
pub unsafe extern "C" fn in_parameter_get_min_value(obj: *mut ParameterHandle) -> in_vec2_t {
    guard("in_parameter_get_min_value", in_vec2_t::default(), || {
        param(obj)?.with(|p| p.min().into())
    })
}

/// # Safety
/// `obj` must be null or a live handle.
#[no_mangle]
pub unsafe extern "C" fn in_parameter_get_max_value(obj: *mut ParameterHandle) -> in_vec2_t {
    guard("in_parameter_get_max_value", in_vec2_t::default(), || {
        param(obj)?.with(|p| p.max().into())
    })
}

/// # Safety
/// `obj` must be null or a live handle.
#[no_mangle]
pub unsafe extern "C" fn in_parameter_get_value(obj: *mut ParameterHandle) -> in_vec2_t {
    guard("in_parameter_get_value", in_vec2_t::default(), || {
        param(obj)?.with(|p| p.value().into())
    })
}

/// Sets the value, clamped to the parameter's range. Takes effect on the next update or draw.
///
/// # Safety
/// `obj` must be null or a live handle.
#[no_mangle]
pub unsafe extern "C" fn in_parameter_set_value(obj: *mut ParameterHandle, value: in_vec2_t) {
    guard("in_parameter_set_value", (), || {
        param(obj)?.with(|p| p.set_value(Vec2::from(value)))
    })
}

/// Gets the value mapped into `0..1` per axis.
///
/// # Safety
/// `obj` must be null or a live handle.
#[no_mangle]
pub unsafe extern "C" fn in_parameter_get_normalized_value(
    obj: *mut ParameterHandle,
) -> in_vec2_t {
    guard("in_parameter_get_normalized_value", in_vec2_t::default(), || {
        param(obj)?.with(|p| p.normalized_value().into())
    })
}

/// Sets the value from `0..1` coordinates (clamped).
///
/// # Safety
/// `obj` must be null or a live handle.
#[no_mangle]
pub unsafe extern "C" fn in_parameter_set_normalized_value(
    obj: *mut ParameterHandle,
    value: in_vec2_t,
) {
    guard("in_parameter_set_normalized_value", (), || {
        param(obj)?.with(|p| p.set_normalized_value(Vec2::from(value)))
    })
}
