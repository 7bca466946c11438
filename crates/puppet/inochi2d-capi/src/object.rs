//! Reference-counted object model shared by every handle type.
//!
//! Each handle is a boxed `#[repr(C)]` struct whose first field is an
//! [`ObjectHeader`]. The header lets `in_retain`/`in_release` work on an
//! untyped pointer and lets typed entry points reject handles of the wrong
//! kind. Constructors hand out one reference.

use std::ffi::c_void;
use std::ptr;
use std::sync::atomic::{fence, AtomicUsize, Ordering};

use crate::error::{CapiError, CapiResult};

#[repr(u32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ObjectKind {
    Puppet = 1,
    Parameter = 2,
    TextureCache = 3,
    Texture = 4,
    DrawList = 5,
}

impl ObjectKind {
    pub fn name(self) -> &'static str {
        match self {
            ObjectKind::Puppet => "puppet",
            ObjectKind::Parameter => "parameter",
            ObjectKind::TextureCache => "texture cache",
            ObjectKind::Texture => "texture",
            ObjectKind::DrawList => "drawlist",
        }
    }

    /// Kinds that can be used as `in_resource_t`.
    pub fn is_resource(self) -> bool {
        matches!(self, ObjectKind::Texture)
    }
}

#[repr(C)]
pub struct ObjectHeader {
    refcount: AtomicUsize,
    kind: ObjectKind,
    destroy: unsafe fn(*mut ObjectHeader),
}

impl ObjectHeader {
    pub(crate) fn new<T: Object>() -> Self {
        Self {
            refcount: AtomicUsize::new(1),
            kind: T::KIND,
            destroy: destroy::<T>,
        }
    }

    pub fn kind(&self) -> ObjectKind {
        self.kind
    }

    pub fn refcount(&self) -> usize {
        self.refcount.load(Ordering::Acquire)
    }
}

/// A handle type.
///
/// # Safety
/// Implementors must be `#[repr(C)]` with an [`ObjectHeader`] built by
/// `ObjectHeader::new::<Self>()` as their first field.
pub unsafe trait Object: Sized {
    const KIND: ObjectKind;
}

unsafe fn destroy<T: Object>(ptr: *mut ObjectHeader) {
    drop(Box::from_raw(ptr.cast::<T>()));
}

/// Move `obj` to the heap and return it with a refcount of 1.
pub(crate) fn into_raw<T: Object>(obj: T) -> *mut T {
    Box::into_raw(Box::new(obj))
}

/// # Safety
/// `ptr` must be null or point to a live handle.
pub(crate) unsafe fn header<'a>(ptr: *const c_void) -> Option<&'a ObjectHeader> {
    ptr.cast::<ObjectHeader>().as_ref()
}

/// Borrow a typed handle after checking it is non-null and of kind `T`.
///
/// # Safety
/// `ptr` must be null or point to a live handle of any kind.
pub(crate) unsafe fn borrow<'a, T: Object>(
    ptr: *const T,
    what: &'static str,
) -> CapiResult<&'a T> {
    let header = header(ptr.cast()).ok_or(CapiError::NullHandle(what))?;
    if header.kind != T::KIND {
        return Err(CapiError::wrong_kind(T::KIND, header.kind));
    }
    Ok(&*ptr)
}

/// # Safety
/// `ptr` must be null or point to a live handle.
pub(crate) unsafe fn retain(ptr: *mut c_void) -> *mut c_void {
    if let Some(h) = header(ptr) {
        h.refcount.fetch_add(1, Ordering::Relaxed);
    }
    ptr
}

/// Drop one reference, destroying the object when it was the last.
/// Returns `ptr` while the object is alive and null once it is gone.
///
/// # Safety
/// `ptr` must be null or point to a live handle the caller holds a reference to.
pub(crate) unsafe fn release(ptr: *mut c_void) -> *mut c_void {
    let Some(h) = header(ptr) else {
        return ptr::null_mut();
    };
    if h.refcount.fetch_sub(1, Ordering::Release) != 1 {
        return ptr;
    }
    fence(Ordering::Acquire);
    let destroy = h.destroy;
    destroy(ptr.cast());
    ptr::null_mut()
}

/// Retains a reference to an Inochi2D object and returns it. Null is passed through.
///
/// # Safety
/// `obj` must be null or a live handle returned by this library.
#[no_mangle]
pub unsafe extern "C" fn in_retain(obj: *mut c_void) -> *mut c_void {
    retain(obj)
}

/// Releases a reference to an Inochi2D object.
///
/// Returns the object while references remain and null once it has been destroyed.
///
/// # Safety
/// `obj` must be null or a live handle the caller holds a reference to.
#[no_mangle]
pub unsafe extern "C" fn in_release(obj: *mut c_void) -> *mut c_void {
    release(obj)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;
    use std::sync::Arc;

    #[repr(C)]
    struct Probe {
        header: ObjectHeader,
        dropped: Arc<AtomicBool>,
    }

    unsafe impl Object for Probe {
        const KIND: ObjectKind = ObjectKind::Parameter;
    }

    impl Drop for Probe {
        fn drop(&mut self) {
            self.dropped.store(true, Ordering::SeqCst);
        }
    }

    #[test]
    fn last_release_destroys() {
        let dropped = Arc::new(AtomicBool::new(false));
        let obj = into_raw(Probe {
            header: ObjectHeader::new::<Probe>(),
            dropped: dropped.clone(),
        });
        unsafe {
            assert_eq!(retain(obj.cast()), obj.cast());
            assert_eq!((*obj).header.refcount(), 2);
            assert_eq!(release(obj.cast()), obj.cast());
            assert!(!dropped.load(Ordering::SeqCst));
            assert!(release(obj.cast()).is_null());
        }
        assert!(dropped.load(Ordering::SeqCst));
    }

    #[test]
    fn borrow_checks_null() {
        let Err(err) = (unsafe { borrow::<Probe>(ptr::null(), "obj") }) else {
            panic!("null handle was accepted");
        };
        assert!(matches!(err, CapiError::NullHandle("obj")));
        unsafe {
            assert!(retain(ptr::null_mut()).is_null());
            assert!(release(ptr::null_mut()).is_null());
        }
    }
}
