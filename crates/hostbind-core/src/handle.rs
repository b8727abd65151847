//! Native object handles.

use std::fmt;
use std::num::NonZeroUsize;

/// Opaque, host-owned, pointer-sized token identifying one native object.
///
/// The bridge never dereferences a handle; it only compares, hashes and hands
/// it back to host accessor functions. Null is not a valid handle; the null
/// object reference is `Option::<NativeHandle>::None`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct NativeHandle(NonZeroUsize);

impl NativeHandle {
    /// Wrap a raw address. Returns `None` for null.
    #[inline]
    pub fn from_addr(addr: usize) -> Option<Self> {
        NonZeroUsize::new(addr).map(NativeHandle)
    }

    /// Wrap a raw host pointer. Returns `None` for null.
    #[inline]
    pub fn from_ptr<T>(ptr: *mut T) -> Option<Self> {
        Self::from_addr(ptr as usize)
    }

    /// The raw address.
    #[inline]
    pub fn addr(self) -> usize {
        self.0.get()
    }

    /// The handle as a raw pointer for passing back to the host.
    #[inline]
    pub fn as_ptr<T>(self) -> *mut T {
        self.0.get() as *mut T
    }
}

impl fmt::Debug for NativeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NativeHandle(0x{:x})", self.0)
    }
}

impl fmt::Display for NativeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:x}", self.0)
    }
}

/// Host resource identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
#[repr(transparent)]
pub struct Rid(pub u64);

impl Rid {
    /// The invalid resource id.
    pub const INVALID: Rid = Rid(0);

    pub fn is_valid(self) -> bool {
        self.0 != 0
    }
}
