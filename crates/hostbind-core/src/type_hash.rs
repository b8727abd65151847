//! Deterministic hash-based class identity.
//!
//! [`TypeHash`] is a 64-bit hash computed from a bare class name or from a
//! class/method pair. The bridge uses it to key per-class metadata and to tag
//! exported methods without keeping secondary name maps.
//!
//! ```
//! use hostbind_core::TypeHash;
//!
//! let node = TypeHash::from_name("Node");
//! assert_eq!(node, TypeHash::from_name("Node"));
//! assert_ne!(node, TypeHash::from_name("Node2D"));
//! ```

use std::fmt;
use xxhash_rust::xxh64::xxh64;

/// Domain mixing constants, so a class and a method of the same name differ.
pub mod hash_constants {
    /// Separator between path components.
    pub const SEP: u64 = 0x4bc94d6bd06053ad;

    /// Domain marker for class hashes.
    pub const CLASS: u64 = 0x2fac10b63a6cc57c;

    /// Domain marker for method hashes.
    pub const METHOD: u64 = 0x7d3c8b4a92e15f6d;
}

/// A deterministic 64-bit hash identifying a class or a method on a class.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct TypeHash(pub u64);

impl TypeHash {
    /// Empty/invalid hash constant.
    pub const EMPTY: TypeHash = TypeHash(0);

    /// Hash a bare class name.
    #[inline]
    pub fn from_name(name: &str) -> Self {
        TypeHash(hash_constants::CLASS ^ xxh64(name.as_bytes(), 0))
    }

    /// Hash a method by owner class and method name.
    #[inline]
    pub fn from_method(owner: TypeHash, name: &str) -> Self {
        let hash = hash_constants::METHOD ^ xxh64(name.as_bytes(), 0);
        TypeHash(hash.wrapping_mul(hash_constants::SEP) ^ owner.0)
    }

    /// Check if this is the empty hash.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }
}

impl fmt::Debug for TypeHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeHash(0x{:016x})", self.0)
    }
}

impl fmt::Display for TypeHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:016x}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn class_hash_is_deterministic() {
        assert_eq!(TypeHash::from_name("Sprite2D"), TypeHash::from_name("Sprite2D"));
    }

    #[test]
    fn method_hash_depends_on_owner() {
        let a = TypeHash::from_method(TypeHash::from_name("Node"), "_ready");
        let b = TypeHash::from_method(TypeHash::from_name("Node2D"), "_ready");
        assert_ne!(a, b);
    }

    #[test]
    fn method_and_class_domains_differ() {
        assert_ne!(
            TypeHash::from_name("_process"),
            TypeHash::from_method(TypeHash::EMPTY, "_process")
        );
    }

    #[test]
    fn empty_hash() {
        assert!(TypeHash::EMPTY.is_empty());
        assert!(!TypeHash::from_name("Object").is_empty());
    }
}
