//! Error types for value marshaling.
//!
//! Every fallible conversion in this crate reports a [`VariantError`]. These are
//! the "type mismatch" class of failures: recoverable by the caller, never
//! silently coerced.

use thiserror::Error;

use crate::variant::VariantType;

// ============================================================================
// Variant Errors
// ============================================================================

/// Errors raised while decoding or storing Variants.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VariantError {
    /// The Variant's tag does not match the requested target type.
    #[error("type mismatch: expected {expected:?}, got {actual:?}")]
    TypeMismatch {
        /// Tag required by the target type.
        expected: VariantType,
        /// Tag actually carried by the Variant.
        actual: VariantType,
    },

    /// A typed collection refused an element of the wrong type.
    #[error("element type mismatch: collection holds {expected}, got {actual}")]
    ElementTypeMismatch {
        /// Element type recorded by the collection.
        expected: String,
        /// Description of the rejected element.
        actual: String,
    },

    /// An integer Variant does not fit the requested integer width.
    #[error("integer {value} does not fit in {target_type}")]
    IntegerOverflow {
        /// The out-of-range value.
        value: i64,
        /// Name of the requested Rust type.
        target_type: &'static str,
    },

    /// A raw tag outside the host's fixed tag set.
    #[error("unknown variant type tag {0}")]
    UnknownVariantType(u32),

    /// Indexed access past the end of a collection.
    #[error("index {index} out of bounds for length {len}")]
    IndexOutOfBounds {
        /// Requested index.
        index: usize,
        /// Collection length at the time of access.
        len: usize,
    },

    /// The collection was made read-only.
    #[error("collection is read-only")]
    ReadOnly,

    /// Free-form failure, used by the serde encoder.
    #[error("{0}")]
    Custom(String),
}

impl VariantError {
    /// Shorthand for a tag mismatch.
    pub fn mismatch(expected: VariantType, actual: VariantType) -> Self {
        VariantError::TypeMismatch { expected, actual }
    }
}

impl serde::ser::Error for VariantError {
    fn custom<T: std::fmt::Display>(msg: T) -> Self {
        VariantError::Custom(msg.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_mismatch_display() {
        let err = VariantError::mismatch(VariantType::Int, VariantType::String);
        assert_eq!(err.to_string(), "type mismatch: expected Int, got String");
    }

    #[test]
    fn overflow_display() {
        let err = VariantError::IntegerOverflow {
            value: 300,
            target_type: "u8",
        };
        assert_eq!(err.to_string(), "integer 300 does not fit in u8");
    }
}
