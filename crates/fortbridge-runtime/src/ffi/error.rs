//! Marshalling error types

use thiserror::Error;

/// Errors raised while converting values across the Fortran boundary
///
/// Every error is fatal for the single conversion that raised it; nothing
/// is retried and no partially written backing cell is kept.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum MarshalError {
    /// No layout exists for this (type, kind) pair
    #[error("type {base} with kind={kind} is not supported")]
    UnsupportedType { base: String, kind: usize },

    /// A layout exists but value access through it is deliberately rejected
    /// (quad-precision reals/complex, derived types)
    #[error("{0} not supported yet")]
    NotImplemented(String),

    /// The element base type has no array descriptor type tag
    #[error("array of type {base} has no descriptor type tag")]
    UnsupportedArrayType { base: String },

    /// The descriptor's storage-class flags match no known array variant
    #[error("variable '{name}' has an unknown array storage class")]
    UnknownArrayStorage { name: String },

    #[error("wrong number of dimensions, got {actual} expected {expected}")]
    RankMismatch { expected: usize, actual: usize },

    #[error("wrong shape, got {actual:?} expected {expected:?}")]
    ShapeMismatch { expected: Vec<usize>, actual: Vec<usize> },

    #[error("type mismatch: expected {expected}, got {got}")]
    TypeMismatch { expected: String, got: String },

    /// Integer does not fit the declared kind
    #[error("value {value} out of range for {target}")]
    OutOfRange { value: i64, target: &'static str },

    #[error("invalid string: {0}")]
    InvalidString(String),

    /// No value was supplied for a variable that is not optional
    #[error("no value supplied for non-optional variable '{name}'")]
    AbsentValue { name: String },

    /// The marshaller has no native cell to read back from
    #[error("variable '{name}' has no bound native value")]
    Unbound { name: String },

    /// The marshaller released its descriptor and cannot be rebound
    #[error("marshaller for '{name}' was released")]
    Released { name: String },

    /// Named constants cannot be assigned
    #[error("parameter '{name}' cannot be altered")]
    ImmutableConstant { name: String },

    /// A descriptor record read back from the library is not decodable
    #[error("invalid array descriptor: {0}")]
    InvalidDescriptor(String),

    /// The variable's mangled name was not found in the library
    #[error("symbol '{symbol}' not found in library")]
    SymbolNotFound { symbol: String },
}
