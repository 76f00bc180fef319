//! Fortbridge Runtime - gfortran marshalling core
//!
//! This library converts values between an in-process representation and
//! the runtime representations gfortran-compiled code uses across a shared
//! library boundary:
//! - Scalar numerics, logicals and complex numbers
//! - Fixed- and deferred-length character strings
//! - Explicit-shape and assumed-size flat array buffers
//! - Dynamic array descriptor records (assumed-shape, allocatable, pointer)
//!
//! Module metadata parsing, symbol resolution and call construction live in
//! the layers above; this crate begins at a [`symbol::VariableDescriptor`]
//! and ends at bytes a foreign call site can use.

/// Fortbridge runtime version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod ffi;
pub mod symbol;
pub mod value;

// Re-export commonly used types
pub use ffi::{MarshalError, Marshaller, NamedConstant};
pub use symbol::{BaseType, StorageFlags, VariableDescriptor};
pub use value::FortValue;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_smoke() {
        // Smoke test to verify the crate builds and tests run
        assert_eq!(VERSION, "0.1.0");
    }
}
