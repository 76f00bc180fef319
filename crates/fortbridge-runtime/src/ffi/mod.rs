//! Foreign data marshalling for gfortran shared libraries
//!
//! Converts between in-process values and the binary representations
//! gfortran-compiled code expects at a call boundary:
//! - Atomic layouts per (type, kind) pair
//! - Backing cells and flat column-major array buffers
//! - Dynamic array descriptor records, built byte-for-byte
//! - One marshaller variant per storage class, chosen by [`Marshaller::select`]
//!
//! # Safety
//!
//! Crossing a shared-library boundary involves `unsafe` code and raw
//! addresses into memory this crate does not own. All unsafe code is
//! isolated in this module behind safe wrappers; the non-owning addresses
//! (descriptor base pointers) are nulled when their marshaller is released.

pub mod array;
pub mod buffer;
pub mod descriptor;
pub mod error;
pub mod marshal;
pub mod scalar;
pub mod shape;
pub mod strings;
pub mod types;

pub use buffer::CellBuffer;
pub use descriptor::{DimTriple, DtypeWord, RawArrayDescriptor, MAX_RANK};
pub use error::MarshalError;
pub use marshal::{Marshaller, NamedConstant};
pub use shape::{AssumedShapeMarshaller, BindState, NativeArrayView};
pub use types::{resolve, AtomicLayout, CellKind, ElemType};
