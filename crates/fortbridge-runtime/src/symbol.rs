//! Variable descriptors parsed from gfortran module metadata
//!
//! A [`VariableDescriptor`] is the read-only input to marshaller selection:
//! it records what the compiler knows about a variable at compile time
//! (base type, kind, rank, declared shape, storage class). Descriptors are
//! produced by the module-file parser, which lives outside this crate.

use serde::{Deserialize, Serialize};

/// Fortran base type tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BaseType {
    Integer,
    Real,
    Logical,
    Character,
    Complex,
    Derived,
}

impl BaseType {
    /// Get a human-readable name for this type, as it appears in source
    pub fn display_name(&self) -> &'static str {
        match self {
            BaseType::Integer => "INTEGER",
            BaseType::Real => "REAL",
            BaseType::Logical => "LOGICAL",
            BaseType::Character => "CHARACTER",
            BaseType::Complex => "COMPLEX",
            BaseType::Derived => "TYPE",
        }
    }
}

/// Storage-class and attribute flags for a variable
///
/// These mirror the attribute bits the compiler records for each symbol.
/// The flags are not mutually exclusive in the module format, so they are
/// kept as independent booleans; [`VariableDescriptor`] interprets them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageFlags {
    /// Array with compile-time bounds, e.g. `dimension(2,3)`
    pub explicit_shape: bool,
    /// Array declared `dimension(*)`, sized only by the caller
    pub assumed_size: bool,
    /// Array declared `dimension(:)`, passed by descriptor
    pub assumed_shape: bool,
    pub allocatable: bool,
    pub pointer: bool,
    /// Dummy (procedure) argument rather than a module variable
    pub dummy: bool,
    pub optional: bool,
    /// `character(len=:)`, length resolved from the assigned value
    pub deferred_len: bool,
}

/// Compile-time description of a single Fortran variable
///
/// # Example
///
/// ```
/// use fortbridge_runtime::symbol::{BaseType, VariableDescriptor};
///
/// let desc = VariableDescriptor::scalar("x", "__mod_MOD_x", BaseType::Real, 8);
/// assert_eq!(desc.type_kind(), (BaseType::Real, 8));
/// assert!(!desc.is_array());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableDescriptor {
    /// Source-level name
    pub name: String,
    /// Linker symbol name, e.g. `__mymod_MOD_myvar`
    pub mangled_name: String,
    /// Defining module, if any
    pub module: Option<String>,
    pub base_type: BaseType,
    /// Byte width of the base component ("kind")
    pub kind: usize,
    /// Number of dimensions; 0 for scalars
    pub rank: usize,
    /// Declared extent per dimension. `None` entries are bounds the
    /// compiler does not know (deferred or assumed).
    pub shape: Vec<Option<usize>>,
    /// Declared character length for fixed-length strings
    pub strlen: Option<usize>,
    pub flags: StorageFlags,
}

impl VariableDescriptor {
    /// Descriptor for a scalar variable
    pub fn scalar(
        name: impl Into<String>,
        mangled_name: impl Into<String>,
        base_type: BaseType,
        kind: usize,
    ) -> Self {
        Self {
            name: name.into(),
            mangled_name: mangled_name.into(),
            module: None,
            base_type,
            kind,
            rank: 0,
            shape: Vec::new(),
            strlen: None,
            flags: StorageFlags::default(),
        }
    }

    /// Descriptor for a fixed-length character variable
    pub fn character(
        name: impl Into<String>,
        mangled_name: impl Into<String>,
        strlen: usize,
    ) -> Self {
        let mut desc = Self::scalar(name, mangled_name, BaseType::Character, 1);
        desc.strlen = Some(strlen);
        desc
    }

    /// Descriptor for a deferred-length character variable
    pub fn deferred_character(name: impl Into<String>, mangled_name: impl Into<String>) -> Self {
        let mut desc = Self::scalar(name, mangled_name, BaseType::Character, 1);
        desc.flags.deferred_len = true;
        desc
    }

    /// Descriptor for an explicit-shape array
    pub fn explicit_array(
        name: impl Into<String>,
        mangled_name: impl Into<String>,
        base_type: BaseType,
        kind: usize,
        shape: &[usize],
    ) -> Self {
        let mut desc = Self::scalar(name, mangled_name, base_type, kind);
        desc.rank = shape.len();
        desc.shape = shape.iter().map(|&e| Some(e)).collect();
        desc.flags.explicit_shape = true;
        desc
    }

    /// Descriptor for an assumed-size array (`dimension(*)`)
    pub fn assumed_size_array(
        name: impl Into<String>,
        mangled_name: impl Into<String>,
        base_type: BaseType,
        kind: usize,
        rank: usize,
    ) -> Self {
        let mut desc = Self::scalar(name, mangled_name, base_type, kind);
        desc.rank = rank;
        desc.shape = vec![None; rank];
        desc.flags.assumed_size = true;
        desc.flags.dummy = true;
        desc
    }

    /// Descriptor for an assumed-shape array (`dimension(:)`)
    pub fn assumed_shape_array(
        name: impl Into<String>,
        mangled_name: impl Into<String>,
        base_type: BaseType,
        kind: usize,
        rank: usize,
    ) -> Self {
        let mut desc = Self::scalar(name, mangled_name, base_type, kind);
        desc.rank = rank;
        desc.shape = vec![None; rank];
        desc.flags.assumed_shape = true;
        desc.flags.dummy = true;
        desc
    }

    /// Mark the variable allocatable
    pub fn with_allocatable(mut self) -> Self {
        self.flags.allocatable = true;
        self
    }

    /// Mark the variable a pointer
    pub fn with_pointer(mut self) -> Self {
        self.flags.pointer = true;
        self
    }

    /// Mark the variable an optional dummy argument
    pub fn with_optional(mut self) -> Self {
        self.flags.optional = true;
        self.flags.dummy = true;
        self
    }

    /// Record the defining module
    pub fn with_module(mut self, module: impl Into<String>) -> Self {
        self.module = Some(module.into());
        self
    }

    /// The (base type, kind) pair this variable resolves layout with
    pub fn type_kind(&self) -> (BaseType, usize) {
        (self.base_type, self.kind)
    }

    pub fn ndim(&self) -> usize {
        self.rank
    }

    /// Declared shape, if every extent is known at compile time
    pub fn known_shape(&self) -> Option<Vec<usize>> {
        self.shape.iter().copied().collect()
    }

    /// Total declared element count, if the shape is fully known
    pub fn declared_size(&self) -> Option<usize> {
        self.known_shape().map(|s| s.iter().product())
    }

    pub fn is_array(&self) -> bool {
        self.rank > 0
    }

    pub fn is_explicit(&self) -> bool {
        self.flags.explicit_shape
    }

    pub fn is_assumed_size(&self) -> bool {
        self.flags.assumed_size
    }

    pub fn is_assumed_shape(&self) -> bool {
        self.flags.assumed_shape
    }

    pub fn is_allocatable(&self) -> bool {
        self.flags.allocatable
    }

    pub fn is_pointer(&self) -> bool {
        self.flags.pointer
    }

    pub fn is_dummy(&self) -> bool {
        self.flags.dummy
    }

    pub fn is_optional(&self) -> bool {
        self.flags.optional
    }

    pub fn is_char(&self) -> bool {
        self.base_type == BaseType::Character
    }

    pub fn is_deferred_len(&self) -> bool {
        self.flags.deferred_len
    }

    pub fn is_complex(&self) -> bool {
        self.base_type == BaseType::Complex
    }

    pub fn is_derived(&self) -> bool {
        self.base_type == BaseType::Derived
    }

    /// Source-style type spec, e.g. `REAL(KIND=8)` or `CHARACTER(LEN=3)`
    pub fn type_spec(&self) -> String {
        match self.base_type {
            BaseType::Integer | BaseType::Real | BaseType::Complex => {
                format!("{}(KIND={})", self.base_type.display_name(), self.kind)
            }
            BaseType::Logical => self.base_type.display_name().to_string(),
            BaseType::Character => match self.strlen {
                Some(len) if !self.flags.deferred_len => format!("CHARACTER(LEN={})", len),
                _ => "CHARACTER(LEN=:)".to_string(),
            },
            BaseType::Derived => self.base_type.display_name().to_string(),
        }
    }
}
