//! Marshaller selection and dispatch
//!
//! [`Marshaller`] is a closed union over the six conversion strategies plus
//! the derived-type stub. Exactly one variant is chosen per variable, once,
//! at bind time, from the descriptor's storage classification. Selection is
//! total: every classification either maps to a variant or fails loudly;
//! nothing falls through to a default.

use crate::ffi::array::{AssumedSizeArrayMarshaller, ExplicitArrayMarshaller};
use crate::ffi::error::MarshalError;
use crate::ffi::scalar::{ComplexMarshaller, ScalarMarshaller};
use crate::ffi::shape::AssumedShapeMarshaller;
use crate::ffi::strings::StringMarshaller;
use crate::symbol::VariableDescriptor;
use crate::value::FortValue;
use std::ffi::c_void;
use std::ptr;

/// Placeholder for derived-type variables
///
/// Field-by-field marshalling of derived types needs per-field layout
/// resolution that does not exist yet; every operation reports that rather
/// than guessing at a record layout.
#[derive(Debug)]
pub struct DerivedTypeMarshaller {
    desc: VariableDescriptor,
}

impl DerivedTypeMarshaller {
    pub(crate) fn new(desc: VariableDescriptor) -> Self {
        Self { desc }
    }

    pub fn descriptor(&self) -> &VariableDescriptor {
        &self.desc
    }

    pub(crate) fn unsupported(&self) -> MarshalError {
        MarshalError::NotImplemented(format!("derived type variable '{}'", self.desc.name))
    }
}

/// A named constant (`parameter`): readable, never assignable
///
/// # Example
///
/// ```
/// use fortbridge_runtime::ffi::marshal::NamedConstant;
/// use fortbridge_runtime::symbol::{BaseType, VariableDescriptor};
/// use fortbridge_runtime::value::FortValue;
///
/// let desc = VariableDescriptor::scalar("pi_digits", "__m_MOD_pi_digits", BaseType::Integer, 4);
/// let mut constant = NamedConstant::new(desc, FortValue::Int(314159));
/// assert_eq!(constant.value(), &FortValue::Int(314159));
/// assert!(constant.set_value(FortValue::Int(3)).is_err());
/// ```
#[derive(Debug, Clone)]
pub struct NamedConstant {
    desc: VariableDescriptor,
    value: FortValue,
}

impl NamedConstant {
    pub fn new(desc: VariableDescriptor, value: FortValue) -> Self {
        Self { desc, value }
    }

    pub fn name(&self) -> &str {
        &self.desc.name
    }

    pub fn descriptor(&self) -> &VariableDescriptor {
        &self.desc
    }

    pub fn value(&self) -> &FortValue {
        &self.value
    }

    /// Constants are fixed at compile time; assignment always fails
    pub fn set_value(&mut self, _value: FortValue) -> Result<(), MarshalError> {
        Err(MarshalError::ImmutableConstant {
            name: self.desc.name.clone(),
        })
    }
}

/// One marshalling strategy, selected per variable at bind time
#[derive(Debug)]
pub enum Marshaller {
    Scalar(ScalarMarshaller),
    Complex(ComplexMarshaller),
    String(StringMarshaller),
    ExplicitArray(ExplicitArrayMarshaller),
    AssumedSizeArray(AssumedSizeArrayMarshaller),
    AssumedShapeArray(AssumedShapeMarshaller),
    DerivedType(DerivedTypeMarshaller),
}

impl Marshaller {
    /// Choose the marshalling strategy for a variable
    ///
    /// Assumed-shape, allocatable and pointer arrays all share the
    /// descriptor-record strategy. Array storage classes outside the known
    /// set are an error, not a fallback.
    pub fn select(desc: &VariableDescriptor) -> Result<Self, MarshalError> {
        if desc.is_derived() {
            return Ok(Marshaller::DerivedType(DerivedTypeMarshaller::new(
                desc.clone(),
            )));
        }
        if desc.is_array() {
            if desc.is_explicit() {
                Ok(Marshaller::ExplicitArray(ExplicitArrayMarshaller::new(
                    desc.clone(),
                )?))
            } else if desc.is_assumed_size() {
                Ok(Marshaller::AssumedSizeArray(AssumedSizeArrayMarshaller::new(
                    desc.clone(),
                )?))
            } else if desc.is_assumed_shape() || desc.is_allocatable() || desc.is_pointer() {
                Ok(Marshaller::AssumedShapeArray(AssumedShapeMarshaller::new(
                    desc.clone(),
                )?))
            } else {
                Err(MarshalError::UnknownArrayStorage {
                    name: desc.name.clone(),
                })
            }
        } else if desc.is_char() {
            Ok(Marshaller::String(StringMarshaller::new(desc.clone())))
        } else if desc.is_complex() {
            Ok(Marshaller::Complex(ComplexMarshaller::new(desc.clone())?))
        } else {
            Ok(Marshaller::Scalar(ScalarMarshaller::new(desc.clone())?))
        }
    }

    pub fn descriptor(&self) -> &VariableDescriptor {
        match self {
            Marshaller::Scalar(m) => m.descriptor(),
            Marshaller::Complex(m) => m.descriptor(),
            Marshaller::String(m) => m.descriptor(),
            Marshaller::ExplicitArray(m) => m.descriptor(),
            Marshaller::AssumedSizeArray(m) => m.descriptor(),
            Marshaller::AssumedShapeArray(m) => m.descriptor(),
            Marshaller::DerivedType(m) => m.descriptor(),
        }
    }

    pub fn name(&self) -> &str {
        &self.descriptor().name
    }

    /// Convert a value into its native representation, `None` standing for
    /// an absent value.
    ///
    /// Absent is valid for descriptor-backed arrays (unassociated) and for
    /// optional dummies (the argument slot becomes null); for anything else
    /// it is an error.
    pub fn to_native(&mut self, value: Option<&FortValue>) -> Result<(), MarshalError> {
        match self {
            Marshaller::AssumedShapeArray(m) => m.to_native(value),
            Marshaller::DerivedType(m) => Err(m.unsupported()),
            _ => match value {
                Some(value) => match self {
                    Marshaller::Scalar(m) => m.to_native(value),
                    Marshaller::Complex(m) => m.to_native(value),
                    Marshaller::String(m) => m.to_native(value),
                    Marshaller::ExplicitArray(m) => m.to_native(value),
                    Marshaller::AssumedSizeArray(m) => m.to_native(value),
                    // Handled above
                    Marshaller::AssumedShapeArray(_) | Marshaller::DerivedType(_) => {
                        unreachable!()
                    }
                },
                None => {
                    if self.descriptor().is_optional() {
                        self.clear();
                        Ok(())
                    } else {
                        Err(MarshalError::AbsentValue {
                            name: self.name().to_string(),
                        })
                    }
                }
            },
        }
    }

    /// Read the native representation back into a value
    ///
    /// `Ok(None)` means absent: an unassociated descriptor-backed array, or
    /// an optional dummy that was never given a value.
    pub fn from_native(&self) -> Result<Option<FortValue>, MarshalError> {
        let optional = self.descriptor().is_optional();
        match self {
            Marshaller::Scalar(m) => lift(m.from_native(), optional),
            Marshaller::Complex(m) => lift(m.from_native(), optional),
            Marshaller::String(m) => lift(m.from_native(), optional),
            Marshaller::ExplicitArray(m) => lift(m.from_native(), optional),
            Marshaller::AssumedSizeArray(m) => lift(m.from_native(), optional),
            Marshaller::AssumedShapeArray(m) => m.from_native(),
            Marshaller::DerivedType(m) => Err(m.unsupported()),
        }
    }

    /// Address of the native argument for the call site: the backing cell,
    /// the descriptor record, or null for an absent optional.
    pub fn arg_ptr(&mut self) -> Result<*mut c_void, MarshalError> {
        let optional = self.descriptor().is_optional();
        let name = self.name().to_string();
        let ptr = match self {
            Marshaller::Scalar(m) => m.cell_ptr().map(|p| p as *mut c_void),
            Marshaller::Complex(m) => m.cell_ptr().map(|p| p as *mut c_void),
            Marshaller::String(m) => m.cell_ptr().map(|p| p as *mut c_void),
            Marshaller::ExplicitArray(m) => m.cell_ptr().map(|p| p as *mut c_void),
            Marshaller::AssumedSizeArray(m) => m.cell_ptr().map(|p| p as *mut c_void),
            Marshaller::AssumedShapeArray(m) => m.record_ptr(),
            Marshaller::DerivedType(m) => return Err(m.unsupported()),
        };
        match ptr {
            Some(ptr) => Ok(ptr),
            None if optional => Ok(ptr::null_mut()),
            None => Err(MarshalError::Unbound { name }),
        }
    }

    /// The hidden trailing argument some variables carry: character length
    /// or assumed-size element count
    pub fn hidden_len(&self) -> Option<i64> {
        match self {
            Marshaller::String(m) => m.hidden_len(),
            Marshaller::AssumedSizeArray(m) => m.hidden_len(),
            _ => None,
        }
    }

    /// Adopt the native representation at a caller-supplied address.
    ///
    /// # Safety
    ///
    /// `addr` must point at live, properly aligned storage of this
    /// variable's native representation.
    pub unsafe fn from_address(&mut self, addr: *const c_void) -> Result<(), MarshalError> {
        match self {
            Marshaller::Scalar(m) => {
                m.from_address(addr as *const u8);
                Ok(())
            }
            Marshaller::Complex(m) => {
                m.from_address(addr as *const u8);
                Ok(())
            }
            Marshaller::String(m) => m.from_address(addr as *const u8),
            Marshaller::ExplicitArray(m) => {
                m.from_address(addr as *const u8);
                Ok(())
            }
            Marshaller::AssumedSizeArray(m) => m.from_address(addr as *const u8),
            Marshaller::AssumedShapeArray(m) => m.from_address(addr),
            Marshaller::DerivedType(m) => Err(m.unsupported()),
        }
    }

    /// Locate this variable's storage in an already-loaded library by its
    /// mangled name and adopt it.
    ///
    /// The symbol's address and the descriptor's layout are trusted the way
    /// the library's own compiled code trusts them.
    pub fn in_dll(&mut self, lib: &libloading::Library) -> Result<(), MarshalError> {
        let mangled = self.descriptor().mangled_name.clone();
        let addr: *mut c_void = unsafe {
            let symbol = lib
                .get::<*mut c_void>(mangled.as_bytes())
                .map_err(|_| MarshalError::SymbolNotFound {
                    symbol: mangled.clone(),
                })?;
            *symbol
        };
        unsafe { self.from_address(addr as *const c_void) }
    }

    fn clear(&mut self) {
        match self {
            Marshaller::Scalar(m) => m.clear(),
            Marshaller::Complex(m) => m.clear(),
            Marshaller::String(m) => m.clear(),
            Marshaller::ExplicitArray(m) => m.clear(),
            Marshaller::AssumedSizeArray(m) => m.clear(),
            // Assumed-shape absence goes through its own to_native(None)
            Marshaller::AssumedShapeArray(_) | Marshaller::DerivedType(_) => {}
        }
    }
}

fn lift(
    result: Result<FortValue, MarshalError>,
    optional: bool,
) -> Result<Option<FortValue>, MarshalError> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(MarshalError::Unbound { .. }) if optional => Ok(None),
        Err(e) => Err(e),
    }
}
