//! Scalar and complex marshallers
//!
//! Both variants own a single backing cell of their atomic layout,
//! allocated on the first value-to-native conversion and reused afterwards.

use crate::ffi::buffer::CellBuffer;
use crate::ffi::error::MarshalError;
use crate::ffi::types::{resolve, AtomicLayout, ElemScalar};
use crate::symbol::VariableDescriptor;
use crate::value::FortValue;

/// Lower a scalar value into its element form, or name the mismatch
pub(crate) fn elem_from_value(
    value: &FortValue,
    expected: &VariableDescriptor,
) -> Result<ElemScalar, MarshalError> {
    match value {
        FortValue::Int(v) => Ok(ElemScalar::Int(*v)),
        FortValue::Real(v) => Ok(ElemScalar::Real(*v)),
        FortValue::Logical(v) => Ok(ElemScalar::Logical(*v)),
        FortValue::Complex(v) => Ok(ElemScalar::Complex(*v)),
        other => Err(MarshalError::TypeMismatch {
            expected: expected.type_spec(),
            got: other.type_name().to_string(),
        }),
    }
}

pub(crate) fn value_from_elem(elem: ElemScalar) -> FortValue {
    match elem {
        ElemScalar::Int(v) => FortValue::Int(v),
        ElemScalar::Real(v) => FortValue::Real(v),
        ElemScalar::Logical(v) => FortValue::Logical(v),
        ElemScalar::Complex(v) => FortValue::Complex(v),
    }
}

/// Marshaller for scalar integers, reals and logicals
#[derive(Debug)]
pub struct ScalarMarshaller {
    desc: VariableDescriptor,
    layout: AtomicLayout,
    cell: Option<CellBuffer>,
}

impl ScalarMarshaller {
    pub(crate) fn new(desc: VariableDescriptor) -> Result<Self, MarshalError> {
        let layout = resolve(desc.base_type, desc.kind)?;
        Ok(Self {
            desc,
            layout,
            cell: None,
        })
    }

    pub fn descriptor(&self) -> &VariableDescriptor {
        &self.desc
    }

    /// Byte width of the backing cell
    pub fn sizeof(&self) -> usize {
        self.layout.width
    }

    pub fn to_native(&mut self, value: &FortValue) -> Result<(), MarshalError> {
        let elem = elem_from_value(value, &self.desc)?;
        // Write into a fresh cell and commit only on success, so a failed
        // conversion never leaves a half-populated cell behind.
        let mut cell = CellBuffer::zeroed(self.layout.width);
        self.layout.write_element(cell.as_mut_slice(), elem)?;
        self.cell = Some(cell);
        Ok(())
    }

    pub fn from_native(&self) -> Result<FortValue, MarshalError> {
        let cell = self.cell.as_ref().ok_or_else(|| MarshalError::Unbound {
            name: self.desc.name.clone(),
        })?;
        let elem = self.layout.read_element(cell.as_slice())?;
        Ok(value_from_elem(elem))
    }

    pub(crate) fn clear(&mut self) {
        self.cell = None;
    }

    pub(crate) fn cell_ptr(&mut self) -> Option<*mut u8> {
        self.cell.as_mut().map(|c| c.as_mut_ptr())
    }

    /// Adopt the cell at a caller-supplied address.
    ///
    /// # Safety
    ///
    /// `addr` must be valid for reads of the layout's width.
    pub(crate) unsafe fn from_address(&mut self, addr: *const u8) {
        self.cell = Some(CellBuffer::copy_from(addr, self.layout.width));
    }
}

/// Marshaller for complex scalars
///
/// Identical cell mechanics to [`ScalarMarshaller`]; the element codec
/// writes the `real`/`imag` pair contiguously.
#[derive(Debug)]
pub struct ComplexMarshaller {
    desc: VariableDescriptor,
    layout: AtomicLayout,
    cell: Option<CellBuffer>,
}

impl ComplexMarshaller {
    pub(crate) fn new(desc: VariableDescriptor) -> Result<Self, MarshalError> {
        let layout = resolve(desc.base_type, desc.kind)?;
        Ok(Self {
            desc,
            layout,
            cell: None,
        })
    }

    pub fn descriptor(&self) -> &VariableDescriptor {
        &self.desc
    }

    pub fn sizeof(&self) -> usize {
        self.layout.width
    }

    pub fn to_native(&mut self, value: &FortValue) -> Result<(), MarshalError> {
        let elem = elem_from_value(value, &self.desc)?;
        let mut cell = CellBuffer::zeroed(self.layout.width);
        self.layout.write_element(cell.as_mut_slice(), elem)?;
        self.cell = Some(cell);
        Ok(())
    }

    pub fn from_native(&self) -> Result<FortValue, MarshalError> {
        let cell = self.cell.as_ref().ok_or_else(|| MarshalError::Unbound {
            name: self.desc.name.clone(),
        })?;
        let elem = self.layout.read_element(cell.as_slice())?;
        Ok(value_from_elem(elem))
    }

    pub(crate) fn clear(&mut self) {
        self.cell = None;
    }

    pub(crate) fn cell_ptr(&mut self) -> Option<*mut u8> {
        self.cell.as_mut().map(|c| c.as_mut_ptr())
    }

    /// # Safety
    ///
    /// `addr` must be valid for reads of the layout's width.
    pub(crate) unsafe fn from_address(&mut self, addr: *const u8) {
        self.cell = Some(CellBuffer::copy_from(addr, self.layout.width));
    }
}
