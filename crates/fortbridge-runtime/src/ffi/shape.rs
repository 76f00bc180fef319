//! Descriptor-backed array marshalling
//!
//! Assumed-shape dummies, allocatables and pointers all cross the boundary
//! as a [`RawArrayDescriptor`]. The marshaller owns the record and, when it
//! bound a value itself, the flattened payload the record points into. The
//! record's base address stays a non-owning reference either way: on
//! release it is forced to null so nothing can follow it into storage that
//! may since have been freed or moved.

use crate::ffi::array::{check_rank, pack_elements, unpack_elements};
use crate::ffi::buffer::CellBuffer;
use crate::ffi::descriptor::RawArrayDescriptor;
use crate::ffi::error::MarshalError;
use crate::ffi::types::{resolve, AtomicLayout, ElemType};
use crate::symbol::VariableDescriptor;
use crate::value::FortValue;
use std::ffi::c_void;

/// Binding lifecycle of an [`AssumedShapeMarshaller`]
///
/// `Released` is terminal; a released marshaller cannot be rebound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindState {
    Unbound,
    Bound,
    Released,
}

/// Non-owning view of the array a descriptor record points at
///
/// Holds the address and decoded shape only. Nothing is copied until
/// [`NativeArrayView::to_value`] is called.
#[derive(Debug)]
pub struct NativeArrayView<'a> {
    record: &'a RawArrayDescriptor,
    layout: AtomicLayout,
    shape: Vec<usize>,
}

impl NativeArrayView<'_> {
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn base_addr(&self) -> *const c_void {
        self.record.base_addr
    }

    /// Copy the viewed elements into an owned value. This is the explicit
    /// copy request; the view itself never owns the memory it describes.
    pub fn to_value(&self) -> Result<FortValue, MarshalError> {
        let buf = unsafe { self.record.copy_elements()? }.ok_or_else(|| {
            MarshalError::InvalidDescriptor("view over an unassociated array".to_string())
        })?;
        unpack_elements(&self.layout, &self.shape, buf.as_slice())
    }
}

/// Marshaller for arrays passed by descriptor record
#[derive(Debug)]
pub struct AssumedShapeMarshaller {
    desc: VariableDescriptor,
    layout: AtomicLayout,
    elem_type: ElemType,
    record: Option<Box<RawArrayDescriptor>>,
    /// Flattened element storage the record points into when this
    /// marshaller bound the value itself
    payload: Option<CellBuffer>,
    state: BindState,
}

impl AssumedShapeMarshaller {
    pub(crate) fn new(desc: VariableDescriptor) -> Result<Self, MarshalError> {
        let layout = resolve(desc.base_type, desc.kind)?;
        let elem_type = ElemType::for_array(desc.base_type)?;
        Ok(Self {
            desc,
            layout,
            elem_type,
            record: None,
            payload: None,
            state: BindState::Unbound,
        })
    }

    pub fn descriptor(&self) -> &VariableDescriptor {
        &self.desc
    }

    pub fn state(&self) -> BindState {
        self.state
    }

    /// The descriptor record handed to the call site, once one exists
    pub fn record(&self) -> Option<&RawArrayDescriptor> {
        self.record.as_deref()
    }

    /// Bind a value, or `None` for an unassociated array.
    ///
    /// An unassociated binding still produces a record with the dtype word
    /// and span populated, since a callee may inspect type metadata on an array
    /// that is not associated. Shape is taken from the value itself, never
    /// validated against the declaration.
    pub fn to_native(&mut self, value: Option<&FortValue>) -> Result<(), MarshalError> {
        if self.state == BindState::Released {
            return Err(MarshalError::Released {
                name: self.desc.name.clone(),
            });
        }
        match value {
            None => {
                self.record = Some(Box::new(RawArrayDescriptor::unset(
                    self.desc.rank,
                    &self.layout,
                    self.elem_type,
                )?));
                self.payload = None;
                self.state = BindState::Unbound;
            }
            Some(value) => {
                check_rank(&self.desc, value)?;
                let mut payload = pack_elements(&self.layout, &self.desc, value)?;
                let record = RawArrayDescriptor::build(
                    &self.layout,
                    self.elem_type,
                    &value.shape(),
                    payload.as_mut_ptr() as *mut c_void,
                )?;
                self.record = Some(Box::new(record));
                self.payload = Some(payload);
                self.state = BindState::Bound;
            }
        }
        Ok(())
    }

    /// Decode the record back into a value, copying the referenced
    /// elements. `Ok(None)` when the array is not associated.
    ///
    /// The record's base address is trusted to still point at live storage
    /// of the described extent; that is the library's guarantee, not this
    /// crate's.
    pub fn from_native(&self) -> Result<Option<FortValue>, MarshalError> {
        let record = self.record.as_deref().ok_or_else(|| MarshalError::Unbound {
            name: self.desc.name.clone(),
        })?;
        let shape = match record.read_shape()? {
            None => return Ok(None),
            Some(shape) => shape,
        };
        let buf = match unsafe { record.copy_elements()? } {
            None => return Ok(None),
            Some(buf) => buf,
        };
        unpack_elements(&self.layout, &shape, buf.as_slice()).map(Some)
    }

    /// Non-owning view of the record's target, without copying elements.
    /// `Ok(None)` when the array is not associated.
    pub fn view(&self) -> Result<Option<NativeArrayView<'_>>, MarshalError> {
        let record = self.record.as_deref().ok_or_else(|| MarshalError::Unbound {
            name: self.desc.name.clone(),
        })?;
        Ok(record.read_shape()?.map(|shape| NativeArrayView {
            record,
            layout: self.layout,
            shape,
        }))
    }

    /// Adopt a descriptor record at a caller-supplied address.
    ///
    /// # Safety
    ///
    /// `addr` must point at a live, properly aligned descriptor record of
    /// this variable's rank or less.
    pub(crate) unsafe fn from_address(&mut self, addr: *const c_void) -> Result<(), MarshalError> {
        if self.state == BindState::Released {
            return Err(MarshalError::Released {
                name: self.desc.name.clone(),
            });
        }
        let record = RawArrayDescriptor::read_from(addr)?;
        self.state = if record.is_unset() {
            BindState::Unbound
        } else {
            BindState::Bound
        };
        self.record = Some(Box::new(record));
        self.payload = None;
        Ok(())
    }

    pub(crate) fn record_ptr(&mut self) -> Option<*mut c_void> {
        self.record
            .as_deref_mut()
            .map(|r| r as *mut RawArrayDescriptor as *mut c_void)
    }

    /// Null the record's base address and retire this marshaller. Terminal:
    /// a released marshaller can never be rebound.
    pub fn release(&mut self) {
        if let Some(record) = self.record.as_deref_mut() {
            record.release();
        }
        self.payload = None;
        self.state = BindState::Released;
    }
}

impl Drop for AssumedShapeMarshaller {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ffi::descriptor::DimTriple;
    use crate::symbol::BaseType;
    use ndarray::arr2;

    fn marshaller(base: BaseType, kind: usize, rank: usize) -> AssumedShapeMarshaller {
        AssumedShapeMarshaller::new(VariableDescriptor::assumed_shape_array(
            "a", "__m_MOD_a", base, kind, rank,
        ))
        .unwrap()
    }

    #[test]
    fn test_character_arrays_rejected_at_selection() {
        let err = AssumedShapeMarshaller::new(VariableDescriptor::assumed_shape_array(
            "a",
            "__m_MOD_a",
            BaseType::Character,
            1,
            1,
        ))
        .unwrap_err();
        assert!(matches!(err, MarshalError::UnsupportedArrayType { .. }));
    }

    #[test]
    fn test_bound_record_matches_contract() {
        let mut m = marshaller(BaseType::Real, 8, 2);
        let value = FortValue::from(arr2(&[[1.0f64, 2.0, 3.0], [4.0, 5.0, 6.0]]).into_dyn());
        m.to_native(Some(&value)).unwrap();
        assert_eq!(m.state(), BindState::Bound);

        let record = m.record().unwrap();
        assert!(!record.is_unset());
        assert_eq!(record.dim[0], DimTriple { stride: 1, lbound: 1, ubound: 2 });
        assert_eq!(record.dim[1], DimTriple { stride: 2, lbound: 1, ubound: 3 });
        assert_eq!(record.offset, -3);
        assert_eq!(record.span, 8);
        assert_eq!(record.dtype.elem_type, ElemType::Real as u8);
    }

    #[test]
    fn test_roundtrip_through_record() {
        let mut m = marshaller(BaseType::Integer, 4, 2);
        let value = FortValue::from(arr2(&[[1i64, 2], [3, 4]]).into_dyn());
        m.to_native(Some(&value)).unwrap();
        assert_eq!(m.from_native().unwrap(), Some(value));
    }

    #[test]
    fn test_unassociated_binding() {
        let mut m = marshaller(BaseType::Real, 8, 2);
        m.to_native(None).unwrap();
        assert_eq!(m.state(), BindState::Unbound);

        let record = m.record().unwrap();
        assert!(record.is_unset());
        assert_eq!(record.dtype.elem_len, 8);
        assert_eq!(record.dtype.rank, 2);
        assert_eq!(record.span, 8);
        assert_eq!(record.dim[0], DimTriple::ZERO);

        // Absent reads back as no value, never a zero-filled array
        assert_eq!(m.from_native().unwrap(), None);
        assert!(m.view().unwrap().is_none());
    }

    #[test]
    fn test_shape_comes_from_value_not_declaration() {
        let mut m = marshaller(BaseType::Integer, 4, 2);
        m.to_native(Some(&FortValue::from(arr2(&[[1i64, 2], [3, 4], [5, 6]]).into_dyn())))
            .unwrap();
        let record = m.record().unwrap();
        assert_eq!(record.read_shape().unwrap(), Some(vec![3, 2]));

        // Rank is still validated
        let flat = FortValue::from(
            ndarray::ArrayD::from_shape_vec(ndarray::IxDyn(&[4]), vec![1i64, 2, 3, 4]).unwrap(),
        );
        assert!(matches!(
            m.to_native(Some(&flat)),
            Err(MarshalError::RankMismatch { .. })
        ));
    }

    #[test]
    fn test_view_is_non_owning() {
        let mut m = marshaller(BaseType::Real, 8, 1);
        let value = FortValue::from(
            ndarray::ArrayD::from_shape_vec(ndarray::IxDyn(&[3]), vec![1.0f64, 2.0, 3.0]).unwrap(),
        );
        m.to_native(Some(&value)).unwrap();

        let view = m.view().unwrap().unwrap();
        assert_eq!(view.shape(), &[3]);
        assert_eq!(view.base_addr(), m.record().unwrap().base_addr as *const _);
        assert_eq!(view.to_value().unwrap(), value);
    }

    #[test]
    fn test_release_nulls_base_address() {
        let mut m = marshaller(BaseType::Real, 8, 1);
        let value = FortValue::from(
            ndarray::ArrayD::from_shape_vec(ndarray::IxDyn(&[2]), vec![1.0f64, 2.0]).unwrap(),
        );
        m.to_native(Some(&value)).unwrap();
        assert!(!m.record().unwrap().is_unset());

        m.release();
        assert_eq!(m.state(), BindState::Released);
        assert!(m.record().unwrap().is_unset());
    }

    #[test]
    fn test_released_is_terminal() {
        let mut m = marshaller(BaseType::Integer, 4, 1);
        m.release();
        let value = FortValue::from(
            ndarray::ArrayD::from_shape_vec(ndarray::IxDyn(&[1]), vec![1i64]).unwrap(),
        );
        assert!(matches!(
            m.to_native(Some(&value)),
            Err(MarshalError::Released { .. })
        ));
        assert!(matches!(
            m.to_native(None),
            Err(MarshalError::Released { .. })
        ));
    }

    #[test]
    fn test_unbound_read_fails() {
        let m = marshaller(BaseType::Integer, 4, 1);
        assert!(matches!(
            m.from_native(),
            Err(MarshalError::Unbound { .. })
        ));
    }
}
