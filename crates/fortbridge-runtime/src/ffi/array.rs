//! Flat-buffer array marshalling
//!
//! Explicit-shape and assumed-size arrays cross the boundary as a bare
//! contiguous buffer in column-major order, no descriptor record. The two
//! variants differ only in where the element count comes from: the
//! declaration (explicit) or the bound value (assumed size).

use crate::ffi::buffer::CellBuffer;
use crate::ffi::error::MarshalError;
use crate::ffi::types::{resolve, AtomicLayout, CellKind, ElemScalar};
use crate::symbol::VariableDescriptor;
use crate::value::FortValue;
use ndarray::{ArrayD, IxDyn, ShapeBuilder};
use num_complex::Complex64;

/// Validate that the value is an array of the declared rank
pub(crate) fn check_rank(
    desc: &VariableDescriptor,
    value: &FortValue,
) -> Result<(), MarshalError> {
    if !value.is_array() {
        return Err(MarshalError::TypeMismatch {
            expected: format!("{} array", desc.type_spec()),
            got: value.type_name().to_string(),
        });
    }
    if value.ndim() != desc.rank {
        return Err(MarshalError::RankMismatch {
            expected: desc.rank,
            actual: value.ndim(),
        });
    }
    Ok(())
}

/// Flatten an array value into a fresh buffer, fastest dimension first,
/// converting each element to the declared layout
pub(crate) fn pack_elements(
    layout: &AtomicLayout,
    desc: &VariableDescriptor,
    value: &FortValue,
) -> Result<CellBuffer, MarshalError> {
    let width = layout.width;
    let mut buf = CellBuffer::zeroed(value.len() * width);
    let bytes = buf.as_mut_slice();

    // Iterating the reversed-axes view walks the original array in
    // column-major order regardless of its in-memory layout.
    match value {
        FortValue::IntArray(a) => {
            for (i, v) in a.t().iter().enumerate() {
                layout.write_element(&mut bytes[i * width..(i + 1) * width], ElemScalar::Int(*v))?;
            }
        }
        FortValue::RealArray(a) => {
            for (i, v) in a.t().iter().enumerate() {
                layout
                    .write_element(&mut bytes[i * width..(i + 1) * width], ElemScalar::Real(*v))?;
            }
        }
        FortValue::LogicalArray(a) => {
            for (i, v) in a.t().iter().enumerate() {
                layout.write_element(
                    &mut bytes[i * width..(i + 1) * width],
                    ElemScalar::Logical(*v),
                )?;
            }
        }
        FortValue::ComplexArray(a) => {
            for (i, v) in a.t().iter().enumerate() {
                layout.write_element(
                    &mut bytes[i * width..(i + 1) * width],
                    ElemScalar::Complex(*v),
                )?;
            }
        }
        other => {
            return Err(MarshalError::TypeMismatch {
                expected: format!("{} array", desc.type_spec()),
                got: other.type_name().to_string(),
            })
        }
    }
    Ok(buf)
}

/// Rebuild an array value from a column-major buffer of the given shape
pub(crate) fn unpack_elements(
    layout: &AtomicLayout,
    shape: &[usize],
    bytes: &[u8],
) -> Result<FortValue, MarshalError> {
    let width = layout.width;
    let count: usize = shape.iter().product();

    let mut elems = Vec::with_capacity(count);
    for i in 0..count {
        elems.push(layout.read_element(&bytes[i * width..(i + 1) * width])?);
    }

    match layout.cell {
        CellKind::Int => {
            let mut data = Vec::with_capacity(count);
            for e in elems {
                data.push(int_elem(e)?);
            }
            Ok(FortValue::IntArray(to_array(shape, data)?))
        }
        CellKind::Real => {
            let mut data = Vec::with_capacity(count);
            for e in elems {
                data.push(real_elem(e)?);
            }
            Ok(FortValue::RealArray(to_array(shape, data)?))
        }
        CellKind::Logical => {
            let mut data = Vec::with_capacity(count);
            for e in elems {
                data.push(logical_elem(e)?);
            }
            Ok(FortValue::LogicalArray(to_array(shape, data)?))
        }
        CellKind::ComplexPair => {
            let mut data = Vec::with_capacity(count);
            for e in elems {
                data.push(complex_elem(e)?);
            }
            Ok(FortValue::ComplexArray(to_array(shape, data)?))
        }
        CellKind::CharCell | CellKind::Opaque | CellKind::OpaquePair => {
            Err(MarshalError::UnsupportedArrayType {
                base: layout.base.display_name().to_string(),
            })
        }
    }
}

fn to_array<T>(shape: &[usize], data: Vec<T>) -> Result<ArrayD<T>, MarshalError> {
    ArrayD::from_shape_vec(IxDyn(shape).f(), data)
        .map_err(|e| MarshalError::InvalidDescriptor(e.to_string()))
}

fn decoded_mismatch(got: ElemScalar) -> MarshalError {
    MarshalError::InvalidDescriptor(format!("decoded element {:?} does not match the layout", got))
}

fn int_elem(e: ElemScalar) -> Result<i64, MarshalError> {
    match e {
        ElemScalar::Int(v) => Ok(v),
        other => Err(decoded_mismatch(other)),
    }
}

fn real_elem(e: ElemScalar) -> Result<f64, MarshalError> {
    match e {
        ElemScalar::Real(v) => Ok(v),
        other => Err(decoded_mismatch(other)),
    }
}

fn logical_elem(e: ElemScalar) -> Result<bool, MarshalError> {
    match e {
        ElemScalar::Logical(v) => Ok(v),
        other => Err(decoded_mismatch(other)),
    }
}

fn complex_elem(e: ElemScalar) -> Result<Complex64, MarshalError> {
    match e {
        ElemScalar::Complex(v) => Ok(v),
        other => Err(decoded_mismatch(other)),
    }
}

/// Marshaller for arrays with compile-time bounds
#[derive(Debug)]
pub struct ExplicitArrayMarshaller {
    desc: VariableDescriptor,
    layout: AtomicLayout,
    shape: Vec<usize>,
    buf: Option<CellBuffer>,
}

impl ExplicitArrayMarshaller {
    pub(crate) fn new(desc: VariableDescriptor) -> Result<Self, MarshalError> {
        let layout = resolve(desc.base_type, desc.kind)?;
        let shape = desc.known_shape().ok_or_else(|| {
            MarshalError::InvalidDescriptor(format!(
                "explicit-shape array '{}' has unknown extents",
                desc.name
            ))
        })?;
        Ok(Self {
            desc,
            layout,
            shape,
            buf: None,
        })
    }

    pub fn descriptor(&self) -> &VariableDescriptor {
        &self.desc
    }

    /// Declared element count
    pub fn size(&self) -> usize {
        self.shape.iter().product()
    }

    /// Total byte width of the backing buffer
    pub fn sizeof(&self) -> usize {
        self.size() * self.layout.width
    }

    pub fn to_native(&mut self, value: &FortValue) -> Result<(), MarshalError> {
        check_rank(&self.desc, value)?;
        let actual = value.shape();
        if actual != self.shape {
            return Err(MarshalError::ShapeMismatch {
                expected: self.shape.clone(),
                actual,
            });
        }
        self.buf = Some(pack_elements(&self.layout, &self.desc, value)?);
        Ok(())
    }

    pub fn from_native(&self) -> Result<FortValue, MarshalError> {
        let buf = self.buf.as_ref().ok_or_else(|| MarshalError::Unbound {
            name: self.desc.name.clone(),
        })?;
        unpack_elements(&self.layout, &self.shape, buf.as_slice())
    }

    pub(crate) fn clear(&mut self) {
        self.buf = None;
    }

    pub(crate) fn cell_ptr(&mut self) -> Option<*mut u8> {
        self.buf.as_mut().map(|b| b.as_mut_ptr())
    }

    /// # Safety
    ///
    /// `addr` must be valid for reads of the declared buffer width.
    pub(crate) unsafe fn from_address(&mut self, addr: *const u8) {
        self.buf = Some(CellBuffer::copy_from(addr, self.sizeof()));
    }
}

/// Marshaller for `dimension(*)` arrays, sized by the bound value
#[derive(Debug)]
pub struct AssumedSizeArrayMarshaller {
    desc: VariableDescriptor,
    layout: AtomicLayout,
    /// Shape taken from the last bound value
    recorded_shape: Option<Vec<usize>>,
    buf: Option<CellBuffer>,
}

impl AssumedSizeArrayMarshaller {
    pub(crate) fn new(desc: VariableDescriptor) -> Result<Self, MarshalError> {
        let layout = resolve(desc.base_type, desc.kind)?;
        Ok(Self {
            desc,
            layout,
            recorded_shape: None,
            buf: None,
        })
    }

    pub fn descriptor(&self) -> &VariableDescriptor {
        &self.desc
    }

    /// Element count of the last bound value
    pub fn size(&self) -> Option<usize> {
        self.recorded_shape.as_ref().map(|s| s.iter().product())
    }

    /// The hidden size argument passed alongside the buffer
    pub fn hidden_len(&self) -> Option<i64> {
        self.size().map(|s| s as i64)
    }

    pub fn to_native(&mut self, value: &FortValue) -> Result<(), MarshalError> {
        check_rank(&self.desc, value)?;
        let buf = pack_elements(&self.layout, &self.desc, value)?;
        self.recorded_shape = Some(value.shape());
        self.buf = Some(buf);
        Ok(())
    }

    pub fn from_native(&self) -> Result<FortValue, MarshalError> {
        let (buf, shape) = match (&self.buf, &self.recorded_shape) {
            (Some(buf), Some(shape)) => (buf, shape),
            _ => {
                return Err(MarshalError::Unbound {
                    name: self.desc.name.clone(),
                })
            }
        };
        unpack_elements(&self.layout, shape, buf.as_slice())
    }

    pub(crate) fn clear(&mut self) {
        self.buf = None;
    }

    pub(crate) fn cell_ptr(&mut self) -> Option<*mut u8> {
        self.buf.as_mut().map(|b| b.as_mut_ptr())
    }

    /// Re-read the buffer at `addr` using the last recorded shape.
    ///
    /// # Safety
    ///
    /// `addr` must be valid for reads of the recorded buffer width.
    pub(crate) unsafe fn from_address(&mut self, addr: *const u8) -> Result<(), MarshalError> {
        let bytes = match self.size() {
            Some(count) => count * self.layout.width,
            None => {
                return Err(MarshalError::Unbound {
                    name: self.desc.name.clone(),
                })
            }
        };
        self.buf = Some(CellBuffer::copy_from(addr, bytes));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbol::BaseType;
    use ndarray::arr2;

    fn explicit(base: BaseType, kind: usize, shape: &[usize]) -> ExplicitArrayMarshaller {
        ExplicitArrayMarshaller::new(VariableDescriptor::explicit_array(
            "a", "__m_MOD_a", base, kind, shape,
        ))
        .unwrap()
    }

    #[test]
    fn test_column_major_packing() {
        let mut m = explicit(BaseType::Integer, 4, &[2, 3]);
        let value = FortValue::from(arr2(&[[1i64, 2, 3], [4, 5, 6]]).into_dyn());
        m.to_native(&value).unwrap();

        // First dimension varies fastest in the packed buffer
        let buf = m.buf.as_ref().unwrap();
        let flat: Vec<i32> = buf
            .as_slice()
            .chunks_exact(4)
            .map(|c| i32::from_ne_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        assert_eq!(flat, vec![1, 4, 2, 5, 3, 6]);
    }

    #[test]
    fn test_explicit_roundtrip() {
        let mut m = explicit(BaseType::Real, 8, &[2, 2]);
        let value = FortValue::from(arr2(&[[1.0f64, 2.0], [3.0, 4.0]]).into_dyn());
        m.to_native(&value).unwrap();
        assert_eq!(m.from_native().unwrap(), value);
    }

    #[test]
    fn test_shape_mismatch() {
        let mut m = explicit(BaseType::Integer, 4, &[2, 3]);
        let value = FortValue::from(arr2(&[[1i64, 2], [3, 4], [5, 6]]).into_dyn());
        let err = m.to_native(&value).unwrap_err();
        assert_eq!(
            err,
            MarshalError::ShapeMismatch {
                expected: vec![2, 3],
                actual: vec![3, 2],
            }
        );
    }

    #[test]
    fn test_rank_mismatch_is_distinct() {
        let mut m = explicit(BaseType::Integer, 4, &[2, 3]);
        let value = FortValue::from(ArrayD::from_shape_vec(IxDyn(&[6]), vec![1i64; 6]).unwrap());
        let err = m.to_native(&value).unwrap_err();
        assert_eq!(
            err,
            MarshalError::RankMismatch {
                expected: 2,
                actual: 1,
            }
        );
    }

    #[test]
    fn test_scalar_value_rejected() {
        let mut m = explicit(BaseType::Integer, 4, &[2]);
        assert!(matches!(
            m.to_native(&FortValue::Int(1)),
            Err(MarshalError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_int_array_converts_into_real_cells() {
        let mut m = explicit(BaseType::Real, 8, &[3]);
        let value =
            FortValue::from(ArrayD::from_shape_vec(IxDyn(&[3]), vec![1i64, 2, 3]).unwrap());
        m.to_native(&value).unwrap();
        assert_eq!(
            m.from_native().unwrap(),
            FortValue::from(ArrayD::from_shape_vec(IxDyn(&[3]), vec![1.0f64, 2.0, 3.0]).unwrap())
        );
    }

    #[test]
    fn test_assumed_size_records_shape() {
        let mut m = AssumedSizeArrayMarshaller::new(VariableDescriptor::assumed_size_array(
            "a",
            "__m_MOD_a",
            BaseType::Integer,
            4,
            2,
        ))
        .unwrap();
        let value = FortValue::from(arr2(&[[1i64, 2, 3], [4, 5, 6]]).into_dyn());
        m.to_native(&value).unwrap();
        assert_eq!(m.size(), Some(6));
        assert_eq!(m.hidden_len(), Some(6));
        assert_eq!(m.from_native().unwrap(), value);
    }

    #[test]
    fn test_assumed_size_rank_still_validated() {
        let mut m = AssumedSizeArrayMarshaller::new(VariableDescriptor::assumed_size_array(
            "a",
            "__m_MOD_a",
            BaseType::Integer,
            4,
            1,
        ))
        .unwrap();
        let value = FortValue::from(arr2(&[[1i64, 2], [3, 4]]).into_dyn());
        assert!(matches!(
            m.to_native(&value),
            Err(MarshalError::RankMismatch { .. })
        ));
    }

    #[test]
    fn test_unbound_reads_fail() {
        let m = explicit(BaseType::Integer, 4, &[2]);
        assert!(matches!(m.from_native(), Err(MarshalError::Unbound { .. })));

        let m = AssumedSizeArrayMarshaller::new(VariableDescriptor::assumed_size_array(
            "a",
            "__m_MOD_a",
            BaseType::Integer,
            4,
            1,
        ))
        .unwrap();
        assert!(matches!(m.from_native(), Err(MarshalError::Unbound { .. })));
    }

    #[test]
    fn test_zero_size_array() {
        let mut m = explicit(BaseType::Real, 8, &[0]);
        let value = FortValue::from(ArrayD::from_shape_vec(IxDyn(&[0]), Vec::<f64>::new()).unwrap());
        m.to_native(&value).unwrap();
        assert_eq!(m.from_native().unwrap(), value);
    }
}
