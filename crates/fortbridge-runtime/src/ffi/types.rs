//! Atomic type layouts - gfortran (type, kind) → binary layout
//!
//! [`resolve`] maps a (base type, kind) pair to the fixed layout of one
//! atomic unit: byte width, alignment, and how to move its bytes. The
//! mapping is pure and total over the support table; everything else is an
//! unsupported-type error.
//!
//! Quad-precision (kind=16) reals and complex numbers resolve a layout so
//! that surrounding records stay correctly sized and aligned, but reading
//! or writing a *value* through them is rejected. Laying one out and
//! computing with one are different promises.

use crate::ffi::error::MarshalError;
use crate::symbol::BaseType;
use num_complex::Complex64;
use serde::{Deserialize, Serialize};

/// How the bytes of one atomic unit are moved
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellKind {
    /// Signed integer of the layout's width
    Int,
    /// IEEE float or double
    Real,
    /// 4-byte integer; truthiness is `value == 1`
    Logical,
    /// Single character cell (1 byte)
    CharCell,
    /// Two same-kind reals, `real` then `imag`, no padding
    ComplexPair,
    /// 16-byte blob kept for size/alignment only
    Opaque,
    /// Two 16-byte blobs
    OpaquePair,
}

/// Binary layout of one atomic unit, derived once per (type, kind)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AtomicLayout {
    pub base: BaseType,
    /// Byte width of the base component ("kind")
    pub kind: usize,
    /// Total byte width of the unit (2× kind for complex pairs)
    pub width: usize,
    pub align: usize,
    pub cell: CellKind,
}

/// Resolve the layout for a (base type, kind) pair
///
/// # Example
///
/// ```
/// use fortbridge_runtime::ffi::types::resolve;
/// use fortbridge_runtime::symbol::BaseType;
///
/// let layout = resolve(BaseType::Complex, 8).unwrap();
/// assert_eq!(layout.width, 16);
/// assert_eq!(layout.align, 8);
/// ```
pub fn resolve(base: BaseType, kind: usize) -> Result<AtomicLayout, MarshalError> {
    let (width, align, cell) = match (base, kind) {
        (BaseType::Integer, 4) | (BaseType::Integer, 8) => (kind, kind, CellKind::Int),
        (BaseType::Real, 4) | (BaseType::Real, 8) => (kind, kind, CellKind::Real),
        (BaseType::Real, 16) => (16, 16, CellKind::Opaque),
        (BaseType::Logical, 4) => (4, 4, CellKind::Logical),
        (BaseType::Character, _) => (1, 1, CellKind::CharCell),
        (BaseType::Complex, 4) | (BaseType::Complex, 8) => (2 * kind, kind, CellKind::ComplexPair),
        (BaseType::Complex, 16) => (32, 16, CellKind::OpaquePair),
        _ => {
            return Err(MarshalError::UnsupportedType {
                base: base.display_name().to_string(),
                kind,
            })
        }
    };
    Ok(AtomicLayout {
        base,
        kind,
        width,
        align,
        cell,
    })
}

/// One element in transit between a [`crate::value::FortValue`] and a
/// native cell
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ElemScalar {
    Int(i64),
    Real(f64),
    Logical(bool),
    Complex(Complex64),
}

impl AtomicLayout {
    /// Write one element into `dst` (exactly `self.width` bytes, native
    /// byte order). Numeric inputs convert to the declared component type;
    /// integers that do not fit the declared kind are rejected.
    pub fn write_element(&self, dst: &mut [u8], value: ElemScalar) -> Result<(), MarshalError> {
        debug_assert_eq!(dst.len(), self.width);
        match self.cell {
            CellKind::Int => {
                let v = int_component(value, self.base)?;
                match self.kind {
                    4 => {
                        if v < i32::MIN as i64 || v > i32::MAX as i64 {
                            return Err(MarshalError::OutOfRange {
                                value: v,
                                target: "INTEGER(KIND=4)",
                            });
                        }
                        dst.copy_from_slice(&(v as i32).to_ne_bytes());
                    }
                    _ => dst.copy_from_slice(&v.to_ne_bytes()),
                }
                Ok(())
            }
            CellKind::Real => {
                let v = real_component(value, self.base)?;
                match self.kind {
                    4 => dst.copy_from_slice(&(v as f32).to_ne_bytes()),
                    _ => dst.copy_from_slice(&v.to_ne_bytes()),
                }
                Ok(())
            }
            CellKind::Logical => match value {
                ElemScalar::Logical(b) => {
                    let stored: i32 = if b { 1 } else { 0 };
                    dst.copy_from_slice(&stored.to_ne_bytes());
                    Ok(())
                }
                other => Err(type_mismatch(self.base, other)),
            },
            CellKind::ComplexPair => {
                let v = complex_component(value, self.base)?;
                let half = self.kind;
                match half {
                    4 => {
                        dst[..4].copy_from_slice(&(v.re as f32).to_ne_bytes());
                        dst[4..].copy_from_slice(&(v.im as f32).to_ne_bytes());
                    }
                    _ => {
                        dst[..8].copy_from_slice(&v.re.to_ne_bytes());
                        dst[8..].copy_from_slice(&v.im.to_ne_bytes());
                    }
                }
                Ok(())
            }
            CellKind::CharCell => Err(type_mismatch(self.base, value)),
            CellKind::Opaque | CellKind::OpaquePair => Err(MarshalError::NotImplemented(format!(
                "{} values",
                spec_of(self.base, self.kind)
            ))),
        }
    }

    /// Read one element back out of `src` (exactly `self.width` bytes)
    pub fn read_element(&self, src: &[u8]) -> Result<ElemScalar, MarshalError> {
        debug_assert_eq!(src.len(), self.width);
        match self.cell {
            CellKind::Int => Ok(ElemScalar::Int(match self.kind {
                4 => i32::from_ne_bytes(fixed4(src)) as i64,
                _ => i64::from_ne_bytes(fixed8(src)),
            })),
            CellKind::Real => Ok(ElemScalar::Real(match self.kind {
                4 => f32::from_ne_bytes(fixed4(src)) as f64,
                _ => f64::from_ne_bytes(fixed8(src)),
            })),
            CellKind::Logical => {
                let stored = i32::from_ne_bytes(fixed4(src));
                Ok(ElemScalar::Logical(stored == 1))
            }
            CellKind::ComplexPair => {
                let (re, im) = match self.kind {
                    4 => (
                        f32::from_ne_bytes(fixed4(&src[..4])) as f64,
                        f32::from_ne_bytes(fixed4(&src[4..])) as f64,
                    ),
                    _ => (
                        f64::from_ne_bytes(fixed8(&src[..8])),
                        f64::from_ne_bytes(fixed8(&src[8..])),
                    ),
                };
                Ok(ElemScalar::Complex(Complex64::new(re, im)))
            }
            CellKind::CharCell => Err(MarshalError::TypeMismatch {
                expected: "numeric cell".to_string(),
                got: "character cell".to_string(),
            }),
            CellKind::Opaque | CellKind::OpaquePair => Err(MarshalError::NotImplemented(format!(
                "{} values",
                spec_of(self.base, self.kind)
            ))),
        }
    }
}

fn spec_of(base: BaseType, kind: usize) -> String {
    format!("{}(KIND={})", base.display_name(), kind)
}

fn type_mismatch(expected: BaseType, got: ElemScalar) -> MarshalError {
    let got = match got {
        ElemScalar::Int(_) => "integer",
        ElemScalar::Real(_) => "real",
        ElemScalar::Logical(_) => "logical",
        ElemScalar::Complex(_) => "complex",
    };
    MarshalError::TypeMismatch {
        expected: expected.display_name().to_string(),
        got: got.to_string(),
    }
}

fn int_component(value: ElemScalar, target: BaseType) -> Result<i64, MarshalError> {
    match value {
        ElemScalar::Int(v) => Ok(v),
        // Truncation toward zero, matching numeric dtype conversion
        ElemScalar::Real(v) if v.is_finite() => Ok(v.trunc() as i64),
        other => Err(type_mismatch(target, other)),
    }
}

fn real_component(value: ElemScalar, target: BaseType) -> Result<f64, MarshalError> {
    match value {
        ElemScalar::Real(v) => Ok(v),
        ElemScalar::Int(v) => Ok(v as f64),
        other => Err(type_mismatch(target, other)),
    }
}

fn complex_component(value: ElemScalar, target: BaseType) -> Result<Complex64, MarshalError> {
    match value {
        ElemScalar::Complex(v) => Ok(v),
        ElemScalar::Real(v) => Ok(Complex64::new(v, 0.0)),
        ElemScalar::Int(v) => Ok(Complex64::new(v as f64, 0.0)),
        other => Err(type_mismatch(target, other)),
    }
}

fn fixed4(src: &[u8]) -> [u8; 4] {
    let mut out = [0u8; 4];
    out.copy_from_slice(&src[..4]);
    out
}

fn fixed8(src: &[u8]) -> [u8; 8] {
    let mut out = [0u8; 8];
    out.copy_from_slice(&src[..8]);
    out
}

/// Element type tag stored in the dtype word of an array descriptor
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ElemType {
    Unknown = 0,
    Integer = 1,
    Logical = 2,
    Real = 3,
    Complex = 4,
    Derived = 5,
    Character = 6,
    Class = 7,
    Procedure = 8,
    Hollerith = 9,
    Void = 10,
    Assumed = 11,
}

impl ElemType {
    /// Tag for an array of the given base type. Only numeric, logical and
    /// complex elements can live behind a descriptor; derived types and
    /// characters are rejected here.
    pub fn for_array(base: BaseType) -> Result<Self, MarshalError> {
        match base {
            BaseType::Integer => Ok(ElemType::Integer),
            BaseType::Logical => Ok(ElemType::Logical),
            BaseType::Real => Ok(ElemType::Real),
            BaseType::Complex => Ok(ElemType::Complex),
            _ => Err(MarshalError::UnsupportedArrayType {
                base: base.display_name().to_string(),
            }),
        }
    }

    /// Decode a tag byte read back from a descriptor
    pub fn from_tag(tag: u8) -> Option<Self> {
        Some(match tag {
            0 => ElemType::Unknown,
            1 => ElemType::Integer,
            2 => ElemType::Logical,
            3 => ElemType::Real,
            4 => ElemType::Complex,
            5 => ElemType::Derived,
            6 => ElemType::Character,
            7 => ElemType::Class,
            8 => ElemType::Procedure,
            9 => ElemType::Hollerith,
            10 => ElemType::Void,
            11 => ElemType::Assumed,
            _ => return None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_support_table() {
        for (base, kind, width, align) in [
            (BaseType::Integer, 4, 4, 4),
            (BaseType::Integer, 8, 8, 8),
            (BaseType::Real, 4, 4, 4),
            (BaseType::Real, 8, 8, 8),
            (BaseType::Real, 16, 16, 16),
            (BaseType::Logical, 4, 4, 4),
            (BaseType::Character, 1, 1, 1),
            (BaseType::Complex, 4, 8, 4),
            (BaseType::Complex, 8, 16, 8),
            (BaseType::Complex, 16, 32, 16),
        ] {
            let layout = resolve(base, kind).unwrap();
            assert_eq!(layout.width, width, "{:?} kind={}", base, kind);
            assert_eq!(layout.align, align, "{:?} kind={}", base, kind);
        }
    }

    #[test]
    fn test_resolve_rejects_unknown_kind() {
        let err = resolve(BaseType::Integer, 2).unwrap_err();
        assert_eq!(
            err,
            MarshalError::UnsupportedType {
                base: "INTEGER".to_string(),
                kind: 2
            }
        );
        assert!(resolve(BaseType::Logical, 8).is_err());
        assert!(resolve(BaseType::Derived, 4).is_err());
    }

    #[test]
    fn test_quad_layout_resolves_but_value_access_fails() {
        let layout = resolve(BaseType::Real, 16).unwrap();
        assert_eq!(layout.width, 16);

        let mut buf = vec![0u8; 16];
        let write = layout.write_element(&mut buf, ElemScalar::Real(1.0));
        assert!(matches!(write, Err(MarshalError::NotImplemented(_))));
        let read = layout.read_element(&buf);
        assert!(matches!(read, Err(MarshalError::NotImplemented(_))));
    }

    #[test]
    fn test_integer_roundtrip_and_range() {
        let layout = resolve(BaseType::Integer, 4).unwrap();
        let mut buf = vec![0u8; 4];
        layout
            .write_element(&mut buf, ElemScalar::Int(-42))
            .unwrap();
        assert_eq!(layout.read_element(&buf).unwrap(), ElemScalar::Int(-42));

        let err = layout
            .write_element(&mut buf, ElemScalar::Int(i64::from(i32::MAX) + 1))
            .unwrap_err();
        assert!(matches!(err, MarshalError::OutOfRange { .. }));
    }

    #[test]
    fn test_logical_stores_one_or_zero() {
        let layout = resolve(BaseType::Logical, 4).unwrap();
        let mut buf = vec![0u8; 4];

        layout
            .write_element(&mut buf, ElemScalar::Logical(true))
            .unwrap();
        assert_eq!(buf, 1i32.to_ne_bytes());

        layout
            .write_element(&mut buf, ElemScalar::Logical(false))
            .unwrap();
        assert_eq!(buf, 0i32.to_ne_bytes());

        // Only a stored 1 reads back as true
        buf.copy_from_slice(&2i32.to_ne_bytes());
        assert_eq!(
            layout.read_element(&buf).unwrap(),
            ElemScalar::Logical(false)
        );
    }

    #[test]
    fn test_complex_pair_roundtrip() {
        let layout = resolve(BaseType::Complex, 8).unwrap();
        let mut buf = vec![0u8; 16];
        let c = Complex64::new(1.5, -2.5);
        layout
            .write_element(&mut buf, ElemScalar::Complex(c))
            .unwrap();
        assert_eq!(layout.read_element(&buf).unwrap(), ElemScalar::Complex(c));

        // real then imag, contiguous
        assert_eq!(&buf[..8], 1.5f64.to_ne_bytes());
        assert_eq!(&buf[8..], (-2.5f64).to_ne_bytes());
    }

    #[test]
    fn test_integer_coerces_into_real_cell() {
        let layout = resolve(BaseType::Real, 8).unwrap();
        let mut buf = vec![0u8; 8];
        layout.write_element(&mut buf, ElemScalar::Int(3)).unwrap();
        assert_eq!(layout.read_element(&buf).unwrap(), ElemScalar::Real(3.0));
    }

    #[test]
    fn test_array_tag_mapping() {
        assert_eq!(
            ElemType::for_array(BaseType::Integer).unwrap(),
            ElemType::Integer
        );
        assert_eq!(ElemType::for_array(BaseType::Real).unwrap() as u8, 3);
        assert!(ElemType::for_array(BaseType::Character).is_err());
        assert!(ElemType::for_array(BaseType::Derived).is_err());
    }

    #[test]
    fn test_tag_decode() {
        assert_eq!(ElemType::from_tag(4), Some(ElemType::Complex));
        assert_eq!(ElemType::from_tag(11), Some(ElemType::Assumed));
        assert_eq!(ElemType::from_tag(12), None);
    }
}
