//! In-process value representation
//!
//! Shared value type for everything that crosses the marshalling boundary:
//! - Int, Real, Logical: immediate scalars
//! - Str: heap-allocated character data
//! - Complex: `num_complex::Complex64` (narrowed to the declared kind at
//!   marshal time)
//! - *Array variants: dynamic-rank `ndarray` buffers; element conversion to
//!   the declared kind also happens at marshal time

use ndarray::ArrayD;
use num_complex::Complex64;
use std::fmt;

/// A value on its way into or out of Fortran
#[derive(Debug, Clone, PartialEq)]
pub enum FortValue {
    Int(i64),
    Real(f64),
    Logical(bool),
    Str(String),
    Complex(Complex64),
    IntArray(ArrayD<i64>),
    RealArray(ArrayD<f64>),
    LogicalArray(ArrayD<bool>),
    ComplexArray(ArrayD<Complex64>),
}

impl FortValue {
    /// Get a human-readable name for this value's type
    pub fn type_name(&self) -> &'static str {
        match self {
            FortValue::Int(_) => "integer",
            FortValue::Real(_) => "real",
            FortValue::Logical(_) => "logical",
            FortValue::Str(_) => "character",
            FortValue::Complex(_) => "complex",
            FortValue::IntArray(_) => "integer array",
            FortValue::RealArray(_) => "real array",
            FortValue::LogicalArray(_) => "logical array",
            FortValue::ComplexArray(_) => "complex array",
        }
    }

    pub fn is_array(&self) -> bool {
        matches!(
            self,
            FortValue::IntArray(_)
                | FortValue::RealArray(_)
                | FortValue::LogicalArray(_)
                | FortValue::ComplexArray(_)
        )
    }

    /// Number of dimensions; 0 for scalars
    pub fn ndim(&self) -> usize {
        match self {
            FortValue::IntArray(a) => a.ndim(),
            FortValue::RealArray(a) => a.ndim(),
            FortValue::LogicalArray(a) => a.ndim(),
            FortValue::ComplexArray(a) => a.ndim(),
            _ => 0,
        }
    }

    /// Shape of an array value; empty for scalars
    pub fn shape(&self) -> Vec<usize> {
        match self {
            FortValue::IntArray(a) => a.shape().to_vec(),
            FortValue::RealArray(a) => a.shape().to_vec(),
            FortValue::LogicalArray(a) => a.shape().to_vec(),
            FortValue::ComplexArray(a) => a.shape().to_vec(),
            _ => Vec::new(),
        }
    }

    /// Total element count; 1 for scalars
    pub fn len(&self) -> usize {
        match self {
            FortValue::IntArray(a) => a.len(),
            FortValue::RealArray(a) => a.len(),
            FortValue::LogicalArray(a) => a.len(),
            FortValue::ComplexArray(a) => a.len(),
            _ => 1,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Display for FortValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FortValue::Int(v) => write!(f, "{}", v),
            FortValue::Real(v) => write!(f, "{}", v),
            FortValue::Logical(v) => write!(f, "{}", if *v { ".true." } else { ".false." }),
            FortValue::Str(v) => write!(f, "{}", v),
            FortValue::Complex(v) => write!(f, "({}, {})", v.re, v.im),
            FortValue::IntArray(a) => write!(f, "{}", a),
            FortValue::RealArray(a) => write!(f, "{}", a),
            FortValue::LogicalArray(a) => write!(f, "{}", a),
            FortValue::ComplexArray(a) => write!(f, "{}", a),
        }
    }
}

impl From<i64> for FortValue {
    fn from(v: i64) -> Self {
        FortValue::Int(v)
    }
}

impl From<i32> for FortValue {
    fn from(v: i32) -> Self {
        FortValue::Int(v as i64)
    }
}

impl From<f64> for FortValue {
    fn from(v: f64) -> Self {
        FortValue::Real(v)
    }
}

impl From<bool> for FortValue {
    fn from(v: bool) -> Self {
        FortValue::Logical(v)
    }
}

impl From<&str> for FortValue {
    fn from(v: &str) -> Self {
        FortValue::Str(v.to_string())
    }
}

impl From<String> for FortValue {
    fn from(v: String) -> Self {
        FortValue::Str(v)
    }
}

impl From<Complex64> for FortValue {
    fn from(v: Complex64) -> Self {
        FortValue::Complex(v)
    }
}

impl From<ArrayD<i64>> for FortValue {
    fn from(v: ArrayD<i64>) -> Self {
        FortValue::IntArray(v)
    }
}

impl From<ArrayD<f64>> for FortValue {
    fn from(v: ArrayD<f64>) -> Self {
        FortValue::RealArray(v)
    }
}

impl From<ArrayD<bool>> for FortValue {
    fn from(v: ArrayD<bool>) -> Self {
        FortValue::LogicalArray(v)
    }
}

impl From<ArrayD<Complex64>> for FortValue {
    fn from(v: ArrayD<Complex64>) -> Self {
        FortValue::ComplexArray(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::IxDyn;

    #[test]
    fn test_scalar_shape_is_empty() {
        assert_eq!(FortValue::Int(1).shape(), Vec::<usize>::new());
        assert_eq!(FortValue::Real(1.5).ndim(), 0);
        assert_eq!(FortValue::Real(1.5).len(), 1);
    }

    #[test]
    fn test_array_shape() {
        let arr = ArrayD::<f64>::zeros(IxDyn(&[2, 3]));
        let value = FortValue::from(arr);
        assert!(value.is_array());
        assert_eq!(value.ndim(), 2);
        assert_eq!(value.shape(), vec![2, 3]);
        assert_eq!(value.len(), 6);
    }

    #[test]
    fn test_display_logical() {
        assert_eq!(FortValue::Logical(true).to_string(), ".true.");
        assert_eq!(FortValue::Logical(false).to_string(), ".false.");
    }

    #[test]
    fn test_type_names() {
        assert_eq!(FortValue::Int(0).type_name(), "integer");
        assert_eq!(
            FortValue::from(ArrayD::<i64>::zeros(IxDyn(&[1]))).type_name(),
            "integer array"
        );
    }
}
