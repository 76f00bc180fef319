//! Character marshalling
//!
//! Fortran character variables are fixed-width cell arrays with no
//! terminator; short values are padded with spaces and long values are
//! truncated to the declared length. Deferred-length variables take their
//! working length from whatever value is bound.
//!
//! Reading back returns the cell contents verbatim, trailing pad spaces
//! included. Stripping is the caller's decision, not this module's.

use crate::ffi::buffer::CellBuffer;
use crate::ffi::error::MarshalError;
use crate::symbol::VariableDescriptor;
use crate::value::FortValue;

const PAD: u8 = b' ';

/// Marshaller for character scalars, fixed or deferred length
#[derive(Debug)]
pub struct StringMarshaller {
    desc: VariableDescriptor,
    /// Working length in cells, cached once resolved
    len: Option<usize>,
    cell: Option<CellBuffer>,
}

impl StringMarshaller {
    pub(crate) fn new(desc: VariableDescriptor) -> Self {
        // A declared length fixes the cell count up front; without one the
        // variable behaves deferred and resolves on first binding.
        let len = if desc.is_deferred_len() {
            None
        } else {
            desc.strlen
        };
        Self {
            desc,
            len,
            cell: None,
        }
    }

    pub fn descriptor(&self) -> &VariableDescriptor {
        &self.desc
    }

    /// Working length in cells, if resolved
    pub fn len(&self) -> Option<usize> {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == Some(0)
    }

    /// The hidden length argument gfortran expects after the data pointer
    pub fn hidden_len(&self) -> Option<i64> {
        self.len.map(|l| l as i64)
    }

    pub fn to_native(&mut self, value: &FortValue) -> Result<(), MarshalError> {
        let text = match value {
            FortValue::Str(s) => s.as_bytes(),
            other => {
                return Err(MarshalError::TypeMismatch {
                    expected: self.desc.type_spec(),
                    got: other.type_name().to_string(),
                })
            }
        };

        let len = match (self.desc.is_deferred_len(), self.desc.strlen) {
            (false, Some(declared)) => declared,
            // Deferred length follows the bound value
            _ => text.len(),
        };
        self.len = Some(len);

        let mut cell = CellBuffer::zeroed(len);
        let cells = cell.as_mut_slice();
        if text.len() >= len {
            cells.copy_from_slice(&text[..len]);
        } else {
            cells[..text.len()].copy_from_slice(text);
            for pad in cells[text.len()..].iter_mut() {
                *pad = PAD;
            }
        }
        self.cell = Some(cell);
        Ok(())
    }

    /// Decode the full cell array, trailing pad spaces included
    pub fn from_native(&self) -> Result<FortValue, MarshalError> {
        let cell = self.cell.as_ref().ok_or_else(|| MarshalError::Unbound {
            name: self.desc.name.clone(),
        })?;
        let text = std::str::from_utf8(cell.as_slice())
            .map_err(|e| MarshalError::InvalidString(e.to_string()))?;
        Ok(FortValue::Str(text.to_string()))
    }

    pub(crate) fn clear(&mut self) {
        self.cell = None;
    }

    pub(crate) fn cell_ptr(&mut self) -> Option<*mut u8> {
        self.cell.as_mut().map(|c| c.as_mut_ptr())
    }

    /// Adopt the cell array at a caller-supplied address. The working
    /// length must already be resolved; a deferred-length variable that was
    /// never bound has no way to know how much to read.
    ///
    /// # Safety
    ///
    /// `addr` must be valid for reads of the resolved length.
    pub(crate) unsafe fn from_address(&mut self, addr: *const u8) -> Result<(), MarshalError> {
        let len = self.len.ok_or_else(|| MarshalError::Unbound {
            name: self.desc.name.clone(),
        })?;
        self.cell = Some(CellBuffer::copy_from(addr, len));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixed(len: usize) -> StringMarshaller {
        StringMarshaller::new(VariableDescriptor::character("s", "__m_MOD_s", len))
    }

    fn deferred() -> StringMarshaller {
        StringMarshaller::new(VariableDescriptor::deferred_character("s", "__m_MOD_s"))
    }

    #[test]
    fn test_fixed_truncates() {
        let mut m = fixed(3);
        m.to_native(&FortValue::from("hello")).unwrap();
        assert_eq!(m.from_native().unwrap(), FortValue::from("hel"));
        assert_eq!(m.len(), Some(3));
    }

    #[test]
    fn test_fixed_pads_with_space() {
        let mut m = fixed(3);
        m.to_native(&FortValue::from("ab")).unwrap();
        // Pad spaces come back verbatim; nothing strips them
        assert_eq!(m.from_native().unwrap(), FortValue::from("ab "));
    }

    #[test]
    fn test_exact_length_untouched() {
        let mut m = fixed(5);
        m.to_native(&FortValue::from("exact")).unwrap();
        assert_eq!(m.from_native().unwrap(), FortValue::from("exact"));
    }

    #[test]
    fn test_deferred_takes_value_length() {
        let mut m = deferred();
        assert_eq!(m.len(), None);
        m.to_native(&FortValue::from("abcdef")).unwrap();
        assert_eq!(m.len(), Some(6));
        assert_eq!(m.hidden_len(), Some(6));
        // Exactly six cells, no padding
        assert_eq!(m.from_native().unwrap(), FortValue::from("abcdef"));
    }

    #[test]
    fn test_deferred_rebind_changes_length() {
        let mut m = deferred();
        m.to_native(&FortValue::from("abcdef")).unwrap();
        m.to_native(&FortValue::from("xy")).unwrap();
        assert_eq!(m.len(), Some(2));
        assert_eq!(m.from_native().unwrap(), FortValue::from("xy"));
    }

    #[test]
    fn test_fixed_length_never_recomputes() {
        let mut m = fixed(4);
        m.to_native(&FortValue::from("toolong")).unwrap();
        m.to_native(&FortValue::from("a")).unwrap();
        assert_eq!(m.len(), Some(4));
        assert_eq!(m.from_native().unwrap(), FortValue::from("a   "));
    }

    #[test]
    fn test_non_string_rejected() {
        let mut m = fixed(3);
        let err = m.to_native(&FortValue::Int(1)).unwrap_err();
        assert!(matches!(err, MarshalError::TypeMismatch { .. }));
    }

    #[test]
    fn test_from_address_roundtrip() {
        let mut m = fixed(3);
        let raw = *b"hi ";
        unsafe { m.from_address(raw.as_ptr()).unwrap() };
        assert_eq!(m.from_native().unwrap(), FortValue::from("hi "));
    }

    #[test]
    fn test_from_address_needs_resolved_length() {
        let mut m = deferred();
        let raw = *b"hi";
        let err = unsafe { m.from_address(raw.as_ptr()).unwrap_err() };
        assert!(matches!(err, MarshalError::Unbound { .. }));
    }
}
