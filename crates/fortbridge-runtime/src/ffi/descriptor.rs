//! gfortran dynamic array descriptors
//!
//! Assumed-shape, allocatable and pointer arrays cross the library boundary
//! as a descriptor record rather than a bare buffer: base address, element
//! offset, a dtype word, the element span, and one (stride, lbound, ubound)
//! triple per dimension. [`RawArrayDescriptor`] reproduces that record
//! byte-for-byte in native byte order and alignment.
//!
//! The record's `base_addr` never owns the memory it points to. It is a
//! weak reference into caller- or library-owned storage, and the owning
//! marshaller nulls it on release so no stale address survives teardown.

use crate::ffi::buffer::CellBuffer;
use crate::ffi::error::MarshalError;
use crate::ffi::types::{AtomicLayout, ElemType};
use std::ffi::c_void;
use std::ptr;

/// Maximum array rank gfortran supports
pub const MAX_RANK: usize = 15;

/// Per-dimension bounds triple, field order fixed by the ABI
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DimTriple {
    /// Element stride of this dimension (in elements, not bytes)
    pub stride: i64,
    pub lbound: i64,
    pub ubound: i64,
}

impl DimTriple {
    pub const ZERO: DimTriple = DimTriple {
        stride: 0,
        lbound: 0,
        ubound: 0,
    };

    /// Number of elements along this dimension
    pub fn extent(&self) -> i64 {
        self.ubound - self.lbound + 1
    }
}

/// The packed dtype word at the head of every descriptor
///
/// `version` is fixed at 32 bits here. gfortran's own headers declare it as
/// a plain `int` in one place and `int32_t` in another; the two agree on
/// every ABI this crate targets, and 32 bits is the contract this crate
/// documents and tests.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DtypeWord {
    /// Element length in bytes
    pub elem_len: u64,
    pub version: i32,
    pub rank: u8,
    /// Element type tag, see [`ElemType`]
    pub elem_type: u8,
    pub attribute: u16,
}

/// A gfortran array descriptor record
///
/// Holds space for [`MAX_RANK`] dimension triples; only the first
/// `dtype.rank` are meaningful. Rank is fixed when the record is first
/// built and never changes afterwards.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct RawArrayDescriptor {
    /// Address of the first element. Null when the array is not associated.
    pub base_addr: *mut c_void,
    /// Offset applied to 1-based index arithmetic, in elements
    pub offset: i64,
    pub dtype: DtypeWord,
    /// Bytes per element
    pub span: i64,
    pub dim: [DimTriple; MAX_RANK],
}

/// Header-only prefix of the record, used to size partial reads. Field
/// list must stay in lockstep with [`RawArrayDescriptor`]; the tests below
/// pin both against the ABI offsets.
#[repr(C)]
#[allow(dead_code)]
struct DescriptorHeader {
    base_addr: *mut c_void,
    offset: i64,
    dtype: DtypeWord,
    span: i64,
}

const HEADER_BYTES: usize = std::mem::size_of::<DescriptorHeader>();

impl RawArrayDescriptor {
    /// Build a record for an unassociated array: null base address and
    /// zeroed dims, but a fully populated dtype word and span, so a callee
    /// can still inspect type metadata.
    pub fn unset(
        rank: usize,
        layout: &AtomicLayout,
        elem_type: ElemType,
    ) -> Result<Self, MarshalError> {
        if rank > MAX_RANK {
            return Err(MarshalError::InvalidDescriptor(format!(
                "rank {} exceeds the maximum of {}",
                rank, MAX_RANK
            )));
        }
        Ok(Self {
            base_addr: ptr::null_mut(),
            offset: 0,
            dtype: DtypeWord {
                elem_len: layout.width as u64,
                version: 0,
                rank: rank as u8,
                elem_type: elem_type as u8,
                attribute: 0,
            },
            span: layout.width as i64,
            dim: [DimTriple::ZERO; MAX_RANK],
        })
    }

    /// Build a record over a contiguous, fastest-dimension-first buffer of
    /// the given extents, with every lower bound at 1.
    ///
    /// The effective address of the element at 1-based indices `idx[..]`
    /// is `base_addr + (offset + Σ idx[i]·stride[i]) · span`, which is why
    /// `offset` ends up as the negated stride sum.
    pub fn build(
        layout: &AtomicLayout,
        elem_type: ElemType,
        extents: &[usize],
        base_addr: *mut c_void,
    ) -> Result<Self, MarshalError> {
        let mut record = Self::unset(extents.len(), layout, elem_type)?;

        let mut stride: i64 = 1;
        let mut stride_sum: i64 = 0;
        for (i, &extent) in extents.iter().enumerate() {
            record.dim[i] = DimTriple {
                stride,
                lbound: 1,
                ubound: extent as i64,
            };
            stride_sum += stride;
            stride *= extent as i64;
        }
        record.offset = -stride_sum;
        record.base_addr = base_addr;
        Ok(record)
    }

    pub fn rank(&self) -> usize {
        self.dtype.rank as usize
    }

    /// Whether the record describes an unassociated array
    pub fn is_unset(&self) -> bool {
        self.base_addr.is_null()
    }

    /// Recover the shape from the bounds triples
    ///
    /// `Ok(None)` means the array is not associated: absence of a value,
    /// not an error. Malformed bounds (negative extents, impossible rank)
    /// are errors.
    pub fn read_shape(&self) -> Result<Option<Vec<usize>>, MarshalError> {
        if self.is_unset() {
            return Ok(None);
        }
        let rank = self.rank();
        if rank > MAX_RANK {
            return Err(MarshalError::InvalidDescriptor(format!(
                "rank {} exceeds the maximum of {}",
                rank, MAX_RANK
            )));
        }
        let mut shape = Vec::with_capacity(rank);
        for triple in &self.dim[..rank] {
            let extent = triple.extent();
            if extent < 0 {
                return Err(MarshalError::InvalidDescriptor(format!(
                    "dimension bounds {}:{} give a negative extent",
                    triple.lbound, triple.ubound
                )));
            }
            shape.push(extent as usize);
        }
        Ok(Some(shape))
    }

    /// Total element count, 0 when unassociated
    pub fn element_count(&self) -> Result<usize, MarshalError> {
        Ok(self
            .read_shape()?
            .map(|s| s.iter().product())
            .unwrap_or(0))
    }

    /// Copy the elements the record points at into an owned buffer,
    /// fastest-dimension-first. `Ok(None)` when unassociated.
    ///
    /// # Safety
    ///
    /// `base_addr` must still point at live storage of at least
    /// `element_count · span` bytes. The library only guarantees that for
    /// the duration it documents; calling this after the storage was freed
    /// or moved is undefined behavior.
    pub unsafe fn copy_elements(&self) -> Result<Option<CellBuffer>, MarshalError> {
        let count = match self.read_shape()? {
            None => return Ok(None),
            Some(shape) => shape.iter().product::<usize>(),
        };
        let bytes = count * self.span as usize;
        Ok(Some(CellBuffer::copy_from(
            self.base_addr as *const u8,
            bytes,
        )))
    }

    /// Read a descriptor record out of caller- or library-owned memory.
    ///
    /// Only the header plus `rank` dimension triples are read; the
    /// library-side record is sized for its own rank and must not be
    /// over-read.
    ///
    /// # Safety
    ///
    /// `addr` must point at a live, properly aligned descriptor record.
    pub unsafe fn read_from(addr: *const c_void) -> Result<Self, MarshalError> {
        let src = addr as *const u8;
        let mut record = Self {
            base_addr: ptr::null_mut(),
            offset: 0,
            dtype: DtypeWord {
                elem_len: 0,
                version: 0,
                rank: 0,
                elem_type: 0,
                attribute: 0,
            },
            span: 0,
            dim: [DimTriple::ZERO; MAX_RANK],
        };
        ptr::copy_nonoverlapping(src, &mut record as *mut Self as *mut u8, HEADER_BYTES);

        let rank = record.rank();
        if rank > MAX_RANK {
            return Err(MarshalError::InvalidDescriptor(format!(
                "rank {} exceeds the maximum of {}",
                rank, MAX_RANK
            )));
        }
        ptr::copy_nonoverlapping(
            src.add(HEADER_BYTES),
            record.dim.as_mut_ptr() as *mut u8,
            rank * std::mem::size_of::<DimTriple>(),
        );
        Ok(record)
    }

    /// Null the base address so no stale reference into freed or moved
    /// storage can be dereferenced through this record afterwards.
    pub fn release(&mut self) {
        self.base_addr = ptr::null_mut();
    }
}
