//! Error types - reported failures of the heap entry points
//!
//! Design: Layout and reference faults mean the buffer is corrupt or a handle
//! is stale, so they are always surfaced. Running out of space leaves the heap
//! untouched and is meant to be handled (grow the buffer, retry, or give up).

use core::fmt;

/// Result alias used across the crate
pub type Result<T> = core::result::Result<T, HeapError>;

/// Top-level heap error
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeapError {
    /// Buffer failed validation
    LayoutInvalid(LayoutViolation),
    /// No free atom can satisfy the request
    OutOfSpace { requested: u32, largest_free: u32 },
    /// A reference or allocation handle does not resolve to a live allocation
    InvalidReference { offset: u32, fault: ReferenceFault },
    /// Heap configuration failed `HeapConfig::check`
    InvalidConfig(String),
}

impl HeapError {
    #[inline]
    pub fn is_out_of_space(&self) -> bool {
        matches!(self, Self::OutOfSpace { .. })
    }

    #[inline]
    pub(crate) fn reference(offset: u32, fault: ReferenceFault) -> Self {
        Self::InvalidReference { offset, fault }
    }
}

impl fmt::Display for HeapError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LayoutInvalid(violation) => write!(f, "Invalid heap layout: {}", violation),
            Self::OutOfSpace { requested, largest_free } => write!(
                f,
                "Out of space: requested {} bytes, largest free region holds {}",
                requested, largest_free
            ),
            Self::InvalidReference { offset, fault } => {
                write!(f, "Invalid reference at offset {}: {}", offset, fault)
            }
            Self::InvalidConfig(reason) => write!(f, "Invalid heap config: {}", reason),
        }
    }
}

impl std::error::Error for HeapError {}

impl From<LayoutViolation> for HeapError {
    fn from(violation: LayoutViolation) -> Self {
        Self::LayoutInvalid(violation)
    }
}

/// First invariant found broken while walking a buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutViolation {
    /// Buffer base address is not 16-byte aligned
    MisalignedBase,
    /// Buffer length is not a multiple of 16
    MisalignedLength { length: u32 },
    /// Buffer cannot hold a root atom and an end sentinel
    TooShort { length: u32, required: u32 },
    /// Buffer length does not fit the 32-bit offset space
    TooLong,
    /// First atom is not a well-formed root
    BadRoot,
    /// Last 16 bytes are not an end sentinel
    BadEnd,
    /// Atom carries an identifier outside the four known tags
    UnknownTag { offset: u32, identifier: u32 },
    /// Root or end tag found in the middle of the chain
    UnexpectedTag { offset: u32 },
    /// Atom length is not aligned or smaller than a header
    BadLength { offset: u32, length: u32 },
    /// Allocation atom without payload
    EmptyAllocation { offset: u32 },
    /// Two free atoms in a row
    AdjacentFree { offset: u32 },
    /// `previous` does not match the preceding atom's length
    BrokenBacklink { offset: u32, expected: u32, found: u32 },
    /// Atom runs past the end sentinel
    Overrun { offset: u32 },
    /// Reserved header field is non-zero
    ReservedNonZero { offset: u32 },
}

impl fmt::Display for LayoutViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MisalignedBase => write!(f, "buffer base is not 16-byte aligned"),
            Self::MisalignedLength { length } => {
                write!(f, "buffer length {} is not a multiple of 16", length)
            }
            Self::TooShort { length, required } => {
                write!(f, "buffer length {} is below the minimum of {}", length, required)
            }
            Self::TooLong => write!(f, "buffer length exceeds the 32-bit offset range"),
            Self::BadRoot => write!(f, "first atom is not a valid root"),
            Self::BadEnd => write!(f, "buffer does not end with an end sentinel"),
            Self::UnknownTag { offset, identifier } => {
                write!(f, "unknown atom identifier {:#010x} at offset {}", identifier, offset)
            }
            Self::UnexpectedTag { offset } => {
                write!(f, "root or end atom inside the chain at offset {}", offset)
            }
            Self::BadLength { offset, length } => {
                write!(f, "atom at offset {} has invalid length {}", offset, length)
            }
            Self::EmptyAllocation { offset } => {
                write!(f, "allocation at offset {} has no payload", offset)
            }
            Self::AdjacentFree { offset } => {
                write!(f, "free atom at offset {} follows another free atom", offset)
            }
            Self::BrokenBacklink { offset, expected, found } => write!(
                f,
                "atom at offset {} links back {} bytes, preceding atom is {}",
                offset, found, expected
            ),
            Self::Overrun { offset } => {
                write!(f, "atom at offset {} runs past the end sentinel", offset)
            }
            Self::ReservedNonZero { offset } => {
                write!(f, "reserved field of atom at offset {} is not zero", offset)
            }
        }
    }
}

/// Why a reference failed to resolve
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceFault {
    /// Offset is not 16-byte aligned
    Misaligned,
    /// Offset cannot be the payload of any allocation
    BelowFirstPayload,
    /// Referenced range falls outside the buffer
    OutOfBounds,
    /// Header in front of the payload is not an allocation
    NotAllocation,
    /// Allocation is too small for the referenced element count
    TooSmall { capacity: u32, count: u32 },
    /// Null offset paired with a non-zero count
    NullWithCount { count: u32 },
    /// Stored reference does not lie inside a root or allocation payload
    OutsidePayload,
    /// Stored reference lies inside the storage it names
    InsideOwnStorage,
}

impl fmt::Display for ReferenceFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Misaligned => write!(f, "offset is not 16-byte aligned"),
            Self::BelowFirstPayload => write!(f, "offset precedes the first possible payload"),
            Self::OutOfBounds => write!(f, "referenced range lies outside the buffer"),
            Self::NotAllocation => write!(f, "header is not a live allocation"),
            Self::TooSmall { capacity, count } => {
                write!(f, "allocation holds {} elements, reference claims {}", capacity, count)
            }
            Self::NullWithCount { count } => {
                write!(f, "null reference claims {} elements", count)
            }
            Self::OutsidePayload => write!(f, "reference is not stored inside a live payload"),
            Self::InsideOwnStorage => write!(f, "reference is stored inside the allocation it names"),
        }
    }
}
