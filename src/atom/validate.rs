//! Layout validation - full walk of an atom chain
//!
//! Used before trusting a buffer that arrived from elsewhere (persisted,
//! shared, or built by hand). The allocator never calls it on its own paths.

use super::header::{Atom, AtomTag, HEADER_LENGTH, MIN_CONTENTS_LENGTH};
use crate::error::LayoutViolation;
use crate::layout::{is_aligned, is_aligned_ptr};

/// Check base alignment and total length, returning the length as `u32`
pub fn valid_alignment_and_length(bytes: &[u8]) -> Result<u32, LayoutViolation> {
    if !is_aligned_ptr(bytes) {
        return Err(LayoutViolation::MisalignedBase);
    }
    let length = u32::try_from(bytes.len()).map_err(|_| LayoutViolation::TooLong)?;
    if !is_aligned(length) {
        return Err(LayoutViolation::MisalignedLength { length });
    }
    if length < MIN_CONTENTS_LENGTH {
        return Err(LayoutViolation::TooShort { length, required: MIN_CONTENTS_LENGTH });
    }
    Ok(length)
}

/// Root header check for a buffer of `contents_length` bytes
pub fn valid_root(root: &Atom, contents_length: u32) -> bool {
    root.identifier == AtomTag::Data
        && is_aligned(root.length)
        && root.length >= HEADER_LENGTH
        && root.length <= contents_length.saturating_sub(HEADER_LENGTH)
        && root.previous == 0
}

/// End sentinel header check
pub fn valid_end(end: &Atom) -> bool {
    end.identifier == AtomTag::End && end.length == HEADER_LENGTH && is_aligned(end.previous)
}

/// Walk the chain from root to end sentinel, reporting the first violation
pub fn check_layout(bytes: &[u8]) -> Result<(), LayoutViolation> {
    walk(bytes).map_err(|violation| {
        tracing::warn!(
            event = "layout_rejected",
            violation = %violation,
            length = bytes.len(),
            "Heap layout failed validation"
        );
        violation
    })
}

/// `true` when every heap invariant holds
pub fn validate_layout(bytes: &[u8]) -> bool {
    check_layout(bytes).is_ok()
}

fn walk(bytes: &[u8]) -> Result<(), LayoutViolation> {
    let length = valid_alignment_and_length(bytes)?;

    // The first atom is 'data'
    let root = Atom::read(bytes, 0);
    if !valid_root(&root, length) {
        return Err(LayoutViolation::BadRoot);
    }
    if root.reserved != 0 {
        return Err(LayoutViolation::ReservedNonZero { offset: 0 });
    }

    // The last atom is 'end ', which has no content
    let end_offset = length - HEADER_LENGTH;
    let end = Atom::read(bytes, end_offset);
    if end.identifier != AtomTag::End || !end.is_empty() {
        return Err(LayoutViolation::BadEnd);
    }
    if end.reserved != 0 {
        return Err(LayoutViolation::ReservedNonZero { offset: end_offset });
    }

    let mut prev = root;
    let mut offset = root.length;

    while offset < end_offset {
        let atom = Atom::read(bytes, offset);

        if !is_aligned(atom.length) || atom.length < HEADER_LENGTH {
            return Err(LayoutViolation::BadLength { offset, length: atom.length });
        }
        if atom.length > end_offset - offset {
            return Err(LayoutViolation::Overrun { offset });
        }

        match atom.identifier {
            AtomTag::Allocation if atom.is_empty() => {
                return Err(LayoutViolation::EmptyAllocation { offset });
            }
            AtomTag::Allocation => {}
            AtomTag::Free if prev.identifier == AtomTag::Free => {
                return Err(LayoutViolation::AdjacentFree { offset });
            }
            AtomTag::Free => {}
            AtomTag::Data | AtomTag::End => {
                return Err(LayoutViolation::UnexpectedTag { offset });
            }
            AtomTag::Unknown(identifier) => {
                return Err(LayoutViolation::UnknownTag { offset, identifier });
            }
        }

        if atom.reserved != 0 {
            return Err(LayoutViolation::ReservedNonZero { offset });
        }
        if atom.previous != prev.length {
            return Err(LayoutViolation::BrokenBacklink {
                offset,
                expected: prev.length,
                found: atom.previous,
            });
        }

        prev = atom;
        offset += atom.length;
    }

    if end.previous != prev.length {
        return Err(LayoutViolation::BrokenBacklink {
            offset: end_offset,
            expected: prev.length,
            found: end.previous,
        });
    }

    Ok(())
}
