//! Atom cursor - bidirectional position in an atom chain
//!
//! Design: {buffer, byte offset} pair; the header is decoded on demand.
//! Steps never leave the buffer: a step that would is reported as `None`.

use super::header::{Atom, AtomTag, HEADER_LENGTH};
use super::validate::{valid_alignment_and_length, valid_end, valid_root};
use crate::error::{LayoutViolation, Result};
use crate::layout::{is_aligned, Elements, TrivialLayout};
use core::fmt;

/// Read-only cursor over the atoms of a buffer
#[derive(Clone, Copy)]
pub struct AtomCursor<'a> {
    bytes: &'a [u8],
    offset: u32,
}

impl<'a> AtomCursor<'a> {
    /// Position at `offset` without checking the header
    ///
    /// `offset + 16` must lie within `bytes`.
    #[inline]
    pub(crate) fn at(bytes: &'a [u8], offset: u32) -> Self {
        debug_assert!(is_aligned(offset));
        debug_assert!(offset as usize + HEADER_LENGTH as usize <= bytes.len());
        Self { bytes, offset }
    }

    #[inline]
    pub fn offset(&self) -> u32 {
        self.offset
    }

    /// Whole buffer the cursor walks
    #[inline]
    pub fn bytes(&self) -> &'a [u8] {
        self.bytes
    }

    #[inline]
    pub fn atom(&self) -> Atom {
        Atom::read(self.bytes, self.offset)
    }

    #[inline]
    pub fn tag(&self) -> AtomTag {
        self.atom().identifier
    }

    #[inline]
    pub fn length(&self) -> u32 {
        self.atom().length
    }

    #[inline]
    pub fn is_root(&self) -> bool {
        self.tag() == AtomTag::Data
    }

    #[inline]
    pub fn is_end(&self) -> bool {
        self.tag() == AtomTag::End
    }

    #[inline]
    pub fn is_free(&self) -> bool {
        self.tag() == AtomTag::Free
    }

    #[inline]
    pub fn has_contents(&self) -> bool {
        self.tag().has_contents()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.atom().is_empty()
    }

    /// Payload bytes (root or allocation only)
    #[inline]
    pub fn contents_size(&self) -> u32 {
        debug_assert!(self.has_contents(), "no contents at offset {}", self.offset);
        self.atom().contents_size()
    }

    #[inline]
    pub fn contents_offset(&self) -> u32 {
        self.offset + HEADER_LENGTH
    }

    pub fn contents(&self) -> &'a [u8] {
        debug_assert!(self.has_contents(), "no contents at offset {}", self.offset);
        let start = self.contents_offset() as usize;
        let end = (self.offset as usize + self.length() as usize).min(self.bytes.len());
        &self.bytes[start.min(end)..end]
    }

    /// Payload viewed as whole `T`s
    pub fn contents_as<T: TrivialLayout>(&self) -> Elements<'a, T> {
        let contents = self.contents();
        let count = contents.len() / T::SIZE;
        Elements::new(contents, count as u32)
    }

    /// Step to the following atom (`None` at the end sentinel)
    pub fn next_atom(&self) -> Option<Self> {
        let atom = self.atom();
        if atom.identifier == AtomTag::End || atom.length < HEADER_LENGTH || !is_aligned(atom.length)
        {
            return None;
        }
        let next = self.offset.checked_add(atom.length)?;
        if next as usize + HEADER_LENGTH as usize > self.bytes.len() {
            return None;
        }
        Some(Self { bytes: self.bytes, offset: next })
    }

    /// Step back to the preceding atom (`None` at the root)
    pub fn prev_atom(&self) -> Option<Self> {
        let atom = self.atom();
        if atom.identifier == AtomTag::Data || atom.previous == 0 || !is_aligned(atom.previous) {
            return None;
        }
        let prev = self.offset.checked_sub(atom.previous)?;
        Some(Self { bytes: self.bytes, offset: prev })
    }
}

impl PartialEq for AtomCursor<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.offset == other.offset
    }
}

impl Eq for AtomCursor<'_> {}

impl fmt::Debug for AtomCursor<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AtomCursor")
            .field("offset", &self.offset)
            .field("atom", &self.atom())
            .finish()
    }
}

/// Cursor at the root atom, after checking the root header
pub fn root_cursor(bytes: &[u8]) -> Result<AtomCursor<'_>> {
    let length = valid_alignment_and_length(bytes)?;
    if !valid_root(&Atom::read(bytes, 0), length) {
        return Err(LayoutViolation::BadRoot.into());
    }
    Ok(AtomCursor::at(bytes, 0))
}

/// Cursor at the end sentinel, after checking the sentinel header
pub fn end_cursor(bytes: &[u8]) -> Result<AtomCursor<'_>> {
    let length = valid_alignment_and_length(bytes)?;
    let offset = length - HEADER_LENGTH;
    if !valid_end(&Atom::read(bytes, offset)) {
        return Err(LayoutViolation::BadEnd.into());
    }
    Ok(AtomCursor::at(bytes, offset))
}

/// Double-ended iterator over a chain, root through end sentinel
pub struct Atoms<'a> {
    front: Option<AtomCursor<'a>>,
    back: Option<AtomCursor<'a>>,
}

impl<'a> Atoms<'a> {
    pub(crate) fn new(root: AtomCursor<'a>, end: AtomCursor<'a>) -> Self {
        Self { front: Some(root), back: Some(end) }
    }

    fn finish(&mut self) {
        self.front = None;
        self.back = None;
    }
}

impl<'a> Iterator for Atoms<'a> {
    type Item = AtomCursor<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.front?;
        if Some(current) == self.back {
            self.finish();
        } else {
            self.front = current.next_atom();
            if self.front.is_none() {
                self.back = None;
            }
        }
        Some(current)
    }
}

impl DoubleEndedIterator for Atoms<'_> {
    fn next_back(&mut self) -> Option<Self::Item> {
        let current = self.back?;
        if Some(current) == self.front {
            self.finish();
        } else {
            self.back = current.prev_atom();
            if self.back.is_none() {
                self.front = None;
            }
        }
        Some(current)
    }
}
