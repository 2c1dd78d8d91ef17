//! Atom header - the fixed 16-byte record in front of every region
//!
//! Design: Four native-endian `u32` fields. The identifier is decoded into an
//! explicit tag; unrecognized values are kept so the validator can report them.

use crate::layout::{load, store, TrivialLayout};

/// Size of an atom header, and the length of an empty atom
pub const HEADER_LENGTH: u32 = 16;

/// Smallest valid buffer: an empty root followed by the end sentinel
pub const MIN_CONTENTS_LENGTH: u32 = 2 * HEADER_LENGTH;

/// Atom identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AtomTag {
    /// Root atom (data blob or empty resource root)
    Data,
    /// Live allocation holding caller payload
    Allocation,
    /// Reclaimed space
    Free,
    /// Terminal sentinel, always 16 bytes
    End,
    /// Identifier outside the known set; never written by this crate
    Unknown(u32),
}

impl AtomTag {
    pub const DATA: u32 = u32::from_be_bytes(*b"data");
    pub const ALLOCATION: u32 = u32::from_be_bytes(*b"aloc");
    pub const FREE: u32 = u32::from_be_bytes(*b"free");
    pub const END: u32 = u32::from_be_bytes(*b"end ");

    #[inline]
    pub const fn from_raw(raw: u32) -> Self {
        match raw {
            Self::DATA => Self::Data,
            Self::ALLOCATION => Self::Allocation,
            Self::FREE => Self::Free,
            Self::END => Self::End,
            other => Self::Unknown(other),
        }
    }

    #[inline]
    pub const fn raw(self) -> u32 {
        match self {
            Self::Data => Self::DATA,
            Self::Allocation => Self::ALLOCATION,
            Self::Free => Self::FREE,
            Self::End => Self::END,
            Self::Unknown(other) => other,
        }
    }

    /// Root and allocation atoms carry payload
    #[inline]
    pub const fn has_contents(self) -> bool {
        matches!(self, Self::Data | Self::Allocation)
    }
}

/// Decoded atom header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Atom {
    /// Total bytes including header, multiple of 16
    pub length: u32,
    pub identifier: AtomTag,
    /// Length of the preceding atom (0 for the root)
    pub previous: u32,
    /// Unused, must be zero
    pub reserved: u32,
}

impl Atom {
    #[inline]
    pub const fn new(identifier: AtomTag, length: u32, previous: u32) -> Self {
        Self { length, identifier, previous, reserved: 0 }
    }

    /// Decode the header at `offset`
    ///
    /// # Panics
    ///
    /// Panics if fewer than 16 bytes remain at `offset`.
    #[inline]
    pub fn read(bytes: &[u8], offset: u32) -> Self {
        let [length, identifier, previous, reserved] = load::<[u32; 4]>(bytes, offset as usize);
        Self { length, identifier: AtomTag::from_raw(identifier), previous, reserved }
    }

    /// Encode the header at `offset`
    ///
    /// # Panics
    ///
    /// Panics if fewer than 16 bytes remain at `offset`.
    #[inline]
    pub fn write(&self, bytes: &mut [u8], offset: u32) {
        let fields = [self.length, self.identifier.raw(), self.previous, self.reserved];
        store(bytes, offset as usize, fields);
    }

    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.length == HEADER_LENGTH
    }

    #[inline]
    pub const fn contents_size(&self) -> u32 {
        self.length.saturating_sub(HEADER_LENGTH)
    }

    /// Number of whole `T`s that fit in the payload
    #[inline]
    pub fn capacity<T: TrivialLayout>(&self) -> u32 {
        self.contents_size() / T::SIZE as u32
    }
}
