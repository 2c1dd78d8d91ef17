//! Atoms - self-describing, length-prefixed regions of a heap buffer
//!
//! Design: A buffer is a contiguous chain of 16-byte headers, each followed by
//! its payload:
//!
//! ```text
//!  [length] 'data'            root (payload optional)
//!  [length] 'free'?
//! ([length] 'aloc'
//!  [length] 'free'?)*
//!  [    16] 'end '            sentinel
//! ```
//!
//! Forward steps add the current length, backward steps subtract `previous`.

mod header;
mod cursor;
mod validate;


pub use header::{Atom, AtomTag, HEADER_LENGTH, MIN_CONTENTS_LENGTH};
pub use cursor::{end_cursor, root_cursor, AtomCursor, Atoms};
pub use validate::{
    check_layout, valid_alignment_and_length, valid_end, valid_root, validate_layout,
};
