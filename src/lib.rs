//! Atomheap - relocatable heap inside a single flat buffer
//!
//! Every structure lives in the buffer and is addressed by offset, so two
//! readers that map the same bytes at different base addresses see the same
//! data. The buffer is either:
//! - a mutable resource heap (`AtomHeap`, `Vector`, `ResourceBuffer`), or
//! - an immutable blob written once (`Formatter`, read via `RootResolver`)
//!
//! The heap is single-writer. Hand the bytes to another reader only between
//! mutations.

pub mod layout;
pub mod error;
pub mod buffer;
pub mod atom;
pub mod heap;
pub mod reference;
pub mod vector;
pub mod formatter;
pub mod resource;
pub mod config;
pub mod logging;

// Re-export core types
pub use atom::{end_cursor, root_cursor, validate_layout, Atom, AtomCursor, AtomTag, Atoms};
pub use buffer::AlignedBuffer;
pub use config::HeapConfig;
pub use error::{HeapError, LayoutViolation, ReferenceFault, Result};
pub use formatter::Formatter;
pub use heap::{Allocation, AtomHeap, HeapStats};
pub use layout::{Elements, ElementsMut, TrivialLayout, ALIGNMENT};
pub use reference::{ArrayRef, RootResolver, VectorRef};
pub use resource::ResourceBuffer;
pub use vector::Vector;
