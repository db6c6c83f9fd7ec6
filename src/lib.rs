#![warn(rust_2018_idioms)]

//! # OpenType/CFF2 variation support
//!
//! `otvar` reads, interprets, builds, and writes the data structures that make
//! an OpenType font *variable*: the axis definitions (`fvar`), axis remapping
//! (`avar`), the Item Variation Store shared by `HVAR`, `VVAR`, `MVAR`, and
//! CFF2, and the per-glyph metric variation tables.
//!
//! ## Features
//!
//! * **Parse** `fvar`/`avar` and normalize user coordinates into design space,
//!   including segment-map remapping.
//! * **Query** item variation stores: compute region scalars for an instance
//!   and apply deltas through delta-set index maps to adjust glyph metrics
//!   (`HVAR`/`VVAR`) and font-wide values (`MVAR`).
//! * **Build** item variation stores from raw `(location, value)` samples:
//!   infer variation regions, derive the master weight matrix, encode deltas,
//!   and serialize the result byte-exactly.
//!
//! Byte access is provided by the [binary] module; font containers are
//! abstracted behind [tables::FontTableProvider], which yields raw table data
//! by 4-byte tag. Glyph outlines, shaping, and rendering are out of scope.
//!
//! Parsed structures own their storage; no references into the source buffer
//! are retained once parsing returns. Given the same input bytes parsing is
//! deterministic, and given the same sequence of added values the builder
//! produces a byte-identical store.

pub mod binary;
pub mod error;
pub mod metrics;
pub mod size;
pub mod tables;
pub mod tag;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Integer conversions that cannot fail on the platforms the crate supports.
pub trait SafeFrom<T>: Sized {
    fn safe_from(value: T) -> Self;
}

impl SafeFrom<u16> for usize {
    fn safe_from(value: u16) -> usize {
        usize::from(value)
    }
}

impl SafeFrom<u32> for usize {
    fn safe_from(value: u32) -> usize {
        // usize is assumed to be at least 32 bits
        value as usize
    }
}
