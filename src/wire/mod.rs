//! Binary stream primitives shared by every wire format in the crate.
//!
//! Two formats sit on top of these helpers:
//!
//! - **Flat**: fields in a fixed order, nothing optional. Used for plain
//!   resource/scene serialization.
//! - **Versioned**: each record is prefixed by a [`BitVector`] of content
//!   flags saying which logical fields follow. Unset bits are skipped on read
//!   and the in-memory field keeps its default. Used for replicated network
//!   traffic, where old and new clients must coexist.
//!
//! Everything is little-endian. Collections are length-prefixed with a u32
//! count; strings with a u16 byte length.

mod bitvec;
mod stream;

pub use bitvec::BitVector;
pub use stream::{
    read_bool, read_f32, read_f64, read_i32, read_string, read_u16, read_u32, write_bool,
    write_f32, write_f64, write_i32, write_string, write_u16, write_u32,
};

use thiserror::Error;

/// Failure while encoding or decoding a stream.
///
/// Reads are total over arbitrary input: a malformed stream yields an error,
/// never a panic.
#[derive(Debug, Error)]
pub enum WireError {
    /// Underlying stream failure (includes truncation).
    #[error("stream i/o: {0}")]
    Io(#[from] std::io::Error),

    /// A discriminant tag outside the defined range for its type.
    #[error("unknown {kind} tag {tag}")]
    BadTag {
        /// Which tagged family the value belongs to.
        kind: &'static str,
        /// The offending value.
        tag: i64,
    },

    /// A length prefix exceeding the sanity bound for its collection.
    #[error("implausible {kind} length {len}")]
    BadLength {
        /// Which collection carried the prefix.
        kind: &'static str,
        /// The offending count.
        len: u32,
    },

    /// String bytes that are not valid UTF-8.
    #[error("invalid utf-8 in string field")]
    BadString,
}

/// Result alias for wire operations.
pub type WireResult<T> = Result<T, WireError>;

/// Upper bound accepted for any length-prefixed collection.
///
/// Real scenes keep these lists tiny; anything near the bound is a corrupt or
/// hostile stream and is rejected before allocation.
pub const MAX_WIRE_LEN: u32 = 1 << 20;

/// Validate a count read from the stream against [`MAX_WIRE_LEN`].
pub fn check_len(kind: &'static str, len: u32) -> WireResult<usize> {
    if len > MAX_WIRE_LEN {
        return Err(WireError::BadLength { kind, len });
    }
    Ok(len as usize)
}
