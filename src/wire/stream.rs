//! Little-endian primitive reads and writes over `std::io` streams.

use std::io::{Read, Write};

use super::{check_len, WireError, WireResult};

macro_rules! primitive_io {
    ($read:ident, $write:ident, $ty:ty) => {
        /// Read a little-endian value from the stream.
        pub fn $read(r: &mut dyn Read) -> WireResult<$ty> {
            let mut buf = [0u8; std::mem::size_of::<$ty>()];
            r.read_exact(&mut buf)?;
            Ok(<$ty>::from_le_bytes(buf))
        }

        /// Write a little-endian value to the stream.
        pub fn $write(w: &mut dyn Write, value: $ty) -> WireResult<()> {
            w.write_all(&value.to_le_bytes())?;
            Ok(())
        }
    };
}

primitive_io!(read_u16, write_u16, u16);
primitive_io!(read_u32, write_u32, u32);
primitive_io!(read_i32, write_i32, i32);
primitive_io!(read_f32, write_f32, f32);
primitive_io!(read_f64, write_f64, f64);

/// Read a single-byte boolean. Any nonzero byte is true.
pub fn read_bool(r: &mut dyn Read) -> WireResult<bool> {
    let mut buf = [0u8; 1];
    r.read_exact(&mut buf)?;
    Ok(buf[0] != 0)
}

/// Write a single-byte boolean.
pub fn write_bool(w: &mut dyn Write, value: bool) -> WireResult<()> {
    w.write_all(&[u8::from(value)])?;
    Ok(())
}

/// Read a length-prefixed string: u16 byte length, then UTF-8 bytes.
pub fn read_string(r: &mut dyn Read) -> WireResult<String> {
    let len = read_u16(r)? as usize;
    let mut buf = vec![0u8; len];
    r.read_exact(&mut buf)?;
    String::from_utf8(buf).map_err(|_| WireError::BadString)
}

/// Write a length-prefixed string.
///
/// Strings longer than `u16::MAX` bytes are rejected rather than truncated.
pub fn write_string(w: &mut dyn Write, value: &str) -> WireResult<()> {
    let len = u32::try_from(value.len()).unwrap_or(u32::MAX);
    if len > u16::MAX as u32 {
        return Err(WireError::BadLength {
            kind: "string",
            len,
        });
    }
    write_u16(w, len as u16)?;
    w.write_all(value.as_bytes())?;
    Ok(())
}

/// Read a u32 element count and sanity-check it.
pub fn read_count(r: &mut dyn Read, kind: &'static str) -> WireResult<usize> {
    let len = read_u32(r)?;
    check_len(kind, len)
}
