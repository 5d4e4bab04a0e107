//! Conversion of on-disk structures into their byte layout.

use crate::prelude::*;
use byteorder::{BigEndian, ByteOrder, LittleEndian};

/// Byte order of the single-endian fields in a path table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endianness {
  /// Type L path table.
  Little,
  /// Type M path table.
  Big,
}

pub trait IsoSerialize {
  type Context;

  /// Serialized size in bytes.
  fn extent(&self) -> usize;

  /// Writes the structure into `out`, which holds at least [`IsoSerialize::extent`] bytes.
  fn serialize(&self, context: &mut Self::Context, out: &mut [u8]) -> Result<()>;
}

/// Serializes `value` into a freshly allocated buffer of exactly its extent.
pub fn to_bytes<T: IsoSerialize>(value: &T, context: &mut T::Context) -> Result<Vec<u8>> {
  let mut bytes = vec![0; value.extent()];
  value.serialize(context, &mut bytes)?;
  Ok(bytes)
}

/// Both-byte orders 16-bit field (ISO 9660 7.2.3): little-endian then big-endian.
pub(crate) fn write_both_u16(out: &mut [u8], value: u16) {
  LittleEndian::write_u16(&mut out[..2], value);
  BigEndian::write_u16(&mut out[2..4], value);
}

/// Both-byte orders 32-bit field (ISO 9660 7.3.3): little-endian then big-endian.
pub(crate) fn write_both_u32(out: &mut [u8], value: u32) {
  LittleEndian::write_u32(&mut out[..4], value);
  BigEndian::write_u32(&mut out[4..8], value);
}

pub(crate) fn write_u16(out: &mut [u8], value: u16, endianness: Endianness) {
  match endianness {
    Endianness::Little => LittleEndian::write_u16(out, value),
    Endianness::Big => BigEndian::write_u16(out, value),
  }
}

pub(crate) fn write_u32(out: &mut [u8], value: u32, endianness: Endianness) {
  match endianness {
    Endianness::Little => LittleEndian::write_u32(out, value),
    Endianness::Big => BigEndian::write_u32(out, value),
  }
}

pub(crate) fn ensure_extent(out: &[u8], extent: usize, what: &str) -> Result<()> {
  if out.len() < extent {
    return Err(Error::structural(format!(
      "{what} needs {extent} bytes, buffer holds {}",
      out.len()
    )));
  }
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn both_endian_fields() {
    let mut buf = [0u8; 8];
    write_both_u32(&mut buf, 0x0102_0304);
    assert_eq!(buf, [4, 3, 2, 1, 1, 2, 3, 4]);

    let mut buf = [0u8; 4];
    write_both_u16(&mut buf, 2048);
    assert_eq!(buf, [0x00, 0x08, 0x08, 0x00]);
  }
}
