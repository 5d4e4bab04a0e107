//! ISO 9660 on-disk structures, including the fields Joliet and Rock Ridge volumes rely on.

use crate::{
  name::encode_ucs2,
  prelude::*,
  serialize::{self, Endianness, IsoSerialize},
};

/// Logical block size. Every extent is a multiple of this.
pub const SECTOR_SIZE: u32 = 2048;

/// Sectors 0..=15 form the system area; the volume descriptor set starts at 16.
pub const SYSTEM_AREA_SECTORS: u32 = 16;

/// Levels of the directory hierarchy, root included (ISO 9660 6.8.2.1).
pub const MAX_DIRECTORY_DEPTH: usize = 8;

/// Largest even directory record length.
pub const MAX_RECORD_LENGTH: usize = 254;

pub const STANDARD_IDENTIFIER: &[u8; 5] = b"CD001";

/// Joliet UCS-2 level 3 escape sequence.
pub const JOLIET_ESCAPE_SEQUENCES: &[u8; 3] = b"%/E";

/// Rounds `value` up to the next multiple of [`SECTOR_SIZE`].
pub fn round_to_sector(value: u64) -> u64 {
  value.div_ceil(SECTOR_SIZE as u64) * SECTOR_SIZE as u64
}

bitflags::bitflags! {
  #[derive(Debug, Clone, Copy, PartialEq, Eq)]
  pub struct FileFlags: u8 {
    const EXISTENCE = 1 << 0;
    const DIRECTORY = 1 << 1;
    const ASSOCIATED_FILE = 1 << 2;
    const RECORD = 1 << 3;
    const PROTECTION = 1 << 4;
    const RESERVED_5 = 1 << 5;
    const RESERVED_6 = 1 << 6;
    const MULTI_EXTENT = 1 << 7;
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VolumeDescriptorType {
  BootRecord,
  Primary,
  Supplementary,
  Partition,
  Terminator,
}

impl From<VolumeDescriptorType> for u8 {
  fn from(value: VolumeDescriptorType) -> u8 {
    match value {
      VolumeDescriptorType::BootRecord => 0,
      VolumeDescriptorType::Primary => 1,
      VolumeDescriptorType::Supplementary => 2,
      VolumeDescriptorType::Partition => 3,
      VolumeDescriptorType::Terminator => 255,
    }
  }
}

/// Seven byte recording date used by directory records and `TF` entries (ISO 9660 9.1.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NumericalDate {
  pub years_since_1900: u8,
  pub month: u8,
  pub day: u8,
  pub hour: u8,
  pub minute: u8,
  pub second: u8,
  /// Offset from GMT in 15 minute intervals.
  pub gmt_offset: i8,
}

impl NumericalDate {
  pub const LENGTH: usize = 7;

  pub(crate) fn write(&self, out: &mut [u8]) {
    out[0] = self.years_since_1900;
    out[1] = self.month;
    out[2] = self.day;
    out[3] = self.hour;
    out[4] = self.minute;
    out[5] = self.second;
    out[6] = self.gmt_offset as u8;
  }
}

impl<Tz: chrono::TimeZone> From<chrono::DateTime<Tz>> for NumericalDate {
  fn from(dt: chrono::DateTime<Tz>) -> Self {
    use chrono::{Datelike, Offset, Timelike};

    Self {
      years_since_1900: (dt.year().clamp(1900, 2155) - 1900) as u8,
      month: dt.month() as u8,
      day: dt.day() as u8,
      hour: dt.hour() as u8,
      minute: dt.minute() as u8,
      second: dt.second().min(59) as u8,
      gmt_offset: (dt.offset().fix().local_minus_utc() / 900) as i8,
    }
  }
}

#[cfg(feature = "time")]
impl From<time::OffsetDateTime> for NumericalDate {
  fn from(dt: time::OffsetDateTime) -> Self {
    Self {
      years_since_1900: (dt.year().clamp(1900, 2155) - 1900) as u8,
      month: u8::from(dt.month()),
      day: dt.day(),
      hour: dt.hour(),
      minute: dt.minute(),
      second: dt.second(),
      gmt_offset: (dt.offset().whole_seconds() / 900) as i8,
    }
  }
}

/// Seventeen byte digit date used by volume descriptors (ISO 9660 8.4.26.1).
///
/// The default value is the "not specified" date: sixteen `'0'` digits and a zero offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DigitsDate {
  pub year: u16,
  pub month: u8,
  pub day: u8,
  pub hour: u8,
  pub minute: u8,
  pub second: u8,
  pub hundredths: u8,
  pub gmt_offset: i8,
}

impl DigitsDate {
  pub const LENGTH: usize = 17;

  pub(crate) fn write(&self, out: &mut [u8]) {
    let digits = format!(
      "{:04}{:02}{:02}{:02}{:02}{:02}{:02}",
      self.year.min(9999),
      self.month,
      self.day,
      self.hour,
      self.minute,
      self.second,
      self.hundredths
    );
    out[..16].copy_from_slice(&digits.as_bytes()[..16]);
    out[16] = self.gmt_offset as u8;
  }
}

impl<Tz: chrono::TimeZone> From<chrono::DateTime<Tz>> for DigitsDate {
  fn from(dt: chrono::DateTime<Tz>) -> Self {
    use chrono::{Datelike, Offset, Timelike};

    Self {
      year: dt.year().clamp(0, 9999) as u16,
      month: dt.month() as u8,
      day: dt.day() as u8,
      hour: dt.hour() as u8,
      minute: dt.minute() as u8,
      second: dt.second().min(59) as u8,
      hundredths: (dt.timestamp_subsec_millis().min(999) / 10) as u8,
      gmt_offset: (dt.offset().fix().local_minus_utc() / 900) as i8,
    }
  }
}

#[cfg(feature = "time")]
impl From<time::OffsetDateTime> for DigitsDate {
  fn from(dt: time::OffsetDateTime) -> Self {
    Self {
      year: dt.year().clamp(0, 9999) as u16,
      month: u8::from(dt.month()),
      day: dt.day(),
      hour: dt.hour(),
      minute: dt.minute(),
      second: dt.second(),
      hundredths: (dt.millisecond() / 10) as u8,
      gmt_offset: (dt.offset().whole_seconds() / 900) as i8,
    }
  }
}

/// Directory record (ISO 9660 9.1).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryRecord {
  pub extended_attribute_length: u8,
  pub extent_location: u32,
  pub data_length: u32,
  pub recording_date: NumericalDate,
  pub file_flags: FileFlags,
  pub file_unit_size: u8,
  pub interleave_gap_size: u8,
  pub volume_sequence_number: u16,
  pub file_identifier: Vec<u8>,
  /// Raw system use bytes, empty for plain ISO 9660 and Joliet.
  pub system_use: Vec<u8>,
}

impl DirectoryRecord {
  /// Length of the fields preceding the file identifier.
  pub const FIXED_LENGTH: usize = 33;

  /// Fixed fields, identifier and the padding byte that follows an even-length identifier.
  pub fn base_length(identifier_length: usize) -> usize {
    Self::FIXED_LENGTH + identifier_length + (identifier_length % 2 == 0) as usize
  }

  /// Full record length, padded to an even number of bytes.
  pub fn length(identifier_length: usize, system_use_length: usize) -> usize {
    let length = Self::base_length(identifier_length) + system_use_length;
    length + length % 2
  }
}

impl IsoSerialize for DirectoryRecord {
  type Context = ();

  fn extent(&self) -> usize {
    Self::length(self.file_identifier.len(), self.system_use.len())
  }

  fn serialize(&self, _context: &mut (), out: &mut [u8]) -> Result<()> {
    let extent = self.extent();

    if extent > MAX_RECORD_LENGTH {
      return Err(Error::structural(format!(
        "directory record for {:?} is {extent} bytes",
        String::from_utf8_lossy(&self.file_identifier)
      )));
    }

    serialize::ensure_extent(out, extent, "directory record")?;

    let out = &mut out[..extent];
    out.fill(0);
    out[0] = extent as u8;
    out[1] = self.extended_attribute_length;
    serialize::write_both_u32(&mut out[2..10], self.extent_location);
    serialize::write_both_u32(&mut out[10..18], self.data_length);
    self.recording_date.write(&mut out[18..25]);
    out[25] = self.file_flags.bits();
    out[26] = self.file_unit_size;
    out[27] = self.interleave_gap_size;
    serialize::write_both_u16(&mut out[28..32], self.volume_sequence_number);
    out[32] = self.file_identifier.len() as u8;
    out[33..33 + self.file_identifier.len()].copy_from_slice(&self.file_identifier);

    let system_use_start = Self::base_length(self.file_identifier.len());
    out[system_use_start..system_use_start + self.system_use.len()]
      .copy_from_slice(&self.system_use);

    Ok(())
  }
}

/// Path table record (ISO 9660 9.4).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathTableRecord {
  pub extended_attribute_record_length: u8,
  pub extent_location: u32,
  pub parent_directory_number: u16,
  pub directory_identifier: Vec<u8>,
}

impl IsoSerialize for PathTableRecord {
  type Context = Endianness;

  fn extent(&self) -> usize {
    let length = self.directory_identifier.len();
    8 + length + length % 2
  }

  fn serialize(&self, endianness: &mut Endianness, out: &mut [u8]) -> Result<()> {
    let extent = self.extent();
    serialize::ensure_extent(out, extent, "path table record")?;

    let out = &mut out[..extent];
    out.fill(0);
    out[0] = self.directory_identifier.len() as u8;
    out[1] = self.extended_attribute_record_length;
    serialize::write_u32(&mut out[2..6], self.extent_location, *endianness);
    serialize::write_u16(&mut out[6..8], self.parent_directory_number, *endianness);
    out[8..8 + self.directory_identifier.len()].copy_from_slice(&self.directory_identifier);

    Ok(())
  }
}

/// How the text fields of a volume descriptor are encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextEncoding {
  /// a-/d-characters padded with spaces.
  Ascii,
  /// UCS-2 big-endian padded with `0x0020`, as Joliet requires.
  Ucs2,
}

/// Primary, supplementary or enhanced volume descriptor (ISO 9660 8.4 and 8.5).
#[derive(Debug, Clone)]
pub struct VolumeDescriptor {
  pub descriptor_type: VolumeDescriptorType,
  pub version: u8,
  pub volume_flags: u8,
  pub encoding: TextEncoding,
  pub system_identifier: String,
  pub volume_identifier: String,
  pub volume_space_size: u32,
  pub escape_sequences: [u8; 32],
  pub volume_set_size: u16,
  pub volume_sequence_number: u16,
  pub logical_block_size: u16,
  pub path_table_size: u32,
  pub type_l_path_table_location: u32,
  pub optional_type_l_path_table_location: u32,
  pub type_m_path_table_location: u32,
  pub optional_type_m_path_table_location: u32,
  /// Root record as stored at byte 156; always 34 bytes.
  pub root_directory_record: DirectoryRecord,
  pub volume_set_identifier: String,
  pub publisher_identifier: String,
  pub data_preparer_identifier: String,
  pub application_identifier: String,
  pub copyright_file_identifier: String,
  pub abstract_file_identifier: String,
  pub bibliographic_file_identifier: String,
  pub creation_date: DigitsDate,
  pub modification_date: DigitsDate,
  pub expiration_date: DigitsDate,
  pub effective_date: DigitsDate,
  pub file_structure_version: u8,
}

fn write_text(out: &mut [u8], text: &str, encoding: TextEncoding) -> Result<()> {
  match encoding {
    TextEncoding::Ascii => {
      out.fill(b' ');
      let bytes = text.as_bytes();
      let length = bytes.len().min(out.len());
      out[..length].copy_from_slice(&bytes[..length]);
    }
    TextEncoding::Ucs2 => {
      for pair in out.chunks_mut(2) {
        pair[0] = 0;
        if let Some(low) = pair.get_mut(1) {
          *low = b' ';
        }
      }
      let encoded = encode_ucs2(text)?;
      let length = encoded.len().min(out.len() & !1);
      out[..length].copy_from_slice(&encoded[..length]);
    }
  }
  Ok(())
}

impl IsoSerialize for VolumeDescriptor {
  type Context = ();

  fn extent(&self) -> usize {
    SECTOR_SIZE as usize
  }

  fn serialize(&self, _context: &mut (), out: &mut [u8]) -> Result<()> {
    serialize::ensure_extent(out, self.extent(), "volume descriptor")?;

    let out = &mut out[..self.extent()];
    let encoding = self.encoding;
    out.fill(0);

    out[0] = self.descriptor_type.into();
    out[1..6].copy_from_slice(STANDARD_IDENTIFIER);
    out[6] = self.version;
    out[7] = self.volume_flags;
    write_text(&mut out[8..40], &self.system_identifier, encoding)?;
    write_text(&mut out[40..72], &self.volume_identifier, encoding)?;
    serialize::write_both_u32(&mut out[80..88], self.volume_space_size);
    out[88..120].copy_from_slice(&self.escape_sequences);
    serialize::write_both_u16(&mut out[120..124], self.volume_set_size);
    serialize::write_both_u16(&mut out[124..128], self.volume_sequence_number);
    serialize::write_both_u16(&mut out[128..132], self.logical_block_size);
    serialize::write_both_u32(&mut out[132..140], self.path_table_size);
    serialize::write_u32(
      &mut out[140..144],
      self.type_l_path_table_location,
      Endianness::Little,
    );
    serialize::write_u32(
      &mut out[144..148],
      self.optional_type_l_path_table_location,
      Endianness::Little,
    );
    serialize::write_u32(
      &mut out[148..152],
      self.type_m_path_table_location,
      Endianness::Big,
    );
    serialize::write_u32(
      &mut out[152..156],
      self.optional_type_m_path_table_location,
      Endianness::Big,
    );

    if self.root_directory_record.extent() != 34 {
      return Err(Error::structural(
        "root directory record in a volume descriptor must be 34 bytes",
      ));
    }
    self.root_directory_record.serialize(&mut (), &mut out[156..190])?;

    write_text(&mut out[190..318], &self.volume_set_identifier, encoding)?;
    write_text(&mut out[318..446], &self.publisher_identifier, encoding)?;
    write_text(&mut out[446..574], &self.data_preparer_identifier, encoding)?;
    write_text(&mut out[574..702], &self.application_identifier, encoding)?;
    write_text(&mut out[702..739], &self.copyright_file_identifier, encoding)?;
    write_text(&mut out[739..776], &self.abstract_file_identifier, encoding)?;
    write_text(&mut out[776..813], &self.bibliographic_file_identifier, encoding)?;
    self.creation_date.write(&mut out[813..830]);
    self.modification_date.write(&mut out[830..847]);
    self.expiration_date.write(&mut out[847..864]);
    self.effective_date.write(&mut out[864..881]);
    out[881] = self.file_structure_version;

    Ok(())
  }
}

#[derive(Debug)]
pub struct VolumeDescriptorSetTerminator;

impl IsoSerialize for VolumeDescriptorSetTerminator {
  type Context = ();

  fn extent(&self) -> usize {
    SECTOR_SIZE as usize
  }

  fn serialize(&self, _context: &mut (), out: &mut [u8]) -> Result<()> {
    serialize::ensure_extent(out, self.extent(), "volume descriptor set terminator")?;

    let out = &mut out[..self.extent()];
    out.fill(0);
    out[0] = VolumeDescriptorType::Terminator.into();
    out[1..6].copy_from_slice(STANDARD_IDENTIFIER);
    out[6] = 1;

    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use chrono::TimeZone;

  fn record(identifier: &[u8], system_use: &[u8]) -> DirectoryRecord {
    DirectoryRecord {
      extended_attribute_length: 0,
      extent_location: 20,
      data_length: 2048,
      recording_date: NumericalDate::default(),
      file_flags: FileFlags::DIRECTORY,
      file_unit_size: 0,
      interleave_gap_size: 0,
      volume_sequence_number: 1,
      file_identifier: identifier.to_vec(),
      system_use: system_use.to_vec(),
    }
  }

  #[test]
  fn directory_record_lengths_are_even() {
    assert_eq!(record(&[0], &[]).extent(), 34);
    assert_eq!(record(b"HELLO.TXT;1", &[]).extent(), 44);
    assert_eq!(record(b"AB", &[]).extent(), 36);
    assert_eq!(record(b"AB", &[1, 2, 3]).extent(), 40);
  }

  #[test]
  fn directory_record_layout() {
    let bytes = crate::serialize::to_bytes(&record(b"DIR", b"RE\x04\x01"), &mut ()).unwrap();

    assert_eq!(bytes.len(), 40);
    assert_eq!(bytes[0], 40);
    assert_eq!(&bytes[2..10], &[20, 0, 0, 0, 0, 0, 0, 20]);
    assert_eq!(&bytes[10..18], &[0, 8, 0, 0, 0, 0, 8, 0]);
    assert_eq!(bytes[25], FileFlags::DIRECTORY.bits());
    assert_eq!(&bytes[28..32], &[1, 0, 0, 1]);
    assert_eq!(bytes[32], 3);
    assert_eq!(&bytes[33..36], b"DIR");
    assert_eq!(&bytes[36..40], b"RE\x04\x01");
  }

  #[test]
  fn oversized_record_is_rejected() {
    let oversized = record(&[b'A'; 200], &[0; 60]);
    assert!(matches!(
      crate::serialize::to_bytes(&oversized, &mut ()),
      Err(Error::StructuralAssertion(_))
    ));
  }

  #[test]
  fn path_table_record_endianness() {
    let record = PathTableRecord {
      extended_attribute_record_length: 0,
      extent_location: 0x0000_0102,
      parent_directory_number: 1,
      directory_identifier: b"ABC".to_vec(),
    };

    let little = crate::serialize::to_bytes(&record, &mut Endianness::Little).unwrap();
    let big = crate::serialize::to_bytes(&record, &mut Endianness::Big).unwrap();

    assert_eq!(little, b"\x03\x00\x02\x01\x00\x00\x01\x00ABC\x00");
    assert_eq!(big, b"\x03\x00\x00\x00\x01\x02\x00\x01ABC\x00");
  }

  #[test]
  fn dates_from_chrono() {
    let dt = chrono::Utc.with_ymd_and_hms(2024, 3, 9, 12, 30, 45).unwrap();

    let numerical = NumericalDate::from(dt);
    assert_eq!(numerical.years_since_1900, 124);
    assert_eq!((numerical.month, numerical.day), (3, 9));
    assert_eq!(numerical.gmt_offset, 0);

    let mut digits = [0u8; 17];
    DigitsDate::from(dt).write(&mut digits);
    assert_eq!(&digits[..16], b"2024030912304500");

    DigitsDate::default().write(&mut digits);
    assert_eq!(&digits[..16], b"0000000000000000");
  }
}
