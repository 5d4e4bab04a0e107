use crate::{prelude::*, spec::SECTOR_SIZE};
use std::io::{self, Read, Seek, Write};

const SECTOR: u64 = SECTOR_SIZE as u64;

/// Sequential writer over whole sectors of the output image.
pub struct SectorWriter<'a, Storage> {
  storage: &'a mut Storage,
  /// Absolute byte position in the image.
  position: u64,
}

impl<'a, Storage> SectorWriter<'a, Storage>
where
  Storage: Write + Seek,
{
  pub fn new(storage: &'a mut Storage, lba: u32) -> Result<Self> {
    let position = lba as u64 * SECTOR;
    storage.seek(io::SeekFrom::Start(position))?;
    Ok(Self { storage, position })
  }

  fn offset(&self) -> u64 {
    self.position % SECTOR
  }

  pub fn lba(&self) -> u64 {
    self.position / SECTOR
  }

  fn write_zeros(&mut self, count: u64) -> Result<()> {
    if count > 0 {
      io::copy(&mut io::repeat(0).take(count), &mut *self.storage)?;
      self.position += count;
    }
    Ok(())
  }

  /// Writes a record that must not cross a sector boundary, moving to the
  /// next sector first if the current one cannot hold it.
  pub fn write_aligned(&mut self, buf: &[u8]) -> Result<()> {
    if buf.len() as u64 > SECTOR {
      return Err(Error::structural(format!(
        "{} byte record cannot be sector aligned",
        buf.len()
      )));
    }

    if self.offset() + buf.len() as u64 > SECTOR {
      self.pad_sector()?;
    }

    log::trace!(
      "Writing {} bytes at sector {}, offset {}",
      buf.len(),
      self.lba(),
      self.offset()
    );

    self.write_contiguous(buf)
  }

  /// Writes bytes that may span sectors.
  pub fn write_contiguous(&mut self, buf: &[u8]) -> Result<()> {
    self.storage.write_all(buf)?;
    self.position += buf.len() as u64;
    Ok(())
  }

  /// Zero-fills the rest of the current sector, if one is partially written.
  pub fn pad_sector(&mut self) -> Result<()> {
    match self.offset() {
      0 => Ok(()),
      offset => self.write_zeros(SECTOR - offset),
    }
  }

  /// Zero-fills up to `offset` bytes past the start of block `lba`.
  pub fn pad_to(&mut self, lba: u32, offset: u32) -> Result<()> {
    let target = lba as u64 * SECTOR + offset as u64;
    if target < self.position {
      return Err(Error::structural(format!(
        "cannot move back from byte {} to byte {target}",
        self.position
      )));
    }
    self.write_zeros(target - self.position)
  }

  /// Asserts that the writer sits at the start of block `lba`.
  pub fn expect_lba(&self, lba: u32, what: &str) -> Result<()> {
    if self.position != lba as u64 * SECTOR {
      return Err(Error::structural(format!(
        "{what} allocated at block {lba} but writer is at byte {}",
        self.position
      )));
    }
    Ok(())
  }
}
