use crate::prelude::*;

/// Hands out consecutive, sector-aligned logical block ranges.
#[derive(Debug, Clone)]
pub struct LbaAllocator {
  sector_size: u32,
  next_lba: u32,
}

impl LbaAllocator {
  pub fn new(sector_size: u32, offset: u32) -> Self {
    Self {
      sector_size,
      next_lba: offset,
    }
  }

  /// Reserves enough sectors for `size` bytes and returns the first one.
  ///
  /// A zero-byte allocation returns the current block without advancing.
  pub fn allocate(&mut self, size: u64) -> Result<u32> {
    let lba = self.next_lba;
    let sectors = size.div_ceil(self.sector_size as u64);

    self.next_lba = u32::try_from(self.next_lba as u64 + sectors)
      .map_err(|_| Error::overflow("logical block address", size))?;

    Ok(lba)
  }

  pub fn next_lba(&self) -> u32 {
    self.next_lba
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn allocates_whole_sectors() {
    let mut lba = LbaAllocator::new(2048, 18);
    assert_eq!(lba.allocate(2048).unwrap(), 18);
    assert_eq!(lba.allocate(2049).unwrap(), 19);
    assert_eq!(lba.allocate(0).unwrap(), 21);
    assert_eq!(lba.next_lba(), 21);
  }

  #[test]
  fn overflow_is_reported() {
    let mut lba = LbaAllocator::new(2048, u32::MAX - 1);
    assert!(matches!(lba.allocate(4096), Err(Error::SizeOverflow { .. })));
  }
}
