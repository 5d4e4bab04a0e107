//! Captures a host directory tree into an image.

use crate::{
  entry::{EntryHeader, EntryKind, Timestamps},
  image::ImageWriter,
  path::{self, IsoPath},
  prelude::*,
};
use chrono::{DateTime, Utc};
use std::{
  fs,
  io::{self, Seek, Write},
  path::Path,
};

/// Device major and minor numbers of a Linux `dev_t`.
#[cfg(unix)]
fn device_numbers(rdev: u64) -> (u32, u32) {
  let major = ((rdev >> 32) & 0xffff_f000) | ((rdev >> 8) & 0x0000_0fff);
  let minor = ((rdev >> 12) & 0xffff_ff00) | (rdev & 0x0000_00ff);
  (major as u32, minor as u32)
}

#[cfg(unix)]
fn special_kind(metadata: &fs::Metadata) -> EntryKind {
  use std::os::unix::fs::{FileTypeExt, MetadataExt};

  let file_type = metadata.file_type();
  let (major, minor) = device_numbers(metadata.rdev());

  if file_type.is_char_device() {
    EntryKind::CharDevice { major, minor }
  } else if file_type.is_block_device() {
    EntryKind::BlockDevice { major, minor }
  } else if file_type.is_socket() {
    EntryKind::Socket
  } else {
    EntryKind::Fifo
  }
}

#[cfg(not(unix))]
fn special_kind(_metadata: &fs::Metadata) -> EntryKind {
  EntryKind::File
}

/// Builds the header of one host entry.
pub fn header_from_metadata(
  image_path: String,
  metadata: &fs::Metadata,
  host_path: &Path,
) -> Result<EntryHeader> {
  let file_type = metadata.file_type();

  let kind = if file_type.is_dir() {
    EntryKind::Directory
  } else if file_type.is_file() {
    EntryKind::File
  } else if file_type.is_symlink() {
    EntryKind::Symlink(fs::read_link(host_path)?.to_string_lossy().into_owned())
  } else {
    special_kind(metadata)
  };

  let size = if kind.is_file() { metadata.len() } else { 0 };

  let mut header = EntryHeader::new(image_path, kind)
    .with_size(size)
    .with_times(Timestamps {
      created: metadata.created().ok().map(DateTime::<Utc>::from),
      modified: metadata.modified().ok().map(DateTime::<Utc>::from),
      accessed: metadata.accessed().ok().map(DateTime::<Utc>::from),
      ..Default::default()
    });

  #[cfg(unix)]
  {
    use std::os::unix::fs::MetadataExt;

    header = header
      .with_mode(metadata.mode())
      .with_owner(metadata.uid(), metadata.gid())
      .with_nlink(metadata.nlink() as u32)
      .with_serial(metadata.ino() as u32);
    header.times.attributes =
      DateTime::from_timestamp(metadata.ctime(), metadata.ctime_nsec() as u32);
  }

  Ok(header)
}

/// Walks `source` and adds every entry below `destination` in the image.
///
/// Entries are visited parents first and in file name order, so the image
/// layout does not depend on directory iteration order.
pub fn capture<W: Write + Seek>(
  image: &mut ImageWriter<W>,
  source: impl AsRef<Path>,
  destination: &str,
) -> Result<()> {
  let source = source.as_ref();
  let destination = IsoPath::new(destination).normalize();

  log::info!("Capturing {} into {destination:?}", source.display());

  for entry in walkdir::WalkDir::new(source)
    .follow_links(false)
    .sort_by_file_name()
  {
    let entry = entry?;

    let relative = entry
      .path()
      .strip_prefix(source)
      .map_err(|_| {
        Error::structural(format!(
          "{} is outside {}",
          entry.path().display(),
          source.display()
        ))
      })?
      .components()
      .map(|component| component.as_os_str().to_string_lossy())
      .collect::<Vec<_>>()
      .join("/");

    let image_path = match (destination.is_empty(), relative.is_empty()) {
      (_, true) => destination.clone(),
      (true, false) => relative,
      (false, false) => path::join(&destination, &relative),
    };

    let metadata = entry.metadata()?;
    let header = header_from_metadata(image_path, &metadata, entry.path())?;
    let is_file = header.kind.is_file();

    if entry.depth() == 0 && !header.kind.is_directory() {
      return Err(Error::InvalidOptions(format!(
        "{} is not a directory",
        source.display()
      )));
    }

    log::trace!("Capturing {}", entry.path().display());
    image.create_entry(header)?;

    if is_file {
      let mut file = fs::File::open(entry.path())?;
      io::copy(&mut file, image).map_err(Error::from_io)?;
      image.close_entry()?;
    }
  }

  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[cfg(unix)]
  #[test]
  fn device_numbers_follow_glibc_encoding() {
    // makedev(8, 1) and makedev(259, 65536)
    assert_eq!(device_numbers(0x0801), (8, 1));
    assert_eq!(device_numbers(0x1001_0300), (259, 65536));
  }

  #[test]
  fn header_from_regular_file() {
    let dir = std::env::temp_dir().join(format!("isoforge-fs-{}", std::process::id()));
    fs::create_dir_all(&dir).unwrap();
    let file = dir.join("hello.txt");
    fs::write(&file, b"hello").unwrap();

    let metadata = fs::metadata(&file).unwrap();
    let header = header_from_metadata("hello.txt".to_string(), &metadata, &file).unwrap();
    assert_eq!(header.kind, EntryKind::File);
    assert_eq!(header.size, 5);
    assert!(header.times.modified.is_some());

    fs::remove_dir_all(&dir).unwrap();
  }

  #[test]
  fn capture_streams_file_content() {
    let dir = std::env::temp_dir().join(format!("isoforge-capture-{}", std::process::id()));
    fs::create_dir_all(dir.join("sub")).unwrap();
    fs::write(dir.join("sub").join("data.bin"), b"payload").unwrap();

    let options = crate::image::ImageOptions::compatibility();
    let mut image = ImageWriter::new(io::Cursor::new(Vec::new()), options).unwrap();
    capture(&mut image, &dir, "/").unwrap();
    let bytes = image.close_archive().unwrap().into_inner();

    assert_eq!(&bytes[18 * 2048..18 * 2048 + 7], b"payload");
    assert_eq!(bytes.len() % 2048, 0);

    fs::remove_dir_all(&dir).unwrap();
  }
}
