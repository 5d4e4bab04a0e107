//! Streams entries into an image and assembles its volume descriptor set.

use crate::{
  entry::{Entry, EntryHeader},
  name::Level,
  path::IsoPath,
  prelude::*,
  rock_ridge::RockRidgeRevision,
  serialize,
  spec::{
    self, DigitsDate, TextEncoding, VolumeDescriptor, VolumeDescriptorSetTerminator,
    VolumeDescriptorType, JOLIET_ESCAPE_SEQUENCES, SECTOR_SIZE, SYSTEM_AREA_SECTORS,
  },
  writer::{self, DirectoryWriter, Flavor, VolumeLayout},
};
use chrono::{DateTime, Utc};
use std::{
  collections::HashMap,
  io::{self, Read, Seek, Write},
};

const SECTOR: u64 = SECTOR_SIZE as u64;

/// A directory hierarchy recorded in the image, each with its own descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Variant {
  /// Plain ISO 9660 identifiers.
  Iso9660,
  /// ISO 9660 identifiers with Rock Ridge entries.
  RockRidge,
  /// Joliet UCS-2 identifiers.
  Joliet,
}

/// Text fields of every volume descriptor.
#[derive(Debug, Clone)]
pub struct VolumeInfo {
  pub system_identifier: String,
  pub volume_identifier: String,
  pub volume_set_identifier: String,
  pub publisher_identifier: String,
  pub data_preparer_identifier: String,
  pub application_identifier: String,
}

impl Default for VolumeInfo {
  fn default() -> Self {
    Self {
      system_identifier: "LINUX".to_string(),
      volume_identifier: "ISOFORGE".to_string(),
      volume_set_identifier: String::new(),
      publisher_identifier: String::new(),
      data_preparer_identifier: String::new(),
      application_identifier: "ISOFORGE".to_string(),
    }
  }
}

#[derive(Debug, Clone)]
pub struct ImageOptions {
  pub level: Level,
  /// Hierarchies to record; the first one gets the primary volume descriptor.
  pub variants: Vec<Variant>,
  pub rock_ridge: RockRidgeRevision,
  pub volume: VolumeInfo,
  /// Volume creation time, also used for entries without timestamps.
  pub timestamp: DateTime<Utc>,
}

impl ImageOptions {
  /// A single plain ISO 9660 level 1 hierarchy.
  pub fn compatibility() -> Self {
    Self {
      variants: vec![Variant::Iso9660],
      ..Default::default()
    }
  }

  fn validate(&self) -> Result<()> {
    match self.variants.first() {
      None => {
        return Err(Error::InvalidOptions(
          "at least one variant is required".to_string(),
        ));
      }
      Some(Variant::Joliet) => {
        return Err(Error::InvalidOptions(
          "the primary hierarchy cannot be Joliet".to_string(),
        ));
      }
      Some(_) => {}
    }

    for (i, variant) in self.variants.iter().enumerate() {
      if self.variants[..i].contains(variant) {
        return Err(Error::InvalidOptions(format!(
          "variant {variant:?} requested twice"
        )));
      }
    }

    Ok(())
  }
}

impl Default for ImageOptions {
  fn default() -> Self {
    Self {
      level: Level::One,
      variants: vec![Variant::RockRidge, Variant::Joliet],
      rock_ridge: RockRidgeRevision::default(),
      volume: VolumeInfo::default(),
      timestamp: Utc::now(),
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
  /// Nothing written yet; the descriptor set area is not reserved.
  Header,
  Body,
}

#[derive(Debug)]
struct OpenEntry {
  path: String,
  declared: u64,
  written: u64,
}

/// Image sink: file content is written as entries arrive, the directory
/// hierarchies and descriptors when the archive is closed.
pub struct ImageWriter<W> {
  sink: W,
  options: ImageOptions,
  state: State,
  /// Bytes of the image written so far.
  position: u64,
  root: EntryHeader,
  /// Entries by parent path.
  children: HashMap<String, Vec<Entry>>,
  /// Parent paths in first-use order.
  parents: Vec<String>,
  /// Directory paths in creation order.
  directories: Vec<String>,
  /// Every entry path, mapped to whether it is a directory.
  paths: HashMap<String, bool>,
  open: Option<OpenEntry>,
}

impl<W: Write + Seek> ImageWriter<W> {
  pub fn new(sink: W, options: ImageOptions) -> Result<Self> {
    options.validate()?;

    let root = EntryHeader::directory("").with_modified(options.timestamp);

    Ok(Self {
      sink,
      options,
      state: State::Header,
      position: 0,
      root,
      children: HashMap::new(),
      parents: Vec::new(),
      directories: Vec::new(),
      paths: HashMap::new(),
      open: None,
    })
  }

  pub fn options(&self) -> &ImageOptions {
    &self.options
  }

  /// Sectors before the first data block: system area, one descriptor per
  /// variant and the set terminator.
  fn header_sectors(&self) -> u64 {
    SYSTEM_AREA_SECTORS as u64 + self.options.variants.len() as u64 + 1
  }

  /// Zero-fills the system area and descriptor set on first use.
  fn reserve_header(&mut self) -> Result<()> {
    if self.state == State::Body {
      return Ok(());
    }

    let length = self.header_sectors() * SECTOR;
    self.sink.seek(io::SeekFrom::Start(0))?;
    io::copy(&mut io::repeat(0).take(length), &mut self.sink)?;
    self.position = length;
    self.state = State::Body;

    log::debug!("Reserved {} header sectors", self.header_sectors());
    Ok(())
  }

  fn pad_sector(&mut self) -> Result<()> {
    let padding = spec::round_to_sector(self.position) - self.position;
    if padding > 0 {
      io::copy(&mut io::repeat(0).take(padding), &mut self.sink)?;
      self.position += padding;
    }
    Ok(())
  }

  fn push(&mut self, parent: String, entry: Entry) {
    if !self.children.contains_key(&parent) {
      self.parents.push(parent.clone());
    }
    self.children.entry(parent).or_default().push(entry);
  }

  /// Starts a new entry. Regular files are written right away with
  /// [`ImageWriter::write`] and finished by [`ImageWriter::close_entry`].
  pub fn create_entry(&mut self, mut header: EntryHeader) -> Result<()> {
    if let Some(open) = &self.open {
      return Err(Error::structural(format!(
        "entry {:?} is still open",
        open.path
      )));
    }

    self.reserve_header()?;

    let path = IsoPath::new(&header.path).normalize();
    header.path = path.clone();

    if path.is_empty() {
      if !header.kind.is_directory() {
        return Err(Error::structural("the root entry must be a directory"));
      }
      log::debug!("Root directory attributes replaced");
      self.root = header;
      return Ok(());
    }

    if self.paths.contains_key(&path) {
      return Err(Error::structural(format!("entry {path:?} created twice")));
    }

    let is_directory = header.kind.is_directory();
    self.paths.insert(path.clone(), is_directory);

    let extent = if header.kind.is_file() {
      let lba = self.position / SECTOR;
      let extent = u32::try_from(lba).map_err(|_| Error::overflow("image", self.position))?;
      u32::try_from(header.size).map_err(|_| Error::overflow(path.clone(), header.size))?;

      self.open = Some(OpenEntry {
        path: path.clone(),
        declared: header.size,
        written: 0,
      });
      extent
    } else {
      0
    };

    if is_directory {
      self.directories.push(path.clone());
    }

    log::debug!("Entry {path:?} ({:?}) at block {extent}", header.kind);

    let (parent, _) = IsoPath::new(&path).split();
    self.push(parent, Entry::new(header, extent));

    Ok(())
  }

  /// Appends content to the open file entry.
  pub fn write(&mut self, buf: &[u8]) -> Result<()> {
    let open = self
      .open
      .as_mut()
      .ok_or_else(|| Error::structural("no file entry is open"))?;

    let written = open.written + buf.len() as u64;
    if written > open.declared {
      return Err(Error::SizeMismatch {
        path: open.path.clone(),
        declared: open.declared,
        written,
      });
    }

    self.sink.write_all(buf)?;
    open.written = written;
    self.position += buf.len() as u64;

    Ok(())
  }

  /// Finishes the open file entry, padding its content to a whole sector.
  pub fn close_entry(&mut self) -> Result<()> {
    let open = self
      .open
      .take()
      .ok_or_else(|| Error::structural("no file entry is open"))?;

    if open.written != open.declared {
      return Err(Error::SizeMismatch {
        path: open.path,
        declared: open.declared,
        written: open.written,
      });
    }

    self.pad_sector()
  }

  /// Creates every missing ancestor directory.
  fn synthesize_parents(&mut self) -> Result<()> {
    let mut pending = self.parents.clone();

    while let Some(path) = pending.pop() {
      if path.is_empty() {
        continue;
      }

      match self.paths.get(&path) {
        Some(true) => continue,
        Some(false) => {
          return Err(Error::structural(format!(
            "{path:?} holds entries but is not a directory"
          )));
        }
        None => {}
      }

      log::debug!("Creating implicit directory {path:?}");

      let header = EntryHeader::directory(path.clone()).with_modified(self.options.timestamp);
      self.paths.insert(path.clone(), true);
      self.directories.push(path.clone());

      let (parent, _) = IsoPath::new(&path).split();
      self.push(parent.clone(), Entry::new(header, 0));
      pending.push(parent);
    }

    Ok(())
  }

  /// Sets every directory's link count to two plus its subdirectory count.
  fn count_links(&mut self) {
    let subdirectories = self
      .children
      .iter()
      .map(|(parent, entries)| {
        let count = entries
          .iter()
          .filter(|entry| entry.header.kind.is_directory())
          .count() as u32;
        (parent.clone(), count)
      })
      .collect::<HashMap<_, _>>();

    let links = |path: &str| 2 + subdirectories.get(path).copied().unwrap_or(0);

    self.root.nlink = links("");
    for entries in self.children.values_mut() {
      for entry in entries
        .iter_mut()
        .filter(|entry| entry.header.kind.is_directory())
      {
        entry.header.nlink = links(&entry.header.path);
      }
    }
  }

  fn write_hierarchy<F: Flavor>(
    &mut self,
    flavor: F,
    directories: &[String],
    first_lba: u32,
  ) -> Result<VolumeLayout> {
    let mut writer = DirectoryWriter::new(flavor, &self.root, self.options.timestamp);

    for directory in directories {
      let children = self
        .children
        .get(directory)
        .map_or(&[][..], Vec::as_slice);
      writer.add(directory, children)?;
    }

    writer.write(&mut self.sink, first_lba)
  }

  fn descriptor(
    &self,
    index: usize,
    variant: Variant,
    layout: &VolumeLayout,
    volume_space_size: u32,
  ) -> VolumeDescriptor {
    let enhanced = variant != Variant::Joliet && self.options.level == Level::Four && index > 0;

    let (descriptor_type, version) = match (index, enhanced) {
      (0, _) => (VolumeDescriptorType::Primary, 1),
      (_, true) => (VolumeDescriptorType::Supplementary, 2),
      (_, false) => (VolumeDescriptorType::Supplementary, 1),
    };

    let mut escape_sequences = [0u8; 32];
    let encoding = match variant {
      Variant::Joliet => {
        escape_sequences[..3].copy_from_slice(JOLIET_ESCAPE_SEQUENCES);
        TextEncoding::Ucs2
      }
      _ => TextEncoding::Ascii,
    };

    let volume = &self.options.volume;
    let created = DigitsDate::from(self.options.timestamp);

    VolumeDescriptor {
      descriptor_type,
      version,
      volume_flags: 0,
      encoding,
      system_identifier: volume.system_identifier.clone(),
      volume_identifier: volume.volume_identifier.clone(),
      volume_space_size,
      escape_sequences,
      volume_set_size: 1,
      volume_sequence_number: 1,
      logical_block_size: SECTOR_SIZE as u16,
      path_table_size: layout.path_table_size,
      type_l_path_table_location: layout.type_l_path_table,
      optional_type_l_path_table_location: 0,
      type_m_path_table_location: layout.type_m_path_table,
      optional_type_m_path_table_location: 0,
      root_directory_record: layout.root.clone(),
      volume_set_identifier: volume.volume_set_identifier.clone(),
      publisher_identifier: volume.publisher_identifier.clone(),
      data_preparer_identifier: volume.data_preparer_identifier.clone(),
      application_identifier: volume.application_identifier.clone(),
      copyright_file_identifier: String::new(),
      abstract_file_identifier: String::new(),
      bibliographic_file_identifier: String::new(),
      creation_date: created,
      modification_date: created,
      expiration_date: DigitsDate::default(),
      effective_date: DigitsDate::default(),
      file_structure_version: if enhanced { 2 } else { 1 },
    }
  }

  /// Writes every hierarchy and the volume descriptor set, returning the sink.
  ///
  /// An entry left open is closed first.
  pub fn close_archive(mut self) -> Result<W> {
    if self.open.is_some() {
      self.close_entry()?;
    }

    self.reserve_header()?;
    self.synthesize_parents()?;
    self.count_links();

    let mut directories = std::iter::once(String::new())
      .chain(self.directories.iter().cloned())
      .collect::<Vec<_>>();
    directories.sort_by_key(|path| IsoPath::new(path).depth());

    let mut lba = u32::try_from(self.position / SECTOR)
      .map_err(|_| Error::overflow("image", self.position))?;

    let level = self.options.level;
    let revision = self.options.rock_ridge;
    let mut layouts = Vec::with_capacity(self.options.variants.len());

    for variant in self.options.variants.clone() {
      log::info!("Writing {variant:?} hierarchy at block {lba}");

      let layout = match variant {
        Variant::Iso9660 => {
          self.write_hierarchy(writer::Iso9660 { level }, &directories, lba)?
        }
        Variant::RockRidge => self.write_hierarchy(
          writer::RockRidge { level, revision },
          &directories,
          lba,
        )?,
        Variant::Joliet => self.write_hierarchy(writer::Joliet, &directories, lba)?,
      };

      lba = layout.end_lba;
      layouts.push((variant, layout));
    }

    self
      .sink
      .seek(io::SeekFrom::Start(SYSTEM_AREA_SECTORS as u64 * SECTOR))?;

    for (index, (variant, layout)) in layouts.iter().enumerate() {
      let descriptor = self.descriptor(index, *variant, layout, lba);
      self
        .sink
        .write_all(&serialize::to_bytes(&descriptor, &mut ())?)?;
    }
    self
      .sink
      .write_all(&serialize::to_bytes(&VolumeDescriptorSetTerminator, &mut ())?)?;

    self.sink.seek(io::SeekFrom::End(0))?;
    self.sink.flush()?;

    log::info!(
      "Image complete: {lba} blocks, {} directories",
      directories.len()
    );

    Ok(self.sink)
  }
}

impl<W: Write + Seek> Write for ImageWriter<W> {
  fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
    ImageWriter::write(self, buf).map_err(|e| match e {
      Error::Io(e) => e,
      other => io::Error::other(other),
    })?;
    Ok(buf.len())
  }

  fn flush(&mut self) -> io::Result<()> {
    self.sink.flush()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::entry::EntryKind;
  use std::io::Cursor;

  fn options(variants: Vec<Variant>) -> ImageOptions {
    ImageOptions {
      variants,
      ..ImageOptions::compatibility()
    }
  }

  #[test]
  fn options_are_validated() {
    for variants in [
      vec![],
      vec![Variant::Joliet],
      vec![Variant::Iso9660, Variant::Iso9660],
    ] {
      assert!(matches!(
        ImageWriter::new(Cursor::new(Vec::new()), options(variants)),
        Err(Error::InvalidOptions(_))
      ));
    }
  }

  #[test]
  fn files_start_after_the_descriptor_set() {
    let mut image =
      ImageWriter::new(Cursor::new(Vec::new()), options(vec![Variant::Iso9660])).unwrap();

    image.create_entry(EntryHeader::file("A.TXT", 3)).unwrap();
    image.write(b"abc").unwrap();
    image.close_entry().unwrap();
    image.create_entry(EntryHeader::file("B.TXT", 0)).unwrap();
    image.close_entry().unwrap();

    let extents = image.children[""]
      .iter()
      .map(|entry| entry.extent)
      .collect::<Vec<_>>();
    assert_eq!(extents, [18, 19]);
    assert_eq!(image.position, 19 * 2048);
  }

  #[test]
  fn size_is_enforced() {
    let mut image = ImageWriter::new(Cursor::new(Vec::new()), ImageOptions::default()).unwrap();

    image.create_entry(EntryHeader::file("F", 2)).unwrap();
    assert!(matches!(
      image.write(b"abc"),
      Err(Error::SizeMismatch { written: 3, .. })
    ));
    image.write(b"a").unwrap();
    assert!(matches!(
      image.close_entry(),
      Err(Error::SizeMismatch { written: 1, declared: 2, .. })
    ));
  }

  #[test]
  fn streamed_overrun_keeps_its_error_kind() {
    let mut image = ImageWriter::new(Cursor::new(Vec::new()), ImageOptions::default()).unwrap();
    image.create_entry(EntryHeader::file("F", 2)).unwrap();

    let error = io::copy(&mut &b"abc"[..], &mut image).unwrap_err();
    assert!(matches!(
      Error::from_io(error),
      Error::SizeMismatch { declared: 2, written: 3, .. }
    ));

    let error = io::Error::new(io::ErrorKind::UnexpectedEof, "short read");
    assert!(matches!(Error::from_io(error), Error::Io(_)));
  }

  #[test]
  fn implicit_directories_and_link_counts() {
    let mut image = ImageWriter::new(Cursor::new(Vec::new()), ImageOptions::default()).unwrap();
    image
      .create_entry(EntryHeader::new("a/b/dev", EntryKind::Fifo))
      .unwrap();
    image.create_entry(EntryHeader::directory("a/c")).unwrap();

    image.synthesize_parents().unwrap();
    image.count_links();

    assert_eq!(image.root.nlink, 3);
    let a = image.children[""]
      .iter()
      .find(|entry| entry.header.path == "a")
      .unwrap();
    assert_eq!(a.header.nlink, 4);
    assert!(matches!(
      image.create_entry(EntryHeader::directory("a/c")),
      Err(Error::StructuralAssertion(_))
    ));
  }
}
