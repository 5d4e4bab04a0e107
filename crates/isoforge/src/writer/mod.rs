//! Lays out one directory hierarchy: directory extents, their continuation
//! areas and both path tables.
//!
//! A [`DirectoryWriter`] collects directories in parent-before-child order,
//! then sizes and serializes the whole tree in a single pass. Path table
//! parent numbers and link counts need the complete tree, so nothing is
//! written until [`DirectoryWriter::write`].

pub mod flavor;
pub mod path_table;
pub mod record;
pub mod sector;

pub use flavor::{Flavor, Iso9660, Joliet, RockRidge};

use crate::{
  entry::{Entry, EntryHeader},
  lba::LbaAllocator,
  name::{self, NameKind},
  path::{self, IsoPath},
  prelude::*,
  rock_ridge::{self, PosixAttributes, SystemUseBuilder, SystemUseEntry},
  serialize::{self, Endianness, IsoSerialize},
  spec::{
    self, DirectoryRecord, FileFlags, NumericalDate, MAX_DIRECTORY_DEPTH, MAX_RECORD_LENGTH,
    SECTOR_SIZE,
  },
};
use chrono::{DateTime, Utc};
use path_table::{ChildRef, Location, PathTable, PathTableEntry};
use record::{Record, RecordKey};
use sector::SectorWriter;
use std::io::{Seek, Write};

/// Name of the directory holding relocated deep directories.
pub const MOVED_DIRECTORY: &str = "rr_moved";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
  Collecting,
  Sizing,
  Serializing,
  Done,
}

/// Both ends of one relocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelocationLink {
  /// Logical parent path.
  pub original_parent: String,
  /// Identifier of the placeholder record in the logical parent.
  pub placeholder: Vec<u8>,
  /// Identifier of the directory inside `rr_moved`.
  pub moved: Vec<u8>,
  pub parent_extent: u32,
  pub relocated_extent: u32,
}

/// Where a written hierarchy ended up, as its volume descriptor records it.
#[derive(Debug, Clone)]
pub struct VolumeLayout {
  pub root: DirectoryRecord,
  pub path_table_size: u32,
  pub type_l_path_table: u32,
  pub type_m_path_table: u32,
  /// First block past the hierarchy.
  pub end_lba: u32,
}

/// Builds records the way a flavor wants them.
struct Recorder<F> {
  flavor: F,
  timestamp: DateTime<Utc>,
}

impl<F: Flavor> Recorder<F> {
  fn system_use(
    &self,
    header: &EntryHeader,
    name: Option<&str>,
    extra: Vec<SystemUseEntry>,
  ) -> Vec<SystemUseEntry> {
    let Some(revision) = self.flavor.rock_ridge() else {
      return Vec::new();
    };

    let mut builder = SystemUseBuilder::new(revision);
    if let Some(name) = name {
      builder = builder.name(name);
    }

    let mut builder = builder
      .posix(PosixAttributes::from_header(header, revision))
      .times(&header.times, self.timestamp)
      .kind(&header.kind);
    for entry in extra {
      builder = builder.push(entry);
    }

    builder.build()
  }

  fn record(
    &self,
    flags: FileFlags,
    header: &EntryHeader,
    name: Option<&str>,
    extra: Vec<SystemUseEntry>,
  ) -> Record {
    let recorded = NumericalDate::from(header.times.recorded().unwrap_or(self.timestamp));
    Record::new(flags, recorded, self.system_use(header, name, extra))
  }

  /// A path table row with its `.` and `..` records.
  fn directory(
    &self,
    identifier: Vec<u8>,
    parent_index: u16,
    path: String,
    header: EntryHeader,
    parent: &EntryHeader,
    parent_extra: Vec<SystemUseEntry>,
  ) -> PathTableEntry {
    let current = self.record(FileFlags::DIRECTORY, &header, None, Vec::new());
    let parent = self.record(FileFlags::DIRECTORY, parent, None, parent_extra);
    PathTableEntry::new(identifier, parent_index, path, header, current, parent)
  }
}

/// Writer of one directory hierarchy, generic over its [`Flavor`].
pub struct DirectoryWriter<F> {
  recorder: Recorder<F>,
  phase: Phase,
  table: PathTable,
  /// Identifier of `rr_moved` once created.
  moved: Option<Vec<u8>>,
  relocations: Vec<RelocationLink>,
  depth_warned: bool,
}

impl<F: Flavor> DirectoryWriter<F> {
  /// `timestamp` dates records whose entries carry no time of their own.
  pub fn new(flavor: F, root: &EntryHeader, timestamp: DateTime<Utc>) -> Self {
    let recorder = Recorder { flavor, timestamp };
    let root = recorder.directory(vec![0], 1, String::new(), root.clone(), root, Vec::new());

    Self {
      recorder,
      phase: Phase::Collecting,
      table: PathTable::new(root),
      moved: None,
      relocations: Vec::new(),
      depth_warned: false,
    }
  }

  pub fn phase(&self) -> Phase {
    self.phase
  }

  pub fn relocations(&self) -> &[RelocationLink] {
    &self.relocations
  }

  fn moved_location(&self) -> Option<Location> {
    self.table.child(Location::ROOT, self.moved.as_ref()?)
  }

  /// Walks the path table from the root, following relocations.
  fn locate(&self, path: &str) -> Option<Location> {
    let mut location = Location::ROOT;

    for component in IsoPath::new(path).components() {
      location = match self.table.get(location).children.get(component)? {
        ChildRef::Local(identifier) => self.table.child(location, identifier)?,
        ChildRef::Relocated(identifier) => self.table.child(self.moved_location()?, identifier)?,
      };
    }

    Some(location)
  }

  /// Lists `children` in the directory at `path`.
  ///
  /// The directory must have been listed by an earlier `add` of its parent,
  /// and may only be added once.
  pub fn add(&mut self, path: &str, children: &[Entry]) -> Result<()> {
    if self.phase != Phase::Collecting {
      return Err(Error::structural(format!(
        "directory {path:?} added after layout began"
      )));
    }

    let path = IsoPath::new(path).normalize();
    let location = self.locate(&path).ok_or_else(|| {
      Error::structural(format!(
        "directory {path:?} was not listed by an added parent"
      ))
    })?;

    let directory = self.table.get_mut(location);
    if directory.populated {
      return Err(Error::structural(format!("directory {path:?} added twice")));
    }
    directory.populated = true;
    let mut claimed = directory.claimed();

    let flavor = &self.recorder.flavor;
    let children = children
      .iter()
      .filter(|child| {
        let included = flavor.includes(&child.header.kind);
        if !included {
          log::warn!(
            "{:?} cannot be represented without Rock Ridge, skipping",
            child.header.path
          );
        }
        included
      })
      .collect::<Vec<_>>();

    let names = children
      .iter()
      .map(|child| {
        let kind = if child.header.kind.is_directory() {
          NameKind::Directory
        } else {
          NameKind::File
        };
        (child.header.name(), kind)
      })
      .collect::<Vec<_>>();
    let resolved = name::resolve_names(flavor.naming(), &names, &mut claimed)?;

    log::debug!(
      "Directory {path:?}: {} entries at level {}",
      children.len(),
      location.level
    );

    for (child, resolved) in children.into_iter().zip(resolved) {
      if !child.header.kind.is_directory() {
        let size = if child.header.kind.is_file() {
          u32::try_from(child.header.size)
            .map_err(|_| Error::overflow(child.header.path.clone(), child.header.size))?
        } else {
          0
        };

        let mut record = self.recorder.record(
          FileFlags::empty(),
          &child.header,
          Some(child.header.name()),
          Vec::new(),
        );
        record.extent = child.extent;
        record.size = size;

        self
          .table
          .get_mut(location)
          .records
          .insert(RecordKey::Name(resolved.identifier), record);
        continue;
      }

      if location.level + 1 >= MAX_DIRECTORY_DEPTH {
        if self.recorder.flavor.rock_ridge().is_some() {
          self.relocate(location, &path, child, resolved.identifier)?;
          continue;
        }

        if !self.depth_warned {
          log::warn!(
            "{:?} is nested deeper than {MAX_DIRECTORY_DEPTH} levels",
            child.header.path
          );
          self.depth_warned = true;
        }
      }

      self.insert_directory(location, &path, child, resolved.identifier)?;
    }

    Ok(())
  }

  fn insert_directory(
    &mut self,
    parent: Location,
    parent_path: &str,
    child: &Entry,
    identifier: Vec<u8>,
  ) -> Result<()> {
    let name = child.header.name();
    let record = self
      .recorder
      .record(FileFlags::DIRECTORY, &child.header, Some(name), Vec::new());

    let directory = self.table.get_mut(parent);
    directory
      .records
      .insert(RecordKey::Name(identifier.clone()), record);
    directory
      .children
      .insert(name.to_string(), ChildRef::Local(identifier.clone()));
    let parent_header = directory.header.clone();

    let entry = self.recorder.directory(
      identifier,
      (parent.index + 1) as u16,
      path::join(parent_path, name),
      child.header.clone(),
      &parent_header,
      Vec::new(),
    );
    self.table.insert(parent.level + 1, entry)?;

    Ok(())
  }

  /// Location of `rr_moved`, created under the root on first use.
  fn moved_directory(&mut self) -> Result<Location> {
    if let Some(location) = self.moved_location() {
      return Ok(location);
    }

    let root = self.table.get(Location::ROOT);
    let root_header = root.header.clone();
    let identifier = name::resolve_names(
      self.recorder.flavor.naming(),
      &[(MOVED_DIRECTORY, NameKind::Directory)],
      &mut root.claimed(),
    )?
    .pop()
    .map(|resolved| resolved.identifier)
    .ok_or_else(|| Error::structural("no identifier resolved for rr_moved"))?;

    let header = EntryHeader::directory(MOVED_DIRECTORY)
      .with_owner(root_header.uid, root_header.gid)
      .with_modified(self.recorder.timestamp);
    let record = self.recorder.record(
      FileFlags::DIRECTORY,
      &header,
      Some(MOVED_DIRECTORY),
      Vec::new(),
    );

    let root = self.table.get_mut(Location::ROOT);
    root
      .records
      .insert(RecordKey::Name(identifier.clone()), record);
    root.header.nlink += 1;

    let mut entry = self.recorder.directory(
      identifier.clone(),
      1,
      MOVED_DIRECTORY.to_string(),
      header,
      &root_header,
      Vec::new(),
    );
    entry.populated = true;
    let location = self.table.insert(1, entry)?;
    self.moved = Some(identifier);

    log::info!(
      "Created {MOVED_DIRECTORY} for directories nested deeper than {MAX_DIRECTORY_DEPTH} levels"
    );
    Ok(location)
  }

  /// Moves a subdirectory of the directory at `parent` under `rr_moved`,
  /// leaving a `CL` placeholder behind.
  fn relocate(
    &mut self,
    parent: Location,
    parent_path: &str,
    child: &Entry,
    placeholder: Vec<u8>,
  ) -> Result<()> {
    let moved = self.moved_directory()?;
    let name = child.header.name();
    let child_path = path::join(parent_path, name);

    let moved_entry = self.table.get(moved);
    let moved_header = moved_entry.header.clone();
    let identifier = name::resolve_names(
      self.recorder.flavor.naming(),
      &[(name, NameKind::Directory)],
      &mut moved_entry.claimed(),
    )?
    .pop()
    .map(|resolved| resolved.identifier)
    .ok_or_else(|| Error::structural(format!("no identifier resolved for {child_path:?}")))?;

    let listing = self.recorder.record(
      FileFlags::DIRECTORY,
      &child.header,
      Some(name),
      vec![SystemUseEntry::Relocated],
    );
    let moved_entry = self.table.get_mut(moved);
    moved_entry
      .records
      .insert(RecordKey::Name(identifier.clone()), listing);
    moved_entry.header.nlink += 1;

    let placeholder_record = self.recorder.record(
      FileFlags::empty(),
      &child.header,
      Some(name),
      vec![SystemUseEntry::ChildLink(0)],
    );
    let directory = self.table.get_mut(parent);
    directory
      .records
      .insert(RecordKey::Name(placeholder.clone()), placeholder_record);
    directory
      .children
      .insert(name.to_string(), ChildRef::Relocated(identifier.clone()));

    let mut entry = self.recorder.directory(
      identifier.clone(),
      (moved.index + 1) as u16,
      child_path.clone(),
      child.header.clone(),
      &moved_header,
      vec![SystemUseEntry::ParentLink(0)],
    );
    entry.relocated_from = Some(parent_path.to_string());
    self.table.insert(moved.level + 1, entry)?;

    log::debug!(
      "Relocated {child_path:?} to {MOVED_DIRECTORY}/{}",
      String::from_utf8_lossy(&identifier)
    );

    self.relocations.push(RelocationLink {
      original_parent: parent_path.to_string(),
      placeholder,
      moved: identifier,
      parent_extent: 0,
      relocated_extent: 0,
    });

    Ok(())
  }

  /// Plans every record's system use and assigns the directory's extent and
  /// continuation area.
  fn size_directory(&mut self, location: Location, allocator: &mut LbaAllocator) -> Result<()> {
    let sector = SECTOR_SIZE as u64;
    let entry = self.table.get_mut(location);
    let mut offset = 0u64;
    let mut area = 0u32;

    for (key, record) in entry.records.iter_mut() {
      let identifier_length = key.identifier().len();
      let lengths = record
        .system_use
        .iter()
        .map(IsoSerialize::extent)
        .collect::<Vec<_>>();
      let available =
        MAX_RECORD_LENGTH.saturating_sub(DirectoryRecord::base_length(identifier_length));

      record.plan = rock_ridge::plan_system_use(&lengths, available, &mut area)?;

      let length = DirectoryRecord::length(identifier_length, record.plan.inline_length) as u64;
      if offset % sector + length > sector {
        offset = offset.div_ceil(sector) * sector;
      }
      offset += length;
    }

    let size = spec::round_to_sector(offset);
    entry.size = u32::try_from(size)
      .map_err(|_| Error::overflow(format!("directory {:?}", entry.path), size))?;
    entry.extent = allocator.allocate(size)?;
    entry.continuation = match area {
      0 => None,
      length => Some((allocator.allocate(length as u64)?, length)),
    };

    log::debug!(
      "Directory {:?}: {} bytes at block {}{}",
      entry.path,
      entry.size,
      entry.extent,
      match entry.continuation {
        Some((lba, length)) => format!(", {length} continuation bytes at block {lba}"),
        None => String::new(),
      }
    );

    Ok(())
  }

  /// Points every `CL` at its relocated directory and every `PL` back at the logical parent.
  fn link_relocations(&mut self) -> Result<()> {
    let moved = match self.moved_location() {
      Some(location) => location,
      None => return Ok(()),
    };

    let mut relocations = std::mem::take(&mut self.relocations);
    for link in relocations.iter_mut() {
      let parent = self.locate(&link.original_parent).ok_or_else(|| {
        Error::structural(format!(
          "relocation parent {:?} not found",
          link.original_parent
        ))
      })?;
      let relocated = self.table.child(moved, &link.moved).ok_or_else(|| {
        Error::structural(format!(
          "relocated directory {:?} not found",
          String::from_utf8_lossy(&link.moved)
        ))
      })?;

      link.parent_extent = self.table.get(parent).extent;
      link.relocated_extent = self.table.get(relocated).extent;

      if let Some(record) = self
        .table
        .get_mut(parent)
        .records
        .get_mut(&RecordKey::Name(link.placeholder.clone()))
      {
        for entry in record.system_use.iter_mut() {
          if let SystemUseEntry::ChildLink(location) = entry {
            *location = link.relocated_extent;
          }
        }
      }

      if let Some(record) = self
        .table
        .get_mut(relocated)
        .records
        .get_mut(&RecordKey::Parent)
      {
        for entry in record.system_use.iter_mut() {
          if let SystemUseEntry::ParentLink(location) = entry {
            *location = link.parent_extent;
          }
        }
      }
    }
    self.relocations = relocations;

    Ok(())
  }

  fn write_directory<W: Write + Seek>(
    &self,
    writer: &mut SectorWriter<'_, W>,
    location: Location,
  ) -> Result<()> {
    let entry = self.table.get(location);
    writer.expect_lba(entry.extent, &format!("directory {:?}", entry.path))?;

    let area_lba = entry.continuation.map_or(0, |(lba, _)| lba);
    let mut pieces = Vec::new();

    for (key, record) in entry.records.iter() {
      let (system_use, spilled) = rock_ridge::render(&record.system_use, &record.plan, area_lba)?;
      pieces.extend(spilled);

      let directory_record = DirectoryRecord {
        extended_attribute_length: 0,
        extent_location: record.extent,
        data_length: record.size,
        recording_date: record.recorded,
        file_flags: record.flags,
        file_unit_size: 0,
        interleave_gap_size: 0,
        volume_sequence_number: 1,
        file_identifier: key.identifier().to_vec(),
        system_use,
      };

      writer.write_aligned(&serialize::to_bytes(&directory_record, &mut ())?)?;
    }
    writer.pad_sector()?;

    if let Some((lba, _)) = entry.continuation {
      writer.expect_lba(lba, &format!("continuation area of {:?}", entry.path))?;
      for (offset, bytes) in pieces {
        writer.pad_to(lba, offset)?;
        writer.write_contiguous(&bytes)?;
      }
      writer.pad_sector()?;
    }

    Ok(())
  }

  /// Sizes and serializes the hierarchy starting at block `first_lba`.
  ///
  /// The sink must be positioned at or before that block; it is left at the
  /// returned `end_lba`.
  pub fn write<W: Write + Seek>(&mut self, sink: &mut W, first_lba: u32) -> Result<VolumeLayout> {
    if self.phase != Phase::Collecting {
      return Err(Error::structural("directory hierarchy already written"));
    }

    self.phase = Phase::Sizing;
    log::info!(
      "Sizing {} directories from block {first_lba}",
      self.table.len()
    );

    if let Some(revision) = self.recorder.flavor.rock_ridge() {
      if let Some(current) = self
        .table
        .get_mut(Location::ROOT)
        .records
        .get_mut(&RecordKey::Current)
      {
        current
          .system_use
          .insert(0, SystemUseEntry::SharingProtocol { skip: 0 });
        current
          .system_use
          .push(SystemUseEntry::ExtensionReference(revision));
      }
    }

    let mut allocator = LbaAllocator::new(SECTOR_SIZE, first_lba);
    for location in self.table.locations() {
      self.size_directory(location, &mut allocator)?;
    }

    let path_table_size = self.table.size()?;
    let type_l_path_table = allocator.allocate(path_table_size as u64)?;
    let type_m_path_table = allocator.allocate(path_table_size as u64)?;

    self.table.propagate(self.recorder.flavor.rock_ridge());
    self.link_relocations()?;

    self.phase = Phase::Serializing;
    log::info!(
      "Writing directories at blocks {first_lba}..{}",
      allocator.next_lba()
    );

    let mut writer = SectorWriter::new(sink, first_lba)?;
    for location in self.table.locations() {
      self.write_directory(&mut writer, location)?;
    }

    let records = self.table.records();
    for (lba, mut endianness) in [
      (type_l_path_table, Endianness::Little),
      (type_m_path_table, Endianness::Big),
    ] {
      writer.expect_lba(lba, "path table")?;
      for record in records.iter() {
        writer.write_contiguous(&serialize::to_bytes(record, &mut endianness)?)?;
      }
      writer.pad_sector()?;
    }

    let end_lba = allocator.next_lba();
    writer.expect_lba(end_lba, "end of directory hierarchy")?;
    self.phase = Phase::Done;

    let root = self.table.get(Location::ROOT);
    let recorded = root
      .records
      .get(&RecordKey::Current)
      .map(|record| record.recorded)
      .ok_or_else(|| Error::structural("root directory has no `.` record"))?;

    Ok(VolumeLayout {
      root: DirectoryRecord {
        extended_attribute_length: 0,
        extent_location: root.extent,
        data_length: root.size,
        recording_date: recorded,
        file_flags: FileFlags::DIRECTORY,
        file_unit_size: 0,
        interleave_gap_size: 0,
        volume_sequence_number: 1,
        file_identifier: vec![0],
        system_use: Vec::new(),
      },
      path_table_size,
      type_l_path_table,
      type_m_path_table,
      end_lba,
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{entry::EntryKind, name::Level, rock_ridge::RockRidgeRevision};
  use chrono::TimeZone;
  use std::io::Cursor;

  fn timestamp() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap()
  }

  fn dir(path: &str) -> Entry {
    Entry::new(EntryHeader::directory(path), 0)
  }

  fn file(path: &str, size: u64, extent: u32) -> Entry {
    Entry::new(EntryHeader::file(path, size), extent)
  }

  fn identifiers(writer: &DirectoryWriter<impl Flavor>, location: Location) -> Vec<Vec<u8>> {
    writer
      .table
      .get(location)
      .records
      .keys()
      .map(|key| key.identifier().to_vec())
      .collect()
  }

  #[test]
  fn records_are_sorted_with_dot_entries_first() {
    let mut writer = DirectoryWriter::new(
      Iso9660 { level: Level::One },
      &EntryHeader::directory(""),
      timestamp(),
    );
    writer
      .add("", &[file("ZETA", 1, 30), dir("ALPHA"), file("BETA.TXT", 2, 31)])
      .unwrap();

    assert_eq!(
      identifiers(&writer, Location::ROOT),
      [
        b"\0".to_vec(),
        b"\x01".to_vec(),
        b"ALPHA".to_vec(),
        b"BETA.TXT;1".to_vec(),
        b"ZETA.;1".to_vec(),
      ]
    );
  }

  #[test]
  fn phases_are_enforced() {
    let mut writer = DirectoryWriter::new(Joliet, &EntryHeader::directory(""), timestamp());
    assert!(matches!(
      writer.add("missing", &[]),
      Err(Error::StructuralAssertion(_))
    ));

    writer.add("", &[dir("a")]).unwrap();
    assert!(matches!(writer.add("", &[]), Err(Error::StructuralAssertion(_))));

    let mut sink = Cursor::new(Vec::new());
    writer.write(&mut sink, 20).unwrap();
    assert_eq!(writer.phase(), Phase::Done);
    assert!(matches!(
      writer.add("a", &[]),
      Err(Error::StructuralAssertion(_))
    ));
    assert!(matches!(
      writer.write(&mut sink, 20),
      Err(Error::StructuralAssertion(_))
    ));
  }

  #[test]
  fn plain_hierarchy_skips_special_files() {
    let mut writer = DirectoryWriter::new(
      Iso9660 { level: Level::Two },
      &EntryHeader::directory(""),
      timestamp(),
    );
    writer
      .add(
        "",
        &[
          file("DATA.BIN", 4, 30),
          Entry::new(EntryHeader::symlink("LINK", "DATA.BIN"), 0),
          Entry::new(EntryHeader::new("FIFO", EntryKind::Fifo), 0),
        ],
      )
      .unwrap();

    assert_eq!(identifiers(&writer, Location::ROOT).len(), 3);
  }

  #[test]
  fn layout_blocks_are_contiguous() {
    let mut writer = DirectoryWriter::new(
      RockRidge {
        level: Level::One,
        revision: RockRidgeRevision::Rrip1991A,
      },
      &EntryHeader::directory(""),
      timestamp(),
    );
    writer.add("", &[dir("a"), file("f", 0, 0)]).unwrap();
    writer.add("a", &[]).unwrap();

    let mut sink = Cursor::new(Vec::new());
    let layout = writer.write(&mut sink, 20).unwrap();

    // Root, its continuation area for `ER`, `a`, then one block per path table.
    assert_eq!(layout.root.extent_location, 20);
    assert_eq!(writer.table.get(Location::ROOT).continuation.map(|c| c.0), Some(21));
    assert_eq!(layout.type_l_path_table, 23);
    assert_eq!(layout.type_m_path_table, 24);
    assert_eq!(layout.end_lba, 25);
    assert_eq!(layout.path_table_size, 10 + 10);
    assert_eq!(sink.get_ref().len(), 25 * 2048);

    let root = &sink.get_ref()[20 * 2048..];
    let system_use = &root[34..];
    assert_eq!(&system_use[..7], b"SP\x07\x01\xBE\xEF\x00");
  }
  #[test]
  fn relocation_links_record_both_extents() {
    let mut writer = DirectoryWriter::new(
      RockRidge {
        level: Level::One,
        revision: RockRidgeRevision::Ieee1282,
      },
      &EntryHeader::directory(""),
      timestamp(),
    );

    let mut parent = String::new();
    for name in ["A", "B", "C", "D", "E", "F", "G", "H"] {
      let child = path::join(&parent, name);
      writer.add(&parent, &[dir(&child)]).unwrap();
      parent = child;
    }
    writer.add(&parent, &[]).unwrap();
    writer.write(&mut Cursor::new(Vec::new()), 20).unwrap();

    let [link] = writer.relocations() else {
      panic!("expected one relocation")
    };
    assert_eq!(link.original_parent, "A/B/C/D/E/F/G");
    assert_eq!(link.placeholder, b"H");
    assert_eq!(link.moved, b"H");

    let g = writer.locate("A/B/C/D/E/F/G").unwrap();
    let h = writer.locate("A/B/C/D/E/F/G/H").unwrap();
    assert_eq!(h.level, 2);
    assert_eq!(link.parent_extent, writer.table.get(g).extent);
    assert_eq!(link.relocated_extent, writer.table.get(h).extent);
    assert!(link.relocated_extent < link.parent_extent);
  }
}
