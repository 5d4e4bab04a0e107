use crate::{
  entry::EntryHeader,
  prelude::*,
  rock_ridge::{PosixAttributes, RockRidgeRevision},
  serialize::IsoSerialize,
  spec::PathTableRecord,
  writer::record::{Record, RecordKey},
};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Position of a directory: path table level (root is 0) and index within it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Location {
  pub level: usize,
  pub index: usize,
}

impl Location {
  pub const ROOT: Location = Location { level: 0, index: 0 };
}

/// How a subdirectory is reached from its logical parent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChildRef {
  /// Identifier of a physical child.
  Local(Vec<u8>),
  /// Identifier of the relocated directory inside `rr_moved`.
  Relocated(Vec<u8>),
}

#[derive(Debug, Clone)]
pub struct PathTableEntry {
  pub identifier: Vec<u8>,
  /// 1-based index of the parent within the previous level; 1 for the root.
  pub parent_index: u16,
  /// Logical path, empty for the root.
  pub path: String,
  pub header: EntryHeader,
  pub extent: u32,
  pub size: u32,
  /// Continuation area block and length in bytes.
  pub continuation: Option<(u32, u32)>,
  pub records: BTreeMap<RecordKey, Record>,
  /// Subdirectories by original name.
  pub children: HashMap<String, ChildRef>,
  /// Whether the directory's own contents were added.
  pub populated: bool,
  /// Logical parent of a relocated directory.
  pub relocated_from: Option<String>,
}

impl PathTableEntry {
  pub fn new(
    identifier: Vec<u8>,
    parent_index: u16,
    path: String,
    header: EntryHeader,
    current: Record,
    parent: Record,
  ) -> Self {
    let mut records = BTreeMap::new();
    records.insert(RecordKey::Current, current);
    records.insert(RecordKey::Parent, parent);

    Self {
      identifier,
      parent_index,
      path,
      header,
      extent: 0,
      size: 0,
      continuation: None,
      records,
      children: HashMap::new(),
      populated: false,
      relocated_from: None,
    }
  }

  /// Identifiers already used by records of this directory.
  pub fn claimed(&self) -> BTreeSet<Vec<u8>> {
    self.records.keys().filter_map(RecordKey::name).cloned().collect()
  }
}

/// Directory hierarchy ordered as the path table lists it: by level, then
/// parent number, then identifier.
#[derive(Debug, Clone)]
pub struct PathTable {
  levels: Vec<Vec<PathTableEntry>>,
}

impl PathTable {
  pub fn new(root: PathTableEntry) -> Self {
    Self {
      levels: vec![vec![root]],
    }
  }

  pub fn get(&self, location: Location) -> &PathTableEntry {
    &self.levels[location.level][location.index]
  }

  pub fn get_mut(&mut self, location: Location) -> &mut PathTableEntry {
    &mut self.levels[location.level][location.index]
  }

  pub fn len(&self) -> usize {
    self.levels.iter().map(Vec::len).sum()
  }

  /// Binary search of `level` for the child `identifier` of the parent at `parent_index`.
  pub fn find(&self, level: usize, parent_index: u16, identifier: &[u8]) -> Option<usize> {
    self
      .levels
      .get(level)?
      .binary_search_by(|entry| {
        (entry.parent_index, entry.identifier.as_slice()).cmp(&(parent_index, identifier))
      })
      .ok()
  }

  /// Looks up the child `identifier` of the directory at `parent`.
  pub fn child(&self, parent: Location, identifier: &[u8]) -> Option<Location> {
    let level = parent.level + 1;
    let index = self.find(level, (parent.index + 1) as u16, identifier)?;
    Some(Location { level, index })
  }

  pub fn parent(&self, location: Location) -> Option<Location> {
    match location.level {
      0 => None,
      level => Some(Location {
        level: level - 1,
        index: self.get(location).parent_index as usize - 1,
      }),
    }
  }

  /// Inserts `entry` at its sorted position in `level`.
  ///
  /// Rows of the next level whose parent sat at or after the insertion point
  /// are renumbered so they keep pointing at the same directory.
  pub fn insert(&mut self, level: usize, entry: PathTableEntry) -> Result<Location> {
    if level == 0 || level > self.levels.len() {
      return Err(Error::structural(format!(
        "cannot insert {:?} at path table level {level}",
        entry.path
      )));
    }

    if level == self.levels.len() {
      self.levels.push(Vec::new());
    }

    if self.len() >= u16::MAX as usize {
      return Err(Error::overflow("path table directory count", self.len() as u64 + 1));
    }

    let index = match self.levels[level].binary_search_by(|other| {
      (other.parent_index, other.identifier.as_slice())
        .cmp(&(entry.parent_index, entry.identifier.as_slice()))
    }) {
      Ok(_) => {
        return Err(Error::structural(format!(
          "directory {:?} inserted twice",
          entry.path
        )));
      }
      Err(index) => index,
    };

    log::trace!(
      "Path table: {:?} at level {level}, index {index}",
      entry.path
    );
    self.levels[level].insert(index, entry);

    if let Some(next) = self.levels.get_mut(level + 1) {
      for row in next.iter_mut() {
        if row.parent_index as usize > index {
          row.parent_index += 1;
        }
      }
    }

    Ok(Location { level, index })
  }

  /// Every location in path table order.
  pub fn locations(&self) -> Vec<Location> {
    self
      .levels
      .iter()
      .enumerate()
      .flat_map(|(level, entries)| (0..entries.len()).map(move |index| Location { level, index }))
      .collect()
  }

  /// 1-based directory number of the first entry of `level`.
  fn first_number(&self, level: usize) -> usize {
    self.levels[..level].iter().map(Vec::len).sum::<usize>() + 1
  }

  /// Copies each directory's location and attributes into its own `.`
  /// record, its children's `..` records and its parent's record of it.
  pub fn propagate(&mut self, revision: Option<RockRidgeRevision>) {
    for location in self.locations() {
      let entry = self.get(location);
      let (extent, size) = (entry.extent, entry.size);
      let posix = revision.map(|revision| PosixAttributes::from_header(&entry.header, revision));
      let identifier = entry.identifier.clone();

      let entry = self.get_mut(location);
      for key in [RecordKey::Current, RecordKey::Parent] {
        if key == RecordKey::Current || location.level == 0 {
          if let Some(record) = entry.records.get_mut(&key) {
            record.locate(extent, size, posix);
          }
        }
      }

      if let Some(children) = self.levels.get_mut(location.level + 1) {
        for child in children
          .iter_mut()
          .filter(|child| child.parent_index as usize == location.index + 1)
        {
          if let Some(record) = child.records.get_mut(&RecordKey::Parent) {
            record.locate(extent, size, posix);
          }
        }
      }

      if let Some(parent) = self.parent(location) {
        if let Some(record) = self
          .get_mut(parent)
          .records
          .get_mut(&RecordKey::Name(identifier))
        {
          record.locate(extent, size, posix);
        }
      }
    }
  }

  /// Path table records in order, parent numbers resolved across levels.
  pub fn records(&self) -> Vec<PathTableRecord> {
    let mut records = Vec::with_capacity(self.len());

    for (level, entries) in self.levels.iter().enumerate() {
      let parent_base = if level == 0 {
        0
      } else {
        self.first_number(level - 1) - 1
      };

      for entry in entries {
        records.push(PathTableRecord {
          extended_attribute_record_length: 0,
          extent_location: entry.extent,
          parent_directory_number: (parent_base + entry.parent_index as usize) as u16,
          directory_identifier: entry.identifier.clone(),
        });
      }
    }

    records
  }

  pub fn size(&self) -> Result<u32> {
    let size = self.records().iter().map(|r| r.extent() as u64).sum::<u64>();
    u32::try_from(size).map_err(|_| Error::overflow("path table", size))
  }
}
