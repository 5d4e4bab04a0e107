use crate::{
  rock_ridge::{PosixAttributes, SystemUseEntry, SystemUsePlan},
  spec::{FileFlags, NumericalDate},
};

/// Ordering key of a record within its directory: `.` then `..` then
/// every other identifier in byte order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum RecordKey {
  Current,
  Parent,
  Name(Vec<u8>),
}

impl RecordKey {
  pub fn identifier(&self) -> &[u8] {
    match self {
      RecordKey::Current => &[0],
      RecordKey::Parent => &[1],
      RecordKey::Name(identifier) => identifier,
    }
  }

  pub fn name(&self) -> Option<&Vec<u8>> {
    match self {
      RecordKey::Name(identifier) => Some(identifier),
      _ => None,
    }
  }
}

/// Mutable half of a directory record; its identity is the [`RecordKey`].
#[derive(Debug, Clone)]
pub struct Record {
  pub flags: FileFlags,
  pub extent: u32,
  pub size: u32,
  pub recorded: NumericalDate,
  pub system_use: Vec<SystemUseEntry>,
  /// Placement of `system_use`, decided while sizing.
  pub plan: SystemUsePlan,
}

impl Record {
  pub fn new(flags: FileFlags, recorded: NumericalDate, system_use: Vec<SystemUseEntry>) -> Self {
    Self {
      flags,
      extent: 0,
      size: 0,
      recorded,
      system_use,
      plan: SystemUsePlan::default(),
    }
  }

  /// Points the record at a directory's final location and attributes.
  pub fn locate(&mut self, extent: u32, size: u32, posix: Option<PosixAttributes>) {
    self.extent = extent;
    self.size = size;

    if let Some(posix) = posix {
      for entry in self.system_use.iter_mut() {
        if let SystemUseEntry::Posix(attributes) = entry {
          *attributes = posix;
        }
      }
    }
  }
}
