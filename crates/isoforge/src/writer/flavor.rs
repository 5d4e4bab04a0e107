//! The directory hierarchies a [`DirectoryWriter`](super::DirectoryWriter) can produce.

use crate::{
  entry::EntryKind,
  name::{Level, Naming},
  rock_ridge::RockRidgeRevision,
};

/// Naming and extension choices of one directory hierarchy.
pub trait Flavor {
  fn naming(&self) -> Naming;

  /// Rock Ridge revision recorded in system use fields, if any.
  fn rock_ridge(&self) -> Option<RockRidgeRevision> {
    None
  }

  /// Whether entries of `kind` can be listed.
  fn includes(&self, kind: &EntryKind) -> bool {
    matches!(kind, EntryKind::File | EntryKind::Directory)
  }
}

/// Plain ISO 9660 identifiers without system use fields.
#[derive(Debug, Clone, Copy)]
pub struct Iso9660 {
  pub level: Level,
}

impl Flavor for Iso9660 {
  fn naming(&self) -> Naming {
    Naming::Iso(self.level)
  }
}

/// UCS-2 identifiers for a Joliet supplementary volume.
#[derive(Debug, Clone, Copy)]
pub struct Joliet;

impl Flavor for Joliet {
  fn naming(&self) -> Naming {
    Naming::Joliet
  }
}

/// ISO 9660 identifiers with Rock Ridge names, attributes and relocation.
#[derive(Debug, Clone, Copy)]
pub struct RockRidge {
  pub level: Level,
  pub revision: RockRidgeRevision,
}

impl Flavor for RockRidge {
  fn naming(&self) -> Naming {
    Naming::RockRidge(self.level)
  }

  fn rock_ridge(&self) -> Option<RockRidgeRevision> {
    Some(self.revision)
  }

  fn includes(&self, _kind: &EntryKind) -> bool {
    true
  }
}
