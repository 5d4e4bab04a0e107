//! Metadata describing one entry streamed into an image.

use crate::path::IsoPath;
use chrono::{DateTime, Utc};

/// POSIX file type bits (`S_IFMT`).
pub const S_IFMT: u32 = 0o170000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryKind {
  File,
  Directory,
  /// Symbolic link holding its target path.
  Symlink(String),
  CharDevice { major: u32, minor: u32 },
  BlockDevice { major: u32, minor: u32 },
  Fifo,
  Socket,
}

impl EntryKind {
  pub fn is_directory(&self) -> bool {
    matches!(self, EntryKind::Directory)
  }

  pub fn is_file(&self) -> bool {
    matches!(self, EntryKind::File)
  }

  /// `S_IFMT` bits for this kind.
  pub fn mode_bits(&self) -> u32 {
    match self {
      EntryKind::File => 0o100000,
      EntryKind::Directory => 0o040000,
      EntryKind::Symlink(_) => 0o120000,
      EntryKind::CharDevice { .. } => 0o020000,
      EntryKind::BlockDevice { .. } => 0o060000,
      EntryKind::Fifo => 0o010000,
      EntryKind::Socket => 0o140000,
    }
  }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Timestamps {
  pub created: Option<DateTime<Utc>>,
  pub modified: Option<DateTime<Utc>>,
  pub accessed: Option<DateTime<Utc>>,
  /// Last attribute (inode) change.
  pub attributes: Option<DateTime<Utc>>,
  pub backup: Option<DateTime<Utc>>,
  pub expiration: Option<DateTime<Utc>>,
  pub effective: Option<DateTime<Utc>>,
}

impl Timestamps {
  /// Modification time, falling back to creation time.
  pub fn recorded(&self) -> Option<DateTime<Utc>> {
    self.modified.or(self.created)
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryHeader {
  /// Slash separated path relative to the image root.
  pub path: String,
  pub kind: EntryKind,
  /// Content length; only meaningful for regular files.
  pub size: u64,
  /// Permission bits. File type bits are taken from [`EntryHeader::kind`].
  pub mode: u32,
  pub uid: u32,
  pub gid: u32,
  /// Link count. Directory link counts are recomputed when the image is closed.
  pub nlink: u32,
  /// File serial number, recorded by IEEE P1282 `PX` entries.
  pub serial: u32,
  pub times: Timestamps,
}

impl EntryHeader {
  pub fn new(path: impl Into<String>, kind: EntryKind) -> Self {
    let (mode, nlink) = match kind {
      EntryKind::Directory => (0o755, 2),
      EntryKind::Symlink(_) => (0o777, 1),
      _ => (0o644, 1),
    };

    Self {
      path: path.into(),
      kind,
      size: 0,
      mode,
      uid: 0,
      gid: 0,
      nlink,
      serial: 0,
      times: Timestamps::default(),
    }
  }

  pub fn file(path: impl Into<String>, size: u64) -> Self {
    Self::new(path, EntryKind::File).with_size(size)
  }

  pub fn directory(path: impl Into<String>) -> Self {
    Self::new(path, EntryKind::Directory)
  }

  pub fn symlink(path: impl Into<String>, target: impl Into<String>) -> Self {
    Self::new(path, EntryKind::Symlink(target.into()))
  }

  pub fn with_size(mut self, size: u64) -> Self {
    self.size = size;
    self
  }

  pub fn with_mode(mut self, mode: u32) -> Self {
    self.mode = mode & !S_IFMT;
    self
  }

  pub fn with_owner(mut self, uid: u32, gid: u32) -> Self {
    self.uid = uid;
    self.gid = gid;
    self
  }

  pub fn with_nlink(mut self, nlink: u32) -> Self {
    self.nlink = nlink;
    self
  }

  pub fn with_serial(mut self, serial: u32) -> Self {
    self.serial = serial;
    self
  }

  pub fn with_times(mut self, times: Timestamps) -> Self {
    self.times = times;
    self
  }

  pub fn with_modified(mut self, modified: DateTime<Utc>) -> Self {
    self.times.modified = Some(modified);
    self
  }

  /// Full `st_mode`: type bits from the kind, permission bits from `mode`.
  pub fn posix_mode(&self) -> u32 {
    self.kind.mode_bits() | (self.mode & !S_IFMT)
  }

  /// Final path component; empty for the root.
  pub fn name(&self) -> &str {
    IsoPath::new(&self.path).split().1
  }
}

/// A header together with the logical block its content starts at.
///
/// Directories keep `extent == 0`; their location is assigned when the
/// directory hierarchy is laid out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
  pub header: EntryHeader,
  pub extent: u32,
}

impl Entry {
  pub fn new(header: EntryHeader, extent: u32) -> Self {
    Self { header, extent }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn posix_mode_combines_kind_and_permissions() {
    let file = EntryHeader::file("a/b.txt", 3).with_mode(0o100600);
    assert_eq!(file.posix_mode(), 0o100600);

    let dir = EntryHeader::directory("a");
    assert_eq!(dir.posix_mode(), 0o040755);
    assert_eq!(dir.nlink, 2);

    let fifo = EntryHeader::new("pipe", EntryKind::Fifo);
    assert_eq!(fifo.posix_mode(), 0o010644);
  }

  #[test]
  fn name_is_last_component() {
    assert_eq!(EntryHeader::file("a/b/c.txt", 0).name(), "c.txt");
    assert_eq!(EntryHeader::directory("").name(), "");
  }
}
