//! Rock Ridge (RRIP) and SUSP system use entries.
//!
//! Entries are built as values, sized while the directory hierarchy is laid
//! out and rendered once every location is known. Records whose entries do
//! not fit their directory record spill into a per-directory continuation
//! area reached through `CE` entries.

use crate::{
  entry::{EntryHeader, EntryKind, Timestamps},
  prelude::*,
  serialize::{self, IsoSerialize},
  spec::{NumericalDate, SECTOR_SIZE},
};
use chrono::{DateTime, Utc};
use std::ops::Range;

/// Length of a `CE` entry.
pub const CONTINUATION_ENTRY_LEN: usize = 28;

/// Longest payload of one `NM` or `SL` entry.
const MAX_ENTRY_PAYLOAD: usize = 250;

/// Longest content of one `SL` component record.
const MAX_COMPONENT_LEN: usize = 248;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RockRidgeRevision {
  /// RRIP 1.09 as identified by `RRIP_1991A`; records carry an `RR` entry.
  #[default]
  Rrip1991A,
  /// IEEE P1282 (RRIP 1.12); `PX` entries carry a file serial number.
  Ieee1282,
}

impl RockRidgeRevision {
  fn identifier(&self) -> &'static str {
    match self {
      RockRidgeRevision::Rrip1991A => "RRIP_1991A",
      RockRidgeRevision::Ieee1282 => "IEEE_P1282",
    }
  }

  fn descriptor(&self) -> &'static str {
    match self {
      RockRidgeRevision::Rrip1991A => {
        "THE ROCK RIDGE INTERCHANGE PROTOCOL PROVIDES SUPPORT FOR POSIX FILE SYSTEM SEMANTICS"
      }
      RockRidgeRevision::Ieee1282 => {
        "THE IEEE P1282 PROTOCOL PROVIDES SUPPORT FOR POSIX FILE SYSTEM SEMANTICS."
      }
    }
  }

  fn source(&self) -> &'static str {
    match self {
      RockRidgeRevision::Rrip1991A => {
        "PLEASE CONTACT DISC PUBLISHER FOR SPECIFICATION SOURCE.  SEE PUBLISHER IDENTIFIER IN PRIMARY VOLUME DESCRIPTOR FOR CONTACT INFORMATION."
      }
      RockRidgeRevision::Ieee1282 => {
        "PLEASE CONTACT THE IEEE STANDARDS DEPARTMENT, PISCATAWAY, NJ, USA FOR THE P1282 SPECIFICATION."
      }
    }
  }
}

bitflags::bitflags! {
  /// Flags of the `RR` entry naming which entries a record carries.
  #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
  pub struct RockRidgeFlags: u8 {
    const PX = 1 << 0;
    const PN = 1 << 1;
    const SL = 1 << 2;
    const NM = 1 << 3;
    const CL = 1 << 4;
    const PL = 1 << 5;
    const RE = 1 << 6;
    const TF = 1 << 7;
  }

  #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
  pub struct TimestampFlags: u8 {
    const CREATION = 1 << 0;
    const MODIFY = 1 << 1;
    const ACCESS = 1 << 2;
    const ATTRIBUTES = 1 << 3;
    const BACKUP = 1 << 4;
    const EXPIRATION = 1 << 5;
    const EFFECTIVE = 1 << 6;
    const LONG_FORM = 1 << 7;
  }

  #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
  pub struct NameFlags: u8 {
    const CONTINUE = 1 << 0;
    const CURRENT = 1 << 1;
    const PARENT = 1 << 2;
  }

  #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
  pub struct ComponentFlags: u8 {
    const CONTINUE = 1 << 0;
    const CURRENT = 1 << 1;
    const PARENT = 1 << 2;
    const ROOT = 1 << 3;
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PosixAttributes {
  pub mode: u32,
  pub links: u32,
  pub uid: u32,
  pub gid: u32,
  /// Recorded by IEEE P1282 only.
  pub serial: Option<u32>,
}

impl PosixAttributes {
  pub fn from_header(header: &EntryHeader, revision: RockRidgeRevision) -> Self {
    Self {
      mode: header.posix_mode(),
      links: header.nlink,
      uid: header.uid,
      gid: header.gid,
      serial: match revision {
        RockRidgeRevision::Rrip1991A => None,
        RockRidgeRevision::Ieee1282 => Some(header.serial),
      },
    }
  }
}

/// One `SL` component record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Component {
  pub flags: ComponentFlags,
  pub content: Vec<u8>,
}

impl Component {
  fn extent(&self) -> usize {
    2 + self.content.len()
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SystemUseEntry {
  /// `SP`: marks SUSP use; only in the root's first record.
  SharingProtocol { skip: u8 },
  /// `ER`: identifies the extension in the root's first record.
  ExtensionReference(RockRidgeRevision),
  /// `RR`: RRIP 1991A summary of the entries present.
  RockRidge(RockRidgeFlags),
  Posix(PosixAttributes),
  Timestamps {
    flags: TimestampFlags,
    dates: Vec<NumericalDate>,
  },
  /// `PN`: device number.
  DeviceNumber { high: u32, low: u32 },
  SymbolicLink {
    continues: bool,
    components: Vec<Component>,
  },
  /// `NM`: alternate (original) name.
  AlternateName { flags: NameFlags, name: Vec<u8> },
  /// `CL`: location of a relocated directory.
  ChildLink(u32),
  /// `PL`: location of a relocated directory's original parent.
  ParentLink(u32),
  /// `RE`: marks a relocated directory.
  Relocated,
  /// `CE`: continuation area.
  Continuation {
    location: u32,
    offset: u32,
    length: u32,
  },
}

impl SystemUseEntry {
  fn signature(&self) -> &'static [u8; 2] {
    match self {
      SystemUseEntry::SharingProtocol { .. } => b"SP",
      SystemUseEntry::ExtensionReference(_) => b"ER",
      SystemUseEntry::RockRidge(_) => b"RR",
      SystemUseEntry::Posix(_) => b"PX",
      SystemUseEntry::Timestamps { .. } => b"TF",
      SystemUseEntry::DeviceNumber { .. } => b"PN",
      SystemUseEntry::SymbolicLink { .. } => b"SL",
      SystemUseEntry::AlternateName { .. } => b"NM",
      SystemUseEntry::ChildLink(_) => b"CL",
      SystemUseEntry::ParentLink(_) => b"PL",
      SystemUseEntry::Relocated => b"RE",
      SystemUseEntry::Continuation { .. } => b"CE",
    }
  }

  /// The `RR` bit announcing this entry, if any.
  fn rock_ridge_flag(&self) -> RockRidgeFlags {
    match self {
      SystemUseEntry::Posix(_) => RockRidgeFlags::PX,
      SystemUseEntry::DeviceNumber { .. } => RockRidgeFlags::PN,
      SystemUseEntry::SymbolicLink { .. } => RockRidgeFlags::SL,
      SystemUseEntry::AlternateName { .. } => RockRidgeFlags::NM,
      SystemUseEntry::ChildLink(_) => RockRidgeFlags::CL,
      SystemUseEntry::ParentLink(_) => RockRidgeFlags::PL,
      SystemUseEntry::Relocated => RockRidgeFlags::RE,
      SystemUseEntry::Timestamps { .. } => RockRidgeFlags::TF,
      _ => RockRidgeFlags::empty(),
    }
  }
}

impl IsoSerialize for SystemUseEntry {
  type Context = ();

  fn extent(&self) -> usize {
    4 + match self {
      SystemUseEntry::SharingProtocol { .. } => 3,
      SystemUseEntry::ExtensionReference(revision) => {
        4 + revision.identifier().len() + revision.descriptor().len() + revision.source().len()
      }
      SystemUseEntry::RockRidge(_) => 1,
      SystemUseEntry::Posix(attributes) => 32 + attributes.serial.map_or(0, |_| 8),
      SystemUseEntry::Timestamps { dates, .. } => 1 + NumericalDate::LENGTH * dates.len(),
      SystemUseEntry::DeviceNumber { .. } => 16,
      SystemUseEntry::SymbolicLink { components, .. } => {
        1 + components.iter().map(Component::extent).sum::<usize>()
      }
      SystemUseEntry::AlternateName { name, .. } => 1 + name.len(),
      SystemUseEntry::ChildLink(_) | SystemUseEntry::ParentLink(_) => 8,
      SystemUseEntry::Relocated => 0,
      SystemUseEntry::Continuation { .. } => 24,
    }
  }

  fn serialize(&self, _context: &mut (), out: &mut [u8]) -> Result<()> {
    let extent = self.extent();
    if extent > u8::MAX as usize {
      return Err(Error::structural(format!(
        "{} entry of {extent} bytes",
        String::from_utf8_lossy(self.signature())
      )));
    }

    serialize::ensure_extent(out, extent, "system use entry")?;

    let out = &mut out[..extent];
    out[..2].copy_from_slice(self.signature());
    out[2] = extent as u8;
    out[3] = 1;

    let body = &mut out[4..];
    match self {
      SystemUseEntry::SharingProtocol { skip } => {
        body[0] = 0xBE;
        body[1] = 0xEF;
        body[2] = *skip;
      }
      SystemUseEntry::ExtensionReference(revision) => {
        let (id, des, src) = (
          revision.identifier().as_bytes(),
          revision.descriptor().as_bytes(),
          revision.source().as_bytes(),
        );
        body[0] = id.len() as u8;
        body[1] = des.len() as u8;
        body[2] = src.len() as u8;
        body[3] = 1;
        let body = &mut body[4..];
        body[..id.len()].copy_from_slice(id);
        body[id.len()..id.len() + des.len()].copy_from_slice(des);
        body[id.len() + des.len()..].copy_from_slice(src);
      }
      SystemUseEntry::RockRidge(flags) => body[0] = flags.bits(),
      SystemUseEntry::Posix(attributes) => {
        serialize::write_both_u32(&mut body[0..8], attributes.mode);
        serialize::write_both_u32(&mut body[8..16], attributes.links);
        serialize::write_both_u32(&mut body[16..24], attributes.uid);
        serialize::write_both_u32(&mut body[24..32], attributes.gid);
        if let Some(serial) = attributes.serial {
          serialize::write_both_u32(&mut body[32..40], serial);
        }
      }
      SystemUseEntry::Timestamps { flags, dates } => {
        body[0] = flags.bits();
        for (date, out) in dates.iter().zip(body[1..].chunks_exact_mut(NumericalDate::LENGTH)) {
          date.write(out);
        }
      }
      SystemUseEntry::DeviceNumber { high, low } => {
        serialize::write_both_u32(&mut body[0..8], *high);
        serialize::write_both_u32(&mut body[8..16], *low);
      }
      SystemUseEntry::SymbolicLink {
        continues,
        components,
      } => {
        body[0] = *continues as u8;
        let mut pos = 1;
        for component in components {
          body[pos] = component.flags.bits();
          body[pos + 1] = component.content.len() as u8;
          body[pos + 2..pos + component.extent()].copy_from_slice(&component.content);
          pos += component.extent();
        }
      }
      SystemUseEntry::AlternateName { flags, name } => {
        body[0] = flags.bits();
        body[1..].copy_from_slice(name);
      }
      SystemUseEntry::ChildLink(location) | SystemUseEntry::ParentLink(location) => {
        serialize::write_both_u32(&mut body[0..8], *location);
      }
      SystemUseEntry::Relocated => {}
      SystemUseEntry::Continuation {
        location,
        offset,
        length,
      } => {
        serialize::write_both_u32(&mut body[0..8], *location);
        serialize::write_both_u32(&mut body[8..16], *offset);
        serialize::write_both_u32(&mut body[16..24], *length);
      }
    }

    Ok(())
  }
}

/// Splits a symbolic link target into `SL` component records.
pub fn symlink_components(target: &str) -> Vec<Component> {
  let mut components = Vec::new();

  if target.starts_with('/') {
    components.push(Component {
      flags: ComponentFlags::ROOT,
      content: Vec::new(),
    });
  }

  for part in target.split('/').filter(|part| !part.is_empty()) {
    match part {
      "." => components.push(Component {
        flags: ComponentFlags::CURRENT,
        content: Vec::new(),
      }),
      ".." => components.push(Component {
        flags: ComponentFlags::PARENT,
        content: Vec::new(),
      }),
      _ => {
        let chunks = part.as_bytes().chunks(MAX_COMPONENT_LEN).collect::<Vec<_>>();
        let last = chunks.len() - 1;
        for (i, chunk) in chunks.into_iter().enumerate() {
          components.push(Component {
            flags: if i < last {
              ComponentFlags::CONTINUE
            } else {
              ComponentFlags::empty()
            },
            content: chunk.to_vec(),
          });
        }
      }
    }
  }

  components
}

/// Packs component records into as few `SL` entries as possible.
fn symlink_entries(target: &str) -> Vec<SystemUseEntry> {
  let mut entries = Vec::new();
  let mut current = Vec::new();
  let mut length = 0;

  for component in symlink_components(target) {
    if length + component.extent() > MAX_ENTRY_PAYLOAD {
      entries.push(std::mem::take(&mut current));
      length = 0;
    }
    length += component.extent();
    current.push(component);
  }
  entries.push(current);

  let last = entries.len() - 1;
  entries
    .into_iter()
    .enumerate()
    .map(|(i, components)| SystemUseEntry::SymbolicLink {
      continues: i < last,
      components,
    })
    .collect()
}

/// Accumulates the system use entries of one directory record.
#[derive(Debug, Clone)]
pub struct SystemUseBuilder {
  revision: RockRidgeRevision,
  entries: Vec<SystemUseEntry>,
}

impl SystemUseBuilder {
  pub fn new(revision: RockRidgeRevision) -> Self {
    Self {
      revision,
      entries: Vec::new(),
    }
  }

  /// `NM` entries holding `name` in chunks of at most 250 bytes.
  pub fn name(mut self, name: &str) -> Self {
    let chunks = name.as_bytes().chunks(MAX_ENTRY_PAYLOAD).collect::<Vec<_>>();
    let last = chunks.len().saturating_sub(1);

    for (i, chunk) in chunks.into_iter().enumerate() {
      self.entries.push(SystemUseEntry::AlternateName {
        flags: if i < last {
          NameFlags::CONTINUE
        } else {
          NameFlags::empty()
        },
        name: chunk.to_vec(),
      });
    }
    self
  }

  pub fn posix(mut self, attributes: PosixAttributes) -> Self {
    self.entries.push(SystemUseEntry::Posix(attributes));
    self
  }

  /// A `TF` entry with every known timestamp; `fallback` stands in for the
  /// modification time when none is known.
  pub fn times(mut self, times: &Timestamps, fallback: DateTime<Utc>) -> Self {
    let fields = [
      (TimestampFlags::CREATION, times.created),
      (TimestampFlags::MODIFY, times.modified),
      (TimestampFlags::ACCESS, times.accessed),
      (TimestampFlags::ATTRIBUTES, times.attributes),
      (TimestampFlags::BACKUP, times.backup),
      (TimestampFlags::EXPIRATION, times.expiration),
      (TimestampFlags::EFFECTIVE, times.effective),
    ];

    let mut flags = TimestampFlags::empty();
    let mut dates = Vec::new();
    for (flag, time) in fields {
      if let Some(time) = time {
        flags |= flag;
        dates.push(NumericalDate::from(time));
      }
    }

    if dates.is_empty() {
      flags = TimestampFlags::MODIFY;
      dates.push(NumericalDate::from(fallback));
    }

    self.entries.push(SystemUseEntry::Timestamps { flags, dates });
    self
  }

  /// `PN` for devices, `SL` for symbolic links.
  pub fn kind(mut self, kind: &EntryKind) -> Self {
    match kind {
      EntryKind::CharDevice { major, minor } | EntryKind::BlockDevice { major, minor } => {
        self.entries.push(SystemUseEntry::DeviceNumber {
          high: *major,
          low: *minor,
        });
      }
      EntryKind::Symlink(target) => self.entries.extend(symlink_entries(target)),
      _ => {}
    }
    self
  }

  pub fn push(mut self, entry: SystemUseEntry) -> Self {
    self.entries.push(entry);
    self
  }

  /// Finishes the entry list, led by an `RR` entry under RRIP 1991A.
  pub fn build(self) -> Vec<SystemUseEntry> {
    match self.revision {
      RockRidgeRevision::Rrip1991A => {
        let flags = self
          .entries
          .iter()
          .fold(RockRidgeFlags::empty(), |flags, entry| {
            flags | entry.rock_ridge_flag()
          });
        let mut entries = Vec::with_capacity(self.entries.len() + 1);
        entries.push(SystemUseEntry::RockRidge(flags));
        entries.extend(self.entries);
        entries
      }
      RockRidgeRevision::Ieee1282 => self.entries,
    }
  }
}

/// Part of a record's entries stored in its directory's continuation area.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContinuationPiece {
  pub entries: Range<usize>,
  /// Byte offset from the start of the continuation area.
  pub offset: u32,
  /// Bytes including a trailing `CE` when another piece follows.
  pub length: u32,
}

/// Where each entry of a record goes: a prefix stays in the directory record,
/// the rest follows a chain of continuation pieces.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SystemUsePlan {
  /// Number of leading entries kept inline.
  pub inline: usize,
  /// Inline bytes, including the `CE` entry when pieces follow.
  pub inline_length: usize,
  pub pieces: Vec<ContinuationPiece>,
}

/// Plans the placement of entries of the given lengths.
///
/// `available` is the space left in the directory record, `area` the number
/// of bytes already used in the directory's continuation area; it is advanced
/// past every piece placed. Pieces never cross a sector boundary.
pub fn plan_system_use(
  lengths: &[usize],
  available: usize,
  area: &mut u32,
) -> Result<SystemUsePlan> {
  let total = lengths.iter().sum::<usize>();
  if total <= available {
    return Ok(SystemUsePlan {
      inline: lengths.len(),
      inline_length: total,
      pieces: Vec::new(),
    });
  }

  if available < CONTINUATION_ENTRY_LEN {
    return Err(Error::structural(format!(
      "{available} bytes of system use space cannot hold a continuation entry"
    )));
  }

  let mut inline = 0;
  let mut inline_length = 0;
  while inline < lengths.len()
    && inline_length + lengths[inline] + CONTINUATION_ENTRY_LEN <= available
  {
    inline_length += lengths[inline];
    inline += 1;
  }

  let sector = SECTOR_SIZE as usize;
  let mut pieces = Vec::new();
  let mut start = inline;

  while start < lengths.len() {
    let used = *area as usize % sector;
    let space = sector - used;
    let remaining = lengths[start..].iter().sum::<usize>();

    if remaining <= space {
      pieces.push(ContinuationPiece {
        entries: start..lengths.len(),
        offset: *area,
        length: remaining as u32,
      });
      *area += remaining as u32;
      break;
    }

    let mut end = start;
    let mut length = 0;
    while end < lengths.len() && length + lengths[end] + CONTINUATION_ENTRY_LEN <= space {
      length += lengths[end];
      end += 1;
    }

    if end == start {
      if used == 0 {
        return Err(Error::structural(format!(
          "system use entry of {} bytes does not fit a sector",
          lengths[start]
        )));
      }
      *area += space as u32;
      continue;
    }

    let length = (length + CONTINUATION_ENTRY_LEN) as u32;
    pieces.push(ContinuationPiece {
      entries: start..end,
      offset: *area,
      length,
    });
    *area += length;
    start = end;
  }

  log::debug!(
    "{} of {} system use entries spill into {} continuation piece(s)",
    lengths.len() - inline,
    lengths.len(),
    pieces.len()
  );

  Ok(SystemUsePlan {
    inline,
    inline_length: inline_length + CONTINUATION_ENTRY_LEN,
    pieces,
  })
}

fn continuation_to(piece: &ContinuationPiece, area_lba: u32) -> SystemUseEntry {
  SystemUseEntry::Continuation {
    location: area_lba + piece.offset / SECTOR_SIZE,
    offset: piece.offset % SECTOR_SIZE,
    length: piece.length,
  }
}

fn concat<'a>(entries: impl IntoIterator<Item = &'a SystemUseEntry>) -> Result<Vec<u8>> {
  let mut bytes = Vec::new();
  for entry in entries {
    bytes.extend(serialize::to_bytes(entry, &mut ())?);
  }
  Ok(bytes)
}

/// Rendered system use: the inline bytes and each continuation piece with its area offset.
pub type RenderedSystemUse = (Vec<u8>, Vec<(u32, Vec<u8>)>);

/// Serializes `entries` following `plan`; `area_lba` is the first block of the continuation area.
pub fn render(
  entries: &[SystemUseEntry],
  plan: &SystemUsePlan,
  area_lba: u32,
) -> Result<RenderedSystemUse> {
  let ce = plan.pieces.first().map(|piece| continuation_to(piece, area_lba));
  let inline = concat(entries[..plan.inline].iter().chain(ce.as_ref()))?;

  if inline.len() != plan.inline_length {
    return Err(Error::structural(format!(
      "inline system use is {} bytes, planned {}",
      inline.len(),
      plan.inline_length
    )));
  }

  let mut pieces = Vec::with_capacity(plan.pieces.len());
  for (i, piece) in plan.pieces.iter().enumerate() {
    let next = plan.pieces.get(i + 1).map(|next| continuation_to(next, area_lba));
    let bytes = concat(entries[piece.entries.clone()].iter().chain(next.as_ref()))?;

    if bytes.len() != piece.length as usize {
      return Err(Error::structural(format!(
        "continuation piece is {} bytes, planned {}",
        bytes.len(),
        piece.length
      )));
    }
    pieces.push((piece.offset, bytes));
  }

  Ok((inline, pieces))
}

#[cfg(test)]
mod tests {
  use super::*;

  fn lengths(entries: &[SystemUseEntry]) -> Vec<usize> {
    entries.iter().map(IsoSerialize::extent).collect()
  }

  #[test]
  fn fixed_entry_lengths() {
    let px = PosixAttributes {
      mode: 0o100644,
      links: 1,
      uid: 0,
      gid: 0,
      serial: None,
    };
    assert_eq!(SystemUseEntry::Posix(px).extent(), 36);
    assert_eq!(
      SystemUseEntry::Posix(PosixAttributes {
        serial: Some(7),
        ..px
      })
      .extent(),
      44
    );
    assert_eq!(SystemUseEntry::ExtensionReference(RockRidgeRevision::Rrip1991A).extent(), 237);
    assert_eq!(SystemUseEntry::SharingProtocol { skip: 0 }.extent(), 7);
    assert_eq!(SystemUseEntry::ChildLink(0).extent(), 12);
    assert_eq!(SystemUseEntry::Relocated.extent(), 4);
    assert_eq!(SystemUseEntry::DeviceNumber { high: 0, low: 0 }.extent(), 20);
    assert_eq!(
      SystemUseEntry::Continuation {
        location: 0,
        offset: 0,
        length: 0
      }
      .extent(),
      CONTINUATION_ENTRY_LEN
    );
  }

  #[test]
  fn sharing_protocol_layout() {
    let bytes = serialize::to_bytes(&SystemUseEntry::SharingProtocol { skip: 0 }, &mut ()).unwrap();
    assert_eq!(bytes, b"SP\x07\x01\xBE\xEF\x00");
  }

  #[test]
  fn long_names_are_chunked() {
    let name = "n".repeat(600);
    let entries = SystemUseBuilder::new(RockRidgeRevision::Ieee1282).name(&name).build();

    assert_eq!(lengths(&entries), [255, 255, 105]);
    let flags = entries
      .iter()
      .map(|entry| match entry {
        SystemUseEntry::AlternateName { flags, .. } => *flags,
        other => panic!("unexpected {other:?}"),
      })
      .collect::<Vec<_>>();
    assert_eq!(flags, [NameFlags::CONTINUE, NameFlags::CONTINUE, NameFlags::empty()]);
  }

  #[test]
  fn rock_ridge_flags_lead() {
    let entries = SystemUseBuilder::new(RockRidgeRevision::Rrip1991A)
      .name("x")
      .push(SystemUseEntry::Relocated)
      .build();

    assert_eq!(
      entries[0],
      SystemUseEntry::RockRidge(RockRidgeFlags::NM | RockRidgeFlags::RE)
    );
  }

  #[test]
  fn symlink_composition() {
    let components = symlink_components("/usr/./../lib");
    let flags = components.iter().map(|c| c.flags).collect::<Vec<_>>();
    assert_eq!(
      flags,
      [
        ComponentFlags::ROOT,
        ComponentFlags::empty(),
        ComponentFlags::CURRENT,
        ComponentFlags::PARENT,
        ComponentFlags::empty(),
      ]
    );
    assert_eq!(components[1].content, b"usr");

    let long = "c".repeat(300);
    let components = symlink_components(&long);
    assert_eq!(components.len(), 2);
    assert_eq!(components[0].flags, ComponentFlags::CONTINUE);
    assert_eq!(components[0].content.len(), 248);
    assert_eq!(components[1].content.len(), 52);

    let entries = symlink_entries(&format!("{long}/{long}"));
    assert_eq!(entries.len(), 4);
    assert!(matches!(
      entries.last(),
      Some(SystemUseEntry::SymbolicLink { continues: false, .. })
    ));
    assert!(entries.iter().all(|entry| entry.extent() <= 255));
  }

  #[test]
  fn everything_inline_when_it_fits() {
    let mut area = 0;
    let plan = plan_system_use(&[36, 12, 20], 100, &mut area).unwrap();
    assert_eq!(plan.inline, 3);
    assert_eq!(plan.inline_length, 68);
    assert!(plan.pieces.is_empty());
    assert_eq!(area, 0);
  }

  #[test]
  fn overflow_moves_to_continuation_area() {
    let mut area = 0;
    let plan = plan_system_use(&[5, 255, 35, 36, 12], 210, &mut area).unwrap();

    assert_eq!(plan.inline, 1);
    assert_eq!(plan.inline_length, 5 + CONTINUATION_ENTRY_LEN);
    assert_eq!(
      plan.pieces,
      [ContinuationPiece {
        entries: 1..5,
        offset: 0,
        length: 338
      }]
    );
    assert_eq!(area, 338);
  }

  #[test]
  fn pieces_do_not_cross_sectors() {
    let mut area = 1950;
    let plan = plan_system_use(&[5, 40, 40, 40, 40], 40, &mut area).unwrap();

    assert_eq!(plan.inline, 1);
    assert_eq!(
      plan.pieces,
      [
        ContinuationPiece {
          entries: 1..2,
          offset: 1950,
          length: 40 + CONTINUATION_ENTRY_LEN as u32,
        },
        ContinuationPiece {
          entries: 2..5,
          offset: 2048,
          length: 120,
        },
      ]
    );
    assert_eq!(area, 2168);

    let entries = vec![SystemUseEntry::Relocated; 4];
    let plan = plan_system_use(&lengths(&entries), 40, &mut 0).unwrap();
    assert_eq!(plan.inline, 4);
  }

  #[test]
  fn rendered_continuation_points_at_area() {
    let entries = SystemUseBuilder::new(RockRidgeRevision::Rrip1991A)
      .name(&"a".repeat(280))
      .build();
    let mut area = 0;
    let plan = plan_system_use(&lengths(&entries), 210, &mut area).unwrap();
    let (inline, pieces) = render(&entries, &plan, 40).unwrap();

    assert_eq!(inline.len(), 5 + CONTINUATION_ENTRY_LEN);
    assert_eq!(&inline[5..7], b"CE");
    assert_eq!(&inline[9..13], &40u32.to_le_bytes());
    assert_eq!(pieces.len(), 1);
    assert_eq!(pieces[0].0, 0);
    assert_eq!(&pieces[0].1[..2], b"NM");
  }
}
