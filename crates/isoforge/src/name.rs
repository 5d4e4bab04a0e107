//! File identifier validity and alternate-name generation.
//!
//! Every directory resolves its children's names in two passes: names that
//! are already valid for the volume claim their identifiers first, then the
//! rest are mapped to deterministic alternates that avoid every claimed
//! identifier.

use crate::prelude::*;
use std::collections::BTreeSet;

/// ISO 9660 interchange level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Level {
  /// 8.3 identifiers from `[A-Z0-9_]`.
  #[default]
  One,
  /// Up to 31 characters from `[A-Z0-9_]`.
  Two,
  /// ISO 9660:1999 identifiers of up to 207 arbitrary bytes.
  Four,
}

impl TryFrom<u8> for Level {
  type Error = Error;

  fn try_from(value: u8) -> Result<Self> {
    match value {
      1 => Ok(Level::One),
      2 => Ok(Level::Two),
      4 => Ok(Level::Four),
      other => Err(Error::InvalidOptions(format!(
        "unsupported interchange level {other}"
      ))),
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameKind {
  File,
  Directory,
}

/// Identifier rules of one directory hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Naming {
  Iso(Level),
  /// ISO identifiers whose records also carry Rock Ridge entries. Level 4
  /// names leave room for a `CE` entry in the largest directory record.
  RockRidge(Level),
  /// UCS-2 identifiers of a Joliet supplementary volume.
  Joliet,
}

/// Length budgets, in bytes for ISO names and UCS-2 units for Joliet.
/// Version suffixes are not counted.
#[derive(Debug, Clone, Copy)]
struct Limits {
  base: usize,
  extension: usize,
  /// Base, separator and extension together.
  full: usize,
}

const JOLIET_FORBIDDEN: &[char] = &['*', '/', ':', ';', '?', '\\'];

/// An identifier picked for one child.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
  pub identifier: Vec<u8>,
  /// `true` when the original name could not be used as is.
  pub alternate: bool,
}

/// Splits at the last dot that is not the first character.
fn split_extension(name: &str) -> (&str, Option<&str>) {
  match name.rfind('.') {
    Some(pos) if pos > 0 => (&name[..pos], Some(&name[pos + 1..])),
    _ => (name, None),
  }
}

fn is_d_character(c: char) -> bool {
  c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_'
}

fn is_joliet_character(c: char) -> bool {
  (c as u32) >= 0x20 && (c as u32) <= 0xFFFF && !JOLIET_FORBIDDEN.contains(&c)
}

/// Encodes `text` as UCS-2 big-endian, replacing characters outside the BMP with `_`.
pub(crate) fn encode_ucs2(text: &str) -> Result<Vec<u8>> {
  let text = if text.chars().any(|c| (c as u32) > 0xFFFF) {
    log::warn!("replacing characters outside the BMP in {text:?}");
    text
      .chars()
      .map(|c| if (c as u32) > 0xFFFF { '_' } else { c })
      .collect()
  } else {
    text.to_string()
  };

  let mut out = Vec::with_capacity(text.len() * 2);
  ucs2::encode_with(&text, |unit| {
    out.extend_from_slice(&unit.to_be_bytes());
    Ok(())
  })
  .map_err(|e| Error::structural(format!("cannot encode {text:?} as UCS-2: {e:?}")))?;

  Ok(out)
}

impl Naming {
  fn limits(&self, kind: NameKind) -> Limits {
    match (self, kind) {
      (Naming::RockRidge(Level::Four), _) => Limits {
        base: 193,
        extension: 192,
        full: 193,
      },
      (Naming::RockRidge(level), kind) => Naming::Iso(*level).limits(kind),
      (Naming::Iso(Level::One), NameKind::File) => Limits {
        base: 8,
        extension: 3,
        full: 12,
      },
      (Naming::Iso(Level::One), NameKind::Directory) => Limits {
        base: 8,
        extension: 0,
        full: 8,
      },
      (Naming::Iso(Level::Two), NameKind::File) => Limits {
        base: 30,
        extension: 30,
        full: 31,
      },
      (Naming::Iso(Level::Two), NameKind::Directory) => Limits {
        base: 31,
        extension: 0,
        full: 31,
      },
      (Naming::Iso(Level::Four), _) => Limits {
        base: 207,
        extension: 206,
        full: 207,
      },
      (Naming::Joliet, NameKind::File) => Limits {
        base: 62,
        extension: 61,
        full: 62,
      },
      (Naming::Joliet, NameKind::Directory) => Limits {
        base: 64,
        extension: 0,
        full: 64,
      },
    }
  }

  /// Level 1 and 2 file identifiers always carry a separator and `;1`.
  fn dotted_version(&self, kind: NameKind) -> bool {
    matches!(
      self,
      Naming::Iso(Level::One | Level::Two) | Naming::RockRidge(Level::One | Level::Two)
    ) && kind == NameKind::File
  }

  fn width(&self, c: char) -> usize {
    match self {
      Naming::Iso(_) | Naming::RockRidge(_) => c.len_utf8(),
      Naming::Joliet => 1,
    }
  }

  fn text_width(&self, text: &str) -> usize {
    text.chars().map(|c| self.width(c)).sum()
  }

  /// Longest prefix of `text` no wider than `budget`.
  fn truncate<'a>(&self, text: &'a str, budget: usize) -> &'a str {
    let mut width = 0;
    for (pos, c) in text.char_indices() {
      width += self.width(c);
      if width > budget {
        return &text[..pos];
      }
    }
    text
  }

  fn sanitize(&self, text: &str) -> String {
    match self {
      Naming::Iso(Level::One | Level::Two) => text
        .chars()
        .map(|c| {
          let c = c.to_ascii_uppercase();
          if is_d_character(c) { c } else { '_' }
        })
        .collect(),
      Naming::Iso(Level::Four) => text.replace('\0', "_"),
      Naming::RockRidge(level) => Naming::Iso(*level).sanitize(text),
      Naming::Joliet => text
        .chars()
        .map(|c| if is_joliet_character(c) { c } else { '_' })
        .collect(),
    }
  }

  /// Whether `name` may be recorded without modification.
  pub fn is_valid(&self, name: &str, kind: NameKind) -> bool {
    if name.is_empty() || name == "." || name == ".." {
      return false;
    }

    let limits = self.limits(kind);
    match self {
      Naming::Iso(level) | Naming::RockRidge(level) => match (level, kind) {
        (Level::Four, _) => name.len() <= limits.full && !name.contains('\0'),
        (_, NameKind::Directory) => {
          name.len() <= limits.full && name.chars().all(is_d_character)
        }
        (_, NameKind::File) => {
          let (base, extension) = split_extension(name);
          let extension = extension.unwrap_or("");
          !base.is_empty()
            && base.len() <= limits.base
            && extension.len() <= limits.extension
            && base.len() + 1 + extension.len() <= limits.full
            && base.chars().chain(extension.chars()).all(is_d_character)
        }
      },
      Naming::Joliet => {
        self.text_width(name) <= limits.full && name.chars().all(is_joliet_character)
      }
    }
  }

  fn compose(&self, kind: NameKind, base: &str, extension: &str) -> Result<Vec<u8>> {
    let text = if self.dotted_version(kind) {
      format!("{base}.{extension};1")
    } else if extension.is_empty() {
      base.to_string()
    } else {
      format!("{base}.{extension}")
    };

    match self {
      Naming::Iso(_) | Naming::RockRidge(_) => Ok(text.into_bytes()),
      Naming::Joliet if kind == NameKind::File => encode_ucs2(&format!("{text};1")),
      Naming::Joliet => encode_ucs2(&text),
    }
  }

  /// On-disk identifier for a name that passed [`Naming::is_valid`].
  pub fn identifier(&self, name: &str, kind: NameKind) -> Result<Vec<u8>> {
    if self.dotted_version(kind) {
      let (base, extension) = split_extension(name);
      self.compose(kind, base, extension.unwrap_or(""))
    } else {
      self.compose(kind, name, "")
    }
  }

  /// Deterministic alternate identifier for `name` that `claimed` rejects none of.
  ///
  /// The base is truncated to the remaining budget and, while the candidate
  /// collides, suffixed with an ascending decimal counter that eats into the
  /// base. Fails once the counter no longer fits the base budget.
  pub fn alternate(
    &self,
    name: &str,
    kind: NameKind,
    claimed: impl Fn(&[u8]) -> bool,
  ) -> Result<Vec<u8>> {
    let limits = self.limits(kind);

    let (base, extension) = if limits.extension > 0 {
      split_extension(name)
    } else {
      (name, None)
    };

    let mut base = self.sanitize(base);
    if base.is_empty() {
      base.push('_');
    }

    let extension = self.sanitize(extension.unwrap_or(""));
    let extension = self
      .truncate(&extension, limits.extension.min(limits.full.saturating_sub(2)))
      .to_string();

    let separator = (self.dotted_version(kind) || !extension.is_empty()) as usize;
    let budget = limits
      .base
      .min(limits.full - self.text_width(&extension) - separator);

    let candidate = self.compose(kind, self.truncate(&base, budget), &extension)?;
    if !claimed(&candidate) {
      return Ok(candidate);
    }

    for n in 1u64.. {
      let suffix = n.to_string();
      if suffix.len() > budget {
        break;
      }

      let stem = format!("{}{suffix}", self.truncate(&base, budget - suffix.len()));
      let candidate = self.compose(kind, &stem, &extension)?;
      if !claimed(&candidate) {
        return Ok(candidate);
      }
    }

    Err(Error::NameCollisionExhausted {
      name: name.to_string(),
      budget,
    })
  }
}

/// Resolves the identifiers of one directory's children, in input order.
///
/// Valid names are claimed before any alternate is generated, so a valid
/// name never loses its identifier to an earlier sibling's alternate.
pub fn resolve_names(
  naming: Naming,
  names: &[(&str, NameKind)],
  claimed: &mut BTreeSet<Vec<u8>>,
) -> Result<Vec<Resolved>> {
  let mut resolved = vec![None; names.len()];

  for (slot, &(name, kind)) in resolved.iter_mut().zip(names) {
    if naming.is_valid(name, kind) {
      let identifier = naming.identifier(name, kind)?;
      if claimed.insert(identifier.clone()) {
        *slot = Some(Resolved {
          identifier,
          alternate: false,
        });
      }
    }
  }

  for (slot, &(name, kind)) in resolved.iter_mut().zip(names) {
    if slot.is_some() {
      continue;
    }

    let identifier = naming.alternate(name, kind, |candidate| claimed.contains(candidate))?;
    log::debug!(
      "{name:?} recorded as {:?}",
      String::from_utf8_lossy(&identifier)
    );
    claimed.insert(identifier.clone());
    *slot = Some(Resolved {
      identifier,
      alternate: true,
    });
  }

  Ok(resolved.into_iter().flatten().collect())
}

#[cfg(test)]
mod tests {
  use super::*;

  const L1: Naming = Naming::Iso(Level::One);
  const L2: Naming = Naming::Iso(Level::Two);
  const L4: Naming = Naming::Iso(Level::Four);

  fn resolve(naming: Naming, names: &[(&str, NameKind)]) -> Vec<String> {
    resolve_names(naming, names, &mut BTreeSet::new())
      .unwrap()
      .into_iter()
      .map(|r| String::from_utf8(r.identifier).unwrap())
      .collect()
  }

  #[test]
  fn valid_names_are_kept() {
    assert_eq!(
      resolve(
        L1,
        &[
          ("HELLO.TXT", NameKind::File),
          ("README", NameKind::File),
          ("BOOT", NameKind::Directory),
        ]
      ),
      ["HELLO.TXT;1", "README.;1", "BOOT"]
    );
  }

  #[test]
  fn level_one_alternates() {
    assert_eq!(
      resolve(L1, &[("my-long-name-exceeding-8-characters", NameKind::Directory)]),
      ["MY_LONG_"]
    );
    assert_eq!(
      resolve(L1, &[("hello.world.txt", NameKind::File)]),
      ["HELLO_WO.TXT;1"]
    );
    assert_eq!(resolve(L1, &[("archive.tar.gz", NameKind::File)]), ["ARCHIVE_.GZ;1"]);
    assert_eq!(resolve(L1, &[("notes.markdown", NameKind::File)]), ["NOTES.MAR;1"]);
  }

  #[test]
  fn collisions_get_numeric_suffixes() {
    assert_eq!(
      resolve(
        L1,
        &[
          ("my-long-name-exceeding-8-characters", NameKind::Directory),
          ("my-long-name-exceeding-9-characters", NameKind::Directory),
        ]
      ),
      ["MY_LONG_", "MY_LONG1"]
    );
  }

  #[test]
  fn valid_names_win_over_alternates() {
    // The lowercase name would map to `DATA`, which its valid sibling owns.
    assert_eq!(
      resolve(L1, &[("data", NameKind::Directory), ("DATA", NameKind::Directory)]),
      ["DATA1", "DATA"]
    );
  }

  #[test]
  fn level_two_and_four_budgets() {
    let long = "a".repeat(40);
    let [two] = &resolve(L2, &[(&long, NameKind::Directory)])[..] else {
      panic!()
    };
    assert_eq!(two.len(), 31);

    let mixed = "Mixed Case; name.tar.gz";
    assert_eq!(resolve(L4, &[(mixed, NameKind::File)]), [mixed]);

    let [four] = &resolve(L4, &[(&"x".repeat(300), NameKind::File)])[..] else {
      panic!()
    };
    assert_eq!(four.len(), 207);

    let [rock_ridge] = &resolve(
      Naming::RockRidge(Level::Four),
      &[(&"x".repeat(300), NameKind::File)],
    )[..] else {
      panic!()
    };
    assert_eq!(rock_ridge.len(), 193);
  }

  #[test]
  fn joliet_names() {
    let resolved = resolve_names(
      Naming::Joliet,
      &[("Read Me.txt", NameKind::File), ("a:b", NameKind::Directory)],
      &mut BTreeSet::new(),
    )
    .unwrap();

    assert_eq!(resolved[0].identifier, encode_ucs2("Read Me.txt;1").unwrap());
    assert!(!resolved[0].alternate);
    assert_eq!(resolved[1].identifier, encode_ucs2("a_b").unwrap());
    assert!(resolved[1].alternate);
  }

  #[test]
  fn joliet_version_counts_towards_the_limit() {
    let long = format!("{}.txt", "x".repeat(100));
    let resolved = resolve_names(
      Naming::Joliet,
      &[(&long, NameKind::File), (&"y".repeat(100), NameKind::Directory)],
      &mut BTreeSet::new(),
    )
    .unwrap();

    let file = format!("{}.txt;1", "x".repeat(58));
    assert_eq!(resolved[0].identifier, encode_ucs2(&file).unwrap());
    assert_eq!(resolved[0].identifier.len(), 128);
    assert_eq!(resolved[1].identifier, encode_ucs2(&"y".repeat(64)).unwrap());
  }

  #[test]
  fn ucs2_is_big_endian() {
    assert_eq!(encode_ucs2("A\u{e9}").unwrap(), [0x00, 0x41, 0x00, 0xE9]);
    assert_eq!(encode_ucs2("\u{1F600}").unwrap(), [0x00, b'_']);
  }

  #[test]
  fn exhaustion_is_reported() {
    let name = format!("a.{}", "b".repeat(29));
    let result = L2.alternate(&name, NameKind::File, |_| true);
    assert!(matches!(
      result,
      Err(Error::NameCollisionExhausted { budget: 1, .. })
    ));
  }

  #[test]
  fn level_parsing() {
    assert_eq!(Level::try_from(2).unwrap(), Level::Two);
    assert!(matches!(Level::try_from(3), Err(Error::InvalidOptions(_))));
  }
}
