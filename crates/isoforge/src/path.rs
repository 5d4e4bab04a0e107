/// Borrowed image path. Both `/` and `\` separate components; empty and `.`
/// components are ignored, so `"/a//b/"` and `"a/./b"` name the same entry.
#[derive(Debug)]
#[repr(transparent)]
pub struct IsoPath(str);

impl IsoPath {
  pub fn new<S: AsRef<str> + ?Sized>(s: &S) -> &Self {
    // SAFETY: `IsoPath` is a transparent wrapper around `str`.
    unsafe { &*(s.as_ref() as *const str as *const IsoPath) }
  }

  /// Returns the components of this path as an iterator.
  pub fn components(&self) -> Components<'_> {
    Components { path: &self.0 }
  }

  /// Number of components; the root has depth 0.
  pub fn depth(&self) -> usize {
    self.components().count()
  }

  /// Canonical `a/b/c` form, empty for the root.
  pub fn normalize(&self) -> String {
    self.components().collect::<Vec<_>>().join("/")
  }

  /// Splits into the normalized parent path and the final component.
  pub fn split(&self) -> (String, &str) {
    let components = self.components().collect::<Vec<_>>();
    match components.split_last() {
      Some((name, parent)) => (parent.join("/"), name),
      None => (String::new(), ""),
    }
  }
}

/// Joins a normalized parent path and a child name.
pub fn join(parent: &str, name: &str) -> String {
  if parent.is_empty() {
    name.to_string()
  } else {
    format!("{parent}/{name}")
  }
}

pub struct Components<'a> {
  path: &'a str,
}

impl<'a> Iterator for Components<'a> {
  type Item = &'a str;

  fn next(&mut self) -> Option<Self::Item> {
    loop {
      if self.path.is_empty() {
        return None;
      }

      let part = if let Some(pos) = self.path.find(['/', '\\']) {
        let part = &self.path[..pos];
        self.path = &self.path[pos + 1..];
        part
      } else {
        let part = self.path;
        self.path = "";
        part
      };

      if !part.is_empty() && part != "." {
        return Some(part);
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn components_skip_empty_segments() {
    let parts = IsoPath::new("/usr//share/./doc\\README").components().collect::<Vec<_>>();
    assert_eq!(parts, ["usr", "share", "doc", "README"]);
  }

  #[test]
  fn split_and_depth() {
    let path = IsoPath::new("a/b/c");
    assert_eq!(path.depth(), 3);
    assert_eq!(path.split(), ("a/b".to_string(), "c"));
    assert_eq!(IsoPath::new("top").split(), (String::new(), "top"));
    assert_eq!(IsoPath::new("/").depth(), 0);
    assert_eq!(IsoPath::new("./x/").normalize(), "x");
  }
}
