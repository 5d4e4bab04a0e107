#[derive(Debug, thiserror::Error)]
pub enum Error {
  #[error("I/O error: {0}")]
  Io(#[from] std::io::Error),
  #[error("walkdir error: {0}")]
  WalkDir(#[from] walkdir::Error),
  /// Alternate-name search ran out of room for its numeric suffix.
  #[error("no unique identifier for {name:?} within a {budget} unit name budget")]
  NameCollisionExhausted { name: String, budget: usize },
  /// A file, directory or table does not fit a 32-bit size or position field.
  #[error("{what} of {size} bytes exceeds the 32-bit size field")]
  SizeOverflow { what: String, size: u64 },
  #[error("entry {path:?} declared {declared} bytes but {written} were written")]
  SizeMismatch {
    path: String,
    declared: u64,
    written: u64,
  },
  /// Internal layout invariant violated, usually a caller ordering bug.
  #[error("structural assertion failed: {0}")]
  StructuralAssertion(String),
  #[error("invalid options: {0}")]
  InvalidOptions(String),
}

impl Error {
  pub(crate) fn structural(message: impl Into<String>) -> Self {
    Error::StructuralAssertion(message.into())
  }

  pub(crate) fn overflow(what: impl Into<String>, size: u64) -> Self {
    Error::SizeOverflow {
      what: what.into(),
      size,
    }
  }

  /// Unwraps an error that passed through [`std::io::Write`] on the way out.
  pub fn from_io(error: std::io::Error) -> Self {
    if !error.get_ref().is_some_and(|inner| inner.is::<Error>()) {
      return Error::Io(error);
    }

    match error.into_inner().map(|inner| inner.downcast::<Error>()) {
      Some(Ok(inner)) => *inner,
      _ => Error::structural("wrapped error changed type"),
    }
  }
}
