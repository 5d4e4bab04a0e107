//! ISO 9660 image encoder with Rock Ridge and Joliet extensions.
//!
//! Entries are streamed into an [`ImageWriter`]: file content is written as it
//! arrives, while the directory hierarchy is collected in memory. Closing the
//! archive lays out one directory tree per requested [`Variant`], writes the
//! path tables and finally patches the volume descriptor set at sector 16.
//!
//! ```no_run
//! use isoforge::{EntryHeader, ImageOptions, ImageWriter};
//!
//! let file = std::fs::File::create("out.iso")?;
//! let mut image = ImageWriter::new(file, ImageOptions::default())?;
//!
//! image.create_entry(EntryHeader::file("HELLO.TXT", 5))?;
//! image.write(b"hello")?;
//! image.close_entry()?;
//!
//! image.close_archive()?;
//! # Ok::<(), isoforge::error::Error>(())
//! ```

pub mod entry;
pub mod error;
pub mod fs;
pub mod image;
pub mod lba;
pub mod name;
pub mod path;
pub mod rock_ridge;
pub mod serialize;
pub mod spec;
pub mod writer;

pub use entry::{Entry, EntryHeader, EntryKind, Timestamps};
pub use image::{ImageOptions, ImageWriter, Variant, VolumeInfo};
pub use name::Level;
pub use rock_ridge::RockRidgeRevision;

pub(crate) mod prelude {
  pub use crate::error::Error;

  pub type Result<T> = std::result::Result<T, Error>;
}
