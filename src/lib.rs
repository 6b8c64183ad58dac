//! # zipcyr
//!
//! Rewrite a ZIP archive so that its entry names are UTF-8.
//!
//! Archivers running under a legacy locale store entry names in that
//! locale's code page, and the container does not record which one. Opened
//! anywhere else, such names come out garbled. This crate copies an
//! archive entry by entry, decoding each name from its detected encoding
//! (falling back to the DOS Cyrillic code page when detection is unsure)
//! and leaving every other header field and every byte of content as is.
//!
//! ## Features
//!
//! - Encoding detection per entry name, with a fixed fallback code page
//! - Raw data copy: no recompression, sizes and CRC preserved
//! - CRC verification of STORED and DEFLATE entries while copying
//! - ZIP64 archives and data-descriptor entries
//!
//! ## Example
//!
//! ```no_run
//! use std::path::Path;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> anyhow::Result<()> {
//!     let report = zipcyr::rewrite(
//!         Path::new("archive.zip"),
//!         Path::new("archive_transcoded.zip"),
//!     )
//!     .await?;
//!
//!     for entry in &report.entries {
//!         println!("{}", entry.transcoded);
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod charset;
pub mod cli;
pub mod io;
pub mod rewrite;
pub mod zip;

pub use charset::{FALLBACK_ENCODING, NameTranscoder, TranscodeError, transcode};
pub use cli::{Cli, transcoded_path};
pub use io::{LocalFileReader, MemoryReader, ReadAt};
pub use rewrite::{RenamedEntry, RewriteReport, Rewriter, rewrite};
pub use zip::{ZipFileEntry, ZipParser, ZipWriter};
