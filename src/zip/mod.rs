//! ZIP archive reading and writing.
//!
//! This module reads an archive's headers and raw entry data, and writes a
//! new archive from headers and raw data, without ever recompressing.
//!
//! ## Architecture
//!
//! - [`structures`]: Data structures representing ZIP format elements and their encodings
//! - [`parser`]: Reading the Central Directory and opening entry streams
//! - [`stream`]: Scoped raw data stream of one entry, checksummed on close
//! - [`writer`]: Sequential archive writer
//!
//! ## ZIP Format Overview
//!
//! A ZIP file consists of:
//! 1. Local file headers and compressed data for each file
//! 2. Central Directory with metadata for all files
//! 3. End of Central Directory (EOCD) record at the end
//!
//! ## Supported Features
//!
//! - Standard ZIP format (PKZIP APPNOTE 6.3.x compatible)
//! - ZIP64 extensions for files > 4GB, on both sides
//! - Data descriptors (general purpose flag bit 3)
//! - CRC verification of STORED and DEFLATE entries
//!
//! ## Limitations
//!
//! - Encrypted entries and other compression methods are copied unverified
//! - No multi-disk archive support

mod parser;
mod stream;
mod structures;
mod writer;

pub use parser::{CentralDirectory, ZipParser};
pub use stream::EntryReader;
pub use structures::*;
pub use writer::ZipWriter;
