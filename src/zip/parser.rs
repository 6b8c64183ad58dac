//! Low-level ZIP archive parser.
//!
//! This module handles the binary parsing of ZIP file structures,
//! reading from any source that implements the [`ReadAt`] trait.
//!
//! ## Parsing Strategy
//!
//! ZIP files are designed to be read from the end:
//! 1. Find the End of Central Directory (EOCD) at the file's end
//! 2. If ZIP64, read the ZIP64 EOCD for large file support
//! 3. Read the Central Directory to get the header of every entry
//! 4. For copying, read each entry's Local File Header to find its data
//!
//! Entry names are kept as raw bytes. Nothing here guesses their encoding.

use byteorder::{LittleEndian, ReadBytesExt};
use std::io::{Cursor, Read};
use std::sync::Arc;

use crate::io::ReadAt;
use anyhow::{Result, bail};

use super::stream::EntryReader;
use super::structures::*;

/// Maximum ZIP comment size allowed by the format (65535 bytes).
///
/// This limits the search area when looking for EOCD with a comment.
const MAX_COMMENT_SIZE: u64 = 65535;

/// Everything the central directory says about an archive.
#[derive(Debug, Clone, Default)]
pub struct CentralDirectory {
    /// Entries in the order the directory lists them
    pub entries: Vec<ZipFileEntry>,
    /// Archive comment, raw bytes
    pub comment: Vec<u8>,
}

/// Low-level ZIP file parser.
///
/// This struct handles reading and parsing ZIP structures from
/// a data source. It's generic over the reader type so tests can
/// feed it from memory.
///
/// ## Example
///
/// ```ignore
/// let parser = ZipParser::new(reader);
/// let directory = parser.read_directory().await?;
/// for entry in &directory.entries {
///     let mut stream = parser.open(entry).await?;
///     // Read raw entry data from the stream...
///     stream.close()?;
/// }
/// ```
pub struct ZipParser<R: ReadAt> {
    /// The underlying data source
    reader: Arc<R>,
    /// Total size of the archive in bytes
    size: u64,
}

impl<R: ReadAt> ZipParser<R> {
    /// Create a new parser for the given reader.
    pub fn new(reader: Arc<R>) -> Self {
        let size = reader.size();
        Self { reader, size }
    }

    /// Find and parse the End of Central Directory record.
    ///
    /// The EOCD is located at the end of the ZIP file. This method
    /// handles both the simple case (no comment) and archives with
    /// comments by searching backwards for the signature.
    ///
    /// # Returns
    ///
    /// A tuple of (EOCD record, offset of EOCD in file).
    ///
    /// # Errors
    ///
    /// Returns an error if no valid EOCD can be found, indicating
    /// the file is not a valid ZIP archive.
    pub async fn find_eocd(&self) -> Result<(EndOfCentralDirectory, u64)> {
        // Optimization: First try the simple case where there's no comment.
        if self.size >= EndOfCentralDirectory::SIZE as u64 {
            let offset = self.size - EndOfCentralDirectory::SIZE as u64;
            let mut buf = vec![0u8; EndOfCentralDirectory::SIZE];
            self.reader.read_exact_at(offset, &mut buf).await?;

            // Check for signature and zero-length comment
            if &buf[0..4] == EndOfCentralDirectory::SIGNATURE && &buf[20..22] == b"\x00\x00" {
                let eocd = EndOfCentralDirectory::from_bytes(&buf)?;
                return Ok((eocd, offset));
            }
        }

        // EOCD not at expected location - it sits before a comment.
        let search_size = (MAX_COMMENT_SIZE + EndOfCentralDirectory::SIZE as u64).min(self.size);
        let search_start = self.size - search_size;

        let mut buf = vec![0u8; search_size as usize];
        self.reader.read_exact_at(search_start, &mut buf).await?;

        // Search backwards for EOCD signature (PK\x05\x06)
        for i in (0..buf.len().saturating_sub(EndOfCentralDirectory::SIZE)).rev() {
            if &buf[i..i + 4] == EndOfCentralDirectory::SIGNATURE {
                // The comment length field must account for exactly the remaining bytes.
                let comment_len = u16::from_le_bytes([buf[i + 20], buf[i + 21]]) as usize;

                if comment_len == buf.len() - i - EndOfCentralDirectory::SIZE {
                    let eocd = EndOfCentralDirectory::from_bytes(
                        &buf[i..i + EndOfCentralDirectory::SIZE],
                    )?;
                    return Ok((eocd, search_start + i as u64));
                }
            }
        }

        bail!("Not a valid ZIP file")
    }

    /// Read the ZIP64 End of Central Directory record.
    ///
    /// Called when the regular EOCD indicates ZIP64 extensions are needed
    /// (fields set to 0xFFFF or 0xFFFFFFFF).
    ///
    /// # Errors
    ///
    /// Returns an error if the ZIP64 structures are missing or invalid.
    pub async fn read_zip64_eocd(&self, eocd_offset: u64) -> Result<Zip64EOCD> {
        // The ZIP64 EOCD Locator is located immediately before the regular EOCD
        let Some(locator_offset) = eocd_offset.checked_sub(Zip64EOCDLocator::SIZE as u64) else {
            bail!("Invalid ZIP64 format");
        };
        let mut locator_buf = vec![0u8; Zip64EOCDLocator::SIZE];
        self.reader
            .read_exact_at(locator_offset, &mut locator_buf)
            .await?;

        let locator = Zip64EOCDLocator::from_bytes(&locator_buf)?;

        // Read the actual ZIP64 EOCD from the offset specified in the locator
        let mut eocd64_buf = vec![0u8; Zip64EOCD::MIN_SIZE];
        self.reader
            .read_exact_at(locator.eocd64_offset, &mut eocd64_buf)
            .await?;

        Zip64EOCD::from_bytes(&eocd64_buf)
    }

    /// Read the whole Central Directory and the archive comment.
    ///
    /// # Errors
    ///
    /// Returns an error if the archive is invalid or cannot be read.
    pub async fn read_directory(&self) -> Result<CentralDirectory> {
        let (eocd, eocd_offset) = self.find_eocd().await?;

        let mut comment = vec![0u8; eocd.comment_len as usize];
        self.reader
            .read_exact_at(eocd_offset + EndOfCentralDirectory::SIZE as u64, &mut comment)
            .await?;

        // Get Central Directory info, using ZIP64 if needed
        let (cd_offset, cd_size, total_entries) = if eocd.is_zip64() {
            let eocd64 = self.read_zip64_eocd(eocd_offset).await?;
            (eocd64.cd_offset, eocd64.cd_size, eocd64.total_entries)
        } else {
            (
                eocd.cd_offset as u64,
                eocd.cd_size as u64,
                eocd.total_entries as u64,
            )
        };

        if cd_offset.saturating_add(cd_size) > eocd_offset {
            bail!("Central Directory extends past its end record");
        }

        // Read the entire Central Directory in one go
        let mut cd_data = vec![0u8; cd_size as usize];
        self.reader.read_exact_at(cd_offset, &mut cd_data).await?;

        // Each record is at least CDFH_MIN_SIZE bytes, which bounds the count.
        if total_entries > cd_size / CDFH_MIN_SIZE as u64 {
            bail!("Central Directory is too small for {} entries", total_entries);
        }

        let mut entries = Vec::with_capacity(total_entries as usize);
        let mut cursor = Cursor::new(cd_data.as_slice());

        for _ in 0..total_entries {
            entries.push(Self::parse_cdfh(&mut cursor)?);
        }

        Ok(CentralDirectory { entries, comment })
    }

    /// Parse a Central Directory File Header from a cursor.
    ///
    /// # Errors
    ///
    /// Returns an error if the header is invalid or truncated.
    fn parse_cdfh(cursor: &mut Cursor<&[u8]>) -> Result<ZipFileEntry> {
        // Read and verify the signature (PK\x01\x02)
        let mut sig = [0u8; 4];
        cursor.read_exact(&mut sig)?;
        if sig != CDFH_SIGNATURE {
            bail!("Invalid Central Directory File Header");
        }

        let version_made_by = cursor.read_u16::<LittleEndian>()?;
        let version_needed = cursor.read_u16::<LittleEndian>()?;
        let flags = cursor.read_u16::<LittleEndian>()?;
        let compression_method = cursor.read_u16::<LittleEndian>()?;
        let last_mod_time = cursor.read_u16::<LittleEndian>()?;
        let last_mod_date = cursor.read_u16::<LittleEndian>()?;
        let crc32 = cursor.read_u32::<LittleEndian>()?;
        let mut compressed_size = cursor.read_u32::<LittleEndian>()? as u64;
        let mut uncompressed_size = cursor.read_u32::<LittleEndian>()? as u64;
        let file_name_length = cursor.read_u16::<LittleEndian>()?;
        let extra_field_length = cursor.read_u16::<LittleEndian>()?;
        let file_comment_length = cursor.read_u16::<LittleEndian>()?;
        let disk_number_start = cursor.read_u16::<LittleEndian>()?;
        let internal_attrs = cursor.read_u16::<LittleEndian>()?;
        let external_attrs = cursor.read_u32::<LittleEndian>()?;
        let mut lfh_offset = cursor.read_u32::<LittleEndian>()? as u64;

        let mut raw_name = vec![0u8; file_name_length as usize];
        cursor.read_exact(&mut raw_name)?;

        let mut raw_extra = vec![0u8; extra_field_length as usize];
        cursor.read_exact(&mut raw_extra)?;

        let mut comment = vec![0u8; file_comment_length as usize];
        cursor.read_exact(&mut comment)?;

        // ZIP64 extended information: a field is present only if the
        // corresponding header field is saturated.
        let (zip64, extra) = split_zip64_extra(&raw_extra);
        if let Some(zip64) = zip64 {
            let mut block = Cursor::new(zip64);
            if uncompressed_size == ZIP64_U32 as u64 {
                uncompressed_size = block.read_u64::<LittleEndian>()?;
            }
            if compressed_size == ZIP64_U32 as u64 {
                compressed_size = block.read_u64::<LittleEndian>()?;
            }
            if lfh_offset == ZIP64_U32 as u64 {
                lfh_offset = block.read_u64::<LittleEndian>()?;
            }
        }

        Ok(ZipFileEntry {
            raw_name,
            version_made_by,
            version_needed,
            flags,
            compression_method: CompressionMethod::from_u16(compression_method),
            last_mod_time,
            last_mod_date,
            crc32,
            compressed_size,
            uncompressed_size,
            disk_number_start,
            internal_attrs,
            external_attrs,
            lfh_offset,
            extra,
            comment,
        })
    }

    /// Open the raw data stream of an entry.
    ///
    /// Reads the entry's Local File Header, whose variable-length fields
    /// may differ from the Central Directory record, to find where the
    /// data begins. The returned stream borrows the parser and is released
    /// when dropped.
    ///
    /// # Errors
    ///
    /// Returns an error if the LFH is invalid or the data runs past the
    /// end of the archive.
    pub async fn open<'a>(&'a self, entry: &'a ZipFileEntry) -> Result<EntryReader<'a, R>> {
        let mut lfh_buf = vec![0u8; LFH_SIZE];
        self.reader
            .read_exact_at(entry.lfh_offset, &mut lfh_buf)
            .await?;

        // Verify LFH signature (PK\x03\x04)
        if &lfh_buf[0..4] != LFH_SIGNATURE {
            bail!("Invalid Local File Header for {}", entry.file_name());
        }

        let mut cursor = Cursor::new(&lfh_buf);
        cursor.set_position(26); // Offset to filename length field

        let file_name_length = cursor.read_u16::<LittleEndian>()? as u64;
        let extra_field_length = cursor.read_u16::<LittleEndian>()? as u64;

        let extra_offset = entry.lfh_offset + LFH_SIZE as u64 + file_name_length;
        let mut raw_extra = vec![0u8; extra_field_length as usize];
        self.reader
            .read_exact_at(extra_offset, &mut raw_extra)
            .await?;
        let (_, local_extra) = split_zip64_extra(&raw_extra);

        // Data starts after: LFH (30 bytes) + filename + extra field
        let data_offset = extra_offset + extra_field_length;
        if data_offset.saturating_add(entry.compressed_size) > self.size {
            bail!(
                "Data of {} extends past the end of the archive",
                entry.file_name()
            );
        }

        Ok(EntryReader::new(
            self.reader.as_ref(),
            entry,
            data_offset,
            local_extra,
        ))
    }
}
