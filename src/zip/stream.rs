use flate2::write::DeflateDecoder;
use flate2::{Crc, CrcWriter};
use std::io::{self, Write};

use crate::io::ReadAt;
use anyhow::{Result, bail};

use super::structures::{CompressionMethod, ZipFileEntry};

/// Tracks the CRC-32 of an entry's decompressed content while its raw
/// bytes pass through.
enum ContentCheck {
    Stored(Crc),
    Deflated(Box<DeflateDecoder<CrcWriter<io::Sink>>>),
    /// Encrypted entries and methods we cannot inflate pass unchecked.
    Unchecked,
}

impl ContentCheck {
    fn for_entry(entry: &ZipFileEntry) -> Self {
        if entry.is_encrypted() {
            return ContentCheck::Unchecked;
        }
        match entry.compression_method {
            CompressionMethod::Stored => ContentCheck::Stored(Crc::new()),
            CompressionMethod::Deflate => ContentCheck::Deflated(Box::new(DeflateDecoder::new(
                CrcWriter::new(io::sink()),
            ))),
            CompressionMethod::Unknown(_) => ContentCheck::Unchecked,
        }
    }

    fn update(&mut self, chunk: &[u8]) -> io::Result<()> {
        match self {
            ContentCheck::Stored(crc) => crc.update(chunk),
            ContentCheck::Deflated(decoder) => decoder.write_all(chunk)?,
            ContentCheck::Unchecked => {}
        }
        Ok(())
    }

    fn finish(self) -> io::Result<Option<u32>> {
        Ok(match self {
            ContentCheck::Stored(crc) => Some(crc.sum()),
            ContentCheck::Deflated(decoder) => Some((*decoder).finish()?.crc().sum()),
            ContentCheck::Unchecked => None,
        })
    }
}

/// Raw (still compressed) data of one archive entry.
///
/// Bytes are handed out exactly as stored, so copying them preserves the
/// compression method, sizes and CRC of the entry. [`close`](Self::close)
/// verifies the stream was fully consumed and that the content matches
/// the recorded CRC-32.
pub struct EntryReader<'a, R: ReadAt> {
    reader: &'a R,
    entry: &'a ZipFileEntry,
    position: u64,
    remaining: u64,
    local_extra: Vec<u8>,
    check: ContentCheck,
}

impl<'a, R: ReadAt> EntryReader<'a, R> {
    pub(crate) fn new(
        reader: &'a R,
        entry: &'a ZipFileEntry,
        data_offset: u64,
        local_extra: Vec<u8>,
    ) -> Self {
        Self {
            reader,
            entry,
            position: data_offset,
            remaining: entry.compressed_size,
            local_extra,
            check: ContentCheck::for_entry(entry),
        }
    }

    /// Extra field of the Local File Header, ZIP64 block removed.
    pub fn local_extra(&self) -> &[u8] {
        &self.local_extra
    }

    /// Bytes left before the stream is exhausted.
    pub fn remaining(&self) -> u64 {
        self.remaining
    }

    /// Read the next chunk of raw data. Returns 0 once exhausted.
    pub async fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let n = (buf.len() as u64).min(self.remaining) as usize;
        if n == 0 {
            return Ok(0);
        }

        self.reader
            .read_exact_at(self.position, &mut buf[..n])
            .await?;
        self.check.update(&buf[..n])?;

        self.position += n as u64;
        self.remaining -= n as u64;
        Ok(n)
    }

    /// Finish the stream, verifying length and checksum.
    pub fn close(self) -> Result<()> {
        if self.remaining != 0 {
            bail!(
                "Stream of {} closed with {} bytes unread",
                self.entry.file_name(),
                self.remaining
            );
        }

        if let Some(actual) = self.check.finish()? {
            if actual != self.entry.crc32 {
                bail!(
                    "CRC mismatch for {}: expected {:08x}, got {:08x}",
                    self.entry.file_name(),
                    self.entry.crc32,
                    actual
                );
            }
        }

        Ok(())
    }
}
