//! Sequential ZIP archive writer.
//!
//! Entries are written one after another: a Local File Header built from a
//! caller-supplied header, the raw entry data, and a data descriptor when
//! the header asks for one. The Central Directory and end records are
//! emitted by [`ZipWriter::finish`].
//!
//! Headers arrive before their data, so the writer counts what is actually
//! written and refuses to close an entry whose byte count disagrees with
//! the header's compressed size.

use tokio::io::{AsyncWrite, AsyncWriteExt};

use anyhow::{Result, bail};

use super::structures::*;

/// Entry currently receiving data
struct OpenEntry {
    header: ZipFileEntry,
    written: u64,
}

/// Streaming ZIP writer over any async byte sink.
pub struct ZipWriter<W: AsyncWrite + Unpin> {
    inner: W,
    /// Bytes written so far, i.e. the offset of the next record
    offset: u64,
    /// Headers of finished entries, with their new local header offsets
    central: Vec<ZipFileEntry>,
    current: Option<OpenEntry>,
}

impl<W: AsyncWrite + Unpin> ZipWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            offset: 0,
            central: Vec::new(),
            current: None,
        }
    }

    /// Number of entries finished so far.
    pub fn len(&self) -> usize {
        self.central.len()
    }

    pub fn is_empty(&self) -> bool {
        self.central.is_empty()
    }

    async fn write_raw(&mut self, buf: &[u8]) -> Result<()> {
        self.inner.write_all(buf).await?;
        self.offset += buf.len() as u64;
        Ok(())
    }

    /// Begin a new entry described by `header`.
    ///
    /// `header.lfh_offset` is ignored and replaced by the position in this
    /// archive. `local_extra` goes into the Local File Header as is.
    pub async fn start_entry(&mut self, header: &ZipFileEntry, local_extra: &[u8]) -> Result<()> {
        if self.current.is_some() {
            bail!("Previous entry was not finished");
        }

        let mut header = header.clone();
        header.lfh_offset = self.offset;

        let lfh = header.local_header_bytes(local_extra)?;
        self.write_raw(&lfh).await?;

        self.current = Some(OpenEntry { header, written: 0 });
        Ok(())
    }

    /// Append raw data to the open entry.
    pub async fn write_data(&mut self, buf: &[u8]) -> Result<()> {
        let Some(current) = self.current.as_mut() else {
            bail!("No entry is open for writing");
        };
        current.written += buf.len() as u64;

        self.write_raw(buf).await
    }

    /// Close the open entry.
    ///
    /// # Errors
    ///
    /// Fails if the bytes written differ from the header's compressed size.
    pub async fn finish_entry(&mut self) -> Result<()> {
        let Some(OpenEntry { header, written }) = self.current.take() else {
            bail!("No entry is open for writing");
        };

        if written != header.compressed_size {
            bail!(
                "Size mismatch for {}: header says {} bytes, wrote {}",
                header.file_name(),
                header.compressed_size,
                written
            );
        }

        if header.has_data_descriptor() {
            let descriptor = header.data_descriptor_bytes()?;
            self.write_raw(&descriptor).await?;
        }

        self.central.push(header);
        Ok(())
    }

    /// Push everything written so far down to the sink.
    pub async fn flush(&mut self) -> Result<()> {
        self.inner.flush().await?;
        Ok(())
    }

    /// Write the Central Directory and end records, flush, and hand back
    /// the sink.
    pub async fn finish(mut self, comment: &[u8]) -> Result<W> {
        if self.current.is_some() {
            bail!("Last entry was not finished");
        }

        let cd_offset = self.offset;
        let central = std::mem::take(&mut self.central);
        for header in &central {
            let record = header.central_header_bytes()?;
            self.write_raw(&record).await?;
        }
        let cd_size = self.offset - cd_offset;
        let total_entries = central.len() as u64;

        let zip64 = total_entries >= ZIP64_U16 as u64
            || cd_size >= ZIP64_U32 as u64
            || cd_offset >= ZIP64_U32 as u64;

        if zip64 {
            let eocd64_offset = self.offset;
            let eocd64 = Zip64EOCD::new(total_entries, cd_size, cd_offset);
            self.write_raw(&eocd64.to_bytes()?).await?;

            let locator = Zip64EOCDLocator {
                disk_with_eocd64: 0,
                eocd64_offset,
                total_disks: 1,
            };
            self.write_raw(&locator.to_bytes()?).await?;
        }

        let entries = total_entries.min(ZIP64_U16 as u64) as u16;
        let eocd = EndOfCentralDirectory {
            disk_number: 0,
            disk_with_cd: 0,
            disk_entries: entries,
            total_entries: entries,
            cd_size: cd_size.min(ZIP64_U32 as u64) as u32,
            cd_offset: cd_offset.min(ZIP64_U32 as u64) as u32,
            comment_len: 0,
        };
        self.write_raw(&eocd.to_bytes(comment)?).await?;

        self.inner.flush().await?;
        Ok(self.inner)
    }
}
