//! Archive rewriting.
//!
//! Copies every entry of a source archive into a new archive, in order,
//! replacing only the name with its transcoded form. Entry data is moved as
//! raw bytes, so compression method, sizes and CRC come through untouched.
//!
//! Any failure aborts the whole run. The destination may be left behind
//! incomplete.

use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use tokio::io::{AsyncWrite, BufWriter};
use tracing::{debug, info};

use crate::charset::NameTranscoder;
use crate::io::{LocalFileReader, ReadAt};
use crate::zip::{CentralDirectory, ZipParser, ZipWriter};

/// Size of the buffer entry data is copied through
const COPY_BUFFER_SIZE: usize = 64 * 1024;

/// Name change applied to one entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenamedEntry {
    pub original: Vec<u8>,
    pub transcoded: String,
}

impl RenamedEntry {
    pub fn is_changed(&self) -> bool {
        self.original != self.transcoded.as_bytes()
    }
}

/// What a rewrite did, entry by entry, in archive order.
#[derive(Debug, Clone, Default)]
pub struct RewriteReport {
    pub entries: Vec<RenamedEntry>,
}

impl RewriteReport {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of entries whose name bytes changed.
    pub fn renamed(&self) -> usize {
        self.entries.iter().filter(|e| e.is_changed()).count()
    }
}

/// Rewrites archives, transcoding entry names with the given transcoder.
#[derive(Debug, Clone, Copy, Default)]
pub struct Rewriter {
    transcoder: NameTranscoder,
}

impl Rewriter {
    pub fn new(transcoder: NameTranscoder) -> Self {
        Self { transcoder }
    }

    /// Rewrite the archive at `source` into a fresh file at `destination`.
    ///
    /// The source is fully parsed before the destination is created, so a
    /// malformed source leaves no output behind. An existing destination is
    /// truncated.
    pub async fn rewrite(&self, source: &Path, destination: &Path) -> Result<RewriteReport> {
        let reader = Arc::new(LocalFileReader::new(source)?);
        let parser = ZipParser::new(reader);
        let directory = parser.read_directory().await?;

        let file = tokio::fs::File::create(destination).await?;
        let mut writer = ZipWriter::new(BufWriter::new(file));

        let report = match self.copy_entries(&parser, &directory, &mut writer).await {
            Ok(report) => report,
            Err(err) => {
                // Leave what was copied on disk, not stuck in the buffer
                if let Err(flush_err) = writer.flush().await {
                    debug!("cannot flush partial destination: {flush_err:#}");
                }
                return Err(err);
            }
        };

        writer.finish(&directory.comment).await?;
        Ok(report)
    }

    /// Copy every entry from `parser` into `writer`, then finish the writer.
    pub async fn rewrite_archive<R, W>(
        &self,
        parser: &ZipParser<R>,
        mut writer: ZipWriter<W>,
    ) -> Result<(RewriteReport, W)>
    where
        R: ReadAt,
        W: AsyncWrite + Unpin,
    {
        let directory = parser.read_directory().await?;
        let report = self.copy_entries(parser, &directory, &mut writer).await?;
        let inner = writer.finish(&directory.comment).await?;
        Ok((report, inner))
    }

    /// Copy entries in order, stopping at the first failure. Entries already
    /// finished stay in `writer`.
    async fn copy_entries<R, W>(
        &self,
        parser: &ZipParser<R>,
        directory: &CentralDirectory,
        writer: &mut ZipWriter<W>,
    ) -> Result<RewriteReport>
    where
        R: ReadAt,
        W: AsyncWrite + Unpin,
    {
        debug!(entries = directory.entries.len(), "read central directory");

        let mut report = RewriteReport {
            entries: Vec::with_capacity(directory.entries.len()),
        };
        let mut buf = vec![0u8; COPY_BUFFER_SIZE];

        for entry in &directory.entries {
            let name = self
                .transcoder
                .transcode(&entry.raw_name)
                .with_context(|| format!("cannot transcode name {:?}", entry.file_name()))?;
            let header = entry.renamed(&name);

            let mut stream = parser.open(entry).await?;
            writer.start_entry(&header, stream.local_extra()).await?;

            loop {
                let n = stream.read(&mut buf).await?;
                if n == 0 {
                    break;
                }
                writer.write_data(&buf[..n]).await?;
            }

            stream.close()?;
            writer.finish_entry().await?;

            info!("{} -> {}", entry.file_name(), name);
            report.entries.push(RenamedEntry {
                original: entry.raw_name.clone(),
                transcoded: name,
            });
        }

        Ok(report)
    }
}

/// Rewrite `source` into `destination` with the default transcoder.
pub async fn rewrite(source: &Path, destination: &Path) -> Result<RewriteReport> {
    Rewriter::default().rewrite(source, destination).await
}
