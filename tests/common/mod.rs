//! Shared test utilities for integration tests.
//!
//! Fixtures are assembled byte by byte so that entry names can carry
//! arbitrary legacy encodings, which no ZIP library will write for us.
//!
//! Note: `#![allow(dead_code)]` is required because each integration test file
//! compiles as a separate crate and may only use a subset of these helpers.

#![allow(dead_code)]

use flate2::Compression;
use flate2::write::DeflateEncoder;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// "Привет.txt" in CP866
pub const PRIVET_866: &[u8] = b"\x8f\xe0\xa8\xa2\xa5\xe2.txt";

/// UTF-16LE BOM followed by an odd number of bytes
pub const BROKEN_UTF16: &[u8] = b"\xff\xfea\x00b";

/// One entry of a hand-built archive.
#[derive(Debug, Clone)]
pub struct FixtureEntry {
    pub name: Vec<u8>,
    pub data: Vec<u8>,
    pub deflate: bool,
    pub data_descriptor: bool,
    pub comment: Vec<u8>,
    pub extra: Vec<u8>,
    pub external_attrs: u32,
    pub crc_override: Option<u32>,
}

impl FixtureEntry {
    pub fn new(name: &[u8], data: &[u8]) -> Self {
        Self {
            name: name.to_vec(),
            data: data.to_vec(),
            deflate: false,
            data_descriptor: false,
            comment: Vec::new(),
            extra: Vec::new(),
            external_attrs: 0x81A4_0000,
            crc_override: None,
        }
    }

    pub fn deflated(mut self) -> Self {
        self.deflate = true;
        self
    }

    pub fn with_data_descriptor(mut self) -> Self {
        self.data_descriptor = true;
        self
    }

    pub fn with_comment(mut self, comment: &[u8]) -> Self {
        self.comment = comment.to_vec();
        self
    }

    pub fn with_extra(mut self, extra: &[u8]) -> Self {
        self.extra = extra.to_vec();
        self
    }

    pub fn with_crc(mut self, crc: u32) -> Self {
        self.crc_override = Some(crc);
        self
    }
}

fn push16(buf: &mut Vec<u8>, v: u16) {
    buf.extend_from_slice(&v.to_le_bytes());
}

fn push32(buf: &mut Vec<u8>, v: u32) {
    buf.extend_from_slice(&v.to_le_bytes());
}

/// Assemble a ZIP archive from fixture entries.
pub fn build_archive(entries: &[FixtureEntry], comment: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    let mut central = Vec::new();

    for entry in entries {
        let mut crc = flate2::Crc::new();
        crc.update(&entry.data);
        let crc = entry.crc_override.unwrap_or(crc.sum());

        let payload = if entry.deflate {
            let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
            encoder.write_all(&entry.data).unwrap();
            encoder.finish().unwrap()
        } else {
            entry.data.clone()
        };
        let method: u16 = if entry.deflate { 8 } else { 0 };
        let flags: u16 = if entry.data_descriptor { 0x0008 } else { 0 };
        let (time, date) = (0x6C2Au16, 0x5A31u16);
        let offset = out.len() as u32;

        out.extend_from_slice(b"PK\x03\x04");
        push16(&mut out, 20);
        push16(&mut out, flags);
        push16(&mut out, method);
        push16(&mut out, time);
        push16(&mut out, date);
        if entry.data_descriptor {
            out.extend_from_slice(&[0u8; 12]);
        } else {
            push32(&mut out, crc);
            push32(&mut out, payload.len() as u32);
            push32(&mut out, entry.data.len() as u32);
        }
        push16(&mut out, entry.name.len() as u16);
        push16(&mut out, entry.extra.len() as u16);
        out.extend_from_slice(&entry.name);
        out.extend_from_slice(&entry.extra);
        out.extend_from_slice(&payload);
        if entry.data_descriptor {
            out.extend_from_slice(b"PK\x07\x08");
            push32(&mut out, crc);
            push32(&mut out, payload.len() as u32);
            push32(&mut out, entry.data.len() as u32);
        }

        central.extend_from_slice(b"PK\x01\x02");
        push16(&mut central, 0x031E);
        push16(&mut central, 20);
        push16(&mut central, flags);
        push16(&mut central, method);
        push16(&mut central, time);
        push16(&mut central, date);
        push32(&mut central, crc);
        push32(&mut central, payload.len() as u32);
        push32(&mut central, entry.data.len() as u32);
        push16(&mut central, entry.name.len() as u16);
        push16(&mut central, entry.extra.len() as u16);
        push16(&mut central, entry.comment.len() as u16);
        push16(&mut central, 0);
        push16(&mut central, 0);
        push32(&mut central, entry.external_attrs);
        push32(&mut central, offset);
        central.extend_from_slice(&entry.name);
        central.extend_from_slice(&entry.extra);
        central.extend_from_slice(&entry.comment);
    }

    let cd_offset = out.len() as u32;
    out.extend_from_slice(&central);

    out.extend_from_slice(b"PK\x05\x06");
    push16(&mut out, 0);
    push16(&mut out, 0);
    push16(&mut out, entries.len() as u16);
    push16(&mut out, entries.len() as u16);
    push32(&mut out, central.len() as u32);
    push32(&mut out, cd_offset);
    push16(&mut out, comment.len() as u16);
    out.extend_from_slice(comment);
    out
}

/// Write `bytes` as `name` in a fresh temp dir.
pub fn write_temp(name: &str, bytes: &[u8]) -> (TempDir, PathBuf) {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let path = dir.path().join(name);
    std::fs::write(&path, bytes).expect("Failed to write archive");
    (dir, path)
}

/// Read every entry of an archive with the `zip` crate: (name, content).
pub fn read_with_zip_crate(path: &Path) -> Vec<(String, Vec<u8>)> {
    use std::io::Read;

    let file = std::fs::File::open(path).unwrap();
    let mut archive = zip::ZipArchive::new(file).unwrap();
    let mut entries = Vec::with_capacity(archive.len());
    for i in 0..archive.len() {
        let mut file = archive.by_index(i).unwrap();
        let mut data = Vec::new();
        file.read_to_end(&mut data).unwrap();
        entries.push((file.name().to_string(), data));
    }
    entries
}
