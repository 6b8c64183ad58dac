use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::Cursor;

use anyhow::{Result, bail};

/// ZIP compression methods
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionMethod {
    Stored,
    Deflate,
    Unknown(u16),
}

impl CompressionMethod {
    pub fn from_u16(value: u16) -> Self {
        match value {
            0 => CompressionMethod::Stored,
            8 => CompressionMethod::Deflate,
            _ => CompressionMethod::Unknown(value),
        }
    }

    pub fn as_u16(&self) -> u16 {
        match self {
            CompressionMethod::Stored => 0,
            CompressionMethod::Deflate => 8,
            CompressionMethod::Unknown(v) => *v,
        }
    }
}

/// Marker value for a 16-bit field that moved into a ZIP64 record
pub const ZIP64_U16: u16 = 0xFFFF;
/// Marker value for a 32-bit field that moved into a ZIP64 record
pub const ZIP64_U32: u32 = 0xFFFF_FFFF;

/// Header ID of the ZIP64 extended information extra block
pub const ZIP64_EXTRA_ID: u16 = 0x0001;

/// Version needed to extract ZIP64 structures (4.5)
pub const ZIP64_VERSION: u16 = 45;

/// General purpose flag bits
pub const FLAG_ENCRYPTED: u16 = 1 << 0;
pub const FLAG_DATA_DESCRIPTOR: u16 = 1 << 3;
pub const FLAG_UTF8: u16 = 1 << 11;

/// End of Central Directory (EOCD) - 22 bytes minimum
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EndOfCentralDirectory {
    pub disk_number: u16,
    pub disk_with_cd: u16,
    pub disk_entries: u16,
    pub total_entries: u16,
    pub cd_size: u32,
    pub cd_offset: u32,
    pub comment_len: u16,
}

impl EndOfCentralDirectory {
    pub const SIGNATURE: &'static [u8] = b"PK\x05\x06";
    pub const SIZE: usize = 22;

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < Self::SIZE {
            bail!("Invalid End of Central Directory");
        }

        // Verify signature
        if &data[0..4] != Self::SIGNATURE {
            bail!("Invalid End of Central Directory");
        }

        let mut cursor = Cursor::new(&data[4..]);

        Ok(Self {
            disk_number: cursor.read_u16::<LittleEndian>()?,
            disk_with_cd: cursor.read_u16::<LittleEndian>()?,
            disk_entries: cursor.read_u16::<LittleEndian>()?,
            total_entries: cursor.read_u16::<LittleEndian>()?,
            cd_size: cursor.read_u32::<LittleEndian>()?,
            cd_offset: cursor.read_u32::<LittleEndian>()?,
            comment_len: cursor.read_u16::<LittleEndian>()?,
        })
    }

    /// Encode the record followed by the archive comment.
    pub fn to_bytes(&self, comment: &[u8]) -> Result<Vec<u8>> {
        let comment_len = checked_u16(comment.len(), "archive comment")?;

        let mut buf = Vec::with_capacity(Self::SIZE + comment.len());
        buf.extend_from_slice(Self::SIGNATURE);
        buf.write_u16::<LittleEndian>(self.disk_number)?;
        buf.write_u16::<LittleEndian>(self.disk_with_cd)?;
        buf.write_u16::<LittleEndian>(self.disk_entries)?;
        buf.write_u16::<LittleEndian>(self.total_entries)?;
        buf.write_u32::<LittleEndian>(self.cd_size)?;
        buf.write_u32::<LittleEndian>(self.cd_offset)?;
        buf.write_u16::<LittleEndian>(comment_len)?;
        buf.extend_from_slice(comment);
        Ok(buf)
    }

    pub fn is_zip64(&self) -> bool {
        self.disk_entries == ZIP64_U16
            || self.total_entries == ZIP64_U16
            || self.cd_size == ZIP64_U32
            || self.cd_offset == ZIP64_U32
    }
}

/// ZIP64 End of Central Directory Locator - 20 bytes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Zip64EOCDLocator {
    pub disk_with_eocd64: u32,
    pub eocd64_offset: u64,
    pub total_disks: u32,
}

impl Zip64EOCDLocator {
    pub const SIGNATURE: &'static [u8] = b"PK\x06\x07";
    pub const SIZE: usize = 20;

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < Self::SIZE {
            bail!("Invalid ZIP64 format");
        }

        if &data[0..4] != Self::SIGNATURE {
            bail!("Invalid ZIP64 format");
        }

        let mut cursor = Cursor::new(&data[4..]);

        Ok(Self {
            disk_with_eocd64: cursor.read_u32::<LittleEndian>()?,
            eocd64_offset: cursor.read_u64::<LittleEndian>()?,
            total_disks: cursor.read_u32::<LittleEndian>()?,
        })
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(Self::SIZE);
        buf.extend_from_slice(Self::SIGNATURE);
        buf.write_u32::<LittleEndian>(self.disk_with_eocd64)?;
        buf.write_u64::<LittleEndian>(self.eocd64_offset)?;
        buf.write_u32::<LittleEndian>(self.total_disks)?;
        Ok(buf)
    }
}

/// ZIP64 End of Central Directory - 56 bytes minimum
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Zip64EOCD {
    pub eocd64_size: u64,
    pub version_made_by: u16,
    pub version_needed: u16,
    pub disk_number: u32,
    pub disk_with_cd: u32,
    pub disk_entries: u64,
    pub total_entries: u64,
    pub cd_size: u64,
    pub cd_offset: u64,
}

impl Zip64EOCD {
    pub const SIGNATURE: &'static [u8] = b"PK\x06\x06";
    pub const MIN_SIZE: usize = 56;

    /// Record for a single-disk archive; the extensible data sector is left empty.
    pub fn new(total_entries: u64, cd_size: u64, cd_offset: u64) -> Self {
        Self {
            eocd64_size: (Self::MIN_SIZE - 12) as u64,
            version_made_by: ZIP64_VERSION,
            version_needed: ZIP64_VERSION,
            disk_number: 0,
            disk_with_cd: 0,
            disk_entries: total_entries,
            total_entries,
            cd_size,
            cd_offset,
        }
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < Self::MIN_SIZE {
            bail!("Invalid ZIP64 format");
        }

        if &data[0..4] != Self::SIGNATURE {
            bail!("Invalid ZIP64 format");
        }

        let mut cursor = Cursor::new(&data[4..]);

        Ok(Self {
            eocd64_size: cursor.read_u64::<LittleEndian>()?,
            version_made_by: cursor.read_u16::<LittleEndian>()?,
            version_needed: cursor.read_u16::<LittleEndian>()?,
            disk_number: cursor.read_u32::<LittleEndian>()?,
            disk_with_cd: cursor.read_u32::<LittleEndian>()?,
            disk_entries: cursor.read_u64::<LittleEndian>()?,
            total_entries: cursor.read_u64::<LittleEndian>()?,
            cd_size: cursor.read_u64::<LittleEndian>()?,
            cd_offset: cursor.read_u64::<LittleEndian>()?,
        })
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(Self::MIN_SIZE);
        buf.extend_from_slice(Self::SIGNATURE);
        buf.write_u64::<LittleEndian>(self.eocd64_size)?;
        buf.write_u16::<LittleEndian>(self.version_made_by)?;
        buf.write_u16::<LittleEndian>(self.version_needed)?;
        buf.write_u32::<LittleEndian>(self.disk_number)?;
        buf.write_u32::<LittleEndian>(self.disk_with_cd)?;
        buf.write_u64::<LittleEndian>(self.disk_entries)?;
        buf.write_u64::<LittleEndian>(self.total_entries)?;
        buf.write_u64::<LittleEndian>(self.cd_size)?;
        buf.write_u64::<LittleEndian>(self.cd_offset)?;
        Ok(buf)
    }
}

/// Central Directory File Header (CDFH) - 46 bytes minimum
pub const CDFH_SIGNATURE: &[u8] = b"PK\x01\x02";
pub const CDFH_MIN_SIZE: usize = 46;

/// Local File Header (LFH) - 30 bytes
pub const LFH_SIGNATURE: &[u8] = b"PK\x03\x04";
pub const LFH_SIZE: usize = 30;

/// Data descriptor trailing an entry written with flag bit 3
pub const DATA_DESCRIPTOR_SIGNATURE: &[u8] = b"PK\x07\x08";

/// One archive member as recorded in the central directory.
///
/// Sizes and the local header offset always hold their real 64-bit values;
/// any ZIP64 extended information block has been folded in and removed
/// from `extra`, since the writer regenerates it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZipFileEntry {
    pub raw_name: Vec<u8>,
    pub version_made_by: u16,
    pub version_needed: u16,
    pub flags: u16,
    pub compression_method: CompressionMethod,
    pub last_mod_time: u16,
    pub last_mod_date: u16,
    pub crc32: u32,
    pub compressed_size: u64,
    pub uncompressed_size: u64,
    pub disk_number_start: u16,
    pub internal_attrs: u16,
    pub external_attrs: u32,
    pub lfh_offset: u64,
    pub extra: Vec<u8>,
    pub comment: Vec<u8>,
}

impl ZipFileEntry {
    /// Name for display only; invalid UTF-8 is replaced.
    pub fn file_name(&self) -> String {
        String::from_utf8_lossy(&self.raw_name).into_owned()
    }

    pub fn is_encrypted(&self) -> bool {
        self.flags & FLAG_ENCRYPTED != 0
    }

    pub fn has_data_descriptor(&self) -> bool {
        self.flags & FLAG_DATA_DESCRIPTOR != 0
    }

    /// Copy of this header carrying `name` instead of the original name.
    ///
    /// The language encoding flag (bit 11) is raised when the new name is
    /// not ASCII, so readers stop decoding it as CP437. This is the one
    /// change besides the name; every other field is left as is.
    pub fn renamed(&self, name: &str) -> Self {
        let mut flags = self.flags;
        if !name.is_ascii() {
            flags |= FLAG_UTF8;
        }

        Self {
            raw_name: name.as_bytes().to_vec(),
            flags,
            ..self.clone()
        }
    }

    fn needs_zip64_sizes(&self) -> bool {
        self.compressed_size >= ZIP64_U32 as u64 || self.uncompressed_size >= ZIP64_U32 as u64
    }

    fn needs_zip64_offset(&self) -> bool {
        self.lfh_offset >= ZIP64_U32 as u64
    }

    /// Version needed to extract, raised to 4.5 once any field of this
    /// entry spills into a ZIP64 block.
    fn effective_version_needed(&self) -> u16 {
        if self.needs_zip64_sizes() || self.needs_zip64_offset() {
            self.version_needed.max(ZIP64_VERSION)
        } else {
            self.version_needed
        }
    }

    /// Encode the Local File Header, with `local_extra` copied after the
    /// regenerated ZIP64 block (if any).
    pub fn local_header_bytes(&self, local_extra: &[u8]) -> Result<Vec<u8>> {
        let zip64 = self.needs_zip64_sizes();
        let streamed = self.has_data_descriptor();

        // With a data descriptor the real values follow the data.
        let (crc32, compressed, uncompressed) = if streamed {
            (0, 0, 0)
        } else {
            (self.crc32, self.compressed_size, self.uncompressed_size)
        };

        let mut extra = Vec::new();
        if zip64 {
            extra.write_u16::<LittleEndian>(ZIP64_EXTRA_ID)?;
            extra.write_u16::<LittleEndian>(16)?;
            extra.write_u64::<LittleEndian>(uncompressed)?;
            extra.write_u64::<LittleEndian>(compressed)?;
        }
        extra.extend_from_slice(local_extra);

        let name_len = checked_u16(self.raw_name.len(), "entry name")?;
        let extra_len = checked_u16(extra.len(), "local extra field")?;

        let mut buf = Vec::with_capacity(LFH_SIZE + self.raw_name.len() + extra.len());
        buf.extend_from_slice(LFH_SIGNATURE);
        buf.write_u16::<LittleEndian>(self.effective_version_needed())?;
        buf.write_u16::<LittleEndian>(self.flags)?;
        buf.write_u16::<LittleEndian>(self.compression_method.as_u16())?;
        buf.write_u16::<LittleEndian>(self.last_mod_time)?;
        buf.write_u16::<LittleEndian>(self.last_mod_date)?;
        buf.write_u32::<LittleEndian>(crc32)?;
        if zip64 {
            buf.write_u32::<LittleEndian>(ZIP64_U32)?;
            buf.write_u32::<LittleEndian>(ZIP64_U32)?;
        } else {
            buf.write_u32::<LittleEndian>(compressed as u32)?;
            buf.write_u32::<LittleEndian>(uncompressed as u32)?;
        }
        buf.write_u16::<LittleEndian>(name_len)?;
        buf.write_u16::<LittleEndian>(extra_len)?;
        buf.extend_from_slice(&self.raw_name);
        buf.extend_from_slice(&extra);
        Ok(buf)
    }

    /// Encode the data descriptor that follows the entry data.
    pub fn data_descriptor_bytes(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(24);
        buf.extend_from_slice(DATA_DESCRIPTOR_SIGNATURE);
        buf.write_u32::<LittleEndian>(self.crc32)?;
        if self.needs_zip64_sizes() {
            buf.write_u64::<LittleEndian>(self.compressed_size)?;
            buf.write_u64::<LittleEndian>(self.uncompressed_size)?;
        } else {
            buf.write_u32::<LittleEndian>(self.compressed_size as u32)?;
            buf.write_u32::<LittleEndian>(self.uncompressed_size as u32)?;
        }
        Ok(buf)
    }

    /// Encode the Central Directory File Header.
    pub fn central_header_bytes(&self) -> Result<Vec<u8>> {
        let zip64_sizes = self.needs_zip64_sizes();
        let zip64_offset = self.needs_zip64_offset();

        // Only the saturated fields go into the ZIP64 block, in this order.
        let mut zip64 = Vec::new();
        if zip64_sizes {
            zip64.write_u64::<LittleEndian>(self.uncompressed_size)?;
            zip64.write_u64::<LittleEndian>(self.compressed_size)?;
        }
        if zip64_offset {
            zip64.write_u64::<LittleEndian>(self.lfh_offset)?;
        }

        let mut extra = Vec::with_capacity(4 + zip64.len() + self.extra.len());
        if !zip64.is_empty() {
            extra.write_u16::<LittleEndian>(ZIP64_EXTRA_ID)?;
            extra.write_u16::<LittleEndian>(zip64.len() as u16)?;
            extra.extend_from_slice(&zip64);
        }
        extra.extend_from_slice(&self.extra);

        let name_len = checked_u16(self.raw_name.len(), "entry name")?;
        let extra_len = checked_u16(extra.len(), "extra field")?;
        let comment_len = checked_u16(self.comment.len(), "entry comment")?;

        let mut buf = Vec::with_capacity(
            CDFH_MIN_SIZE + self.raw_name.len() + extra.len() + self.comment.len(),
        );
        buf.extend_from_slice(CDFH_SIGNATURE);
        buf.write_u16::<LittleEndian>(self.version_made_by)?;
        buf.write_u16::<LittleEndian>(self.effective_version_needed())?;
        buf.write_u16::<LittleEndian>(self.flags)?;
        buf.write_u16::<LittleEndian>(self.compression_method.as_u16())?;
        buf.write_u16::<LittleEndian>(self.last_mod_time)?;
        buf.write_u16::<LittleEndian>(self.last_mod_date)?;
        buf.write_u32::<LittleEndian>(self.crc32)?;
        if zip64_sizes {
            buf.write_u32::<LittleEndian>(ZIP64_U32)?;
            buf.write_u32::<LittleEndian>(ZIP64_U32)?;
        } else {
            buf.write_u32::<LittleEndian>(self.compressed_size as u32)?;
            buf.write_u32::<LittleEndian>(self.uncompressed_size as u32)?;
        }
        buf.write_u16::<LittleEndian>(name_len)?;
        buf.write_u16::<LittleEndian>(extra_len)?;
        buf.write_u16::<LittleEndian>(comment_len)?;
        buf.write_u16::<LittleEndian>(self.disk_number_start)?;
        buf.write_u16::<LittleEndian>(self.internal_attrs)?;
        buf.write_u32::<LittleEndian>(self.external_attrs)?;
        if zip64_offset {
            buf.write_u32::<LittleEndian>(ZIP64_U32)?;
        } else {
            buf.write_u32::<LittleEndian>(self.lfh_offset as u32)?;
        }
        buf.extend_from_slice(&self.raw_name);
        buf.extend_from_slice(&extra);
        buf.extend_from_slice(&self.comment);
        Ok(buf)
    }
}

/// Split an extra field into its ZIP64 payload and all other blocks.
///
/// Blocks other than ZIP64 are returned byte-for-byte in their original
/// order. A truncated trailing block is kept verbatim.
pub fn split_zip64_extra(extra: &[u8]) -> (Option<&[u8]>, Vec<u8>) {
    let mut zip64 = None;
    let mut rest = Vec::with_capacity(extra.len());
    let mut pos = 0;

    while pos + 4 <= extra.len() {
        let header_id = u16::from_le_bytes([extra[pos], extra[pos + 1]]);
        let size = u16::from_le_bytes([extra[pos + 2], extra[pos + 3]]) as usize;
        let end = pos + 4 + size;
        if end > extra.len() {
            break;
        }

        if header_id == ZIP64_EXTRA_ID {
            zip64 = Some(&extra[pos + 4..end]);
        } else {
            rest.extend_from_slice(&extra[pos..end]);
        }
        pos = end;
    }

    rest.extend_from_slice(&extra[pos..]);
    (zip64, rest)
}

fn checked_u16(len: usize, what: &str) -> Result<u16> {
    match u16::try_from(len) {
        Ok(len) => Ok(len),
        Err(_) => bail!("{} too long: {} bytes", what, len),
    }
}
