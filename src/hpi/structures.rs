use byteorder::{LittleEndian, ReadBytesExt};
use std::io::Cursor;

use anyhow::{Result, bail};

use crate::error::HpiError;

/// "HAPI" read as a little-endian u32
pub const HPI_MAGIC: u32 = 0x4950_4148;

/// "BANK" read as a little-endian u32, set in the save field of saved games
pub const SAVED_GAME_MAGIC: u32 = 0x4B4E_4142;

/// "SQSH" read as a little-endian u32, starts every chunk header
pub const CHUNK_MAGIC: u32 = 0x4853_5153;

/// Decompressed size of every chunk but the last one of a file
pub const CHUNK_SIZE: u64 = 65536;

/// Chunk compression methods
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionMethod {
    None,
    Lz77,
    Zlib,
    Unknown(u8),
}

impl CompressionMethod {
    pub fn from_u8(value: u8) -> Self {
        match value {
            0 => CompressionMethod::None,
            1 => CompressionMethod::Lz77,
            2 => CompressionMethod::Zlib,
            _ => CompressionMethod::Unknown(value),
        }
    }

    pub fn as_u8(&self) -> u8 {
        match self {
            CompressionMethod::None => 0,
            CompressionMethod::Lz77 => 1,
            CompressionMethod::Zlib => 2,
            CompressionMethod::Unknown(v) => *v,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            CompressionMethod::None => "stored",
            CompressionMethod::Lz77 => "lz77",
            CompressionMethod::Zlib => "zlib",
            CompressionMethod::Unknown(_) => "unknown",
        }
    }
}

/// Archive header - 20 bytes, the only part of the file never encrypted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HpiHeader {
    pub marker: u32,
    pub save: u32,
    /// End of the directory region, counted from the start of the file
    pub directory_size: u32,
    /// Raw key seed; see [`HpiHeader::derived_key`]
    pub key: u32,
    /// Offset of the root directory node
    pub start: u32,
}

impl HpiHeader {
    pub const SIZE: usize = 20;

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < Self::SIZE {
            bail!("Invalid HPI header: {} bytes", data.len());
        }

        let mut cursor = Cursor::new(data);
        let header = Self {
            marker: cursor.read_u32::<LittleEndian>()?,
            save: cursor.read_u32::<LittleEndian>()?,
            directory_size: cursor.read_u32::<LittleEndian>()?,
            key: cursor.read_u32::<LittleEndian>()?,
            start: cursor.read_u32::<LittleEndian>()?,
        };

        if header.marker != HPI_MAGIC {
            return Err(HpiError::InvalidMagic {
                expected: HPI_MAGIC,
                actual: header.marker,
            }
            .into());
        }

        Ok(header)
    }

    /// Check that the directory region lies inside an archive of `archive_size` bytes
    pub fn validate(&self, archive_size: u64) -> Result<()> {
        if self.start > self.directory_size || u64::from(self.directory_size) > archive_size {
            return Err(HpiError::DirectoryRegionOutOfRange {
                start: self.start,
                end: self.directory_size,
                archive_size,
            }
            .into());
        }
        Ok(())
    }

    /// Single-byte cipher key; zero means the archive is not encrypted
    pub fn derived_key(&self) -> u8 {
        ((self.key << 2) | (self.key >> 6)) as u8
    }

    pub fn is_saved_game(&self) -> bool {
        self.save == SAVED_GAME_MAGIC
    }

    /// Length of the encrypted directory bytes following `start`
    pub fn directory_len(&self) -> u32 {
        self.directory_size - self.start
    }
}

/// Directory table record - 9 bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirectoryEntry {
    pub name_offset: u32,
    /// Offset of a directory node or of a [`FileData`] record
    pub data_offset: u32,
    pub flag: u8,
}

impl DirectoryEntry {
    pub const SIZE: usize = 9;

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let mut cursor = Cursor::new(data);
        Ok(Self {
            name_offset: cursor.read_u32::<LittleEndian>()?,
            data_offset: cursor.read_u32::<LittleEndian>()?,
            flag: cursor.read_u8()?,
        })
    }

    pub fn is_directory(&self) -> bool {
        self.flag == 1
    }
}

/// File record found at a file entry's data offset - 9 bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileData {
    /// Absolute archive offset of the chunk size table
    pub data_offset: u32,
    pub file_size: u32,
    pub flag: u8,
}

impl FileData {
    pub const SIZE: usize = 9;

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let mut cursor = Cursor::new(data);
        Ok(Self {
            data_offset: cursor.read_u32::<LittleEndian>()?,
            file_size: cursor.read_u32::<LittleEndian>()?,
            flag: cursor.read_u8()?,
        })
    }

    pub fn chunk_count(&self) -> usize {
        u64::from(self.file_size).div_ceil(CHUNK_SIZE) as usize
    }

    pub fn compression_method(&self) -> CompressionMethod {
        CompressionMethod::from_u8(self.flag)
    }
}

/// Chunk header - 19 bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkHeader {
    pub marker: u32,
    pub compression_method: CompressionMethod,
    pub encrypted: u8,
    pub compressed_size: u32,
    pub decompressed_size: u32,
    pub checksum: u32,
}

impl ChunkHeader {
    pub const SIZE: usize = 19;

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let mut cursor = Cursor::new(data);
        let marker = cursor.read_u32::<LittleEndian>()?;
        let _reserved = cursor.read_u8()?;
        Ok(Self {
            marker,
            compression_method: CompressionMethod::from_u8(cursor.read_u8()?),
            encrypted: cursor.read_u8()?,
            compressed_size: cursor.read_u32::<LittleEndian>()?,
            decompressed_size: cursor.read_u32::<LittleEndian>()?,
            checksum: cursor.read_u32::<LittleEndian>()?,
        })
    }

    pub fn is_encrypted(&self) -> bool {
        self.encrypted != 0
    }
}

/// File entry produced by walking the directory tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HpiFileEntry {
    /// Archive-relative path, components joined with `/`
    pub path: String,
    /// Offset of the [`FileData`] record in the directory region
    pub metadata_offset: u32,
    pub data: FileData,
}

impl HpiFileEntry {
    /// Output location of this entry under `root`
    pub fn output_path(&self, root: &std::path::Path) -> std::path::PathBuf {
        self.path.split('/').fold(root.to_path_buf(), |p, c| p.join(c))
    }

    /// Last path component
    pub fn file_name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }
}
