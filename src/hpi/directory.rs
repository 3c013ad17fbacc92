//! Directory tree of an HPI archive.
//!
//! The directory region is decrypted once and then addressed by absolute
//! archive offsets. Nodes may in principle point anywhere in the region, so the
//! walk runs on an explicit stack and refuses to enter the same node twice.

use byteorder::{LittleEndian, ReadBytesExt};
use std::collections::HashSet;
use std::io::Cursor;
use tracing::trace;

use anyhow::Result;

use super::structures::{DirectoryEntry, FileData, HpiFileEntry};
use crate::error::HpiError;

/// Decrypted directory bytes, indexed by absolute archive offset.
///
/// Offsets below the region start (the header) read as zero.
pub struct DirectoryRegion {
    bytes: Vec<u8>,
}

impl DirectoryRegion {
    /// Wrap the decrypted bytes that live at `start` in the archive.
    pub fn new(start: u32, decrypted: Vec<u8>) -> Self {
        let mut bytes = vec![0u8; start as usize];
        bytes.extend_from_slice(&decrypted);
        Self { bytes }
    }

    fn slice(&self, offset: u32, len: usize) -> Result<&[u8], HpiError> {
        let start = offset as usize;
        start
            .checked_add(len)
            .and_then(|end| self.bytes.get(start..end))
            .ok_or(HpiError::DirectoryOutOfRange {
                offset: u64::from(offset),
                len: len as u64,
            })
    }

    /// Read a directory node: (entry count, entry table offset)
    pub fn read_node(&self, offset: u32) -> Result<(u32, u32)> {
        let mut cursor = Cursor::new(self.slice(offset, 8)?);
        let count = cursor.read_u32::<LittleEndian>()?;
        let table = cursor.read_u32::<LittleEndian>()?;
        Ok((count, table))
    }

    pub fn read_entry(&self, offset: u32) -> Result<DirectoryEntry> {
        DirectoryEntry::from_bytes(self.slice(offset, DirectoryEntry::SIZE)?)
    }

    pub fn read_file_data(&self, offset: u32) -> Result<FileData> {
        FileData::from_bytes(self.slice(offset, FileData::SIZE)?)
    }

    /// Read the NUL-terminated name at `offset`
    pub fn read_name(&self, offset: u32) -> Result<String> {
        let tail = self
            .bytes
            .get(offset as usize..)
            .ok_or(HpiError::DirectoryOutOfRange {
                offset: u64::from(offset),
                len: 1,
            })?;
        let end = tail
            .iter()
            .position(|&b| b == 0)
            .ok_or(HpiError::UnterminatedName { offset })?;
        Ok(String::from_utf8_lossy(&tail[..end]).into_owned())
    }

    /// Walk the tree from the node at `root`, returning every file in
    /// depth-first order.
    pub fn walk(&self, root: u32) -> Result<Vec<HpiFileEntry>> {
        let mut visited = HashSet::new();
        let mut files = Vec::new();
        let mut stack = vec![self.open_node(root, String::new(), &mut visited)?];

        while let Some(frame) = stack.last_mut() {
            if frame.next == frame.count {
                stack.pop();
                continue;
            }

            let entry_offset = frame.table + frame.next * DirectoryEntry::SIZE as u32;
            frame.next += 1;

            let entry = self.read_entry(entry_offset)?;
            let name = self.read_name(entry.name_offset)?;
            check_name(&name, entry.name_offset)?;
            let path = if frame.path.is_empty() {
                name
            } else {
                format!("{}/{}", frame.path, name)
            };

            if entry.is_directory() {
                trace!(path = %path, offset = entry.data_offset, "entering directory");
                let child = self.open_node(entry.data_offset, path, &mut visited)?;
                stack.push(child);
            } else {
                let data = self.read_file_data(entry.data_offset)?;
                files.push(HpiFileEntry {
                    path,
                    metadata_offset: entry.data_offset,
                    data,
                });
            }
        }

        Ok(files)
    }

    fn open_node(&self, offset: u32, path: String, visited: &mut HashSet<u32>) -> Result<Frame> {
        if !visited.insert(offset) {
            return Err(HpiError::DirectoryCycle { offset }.into());
        }
        let (count, table) = self.read_node(offset)?;
        // the whole table must lie inside the region; this also keeps entry offsets within u32
        let table_len = u64::from(count) * DirectoryEntry::SIZE as u64;
        if u64::from(table) + table_len > self.bytes.len() as u64 {
            return Err(HpiError::DirectoryOutOfRange {
                offset: u64::from(table),
                len: table_len,
            }
            .into());
        }
        Ok(Frame {
            path,
            table,
            count,
            next: 0,
        })
    }
}

/// A directory node being walked
struct Frame {
    path: String,
    table: u32,
    count: u32,
    next: u32,
}

/// Names become single path components on disk.
fn check_name(name: &str, offset: u32) -> Result<(), HpiError> {
    let bad = name.is_empty()
        || name == "."
        || name == ".."
        || name.contains(['/', '\\', ':']);
    if bad {
        return Err(HpiError::InvalidEntryName {
            name: name.to_string(),
            offset,
        });
    }
    Ok(())
}
