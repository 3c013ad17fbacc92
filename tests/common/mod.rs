//! Synthetic HPI archive builder for integration tests.

#![allow(dead_code)]

use flate2::Compression;
use flate2::write::ZlibEncoder;
use std::io::Write;

const HPI_MAGIC: u32 = 0x4950_4148;
const CHUNK_MAGIC: u32 = 0x4853_5153;
const HEADER_SIZE: usize = 20;

/// One chunk as it should appear on disk
#[derive(Clone)]
pub struct ChunkSpec {
    pub method: u8,
    pub encrypted: bool,
    /// Payload after compression, before the chunk transform
    pub payload: Vec<u8>,
    pub decompressed_size: u32,
}

impl ChunkSpec {
    pub fn stored(data: &[u8]) -> Self {
        Self {
            method: 0,
            encrypted: false,
            payload: data.to_vec(),
            decompressed_size: data.len() as u32,
        }
    }

    pub fn zlib(data: &[u8]) -> Self {
        let mut enc = ZlibEncoder::new(Vec::new(), Compression::best());
        enc.write_all(data).unwrap();
        Self {
            method: 2,
            encrypted: false,
            payload: enc.finish().unwrap(),
            decompressed_size: data.len() as u32,
        }
    }

    /// LZ77 stream made only of literals
    pub fn lz_literals(data: &[u8]) -> Self {
        let mut stream = Vec::new();
        let mut groups = data.chunks(8);
        loop {
            match groups.next() {
                Some(group) if group.len() == 8 => {
                    stream.push(0x00);
                    stream.extend_from_slice(group);
                }
                Some(group) => {
                    stream.push(1 << group.len());
                    stream.extend_from_slice(group);
                    stream.extend_from_slice(&[0, 0]);
                    break;
                }
                None => {
                    stream.extend_from_slice(&[0x01, 0, 0]);
                    break;
                }
            }
        }
        Self {
            method: 1,
            encrypted: false,
            payload: stream,
            decompressed_size: data.len() as u32,
        }
    }

    pub fn encrypted(mut self) -> Self {
        self.encrypted = true;
        self
    }

    fn write(&self, out: &mut Vec<u8>) {
        let payload: Vec<u8> = if self.encrypted {
            self.payload
                .iter()
                .enumerate()
                .map(|(i, &b)| (b ^ i as u8).wrapping_add(i as u8))
                .collect()
        } else {
            self.payload.clone()
        };
        let checksum = payload.iter().fold(0u32, |acc, &b| acc.wrapping_add(u32::from(b)));

        out.extend_from_slice(&CHUNK_MAGIC.to_le_bytes());
        out.push(0x02);
        out.push(self.method);
        out.push(u8::from(self.encrypted));
        out.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        out.extend_from_slice(&self.decompressed_size.to_le_bytes());
        out.extend_from_slice(&checksum.to_le_bytes());
        out.extend_from_slice(&payload);
    }
}

pub enum Node {
    Dir(String, Vec<Node>),
    File {
        name: String,
        file_size: u32,
        chunks: Vec<ChunkSpec>,
    },
}

pub fn dir(name: &str, children: Vec<Node>) -> Node {
    Node::Dir(name.to_string(), children)
}

/// File whose declared size is the sum of its chunks' decompressed sizes
pub fn file(name: &str, chunks: Vec<ChunkSpec>) -> Node {
    let file_size = chunks.iter().map(|c| c.decompressed_size).sum();
    Node::File {
        name: name.to_string(),
        file_size,
        chunks,
    }
}

struct PendingFile {
    record_offset: usize,
    file_size: u32,
    chunks: Vec<ChunkSpec>,
}

/// Serialize `root` entries into a complete archive, encrypted with `key_seed`.
pub fn build_archive(key_seed: u32, root: Vec<Node>) -> Vec<u8> {
    let mut out = vec![0u8; HEADER_SIZE];
    let mut pending = Vec::new();
    write_node(&mut out, root, &mut pending);
    let directory_size = out.len() as u32;

    for file in pending {
        let data_offset = out.len() as u32;
        let mut records = Vec::new();
        let mut sizes = Vec::new();
        for chunk in &file.chunks {
            let before = records.len();
            chunk.write(&mut records);
            sizes.push((records.len() - before) as u32);
        }
        for size in sizes {
            out.extend_from_slice(&size.to_le_bytes());
        }
        out.extend_from_slice(&records);

        let at = file.record_offset;
        out[at..at + 4].copy_from_slice(&data_offset.to_le_bytes());
        out[at + 4..at + 8].copy_from_slice(&file.file_size.to_le_bytes());
        out[at + 8] = file.chunks.first().map_or(0, |c| c.method);
    }

    let header = [HPI_MAGIC, 0x0001_0000, directory_size, key_seed, HEADER_SIZE as u32];
    for (i, v) in header.iter().enumerate() {
        out[i * 4..i * 4 + 4].copy_from_slice(&v.to_le_bytes());
    }

    let key = ((key_seed << 2) | (key_seed >> 6)) as u8;
    if key != 0 {
        for (pos, byte) in out.iter_mut().enumerate().skip(HEADER_SIZE) {
            *byte ^= (pos as u8) ^ key;
        }
    }
    out
}

fn write_node(out: &mut Vec<u8>, children: Vec<Node>, pending: &mut Vec<PendingFile>) -> u32 {
    let node_offset = out.len();
    let table_offset = node_offset + 8;
    out.extend_from_slice(&(children.len() as u32).to_le_bytes());
    out.extend_from_slice(&(table_offset as u32).to_le_bytes());
    out.resize(table_offset + 9 * children.len(), 0);

    for (i, child) in children.into_iter().enumerate() {
        let entry_at = table_offset + 9 * i;
        let name_offset = out.len() as u32;
        let (data_offset, flag) = match child {
            Node::Dir(name, grandchildren) => {
                out.extend_from_slice(name.as_bytes());
                out.push(0);
                (write_node(out, grandchildren, pending), 1u8)
            }
            Node::File {
                name,
                file_size,
                chunks,
            } => {
                out.extend_from_slice(name.as_bytes());
                out.push(0);
                let record_offset = out.len();
                out.resize(record_offset + 9, 0);
                pending.push(PendingFile {
                    record_offset,
                    file_size,
                    chunks,
                });
                (record_offset as u32, 0u8)
            }
        };
        out[entry_at..entry_at + 4].copy_from_slice(&name_offset.to_le_bytes());
        out[entry_at + 4..entry_at + 8].copy_from_slice(&data_offset.to_le_bytes());
        out[entry_at + 8] = flag;
    }
    node_offset as u32
}
