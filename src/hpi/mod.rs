//! HPI archive parsing and extraction.
//!
//! HPI is the package format of Total Annihilation and related games. It
//! bundles a directory tree with file contents that are split into chunks of
//! up to 64 KiB, each compressed on its own.
//!
//! ## Architecture
//!
//! - [`structures`]: on-disk records (header, directory entries, chunk headers)
//! - [`cipher`]: the archive keystream and the per-chunk payload transform
//! - [`lz`]: the LZ77 variant used by compression method 1
//! - [`chunk`]: chunk framing and dispatch to the right decoder
//! - [`directory`]: decrypted directory region and the tree walk
//! - [`parser`]: reads header, directory and chunk tables from a [`ReadAt`](crate::io::ReadAt) source
//! - [`extractor`]: high-level extraction API for end users
//!
//! ## Format Overview
//!
//! 1. A 20-byte clear-text header holding the key seed and directory bounds
//! 2. The directory region, XOR-obfuscated by absolute file position
//! 3. Per file: a table of chunk sizes followed by the chunks, obfuscated
//!    the same way
//!
//! Each chunk starts with a `SQSH` header naming its compression method
//! (stored, LZ77 or zlib) and whether its payload carries the extra chunk
//! transform.
//!
//! ## Limitations
//!
//! - Read-only; archives cannot be created
//! - Chunk checksums are not verified

pub mod chunk;
pub mod cipher;
pub mod directory;
pub mod lz;
pub mod structures;

mod extractor;
mod parser;

pub use extractor::{ExtractSummary, HpiExtractor};
pub use parser::HpiParser;
pub use structures::*;
