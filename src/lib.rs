//! # unhpi
//!
//! An HPI archive extractor with HTTP URL support using Range requests.
//!
//! This library reads the HPI package format used by Total Annihilation and
//! its successors and recreates the packed files on disk. Archives can come
//! from the local filesystem, from memory, or from a remote HTTP server; for
//! remote archives only the header, the directory and the chunks of the
//! requested files are downloaded.
//!
//! ## Features
//!
//! - Header validation and key derivation
//! - Directory tree walk with cycle and path-traversal guards
//! - Stored, LZ77 and zlib chunks, with or without chunk encryption
//! - Selective extraction and listing
//!
//! ## Example
//!
//! ```no_run
//! use std::path::Path;
//! use std::sync::Arc;
//! use unhpi::{HpiExtractor, LocalFileReader};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let reader = Arc::new(LocalFileReader::new(Path::new("totala1.hpi"))?);
//!     let extractor = HpiExtractor::open(reader).await?;
//!
//!     for file in extractor.list_files().await? {
//!         println!("{} ({} bytes)", file.path, file.data.file_size);
//!     }
//!
//!     extractor.extract_all(Path::new("out")).await?;
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod error;
pub mod hpi;
pub mod io;

pub use cli::{Cli, OutputAction, Selection};
pub use error::HpiError;
pub use hpi::{ExtractSummary, HpiExtractor, HpiFileEntry};
pub use io::{HttpOptions, HttpRangeReader, LocalFileReader, MemoryReader, ReadAt};
