//! # zipstream: streaming zip archives as base64
//!
//! `zipstream` builds a zip archive from a list of files and writes it, base64
//! encoded, straight into any `Write` sink. Nothing is buffered whole: each
//! source is copied in fixed-size chunks through the compressor, the zip
//! framing and the base64 encoder in a single pass. Useful when an API has to
//! return a bundle of files inside a JSON or RPC payload.
//!
//! ## Features
//!
//! - **Single pass**: no temp files, no seek on the destination
//! - **Bounded memory**: one copy chunk plus a bounded compressed buffer
//! - **Per-entry policy**: already-compressed formats are stored, the rest deflated
//! - **Zip-slip safe**: unsafe or duplicate entry names are rejected before any I/O
//! - **Base-directory confinement**: source paths may be pinned under a root
//! - **Cooperative cancellation**: checked before each entry and each chunk
//!
//! ## Quick Start
//!
//! ```no_run
//! use zipstream::{assemble_archive_to_string, ArchiveOptions, Entry};
//!
//! let entries = vec![
//!     Entry::new("a.txt", "data/a.txt"),
//!     Entry::new("photos/b.png", "data/b.png"),
//! ];
//! let options = ArchiveOptions::default()
//!     .with_base_dir("/srv/export")
//!     .with_skip_missing(true);
//!
//! let base64_zip = assemble_archive_to_string(&entries, &options)?;
//! println!("{} base64 chars", base64_zip.len());
//! # Ok::<(), zipstream::Error>(())
//! ```
//!
//! ### Streaming into a caller-owned sink with cancellation
//!
//! ```no_run
//! use std::time::Duration;
//! use zipstream::{assemble_archive, ArchiveOptions, CancelToken, Entry};
//!
//! let token = CancelToken::with_timeout(Duration::from_secs(30));
//! let entries = vec![Entry::new("log.txt", "/var/log/app.log")];
//! let mut response_body = Vec::new();
//!
//! let summary = assemble_archive(&token, &mut response_body, &entries, &ArchiveOptions::default())?;
//! println!("wrote {} entries", summary.entries_written);
//! # Ok::<(), zipstream::Error>(())
//! ```

pub mod assembler;
pub mod cancel;
pub mod copy;
pub mod error;
pub mod options;
pub mod policy;
pub mod relay;
pub mod safety;
pub mod source;
pub mod writer;

pub use assembler::{
    assemble_archive, assemble_archive_to_string, assemble_archive_with, ArchiveSummary,
};
pub use cancel::{CancelSignal, CancelToken, NeverCancel};
pub use copy::{copy_cancellable, copy_chunked, COPY_CHUNK_SIZE};
pub use error::{CloseStage, Error, ErrorKind, Result};
pub use options::{ArchiveOptions, Clock, Entry, EntryFilter};
pub use policy::{is_precompressed, method_for_name, resolve_level, CompressionMethod};
pub use relay::Base64Relay;
pub use safety::{safe_join, validate_entries, validate_entry_name};
pub use source::{FsSource, OpenedSource, SourceProvider};
pub use writer::StreamingZipWriter;
