//! Single-pass archive assembly onto a base64 sink
//!
//! Pipeline per invocation:
//!
//! ```text
//! source -> cancellable copy -> zip entry (stored | deflate) -> base64 relay -> sink
//! ```
//!
//! Names are validated up front, so an unsafe or duplicate name fails the
//! operation before any source is opened or any byte is written. Later
//! failures (open, read, write, cancellation) stop the loop, but bytes already
//! handed to the sink stay there: callers needing atomic output should write
//! to a temporary destination and publish it on success.

use crate::cancel::{CancelSignal, NeverCancel};
use crate::copy::copy_chunked;
use crate::error::{CloseStage, Error, Result};
use crate::options::{ArchiveOptions, Entry};
use crate::policy::{method_for_name, resolve_level};
use crate::relay::Base64Relay;
use crate::safety::{safe_join, validate_entries};
use crate::source::{FsSource, SourceProvider};
use crate::writer::StreamingZipWriter;
use std::borrow::Cow;
use std::io::{ErrorKind, Write};
use std::path::Path;
use tracing::{debug, trace, warn};

/// What an assembly run did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ArchiveSummary {
    /// Entries written to the archive
    pub entries_written: usize,
    /// Entries rejected by the filter
    pub entries_filtered: usize,
    /// Entries skipped because their source does not exist
    pub entries_missing: usize,
    /// Uncompressed bytes read from sources
    pub bytes_read: u64,
    /// Raw archive bytes accepted by the base64 relay
    pub archive_bytes: u64,
    /// Base64 bytes the relay produced for them, padding included
    pub encoded_bytes: u64,
}

/// Assemble a zip of filesystem sources and stream it, base64 encoded, into `sink`.
///
/// # Example
/// ```no_run
/// use zipstream::{assemble_archive, ArchiveOptions, CancelToken, Entry};
///
/// let token = CancelToken::new();
/// let entries = vec![
///     Entry::new("report.csv", "/var/data/report.csv"),
///     Entry::new("chart.png", "/var/data/chart.png"),
/// ];
/// let mut body = Vec::new();
/// assemble_archive(&token, &mut body, &entries, &ArchiveOptions::default())?;
/// # Ok::<(), zipstream::Error>(())
/// ```
pub fn assemble_archive<C, W>(
    cancel: &C,
    sink: W,
    entries: &[Entry],
    options: &ArchiveOptions,
) -> Result<ArchiveSummary>
where
    C: CancelSignal + ?Sized,
    W: Write,
{
    assemble_archive_with(&FsSource, cancel, sink, entries, options)
}

/// Assemble into memory and return the base64 text.
pub fn assemble_archive_to_string(entries: &[Entry], options: &ArchiveOptions) -> Result<String> {
    let mut out = Vec::new();
    assemble_archive(&NeverCancel, &mut out, entries, options)?;
    // The relay only ever emits base64 alphabet bytes.
    String::from_utf8(out).map_err(|e| Error::Archive(format!("non-ASCII base64 output: {e}")))
}

/// Same as [`assemble_archive`], reading sources through `provider`.
pub fn assemble_archive_with<P, C, W>(
    provider: &P,
    cancel: &C,
    sink: W,
    entries: &[Entry],
    options: &ArchiveOptions,
) -> Result<ArchiveSummary>
where
    P: SourceProvider + ?Sized,
    C: CancelSignal + ?Sized,
    W: Write,
{
    validate_entries(entries)?;

    let level = resolve_level(options.compression_level);
    debug!(
        entries = entries.len(),
        level,
        skip_missing = options.skip_missing,
        "assembling archive"
    );

    let mut zip = StreamingZipWriter::with_compression(Base64Relay::new(sink), level);
    let mut summary = ArchiveSummary::default();

    let written = write_entries(provider, cancel, &mut zip, entries, options, &mut summary);

    // Both finalizers run whatever happened above; the earliest error wins.
    let finished = zip
        .finish()
        .map_err(|e| Error::close(CloseStage::Archive, e));
    let relay = zip.into_inner();
    summary.archive_bytes = relay.bytes_in();
    summary.encoded_bytes = relay.encoded_len();
    let closed = relay
        .close()
        .map(drop)
        .map_err(|e| Error::close(CloseStage::Base64, e.into()));

    let outcome = first_error(written, [finished, closed]);
    match &outcome {
        Ok(()) => debug!(
            written = summary.entries_written,
            filtered = summary.entries_filtered,
            missing = summary.entries_missing,
            bytes_read = summary.bytes_read,
            archive_bytes = summary.archive_bytes,
            encoded_bytes = summary.encoded_bytes,
            "archive assembled"
        ),
        Err(err) => debug!(error = %err, "archive assembly failed"),
    }
    outcome.map(|()| summary)
}

fn write_entries<P, C, W>(
    provider: &P,
    cancel: &C,
    zip: &mut StreamingZipWriter<W>,
    entries: &[Entry],
    options: &ArchiveOptions,
    summary: &mut ArchiveSummary,
) -> Result<()>
where
    P: SourceProvider + ?Sized,
    C: CancelSignal + ?Sized,
    W: Write,
{
    for entry in entries {
        cancel.check().map_err(|e| e.with_entry(&entry.name))?;

        if !options.includes(entry) {
            debug!(name = %entry.name, "entry filtered out");
            summary.entries_filtered += 1;
            continue;
        }

        let path = resolve_source(options.base_dir(), &entry.source)
            .map_err(|e| e.with_entry(&entry.name))?;

        let mut source = match provider.open(&path) {
            Ok(source) => source,
            Err(e) if e.kind() == ErrorKind::NotFound && options.skip_missing => {
                debug!(name = %entry.name, path = %path.display(), "source missing, skipping");
                summary.entries_missing += 1;
                continue;
            }
            Err(e) => {
                return Err(Error::SourceUnavailable {
                    entry: entry.name.clone(),
                    path: path.into_owned(),
                    source: e,
                })
            }
        };

        let modified = source.modified.unwrap_or_else(|| options.now());
        let method = method_for_name(&entry.name);
        zip.start_entry_with_hint(&entry.name, method, modified, source.size)
            .map_err(|e| e.with_entry(&entry.name))?;

        let copied = copy_chunked(cancel, &mut source.reader, zip, options.chunk_size)
            .map_err(|e| e.with_entry(&entry.name))?;

        trace!(name = %entry.name, ?method, bytes = copied, "entry written");
        summary.entries_written += 1;
        summary.bytes_read += copied;
        // `source` drops here, closing it before the next entry is opened.
    }
    Ok(())
}

fn resolve_source<'a>(base_dir: Option<&Path>, locator: &'a Path) -> Result<Cow<'a, Path>> {
    match base_dir {
        Some(base) => safe_join(base, locator).map(Cow::Owned),
        None => Ok(Cow::Borrowed(locator)),
    }
}

/// Keep the first error; later ones are only logged.
fn first_error<const N: usize>(main: Result<()>, cleanup: [Result<()>; N]) -> Result<()> {
    let mut outcome = main;
    for result in cleanup {
        if let Err(err) = result {
            match &outcome {
                Ok(()) => outcome = Err(err),
                Err(_) => warn!(error = %err, "discarding close error after earlier failure"),
            }
        }
    }
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind as Kind;
    use std::io;

    #[test]
    fn first_error_wins() {
        let io_err = |msg: &str| -> Result<()> {
            Err(io::Error::new(io::ErrorKind::Other, msg.to_string()).into())
        };
        let out = first_error(Err(Error::cancelled()), [io_err("zip"), io_err("b64")]);
        assert_eq!(out.unwrap_err().kind(), Kind::Cancelled);

        let out = first_error(Ok(()), [Ok(()), io_err("b64")]);
        assert_eq!(out.unwrap_err().to_string(), "I/O error: b64");

        assert!(first_error(Ok(()), [Ok(()), Ok(())]).is_ok());
    }

    #[test]
    fn locator_passes_through_without_base() {
        let p = resolve_source(None, Path::new("../anywhere")).unwrap();
        assert_eq!(p, Path::new("../anywhere"));
    }

    #[test]
    fn locator_escape_is_rejected_with_base() {
        let err = resolve_source(Some(Path::new("/srv/data")), Path::new("../secret")).unwrap_err();
        assert_eq!(err.kind(), Kind::PathEscape);
    }
}
