//! Where entry bytes come from
//!
//! The assembler never touches the filesystem directly. It asks a
//! [`SourceProvider`] to open a locator and drops the returned source before
//! moving to the next entry, which closes it.

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use std::time::SystemTime;

/// An opened source and what its metadata said about it
pub struct OpenedSource<R> {
    pub reader: R,
    /// Modification time, when the source can report one
    pub modified: Option<SystemTime>,
    /// Expected length in bytes, used to pick ZIP64 headers up front
    pub size: Option<u64>,
}

pub trait SourceProvider {
    type Reader: Read;

    /// Open `locator` for reading.
    ///
    /// A missing source must be reported as [`io::ErrorKind::NotFound`] so
    /// that skip-missing can recognise it.
    fn open(&self, locator: &Path) -> io::Result<OpenedSource<Self::Reader>>;
}

impl<P: SourceProvider + ?Sized> SourceProvider for &P {
    type Reader = P::Reader;

    fn open(&self, locator: &Path) -> io::Result<OpenedSource<Self::Reader>> {
        (**self).open(locator)
    }
}

/// Sources read from the local filesystem
#[derive(Debug, Clone, Copy, Default)]
pub struct FsSource;

impl SourceProvider for FsSource {
    type Reader = File;

    fn open(&self, locator: &Path) -> io::Result<OpenedSource<File>> {
        let file = File::open(locator)?;
        let metadata = file.metadata().ok();
        let modified = metadata.as_ref().and_then(|m| m.modified().ok());
        let size = metadata.as_ref().map(|m| m.len());
        Ok(OpenedSource {
            reader: file,
            modified,
            size,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn fs_source_reads_file_and_mtime() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"payload").unwrap();

        let mut opened = FsSource.open(file.path()).unwrap();
        let mut data = String::new();
        opened.reader.read_to_string(&mut data).unwrap();
        assert_eq!(data, "payload");
        assert!(opened.modified.is_some());
        assert_eq!(opened.size, Some(7));
    }

    #[test]
    fn missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = FsSource.open(&dir.path().join("nope")).err().unwrap();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }
}
