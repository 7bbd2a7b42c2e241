//! Entries and per-invocation configuration

use crate::copy::COPY_CHUNK_SIZE;
use crate::policy::DEFAULT_COMPRESSION_LEVEL;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

/// One file to archive: the name readers will see and where its bytes live
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    /// Entry name in the archive
    pub name: String,
    /// Source locator, resolved against the base directory when one is set
    pub source: PathBuf,
}

impl Entry {
    pub fn new(name: impl Into<String>, source: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
        }
    }
}

/// Per-entry gate evaluated before the source is opened
pub type EntryFilter = Arc<dyn Fn(&Entry) -> bool + Send + Sync>;

/// Time source used when a source has no modification time
pub type Clock = Arc<dyn Fn() -> SystemTime + Send + Sync>;

/// Configuration for one archive operation
#[derive(Clone)]
pub struct ArchiveOptions {
    /// Deflate level. `-1` selects the default (6); values outside `0..=9`
    /// fall back to level 1.
    pub compression_level: i32,
    /// Skip entries whose source does not exist instead of failing
    pub skip_missing: bool,
    /// Entries rejected by the filter are left out of the archive
    pub filter: Option<EntryFilter>,
    /// Overrides the wall clock for entries without a modification time
    pub clock: Option<Clock>,
    /// Source locators are resolved under this directory and may not leave it
    pub base_dir: Option<PathBuf>,
    /// Read size used when copying a source; 0 selects the default
    pub chunk_size: usize,
}

impl Default for ArchiveOptions {
    fn default() -> Self {
        Self {
            compression_level: DEFAULT_COMPRESSION_LEVEL as i32,
            skip_missing: false,
            filter: None,
            clock: None,
            base_dir: None,
            chunk_size: COPY_CHUNK_SIZE,
        }
    }
}

impl ArchiveOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_compression_level(mut self, level: i32) -> Self {
        self.compression_level = level;
        self
    }

    pub fn with_skip_missing(mut self, skip: bool) -> Self {
        self.skip_missing = skip;
        self
    }

    pub fn with_filter<F>(mut self, filter: F) -> Self
    where
        F: Fn(&Entry) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Arc::new(filter));
        self
    }

    pub fn with_clock<F>(mut self, clock: F) -> Self
    where
        F: Fn() -> SystemTime + Send + Sync + 'static,
    {
        self.clock = Some(Arc::new(clock));
        self
    }

    /// Use a fixed timestamp, mostly useful for reproducible output in tests
    pub fn with_fixed_time(self, time: SystemTime) -> Self {
        self.with_clock(move || time)
    }

    pub fn with_base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.base_dir = Some(dir.into());
        self
    }

    pub fn with_chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = size;
        self
    }

    pub(crate) fn includes(&self, entry: &Entry) -> bool {
        self.filter.as_ref().map_or(true, |filter| filter(entry))
    }

    pub(crate) fn now(&self) -> SystemTime {
        match &self.clock {
            Some(clock) => clock(),
            None => SystemTime::now(),
        }
    }

    pub(crate) fn base_dir(&self) -> Option<&Path> {
        self.base_dir
            .as_deref()
            .filter(|dir| !dir.as_os_str().is_empty())
    }
}

impl fmt::Debug for ArchiveOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArchiveOptions")
            .field("compression_level", &self.compression_level)
            .field("skip_missing", &self.skip_missing)
            .field("filter", &self.filter.is_some())
            .field("clock", &self.clock.is_some())
            .field("base_dir", &self.base_dir)
            .field("chunk_size", &self.chunk_size)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, UNIX_EPOCH};

    #[test]
    fn defaults() {
        let opts = ArchiveOptions::default();
        assert_eq!(opts.compression_level, 6);
        assert!(!opts.skip_missing);
        assert!(opts.includes(&Entry::new("a", "a")));
        assert_eq!(opts.chunk_size, COPY_CHUNK_SIZE);
    }

    #[test]
    fn fixed_clock_and_filter() {
        let t = UNIX_EPOCH + Duration::from_secs(42);
        let opts = ArchiveOptions::new()
            .with_fixed_time(t)
            .with_filter(|e| !e.name.ends_with(".log"));
        assert_eq!(opts.now(), t);
        assert!(!opts.includes(&Entry::new("debug.log", "x")));
        assert!(opts.includes(&Entry::new("data.csv", "x")));
    }

    #[test]
    fn empty_base_dir_is_ignored() {
        let opts = ArchiveOptions::new().with_base_dir("");
        assert!(opts.base_dir().is_none());
        let opts = ArchiveOptions::new().with_base_dir("/srv");
        assert_eq!(opts.base_dir(), Some(Path::new("/srv")));
    }
}
