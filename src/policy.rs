//! Per-entry compression policy
//!
//! Entries whose extension marks an already-compressed format are stored as-is;
//! everything else is deflated. Recompressing a JPEG or a nested zip costs CPU
//! and rarely saves a byte.

/// Compression method to use for ZIP entries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionMethod {
    /// No compression (stored)
    Stored,
    /// DEFLATE compression
    Deflate,
}

impl CompressionMethod {
    pub(crate) fn to_zip_method(self) -> u16 {
        match self {
            CompressionMethod::Stored => 0,
            CompressionMethod::Deflate => 8,
        }
    }
}

/// Extensions of formats that are already compressed. Matched case-sensitively.
pub const PRECOMPRESSED_EXTENSIONS: &[&str] = &[
    ".zip", ".rar", ".7z", ".jpg", ".jpeg", ".png", ".gif", ".pdf", ".mp4", ".mov", ".avi",
    ".mkv", ".webp", ".docx", ".xlsx", ".pptx",
];

/// Level used when the caller passes `-1`
pub const DEFAULT_COMPRESSION_LEVEL: u32 = 6;

/// Level substituted for out-of-range values
pub const FAST_COMPRESSION_LEVEL: u32 = 1;

/// Extension of the last path segment, including the leading dot.
///
/// `"dir/photo.png"` gives `".png"`; a segment without a dot gives `""`.
pub fn extension(name: &str) -> &str {
    let last = name.rsplit('/').next().unwrap_or(name);
    match last.rfind('.') {
        Some(idx) => &last[idx..],
        None => "",
    }
}

pub fn is_precompressed(name: &str) -> bool {
    let ext = extension(name);
    !ext.is_empty() && PRECOMPRESSED_EXTENSIONS.contains(&ext)
}

/// Choose the method for an entry from its logical name.
pub fn method_for_name(name: &str) -> CompressionMethod {
    if is_precompressed(name) {
        CompressionMethod::Stored
    } else {
        CompressionMethod::Deflate
    }
}

/// Map a caller-supplied level onto a deflate level (0-9).
///
/// `-1` selects [`DEFAULT_COMPRESSION_LEVEL`]; any other value outside `0..=9`
/// falls back to [`FAST_COMPRESSION_LEVEL`] instead of failing.
pub fn resolve_level(level: i32) -> u32 {
    match level {
        -1 => DEFAULT_COMPRESSION_LEVEL,
        0..=9 => level as u32,
        _ => FAST_COMPRESSION_LEVEL,
    }
}
