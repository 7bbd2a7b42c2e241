//! Entry name validation and base-directory confinement
//!
//! Two distinct checks live here. [`validate_entries`] looks at the names a
//! reader will see when extracting (zip-slip protection) and rejects
//! duplicates. [`safe_join`] confines a filesystem source locator to a base
//! directory. Both are lexical: nothing touches the filesystem.

use crate::error::{Error, Result};
use crate::options::Entry;
use std::collections::HashSet;
use std::env;
use std::path::{Component, Path, PathBuf};

/// Check one archive entry name.
///
/// Rejected: empty names, a `..` segment (after treating `\` as `/`), a
/// leading separator, any colon, and names the platform considers absolute.
pub fn validate_entry_name(name: &str) -> Result<()> {
    let reject = |reason| {
        Err(Error::Validation {
            name: name.to_string(),
            reason,
        })
    };

    if name.is_empty() {
        return reject("name is empty");
    }
    let normalized = name.replace('\\', "/");
    if normalized.starts_with('/') {
        return reject("leading path separator");
    }
    if normalized.split('/').any(|segment| segment == "..") {
        return reject("parent directory segment");
    }
    if name.contains(':') {
        return reject("colon or drive letter");
    }
    if Path::new(name).is_absolute() {
        return reject("absolute path");
    }
    Ok(())
}

/// Validate every name and reject duplicates, before any source is touched.
pub fn validate_entries(entries: &[Entry]) -> Result<()> {
    let mut seen = HashSet::with_capacity(entries.len());
    for entry in entries {
        validate_entry_name(&entry.name)?;
        if !seen.insert(entry.name.as_str()) {
            return Err(Error::DuplicateEntry(entry.name.clone()));
        }
    }
    Ok(())
}

/// Join `rel` onto `base`, failing if the result would leave `base`.
///
/// Both sides are made absolute against the current directory and cleaned of
/// `.` and `..` before comparison. An empty `base` means no restriction and
/// returns `rel` unchanged.
pub fn safe_join(base: &Path, rel: &Path) -> Result<PathBuf> {
    if base.as_os_str().is_empty() {
        return Ok(rel.to_path_buf());
    }
    let abs_base = absolute_clean(base)?;
    let abs_joined = absolute_clean(&base.join(rel))?;

    // Path::starts_with compares whole components, so "/base-other" is not
    // treated as inside "/base".
    if abs_joined.starts_with(&abs_base) {
        Ok(abs_joined)
    } else {
        Err(Error::PathEscape {
            entry: None,
            path: rel.to_path_buf(),
        })
    }
}

fn absolute_clean(path: &Path) -> Result<PathBuf> {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        env::current_dir()?.join(path)
    };
    Ok(clean(&absolute))
}

/// Lexically resolve `.` and `..`. `..` at the root stays at the root.
fn clean(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn kind(name: &str) -> Option<ErrorKind> {
        validate_entry_name(name).err().map(|e| e.kind())
    }

    #[test]
    fn accepts_plain_and_nested_names() {
        assert!(validate_entry_name("a.txt").is_ok());
        assert!(validate_entry_name("dir/sub/b.bin").is_ok());
        assert!(validate_entry_name("weird..name").is_ok());
        assert!(validate_entry_name("..hidden/x").is_ok());
    }

    #[test]
    fn rejects_unsafe_names() {
        for name in [
            "",
            "../evil",
            "a/../../evil",
            "a\\..\\evil",
            "..",
            "/etc/passwd",
            "\\windows",
            "C:evil",
            "c:\\temp\\x",
        ] {
            assert_eq!(kind(name), Some(ErrorKind::Validation), "{name:?}");
        }
    }

    #[test]
    fn rejects_duplicates() {
        let entries = vec![
            Entry::new("a.txt", "one"),
            Entry::new("b.txt", "two"),
            Entry::new("a.txt", "three"),
        ];
        let err = validate_entries(&entries).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DuplicateEntry);
        assert_eq!(err.entry(), Some("a.txt"));
    }

    #[test]
    fn unsafe_name_wins_over_later_duplicate() {
        let entries = vec![
            Entry::new("a.txt", "one"),
            Entry::new("../x", "two"),
            Entry::new("a.txt", "three"),
        ];
        assert_eq!(
            validate_entries(&entries).unwrap_err().kind(),
            ErrorKind::Validation
        );
    }

    #[test]
    fn safe_join_confines_to_base() {
        let base = Path::new("/srv/data");
        assert_eq!(
            safe_join(base, Path::new("reports/q1.csv")).unwrap(),
            PathBuf::from("/srv/data/reports/q1.csv")
        );
        assert_eq!(
            safe_join(base, Path::new("a/../b")).unwrap(),
            PathBuf::from("/srv/data/b")
        );
        assert_eq!(safe_join(base, Path::new(".")).unwrap(), PathBuf::from("/srv/data"));
    }

    #[test]
    fn safe_join_rejects_escape() {
        let base = Path::new("/srv/data");
        for rel in ["../secret", "a/../../secret", "/etc/passwd", "../data-other/x"] {
            let err = safe_join(base, Path::new(rel)).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::PathEscape, "{rel}");
        }
    }

    #[test]
    fn empty_base_is_unrestricted() {
        assert_eq!(
            safe_join(Path::new(""), Path::new("../anything")).unwrap(),
            PathBuf::from("../anything")
        );
    }

    #[test]
    fn relative_base_resolves_against_cwd() {
        let joined = safe_join(Path::new("base"), Path::new("f.txt")).unwrap();
        assert!(joined.is_absolute());
        assert!(joined.ends_with("base/f.txt"));
    }
}
