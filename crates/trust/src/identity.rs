//! Path identity
//!
//! Whether two paths name the same location, and whether one lies inside the
//! other, depends on the file system: `/Src` and `/src` are one folder on a
//! case-insensitive disk and two folders on a case-sensitive one. Everything
//! in the trust store compares paths through this trait.

use std::path::{Path, PathBuf};

/// Canonical comparison of file system paths
pub trait PathIdentity: Send + Sync {
    /// Same location
    fn is_equal(&self, a: &Path, b: &Path) -> bool;

    /// `candidate` is `path` itself or one of its ancestors
    fn is_equal_or_parent(&self, path: &Path, candidate: &Path) -> bool;

    /// Strip trailing separators, keeping a bare root intact
    fn remove_trailing_separator(&self, path: &Path) -> PathBuf;
}

/// Component-wise path identity with optional case folding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtPath {
    ignore_case: bool,
}

impl Default for ExtPath {
    fn default() -> Self {
        Self::for_platform()
    }
}

impl ExtPath {
    pub fn case_sensitive() -> Self {
        Self { ignore_case: false }
    }

    pub fn case_insensitive() -> Self {
        Self { ignore_case: true }
    }

    /// Case folding follows the host's default file system
    pub fn for_platform() -> Self {
        Self {
            ignore_case: cfg!(any(windows, target_os = "macos")),
        }
    }

    fn key(&self, path: &Path) -> PathBuf {
        let trimmed = self.remove_trailing_separator(path);
        if self.ignore_case {
            PathBuf::from(trimmed.to_string_lossy().to_lowercase())
        } else {
            trimmed
        }
    }
}

impl PathIdentity for ExtPath {
    fn is_equal(&self, a: &Path, b: &Path) -> bool {
        self.key(a) == self.key(b)
    }

    fn is_equal_or_parent(&self, path: &Path, candidate: &Path) -> bool {
        // Path::starts_with matches whole components, so /ab is not under /a
        self.key(path).starts_with(self.key(candidate))
    }

    fn remove_trailing_separator(&self, path: &Path) -> PathBuf {
        let raw = path.to_string_lossy();
        PathBuf::from(trim_separators(&raw, &['/', std::path::MAIN_SEPARATOR]))
    }
}

/// Drop trailing separators. A bare root and a drive root (`C:\`) keep
/// theirs, `C:` alone would be relative to the drive's current directory.
fn trim_separators<'a>(raw: &'a str, separators: &[char]) -> &'a str {
    let trimmed = raw.trim_end_matches(|c| separators.contains(&c));

    if trimmed.is_empty() {
        return raw;
    }
    if is_drive_prefix(trimmed) && trimmed.len() < raw.len() {
        return &raw[..trimmed.len() + 1];
    }
    trimmed
}

fn is_drive_prefix(text: &str) -> bool {
    matches!(text.as_bytes(), [letter, b':'] if letter.is_ascii_alphabetic())
}
