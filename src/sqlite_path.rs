//! SQLite file-path policy
//!
//! Connection paths are attacker-reachable input when configuration comes
//! from the outside, so everything that is not an in-memory database or a
//! temp-directory scratch file goes through traversal, extension, and
//! restricted-directory checks before a pool is opened.
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// File extensions accepted for on-disk SQLite databases and dumps
static ALLOWED_EXTENSIONS: &[&str] = &[
    "db", "db2", "db3", "sdb", "sqlite", "sqlite2", "sqlite3", "s3db", "sql", "dump", "backup",
    "gz", "zip", "bz2",
];

/// System directories never accepted as database locations
#[cfg(unix)]
static SYSTEM_DIRECTORIES: &[&str] = &[
    "/etc", "/bin", "/sbin", "/boot", "/dev", "/proc", "/sys", "/usr/bin", "/usr/sbin",
    "/var/log", "/System", "/Library",
];

#[cfg(windows)]
static SYSTEM_DIRECTORIES: &[&str] = &[
    "C:\\Windows",
    "C:\\Program Files",
    "C:\\Program Files (x86)",
];

/// Path policy violations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PathPolicyError {
    #[error("Path contains a null byte")]
    NullByte,

    #[error("Path contains parent traversal: {path}")]
    ParentTraversal { path: String },

    #[error("Path has no file extension: {path}")]
    MissingExtension { path: String },

    #[error("Extension '{extension}' is not an accepted SQLite extension")]
    DisallowedExtension { extension: String },

    #[error("Path '{path}' lies under restricted directory '{directory}'")]
    RestrictedDirectory { path: String, directory: String },

    #[error("Invalid path: {0}")]
    Invalid(String),
}

/// Check whether a path names an in-memory database
pub fn is_memory_path(path: &str) -> bool {
    path == ":memory:" || path.starts_with("file::memory:")
}

/// Validate a SQLite database path against the file policy and return the
/// resolved absolute path (the input itself for memory databases)
pub fn validate_sqlite_path(path: &str) -> Result<PathBuf, PathPolicyError> {
    if is_memory_path(path) {
        return Ok(PathBuf::from(path));
    }

    if path.contains('\0') {
        return Err(PathPolicyError::NullByte);
    }

    // Temp-directory scratch files skip the restricted-directory scan but
    // still need an accepted extension
    let temp_dir = std::env::temp_dir();
    if Path::new(path).starts_with(&temp_dir) {
        check_extension(path)?;
        debug!("[validate_sqlite_path] Accepting temp-directory path");
        return Ok(PathBuf::from(path));
    }

    if path.split(['/', '\\']).any(|segment| segment == "..") {
        return Err(PathPolicyError::ParentTraversal {
            path: path.to_string(),
        });
    }

    check_extension(path)?;

    let resolved = std::path::absolute(path)
        .map_err(|e| PathPolicyError::Invalid(format!("{path}: {e}")))?;

    for directory in restricted_directories() {
        if resolved.starts_with(&directory) {
            return Err(PathPolicyError::RestrictedDirectory {
                path: path.to_string(),
                directory: directory.to_string_lossy().to_string(),
            });
        }
    }

    Ok(resolved)
}

fn check_extension(path: &str) -> Result<(), PathPolicyError> {
    let extension = Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .ok_or_else(|| PathPolicyError::MissingExtension {
            path: path.to_string(),
        })?;
    let lowered = extension.to_lowercase();
    if !ALLOWED_EXTENSIONS.contains(&lowered.as_str()) {
        return Err(PathPolicyError::DisallowedExtension {
            extension: extension.to_string(),
        });
    }
    Ok(())
}

/// OS system directories plus application-internal directories
fn restricted_directories() -> Vec<PathBuf> {
    let mut directories: Vec<PathBuf> =
        SYSTEM_DIRECTORIES.iter().map(PathBuf::from).collect();
    if let Some(config) = dirs::config_dir() {
        directories.push(config);
    }
    if let Some(data) = dirs::data_local_dir() {
        directories.push(data);
    }
    directories
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_paths_accepted_verbatim() {
        assert_eq!(
            validate_sqlite_path(":memory:").unwrap(),
            PathBuf::from(":memory:")
        );
        assert!(validate_sqlite_path("file::memory:?cache=shared").is_ok());
    }

    #[test]
    fn test_null_byte_rejected() {
        assert_eq!(
            validate_sqlite_path("app\0.db").unwrap_err(),
            PathPolicyError::NullByte
        );
    }

    #[test]
    fn test_parent_traversal_rejected() {
        assert!(matches!(
            validate_sqlite_path("data/../../etc/app.db").unwrap_err(),
            PathPolicyError::ParentTraversal { .. }
        ));
    }

    #[test]
    fn test_extension_allowlist() {
        assert!(matches!(
            validate_sqlite_path("data/app.exe").unwrap_err(),
            PathPolicyError::DisallowedExtension { .. }
        ));
        assert!(matches!(
            validate_sqlite_path("data/app").unwrap_err(),
            PathPolicyError::MissingExtension { .. }
        ));
        assert!(validate_sqlite_path("data/app.sqlite3").is_ok());
        assert!(validate_sqlite_path("data/app.DB").is_ok());
    }

    #[cfg(unix)]
    #[test]
    fn test_system_directory_rejected() {
        assert!(matches!(
            validate_sqlite_path("/etc/app.db").unwrap_err(),
            PathPolicyError::RestrictedDirectory { .. }
        ));
        assert!(matches!(
            validate_sqlite_path("/usr/bin/app.sqlite").unwrap_err(),
            PathPolicyError::RestrictedDirectory { .. }
        ));
    }

    #[test]
    fn test_temp_directory_fast_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scratch.db");
        let path_str = path.to_str().unwrap();
        assert!(validate_sqlite_path(path_str).is_ok());
        // Still extension-checked
        let bad = dir.path().join("scratch.txt");
        assert!(matches!(
            validate_sqlite_path(bad.to_str().unwrap()).unwrap_err(),
            PathPolicyError::DisallowedExtension { .. }
        ));
    }

    #[test]
    fn test_relative_path_resolves() {
        let resolved = validate_sqlite_path("data/app.db").unwrap();
        assert!(resolved.is_absolute());
    }
}
