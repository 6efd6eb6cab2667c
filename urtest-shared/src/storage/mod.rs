//! Storage for uploaded attachment bytes
//!
//! Attachments are stored in a flat namespace. Keys are derived from the
//! parent ids and the sanitized filename:
//!
//! ```text
//! project file:  {project_id}_{filename}
//! bug file:      {project_id}_{bug_id}_{filename}
//! ```
//!
//! The [`FileStore`] trait is the seam between handlers and the backend.
//! [`DiskStore`] keeps files in a local directory. A finished temporary file
//! is linked into place, so a reader never sees a half-written file and a
//! key that is already taken is never overwritten. Project and bug keys
//! share one namespace (a project file named `{bug_id}_log.txt` has the same
//! key as that bug's `log.txt`), so refusing to replace is what keeps one
//! parent's bytes out of another's.
//!
//! # Example
//!
//! ```no_run
//! use urtest_shared::storage::{DiskStore, FileStore, StorageKey};
//! use bytes::Bytes;
//! use uuid::Uuid;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = DiskStore::open("upload").await?;
//! let key = StorageKey::project_file(Uuid::new_v4(), "readme.txt");
//!
//! store.put(&key, Bytes::from_static(b"hello")).await?;
//! assert_eq!(store.get(&key).await?, Bytes::from_static(b"hello"));
//! store.delete(&key).await?;
//! # Ok(())
//! # }
//! ```

mod disk;

pub use disk::DiskStore;

use async_trait::async_trait;
use bytes::Bytes;
use sha2::{Digest, Sha256};
use std::fmt;
use uuid::Uuid;

/// Longest accepted filename, in bytes
///
/// Keeps `{project_id}_{bug_id}_{filename}` under the usual 255-byte
/// file name limit of local filesystems.
pub const MAX_FILENAME_BYTES: usize = 150;

/// Error type for storage operations
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Nothing stored under the key
    #[error("File not found: {0}")]
    NotFound(String),

    /// Something is already stored under the key
    #[error("File already exists: {0}")]
    AlreadyExists(String),

    /// Submitted filename cannot be used as part of a key
    #[error("Invalid filename: {0}")]
    InvalidName(String),

    /// Underlying I/O failure
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Location of an attachment inside the store
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StorageKey(String);

impl StorageKey {
    /// `{project_id}_{filename}`
    pub fn project_file(project_id: Uuid, filename: &str) -> Self {
        Self(format!("{}_{}", project_id, filename))
    }

    /// `{project_id}_{bug_id}_{filename}`
    pub fn bug_file(project_id: Uuid, bug_id: Uuid, filename: &str) -> Self {
        Self(format!("{}_{}_{}", project_id, bug_id, filename))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Backend holding attachment bytes
#[async_trait]
pub trait FileStore: Send + Sync {
    /// Stores `data` under a key that is not taken yet
    ///
    /// Returns the number of bytes written. Fails with
    /// [`StorageError::AlreadyExists`] and leaves the stored content alone
    /// when the key is in use.
    async fn put(&self, key: &StorageKey, data: Bytes) -> Result<u64, StorageError>;

    /// Reads the full content stored under `key`
    async fn get(&self, key: &StorageKey) -> Result<Bytes, StorageError>;

    /// Removes `key`
    ///
    /// Returns false if nothing was stored under it; a missing file is not
    /// an error.
    async fn delete(&self, key: &StorageKey) -> Result<bool, StorageError>;

    async fn exists(&self, key: &StorageKey) -> Result<bool, StorageError>;
}

/// Reduces a client-supplied filename to a safe final path component
///
/// Browsers may send a full client path (`C:\Users\me\report.pdf`); only the
/// last component is kept. Empty names, `.`/`..`, names with control
/// characters and names longer than [`MAX_FILENAME_BYTES`] are rejected.
///
/// # Example
///
/// ```
/// use urtest_shared::storage::sanitize_filename;
///
/// assert_eq!(sanitize_filename("../../etc/passwd").unwrap(), "passwd");
/// assert_eq!(sanitize_filename("C:\\docs\\spec.pdf").unwrap(), "spec.pdf");
/// assert!(sanitize_filename("..").is_err());
/// ```
pub fn sanitize_filename(raw: &str) -> Result<String, StorageError> {
    let name = raw
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim();

    if name.is_empty() || name == "." || name == ".." {
        return Err(StorageError::InvalidName(format!("'{}' is not a file name", raw)));
    }

    if name.chars().any(|c| c.is_control()) {
        return Err(StorageError::InvalidName(
            "file name contains control characters".to_string(),
        ));
    }

    if name.len() > MAX_FILENAME_BYTES {
        return Err(StorageError::InvalidName(format!(
            "file name is longer than {} bytes",
            MAX_FILENAME_BYTES
        )));
    }

    Ok(name.to_string())
}

/// Hex-encoded SHA-256 of the content, stored alongside attachment records
pub fn content_digest(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_keeps_plain_names() {
        assert_eq!(sanitize_filename("report.pdf").unwrap(), "report.pdf");
        assert_eq!(sanitize_filename("  notes v2.txt ").unwrap(), "notes v2.txt");
    }

    #[test]
    fn test_sanitize_strips_directories() {
        assert_eq!(sanitize_filename("/tmp/a/b.txt").unwrap(), "b.txt");
        assert_eq!(sanitize_filename("..\\..\\boot.ini").unwrap(), "boot.ini");
    }

    #[test]
    fn test_sanitize_rejects_traversal_and_empty() {
        assert!(sanitize_filename("").is_err());
        assert!(sanitize_filename("..").is_err());
        assert!(sanitize_filename("dir/").is_err());
        assert!(sanitize_filename("a/.").is_err());
    }

    #[test]
    fn test_sanitize_rejects_control_and_long_names() {
        assert!(sanitize_filename("bad\nname").is_err());
        assert!(sanitize_filename(&"x".repeat(MAX_FILENAME_BYTES + 1)).is_err());
        assert!(sanitize_filename(&"x".repeat(MAX_FILENAME_BYTES)).is_ok());
    }

    #[test]
    fn test_content_digest() {
        assert_eq!(
            content_digest(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_key_layout() {
        let project_id = Uuid::new_v4();
        let bug_id = Uuid::new_v4();
        assert_eq!(
            StorageKey::project_file(project_id, "a.txt").to_string(),
            format!("{}_a.txt", project_id)
        );
        assert_eq!(
            StorageKey::bug_file(project_id, bug_id, "a.txt").to_string(),
            format!("{}_{}_a.txt", project_id, bug_id)
        );
    }
}
