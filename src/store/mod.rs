//! Content-addressed index of scanned paths, files and digests.
//!
//! # Architecture
//!
//! * [`schema`]: SQL for the relations and their uniqueness constraints.
//! * [`content_store`]: [`ContentStore`], the thread-safe handle over an
//!   in-memory SQLite database.
//!
//! # Relations
//!
//! ```text
//! paths(id, path)            unique by path
//! files(id, name, path_id)   unique by (name, path_id), carries the namespace flag
//! file_hashes(id, hash)      unique by hash
//! file_map(file_id, hash_id) one association per file
//! path_hashes / path_map     directory-level analogues
//! ```
//!
//! The index lives only as long as the process. [`ContentStore::reset`]
//! drops and recreates every relation in one transaction.

pub mod content_store;
pub mod schema;

use std::path::PathBuf;

use serde::Serialize;

pub use content_store::ContentStore;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors reported by the content store.
#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    /// The store is closed or its connection lock was poisoned.
    #[error("Content store unavailable")]
    Unavailable,

    /// The path cannot be split into a containing directory and a file name.
    #[error("Invalid file path: {0}")]
    InvalidPath(PathBuf),

    /// A statement failed. Carries the SQL and bound parameters for diagnosis.
    #[error("Query failed: {query} with ({params}): {source}")]
    Query {
        /// The SQL text that failed
        query: String,
        /// Rendered parameter values
        params: String,
        /// The underlying SQLite error
        #[source]
        source: rusqlite::Error,
    },
}

/// Files (or directories) sharing one content hash.
///
/// A group returned by the store always holds at least two members.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DuplicateGroup {
    /// Hex-encoded content digest shared by every member
    pub hash: String,
    /// Members, sorted by path
    pub paths: Vec<PathBuf>,
}

impl DuplicateGroup {
    /// Number of members in the group.
    #[must_use]
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    /// True if the group has no members.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

/// A file hashed under a source root that has no same-content file under
/// a destination root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyCandidate {
    /// Existing file under the source root
    pub source: PathBuf,
    /// Where the file belongs under the destination root
    pub destination: PathBuf,
    /// Content hash of the source file
    pub hash: String,
}

/// Row counts, for progress display and tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    pub paths: u64,
    pub files: u64,
    pub hashes: u64,
    pub associations: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_error_display() {
        assert_eq!(
            StoreError::Unavailable.to_string(),
            "Content store unavailable"
        );
        assert_eq!(
            StoreError::InvalidPath(PathBuf::from("/")).to_string(),
            "Invalid file path: /"
        );
    }

    #[test]
    fn test_duplicate_group_len() {
        let group = DuplicateGroup {
            hash: "ab".to_string(),
            paths: vec![PathBuf::from("/a"), PathBuf::from("/b")],
        };
        assert_eq!(group.len(), 2);
        assert!(!group.is_empty());
    }
}
