//! Single-level directory listing used by the coordinator's traversal.
//!
//! The coordinator walks breadth-first: each call lists one directory,
//! returning its subdirectories (to be queued) and its regular files (to be
//! dispatched), both sorted by file name. Symbolic links are skipped so a
//! link cycle cannot make the walk unbounded.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

/// Errors that can occur during directory scanning.
#[derive(thiserror::Error, Debug)]
pub enum ScanError {
    /// Permission was denied when accessing a file or directory.
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// The specified path was not found.
    #[error("Path not found: {0}")]
    NotFound(PathBuf),

    /// The specified path is not a directory.
    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),

    /// An I/O error occurred while accessing a file.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },
}

impl ScanError {
    fn from_walkdir(dir: &Path, error: walkdir::Error) -> Self {
        let path = error.path().unwrap_or(dir).to_path_buf();
        match error.io_error().map(std::io::Error::kind) {
            Some(ErrorKind::PermissionDenied) => Self::PermissionDenied(path),
            Some(ErrorKind::NotFound) => Self::NotFound(path),
            _ => Self::Io {
                path,
                source: error
                    .into_io_error()
                    .unwrap_or_else(|| std::io::Error::other("filesystem loop")),
            },
        }
    }
}

/// Contents of one directory.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DirListing {
    /// Immediate subdirectories, sorted by name
    pub dirs: Vec<PathBuf>,
    /// Immediate regular files, sorted by name
    pub files: Vec<PathBuf>,
}

/// Resolve a user-supplied root to an absolute directory path.
///
/// The path is made absolute without resolving symlinks, so reported paths
/// keep the spelling the user gave.
pub fn resolve_root(root: &Path) -> Result<PathBuf, ScanError> {
    let absolute = std::path::absolute(root).map_err(|source| ScanError::Io {
        path: root.to_path_buf(),
        source,
    })?;
    match absolute.metadata() {
        Ok(meta) if meta.is_dir() => Ok(absolute),
        Ok(_) => Err(ScanError::NotADirectory(absolute)),
        Err(e) if e.kind() == ErrorKind::NotFound => Err(ScanError::NotFound(absolute)),
        Err(e) if e.kind() == ErrorKind::PermissionDenied => {
            Err(ScanError::PermissionDenied(absolute))
        }
        Err(source) => Err(ScanError::Io {
            path: absolute,
            source,
        }),
    }
}

/// List one directory. Entries that cannot be read are reported as errors
/// alongside whatever could be listed.
pub fn list_directory(dir: &Path) -> (DirListing, Vec<ScanError>) {
    let mut listing = DirListing::default();
    let mut errors = Vec::new();

    let walker = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .follow_links(false)
        .sort_by_file_name();

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                errors.push(ScanError::from_walkdir(dir, e));
                continue;
            }
        };

        let file_type = entry.file_type();
        if file_type.is_dir() {
            listing.dirs.push(entry.into_path());
        } else if file_type.is_file() {
            listing.files.push(entry.into_path());
        } else {
            log::debug!("Skipping non-regular entry {}", entry.path().display());
        }
    }

    (listing, errors)
}
