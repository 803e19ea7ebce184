//! Size probe
//!
//! Measures how many bytes a store occupies on disk by walking its root
//! directory. The probe knows nothing about the store's file layout, so it
//! stays correct whatever files the store keeps.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::error::{Result, ShrinkError};

/// Something that can report the on-disk size of a store root
pub trait SizeProbe {
    /// Total bytes occupied under `path`
    fn measure(&self, path: &Path) -> Result<u64>;
}

/// Sums the lengths of every non-directory entry below a root
///
/// Symlinks are not followed; each counts with its own length. Any entry
/// that cannot be listed or stat'ed aborts the whole measurement.
#[derive(Debug, Clone, Copy, Default)]
pub struct DirectorySize;

impl SizeProbe for DirectorySize {
    fn measure(&self, path: &Path) -> Result<u64> {
        directory_size(path)
    }
}

/// Total bytes of all non-directory entries under `path`
///
/// `path` itself may be a file, in which case its length is returned.
pub fn directory_size(path: &Path) -> Result<u64> {
    walk(path).map_err(|(failed_at, cause)| ShrinkError::SizeProbe {
        path: failed_at,
        cause,
    })
}

fn walk(root: &Path) -> std::result::Result<u64, (PathBuf, io::Error)> {
    let mut total = 0u64;
    let mut pending = vec![root.to_path_buf()];

    while let Some(path) = pending.pop() {
        let meta = fs::symlink_metadata(&path).map_err(|e| (path.clone(), e))?;

        if !meta.is_dir() {
            total += meta.len();
            continue;
        }

        let entries = fs::read_dir(&path).map_err(|e| (path.clone(), e))?;
        for entry in entries {
            let entry = entry.map_err(|e| (path.clone(), e))?;
            pending.push(entry.path());
        }
    }

    Ok(total)
}
