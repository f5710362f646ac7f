//! Run and ignore set resolution
//!
//! A run target is either a directory (every regular file beneath it) or a
//! list file whose non-empty lines name files or further directories.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::common::{Error, Result};

/// Filesystem access needed by the resolver
pub trait FileLister {
    /// Whether `path` names a regular file
    fn is_file(&self, path: &Path) -> bool;

    /// Contents of a list file
    fn read_list(&self, path: &Path) -> Result<String>;

    /// Every regular file beneath `dir`, sorted
    fn list_files(&self, dir: &Path) -> Result<Vec<PathBuf>>;
}

/// [`FileLister`] over the real filesystem
#[derive(Debug, Clone, Copy, Default)]
pub struct WalkDirLister;

impl FileLister for WalkDirLister {
    fn is_file(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn read_list(&self, path: &Path) -> Result<String> {
        std::fs::read_to_string(path).map_err(|e| Error::file_read(path, &e))
    }

    fn list_files(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        if !dir.exists() {
            tracing::warn!("{} does not exist; no files taken from it", dir.display());
            return Ok(Vec::new());
        }

        let mut files = Vec::new();
        for entry in WalkDir::new(dir) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!("Error walking {}: {}", dir.display(), e);
                    continue;
                }
            };
            if entry.file_type().is_file() {
                files.push(entry.into_path());
            }
        }
        files.sort();
        Ok(files)
    }
}

/// Expand a run or ignore target into the files it names
///
/// `None` resolves to the empty set. The result is ordered by path and
/// free of duplicates.
pub fn resolve(path: Option<&Path>, lister: &dyn FileLister) -> Result<BTreeSet<PathBuf>> {
    let mut files = BTreeSet::new();
    let Some(path) = path else {
        return Ok(files);
    };

    if lister.is_file(path) {
        let list = lister.read_list(path)?;
        for line in list.lines() {
            let entry = line.trim();
            if entry.is_empty() {
                continue;
            }
            let entry = PathBuf::from(entry);
            if lister.is_file(&entry) {
                files.insert(entry);
            } else {
                files.extend(resolve(Some(entry.as_path()), lister)?);
            }
        }
    } else {
        files.extend(lister.list_files(path)?);
    }

    Ok(files)
}
