//! Result-file discovery.
//!
//! Smiffer drops volumetric grid files into the output directory without
//! announcing them, so results are found by diffing the directory against a
//! snapshot taken before the job started. Only known grid extensions count;
//! files are returned grouped by extension (in the fixed order below) and
//! newest-first within a group.

use log::warn;
use std::collections::HashSet;
use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Grid extensions treated as job results, in discovery order.
pub const RESULT_EXTENSIONS: &[&str] = &["cmap", "h5", "dx", "ccp4", "mrc"];

/// Names of the files present in a directory at a point in time.
#[derive(Debug, Clone, Default)]
pub struct DirSnapshot {
    names: HashSet<OsString>,
}

impl DirSnapshot {
    /// Record the current contents of `dir`.
    pub fn capture(dir: &Path) -> io::Result<Self> {
        let mut names = HashSet::new();
        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            names.insert(entry.file_name());
        }
        Ok(Self { names })
    }

    pub fn contains(&self, name: &OsString) -> bool {
        self.names.contains(name)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// Find result files in `dir` that postdate `before`.
///
/// Idempotent on an unchanged directory: with no new files the result is
/// empty. Metadata failures on individual files are logged and the file is
/// ordered as oldest rather than dropped.
pub fn discover_results(dir: &Path, before: &DirSnapshot) -> io::Result<Vec<PathBuf>> {
    // One directory scan, bucketed by extension.
    let mut new_names: Vec<OsString> = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name();
        if !before.contains(&name) {
            new_names.push(name);
        }
    }

    let mut results = Vec::new();
    for ext in RESULT_EXTENSIONS {
        let mut group: Vec<(PathBuf, SystemTime)> = Vec::new();
        for name in &new_names {
            let path = dir.join(name);
            if path.extension().and_then(|e| e.to_str()) != Some(*ext) {
                continue;
            }
            let mtime = match std::fs::metadata(&path).and_then(|m| m.modified()) {
                Ok(t) => t,
                Err(e) => {
                    warn!("could not stat {}: {e}", path.display());
                    SystemTime::UNIX_EPOCH
                }
            };
            group.push((path, mtime));
        }
        // Newest first within the extension group.
        group.sort_by(|a, b| b.1.cmp(&a.1));
        results.extend(group.into_iter().map(|(p, _)| p));
    }
    Ok(results)
}
