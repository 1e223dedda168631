//! Persisted camera orientations.
//!
//! An orientation is a flattened 3×4 camera transform: 12 comma-separated
//! floats, row-major, the exact string a molecular viewer's
//! `view matrix camera` command consumes. The store is a pretty-printed JSON
//! object of name → transform in the user's home directory; name collisions
//! are resolved with a numeric suffix.

use anyhow::{Context, Result};
use log::warn;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Default store file name, placed in the user's home directory.
pub const STORE_FILE_NAME: &str = ".smiffer_orientations.json";

/// Parse failures for the 12-value CSV transform format.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransformError {
    #[error("expected 12 comma-separated values, found {found}")]
    WrongCount { found: usize },
    #[error("invalid floating-point value {value:?}")]
    BadFloat { value: String },
}

/// A 3×4 camera transform, row-major.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraTransform(pub [[f64; 4]; 3]);

impl CameraTransform {
    /// Render the persisted wire format: 12 comma-separated floats,
    /// row-major.
    pub fn to_csv(&self) -> String {
        self.0
            .iter()
            .flat_map(|row| row.iter())
            .map(|v| v.to_string())
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Parse the persisted wire format.
    pub fn from_csv(s: &str) -> std::result::Result<Self, TransformError> {
        let parts: Vec<&str> = s.split(',').map(str::trim).collect();
        if parts.len() != 12 {
            return Err(TransformError::WrongCount { found: parts.len() });
        }
        let mut values = [0.0f64; 12];
        for (slot, part) in values.iter_mut().zip(&parts) {
            *slot = part.parse().map_err(|_| TransformError::BadFloat {
                value: (*part).to_string(),
            })?;
        }
        let mut rows = [[0.0f64; 4]; 3];
        for (i, row) in rows.iter_mut().enumerate() {
            row.copy_from_slice(&values[i * 4..i * 4 + 4]);
        }
        Ok(Self(rows))
    }
}

/// Named orientations backed by a JSON file.
pub struct OrientationStore {
    path: PathBuf,
    entries: BTreeMap<String, String>,
}

impl OrientationStore {
    /// Open the store at its default user-home location.
    pub fn open_default() -> Result<Self> {
        let home = dirs::home_dir().context("could not determine home directory")?;
        Self::open(home.join(STORE_FILE_NAME))
    }

    /// Open a store at an explicit path, loading existing entries. A missing
    /// file starts empty; an unreadable or corrupt file is logged and also
    /// starts empty rather than blocking the user.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let entries = if path.exists() {
            match std::fs::read_to_string(&path) {
                Ok(raw) => match serde_json::from_str::<BTreeMap<String, String>>(&raw) {
                    Ok(map) => map,
                    Err(e) => {
                        warn!(
                            "orientation store {} is corrupt, starting empty: {e}",
                            path.display()
                        );
                        BTreeMap::new()
                    }
                },
                Err(e) => {
                    warn!(
                        "could not read orientation store {}: {e}",
                        path.display()
                    );
                    BTreeMap::new()
                }
            }
        } else {
            BTreeMap::new()
        };
        Ok(Self { path, entries })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Stored CSV transform for `name`, if present.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries.get(name).map(String::as_str)
    }

    /// Save `transform` under `base`, deduplicating the name with a numeric
    /// suffix on collision (`base`, `base_1`, `base_2`, …). Persists and
    /// returns the name actually used.
    pub fn save(&mut self, base: &str, transform: &CameraTransform) -> Result<String> {
        let name = self.unique_name(base);
        self.entries.insert(name.clone(), transform.to_csv());
        self.persist()?;
        Ok(name)
    }

    /// Remove `name`. Returns whether it existed; the file is only rewritten
    /// when something was removed.
    pub fn delete(&mut self, name: &str) -> Result<bool> {
        if self.entries.remove(name).is_none() {
            return Ok(false);
        }
        self.persist()?;
        Ok(true)
    }

    fn unique_name(&self, base: &str) -> String {
        let mut name = base.to_string();
        let mut counter = 1usize;
        while self.entries.contains_key(&name) {
            name = format!("{base}_{counter}");
            counter += 1;
        }
        name
    }

    fn persist(&self) -> Result<()> {
        let json = serde_json::to_string_pretty(&self.entries)?;
        std::fs::write(&self.path, json)
            .with_context(|| format!("writing orientation store {}", self.path.display()))
    }
}
