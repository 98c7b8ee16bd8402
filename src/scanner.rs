//! Directory scanning and project detection functionality.
//!
//! This module enumerates the immediate subdirectories of the projects
//! directory, decides which of them are projects, and reads the port and
//! cache database configuration out of their files. Detection of several
//! candidates runs in parallel; results keep a stable, name-sorted order so
//! that repeated scans of an unchanged tree give identical results.

use std::{
    collections::HashSet,
    fs,
    path::{Path, PathBuf},
};

use rayon::prelude::*;
use serde_json::Value;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::{
    extract,
    layout::{self, ConfigLocations, Layout},
};

/// Port and cache database read from a project's files.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DetectedConfig {
    pub port: Option<u16>,
    pub cache_db_index: Option<u32>,
}

/// A directory recognized as a project.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Detection {
    /// Leaf directory name
    pub name: String,

    /// Absolute path of the project directory
    pub directory: PathBuf,

    /// First matching directory convention
    pub layout: Layout,

    pub config: DetectedConfig,
}

/// Scanner for project directories under a single root.
pub struct Scanner {
    root: PathBuf,
}

impl Scanner {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Immediate subdirectories of the root, sorted by name.
    ///
    /// A missing or unreadable root yields no candidates.
    #[must_use]
    pub fn candidate_dirs(&self) -> Vec<PathBuf> {
        WalkDir::new(&self.root)
            .min_depth(1)
            .max_depth(1)
            .follow_links(true)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(e) => {
                    debug!("Skipping unreadable entry: {e}");
                    None
                }
            })
            .filter(|entry| entry.file_type().is_dir())
            .map(walkdir::DirEntry::into_path)
            .collect()
    }

    /// Detect every project under the root whose name is not in `known`.
    ///
    /// # Arguments
    ///
    /// * `known` - Names already accounted for; their directories are skipped
    ///
    /// # Returns
    ///
    /// Detections sorted by directory name.
    #[must_use]
    pub fn scan(&self, known: &HashSet<String>) -> Vec<Detection> {
        debug!("Scanning directory: {}", self.root.display());

        let candidates: Vec<PathBuf> = self
            .candidate_dirs()
            .into_iter()
            .filter(|dir| {
                layout::leaf_name(dir).is_some_and(|name| !known.contains(&name))
            })
            .collect();

        candidates
            .into_par_iter()
            .filter_map(|dir| Self::detect(&dir))
            .collect()
    }

    /// Decide whether `dir` is a project and read its configuration.
    #[must_use]
    pub fn detect(dir: &Path) -> Option<Detection> {
        let name = layout::leaf_name(dir)?;
        let Some(layout) = layout::detect_named(dir, &name) else {
            debug!("Skipping {name} - no recognized project structure");
            return None;
        };

        let config = read_config(dir, &name);
        debug!(
            "Detected project {name} ({layout:?}) with port {:?} and cache database {:?}",
            config.port, config.cache_db_index
        );

        Some(Detection {
            name,
            directory: dir.to_path_buf(),
            layout,
            config,
        })
    }
}

/// Read the port and cache database index from a project's files.
#[must_use]
pub fn read_config(dir: &Path, name: &str) -> DetectedConfig {
    let locations = ConfigLocations::new(dir, name);

    DetectedConfig {
        port: read_manifest(&locations)
            .as_ref()
            .and_then(extract::port_from_manifest),
        cache_db_index: read_cache_db(&locations),
    }
}

/// First readable, well-formed manifest among the candidates.
///
/// Frontend candidates come first, then backend ones. Invalid JSON is
/// logged and the next candidate is tried.
fn read_manifest(locations: &ConfigLocations) -> Option<Value> {
    for path in locations.manifests() {
        if !path.is_file() {
            continue;
        }

        let Some(content) = read_file_content(path) else {
            continue;
        };

        match serde_json::from_str::<Value>(&content) {
            Ok(manifest) => {
                debug!("Found package.json at {}", path.display());
                return Some(manifest);
            }
            Err(e) => warn!("Invalid JSON in {}: {e}", path.display()),
        }
    }

    debug!("No package.json found");
    None
}

/// Cache database index from the first `.env` candidate that has one.
fn read_cache_db(locations: &ConfigLocations) -> Option<u32> {
    locations
        .env_files
        .iter()
        .filter(|path| path.is_file())
        .filter_map(|path| read_file_content(path))
        .find_map(|content| extract::cache_db_from_env(&content))
}

/// Read the content of a file, logging failures.
fn read_file_content(path: &Path) -> Option<String> {
    match fs::read_to_string(path) {
        Ok(content) => Some(content),
        Err(e) => {
            warn!("Error reading {}: {e}", path.display());
            None
        }
    }
}
