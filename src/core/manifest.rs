use crate::core::candidate::Candidate;
use crate::core::image::RASTER_EXTENSIONS;
use crate::core::review::render_review;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

pub const MANIFEST_FILE: &str = "manifest.json";
pub const APPROVED_FILE: &str = "approved-manifest.json";
pub const REVIEW_FILE: &str = "review.html";

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("Failed to write {path:?}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to list {path:?}: {source}")]
    List {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// One row of `manifest.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestEntry {
    pub id: String,
    pub filename: String,
    pub source_page: String,
    pub source_image_url: String,
    pub alt: String,
    pub width: u32,
    pub height: u32,
    pub bytes: usize,
    pub phash_cluster_id: String,
}

impl From<&Candidate> for ManifestEntry {
    fn from(candidate: &Candidate) -> Self {
        Self {
            id: candidate.id.clone(),
            filename: candidate.filename.clone(),
            source_page: candidate.source_page.clone(),
            source_image_url: candidate.source_image_url.clone(),
            alt: candidate.alt.clone(),
            width: candidate.width,
            height: candidate.height,
            bytes: candidate.byte_size,
            phash_cluster_id: candidate
                .cluster_id
                .map(|id| id.to_string())
                .unwrap_or_default(),
        }
    }
}

/// Manifest rows ordered by cluster, then by file size (largest first).
pub fn build_manifest(candidates: &[Candidate]) -> Vec<ManifestEntry> {
    let mut ordered: Vec<&Candidate> = candidates.iter().collect();
    ordered.sort_by_key(|c| (c.cluster_id, Reverse(c.byte_size)));
    ordered.into_iter().map(ManifestEntry::from).collect()
}

/// Paths of everything written by [`ManifestWriter::write`].
#[derive(Debug, Clone)]
pub struct ManifestOutput {
    pub entries: Vec<ManifestEntry>,
    pub manifest_path: PathBuf,
    pub approved_path: PathBuf,
    pub review_path: PathBuf,
    pub pruned: Vec<PathBuf>,
}

/// Persists the final candidate set into the output directory.
pub struct ManifestWriter {
    dir: PathBuf,
}

impl ManifestWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn write(&self, candidates: &[Candidate]) -> Result<ManifestOutput, ManifestError> {
        let keep: HashSet<&str> = candidates.iter().map(|c| c.filename.as_str()).collect();
        let pruned = self.prune_stale(&keep)?;

        let entries = build_manifest(candidates);
        let manifest_path = self.dir.join(MANIFEST_FILE);
        let mut json = serde_json::to_string_pretty(&entries)?;
        json.push('\n');
        write_file(&manifest_path, json.as_bytes())?;

        let approved_path = self.ensure_approved()?;

        let review_path = self.dir.join(REVIEW_FILE);
        write_file(&review_path, render_review(&entries)?.as_bytes())?;

        info!(
            "Wrote {} manifest entries to {}",
            entries.len(),
            manifest_path.display()
        );
        Ok(ManifestOutput {
            entries,
            manifest_path,
            approved_path,
            review_path,
            pruned,
        })
    }

    /// Create an empty approved manifest unless a curated one already exists.
    pub fn ensure_approved(&self) -> Result<PathBuf, ManifestError> {
        let path = self.dir.join(APPROVED_FILE);
        if !path.exists() {
            write_file(&path, b"[]\n")?;
        }
        Ok(path)
    }

    /// Delete stored images that are not in `keep`. Only files directly in
    /// the output directory with an image extension are considered.
    pub fn prune_stale(&self, keep: &HashSet<&str>) -> Result<Vec<PathBuf>, ManifestError> {
        let mut removed = Vec::new();

        for entry in WalkDir::new(&self.dir).min_depth(1).max_depth(1) {
            let entry = entry.map_err(|source| ManifestError::List {
                path: self.dir.clone(),
                source,
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if !is_image_file(path) || keep.contains(name) {
                continue;
            }

            match fs::remove_file(path) {
                Ok(()) => {
                    info!("Pruned stale image {}", name);
                    removed.push(path.to_path_buf());
                }
                Err(e) => warn!("Could not remove {}: {}", path.display(), e),
            }
        }

        removed.sort();
        Ok(removed)
    }
}

fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| RASTER_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
}

fn write_file(path: &Path, contents: &[u8]) -> Result<(), ManifestError> {
    fs::write(path, contents).map_err(|source| ManifestError::Write {
        path: path.to_path_buf(),
        source,
    })
}
