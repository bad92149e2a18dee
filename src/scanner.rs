//! Recursive document discovery.
//!
//! Walks the configured root, filters by extension tag and exclude globs,
//! and fingerprints every accepted file. Unreadable folders are recorded in
//! the scan statistics and skipped; a scan only fails outright when the
//! root itself is missing.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{bail, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::config::ScannerConfig;
use crate::fingerprint;
use crate::models::FileRecord;

/// What a scan saw, beyond the files themselves.
#[derive(Debug, Default, Clone)]
pub struct ScanStats {
    pub folders_scanned: u64,
    pub files_found: u64,
    pub files_by_type: BTreeMap<String, u64>,
    pub error_folders: Vec<String>,
}

#[derive(Debug)]
pub struct ScanOutcome {
    pub files: Vec<FileRecord>,
    pub stats: ScanStats,
}

pub fn scan_documents(config: &ScannerConfig) -> Result<ScanOutcome> {
    let root = &config.root;
    if !root.exists() {
        bail!("document root does not exist: {}", root.display());
    }

    let extensions: Vec<String> = config
        .file_types
        .iter()
        .map(|ext| ext.trim_start_matches('.').to_lowercase())
        .collect();

    let mut default_excludes = vec![
        "**/.git/**".to_string(),
        "**/node_modules/**".to_string(),
        "**/~$*".to_string(),
    ];
    default_excludes.extend(config.exclude_globs.clone());
    let exclude_set = build_globset(&default_excludes)?;

    let mut stats = ScanStats::default();
    for ext in &extensions {
        stats.files_by_type.insert(ext.clone(), 0);
    }

    let mut files = Vec::new();

    let mut walker = WalkDir::new(root).follow_links(config.follow_symlinks);
    if let Some(depth) = config.max_depth {
        walker = walker.max_depth(depth);
    }

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                let location = err
                    .path()
                    .map(|p| p.display().to_string())
                    .unwrap_or_default();
                warn!(path = %location, error = %err, "cannot access path during scan");
                stats.error_folders.push(location);
                continue;
            }
        };

        if entry.file_type().is_dir() {
            stats.folders_scanned += 1;
            if stats.folders_scanned % 10 == 0 {
                info!(
                    folders = stats.folders_scanned,
                    files = stats.files_found,
                    "scanning"
                );
            }
            continue;
        }
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let relative = path.strip_prefix(root).unwrap_or(path);
        let rel_str = relative.to_string_lossy().to_string();

        if exclude_set.is_match(&rel_str) {
            continue;
        }

        let ext = path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        if !extensions.iter().any(|accepted| accepted == &ext) {
            continue;
        }

        match file_to_record(path, &rel_str, &ext) {
            Ok(record) => {
                stats.files_found += 1;
                *stats.files_by_type.entry(ext).or_insert(0) += 1;
                files.push(record);
            }
            Err(err) => {
                warn!(path = %path.display(), error = %err, "skipping unreadable file");
            }
        }
    }

    // Sort for deterministic ordering
    files.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));

    info!(
        folders = stats.folders_scanned,
        files = stats.files_found,
        errors = stats.error_folders.len(),
        "scan complete"
    );

    Ok(ScanOutcome { files, stats })
}

fn file_to_record(path: &Path, relative_path: &str, ext: &str) -> Result<FileRecord> {
    let metadata = std::fs::metadata(path)?;
    let modified_at = fingerprint::mtime_secs(&metadata);
    let absolute = path
        .canonicalize()
        .unwrap_or_else(|_| path.to_path_buf())
        .to_string_lossy()
        .to_string();
    let (digest, degraded) = fingerprint::fingerprint_file(path);

    Ok(FileRecord {
        name: path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default(),
        path: absolute,
        relative_path: relative_path.to_string(),
        size: metadata.len(),
        file_type: ext.to_string(),
        modified_at,
        fingerprint: digest,
        degraded_fingerprint: degraded,
    })
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}
