use std::path::Path;

use tracing::{debug, info, warn};
use walkdir::{DirEntry, WalkDir};

use crate::database::repo::{CatalogStore, NewEntry};
use crate::error::{CatalogError, CatalogResult};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ScanReport {
    pub inserted: usize,
    pub already_tracked: usize,
    pub skipped: usize,
}

/// Adds every untracked file or folder sitting directly in `root` to the
/// catalog. Existing rows are never touched and nothing is pruned.
pub fn scan_directory(root: &Path, store: &CatalogStore) -> CatalogResult<ScanReport> {
    let tracked = store.tracked_paths()?;
    let mut report = ScanReport::default();
    let mut discovered = Vec::new();

    let walker = WalkDir::new(root).min_depth(1).max_depth(1).into_iter();
    for entry in walker {
        let entry = entry.map_err(|e| walk_error(root, e))?;

        let Some(candidate) = candidate_for(&entry) else {
            report.skipped += 1;
            continue;
        };

        if tracked.contains(&candidate.path) {
            report.already_tracked += 1;
            continue;
        }

        debug!("Discovered {:?}", entry.path());
        discovered.push(candidate);
    }

    store.insert_entries(&discovered)?;
    report.inserted = discovered.len();

    if report.inserted > 0 {
        info!("Scan of {:?} added {} new entries", root, report.inserted);
    }
    Ok(report)
}

fn candidate_for(entry: &DirEntry) -> Option<NewEntry> {
    let Some(file_name) = entry.file_name().to_str() else {
        warn!("Skipping non UTF-8 name {:?}", entry.path());
        return None;
    };

    // file_type() is the link itself; follow it so linked folders count.
    let file_type = std::fs::metadata(entry.path()).ok()?.file_type();

    if file_name.trim().is_empty() {
        warn!("Skipping blank name {:?}", entry.path());
        return None;
    }

    if file_type.is_file() {
        Some(NewEntry {
            name: display_name(file_name),
            filename: file_name.to_string(),
            path: file_name.to_string(),
            description: String::new(),
        })
    } else if file_type.is_dir() {
        Some(NewEntry {
            name: file_name.to_string(),
            filename: String::new(),
            path: file_name.to_string(),
            description: String::new(),
        })
    } else {
        None
    }
}

/// File stem used as the display name; the whole file name when the stem is
/// blank (`" .exe"`).
pub fn display_name(file_name: &str) -> String {
    match Path::new(file_name).file_stem().and_then(|s| s.to_str()) {
        Some(stem) if !stem.trim().is_empty() => stem.to_string(),
        _ => file_name.to_string(),
    }
}

fn walk_error(root: &Path, err: walkdir::Error) -> CatalogError {
    let path = err.path().unwrap_or(root).to_path_buf();
    match err.into_io_error() {
        Some(io) => CatalogError::unavailable(path, io),
        None => CatalogError::unavailable(path, std::io::Error::other("filesystem loop")),
    }
}
