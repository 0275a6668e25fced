use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::database::repo::{CatalogStore, NewEntry, SoftwareEntry};
use crate::error::{CatalogError, CatalogResult};
use crate::ingest::scanner::display_name;

/// Brings an arbitrary file under management and tracks it.
///
/// Files outside `software_dir` are copied in first; a clashing name gets a
/// `_1`, `_2`, ... suffix before its extension.
pub fn import_file(
    store: &CatalogStore,
    software_dir: &Path,
    source: &Path,
) -> CatalogResult<SoftwareEntry> {
    let source = fs::canonicalize(source).map_err(|e| CatalogError::unavailable(source, e))?;
    if !source.is_file() {
        return Err(CatalogError::unavailable(
            &source,
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "not a regular file"),
        ));
    }

    let managed =
        fs::canonicalize(software_dir).map_err(|e| CatalogError::unavailable(software_dir, e))?;

    let dest = if source.starts_with(&managed) {
        source.clone()
    } else {
        let file_name = source
            .file_name()
            .ok_or(CatalogError::EmptyInput("file name"))?;
        let dest = free_destination(&managed.join(file_name));
        fs::copy(&source, &dest).map_err(|e| CatalogError::unavailable(&dest, e))?;
        info!("Copied {:?} to {:?}", source, dest);
        dest
    };

    let rel_path = dest
        .strip_prefix(&managed)
        .unwrap_or(&dest)
        .to_string_lossy()
        .to_string();
    let filename = dest
        .file_name()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    let name = display_name(&filename);

    let id = store.insert_entry(&NewEntry {
        name,
        filename,
        path: rel_path,
        description: String::new(),
    })?;

    store
        .get_entry(id)?
        .ok_or_else(|| CatalogError::not_found("entry", id))
}

/// First of `path`, `stem_1.ext`, `stem_2.ext`, ... that does not exist yet.
fn free_destination(path: &Path) -> PathBuf {
    if !path.exists() {
        return path.to_path_buf();
    }

    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    let ext = path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();

    let mut counter = 1;
    loop {
        let candidate = path.with_file_name(format!("{}_{}{}", stem, counter, ext));
        if !candidate.exists() {
            return candidate;
        }
        counter += 1;
    }
}
