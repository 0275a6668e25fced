use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use chrono::NaiveDateTime;
use tracing::info;

use crate::database::repo::CatalogStore;
use crate::error::{CatalogError, CatalogResult};

/// Hands a file or folder to something that can run it.
pub trait Opener {
    fn open(&self, target: &Path) -> io::Result<()>;
}

/// The desktop's default handler: `start` on Windows, `open` on macOS and
/// `xdg-open` everywhere else. The child is not waited on.
pub struct SystemOpener;

impl Opener for SystemOpener {
    fn open(&self, target: &Path) -> io::Result<()> {
        let mut cmd = if cfg!(target_os = "windows") {
            let mut c = Command::new("cmd");
            // Empty title argument, otherwise a quoted path is taken as the title.
            c.arg("/C").arg("start").arg("");
            c
        } else if cfg!(target_os = "macos") {
            Command::new("open")
        } else {
            Command::new("xdg-open")
        };

        cmd.arg(target)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()?;
        Ok(())
    }
}

/// Opens entry `id` and, once it has started, bumps its launch statistics.
pub fn launch(
    store: &CatalogStore,
    software_dir: &Path,
    id: i64,
    now: NaiveDateTime,
    opener: &dyn Opener,
) -> CatalogResult<PathBuf> {
    let entry = store
        .get_entry(id)?
        .ok_or_else(|| CatalogError::not_found("entry", id))?;

    let full_path = software_dir.join(&entry.path);
    if let Err(e) = full_path.metadata() {
        return Err(CatalogError::unavailable(full_path, e));
    }

    opener
        .open(&full_path)
        .map_err(|e| CatalogError::unavailable(&full_path, e))?;
    store.record_launch(id, now)?;

    info!("Launched {:?}", full_path);
    Ok(full_path)
}
