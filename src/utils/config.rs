use std::fs::{self, File};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use tracing::{debug, info};

pub const SETTINGS_FILE: &str = "softshelf.env";
pub const ROOT_ENV_VAR: &str = "SOFTSHELF_ROOT";
pub const DEFAULT_SOFTWARE_DIR: &str = "Software";
pub const DEFAULT_DB_FILE: &str = "software.db";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub root: PathBuf,
    pub software_dir: PathBuf,
    pub db_path: PathBuf,
}

/// Explicit values from the command line; they win over everything else.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub root: Option<PathBuf>,
    pub software_dir: Option<PathBuf>,
    pub db_path: Option<PathBuf>,
}

impl Settings {
    /// Resolution order: command line, then `softshelf.env` in the root,
    /// then the defaults next to the executable.
    pub fn resolve(overrides: &Overrides) -> Result<Self> {
        let root = match &overrides.root {
            Some(root) => root.clone(),
            None => default_root()?,
        };

        let mut settings = Self::defaults_for(&root);

        let env_path = root.join(SETTINGS_FILE);
        if env_path.exists() {
            load_from_env(&env_path, &mut settings)?;
            info!("Loaded settings from {:?}", env_path);
        }

        if let Some(dir) = &overrides.software_dir {
            settings.software_dir = dir.clone();
        }
        if let Some(db) = &overrides.db_path {
            settings.db_path = db.clone();
        }

        debug!("Resolved settings: {:?}", settings);
        Ok(settings)
    }

    pub fn defaults_for(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            software_dir: root.join(DEFAULT_SOFTWARE_DIR),
            db_path: root.join(DEFAULT_DB_FILE),
        }
    }

    /// Creates the managed directory if it is not there yet.
    pub fn ensure_layout(&self) -> Result<()> {
        if !self.software_dir.exists() {
            fs::create_dir_all(&self.software_dir).with_context(|| {
                format!("Failed to create software directory {:?}", self.software_dir)
            })?;
            info!("Created software directory {:?}", self.software_dir);
        }
        Ok(())
    }

    pub fn save(&self) -> Result<PathBuf> {
        let path = self.root.join(SETTINGS_FILE);
        save_to_env(&path, self)?;
        Ok(path)
    }
}

fn default_root() -> Result<PathBuf> {
    if let Some(root) = std::env::var_os(ROOT_ENV_VAR) {
        return Ok(PathBuf::from(root));
    }

    let exe = std::env::current_exe().context("Failed to locate the running executable")?;
    exe.parent()
        .map(Path::to_path_buf)
        .ok_or_else(|| anyhow!("Executable {:?} has no parent directory", exe))
}

fn resolve_against(root: &Path, value: &str) -> PathBuf {
    let path = PathBuf::from(value);
    if path.is_absolute() {
        path
    } else {
        root.join(path)
    }
}

fn load_from_env(path: &Path, settings: &mut Settings) -> Result<()> {
    let file = File::open(path).with_context(|| format!("Failed to open {:?}", path))?;
    let reader = BufReader::new(file);

    for line in reader.lines() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some((key, value)) = line.split_once('=') {
            let value = value.trim();
            if value.is_empty() {
                continue;
            }
            match key.trim() {
                "SOFTWARE_DIR" => settings.software_dir = resolve_against(&settings.root, value),
                "DB_PATH" => settings.db_path = resolve_against(&settings.root, value),
                _ => {}
            }
        }
    }
    Ok(())
}

fn save_to_env(path: &Path, settings: &Settings) -> Result<()> {
    let mut file = File::create(path).context("Failed to create settings file")?;
    writeln!(file, "SOFTWARE_DIR={}", relative_to_root(&settings.root, &settings.software_dir))?;
    writeln!(file, "DB_PATH={}", relative_to_root(&settings.root, &settings.db_path))?;
    Ok(())
}

// Stored relative so the drive still works under a different letter.
fn relative_to_root(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .display()
        .to_string()
}
