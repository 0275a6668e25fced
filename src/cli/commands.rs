use std::collections::BTreeSet;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::Local;
use serde::Serialize;
use tracing::{info, warn};

use crate::database::repo::{CatalogStore, SoftwareEntry};
use crate::error::CatalogError;
use crate::ingest::{importer, scanner};
use crate::launcher::{self, SystemOpener};
use crate::query::filter::ViewParams;
use crate::utils::config::Settings;

/// One row of the list view.
#[derive(Debug, Serialize)]
pub struct ListedEntry {
    #[serde(flatten)]
    pub entry: SoftwareEntry,
    pub tags: BTreeSet<String>,
}

pub fn open_store(settings: &Settings) -> Result<CatalogStore> {
    settings.ensure_layout()?;
    CatalogStore::open(&settings.db_path)
        .with_context(|| format!("Failed to open catalog {:?}", settings.db_path))
}

pub fn init(settings: &Settings) -> Result<()> {
    open_store(settings)?;
    let path = settings.save()?;
    println!("Catalog ready: {}", settings.db_path.display());
    println!("Software directory: {}", settings.software_dir.display());
    println!("Settings written to {}", path.display());
    Ok(())
}

pub fn scan(settings: &Settings, store: &CatalogStore) -> Result<()> {
    let report = scanner::scan_directory(&settings.software_dir, store)
        .context("Directory scan failed")?;
    println!(
        "Added {} new, {} already tracked, {} skipped",
        report.inserted, report.already_tracked, report.skipped
    );
    Ok(())
}

/// Rescans, then prints the filtered view.
pub fn list(settings: &Settings, store: &CatalogStore, view: &ViewParams, json: bool) -> Result<()> {
    scanner::scan_directory(&settings.software_dir, store).context("Directory scan failed")?;

    let rows = store
        .list_entries(view)?
        .into_iter()
        .map(|entry| -> Result<ListedEntry> {
            let tags = store.tags_for(entry.id)?;
            Ok(ListedEntry { entry, tags })
        })
        .collect::<Result<Vec<_>>>()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    for row in &rows {
        println!(
            "{:>5}  {:<32}  {:<40}  {}",
            row.entry.id,
            row.entry.name,
            row.entry.description,
            join_tags(&row.tags)
        );
    }
    info!("Loaded {} entries", rows.len());
    Ok(())
}

pub fn show(store: &CatalogStore, id: i64) -> Result<()> {
    let entry = require_entry(store, id)?;
    let tags = store.tags_for(id)?;

    println!("Name:        {}", entry.name);
    println!("Path:        {}", entry.path);
    if !entry.filename.is_empty() {
        println!("File:        {}", entry.filename);
    }
    println!("Description: {}", entry.description);
    println!("Tags:        {}", join_tags(&tags));
    println!("Launches:    {}", entry.use_count);
    if let Some(last) = entry.last_used {
        println!("Last used:   {}", last.format("%Y-%m-%d %H:%M:%S"));
    }
    Ok(())
}

pub fn add(settings: &Settings, store: &CatalogStore, file: &Path) -> Result<()> {
    match importer::import_file(store, &settings.software_dir, file) {
        Ok(entry) => {
            println!("Added {} (id {})", entry.filename, entry.id);
            Ok(())
        }
        Err(CatalogError::DuplicateKey { value, .. }) => {
            warn!("{} is already catalogued", value);
            println!("Already catalogued: {}", value);
            Ok(())
        }
        Err(e) => Err(e).context("Could not add software"),
    }
}

pub fn edit(store: &CatalogStore, id: i64, name: Option<&str>, description: Option<&str>) -> Result<()> {
    let entry = require_entry(store, id)?;
    let name = name.unwrap_or(&entry.name);
    let description = description.unwrap_or(&entry.description);
    store.update_entry(id, name, description)?;
    println!("Updated entry {}", id);
    Ok(())
}

pub fn launch(settings: &Settings, store: &CatalogStore, id: i64) -> Result<()> {
    let now = Local::now().naive_local();
    let path = launcher::launch(store, &settings.software_dir, id, now, &SystemOpener)
        .context("Could not launch")?;
    let shown = path.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default();
    println!("Launched: {}", shown);
    Ok(())
}

pub fn list_tags(store: &CatalogStore) -> Result<()> {
    for tag in store.all_tags()? {
        println!("{}", tag);
    }
    Ok(())
}

pub fn add_tag(store: &CatalogStore, name: &str) -> Result<()> {
    store.add_tag(name)?;
    println!("Added tag: {}", name.trim());
    Ok(())
}

pub fn delete_tag(store: &CatalogStore, name: &str) -> Result<()> {
    if !store.delete_tag(name)? {
        return Err(CatalogError::not_found("tag", name).into());
    }
    println!("Deleted tag: {}", name);
    Ok(())
}

pub fn set_tags(store: &CatalogStore, id: i64, tags: Vec<String>) -> Result<()> {
    let tags: BTreeSet<String> = tags.into_iter().map(|t| t.trim().to_string()).collect();
    store.set_tags(id, &tags)?;
    println!("Tags for {}: {}", id, join_tags(&tags));
    Ok(())
}

fn require_entry(store: &CatalogStore, id: i64) -> Result<SoftwareEntry> {
    Ok(store
        .get_entry(id)?
        .ok_or_else(|| CatalogError::not_found("entry", id))?)
}

fn join_tags(tags: &BTreeSet<String>) -> String {
    tags.iter().map(String::as_str).collect::<Vec<_>>().join(", ")
}
