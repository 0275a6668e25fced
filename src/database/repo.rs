use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use serde::Serialize;
use tracing::{debug, info};

use crate::database::schema::{DEFAULT_TAGS, SCHEMA, TIMESTAMP_FORMAT};
use crate::error::{is_constraint_violation, require_non_empty, CatalogError, CatalogResult};
use crate::query::filter::ViewParams;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SoftwareEntry {
    pub id: i64,
    pub name: String,
    pub filename: String,
    pub path: String,
    pub description: String,
    pub last_used: Option<NaiveDateTime>,
    pub use_count: i64,
}

/// Fields supplied when an entry is first tracked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewEntry {
    pub name: String,
    pub filename: String,
    pub path: String,
    pub description: String,
}

fn entry_from_row(row: &Row) -> rusqlite::Result<SoftwareEntry> {
    let last_used: Option<String> = row.get(5)?;
    Ok(SoftwareEntry {
        id: row.get(0)?,
        name: row.get(1)?,
        filename: row.get(2)?,
        path: row.get(3)?,
        description: row.get::<_, Option<String>>(4)?.unwrap_or_default(),
        last_used: last_used.as_deref().and_then(parse_timestamp),
        use_count: row.get::<_, Option<i64>>(6)?.unwrap_or(0),
    })
}

// Older rows may omit the fractional part.
fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f").ok()
}

/// The software/tag catalog backed by a single SQLite file.
///
/// Every operation opens its own connection and drops it before returning;
/// multi-statement writes run inside one transaction.
pub struct CatalogStore {
    db_path: PathBuf,
}

impl CatalogStore {
    /// Opens (creating if needed) the catalog at `path`. Default tags are
    /// seeded only when the file did not exist beforehand.
    pub fn open(path: impl AsRef<Path>) -> CatalogResult<Self> {
        let db_path = path.as_ref().to_path_buf();
        let first_init = !db_path.exists();

        let mut conn = Connection::open(&db_path)?;
        conn.execute_batch(SCHEMA)?;

        if first_init {
            let tx = conn.transaction()?;
            {
                let mut stmt = tx.prepare("INSERT OR IGNORE INTO tags (name) VALUES (?1)")?;
                for tag in DEFAULT_TAGS {
                    stmt.execute(params![tag])?;
                }
            }
            tx.commit()?;
            info!("Created catalog at {:?} with {} default tags", db_path, DEFAULT_TAGS.len());
        }

        Ok(Self { db_path })
    }

    fn connect(&self) -> CatalogResult<Connection> {
        Ok(Connection::open(&self.db_path)?)
    }

    pub fn insert_entry(&self, entry: &NewEntry) -> CatalogResult<i64> {
        let conn = self.connect()?;
        insert_with(&conn, entry)
    }

    /// Inserts all entries or none of them.
    pub fn insert_entries(&self, entries: &[NewEntry]) -> CatalogResult<Vec<i64>> {
        let mut conn = self.connect()?;
        let tx = conn.transaction()?;
        let mut ids = Vec::with_capacity(entries.len());
        for entry in entries {
            ids.push(insert_with(&tx, entry)?);
        }
        tx.commit()?;
        Ok(ids)
    }

    pub fn get_entry(&self, id: i64) -> CatalogResult<Option<SoftwareEntry>> {
        let conn = self.connect()?;
        let entry = conn
            .query_row(
                "SELECT id, name, filename, path, description, last_used, use_count
                 FROM software WHERE id = ?1",
                params![id],
                entry_from_row,
            )
            .optional()?;
        Ok(entry)
    }

    pub fn update_entry(&self, id: i64, name: &str, description: &str) -> CatalogResult<()> {
        let name = require_non_empty("name", name)?;
        let conn = self.connect()?;
        let changed = conn.execute(
            "UPDATE software SET name = ?1, description = ?2 WHERE id = ?3",
            params![name, description.trim(), id],
        )?;
        if changed == 0 {
            return Err(CatalogError::not_found("entry", id));
        }
        debug!("Updated entry {}", id);
        Ok(())
    }

    pub fn record_launch(&self, id: i64, timestamp: NaiveDateTime) -> CatalogResult<()> {
        let conn = self.connect()?;
        let changed = conn.execute(
            "UPDATE software
             SET use_count = COALESCE(use_count, 0) + 1, last_used = ?1
             WHERE id = ?2",
            params![timestamp.format(TIMESTAMP_FORMAT).to_string(), id],
        )?;
        if changed == 0 {
            return Err(CatalogError::not_found("entry", id));
        }
        Ok(())
    }

    pub fn tracked_paths(&self) -> CatalogResult<HashSet<String>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare("SELECT path FROM software")?;
        let paths = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<HashSet<String>, _>>()?;
        Ok(paths)
    }

    pub fn list_entries(&self, view: &ViewParams) -> CatalogResult<Vec<SoftwareEntry>> {
        let (query, values) = view.to_sql();
        let conn = self.connect()?;
        let mut stmt = conn.prepare(&query)?;
        let entries = stmt
            .query_map(params_from_iter(values.iter()), entry_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(view.apply(entries))
    }

    pub fn tags_for(&self, entry_id: i64) -> CatalogResult<BTreeSet<String>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            "SELECT t.name
             FROM tags t
             JOIN software_tags st ON t.id = st.tag_id
             WHERE st.software_id = ?1",
        )?;
        let tags = stmt
            .query_map(params![entry_id], |row| row.get(0))?
            .collect::<Result<BTreeSet<String>, _>>()?;
        Ok(tags)
    }

    pub fn all_tags(&self) -> CatalogResult<Vec<String>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare("SELECT name FROM tags ORDER BY name")?;
        let tags = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(tags)
    }

    pub fn add_tag(&self, name: &str) -> CatalogResult<i64> {
        let name = require_non_empty("tag name", name)?;
        let conn = self.connect()?;
        match conn.execute("INSERT INTO tags (name) VALUES (?1)", params![name]) {
            Ok(_) => Ok(conn.last_insert_rowid()),
            Err(e) if is_constraint_violation(&e) => Err(CatalogError::duplicate("tag", name)),
            Err(e) => Err(e.into()),
        }
    }

    /// Removes the tag and all of its associations. Returns `false` when no
    /// tag by that name exists.
    pub fn delete_tag(&self, name: &str) -> CatalogResult<bool> {
        let name = name.trim();
        if name.is_empty() {
            return Ok(false);
        }
        let mut conn = self.connect()?;
        let tx = conn.transaction()?;

        let tag_id: Option<i64> = tx
            .query_row("SELECT id FROM tags WHERE name = ?1", params![name], |row| row.get(0))
            .optional()?;
        let Some(tag_id) = tag_id else {
            return Ok(false);
        };

        let unlinked = tx.execute("DELETE FROM software_tags WHERE tag_id = ?1", params![tag_id])?;
        tx.execute("DELETE FROM tags WHERE id = ?1", params![tag_id])?;
        tx.commit()?;

        debug!("Deleted tag '{}' ({} associations)", name, unlinked);
        Ok(true)
    }

    /// Replaces the entry's whole association set with `tags`.
    pub fn set_tags(&self, entry_id: i64, tags: &BTreeSet<String>) -> CatalogResult<()> {
        let mut conn = self.connect()?;
        let tx = conn.transaction()?;

        let exists: Option<i64> = tx
            .query_row("SELECT id FROM software WHERE id = ?1", params![entry_id], |row| row.get(0))
            .optional()?;
        if exists.is_none() {
            return Err(CatalogError::not_found("entry", entry_id));
        }

        tx.execute("DELETE FROM software_tags WHERE software_id = ?1", params![entry_id])?;
        {
            let mut stmt_get_tag_id = tx.prepare("SELECT id FROM tags WHERE name = ?1")?;
            let mut stmt_link =
                tx.prepare("INSERT INTO software_tags (software_id, tag_id) VALUES (?1, ?2)")?;

            for tag in tags {
                let tag_id: i64 = stmt_get_tag_id
                    .query_row(params![tag], |row| row.get(0))
                    .optional()?
                    .ok_or_else(|| CatalogError::not_found("tag", tag))?;
                stmt_link.execute(params![entry_id, tag_id])?;
            }
        }
        tx.commit()?;
        Ok(())
    }
}

fn insert_with(conn: &Connection, entry: &NewEntry) -> CatalogResult<i64> {
    let name = require_non_empty("name", &entry.name)?;
    // The path is the natural key and must match the name on disk exactly.
    let path = entry.path.as_str();
    if path.trim().is_empty() {
        return Err(CatalogError::EmptyInput("path"));
    }
    let result = conn.execute(
        "INSERT INTO software (name, filename, path, description) VALUES (?1, ?2, ?3, ?4)",
        params![name, entry.filename, path, entry.description],
    );
    match result {
        Ok(_) => Ok(conn.last_insert_rowid()),
        Err(e) if is_constraint_violation(&e) => Err(CatalogError::duplicate("path", path)),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use chrono::NaiveDate;
    use tempfile::TempDir;

    fn new_store() -> Result<(TempDir, CatalogStore)> {
        let dir = TempDir::new()?;
        let store = CatalogStore::open(dir.path().join("software.db"))?;
        Ok((dir, store))
    }

    fn new_entry(name: &str, path: &str) -> NewEntry {
        NewEntry {
            name: name.to_string(),
            filename: path.to_string(),
            path: path.to_string(),
            description: String::new(),
        }
    }

    fn tags(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_open_seeds_default_tags_once() -> Result<()> {
        let (dir, store) = new_store()?;
        let all = store.all_tags()?;
        assert_eq!(all.len(), DEFAULT_TAGS.len());
        assert!(all.contains(&"Tools".to_string()));

        store.delete_tag("Tools")?;
        let reopened = CatalogStore::open(dir.path().join("software.db"))?;
        assert!(!reopened.all_tags()?.contains(&"Tools".to_string()));
        Ok(())
    }

    #[test]
    fn test_all_tags_sorted() -> Result<()> {
        let (_dir, store) = new_store()?;
        let all = store.all_tags()?;
        let mut sorted = all.clone();
        sorted.sort();
        assert_eq!(all, sorted);
        Ok(())
    }

    #[test]
    fn test_insert_and_get_entry() -> Result<()> {
        let (_dir, store) = new_store()?;
        let id = store.insert_entry(&new_entry("putty", "putty.exe"))?;
        let entry = store.get_entry(id)?.expect("entry exists");
        assert_eq!(entry.name, "putty");
        assert_eq!(entry.path, "putty.exe");
        assert_eq!(entry.description, "");
        assert_eq!(entry.use_count, 0);
        assert!(entry.last_used.is_none());
        assert!(store.get_entry(id + 100)?.is_none());
        Ok(())
    }

    #[test]
    fn test_insert_duplicate_path_is_rejected() -> Result<()> {
        let (_dir, store) = new_store()?;
        store.insert_entry(&new_entry("putty", "putty.exe"))?;
        let err = store.insert_entry(&new_entry("other", "putty.exe")).unwrap_err();
        assert!(matches!(err, CatalogError::DuplicateKey { kind: "path", .. }));
        Ok(())
    }

    #[test]
    fn test_insert_keeps_path_untrimmed() -> Result<()> {
        let (_dir, store) = new_store()?;
        let id = store.insert_entry(&new_entry(" lead ", " lead.exe"))?;
        let entry = store.get_entry(id)?.expect("entry exists");
        assert_eq!(entry.path, " lead.exe");
        assert_eq!(entry.name, "lead");

        assert!(matches!(
            store.insert_entry(&new_entry("blank", "  ")),
            Err(CatalogError::EmptyInput("path"))
        ));
        Ok(())
    }

    #[test]
    fn test_insert_blank_name_is_rejected() -> Result<()> {
        let (_dir, store) = new_store()?;
        let err = store.insert_entry(&new_entry("  ", "x.exe")).unwrap_err();
        assert!(matches!(err, CatalogError::EmptyInput("name")));
        assert!(store.tracked_paths()?.is_empty());
        Ok(())
    }

    #[test]
    fn test_insert_entries_is_atomic() -> Result<()> {
        let (_dir, store) = new_store()?;
        let batch = vec![new_entry("a", "a.exe"), new_entry("a again", "a.exe")];
        assert!(store.insert_entries(&batch).is_err());
        assert!(store.tracked_paths()?.is_empty());
        Ok(())
    }

    #[test]
    fn test_update_entry() -> Result<()> {
        let (_dir, store) = new_store()?;
        let id = store.insert_entry(&new_entry("putty", "putty.exe"))?;
        store.update_entry(id, "  PuTTY ", "SSH client\n")?;
        let entry = store.get_entry(id)?.expect("entry exists");
        assert_eq!(entry.name, "PuTTY");
        assert_eq!(entry.description, "SSH client");
        assert_eq!(entry.path, "putty.exe");

        assert!(matches!(
            store.update_entry(id, "", "x"),
            Err(CatalogError::EmptyInput(_))
        ));
        assert!(matches!(
            store.update_entry(id + 1, "x", ""),
            Err(CatalogError::NotFound { .. })
        ));
        Ok(())
    }

    #[test]
    fn test_record_launch_counts_and_stamps() -> Result<()> {
        let (_dir, store) = new_store()?;
        let id = store.insert_entry(&new_entry("putty", "putty.exe"))?;
        let date = NaiveDate::from_ymd_opt(2024, 5, 1).expect("valid date");

        let mut last = None;
        for n in 1..=3 {
            let ts = date.and_hms_micro_opt(9, 30, n, 250_000).expect("valid time");
            store.record_launch(id, ts)?;
            last = Some(ts);
        }

        let entry = store.get_entry(id)?.expect("entry exists");
        assert_eq!(entry.use_count, 3);
        assert_eq!(entry.last_used, last);

        assert!(matches!(
            store.record_launch(id + 1, date.and_hms_opt(0, 0, 0).expect("valid time")),
            Err(CatalogError::NotFound { .. })
        ));
        Ok(())
    }

    #[test]
    fn test_last_used_without_fraction_parses() {
        let parsed = parse_timestamp("2024-05-01T09:30:00").expect("parses");
        assert_eq!(parsed.format("%H:%M").to_string(), "09:30");
        assert!(parse_timestamp("yesterday").is_none());
    }

    #[test]
    fn test_add_tag_rejects_duplicates_and_blanks() -> Result<()> {
        let (_dir, store) = new_store()?;
        store.add_tag("Portable")?;
        assert!(matches!(
            store.add_tag(" Portable "),
            Err(CatalogError::DuplicateKey { kind: "tag", .. })
        ));
        assert!(matches!(store.add_tag(""), Err(CatalogError::EmptyInput(_))));
        Ok(())
    }

    #[test]
    fn test_set_tags_replaces_previous_set() -> Result<()> {
        let (_dir, store) = new_store()?;
        let id = store.insert_entry(&new_entry("putty", "putty.exe"))?;

        store.set_tags(id, &tags(&["Tools", "Security"]))?;
        assert_eq!(store.tags_for(id)?, tags(&["Security", "Tools"]));

        store.set_tags(id, &tags(&["Tools", "Office"]))?;
        assert_eq!(store.tags_for(id)?, tags(&["Office", "Tools"]));

        store.set_tags(id, &BTreeSet::new())?;
        assert!(store.tags_for(id)?.is_empty());
        Ok(())
    }

    #[test]
    fn test_set_tags_unknown_tag_leaves_previous_set() -> Result<()> {
        let (_dir, store) = new_store()?;
        let id = store.insert_entry(&new_entry("putty", "putty.exe"))?;
        store.set_tags(id, &tags(&["Tools"]))?;

        let err = store.set_tags(id, &tags(&["Office", "Nope"])).unwrap_err();
        assert!(matches!(err, CatalogError::NotFound { kind: "tag", .. }));
        assert_eq!(store.tags_for(id)?, tags(&["Tools"]));

        assert!(matches!(
            store.set_tags(id + 1, &tags(&["Tools"])),
            Err(CatalogError::NotFound { kind: "entry", .. })
        ));
        Ok(())
    }

    #[test]
    fn test_delete_tag_cascades() -> Result<()> {
        let (_dir, store) = new_store()?;
        let a = store.insert_entry(&new_entry("a", "a.exe"))?;
        let b = store.insert_entry(&new_entry("b", "b.exe"))?;
        store.set_tags(a, &tags(&["Tools", "Office"]))?;
        store.set_tags(b, &tags(&["Tools"]))?;

        assert!(store.delete_tag("Tools")?);
        assert!(!store.all_tags()?.contains(&"Tools".to_string()));
        assert_eq!(store.tags_for(a)?, tags(&["Office"]));
        assert!(store.tags_for(b)?.is_empty());

        assert!(!store.delete_tag("Tools")?);
        Ok(())
    }

    #[test]
    fn test_delete_tag_trims_like_add_tag() -> Result<()> {
        let (_dir, store) = new_store()?;
        store.add_tag(" Portable ")?;
        assert!(store.delete_tag(" Portable ")?);
        assert!(!store.all_tags()?.contains(&"Portable".to_string()));
        assert!(!store.delete_tag("   ")?);
        Ok(())
    }

    #[test]
    fn test_list_entries_filters() -> Result<()> {
        let (_dir, store) = new_store()?;
        let a = store.insert_entry(&new_entry("7-Zip", "7zip.exe"))?;
        let b = store.insert_entry(&new_entry("Notepad++", "npp.exe"))?;
        let c = store.insert_entry(&new_entry("Firefox", "firefox.exe"))?;
        store.update_entry(b, "Notepad++", "text editor with ABC plugins")?;
        store.set_tags(a, &tags(&["Tools"]))?;
        store.set_tags(c, &tags(&["Browser"]))?;

        let all = store.list_entries(&ViewParams::new())?;
        let names: Vec<_> = all.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["7-Zip", "Firefox", "Notepad++"]);

        let found = store.list_entries(&ViewParams::new().with_search("abc"))?;
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, b);

        let tagged = store.list_entries(&ViewParams::new().with_tag("Tools"))?;
        assert_eq!(tagged.len(), 1);
        assert_eq!(tagged[0].id, a);

        let either = store.list_entries(&ViewParams::new().with_tag("Tools").with_tag("Browser"))?;
        assert_eq!(either.len(), 2);

        let both = store.list_entries(
            &ViewParams::new().with_tag("Tools").with_tag("Browser").with_search("fire"),
        )?;
        assert_eq!(both.len(), 1);
        assert_eq!(both[0].id, c);

        let unknown = store.list_entries(&ViewParams::new().with_tag("No Such Tag"))?;
        assert!(unknown.is_empty());
        Ok(())
    }
}
