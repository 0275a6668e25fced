//! View parameters for the software list.
//!
//! The tag predicate is pushed down into SQL; the text predicate and the
//! ordering run in Rust so that matching is Unicode-aware and `%`/`_` in a
//! search string are taken literally.

use std::cmp::Ordering;
use std::collections::BTreeSet;

use rusqlite::types::Value;

use crate::database::repo::SoftwareEntry;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Ascending,
    Descending,
}

/// What the caller currently wants to see.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ViewParams {
    pub search: Option<String>,
    pub tags: BTreeSet<String>,
    pub order: SortOrder,
}

impl ViewParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_search(mut self, search: impl Into<String>) -> Self {
        self.search = Some(search.into());
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.insert(tag.into());
        self
    }

    pub fn with_order(mut self, order: SortOrder) -> Self {
        self.order = order;
        self
    }

    /// Lowercased, trimmed search needle; `None` when there is nothing to match.
    fn needle(&self) -> Option<String> {
        self.search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_lowercase)
    }

    /// Builds the SELECT for the tag predicate together with its parameters.
    pub fn to_sql(&self) -> (String, Vec<Value>) {
        let mut query = String::from(
            "SELECT id, name, filename, path, description, last_used, use_count FROM software",
        );
        let mut params = Vec::new();

        if !self.tags.is_empty() {
            let placeholders = vec!["?"; self.tags.len()].join(",");
            query.push_str(&format!(
                " WHERE id IN (
                    SELECT st.software_id FROM software_tags st
                    JOIN tags t ON t.id = st.tag_id
                    WHERE t.name IN ({})
                )",
                placeholders
            ));
            params.extend(self.tags.iter().cloned().map(Value::Text));
        }

        query.push_str(" ORDER BY id");
        (query, params)
    }

    pub fn matches(&self, entry: &SoftwareEntry) -> bool {
        match self.needle() {
            None => true,
            Some(needle) => {
                entry.name.to_lowercase().contains(&needle)
                    || entry.description.to_lowercase().contains(&needle)
            }
        }
    }

    /// Drops non-matching entries and sorts the rest by name.
    pub fn apply(&self, entries: Vec<SoftwareEntry>) -> Vec<SoftwareEntry> {
        let mut visible: Vec<(String, SoftwareEntry)> = entries
            .into_iter()
            .filter(|e| self.matches(e))
            .map(|e| (e.name.to_lowercase(), e))
            .collect();

        // sort_by is stable, so equal names keep id order in both directions.
        visible.sort_by(|(a, _), (b, _)| {
            let ord: Ordering = a.cmp(b);
            match self.order {
                SortOrder::Ascending => ord,
                SortOrder::Descending => ord.reverse(),
            }
        });

        visible.into_iter().map(|(_, e)| e).collect()
    }
}
