//! Persisted record of which items were already dispatched, per feed.
//!
//! # File Format
//!
//! ```text
//! {
//!   "feeds": {
//!     "bbc_burmese": ["https://www.bbc.com/burmese/articles/...", ...],
//!     "myanmarnow": [...]
//!   }
//! }
//! ```
//!
//! Ids are written sorted and the whole file is rewritten on every save.
//! Two older shapes are still read: a bare `{key: [ids]}` mapping, and a
//! bare array of ids, which lands in the `"default"` bucket.
//!
//! Ids are only ever added. There is no expiry.

use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::error::Error;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info, instrument};

use crate::models::Item;

/// Bucket used for the legacy bare-array file shape.
pub const LEGACY_BUCKET: &str = "default";

/// Feed key → ids already dispatched for that feed.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SeenStore {
    feeds: BTreeMap<String, BTreeSet<String>>,
}

#[derive(Serialize)]
struct SeenFile<'a> {
    feeds: &'a BTreeMap<String, BTreeSet<String>>,
}

impl SeenStore {
    /// Load the store from `path`.
    ///
    /// A missing file is an empty store.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or is not a
    /// recognized shape. Treating such a file as empty would re-send every
    /// item of every feed, so the caller should skip the pass instead.
    #[instrument(level = "info", skip_all, fields(path = %path.display()))]
    pub async fn load(path: &Path) -> Result<Self, Box<dyn Error>> {
        let raw = match fs::read_to_string(path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!("No seen store yet; starting empty");
                return Ok(Self::default());
            }
            Err(e) => return Err(Box::new(e)),
        };
        let store = Self::from_json(&raw)?;
        debug!(feeds = store.feeds.len(), "Loaded seen store");
        Ok(store)
    }

    /// Parse any of the accepted file shapes.
    pub fn from_json(raw: &str) -> Result<Self, Box<dyn Error>> {
        let value: Value = serde_json::from_str(raw)?;
        let mut feeds = BTreeMap::new();

        match value {
            Value::Object(mut top) => {
                let buckets = match top.remove("feeds") {
                    Some(Value::Object(inner)) => inner,
                    Some(other) => {
                        // A feed literally named "feeds" in the bare mapping.
                        top.insert("feeds".to_string(), other);
                        top
                    }
                    None => top,
                };
                for (key, ids) in buckets {
                    if let Value::Array(ids) = ids {
                        feeds.insert(key, collect_ids(ids));
                    }
                }
            }
            Value::Array(ids) => {
                feeds.insert(LEGACY_BUCKET.to_string(), collect_ids(ids));
            }
            other => {
                return Err(format!("unexpected seen store shape: {}", type_name(&other)).into());
            }
        }

        Ok(Self { feeds })
    }

    /// Serialize in the current `{"feeds": {...}}` shape, indented.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&SeenFile { feeds: &self.feeds })
    }

    /// Overwrite `path` with the whole store.
    ///
    /// Writes a sibling temp file and renames it over the target, so a crash
    /// mid-write leaves the previous version intact.
    #[instrument(level = "debug", skip_all, fields(path = %path.display()))]
    pub async fn save(&self, path: &Path) -> Result<(), Box<dyn Error>> {
        let json = self.to_json()?;
        let tmp = temp_path(path);
        fs::write(&tmp, json).await?;
        fs::rename(&tmp, path).await?;
        debug!(feeds = self.feeds.len(), "Saved seen store");
        Ok(())
    }

    /// Whether `id` was already dispatched for feed `key`.
    pub fn contains(&self, key: &str, id: &str) -> bool {
        self.feeds.get(key).is_some_and(|ids| ids.contains(id))
    }

    /// Keep only the items not yet dispatched for feed `key`.
    pub fn unseen(&self, key: &str, items: Vec<Item>) -> Vec<Item> {
        items
            .into_iter()
            .filter(|it| !self.contains(key, &it.id))
            .collect()
    }

    /// Record `id` as dispatched for feed `key`.
    pub fn mark_seen(&mut self, key: &str, id: &str) {
        self.feeds
            .entry(key.to_string())
            .or_default()
            .insert(id.to_string());
    }

    /// Number of ids recorded for feed `key`.
    pub fn count(&self, key: &str) -> usize {
        self.feeds.get(key).map_or(0, BTreeSet::len)
    }
}

fn collect_ids(ids: Vec<Value>) -> BTreeSet<String> {
    ids.into_iter()
        .filter_map(|id| match id {
            Value::String(s) => Some(s),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        })
        .collect()
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "seen.json".into());
    name.push(".tmp");
    path.with_file_name(name)
}
