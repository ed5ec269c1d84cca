//! User preference storage.
//!
//! The core only depends on the [`PreferenceStore`] get/set contract.
//! [`FilePreferenceStore`] persists to a TOML file, editing it with `toml_edit`
//! so comments and formatting survive. [`Preferences`] is the typed view the
//! session reads on every request.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use nekoview_common::NsfwMode;
use parking_lot::RwLock;
use toml::{Table, Value};
use toml_edit::DocumentMut;
use tracing::{debug, warn};

/// Key-value store the core reads from and writes to.
pub trait PreferenceStore: Send + Sync {
    /// Current value for `key`, or `None` when unset.
    fn get(&self, key: &str) -> Option<Value>;

    /// Store `value` under `key`.
    fn set(&self, key: &str, value: Value) -> Result<()>;
}

/// In-memory store, used by tests and when no file is wanted.
#[derive(Debug, Default)]
pub struct MemoryPreferenceStore {
    values: RwLock<Table>,
}

impl MemoryPreferenceStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PreferenceStore for MemoryPreferenceStore {
    fn get(&self, key: &str) -> Option<Value> {
        self.values.read().get(key).cloned()
    }

    fn set(&self, key: &str, value: Value) -> Result<()> {
        self.values.write().insert(key.to_string(), value);
        Ok(())
    }
}

/// Preference store backed by a TOML file.
///
/// Missing keys are filled from the supplied defaults and written back on
/// open. A file that fails to parse is logged and treated as empty.
///
/// Every `get` re-reads the file so edits made by another process (for
/// example `nekoview prefs set` while `watch` runs) take effect on the next
/// fetch. A failed read keeps the values from the last good one.
#[derive(Debug)]
pub struct FilePreferenceStore {
    path: PathBuf,
    values: RwLock<Table>,
}

impl FilePreferenceStore {
    /// Open (creating if needed) the preference file at `path`.
    pub fn open(path: impl Into<PathBuf>, defaults: &Table) -> Result<Self> {
        let path = path.into();

        let values = if path.exists() {
            match read_table(&path) {
                Ok(table) => table,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Ignoring unreadable preferences file");
                    Table::new()
                }
            }
        } else {
            Table::new()
        };

        let missing: Vec<(String, Value)> = defaults
            .iter()
            .filter(|(key, _)| !values.contains_key(*key))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();

        let store = Self {
            path,
            values: RwLock::new(values),
        };

        if !missing.is_empty() || !store.path.exists() {
            store.persist(&missing)?;
            let mut values = store.values.write();
            for (key, value) in missing {
                values.insert(key, value);
            }
        }

        Ok(store)
    }

    /// Write `entries` into the file, preserving everything else in it.
    fn persist(&self, entries: &[(String, Value)]) -> Result<()> {
        let mut doc = match std::fs::read_to_string(&self.path) {
            Ok(content) => content.parse::<DocumentMut>().unwrap_or_else(|e| {
                warn!(path = %self.path.display(), error = %e, "Rewriting malformed preferences file");
                DocumentMut::new()
            }),
            Err(_) => DocumentMut::new(),
        };

        for (key, value) in entries {
            doc[key.as_str()] = toml_edit::Item::Value(to_edit_value(value)?);
        }

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create preferences directory: {:?}", parent)
                })?;
            }
        }

        std::fs::write(&self.path, doc.to_string())
            .with_context(|| format!("Failed to write preferences file: {:?}", self.path))?;

        Ok(())
    }
}

impl PreferenceStore for FilePreferenceStore {
    fn get(&self, key: &str) -> Option<Value> {
        let mut values = self.values.write();
        match read_table(&self.path) {
            // Merged so keys missing from the file keep their defaults.
            Ok(table) => values.extend(table),
            Err(e) => debug!(error = %e, "Using cached preferences"),
        }
        values.get(key).cloned()
    }

    fn set(&self, key: &str, value: Value) -> Result<()> {
        // Held across the read-modify-write so concurrent sets are not lost.
        let mut values = self.values.write();
        self.persist(&[(key.to_string(), value.clone())])?;
        values.insert(key.to_string(), value);
        debug!(key, "Preference saved");
        Ok(())
    }
}

fn read_table(path: &Path) -> Result<Table> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read preferences file: {:?}", path))?;
    content
        .parse::<Table>()
        .with_context(|| format!("Failed to parse preferences file: {:?}", path))
}

fn to_edit_value(value: &Value) -> Result<toml_edit::Value> {
    Ok(match value {
        Value::String(s) => s.as_str().into(),
        Value::Integer(i) => (*i).into(),
        Value::Float(f) => (*f).into(),
        Value::Boolean(b) => (*b).into(),
        other => other
            .to_string()
            .parse::<toml_edit::Value>()
            .with_context(|| format!("Unsupported preference value: {other}"))?,
    })
}

/// Typed accessor over a [`PreferenceStore`].
#[derive(Clone)]
pub struct Preferences {
    store: Arc<dyn PreferenceStore>,
}

impl Preferences {
    pub const NSFW_MODE: &'static str = "nsfw_mode";
    pub const SOURCE: &'static str = "source";
    pub const AUTO_RELOAD_ENABLED: &'static str = "auto_reload_enabled";
    pub const AUTO_RELOAD_INTERVAL: &'static str = "auto_reload_interval";
    pub const E621_TAGS: &'static str = "e621_tags";
    /// Boolean flag written by older versions before the three-way mode existed.
    const LEGACY_NSFW: &'static str = "nsfw";

    pub const DEFAULT_INTERVAL_SECS: u64 = 30;
    pub const MIN_INTERVAL_SECS: u64 = 1;
    /// One day.
    pub const MAX_INTERVAL_SECS: u64 = 86_400;

    pub fn new(store: Arc<dyn PreferenceStore>) -> Self {
        Self { store }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryPreferenceStore::new()))
    }

    /// Values written into a fresh preferences file.
    pub fn defaults() -> Table {
        let mut table = Table::new();
        table.insert(
            Self::NSFW_MODE.to_string(),
            Value::String(NsfwMode::Block.as_str().to_string()),
        );
        table.insert(Self::AUTO_RELOAD_ENABLED.to_string(), Value::Boolean(false));
        table.insert(
            Self::AUTO_RELOAD_INTERVAL.to_string(),
            Value::Integer(Self::DEFAULT_INTERVAL_SECS as i64),
        );
        table.insert(Self::E621_TAGS.to_string(), Value::String(String::new()));
        table
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.store.get(key)
    }

    pub fn set(&self, key: &str, value: Value) -> Result<()> {
        self.store.set(key, value)
    }

    pub fn nsfw_mode(&self) -> NsfwMode {
        match self.store.get(Self::NSFW_MODE) {
            Some(Value::String(s)) => NsfwMode::parse_lenient(&s),
            Some(_) => NsfwMode::Block,
            None => match self.store.get(Self::LEGACY_NSFW) {
                Some(Value::Boolean(flag)) => NsfwMode::from_legacy_flag(flag),
                _ => NsfwMode::Block,
            },
        }
    }

    pub fn set_nsfw_mode(&self, mode: NsfwMode) -> Result<()> {
        self.store
            .set(Self::NSFW_MODE, Value::String(mode.as_str().to_string()))
    }

    /// Selected source id; `None` lets the registry pick its first entry.
    pub fn source(&self) -> Option<String> {
        match self.store.get(Self::SOURCE) {
            Some(Value::String(s)) if !s.trim().is_empty() => Some(s),
            _ => None,
        }
    }

    pub fn set_source(&self, id: &str) -> Result<()> {
        self.store.set(Self::SOURCE, Value::String(id.to_string()))
    }

    pub fn auto_reload_enabled(&self) -> bool {
        matches!(
            self.store.get(Self::AUTO_RELOAD_ENABLED),
            Some(Value::Boolean(true))
        )
    }

    pub fn set_auto_reload_enabled(&self, enabled: bool) -> Result<()> {
        self.store
            .set(Self::AUTO_RELOAD_ENABLED, Value::Boolean(enabled))
    }

    /// Interval in seconds, clamped to
    /// [`MIN_INTERVAL_SECS`](Self::MIN_INTERVAL_SECS)..=[`MAX_INTERVAL_SECS`](Self::MAX_INTERVAL_SECS).
    pub fn auto_reload_interval(&self) -> u64 {
        match self.store.get(Self::AUTO_RELOAD_INTERVAL) {
            Some(Value::Integer(n)) => Self::clamp_interval(n.max(0) as u64),
            _ => Self::DEFAULT_INTERVAL_SECS,
        }
    }

    /// Store the interval, clamped, and return the value actually stored.
    pub fn set_auto_reload_interval(&self, secs: u64) -> Result<u64> {
        let secs = Self::clamp_interval(secs);
        self.store
            .set(Self::AUTO_RELOAD_INTERVAL, Value::Integer(secs as i64))?;
        Ok(secs)
    }

    pub fn clamp_interval(secs: u64) -> u64 {
        secs.clamp(Self::MIN_INTERVAL_SECS, Self::MAX_INTERVAL_SECS)
    }

    /// Free-text tag filter for tag-capable sources.
    pub fn e621_tags(&self) -> String {
        match self.store.get(Self::E621_TAGS) {
            Some(Value::String(s)) => s.trim().to_string(),
            _ => String::new(),
        }
    }

    pub fn set_e621_tags(&self, tags: &str) -> Result<()> {
        self.store
            .set(Self::E621_TAGS, Value::String(tags.to_string()))
    }
}

impl std::fmt::Debug for Preferences {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Preferences").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nsfw_mode_round_trip() {
        let prefs = Preferences::in_memory();
        prefs.set_nsfw_mode(NsfwMode::OnlyNsfw).unwrap();
        assert_eq!(prefs.nsfw_mode(), NsfwMode::OnlyNsfw);
    }

    #[test]
    fn unrecognized_nsfw_mode_normalizes_to_block() {
        let prefs = Preferences::in_memory();
        prefs
            .set(Preferences::NSFW_MODE, Value::String("spicy".into()))
            .unwrap();
        assert_eq!(prefs.nsfw_mode(), NsfwMode::Block);

        prefs
            .set(Preferences::NSFW_MODE, Value::Integer(2))
            .unwrap();
        assert_eq!(prefs.nsfw_mode(), NsfwMode::Block);
    }

    #[test]
    fn legacy_boolean_flag_is_honoured() {
        let prefs = Preferences::in_memory();
        prefs.set("nsfw", Value::Boolean(true)).unwrap();
        assert_eq!(prefs.nsfw_mode(), NsfwMode::AllowMixed);
    }

    #[test]
    fn interval_defaults_and_clamps() {
        let prefs = Preferences::in_memory();
        assert_eq!(prefs.auto_reload_interval(), 30);

        assert_eq!(prefs.set_auto_reload_interval(0).unwrap(), 1);
        assert_eq!(prefs.auto_reload_interval(), 1);

        prefs
            .set(Preferences::AUTO_RELOAD_INTERVAL, Value::Integer(-5))
            .unwrap();
        assert_eq!(prefs.auto_reload_interval(), 1);

        assert_eq!(prefs.set_auto_reload_interval(u64::MAX).unwrap(), 86_400);
        assert_eq!(prefs.auto_reload_interval(), 86_400);

        prefs
            .set(Preferences::AUTO_RELOAD_INTERVAL, Value::Integer(i64::MAX))
            .unwrap();
        assert_eq!(prefs.auto_reload_interval(), 86_400);
    }

    #[test]
    fn blank_source_is_unset() {
        let prefs = Preferences::in_memory();
        assert_eq!(prefs.source(), None);
        prefs.set_source("  ").unwrap();
        assert_eq!(prefs.source(), None);
        prefs.set_source("waifu_im").unwrap();
        assert_eq!(prefs.source().as_deref(), Some("waifu_im"));
    }

    #[test]
    fn file_store_writes_defaults_on_create() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("preferences.toml");

        let store = FilePreferenceStore::open(&path, &Preferences::defaults()).unwrap();
        assert!(path.exists());
        assert_eq!(
            store.get(Preferences::AUTO_RELOAD_INTERVAL),
            Some(Value::Integer(30))
        );

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("nsfw_mode = \"block\""));
    }

    #[test]
    fn file_store_set_preserves_comments() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("preferences.toml");
        std::fs::write(&path, "# my settings\nsource = \"e621\"\n").unwrap();

        let store = FilePreferenceStore::open(&path, &Preferences::defaults()).unwrap();
        let prefs = Preferences::new(Arc::new(store));
        assert_eq!(prefs.source().as_deref(), Some("e621"));

        prefs.set_nsfw_mode(NsfwMode::OnlyNsfw).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("# my settings"));
        assert!(content.contains("nsfw_mode = \"only_nsfw\""));

        let reopened = FilePreferenceStore::open(&path, &Preferences::defaults()).unwrap();
        assert_eq!(
            Preferences::new(Arc::new(reopened)).nsfw_mode(),
            NsfwMode::OnlyNsfw
        );
    }

    #[test]
    fn file_store_recovers_from_malformed_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("preferences.toml");
        std::fs::write(&path, "this is = = not toml").unwrap();

        let store = FilePreferenceStore::open(&path, &Preferences::defaults()).unwrap();
        assert_eq!(
            store.get(Preferences::NSFW_MODE),
            Some(Value::String("block".into()))
        );
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.parse::<Table>().is_ok());
    }

    #[test]
    fn file_store_sees_writes_from_another_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("preferences.toml");

        let running = Preferences::new(Arc::new(
            FilePreferenceStore::open(&path, &Preferences::defaults()).unwrap(),
        ));
        let other = Preferences::new(Arc::new(
            FilePreferenceStore::open(&path, &Preferences::defaults()).unwrap(),
        ));
        assert_eq!(running.nsfw_mode(), NsfwMode::Block);

        other.set_nsfw_mode(NsfwMode::OnlyNsfw).unwrap();
        other.set_source("e621").unwrap();

        assert_eq!(running.nsfw_mode(), NsfwMode::OnlyNsfw);
        assert_eq!(running.source().as_deref(), Some("e621"));
    }

    #[test]
    fn file_store_keeps_last_values_when_file_disappears() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("preferences.toml");

        let prefs = Preferences::new(Arc::new(
            FilePreferenceStore::open(&path, &Preferences::defaults()).unwrap(),
        ));
        prefs.set_auto_reload_interval(45).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(prefs.auto_reload_interval(), 45);
    }

    #[test]
    fn file_store_concurrent_sets_are_not_lost() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("preferences.toml");
        let prefs = Preferences::new(Arc::new(
            FilePreferenceStore::open(&path, &Preferences::defaults()).unwrap(),
        ));

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let prefs = prefs.clone();
                std::thread::spawn(move || {
                    prefs.set(&format!("key_{i}"), Value::Integer(i)).unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let reopened = FilePreferenceStore::open(&path, &Preferences::defaults()).unwrap();
        for i in 0..8 {
            assert_eq!(reopened.get(&format!("key_{i}")), Some(Value::Integer(i)));
        }
    }
}
