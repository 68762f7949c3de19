//! Snapshot persistence
//!
//! Each snapshot is one JSON file named after the snapshot. A separate index
//! file records every known snapshot and which one, if any, is active.
//!
//! ```text
//! saved_files/
//! ├── NAME_LIST.json     [{"house": "off"}, {"zoo": "on"}]
//! ├── house.json         [[classes...], [relationships...]]
//! └── zoo.json
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::class::ClassEntity;
use crate::config::{OutputFormat, StorageConfig};
use crate::error::{ModelError, Result};
use crate::relationship::RelationshipEntity;
use crate::validator::NameValidator;

/// Default index file name
pub const INDEX_FILE_NAME: &str = "NAME_LIST.json";

/// The full persisted model: classes with their attributes, then relationships
///
/// Serialized as a two-element array `[classes, relationships]`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "SnapshotDocument", into = "SnapshotDocument")]
pub struct ModelState {
    pub classes: Vec<ClassEntity>,
    pub relationships: Vec<RelationshipEntity>,
}

impl ModelState {
    pub fn new(classes: Vec<ClassEntity>, relationships: Vec<RelationshipEntity>) -> Self {
        Self {
            classes,
            relationships,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty() && self.relationships.is_empty()
    }
}

type SnapshotDocument = (Vec<ClassEntity>, Vec<RelationshipEntity>);

impl From<SnapshotDocument> for ModelState {
    fn from((classes, relationships): SnapshotDocument) -> Self {
        ModelState::new(classes, relationships)
    }
}

impl From<ModelState> for SnapshotDocument {
    fn from(state: ModelState) -> Self {
        (state.classes, state.relationships)
    }
}

/// Whether a snapshot is the active one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SnapshotStatus {
    On,
    Off,
}

/// One index record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    pub name: String,
    pub status: SnapshotStatus,
}

type IndexDocument = Vec<BTreeMap<String, SnapshotStatus>>;

/// Ordered record of known snapshots; at most one entry is `On`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "IndexDocument", into = "IndexDocument")]
pub struct SnapshotIndex {
    entries: Vec<IndexEntry>,
}

impl TryFrom<IndexDocument> for SnapshotIndex {
    type Error = String;

    fn try_from(doc: IndexDocument) -> std::result::Result<Self, Self::Error> {
        let mut index = SnapshotIndex::default();
        for record in doc {
            if record.len() != 1 {
                return Err(format!(
                    "expected one name per entry, found {}",
                    record.len()
                ));
            }
            for (name, status) in record {
                let result = NameValidator::validate(&name);
                if !result.is_valid() {
                    return Err(format!("invalid snapshot name '{}': {}", name, result));
                }
                if index.contains(&name) || index.conflicting(&name).is_some() {
                    return Err(format!("duplicate entry '{}'", name));
                }
                if status == SnapshotStatus::On && index.active().is_some() {
                    return Err("more than one active snapshot".to_string());
                }
                index.entries.push(IndexEntry { name, status });
            }
        }
        Ok(index)
    }
}

impl From<SnapshotIndex> for IndexDocument {
    fn from(index: SnapshotIndex) -> Self {
        index
            .entries
            .into_iter()
            .map(|e| BTreeMap::from([(e.name, e.status)]))
            .collect()
    }
}

impl SnapshotIndex {
    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|e| e.name == name)
    }

    /// An entry that differs from `name` only by letter case
    pub fn conflicting(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|e| e.name != name && e.name.eq_ignore_ascii_case(name))
            .map(|e| e.name.as_str())
    }

    pub fn status(&self, name: &str) -> Option<SnapshotStatus> {
        self.entries.iter().find(|e| e.name == name).map(|e| e.status)
    }

    /// Name of the active snapshot, if any
    pub fn active(&self) -> Option<&str> {
        self.entries
            .iter()
            .find(|e| e.status == SnapshotStatus::On)
            .map(|e| e.name.as_str())
    }

    /// Register a name as inactive; returns false if it was already present
    fn insert(&mut self, name: &str) -> bool {
        if self.contains(name) {
            return false;
        }
        self.entries.push(IndexEntry {
            name: name.to_string(),
            status: SnapshotStatus::Off,
        });
        true
    }

    fn remove(&mut self, name: &str) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.name != name);
        before != self.entries.len()
    }

    /// Turn every entry off, then turn `name` on
    fn set_active(&mut self, name: &str) {
        for entry in &mut self.entries {
            entry.status = if entry.name == name {
                SnapshotStatus::On
            } else {
                SnapshotStatus::Off
            };
        }
    }

    fn deactivate_all(&mut self) {
        for entry in &mut self.entries {
            entry.status = SnapshotStatus::Off;
        }
    }
}

/// Named on-disk snapshots plus the index that tracks them
pub struct SnapshotStore {
    dir: PathBuf,
    index_file: String,
    output_format: OutputFormat,
    atomic_writes: bool,
    index: SnapshotIndex,
}

impl SnapshotStore {
    /// Open a store rooted at `dir`, creating the directory if needed
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        Self::open_with(dir, INDEX_FILE_NAME, OutputFormat::Pretty, true)
    }

    /// Open a store using storage settings from configuration
    pub fn from_config(config: &StorageConfig) -> Result<Self> {
        Self::open_with(
            &config.dir,
            &config.index_file,
            config.output_format,
            config.atomic_writes,
        )
    }

    fn open_with(
        dir: impl AsRef<Path>,
        index_file: &str,
        output_format: OutputFormat,
        atomic_writes: bool,
    ) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;

        let mut store = Self {
            dir,
            index_file: index_file.to_string(),
            output_format,
            atomic_writes,
            index: SnapshotIndex::default(),
        };
        store.index = store.read_index()?;
        debug!(dir = %store.dir.display(), snapshots = store.index.entries.len(), "opened snapshot store");
        Ok(store)
    }

    /// Get the root directory of the store
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn index(&self) -> &SnapshotIndex {
        &self.index
    }

    /// Known snapshots with their status, in registration order
    pub fn list_snapshots(&self) -> impl Iterator<Item = (&str, SnapshotStatus)> + '_ {
        self.index
            .entries
            .iter()
            .map(|e| (e.name.as_str(), e.status))
    }

    /// Name of the active snapshot, if any
    pub fn active(&self) -> Option<&str> {
        self.index.active()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains(name)
    }

    /// Write `state` under `name`, registering the name if it is new
    ///
    /// A name that matches a registered snapshot only up to letter case is
    /// rejected, since both would map to one file on case-insensitive
    /// filesystems.
    pub fn save_snapshot(&mut self, name: &str, state: &ModelState) -> Result<()> {
        self.check_name(name)?;
        if let Some(existing) = self.index.conflicting(name) {
            return Err(ModelError::SnapshotAlreadyExists {
                name: existing.to_string(),
            });
        }
        let path = self.snapshot_path(name);
        self.write_json(&path, state)?;

        if !self.index.contains(name) {
            self.update_index(|index| {
                index.insert(name);
            })?;
        }
        info!(snapshot = %name, classes = state.classes.len(), relationships = state.relationships.len(), "saved snapshot");
        Ok(())
    }

    /// Read a registered snapshot
    pub fn load_snapshot(&self, name: &str) -> Result<ModelState> {
        if !self.index.contains(name) {
            return Err(ModelError::SnapshotNotFound {
                name: name.to_string(),
            });
        }
        let content = match fs::read_to_string(self.snapshot_path(name)) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(ModelError::SnapshotNotFound {
                    name: name.to_string(),
                })
            }
            Err(e) => return Err(e.into()),
        };
        let state: ModelState =
            serde_json::from_str(&content).map_err(|e| ModelError::CorruptSnapshot {
                name: name.to_string(),
                reason: e.to_string(),
            })?;
        info!(snapshot = %name, "loaded snapshot");
        Ok(state)
    }

    /// Remove a snapshot's file and its index entry
    pub fn delete_snapshot(&mut self, name: &str) -> Result<()> {
        if !self.index.contains(name) {
            return Err(ModelError::SnapshotNotFound {
                name: name.to_string(),
            });
        }
        match fs::remove_file(self.snapshot_path(name)) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {
                warn!(snapshot = %name, "snapshot file already missing, removing index entry");
            }
            Err(e) => return Err(e.into()),
        }
        self.update_index(|index| {
            index.remove(name);
        })?;
        info!(snapshot = %name, "deleted snapshot");
        Ok(())
    }

    /// Make `name` the only active snapshot
    pub fn set_active(&mut self, name: &str) -> Result<()> {
        if !self.index.contains(name) {
            return Err(ModelError::SnapshotNotFound {
                name: name.to_string(),
            });
        }
        self.update_index(|index| index.set_active(name))?;
        debug!(snapshot = %name, "activated snapshot");
        Ok(())
    }

    /// Mark every snapshot inactive
    pub fn deactivate_all(&mut self) -> Result<()> {
        if self.index.active().is_none() {
            return Ok(());
        }
        self.update_index(SnapshotIndex::deactivate_all)?;
        debug!("deactivated all snapshots");
        Ok(())
    }

    /// Blank the active snapshot's file to an empty model, keeping its entry
    pub fn clear_active_snapshot_contents(&mut self, name: &str) -> Result<()> {
        match self.index.status(name) {
            None => {
                return Err(ModelError::SnapshotNotFound {
                    name: name.to_string(),
                })
            }
            Some(SnapshotStatus::Off) => {
                return Err(ModelError::SnapshotNotActive {
                    name: name.to_string(),
                })
            }
            Some(SnapshotStatus::On) => {}
        }
        let path = self.snapshot_path(name);
        self.write_json(&path, &ModelState::default())?;
        info!(snapshot = %name, "cleared snapshot contents");
        Ok(())
    }

    fn check_name(&self, name: &str) -> Result<()> {
        let result = NameValidator::validate(name);
        if !result.is_valid() {
            return Err(ModelError::invalid_name(name, result));
        }
        let index_stem = Path::new(&self.index_file)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(self.index_file.as_str());
        if name.eq_ignore_ascii_case(index_stem) {
            return Err(ModelError::ReservedName {
                name: name.to_string(),
            });
        }
        Ok(())
    }

    fn snapshot_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}.json", name))
    }

    fn index_path(&self) -> PathBuf {
        self.dir.join(&self.index_file)
    }

    fn read_index(&self) -> Result<SnapshotIndex> {
        let content = match fs::read_to_string(self.index_path()) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(SnapshotIndex::default()),
            Err(e) => return Err(e.into()),
        };
        if content.trim().is_empty() {
            return Ok(SnapshotIndex::default());
        }
        serde_json::from_str(&content).map_err(|e| ModelError::CorruptIndex {
            reason: e.to_string(),
        })
    }

    /// Apply a change to a copy of the index, persist it, then adopt it
    fn update_index(&mut self, change: impl FnOnce(&mut SnapshotIndex)) -> Result<()> {
        let mut next = self.index.clone();
        change(&mut next);
        self.write_json(&self.index_path(), &next)?;
        self.index = next;
        Ok(())
    }

    fn write_json<T: Serialize>(&self, path: &Path, value: &T) -> Result<()> {
        let content = match self.output_format {
            OutputFormat::Pretty => serde_json::to_string_pretty(value)?,
            OutputFormat::Compact => serde_json::to_string(value)?,
        };

        if !self.atomic_writes {
            fs::write(path, &content)?;
            return Ok(());
        }

        let mut tmp = NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(content.as_bytes())?;
        tmp.as_file().sync_all()?;
        tmp.persist(path).map_err(|e| e.error)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sample_state() -> ModelState {
        serde_json::from_value(serde_json::json!([
            [
                {"class_name": "person", "attr_list": [{"attr_name": "age"}]},
                {"class_name": "cat", "attr_list": []}
            ],
            [
                {"source": "person", "dest": "cat", "relation": "pet"}
            ]
        ]))
        .unwrap()
    }

    #[test]
    fn test_open_empty_store() {
        let dir = tempdir().unwrap();
        let store = SnapshotStore::open(dir.path()).unwrap();
        assert_eq!(store.list_snapshots().count(), 0);
        assert_eq!(store.active(), None);
    }

    #[test]
    fn test_empty_index_file_reads_as_empty() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(INDEX_FILE_NAME), "").unwrap();
        let store = SnapshotStore::open(dir.path()).unwrap();
        assert!(store.index().entries().is_empty());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempdir().unwrap();
        let mut store = SnapshotStore::open(dir.path()).unwrap();
        let state = sample_state();

        store.save_snapshot("zoo", &state).unwrap();
        assert!(dir.path().join("zoo.json").exists());
        assert_eq!(store.index().status("zoo"), Some(SnapshotStatus::Off));
        assert_eq!(store.load_snapshot("zoo").unwrap(), state);

        // overwrite keeps a single index entry
        store.save_snapshot("zoo", &ModelState::default()).unwrap();
        assert_eq!(store.list_snapshots().count(), 1);
        assert!(store.load_snapshot("zoo").unwrap().is_empty());
    }

    #[test]
    fn test_file_layout() {
        let dir = tempdir().unwrap();
        let mut store = SnapshotStore::open(dir.path()).unwrap();
        store.save_snapshot("zoo", &sample_state()).unwrap();
        store.set_active("zoo").unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(dir.path().join("zoo.json")).unwrap()).unwrap();
        assert_eq!(raw[0][0]["class_name"], "person");
        assert_eq!(raw[0][0]["attr_list"][0]["attr_name"], "age");
        assert_eq!(raw[1][0]["dest"], "cat");
        assert_eq!(raw[1][0]["relation"], "pet");

        let index: serde_json::Value = serde_json::from_str(
            &fs::read_to_string(dir.path().join(INDEX_FILE_NAME)).unwrap(),
        )
        .unwrap();
        assert_eq!(index, serde_json::json!([{"zoo": "on"}]));
    }

    #[test]
    fn test_index_survives_reopen() {
        let dir = tempdir().unwrap();
        {
            let mut store = SnapshotStore::open(dir.path()).unwrap();
            store.save_snapshot("alpha", &sample_state()).unwrap();
            store.save_snapshot("beta", &sample_state()).unwrap();
            store.set_active("beta").unwrap();
        }
        let store = SnapshotStore::open(dir.path()).unwrap();
        let listed: Vec<_> = store.list_snapshots().collect();
        assert_eq!(
            listed,
            vec![("alpha", SnapshotStatus::Off), ("beta", SnapshotStatus::On)]
        );
    }

    #[test]
    fn test_single_active() {
        let dir = tempdir().unwrap();
        let mut store = SnapshotStore::open(dir.path()).unwrap();
        store.save_snapshot("foo", &ModelState::default()).unwrap();
        store.save_snapshot("bar", &ModelState::default()).unwrap();

        store.set_active("foo").unwrap();
        store.set_active("bar").unwrap();
        let on: Vec<_> = store
            .list_snapshots()
            .filter(|(_, s)| *s == SnapshotStatus::On)
            .map(|(n, _)| n)
            .collect();
        assert_eq!(on, vec!["bar"]);

        assert!(matches!(
            store.set_active("baz"),
            Err(ModelError::SnapshotNotFound { .. })
        ));
        assert_eq!(store.active(), Some("bar"));

        store.deactivate_all().unwrap();
        assert_eq!(store.active(), None);
    }

    #[test]
    fn test_load_failures() {
        let dir = tempdir().unwrap();
        let mut store = SnapshotStore::open(dir.path()).unwrap();
        assert!(matches!(
            store.load_snapshot("ghost"),
            Err(ModelError::SnapshotNotFound { .. })
        ));

        store.save_snapshot("broken", &sample_state()).unwrap();
        fs::write(dir.path().join("broken.json"), r#"{"classes": []}"#).unwrap();
        assert!(matches!(
            store.load_snapshot("broken"),
            Err(ModelError::CorruptSnapshot { .. })
        ));

        fs::remove_file(dir.path().join("broken.json")).unwrap();
        assert!(matches!(
            store.load_snapshot("broken"),
            Err(ModelError::SnapshotNotFound { .. })
        ));
    }

    #[test]
    fn test_unregistered_file_is_not_loadable() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("stray.json"), "[[], []]").unwrap();
        let store = SnapshotStore::open(dir.path()).unwrap();
        assert!(matches!(
            store.load_snapshot("stray"),
            Err(ModelError::SnapshotNotFound { .. })
        ));
    }

    #[test]
    fn test_delete() {
        let dir = tempdir().unwrap();
        let mut store = SnapshotStore::open(dir.path()).unwrap();
        store.save_snapshot("zoo", &sample_state()).unwrap();
        store.delete_snapshot("zoo").unwrap();
        assert!(!dir.path().join("zoo.json").exists());
        assert!(!store.contains("zoo"));
        assert!(matches!(
            store.delete_snapshot("zoo"),
            Err(ModelError::SnapshotNotFound { .. })
        ));
    }

    #[test]
    fn test_clear_active_contents() {
        let dir = tempdir().unwrap();
        let mut store = SnapshotStore::open(dir.path()).unwrap();
        store.save_snapshot("zoo", &sample_state()).unwrap();
        assert!(matches!(
            store.clear_active_snapshot_contents("zoo"),
            Err(ModelError::SnapshotNotActive { .. })
        ));

        store.set_active("zoo").unwrap();
        store.clear_active_snapshot_contents("zoo").unwrap();
        assert!(store.load_snapshot("zoo").unwrap().is_empty());
        assert_eq!(store.active(), Some("zoo"));
    }

    #[test]
    fn test_snapshot_names() {
        let dir = tempdir().unwrap();
        let mut store = SnapshotStore::open(dir.path()).unwrap();
        let state = ModelState::default();
        assert!(matches!(
            store.save_snapshot("../escape", &state),
            Err(ModelError::InvalidName { .. })
        ));
        assert!(matches!(
            store.save_snapshot("NAME_LIST", &state),
            Err(ModelError::InvalidName { .. })
        ));

        let config = StorageConfig {
            dir: dir.path().join("other"),
            index_file: "names.json".to_string(),
            ..StorageConfig::default()
        };
        let mut store = SnapshotStore::from_config(&config).unwrap();
        assert!(matches!(
            store.save_snapshot("Names", &state),
            Err(ModelError::ReservedName { .. })
        ));
    }

    #[test]
    fn test_corrupt_index() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join(INDEX_FILE_NAME),
            r#"[{"a": "on"}, {"b": "on"}]"#,
        )
        .unwrap();
        assert!(matches!(
            SnapshotStore::open(dir.path()),
            Err(ModelError::CorruptIndex { .. })
        ));

        fs::write(dir.path().join(INDEX_FILE_NAME), r#"[{"a": "maybe"}]"#).unwrap();
        assert!(matches!(
            SnapshotStore::open(dir.path()),
            Err(ModelError::CorruptIndex { .. })
        ));
    }

    #[test]
    fn test_index_names_are_validated() {
        let root = tempdir().unwrap();
        let store_dir = root.path().join("store");
        fs::create_dir_all(&store_dir).unwrap();
        let victim = root.path().join("victim.json");
        fs::write(&victim, "[[], []]").unwrap();

        fs::write(store_dir.join(INDEX_FILE_NAME), r#"[{"../victim": "off"}]"#).unwrap();
        assert!(matches!(
            SnapshotStore::open(&store_dir),
            Err(ModelError::CorruptIndex { .. })
        ));
        assert!(victim.exists());

        fs::write(store_dir.join(INDEX_FILE_NAME), r#"[{"zoo": "off"}, {"Zoo": "on"}]"#).unwrap();
        assert!(matches!(
            SnapshotStore::open(&store_dir),
            Err(ModelError::CorruptIndex { .. })
        ));
    }

    #[test]
    fn test_names_differing_only_in_case_conflict() {
        let dir = tempdir().unwrap();
        let mut store = SnapshotStore::open(dir.path()).unwrap();
        store.save_snapshot("zoo", &sample_state()).unwrap();

        match store.save_snapshot("Zoo", &ModelState::default()) {
            Err(ModelError::SnapshotAlreadyExists { name }) => assert_eq!(name, "zoo"),
            other => panic!("expected SnapshotAlreadyExists, got {:?}", other),
        }
        assert_eq!(store.list_snapshots().count(), 1);
        assert_eq!(store.load_snapshot("zoo").unwrap(), sample_state());
    }

    #[test]
    fn test_compact_non_atomic_writes() {
        let dir = tempdir().unwrap();
        let config = StorageConfig {
            dir: dir.path().to_path_buf(),
            output_format: OutputFormat::Compact,
            atomic_writes: false,
            ..StorageConfig::default()
        };
        let mut store = SnapshotStore::from_config(&config).unwrap();
        store.save_snapshot("zoo", &ModelState::default()).unwrap();
        let raw = fs::read_to_string(dir.path().join("zoo.json")).unwrap();
        assert_eq!(raw, "[[],[]]");
    }
}
