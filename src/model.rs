//! Model facade
//!
//! [`ModelFacade`] is the single owner of the class and relationship
//! registries and of the snapshot store. Everything outside the crate reads and
//! mutates the model through it, which keeps cross-registry rules in one place:
//! deleting or renaming a class also updates the relationships that mention it,
//! and loading a snapshot replaces the whole model at once.

use tracing::{debug, info};

use crate::class::{ClassEntity, ClassRegistry};
use crate::error::{ModelError, Result};
use crate::relationship::{RelationshipEntity, RelationshipRegistry};
use crate::snapshot::{ModelState, SnapshotStatus, SnapshotStore};

/// Caller-supplied confirmation for destructive operations
pub trait Confirm {
    /// Return true to go ahead with the action described by `prompt`
    fn confirm(&self, prompt: &str) -> bool;
}

impl<F> Confirm for F
where
    F: Fn(&str) -> bool,
{
    fn confirm(&self, prompt: &str) -> bool {
        self(prompt)
    }
}

/// A class together with the relationships that touch it
#[derive(Debug)]
pub struct ClassDetail<'a> {
    pub class: &'a ClassEntity,
    /// Relationships whose source is this class
    pub outgoing: Vec<&'a RelationshipEntity>,
    /// Relationships whose destination is this class
    pub incoming: Vec<&'a RelationshipEntity>,
}

/// The one authoritative model plus its persistence
pub struct ModelFacade {
    classes: ClassRegistry,
    relationships: RelationshipRegistry,
    store: SnapshotStore,
    confirm: Option<Box<dyn Confirm>>,
}

impl ModelFacade {
    /// Start with an empty model backed by `store`
    pub fn new(store: SnapshotStore) -> Self {
        Self {
            classes: ClassRegistry::new(),
            relationships: RelationshipRegistry::new(),
            store,
            confirm: None,
        }
    }

    /// Ask `hook` before deleting classes or snapshots and before clearing
    pub fn with_confirmation(mut self, hook: impl Confirm + 'static) -> Self {
        self.confirm = Some(Box::new(hook));
        self
    }

    pub fn classes(&self) -> &ClassRegistry {
        &self.classes
    }

    pub fn relationships(&self) -> &RelationshipRegistry {
        &self.relationships
    }

    pub fn store(&self) -> &SnapshotStore {
        &self.store
    }

    pub fn class_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.classes.class_names()
    }

    pub fn relationships_from<'a>(
        &'a self,
        class_name: &str,
    ) -> impl Iterator<Item = &'a RelationshipEntity> + 'a {
        self.relationships.relationships_from(class_name)
    }

    /// A class with its attributes and the relationships on either side
    pub fn class_detail(&self, name: &str) -> Result<ClassDetail<'_>> {
        let class = self
            .classes
            .get(name)
            .ok_or_else(|| ModelError::ClassNotFound {
                name: name.to_lowercase(),
            })?;
        Ok(ClassDetail {
            class,
            outgoing: self.relationships.relationships_from(class.name()).collect(),
            incoming: self.relationships.relationships_to(class.name()).collect(),
        })
    }

    // ------------------------------------------------------------------
    // Classes and attributes
    // ------------------------------------------------------------------

    pub fn add_class(&mut self, name: &str) -> Result<String> {
        self.classes.add_class(name)
    }

    /// Delete a class and every relationship that references it
    pub fn delete_class(&mut self, name: &str) -> Result<()> {
        let name = name.to_lowercase();
        if !self.classes.contains(&name) {
            return Err(ModelError::NotFound { name });
        }
        self.confirm(&format!("Delete class '{}' and its relationships?", name))?;

        self.classes.delete_class(&name)?;
        let dropped = self.relationships.remove_involving(&name);
        debug!(class = %name, relationships = dropped, "cascaded class deletion");
        Ok(())
    }

    /// Rename a class and rewrite relationship endpoints to the new name
    pub fn rename_class(&mut self, old_name: &str, new_name: &str) -> Result<String> {
        let new_name = self.classes.rename_class(old_name, new_name)?;
        let rewritten = self
            .relationships
            .rename_endpoint(&old_name.to_lowercase(), &new_name);
        debug!(to = %new_name, relationships = rewritten, "cascaded class rename");
        Ok(new_name)
    }

    pub fn add_attribute(&mut self, class_name: &str, attr_name: &str) -> Result<String> {
        self.classes.add_attribute(class_name, attr_name)
    }

    pub fn delete_attribute(&mut self, class_name: &str, attr_name: &str) -> Result<()> {
        self.classes.delete_attribute(class_name, attr_name)
    }

    pub fn rename_attribute(
        &mut self,
        class_name: &str,
        old_attr_name: &str,
        new_attr_name: &str,
    ) -> Result<String> {
        self.classes
            .rename_attribute(class_name, old_attr_name, new_attr_name)
    }

    /// Reorder classes alphabetically
    pub fn sort_classes(&mut self) {
        self.classes.sort();
    }

    // ------------------------------------------------------------------
    // Relationships
    // ------------------------------------------------------------------

    pub fn add_relationship(&mut self, source: &str, destination: &str, kind: &str) -> Result<()> {
        self.relationships
            .add_relationship(&self.classes, source, destination, kind)
    }

    pub fn remove_relationship(&mut self, source: &str, destination: &str) -> Result<()> {
        self.relationships
            .remove_relationship(&self.classes, source, destination)
            .map(|_| ())
    }

    pub fn change_relationship_kind(
        &mut self,
        source: &str,
        destination: &str,
        kind: &str,
    ) -> Result<()> {
        self.relationships
            .change_kind(&self.classes, source, destination, kind)
    }

    // ------------------------------------------------------------------
    // Snapshots
    // ------------------------------------------------------------------

    /// A consistent copy of the whole model
    pub fn state(&self) -> ModelState {
        ModelState::new(
            self.classes.iter().cloned().collect(),
            self.relationships.iter().cloned().collect(),
        )
    }

    /// Persist the current model under `name`
    pub fn save(&mut self, name: &str) -> Result<()> {
        let state = self.state();
        self.store.save_snapshot(name, &state)
    }

    /// Replace the in-memory model with snapshot `name` and make it active
    ///
    /// The current model is untouched unless the snapshot reads and rebuilds
    /// cleanly.
    pub fn load(&mut self, name: &str) -> Result<()> {
        let state = self.store.load_snapshot(name)?;
        let (classes, relationships) =
            build_registries(&state).map_err(|e| ModelError::CorruptSnapshot {
                name: name.to_string(),
                reason: e.to_string(),
            })?;
        self.store.set_active(name)?;

        self.classes = classes;
        self.relationships = relationships;
        info!(snapshot = %name, classes = self.classes.len(), relationships = self.relationships.len(), "installed snapshot");
        Ok(())
    }

    /// Load whichever snapshot the index marks active, if any
    pub fn load_active(&mut self) -> Result<Option<String>> {
        let Some(name) = self.store.active().map(str::to_string) else {
            return Ok(None);
        };
        self.load(&name)?;
        Ok(Some(name))
    }

    /// Register a new, empty snapshot and make it the active one
    ///
    /// The name is checked and the file written before the index changes, so a
    /// rejected name leaves the current active snapshot in place.
    pub fn create_snapshot(&mut self, name: &str) -> Result<()> {
        if self.store.contains(name) {
            return Err(ModelError::SnapshotAlreadyExists {
                name: name.to_string(),
            });
        }
        self.store.save_snapshot(name, &ModelState::default())?;
        self.store.set_active(name)?;
        self.reset();
        info!(snapshot = %name, "created snapshot");
        Ok(())
    }

    pub fn delete_snapshot(&mut self, name: &str) -> Result<()> {
        if !self.store.contains(name) {
            return Err(ModelError::SnapshotNotFound {
                name: name.to_string(),
            });
        }
        self.confirm(&format!("Delete snapshot '{}'?", name))?;
        self.store.delete_snapshot(name)
    }

    pub fn set_active(&mut self, name: &str) -> Result<()> {
        self.store.set_active(name)
    }

    pub fn active_snapshot(&self) -> Option<&str> {
        self.store.active()
    }

    pub fn list_snapshots(&self) -> impl Iterator<Item = (&str, SnapshotStatus)> + '_ {
        self.store.list_snapshots()
    }

    /// Empty the model and blank the active snapshot's file
    pub fn clear_active(&mut self) -> Result<String> {
        let name = self
            .store
            .active()
            .ok_or(ModelError::NoActiveSnapshot)?
            .to_string();
        self.confirm(&format!("Clear all data in snapshot '{}'?", name))?;

        self.store.clear_active_snapshot_contents(&name)?;
        self.reset();
        Ok(name)
    }

    /// Return to a blank model with no active snapshot
    pub fn end_session(&mut self) -> Result<()> {
        self.store.deactivate_all()?;
        self.reset();
        info!("ended session");
        Ok(())
    }

    fn reset(&mut self) {
        self.classes.clear();
        self.relationships.clear();
    }

    fn confirm(&self, prompt: &str) -> Result<()> {
        match &self.confirm {
            Some(hook) if !hook.confirm(prompt) => Err(ModelError::Cancelled {
                action: prompt.to_string(),
            }),
            _ => Ok(()),
        }
    }
}

/// Rebuild registries through their public operations so every invariant is
/// re-checked on data read from disk
fn build_registries(state: &ModelState) -> Result<(ClassRegistry, RelationshipRegistry)> {
    let mut classes = ClassRegistry::new();
    for class in &state.classes {
        let name = classes.add_class(class.name())?;
        for attribute in class.attribute_names() {
            classes.add_attribute(&name, attribute)?;
        }
    }

    let mut relationships = RelationshipRegistry::new();
    for relationship in &state.relationships {
        relationships.add_relationship(
            &classes,
            relationship.source(),
            relationship.destination(),
            relationship.kind(),
        )?;
    }
    Ok((classes, relationships))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;
    use tempfile::{tempdir, TempDir};

    fn facade() -> (TempDir, ModelFacade) {
        let dir = tempdir().unwrap();
        let store = SnapshotStore::open(dir.path()).unwrap();
        (dir, ModelFacade::new(store))
    }

    fn zoo(model: &mut ModelFacade) {
        model.add_class("person").unwrap();
        model.add_class("cat").unwrap();
        model.add_class("dog").unwrap();
        model.add_attribute("person", "name").unwrap();
        model.add_relationship("person", "cat", "pet").unwrap();
        model.add_relationship("dog", "person", "guard").unwrap();
        model.add_relationship("dog", "cat", "chase").unwrap();
    }

    #[test]
    fn test_delete_class_cascades() {
        let (_dir, mut model) = facade();
        zoo(&mut model);
        model.delete_class("Cat").unwrap();
        assert_eq!(model.relationships().len(), 1);
        assert!(model.relationships().get("dog", "person").is_some());
        assert!(matches!(
            model.delete_class("cat"),
            Err(ModelError::NotFound { .. })
        ));
    }

    #[test]
    fn test_rename_class_cascades() {
        let (_dir, mut model) = facade();
        zoo(&mut model);
        model.rename_class("dog", "hound").unwrap();
        assert!(model.relationships().get("hound", "person").is_some());
        assert!(model.relationships().get("hound", "cat").is_some());
        assert!(model
            .relationships()
            .iter()
            .all(|r| r.source() != "dog" && r.destination() != "dog"));
    }

    #[test]
    fn test_class_detail() {
        let (_dir, mut model) = facade();
        zoo(&mut model);
        let detail = model.class_detail("person").unwrap();
        assert_eq!(detail.class.attribute_names().collect::<Vec<_>>(), vec!["name"]);
        assert_eq!(detail.outgoing.len(), 1);
        assert_eq!(detail.incoming.len(), 1);
        assert!(matches!(
            model.class_detail("ghost"),
            Err(ModelError::ClassNotFound { .. })
        ));
    }

    #[test]
    fn test_load_replaces_state() {
        let (_dir, mut model) = facade();
        zoo(&mut model);
        model.save("zoo").unwrap();

        model.delete_class("person").unwrap();
        model.add_class("fish").unwrap();
        model.load("zoo").unwrap();

        assert!(!model.classes().contains("fish"));
        assert_eq!(model.relationships().len(), 3);
        assert_eq!(model.active_snapshot(), Some("zoo"));
    }

    #[test]
    fn test_failed_load_keeps_state() {
        let (dir, mut model) = facade();
        model.add_class("house").unwrap();
        model.save("broken").unwrap();
        std::fs::write(
            dir.path().join("broken.json"),
            r#"[[{"class_name": "a", "attr_list": []}], []]"#,
        )
        .unwrap();

        model.add_class("garage").unwrap();
        assert!(matches!(
            model.load("broken"),
            Err(ModelError::CorruptSnapshot { .. })
        ));
        assert_eq!(model.class_names().collect::<Vec<_>>(), vec!["house", "garage"]);
        assert_eq!(model.active_snapshot(), None);
    }

    #[test]
    fn test_dangling_relationship_is_corrupt() {
        let (dir, mut model) = facade();
        model.save("bad").unwrap();
        std::fs::write(
            dir.path().join("bad.json"),
            r#"[[{"class_name": "cat", "attr_list": []}], [{"source": "cat", "dest": "dog", "relation": "chase"}]]"#,
        )
        .unwrap();
        assert!(matches!(
            model.load("bad"),
            Err(ModelError::CorruptSnapshot { .. })
        ));
    }

    #[test]
    fn test_confirmation_hook() {
        let dir = tempdir().unwrap();
        let store = SnapshotStore::open(dir.path()).unwrap();
        let asked = Rc::new(Cell::new(0));
        let counter = Rc::clone(&asked);
        let mut model = ModelFacade::new(store).with_confirmation(move |_: &str| {
            counter.set(counter.get() + 1);
            false
        });

        model.add_class("house").unwrap();
        assert!(matches!(
            model.delete_class("house"),
            Err(ModelError::Cancelled { .. })
        ));
        assert!(model.classes().contains("house"));

        model.save("home").unwrap();
        assert!(matches!(
            model.delete_snapshot("home"),
            Err(ModelError::Cancelled { .. })
        ));
        assert!(model.store().contains("home"));
        assert_eq!(asked.get(), 2);
    }

    #[test]
    fn test_clear_active() {
        let (_dir, mut model) = facade();
        assert!(matches!(
            model.clear_active(),
            Err(ModelError::NoActiveSnapshot)
        ));

        zoo(&mut model);
        model.save("zoo").unwrap();
        model.load("zoo").unwrap();
        assert_eq!(model.clear_active().unwrap(), "zoo");
        assert!(model.classes().is_empty());
        assert_eq!(model.active_snapshot(), Some("zoo"));
        assert!(model.store().load_snapshot("zoo").unwrap().is_empty());
    }

    #[test]
    fn test_create_snapshot() {
        let (_dir, mut model) = facade();
        model.create_snapshot("zoo").unwrap();
        zoo(&mut model);
        model.save("zoo").unwrap();

        assert!(matches!(
            model.create_snapshot("my_model"),
            Err(ModelError::InvalidName { .. })
        ));
        assert!(matches!(
            model.create_snapshot("zoo"),
            Err(ModelError::SnapshotAlreadyExists { .. })
        ));
        assert_eq!(model.active_snapshot(), Some("zoo"));
        assert_eq!(model.classes().len(), 3);

        model.create_snapshot("farm").unwrap();
        assert_eq!(model.active_snapshot(), Some("farm"));
        assert!(model.classes().is_empty());
        assert!(model.store().load_snapshot("farm").unwrap().is_empty());
        assert_eq!(model.store().index().status("zoo"), Some(SnapshotStatus::Off));
    }

    #[test]
    fn test_end_session() {
        let (_dir, mut model) = facade();
        zoo(&mut model);
        model.save("zoo").unwrap();
        model.load("zoo").unwrap();
        model.end_session().unwrap();
        assert!(model.classes().is_empty());
        assert!(model.relationships().is_empty());
        assert_eq!(model.active_snapshot(), None);
        assert!(model.store().contains("zoo"));

        assert_eq!(model.load_active().unwrap(), None);
    }
}
