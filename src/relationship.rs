//! Relationship registry
//!
//! Directed, typed edges between classes. Endpoints are weak references by
//! class name; existence is confirmed through [`ClassLookup`] at mutation time.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::class::normalize;
use crate::error::{ModelError, Result};
use crate::validator::NameValidator;

/// Read-only view used to confirm that relationship endpoints exist
pub trait ClassLookup {
    fn contains_class(&self, name: &str) -> bool;
}

/// A directed edge from `source` to `destination`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationshipEntity {
    source: String,
    #[serde(rename = "dest")]
    destination: String,
    #[serde(rename = "relation")]
    kind: String,
}

impl RelationshipEntity {
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn destination(&self) -> &str {
        &self.destination
    }

    /// Relationship kind, e.g. "aggregation" or "inheritance"
    pub fn kind(&self) -> &str {
        &self.kind
    }

    fn connects(&self, source: &str, destination: &str) -> bool {
        self.source == source && self.destination == destination
    }

    fn involves(&self, class_name: &str) -> bool {
        self.source == class_name || self.destination == class_name
    }
}

/// All relationships in the model, in insertion order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelationshipRegistry {
    relationships: Vec<RelationshipEntity>,
}

impl RelationshipRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.relationships.len()
    }

    pub fn is_empty(&self) -> bool {
        self.relationships.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RelationshipEntity> + '_ {
        self.relationships.iter()
    }

    /// Look up the relationship for an ordered pair
    pub fn get(&self, source: &str, destination: &str) -> Option<&RelationshipEntity> {
        let (source, destination) = (source.to_lowercase(), destination.to_lowercase());
        self.relationships
            .iter()
            .find(|r| r.connects(&source, &destination))
    }

    /// Relationships whose source is `class_name`
    pub fn relationships_from<'a>(
        &'a self,
        class_name: &str,
    ) -> impl Iterator<Item = &'a RelationshipEntity> + 'a {
        let class_name = class_name.to_lowercase();
        self.relationships
            .iter()
            .filter(move |r| r.source == class_name)
    }

    /// Relationships whose destination is `class_name`
    pub fn relationships_to<'a>(
        &'a self,
        class_name: &str,
    ) -> impl Iterator<Item = &'a RelationshipEntity> + 'a {
        let class_name = class_name.to_lowercase();
        self.relationships
            .iter()
            .filter(move |r| r.destination == class_name)
    }

    /// Add a relationship between two existing, distinct classes
    ///
    /// At most one relationship may exist per ordered pair, whatever its kind.
    pub fn add_relationship(
        &mut self,
        classes: &impl ClassLookup,
        source: &str,
        destination: &str,
        kind: &str,
    ) -> Result<()> {
        let source = normalize(source)?;
        let destination = normalize(destination)?;
        check_distinct(&source, &destination)?;
        let kind = validated_kind(kind)?;
        check_endpoints(classes, &source, &destination)?;

        if self.position(&source, &destination).is_some() {
            return Err(ModelError::RelationshipAlreadyExists {
                from: source,
                to: destination,
            });
        }

        debug!(%source, %destination, %kind, "added relationship");
        self.relationships.push(RelationshipEntity {
            source,
            destination,
            kind,
        });
        Ok(())
    }

    /// Remove the relationship for an ordered pair
    ///
    /// An endpoint that is malformed or names no class reports as missing.
    pub fn remove_relationship(
        &mut self,
        classes: &impl ClassLookup,
        source: &str,
        destination: &str,
    ) -> Result<RelationshipEntity> {
        let source = existing_endpoint(classes, source)
            .ok_or_else(|| ModelError::SourceNotFound { name: source.to_lowercase() })?;
        let destination = existing_endpoint(classes, destination).ok_or_else(|| {
            ModelError::DestinationNotFound {
                name: destination.to_lowercase(),
            }
        })?;

        let index = self.position(&source, &destination).ok_or_else(|| {
            ModelError::RelationshipNotFound {
                from: source.clone(),
                to: destination.clone(),
            }
        })?;
        let removed = self.relationships.remove(index);
        debug!(%source, %destination, "removed relationship");
        Ok(removed)
    }

    /// Replace the kind of an existing relationship
    pub fn change_kind(
        &mut self,
        classes: &impl ClassLookup,
        source: &str,
        destination: &str,
        kind: &str,
    ) -> Result<()> {
        let source = normalize(source)?;
        let destination = normalize(destination)?;
        check_distinct(&source, &destination)?;
        let kind = validated_kind(kind)?;
        check_endpoints(classes, &source, &destination)?;

        let index = self.position(&source, &destination).ok_or_else(|| {
            ModelError::RelationshipNotFound {
                from: source.clone(),
                to: destination.clone(),
            }
        })?;
        let relationship = &mut self.relationships[index];
        if relationship.kind == kind {
            return Err(ModelError::KindUnchanged {
                from: source,
                to: destination,
                kind,
            });
        }
        debug!(%source, %destination, from = %relationship.kind, to = %kind, "changed relationship kind");
        relationship.kind = kind;
        Ok(())
    }

    /// Drop every relationship touching `class_name`, returning how many went
    pub(crate) fn remove_involving(&mut self, class_name: &str) -> usize {
        let before = self.relationships.len();
        self.relationships.retain(|r| !r.involves(class_name));
        before - self.relationships.len()
    }

    /// Point every endpoint named `old_name` at `new_name`
    pub(crate) fn rename_endpoint(&mut self, old_name: &str, new_name: &str) -> usize {
        let mut touched = 0;
        for relationship in &mut self.relationships {
            if !relationship.involves(old_name) {
                continue;
            }
            if relationship.source == old_name {
                relationship.source = new_name.to_string();
            }
            if relationship.destination == old_name {
                relationship.destination = new_name.to_string();
            }
            touched += 1;
        }
        touched
    }

    pub fn clear(&mut self) {
        self.relationships.clear();
    }

    fn position(&self, source: &str, destination: &str) -> Option<usize> {
        self.relationships
            .iter()
            .position(|r| r.connects(source, destination))
    }
}

fn validated_kind(kind: &str) -> Result<String> {
    let result = NameValidator::validate(kind);
    if !result.is_valid() {
        return Err(ModelError::invalid_name(kind, result));
    }
    Ok(kind.to_string())
}

fn check_distinct(source: &str, destination: &str) -> Result<()> {
    if source == destination {
        return Err(ModelError::SameEndpoint {
            name: source.to_string(),
        });
    }
    Ok(())
}

fn check_endpoints(classes: &impl ClassLookup, source: &str, destination: &str) -> Result<()> {
    if !classes.contains_class(source) {
        return Err(ModelError::SourceNotFound {
            name: source.to_string(),
        });
    }
    if !classes.contains_class(destination) {
        return Err(ModelError::DestinationNotFound {
            name: destination.to_string(),
        });
    }
    Ok(())
}

fn existing_endpoint(classes: &impl ClassLookup, name: &str) -> Option<String> {
    let name = normalize(name).ok()?;
    classes.contains_class(&name).then_some(name)
}
