//! Class registry
//!
//! Owns every class in the model together with its ordered attribute list.
//! Class and attribute names are validated and lowercased before storage, so
//! all lookups are case-insensitive.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ModelError, Result};
use crate::relationship::ClassLookup;
use crate::validator::NameValidator;

/// A named field scoped to exactly one class
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeEntity {
    #[serde(rename = "attr_name")]
    name: String,
}

impl AttributeEntity {
    fn new(name: String) -> Self {
        Self { name }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// A class in the model
///
/// The name is the class's identity; renaming replaces the entity with a new
/// one that carries the same attributes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassEntity {
    #[serde(rename = "class_name")]
    name: String,
    #[serde(rename = "attr_list", default)]
    attributes: Vec<AttributeEntity>,
}

impl ClassEntity {
    fn new(name: String) -> Self {
        Self {
            name,
            attributes: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Attributes in insertion order
    pub fn attributes(&self) -> &[AttributeEntity] {
        &self.attributes
    }

    pub fn attribute_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.attributes.iter().map(AttributeEntity::name)
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        self.attribute_position(name).is_some()
    }

    fn attribute_position(&self, name: &str) -> Option<usize> {
        let name = name.to_lowercase();
        self.attributes.iter().position(|a| a.name == name)
    }
}

/// Validate a name and return its stored (lowercase) form
pub(crate) fn normalize(name: &str) -> Result<String> {
    let result = NameValidator::validate(name);
    if !result.is_valid() {
        return Err(ModelError::invalid_name(name, result));
    }
    Ok(name.to_lowercase())
}

/// The set of classes, in insertion order unless explicitly sorted
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassRegistry {
    classes: Vec<ClassEntity>,
}

impl ClassRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// Get a class by name (case-insensitive)
    pub fn get(&self, name: &str) -> Option<&ClassEntity> {
        self.position(name).map(|i| &self.classes[i])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    /// All classes in current iteration order
    pub fn iter(&self) -> impl Iterator<Item = &ClassEntity> + '_ {
        self.classes.iter()
    }

    /// Class names in current iteration order
    ///
    /// The iterator borrows the registry, so calling this again restarts it.
    pub fn class_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.classes.iter().map(ClassEntity::name)
    }

    /// Add an empty class, returning its stored name
    pub fn add_class(&mut self, name: &str) -> Result<String> {
        let name = normalize(name)?;
        if self.contains(&name) {
            return Err(ModelError::AlreadyExists { name });
        }
        self.classes.push(ClassEntity::new(name.clone()));
        debug!(class = %name, "added class");
        Ok(name)
    }

    /// Remove a class and its attributes
    ///
    /// Relationships that mention the class are not touched here.
    pub fn delete_class(&mut self, name: &str) -> Result<ClassEntity> {
        let index = self.position(name).ok_or_else(|| ModelError::NotFound {
            name: name.to_lowercase(),
        })?;
        let removed = self.classes.remove(index);
        debug!(class = %removed.name, "deleted class");
        Ok(removed)
    }

    /// Give a class a new identity, keeping its attributes and position
    pub fn rename_class(&mut self, old_name: &str, new_name: &str) -> Result<String> {
        let new_name = normalize(new_name)?;
        let index = self.position(old_name).ok_or_else(|| ModelError::NotFound {
            name: old_name.to_lowercase(),
        })?;
        if self.contains(&new_name) {
            return Err(ModelError::AlreadyExists { name: new_name });
        }

        let old = &mut self.classes[index];
        let attributes = std::mem::take(&mut old.attributes);
        let previous = std::mem::replace(
            old,
            ClassEntity {
                name: new_name.clone(),
                attributes,
            },
        );
        debug!(from = %previous.name, to = %new_name, "renamed class");
        Ok(new_name)
    }

    /// Append an attribute to a class
    pub fn add_attribute(&mut self, class_name: &str, attr_name: &str) -> Result<String> {
        let class = self.class_mut(class_name)?;
        let attr_name = normalize(attr_name)?;
        if class.has_attribute(&attr_name) {
            return Err(ModelError::AttributeAlreadyExists {
                class: class.name.clone(),
                attribute: attr_name,
            });
        }
        class.attributes.push(AttributeEntity::new(attr_name.clone()));
        debug!(class = %class.name, attribute = %attr_name, "added attribute");
        Ok(attr_name)
    }

    /// Remove an attribute from a class
    pub fn delete_attribute(&mut self, class_name: &str, attr_name: &str) -> Result<()> {
        let class = self.class_mut(class_name)?;
        let attr_name = normalize(attr_name)?;
        let index = class
            .attribute_position(&attr_name)
            .ok_or_else(|| ModelError::AttributeNotFound {
                class: class.name.clone(),
                attribute: attr_name.clone(),
            })?;
        class.attributes.remove(index);
        debug!(class = %class.name, attribute = %attr_name, "deleted attribute");
        Ok(())
    }

    /// Rename an attribute in place, keeping its position
    pub fn rename_attribute(
        &mut self,
        class_name: &str,
        old_attr_name: &str,
        new_attr_name: &str,
    ) -> Result<String> {
        let class = self.class_mut(class_name)?;
        let new_attr_name = normalize(new_attr_name)?;
        let index = class
            .attribute_position(old_attr_name)
            .ok_or_else(|| ModelError::AttributeNotFound {
                class: class.name.clone(),
                attribute: old_attr_name.to_lowercase(),
            })?;
        if class.has_attribute(&new_attr_name) {
            return Err(ModelError::AttributeAlreadyExists {
                class: class.name.clone(),
                attribute: new_attr_name,
            });
        }
        class.attributes[index] = AttributeEntity::new(new_attr_name.clone());
        debug!(class = %class.name, attribute = %new_attr_name, "renamed attribute");
        Ok(new_attr_name)
    }

    /// Reorder classes by name; later iteration follows the sorted order
    pub fn sort(&mut self) {
        self.classes.sort_by(|a, b| a.name.cmp(&b.name));
    }

    pub fn clear(&mut self) {
        self.classes.clear();
    }

    fn position(&self, name: &str) -> Option<usize> {
        let name = name.to_lowercase();
        self.classes.iter().position(|c| c.name == name)
    }

    fn class_mut(&mut self, name: &str) -> Result<&mut ClassEntity> {
        match self.position(name) {
            Some(index) => Ok(&mut self.classes[index]),
            None => Err(ModelError::ClassNotFound {
                name: name.to_lowercase(),
            }),
        }
    }
}

impl ClassLookup for ClassRegistry {
    fn contains_class(&self, name: &str) -> bool {
        self.contains(name)
    }
}
