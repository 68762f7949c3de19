//! UML Modeler
//!
//! An in-memory UML class model (classes, per-class attributes and typed
//! relationships) with named on-disk snapshots.
//!
//! ## Features
//!
//! - **One Owner**: [`ModelFacade`] holds the only copy of the model and
//!   cascades class deletes and renames into relationships
//! - **Single Name Policy**: every identifier passes [`NameValidator`]
//! - **Referential Integrity**: relationships always join two distinct, existing classes
//! - **Named Snapshots**: full-model JSON files with exactly zero or one active snapshot
//! - **Atomic Writes**: snapshot and index files are replaced, never half-written
//!
//! ## Storage Layout
//!
//! ```text
//! saved_files/
//! ├── NAME_LIST.json   [{"zoo": "on"}, {"house": "off"}]
//! ├── zoo.json         [[{"class_name": ..., "attr_list": [...]}], [{"source": ..., "dest": ..., "relation": ...}]]
//! └── house.json
//! ```

pub mod class;
pub mod config;
pub mod error;
pub mod model;
pub mod relationship;
pub mod snapshot;
pub mod validator;

pub use class::{AttributeEntity, ClassEntity, ClassRegistry};
pub use config::{ModelConfig, OutputFormat};
pub use error::{ErrorCategory, ModelError, Result};
pub use model::{ClassDetail, Confirm, ModelFacade};
pub use relationship::{ClassLookup, RelationshipEntity, RelationshipRegistry};
pub use snapshot::{ModelState, SnapshotIndex, SnapshotStatus, SnapshotStore};
pub use validator::{NameValidator, ValidationResult};
