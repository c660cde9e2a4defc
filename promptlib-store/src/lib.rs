//! Persistent role and template stores.
//!
//! Each store owns a built-in collection seeded from the packaged defaults
//! and a user collection. Both are persisted as one JSON document per store
//! through a [`StateStorage`] backend.

#![warn(missing_docs, clippy::pedantic)]

pub mod defaults;
pub mod error;
pub mod exchange;
pub mod record;
pub mod roles;
pub mod storage;
pub mod templates;

pub use defaults::{default_roles, default_templates};
pub use error::{StoreError, StoreResult};
pub use exchange::{
    EXPORT_VERSION, ImportCount, ImportReport, LibraryExport, export_library, import_library,
};
pub use record::{RecordRef, UpdateOutcome};
pub use roles::{ROLES_KEY, RoleStore};
pub use storage::{FileStateStorage, MemoryStateStorage, StateStorage};
pub use templates::{TEMPLATES_KEY, TemplateStore};
