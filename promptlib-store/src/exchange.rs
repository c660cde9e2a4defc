//! Library import and export documents.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use promptlib_primitives::{Role, RoleId, Template};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::roles::RoleStore;
use crate::templates::TemplateStore;
use crate::StoreResult;

/// Version tag written into export documents.
pub const EXPORT_VERSION: &str = "1.0";

/// Serialized form of a whole library.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LibraryExport {
    /// Every template, built-in and user.
    #[serde(default)]
    pub templates: Vec<Template>,
    /// Every role, built-in and user.
    #[serde(default)]
    pub roles: Vec<Role>,
    /// Document format version.
    #[serde(default = "export_version")]
    pub version: String,
    /// Time the export was produced.
    #[serde(default = "Utc::now")]
    pub export_date: DateTime<Utc>,
}

fn export_version() -> String {
    EXPORT_VERSION.to_owned()
}

impl LibraryExport {
    /// Creates an export stamped with the current time.
    #[must_use]
    pub fn new(roles: Vec<Role>, templates: Vec<Template>) -> Self {
        Self {
            templates,
            roles,
            version: export_version(),
            export_date: Utc::now(),
        }
    }

    /// Parses an export document.
    ///
    /// # Errors
    ///
    /// Returns a serialization error for malformed JSON.
    pub fn from_json(raw: &str) -> StoreResult<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Renders the export as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns a serialization error if encoding fails.
    pub fn to_json_pretty(&self) -> StoreResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Added and skipped counts for one collection.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ImportCount {
    /// Records inserted.
    pub added: usize,
    /// Records skipped because they already existed.
    pub skipped: usize,
}

/// Outcome of importing a [`LibraryExport`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    /// Role counts.
    pub roles: ImportCount,
    /// Template counts.
    pub templates: ImportCount,
    /// Imported templates moved onto an existing role with the same name as
    /// the role they referenced.
    pub remapped: usize,
}

/// Captures both stores into an export document.
pub async fn export_library(roles: &RoleStore, templates: &TemplateStore) -> LibraryExport {
    LibraryExport::new(roles.export().await, templates.export().await)
}

/// Imports roles first, then templates.
///
/// An imported role whose name matches an existing role under a different id
/// is skipped, and templates referencing it are attached to the existing role.
///
/// # Errors
///
/// Propagates storage errors from either store.
pub async fn import_library(
    roles: &RoleStore,
    templates: &TemplateStore,
    export: LibraryExport,
) -> StoreResult<ImportReport> {
    let renames = role_renames(&roles.list_all().await, &export.roles);
    let mut remapped = 0;
    let incoming: Vec<Template> = export
        .templates
        .into_iter()
        .map(|mut template| {
            if let Some(target) = renames.get(&template.role) {
                debug!(
                    template_id = %template.id,
                    from = %template.role,
                    to = %target,
                    "template role remapped"
                );
                template.role = target.clone();
                remapped += 1;
            }
            template
        })
        .collect();

    let report = ImportReport {
        roles: roles.import(export.roles).await?,
        templates: templates.import(incoming).await?,
        remapped,
    };
    info!(
        version = %export.version,
        roles_added = report.roles.added,
        templates_added = report.templates.added,
        remapped,
        "library imported"
    );
    Ok(report)
}

/// Maps incoming role ids that are unknown locally but whose name is taken to
/// the id already holding that name.
fn role_renames(existing: &[Role], incoming: &[Role]) -> HashMap<RoleId, RoleId> {
    incoming
        .iter()
        .filter(|role| existing.iter().all(|r| r.id != role.id))
        .filter_map(|role| {
            let key = role.name_key();
            existing
                .iter()
                .find(|r| r.name_key() == key)
                .map(|r| (role.id.clone(), r.id.clone()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_document() {
        let export = LibraryExport::from_json(r#"{"roles":[{"id":"qa-lead","name":"QA Lead"}]}"#)
            .unwrap();
        assert_eq!(export.version, EXPORT_VERSION);
        assert!(export.templates.is_empty());
        assert_eq!(export.roles[0].name, "QA Lead");
    }

    #[tokio::test]
    async fn templates_follow_same_named_existing_role() {
        let storage: std::sync::Arc<dyn crate::StateStorage> =
            std::sync::Arc::new(crate::MemoryStateStorage::new());
        let roles = RoleStore::open(storage.clone()).await.unwrap();
        let templates = TemplateStore::open(storage).await.unwrap();
        let export: LibraryExport = serde_json::from_value(serde_json::json!({
            "roles": [{ "id": "qa-from-elsewhere", "name": " quality analyst " }],
            "templates": [{
                "id": "smoke-suite",
                "name": "Smoke Suite",
                "role": "qa-from-elsewhere",
                "raceRole": "Act as QA",
                "raceAction": "List smoke tests",
                "raceContext": "A checkout flow",
                "raceExecute": "A checklist"
            }]
        }))
        .unwrap();

        let report = import_library(&roles, &templates, export).await.unwrap();
        assert_eq!(report.roles, ImportCount { added: 0, skipped: 1 });
        assert_eq!(report.templates.added, 1);
        assert_eq!(report.remapped, 1);

        let existing = RoleId::new("quality-analyst").unwrap();
        let stored = templates
            .get(&promptlib_primitives::TemplateId::new("smoke-suite").unwrap())
            .await
            .unwrap();
        assert_eq!(stored.role, existing);
        assert!(roles.get(&stored.role).await.is_some());
    }

    #[test]
    fn serializes_camel_case_keys() {
        let raw = LibraryExport::new(Vec::new(), Vec::new())
            .to_json_pretty()
            .unwrap();
        assert!(raw.contains("\"exportDate\""));
        assert!(raw.contains("\"version\": \"1.0\""));
    }
}
