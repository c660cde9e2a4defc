//! Persistent template store.

use std::sync::Arc;

use chrono::Utc;
use promptlib_compose::{parse_race_components, race_content};
use promptlib_primitives::{RoleId, Template, TemplateDraft, TemplateId};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::defaults::default_templates;
use crate::exchange::ImportCount;
use crate::record::{RecordRef, UpdateOutcome};
use crate::roles::by_name;
use crate::storage::StateStorage;
use crate::{StoreError, StoreResult};

/// Storage key of the template document.
pub const TEMPLATES_KEY: &str = "prompt-library-templates";

const FORK_CREATOR: &str = "user";

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TemplateDocument {
    #[serde(default)]
    templates: Vec<Template>,
    #[serde(default)]
    user_templates: Vec<Template>,
}

impl TemplateDocument {
    fn iter(&self) -> impl Iterator<Item = &Template> {
        self.templates.iter().chain(self.user_templates.iter())
    }

    fn iter_mut(&mut self) -> impl Iterator<Item = &mut Template> {
        self.templates.iter_mut().chain(self.user_templates.iter_mut())
    }

    fn locate(&self, id: &TemplateId) -> Option<RecordRef<usize>> {
        if let Some(idx) = self.templates.iter().position(|t| &t.id == id) {
            return Some(RecordRef::Builtin(idx));
        }
        self.user_templates
            .iter()
            .position(|t| &t.id == id)
            .map(RecordRef::User)
    }
}

fn apply_draft(template: &mut Template, draft: TemplateDraft) {
    template.name = draft.name.trim().to_owned();
    template.description = draft.description;
    template.role = draft.role;
    template.race_role = draft.race_role;
    template.race_action = draft.race_action;
    template.race_context = draft.race_context;
    template.race_execute = draft.race_execute;
    template.race_expectation = None;
    template.best_practices = draft.best_practices;
    template.custom_sections = draft.custom_sections;
    template.show_programming_language = draft.show_programming_language;
    template.show_output_validation = draft.show_output_validation;
    template.content = race_content(template);
    template.updated_at = Utc::now();
}

/// Store owning the built-in and user template collections.
///
/// Editing a built-in template never changes it: the edit lands on a copy in
/// the user collection with a fresh id.
pub struct TemplateStore {
    storage: Arc<dyn StateStorage>,
    state: RwLock<TemplateDocument>,
}

impl TemplateStore {
    /// Loads the template document, seeding the packaged templates when absent.
    ///
    /// Legacy `raceExpectation` values are promoted on load.
    ///
    /// # Errors
    ///
    /// Propagates storage and serialization errors.
    pub async fn open(storage: Arc<dyn StateStorage>) -> StoreResult<Self> {
        let document = match storage.load(TEMPLATES_KEY).await? {
            Some(raw) => {
                let mut document: TemplateDocument = serde_json::from_str(&raw)?;
                for template in document.iter_mut() {
                    template.normalize_legacy();
                }
                document
            }
            None => {
                let document = TemplateDocument {
                    templates: default_templates()?,
                    user_templates: Vec::new(),
                };
                storage
                    .save(TEMPLATES_KEY, &serde_json::to_string(&document)?)
                    .await?;
                info!(count = document.templates.len(), "seeded built-in templates");
                document
            }
        };

        Ok(Self {
            storage,
            state: RwLock::new(document),
        })
    }

    async fn commit(&self, document: &TemplateDocument) -> StoreResult<()> {
        let raw = serde_json::to_string(document)?;
        self.storage.save(TEMPLATES_KEY, &raw).await
    }

    /// Returns every template, built-in and user, sorted by name.
    pub async fn list_all(&self) -> Vec<Template> {
        let mut templates: Vec<Template> = self.state.read().await.iter().cloned().collect();
        templates.sort_by(|a, b| by_name(&a.name, &b.name));
        templates
    }

    /// Returns the template with the given id.
    pub async fn get(&self, id: &TemplateId) -> Option<Template> {
        self.state.read().await.iter().find(|t| &t.id == id).cloned()
    }

    /// Reports which collection holds the template.
    pub async fn locate(&self, id: &TemplateId) -> Option<RecordRef<TemplateId>> {
        self.state.read().await.locate(id).map(|loc| match loc {
            RecordRef::Builtin(_) => RecordRef::Builtin(id.clone()),
            RecordRef::User(_) => RecordRef::User(id.clone()),
        })
    }

    /// Returns the templates owned by a role, sorted by name.
    pub async fn templates_for_role(&self, role: &RoleId) -> Vec<Template> {
        let mut templates: Vec<Template> = self
            .state
            .read()
            .await
            .iter()
            .filter(|t| &t.role == role)
            .cloned()
            .collect();
        templates.sort_by(|a, b| by_name(&a.name, &b.name));
        templates
    }

    /// Adds a user template built from `draft`.
    ///
    /// # Errors
    ///
    /// Fails when required fields are empty or the write fails.
    pub async fn add(&self, draft: TemplateDraft) -> StoreResult<Template> {
        draft.validate()?;
        let mut template = Template::from_draft(TemplateId::generate(), draft);
        template.content = race_content(&template);

        let mut state = self.state.write().await;
        let mut next = state.clone();
        next.user_templates.push(template.clone());
        self.commit(&next).await?;
        *state = next;
        info!(template_id = %template.id, name = %template.name, "template added");
        Ok(template)
    }

    /// Applies `draft` to a template.
    ///
    /// User templates change in place and keep their creator and creation
    /// time. Built-in templates are forked into the user collection under a
    /// new id and left unchanged.
    ///
    /// # Errors
    ///
    /// Fails when the template is unknown, required fields are empty, or the
    /// write fails.
    pub async fn update(&self, id: &TemplateId, draft: TemplateDraft) -> StoreResult<UpdateOutcome> {
        draft.validate()?;
        let mut state = self.state.write().await;
        let location = state
            .locate(id)
            .ok_or_else(|| StoreError::not_found("template", id))?;

        let mut next = state.clone();
        let outcome = match location {
            RecordRef::User(idx) => {
                let slot = &mut next.user_templates[idx];
                apply_draft(slot, draft);
                UpdateOutcome::Updated(slot.clone())
            }
            RecordRef::Builtin(idx) => {
                let mut fork = next.templates[idx].clone();
                apply_draft(&mut fork, draft);
                fork.id = TemplateId::generate();
                fork.created_by = FORK_CREATOR.to_owned();
                fork.created_at = fork.updated_at;
                next.user_templates.push(fork.clone());
                UpdateOutcome::Forked {
                    original: id.clone(),
                    template: fork,
                }
            }
        };

        self.commit(&next).await?;
        *state = next;
        info!(
            template_id = %id,
            result_id = %outcome.template().id,
            forked = outcome.is_fork(),
            "template updated"
        );
        Ok(outcome)
    }

    /// Deletes a template from whichever collection holds it.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] for unknown ids or a storage error.
    pub async fn delete(&self, id: &TemplateId) -> StoreResult<Template> {
        let mut state = self.state.write().await;
        let location = state
            .locate(id)
            .ok_or_else(|| StoreError::not_found("template", id))?;

        let mut next = state.clone();
        let removed = match location {
            RecordRef::Builtin(idx) => next.templates.remove(idx),
            RecordRef::User(idx) => next.user_templates.remove(idx),
        };
        self.commit(&next).await?;
        *state = next;
        info!(template_id = %id, "template deleted");
        Ok(removed)
    }

    /// Deletes every template that references `role` in a single write.
    ///
    /// # Errors
    ///
    /// Propagates storage errors; nothing is removed when the write fails.
    pub async fn remove_role(&self, role: &RoleId) -> StoreResult<Vec<Template>> {
        let mut state = self.state.write().await;
        let mut next = state.clone();
        let mut removed: Vec<Template> = Vec::new();
        for collection in [&mut next.templates, &mut next.user_templates] {
            let (gone, kept): (Vec<Template>, Vec<Template>) = std::mem::take(collection)
                .into_iter()
                .partition(|t| &t.role == role);
            *collection = kept;
            removed.extend(gone);
        }

        if !removed.is_empty() {
            self.commit(&next).await?;
            *state = next;
            info!(role_id = %role, removed = removed.len(), "role templates deleted");
        }
        Ok(removed)
    }

    /// Orphans every template that references `role`, returning how many
    /// changed.
    ///
    /// # Errors
    ///
    /// Propagates storage errors.
    pub async fn clear_role(&self, role: &RoleId) -> StoreResult<usize> {
        let mut state = self.state.write().await;
        let mut next = state.clone();
        let now = Utc::now();
        let mut changed = 0;
        for template in next.iter_mut().filter(|t| &t.role == role) {
            template.role = RoleId::unassigned();
            template.updated_at = now;
            changed += 1;
        }

        if changed > 0 {
            self.commit(&next).await?;
            *state = next;
            info!(role_id = %role, changed, "templates orphaned");
        }
        Ok(changed)
    }

    /// Imports templates into the user collection.
    ///
    /// Missing RACE fields are recovered from `content`, missing `content` is
    /// rendered from the RACE fields, and blank ids are generated. Templates
    /// whose id already exists are skipped.
    ///
    /// # Errors
    ///
    /// Propagates storage errors.
    pub async fn import(&self, templates: Vec<Template>) -> StoreResult<ImportCount> {
        let mut state = self.state.write().await;
        let mut next = state.clone();
        let mut count = ImportCount::default();
        let now = Utc::now();

        for mut template in templates {
            if template.id.is_blank() {
                template.id = TemplateId::generate();
            }
            if next.locate(&template.id).is_some() {
                debug!(template_id = %template.id, "skipping imported template");
                count.skipped += 1;
                continue;
            }

            template.normalize_legacy();
            if template.race_is_empty() && !template.content.trim().is_empty() {
                parse_race_components(&template.content).apply_to(&mut template);
            }
            if template.content.trim().is_empty() {
                template.content = race_content(&template);
            }
            template.updated_at = now;
            next.user_templates.push(template);
            count.added += 1;
        }

        if count.added > 0 {
            self.commit(&next).await?;
            *state = next;
        }
        info!(added = count.added, skipped = count.skipped, "templates imported");
        Ok(count)
    }

    /// Returns every template for export, sorted by name.
    pub async fn export(&self) -> Vec<Template> {
        self.list_all().await
    }

    /// Restores the built-in collection from the packaged defaults.
    ///
    /// User templates, including forks of built-ins, are untouched.
    ///
    /// # Errors
    ///
    /// Propagates storage errors.
    pub async fn reset_defaults(&self) -> StoreResult<()> {
        let defaults = default_templates()?;
        let mut state = self.state.write().await;
        let mut next = state.clone();
        next.user_templates
            .retain(|user| !defaults.iter().any(|builtin| builtin.id == user.id));
        next.templates = defaults;
        self.commit(&next).await?;
        *state = next;
        info!("built-in templates reset");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStateStorage;

    const CODE_COMPLETION: &str = "5d1dba53-7661-4df2-957a-49b4cf20028a";

    async fn store() -> (Arc<MemoryStateStorage>, TemplateStore) {
        let storage = Arc::new(MemoryStateStorage::new());
        let store = TemplateStore::open(storage.clone()).await.unwrap();
        (storage, store)
    }

    fn draft(name: &str, role: &str) -> TemplateDraft {
        TemplateDraft::new(name, RoleId::new(role).unwrap())
            .with_race("Act as QA", "Write tests", "Login page", "Return a table")
    }

    #[tokio::test]
    async fn add_renders_content() {
        let (_, store) = store().await;
        let template = store.add(draft("Login Tests", "quality-analyst")).await.unwrap();
        assert!(template.content.starts_with("Role:\nAct as QA\n\nAction:"));
        assert_eq!(template.created_by, "unknown");
        assert!(store.locate(&template.id).await.unwrap().id() == &template.id);
    }

    #[tokio::test]
    async fn add_requires_race_fields() {
        let (_, store) = store().await;
        let draft = TemplateDraft::new("Empty", RoleId::new("qa").unwrap());
        assert!(matches!(
            store.add(draft).await,
            Err(StoreError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn updating_builtin_forks_copy() {
        let (_, store) = store().await;
        let id = TemplateId::new(CODE_COMPLETION).unwrap();
        let original = store.get(&id).await.unwrap();

        let mut edit = original.to_draft();
        edit.name = "My Completion".into();
        let outcome = store.update(&id, edit).await.unwrap();

        let UpdateOutcome::Forked { original: source, template } = outcome else {
            panic!("expected fork");
        };
        assert_eq!(source, id);
        assert_ne!(template.id, id);
        assert_eq!(template.name, "My Completion");
        assert_eq!(template.created_by, "user");
        assert_eq!(store.get(&id).await.unwrap(), original);
        assert!(!store.locate(&template.id).await.unwrap().is_builtin());
    }

    #[tokio::test]
    async fn updating_user_template_keeps_identity() {
        let (_, store) = store().await;
        let mut first = draft("Mine", "quality-analyst");
        first.created_by = Some("alice".into());
        let template = store.add(first).await.unwrap();

        let outcome = store
            .update(&template.id, draft("Mine v2", "code-developer"))
            .await
            .unwrap();
        let updated = outcome.into_template();
        assert_eq!(updated.id, template.id);
        assert_eq!(updated.created_by, "alice");
        assert_eq!(updated.created_at, template.created_at);
        assert_eq!(updated.role.as_str(), "code-developer");
    }

    #[tokio::test]
    async fn delete_works_on_both_collections() {
        let (_, store) = store().await;
        let builtin = TemplateId::new(CODE_COMPLETION).unwrap();
        store.delete(&builtin).await.unwrap();
        assert!(store.get(&builtin).await.is_none());
        assert!(store.delete(&builtin).await.unwrap_err().is_not_found());

        store.reset_defaults().await.unwrap();
        assert!(store.get(&builtin).await.is_some());
    }

    #[tokio::test]
    async fn clear_role_orphans_references() {
        let (_, store) = store().await;
        let role = RoleId::new("code-developer").unwrap();
        assert_eq!(store.templates_for_role(&role).await.len(), 3);
        assert_eq!(store.clear_role(&role).await.unwrap(), 3);
        assert!(store.templates_for_role(&role).await.is_empty());
        assert_eq!(
            store.templates_for_role(&RoleId::unassigned()).await.len(),
            3
        );
    }

    #[tokio::test]
    async fn import_recovers_race_fields_and_skips_duplicates() {
        let (_, store) = store().await;
        let imported: Template = serde_json::from_value(serde_json::json!({
            "id": "imported-1",
            "name": "Imported",
            "role": "quality-analyst",
            "content": "Role:\nAct as QA\n\nAction:\nReview\n\nExpectation:\nA report"
        }))
        .unwrap();

        let count = store.import(vec![imported.clone()]).await.unwrap();
        assert_eq!(count.added, 1);
        let stored = store
            .get(&TemplateId::new("imported-1").unwrap())
            .await
            .unwrap();
        assert_eq!(stored.race_role, "Act as QA");
        assert_eq!(stored.race_execute, "A report");

        let count = store.import(vec![imported]).await.unwrap();
        assert_eq!(count, ImportCount { added: 0, skipped: 1 });
    }

    #[tokio::test]
    async fn import_renders_missing_content() {
        let (_, store) = store().await;
        let imported: Template = serde_json::from_value(serde_json::json!({
            "name": "Fields only",
            "raceRole": "Writer",
            "raceExecute": "Draft"
        }))
        .unwrap();
        store.import(vec![imported]).await.unwrap();
        let stored = store
            .list_all()
            .await
            .into_iter()
            .find(|t| t.name == "Fields only")
            .unwrap();
        assert_eq!(stored.content, "Role:\nWriter\n\nExecute:\nDraft");
        assert!(!stored.id.is_blank());
    }

    #[tokio::test]
    async fn legacy_documents_are_normalized_on_open() {
        let storage = Arc::new(MemoryStateStorage::new());
        storage
            .save(
                TEMPLATES_KEY,
                r#"{"templates":[],"userTemplates":[{"id":"old","name":"Old","raceExpectation":"Legacy"}]}"#,
            )
            .await
            .unwrap();
        let store = TemplateStore::open(storage).await.unwrap();
        let old = store.get(&TemplateId::new("old").unwrap()).await.unwrap();
        assert_eq!(old.race_execute, "Legacy");
    }
}
