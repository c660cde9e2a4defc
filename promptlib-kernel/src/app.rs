//! Application store tying the persistent stores, prompts, and view state
//! together.

use std::fmt;
use std::sync::Arc;

use chrono::Utc;
use promptlib_adapters::Enhancer;
use promptlib_compose::compose_final_content;
use promptlib_primitives::{
    Permission, Prompt, PromptId, PromptVersion, Role, RoleDraft, RoleId, SharedPrompt, Tag,
    Template, TemplateDraft, TemplateId, User,
};
use promptlib_store::{
    ImportReport, LibraryExport, RecordRef, RoleStore, StateStorage, StoreError, TemplateStore,
    UpdateOutcome, export_library, import_library,
};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::auth::Authenticator;
use crate::error::{AppError, AppResult};
use crate::prompts::{PromptBook, PromptRequest};
use crate::queue::RequestQueue;
use crate::view::{Modal, ModalMode, ViewState};

/// Storage key of the persisted login session.
pub const SESSION_KEY: &str = "user";

const ANONYMOUS: &str = "anonymous";

/// Decides whether a role deletion may remove its dependent templates.
pub trait ConfirmCascade: Send + Sync {
    /// Returns `true` to delete `role` together with `dependents` templates.
    fn confirm(&self, role: &Role, dependents: usize) -> bool;
}

impl<F> ConfirmCascade for F
where
    F: Fn(&Role, usize) -> bool + Send + Sync,
{
    fn confirm(&self, role: &Role, dependents: usize) -> bool {
        self(role, dependents)
    }
}

/// Outcome of [`LibraryApp::delete_role`].
#[derive(Clone, Debug, PartialEq)]
pub enum RoleDeletion {
    /// The role and its dependent templates were removed.
    Deleted {
        /// Removed role.
        role: Role,
        /// Number of dependent templates removed.
        templates_removed: usize,
    },
    /// The cascade was declined; nothing changed.
    Cancelled,
}

#[derive(Debug, Default)]
struct Mirror {
    roles: Vec<Role>,
    templates: Vec<Template>,
}

/// Application-level store.
///
/// Entity mutations go through [`RoleStore`] and [`TemplateStore`]; a
/// denormalized mirror of both collections is kept for listing. Prompts,
/// their version history, view state, and the login session live here.
pub struct LibraryApp {
    storage: Arc<dyn StateStorage>,
    roles: Arc<RoleStore>,
    templates: Arc<TemplateStore>,
    enhancer: Option<Arc<Enhancer>>,
    authenticator: Option<Arc<dyn Authenticator>>,
    queue: Arc<RequestQueue>,
    mirror: RwLock<Mirror>,
    prompts: RwLock<PromptBook>,
    view: RwLock<ViewState>,
    session: RwLock<Option<User>>,
}

impl fmt::Debug for LibraryApp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LibraryApp")
            .field("enhancer", &self.enhancer)
            .field("has_authenticator", &self.authenticator.is_some())
            .finish_non_exhaustive()
    }
}

impl LibraryApp {
    /// Opens both stores on `storage` and restores a persisted session.
    ///
    /// # Errors
    ///
    /// Propagates storage errors and malformed session documents.
    pub async fn open(storage: Arc<dyn StateStorage>) -> AppResult<Self> {
        let roles = Arc::new(RoleStore::open(Arc::clone(&storage)).await?);
        let templates = Arc::new(TemplateStore::open(Arc::clone(&storage)).await?);
        Self::from_stores(storage, roles, templates).await
    }

    /// Builds the application store around already opened stores.
    ///
    /// # Errors
    ///
    /// Propagates storage errors and malformed session documents.
    pub async fn from_stores(
        storage: Arc<dyn StateStorage>,
        roles: Arc<RoleStore>,
        templates: Arc<TemplateStore>,
    ) -> AppResult<Self> {
        let session = match storage.load(SESSION_KEY).await? {
            Some(raw) => Some(serde_json::from_str::<User>(&raw)?),
            None => None,
        };
        let app = Self {
            storage,
            roles,
            templates,
            enhancer: None,
            authenticator: None,
            queue: Arc::new(RequestQueue::default()),
            mirror: RwLock::new(Mirror::default()),
            prompts: RwLock::new(PromptBook::default()),
            view: RwLock::new(ViewState::default()),
            session: RwLock::new(session),
        };
        app.refresh().await;
        Ok(app)
    }

    /// Attaches an enhancement client.
    #[must_use]
    pub fn with_enhancer(mut self, enhancer: Enhancer) -> Self {
        self.enhancer = Some(Arc::new(enhancer));
        self
    }

    /// Attaches a credential check.
    #[must_use]
    pub fn with_authenticator(mut self, authenticator: Arc<dyn Authenticator>) -> Self {
        self.authenticator = Some(authenticator);
        self
    }

    /// Replaces the request queue.
    #[must_use]
    pub fn with_queue(mut self, queue: RequestQueue) -> Self {
        self.queue = Arc::new(queue);
        self
    }

    /// Returns the role store.
    #[must_use]
    pub fn role_store(&self) -> &Arc<RoleStore> {
        &self.roles
    }

    /// Returns the template store.
    #[must_use]
    pub fn template_store(&self) -> &Arc<TemplateStore> {
        &self.templates
    }

    /// Returns the request queue.
    #[must_use]
    pub fn queue(&self) -> &Arc<RequestQueue> {
        &self.queue
    }

    /// Returns the enhancement client, if any.
    #[must_use]
    pub fn enhancer(&self) -> Option<&Arc<Enhancer>> {
        self.enhancer.as_ref()
    }

    /// Reloads the mirror from the stores.
    pub async fn refresh(&self) {
        let roles = self.roles.list_all().await;
        let templates = self.templates.list_all().await;
        let mut mirror = self.mirror.write().await;
        mirror.roles = roles;
        mirror.templates = templates;
    }

    // ---- session ----

    /// Checks credentials and starts a session.
    ///
    /// Returns `None` when the credentials are rejected or no authenticator
    /// is configured.
    ///
    /// # Errors
    ///
    /// Propagates storage errors while persisting the session.
    pub async fn login(&self, username: &str, password: &str) -> AppResult<Option<User>> {
        let Some(authenticator) = &self.authenticator else {
            warn!("login attempted without an authenticator");
            return Ok(None);
        };
        let Some(role) = authenticator.authenticate(username, password).await else {
            info!(username, "login rejected");
            return Ok(None);
        };

        let user = User {
            username: username.to_owned(),
            role,
        };
        self.storage
            .save(SESSION_KEY, &serde_json::to_string(&user)?)
            .await?;
        *self.session.write().await = Some(user.clone());
        info!(username, %role, "user logged in");
        Ok(Some(user))
    }

    /// Ends the session.
    ///
    /// # Errors
    ///
    /// Propagates storage errors.
    pub async fn logout(&self) -> AppResult<()> {
        self.storage.remove(SESSION_KEY).await?;
        *self.session.write().await = None;
        Ok(())
    }

    /// Returns the logged-in user.
    pub async fn current_user(&self) -> Option<User> {
        self.session.read().await.clone()
    }

    /// Returns `true` while a user is logged in.
    pub async fn is_authenticated(&self) -> bool {
        self.session.read().await.is_some()
    }

    async fn author(&self) -> String {
        self.session
            .read()
            .await
            .as_ref()
            .map_or_else(|| ANONYMOUS.to_owned(), |user| user.username.clone())
    }

    // ---- roles ----

    /// Returns the mirrored roles.
    pub async fn roles(&self) -> Vec<Role> {
        self.mirror.read().await.roles.clone()
    }

    /// Adds a user role.
    ///
    /// # Errors
    ///
    /// Propagates store validation and storage errors.
    pub async fn add_role(&self, draft: RoleDraft) -> AppResult<Role> {
        let role = self.roles.add(draft).await?;
        self.mirror.write().await.roles = self.roles.list_all().await;
        Ok(role)
    }

    /// Updates a role.
    ///
    /// # Errors
    ///
    /// Propagates store validation and storage errors.
    pub async fn update_role(&self, id: &RoleId, draft: RoleDraft) -> AppResult<Role> {
        let role = self.roles.update(id, draft).await?;
        self.mirror.write().await.roles = self.roles.list_all().await;
        Ok(role)
    }

    /// Deletes a role, removing dependent templates once `confirm` agrees.
    ///
    /// The role goes first, then every dependent template in one write. If
    /// removing the templates fails the role is put back, so a failed
    /// deletion leaves both stores as they were. The mirror is reloaded on
    /// every path.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] / [`StoreError::BuiltinRole`] before
    /// anything is removed, and storage errors from the cascade.
    pub async fn delete_role(
        &self,
        id: &RoleId,
        confirm: &dyn ConfirmCascade,
    ) -> AppResult<RoleDeletion> {
        let role = self
            .roles
            .get(id)
            .await
            .ok_or_else(|| StoreError::not_found("role", id))?;
        if let Some(RecordRef::Builtin(_)) = self.roles.locate(id).await {
            return Err(StoreError::BuiltinRole { id: id.to_string() }.into());
        }

        let dependents = self.templates.templates_for_role(id).await.len();
        if dependents > 0 && !confirm.confirm(&role, dependents) {
            info!(role_id = %id, dependents, "role deletion cancelled");
            return Ok(RoleDeletion::Cancelled);
        }

        let result = self.cascade_role(id).await;
        self.refresh().await;
        let (removed, templates_removed) = result?;

        info!(role_id = %id, templates_removed, "role deleted");
        Ok(RoleDeletion::Deleted {
            role: removed,
            templates_removed,
        })
    }

    async fn cascade_role(&self, id: &RoleId) -> AppResult<(Role, usize)> {
        let removed = self.roles.delete(id).await?;
        let templates = match self.templates.remove_role(id).await {
            Ok(templates) => templates,
            Err(err) => {
                warn!(role_id = %id, error = %err, "template cascade failed; restoring role");
                if let Err(restore) = self.roles.restore(removed).await {
                    warn!(role_id = %id, error = %restore, "role could not be restored");
                }
                return Err(err.into());
            }
        };
        self.templates.clear_role(id).await?;
        Ok((removed, templates.len()))
    }

    // ---- templates ----

    /// Returns the mirrored templates.
    pub async fn templates(&self) -> Vec<Template> {
        self.mirror.read().await.templates.clone()
    }

    async fn ensure_role(&self, id: &RoleId) -> AppResult<()> {
        if self.roles.get(id).await.is_some() {
            Ok(())
        } else {
            Err(AppError::UnknownRole { id: id.clone() })
        }
    }

    /// Adds a user template whose role must exist.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::UnknownRole`] or store errors.
    pub async fn add_template(&self, mut draft: TemplateDraft) -> AppResult<Template> {
        draft.validate()?;
        self.ensure_role(&draft.role).await?;
        if draft.created_by.is_none() {
            draft.created_by = Some(self.author().await);
        }
        let template = self.templates.add(draft).await?;
        self.mirror.write().await.templates = self.templates.list_all().await;
        Ok(template)
    }

    /// Updates a template; built-in templates are forked.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::UnknownRole`] or store errors.
    pub async fn update_template(
        &self,
        id: &TemplateId,
        draft: TemplateDraft,
    ) -> AppResult<UpdateOutcome> {
        draft.validate()?;
        self.ensure_role(&draft.role).await?;
        let outcome = self.templates.update(id, draft).await?;
        if let UpdateOutcome::Forked { original, template } = &outcome {
            debug!(original = %original, fork = %template.id, "built-in template forked");
        }
        self.mirror.write().await.templates = self.templates.list_all().await;
        Ok(outcome)
    }

    /// Deletes a template.
    ///
    /// The mirror entry is removed first and restored if the store rejects
    /// the deletion.
    ///
    /// # Errors
    ///
    /// Returns store errors after restoring the mirror.
    pub async fn delete_template(&self, id: &TemplateId) -> AppResult<Template> {
        let removed = {
            let mut mirror = self.mirror.write().await;
            let pos = mirror.templates.iter().position(|t| &t.id == id);
            pos.map(|pos| (pos, mirror.templates.remove(pos)))
        };

        match self.templates.delete(id).await {
            Ok(template) => Ok(template),
            Err(err) => {
                if let Some((pos, template)) = removed {
                    let mut mirror = self.mirror.write().await;
                    let pos = pos.min(mirror.templates.len());
                    mirror.templates.insert(pos, template);
                    debug!(template_id = %id, "template mirror restored");
                }
                Err(err.into())
            }
        }
    }

    // ---- library exchange ----

    /// Exports both stores.
    pub async fn export_library(&self) -> LibraryExport {
        export_library(&self.roles, &self.templates).await
    }

    /// Imports a library export and refreshes the mirror.
    ///
    /// # Errors
    ///
    /// Propagates storage errors.
    pub async fn import_library(&self, export: LibraryExport) -> AppResult<ImportReport> {
        let report = import_library(&self.roles, &self.templates, export).await?;
        self.refresh().await;
        Ok(report)
    }

    /// Restores the packaged roles and templates.
    ///
    /// # Errors
    ///
    /// Propagates storage errors.
    pub async fn reset_defaults(&self) -> AppResult<()> {
        self.roles.reset_defaults().await?;
        self.templates.reset_defaults().await?;
        self.refresh().await;
        Ok(())
    }

    // ---- prompts ----

    /// Composes, optionally enhances, and stores a prompt.
    ///
    /// # Errors
    ///
    /// - Store `NotFound` for an unknown template.
    /// - [`AppError::EnhancementUnavailable`] when enhancement is requested
    ///   without a client, or any enhancement error.
    /// - [`AppError::EmptyPrompt`] when nothing was composed.
    pub async fn create_prompt(&self, request: PromptRequest) -> AppResult<Prompt> {
        let template = match &request.template {
            Some(id) => Some(
                self.templates
                    .get(id)
                    .await
                    .ok_or_else(|| StoreError::not_found("template", id))?,
            ),
            None => None,
        };

        let mut content = compose_final_content(template.as_ref(), &request.form);
        if let Some(techniques) = &request.enhance {
            let enhancer = self
                .enhancer
                .as_ref()
                .ok_or(AppError::EnhancementUnavailable)?;
            if content.trim().is_empty() {
                return Err(AppError::EmptyPrompt);
            }
            content = enhancer.enhance(&content, techniques).await?;
        }
        if content.trim().is_empty() {
            return Err(AppError::EmptyPrompt);
        }

        let role_id = request.role.clone().or_else(|| {
            template
                .as_ref()
                .map(|t| t.role.clone())
                .filter(|role| !role.is_blank())
        });
        let form = request.form;
        let now = Utc::now();
        let prompt = Prompt {
            id: PromptId::random(),
            title: form.title.trim().to_owned(),
            content,
            role_id,
            template_id: template.map(|t| t.id),
            best_practices: form.checked_practices,
            programming_language: form.programming_language,
            output_validation: Some(form.output_validation).filter(|t| !t.trim().is_empty()),
            created_by: self.author().await,
            tags: request.tags,
            priority: request.priority,
            created_at: now,
            updated_at: now,
        };

        self.prompts.write().await.insert(prompt.clone());
        info!(prompt_id = %prompt.id, "prompt created");
        Ok(prompt)
    }

    /// Returns every prompt.
    pub async fn prompts(&self) -> Vec<Prompt> {
        self.prompts.read().await.list().to_vec()
    }

    /// Returns the prompts passing the current search term and tag filter.
    pub async fn filtered_prompts(&self) -> Vec<Prompt> {
        let view = self.view.read().await;
        self.prompts
            .read()
            .await
            .list()
            .iter()
            .filter(|p| view.matches(p))
            .cloned()
            .collect()
    }

    /// Returns one prompt.
    pub async fn prompt(&self, id: PromptId) -> Option<Prompt> {
        self.prompts.read().await.get(id).cloned()
    }

    /// Replaces a prompt record.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::PromptNotFound`] for unknown ids.
    pub async fn update_prompt(&self, prompt: Prompt) -> AppResult<Prompt> {
        self.prompts.write().await.replace(prompt)
    }

    /// Sends a stored prompt's content to the enhancement client and keeps
    /// the result as a new version.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::EnhancementUnavailable`], enhancement errors, or
    /// [`AppError::PromptNotFound`].
    pub async fn enhance_prompt(&self, id: PromptId, techniques: &[String]) -> AppResult<Prompt> {
        let enhancer = self
            .enhancer
            .as_ref()
            .ok_or(AppError::EnhancementUnavailable)?;
        let content = self
            .prompt(id)
            .await
            .map(|p| p.content)
            .ok_or(AppError::PromptNotFound { id })?;
        let enhanced = enhancer.enhance(&content, techniques).await?;
        let author = self.author().await;
        self.prompts
            .write()
            .await
            .update_content(id, enhanced, &author)
    }

    /// Deletes a prompt and its history.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::PromptNotFound`] for unknown ids.
    pub async fn delete_prompt(&self, id: PromptId) -> AppResult<Prompt> {
        self.prompts.write().await.remove(id)
    }

    /// Deletes every prompt.
    pub async fn clear_prompts(&self) {
        self.prompts.write().await.clear();
    }

    /// Returns the version history of a prompt, oldest first.
    pub async fn version_history(&self, id: PromptId) -> Vec<PromptVersion> {
        self.prompts.read().await.history(id)
    }

    /// Restores a prompt's content from one of its versions.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::VersionNotFound`] or [`AppError::PromptNotFound`].
    pub async fn revert_to_version(&self, id: PromptId, version: Uuid) -> AppResult<Prompt> {
        self.prompts.write().await.revert(id, version)
    }

    // ---- sharing and tags ----

    /// Shares a prompt with `recipients`, recorded as granted by the current
    /// user.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Validation`] when no recipient is given and
    /// [`AppError::PromptNotFound`] for unknown prompts.
    pub async fn share_prompt<I, S>(
        &self,
        id: PromptId,
        recipients: I,
        permission: Permission,
    ) -> AppResult<SharedPrompt>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let share = SharedPrompt::new(id, self.author().await, recipients, permission)?;
        let share = self.prompts.write().await.share(share)?;
        info!(prompt_id = %id, recipients = share.shared_with.len(), %permission, "prompt shared");
        Ok(share)
    }

    /// Returns the grants shared with `user_id`.
    pub async fn shared_prompts(&self, user_id: &str) -> Vec<SharedPrompt> {
        self.prompts.read().await.shared_with(user_id)
    }

    /// Withdraws every grant of a prompt to `user_id` and returns how many
    /// were withdrawn.
    pub async fn unshare_prompt(&self, id: PromptId, user_id: &str) -> usize {
        let removed = self.prompts.write().await.unshare(id, user_id);
        debug!(prompt_id = %id, user_id, removed, "prompt unshared");
        removed
    }

    /// Returns the registered tags.
    pub async fn tags(&self) -> Vec<Tag> {
        self.prompts.read().await.tags().to_vec()
    }

    /// Registers a tag.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::DuplicateTag`] or [`AppError::UnknownTag`].
    pub async fn add_tag(&self, tag: Tag) -> AppResult<Tag> {
        let tag = self.prompts.write().await.add_tag(tag)?;
        debug!(tag_id = %tag.id, name = %tag.name, "tag added");
        Ok(tag)
    }

    // ---- view state ----

    /// Returns a snapshot of the view state.
    pub async fn view(&self) -> ViewState {
        self.view.read().await.clone()
    }

    /// Sets the prompt search term.
    pub async fn set_search_term(&self, term: impl Into<String>) {
        self.view.write().await.search_term = term.into();
    }

    /// Toggles a tag in the prompt filter.
    pub async fn toggle_tag(&self, tag: &str) {
        self.view.write().await.toggle_tag(tag);
    }

    /// Selects a role filter.
    pub async fn select_role(&self, role: Option<RoleId>) {
        self.view.write().await.selected_role = role;
    }

    /// Selects the template being viewed or edited.
    pub async fn select_template(&self, template: Option<TemplateId>) {
        self.view.write().await.selected_template = template;
    }

    /// Selects the template for the next prompt.
    pub async fn select_template_for_prompt(&self, template: Option<TemplateId>) {
        self.view.write().await.selected_template_for_prompt = template;
    }

    /// Selects a prompt.
    pub async fn select_prompt(&self, prompt: Option<PromptId>) {
        self.view.write().await.selected_prompt = prompt;
    }

    /// Sets the role preselected in the creation dialog.
    pub async fn set_initial_role(&self, role: Option<RoleId>) {
        self.view.write().await.initial_role_id = role;
    }

    /// Flips a dialog's visibility and returns the new value.
    pub async fn toggle_modal(&self, modal: Modal) -> bool {
        self.view.write().await.toggle_modal(modal)
    }

    /// Sets the dialog mode.
    pub async fn set_modal_mode(&self, mode: ModalMode) {
        self.view.write().await.modal_mode = mode;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use async_trait::async_trait;
    use promptlib_adapters::{
        BackendMetadata, EnhanceRequest, EnhanceResult, EnhancementBackend,
    };
    use promptlib_compose::PromptForm;
    use promptlib_primitives::{Permission, UserRole};
    use promptlib_store::{MemoryStateStorage, ROLES_KEY, StoreResult, TEMPLATES_KEY};

    use super::*;
    use crate::auth::StaticAuthenticator;

    #[derive(Default)]
    struct FlakyStorage {
        inner: MemoryStateStorage,
        fail_writes: AtomicBool,
        failing_key: std::sync::Mutex<Option<&'static str>>,
    }

    impl FlakyStorage {
        fn fail_saves_to(&self, key: Option<&'static str>) {
            *self.failing_key.lock().unwrap() = key;
        }
    }

    #[async_trait]
    impl StateStorage for FlakyStorage {
        async fn load(&self, key: &str) -> StoreResult<Option<String>> {
            self.inner.load(key).await
        }

        async fn save(&self, key: &str, document: &str) -> StoreResult<()> {
            let key_fails = *self.failing_key.lock().unwrap() == Some(key);
            if key_fails || self.fail_writes.load(Ordering::SeqCst) {
                return Err(std::io::Error::other("disk full").into());
            }
            self.inner.save(key, document).await
        }

        async fn remove(&self, key: &str) -> StoreResult<()> {
            self.inner.remove(key).await
        }
    }

    struct Shouting(BackendMetadata);

    #[async_trait]
    impl EnhancementBackend for Shouting {
        fn metadata(&self) -> &BackendMetadata {
            &self.0
        }

        async fn complete(&self, request: &EnhanceRequest) -> EnhanceResult<String> {
            Ok(request.content().to_uppercase())
        }
    }

    async fn app() -> LibraryApp {
        LibraryApp::open(Arc::new(MemoryStateStorage::new()))
            .await
            .unwrap()
    }

    fn race_draft(name: &str, role: &str) -> TemplateDraft {
        TemplateDraft::new(name, RoleId::new(role).unwrap()).with_race(
            "You are a reviewer",
            "Review the diff",
            "A Rust service",
            "List the findings",
        )
    }

    #[tokio::test]
    async fn template_role_must_exist() {
        let app = app().await;
        let err = app
            .add_template(race_draft("Review", "no-such-role"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::UnknownRole { .. }));

        let template = app
            .add_template(race_draft("Review", "code-developer"))
            .await
            .unwrap();
        assert_eq!(template.created_by, ANONYMOUS);
        assert!(app.templates().await.iter().any(|t| t.id == template.id));
    }

    #[tokio::test]
    async fn declined_cascade_changes_nothing() {
        let app = app().await;
        let role = app.add_role(RoleDraft::new("Reviewer")).await.unwrap();
        app.add_template(race_draft("Review", role.id.as_str()))
            .await
            .unwrap();

        let outcome = app
            .delete_role(&role.id, &|_: &Role, count: usize| {
                assert_eq!(count, 1);
                false
            })
            .await
            .unwrap();
        assert_eq!(outcome, RoleDeletion::Cancelled);
        assert!(app.roles().await.iter().any(|r| r.id == role.id));
        assert_eq!(app.template_store().templates_for_role(&role.id).await.len(), 1);
    }

    #[tokio::test]
    async fn confirmed_cascade_removes_dependents() {
        let app = app().await;
        let role = app.add_role(RoleDraft::new("Reviewer")).await.unwrap();
        app.add_template(race_draft("Review A", role.id.as_str()))
            .await
            .unwrap();
        app.add_template(race_draft("Review B", role.id.as_str()))
            .await
            .unwrap();
        let before = app.templates().await.len();

        let outcome = app
            .delete_role(&role.id, &|_: &Role, _: usize| true)
            .await
            .unwrap();
        assert!(matches!(
            outcome,
            RoleDeletion::Deleted {
                templates_removed: 2,
                ..
            }
        ));
        assert_eq!(app.templates().await.len(), before - 2);
        assert!(app.roles().await.iter().all(|r| r.id != role.id));
    }

    #[tokio::test]
    async fn builtin_role_deletion_is_refused_before_cascade() {
        let app = app().await;
        let id = RoleId::new("code-developer").unwrap();
        let dependents = app.template_store().templates_for_role(&id).await.len();
        assert!(dependents > 0);

        let err = app
            .delete_role(&id, &|_: &Role, _: usize| true)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Store(StoreError::BuiltinRole { .. })));
        assert_eq!(app.template_store().templates_for_role(&id).await.len(), dependents);
    }

    async fn flaky_app_with_dependents() -> (Arc<FlakyStorage>, LibraryApp, Role) {
        let storage = Arc::new(FlakyStorage::default());
        let app = LibraryApp::open(storage.clone()).await.unwrap();
        let role = app.add_role(RoleDraft::new("Reviewer")).await.unwrap();
        for name in ["Review A", "Review B"] {
            app.add_template(race_draft(name, role.id.as_str()))
                .await
                .unwrap();
        }
        (storage, app, role)
    }

    #[tokio::test]
    async fn role_save_failure_keeps_role_and_templates() {
        let (storage, app, role) = flaky_app_with_dependents().await;
        let mirror_before = app.templates().await;

        storage.fail_saves_to(Some(ROLES_KEY));
        let err = app
            .delete_role(&role.id, &|_: &Role, _: usize| true)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Store(StoreError::Io { .. })));

        assert!(app.roles().await.iter().any(|r| r.id == role.id));
        assert_eq!(app.template_store().templates_for_role(&role.id).await.len(), 2);
        assert_eq!(app.templates().await, mirror_before);
        assert_eq!(app.templates().await, app.template_store().list_all().await);
    }

    #[tokio::test]
    async fn template_save_failure_restores_role() {
        let (storage, app, role) = flaky_app_with_dependents().await;

        storage.fail_saves_to(Some(TEMPLATES_KEY));
        let err = app
            .delete_role(&role.id, &|_: &Role, _: usize| true)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Store(StoreError::Io { .. })));

        assert!(app.role_store().get(&role.id).await.is_some());
        assert!(app.roles().await.iter().any(|r| r.id == role.id));
        assert_eq!(app.template_store().templates_for_role(&role.id).await.len(), 2);

        storage.fail_saves_to(None);
        let outcome = app
            .delete_role(&role.id, &|_: &Role, _: usize| true)
            .await
            .unwrap();
        assert!(matches!(outcome, RoleDeletion::Deleted { templates_removed: 2, .. }));
    }

    #[tokio::test]
    async fn mirror_stays_in_name_order() {
        let app = app().await;
        app.add_template(race_draft("AAA first", "code-developer"))
            .await
            .unwrap();
        let builtin = app
            .templates()
            .await
            .into_iter()
            .find(|t| t.name == "Code Completion")
            .unwrap();
        let mut draft = builtin.to_draft();
        draft.name = "0 forked".into();
        app.update_template(&builtin.id, draft).await.unwrap();

        let mirror = app.templates().await;
        assert_eq!(mirror, app.template_store().list_all().await);
        assert_eq!(mirror[0].name, "0 forked");
        assert_eq!(mirror[1].name, "AAA first");
    }

    #[tokio::test]
    async fn failed_template_delete_restores_mirror() {
        let storage = Arc::new(FlakyStorage::default());
        let app = LibraryApp::open(storage.clone()).await.unwrap();
        let before = app.templates().await;
        let target = before[1].id.clone();

        storage.fail_writes.store(true, Ordering::SeqCst);
        let err = app.delete_template(&target).await.unwrap_err();
        assert!(matches!(err, AppError::Store(StoreError::Io { .. })));
        assert_eq!(app.templates().await, before);

        storage.fail_writes.store(false, Ordering::SeqCst);
        app.delete_template(&target).await.unwrap();
        assert_eq!(app.templates().await.len(), before.len() - 1);
    }

    #[tokio::test]
    async fn updating_builtin_template_adds_fork_to_mirror() {
        let app = app().await;
        let original = app
            .templates()
            .await
            .into_iter()
            .find(|t| t.name == "Code Completion")
            .unwrap();
        let draft = original.to_draft().with_description("Tuned for Rust");

        let outcome = app.update_template(&original.id, draft).await.unwrap();
        assert!(outcome.is_fork());
        let mirror = app.templates().await;
        assert!(mirror.contains(&original));
        assert!(mirror.iter().any(|t| t.id == outcome.template().id));
    }

    #[tokio::test]
    async fn prompt_from_template_is_versioned() {
        let app = app().await;
        let template = app
            .add_template(race_draft("Review", "code-developer"))
            .await
            .unwrap();

        let prompt = app
            .create_prompt(
                PromptRequest::new(PromptForm::new(" Review PR 12 "))
                    .with_template(template.id.clone())
                    .with_tag("review"),
            )
            .await
            .unwrap();
        assert_eq!(prompt.title, "Review PR 12");
        assert_eq!(prompt.role_id, Some(template.role.clone()));
        assert!(prompt.content.starts_with("Role:\nYou are a reviewer"));
        assert_eq!(app.version_history(prompt.id).await.len(), 1);

        let mut edited = prompt.clone();
        edited.content = "Rewritten".into();
        app.update_prompt(edited).await.unwrap();
        let history = app.version_history(prompt.id).await;
        assert_eq!(history.len(), 2);

        let restored = app.revert_to_version(prompt.id, history[0].id).await.unwrap();
        assert_eq!(restored.content, prompt.content);
    }

    #[tokio::test]
    async fn empty_composition_is_rejected() {
        let app = app().await;
        let err = app
            .create_prompt(PromptRequest::new(PromptForm::new("Nothing")))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::EmptyPrompt));
        assert!(app.prompts().await.is_empty());
    }

    #[tokio::test]
    async fn enhancement_requires_a_client() {
        let form = PromptForm::new("Fallback").with_role_fallback("Tester", "Writes tests");
        let app = app().await;
        let err = app
            .create_prompt(PromptRequest::new(form.clone()).enhanced(Vec::new()))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::EnhancementUnavailable));

        let app = app.with_enhancer(Enhancer::new(Arc::new(Shouting(BackendMetadata::new(
            "test", "upper",
        )))));
        let prompt = app
            .create_prompt(PromptRequest::new(form).enhanced(Vec::new()))
            .await
            .unwrap();
        assert_eq!(prompt.content, "ROLE:\nTESTER\n\nDESCRIPTION:\nWRITES TESTS");
    }

    #[tokio::test]
    async fn session_survives_reopen() {
        let storage: Arc<dyn StateStorage> = Arc::new(MemoryStateStorage::new());
        let auth: Arc<dyn Authenticator> =
            Arc::new(StaticAuthenticator::new().with_user("ada", "pw", UserRole::Admin));
        let app = LibraryApp::open(Arc::clone(&storage))
            .await
            .unwrap()
            .with_authenticator(Arc::clone(&auth));

        assert!(app.login("ada", "wrong").await.unwrap().is_none());
        let user = app.login("ada", "pw").await.unwrap().unwrap();
        assert!(user.is_admin());

        let reopened = LibraryApp::open(Arc::clone(&storage)).await.unwrap();
        assert_eq!(reopened.current_user().await, Some(user));

        reopened.logout().await.unwrap();
        let reopened = LibraryApp::open(storage).await.unwrap();
        assert!(!reopened.is_authenticated().await);
    }

    #[tokio::test]
    async fn search_and_tags_filter_prompts() {
        let app = app().await;
        let form = PromptForm::new("SQL review").with_role_fallback("DBA", "");
        app.create_prompt(PromptRequest::new(form).with_tag("sql"))
            .await
            .unwrap();
        let form = PromptForm::new("API review").with_role_fallback("Backend dev", "");
        app.create_prompt(PromptRequest::new(form)).await.unwrap();

        app.set_search_term("review").await;
        assert_eq!(app.filtered_prompts().await.len(), 2);
        app.toggle_tag("sql").await;
        let filtered = app.filtered_prompts().await;
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].title, "SQL review");
    }

    #[tokio::test]
    async fn shared_prompts_record_the_sharing_user() {
        let auth: Arc<dyn Authenticator> =
            Arc::new(StaticAuthenticator::new().with_user("ada", "pw", UserRole::Standard));
        let app = app().await.with_authenticator(auth);
        app.login("ada", "pw").await.unwrap();
        let form = PromptForm::new("Shared").with_role_fallback("Reviewer", "");
        let prompt = app.create_prompt(PromptRequest::new(form)).await.unwrap();

        let share = app
            .share_prompt(prompt.id, ["grace"], Permission::Edit)
            .await
            .unwrap();
        assert_eq!(share.shared_by, "ada");
        assert_eq!(app.shared_prompts("grace").await, vec![share]);
        assert!(app.shared_prompts("ada").await.is_empty());

        let err = app
            .share_prompt(prompt.id, Vec::<String>::new(), Permission::View)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        assert_eq!(app.unshare_prompt(prompt.id, "grace").await, 1);
        assert!(app.shared_prompts("grace").await.is_empty());
    }

    #[tokio::test]
    async fn tags_are_registered_once() {
        let app = app().await;
        let parent = app.add_tag(Tag::new("Testing").unwrap()).await.unwrap();
        app.add_tag(Tag::new("Fuzzing").unwrap().with_parent(parent.id.clone()))
            .await
            .unwrap();
        let err = app.add_tag(Tag::new("testing").unwrap()).await.unwrap_err();
        assert!(matches!(err, AppError::DuplicateTag { .. }));

        let tags = app.tags().await;
        assert_eq!(tags.len(), 2);
        assert_eq!(tags[1].parent_id, Some(parent.id));
    }
}
