//! Prompts owned by the application store and their version history.

use chrono::Utc;
use promptlib_compose::PromptForm;
use promptlib_primitives::{
    Priority, Prompt, PromptId, PromptVersion, RoleId, SharedPrompt, Tag, TemplateId, name_key,
};
use uuid::Uuid;

use crate::error::{AppError, AppResult};

/// Input of [`LibraryApp::create_prompt`](crate::LibraryApp::create_prompt).
#[derive(Clone, Debug, Default)]
pub struct PromptRequest {
    /// Template to compose from; `None` uses the form's fallback role fields.
    pub template: Option<TemplateId>,
    /// Role override; defaults to the template's role.
    pub role: Option<RoleId>,
    /// Values entered by the user.
    pub form: PromptForm,
    /// Priority tag.
    pub priority: Priority,
    /// Free-form tags.
    pub tags: Vec<String>,
    /// Techniques to enhance with; `None` skips enhancement.
    pub enhance: Option<Vec<String>>,
}

impl PromptRequest {
    /// Creates a request for `form`.
    #[must_use]
    pub fn new(form: PromptForm) -> Self {
        Self {
            form,
            ..Self::default()
        }
    }

    /// Composes from `template`.
    #[must_use]
    pub fn with_template(mut self, template: TemplateId) -> Self {
        self.template = Some(template);
        self
    }

    /// Overrides the role recorded on the prompt.
    #[must_use]
    pub fn with_role(mut self, role: RoleId) -> Self {
        self.role = Some(role);
        self
    }

    /// Sets the priority tag.
    #[must_use]
    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// Adds a tag.
    #[must_use]
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    /// Sends the composed text through the enhancement client.
    #[must_use]
    pub fn enhanced(mut self, techniques: Vec<String>) -> Self {
        self.enhance = Some(techniques);
        self
    }
}

/// Prompts plus content snapshots, sharing grants, and the tag registry.
#[derive(Clone, Debug, Default)]
pub struct PromptBook {
    prompts: Vec<Prompt>,
    versions: Vec<PromptVersion>,
    shares: Vec<SharedPrompt>,
    tags: Vec<Tag>,
}

impl PromptBook {
    /// Returns all prompts in creation order.
    #[must_use]
    pub fn list(&self) -> &[Prompt] {
        &self.prompts
    }

    /// Returns a prompt by id.
    #[must_use]
    pub fn get(&self, id: PromptId) -> Option<&Prompt> {
        self.prompts.iter().find(|p| p.id == id)
    }

    /// Stores a new prompt and snapshots its initial content.
    pub fn insert(&mut self, prompt: Prompt) {
        self.versions
            .push(PromptVersion::capture(&prompt, prompt.created_by.clone()));
        self.prompts.push(prompt);
    }

    /// Replaces the content of a prompt and snapshots it.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::PromptNotFound`] for unknown ids.
    pub fn update_content(
        &mut self,
        id: PromptId,
        content: String,
        author: &str,
    ) -> AppResult<Prompt> {
        let prompt = self
            .prompts
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or(AppError::PromptNotFound { id })?;
        prompt.content = content;
        prompt.updated_at = Utc::now();
        let updated = prompt.clone();
        self.versions.push(PromptVersion::capture(&updated, author));
        Ok(updated)
    }

    /// Replaces a whole prompt record, keeping its creation time.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::PromptNotFound`] for unknown ids.
    pub fn replace(&mut self, mut prompt: Prompt) -> AppResult<Prompt> {
        let slot = self
            .prompts
            .iter_mut()
            .find(|p| p.id == prompt.id)
            .ok_or(AppError::PromptNotFound { id: prompt.id })?;
        prompt.created_at = slot.created_at;
        prompt.updated_at = Utc::now();
        if slot.content != prompt.content {
            self.versions
                .push(PromptVersion::capture(&prompt, prompt.created_by.clone()));
        }
        *slot = prompt.clone();
        Ok(prompt)
    }

    /// Removes a prompt and its history.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::PromptNotFound`] for unknown ids.
    pub fn remove(&mut self, id: PromptId) -> AppResult<Prompt> {
        let pos = self
            .prompts
            .iter()
            .position(|p| p.id == id)
            .ok_or(AppError::PromptNotFound { id })?;
        self.versions.retain(|v| v.prompt_id != id);
        self.shares.retain(|s| s.prompt_id != id);
        Ok(self.prompts.remove(pos))
    }

    /// Drops every prompt, version, and sharing grant.
    pub fn clear(&mut self) {
        self.prompts.clear();
        self.versions.clear();
        self.shares.clear();
    }

    /// Returns the snapshots of a prompt, oldest first.
    #[must_use]
    pub fn history(&self, id: PromptId) -> Vec<PromptVersion> {
        self.versions
            .iter()
            .filter(|v| v.prompt_id == id)
            .cloned()
            .collect()
    }

    /// Restores the content captured by `version`.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::VersionNotFound`] when the version does not belong
    /// to the prompt and [`AppError::PromptNotFound`] for unknown prompts.
    pub fn revert(&mut self, id: PromptId, version: Uuid) -> AppResult<Prompt> {
        let content = self
            .versions
            .iter()
            .find(|v| v.id == version && v.prompt_id == id)
            .map(|v| v.content.clone())
            .ok_or(AppError::VersionNotFound {
                prompt: id,
                version,
            })?;
        let prompt = self
            .prompts
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or(AppError::PromptNotFound { id })?;
        prompt.content = content;
        prompt.updated_at = Utc::now();
        Ok(prompt.clone())
    }

    /// Records a sharing grant.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::PromptNotFound`] when the shared prompt is unknown.
    pub fn share(&mut self, share: SharedPrompt) -> AppResult<SharedPrompt> {
        if self.get(share.prompt_id).is_none() {
            return Err(AppError::PromptNotFound {
                id: share.prompt_id,
            });
        }
        self.shares.push(share.clone());
        Ok(share)
    }

    /// Returns the grants naming `user` as a recipient, oldest first.
    #[must_use]
    pub fn shared_with(&self, user: &str) -> Vec<SharedPrompt> {
        self.shares
            .iter()
            .filter(|s| s.is_shared_with(user))
            .cloned()
            .collect()
    }

    /// Removes `user` from every grant of a prompt and returns how many
    /// grants named them. Grants left without recipients are dropped.
    pub fn unshare(&mut self, prompt: PromptId, user: &str) -> usize {
        let mut removed = 0;
        for share in self.shares.iter_mut().filter(|s| s.prompt_id == prompt) {
            let before = share.shared_with.len();
            share.shared_with.retain(|r| r != user);
            removed += before - share.shared_with.len();
        }
        self.shares.retain(|s| !s.shared_with.is_empty());
        removed
    }

    /// Returns the registered tags in insertion order.
    #[must_use]
    pub fn tags(&self) -> &[Tag] {
        &self.tags
    }

    /// Registers a tag.
    ///
    /// # Errors
    ///
    /// - [`AppError::DuplicateTag`] when the id or the name (ignoring case
    ///   and padding) is taken.
    /// - [`AppError::UnknownTag`] when the parent is not registered.
    pub fn add_tag(&mut self, tag: Tag) -> AppResult<Tag> {
        let key = name_key(&tag.name);
        if self
            .tags
            .iter()
            .any(|t| t.id == tag.id || name_key(&t.name) == key)
        {
            return Err(AppError::DuplicateTag { name: tag.name });
        }
        if let Some(parent) = tag
            .parent_id
            .as_ref()
            .filter(|parent| !self.tags.iter().any(|t| &t.id == *parent))
        {
            return Err(AppError::UnknownTag { id: parent.clone() });
        }
        self.tags.push(tag.clone());
        Ok(tag)
    }
}

#[cfg(test)]
mod tests {
    use promptlib_primitives::{Permission, TagId};

    use super::*;

    fn prompt(content: &str) -> Prompt {
        let now = Utc::now();
        Prompt {
            id: PromptId::random(),
            title: "Sample".into(),
            content: content.into(),
            role_id: None,
            template_id: None,
            best_practices: Vec::new(),
            programming_language: None,
            output_validation: None,
            created_by: "ada".into(),
            tags: Vec::new(),
            priority: Priority::default(),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn edits_are_versioned_and_revertible() {
        let mut book = PromptBook::default();
        let original = prompt("v1");
        let id = original.id;
        book.insert(original);
        book.update_content(id, "v2".into(), "ada").unwrap();

        let history = book.history(id);
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].content, "v1");

        let reverted = book.revert(id, history[0].id).unwrap();
        assert_eq!(reverted.content, "v1");
        assert_eq!(book.history(id).len(), 2);
    }

    #[test]
    fn revert_rejects_foreign_version() {
        let mut book = PromptBook::default();
        let a = prompt("a");
        let b = prompt("b");
        let (a_id, b_id) = (a.id, b.id);
        book.insert(a);
        book.insert(b);
        let b_version = book.history(b_id)[0].id;

        let err = book.revert(a_id, b_version).unwrap_err();
        assert!(matches!(err, AppError::VersionNotFound { .. }));
    }

    #[test]
    fn remove_drops_history() {
        let mut book = PromptBook::default();
        let p = prompt("text");
        let id = p.id;
        book.insert(p);
        book.remove(id).unwrap();
        assert!(book.history(id).is_empty());
        assert!(matches!(book.remove(id), Err(AppError::PromptNotFound { .. })));
    }

    #[test]
    fn shares_are_listed_per_recipient() {
        let mut book = PromptBook::default();
        let p = prompt("text");
        let id = p.id;
        book.insert(p);

        book.share(SharedPrompt::new(id, "ada", ["grace", "linus"], Permission::View).unwrap())
            .unwrap();
        book.share(SharedPrompt::new(id, "ada", ["grace"], Permission::Edit).unwrap())
            .unwrap();
        let grace = book.shared_with("grace");
        assert_eq!(grace.len(), 2);
        assert_eq!(grace[1].permission, Permission::Edit);
        assert!(book.shared_with("ada").is_empty());

        assert_eq!(book.unshare(id, "grace"), 2);
        assert!(book.shared_with("grace").is_empty());
        assert_eq!(book.shared_with("linus").len(), 1);

        book.remove(id).unwrap();
        assert!(book.shared_with("linus").is_empty());
    }

    #[test]
    fn sharing_unknown_prompt_fails() {
        let mut book = PromptBook::default();
        let share = SharedPrompt::new(PromptId::random(), "ada", ["grace"], Permission::View)
            .unwrap();
        assert!(matches!(
            book.share(share),
            Err(AppError::PromptNotFound { .. })
        ));
    }

    #[test]
    fn tags_need_unique_names_and_known_parents() {
        let mut book = PromptBook::default();
        let backend = book.add_tag(Tag::new("Backend").unwrap()).unwrap();
        let rust = Tag::new("Rust").unwrap().with_parent(backend.id.clone());
        book.add_tag(rust).unwrap();

        let err = book.add_tag(Tag::new(" backend ").unwrap()).unwrap_err();
        assert!(matches!(err, AppError::DuplicateTag { .. }));

        let orphan = Tag::new("Go").unwrap().with_parent(TagId::generate());
        assert!(matches!(
            book.add_tag(orphan),
            Err(AppError::UnknownTag { .. })
        ));
        assert_eq!(book.tags().len(), 2);
    }
}
