//! View state held by the application store.

use promptlib_primitives::{Prompt, PromptId, RoleId, TemplateId};
use serde::{Deserialize, Serialize};

/// Which dialog the front end is showing and why.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ModalMode {
    /// Creating an entity.
    #[default]
    Create,
    /// Editing an entity.
    Update,
    /// Read-only view.
    View,
    /// Version history of a prompt.
    History,
    /// Composing a prompt from a preselected template.
    CreatePromptWithTemplate,
    /// Editing a prompt.
    UpdatePrompt,
    /// Composing a prompt.
    CreatePrompt,
    /// Creating a template.
    CreateTemplate,
    /// Editing a template.
    UpdateTemplate,
    /// Managing roles and templates.
    Manage,
    /// Enhancing a prompt.
    Enhance,
}

/// Dialogs with an open/closed flag.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Modal {
    /// Prompt/template creation dialog.
    Create,
    /// Library management dialog.
    Manage,
    /// Template preview dialog.
    ViewTemplate,
}

/// Selection, search, and dialog state.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewState {
    /// Creation dialog visibility.
    pub create_modal_open: bool,
    /// Management dialog visibility.
    pub manage_modal_open: bool,
    /// Template preview visibility.
    pub view_template_modal_open: bool,
    /// Current dialog mode.
    pub modal_mode: ModalMode,
    /// Role filter.
    pub selected_role: Option<RoleId>,
    /// Template being viewed or edited.
    pub selected_template: Option<TemplateId>,
    /// Template chosen for the next prompt.
    pub selected_template_for_prompt: Option<TemplateId>,
    /// Prompt being viewed or edited.
    pub selected_prompt: Option<PromptId>,
    /// Role preselected when the creation dialog opens.
    pub initial_role_id: Option<RoleId>,
    /// Free-text prompt filter.
    pub search_term: String,
    /// Tag filter; a prompt must carry all of them.
    pub selected_tags: Vec<String>,
}

impl ViewState {
    /// Flips the visibility of `modal` and returns the new value.
    pub fn toggle_modal(&mut self, modal: Modal) -> bool {
        let flag = match modal {
            Modal::Create => &mut self.create_modal_open,
            Modal::Manage => &mut self.manage_modal_open,
            Modal::ViewTemplate => &mut self.view_template_modal_open,
        };
        *flag = !*flag;
        *flag
    }

    /// Adds `tag` to the filter, or removes it when already selected.
    pub fn toggle_tag(&mut self, tag: &str) {
        if let Some(pos) = self.selected_tags.iter().position(|t| t == tag) {
            self.selected_tags.remove(pos);
        } else {
            self.selected_tags.push(tag.to_owned());
        }
    }

    /// Returns `true` when `prompt` passes the search term and tag filter.
    #[must_use]
    pub fn matches(&self, prompt: &Prompt) -> bool {
        let term = self.search_term.trim().to_lowercase();
        let text_match = term.is_empty()
            || prompt.title.to_lowercase().contains(&term)
            || prompt.content.to_lowercase().contains(&term);
        let tag_match = self
            .selected_tags
            .iter()
            .all(|tag| prompt.tags.iter().any(|t| t == tag));
        text_match && tag_match
    }
}
