//! Templates following the RACE framework.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result, RoleId, SectionId, TemplateId};

/// A best practice the user can opt into when composing a prompt.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BestPractice {
    /// Short label shown next to the checkbox.
    pub label: String,
    /// Full description rendered into the prompt.
    pub description: String,
}

impl BestPractice {
    /// Creates a best practice entry.
    #[must_use]
    pub fn new(label: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            description: description.into(),
        }
    }
}

/// A user-definable named section of a template.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomSection {
    /// Section identifier.
    #[serde(default = "SectionId::generate")]
    pub id: SectionId,
    /// Heading rendered above the section content.
    pub name: String,
    /// Hint shown to the user while filling the section.
    #[serde(default)]
    pub description: String,
    /// Hidden sections are never rendered.
    #[serde(default = "visible_by_default")]
    pub is_visible: bool,
    /// Pre-filled content, overridden by form input.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

const fn visible_by_default() -> bool {
    true
}

impl CustomSection {
    /// Creates a visible, empty section.
    #[must_use]
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: SectionId::generate(),
            name: name.into(),
            description: description.into(),
            is_visible: true,
            content: None,
        }
    }

    /// Sets pre-filled content.
    #[must_use]
    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    /// Marks the section hidden.
    #[must_use]
    pub fn hidden(mut self) -> Self {
        self.is_visible = false;
        self
    }
}

/// A reusable skeleton from which prompts are composed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Template {
    /// Template identifier.
    #[serde(default)]
    pub id: TemplateId,
    /// Display name.
    pub name: String,
    /// Free-text description.
    #[serde(default)]
    pub description: String,
    /// Owning role; empty once the role has been deleted.
    #[serde(default)]
    pub role: RoleId,
    /// RACE "Role" statement.
    #[serde(default)]
    pub race_role: String,
    /// RACE "Action" statement.
    #[serde(default)]
    pub race_action: String,
    /// RACE "Context" statement.
    #[serde(default)]
    pub race_context: String,
    /// RACE "Execute" statement.
    #[serde(default)]
    pub race_execute: String,
    /// Legacy name of the execute statement found in older documents.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub race_expectation: Option<String>,
    /// Rendered RACE text.
    #[serde(default)]
    pub content: String,
    /// Ordered best practices offered when composing.
    #[serde(default)]
    pub best_practices: Vec<BestPractice>,
    /// Named sections the user fills in.
    #[serde(default)]
    pub custom_sections: Vec<CustomSection>,
    /// Whether the composition form offers a language selector.
    #[serde(default)]
    pub show_programming_language: bool,
    /// Whether the composition form offers an output-validation field.
    #[serde(default)]
    pub show_output_validation: bool,
    /// Creator label (`system` for packaged templates).
    #[serde(default = "unknown_creator")]
    pub created_by: String,
    /// Creation timestamp, set by the owning store.
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    /// Last modification timestamp, refreshed by the owning store.
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

fn unknown_creator() -> String {
    "unknown".to_owned()
}

impl Template {
    /// Builds a template from a draft, stamping both timestamps with the
    /// current time. The rendered `content` is left empty.
    #[must_use]
    pub fn from_draft(id: TemplateId, draft: TemplateDraft) -> Self {
        let now = Utc::now();
        Self {
            id,
            name: draft.name.trim().to_owned(),
            description: draft.description,
            role: draft.role,
            race_role: draft.race_role,
            race_action: draft.race_action,
            race_context: draft.race_context,
            race_execute: draft.race_execute,
            race_expectation: None,
            content: String::new(),
            best_practices: draft.best_practices,
            custom_sections: draft.custom_sections,
            show_programming_language: draft.show_programming_language,
            show_output_validation: draft.show_output_validation,
            created_by: draft.created_by.unwrap_or_else(unknown_creator),
            created_at: now,
            updated_at: now,
        }
    }

    /// Promotes a legacy `raceExpectation` value when `raceExecute` is empty.
    pub fn normalize_legacy(&mut self) {
        if self.race_execute.trim().is_empty() {
            if let Some(expectation) = self.race_expectation.take() {
                self.race_execute = expectation;
            }
        }
    }

    /// Returns `true` when every RACE field is empty.
    #[must_use]
    pub fn race_is_empty(&self) -> bool {
        [
            &self.race_role,
            &self.race_action,
            &self.race_context,
            &self.race_execute,
        ]
        .iter()
        .all(|field| field.trim().is_empty())
    }

    /// Returns the editable fields of this template as a draft.
    #[must_use]
    pub fn to_draft(&self) -> TemplateDraft {
        TemplateDraft {
            name: self.name.clone(),
            description: self.description.clone(),
            role: self.role.clone(),
            race_role: self.race_role.clone(),
            race_action: self.race_action.clone(),
            race_context: self.race_context.clone(),
            race_execute: self.race_execute.clone(),
            best_practices: self.best_practices.clone(),
            custom_sections: self.custom_sections.clone(),
            show_programming_language: self.show_programming_language,
            show_output_validation: self.show_output_validation,
            created_by: Some(self.created_by.clone()),
        }
    }
}

/// User-supplied fields for creating or editing a template.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TemplateDraft {
    /// Display name.
    pub name: String,
    /// Free-text description.
    pub description: String,
    /// Owning role.
    pub role: RoleId,
    /// RACE "Role" statement.
    pub race_role: String,
    /// RACE "Action" statement.
    pub race_action: String,
    /// RACE "Context" statement.
    pub race_context: String,
    /// RACE "Execute" statement.
    pub race_execute: String,
    /// Ordered best practices.
    pub best_practices: Vec<BestPractice>,
    /// Named custom sections.
    pub custom_sections: Vec<CustomSection>,
    /// Language selector toggle.
    pub show_programming_language: bool,
    /// Output-validation field toggle.
    pub show_output_validation: bool,
    /// Creator label; defaults to `unknown`.
    pub created_by: Option<String>,
}

impl TemplateDraft {
    /// Creates a draft for the given name and role.
    #[must_use]
    pub fn new(name: impl Into<String>, role: RoleId) -> Self {
        Self {
            name: name.into(),
            role,
            ..Self::default()
        }
    }

    /// Sets the four RACE statements.
    #[must_use]
    pub fn with_race(
        mut self,
        role: impl Into<String>,
        action: impl Into<String>,
        context: impl Into<String>,
        execute: impl Into<String>,
    ) -> Self {
        self.race_role = role.into();
        self.race_action = action.into();
        self.race_context = context.into();
        self.race_execute = execute.into();
        self
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Appends a best practice.
    #[must_use]
    pub fn with_best_practice(mut self, practice: BestPractice) -> Self {
        self.best_practices.push(practice);
        self
    }

    /// Appends a custom section.
    #[must_use]
    pub fn with_section(mut self, section: CustomSection) -> Self {
        self.custom_sections.push(section);
        self
    }

    /// Sets both feature toggles.
    #[must_use]
    pub fn with_toggles(mut self, programming_language: bool, output_validation: bool) -> Self {
        self.show_programming_language = programming_language;
        self.show_output_validation = output_validation;
        self
    }

    /// Checks that every required form field is filled in.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingFields`] naming each empty required field.
    pub fn validate(&self) -> Result<()> {
        let required = [
            ("Template Name", self.name.as_str()),
            ("Role", self.role.as_str()),
            ("RACE Role", self.race_role.as_str()),
            ("RACE Action", self.race_action.as_str()),
            ("RACE Context", self.race_context.as_str()),
            ("RACE Execute", self.race_execute.as_str()),
        ];

        let fields: Vec<&'static str> = required
            .iter()
            .filter(|(_, value)| value.trim().is_empty())
            .map(|(label, _)| *label)
            .collect();

        if fields.is_empty() {
            Ok(())
        } else {
            Err(Error::MissingFields {
                entity: "template",
                fields,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legacy_expectation_fills_execute() {
        let mut template: Template = serde_json::from_str(
            r#"{"name":"Legacy","role":"qa-lead","raceExpectation":"Do it"}"#,
        )
        .expect("template");
        template.normalize_legacy();
        assert_eq!(template.race_execute, "Do it");
        assert!(template.race_expectation.is_none());
    }

    #[test]
    fn validate_lists_missing_fields() {
        let draft = TemplateDraft::new("Review", RoleId::new("qa-lead").unwrap())
            .with_race("Act as QA", "", "Some context", " ");
        let err = draft.validate().expect_err("missing fields");
        match err {
            Error::MissingFields { fields, .. } => {
                assert_eq!(fields, vec!["RACE Action", "RACE Execute"]);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn from_draft_defaults_creator() {
        let draft = TemplateDraft::new("  Review ", RoleId::new("qa-lead").unwrap());
        let template = Template::from_draft(TemplateId::generate(), draft);
        assert_eq!(template.name, "Review");
        assert_eq!(template.created_by, "unknown");
        assert_eq!(template.created_at, template.updated_at);
    }

    #[test]
    fn sections_default_to_visible() {
        let section: CustomSection =
            serde_json::from_str(r#"{"name":"Code","description":"paste"}"#).expect("section");
        assert!(section.is_visible);
        assert!(!section.id.is_blank());
    }
}
