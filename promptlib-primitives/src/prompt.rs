//! Prompts composed from templates.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{BestPractice, PromptId, RoleId, TemplateId};

/// Priority tag attached to a prompt.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    /// Low priority.
    Low,
    /// Medium priority.
    #[default]
    Medium,
    /// High priority.
    High,
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        })
    }
}

/// Final text artifact produced by the composition workflow.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Prompt {
    /// Prompt identifier.
    pub id: PromptId,
    /// Title shown in prompt lists.
    pub title: String,
    /// Composed (and possibly enhanced) content.
    pub content: String,
    /// Role the prompt was composed under.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role_id: Option<RoleId>,
    /// Template the prompt was composed from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_id: Option<TemplateId>,
    /// Copy of the best practices the user selected.
    #[serde(default)]
    pub best_practices: Vec<BestPractice>,
    /// Programming language chosen in the form.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub programming_language: Option<String>,
    /// Output-validation text entered in the form.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_validation: Option<String>,
    /// Identifier of the creating user.
    pub created_by: String,
    /// Free-form tags.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Priority tag.
    #[serde(default)]
    pub priority: Priority,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last modification timestamp.
    pub updated_at: DateTime<Utc>,
}

/// Snapshot of a prompt's content at a point in time.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptVersion {
    /// Version identifier.
    pub id: Uuid,
    /// Prompt this version belongs to.
    pub prompt_id: PromptId,
    /// Content at the time of the snapshot.
    pub content: String,
    /// Snapshot timestamp.
    pub created_at: DateTime<Utc>,
    /// User who produced the snapshot.
    pub created_by: String,
}

impl PromptVersion {
    /// Captures the current content of `prompt`.
    #[must_use]
    pub fn capture(prompt: &Prompt, author: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            prompt_id: prompt.id,
            content: prompt.content.clone(),
            created_at: Utc::now(),
            created_by: author.into(),
        }
    }
}
