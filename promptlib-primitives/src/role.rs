//! Roles group templates by persona.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result, RoleId};

const MAX_NAME_LEN: usize = 96;

/// A named persona used to group templates (e.g. "QA Engineer").
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Role {
    /// Unique role identifier.
    pub id: RoleId,
    /// Display name, unique across all roles ignoring case.
    pub name: String,
    /// Optional free-text description.
    #[serde(default)]
    pub description: String,
    /// Whether the role belongs to the packaged built-in set.
    #[serde(default)]
    pub is_default: bool,
    /// Creation timestamp, set by the owning store.
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    /// Last modification timestamp, refreshed by the owning store.
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl Role {
    /// Returns the normalised key used for name uniqueness checks.
    #[must_use]
    pub fn name_key(&self) -> String {
        name_key(&self.name)
    }
}

/// Normalises a role name for case-insensitive comparison.
#[must_use]
pub fn name_key(name: &str) -> String {
    name.trim().to_lowercase()
}

/// User-supplied fields for creating or editing a role.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RoleDraft {
    /// Explicit id to use on creation; generated when absent.
    pub id: Option<RoleId>,
    /// Role display name.
    pub name: String,
    /// Role description.
    pub description: String,
}

impl RoleDraft {
    /// Creates a draft with the supplied name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            description: String::new(),
        }
    }

    /// Sets an explicit identifier.
    #[must_use]
    pub fn with_id(mut self, id: RoleId) -> Self {
        self.id = Some(id);
        self
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Validates the draft and returns the trimmed name and description.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingFields`] for a blank name and
    /// [`Error::Invalid`] when the name is too long.
    pub fn normalized(&self) -> Result<(String, String)> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(Error::MissingFields {
                entity: "role",
                fields: vec!["Name"],
            });
        }
        if name.chars().count() > MAX_NAME_LEN {
            return Err(Error::invalid(
                "role",
                format!("name length must be <= {MAX_NAME_LEN}"),
            ));
        }
        Ok((name.to_owned(), self.description.trim().to_owned()))
    }
}
