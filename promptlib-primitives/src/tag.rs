//! Hierarchical tags for organizing prompts.

use serde::{Deserialize, Serialize};

use crate::{Error, TagId};

/// A named tag, optionally nested under a parent.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tag {
    /// Tag identifier.
    pub id: TagId,
    /// Display name.
    pub name: String,
    /// Parent tag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<TagId>,
    /// Display color, e.g. `#3b82f6`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

impl Tag {
    /// Creates a top-level tag with a generated id.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingFields`] when `name` is blank.
    pub fn new(name: impl Into<String>) -> crate::Result<Self> {
        let name = name.into().trim().to_owned();
        if name.is_empty() {
            return Err(Error::MissingFields {
                entity: "tag",
                fields: vec!["Name"],
            });
        }
        Ok(Self {
            id: TagId::generate(),
            name,
            parent_id: None,
            color: None,
        })
    }

    /// Nests the tag under `parent`.
    #[must_use]
    pub fn with_parent(mut self, parent: TagId) -> Self {
        self.parent_id = Some(parent);
        self
    }

    /// Sets the display color.
    #[must_use]
    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = Some(color.into());
        self
    }
}
