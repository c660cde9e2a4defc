//! Prompts shared with other users.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, PromptId};

/// Access granted to the recipients of a shared prompt.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Permission {
    /// Read only.
    #[default]
    View,
    /// Read and edit.
    Edit,
    /// Edit and manage sharing.
    Admin,
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::View => "view",
            Self::Edit => "edit",
            Self::Admin => "admin",
        })
    }
}

impl FromStr for Permission {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "view" => Ok(Self::View),
            "edit" => Ok(Self::Edit),
            "admin" => Ok(Self::Admin),
            other => Err(Error::invalid(
                "permission",
                format!("unknown permission `{other}`"),
            )),
        }
    }
}

/// One grant of a prompt to a set of users.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SharedPrompt {
    /// Grant identifier.
    pub id: Uuid,
    /// Shared prompt.
    pub prompt_id: PromptId,
    /// User who shared it.
    pub shared_by: String,
    /// Recipients, trimmed and without duplicates.
    pub shared_with: Vec<String>,
    /// Access granted to every recipient.
    #[serde(rename = "permissions")]
    pub permission: Permission,
    /// Time of the grant.
    pub shared_at: DateTime<Utc>,
}

impl SharedPrompt {
    /// Creates a grant of `prompt_id` to `recipients`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Invalid`] when no non-blank recipient remains.
    pub fn new<I, S>(
        prompt_id: PromptId,
        shared_by: impl Into<String>,
        recipients: I,
        permission: Permission,
    ) -> crate::Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut shared_with: Vec<String> = Vec::new();
        for recipient in recipients {
            let recipient = recipient.as_ref().trim();
            if !recipient.is_empty() && !shared_with.iter().any(|r| r == recipient) {
                shared_with.push(recipient.to_owned());
            }
        }
        if shared_with.is_empty() {
            return Err(Error::invalid("shared prompt", "no recipients"));
        }
        Ok(Self {
            id: Uuid::new_v4(),
            prompt_id,
            shared_by: shared_by.into(),
            shared_with,
            permission,
            shared_at: Utc::now(),
        })
    }

    /// Returns `true` when `user` is a recipient.
    #[must_use]
    pub fn is_shared_with(&self, user: &str) -> bool {
        self.shared_with.iter().any(|r| r == user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recipients_are_trimmed_and_deduplicated() {
        let share = SharedPrompt::new(
            PromptId::random(),
            "ada",
            [" grace ", "grace", "", "linus"],
            Permission::Edit,
        )
        .unwrap();
        assert_eq!(share.shared_with, ["grace", "linus"]);
        assert!(share.is_shared_with("linus"));
        assert!(!share.is_shared_with("ada"));

        let err = SharedPrompt::new(PromptId::random(), "ada", ["  "], Permission::View);
        assert!(matches!(err, Err(Error::Invalid { .. })));
    }

    #[test]
    fn permission_uses_lowercase_names() {
        let share =
            SharedPrompt::new(PromptId::random(), "ada", ["grace"], Permission::Admin).unwrap();
        let value = serde_json::to_value(&share).unwrap();
        assert_eq!(value["permissions"], "admin");
        assert_eq!(value["sharedWith"][0], "grace");
        assert_eq!(" Edit ".parse::<Permission>().unwrap(), Permission::Edit);
        assert!("owner".parse::<Permission>().is_err());
    }
}
