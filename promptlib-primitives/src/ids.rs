//! Identifier types for library entities.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::Error;

const MAX_ID_LEN: usize = 128;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident, $kind:literal) => {
        $(#[$meta])*
        #[derive(Clone, Debug, Default, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Creates an identifier after validating its format.
            ///
            /// # Errors
            ///
            /// Returns [`Error::InvalidId`] if the identifier is blank, too long,
            /// or contains whitespace.
            pub fn new(id: impl Into<String>) -> crate::Result<Self> {
                let id = id.into();
                validate_identifier($kind, &id)?;
                Ok(Self(id))
            }

            /// Generates a fresh random identifier.
            #[must_use]
            pub fn generate() -> Self {
                Self(Uuid::new_v4().to_string())
            }

            /// Returns the identifier as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Returns `true` when the identifier is empty.
            ///
            /// Imported documents may carry empty ids; stores replace them with
            /// generated ones.
            #[must_use]
            pub fn is_blank(&self) -> bool {
                self.0.trim().is_empty()
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl FromStr for $name {
            type Err = Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::new(s)
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> Self {
                value.0
            }
        }
    };
}

string_id!(
    /// Identifier of a [`Role`](crate::Role).
    ///
    /// Built-in roles use readable slugs (`code-developer`); user roles get
    /// generated UUID strings. An empty id marks a template whose role was
    /// deleted.
    RoleId,
    "role"
);

string_id!(
    /// Identifier of a [`Template`](crate::Template).
    TemplateId,
    "template"
);

string_id!(
    /// Identifier of a template [`CustomSection`](crate::CustomSection).
    SectionId,
    "section"
);

string_id!(
    /// Identifier of a [`Tag`](crate::Tag).
    TagId,
    "tag"
);

impl RoleId {
    /// Returns the sentinel used for templates whose role was removed.
    #[must_use]
    pub fn unassigned() -> Self {
        Self(String::new())
    }
}

fn validate_identifier(kind: &'static str, id: &str) -> crate::Result<()> {
    if id.trim().is_empty() {
        return Err(Error::InvalidId {
            kind,
            id: String::new(),
            reason: "identifier cannot be empty".into(),
        });
    }

    if id.len() > MAX_ID_LEN {
        return Err(Error::InvalidId {
            kind,
            id: id.into(),
            reason: format!("identifier length must be <= {MAX_ID_LEN}"),
        });
    }

    if id.chars().any(char::is_whitespace) {
        return Err(Error::InvalidId {
            kind,
            id: id.into(),
            reason: "identifier must not contain whitespace".into(),
        });
    }

    Ok(())
}

/// Unique identifier for a composed prompt.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PromptId(Uuid);

impl PromptId {
    /// Generates a random prompt identifier.
    #[must_use]
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates an identifier from an existing UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub const fn as_uuid(self) -> Uuid {
        self.0
    }
}

impl Default for PromptId {
    fn default() -> Self {
        Self::random()
    }
}

impl Display for PromptId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl From<Uuid> for PromptId {
    fn from(value: Uuid) -> Self {
        Self(value)
    }
}

impl FromStr for PromptId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let uuid = Uuid::parse_str(s).map_err(Error::from)?;
        Ok(Self::from_uuid(uuid))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_prompt_id() {
        let id = PromptId::random();
        let parsed = id.to_string().parse::<PromptId>().expect("parse");
        assert_eq!(id, parsed);
    }

    #[test]
    fn rejects_blank_role_id() {
        let err = RoleId::new("   ").expect_err("blank id");
        assert!(matches!(err, Error::InvalidId { kind: "role", .. }));
    }

    #[test]
    fn rejects_whitespace_in_template_id() {
        assert!(TemplateId::new("code completion").is_err());
        assert!(TemplateId::new("code-completion").is_ok());
    }

    #[test]
    fn generated_ids_are_distinct() {
        assert_ne!(TemplateId::generate(), TemplateId::generate());
        assert!(!RoleId::generate().is_blank());
        assert!(RoleId::unassigned().is_blank());
    }
}
