//! Record locations and update outcomes.

use promptlib_primitives::{Template, TemplateId};

/// Which collection a record lives in.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum RecordRef<I> {
    /// Packaged built-in collection.
    Builtin(I),
    /// User-created collection.
    User(I),
}

impl<I> RecordRef<I> {
    /// Returns the record identifier.
    pub fn id(&self) -> &I {
        match self {
            Self::Builtin(id) | Self::User(id) => id,
        }
    }

    /// Returns `true` for built-in records.
    pub fn is_builtin(&self) -> bool {
        matches!(self, Self::Builtin(_))
    }
}

/// Result of updating a template.
#[derive(Clone, Debug, PartialEq)]
pub enum UpdateOutcome {
    /// A user template was modified in place.
    Updated(Template),
    /// A built-in template was copied into the user collection.
    Forked {
        /// Identifier of the untouched built-in template.
        original: TemplateId,
        /// The new user template.
        template: Template,
    },
}

impl UpdateOutcome {
    /// Returns the template holding the new values.
    #[must_use]
    pub fn template(&self) -> &Template {
        match self {
            Self::Updated(template) | Self::Forked { template, .. } => template,
        }
    }

    /// Consumes the outcome, returning the template holding the new values.
    #[must_use]
    pub fn into_template(self) -> Template {
        match self {
            Self::Updated(template) | Self::Forked { template, .. } => template,
        }
    }

    /// Returns `true` when the update produced a fork.
    #[must_use]
    pub fn is_fork(&self) -> bool {
        matches!(self, Self::Forked { .. })
    }
}
