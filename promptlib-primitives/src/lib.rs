//! Core shared types for the prompt library.
//!
//! Everything persisted or exchanged between the stores, the composition
//! logic, and the enhancement client is defined here.

#![warn(missing_docs, clippy::pedantic)]

mod error;
mod ids;
mod prompt;
mod role;
mod share;
mod tag;
mod template;
mod user;

/// Error type and result alias shared across the workspace.
pub use error::{Error, Result};
/// Identifier newtypes for library entities.
pub use ids::{PromptId, RoleId, SectionId, TagId, TemplateId};
/// Prompts produced by the composition workflow.
pub use prompt::{Priority, Prompt, PromptVersion};
/// Roles grouping templates.
pub use role::{Role, RoleDraft, name_key};
/// Prompt sharing grants.
pub use share::{Permission, SharedPrompt};
/// Prompt organization tags.
pub use tag::Tag;
/// Templates and their building blocks.
pub use template::{BestPractice, CustomSection, Template, TemplateDraft};
/// Authenticated user descriptors.
pub use user::{User, UserRole};
