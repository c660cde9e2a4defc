//! Prompt composition for the prompt library.
//!
//! Turns a [`Template`](promptlib_primitives::Template) plus the values a user
//! entered into the final prompt text, renders and parses the stored RACE
//! content, and provides the sanitisation helpers applied to user input.

#![warn(missing_docs, clippy::pedantic)]

pub mod compose;
pub mod error;
pub mod languages;
pub mod sanitize;
pub mod template;

pub use compose::{FormSection, PromptForm, UploadedFile, compose_final_content};
pub use error::{ComposeError, ComposeResult};
pub use languages::{LANGUAGES, Language, find_language};
pub use sanitize::{clean_file_content, sanitize_filename, sanitize_input};
pub use template::{RaceComponents, parse_race_components, race_content, render_race};
