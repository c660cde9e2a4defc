//! Packaged programming languages offered by the language selector.

use serde::Serialize;

use crate::{ComposeError, ComposeResult};

/// A programming language entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Language {
    /// Stable identifier (`java`, `csharp`, ...).
    pub id: &'static str,
    /// Display name inserted into composed prompts.
    pub name: &'static str,
    /// Source file extension including the leading dot.
    pub extension: &'static str,
    /// Whether the language is compiled ahead of time.
    pub is_compiled: bool,
}

/// Languages in selector order.
pub const LANGUAGES: &[Language] = &[
    Language {
        id: "java",
        name: "Java",
        extension: ".java",
        is_compiled: true,
    },
    Language {
        id: "csharp",
        name: "C#",
        extension: ".cs",
        is_compiled: true,
    },
    Language {
        id: "python",
        name: "Python",
        extension: ".py",
        is_compiled: false,
    },
    Language {
        id: "javascript",
        name: "Javascript",
        extension: ".js",
        is_compiled: false,
    },
    Language {
        id: "typescript",
        name: "Typescript",
        extension: ".ts",
        is_compiled: true,
    },
];

/// Looks up a language by id or display name, ignoring case.
///
/// # Errors
///
/// Returns [`ComposeError::UnknownLanguage`] when nothing matches.
pub fn find_language(key: &str) -> ComposeResult<&'static Language> {
    let key = key.trim();
    LANGUAGES
        .iter()
        .find(|lang| lang.id.eq_ignore_ascii_case(key) || lang.name.eq_ignore_ascii_case(key))
        .ok_or_else(|| ComposeError::UnknownLanguage { id: key.to_owned() })
}
