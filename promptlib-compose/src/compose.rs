//! Final prompt composition.

use std::collections::HashMap;

use promptlib_primitives::{BestPractice, SectionId, Template};

use crate::sanitize::{clean_file_content, sanitize_filename};

/// A free-form section the user added on top of the template's sections.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FormSection {
    /// Heading rendered above the content.
    pub name: String,
    /// Section text.
    pub content: String,
}

impl FormSection {
    /// Creates a free-form section.
    #[must_use]
    pub fn new(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
        }
    }
}

/// A text file attached to the prompt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UploadedFile {
    name: String,
    content: String,
}

impl UploadedFile {
    /// Attaches a file; the name and content are sanitised on construction.
    #[must_use]
    pub fn new(name: &str, content: &str) -> Self {
        Self {
            name: sanitize_filename(name),
            content: clean_file_content(content),
        }
    }

    /// Returns the sanitised file name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the cleaned file text.
    #[must_use]
    pub fn content(&self) -> &str {
        &self.content
    }
}

/// Values the user entered in the composition form.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PromptForm {
    /// Prompt title.
    pub title: String,
    /// Role statement used when no template is selected.
    pub race_role: String,
    /// Role description used when no template is selected.
    pub role_description: String,
    /// Text entered for the template's custom sections, keyed by section id.
    pub section_content: HashMap<SectionId, String>,
    /// Free-form sections added by the user.
    pub extra_sections: Vec<FormSection>,
    /// Best practices the user checked.
    pub checked_practices: Vec<BestPractice>,
    /// Programming language display name.
    pub programming_language: Option<String>,
    /// Output-validation text.
    pub output_validation: String,
    /// Attached files.
    pub files: Vec<UploadedFile>,
}

impl PromptForm {
    /// Creates an empty form with a title.
    #[must_use]
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    /// Sets the text of one of the template's custom sections.
    #[must_use]
    pub fn with_section_content(mut self, id: SectionId, content: impl Into<String>) -> Self {
        self.section_content.insert(id, content.into());
        self
    }

    /// Adds a free-form section.
    #[must_use]
    pub fn with_extra_section(mut self, section: FormSection) -> Self {
        self.extra_sections.push(section);
        self
    }

    /// Checks a best practice.
    #[must_use]
    pub fn with_practice(mut self, practice: BestPractice) -> Self {
        self.checked_practices.push(practice);
        self
    }

    /// Chooses a programming language.
    #[must_use]
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.programming_language = Some(language.into());
        self
    }

    /// Sets the output-validation text.
    #[must_use]
    pub fn with_output_validation(mut self, text: impl Into<String>) -> Self {
        self.output_validation = text.into();
        self
    }

    /// Attaches a file.
    #[must_use]
    pub fn with_file(mut self, file: UploadedFile) -> Self {
        self.files.push(file);
        self
    }

    /// Sets the role statement and description used without a template.
    #[must_use]
    pub fn with_role_fallback(
        mut self,
        race_role: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        self.race_role = race_role.into();
        self.role_description = description.into();
        self
    }
}

fn non_blank(text: &str) -> bool {
    !text.trim().is_empty()
}

/// Builds the final prompt text from a template and form values.
///
/// Blocks appear in a fixed order and are separated by one blank line:
/// RACE blocks (with the template description), custom sections, the
/// programming language, checked best practices, output validation, and
/// attached files. Blank blocks are omitted. Inputs are not modified.
#[must_use]
pub fn compose_final_content(template: Option<&Template>, form: &PromptForm) -> String {
    let mut parts: Vec<String> = Vec::new();

    match template {
        Some(template) => {
            let blocks = [
                ("Role", &template.race_role),
                ("Description", &template.description),
                ("Action", &template.race_action),
                ("Context", &template.race_context),
                ("Execute", &template.race_execute),
            ];
            parts.extend(
                blocks
                    .iter()
                    .filter(|(_, text)| non_blank(text))
                    .map(|(heading, text)| format!("{heading}:\n{text}")),
            );

            for section in template.custom_sections.iter().filter(|s| s.is_visible) {
                let content = form
                    .section_content
                    .get(&section.id)
                    .map(String::as_str)
                    .or(section.content.as_deref())
                    .unwrap_or_default();
                if non_blank(content) {
                    parts.push(format!("{}:\n{content}", section.name));
                }
            }
        }
        None => {
            if non_blank(&form.race_role) {
                parts.push(format!("Role:\n{}", form.race_role));
                if non_blank(&form.role_description) {
                    parts.push(format!("Description:\n{}", form.role_description));
                }
            }
        }
    }

    parts.extend(
        form.extra_sections
            .iter()
            .filter(|section| non_blank(&section.content))
            .map(|section| format!("{}:\n{}", section.name, section.content)),
    );

    if let (Some(template), Some(language)) = (template, form.programming_language.as_deref()) {
        if template.show_programming_language && non_blank(language) {
            parts.push(format!("Programming Language: {language}"));
        }
    }

    if let Some(template) = template {
        let bullets: Vec<String> = template
            .best_practices
            .iter()
            .filter(|practice| {
                form.checked_practices
                    .iter()
                    .any(|checked| checked.description == practice.description)
            })
            .map(|practice| format!("• {}", practice.description))
            .collect();
        if !bullets.is_empty() {
            parts.push(format!("Best Practices to Follow:\n{}", bullets.join("\n")));
        }
    }

    if non_blank(&form.output_validation) {
        parts.push(format!("Output Validation:\n{}", form.output_validation));
    }

    parts.extend(
        form.files
            .iter()
            .filter(|file| non_blank(file.content()))
            .map(|file| format!("File Content of {}:\n{}", file.name(), file.content())),
    );

    parts.join("\n\n")
}
