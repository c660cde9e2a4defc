//! RACE content rendering and parsing.
//!
//! A template stores its four RACE statements both as separate fields and as
//! a rendered `content` text:
//!
//! ```text
//! Role:
//! Act as a QA engineer
//!
//! Action:
//! Write test cases
//! ```
//!
//! Imported documents may carry only one of the two forms, so both directions
//! are provided.
//!
//! ```
//! use promptlib_compose::{RaceComponents, parse_race_components, render_race};
//!
//! let race = RaceComponents::new("Act as a reviewer", "Review the diff", "", "List issues");
//! let text = render_race(&race);
//! assert_eq!(parse_race_components(&text), race);
//! ```

use promptlib_primitives::Template;
use serde::{Deserialize, Serialize};

/// The four RACE statements of a template.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RaceComponents {
    /// "Role" statement.
    pub role: String,
    /// "Action" statement.
    pub action: String,
    /// "Context" statement.
    pub context: String,
    /// "Execute" statement.
    pub execute: String,
}

impl RaceComponents {
    /// Creates components from the four statements.
    #[must_use]
    pub fn new(
        role: impl Into<String>,
        action: impl Into<String>,
        context: impl Into<String>,
        execute: impl Into<String>,
    ) -> Self {
        Self {
            role: role.into(),
            action: action.into(),
            context: context.into(),
            execute: execute.into(),
        }
    }

    /// Copies the statements out of a template.
    #[must_use]
    pub fn from_template(template: &Template) -> Self {
        Self::new(
            template.race_role.clone(),
            template.race_action.clone(),
            template.race_context.clone(),
            template.race_execute.clone(),
        )
    }

    /// Returns `true` when every statement is blank.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.blocks().iter().all(|(_, text)| text.trim().is_empty())
    }

    /// Writes the statements into a template.
    pub fn apply_to(self, template: &mut Template) {
        template.race_role = self.role;
        template.race_action = self.action;
        template.race_context = self.context;
        template.race_execute = self.execute;
    }

    fn blocks(&self) -> [(&'static str, &str); 4] {
        [
            ("Role", self.role.as_str()),
            ("Action", self.action.as_str()),
            ("Context", self.context.as_str()),
            ("Execute", self.execute.as_str()),
        ]
    }
}

/// Renders RACE statements as `Heading:\ntext` blocks separated by a blank line.
///
/// Blank statements are skipped.
#[must_use]
pub fn render_race(race: &RaceComponents) -> String {
    race.blocks()
        .iter()
        .filter(|(_, text)| !text.trim().is_empty())
        .map(|(heading, text)| format!("{heading}:\n{text}"))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Renders the stored `content` text for a template from its RACE fields.
#[must_use]
pub fn race_content(template: &Template) -> String {
    render_race(&RaceComponents::from_template(template))
}

/// Recovers RACE statements from rendered content.
///
/// A line starting with a heading opens that statement; text after the
/// heading on the same line is kept. Following non-blank lines are appended
/// until the next heading. `Expectation:` is accepted as a legacy alias of
/// `Execute:`.
#[must_use]
pub fn parse_race_components(content: &str) -> RaceComponents {
    let mut race = RaceComponents::default();
    let mut current: Option<Block> = None;

    for line in content.lines() {
        if let Some((block, rest)) = heading(line) {
            *race.block_mut(block) = rest.trim().to_owned();
            current = Some(block);
        } else if let Some(block) = current {
            let line = line.trim();
            if !line.is_empty() {
                let target = race.block_mut(block);
                target.push('\n');
                target.push_str(line);
            }
        }
    }

    for block in [Block::Role, Block::Action, Block::Context, Block::Execute] {
        let field = race.block_mut(block);
        *field = field.trim().to_owned();
    }

    race
}

#[derive(Clone, Copy)]
enum Block {
    Role,
    Action,
    Context,
    Execute,
}

impl RaceComponents {
    fn block_mut(&mut self, block: Block) -> &mut String {
        match block {
            Block::Role => &mut self.role,
            Block::Action => &mut self.action,
            Block::Context => &mut self.context,
            Block::Execute => &mut self.execute,
        }
    }
}

fn heading(line: &str) -> Option<(Block, &str)> {
    const HEADINGS: [(&str, Block); 5] = [
        ("Role:", Block::Role),
        ("Action:", Block::Action),
        ("Context:", Block::Context),
        ("Execute:", Block::Execute),
        ("Expectation:", Block::Execute),
    ];
    HEADINGS
        .iter()
        .find_map(|(prefix, block)| line.strip_prefix(prefix).map(|rest| (*block, rest)))
}
