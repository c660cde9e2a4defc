//! Sanitisation of user-supplied text and file names.

use std::collections::HashSet;
use std::sync::LazyLock;

use ammonia::Builder;
use regex::Regex;

const MAX_FILENAME_LEN: usize = 255;
const FALLBACK_FILENAME: &str = "unnamed_file";
const MAX_MARKUP_PASSES: usize = 4;

static MARKUP_CLEANER: LazyLock<Builder<'static>> = LazyLock::new(|| {
    let mut builder = Builder::empty();
    builder.clean_content_tags(HashSet::from(["script", "style"]));
    builder
});
static SCRIPT_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<script\b.*?</script\s*>").unwrap());
static SQL_KEYWORDS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(select|insert|update|delete|drop|union|exec|eval)\b").unwrap()
});
static SHELL_META: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[;&|`]").unwrap());
static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());
static RESERVED_FILENAME_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"[/\\?%*:|"<>]"#).unwrap());

/// Cleans free text before it leaves the process.
///
/// Removes NUL bytes and every HTML tag and attribute (`<script>` and
/// `<style>` bodies included), then common SQL keywords and shell
/// metacharacters, and finally collapses runs of whitespace into single
/// spaces. Comparison operators that are not markup survive.
#[must_use]
pub fn sanitize_input(input: &str) -> String {
    let text = strip_markup(&input.replace('\0', ""));
    let text = SQL_KEYWORDS.replace_all(&text, "");
    let text = SHELL_META.replace_all(&text, "");
    WHITESPACE.replace_all(text.trim(), " ").into_owned()
}

/// Runs the HTML cleaner until its output stops changing.
///
/// The cleaner serializes text with `&lt;`, `&gt;` and `&amp;` escapes; those
/// are decoded so plain text reads as typed. Entity-encoded tags become real
/// tags after decoding, hence the repeated passes. If the text never settles
/// the escaped form is returned.
fn strip_markup(text: &str) -> String {
    let mut current = text.to_owned();
    for _ in 0..MAX_MARKUP_PASSES {
        let cleaned = decode_text_escapes(&MARKUP_CLEANER.clean(&current).to_string());
        if cleaned == current {
            return cleaned;
        }
        current = cleaned;
    }
    MARKUP_CLEANER.clean(&current).to_string()
}

fn decode_text_escapes(html: &str) -> String {
    html.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&nbsp;", "\u{a0}")
        .replace("&amp;", "&")
}

/// Makes an uploaded file name safe to display and store.
///
/// Strips `..` sequences and path or wildcard characters. Falls back to
/// `unnamed_file` when nothing is left and truncates to 255 characters while
/// keeping the extension.
#[must_use]
pub fn sanitize_filename(name: &str) -> String {
    let stripped = name.replace("..", "");
    let stripped = RESERVED_FILENAME_CHARS.replace_all(&stripped, "");
    let stripped = stripped.trim();

    if stripped.is_empty() {
        return FALLBACK_FILENAME.to_owned();
    }

    if stripped.chars().count() <= MAX_FILENAME_LEN {
        return stripped.to_owned();
    }

    let ext = stripped.rsplit('.').next().unwrap_or_default();
    let keep = MAX_FILENAME_LEN.saturating_sub(ext.chars().count() + 1);
    let stem: String = stripped.chars().take(keep).collect();
    format!("{stem}.{ext}")
}

/// Removes control characters and `<script>` blocks from file text.
///
/// Tabs, line feeds and carriage returns are preserved.
#[must_use]
pub fn clean_file_content(content: &str) -> String {
    let text: String = content
        .chars()
        .filter(|c| !matches!(c, '\u{0}'..='\u{8}' | '\u{b}' | '\u{c}' | '\u{e}'..='\u{1f}'))
        .collect();
    SCRIPT_BLOCK.replace_all(&text, "").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_markup_keywords_and_metacharacters() {
        let cleaned = sanitize_input("  <b>Please</b> select\0 the   rows; rm -rf `x` | cat ");
        assert_eq!(cleaned, "Please the rows rm -rf x cat");
    }

    #[test]
    fn drops_script_bodies() {
        assert_eq!(sanitize_input("hi<script>alert(1)</script> there"), "hi there");
        assert_eq!(
            clean_file_content("fn main() {}\n<SCRIPT src=x>evil()</script>\n"),
            "fn main() {}\n\n"
        );
    }

    #[test]
    fn comparison_operators_are_not_markup() {
        assert_eq!(
            sanitize_input("if x < 5 and y > 3 return"),
            "if x < 5 and y > 3 return"
        );
    }

    #[test]
    fn unclosed_tags_are_removed() {
        assert_eq!(sanitize_input("hi <img src=x onerror=alert(1)"), "hi");
        assert_eq!(sanitize_input("<a href=\"javascript:x()\">link</a> text"), "link text");
    }

    #[test]
    fn encoded_tags_do_not_come_back() {
        assert_eq!(sanitize_input("&lt;script&gt;alert(1)&lt;/script&gt;ok"), "ok");
    }

    #[test]
    fn keyword_match_respects_word_boundaries() {
        assert_eq!(sanitize_input("selection updated"), "selection updated");
    }

    #[test]
    fn filename_traversal_and_fallback() {
        assert_eq!(sanitize_filename("../../etc/passwd"), "etcpasswd");
        assert_eq!(sanitize_filename("a:b*c?.rs"), "abc.rs");
        assert_eq!(sanitize_filename(" /\\ "), "unnamed_file");
    }

    #[test]
    fn long_filenames_keep_extension() {
        let name = format!("{}.java", "x".repeat(400));
        let cleaned = sanitize_filename(&name);
        assert_eq!(cleaned.chars().count(), 255);
        assert!(cleaned.ends_with(".java"));
    }

    #[test]
    fn file_content_keeps_layout_characters() {
        assert_eq!(clean_file_content("a\tb\r\nc\u{7}d"), "a\tb\r\ncd");
    }
}
