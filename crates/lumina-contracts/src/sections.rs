//! Best-effort extraction of labeled sections from assistant replies.
//!
//! The assistant is asked to answer with an "Enhanced Prompt" section and a
//! bulleted "Style Suggestions" section, but the markdown it produces varies
//! (bold labels, missing colons, horizontal rules, numbered lists). Both
//! extractors are total: a miss is `None` / an empty list, never an error.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static ENHANCED_LABEL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)[*_#]*[ \t]*enhanced[ \t]+prompt[ \t]*:?[ \t]*[*_]*[ \t]*:?")
        .expect("enhanced label pattern compiles")
});

static ENHANCED_FALLBACK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)enhanced\s+prompt:?").expect("enhanced fallback pattern compiles")
});

static STYLE_LABEL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)[*_#]*[ \t]*style[ \t]+suggestions[ \t]*:?[ \t]*[*_]*[ \t]*:?")
        .expect("style label pattern compiles")
});

/// A line opening a Style/Options section, or a horizontal rule.
static SECTION_BREAK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?im)^[ \t]*(?:[*_#]*[ \t]*(?:style|options)\b|(?:-{3,}|\*{3,}|_{3,})[ \t\r]*$)")
        .expect("section break pattern compiles")
});

static HORIZONTAL_RULE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^[ \t]*(?:-{3,}|\*{3,}|_{3,})[ \t\r]*$")
        .expect("horizontal rule pattern compiles")
});

static BULLET: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:[*\-•]|\d+\.)\s+(.*)$").expect("bullet pattern compiles")
});

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedResponse {
    pub enhanced_prompt: Option<String>,
    pub style_options: Vec<String>,
}

impl ParsedResponse {
    pub fn is_empty(&self) -> bool {
        self.enhanced_prompt.is_none() && self.style_options.is_empty()
    }
}

pub fn parse_response(text: &str) -> ParsedResponse {
    ParsedResponse {
        enhanced_prompt: extract_enhanced_prompt(text),
        style_options: extract_style_options(text),
    }
}

/// Text of the "Enhanced Prompt" section, trimmed.
///
/// The labeled body starts at the first non-blank text after the label and
/// runs until a later line that opens a Style/Options section or is a
/// horizontal rule. When that body is empty, everything after the first
/// "Enhanced Prompt" mention is used instead.
pub fn extract_enhanced_prompt(text: &str) -> Option<String> {
    labeled_enhanced_prompt(text).or_else(|| fallback_enhanced_prompt(text))
}

fn labeled_enhanced_prompt(text: &str) -> Option<String> {
    let label = ENHANCED_LABEL.find(text)?;
    let body = text[label.end()..].trim_start();
    // The first body line never terminates the body.
    let end = body
        .find('\n')
        .and_then(|newline| SECTION_BREAK.find_at(body, newline + 1))
        .map(|found| found.start())
        .unwrap_or(body.len());
    non_empty(body[..end].trim())
}

fn fallback_enhanced_prompt(text: &str) -> Option<String> {
    let label = ENHANCED_FALLBACK.find(text)?;
    let rest = text[label.end()..]
        .trim_start()
        .trim_start_matches(['*', '_'])
        .trim_start_matches(':');
    non_empty(rest.trim())
}

/// Bullet items of the "Style Suggestions" section, markers stripped.
///
/// Accepted markers are `*`, `-`, `•` and numbered prefixes such as `1.`,
/// each followed by whitespace; other lines in the section (including bold
/// labels like `**Tip:**`) are skipped.
pub fn extract_style_options(text: &str) -> Vec<String> {
    let Some(label) = STYLE_LABEL.find(text) else {
        return Vec::new();
    };
    let rest = &text[label.end()..];
    let end = HORIZONTAL_RULE
        .find(rest)
        .map(|found| found.start())
        .unwrap_or(rest.len());

    rest[..end]
        .lines()
        .filter_map(|line| {
            let captures = BULLET.captures(line.trim())?;
            let option = captures.get(1)?.as_str().trim();
            non_empty(option)
        })
        .collect()
}

fn non_empty(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "**Enhanced Prompt:** A cat. \n**Style Suggestions:**\n* Anime";

    #[test]
    fn enhanced_prompt_stops_at_style_section() {
        assert_eq!(extract_enhanced_prompt(SAMPLE).as_deref(), Some("A cat."));
    }

    #[test]
    fn style_options_from_sample() {
        assert_eq!(extract_style_options(SAMPLE), vec!["Anime".to_string()]);
    }

    #[test]
    fn enhanced_prompt_spans_lines_until_rule() {
        let reply = "Sure!\n\nEnhanced prompt\nA lighthouse on a cliff,\nstorm clouds rolling in.\n\n---\nLet me know what you think.";
        assert_eq!(
            extract_enhanced_prompt(reply).as_deref(),
            Some("A lighthouse on a cliff,\nstorm clouds rolling in.")
        );
    }

    #[test]
    fn enhanced_prompt_stops_at_options_label() {
        let reply = "## Enhanced Prompt:\nA foggy forest at dawn\n\n**Options**\n- Watercolor";
        assert_eq!(
            extract_enhanced_prompt(reply).as_deref(),
            Some("A foggy forest at dawn")
        );
    }

    #[test]
    fn enhanced_prompt_label_line_may_start_with_style() {
        let reply = "**Enhanced Prompt:** Style of a Dutch master, a fox\n\n**Style Suggestions:**\n1. Art deco";
        assert_eq!(
            extract_enhanced_prompt(reply).as_deref(),
            Some("Style of a Dutch master, a fox")
        );
    }

    #[test]
    fn enhanced_prompt_body_on_next_line_may_start_with_style() {
        let reply = "Enhanced Prompt:\nStyled neon alley with rain reflections";
        assert_eq!(
            extract_enhanced_prompt(reply).as_deref(),
            Some("Styled neon alley with rain reflections")
        );

        let sectioned =
            "**Enhanced Prompt:**\nStyled portrait of a fox\n\n**Style Suggestions:**\n* Anime";
        assert_eq!(
            extract_enhanced_prompt(sectioned).as_deref(),
            Some("Styled portrait of a fox")
        );
        assert_eq!(extract_style_options(sectioned), vec!["Anime"]);

        let multiline = "**Enhanced Prompt:**\n\n  Options for a fox portrait,\nstylized fur in rim light\n---\nDone";
        assert_eq!(
            extract_enhanced_prompt(multiline).as_deref(),
            Some("Options for a fox portrait,\nstylized fur in rim light")
        );
    }

    #[test]
    fn enhanced_prompt_falls_back_when_label_words_are_split() {
        let reply = "Enhanced\nprompt: a quiet harbor at dusk";
        assert_eq!(
            extract_enhanced_prompt(reply).as_deref(),
            Some("a quiet harbor at dusk")
        );
    }

    #[test]
    fn style_options_skip_bold_labels() {
        let reply = "**Enhanced Prompt:** a fox\n\n**Style Suggestions:**\n* Anime\n* Noir\n\n**Tip:** pick one";
        assert_eq!(extract_style_options(reply), vec!["Anime", "Noir"]);
        assert!(extract_style_options("Style Suggestions:\n*Anime\n-Noir").is_empty());
    }

    #[test]
    fn enhanced_prompt_missing_returns_none() {
        assert_eq!(extract_enhanced_prompt("Here is a haiku about cats."), None);
        assert_eq!(extract_enhanced_prompt(""), None);
        assert_eq!(extract_enhanced_prompt("**Enhanced Prompt:**   "), None);
    }

    #[test]
    fn style_options_accept_mixed_markers() {
        let reply = "Style Suggestions:\n* Anime\n- Film noir\n• Ukiyo-e\n1. Vaporwave\n12. Low poly\nNot a bullet\n\n---\n* After the rule";
        assert_eq!(
            extract_style_options(reply),
            vec!["Anime", "Film noir", "Ukiyo-e", "Vaporwave", "Low poly"]
        );
    }

    #[test]
    fn style_options_without_section_is_empty() {
        assert!(extract_style_options("* Anime\n* Noir").is_empty());
        assert!(extract_style_options("**Style Suggestions:**").is_empty());
    }

    #[test]
    fn extraction_never_panics_on_odd_input() {
        let inputs = [
            "Enhanced Prompt",
            "enhanced prompt:",
            "***",
            "Style Suggestions\n*",
            "✨ **Enhanced Prompt:** 猫 \n---",
            "\r\n**Style Suggestions:**\r\n- Glitch\r\n",
        ];
        for input in inputs {
            let _ = parse_response(input);
        }
        assert_eq!(extract_style_options(inputs[5]), vec!["Glitch"]);
        assert_eq!(extract_enhanced_prompt(inputs[4]).as_deref(), Some("猫"));
    }

    #[test]
    fn parse_response_combines_both_sections() {
        let parsed = parse_response(SAMPLE);
        assert_eq!(parsed.enhanced_prompt.as_deref(), Some("A cat."));
        assert_eq!(parsed.style_options, vec!["Anime"]);
        assert!(!parsed.is_empty());
        assert!(parse_response("hello").is_empty());
    }
}
