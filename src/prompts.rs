//! Prompt templates for slide analysis and article synthesis.
//!
//! Every prompt lives here so the wording can change without touching the
//! pipeline, and so tests can inspect the exact text sent to the model.
//!
//! Templates use `{name}` placeholders filled by [`fill`]. The page template
//! can be overridden through [`crate::config::ArticleConfig::page_prompt`];
//! the synthesis templates are fixed because the section contract of the
//! produced article depends on them.

/// Marker opening the introduction in a split-strategy framing response.
pub const INTRODUCTION_MARKER: &str = "[INTRODUCTION]";

/// Marker separating the introduction from the closing section.
pub const CLOSING_MARKER: &str = "[CLOSING]";

/// Default instruction for explaining one slide.
///
/// Placeholders: `{language}`, `{page_number}`, `{page_text}`.
pub const DEFAULT_PAGE_PROMPT: &str = r#"You are an expert technical writer. Explain the content of this presentation slide (slide {page_number}) in {language}, so that a reader who never saw the talk understands it.

The text extracted from the slide is included below for reference. It may be incomplete or out of order; use the slide image as the primary source and the text to disambiguate names, numbers and code.

"""
{page_text}
"""

Rules:
- Start with a level-3 heading (###) naming the topic of the slide
- Explain every point on the slide, including diagrams and charts
- Put source code in fenced code blocks with a language identifier
- Use block quotes (>) for key takeaways
- Do NOT add a title for the whole document
- Output ONLY Markdown, without commentary about the task"#;

/// Single-call synthesis: the whole article in one response.
///
/// Placeholders: `{language}`, `{min_words}`, `{title_hint}`, `{content}`.
pub const ARTICLE_PROMPT: &str = r#"You are an experienced technical editor. Below are explanations of every slide of one presentation, in slide order. Rewrite them into a single, coherent long-form article in {language}.

{title_hint}

The article MUST use this Markdown structure:

# <article title>
## Introduction
## Background
## Core Content
   (reorganise the slide explanations into a logical narrative; use ### subsections)
## Looking Ahead
   (forward-looking discussion: implications, open problems, next steps)
## Conclusion

Requirements:
- At least {min_words} words
- Keep every fact, number and code example from the slide explanations
- Put source code in fenced code blocks; use block quotes (>) for key callouts
- Ignore notes saying a slide could not be analysed, but do not invent its content
- Output ONLY the Markdown article

Slide explanations:

{content}"#;

/// Split strategy, call 1: introduction and closing around fixed markers.
///
/// Placeholders: `{language}`, `{content}`.
pub const FRAMING_PROMPT: &str = r#"You are an experienced technical editor. Below are explanations of every slide of one presentation, in slide order. Write two sections in {language} for an article built from them:

1. An introduction that motivates the topic and previews the article
2. A forward-looking closing that discusses implications and next steps, then concludes

Answer in exactly this format, with the markers on their own lines:

[INTRODUCTION]
<introduction text>
[CLOSING]
<closing text>

Do not use headings inside either section. Output nothing else.

Slide explanations:

{content}"#;

/// Split strategy, call 2: the body of the article.
///
/// Placeholders: `{language}`, `{min_words}`, `{content}`.
pub const BODY_PROMPT: &str = r#"You are an experienced technical editor. Below are explanations of every slide of one presentation, in slide order. Reorganise them into the body of a long-form article in {language}.

Structure:
## Background
## Core Content
   (use ### subsections; follow the order of the slides unless regrouping reads better)

Requirements:
- At least {min_words} words
- Keep every fact, number and code example
- Put source code in fenced code blocks; use block quotes (>) for key callouts
- Do NOT write an introduction, a conclusion or a document title
- Output ONLY Markdown

Slide explanations:

{content}"#;

/// Content recorded for a page whose analysis failed.
///
/// Deterministic for a given page so reruns produce stable grounding text.
pub fn failed_page_placeholder(page_number: usize) -> String {
    format!("> Slide {page_number} could not be analysed; its content is not available.")
}

/// Replace each `{key}` in `template` with its value.
pub fn fill(template: &str, vars: &[(&str, &str)]) -> String {
    vars.iter().fold(template.to_string(), |acc, (key, value)| {
        acc.replace(&format!("{{{key}}}"), value)
    })
}

/// The sentence telling the model which title to use, if any.
pub fn title_hint(title: Option<&str>) -> String {
    match title {
        Some(t) if !t.trim().is_empty() => format!("Use \"{}\" as the article title.", t.trim()),
        _ => "Choose a concise, descriptive article title.".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fill_replaces_every_occurrence() {
        let out = fill("{a} and {a} but {b}", &[("a", "x"), ("b", "y")]);
        assert_eq!(out, "x and x but y");
    }

    #[test]
    fn page_prompt_has_all_placeholders() {
        for key in ["{language}", "{page_number}", "{page_text}"] {
            assert!(DEFAULT_PAGE_PROMPT.contains(key), "missing {key}");
        }
    }

    #[test]
    fn article_prompt_lists_required_sections() {
        for section in [
            "## Introduction",
            "## Background",
            "## Core Content",
            "## Looking Ahead",
            "## Conclusion",
        ] {
            assert!(ARTICLE_PROMPT.contains(section), "missing {section}");
        }
    }

    #[test]
    fn framing_prompt_uses_markers() {
        assert!(FRAMING_PROMPT.contains(INTRODUCTION_MARKER));
        assert!(FRAMING_PROMPT.contains(CLOSING_MARKER));
    }

    #[test]
    fn placeholder_mentions_page() {
        assert!(failed_page_placeholder(2).contains("Slide 2"));
    }

    #[test]
    fn title_hint_blank_falls_back() {
        assert!(title_hint(Some("  ")).starts_with("Choose"));
        assert!(title_hint(Some("Rust at Scale")).contains("\"Rust at Scale\""));
    }
}
