//! Deterministic cleanup of the synthesised article.
//!
//! Page analyses are kept exactly as the model wrote them; only the final
//! article passes through [`polish_article`]. The passes fix formatting
//! habits of chat models without touching the prose:
//!
//! 1. strip an outer ` ```markdown ` fence
//! 2. normalise line endings
//! 3. drop a one-line preamble ("Here is the article:") before the title
//! 4. trim trailing whitespace
//! 5. demote every `# ` heading after the first to `## `
//! 6. blank line around headings
//! 7. replace image links to nowhere by their alt text
//! 8. strip invisible Unicode
//! 9. collapse runs of blank lines
//! 10. end with exactly one newline
//!
//! Fences are stripped before heading work so the title line is detected on
//! clean input; blank lines are collapsed last because the heading pass adds
//! some.

use once_cell::sync::Lazy;
use regex::Regex;

/// Apply every cleanup pass, in order.
pub fn polish_article(input: &str) -> String {
    let s = strip_outer_fence(input);
    let s = normalise_line_endings(&s);
    let s = drop_preamble(&s);
    let s = trim_trailing_whitespace(&s);
    let s = demote_extra_titles(&s);
    let s = space_headings(&s);
    let s = unlink_placeholder_images(&s);
    let s = remove_invisible_chars(&s);
    let s = collapse_blank_lines(&s);
    ensure_final_newline(&s)
}

static RE_OUTER_FENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)^```((?:markdown|md)?)[ \t]*\r?\n(.*?)\r?\n```\s*$").expect("valid fence regex")
});

/// An untagged fence only counts as a wrapper when nothing inside it is a
/// fence line; otherwise the text merely starts and ends with code blocks.
fn strip_outer_fence(input: &str) -> String {
    let Some(caps) = RE_OUTER_FENCE.captures(input.trim()) else {
        return input.to_string();
    };
    let inner = &caps[2];
    let tagged = !caps[1].is_empty();
    if !tagged && inner.lines().any(|l| l.trim_start().starts_with("```")) {
        return input.to_string();
    }
    inner.to_string()
}

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

fn is_heading(line: &str) -> bool {
    let hashes = line.chars().take_while(|&c| c == '#').count();
    (1..=6).contains(&hashes) && line[hashes..].starts_with(' ')
}

/// A single short line ending in ':' before the first heading is chatter.
fn drop_preamble(input: &str) -> String {
    let lines: Vec<&str> = input.lines().collect();
    let Some(first_heading) = lines.iter().position(|l| is_heading(l)) else {
        return input.to_string();
    };
    let before: Vec<&str> = lines[..first_heading]
        .iter()
        .copied()
        .filter(|l| !l.trim().is_empty())
        .collect();
    match before.as_slice() {
        [only] if only.trim_end().ends_with(':') && only.len() < 120 => {
            lines[first_heading..].join("\n")
        }
        _ => input.to_string(),
    }
}

fn trim_trailing_whitespace(input: &str) -> String {
    input
        .lines()
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n")
}

/// An article has one title; later level-1 headings become sections.
fn demote_extra_titles(input: &str) -> String {
    let mut seen_title = false;
    let mut in_code = false;
    input
        .lines()
        .map(|line| {
            if line.starts_with("```") {
                in_code = !in_code;
            }
            if !in_code && line.starts_with("# ") {
                if seen_title {
                    return format!("#{line}");
                }
                seen_title = true;
            }
            line.to_string()
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn space_headings(input: &str) -> String {
    let mut out: Vec<&str> = Vec::new();
    let mut in_code = false;
    let lines: Vec<&str> = input.lines().collect();
    for (i, line) in lines.iter().enumerate() {
        if line.starts_with("```") {
            in_code = !in_code;
        }
        let heading = !in_code && is_heading(line);
        if heading && out.last().is_some_and(|prev| !prev.is_empty()) {
            out.push("");
        }
        out.push(line);
        if heading && lines.get(i + 1).is_some_and(|next| !next.is_empty()) {
            out.push("");
        }
    }
    out.join("\n")
}

static RE_IMAGE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"!\[([^\]]*)\]\(([^)]*)\)").expect("valid image regex"));

/// The article has no image files next to it, so only absolute links to
/// real hosts can resolve.
fn is_placeholder_url(url: &str) -> bool {
    const FAKE_HOSTS: [&str; 4] = [
        "example.com",
        "placeholder.com",
        "placehold.it",
        "dummyimage.com",
    ];
    let u = url.trim();
    !(u.starts_with("http://") || u.starts_with("https://"))
        || FAKE_HOSTS.iter().any(|h| u.contains(h))
}

fn unlink_placeholder_images(input: &str) -> String {
    RE_IMAGE
        .replace_all(input, |caps: &regex::Captures<'_>| {
            if !is_placeholder_url(&caps[2]) {
                return caps[0].to_string();
            }
            match caps[1].trim() {
                "" => String::new(),
                alt => format!("*{alt}*"),
            }
        })
        .into_owned()
}

fn remove_invisible_chars(input: &str) -> String {
    input.replace(['\u{200B}', '\u{200C}', '\u{200D}', '\u{2060}', '\u{FEFF}'], "")
}

static RE_BLANK_RUN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\n{3,}").expect("valid blank-line regex"));

fn collapse_blank_lines(input: &str) -> String {
    RE_BLANK_RUN.replace_all(input, "\n\n").into_owned()
}

fn ensure_final_newline(input: &str) -> String {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        String::from("\n")
    } else {
        format!("{trimmed}\n")
    }
}
