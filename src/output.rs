//! Output types returned by the article entry points.

use crate::document::Document;
use crate::generation::TokenUsage;
use serde::Serialize;

/// The synthesised article.
///
/// `raw_markdown` is always the complete article. `introduction` and
/// `closing` are only populated by the split-sections strategy; with a single
/// call the whole text sits in `body` as well.
#[derive(Debug, Clone, Serialize)]
pub struct Article {
    pub introduction: Option<String>,
    pub body: String,
    pub closing: Option<String>,
    pub raw_markdown: String,
    #[serde(skip)]
    pub usage: TokenUsage,
}

impl Article {
    /// Text of the first level-1 heading, if the article has one.
    pub fn title(&self) -> Option<&str> {
        self.raw_markdown
            .lines()
            .find_map(|l| l.strip_prefix("# "))
            .map(str::trim)
            .filter(|t| !t.is_empty())
    }

    /// Level-2 section headings, in order.
    pub fn sections(&self) -> Vec<&str> {
        self.raw_markdown
            .lines()
            .filter_map(|l| l.strip_prefix("## "))
            .map(str::trim)
            .collect()
    }
}

/// Document-level metadata read from the PDF.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DeckMetadata {
    pub title: Option<String>,
    pub author: Option<String>,
    pub subject: Option<String>,
    pub creator: Option<String>,
    pub page_count: usize,
}

/// Counters and timings for one run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunStats {
    pub total_pages: usize,
    pub ok_pages: usize,
    pub failed_pages: usize,
    pub input_tokens: usize,
    pub output_tokens: usize,
    pub analysis_duration_ms: u64,
    pub synthesis_duration_ms: u64,
    pub total_duration_ms: u64,
}

impl RunStats {
    /// Page counters and token totals from a finished document.
    pub fn from_document(document: &Document) -> Self {
        let (input_tokens, output_tokens) = document
            .analyses
            .iter()
            .fold((0, 0), |(i, o), a| (i + a.usage.input_tokens, o + a.usage.output_tokens));
        Self {
            total_pages: document.pages.len(),
            ok_pages: document.ok_count(),
            failed_pages: document.failed_count(),
            input_tokens,
            output_tokens,
            ..Default::default()
        }
    }

    /// Add the synthesis token usage.
    pub fn add_usage(&mut self, usage: &TokenUsage) {
        self.input_tokens += usage.input_tokens;
        self.output_tokens += usage.output_tokens;
    }
}

/// Everything a run produced.
///
/// `article` is `None` when synthesis did not happen: the document was empty
/// or the run was cancelled before every page was analysed.
#[derive(Debug, Clone, Serialize)]
pub struct ArticleOutput {
    pub document: Document,
    pub article: Option<Article>,
    pub stats: RunStats,
}

impl ArticleOutput {
    /// Article Markdown, or an empty string when there is none.
    pub fn markdown(&self) -> &str {
        self.article
            .as_ref()
            .map(|a| a.raw_markdown.as_str())
            .unwrap_or("")
    }
}
