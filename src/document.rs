//! Per-run data: pages, their analyses, and the document that owns both.
//!
//! A [`Document`] is created by one pipeline run and handed back to the
//! caller; nothing here is shared between runs.

use crate::generation::TokenUsage;
use crate::prompts::failed_page_placeholder;
use serde::{Deserialize, Serialize};
use std::fmt;

/// An encoded raster image of one page.
#[derive(Clone, PartialEq, Eq)]
pub struct PageImage {
    pub bytes: Vec<u8>,
    /// e.g. `image/png`.
    pub mime_type: String,
}

impl PageImage {
    pub fn new(bytes: Vec<u8>, mime_type: impl Into<String>) -> Self {
        Self {
            bytes,
            mime_type: mime_type.into(),
        }
    }
}

impl fmt::Debug for PageImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PageImage")
            .field("mime_type", &self.mime_type)
            .field("bytes", &self.bytes.len())
            .finish()
    }
}

/// One slide of the source deck.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page {
    /// 0-based position in the deck.
    pub index: usize,
    /// Extracted text; may be empty for image-only slides.
    pub text: String,
    #[serde(skip)]
    pub image: Option<PageImage>,
}

impl Page {
    pub fn new(index: usize, text: impl Into<String>, image: Option<PageImage>) -> Self {
        Self {
            index,
            text: text.into(),
            image,
        }
    }

    /// 1-based page number for prompts and messages.
    pub fn number(&self) -> usize {
        self.index + 1
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnalysisStatus {
    Ok,
    Failed,
}

/// The generated explanation of one page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageAnalysis {
    pub page_index: usize,
    pub status: AnalysisStatus,
    /// Generated text, or a placeholder naming the page when `Failed`.
    pub content: String,
    pub error_detail: Option<String>,
    #[serde(default)]
    pub usage: TokenUsage,
    #[serde(default)]
    pub duration_ms: u64,
}

impl PageAnalysis {
    pub fn ok(page_index: usize, content: impl Into<String>) -> Self {
        Self {
            page_index,
            status: AnalysisStatus::Ok,
            content: content.into(),
            error_detail: None,
            usage: TokenUsage::default(),
            duration_ms: 0,
        }
    }

    /// A failed analysis whose content is the deterministic placeholder.
    pub fn failed(page_index: usize, detail: impl Into<String>) -> Self {
        Self {
            page_index,
            status: AnalysisStatus::Failed,
            content: failed_page_placeholder(page_index + 1),
            error_detail: Some(detail.into()),
            usage: TokenUsage::default(),
            duration_ms: 0,
        }
    }

    pub fn with_usage(mut self, usage: TokenUsage, duration_ms: u64) -> Self {
        self.usage = usage;
        self.duration_ms = duration_ms;
        self
    }

    pub fn is_ok(&self) -> bool {
        self.status == AnalysisStatus::Ok
    }
}

/// How a pipeline run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunStatus {
    /// Every page has an analysis (some may be `Failed`).
    Complete,
    /// Cancelled; only a prefix of the pages has analyses.
    Partial,
}

/// Pages and their analyses from one run, index-aligned.
#[derive(Debug, Clone, Serialize)]
pub struct Document {
    pub pages: Vec<Page>,
    pub analyses: Vec<PageAnalysis>,
    pub status: RunStatus,
}

impl Document {
    pub fn empty() -> Self {
        Self {
            pages: Vec::new(),
            analyses: Vec::new(),
            status: RunStatus::Complete,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    pub fn is_complete(&self) -> bool {
        self.status == RunStatus::Complete
    }

    pub fn ok_count(&self) -> usize {
        self.analyses.iter().filter(|a| a.is_ok()).count()
    }

    pub fn failed_count(&self) -> usize {
        self.analyses.len() - self.ok_count()
    }

    pub fn failed_pages(&self) -> impl Iterator<Item = &PageAnalysis> {
        self.analyses.iter().filter(|a| !a.is_ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failed_analysis_names_page_number() {
        let a = PageAnalysis::failed(1, "timeout");
        assert_eq!(a.status, AnalysisStatus::Failed);
        assert_eq!(a.page_index, 1);
        assert!(a.content.contains('2'), "got: {}", a.content);
        assert_eq!(a.error_detail.as_deref(), Some("timeout"));
    }

    #[test]
    fn placeholder_is_deterministic() {
        assert_eq!(
            PageAnalysis::failed(3, "a").content,
            PageAnalysis::failed(3, "b").content
        );
    }

    #[test]
    fn counts() {
        let doc = Document {
            pages: (0..3).map(|i| Page::new(i, "", None)).collect(),
            analyses: vec![
                PageAnalysis::ok(0, "x"),
                PageAnalysis::failed(1, "boom"),
                PageAnalysis::ok(2, "y"),
            ],
            status: RunStatus::Complete,
        };
        assert_eq!(doc.ok_count(), 2);
        assert_eq!(doc.failed_count(), 1);
        assert_eq!(doc.failed_pages().next().map(|a| a.page_index), Some(1));
    }

    #[test]
    fn image_debug_hides_bytes() {
        let img = PageImage::new(vec![0u8; 2048], "image/png");
        let dbg = format!("{img:?}");
        assert!(dbg.contains("2048"));
        assert!(!dbg.contains("0, 0"));
    }

    #[test]
    fn analysis_json_round_trip_defaults_usage() {
        let json = r#"{"page_index":0,"status":"Ok","content":"hi","error_detail":null}"#;
        let a: PageAnalysis = serde_json::from_str(json).expect("valid analysis json");
        assert_eq!(a.usage, TokenUsage::default());
        assert!(a.is_ok());
    }
}
