//! Progress-callback trait for pipeline events.
//!
//! Inject an [`Arc<dyn PipelineProgressCallback>`] via
//! [`crate::config::ArticleConfigBuilder::progress_callback`] to observe a
//! run. The pipeline only notifies; an observer has no say in control flow,
//! and callbacks are plain synchronous calls that must return promptly.
//!
//! # Example
//!
//! ```rust
//! use slide2article::{ArticleConfig, PipelineProgressCallback};
//! use std::sync::{Arc, Mutex};
//!
//! struct Fractions(Mutex<Vec<f32>>);
//!
//! impl PipelineProgressCallback for Fractions {
//!     fn on_progress(&self, fraction: f32) {
//!         self.0.lock().unwrap().push(fraction);
//!     }
//! }
//!
//! let observer = Arc::new(Fractions(Mutex::new(Vec::new())));
//! let config = ArticleConfig::builder()
//!     .progress_callback(observer as Arc<dyn PipelineProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the pipeline as it analyses pages and synthesises the article.
///
/// All methods default to no-ops. With `concurrency > 1` the page events
/// still arrive in page order, but from whichever worker thread polls the
/// run, so implementations must be `Send + Sync`.
pub trait PipelineProgressCallback: Send + Sync {
    /// Called once before the first page, with the number of pages.
    fn on_run_start(&self, total_pages: usize) {
        let _ = total_pages;
    }

    /// Called just before a page's analysis request is issued.
    ///
    /// `page_num` is 1-indexed.
    fn on_page_start(&self, page_num: usize, total_pages: usize) {
        let _ = (page_num, total_pages);
    }

    /// Called when a page was analysed successfully.
    fn on_page_complete(&self, page_num: usize, total_pages: usize, content_len: usize) {
        let _ = (page_num, total_pages, content_len);
    }

    /// Called when a page's analysis failed and a placeholder was recorded.
    fn on_page_error(&self, page_num: usize, total_pages: usize, error: &str) {
        let _ = (page_num, total_pages, error);
    }

    /// Overall progress in `[0, 1]`: `completed / total` after each page,
    /// then `1.0` once more after synthesis.
    fn on_progress(&self, fraction: f32) {
        let _ = fraction;
    }

    /// Called once after all pages have been attempted (or the run was cancelled).
    fn on_run_complete(&self, total_pages: usize, ok_pages: usize) {
        let _ = (total_pages, ok_pages);
    }

    /// Called before the synthesis request(s).
    fn on_synthesis_start(&self, analyses: usize) {
        let _ = analyses;
    }

    /// Called when the article is ready.
    fn on_synthesis_complete(&self, markdown_len: usize) {
        let _ = markdown_len;
    }
}

/// The default when no callback is configured.
pub struct NoopProgressCallback;

impl PipelineProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ArticleConfig`].
pub type ProgressCallback = Arc<dyn PipelineProgressCallback>;
