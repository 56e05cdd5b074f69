//! The document pipeline: drive the analyzer over every page, in order.
//!
//! Pages are fed through an order-preserving buffered stream, so with
//! `concurrency = 1` each slide is analysed only after the previous one
//! finished, and with higher values up to `concurrency` requests overlap
//! while results still come back in slide order. The `Document` under
//! construction is a local of [`DocumentPipeline::run_loaded`]; nothing
//! outlives the run.

use crate::cancel::CancellationHandle;
use crate::document::{Document, Page, PageAnalysis, RunStatus};
use crate::error::PageError;
use crate::pipeline::analyze::PageAnalyzer;
use crate::progress::{NoopProgressCallback, PipelineProgressCallback, ProgressCallback};
use crate::source::PageSource;
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// A page as loaded from its source, or the reason it could not be.
type Loaded = (Page, Option<PageError>);

/// Runs page analysis over a whole deck.
pub struct DocumentPipeline {
    analyzer: PageAnalyzer,
    concurrency: usize,
    progress: ProgressCallback,
    cancellation: CancellationHandle,
}

impl DocumentPipeline {
    pub fn new(analyzer: PageAnalyzer) -> Self {
        Self {
            analyzer,
            concurrency: 1,
            progress: Arc::new(NoopProgressCallback),
            cancellation: CancellationHandle::new(),
        }
    }

    /// Maximum analyses in flight. Clamped to at least 1.
    pub fn with_concurrency(mut self, n: usize) -> Self {
        self.concurrency = n.max(1);
        self
    }

    pub fn with_progress(mut self, progress: ProgressCallback) -> Self {
        self.progress = progress;
        self
    }

    pub fn with_cancellation(mut self, handle: CancellationHandle) -> Self {
        self.cancellation = handle;
        self
    }

    /// Analyse already-loaded pages, in the order given.
    pub async fn run(&self, pages: Vec<Page>) -> Document {
        self.run_loaded(pages.into_iter().map(|p| (p, None)).collect())
            .await
    }

    /// Load every page of `source` and analyse it.
    ///
    /// A page the source cannot supply becomes a failed analysis without a
    /// generation call.
    pub async fn run_source(&self, source: &dyn PageSource) -> Document {
        let loaded = (0..source.page_count())
            .map(|i| match source.load_page(i) {
                Ok(page) => (page, None),
                Err(e) => {
                    warn!("{}", e);
                    (Page::new(i, String::new(), None), Some(e))
                }
            })
            .collect();
        self.run_loaded(loaded).await
    }

    async fn run_loaded(&self, loaded: Vec<Loaded>) -> Document {
        let total = loaded.len();
        if total == 0 {
            info!("Document has no pages; nothing to analyse");
            return Document::empty();
        }

        info!("Analysing {} pages (concurrency {})", total, self.concurrency);
        self.progress.on_run_start(total);

        let mut analyses: Vec<PageAnalysis> = Vec::with_capacity(total);
        let mut status = RunStatus::Complete;

        {
            let analyzer = &self.analyzer;
            let progress = &self.progress;
            let results = stream::iter(loaded.iter())
                .map(|(page, source_error)| async move {
                    progress.on_page_start(page.number(), total);
                    match source_error {
                        Some(e) => PageAnalysis::failed(page.index, e.to_string()),
                        None => analyzer.analyze(page).await,
                    }
                })
                .buffered(self.concurrency);
            tokio::pin!(results);

            loop {
                if self.cancellation.is_cancelled() {
                    status = RunStatus::Partial;
                    break;
                }
                let next = tokio::select! {
                    biased;
                    _ = self.cancellation.cancelled() => {
                        status = RunStatus::Partial;
                        break;
                    }
                    next = results.next() => next,
                };
                let Some(analysis) = next else { break };

                self.report(&analysis, total);
                analyses.push(analysis);
                self.progress
                    .on_progress(analyses.len() as f32 / total as f32);
            }
        }

        let ok = analyses.iter().filter(|a| a.is_ok()).count();
        match status {
            RunStatus::Complete => info!("Analysed {} pages, {} ok", total, ok),
            RunStatus::Partial => warn!(
                "Run cancelled after {}/{} pages; keeping completed analyses",
                analyses.len(),
                total
            ),
        }
        self.progress.on_run_complete(total, ok);

        Document {
            pages: loaded.into_iter().map(|(page, _)| page).collect(),
            analyses,
            status,
        }
    }

    fn report(&self, analysis: &PageAnalysis, total: usize) {
        let page_num = analysis.page_index + 1;
        match analysis.error_detail {
            None => {
                debug!("Page {}: {} chars", page_num, analysis.content.len());
                self.progress
                    .on_page_complete(page_num, total, analysis.content.len());
            }
            Some(ref e) => self.progress.on_page_error(page_num, total, e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ArticleConfig;
    use crate::document::{AnalysisStatus, PageImage};
    use crate::generation::{ContentGenerator, FailureKind, GenerationRequest, GenerationResponse};
    use crate::source::MemorySource;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Echoes the slide text; fails any slide whose text contains "FAIL".
    struct Echo {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ContentGenerator for Echo {
        async fn generate(&self, request: GenerationRequest) -> GenerationResponse {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if request.prompt.contains("FAIL") {
                GenerationResponse::failure(FailureKind::ServiceUnavailable, "503")
            } else {
                let line = request
                    .prompt
                    .lines()
                    .find(|l| l.starts_with("text-"))
                    .unwrap_or("?")
                    .to_string();
                GenerationResponse::success(format!("analysis of {line}"))
            }
        }
    }

    fn pipeline() -> (DocumentPipeline, Arc<Echo>) {
        let echo = Arc::new(Echo {
            calls: AtomicUsize::new(0),
        });
        let analyzer = PageAnalyzer::new(echo.clone(), &ArticleConfig::default());
        (DocumentPipeline::new(analyzer), echo)
    }

    #[derive(Default)]
    struct Fractions(Mutex<Vec<f32>>);

    impl PipelineProgressCallback for Fractions {
        fn on_progress(&self, fraction: f32) {
            self.0.lock().unwrap().push(fraction);
        }
    }

    #[tokio::test]
    async fn analyses_follow_page_order() {
        let (p, _) = pipeline();
        let source = MemorySource::from_texts(["text-0", "text-1", "text-2"]);
        let doc = p.run_source(&source).await;
        assert_eq!(doc.status, RunStatus::Complete);
        assert_eq!(doc.analyses.len(), doc.pages.len());
        for (i, a) in doc.analyses.iter().enumerate() {
            assert_eq!(a.page_index, i);
            assert_eq!(a.content, format!("analysis of text-{i}"));
        }
    }

    #[tokio::test]
    async fn empty_input_yields_empty_document() {
        let (p, echo) = pipeline();
        let doc = p.run(Vec::new()).await;
        assert!(doc.is_empty());
        assert!(doc.analyses.is_empty());
        assert_eq!(echo.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn render_failure_is_recorded_on_the_page() {
        struct HalfRendered;

        impl PageSource for HalfRendered {
            fn page_count(&self) -> usize {
                2
            }
            fn page_text(&self, index: usize) -> Result<String, PageError> {
                Ok(format!("text-{index}"))
            }
            fn page_image(&self, index: usize) -> Result<PageImage, PageError> {
                match index {
                    0 => Err(PageError::ImageUnavailable {
                        page: 1,
                        detail: "image rendering disabled".into(),
                    }),
                    _ => Err(PageError::RenderFailed {
                        page: 2,
                        detail: "bitmap allocation".into(),
                    }),
                }
            }
        }

        let (p, echo) = pipeline();
        let doc = p.run_source(&HalfRendered).await;
        assert_eq!(doc.analyses[0].status, AnalysisStatus::Ok);
        assert_eq!(doc.analyses[1].status, AnalysisStatus::Failed);
        assert!(doc.analyses[1]
            .error_detail
            .as_deref()
            .is_some_and(|d| d.contains("rasterisation failed")));
        assert_eq!(echo.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn source_failure_skips_generation_for_that_page() {
        let (p, echo) = pipeline();
        // Blank text and no image: the source cannot supply page 2.
        let source = MemorySource::from_texts(["text-0", "", "text-2"]);
        let doc = p.run_source(&source).await;
        assert_eq!(doc.analyses.len(), 3);
        assert_eq!(doc.analyses[1].status, AnalysisStatus::Failed);
        assert!(doc.analyses[1].content.contains("Slide 2"));
        assert_eq!(echo.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn progress_reports_fraction_per_page() {
        let fractions = Arc::new(Fractions::default());
        let (p, _) = pipeline();
        let p = p.with_progress(fractions.clone());
        p.run_source(&MemorySource::from_texts(["text-0", "text-1", "text-2", "text-3"]))
            .await;
        assert_eq!(*fractions.0.lock().unwrap(), vec![0.25, 0.5, 0.75, 1.0]);
    }

    #[tokio::test]
    async fn pre_cancelled_run_is_partial_and_silent() {
        let handle = CancellationHandle::new();
        handle.cancel();
        let (p, echo) = pipeline();
        let p = p.with_cancellation(handle);
        let doc = p.run_source(&MemorySource::from_texts(["text-0", "text-1"])).await;
        assert_eq!(doc.status, RunStatus::Partial);
        assert!(doc.analyses.is_empty());
        assert_eq!(doc.pages.len(), 2);
        assert_eq!(echo.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn concurrent_run_keeps_order() {
        let (p, _) = pipeline();
        let p = p.with_concurrency(4);
        let texts: Vec<String> = (0..10).map(|i| format!("text-{i}")).collect();
        let doc = p.run_source(&MemorySource::from_texts(texts)).await;
        let indices: Vec<usize> = doc.analyses.iter().map(|a| a.page_index).collect();
        assert_eq!(indices, (0..10).collect::<Vec<_>>());
    }
}
