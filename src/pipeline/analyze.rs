//! Page analysis: one slide in, one [`PageAnalysis`] out.
//!
//! The analyzer never fails. A generation failure (including a timeout) is
//! recorded as a `Failed` analysis with a placeholder naming the slide, so
//! one bad slide cannot stop the slides after it.

use crate::config::ArticleConfig;
use crate::document::{Page, PageAnalysis};
use crate::generation::{ContentGenerator, GenerationParameters, GenerationRequest, GenerationResponse};
use crate::prompts::{fill, DEFAULT_PAGE_PROMPT};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

/// Builds slide-analysis requests and normalises their results.
pub struct PageAnalyzer {
    client: Arc<dyn ContentGenerator>,
    template: String,
    language: String,
    parameters: GenerationParameters,
    include_images: bool,
}

impl PageAnalyzer {
    pub fn new(client: Arc<dyn ContentGenerator>, config: &ArticleConfig) -> Self {
        Self {
            client,
            template: config
                .page_prompt
                .clone()
                .unwrap_or_else(|| DEFAULT_PAGE_PROMPT.to_string()),
            language: config.language.clone(),
            parameters: config.page_parameters.clone(),
            include_images: config.include_images,
        }
    }

    /// The request sent for `page`.
    pub fn build_request(&self, page: &Page) -> GenerationRequest {
        let page_number = page.number().to_string();
        let page_text = if page.text.trim().is_empty() {
            "(no text could be extracted from this slide)"
        } else {
            page.text.as_str()
        };
        // Slide text goes in last so braces inside it are never treated as placeholders.
        let prompt = fill(
            &self.template,
            &[
                ("language", self.language.as_str()),
                ("page_number", page_number.as_str()),
                ("page_text", page_text),
            ],
        );
        let request = GenerationRequest::text(prompt, self.parameters.clone());
        match (&page.image, self.include_images) {
            (Some(image), true) => request.with_image(image.clone()),
            _ => request,
        }
    }

    /// Analyse one page. Always returns an analysis for `page.index`.
    pub async fn analyze(&self, page: &Page) -> PageAnalysis {
        let start = Instant::now();
        let request = self.build_request(page);
        debug!(
            "Page {}: analysing ({} text chars, image: {})",
            page.number(),
            page.text.len(),
            request.image.is_some()
        );

        match self.client.generate(request).await {
            GenerationResponse::Success { text, usage } => {
                PageAnalysis::ok(page.index, text).with_usage(usage, elapsed_ms(start))
            }
            GenerationResponse::Failure { kind, message } => {
                warn!("Page {}: analysis failed ({}): {}", page.number(), kind, message);
                PageAnalysis::failed(page.index, format!("{kind}: {message}"))
                    .with_usage(Default::default(), elapsed_ms(start))
            }
        }
    }
}

fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}
