//! Synthesis: reorganise every page analysis into one article.
//!
//! ## Strategies
//!
//! * [`SynthesisStrategy::SingleCall`]: one request returns the complete
//!   article; the response (after [`polish_article`]) is the article's
//!   Markdown.
//! * [`SynthesisStrategy::SplitSections`]: a framing request writes the
//!   introduction and the closing in a marker format, a body request writes
//!   the core sections, and the article is assembled from the three parts.
//!
//! Unlike page analysis, a failed synthesis call is never papered over: there
//! is no sensible placeholder for a whole article, so the error goes back to
//! the caller, who still holds the analyses and can retry.
//!
//! Every call is raced against the run's [`CancellationHandle`]; once it
//! fires no further synthesis request is sent and the in-flight one is
//! dropped.

use crate::cancel::CancellationHandle;
use crate::config::{ArticleConfig, SynthesisStrategy};
use crate::document::PageAnalysis;
use crate::error::{SynthesisError, SynthesisStage};
use crate::generation::{
    ContentGenerator, GenerationParameters, GenerationRequest, GenerationResponse, TokenUsage,
};
use crate::output::Article;
use crate::pipeline::postprocess::polish_article;
use crate::prompts::{
    fill, title_hint, ARTICLE_PROMPT, BODY_PROMPT, CLOSING_MARKER, FRAMING_PROMPT,
    INTRODUCTION_MARKER,
};
use std::sync::Arc;
use tracing::{debug, info};

/// Fallback title when neither the caller nor the deck supplies one.
const UNTITLED: &str = "Untitled Presentation";

/// Writes the final article from ordered page analyses.
pub struct Synthesizer {
    client: Arc<dyn ContentGenerator>,
    strategy: SynthesisStrategy,
    language: String,
    min_words: usize,
    title: Option<String>,
    parameters: GenerationParameters,
    cancellation: CancellationHandle,
}

impl Synthesizer {
    pub fn new(client: Arc<dyn ContentGenerator>, config: &ArticleConfig) -> Self {
        Self {
            client,
            strategy: config.strategy,
            language: config.language.clone(),
            min_words: config.min_words,
            title: config.title.clone(),
            parameters: config.synthesis_parameters.clone(),
            cancellation: config.cancellation.clone().unwrap_or_default(),
        }
    }

    pub fn with_cancellation(mut self, handle: CancellationHandle) -> Self {
        self.cancellation = handle;
        self
    }

    /// Use `title` unless the config already named one.
    pub fn with_fallback_title(mut self, title: Option<String>) -> Self {
        if self.title.is_none() {
            self.title = title.filter(|t| !t.trim().is_empty());
        }
        self
    }

    /// Synthesise an article. `analyses` must be in page order.
    pub async fn synthesize(&self, analyses: &[PageAnalysis]) -> Result<Article, SynthesisError> {
        if analyses.is_empty() {
            return Err(SynthesisError::NoContent);
        }
        let content = grounding_text(analyses);
        info!(
            "Synthesising article from {} analyses ({} chars, {:?})",
            analyses.len(),
            content.len(),
            self.strategy
        );

        match self.strategy {
            SynthesisStrategy::SingleCall => self.single_call(&content).await,
            SynthesisStrategy::SplitSections => self.split_sections(&content).await,
        }
    }

    async fn single_call(&self, content: &str) -> Result<Article, SynthesisError> {
        let min_words = self.min_words.to_string();
        let hint = title_hint(self.title.as_deref());
        let prompt = fill(
            ARTICLE_PROMPT,
            &[
                ("language", self.language.as_str()),
                ("min_words", min_words.as_str()),
                ("title_hint", hint.as_str()),
                ("content", content),
            ],
        );
        let (text, usage) = self.call(SynthesisStage::Article, prompt).await?;
        let raw_markdown = polish_article(&text);
        Ok(Article {
            introduction: None,
            body: raw_markdown.clone(),
            closing: None,
            raw_markdown,
            usage,
        })
    }

    async fn split_sections(&self, content: &str) -> Result<Article, SynthesisError> {
        let min_words = self.min_words.to_string();
        let framing_prompt = fill(
            FRAMING_PROMPT,
            &[("language", self.language.as_str()), ("content", content)],
        );
        let body_prompt = fill(
            BODY_PROMPT,
            &[
                ("language", self.language.as_str()),
                ("min_words", min_words.as_str()),
                ("content", content),
            ],
        );

        let (framing, framing_usage) = self.call(SynthesisStage::Framing, framing_prompt).await?;
        let marked = framing.contains(CLOSING_MARKER);
        let (introduction, closing) = split_marked_sections(&framing);
        let (body, body_usage) = self.call(SynthesisStage::Body, body_prompt).await?;

        let introduction = if marked {
            strip_marker(&introduction, INTRODUCTION_MARKER)
        } else {
            introduction
        };
        let body = body.trim().to_string();
        let closing = closing.trim().to_string();
        let raw_markdown = polish_article(&assemble(
            self.title.as_deref().unwrap_or(UNTITLED),
            &introduction,
            &body,
            &closing,
        ));

        Ok(Article {
            introduction: Some(introduction),
            body,
            closing: Some(closing),
            raw_markdown,
            usage: TokenUsage {
                input_tokens: framing_usage.input_tokens + body_usage.input_tokens,
                output_tokens: framing_usage.output_tokens + body_usage.output_tokens,
            },
        })
    }

    async fn call(
        &self,
        stage: SynthesisStage,
        prompt: String,
    ) -> Result<(String, TokenUsage), SynthesisError> {
        if self.cancellation.is_cancelled() {
            return Err(SynthesisError::Cancelled { stage });
        }
        debug!("Synthesis {} request: {} prompt chars", stage, prompt.len());
        let request = GenerationRequest::text(prompt, self.parameters.clone());
        let response = tokio::select! {
            biased;
            _ = self.cancellation.cancelled() => {
                info!("Synthesis {} call cancelled", stage);
                return Err(SynthesisError::Cancelled { stage });
            }
            response = self.client.generate(request) => response,
        };
        match response {
            GenerationResponse::Success { text, usage } => Ok((text, usage)),
            GenerationResponse::Failure { kind, message } => {
                Err(SynthesisError::Generation { stage, kind, message })
            }
        }
    }
}

/// Every analysis, in order, each under its slide label.
///
/// Failed pages contribute their placeholder so the model knows a slide is
/// missing rather than silently merging its neighbours.
pub fn grounding_text(analyses: &[PageAnalysis]) -> String {
    analyses
        .iter()
        .map(|a| format!("[Slide {}]\n{}", a.page_index + 1, a.content.trim()))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Split a framing response on [`CLOSING_MARKER`].
///
/// Returns `(introduction, closing)`. Without the marker the entire response,
/// untouched, is the introduction and the closing is empty; the service does
/// not guarantee the format, so this is a normal outcome, not an error.
pub fn split_marked_sections(response: &str) -> (String, String) {
    match response.split_once(CLOSING_MARKER) {
        Some((intro, closing)) => (intro.to_string(), closing.to_string()),
        None => (response.to_string(), String::new()),
    }
}

/// Remove a leading marker line and surrounding whitespace.
fn strip_marker(section: &str, marker: &str) -> String {
    let trimmed = section.trim();
    trimmed
        .strip_prefix(marker)
        .unwrap_or(trimmed)
        .trim()
        .to_string()
}

/// Lay out the split-strategy parts under the article's section convention.
fn assemble(title: &str, introduction: &str, body: &str, closing: &str) -> String {
    let mut out = format!("# {title}\n\n## Introduction\n\n{introduction}\n\n{body}\n");
    if !closing.is_empty() {
        out.push_str(&format!("\n## Looking Ahead\n\n{closing}\n"));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::FailureKind;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Answers requests in order from a script and records prompts.
    struct Script {
        answers: Mutex<Vec<GenerationResponse>>,
        prompts: Mutex<Vec<String>>,
    }

    impl Script {
        fn new(answers: Vec<GenerationResponse>) -> Arc<Self> {
            Arc::new(Self {
                answers: Mutex::new(answers),
                prompts: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl ContentGenerator for Script {
        async fn generate(&self, request: GenerationRequest) -> GenerationResponse {
            self.prompts.lock().unwrap().push(request.prompt);
            self.answers.lock().unwrap().remove(0)
        }
    }

    fn analyses() -> Vec<PageAnalysis> {
        vec![
            PageAnalysis::ok(0, "### Ownership\nEach value has one owner."),
            PageAnalysis::failed(1, "timeout"),
            PageAnalysis::ok(2, "### Borrowing\nReferences never outlive data."),
        ]
    }

    #[test]
    fn split_without_marker_keeps_whole_response() {
        let (intro, closing) = split_marked_sections("Hello world");
        assert_eq!(intro, "Hello world");
        assert_eq!(closing, "");
    }

    #[test]
    fn split_with_marker() {
        let (intro, closing) =
            split_marked_sections("[INTRODUCTION]\nWhy Rust.\n[CLOSING]\nWhat next.");
        assert_eq!(strip_marker(&intro, INTRODUCTION_MARKER), "Why Rust.");
        assert_eq!(closing.trim(), "What next.");
    }

    #[test]
    fn grounding_keeps_order_and_placeholders() {
        let text = grounding_text(&analyses());
        let own = text.find("Ownership").unwrap();
        let missing = text.find("Slide 2 could not be analysed").unwrap();
        let borrow = text.find("Borrowing").unwrap();
        assert!(own < missing && missing < borrow);
        assert!(text.starts_with("[Slide 1]"));
    }

    #[tokio::test]
    async fn single_call_uses_response_as_article() {
        let script = Script::new(vec![GenerationResponse::success(
            "```markdown\n# Rust\n\n## Introduction\nHi\n```",
        )]);
        let s = Synthesizer::new(script.clone(), &ArticleConfig::default());
        let article = s.synthesize(&analyses()).await.expect("synthesis succeeds");
        assert!(article.raw_markdown.starts_with("# Rust"));
        assert_eq!(article.body, article.raw_markdown);
        assert!(article.introduction.is_none());
        assert_eq!(script.prompts.lock().unwrap().len(), 1);
        assert!(script.prompts.lock().unwrap()[0].contains("Slide 2 could not be analysed"));
    }

    #[tokio::test]
    async fn split_sections_assembles_parts() {
        let script = Script::new(vec![
            GenerationResponse::success("[INTRODUCTION]\nWhy Rust.\n[CLOSING]\nWhat next."),
            GenerationResponse::success("## Background\nHistory.\n\n## Core Content\nDetails."),
        ]);
        let config = ArticleConfig::builder()
            .strategy(SynthesisStrategy::SplitSections)
            .title("Rust Ownership")
            .build()
            .unwrap();
        let article = Synthesizer::new(script, &config)
            .synthesize(&analyses())
            .await
            .expect("synthesis succeeds");
        assert_eq!(article.introduction.as_deref(), Some("Why Rust."));
        assert_eq!(article.closing.as_deref(), Some("What next."));
        assert!(article.raw_markdown.starts_with("# Rust Ownership\n"));
        let intro = article.raw_markdown.find("## Introduction").unwrap();
        let core = article.raw_markdown.find("## Core Content").unwrap();
        let ahead = article.raw_markdown.find("## Looking Ahead").unwrap();
        assert!(intro < core && core < ahead);
    }

    #[tokio::test]
    async fn split_sections_without_marker_has_empty_closing() {
        let script = Script::new(vec![
            GenerationResponse::success("Hello world"),
            GenerationResponse::success("## Core Content\nDetails."),
        ]);
        let config = ArticleConfig::builder()
            .strategy(SynthesisStrategy::SplitSections)
            .build()
            .unwrap();
        let article = Synthesizer::new(script, &config)
            .synthesize(&analyses())
            .await
            .unwrap();
        assert_eq!(article.introduction.as_deref(), Some("Hello world"));
        assert_eq!(article.closing.as_deref(), Some(""));
        assert!(!article.raw_markdown.contains("## Looking Ahead"));
    }

    #[tokio::test]
    async fn framing_without_marker_is_kept_verbatim() {
        let framing = "  [INTRODUCTION]\nNo closing here.\n";
        let script = Script::new(vec![
            GenerationResponse::success(framing),
            GenerationResponse::success("## Core Content\nDetails."),
        ]);
        let config = ArticleConfig::builder()
            .strategy(SynthesisStrategy::SplitSections)
            .build()
            .unwrap();
        let article = Synthesizer::new(script, &config)
            .synthesize(&analyses())
            .await
            .unwrap();
        assert_eq!(article.introduction.as_deref(), Some(framing));
        assert_eq!(article.closing.as_deref(), Some(""));
    }

    #[tokio::test]
    async fn cancelled_handle_sends_no_request() {
        let script = Script::new(vec![]);
        let handle = CancellationHandle::new();
        handle.cancel();
        let err = Synthesizer::new(script.clone(), &ArticleConfig::default())
            .with_cancellation(handle)
            .synthesize(&analyses())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            SynthesisError::Cancelled {
                stage: SynthesisStage::Article
            }
        ));
        assert!(script.prompts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn cancel_drops_in_flight_call() {
        struct Stalls;

        #[async_trait]
        impl ContentGenerator for Stalls {
            async fn generate(&self, _request: GenerationRequest) -> GenerationResponse {
                tokio::time::sleep(std::time::Duration::from_secs(3600)).await;
                GenerationResponse::success("never")
            }
        }

        let handle = CancellationHandle::new();
        let trigger = handle.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            trigger.cancel();
        });
        let result = tokio::time::timeout(
            std::time::Duration::from_secs(5),
            Synthesizer::new(Arc::new(Stalls), &ArticleConfig::default())
                .with_cancellation(handle)
                .synthesize(&analyses()),
        )
        .await
        .expect("cancel must interrupt the call");
        assert!(matches!(result, Err(SynthesisError::Cancelled { .. })));
    }

    #[tokio::test]
    async fn failure_is_surfaced() {
        let script = Script::new(vec![GenerationResponse::failure(
            FailureKind::ServiceUnavailable,
            "503",
        )]);
        let err = Synthesizer::new(script, &ArticleConfig::default())
            .synthesize(&analyses())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            SynthesisError::Generation {
                stage: SynthesisStage::Article,
                kind: FailureKind::ServiceUnavailable,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn empty_input_is_rejected_without_calls() {
        let script = Script::new(vec![]);
        let err = Synthesizer::new(script.clone(), &ArticleConfig::default())
            .synthesize(&[])
            .await
            .unwrap_err();
        assert!(matches!(err, SynthesisError::NoContent));
        assert!(script.prompts.lock().unwrap().is_empty());
    }

    #[test]
    fn fallback_title_only_when_unset() {
        let script = Script::new(vec![]);
        let config = ArticleConfig::builder().title("Given").build().unwrap();
        let s = Synthesizer::new(script.clone(), &config).with_fallback_title(Some("Meta".into()));
        assert_eq!(s.title.as_deref(), Some("Given"));
        let s = Synthesizer::new(script, &ArticleConfig::default())
            .with_fallback_title(Some("Meta".into()));
        assert_eq!(s.title.as_deref(), Some("Meta"));
    }
}
