//! Configuration types for slide-to-article runs.
//!
//! All run behaviour is controlled through [`ArticleConfig`], built via its
//! [`ArticleConfigBuilder`]. Generation parameters are grouped per call site
//! ([`GenerationParameters`] for page analysis and for synthesis) instead of
//! being scattered across the code that issues the requests.

use crate::cancel::CancellationHandle;
use crate::error::Slide2ArticleError;
use crate::generation::{CallPolicy, ContentGenerator, GenerationParameters};
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Default output language of the article.
pub const DEFAULT_LANGUAGE: &str = "Traditional Chinese";

/// Configuration for one slide-deck-to-article run.
///
/// # Example
/// ```rust
/// use slide2article::{ArticleConfig, SynthesisStrategy};
///
/// let config = ArticleConfig::builder()
///     .model("gpt-4o")
///     .language("English")
///     .strategy(SynthesisStrategy::SplitSections)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ArticleConfig {
    /// Longest edge, in pixels, of each rendered slide image. Default: 1600.
    ///
    /// Slides are mostly large type and diagrams; 1600 px keeps them legible
    /// to a vision model while staying far below upload limits.
    pub max_rendered_pixels: u32,

    /// Number of page analyses in flight at once. Default: 1.
    ///
    /// 1 processes slides strictly one after another. Higher values fan out
    /// over an order-preserving buffer, so the article still reads in slide
    /// order; lower it again if the provider answers with 429s.
    pub concurrency: usize,

    /// Model used to build the provider, e.g. "gpt-4o". Provider default if None.
    pub model: Option<String>,

    /// LLM provider name (e.g. "openai", "anthropic", "ollama").
    pub provider_name: Option<String>,

    /// Pre-constructed generator. Takes precedence over `provider_name`.
    pub generator: Option<Arc<dyn ContentGenerator>>,

    /// Parameters for each slide analysis. Default: 1000 tokens, temperature 0.3.
    /// A `model` set here overrides `model` for slide analysis.
    pub page_parameters: GenerationParameters,

    /// Parameters for synthesis. Default: 8000 tokens, temperature 0.5.
    ///
    /// When `model` is set here, synthesis gets its own provider instance so a
    /// stronger (or cheaper) model can write the article.
    pub synthesis_parameters: GenerationParameters,

    /// Retry attempts on a transient generation failure. Default: 2.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds; doubles per attempt. Default: 500.
    pub retry_backoff_ms: u64,

    /// Bound on each generation attempt in seconds. Default: 90.
    pub api_timeout_secs: u64,

    /// Language the explanations and the article are written in.
    pub language: String,

    /// Custom slide prompt; must contain `{page_text}`.
    pub page_prompt: Option<String>,

    /// Attach slide images to analysis requests. Default: true.
    pub include_images: bool,

    /// How the article is synthesised. Default: [`SynthesisStrategy::SingleCall`].
    pub strategy: SynthesisStrategy,

    /// Minimum article length requested from the model, in words. Default: 2000.
    pub min_words: usize,

    /// Article title. Falls back to the PDF's metadata title, then to the model.
    pub title: Option<String>,

    /// Page selection. Default: all pages.
    pub pages: PageSelection,

    /// PDF user password for encrypted documents.
    pub password: Option<String>,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Observer for per-page and synthesis events.
    pub progress_callback: Option<ProgressCallback>,

    /// Cancels the run when triggered.
    pub cancellation: Option<CancellationHandle>,
}

impl Default for ArticleConfig {
    fn default() -> Self {
        Self {
            max_rendered_pixels: 1600,
            concurrency: 1,
            model: None,
            provider_name: None,
            generator: None,
            page_parameters: GenerationParameters::page_analysis(),
            synthesis_parameters: GenerationParameters::synthesis(),
            max_retries: 2,
            retry_backoff_ms: 500,
            api_timeout_secs: 90,
            language: DEFAULT_LANGUAGE.to_string(),
            page_prompt: None,
            include_images: true,
            strategy: SynthesisStrategy::default(),
            min_words: 2000,
            title: None,
            pages: PageSelection::default(),
            password: None,
            download_timeout_secs: 120,
            progress_callback: None,
            cancellation: None,
        }
    }
}

impl fmt::Debug for ArticleConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArticleConfig")
            .field("max_rendered_pixels", &self.max_rendered_pixels)
            .field("concurrency", &self.concurrency)
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field(
                "generator",
                &self.generator.as_ref().map(|_| "<dyn ContentGenerator>"),
            )
            .field("page_parameters", &self.page_parameters)
            .field("synthesis_parameters", &self.synthesis_parameters)
            .field("max_retries", &self.max_retries)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("language", &self.language)
            .field("include_images", &self.include_images)
            .field("strategy", &self.strategy)
            .field("min_words", &self.min_words)
            .field("title", &self.title)
            .field("pages", &self.pages)
            .finish()
    }
}

impl ArticleConfig {
    /// Create a new builder for `ArticleConfig`.
    pub fn builder() -> ArticleConfigBuilder {
        ArticleConfigBuilder {
            config: Self::default(),
        }
    }

    /// Timeout and retry policy for every generation call.
    pub fn call_policy(&self) -> CallPolicy {
        CallPolicy {
            timeout: Duration::from_secs(self.api_timeout_secs),
            max_retries: self.max_retries,
            backoff: Duration::from_millis(self.retry_backoff_ms),
        }
    }
}

/// Builder for [`ArticleConfig`].
pub struct ArticleConfigBuilder {
    config: ArticleConfig,
}

impl fmt::Debug for ArticleConfigBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ArticleConfigBuilder").field(&self.config).finish()
    }
}

impl ArticleConfigBuilder {
    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.config.max_rendered_pixels = px.max(100);
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n;
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn generator(mut self, generator: Arc<dyn ContentGenerator>) -> Self {
        self.config.generator = Some(generator);
        self
    }

    pub fn page_parameters(mut self, params: GenerationParameters) -> Self {
        self.config.page_parameters = params;
        self
    }

    pub fn synthesis_parameters(mut self, params: GenerationParameters) -> Self {
        self.config.synthesis_parameters = params;
        self
    }

    /// Use a different model for synthesis than for page analysis.
    pub fn synthesis_model(mut self, model: impl Into<String>) -> Self {
        self.config.synthesis_parameters.model = Some(model.into());
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn language(mut self, language: impl Into<String>) -> Self {
        self.config.language = language.into();
        self
    }

    pub fn page_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.page_prompt = Some(prompt.into());
        self
    }

    pub fn include_images(mut self, v: bool) -> Self {
        self.config.include_images = v;
        self
    }

    pub fn strategy(mut self, strategy: SynthesisStrategy) -> Self {
        self.config.strategy = strategy;
        self
    }

    pub fn min_words(mut self, n: usize) -> Self {
        self.config.min_words = n;
        self
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.config.title = Some(title.into());
        self
    }

    pub fn pages(mut self, selection: PageSelection) -> Self {
        self.config.pages = selection;
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    pub fn cancellation(mut self, handle: CancellationHandle) -> Self {
        self.config.cancellation = Some(handle);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(mut self) -> Result<ArticleConfig, Slide2ArticleError> {
        let c = &mut self.config;
        if c.concurrency == 0 {
            return Err(Slide2ArticleError::InvalidConfig(
                "Concurrency must be ≥ 1".into(),
            ));
        }
        if c.api_timeout_secs == 0 {
            return Err(Slide2ArticleError::InvalidConfig(
                "API timeout must be ≥ 1 second".into(),
            ));
        }
        for (name, params) in [
            ("page", &mut c.page_parameters),
            ("synthesis", &mut c.synthesis_parameters),
        ] {
            if params.max_output_tokens == 0 {
                return Err(Slide2ArticleError::InvalidConfig(format!(
                    "{name} max_output_tokens must be > 0"
                )));
            }
            params.temperature = params.temperature.clamp(0.0, 2.0);
        }
        if let Some(ref prompt) = c.page_prompt {
            if !prompt.contains("{page_text}") {
                return Err(Slide2ArticleError::InvalidConfig(
                    "Custom page prompt must contain the {page_text} placeholder".into(),
                ));
            }
        }
        if c.language.trim().is_empty() {
            return Err(Slide2ArticleError::InvalidConfig(
                "Language must not be empty".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// How the per-slide analyses become one article.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SynthesisStrategy {
    /// One request returns the complete article. (default)
    #[default]
    SingleCall,
    /// One request writes introduction + closing, a second writes the body.
    SplitSections,
}

/// Specifies which pages of the deck to analyse.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PageSelection {
    /// All pages (default).
    #[default]
    All,
    /// A single page (1-indexed).
    Single(usize),
    /// A contiguous range of pages (1-indexed, inclusive).
    Range(usize, usize),
    /// Specific pages (1-indexed, deduplicated).
    Set(Vec<usize>),
}

impl PageSelection {
    /// Expand the selection into a sorted, deduplicated list of 0-indexed page numbers.
    pub fn to_indices(&self, total_pages: usize) -> Vec<usize> {
        let in_range = |p: usize| p >= 1 && p <= total_pages;
        let mut indices: Vec<usize> = match self {
            PageSelection::All => (0..total_pages).collect(),
            PageSelection::Single(p) => in_range(*p).then(|| p - 1).into_iter().collect(),
            PageSelection::Range(start, end) => ((*start).max(1) - 1..(*end).min(total_pages)).collect(),
            PageSelection::Set(pages) => pages.iter().copied().filter(|&p| in_range(p)).map(|p| p - 1).collect(),
        };
        indices.sort_unstable();
        indices.dedup();
        indices
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sequential() {
        let config = ArticleConfig::default();
        assert_eq!(config.concurrency, 1);
        assert_eq!(config.page_parameters.max_output_tokens, 1000);
        assert_eq!(config.strategy, SynthesisStrategy::SingleCall);
        assert_eq!(config.language, DEFAULT_LANGUAGE);
    }

    #[test]
    fn zero_concurrency_rejected() {
        let err = ArticleConfig::builder().concurrency(0).build().unwrap_err();
        assert!(matches!(err, Slide2ArticleError::InvalidConfig(_)));
    }

    #[test]
    fn prompt_without_page_text_rejected() {
        let err = ArticleConfig::builder()
            .page_prompt("Explain this slide in {language}")
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("{page_text}"));
    }

    #[test]
    fn temperature_is_clamped() {
        let config = ArticleConfig::builder()
            .page_parameters(GenerationParameters {
                model: None,
                max_output_tokens: 10,
                temperature: 9.0,
            })
            .build()
            .unwrap();
        assert_eq!(config.page_parameters.temperature, 2.0);
    }

    #[test]
    fn synthesis_model_only_touches_synthesis() {
        let config = ArticleConfig::builder()
            .synthesis_model("gpt-4.1")
            .build()
            .unwrap();
        assert_eq!(config.synthesis_parameters.model.as_deref(), Some("gpt-4.1"));
        assert_eq!(config.page_parameters.model, None);
    }

    #[test]
    fn call_policy_from_config() {
        let config = ArticleConfig::builder()
            .api_timeout_secs(5)
            .max_retries(4)
            .retry_backoff_ms(10)
            .build()
            .unwrap();
        let policy = config.call_policy();
        assert_eq!(policy.timeout, Duration::from_secs(5));
        assert_eq!(policy.max_retries, 4);
        assert_eq!(policy.backoff, Duration::from_millis(10));
    }

    #[test]
    fn page_selection_to_indices() {
        assert_eq!(PageSelection::All.to_indices(3), vec![0, 1, 2]);
        assert_eq!(PageSelection::Single(3).to_indices(5), vec![2]);
        assert_eq!(PageSelection::Single(6).to_indices(5), Vec::<usize>::new());
        assert_eq!(PageSelection::Range(2, 9).to_indices(4), vec![1, 2, 3]);
        assert_eq!(PageSelection::Set(vec![3, 1, 3]).to_indices(5), vec![0, 2]);
    }

    #[test]
    fn debug_hides_generator() {
        let dbg = format!("{:?}", ArticleConfig::default());
        assert!(dbg.contains("ArticleConfig"));
        assert!(dbg.contains("generator: None"));
    }
}
