//! Entry points: a slide deck in, an article out.
//!
//! ```text
//! input ──▶ SlideDeck ──▶ DocumentPipeline ──▶ Synthesizer ──▶ ArticleOutput
//! (path/URL)  (pdfium)     (page analyses)      (article)
//! ```
//!
//! Provider resolution happens first, so a missing API key fails the run
//! before any page is rendered or any request is sent.

use crate::cancel::CancellationHandle;
use crate::config::ArticleConfig;
use crate::document::{Document, PageAnalysis, RunStatus};
use crate::error::{Slide2ArticleError, SynthesisError};
use crate::generation::{ContentGenerator, ResilientGenerator};
use crate::output::{Article, ArticleOutput, DeckMetadata, RunStats};
use crate::pipeline::analyze::PageAnalyzer;
use crate::pipeline::input;
use crate::pipeline::llm::LlmGenerationClient;
use crate::pipeline::render::{self, SlideDeck};
use crate::pipeline::run::DocumentPipeline;
use crate::pipeline::synthesize::Synthesizer;
use crate::progress::{NoopProgressCallback, ProgressCallback};
use crate::source::PageSource;
use edgequake_llm::{LLMProvider, ProviderFactory};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// Model used when a provider is picked without one.
pub const DEFAULT_MODEL: &str = "gpt-4o";

/// Download timeout used by [`inspect`].
const INSPECT_DOWNLOAD_TIMEOUT_SECS: u64 = 120;

/// Analyse every slide of a PDF (path or URL) and synthesise an article.
///
/// `Ok` is returned even when pages failed; check `output.stats.failed_pages`.
/// `output.article` is `None` when the deck had no pages or the run was
/// cancelled; a cancelled run has `document.status == RunStatus::Partial`.
///
/// # Errors
/// Fatal errors only: unreadable input, no provider, or a failed synthesis
/// ([`Slide2ArticleError::SynthesisFailed`] carries the analysed document).
pub async fn write_article(
    input: impl AsRef<str>,
    config: &ArticleConfig,
) -> Result<ArticleOutput, Slide2ArticleError> {
    let start = Instant::now();
    let input = input.as_ref();
    info!("Writing article from {}", input);

    let resolved = input::resolve_input(input, config.download_timeout_secs).await?;
    let generators = Generators::resolve(config)?;
    let deck = SlideDeck::open(resolved.path(), config).await?;
    let fallback_title = deck.metadata().title.clone();

    run(&deck, config, &generators, fallback_title, start).await
}

/// Like [`write_article`], for pages from any [`PageSource`].
pub async fn write_article_from_source(
    source: &dyn PageSource,
    config: &ArticleConfig,
) -> Result<ArticleOutput, Slide2ArticleError> {
    let start = Instant::now();
    let generators = Generators::resolve(config)?;
    run(source, config, &generators, None, start).await
}

/// Write the article for `input` to `output_path` and return the run stats.
///
/// The file is written to a temporary sibling and renamed into place, so a
/// failed run never leaves a half-written article behind.
pub async fn write_article_to_file(
    input: impl AsRef<str>,
    output_path: impl AsRef<Path>,
    config: &ArticleConfig,
) -> Result<RunStats, Slide2ArticleError> {
    let output = write_article(input, config).await?;
    let article = match output.article {
        Some(ref article) => article,
        None if output.document.is_empty() => return Err(Slide2ArticleError::EmptyDocument),
        None => {
            return Err(Slide2ArticleError::Cancelled {
                completed: output.document.analyses.len(),
                total: output.document.pages.len(),
            })
        }
    };
    write_atomically(output_path.as_ref(), &article.raw_markdown).await?;
    Ok(output.stats)
}

/// Blocking wrapper around [`write_article`] with its own tokio runtime.
pub fn write_article_sync(
    input: impl AsRef<str>,
    config: &ArticleConfig,
) -> Result<ArticleOutput, Slide2ArticleError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| Slide2ArticleError::Internal(format!("Failed to create tokio runtime: {e}")))?
        .block_on(write_article(input, config))
}

/// Run synthesis alone over previously produced analyses.
///
/// Use after [`Slide2ArticleError::SynthesisFailed`], passing
/// `document.analyses`, to retry without re-analysing the deck. Analyses are
/// ordered by page before synthesis.
pub async fn synthesize_analyses(
    analyses: &[PageAnalysis],
    config: &ArticleConfig,
) -> Result<Article, Slide2ArticleError> {
    let generators = Generators::resolve(config)?;
    let mut ordered = analyses.to_vec();
    ordered.sort_by_key(|a| a.page_index);

    let synthesizer = Synthesizer::new(generators.synthesis, config);
    match synthesizer.synthesize(&ordered).await {
        Ok(article) => Ok(article),
        Err(SynthesisError::Cancelled { .. }) => Err(Slide2ArticleError::Cancelled {
            completed: ordered.len(),
            total: ordered.len(),
        }),
        Err(source) => Err(Slide2ArticleError::SynthesisFailed {
            source,
            document: Box::new(Document {
                pages: Vec::new(),
                analyses: ordered,
                status: RunStatus::Complete,
            }),
        }),
    }
}

/// Read deck metadata. Needs no provider or API key.
pub async fn inspect(input: impl AsRef<str>) -> Result<DeckMetadata, Slide2ArticleError> {
    let resolved = input::resolve_input(input.as_ref(), INSPECT_DOWNLOAD_TIMEOUT_SECS).await?;
    render::extract_metadata(resolved.path(), None).await
}

// ── Internal helpers ─────────────────────────────────────────────────────

async fn run(
    source: &dyn PageSource,
    config: &ArticleConfig,
    generators: &Generators,
    fallback_title: Option<String>,
    start: Instant,
) -> Result<ArticleOutput, Slide2ArticleError> {
    let progress: ProgressCallback = config
        .progress_callback
        .clone()
        .unwrap_or_else(|| Arc::new(NoopProgressCallback));
    let cancellation = config.cancellation.clone().unwrap_or_default();

    let pipeline = DocumentPipeline::new(PageAnalyzer::new(generators.page.clone(), config))
        .with_concurrency(config.concurrency)
        .with_progress(progress.clone())
        .with_cancellation(cancellation.clone());

    let analysis_start = Instant::now();
    let mut document = pipeline.run_source(source).await;
    let mut stats = RunStats::from_document(&document);
    stats.analysis_duration_ms = elapsed_ms(analysis_start);

    if !skip_synthesis(&mut document, &cancellation) {
        progress.on_synthesis_start(document.analyses.len());
        let synthesis_start = Instant::now();
        let synthesizer = Synthesizer::new(generators.synthesis.clone(), config)
            .with_fallback_title(fallback_title)
            .with_cancellation(cancellation);

        let result = synthesizer.synthesize(&document.analyses).await;
        match result {
            Ok(article) => {
                stats.synthesis_duration_ms = elapsed_ms(synthesis_start);
                stats.add_usage(&article.usage);
                stats.total_duration_ms = elapsed_ms(start);
                progress.on_synthesis_complete(article.raw_markdown.len());
                progress.on_progress(1.0);
                info!(
                    "Article complete: {} chars from {}/{} pages, {}ms",
                    article.raw_markdown.len(),
                    stats.ok_pages,
                    stats.total_pages,
                    stats.total_duration_ms
                );
                return Ok(ArticleOutput {
                    document,
                    article: Some(article),
                    stats,
                });
            }
            Err(SynthesisError::Cancelled { stage }) => {
                info!("Run cancelled during {} synthesis; no article written", stage);
                document.status = RunStatus::Partial;
            }
            Err(source) => {
                warn!("Synthesis failed: {}", source);
                return Err(Slide2ArticleError::SynthesisFailed {
                    source,
                    document: Box::new(document),
                });
            }
        }
    }

    stats.total_duration_ms = elapsed_ms(start);
    Ok(ArticleOutput {
        document,
        article: None,
        stats,
    })
}

/// Empty and cancelled runs produce no article.
fn skip_synthesis(document: &mut Document, cancellation: &CancellationHandle) -> bool {
    if document.is_empty() {
        info!("No pages; skipping synthesis");
        return true;
    }
    if cancellation.is_cancelled() {
        document.status = RunStatus::Partial;
    }
    if !document.is_complete() {
        info!(
            "Run is partial ({}/{} pages); skipping synthesis",
            document.analyses.len(),
            document.pages.len()
        );
        return true;
    }
    false
}

async fn write_atomically(path: &Path, contents: &str) -> Result<(), Slide2ArticleError> {
    let failed = |source| Slide2ArticleError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(failed)?;
    }
    let tmp = path.with_extension("md.tmp");
    tokio::fs::write(&tmp, contents).await.map_err(failed)?;
    tokio::fs::rename(&tmp, path).await.map_err(failed)
}

fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}

/// The generators for both call sites, each behind the config's call policy.
struct Generators {
    page: Arc<dyn ContentGenerator>,
    synthesis: Arc<dyn ContentGenerator>,
}

impl Generators {
    fn resolve(config: &ArticleConfig) -> Result<Self, Slide2ArticleError> {
        let policy = config.call_policy();
        let wrap = |inner: Arc<dyn ContentGenerator>| -> Arc<dyn ContentGenerator> {
            Arc::new(ResilientGenerator::new(inner, policy))
        };

        if let Some(ref generator) = config.generator {
            let generator = wrap(Arc::clone(generator));
            return Ok(Self {
                page: generator.clone(),
                synthesis: generator,
            });
        }

        let (page_model, synthesis_model) = call_site_models(config);
        let (provider, label) = resolve_provider(config, page_model)?;
        let page = wrap(Arc::new(LlmGenerationClient::new(provider, label)));

        let synthesis = if synthesis_model != page_model {
            let (provider, label) = resolve_provider(config, synthesis_model)?;
            wrap(Arc::new(LlmGenerationClient::new(provider, label)))
        } else {
            page.clone()
        };
        Ok(Self { page, synthesis })
    }
}

/// The model each call site is built for: `(page, synthesis)`.
///
/// A model named in a call site's parameters wins over `config.model`;
/// synthesis falls back to the page model.
fn call_site_models(config: &ArticleConfig) -> (Option<&str>, Option<&str>) {
    let page = config
        .page_parameters
        .model
        .as_deref()
        .or(config.model.as_deref());
    let synthesis = config.synthesis_parameters.model.as_deref().or(page);
    (page, synthesis)
}

fn create_provider(name: &str, model: &str) -> Result<(Arc<dyn LLMProvider>, String), Slide2ArticleError> {
    let provider = ProviderFactory::create_llm_provider(name, model).map_err(|e| {
        Slide2ArticleError::ProviderNotConfigured {
            provider: name.to_string(),
            hint: e.to_string(),
        }
    })?;
    Ok((provider, format!("{name}/{model}")))
}

/// Resolve a provider, from most to least specific:
///
/// 1. `config.provider_name` with `model` (or [`DEFAULT_MODEL`])
/// 2. `EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`, `model` overriding the latter
/// 3. `OPENAI_API_KEY` → openai
/// 4. `ProviderFactory::from_env` auto-detection
fn resolve_provider(
    config: &ArticleConfig,
    model: Option<&str>,
) -> Result<(Arc<dyn LLMProvider>, String), Slide2ArticleError> {
    if let Some(ref name) = config.provider_name {
        return create_provider(name, model.unwrap_or(DEFAULT_MODEL));
    }

    if let (Ok(name), Ok(env_model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !name.is_empty() && !env_model.is_empty() {
            return create_provider(&name, model.unwrap_or(&env_model));
        }
    }

    if std::env::var("OPENAI_API_KEY").is_ok_and(|k| !k.is_empty()) {
        return create_provider("openai", model.unwrap_or(DEFAULT_MODEL));
    }

    if let Some(model) = model {
        warn!("No provider named; auto-detected provider ignores model '{}'", model);
    }
    let (provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| Slide2ArticleError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from the environment.\n\
                 Set OPENAI_API_KEY or ANTHROPIC_API_KEY, or pass --provider.\n\
                 Error: {e}"
            ),
        })?;
    Ok((provider, "auto".to_string()))
}
