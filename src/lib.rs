//! # slide2article
//!
//! Turn a slide deck into a long-form Markdown article with a multimodal LLM.
//!
//! Slides are terse: bullet fragments, a diagram, a chart. Reading them one
//! at a time, text and image together, gives the model enough to explain each
//! slide; a second pass then reorganises those explanations into a single
//! article with an introduction, background, core content, a look ahead and a
//! conclusion.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Input       resolve local file or download from URL
//!  ├─ 2. Render      text + PNG per slide via pdfium (spawn_blocking)
//!  ├─ 3. Analyse     one request per slide, in order; failures become placeholders
//!  ├─ 4. Synthesise  one (or two) requests over all analyses
//!  └─ 5. Polish      deterministic Markdown cleanup
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use slide2article::{write_article, ArticleConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from OPENAI_API_KEY / ANTHROPIC_API_KEY / …
//!     let config = ArticleConfig::builder().language("English").build()?;
//!     let output = write_article("talk.pdf", &config).await?;
//!     println!("{}", output.markdown());
//!     eprintln!("{} of {} slides analysed", output.stats.ok_pages, output.stats.total_pages);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `slide2article` binary (clap + indicatif + anyhow + tracing-subscriber) |

pub mod cancel;
pub mod config;
pub mod convert;
pub mod document;
pub mod error;
pub mod generation;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod source;

pub use cancel::CancellationHandle;
pub use config::{ArticleConfig, ArticleConfigBuilder, PageSelection, SynthesisStrategy};
pub use convert::{
    inspect, synthesize_analyses, write_article, write_article_from_source,
    write_article_sync, write_article_to_file,
};
pub use document::{AnalysisStatus, Document, Page, PageAnalysis, PageImage, RunStatus};
pub use error::{PageError, Slide2ArticleError, SynthesisError, SynthesisStage};
pub use generation::{
    CallPolicy, ContentGenerator, FailureKind, GenerationParameters, GenerationRequest,
    GenerationResponse, ResilientGenerator, TokenUsage,
};
pub use output::{Article, ArticleOutput, DeckMetadata, RunStats};
pub use pipeline::analyze::PageAnalyzer;
pub use pipeline::render::SlideDeck;
pub use pipeline::run::DocumentPipeline;
pub use pipeline::synthesize::{split_marked_sections, Synthesizer};
pub use progress::{NoopProgressCallback, PipelineProgressCallback, ProgressCallback};
pub use source::{MemorySource, PageSource};
