//! CLI binary for slide2article.
//!
//! Maps flags onto `ArticleConfig`, drives a run and prints the article.

use anyhow::{Context, Result};
use clap::Parser;
use slide2article::{
    inspect, synthesize_analyses, write_article, write_article_to_file, ArticleConfig,
    CancellationHandle, GenerationParameters, PageAnalysis, PageSelection,
    PipelineProgressCallback, ProgressCallback, Slide2ArticleError, SynthesisStrategy,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── Terminal progress ────────────────────────────────────────────────────────

/// One bar for the slides, then a spinner while the article is written.
struct CliProgress {
    bar: ProgressBar,
    started: Mutex<HashMap<usize, Instant>>,
    failed: AtomicUsize,
}

impl CliProgress {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        bar.set_style(spinner_style());
        bar.set_prefix("Preparing");
        bar.set_message("Opening deck…");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self {
            bar,
            started: Mutex::new(HashMap::new()),
            failed: AtomicUsize::new(0),
        })
    }

    fn page_secs(&self, page_num: usize) -> f64 {
        self.started
            .lock()
            .ok()
            .and_then(|mut m| m.remove(&page_num))
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }
}

fn spinner_style() -> ProgressStyle {
    ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_strings(TICKS)
}

impl PipelineProgressCallback for CliProgress {
    fn on_run_start(&self, total_pages: usize) {
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  [{bar:42.green/238}] {pos:>3}/{len} slides  \
             ⏱ {elapsed_precise}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);
        self.bar.set_length(total_pages as u64);
        self.bar.set_style(style);
        self.bar.set_prefix("Analysing");
        self.bar.reset_eta();
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Analysing {total_pages} slides…"))
        ));
    }

    fn on_page_start(&self, page_num: usize, _total: usize) {
        if let Ok(mut m) = self.started.lock() {
            m.insert(page_num, Instant::now());
        }
        self.bar.set_message(format!("slide {page_num}"));
    }

    fn on_page_complete(&self, page_num: usize, total: usize, content_len: usize) {
        let secs = self.page_secs(page_num);
        self.bar.println(format!(
            "  {} Slide {:>3}/{:<3}  {:<8}  {}",
            green("✓"),
            page_num,
            total,
            dim(&format!("{content_len:>5} chars")),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_page_error(&self, page_num: usize, total: usize, error: &str) {
        let secs = self.page_secs(page_num);
        self.failed.fetch_add(1, Ordering::SeqCst);
        let msg: String = if error.chars().count() > 80 {
            error.chars().take(79).chain(['…']).collect()
        } else {
            error.to_string()
        };
        self.bar.println(format!(
            "  {} Slide {:>3}/{:<3}  {}  {}",
            red("✗"),
            page_num,
            total,
            red(&msg),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_run_complete(&self, total_pages: usize, ok_pages: usize) {
        let failed = self.failed.load(Ordering::SeqCst);
        let mark = if failed == 0 { green("✔") } else { cyan("⚠") };
        self.bar.println(format!(
            "{} {}/{} slides analysed{}",
            mark,
            bold(&ok_pages.to_string()),
            total_pages,
            if failed > 0 {
                format!("  ({} failed)", red(&failed.to_string()))
            } else {
                String::new()
            }
        ));
    }

    fn on_synthesis_start(&self, analyses: usize) {
        self.bar.set_style(spinner_style());
        self.bar.set_prefix("Writing");
        self.bar
            .set_message(format!("article from {analyses} slide analyses…"));
    }

    fn on_synthesis_complete(&self, markdown_len: usize) {
        self.bar.finish_and_clear();
        eprintln!(
            "{} article written  {}",
            green("✔"),
            dim(&format!("{markdown_len} chars"))
        );
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Article in the default language (Traditional Chinese) to stdout
  slide2article talk.pdf

  # English article to a file
  slide2article --language English talk.pdf -o article.md

  # Two-step synthesis and a stronger model for the article
  slide2article --strategy split --synthesis-model gpt-4.1 talk.pdf -o article.md

  # Keep the slide analyses, then retry only the synthesis
  slide2article talk.pdf --analyses-out analyses.json -o article.md
  slide2article --from-analyses analyses.json -o article.md

  # Inspect deck metadata (no API key needed)
  slide2article --inspect-only talk.pdf

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  GEMINI_API_KEY          Google Gemini API key
  EDGEQUAKE_LLM_PROVIDER  Override provider (openai, anthropic, gemini, ollama)
  EDGEQUAKE_MODEL         Override model ID
  PDFIUM_LIB_PATH         Path to libpdfium (system library used otherwise)
"#;

/// Turn a slide deck into a long-form Markdown article.
#[derive(Parser, Debug)]
#[command(
    name = "slide2article",
    version,
    about = "Turn a slide deck (PDF path or URL) into a long-form Markdown article",
    long_about = "Explains every slide of a deck with a vision-capable LLM, then reorganises \
the explanations into one article with an introduction, background, core content, a look \
ahead and a conclusion.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local PDF path or HTTP/HTTPS URL. Not needed with --from-analyses.
    #[arg(required_unless_present = "from_analyses")]
    input: Option<String>,

    /// Write the article to this file instead of stdout.
    #[arg(short, long, env = "SLIDE2ARTICLE_OUTPUT")]
    output: Option<PathBuf>,

    /// Model for slide analysis (default: gpt-4o).
    #[arg(long, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// LLM provider: openai, anthropic, gemini, ollama, azure.
    #[arg(long, env = "EDGEQUAKE_PROVIDER")]
    provider: Option<String>,

    /// Model for article synthesis, if different from --model.
    #[arg(long, env = "SLIDE2ARTICLE_SYNTHESIS_MODEL")]
    synthesis_model: Option<String>,

    /// Language of the explanations and the article.
    #[arg(long, env = "SLIDE2ARTICLE_LANGUAGE", default_value = slide2article::config::DEFAULT_LANGUAGE)]
    language: String,

    /// Synthesis strategy.
    #[arg(long, value_enum, default_value = "single")]
    strategy: StrategyArg,

    /// Minimum article length requested, in words.
    #[arg(long, default_value_t = 2000)]
    min_words: usize,

    /// Article title (default: the PDF's title metadata, else the model's choice).
    #[arg(long)]
    title: Option<String>,

    /// Page selection: all, 5, 3-15, or 1,3,5,7.
    #[arg(long, env = "SLIDE2ARTICLE_PAGES", default_value = "all")]
    pages: String,

    /// Slides analysed concurrently (1 = strictly sequential).
    #[arg(short, long, env = "SLIDE2ARTICLE_CONCURRENCY", default_value_t = 1)]
    concurrency: usize,

    /// Max output tokens per slide analysis.
    #[arg(long, default_value_t = 1000)]
    max_tokens: usize,

    /// Max output tokens for the article.
    #[arg(long, default_value_t = 8000)]
    synthesis_max_tokens: usize,

    /// Sampling temperature for every call (0.0–2.0).
    #[arg(long)]
    temperature: Option<f32>,

    /// Retries per call on transient failures.
    #[arg(long, default_value_t = 2)]
    max_retries: u32,

    /// Per-call timeout in seconds.
    #[arg(long, env = "SLIDE2ARTICLE_API_TIMEOUT", default_value_t = 90)]
    api_timeout: u64,

    /// HTTP download timeout in seconds.
    #[arg(long, default_value_t = 120)]
    download_timeout: u64,

    /// PDF user password for encrypted decks.
    #[arg(long, env = "SLIDE2ARTICLE_PASSWORD")]
    password: Option<String>,

    /// File with a custom slide prompt ({language}, {page_number}, {page_text}).
    #[arg(long)]
    prompt: Option<PathBuf>,

    /// Send slide text only, without slide images.
    #[arg(long)]
    no_images: bool,

    /// Save the slide analyses as JSON (also on synthesis failure).
    #[arg(long)]
    analyses_out: Option<PathBuf>,

    /// Skip slide analysis; synthesise from a saved analyses JSON file.
    #[arg(long, conflicts_with = "inspect_only")]
    from_analyses: Option<PathBuf>,

    /// Print the full run output as JSON instead of Markdown.
    #[arg(long)]
    json: bool,

    /// Disable the progress bar.
    #[arg(long)]
    no_progress: bool,

    /// Print deck metadata only.
    #[arg(long)]
    inspect_only: bool,

    /// Enable DEBUG-level logs.
    #[arg(short, long)]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long)]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum StrategyArg {
    Single,
    Split,
}

impl From<StrategyArg> for SynthesisStrategy {
    fn from(v: StrategyArg) -> Self {
        match v {
            StrategyArg::Single => SynthesisStrategy::SingleCall,
            StrategyArg::Split => SynthesisStrategy::SplitSections,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    if cli.inspect_only {
        let input = cli.input.as_deref().context("An input deck is required")?;
        return print_metadata(input, cli.json).await;
    }

    let progress: Option<ProgressCallback> = if show_progress {
        Some(CliProgress::new() as Arc<dyn PipelineProgressCallback>)
    } else {
        None
    };
    let cancellation = CancellationHandle::new();
    let config = build_config(&cli, progress, cancellation.clone()).await?;

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!(
                "\n{} cancelling: the request in flight is dropped and no article is written",
                cyan("⚠")
            );
            cancellation.cancel();
        }
    });

    if let Some(ref path) = cli.from_analyses {
        return synthesize_only(&cli, path, &config).await;
    }
    let input = cli.input.as_deref().context("An input deck is required")?;

    // The library writes the file atomically when nothing else is needed.
    if let (Some(output_path), None, false) = (&cli.output, &cli.analyses_out, cli.json) {
        let stats = write_article_to_file(input, output_path, &config)
            .await
            .context("Article run failed")?;
        if !cli.quiet {
            eprintln!(
                "{}  {}/{} slides  {}ms  →  {}",
                if stats.failed_pages == 0 { green("✔") } else { cyan("⚠") },
                stats.ok_pages,
                stats.total_pages,
                stats.total_duration_ms,
                bold(&output_path.display().to_string()),
            );
            eprintln!(
                "   {} tokens in  /  {} tokens out",
                dim(&stats.input_tokens.to_string()),
                dim(&stats.output_tokens.to_string()),
            );
        }
        return Ok(());
    }

    let output = match write_article(input, &config).await {
        Ok(output) => output,
        Err(Slide2ArticleError::SynthesisFailed { source, document }) => {
            if let Some(ref path) = cli.analyses_out {
                save_analyses(path, &document.analyses)?;
                eprintln!(
                    "{} analyses saved; retry with --from-analyses {}",
                    cyan("⚠"),
                    path.display()
                );
            }
            anyhow::bail!("Article synthesis failed: {source}");
        }
        Err(e) => return Err(e).context("Article run failed"),
    };

    if let Some(ref path) = cli.analyses_out {
        save_analyses(path, &output.document.analyses)?;
    }

    if cli.json {
        let json = serde_json::to_string_pretty(&output).context("Failed to serialise output")?;
        println!("{json}");
        return Ok(());
    }

    if output.article.is_none() {
        let err = if output.document.is_empty() {
            Slide2ArticleError::EmptyDocument
        } else {
            Slide2ArticleError::Cancelled {
                completed: output.document.analyses.len(),
                total: output.document.pages.len(),
            }
        };
        return Err(err.into());
    }

    emit(cli.output.as_deref(), output.markdown()).await?;
    if !cli.quiet && !show_progress {
        eprintln!(
            "Analysed {}/{} slides in {}ms; {} tokens in / {} out",
            output.stats.ok_pages,
            output.stats.total_pages,
            output.stats.total_duration_ms,
            output.stats.input_tokens,
            output.stats.output_tokens,
        );
    }
    Ok(())
}

async fn print_metadata(input: &str, json: bool) -> Result<()> {
    let meta = inspect(input).await.context("Failed to inspect deck")?;
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&meta).context("Failed to serialise metadata")?
        );
        return Ok(());
    }
    println!("File:     {input}");
    for (label, value) in [
        ("Title:   ", &meta.title),
        ("Author:  ", &meta.author),
        ("Subject: ", &meta.subject),
        ("Creator: ", &meta.creator),
    ] {
        if let Some(v) = value {
            println!("{label} {v}");
        }
    }
    println!("Pages:    {}", meta.page_count);
    Ok(())
}

async fn synthesize_only(cli: &Cli, path: &Path, config: &ArticleConfig) -> Result<()> {
    let json = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read analyses from {}", path.display()))?;
    let analyses: Vec<PageAnalysis> =
        serde_json::from_str(&json).context("Analyses file is not valid JSON")?;
    if !cli.quiet {
        eprintln!("{} synthesising from {} saved analyses…", cyan("◆"), analyses.len());
    }
    let article = synthesize_analyses(&analyses, config)
        .await
        .context("Article synthesis failed")?;
    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&article).context("Failed to serialise article")?
        );
        return Ok(());
    }
    emit(cli.output.as_deref(), &article.raw_markdown).await
}

fn save_analyses(path: &Path, analyses: &[PageAnalysis]) -> Result<()> {
    let json = serde_json::to_string_pretty(analyses).context("Failed to serialise analyses")?;
    std::fs::write(path, json)
        .with_context(|| format!("Failed to write analyses to {}", path.display()))
}

async fn emit(output: Option<&Path>, markdown: &str) -> Result<()> {
    match output {
        Some(path) => {
            tokio::fs::write(path, markdown)
                .await
                .with_context(|| format!("Failed to write {}", path.display()))?;
            eprintln!("{}  →  {}", green("✔"), bold(&path.display().to_string()));
        }
        None => {
            let mut out = io::stdout().lock();
            out.write_all(markdown.as_bytes())
                .context("Failed to write to stdout")?;
            if !markdown.ends_with('\n') {
                out.write_all(b"\n").ok();
            }
        }
    }
    Ok(())
}

/// Map CLI args to `ArticleConfig`.
async fn build_config(
    cli: &Cli,
    progress: Option<ProgressCallback>,
    cancellation: CancellationHandle,
) -> Result<ArticleConfig> {
    let mut page_parameters = GenerationParameters {
        max_output_tokens: cli.max_tokens,
        ..GenerationParameters::page_analysis()
    };
    let mut synthesis_parameters = GenerationParameters {
        max_output_tokens: cli.synthesis_max_tokens,
        ..GenerationParameters::synthesis()
    };
    if let Some(t) = cli.temperature {
        page_parameters.temperature = t;
        synthesis_parameters.temperature = t;
    }

    let mut builder = ArticleConfig::builder()
        .concurrency(cli.concurrency)
        .pages(parse_pages(&cli.pages)?)
        .page_parameters(page_parameters)
        .synthesis_parameters(synthesis_parameters)
        .max_retries(cli.max_retries)
        .api_timeout_secs(cli.api_timeout)
        .download_timeout_secs(cli.download_timeout)
        .language(cli.language.clone())
        .strategy(cli.strategy.into())
        .min_words(cli.min_words)
        .include_images(!cli.no_images)
        .cancellation(cancellation);

    if let Some(ref model) = cli.model {
        builder = builder.model(model.clone());
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider.clone());
    }
    if let Some(ref model) = cli.synthesis_model {
        builder = builder.synthesis_model(model.clone());
    }
    if let Some(ref title) = cli.title {
        builder = builder.title(title.clone());
    }
    if let Some(ref password) = cli.password {
        builder = builder.password(password.clone());
    }
    if let Some(ref path) = cli.prompt {
        let prompt = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read prompt from {}", path.display()))?;
        builder = builder.page_prompt(prompt);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

/// Parse `--pages` into a `PageSelection`.
fn parse_pages(s: &str) -> Result<PageSelection> {
    let s = s.trim().to_lowercase();
    let page = |p: &str| -> Result<usize> {
        let n: usize = p
            .trim()
            .parse()
            .with_context(|| format!("Invalid page number: '{}'", p.trim()))?;
        anyhow::ensure!(n >= 1, "Pages are 1-indexed, minimum is 1 (got {n})");
        Ok(n)
    };

    if s == "all" {
        return Ok(PageSelection::All);
    }
    if let Some((start, end)) = s.split_once('-') {
        let (start, end) = (page(start)?, page(end)?);
        anyhow::ensure!(
            start <= end,
            "Invalid page range '{start}-{end}': start must be <= end"
        );
        return Ok(PageSelection::Range(start, end));
    }
    if s.contains(',') {
        return Ok(PageSelection::Set(
            s.split(',').map(page).collect::<Result<Vec<_>>>()?,
        ));
    }
    Ok(PageSelection::Single(page(&s)?))
}
