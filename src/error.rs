//! Error types for the slide2article library.
//!
//! Three error types map onto three failure scopes:
//!
//! * [`Slide2ArticleError`]: **Fatal**: the run cannot produce an article
//!   (bad input file, provider not configured, synthesis failed). Returned as
//!   `Err(Slide2ArticleError)` from the top-level `write_article*` functions.
//!
//! * [`PageError`]: **Non-fatal**: the page source could not supply text or
//!   an image for one page. The page is still analysed (or recorded as
//!   failed) so one unreadable slide never costs the whole deck.
//!
//! * [`SynthesisError`]: the final aggregation call failed. There is no
//!   meaningful partial article, so this is always surfaced to the caller,
//!   wrapped in [`Slide2ArticleError::SynthesisFailed`] together with the
//!   completed [`Document`] so synthesis can be retried on its own.

use crate::document::Document;
use crate::generation::FailureKind;
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the slide2article library.
#[derive(Debug, Error)]
pub enum Slide2ArticleError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The input string is not a valid file path or URL.
    #[error("Invalid input '{input}': not a file path or a valid HTTP/HTTPS URL")]
    InvalidInput { input: String },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    /// The file exists and was read, but is not a PDF.
    #[error("File is not a valid PDF: '{path}'\nFirst bytes: {magic:?}")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    // ── PDF errors ────────────────────────────────────────────────────────
    /// PDF header/trailer/xref is corrupt and cannot be parsed.
    #[error("PDF '{path}' is corrupt: {detail}")]
    CorruptPdf { path: PathBuf, detail: String },

    /// PDF requires a password but none was provided.
    #[error("PDF '{path}' is encrypted and requires a password.\nProvide it with --password <PASSWORD>.")]
    PasswordRequired { path: PathBuf },

    /// A password was provided but it is wrong.
    #[error("Wrong password for PDF '{path}'")]
    WrongPassword { path: PathBuf },

    /// The page selection matched no page of the deck.
    #[error("Page {page} is out of range (deck has {total} pages)")]
    PageOutOfRange { page: usize, total: usize },

    // ── Generation errors ─────────────────────────────────────────────────
    /// The configured provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// Every page was analysed but the article could not be synthesised.
    ///
    /// `document` holds the completed page analyses; pass
    /// `document.analyses` to [`crate::convert::synthesize_analyses`] to retry
    /// without re-analysing the deck.
    #[error("Article synthesis failed: {source}")]
    SynthesisFailed {
        #[source]
        source: SynthesisError,
        document: Box<Document>,
    },

    // ── Run outcome errors ────────────────────────────────────────────────
    /// The deck had no pages, so there is nothing to write.
    #[error("The document has no pages; no article was produced")]
    EmptyDocument,

    /// The run was cancelled before the article was written.
    #[error("Run cancelled after {completed}/{total} pages; no article was produced")]
    Cancelled { completed: usize, total: usize },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the output Markdown file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Pdfium binding errors ─────────────────────────────────────────────
    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\
Set PDFIUM_LIB_PATH=/path/to/libpdfium or install pdfium system-wide."
    )]
    PdfiumBindingFailed(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single page of the source.
///
/// Recorded as the `error_detail` of a failed
/// [`crate::document::PageAnalysis`]; the run continues with the next page.
#[derive(Debug, Clone, PartialEq, Eq, Error, serde::Serialize, serde::Deserialize)]
pub enum PageError {
    /// Text extraction failed.
    #[error("Page {page}: text extraction failed: {detail}")]
    TextUnavailable { page: usize, detail: String },

    /// The source has no image for this page, e.g. rendering is disabled.
    /// Not a failure when the page has text.
    #[error("Page {page}: image unavailable: {detail}")]
    ImageUnavailable { page: usize, detail: String },

    /// Rasterising or encoding the page image failed.
    #[error("Page {page}: rasterisation failed: {detail}")]
    RenderFailed { page: usize, detail: String },

    /// The source has fewer pages than requested.
    #[error("Page {page} does not exist in a {total}-page source")]
    Missing { page: usize, total: usize },
}

/// Failure of the final aggregation step.
#[derive(Debug, Clone, Error)]
pub enum SynthesisError {
    /// No analyses were supplied; synthesis needs at least one page.
    #[error("No page analyses to synthesise")]
    NoContent,

    /// A synthesis call returned a failure (after the client's own retries).
    #[error("{stage} call failed ({kind}): {message}")]
    Generation {
        stage: SynthesisStage,
        kind: FailureKind,
        message: String,
    },

    /// The run was cancelled before or during a synthesis call.
    #[error("Synthesis cancelled before the {stage} call completed")]
    Cancelled { stage: SynthesisStage },
}

/// Which synthesis request failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SynthesisStage {
    /// The single full-article request.
    Article,
    /// The introduction + closing request of the split strategy.
    Framing,
    /// The body request of the split strategy.
    Body,
}

impl std::fmt::Display for SynthesisStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SynthesisStage::Article => f.write_str("article"),
            SynthesisStage::Framing => f.write_str("introduction/closing"),
            SynthesisStage::Body => f.write_str("body"),
        }
    }
}
