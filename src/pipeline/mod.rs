//! Pipeline stages for slide-deck-to-article runs.
//!
//! ```text
//! input ──▶ render ──▶ analyze ──▶ run ──▶ synthesize ──▶ postprocess
//! (URL/path) (pdfium)   (per slide)  (order)  (article)     (cleanup)
//! ```
//!
//! 1. [`input`] resolves a path or URL to a local PDF
//! 2. [`render`] opens the deck with pdfium, extracting text and PNG slides
//!    (`spawn_blocking`; pdfium is not async-safe)
//! 3. [`analyze`] turns one slide into one analysis; [`llm`] and [`encode`]
//!    adapt requests to edgequake-llm
//! 4. [`run`] drives the analyzer over the deck in page order
//! 5. [`synthesize`] writes the article from all analyses
//! 6. [`postprocess`] cleans up the article's Markdown

pub mod analyze;
pub mod encode;
pub mod input;
pub mod llm;
pub mod postprocess;
pub mod render;
pub mod run;
pub mod synthesize;
