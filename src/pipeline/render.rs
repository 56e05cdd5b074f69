//! PDF slide decks as a [`PageSource`], via pdfium.
//!
//! pdfium is a blocking C library, so the deck is opened, its text
//! extracted and its slides rasterised inside `spawn_blocking`, once, when
//! [`SlideDeck::open`] is awaited. The resulting deck owns plain data and can
//! be shared with the async pipeline freely.
//!
//! Per-slide failures (unreadable text layer, render error) are stored and
//! returned from [`PageSource`] calls for that slide only; the deck as a
//! whole fails only when the file cannot be opened.
//!
//! Slide indices are positions in the selected pages, so `--pages 5-7`
//! yields a three-slide deck.

use crate::config::{ArticleConfig, PageSelection};
use crate::document::PageImage;
use crate::error::{PageError, Slide2ArticleError};
use crate::output::DeckMetadata;
use crate::pipeline::encode::encode_png;
use crate::source::PageSource;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Environment variable naming an explicit pdfium library file.
pub const PDFIUM_LIB_ENV: &str = "PDFIUM_LIB_PATH";

/// Bind to pdfium: `PDFIUM_LIB_PATH` when set, else the system library.
pub fn bind_pdfium() -> Result<Pdfium, Slide2ArticleError> {
    let bindings = match std::env::var(PDFIUM_LIB_ENV) {
        Ok(path) if !path.trim().is_empty() => {
            debug!("Binding pdfium from {}", path);
            Pdfium::bind_to_library(PathBuf::from(path))
        }
        _ => Pdfium::bind_to_system_library(),
    }
    .map_err(|e| Slide2ArticleError::PdfiumBindingFailed(e.to_string()))?;
    Ok(Pdfium::new(bindings))
}

/// One selected slide after extraction.
#[derive(Debug, Clone)]
struct RenderedSlide {
    text: Result<String, PageError>,
    image: Result<PageImage, PageError>,
}

/// A PDF deck, loaded and rasterised.
#[derive(Debug, Clone)]
pub struct SlideDeck {
    slides: Vec<RenderedSlide>,
    metadata: DeckMetadata,
}

impl SlideDeck {
    /// Open `path` and extract every page the config selects.
    ///
    /// Slide images are rendered only when `config.include_images` is set.
    pub async fn open(path: &Path, config: &ArticleConfig) -> Result<Self, Slide2ArticleError> {
        let path = path.to_path_buf();
        let password = config.password.clone();
        let selection = config.pages.clone();
        let max_pixels = config.include_images.then_some(config.max_rendered_pixels);

        tokio::task::spawn_blocking(move || {
            open_blocking(&path, password.as_deref(), &selection, max_pixels)
        })
        .await
        .map_err(|e| Slide2ArticleError::Internal(format!("Render task panicked: {e}")))?
    }

    pub fn metadata(&self) -> &DeckMetadata {
        &self.metadata
    }

    fn slide(&self, index: usize) -> Result<&RenderedSlide, PageError> {
        self.slides.get(index).ok_or(PageError::Missing {
            page: index + 1,
            total: self.slides.len(),
        })
    }
}

impl PageSource for SlideDeck {
    fn page_count(&self) -> usize {
        self.slides.len()
    }

    fn page_text(&self, index: usize) -> Result<String, PageError> {
        self.slide(index)?.text.clone()
    }

    fn page_image(&self, index: usize) -> Result<PageImage, PageError> {
        self.slide(index)?.image.clone()
    }
}

/// Read document metadata without rasterising anything.
pub async fn extract_metadata(
    path: &Path,
    password: Option<&str>,
) -> Result<DeckMetadata, Slide2ArticleError> {
    let path = path.to_path_buf();
    let password = password.map(str::to_string);
    tokio::task::spawn_blocking(move || {
        let pdfium = bind_pdfium()?;
        let document = pdfium
            .load_pdf_from_file(&path, password.as_deref())
            .map_err(|e| load_error(&path, password.is_some(), format!("{e:?}")))?;
        Ok(read_metadata(&document))
    })
    .await
    .map_err(|e| Slide2ArticleError::Internal(format!("Metadata task panicked: {e}")))?
}

fn open_blocking(
    path: &Path,
    password: Option<&str>,
    selection: &PageSelection,
    max_pixels: Option<u32>,
) -> Result<SlideDeck, Slide2ArticleError> {
    let pdfium = bind_pdfium()?;
    let document = pdfium
        .load_pdf_from_file(path, password)
        .map_err(|e| load_error(path, password.is_some(), format!("{e:?}")))?;

    let metadata = read_metadata(&document);
    let total = metadata.page_count;
    let indices = selection.to_indices(total);
    if indices.is_empty() && total > 0 {
        return Err(Slide2ArticleError::PageOutOfRange {
            page: first_requested(selection),
            total,
        });
    }
    info!("PDF loaded: {} pages, {} selected", total, indices.len());

    let render_config = max_pixels.map(|px| {
        PdfRenderConfig::new()
            .set_target_width(px as i32)
            .set_maximum_height(px as i32)
    });
    let pages = document.pages();
    let slides = indices
        .into_iter()
        .map(|idx| {
            let number = idx + 1;
            let page = match pages.get(idx as u16) {
                Ok(page) => page,
                Err(e) => {
                    let err = PageError::RenderFailed {
                        page: number,
                        detail: format!("{e:?}"),
                    };
                    return RenderedSlide {
                        text: Err(err.clone()),
                        image: Err(err),
                    };
                }
            };

            let text = page
                .text()
                .map(|t| t.all())
                .map_err(|e| PageError::TextUnavailable {
                    page: number,
                    detail: format!("{e:?}"),
                });

            let image = match render_config {
                None => Err(PageError::ImageUnavailable {
                    page: number,
                    detail: "image rendering disabled".into(),
                }),
                Some(ref cfg) => page
                    .render_with_config(cfg)
                    .map_err(|e| PageError::RenderFailed {
                        page: number,
                        detail: format!("{e:?}"),
                    })
                    .and_then(|bitmap| {
                        encode_png(&bitmap.as_image()).map_err(|e| PageError::RenderFailed {
                            page: number,
                            detail: e.to_string(),
                        })
                    }),
            };
            debug!(
                "Slide {}: text {}, image {}",
                number,
                if text.is_ok() { "ok" } else { "failed" },
                if image.is_ok() { "ok" } else { "none" }
            );
            RenderedSlide { text, image }
        })
        .collect();

    Ok(SlideDeck { slides, metadata })
}

fn read_metadata(document: &PdfDocument<'_>) -> DeckMetadata {
    let metadata = document.metadata();
    let tag = |t: PdfDocumentMetadataTagType| -> Option<String> {
        metadata
            .get(t)
            .map(|v| v.value().trim().to_string())
            .filter(|v| !v.is_empty())
    };
    DeckMetadata {
        title: tag(PdfDocumentMetadataTagType::Title),
        author: tag(PdfDocumentMetadataTagType::Author),
        subject: tag(PdfDocumentMetadataTagType::Subject),
        creator: tag(PdfDocumentMetadataTagType::Creator),
        page_count: document.pages().len() as usize,
    }
}

/// Map a pdfium load failure onto the input error it most likely means.
fn load_error(path: &Path, had_password: bool, detail: String) -> Slide2ArticleError {
    let path = path.to_path_buf();
    if detail.to_lowercase().contains("password") {
        if had_password {
            Slide2ArticleError::WrongPassword { path }
        } else {
            Slide2ArticleError::PasswordRequired { path }
        }
    } else {
        Slide2ArticleError::CorruptPdf { path, detail }
    }
}

/// The 1-based page a selection asked for first, for error messages.
fn first_requested(selection: &PageSelection) -> usize {
    match selection {
        PageSelection::All => 1,
        PageSelection::Single(p) => *p,
        PageSelection::Range(start, _) => *start,
        PageSelection::Set(pages) => pages.iter().copied().min().unwrap_or(1),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deck() -> SlideDeck {
        SlideDeck {
            slides: vec![
                RenderedSlide {
                    text: Ok("Agenda".into()),
                    image: Ok(PageImage::new(vec![1, 2, 3], "image/png")),
                },
                RenderedSlide {
                    text: Ok("Chart only".into()),
                    image: Err(PageError::RenderFailed {
                        page: 2,
                        detail: "bitmap".into(),
                    }),
                },
                RenderedSlide {
                    text: Ok("   ".into()),
                    image: Err(PageError::RenderFailed {
                        page: 3,
                        detail: "bitmap".into(),
                    }),
                },
                RenderedSlide {
                    text: Ok("Speaker notes".into()),
                    image: Err(PageError::ImageUnavailable {
                        page: 4,
                        detail: "image rendering disabled".into(),
                    }),
                },
            ],
            metadata: DeckMetadata {
                title: Some("Rust in Production".into()),
                page_count: 4,
                ..Default::default()
            },
        }
    }

    #[test]
    fn deck_serves_pages_and_failures() {
        let deck = deck();
        assert_eq!(deck.page_count(), 4);
        assert_eq!(deck.metadata().title.as_deref(), Some("Rust in Production"));

        let first = deck.load_page(0).expect("first slide loads");
        assert!(first.image.is_some());

        assert!(matches!(
            deck.load_page(1),
            Err(PageError::RenderFailed { page: 2, .. })
        ));
        assert!(matches!(
            deck.load_page(2),
            Err(PageError::RenderFailed { page: 3, .. })
        ));

        let text_only = deck.load_page(3).expect("unrendered slide with text loads");
        assert_eq!(text_only.text, "Speaker notes");
        assert!(text_only.image.is_none());
        assert!(matches!(
            deck.page_text(9),
            Err(PageError::Missing { page: 10, total: 4 })
        ));
    }

    #[test]
    fn load_error_classification() {
        let p = Path::new("deck.pdf");
        assert!(matches!(
            load_error(p, false, "PdfiumLibraryInternalError(PasswordError)".into()),
            Slide2ArticleError::PasswordRequired { .. }
        ));
        assert!(matches!(
            load_error(p, true, "PasswordError".into()),
            Slide2ArticleError::WrongPassword { .. }
        ));
        assert!(matches!(
            load_error(p, false, "FormatError".into()),
            Slide2ArticleError::CorruptPdf { .. }
        ));
    }

    #[test]
    fn first_requested_page() {
        assert_eq!(first_requested(&PageSelection::Single(12)), 12);
        assert_eq!(first_requested(&PageSelection::Range(4, 9)), 4);
        assert_eq!(first_requested(&PageSelection::Set(vec![8, 3])), 3);
    }
}
