//! Where pages come from.
//!
//! The pipeline reads slides through [`PageSource`] and never cares whether
//! they came from pdfium ([`crate::pipeline::render::SlideDeck`]), another
//! renderer, or memory ([`MemorySource`]).

use crate::document::{Page, PageImage};
use crate::error::PageError;

/// A stable, 0-indexed sequence of pages.
///
/// Errors are per page: a failing `page_text` or `page_image` marks only that
/// page as failed.
pub trait PageSource: Send + Sync {
    fn page_count(&self) -> usize;

    fn page_text(&self, index: usize) -> Result<String, PageError>;

    fn page_image(&self, index: usize) -> Result<PageImage, PageError>;

    /// Load page `index`, or the error that makes it unusable.
    ///
    /// A page the source has no image for ([`PageError::ImageUnavailable`])
    /// is analysed text-only when it has text. A failed render
    /// ([`PageError::RenderFailed`]) always fails the page.
    fn load_page(&self, index: usize) -> Result<Page, PageError> {
        let total = self.page_count();
        if index >= total {
            return Err(PageError::Missing {
                page: index + 1,
                total,
            });
        }
        let text = self.page_text(index)?;
        match self.page_image(index) {
            Ok(image) => Ok(Page::new(index, text, Some(image))),
            Err(PageError::ImageUnavailable { .. }) if !text.trim().is_empty() => {
                tracing::debug!("Page {}: no image; analysing text only", index + 1);
                Ok(Page::new(index, text, None))
            }
            Err(e) => Err(e),
        }
    }
}

/// Pages held in memory, e.g. produced by an external renderer.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    pages: Vec<Page>,
}

impl MemorySource {
    pub fn new(pages: Vec<Page>) -> Self {
        Self { pages }
    }

    /// Text-only pages, indexed in order.
    pub fn from_texts<I, S>(texts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let pages = texts
            .into_iter()
            .enumerate()
            .map(|(i, t)| Page::new(i, t, None))
            .collect();
        Self { pages }
    }
}

impl PageSource for MemorySource {
    fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn page_text(&self, index: usize) -> Result<String, PageError> {
        self.pages
            .get(index)
            .map(|p| p.text.clone())
            .ok_or(PageError::Missing {
                page: index + 1,
                total: self.pages.len(),
            })
    }

    fn page_image(&self, index: usize) -> Result<PageImage, PageError> {
        self.pages
            .get(index)
            .and_then(|p| p.image.clone())
            .ok_or_else(|| PageError::ImageUnavailable {
                page: index + 1,
                detail: "no image supplied".into(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_only_pages_load_without_image() {
        let source = MemorySource::from_texts(["intro", "details"]);
        let page = source.load_page(1).expect("text-only page loads");
        assert_eq!(page.index, 1);
        assert_eq!(page.text, "details");
        assert!(page.image.is_none());
    }

    #[test]
    fn blank_page_without_image_is_an_error() {
        let source = MemorySource::from_texts(["", "x"]);
        let err = source.load_page(0).unwrap_err();
        assert!(matches!(err, PageError::ImageUnavailable { page: 1, .. }));
    }

    #[test]
    fn out_of_range_is_missing() {
        let source = MemorySource::from_texts(["a"]);
        assert_eq!(
            source.load_page(3).unwrap_err(),
            PageError::Missing { page: 4, total: 1 }
        );
    }

    #[test]
    fn render_failure_fails_page_despite_text() {
        struct BrokenRender;

        impl PageSource for BrokenRender {
            fn page_count(&self) -> usize {
                1
            }
            fn page_text(&self, _index: usize) -> Result<String, PageError> {
                Ok("Quarterly numbers".into())
            }
            fn page_image(&self, _index: usize) -> Result<PageImage, PageError> {
                Err(PageError::RenderFailed {
                    page: 1,
                    detail: "bitmap allocation".into(),
                })
            }
        }

        assert!(matches!(
            BrokenRender.load_page(0),
            Err(PageError::RenderFailed { page: 1, .. })
        ));
    }

    #[test]
    fn image_pages_keep_image() {
        let img = PageImage::new(vec![1, 2, 3], "image/png");
        let source = MemorySource::new(vec![Page::new(0, "", Some(img.clone()))]);
        assert_eq!(source.load_page(0).unwrap().image, Some(img));
    }
}
