//! PDF render capability
//!
//! Page rendering itself belongs to whatever draws the pages. The engine
//! only needs page-count discovery, which lopdf answers by walking the
//! page tree of the loaded document.

use crate::error::{AppError, Result};
use crate::viewer::RenderCapability;
use lopdf::Document;

/// Page-count discovery backed by lopdf
#[derive(Debug, Clone, Copy, Default)]
pub struct LopdfRenderer;

impl LopdfRenderer {
    pub fn new() -> Self {
        Self
    }
}

impl RenderCapability for LopdfRenderer {
    fn page_count(&self, data: &[u8]) -> Result<u32> {
        let document = Document::load_mem(data)?;
        let pages = document.get_pages().len();

        if pages == 0 {
            return Err(AppError::Load("document has no pages".to_string()));
        }

        u32::try_from(pages).map_err(|_| AppError::Load(format!("{} pages", pages)))
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::sample_pdf;
    use super::*;

    #[test]
    fn test_counts_pages() {
        let renderer = LopdfRenderer::new();

        assert_eq!(renderer.page_count(&sample_pdf(3)).unwrap(), 3);
        assert_eq!(renderer.page_count(&sample_pdf(1)).unwrap(), 1);
    }

    #[test]
    fn test_rejects_garbage() {
        let renderer = LopdfRenderer::new();

        assert!(renderer.page_count(b"definitely not a pdf").is_err());
        assert!(renderer.page_count(&[]).is_err());
    }
}
