use std::path::Path;

use mupdf::{Document, TextPageFlags};

use refverify_core::{BackendError, TextSource};

/// Header and footer bands, as fractions of page height, whose text blocks
/// are dropped during extraction. Running heads and page footers otherwise
/// land in the middle of references that cross a page break.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageMargins {
    pub header: f32,
    pub footer: f32,
}

impl PageMargins {
    pub const NONE: PageMargins = PageMargins {
        header: 0.0,
        footer: 0.0,
    };

    /// Top 4% and bottom 5% of the page.
    pub const CONFERENCE: PageMargins = PageMargins {
        header: 0.04,
        footer: 0.05,
    };

    /// Whether a block spanning `top..bottom` survives on a page spanning
    /// `page_top..page_bottom`. Blocks entirely inside the header band, or
    /// starting inside the footer band, are dropped.
    pub fn keeps(&self, page_top: f32, page_bottom: f32, top: f32, bottom: f32) -> bool {
        let height = page_bottom - page_top;
        if self.header > 0.0 && bottom <= page_top + height * self.header {
            return false;
        }
        if self.footer > 0.0 && top >= page_bottom - height * self.footer {
            return false;
        }
        true
    }
}

impl Default for PageMargins {
    fn default() -> Self {
        PageMargins::NONE
    }
}

/// [`TextSource`] backed by MuPDF.
///
/// Lives in its own crate so the AGPL `mupdf` dependency stays out of every
/// other code path. Page texts are joined with `\n`.
#[derive(Debug, Default, Clone)]
pub struct MupdfTextSource {
    margins: PageMargins,
}

impl MupdfTextSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_margins(mut self, margins: PageMargins) -> Self {
        self.margins = margins;
        self
    }

    fn page_text(&self, page: &mupdf::Page) -> Result<String, BackendError> {
        let extraction = |e: mupdf::Error| BackendError::ExtractionError(e.to_string());

        let text_page = page.to_text_page(TextPageFlags::empty()).map_err(extraction)?;
        let bounds = page.bounds().map_err(extraction)?;

        let mut text = String::new();
        for block in text_page.blocks() {
            let b = block.bounds();
            if !self.margins.keeps(bounds.y0, bounds.y1, b.y0, b.y1) {
                continue;
            }
            for line in block.lines() {
                text.extend(line.chars().map(|c| c.char().unwrap_or('\u{FFFD}')));
                text.push('\n');
            }
        }
        Ok(text)
    }
}

impl TextSource for MupdfTextSource {
    fn extract_text(&self, path: &Path) -> Result<String, BackendError> {
        let path_str = path
            .to_str()
            .ok_or_else(|| BackendError::OpenError("invalid path encoding".into()))?;
        let document =
            Document::open(path_str).map_err(|e| BackendError::OpenError(e.to_string()))?;

        let mut pages = Vec::new();
        for page in document
            .pages()
            .map_err(|e| BackendError::ExtractionError(e.to_string()))?
        {
            let page = page.map_err(|e| BackendError::ExtractionError(e.to_string()))?;
            pages.push(self.page_text(&page)?);
        }
        tracing::debug!(path = %path.display(), pages = pages.len(), "extracted PDF text");

        Ok(pages.join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_margins_keeps_everything() {
        let m = PageMargins::NONE;
        assert!(m.keeps(0.0, 800.0, 0.0, 10.0));
        assert!(m.keeps(0.0, 800.0, 790.0, 800.0));
    }

    #[test]
    fn conference_margins_drop_running_heads_and_footers() {
        let m = PageMargins::CONFERENCE;
        // Header band ends at 32, footer band starts at 760.
        assert!(!m.keeps(0.0, 800.0, 5.0, 30.0));
        assert!(m.keeps(0.0, 800.0, 5.0, 40.0));
        assert!(!m.keeps(0.0, 800.0, 765.0, 790.0));
        assert!(m.keeps(0.0, 800.0, 700.0, 770.0));
    }

    #[test]
    fn missing_file_is_open_error() {
        let err = MupdfTextSource::new()
            .extract_text(Path::new("/definitely/not/here.pdf"))
            .unwrap_err();
        assert!(matches!(err, BackendError::OpenError(_)));
    }
}
