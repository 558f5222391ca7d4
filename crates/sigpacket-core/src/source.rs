//! Source documents and the page-level collaborators the pipeline drives
//!
//! Text extraction and rasterization sit behind traits so the pipeline can run
//! against lopdf, an external renderer, or test doubles.

use async_trait::async_trait;
use lopdf::{Document as PdfDocument, Object};

use crate::assemble::{extract_single_page, page_dictionary, resolve_inherited};
use crate::error::{Result, SigPacketError};
use crate::types::RenderedPage;

/// True when the bytes start like a PDF file
pub fn looks_like_pdf(bytes: &[u8]) -> bool {
    bytes.len() > 4 && &bytes[0..4] == b"%PDF"
}

/// A parsed upload, loaded once per pipeline run or assembly run
pub struct SourceDocument {
    name: String,
    pdf: PdfDocument,
}

impl SourceDocument {
    pub fn load(name: impl Into<String>, bytes: &[u8]) -> Result<Self> {
        let name = name.into();
        if !looks_like_pdf(bytes) {
            return Err(SigPacketError::UnsupportedInput(format!(
                "{} is not a PDF file",
                name
            )));
        }
        let pdf = PdfDocument::load_mem(bytes)
            .map_err(|e| SigPacketError::ParseError(format!("{}: {}", name, e)))?;
        Ok(Self { name, pdf })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn pdf(&self) -> &PdfDocument {
        &self.pdf
    }

    pub fn page_count(&self) -> u32 {
        self.pdf.get_pages().len() as u32
    }

    /// Page size in points after applying `/Rotate`
    pub fn page_size(&self, page_index: u32) -> Result<(u32, u32)> {
        let (_, page) = page_dictionary(&self.pdf, page_index)?;
        let media_box = resolve_inherited(&self.pdf, page, b"MediaBox")
            .and_then(|obj| numbers(&self.pdf, &obj))
            .filter(|values| values.len() == 4)
            .unwrap_or_else(|| vec![0.0, 0.0, 612.0, 792.0]);

        let width = (media_box[2] - media_box[0]).abs().round() as u32;
        let height = (media_box[3] - media_box[1]).abs().round() as u32;

        let rotate = resolve_inherited(&self.pdf, page, b"Rotate")
            .and_then(|obj| obj.as_i64().ok())
            .unwrap_or(0);
        if rotate.rem_euclid(180) == 90 {
            Ok((height, width))
        } else {
            Ok((width, height))
        }
    }
}

fn numbers(doc: &PdfDocument, obj: &Object) -> Option<Vec<f64>> {
    let obj = match obj {
        Object::Reference(id) => doc.get_object(*id).ok()?,
        other => other,
    };
    obj.as_array()
        .ok()?
        .iter()
        .map(|value| match value {
            Object::Integer(i) => Some(*i as f64),
            Object::Real(r) => Some(*r as f64),
            _ => None,
        })
        .collect()
}

/// Page text extraction: `(document, one-based page number) -> text`
#[async_trait]
pub trait PageTextExtractor: Send + Sync {
    async fn page_text(&self, source: &SourceDocument, page_number: u32) -> Result<String>;
}

/// Page rasterization: `(document, zero-based page index) -> rendered page`
#[async_trait]
pub trait PageRasterizer: Send + Sync {
    async fn render(&self, source: &SourceDocument, page_index: u32) -> Result<RenderedPage>;
}

/// Text extraction through lopdf's content-stream decoder
#[derive(Debug, Default, Clone, Copy)]
pub struct LopdfTextExtractor;

#[async_trait]
impl PageTextExtractor for LopdfTextExtractor {
    async fn page_text(&self, source: &SourceDocument, page_number: u32) -> Result<String> {
        source
            .pdf()
            .extract_text(&[page_number])
            .map_err(|e| SigPacketError::TextExtraction {
                page_number,
                reason: e.to_string(),
            })
    }
}

/// Renders a page as a standalone one-page PDF
///
/// Vision services that accept PDF input read the page directly, so no
/// native rasterizer is needed. Dimensions are the page size in points.
#[derive(Debug, Default, Clone, Copy)]
pub struct SnapshotRasterizer;

#[async_trait]
impl PageRasterizer for SnapshotRasterizer {
    async fn render(&self, source: &SourceDocument, page_index: u32) -> Result<RenderedPage> {
        let render_error = |e: SigPacketError| SigPacketError::Render {
            page_index,
            reason: e.to_string(),
        };
        let (width, height) = source.page_size(page_index).map_err(render_error)?;
        let data = extract_single_page(source.pdf(), page_index).map_err(render_error)?;

        Ok(RenderedPage {
            page_index,
            data,
            mime_type: "application/pdf".to_string(),
            width,
            height,
        })
    }
}
