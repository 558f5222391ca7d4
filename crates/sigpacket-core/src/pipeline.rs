//! Per-document extraction pipeline
//!
//! ## Flow
//!
//! 1. Open the document and count its pages
//! 2. Scan for candidate pages (progress 0-50%)
//! 3. Render each candidate and ask the oracle for signing blocks, a chunk of
//!    pages at a time (progress 50-100%)
//!
//! Only steps 1 and 2 can fail the document. A page that fails to render is
//! logged and contributes nothing; a page the oracle cannot read still yields
//! a placeholder record since it was already confirmed procedurally.

use std::sync::Arc;

use futures::future::join_all;
use tracing::{debug, info, warn};

use crate::config::PipelineConfig;
use crate::error::{Result, SigPacketError};
use crate::oracle::{ExtractorAdapter, SignatureBlock, SignatureOracle};
use crate::progress::{ProgressSink, ScaledProgress};
use crate::scanner::scan_candidates;
use crate::source::{PageRasterizer, PageTextExtractor, SourceDocument};
use crate::types::{Document, RenderedPage, SignatureRecord};

/// Everything the pipeline needs to run a document
#[derive(Clone)]
pub struct DocumentPipeline {
    config: PipelineConfig,
    text: Arc<dyn PageTextExtractor>,
    rasterizer: Arc<dyn PageRasterizer>,
    adapter: ExtractorAdapter,
}

/// Result of a successful run
#[derive(Debug, Clone)]
pub struct Extraction {
    pub page_count: u32,
    pub candidates: Vec<u32>,
    pub records: Vec<SignatureRecord>,
}

impl DocumentPipeline {
    pub fn new(
        config: PipelineConfig,
        text: Arc<dyn PageTextExtractor>,
        rasterizer: Arc<dyn PageRasterizer>,
        oracle: Arc<dyn SignatureOracle>,
    ) -> Self {
        let adapter = ExtractorAdapter::new(oracle, config.oracle_timeout);
        Self {
            config,
            text,
            rasterizer,
            adapter,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Extract signature records from one document
    ///
    /// `progress` receives `(percent, 100)`, never decreasing.
    pub async fn extract(
        &self,
        document: &Document,
        progress: &dyn ProgressSink,
    ) -> Result<Extraction> {
        let source = SourceDocument::load(document.name.as_str(), &document.bytes)?;
        let page_count = source.page_count();
        debug!(document = %document.name, page_count, "Opened document");

        let scan_progress = ScaledProgress::new(progress, 0, 50);
        let candidates = scan_candidates(
            &source,
            page_count,
            self.text.as_ref(),
            self.config.scan_batch_size,
            &scan_progress,
        )
        .await?;
        // A zero-page document never reports a batch
        scan_progress.report(page_count as usize, page_count as usize);

        info!(
            document = %document.name,
            candidates = candidates.len(),
            page_count,
            "Candidate scan complete"
        );

        let records = self
            .extract_candidates(document, &source, &candidates, progress)
            .await?;

        Ok(Extraction {
            page_count,
            candidates,
            records,
        })
    }

    async fn extract_candidates(
        &self,
        document: &Document,
        source: &SourceDocument,
        candidates: &[u32],
        progress: &dyn ProgressSink,
    ) -> Result<Vec<SignatureRecord>> {
        if self.config.extraction_chunk_size == 0 {
            return Err(SigPacketError::OperationError(
                "Extraction chunk size must be at least 1".into(),
            ));
        }

        let extract_progress = ScaledProgress::new(progress, 50, 50);
        let mut records = Vec::new();
        let mut done = 0usize;

        for chunk in candidates.chunks(self.config.extraction_chunk_size) {
            let pages = chunk
                .iter()
                .map(|&page_index| self.extract_page(document, source, page_index));

            for page_records in join_all(pages).await {
                records.extend(page_records);
            }

            done += chunk.len();
            extract_progress.report(done, candidates.len());
        }
        extract_progress.report(candidates.len(), candidates.len());

        Ok(records)
    }

    /// Records for one candidate page; empty only when rendering failed
    async fn extract_page(
        &self,
        document: &Document,
        source: &SourceDocument,
        page_index: u32,
    ) -> Vec<SignatureRecord> {
        let page = match self.rasterizer.render(source, page_index).await {
            Ok(page) => page,
            Err(e) => {
                warn!(
                    document = %document.name,
                    page = page_index + 1,
                    error = %e,
                    "Rendering failed, skipping page"
                );
                return Vec::new();
            }
        };

        let blocks = self.adapter.extract(&page).await;
        if blocks.is_empty() {
            debug!(
                document = %document.name,
                page = page.page_number(),
                "No blocks returned, using placeholder"
            );
            return vec![placeholder_record(document, &page)];
        }

        blocks
            .into_iter()
            .map(|block| record_from_block(document, &page, block))
            .collect()
    }
}

/// Record standing in for a confirmed signature page the oracle could not read
pub fn placeholder_record(document: &Document, page: &RenderedPage) -> SignatureRecord {
    record_from_block(document, page, SignatureBlock::placeholder())
}

fn record_from_block(
    document: &Document,
    page: &RenderedPage,
    block: SignatureBlock,
) -> SignatureRecord {
    SignatureRecord::new(
        document,
        page,
        block.party_name,
        block.signatory_name,
        block.capacity,
    )
}
