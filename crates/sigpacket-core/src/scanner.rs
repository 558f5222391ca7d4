//! Candidate scanner
//!
//! Runs the classifier over a whole document in fixed-size batches. Batches
//! run one after another; pages inside a batch are extracted concurrently.

use futures::future::join_all;
use tracing::{debug, warn};

use crate::classifier::is_signature_candidate;
use crate::error::{Result, SigPacketError};
use crate::progress::ProgressSink;
use crate::source::{PageTextExtractor, SourceDocument};

/// Zero-based indices of candidate pages, strictly ascending
///
/// A page whose text cannot be extracted is logged and skipped. Progress is
/// reported as `(pages processed, page_count)` after every batch.
pub async fn scan_candidates(
    source: &SourceDocument,
    page_count: u32,
    extractor: &dyn PageTextExtractor,
    batch_size: usize,
    progress: &dyn ProgressSink,
) -> Result<Vec<u32>> {
    if batch_size == 0 {
        return Err(SigPacketError::OperationError(
            "Scan batch size must be at least 1".into(),
        ));
    }
    let actual = source.page_count();
    if page_count > actual {
        return Err(SigPacketError::PageOutOfRange {
            page_index: page_count - 1,
            page_count: actual,
        });
    }

    let total = page_count as usize;
    let mut candidates = Vec::new();
    let mut processed = 0usize;

    let indices: Vec<u32> = (0..page_count).collect();
    for batch in indices.chunks(batch_size) {
        let checks = batch.iter().map(|&page_index| async move {
            match extractor.page_text(source, page_index + 1).await {
                Ok(text) => is_signature_candidate(&text).then_some(page_index),
                Err(e) => {
                    warn!(
                        document = source.name(),
                        page = page_index + 1,
                        error = %e,
                        "Text extraction failed, treating page as non-candidate"
                    );
                    None
                }
            }
        });

        candidates.extend(join_all(checks).await.into_iter().flatten());

        processed += batch.len();
        progress.report(processed, total);
        debug!(
            document = source.name(),
            processed,
            total,
            found = candidates.len(),
            "Scanned batch"
        );
    }

    candidates.sort_unstable();
    candidates.dedup();
    Ok(candidates)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::NoProgress;
    use crate::testing::{fixture_pdf, CannedText};
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use std::sync::Mutex;

    fn source_with_pages(n: usize) -> SourceDocument {
        let texts: Vec<String> = (0..n).map(|i| format!("page {}", i + 1)).collect();
        let refs: Vec<&str> = texts.iter().map(String::as_str).collect();
        SourceDocument::load("doc.pdf", &fixture_pdf(&refs)).unwrap()
    }

    #[tokio::test]
    async fn test_finds_signature_pages() {
        let source = source_with_pages(5);
        let text = CannedText::new(&[
            "Recitals",
            "Definitions",
            "Governing law",
            "IN WITNESS WHEREOF",
            "Schedule 1",
        ]);

        let found = scan_candidates(&source, 5, &text, 10, &NoProgress)
            .await
            .unwrap();
        assert_eq!(found, vec![3]);
    }

    #[tokio::test]
    async fn test_reports_progress_per_batch() {
        let source = source_with_pages(23);
        let text = CannedText::new(&[]);
        let seen = Mutex::new(Vec::new());
        let sink = |p: usize, t: usize| seen.lock().unwrap().push((p, t));

        scan_candidates(&source, 23, &text, 10, &sink).await.unwrap();

        assert_eq!(*seen.lock().unwrap(), vec![(10, 23), (20, 23), (23, 23)]);
    }

    #[tokio::test]
    async fn test_page_failure_is_isolated() {
        let source = source_with_pages(4);
        let text = CannedText::new(&["Signed by", "Signed by", "Signed by", "Signed by"])
            .failing_on(2);

        let found = scan_candidates(&source, 4, &text, 10, &NoProgress)
            .await
            .unwrap();
        assert_eq!(found, vec![0, 2, 3]);
    }

    #[tokio::test]
    async fn test_empty_document() {
        let source = source_with_pages(1);
        let found = scan_candidates(&source, 0, &CannedText::new(&[]), 10, &NoProgress)
            .await
            .unwrap();
        assert!(found.is_empty());
    }

    #[tokio::test]
    async fn test_rejects_page_count_beyond_document() {
        let source = source_with_pages(2);
        let result = scan_candidates(&source, 3, &CannedText::new(&[]), 10, &NoProgress).await;
        assert!(matches!(result, Err(SigPacketError::PageOutOfRange { .. })));
    }

    #[tokio::test]
    async fn test_rejects_zero_batch_size() {
        let source = source_with_pages(2);
        let result = scan_candidates(&source, 2, &CannedText::new(&[]), 0, &NoProgress).await;
        assert!(result.is_err());
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn candidates_are_ascending_unique_and_in_range(
            flags in proptest::collection::vec(any::<bool>(), 1..40),
            batch_size in 1usize..12,
        ) {
            let texts: Vec<&str> = flags
                .iter()
                .map(|&hit| if hit { "Executed as a deed" } else { "Clause text" })
                .collect();
            let source = source_with_pages(flags.len());
            let extractor = CannedText::new(&texts);
            let page_count = flags.len() as u32;

            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap();
            let found = runtime
                .block_on(scan_candidates(&source, page_count, &extractor, batch_size, &NoProgress))
                .unwrap();

            prop_assert!(found.windows(2).all(|w| w[0] < w[1]));
            prop_assert!(found.iter().all(|&i| i < page_count));
            let expected: Vec<u32> = flags
                .iter()
                .enumerate()
                .filter(|(_, hit)| **hit)
                .map(|(i, _)| i as u32)
                .collect();
            prop_assert_eq!(found, expected);
        }
    }
}
