//! Pipeline tuning

use std::time::Duration;

/// Pages whose text is extracted concurrently during a candidate scan
pub const SCAN_BATCH_SIZE: usize = 10;

/// Candidate pages rendered and sent to the oracle concurrently
pub const EXTRACTION_CHUNK_SIZE: usize = 5;

/// Upper bound on a single oracle call
pub const DEFAULT_ORACLE_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub scan_batch_size: usize,
    /// Also the cap on in-flight oracle calls per document
    pub extraction_chunk_size: usize,
    pub oracle_timeout: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            scan_batch_size: SCAN_BATCH_SIZE,
            extraction_chunk_size: EXTRACTION_CHUNK_SIZE,
            oracle_timeout: DEFAULT_ORACLE_TIMEOUT,
        }
    }
}

impl PipelineConfig {
    pub fn with_oracle_timeout(mut self, timeout: Duration) -> Self {
        self.oracle_timeout = timeout;
        self
    }
}
