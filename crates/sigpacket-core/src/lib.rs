//! Signature packet builder
//!
//! Finds the signature pages in a set of transaction documents, extracts who
//! signs each one, and assembles one print-ready PDF per group of pages.
//!
//! ```text
//! upload -> scanner (lexical) -> rasterizer -> oracle adapter -> records
//!                                                                  |
//!                          packets <- assembler <- grouping engine +
//! ```
//!
//! - [`classifier`] / [`scanner`]: cheap procedural pass flagging candidate pages
//! - [`oracle`]: boundary to the external extraction service, never fails
//! - [`pipeline`]: per-document orchestration with bounded concurrency
//! - [`grouping`]: pure ordering and partitioning of records
//! - [`assemble`] / [`naming`]: page copying into packets with safe file names
//! - [`workspace`]: owned document set tying the above together

pub mod assemble;
pub mod classifier;
pub mod config;
pub mod error;
pub mod grouping;
pub mod naming;
pub mod oracle;
pub mod pipeline;
pub mod progress;
pub mod scanner;
pub mod source;
pub mod types;
pub mod workspace;

#[cfg(test)]
mod testing;

pub use assemble::{assemble_packets, extract_single_page, Packet, PacketBuilder};
pub use classifier::is_signature_candidate;
pub use config::PipelineConfig;
pub use error::{Result, SigPacketError};
pub use grouping::{partition, Grouping, GroupingMode, UNKNOWN_SIGNATORY};
pub use naming::{sanitize_file_name, unique_file_names};
pub use oracle::{
    parse_oracle_payload, ExtractorAdapter, OracleResponse, RawSignatureBlock, SignatureBlock,
    SignatureOracle,
};
pub use pipeline::{placeholder_record, DocumentPipeline, Extraction};
pub use progress::{NoProgress, ProgressSink};
pub use scanner::scan_candidates;
pub use source::{
    LopdfTextExtractor, PageRasterizer, PageTextExtractor, SnapshotRasterizer, SourceDocument,
};
pub use types::{
    Document, DocumentStatus, PagePreview, RecordEdit, RenderedPage, SignatureRecord,
    DEFAULT_CAPACITY, UNKNOWN_PARTY,
};
pub use workspace::{GroupView, GroupingView, Workspace};
