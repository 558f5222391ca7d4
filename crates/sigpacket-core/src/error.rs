use thiserror::Error;

#[derive(Error, Debug)]
pub enum SigPacketError {
    #[error("Failed to parse PDF: {0}")]
    ParseError(String),

    #[error("Unsupported input: {0}")]
    UnsupportedInput(String),

    #[error("Page {page_index} does not exist (document has {page_count} pages)")]
    PageOutOfRange { page_index: u32, page_count: u32 },

    #[error("Text extraction failed on page {page_number}: {reason}")]
    TextExtraction { page_number: u32, reason: String },

    #[error("Rendering failed on page {page_index}: {reason}")]
    Render { page_index: u32, reason: String },

    #[error("Extraction oracle failed: {0}")]
    Oracle(String),

    #[error("Extraction oracle timed out after {0}ms")]
    Timeout(u64),

    #[error("PDF operation failed: {0}")]
    OperationError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Document not found: {0}")]
    DocumentNotFound(String),

    #[error("Signature record not found: {0}")]
    RecordNotFound(String),
}

pub type Result<T> = std::result::Result<T, SigPacketError>;
