//! Data model shared by the pipeline, grouping engine and packet assembler

use std::sync::Arc;

use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Party label used when the oracle could not name the bound entity
pub const UNKNOWN_PARTY: &str = "Unknown Party";

/// Capacity label used when the oracle could not name the signer's role
pub const DEFAULT_CAPACITY: &str = "Signatory";

/// Processing state of an uploaded document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    Pending,
    Processing,
    Completed,
    Error,
}

impl DocumentStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, DocumentStatus::Completed | DocumentStatus::Error)
    }
}

/// One uploaded transaction file
#[derive(Debug, Clone, Serialize)]
pub struct Document {
    pub id: String,
    pub name: String,
    #[serde(skip)]
    pub bytes: Arc<Vec<u8>>,
    pub uploaded_at: DateTime<Utc>,
    /// Populated once the pipeline has opened the file
    pub page_count: Option<u32>,
    pub status: DocumentStatus,
    /// 0-100 while processing, 100 once completed
    pub progress: Option<u8>,
    pub records: Vec<SignatureRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Document {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            bytes: Arc::new(bytes),
            uploaded_at: Utc::now(),
            page_count: None,
            status: DocumentStatus::Pending,
            progress: None,
            records: Vec::new(),
            error: None,
        }
    }

    /// Mark the document as failed, discarding any partial results
    pub fn fail(&mut self, reason: impl Into<String>) {
        self.status = DocumentStatus::Error;
        self.progress = None;
        self.records.clear();
        self.error = Some(reason.into());
    }
}

/// A page rendered for the extraction oracle
#[derive(Debug, Clone)]
pub struct RenderedPage {
    /// Zero-based index of the source page
    pub page_index: u32,
    pub data: Vec<u8>,
    pub mime_type: String,
    pub width: u32,
    pub height: u32,
}

impl RenderedPage {
    pub fn page_number(&self) -> u32 {
        self.page_index + 1
    }

    pub fn data_base64(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(&self.data)
    }
}

/// Preview reference kept on each record for review screens
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PagePreview {
    pub mime_type: String,
    /// Base64-encoded rendering
    pub data: String,
    pub width: u32,
    pub height: u32,
}

impl From<&RenderedPage> for PagePreview {
    fn from(page: &RenderedPage) -> Self {
        Self {
            mime_type: page.mime_type.clone(),
            data: page.data_base64(),
            width: page.width,
            height: page.height,
        }
    }
}

/// One signing block found on one page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureRecord {
    pub id: String,
    pub document_id: String,
    pub document_name: String,
    /// Zero-based, fixed once the record exists
    pub page_index: u32,
    /// One-based, derived from `page_index`
    pub page_number: u32,
    pub party_name: String,
    /// May be empty while the signer is still unidentified
    pub signatory_name: String,
    pub capacity: String,
    /// Copies to print; 0 keeps the record but leaves it out of packets
    pub copies: u32,
    pub preview: PagePreview,
}

impl SignatureRecord {
    pub fn new(
        document: &Document,
        page: &RenderedPage,
        party_name: impl Into<String>,
        signatory_name: impl Into<String>,
        capacity: impl Into<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            document_id: document.id.clone(),
            document_name: document.name.clone(),
            page_index: page.page_index,
            page_number: page.page_number(),
            party_name: party_name.into(),
            signatory_name: signatory_name.into(),
            capacity: capacity.into(),
            copies: 1,
            preview: PagePreview::from(page),
        }
    }

    pub fn apply(&mut self, edit: &RecordEdit) {
        if let Some(party) = &edit.party_name {
            self.party_name = party.clone();
        }
        if let Some(signatory) = &edit.signatory_name {
            self.signatory_name = signatory.clone();
        }
        if let Some(capacity) = &edit.capacity {
            self.capacity = capacity.clone();
        }
        if let Some(copies) = edit.copies {
            self.copies = copies;
        }
    }
}

/// User correction of a record; `None` fields are left untouched
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordEdit {
    #[serde(default)]
    pub party_name: Option<String>,
    #[serde(default)]
    pub signatory_name: Option<String>,
    #[serde(default)]
    pub capacity: Option<String>,
    #[serde(default)]
    pub copies: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(index: u32) -> RenderedPage {
        RenderedPage {
            page_index: index,
            data: b"%PDF-1.5".to_vec(),
            mime_type: "application/pdf".into(),
            width: 612,
            height: 792,
        }
    }

    #[test]
    fn test_new_record_derives_page_number_and_defaults_copies() {
        let doc = Document::new("SPA.pdf", vec![]);
        let record = SignatureRecord::new(&doc, &page(3), "Acme Corp", "Jane Smith", "Director");

        assert_eq!(record.page_index, 3);
        assert_eq!(record.page_number, 4);
        assert_eq!(record.copies, 1);
        assert_eq!(record.document_name, "SPA.pdf");
        assert_eq!(record.preview.width, 612);
    }

    #[test]
    fn test_edit_only_touches_given_fields() {
        let doc = Document::new("NDA.pdf", vec![]);
        let mut record = SignatureRecord::new(&doc, &page(0), "", "", DEFAULT_CAPACITY);

        record.apply(&RecordEdit {
            party_name: Some("Beta LLC".into()),
            copies: Some(0),
            ..Default::default()
        });

        assert_eq!(record.party_name, "Beta LLC");
        assert_eq!(record.signatory_name, "");
        assert_eq!(record.capacity, DEFAULT_CAPACITY);
        assert_eq!(record.copies, 0);
    }

    #[test]
    fn test_fail_clears_partial_records() {
        let mut doc = Document::new("Broken.pdf", vec![]);
        let record = SignatureRecord::new(&doc, &page(0), "A", "B", "C");
        doc.records.push(record);
        doc.progress = Some(40);

        doc.fail("cannot open");

        assert_eq!(doc.status, DocumentStatus::Error);
        assert!(doc.records.is_empty());
        assert_eq!(doc.progress, None);
    }

    #[test]
    fn test_status_serializes_lowercase() {
        let json = serde_json::to_string(&DocumentStatus::Processing).unwrap();
        assert_eq!(json, "\"processing\"");
    }
}
