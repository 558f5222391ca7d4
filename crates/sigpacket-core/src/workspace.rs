//! Owned application state
//!
//! A [`Workspace`] holds every uploaded document together with its status,
//! progress and records. Each pipeline run writes only to its own document's
//! entry; views and exports read a snapshot taken at the moment of use.
//!
//! The state lock is synchronous and never held across an await point, so the
//! progress sink can update a document's entry from inside a pipeline run.

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use futures::future::join_all;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::assemble::{assemble_packets, Packet};
use crate::error::{Result, SigPacketError};
use crate::grouping::{partition, GroupingMode};
use crate::pipeline::DocumentPipeline;
use crate::source::looks_like_pdf;
use crate::types::{Document, DocumentStatus, RecordEdit, SignatureRecord};

#[derive(Default)]
struct WorkspaceState {
    /// Upload order
    documents: Vec<Document>,
}

impl WorkspaceState {
    fn document_mut(&mut self, id: &str) -> Option<&mut Document> {
        self.documents.iter_mut().find(|d| d.id == id)
    }

    fn record_mut(&mut self, record_id: &str) -> Option<&mut SignatureRecord> {
        self.documents
            .iter_mut()
            .filter(|d| d.status == DocumentStatus::Completed)
            .flat_map(|d| d.records.iter_mut())
            .find(|r| r.id == record_id)
    }
}

/// One group in a grouping view
#[derive(Debug, Clone, Serialize)]
pub struct GroupView {
    pub label: String,
    pub records: Vec<SignatureRecord>,
}

/// Records grouped for review, in group-label order
#[derive(Debug, Clone, Serialize)]
pub struct GroupingView {
    pub mode: GroupingMode,
    pub labels: Vec<String>,
    pub groups: Vec<GroupView>,
}

/// Shared handle to the document set; clones refer to the same state
#[derive(Clone)]
pub struct Workspace {
    state: Arc<RwLock<WorkspaceState>>,
    pipeline: Arc<DocumentPipeline>,
}

impl Workspace {
    pub fn new(pipeline: DocumentPipeline) -> Self {
        Self {
            state: Arc::new(RwLock::new(WorkspaceState::default())),
            pipeline: Arc::new(pipeline),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, WorkspaceState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, WorkspaceState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register an upload
    ///
    /// Anything that is not a PDF is stored already failed and never enters
    /// the pipeline.
    pub fn add_document(&self, name: impl Into<String>, bytes: Vec<u8>) -> Document {
        let mut document = Document::new(name, bytes);
        if !looks_like_pdf(&document.bytes) {
            let reason =
                SigPacketError::UnsupportedInput(format!("{} is not a PDF file", document.name));
            warn!(document = %document.name, "Rejected unsupported upload");
            document.fail(reason.to_string());
        }

        self.write().documents.push(document.clone());
        info!(
            document = %document.name,
            id = %document.id,
            status = ?document.status,
            "Document added"
        );
        document
    }

    /// Remove a document and its records; other documents are untouched
    ///
    /// An in-flight run for the removed document finishes quietly and its
    /// results are dropped.
    pub fn remove_document(&self, id: &str) -> Result<Document> {
        let mut state = self.write();
        let position = state
            .documents
            .iter()
            .position(|d| d.id == id)
            .ok_or_else(|| SigPacketError::DocumentNotFound(id.to_string()))?;
        let removed = state.documents.remove(position);
        info!(document = %removed.name, id, "Document removed");
        Ok(removed)
    }

    pub fn document(&self, id: &str) -> Option<Document> {
        self.read().documents.iter().find(|d| d.id == id).cloned()
    }

    pub fn documents(&self) -> Vec<Document> {
        self.read().documents.clone()
    }

    /// Run the pipeline for one pending document
    ///
    /// Documents that are not pending are left alone. Whole-document failures
    /// are recorded on the document rather than returned.
    pub async fn process_document(&self, id: &str) -> Result<()> {
        let document = {
            let mut state = self.write();
            let document = state
                .document_mut(id)
                .ok_or_else(|| SigPacketError::DocumentNotFound(id.to_string()))?;
            if document.status != DocumentStatus::Pending {
                debug!(
                    document = %document.name,
                    status = ?document.status,
                    "Skipping, not pending"
                );
                return Ok(());
            }
            document.status = DocumentStatus::Processing;
            document.progress = Some(0);
            document.clone()
        };

        info!(document = %document.name, id, "Processing document");

        let state = Arc::clone(&self.state);
        let document_id = document.id.clone();
        let progress = move |percent: usize, _total: usize| {
            let mut state = state.write().unwrap_or_else(PoisonError::into_inner);
            if let Some(entry) = state.document_mut(&document_id) {
                if entry.status == DocumentStatus::Processing {
                    let percent = percent.min(100) as u8;
                    entry.progress = Some(entry.progress.map_or(percent, |p| p.max(percent)));
                }
            }
        };

        let outcome = self.pipeline.extract(&document, &progress).await;

        let mut state = self.write();
        let Some(entry) = state.document_mut(id) else {
            debug!(
                document = %document.name,
                id,
                "Document removed while processing, discarding results"
            );
            return Ok(());
        };

        match outcome {
            Ok(extraction) => {
                entry.page_count = Some(extraction.page_count);
                entry.records = extraction.records;
                entry.status = DocumentStatus::Completed;
                entry.progress = Some(100);
                info!(
                    document = %entry.name,
                    pages = extraction.page_count,
                    candidates = extraction.candidates.len(),
                    records = entry.records.len(),
                    "Document completed"
                );
            }
            Err(e) => {
                error!(document = %entry.name, error = %e, "Document failed");
                entry.fail(e.to_string());
            }
        }
        Ok(())
    }

    /// Process every pending document concurrently
    pub async fn process_pending(&self) {
        let pending: Vec<String> = self
            .read()
            .documents
            .iter()
            .filter(|d| d.status == DocumentStatus::Pending)
            .map(|d| d.id.clone())
            .collect();

        debug!(count = pending.len(), "Processing pending documents");
        let runs = pending.iter().map(|id| self.process_document(id));
        for result in join_all(runs).await {
            if let Err(e) = result {
                // Removed between the listing and the run
                debug!(error = %e, "Pending document vanished");
            }
        }
    }

    /// All records of completed documents, flattened in upload order
    pub fn records(&self) -> Vec<SignatureRecord> {
        self.read()
            .documents
            .iter()
            .filter(|d| d.status == DocumentStatus::Completed)
            .flat_map(|d| d.records.iter().cloned())
            .collect()
    }

    pub fn edit_record(&self, record_id: &str, edit: &RecordEdit) -> Result<SignatureRecord> {
        let mut state = self.write();
        let record = state
            .record_mut(record_id)
            .ok_or_else(|| SigPacketError::RecordNotFound(record_id.to_string()))?;
        record.apply(edit);
        debug!(
            record = record_id,
            party = %record.party_name,
            copies = record.copies,
            "Record edited"
        );
        Ok(record.clone())
    }

    pub fn remove_record(&self, record_id: &str) -> Result<SignatureRecord> {
        let mut state = self.write();
        for document in state
            .documents
            .iter_mut()
            .filter(|d| d.status == DocumentStatus::Completed)
        {
            if let Some(position) = document.records.iter().position(|r| r.id == record_id) {
                let removed = document.records.remove(position);
                debug!(record = record_id, document = %document.name, "Record removed");
                return Ok(removed);
            }
        }
        Err(SigPacketError::RecordNotFound(record_id.to_string()))
    }

    /// Group the current records for review
    pub fn grouping(&self, mode: GroupingMode) -> GroupingView {
        let records = self.records();
        let groups: Vec<GroupView> = partition(&records, mode)
            .into_iter()
            .map(|group| GroupView {
                label: group.label,
                records: group.records.into_iter().cloned().collect(),
            })
            .collect();

        GroupingView {
            mode,
            labels: groups.iter().map(|g| g.label.clone()).collect(),
            groups,
        }
    }

    /// Build one packet per group from a snapshot of the current state
    pub fn export_packets(&self, mode: GroupingMode) -> Result<Vec<Packet>> {
        let documents = self.documents();
        let records = self.records();
        assemble_packets(&documents, &records, mode)
    }
}
