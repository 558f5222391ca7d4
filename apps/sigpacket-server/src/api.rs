//! API handlers for the signature packet server
//!
//! Provides REST endpoints for:
//! - Document upload, status polling and removal
//! - Signature record edits
//! - Grouping views
//! - Packet export

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use base64::Engine;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use sigpacket_core::{
    Document, DocumentStatus, GroupingMode, GroupingView, Packet, RecordEdit, SignatureRecord,
};

use crate::error::ServerError;
use crate::AppState;

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
}

/// Handler: GET /health
pub async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        service: "sigpacket-server",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Upload request body
#[derive(Deserialize)]
pub struct UploadRequest {
    /// Display name, usually the uploaded file name
    pub name: String,
    /// Base64-encoded file bytes
    pub data: String,
}

#[derive(Serialize)]
pub struct DocumentResponse {
    pub success: bool,
    pub document: Document,
}

/// Handler: POST /api/documents
///
/// Stores the upload and starts processing in the background. Poll
/// `GET /api/documents/:id` for status and progress.
pub async fn handle_upload(
    State(state): State<AppState>,
    Json(request): Json<UploadRequest>,
) -> Result<(StatusCode, Json<DocumentResponse>), ServerError> {
    if request.name.trim().is_empty() {
        return Err(ServerError::InvalidRequest("Document name is required".into()));
    }
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(request.data.as_bytes())
        .map_err(|e| ServerError::InvalidRequest(format!("Invalid base64 data: {}", e)))?;

    let document = state.workspace.add_document(request.name, bytes);

    if document.status == DocumentStatus::Pending {
        let workspace = state.workspace.clone();
        let id = document.id.clone();
        tokio::spawn(async move {
            if let Err(e) = workspace.process_document(&id).await {
                warn!(id = %id, error = %e, "Background processing did not run");
            }
        });
    }

    Ok((
        StatusCode::CREATED,
        Json(DocumentResponse {
            success: true,
            document,
        }),
    ))
}

#[derive(Serialize)]
pub struct DocumentListResponse {
    pub success: bool,
    pub documents: Vec<Document>,
    pub count: usize,
}

/// Handler: GET /api/documents
pub async fn handle_list_documents(State(state): State<AppState>) -> Json<DocumentListResponse> {
    let documents = state.workspace.documents();
    let count = documents.len();
    Json(DocumentListResponse {
        success: true,
        documents,
        count,
    })
}

/// Handler: GET /api/documents/:id
pub async fn handle_get_document(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DocumentResponse>, ServerError> {
    let document = state
        .workspace
        .document(&id)
        .ok_or(ServerError::DocumentNotFound(id))?;
    Ok(Json(DocumentResponse {
        success: true,
        document,
    }))
}

#[derive(Serialize)]
pub struct RemovedResponse {
    pub success: bool,
    pub id: String,
}

/// Handler: DELETE /api/documents/:id
pub async fn handle_remove_document(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<RemovedResponse>, ServerError> {
    let removed = state.workspace.remove_document(&id)?;
    Ok(Json(RemovedResponse {
        success: true,
        id: removed.id,
    }))
}

#[derive(Serialize)]
pub struct RecordResponse {
    pub success: bool,
    pub record: SignatureRecord,
}

/// Handler: PATCH /api/records/:id
pub async fn handle_edit_record(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(edit): Json<RecordEdit>,
) -> Result<Json<RecordResponse>, ServerError> {
    let record = state.workspace.edit_record(&id, &edit)?;
    Ok(Json(RecordResponse {
        success: true,
        record,
    }))
}

/// Handler: DELETE /api/records/:id
pub async fn handle_remove_record(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<RemovedResponse>, ServerError> {
    let removed = state.workspace.remove_record(&id)?;
    Ok(Json(RemovedResponse {
        success: true,
        id: removed.id,
    }))
}

#[derive(Deserialize)]
pub struct GroupsQuery {
    pub mode: Option<String>,
}

pub(crate) fn parse_mode(mode: Option<&str>) -> Result<GroupingMode, ServerError> {
    match mode {
        Some(mode) => Ok(mode.parse::<GroupingMode>()?),
        None => Ok(GroupingMode::default()),
    }
}

#[derive(Serialize)]
pub struct GroupsResponse {
    pub success: bool,
    #[serde(flatten)]
    pub view: GroupingView,
}

/// Handler: GET /api/groups?mode=
pub async fn handle_groups(
    State(state): State<AppState>,
    Query(query): Query<GroupsQuery>,
) -> Result<Json<GroupsResponse>, ServerError> {
    let mode = parse_mode(query.mode.as_deref())?;
    let view = state.workspace.grouping(mode);
    debug!(mode = %mode, groups = view.labels.len(), "Computed grouping view");
    Ok(Json(GroupsResponse {
        success: true,
        view,
    }))
}

#[derive(Deserialize, Default)]
pub struct ExportRequest {
    #[serde(default)]
    pub mode: Option<String>,
}

#[derive(Serialize)]
pub struct PacketInfo {
    pub file_name: String,
    pub group: String,
    pub page_count: usize,
    /// Base64-encoded PDF
    pub data: String,
}

impl From<Packet> for PacketInfo {
    fn from(packet: Packet) -> Self {
        Self {
            data: base64::engine::general_purpose::STANDARD.encode(&packet.data),
            file_name: packet.file_name,
            group: packet.group,
            page_count: packet.page_count,
        }
    }
}

#[derive(Serialize)]
pub struct ExportResponse {
    pub success: bool,
    pub mode: GroupingMode,
    pub packets: Vec<PacketInfo>,
    pub count: usize,
}

/// Handler: POST /api/export
///
/// Either every packet is returned or the request fails with no packets.
pub async fn handle_export(
    State(state): State<AppState>,
    Json(request): Json<ExportRequest>,
) -> Result<Json<ExportResponse>, ServerError> {
    let mode = parse_mode(request.mode.as_deref())?;

    let workspace = state.workspace.clone();
    let packets = tokio::task::spawn_blocking(move || workspace.export_packets(mode))
        .await
        .map_err(|e| ServerError::Internal(format!("Export task failed: {}", e)))?
        .map_err(|e| ServerError::ExportFailed(e.to_string()))?;

    info!(mode = %mode, packets = packets.len(), "Exported signature packets");

    let packets: Vec<PacketInfo> = packets.into_iter().map(PacketInfo::from).collect();
    let count = packets.len();
    Ok(Json(ExportResponse {
        success: true,
        mode,
        packets,
        count,
    }))
}
