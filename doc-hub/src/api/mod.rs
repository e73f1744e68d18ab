//! HTTP API layer exposing the access-checked document endpoints.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post, put},
    Json, Router,
};
use doc_hub_core::access::{AccessGrant, ComputedPermission, LinkReach, LinkRole, Role, Subject};
use doc_hub_core::auth::TokenVerifier;
use doc_hub_core::identity::TeamDirectory;
use doc_hub_core::{
    AccessError, DeleteMode, DescendantListing, DescendantRecord, Document, DocumentService, NewDocument,
    PageRequest,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::error;
use uuid::Uuid;

pub mod auth_middleware;

pub use auth_middleware::AuthContext;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub service: DocumentService,
    pub verifier: Arc<dyn TokenVerifier>,
    pub teams: Arc<dyn TeamDirectory>,
    /// Accept `X-User-Id` as identity.
    pub header_identity: bool,
}

/// Error body in the `{"detail": ...}` shape clients expect.
pub struct ApiError(AccessError);

impl From<AccessError> for ApiError {
    fn from(err: AccessError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, detail) = match &self.0 {
            AccessError::Unauthenticated => (
                StatusCode::UNAUTHORIZED,
                "Authentication credentials were not provided.",
            ),
            AccessError::Forbidden => (
                StatusCode::FORBIDDEN,
                "You do not have permission to perform this action.",
            ),
            AccessError::NotFound => (StatusCode::NOT_FOUND, "Not found."),
            AccessError::InvalidMove => (
                StatusCode::BAD_REQUEST,
                "Cannot move a document into its own subtree.",
            ),
            AccessError::InvalidCursor => (StatusCode::BAD_REQUEST, "Invalid cursor."),
            AccessError::Store(err) => {
                error!(error = %err, "store failure");
                (StatusCode::INTERNAL_SERVER_ERROR, "A server error occurred.")
            }
        };
        (status, Json(json!({ "detail": detail }))).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

#[derive(Deserialize)]
struct CreateRequest {
    #[serde(default)]
    parent: Option<Uuid>,
    #[serde(flatten)]
    document: NewDocument,
}

#[derive(Deserialize)]
struct ListQuery {
    cursor: Option<String>,
    page_size: Option<usize>,
}

#[derive(Deserialize)]
struct DeleteQuery {
    mode: Option<DeleteMode>,
}

#[derive(Deserialize)]
struct MoveRequest {
    parent: Option<Uuid>,
}

#[derive(Deserialize)]
struct LinkRequest {
    link_reach: LinkReach,
    link_role: LinkRole,
}

#[derive(Deserialize)]
struct GrantRequest {
    subject: Subject,
    role: Role,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/api/v1.0/documents/", post(create_document))
        .route(
            "/api/v1.0/documents/{id}/",
            get(retrieve_document).delete(delete_document),
        )
        .route("/api/v1.0/documents/{id}/descendants/", get(list_descendants))
        .route("/api/v1.0/documents/{id}/permission/", get(get_permission))
        .route("/api/v1.0/documents/{id}/move/", post(move_document))
        .route(
            "/api/v1.0/documents/{id}/link-configuration/",
            put(update_link_configuration),
        )
        .route("/api/v1.0/documents/{id}/accesses/", post(grant_access))
        .route(
            "/api/v1.0/documents/{id}/accesses/{grant_id}/",
            delete(revoke_access),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn create_document(
    State(state): State<AppState>,
    AuthContext(viewer): AuthContext,
    Json(req): Json<CreateRequest>,
) -> ApiResult<(StatusCode, Json<Document>)> {
    let doc = state
        .service
        .create_document(&viewer, req.parent, req.document)
        .await?;
    Ok((StatusCode::CREATED, Json(doc)))
}

async fn retrieve_document(
    State(state): State<AppState>,
    AuthContext(viewer): AuthContext,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<DescendantRecord>> {
    Ok(Json(state.service.retrieve(&viewer, id).await?))
}

async fn delete_document(
    State(state): State<AppState>,
    AuthContext(viewer): AuthContext,
    Path(id): Path<Uuid>,
    Query(query): Query<DeleteQuery>,
) -> ApiResult<StatusCode> {
    let mode = query.mode.unwrap_or(DeleteMode::Soft);
    state.service.delete_document(&viewer, id, mode).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_descendants(
    State(state): State<AppState>,
    AuthContext(viewer): AuthContext,
    Path(id): Path<Uuid>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<DescendantListing>> {
    let request = PageRequest {
        cursor: query.cursor,
        page_size: query.page_size,
    };
    Ok(Json(state.service.list_descendants(&viewer, id, &request).await?))
}

async fn get_permission(
    State(state): State<AppState>,
    AuthContext(viewer): AuthContext,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ComputedPermission>> {
    Ok(Json(state.service.permission(&viewer, id).await?))
}

async fn move_document(
    State(state): State<AppState>,
    AuthContext(viewer): AuthContext,
    Path(id): Path<Uuid>,
    Json(req): Json<MoveRequest>,
) -> ApiResult<Json<Document>> {
    Ok(Json(state.service.move_document(&viewer, id, req.parent).await?))
}

async fn update_link_configuration(
    State(state): State<AppState>,
    AuthContext(viewer): AuthContext,
    Path(id): Path<Uuid>,
    Json(req): Json<LinkRequest>,
) -> ApiResult<Json<Document>> {
    let doc = state
        .service
        .update_link_configuration(&viewer, id, req.link_reach, req.link_role)
        .await?;
    Ok(Json(doc))
}

async fn grant_access(
    State(state): State<AppState>,
    AuthContext(viewer): AuthContext,
    Path(id): Path<Uuid>,
    Json(req): Json<GrantRequest>,
) -> ApiResult<(StatusCode, Json<AccessGrant>)> {
    let grant = state
        .service
        .grant_access(&viewer, id, req.subject, req.role)
        .await?;
    Ok((StatusCode::CREATED, Json(grant)))
}

async fn revoke_access(
    State(state): State<AppState>,
    AuthContext(viewer): AuthContext,
    Path((id, grant_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<StatusCode> {
    state.service.revoke_access(&viewer, id, grant_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
