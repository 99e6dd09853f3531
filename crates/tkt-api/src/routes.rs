//! HTTP routes mapping requests onto ticket store operations

use axum::{
    Json, Router,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, put},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tkt_core::{ErrorKind, IntegrityReport, Ticket, TicketId, TicketNode, TicketStore};

/// Shared application state
pub struct AppState {
    pub store: Arc<TicketStore>,
}

/// Request to create a new ticket
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateTicketRequest {
    title: String,
    #[serde(default)]
    is_completed: Option<bool>,
}

/// Request to change a ticket's title
#[derive(Debug, Deserialize)]
struct UpdateTitleRequest {
    title: String,
}

/// Request to change a ticket's completion flag
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SetCompletionRequest {
    is_completed: bool,
}

/// Request to attach several children to a parent
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AddChildrenRequest {
    child_ids: Vec<TicketId>,
}

/// Request to set a ticket's parent
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SetParentRequest {
    parent_id: TicketId,
}

/// A ticket with its direct children
#[derive(Debug, Serialize)]
struct TicketView {
    #[serde(flatten)]
    ticket: Ticket,
    children: Vec<Ticket>,
}

impl From<(Ticket, Vec<Ticket>)> for TicketView {
    fn from((ticket, children): (Ticket, Vec<Ticket>)) -> Self {
        Self { ticket, children }
    }
}

/// API response wrapper
#[derive(Debug, Serialize)]
struct ApiResponse<T> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    fn err(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

/// A failed request, rendered as an `ApiResponse` error body
#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
}

impl From<tkt_core::Error> for ApiError {
    fn from(err: tkt_core::Error) -> Self {
        let status = match err.kind() {
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Validation => StatusCode::BAD_REQUEST,
            ErrorKind::Cycle => StatusCode::CONFLICT,
            ErrorKind::Storage => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: rejection.body_text(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!(status = %self.status, error = %self.message, "request failed");
        } else {
            tracing::warn!(status = %self.status, error = %self.message, "request rejected");
        }
        (self.status, Json(ApiResponse::<()>::err(self.message))).into_response()
    }
}

type ApiResult<T> = Result<(StatusCode, Json<ApiResponse<T>>), ApiError>;

fn ok<T>(data: T) -> ApiResult<T> {
    Ok((StatusCode::OK, Json(ApiResponse::ok(data))))
}

fn parse_id(raw: &str) -> Result<TicketId, ApiError> {
    raw.parse::<TicketId>().map_err(ApiError::from)
}

/// Health check endpoint
async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

/// List root tickets
async fn list_tickets(State(state): State<Arc<AppState>>) -> ApiResult<Vec<Ticket>> {
    ok(state.store.list_root_tickets()?)
}

/// Create a new root ticket
async fn create_ticket(
    State(state): State<Arc<AppState>>,
    body: Result<Json<CreateTicketRequest>, JsonRejection>,
) -> ApiResult<Ticket> {
    let Json(req) = body?;
    let ticket = state.store.create_ticket(&req.title, req.is_completed)?;
    tracing::info!(id = %ticket.id, "ticket created");
    Ok((StatusCode::CREATED, Json(ApiResponse::ok(ticket))))
}

/// Get a single ticket with its children
async fn get_ticket(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<TicketView> {
    let id = parse_id(&id)?;
    ok(state.store.get_with_children(id)?.into())
}

/// Change a ticket's title
async fn update_title(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    body: Result<Json<UpdateTitleRequest>, JsonRejection>,
) -> ApiResult<Ticket> {
    let id = parse_id(&id)?;
    let Json(req) = body?;
    ok(state.store.update_title(id, &req.title)?)
}

/// Change a ticket's completion flag
async fn set_completion(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    body: Result<Json<SetCompletionRequest>, JsonRejection>,
) -> ApiResult<Ticket> {
    let id = parse_id(&id)?;
    let Json(req) = body?;
    ok(state.store.set_completion(id, req.is_completed)?)
}

/// Delete a ticket; its children are left in place
async fn delete_ticket(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<bool> {
    let id = parse_id(&id)?;
    let deletion = state.store.delete_ticket(id)?;
    if deletion.orphaned.is_empty() {
        tracing::info!(%id, "ticket deleted");
    } else {
        tracing::info!(%id, orphaned = ?deletion.orphaned, "ticket deleted, children left dangling");
    }
    ok(true)
}

/// Direct children of a ticket
async fn list_children(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Vec<Ticket>> {
    let id = parse_id(&id)?;
    ok(state.store.children_of(id)?)
}

/// Attach several tickets to a parent at once
async fn add_children(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    body: Result<Json<AddChildrenRequest>, JsonRejection>,
) -> ApiResult<TicketView> {
    let id = parse_id(&id)?;
    let Json(req) = body?;
    ok(state
        .store
        .reparent_many_with_children(id, req.child_ids)?
        .into())
}

/// Set a ticket's parent
async fn set_parent(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    body: Result<Json<SetParentRequest>, JsonRejection>,
) -> ApiResult<Ticket> {
    let id = parse_id(&id)?;
    let Json(req) = body?;
    ok(state.store.reparent(id, req.parent_id)?)
}

/// Make a ticket a root
async fn remove_parent(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Ticket> {
    let id = parse_id(&id)?;
    ok(state.store.clear_parent(id)?)
}

/// Nested subtree rooted at a ticket
async fn get_tree(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<TicketNode> {
    let id = parse_id(&id)?;
    ok(state.store.subtree(id)?)
}

/// Whole-table consistency report
async fn check(State(state): State<Arc<AppState>>) -> ApiResult<IntegrityReport> {
    ok(state.store.check()?)
}

/// Build the router over a shared store
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/check", get(check))
        .route("/tickets", get(list_tickets).post(create_ticket))
        .route("/tickets/{id}", get(get_ticket).delete(delete_ticket))
        .route("/tickets/{id}/title", put(update_title))
        .route("/tickets/{id}/completion", put(set_completion))
        .route("/tickets/{id}/children", get(list_children).post(add_children))
        .route("/tickets/{id}/parent", put(set_parent).delete(remove_parent))
        .route("/tickets/{id}/tree", get(get_tree))
        .with_state(state)
}
