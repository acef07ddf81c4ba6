use std::{net::SocketAddr, sync::Arc};

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
};
use chrono::{NaiveDate, NaiveDateTime};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};

use crate::{
    AssignmentSource, BoardError, BoardStore, CalendarDay, CalendarPolicy, DueDateBoard,
    PersistenceError, RecomputeSummary, RequestTask, ScheduleEntry, SchedulerError,
    compute_latest_start, compute_suggested_due_date, month_grid,
};

type SharedStore = Arc<dyn BoardStore + Send + Sync>;

#[derive(Clone)]
pub struct AppState {
    board: Arc<RwLock<DueDateBoard>>,
    store: Option<SharedStore>,
}

impl AppState {
    pub fn new(board: DueDateBoard) -> Self {
        Self {
            board: Arc::new(RwLock::new(board)),
            store: None,
        }
    }

    pub fn with_shared(board: Arc<RwLock<DueDateBoard>>) -> Self {
        Self { board, store: None }
    }

    /// Persist the board through `store` after every successful mutation.
    pub fn with_store(mut self, store: SharedStore) -> Self {
        self.store = Some(store);
        self
    }

    fn board(&self) -> Arc<RwLock<DueDateBoard>> {
        self.board.clone()
    }

    /// Applies `mutation` to a copy of the board, persists the copy and only
    /// then publishes it, so a failed mutation or save leaves the shared board
    /// as it was.
    fn commit<T, F>(&self, mutation: F) -> Result<T, ApiError>
    where
        F: FnOnce(&mut DueDateBoard) -> Result<T, ApiError>,
    {
        let board = self.board();
        let mut guard = board.write();
        let mut staged = guard.clone();
        let value = mutation(&mut staged)?;
        if let Some(store) = &self.store {
            store.save_board(&staged)?;
        }
        *guard = staged;
        Ok(value)
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    message: String,
}

#[derive(Debug)]
enum ApiError {
    NotFound(String),
    Conflict(String),
    Invalid(String),
    Internal(String),
}

impl ApiError {
    fn not_found(message: impl Into<String>) -> Self {
        ApiError::NotFound(message.into())
    }

    fn invalid(message: impl Into<String>) -> Self {
        ApiError::Invalid(message.into())
    }

    fn internal(message: impl Into<String>) -> Self {
        ApiError::Internal(message.into())
    }
}

impl From<BoardError> for ApiError {
    fn from(value: BoardError) -> Self {
        match value {
            BoardError::TaskNotFound(_) => ApiError::NotFound(value.to_string()),
            BoardError::DuplicateTask(_) | BoardError::NoSuggestion(_) => {
                ApiError::Conflict(value.to_string())
            }
            _ => ApiError::Invalid(value.to_string()),
        }
    }
}

impl From<SchedulerError> for ApiError {
    fn from(value: SchedulerError) -> Self {
        ApiError::Invalid(value.to_string())
    }
}

impl From<PersistenceError> for ApiError {
    fn from(value: PersistenceError) -> Self {
        ApiError::Internal(value.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error, message) = match self {
            ApiError::NotFound(message) => (StatusCode::NOT_FOUND, "not_found", message),
            ApiError::Conflict(message) => (StatusCode::CONFLICT, "conflict", message),
            ApiError::Invalid(message) => (StatusCode::BAD_REQUEST, "invalid_request", message),
            ApiError::Internal(message) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", message)
            }
        };
        if status.is_server_error() {
            warn!(%status, %message, "request failed");
        }
        (status, Json(ErrorBody { error, message })).into_response()
    }
}

#[derive(Debug, Deserialize)]
struct AssignPayload {
    date: NaiveDateTime,
    #[serde(default)]
    source: AssignmentSource,
}

#[derive(Debug, Deserialize)]
struct BulkAssignPayload {
    ids: Vec<i32>,
    date: NaiveDateTime,
}

#[derive(Debug, Deserialize)]
struct DropPayload {
    day: NaiveDate,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ComputePayload {
    anchor: NaiveDateTime,
    duration_hours: f64,
    #[serde(default)]
    policy: Option<CalendarPolicy>,
}

#[derive(Debug, Serialize)]
struct ComputedDate {
    date: NaiveDateTime,
}

#[derive(Debug, Serialize)]
struct BulkAssignResult {
    assigned: usize,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/policy", get(get_policy).put(update_policy))
        .route("/tasks", get(list_tasks).post(create_task))
        .route(
            "/tasks/:id",
            get(get_task).put(update_task).delete(delete_task),
        )
        .route(
            "/tasks/:id/due_date",
            put(assign_due_date).delete(clear_due_date),
        )
        .route("/tasks/:id/drop", post(drop_on_day))
        .route("/tasks/:id/accept", post(accept_suggestion))
        .route("/bulk_assign", post(bulk_assign))
        .route("/recompute", post(recompute))
        .route("/overlay", get(overlay))
        .route("/compute/suggested_due_date", post(suggested_due_date))
        .route("/compute/latest_start", post(latest_start))
        .route("/calendar/:year/:month", get(calendar_month))
        .with_state(state)
}

pub async fn serve(addr: SocketAddr, state: AppState) -> std::io::Result<()> {
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "due-date scheduler HTTP API listening");
    axum::serve(listener, app).await
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

async fn get_policy(State(state): State<AppState>) -> Json<CalendarPolicy> {
    let board = state.board();
    let policy = {
        let guard = board.read();
        guard.policy().clone()
    };
    Json(policy)
}

async fn update_policy(
    State(state): State<AppState>,
    Json(policy): Json<CalendarPolicy>,
) -> Result<Json<CalendarPolicy>, ApiError> {
    let current = state.commit(|board| {
        board.set_policy(policy)?;
        Ok(board.policy().clone())
    })?;
    Ok(Json(current))
}

async fn list_tasks(State(state): State<AppState>) -> Json<Vec<RequestTask>> {
    let board = state.board();
    let tasks = {
        let guard = board.read();
        guard.tasks().to_vec()
    };
    Json(tasks)
}

async fn get_task(
    State(state): State<AppState>,
    Path(task_id): Path<i32>,
) -> Result<Json<RequestTask>, ApiError> {
    let board = state.board();
    let result = {
        let guard = board.read();
        guard.find_task(task_id).cloned()
    };
    match result {
        Some(task) => Ok(Json(task)),
        None => Err(ApiError::not_found(format!("task {task_id} not found"))),
    }
}

async fn create_task(
    State(state): State<AppState>,
    Json(task): Json<RequestTask>,
) -> Result<(StatusCode, Json<RequestTask>), ApiError> {
    let task_id = task.id;
    let created = state.commit(|board| {
        board.add_task(task)?;
        board.recompute()?;
        board
            .find_task(task_id)
            .cloned()
            .ok_or_else(|| ApiError::internal("task not found after creation"))
    })?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn update_task(
    State(state): State<AppState>,
    Path(task_id): Path<i32>,
    Json(task): Json<RequestTask>,
) -> Result<Json<RequestTask>, ApiError> {
    if task.id != task_id {
        return Err(ApiError::invalid(
            "task id in payload does not match path parameter",
        ));
    }
    let updated = state.commit(|board| {
        if board.find_task(task_id).is_none() {
            return Err(ApiError::not_found(format!("task {task_id} not found")));
        }
        board.upsert_task(task)?;
        board.recompute()?;
        board
            .find_task(task_id)
            .cloned()
            .ok_or_else(|| ApiError::internal("task not found after update"))
    })?;
    Ok(Json(updated))
}

async fn delete_task(
    State(state): State<AppState>,
    Path(task_id): Path<i32>,
) -> Result<StatusCode, ApiError> {
    state.commit(|board| {
        if board.remove_task(task_id) {
            Ok(())
        } else {
            Err(ApiError::not_found(format!("task {task_id} not found")))
        }
    })?;
    Ok(StatusCode::NO_CONTENT)
}

async fn assign_due_date(
    State(state): State<AppState>,
    Path(task_id): Path<i32>,
    Json(payload): Json<AssignPayload>,
) -> Result<Json<RequestTask>, ApiError> {
    mutate_task(&state, task_id, |board| {
        board.assign_due_date(task_id, payload.date, payload.source)?;
        Ok(())
    })
}

async fn clear_due_date(
    State(state): State<AppState>,
    Path(task_id): Path<i32>,
) -> Result<Json<RequestTask>, ApiError> {
    mutate_task(&state, task_id, |board| {
        board.clear_due_date(task_id)?;
        Ok(())
    })
}

async fn drop_on_day(
    State(state): State<AppState>,
    Path(task_id): Path<i32>,
    Json(payload): Json<DropPayload>,
) -> Result<Json<RequestTask>, ApiError> {
    mutate_task(&state, task_id, |board| {
        board.drop_on_day(task_id, payload.day)?;
        Ok(())
    })
}

async fn accept_suggestion(
    State(state): State<AppState>,
    Path(task_id): Path<i32>,
) -> Result<Json<RequestTask>, ApiError> {
    mutate_task(&state, task_id, |board| {
        board.accept_suggestion(task_id)?;
        Ok(())
    })
}

fn mutate_task<F>(state: &AppState, task_id: i32, mutation: F) -> Result<Json<RequestTask>, ApiError>
where
    F: FnOnce(&mut DueDateBoard) -> Result<(), BoardError>,
{
    let task = state.commit(|board| {
        mutation(board)?;
        board
            .find_task(task_id)
            .cloned()
            .ok_or_else(|| ApiError::internal("task not found after update"))
    })?;
    Ok(Json(task))
}

async fn bulk_assign(
    State(state): State<AppState>,
    Json(payload): Json<BulkAssignPayload>,
) -> Result<Json<BulkAssignResult>, ApiError> {
    if payload.ids.is_empty() {
        return Err(ApiError::invalid("bulk assignment requires at least one task id"));
    }
    let assigned = state.commit(|board| Ok(board.bulk_assign(&payload.ids, payload.date)?))?;
    Ok(Json(BulkAssignResult { assigned }))
}

async fn recompute(State(state): State<AppState>) -> Result<Json<RecomputeSummary>, ApiError> {
    let summary = state.commit(|board| Ok(board.recompute()?))?;
    Ok(Json(summary))
}

async fn overlay(State(state): State<AppState>) -> Result<Json<Vec<ScheduleEntry>>, ApiError> {
    let board = state.board();
    let entries = {
        let guard = board.read();
        guard.schedule_overlay()?
    };
    Ok(Json(entries))
}

fn payload_policy(state: &AppState, payload: &mut ComputePayload) -> CalendarPolicy {
    payload
        .policy
        .take()
        .unwrap_or_else(|| state.board().read().policy().clone())
}

async fn suggested_due_date(
    State(state): State<AppState>,
    Json(mut payload): Json<ComputePayload>,
) -> Result<Json<ComputedDate>, ApiError> {
    let policy = payload_policy(&state, &mut payload);
    let date = compute_suggested_due_date(payload.anchor, payload.duration_hours, &policy)?;
    Ok(Json(ComputedDate { date }))
}

async fn latest_start(
    State(state): State<AppState>,
    Json(mut payload): Json<ComputePayload>,
) -> Result<Json<ComputedDate>, ApiError> {
    let policy = payload_policy(&state, &mut payload);
    let date = compute_latest_start(payload.anchor, payload.duration_hours, &policy)?;
    Ok(Json(ComputedDate { date }))
}

async fn calendar_month(
    State(state): State<AppState>,
    Path((year, month)): Path<(i32, u32)>,
) -> Result<Json<Vec<CalendarDay>>, ApiError> {
    let board = state.board();
    let days = {
        let guard = board.read();
        month_grid(year, month, guard.policy())
    };
    days.map(Json)
        .ok_or_else(|| ApiError::invalid(format!("invalid calendar month {year}-{month}")))
}
