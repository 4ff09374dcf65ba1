use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Router,
};
use serde::Serialize;
use serde_json::json;

use super::artifact::ArtifactStore;
use super::controller::{
    ReviewAction, ReviewCommand, ReviewController, ReviewError, Stage, StageError,
};
use super::domain::{ProfileUpdate, Username};
use super::notify::NotificationDispatcher;
use super::repository::ApplicantRepository;

type SharedController<R, D, S> = Arc<ReviewController<R, D, S>>;

/// Reviewer endpoints. Actions address applicants by username.
pub fn review_router<R, D, S>(controller: SharedController<R, D, S>) -> Router
where
    R: ApplicantRepository + 'static,
    D: NotificationDispatcher + 'static,
    S: ArtifactStore + 'static,
{
    Router::new()
        .route("/api/v1/applicants", get(list_handler::<R, D, S>))
        .route(
            "/api/v1/applicants/:username",
            get(detail_handler::<R, D, S>).delete(delete_handler::<R, D, S>),
        )
        .route(
            "/api/v1/applicants/:username/approve",
            post(approve_handler::<R, D, S>),
        )
        .route(
            "/api/v1/applicants/:username/reject",
            post(reject_handler::<R, D, S>),
        )
        .route(
            "/api/v1/applicants/:username/details",
            put(details_handler::<R, D, S>),
        )
        .with_state(controller)
}

pub(crate) async fn list_handler<R, D, S>(
    State(controller): State<SharedController<R, D, S>>,
) -> Response
where
    R: ApplicantRepository + 'static,
    D: NotificationDispatcher + 'static,
    S: ArtifactStore + 'static,
{
    match blocking(move || controller.applicants()).await {
        Ok(Ok(records)) => (StatusCode::OK, axum::Json(records)).into_response(),
        Ok(Err(err)) => review_error_response(&err),
        Err(response) => response,
    }
}

pub(crate) async fn detail_handler<R, D, S>(
    State(controller): State<SharedController<R, D, S>>,
    Path(username): Path<String>,
) -> Response
where
    R: ApplicantRepository + 'static,
    D: NotificationDispatcher + 'static,
    S: ArtifactStore + 'static,
{
    let username = Username::new(username);
    match blocking(move || controller.applicant(&username)).await {
        Ok(Ok(record)) => (StatusCode::OK, axum::Json(record)).into_response(),
        Ok(Err(err)) => review_error_response(&err),
        Err(response) => response,
    }
}

pub(crate) async fn approve_handler<R, D, S>(
    State(controller): State<SharedController<R, D, S>>,
    Path(username): Path<String>,
) -> Response
where
    R: ApplicantRepository + 'static,
    D: NotificationDispatcher + 'static,
    S: ArtifactStore + 'static,
{
    let command = ReviewCommand::Approve {
        username: Username::new(username),
    };
    run_command(controller, command).await
}

pub(crate) async fn reject_handler<R, D, S>(
    State(controller): State<SharedController<R, D, S>>,
    Path(username): Path<String>,
) -> Response
where
    R: ApplicantRepository + 'static,
    D: NotificationDispatcher + 'static,
    S: ArtifactStore + 'static,
{
    let command = ReviewCommand::Reject {
        username: Username::new(username),
    };
    run_command(controller, command).await
}

pub(crate) async fn delete_handler<R, D, S>(
    State(controller): State<SharedController<R, D, S>>,
    Path(username): Path<String>,
) -> Response
where
    R: ApplicantRepository + 'static,
    D: NotificationDispatcher + 'static,
    S: ArtifactStore + 'static,
{
    let command = ReviewCommand::Delete {
        username: Username::new(username),
    };
    run_command(controller, command).await
}

pub(crate) async fn details_handler<R, D, S>(
    State(controller): State<SharedController<R, D, S>>,
    Path(username): Path<String>,
    axum::Json(details): axum::Json<ProfileUpdate>,
) -> Response
where
    R: ApplicantRepository + 'static,
    D: NotificationDispatcher + 'static,
    S: ArtifactStore + 'static,
{
    let command = ReviewCommand::SubmitDetails {
        username: Username::new(username),
        details,
    };
    run_command(controller, command).await
}

async fn run_command<R, D, S>(
    controller: SharedController<R, D, S>,
    command: ReviewCommand,
) -> Response
where
    R: ApplicantRepository + 'static,
    D: NotificationDispatcher + 'static,
    S: ArtifactStore + 'static,
{
    match blocking(move || controller.dispatch(command)).await {
        Ok(Ok(outcome)) => (StatusCode::OK, axum::Json(outcome)).into_response(),
        Ok(Err(err)) => stage_error_response(&err),
        Err(response) => response,
    }
}

/// Repository, filesystem, and SMTP calls block; keep them off the runtime workers.
async fn blocking<T, F>(task: F) -> Result<T, Response>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(task).await.map_err(|err| {
        let payload = json!({ "error": format!("review task aborted: {err}") });
        (StatusCode::INTERNAL_SERVER_ERROR, axum::Json(payload)).into_response()
    })
}

pub(crate) fn status_for(error: &ReviewError) -> StatusCode {
    match error {
        ReviewError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        ReviewError::NotFound(_) => StatusCode::NOT_FOUND,
        ReviewError::Transport(_) => StatusCode::BAD_GATEWAY,
        ReviewError::Persistence(_) | ReviewError::Template(_) | ReviewError::Artifact(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

fn review_error_response(error: &ReviewError) -> Response {
    let payload = json!({ "error": error.to_string() });
    (status_for(error), axum::Json(payload)).into_response()
}

#[derive(Serialize)]
struct StageErrorBody<'a> {
    error: String,
    action: ReviewAction,
    stage: Stage,
    completed: &'a [Stage],
    letter_path: Option<String>,
}

fn stage_error_response(error: &StageError) -> Response {
    let body = StageErrorBody {
        error: error.to_string(),
        action: error.action,
        stage: error.stage,
        completed: &error.completed,
        letter_path: error
            .letter_path
            .as_ref()
            .map(|path| path.display().to_string()),
    };
    (status_for(&error.source), axum::Json(body)).into_response()
}
