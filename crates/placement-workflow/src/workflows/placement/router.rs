use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;
use tracing::error;

use super::domain::{
    Actor, ActorRole, ApplicationId, ApplicationStatus, ApplicationStep, DocumentRef, JobId,
    StepDetails, UserId,
};
use super::guard::TransitionError;
use super::repository::{
    ApplicationRepository, IdentityVerificationProvider, MarketplaceDirectory, RepositoryError,
};
use super::service::{ApplicationService, ApplicationServiceError, SubmitApplication};

pub const ACTOR_ROLE_HEADER: &str = "x-actor-role";
pub const ACTOR_ID_HEADER: &str = "x-actor-id";

/// Shared state behind the placement routes.
pub struct PlacementApi<R, D> {
    service: Arc<ApplicationService<R, D>>,
    identity: Arc<dyn IdentityVerificationProvider>,
}

impl<R, D> PlacementApi<R, D> {
    pub fn new(
        service: Arc<ApplicationService<R, D>>,
        identity: Arc<dyn IdentityVerificationProvider>,
    ) -> Self {
        Self { service, identity }
    }

    pub fn service(&self) -> &Arc<ApplicationService<R, D>> {
        &self.service
    }
}

/// Router exposing the application lifecycle endpoints.
pub fn placement_router<R, D>(api: Arc<PlacementApi<R, D>>) -> Router
where
    R: ApplicationRepository + 'static,
    D: MarketplaceDirectory + 'static,
{
    Router::new()
        .route(
            "/api/v1/applications",
            post(submit_handler::<R, D>).get(list_handler::<R, D>),
        )
        .route(
            "/api/v1/applications/:application_id/progress",
            get(progress_handler::<R, D>),
        )
        .route(
            "/api/v1/applications/:application_id/advance",
            post(advance_handler::<R, D>),
        )
        .with_state(api)
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdvanceRequest {
    pub target_step: String,
    #[serde(default)]
    pub interview_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub interview_notes: Option<String>,
    #[serde(default)]
    pub medical_document_ref: Option<DocumentRef>,
    #[serde(default)]
    pub flight_ticket_ref: Option<DocumentRef>,
    #[serde(default)]
    pub flight_details: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitRequest {
    pub job_id: JobId,
    #[serde(default)]
    pub expected_salary: Option<u32>,
    #[serde(default)]
    pub cover_letter: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub status: Option<ApplicationStatus>,
}

pub(crate) async fn progress_handler<R, D>(
    State(api): State<Arc<PlacementApi<R, D>>>,
    Path(application_id): Path<String>,
    headers: HeaderMap,
) -> Response
where
    R: ApplicationRepository + 'static,
    D: MarketplaceDirectory + 'static,
{
    let actor = match session_actor(&headers) {
        Ok(actor) => actor,
        Err(response) => return response,
    };

    match api
        .service
        .get_progress(&ApplicationId(application_id), &actor)
    {
        Ok(progress) => (StatusCode::OK, axum::Json(progress)).into_response(),
        Err(error) => service_error_response(error),
    }
}

pub(crate) async fn advance_handler<R, D>(
    State(api): State<Arc<PlacementApi<R, D>>>,
    Path(application_id): Path<String>,
    headers: HeaderMap,
    axum::Json(request): axum::Json<AdvanceRequest>,
) -> Response
where
    R: ApplicationRepository + 'static,
    D: MarketplaceDirectory + 'static,
{
    let actor = match session_actor(&headers) {
        Ok(actor) => actor,
        Err(response) => return response,
    };

    let target = match request.target_step.parse::<ApplicationStep>() {
        Ok(step) => step,
        Err(error) => {
            let payload = json!({ "error": error.to_string() });
            return (StatusCode::UNPROCESSABLE_ENTITY, axum::Json(payload)).into_response();
        }
    };
    let details = StepDetails {
        interview_date: request.interview_date,
        interview_notes: request.interview_notes,
        medical_document: request.medical_document_ref,
        flight_ticket: request.flight_ticket_ref,
        flight_details: request.flight_details,
    };
    let application_id = ApplicationId(application_id);

    // Runs to completion even if the client goes away.
    let outcome = tokio::task::spawn_blocking(move || {
        api.service
            .advance(&application_id, &actor, target, details)
    })
    .await;

    match outcome {
        Ok(Ok(application)) => (StatusCode::OK, axum::Json(application)).into_response(),
        Ok(Err(error)) => service_error_response(error),
        Err(join_error) => {
            error!(error = %join_error, "advance task did not complete");
            let payload = json!({ "error": "internal error" });
            (StatusCode::INTERNAL_SERVER_ERROR, axum::Json(payload)).into_response()
        }
    }
}

pub(crate) async fn submit_handler<R, D>(
    State(api): State<Arc<PlacementApi<R, D>>>,
    headers: HeaderMap,
    axum::Json(request): axum::Json<SubmitRequest>,
) -> Response
where
    R: ApplicationRepository + 'static,
    D: MarketplaceDirectory + 'static,
{
    let actor = match session_actor(&headers) {
        Ok(actor) => actor,
        Err(response) => return response,
    };

    if actor.role == ActorRole::Employee && !api.identity.is_verified(&actor.id) {
        let payload = json!({
            "error": "identity verification required before applying",
        });
        return (StatusCode::FORBIDDEN, axum::Json(payload)).into_response();
    }

    let submission = SubmitApplication {
        job_id: request.job_id,
        expected_salary: request.expected_salary,
        cover_letter: request.cover_letter,
    };
    match api.service.submit(&actor, submission) {
        Ok(application) => (StatusCode::CREATED, axum::Json(application)).into_response(),
        Err(error) => service_error_response(error),
    }
}

pub(crate) async fn list_handler<R, D>(
    State(api): State<Arc<PlacementApi<R, D>>>,
    headers: HeaderMap,
    Query(query): Query<ListQuery>,
) -> Response
where
    R: ApplicationRepository + 'static,
    D: MarketplaceDirectory + 'static,
{
    let actor = match session_actor(&headers) {
        Ok(actor) => actor,
        Err(response) => return response,
    };

    match api.service.list_for_actor(&actor, query.status) {
        Ok(applications) => (StatusCode::OK, axum::Json(applications)).into_response(),
        Err(error) => service_error_response(error),
    }
}

/// Actor asserted by the upstream gateway.
pub(crate) fn session_actor(headers: &HeaderMap) -> Result<Actor, Response> {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
    };

    let role = match header(ACTOR_ROLE_HEADER) {
        Some(value) if value.eq_ignore_ascii_case(ActorRole::Employer.label()) => {
            ActorRole::Employer
        }
        Some(value) if value.eq_ignore_ascii_case(ActorRole::Employee.label()) => {
            ActorRole::Employee
        }
        _ => return Err(unauthorized()),
    };
    let id = header(ACTOR_ID_HEADER).ok_or_else(unauthorized)?;

    Ok(Actor {
        role,
        id: UserId(id.to_string()),
    })
}

fn unauthorized() -> Response {
    let payload = json!({ "error": "missing or invalid session" });
    (StatusCode::UNAUTHORIZED, axum::Json(payload)).into_response()
}

/// HTTP status for a workflow failure. `AppError` reuses it so both surfaces agree.
pub(crate) fn error_status(error: &ApplicationServiceError) -> StatusCode {
    use ApplicationServiceError as Service;

    match error {
        Service::NotFound(_)
        | Service::JobNotFound(_)
        | Service::Transition(TransitionError::JobNotFound(_))
        | Service::Repository(RepositoryError::NotFound)
        | Service::Transition(TransitionError::Repository(RepositoryError::NotFound)) => {
            StatusCode::NOT_FOUND
        }
        Service::JobClosed(_)
        | Service::DuplicateApplication { .. }
        | Service::Transition(TransitionError::ConflictAlreadyShortlisted { .. })
        | Service::Repository(RepositoryError::Conflict)
        | Service::Transition(TransitionError::Repository(RepositoryError::Conflict)) => {
            StatusCode::CONFLICT
        }
        Service::MissingStepDetail { .. }
        | Service::Transition(
            TransitionError::IllegalTransition { .. } | TransitionError::ApplicationClosed { .. },
        ) => StatusCode::UNPROCESSABLE_ENTITY,
        Service::Transition(TransitionError::Forbidden { .. }) => StatusCode::FORBIDDEN,
        Service::SideEffect(_) => StatusCode::BAD_GATEWAY,
        Service::Repository(RepositoryError::Unavailable(_))
        | Service::Transition(TransitionError::Repository(RepositoryError::Unavailable(_)))
        | Service::UnknownStep(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn service_error_response(error: ApplicationServiceError) -> Response {
    let status = error_status(&error);
    let message = error.to_string();
    let payload = match &error {
        ApplicationServiceError::NotFound(id) => {
            json!({ "error": message, "applicationId": id })
        }
        ApplicationServiceError::JobNotFound(job_id)
        | ApplicationServiceError::Transition(TransitionError::JobNotFound(job_id)) => {
            json!({ "error": message, "jobId": job_id })
        }
        ApplicationServiceError::MissingStepDetail { detail, .. } => {
            json!({ "error": message, "missing": detail })
        }
        ApplicationServiceError::Transition(TransitionError::ConflictAlreadyShortlisted {
            blocking_application_id,
            candidate_name,
        }) => json!({
            "error": message,
            "blockingApplicationId": blocking_application_id,
            "candidateName": candidate_name,
        }),
        ApplicationServiceError::SideEffect(side_effect) => {
            json!({ "error": message, "retryable": side_effect.is_retryable() })
        }
        _ => json!({ "error": message }),
    };
    (status, axum::Json(payload)).into_response()
}
