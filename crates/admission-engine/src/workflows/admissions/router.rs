use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::domain::{
    Application, ApplicationId, CourseId, CourseRequirement, Decision, InstitutionId, StudentId,
    SubjectGrades,
};
use super::repository::{AdmissionDirectory, ApplicationStore, EventPublisher};
use super::service::{AdmissionError, AdmissionService};

type SharedService<S, D, E> = Arc<AdmissionService<S, D, E>>;

/// Router builder exposing the admission engine over HTTP.
pub fn admission_router<S, D, E>(service: SharedService<S, D, E>) -> Router
where
    S: ApplicationStore + 'static,
    D: AdmissionDirectory + 'static,
    E: EventPublisher + 'static,
{
    Router::new()
        .route(
            "/api/v1/admissions/applications",
            post(apply_handler::<S, D, E>),
        )
        .route(
            "/api/v1/admissions/applications/:application_id",
            get(application_handler::<S, D, E>),
        )
        .route(
            "/api/v1/admissions/applications/:application_id/decision",
            post(decide_handler::<S, D, E>),
        )
        .route(
            "/api/v1/admissions/applications/:application_id/withdraw",
            post(withdraw_handler::<S, D, E>),
        )
        .route(
            "/api/v1/admissions/applications/:application_id/accept",
            post(accept_handler::<S, D, E>),
        )
        .route(
            "/api/v1/admissions/courses/:course_id/publish",
            post(publish_handler::<S, D, E>),
        )
        .route(
            "/api/v1/admissions/courses/:course_id/seat-freed",
            post(seat_freed_handler::<S, D, E>),
        )
        .route(
            "/api/v1/admissions/courses/:course_id/applications",
            get(course_applications_handler::<S, D, E>),
        )
        .route(
            "/api/v1/admissions/students/:student_id/applications",
            get(student_applications_handler::<S, D, E>),
        )
        .route(
            "/api/v1/admissions/eligibility",
            post(eligibility_handler::<S, D, E>),
        )
        .with_state(service)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplyRequest {
    pub student_id: StudentId,
    pub course_id: CourseId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionRequest {
    pub institution_id: InstitutionId,
    pub decision: Decision,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudentRequest {
    pub student_id: StudentId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstitutionRequest {
    pub institution_id: InstitutionId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EligibilityRequest {
    pub subjects: SubjectGrades,
    #[serde(default)]
    pub requirement: CourseRequirement,
}

pub(crate) async fn apply_handler<S, D, E>(
    State(service): State<SharedService<S, D, E>>,
    axum::Json(request): axum::Json<ApplyRequest>,
) -> Response
where
    S: ApplicationStore + 'static,
    D: AdmissionDirectory + 'static,
    E: EventPublisher + 'static,
{
    match service.apply(&request.student_id, &request.course_id) {
        Ok(application) => {
            (StatusCode::CREATED, axum::Json(application.status_view())).into_response()
        }
        Err(error) => error_response(error),
    }
}

pub(crate) async fn application_handler<S, D, E>(
    State(service): State<SharedService<S, D, E>>,
    Path(application_id): Path<String>,
) -> Response
where
    S: ApplicationStore + 'static,
    D: AdmissionDirectory + 'static,
    E: EventPublisher + 'static,
{
    let Some(id) = ApplicationId::parse(&application_id) else {
        return malformed_id(&application_id);
    };
    match service.get(id) {
        Ok(application) => (StatusCode::OK, axum::Json(application.status_view())).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn decide_handler<S, D, E>(
    State(service): State<SharedService<S, D, E>>,
    Path(application_id): Path<String>,
    axum::Json(request): axum::Json<DecisionRequest>,
) -> Response
where
    S: ApplicationStore + 'static,
    D: AdmissionDirectory + 'static,
    E: EventPublisher + 'static,
{
    let Some(id) = ApplicationId::parse(&application_id) else {
        return malformed_id(&application_id);
    };
    match service.decide(&request.institution_id, id, request.decision) {
        Ok(application) => (StatusCode::OK, axum::Json(application.status_view())).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn withdraw_handler<S, D, E>(
    State(service): State<SharedService<S, D, E>>,
    Path(application_id): Path<String>,
    axum::Json(request): axum::Json<StudentRequest>,
) -> Response
where
    S: ApplicationStore + 'static,
    D: AdmissionDirectory + 'static,
    E: EventPublisher + 'static,
{
    let Some(id) = ApplicationId::parse(&application_id) else {
        return malformed_id(&application_id);
    };
    match service.withdraw(&request.student_id, id) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn accept_handler<S, D, E>(
    State(service): State<SharedService<S, D, E>>,
    Path(application_id): Path<String>,
    axum::Json(request): axum::Json<StudentRequest>,
) -> Response
where
    S: ApplicationStore + 'static,
    D: AdmissionDirectory + 'static,
    E: EventPublisher + 'static,
{
    let Some(id) = ApplicationId::parse(&application_id) else {
        return malformed_id(&application_id);
    };
    match service.accept(&request.student_id, id) {
        Ok(outcome) => {
            let payload = json!({
                "accepted": outcome.accepted.status_view(),
                "declined": outcome
                    .declined
                    .iter()
                    .map(|decline| decline.application.id.to_string())
                    .collect::<Vec<_>>(),
                "promoted": outcome
                    .promoted
                    .iter()
                    .map(|application| application.id.to_string())
                    .collect::<Vec<_>>(),
            });
            (StatusCode::OK, axum::Json(payload)).into_response()
        }
        Err(error) => error_response(error),
    }
}

pub(crate) async fn publish_handler<S, D, E>(
    State(service): State<SharedService<S, D, E>>,
    Path(course_id): Path<String>,
    axum::Json(request): axum::Json<InstitutionRequest>,
) -> Response
where
    S: ApplicationStore + 'static,
    D: AdmissionDirectory + 'static,
    E: EventPublisher + 'static,
{
    let course = CourseId(course_id);
    match service.publish(&request.institution_id, &course) {
        Ok(summary) => {
            let payload = json!({
                "course_id": summary.course,
                "newly_published": summary
                    .newly_published
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>(),
                "previously_published": summary.previously_published,
            });
            (StatusCode::OK, axum::Json(payload)).into_response()
        }
        Err(error) => error_response(error),
    }
}

pub(crate) async fn seat_freed_handler<S, D, E>(
    State(service): State<SharedService<S, D, E>>,
    Path(course_id): Path<String>,
    axum::Json(request): axum::Json<InstitutionRequest>,
) -> Response
where
    S: ApplicationStore + 'static,
    D: AdmissionDirectory + 'static,
    E: EventPublisher + 'static,
{
    let course = CourseId(course_id);
    match service.release_seat(&request.institution_id, &course) {
        Ok(promoted) => {
            let payload = json!({
                "course_id": course,
                "promoted": promoted.map(|application| application.status_view()),
            });
            (StatusCode::OK, axum::Json(payload)).into_response()
        }
        Err(error) => error_response(error),
    }
}

pub(crate) async fn student_applications_handler<S, D, E>(
    State(service): State<SharedService<S, D, E>>,
    Path(student_id): Path<String>,
) -> Response
where
    S: ApplicationStore + 'static,
    D: AdmissionDirectory + 'static,
    E: EventPublisher + 'static,
{
    match service.student_applications(&StudentId(student_id)) {
        Ok(applications) => {
            let views: Vec<_> = applications
                .iter()
                .map(|application| application.student_view())
                .collect();
            (StatusCode::OK, axum::Json(views)).into_response()
        }
        Err(error) => error_response(error),
    }
}

pub(crate) async fn course_applications_handler<S, D, E>(
    State(service): State<SharedService<S, D, E>>,
    Path(course_id): Path<String>,
    Query(request): Query<InstitutionRequest>,
) -> Response
where
    S: ApplicationStore + 'static,
    D: AdmissionDirectory + 'static,
    E: EventPublisher + 'static,
{
    match service.course_applications(&request.institution_id, &CourseId(course_id)) {
        Ok(applications) => {
            let views: Vec<_> = applications.iter().map(Application::status_view).collect();
            (StatusCode::OK, axum::Json(views)).into_response()
        }
        Err(error) => error_response(error),
    }
}

pub(crate) async fn eligibility_handler<S, D, E>(
    State(service): State<SharedService<S, D, E>>,
    axum::Json(request): axum::Json<EligibilityRequest>,
) -> Response
where
    S: ApplicationStore + 'static,
    D: AdmissionDirectory + 'static,
    E: EventPublisher + 'static,
{
    let report = service.check_eligibility(&request.subjects, &request.requirement);
    (StatusCode::OK, axum::Json(report)).into_response()
}

/// HTTP status for each error kind.
pub fn error_status(error: &AdmissionError) -> StatusCode {
    match error {
        AdmissionError::NotFound(_) => StatusCode::NOT_FOUND,
        AdmissionError::NotOwner(_) => StatusCode::FORBIDDEN,
        AdmissionError::IncompleteProfile { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        AdmissionError::DuplicateApplication { .. }
        | AdmissionError::InstitutionCapExceeded { .. }
        | AdmissionError::InvalidTransition { .. }
        | AdmissionError::AlreadyDecided { .. }
        | AdmissionError::NotYetPublished
        | AdmissionError::ConcurrentConflict => StatusCode::CONFLICT,
        AdmissionError::Repository(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_response(error: AdmissionError) -> Response {
    let payload = json!({
        "error": error.to_string(),
        "kind": error.kind(),
    });
    (error_status(&error), axum::Json(payload)).into_response()
}

fn malformed_id(raw: &str) -> Response {
    let payload = json!({
        "error": format!("'{raw}' is not a valid application id"),
        "kind": "malformed_request",
    });
    (StatusCode::BAD_REQUEST, axum::Json(payload)).into_response()
}
