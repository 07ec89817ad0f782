use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Router,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;

use super::domain::{ApplicationId, PharmacistId, PharmacyId, ShiftDraft, ShiftId};
use super::repository::{ApplicationStore, ShiftQuery, ShiftStore, StoreError};
use super::service::{
    OfferDecision, PharmacyDecision, ServiceError, ShiftBoardService, ShiftUpdate,
};

/// Router builder exposing the scheduling operations.
///
/// Caller identity arrives in the request payloads; authentication and
/// session handling live in front of this router.
pub fn scheduling_router<S, A>(service: Arc<ShiftBoardService<S, A>>) -> Router
where
    S: ShiftStore + 'static,
    A: ApplicationStore + 'static,
{
    Router::new()
        .route(
            "/api/v1/shifts",
            get(search_shifts_handler::<S, A>).post(post_shift_handler::<S, A>),
        )
        .route(
            "/api/v1/shifts/:shift_id",
            put(update_shift_handler::<S, A>).delete(delete_shift_handler::<S, A>),
        )
        .route(
            "/api/v1/shifts/:shift_id/applications",
            get(applicants_handler::<S, A>).post(apply_handler::<S, A>),
        )
        .route(
            "/api/v1/applications/:application_id/withdraw",
            post(withdraw_handler::<S, A>),
        )
        .route(
            "/api/v1/applications/:application_id/switch",
            post(switch_handler::<S, A>),
        )
        .route(
            "/api/v1/applications/:application_id/offer-response",
            post(offer_response_handler::<S, A>),
        )
        .route(
            "/api/v1/applications/:application_id/decision",
            post(decision_handler::<S, A>),
        )
        .with_state(service)
}

fn error_response(error: ServiceError) -> Response {
    let status = match &error {
        ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
        ServiceError::Forbidden(_) => StatusCode::FORBIDDEN,
        ServiceError::InvalidState(_) => StatusCode::UNPROCESSABLE_ENTITY,
        ServiceError::Conflict(_) => StatusCode::CONFLICT,
        ServiceError::Store(StoreError::Duplicate | StoreError::StaleRevision) => {
            StatusCode::CONFLICT
        }
        ServiceError::Store(_) | ServiceError::Queue(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    let body = axum::Json(json!({ "error": error.to_string() }));
    (status, body).into_response()
}

#[derive(Debug, Deserialize)]
struct PostShiftRequest {
    pharmacy_id: String,
    #[serde(flatten)]
    draft: ShiftDraft,
}

async fn post_shift_handler<S, A>(
    State(service): State<Arc<ShiftBoardService<S, A>>>,
    axum::Json(request): axum::Json<PostShiftRequest>,
) -> Response
where
    S: ShiftStore + 'static,
    A: ApplicationStore + 'static,
{
    let pharmacy_id = PharmacyId(request.pharmacy_id);
    match service.post_shift(&pharmacy_id, request.draft, Utc::now()) {
        Ok(shift) => (StatusCode::CREATED, axum::Json(shift)).into_response(),
        Err(error) => error_response(error),
    }
}

// Query-string parameters are kept flat; `serde(flatten)` does not mix with
// the urlencoded deserializer.
#[derive(Debug, Deserialize)]
struct SearchParams {
    pharmacy_id: Option<String>,
    date: Option<chrono::NaiveDate>,
    status: Option<super::domain::ShiftStatus>,
    urgency: Option<super::domain::Urgency>,
    confirmation: Option<super::domain::ConfirmationMode>,
    starts_after: Option<chrono::DateTime<Utc>>,
    ends_before: Option<chrono::DateTime<Utc>>,
    /// Pharmacist id of the viewer, for `is_applied` annotations.
    viewer: Option<String>,
}

async fn search_shifts_handler<S, A>(
    State(service): State<Arc<ShiftBoardService<S, A>>>,
    Query(params): Query<SearchParams>,
) -> Response
where
    S: ShiftStore + 'static,
    A: ApplicationStore + 'static,
{
    let query = ShiftQuery {
        pharmacy_id: params.pharmacy_id.map(PharmacyId),
        date: params.date,
        status: params.status,
        urgency: params.urgency,
        confirmation: params.confirmation,
        starts_after: params.starts_after,
        ends_before: params.ends_before,
    };
    let viewer = params.viewer.map(PharmacistId);
    match service.search_shifts(&query, viewer.as_ref()) {
        Ok(entries) => (StatusCode::OK, axum::Json(entries)).into_response(),
        Err(error) => error_response(error),
    }
}

#[derive(Debug, Deserialize)]
struct UpdateShiftRequest {
    pharmacy_id: String,
    #[serde(flatten)]
    update: ShiftUpdate,
}

async fn update_shift_handler<S, A>(
    State(service): State<Arc<ShiftBoardService<S, A>>>,
    Path(shift_id): Path<String>,
    axum::Json(request): axum::Json<UpdateShiftRequest>,
) -> Response
where
    S: ShiftStore + 'static,
    A: ApplicationStore + 'static,
{
    let pharmacy_id = PharmacyId(request.pharmacy_id);
    match service.update_shift(&pharmacy_id, &ShiftId(shift_id), request.update) {
        Ok(shift) => (StatusCode::OK, axum::Json(shift)).into_response(),
        Err(error) => error_response(error),
    }
}

#[derive(Debug, Deserialize)]
struct OwnerParams {
    pharmacy_id: String,
}

async fn delete_shift_handler<S, A>(
    State(service): State<Arc<ShiftBoardService<S, A>>>,
    Path(shift_id): Path<String>,
    Query(params): Query<OwnerParams>,
) -> Response
where
    S: ShiftStore + 'static,
    A: ApplicationStore + 'static,
{
    let pharmacy_id = PharmacyId(params.pharmacy_id);
    match service.delete_shift(&pharmacy_id, &ShiftId(shift_id)) {
        Ok(shift) => (StatusCode::OK, axum::Json(shift)).into_response(),
        Err(error) => error_response(error),
    }
}

async fn applicants_handler<S, A>(
    State(service): State<Arc<ShiftBoardService<S, A>>>,
    Path(shift_id): Path<String>,
    Query(params): Query<OwnerParams>,
) -> Response
where
    S: ShiftStore + 'static,
    A: ApplicationStore + 'static,
{
    let pharmacy_id = PharmacyId(params.pharmacy_id);
    match service.applicants(&pharmacy_id, &ShiftId(shift_id)) {
        Ok(applications) => (StatusCode::OK, axum::Json(applications)).into_response(),
        Err(error) => error_response(error),
    }
}

#[derive(Debug, Deserialize)]
struct ApplyRequest {
    pharmacist_id: String,
    #[serde(default)]
    notes: String,
}

async fn apply_handler<S, A>(
    State(service): State<Arc<ShiftBoardService<S, A>>>,
    Path(shift_id): Path<String>,
    axum::Json(request): axum::Json<ApplyRequest>,
) -> Response
where
    S: ShiftStore + 'static,
    A: ApplicationStore + 'static,
{
    let pharmacist_id = PharmacistId(request.pharmacist_id);
    match service.apply(&pharmacist_id, &ShiftId(shift_id), &request.notes) {
        Ok(application) => (StatusCode::CREATED, axum::Json(application)).into_response(),
        Err(error) => error_response(error),
    }
}

#[derive(Debug, Deserialize)]
struct WithdrawRequest {
    pharmacist_id: String,
}

async fn withdraw_handler<S, A>(
    State(service): State<Arc<ShiftBoardService<S, A>>>,
    Path(application_id): Path<String>,
    axum::Json(request): axum::Json<WithdrawRequest>,
) -> Response
where
    S: ShiftStore + 'static,
    A: ApplicationStore + 'static,
{
    let pharmacist_id = PharmacistId(request.pharmacist_id);
    match service.withdraw(&pharmacist_id, &ApplicationId(application_id)) {
        Ok(application) => (StatusCode::OK, axum::Json(application)).into_response(),
        Err(error) => error_response(error),
    }
}

#[derive(Debug, Deserialize)]
struct SwitchRequest {
    pharmacist_id: String,
    new_shift_id: String,
    #[serde(default)]
    notes: String,
}

async fn switch_handler<S, A>(
    State(service): State<Arc<ShiftBoardService<S, A>>>,
    Path(application_id): Path<String>,
    axum::Json(request): axum::Json<SwitchRequest>,
) -> Response
where
    S: ShiftStore + 'static,
    A: ApplicationStore + 'static,
{
    let pharmacist_id = PharmacistId(request.pharmacist_id);
    match service.switch(
        &pharmacist_id,
        &ApplicationId(application_id),
        &ShiftId(request.new_shift_id),
        &request.notes,
    ) {
        Ok(application) => (StatusCode::OK, axum::Json(application)).into_response(),
        Err(error) => error_response(error),
    }
}

#[derive(Debug, Deserialize)]
struct OfferResponseRequest {
    pharmacist_id: String,
    decision: OfferDecision,
}

async fn offer_response_handler<S, A>(
    State(service): State<Arc<ShiftBoardService<S, A>>>,
    Path(application_id): Path<String>,
    axum::Json(request): axum::Json<OfferResponseRequest>,
) -> Response
where
    S: ShiftStore + 'static,
    A: ApplicationStore + 'static,
{
    let pharmacist_id = PharmacistId(request.pharmacist_id);
    match service.respond_to_offer(
        &pharmacist_id,
        &ApplicationId(application_id),
        request.decision,
    ) {
        Ok(application) => (StatusCode::OK, axum::Json(application)).into_response(),
        Err(error) => error_response(error),
    }
}

#[derive(Debug, Deserialize)]
struct DecisionRequest {
    pharmacy_id: String,
    decision: PharmacyDecision,
}

async fn decision_handler<S, A>(
    State(service): State<Arc<ShiftBoardService<S, A>>>,
    Path(application_id): Path<String>,
    axum::Json(request): axum::Json<DecisionRequest>,
) -> Response
where
    S: ShiftStore + 'static,
    A: ApplicationStore + 'static,
{
    let pharmacy_id = PharmacyId(request.pharmacy_id);
    match service.decide(
        &pharmacy_id,
        &ApplicationId(application_id),
        request.decision,
    ) {
        Ok(application) => (StatusCode::OK, axum::Json(application)).into_response(),
        Err(error) => error_response(error),
    }
}
