use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    Json,
};
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;

use crate::models::{AppointmentError, BookAppointmentRequest, PolicyViolation};
use crate::services::booking::AppointmentBookingService;

#[derive(Debug, Deserialize)]
pub struct AppointmentQueryParams {
    pub limit: Option<i32>,
    pub offset: Option<i32>,
}

fn map_appointment_error(e: AppointmentError) -> AppError {
    match e {
        AppointmentError::Policy(violation) => match violation {
            PolicyViolation::PastDate | PolicyViolation::SlotUnavailable => {
                AppError::BadRequest(violation.to_string())
            }
            PolicyViolation::InvalidProvider
            | PolicyViolation::Unauthorized
            | PolicyViolation::CancellationWindowExpired(_) => {
                AppError::Auth(violation.to_string())
            }
        },
        AppointmentError::NotFound => AppError::NotFound("Appointment not found".to_string()),
        AppointmentError::DatabaseError(msg) => AppError::Internal(msg),
    }
}

fn requester_id(user: &User) -> Result<Uuid, AppError> {
    Uuid::parse_str(&user.id).map_err(|_| AppError::BadRequest("Invalid user ID".to_string()))
}

#[axum::debug_handler]
pub async fn book_appointment(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<BookAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let requester = requester_id(&user)?;

    let booking_service = AppointmentBookingService::new(&state);

    let appointment = booking_service
        .book_appointment(requester, request, token)
        .await
        .map_err(map_appointment_error)?;

    Ok(Json(json!(appointment)))
}

#[axum::debug_handler]
pub async fn list_appointments(
    State(state): State<Arc<AppConfig>>,
    Query(params): Query<AppointmentQueryParams>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let requester = requester_id(&user)?;

    let booking_service = AppointmentBookingService::new(&state);

    let appointments = booking_service
        .list_for_user(requester, params.limit, params.offset, token)
        .await
        .map_err(map_appointment_error)?;

    Ok(Json(json!(appointments)))
}

#[axum::debug_handler]
pub async fn cancel_appointment(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let requester = requester_id(&user)?;

    let booking_service = AppointmentBookingService::new(&state);

    let cancelled = booking_service
        .cancel_appointment(appointment_id, requester, token)
        .await
        .map_err(map_appointment_error)?;

    Ok(Json(json!(cancelled)))
}
