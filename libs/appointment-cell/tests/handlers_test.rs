use std::sync::Arc;

use axum::extract::{Extension, Path, Query, State};
use axum::Json;
use axum_extra::TypedHeader;
use chrono::{Duration, Timelike, Utc};
use headers::{authorization::Bearer, Authorization};
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use appointment_cell::handlers::*;
use appointment_cell::models::*;
use appointment_cell::services::policy;
use shared_models::{auth::User, error::AppError};
use shared_utils::test_utils::{JwtTestUtils, MockSupabaseResponses, TestConfig, TestUser};

fn user_extension(test_user: &TestUser) -> Extension<User> {
    Extension(test_user.to_user())
}

fn auth_header(token: &str) -> TypedHeader<Authorization<Bearer>> {
    TypedHeader(Authorization::bearer(token).unwrap())
}

/// Mock the provider lookup used by the booking flow.
async fn mock_provider_lookup(mock_server: &MockServer, provider: &TestUser) {
    Mock::given(method("GET"))
        .and(path("/rest/v1/users"))
        .and(query_param("id", format!("eq.{}", provider.id)))
        .and(query_param("is_provider", "eq.true"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::user_row(&provider.id, &provider.name, &provider.email, true)
        ])))
        .mount(mock_server)
        .await;
}

/// Mock the availability pre-check with the given occupants.
async fn mock_slot_lookup(mock_server: &MockServer, occupants: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("canceled_at", "is.null"))
        .respond_with(ResponseTemplate::new(200).set_body_json(occupants))
        .mount(mock_server)
        .await;
}

#[tokio::test]
async fn test_book_appointment_truncates_to_the_slot() {
    let mock_server = MockServer::start().await;
    let test_config = TestConfig::default();
    let mut config = test_config.to_app_config();
    config.supabase_url = mock_server.uri();

    let customer = TestUser::customer("customer@example.com");
    let provider = TestUser::provider("provider@example.com");
    let token = JwtTestUtils::create_test_token(&customer, &config.supabase_jwt_secret, Some(24));

    // Mid-hour request, tomorrow.
    let requested = (Utc::now() + Duration::hours(25))
        .with_minute(37)
        .and_then(|t| t.with_nanosecond(0))
        .unwrap();
    let expected_slot = policy::canonical_slot(requested);

    mock_provider_lookup(&mock_server, &provider).await;
    mock_slot_lookup(&mock_server, json!([])).await;

    // The insert must carry the hour-truncated slot, not the raw request.
    Mock::given(method("POST"))
        .and(path("/rest/v1/appointments"))
        .and(body_partial_json(json!({ "scheduled_at": expected_slot.to_rfc3339() })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            MockSupabaseResponses::appointment_row(
                &Uuid::new_v4().to_string(),
                &provider.id,
                &customer.id,
                &expected_slot.to_rfc3339(),
            )
        ])))
        .expect(1)
        .mount(&mock_server)
        .await;

    // Booking stores an in-app notification for the provider.
    Mock::given(method("POST"))
        .and(path("/rest/v1/notifications"))
        .and(body_partial_json(json!({ "user_id": provider.id })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            MockSupabaseResponses::notification_row(
                &Uuid::new_v4().to_string(),
                &provider.id,
                "Novo agendamento",
                false,
            )
        ])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let request = BookAppointmentRequest {
        provider_id: Uuid::parse_str(&provider.id).unwrap(),
        date: requested,
    };

    let result = book_appointment(
        State(Arc::new(config)),
        auth_header(&token),
        user_extension(&customer),
        Json(request),
    )
    .await;

    assert!(result.is_ok(), "Expected booking to succeed, got: {:?}", result.err());
    let response = result.unwrap().0;
    assert_eq!(response["provider_id"], provider.id);
    assert_eq!(response["user_id"], customer.id);
    assert!(response["canceled_at"].is_null());
}

#[tokio::test]
async fn test_book_appointment_rejects_non_provider() {
    let mock_server = MockServer::start().await;
    let test_config = TestConfig::default();
    let mut config = test_config.to_app_config();
    config.supabase_url = mock_server.uri();

    let customer = TestUser::customer("customer@example.com");
    let target = TestUser::customer("not-a-provider@example.com");
    let token = JwtTestUtils::create_test_token(&customer, &config.supabase_jwt_secret, Some(24));

    // The target exists but without the provider flag: the filtered lookup is empty.
    Mock::given(method("GET"))
        .and(path("/rest/v1/users"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;
    mock_slot_lookup(&mock_server, json!([])).await;

    let request = BookAppointmentRequest {
        provider_id: Uuid::parse_str(&target.id).unwrap(),
        date: Utc::now() + Duration::hours(25),
    };

    let result = book_appointment(
        State(Arc::new(config)),
        auth_header(&token),
        user_extension(&customer),
        Json(request),
    )
    .await;

    match result.unwrap_err() {
        AppError::Auth(msg) => assert_eq!(msg, "You can only create appointments with providers"),
        other => panic!("Expected Auth error, got: {:?}", other),
    }
}

#[tokio::test]
async fn test_book_appointment_rejects_past_date() {
    let mock_server = MockServer::start().await;
    let test_config = TestConfig::default();
    let mut config = test_config.to_app_config();
    config.supabase_url = mock_server.uri();

    let customer = TestUser::customer("customer@example.com");
    let provider = TestUser::provider("provider@example.com");
    let token = JwtTestUtils::create_test_token(&customer, &config.supabase_jwt_secret, Some(24));

    mock_provider_lookup(&mock_server, &provider).await;
    mock_slot_lookup(&mock_server, json!([])).await;

    let request = BookAppointmentRequest {
        provider_id: Uuid::parse_str(&provider.id).unwrap(),
        date: Utc::now() - Duration::hours(2),
    };

    let result = book_appointment(
        State(Arc::new(config)),
        auth_header(&token),
        user_extension(&customer),
        Json(request),
    )
    .await;

    match result.unwrap_err() {
        AppError::BadRequest(msg) => assert_eq!(msg, "Past dates are not permitted"),
        other => panic!("Expected BadRequest error, got: {:?}", other),
    }
}

#[tokio::test]
async fn test_book_appointment_rejects_taken_slot() {
    let mock_server = MockServer::start().await;
    let test_config = TestConfig::default();
    let mut config = test_config.to_app_config();
    config.supabase_url = mock_server.uri();

    let customer = TestUser::customer("customer@example.com");
    let provider = TestUser::provider("provider@example.com");
    let token = JwtTestUtils::create_test_token(&customer, &config.supabase_jwt_secret, Some(24));

    let requested = Utc::now() + Duration::hours(25);
    let slot = policy::canonical_slot(requested);

    mock_provider_lookup(&mock_server, &provider).await;
    mock_slot_lookup(
        &mock_server,
        json!([MockSupabaseResponses::appointment_row(
            &Uuid::new_v4().to_string(),
            &provider.id,
            &Uuid::new_v4().to_string(),
            &slot.to_rfc3339(),
        )]),
    )
    .await;

    let request = BookAppointmentRequest {
        provider_id: Uuid::parse_str(&provider.id).unwrap(),
        date: requested,
    };

    let result = book_appointment(
        State(Arc::new(config)),
        auth_header(&token),
        user_extension(&customer),
        Json(request),
    )
    .await;

    match result.unwrap_err() {
        AppError::BadRequest(msg) => assert_eq!(msg, "Appointment date is not available"),
        other => panic!("Expected BadRequest error, got: {:?}", other),
    }
}

#[tokio::test]
async fn test_insert_conflict_is_an_authoritative_rejection() {
    let mock_server = MockServer::start().await;
    let test_config = TestConfig::default();
    let mut config = test_config.to_app_config();
    config.supabase_url = mock_server.uri();

    let customer = TestUser::customer("customer@example.com");
    let provider = TestUser::provider("provider@example.com");
    let token = JwtTestUtils::create_test_token(&customer, &config.supabase_jwt_secret, Some(24));

    mock_provider_lookup(&mock_server, &provider).await;
    // Pre-check sees a free slot; a concurrent booking wins the insert race.
    mock_slot_lookup(&mock_server, json!([])).await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(409).set_body_json(json!({
            "code": "23505",
            "message": "duplicate key value violates unique constraint \"appointments_provider_slot_key\""
        })))
        .mount(&mock_server)
        .await;

    let request = BookAppointmentRequest {
        provider_id: Uuid::parse_str(&provider.id).unwrap(),
        date: Utc::now() + Duration::hours(25),
    };

    let result = book_appointment(
        State(Arc::new(config)),
        auth_header(&token),
        user_extension(&customer),
        Json(request),
    )
    .await;

    match result.unwrap_err() {
        AppError::BadRequest(msg) => assert_eq!(msg, "Appointment date is not available"),
        other => panic!("Expected BadRequest error, got: {:?}", other),
    }
}

#[tokio::test]
async fn test_provider_may_book_their_own_slot() {
    let mock_server = MockServer::start().await;
    let test_config = TestConfig::default();
    let mut config = test_config.to_app_config();
    config.supabase_url = mock_server.uri();

    let provider = TestUser::provider("provider@example.com");
    let token = JwtTestUtils::create_test_token(&provider, &config.supabase_jwt_secret, Some(24));

    let requested = Utc::now() + Duration::hours(25);
    let slot = policy::canonical_slot(requested);

    mock_provider_lookup(&mock_server, &provider).await;
    mock_slot_lookup(&mock_server, json!([])).await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            MockSupabaseResponses::appointment_row(
                &Uuid::new_v4().to_string(),
                &provider.id,
                &provider.id,
                &slot.to_rfc3339(),
            )
        ])))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/notifications"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            MockSupabaseResponses::notification_row(
                &Uuid::new_v4().to_string(),
                &provider.id,
                "Novo agendamento",
                false,
            )
        ])))
        .mount(&mock_server)
        .await;

    let request = BookAppointmentRequest {
        provider_id: Uuid::parse_str(&provider.id).unwrap(),
        date: requested,
    };

    let result = book_appointment(
        State(Arc::new(config)),
        auth_header(&token),
        user_extension(&provider),
        Json(request),
    )
    .await;

    assert!(result.is_ok(), "Self-booking is permitted, got: {:?}", result.err());
}

#[tokio::test]
async fn test_cancel_appointment_success() {
    let mock_server = MockServer::start().await;
    let test_config = TestConfig::default();
    let mut config = test_config.to_app_config();
    config.supabase_url = mock_server.uri();

    let customer = TestUser::customer("customer@example.com");
    let token = JwtTestUtils::create_test_token(&customer, &config.supabase_jwt_secret, Some(24));
    let appointment_id = Uuid::new_v4();
    let provider_id = Uuid::new_v4().to_string();

    let scheduled_at = (Utc::now() + Duration::hours(25)).to_rfc3339();
    let row = MockSupabaseResponses::appointment_row(
        &appointment_id.to_string(),
        &provider_id,
        &customer.id,
        &scheduled_at,
    );

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("id", format!("eq.{}", appointment_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([row])))
        .mount(&mock_server)
        .await;

    let mut cancelled_row = row.clone();
    cancelled_row["canceled_at"] = json!(Utc::now().to_rfc3339());

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("id", format!("eq.{}", appointment_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([cancelled_row])))
        .mount(&mock_server)
        .await;

    let result = cancel_appointment(
        State(Arc::new(config)),
        Path(appointment_id),
        auth_header(&token),
        user_extension(&customer),
    )
    .await;

    assert!(result.is_ok(), "Expected cancellation to succeed, got: {:?}", result.err());
    let response = result.unwrap().0;
    assert_eq!(response["id"], appointment_id.to_string());
    assert!(!response["canceled_at"].is_null());
}

#[tokio::test]
async fn test_cancel_appointment_rejects_non_owner() {
    let mock_server = MockServer::start().await;
    let test_config = TestConfig::default();
    let mut config = test_config.to_app_config();
    config.supabase_url = mock_server.uri();

    // The provider tries to cancel the customer's appointment.
    let provider = TestUser::provider("provider@example.com");
    let token = JwtTestUtils::create_test_token(&provider, &config.supabase_jwt_secret, Some(24));
    let appointment_id = Uuid::new_v4();

    let row = MockSupabaseResponses::appointment_row(
        &appointment_id.to_string(),
        &provider.id,
        &Uuid::new_v4().to_string(),
        &(Utc::now() + Duration::hours(25)).to_rfc3339(),
    );

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("id", format!("eq.{}", appointment_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([row])))
        .mount(&mock_server)
        .await;

    let result = cancel_appointment(
        State(Arc::new(config)),
        Path(appointment_id),
        auth_header(&token),
        user_extension(&provider),
    )
    .await;

    match result.unwrap_err() {
        AppError::Auth(msg) => {
            assert_eq!(msg, "You don't have permission to cancel this appointment")
        }
        other => panic!("Expected Auth error, got: {:?}", other),
    }
}

#[tokio::test]
async fn test_cancel_appointment_rejects_inside_cutoff() {
    let mock_server = MockServer::start().await;
    let test_config = TestConfig::default();
    let mut config = test_config.to_app_config();
    config.supabase_url = mock_server.uri();

    let customer = TestUser::customer("customer@example.com");
    let token = JwtTestUtils::create_test_token(&customer, &config.supabase_jwt_secret, Some(24));
    let appointment_id = Uuid::new_v4();

    // One hour of notice against a two-hour window.
    let row = MockSupabaseResponses::appointment_row(
        &appointment_id.to_string(),
        &Uuid::new_v4().to_string(),
        &customer.id,
        &(Utc::now() + Duration::hours(1)).to_rfc3339(),
    );

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("id", format!("eq.{}", appointment_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([row])))
        .mount(&mock_server)
        .await;

    let result = cancel_appointment(
        State(Arc::new(config)),
        Path(appointment_id),
        auth_header(&token),
        user_extension(&customer),
    )
    .await;

    match result.unwrap_err() {
        AppError::Auth(msg) => {
            assert_eq!(msg, "You can only cancel appointments 2 hours in advance")
        }
        other => panic!("Expected Auth error, got: {:?}", other),
    }
}

#[tokio::test]
async fn test_cancel_missing_appointment_is_not_found() {
    let mock_server = MockServer::start().await;
    let test_config = TestConfig::default();
    let mut config = test_config.to_app_config();
    config.supabase_url = mock_server.uri();

    let customer = TestUser::customer("customer@example.com");
    let token = JwtTestUtils::create_test_token(&customer, &config.supabase_jwt_secret, Some(24));
    let appointment_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("id", format!("eq.{}", appointment_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    let result = cancel_appointment(
        State(Arc::new(config)),
        Path(appointment_id),
        auth_header(&token),
        user_extension(&customer),
    )
    .await;

    match result.unwrap_err() {
        AppError::NotFound(msg) => assert_eq!(msg, "Appointment not found"),
        other => panic!("Expected NotFound error, got: {:?}", other),
    }
}

#[tokio::test]
async fn test_list_appointments_attaches_providers() {
    let mock_server = MockServer::start().await;
    let test_config = TestConfig::default();
    let mut config = test_config.to_app_config();
    config.supabase_url = mock_server.uri();

    let customer = TestUser::customer("customer@example.com");
    let provider = TestUser::provider("provider@example.com");
    let token = JwtTestUtils::create_test_token(&customer, &config.supabase_jwt_secret, Some(24));

    let first = (Utc::now() + Duration::hours(25)).to_rfc3339();
    let second = (Utc::now() + Duration::hours(49)).to_rfc3339();

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("user_id", format!("eq.{}", customer.id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::appointment_row(
                &Uuid::new_v4().to_string(),
                &provider.id,
                &customer.id,
                &first,
            ),
            MockSupabaseResponses::appointment_row(
                &Uuid::new_v4().to_string(),
                &provider.id,
                &customer.id,
                &second,
            ),
        ])))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/users"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::user_row(&provider.id, &provider.name, &provider.email, true)
        ])))
        .mount(&mock_server)
        .await;

    let result = list_appointments(
        State(Arc::new(config)),
        Query(AppointmentQueryParams { limit: None, offset: None }),
        auth_header(&token),
        user_extension(&customer),
    )
    .await;

    assert!(result.is_ok(), "Expected listing to succeed, got: {:?}", result.err());
    let response = result.unwrap().0;
    let listing = response.as_array().unwrap();
    assert_eq!(listing.len(), 2);
    assert_eq!(listing[0]["provider"]["name"], provider.name);
}
