use std::sync::Arc;

use axum::extract::{Json, State};
use chrono::Utc;
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, info};

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;
use shared_models::error::AppError;
use shared_utils::jwt::sign_token;

use crate::models::{RegisterRequest, SessionRequest, SessionResponse, UserRow};
use crate::services::password;

async fn find_user_by_email(
    client: &SupabaseClient,
    email: &str,
) -> Result<Option<UserRow>, AppError> {
    let path = format!("/rest/v1/users?email=eq.{}", urlencoding::encode(email));
    let result: Vec<UserRow> = client
        .request(Method::GET, &path, None, None)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

    Ok(result.into_iter().next())
}

#[axum::debug_handler]
pub async fn register(
    State(state): State<Arc<AppConfig>>,
    Json(request): Json<RegisterRequest>,
) -> Result<Json<Value>, AppError> {
    if request.name.trim().is_empty()
        || request.email.trim().is_empty()
        || !request.email.contains('@')
        || request.password.is_empty()
    {
        return Err(AppError::BadRequest("Validation fails".to_string()));
    }

    let client = SupabaseClient::new(&state);

    if find_user_by_email(&client, &request.email).await?.is_some() {
        return Err(AppError::BadRequest("User already exists".to_string()));
    }

    let password_hash = password::hash_password(&request.password)
        .map_err(|e| AppError::Internal(format!("Failed to hash password: {}", e)))?;

    let now = Utc::now();
    let body = json!({
        "name": request.name,
        "email": request.email,
        "password_hash": password_hash,
        "is_provider": request.is_provider,
        "created_at": now.to_rfc3339(),
        "updated_at": now.to_rfc3339()
    });

    let mut headers = reqwest::header::HeaderMap::new();
    headers.insert(
        "Prefer",
        reqwest::header::HeaderValue::from_static("return=representation"),
    );

    let result: Vec<UserRow> = client
        .request_with_headers(Method::POST, "/rest/v1/users", None, Some(body), Some(headers))
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

    let user = result
        .into_iter()
        .next()
        .ok_or_else(|| AppError::Database("Failed to create user".to_string()))?;

    info!("Registered user {} (provider: {})", user.id, user.is_provider);
    Ok(Json(json!(user.into_public())))
}

#[axum::debug_handler]
pub async fn create_session(
    State(state): State<Arc<AppConfig>>,
    Json(request): Json<SessionRequest>,
) -> Result<Json<SessionResponse>, AppError> {
    debug!("Session attempt for {}", request.email);

    let client = SupabaseClient::new(&state);

    let user = find_user_by_email(&client, &request.email)
        .await?
        .ok_or_else(|| AppError::Auth("User not found".to_string()))?;

    let matches = password::verify_password(&request.password, &user.password_hash)
        .map_err(|e| AppError::Internal(format!("Failed to verify password: {}", e)))?;

    if !matches {
        return Err(AppError::Auth("Password does not match".to_string()));
    }

    let token = sign_token(
        &user.id.to_string(),
        Some(&user.email),
        &state.supabase_jwt_secret,
        state.token_ttl_hours,
    )
    .map_err(AppError::Internal)?;

    debug!("Session opened for user {}", user.id);
    Ok(Json(SessionResponse { user: user.into_public(), token }))
}
