use std::sync::Arc;

use reqwest::Method;
use serde_json::{json, Value};
use tracing::debug;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{Notification, NotificationError};

pub struct NotificationFeedService {
    supabase: Arc<SupabaseClient>,
}

impl NotificationFeedService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: Arc::new(SupabaseClient::new(config)),
        }
    }

    pub async fn caller_is_provider(
        &self,
        user_id: Uuid,
        auth_token: &str,
    ) -> Result<bool, NotificationError> {
        let path = format!("/rest/v1/users?id=eq.{}&is_provider=eq.true&select=id", user_id);
        let rows: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| NotificationError::DatabaseError(e.to_string()))?;

        Ok(!rows.is_empty())
    }

    /// Latest notifications for a provider, newest first.
    pub async fn list_for_user(
        &self,
        user_id: Uuid,
        auth_token: &str,
    ) -> Result<Vec<Notification>, NotificationError> {
        let path = format!(
            "/rest/v1/notifications?user_id=eq.{}&order=created_at.desc&limit=20",
            user_id
        );

        let notifications: Vec<Notification> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| NotificationError::DatabaseError(e.to_string()))?;

        debug!("Loaded {} notifications for user {}", notifications.len(), user_id);
        Ok(notifications)
    }

    pub async fn mark_read(
        &self,
        notification_id: Uuid,
        auth_token: &str,
    ) -> Result<Notification, NotificationError> {
        let path = format!("/rest/v1/notifications?id=eq.{}", notification_id);

        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            "Prefer",
            reqwest::header::HeaderValue::from_static("return=representation"),
        );

        let result: Vec<Notification> = self
            .supabase
            .request_with_headers(
                Method::PATCH,
                &path,
                Some(auth_token),
                Some(json!({ "read": true })),
                Some(headers),
            )
            .await
            .map_err(|e| NotificationError::DatabaseError(e.to_string()))?;

        result.into_iter().next().ok_or(NotificationError::NotFound)
    }
}
