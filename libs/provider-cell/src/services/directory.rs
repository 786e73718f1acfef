use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Duration, NaiveDate, NaiveTime};
use reqwest::Method;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{ProviderError, ProviderProfile, ScheduleEntry, UserSummary};

#[derive(Debug, Deserialize)]
struct ScheduleRow {
    id: Uuid,
    user_id: Uuid,
    scheduled_at: chrono::DateTime<chrono::Utc>,
}

pub struct ProviderDirectoryService {
    supabase: Arc<SupabaseClient>,
}

impl ProviderDirectoryService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: Arc::new(SupabaseClient::new(config)),
        }
    }

    pub async fn list_providers(
        &self,
        auth_token: &str,
    ) -> Result<Vec<ProviderProfile>, ProviderError> {
        let path = "/rest/v1/users?is_provider=eq.true&select=id,name,email,avatar_url&order=name.asc";

        let providers: Vec<ProviderProfile> = self
            .supabase
            .request(Method::GET, path, Some(auth_token), None)
            .await
            .map_err(|e| ProviderError::DatabaseError(e.to_string()))?;

        debug!("Listed {} providers", providers.len());
        Ok(providers)
    }

    pub async fn is_provider(&self, user_id: Uuid, auth_token: &str) -> Result<bool, ProviderError> {
        let path = format!("/rest/v1/users?id=eq.{}&is_provider=eq.true&select=id", user_id);
        let rows: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| ProviderError::DatabaseError(e.to_string()))?;

        Ok(!rows.is_empty())
    }

    /// The provider's open appointments within one calendar day (UTC),
    /// earliest first, with the booking user attached.
    pub async fn day_schedule(
        &self,
        provider_id: Uuid,
        day: NaiveDate,
        auth_token: &str,
    ) -> Result<Vec<ScheduleEntry>, ProviderError> {
        let day_start = day.and_time(NaiveTime::MIN).and_utc();
        let day_end = day_start + Duration::days(1);

        let path = format!(
            "/rest/v1/appointments?provider_id=eq.{}&canceled_at=is.null&scheduled_at=gte.{}&scheduled_at=lt.{}&order=scheduled_at.asc",
            provider_id,
            urlencoding::encode(&day_start.to_rfc3339()),
            urlencoding::encode(&day_end.to_rfc3339()),
        );

        let rows: Vec<ScheduleRow> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| ProviderError::DatabaseError(e.to_string()))?;

        if rows.is_empty() {
            return Ok(vec![]);
        }

        let users = self
            .fetch_user_summaries(rows.iter().map(|row| row.user_id), auth_token)
            .await?;

        let schedule = rows
            .into_iter()
            .filter_map(|row| match users.get(&row.user_id) {
                Some(user) => Some(ScheduleEntry {
                    id: row.id,
                    scheduled_at: row.scheduled_at,
                    user: user.clone(),
                }),
                None => {
                    warn!("Appointment {} references missing user {}", row.id, row.user_id);
                    None
                }
            })
            .collect();

        Ok(schedule)
    }

    async fn fetch_user_summaries(
        &self,
        user_ids: impl Iterator<Item = Uuid>,
        auth_token: &str,
    ) -> Result<HashMap<Uuid, UserSummary>, ProviderError> {
        let mut ids: Vec<String> = user_ids.map(|id| id.to_string()).collect();
        ids.sort();
        ids.dedup();

        let path = format!("/rest/v1/users?id=in.({})&select=id,name", ids.join(","));

        let rows: Vec<UserSummary> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| ProviderError::DatabaseError(e.to_string()))?;

        Ok(rows.into_iter().map(|row| (row.id, row)).collect())
    }
}
