use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderProfile {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub avatar_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: Uuid,
    pub name: String,
}

/// One booked slot on the provider's day view, with the booking user.
#[derive(Debug, Clone, Serialize)]
pub struct ScheduleEntry {
    pub id: Uuid,
    pub scheduled_at: DateTime<Utc>,
    pub user: UserSummary,
}

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("User is not a provider")]
    NotAProvider,

    #[error("Database error: {0}")]
    DatabaseError(String),
}
