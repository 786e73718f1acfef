use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ==============================================================================
// CORE APPOINTMENT MODELS
// ==============================================================================

/// A booked slot on a provider's agenda. `scheduled_at` is always the
/// canonical slot (top of the hour). Rows are never deleted: cancellation
/// sets `canceled_at` and the row stays for history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub provider_id: Uuid,
    pub user_id: Uuid,
    pub scheduled_at: DateTime<Utc>,
    pub canceled_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Appointment {
    pub fn is_canceled(&self) -> bool {
        self.canceled_at.is_some()
    }
}

// ==============================================================================
// REQUEST/RESPONSE MODELS
// ==============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct BookAppointmentRequest {
    pub provider_id: Uuid,
    pub date: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderSummary {
    pub id: Uuid,
    pub name: String,
    pub avatar_url: Option<String>,
}

/// Listing entry: the caller's appointment with the provider attached.
#[derive(Debug, Clone, Serialize)]
pub struct AppointmentWithProvider {
    pub id: Uuid,
    pub scheduled_at: DateTime<Utc>,
    pub provider: ProviderSummary,
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

/// Rejections produced by the booking policy. All of these are terminal
/// for the triggering request; nothing is retried.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PolicyViolation {
    #[error("You can only create appointments with providers")]
    InvalidProvider,

    #[error("Past dates are not permitted")]
    PastDate,

    #[error("Appointment date is not available")]
    SlotUnavailable,

    #[error("You don't have permission to cancel this appointment")]
    Unauthorized,

    #[error("You can only cancel appointments {0} hours in advance")]
    CancellationWindowExpired(i64),
}

#[derive(Debug, thiserror::Error)]
pub enum AppointmentError {
    #[error(transparent)]
    Policy(#[from] PolicyViolation),

    #[error("Appointment not found")]
    NotFound,

    #[error("Database error: {0}")]
    DatabaseError(String),
}
