use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use reqwest::Method;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use notification_cell::services::dispatcher::NotificationDispatcher;
use shared_config::AppConfig;
use shared_database::supabase::{StoreError, SupabaseClient};

use crate::models::{
    Appointment, AppointmentError, AppointmentWithProvider, BookAppointmentRequest,
    PolicyViolation, ProviderSummary,
};
use crate::services::policy::{self, BookingPolicy};

/// Subset of the provider's account needed while booking.
#[derive(Debug, Clone, Deserialize)]
struct ProviderRow {
    id: Uuid,
    name: String,
}

pub struct AppointmentBookingService {
    supabase: Arc<SupabaseClient>,
    policy: BookingPolicy,
    dispatcher: NotificationDispatcher,
}

impl AppointmentBookingService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: Arc::new(SupabaseClient::new(config)),
            policy: BookingPolicy::from_config(config),
            dispatcher: NotificationDispatcher::new(config),
        }
    }

    /// Book a slot with a provider on behalf of `requester_id`.
    pub async fn book_appointment(
        &self,
        requester_id: Uuid,
        request: BookAppointmentRequest,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        debug!(
            "Booking request from {} for provider {} at {}",
            requester_id, request.provider_id, request.date
        );

        let provider = self.find_bookable_provider(request.provider_id, auth_token).await?;

        let slot = policy::canonical_slot(request.date);
        let slot_taken = self.slot_is_taken(request.provider_id, slot, auth_token).await?;

        let now = Utc::now();
        let decision =
            self.policy
                .evaluate_booking(provider.is_some(), request.date, now, slot_taken)?;
        let provider = provider.ok_or(PolicyViolation::InvalidProvider)?;

        let appointment = self
            .insert_appointment(provider.id, requester_id, decision.slot, auth_token)
            .await?;

        // The in-app note must never undo an appointment that already exists.
        if let Err(e) = self
            .dispatcher
            .notify_booking(provider.id, &provider.name, decision.slot, auth_token)
            .await
        {
            warn!("Failed to store booking notification for provider {}: {}", provider.id, e);
        }

        info!(
            "Appointment {} booked with provider {} at {}",
            appointment.id, appointment.provider_id, appointment.scheduled_at
        );
        Ok(appointment)
    }

    /// The caller's open appointments, soonest first, with provider profiles.
    pub async fn list_for_user(
        &self,
        user_id: Uuid,
        limit: Option<i32>,
        offset: Option<i32>,
        auth_token: &str,
    ) -> Result<Vec<AppointmentWithProvider>, AppointmentError> {
        let mut path = format!(
            "/rest/v1/appointments?user_id=eq.{}&canceled_at=is.null&order=scheduled_at.asc",
            user_id
        );
        if let Some(limit) = limit {
            path.push_str(&format!("&limit={}", limit));
        }
        if let Some(offset) = offset {
            path.push_str(&format!("&offset={}", offset));
        }

        let appointments: Vec<Appointment> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        if appointments.is_empty() {
            return Ok(vec![]);
        }

        let providers = self
            .fetch_provider_summaries(appointments.iter().map(|a| a.provider_id), auth_token)
            .await?;

        let listing = appointments
            .into_iter()
            .filter_map(|appointment| match providers.get(&appointment.provider_id) {
                Some(provider) => Some(AppointmentWithProvider {
                    id: appointment.id,
                    scheduled_at: appointment.scheduled_at,
                    provider: provider.clone(),
                }),
                None => {
                    warn!(
                        "Appointment {} references missing provider {}",
                        appointment.id, appointment.provider_id
                    );
                    None
                }
            })
            .collect();

        Ok(listing)
    }

    pub async fn get_appointment(
        &self,
        appointment_id: Uuid,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        let path = format!("/rest/v1/appointments?id=eq.{}", appointment_id);
        let result: Vec<Appointment> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        result.into_iter().next().ok_or(AppointmentError::NotFound)
    }

    /// Cancel an appointment on behalf of `requester_id` and queue the
    /// cancellation email for the provider.
    pub async fn cancel_appointment(
        &self,
        appointment_id: Uuid,
        requester_id: Uuid,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        debug!("Cancellation request from {} for appointment {}", requester_id, appointment_id);

        let appointment = self.get_appointment(appointment_id, auth_token).await?;

        let now = Utc::now();
        let decision = self.policy.evaluate_cancellation(&appointment, requester_id, now)?;

        let path = format!("/rest/v1/appointments?id=eq.{}", appointment_id);
        let body = json!({
            "canceled_at": decision.canceled_at.to_rfc3339(),
            "updated_at": now.to_rfc3339()
        });

        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            "Prefer",
            reqwest::header::HeaderValue::from_static("return=representation"),
        );

        let result: Vec<Appointment> = self
            .supabase
            .request_with_headers(Method::PATCH, &path, Some(auth_token), Some(body), Some(headers))
            .await
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        let cancelled = result
            .into_iter()
            .next()
            .ok_or_else(|| AppointmentError::DatabaseError("Failed to update appointment".to_string()))?;

        self.dispatcher
            .queue_cancellation_email(appointment_id, auth_token.to_string());

        info!("Appointment {} cancelled by {}", appointment_id, requester_id);
        Ok(cancelled)
    }

    // ==============================================================================
    // PRIVATE HELPER METHODS
    // ==============================================================================

    async fn find_bookable_provider(
        &self,
        provider_id: Uuid,
        auth_token: &str,
    ) -> Result<Option<ProviderRow>, AppointmentError> {
        let path = format!(
            "/rest/v1/users?id=eq.{}&is_provider=eq.true&select=id,name",
            provider_id
        );
        let result: Vec<ProviderRow> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        Ok(result.into_iter().next())
    }

    async fn slot_is_taken(
        &self,
        provider_id: Uuid,
        slot: DateTime<Utc>,
        auth_token: &str,
    ) -> Result<bool, AppointmentError> {
        let slot_param = urlencoding::encode(&slot.to_rfc3339()).into_owned();
        let path = format!(
            "/rest/v1/appointments?provider_id=eq.{}&scheduled_at=eq.{}&canceled_at=is.null&select=id",
            provider_id, slot_param
        );

        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        Ok(!result.is_empty())
    }

    async fn insert_appointment(
        &self,
        provider_id: Uuid,
        user_id: Uuid,
        slot: DateTime<Utc>,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        let now = Utc::now();
        let body = json!({
            "provider_id": provider_id,
            "user_id": user_id,
            "scheduled_at": slot.to_rfc3339(),
            "created_at": now.to_rfc3339(),
            "updated_at": now.to_rfc3339()
        });

        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            "Prefer",
            reqwest::header::HeaderValue::from_static("return=representation"),
        );

        let result: Vec<Appointment> = self
            .supabase
            .request_with_headers(
                Method::POST,
                "/rest/v1/appointments",
                Some(auth_token),
                Some(body),
                Some(headers),
            )
            .await
            .map_err(|e| match e {
                // The store's partial unique index on (provider_id, scheduled_at)
                // among open rows is the source of truth; losing the race at
                // insert time means the slot was taken after the pre-check.
                StoreError::Conflict(_) => {
                    AppointmentError::Policy(PolicyViolation::SlotUnavailable)
                }
                other => AppointmentError::DatabaseError(other.to_string()),
            })?;

        result
            .into_iter()
            .next()
            .ok_or_else(|| AppointmentError::DatabaseError("Failed to create appointment".to_string()))
    }

    async fn fetch_provider_summaries(
        &self,
        provider_ids: impl Iterator<Item = Uuid>,
        auth_token: &str,
    ) -> Result<HashMap<Uuid, ProviderSummary>, AppointmentError> {
        let mut ids: Vec<String> = provider_ids.map(|id| id.to_string()).collect();
        ids.sort();
        ids.dedup();

        let path = format!(
            "/rest/v1/users?id=in.({})&select=id,name,avatar_url",
            ids.join(",")
        );

        let rows: Vec<ProviderSummary> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        Ok(rows.into_iter().map(|row| (row.id, row)).collect())
    }
}
