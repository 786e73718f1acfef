use std::sync::Arc;

use chrono::{DateTime, Locale, Utc};
use reqwest::Method;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::NotificationError;
use crate::services::mailer::MailerClient;

/// Render a slot the way the product displays dates: "dia 10 de junho às 14:00h".
pub fn long_date_pt(t: DateTime<Utc>) -> String {
    t.format_localized("dia %d de %B às %H:%Mh", Locale::pt_BR).to_string()
}

/// Outbound side effects of booking events: the in-app note on creation
/// and the cancellation email. Mail delivery is detached from the request
/// that triggers it and is attempted at most once.
pub struct NotificationDispatcher {
    supabase: Arc<SupabaseClient>,
    mailer: Option<Arc<MailerClient>>,
}

impl NotificationDispatcher {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: Arc::new(SupabaseClient::new(config)),
            mailer: MailerClient::from_config(config).map(Arc::new),
        }
    }

    /// Store the in-app notification for the provider about a fresh booking.
    pub async fn notify_booking(
        &self,
        provider_id: Uuid,
        provider_name: &str,
        slot: DateTime<Utc>,
        auth_token: &str,
    ) -> Result<(), NotificationError> {
        let content = format!("Novo agendamento de {} para {}", provider_name, long_date_pt(slot));

        let body = json!({
            "user_id": provider_id,
            "content": content,
            "read": false,
            "created_at": Utc::now().to_rfc3339()
        });

        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            "Prefer",
            reqwest::header::HeaderValue::from_static("return=representation"),
        );

        let _: Vec<Value> = self
            .supabase
            .request_with_headers(
                Method::POST,
                "/rest/v1/notifications",
                Some(auth_token),
                Some(body),
                Some(headers),
            )
            .await
            .map_err(|e| NotificationError::DatabaseError(e.to_string()))?;

        debug!("Stored booking notification for provider {}", provider_id);
        Ok(())
    }

    /// Send the cancellation email for an appointment right away.
    /// Without a configured mail transport this degrades to a logged skip.
    pub async fn send_cancellation_email(
        &self,
        appointment_id: Uuid,
        auth_token: &str,
    ) -> Result<(), NotificationError> {
        let Some(mailer) = &self.mailer else {
            warn!(
                "Mail transport not configured, skipping cancellation email for appointment {}",
                appointment_id
            );
            return Ok(());
        };

        deliver_cancellation_email(&self.supabase, mailer, appointment_id, auth_token).await
    }

    /// Queue the cancellation email on a detached task: the send is
    /// attempted once, failures are logged and never reach the caller.
    pub fn queue_cancellation_email(&self, appointment_id: Uuid, auth_token: String) {
        let supabase = Arc::clone(&self.supabase);
        let mailer = self.mailer.clone();

        tokio::spawn(async move {
            let Some(mailer) = mailer else {
                warn!(
                    "Mail transport not configured, skipping cancellation email for appointment {}",
                    appointment_id
                );
                return;
            };

            if let Err(e) =
                deliver_cancellation_email(&supabase, &mailer, appointment_id, &auth_token).await
            {
                error!("Cancellation email for appointment {} failed: {}", appointment_id, e);
            }
        });
    }
}

#[derive(Debug, Deserialize)]
struct AppointmentRef {
    provider_id: Uuid,
    user_id: Uuid,
    scheduled_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct Contact {
    name: String,
    email: String,
}

async fn fetch_contact(
    supabase: &SupabaseClient,
    user_id: Uuid,
    auth_token: &str,
) -> Result<Contact, NotificationError> {
    let path = format!("/rest/v1/users?id=eq.{}&select=name,email", user_id);
    let rows: Vec<Contact> = supabase
        .request(Method::GET, &path, Some(auth_token), None)
        .await
        .map_err(|e| NotificationError::DatabaseError(e.to_string()))?;

    rows.into_iter().next().ok_or(NotificationError::NotFound)
}

async fn deliver_cancellation_email(
    supabase: &SupabaseClient,
    mailer: &MailerClient,
    appointment_id: Uuid,
    auth_token: &str,
) -> Result<(), NotificationError> {
    let path = format!("/rest/v1/appointments?id=eq.{}", appointment_id);
    let rows: Vec<AppointmentRef> = supabase
        .request(Method::GET, &path, Some(auth_token), None)
        .await
        .map_err(|e| NotificationError::DatabaseError(e.to_string()))?;

    let appointment = rows.into_iter().next().ok_or(NotificationError::NotFound)?;

    let provider = fetch_contact(supabase, appointment.provider_id, auth_token).await?;
    let user = fetch_contact(supabase, appointment.user_id, auth_token).await?;

    let text = format!(
        "Olá {},\n\n{} cancelou o agendamento marcado para {}.",
        provider.name,
        user.name,
        long_date_pt(appointment.scheduled_at)
    );

    mailer
        .send(
            &format!("{} <{}>", provider.name, provider.email),
            "Agendamento cancelado",
            &text,
        )
        .await?;

    info!("Cancellation email sent to provider {}", appointment.provider_id);
    Ok(())
}
