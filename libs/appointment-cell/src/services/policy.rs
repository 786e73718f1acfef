use chrono::{DateTime, Duration, Timelike, Utc};
use uuid::Uuid;

use shared_config::AppConfig;

use crate::models::{Appointment, PolicyViolation};

/// Truncate a requested time to the slot it falls in: the top of its hour.
/// The hour is the unit of scheduling granularity, so two requests inside
/// the same hour resolve to the same slot and collide.
pub fn canonical_slot(requested_at: DateTime<Utc>) -> DateTime<Utc> {
    requested_at
        .with_minute(0)
        .and_then(|t| t.with_second(0))
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(requested_at)
}

#[derive(Debug, Clone, PartialEq)]
pub struct BookingDecision {
    /// The slot the appointment will occupy, used as the uniqueness key.
    pub slot: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CancellationDecision {
    pub canceled_at: DateTime<Utc>,
}

/// The booking and cancellation rules, evaluated over plain inputs.
///
/// The engine never touches the clock or the store: `now` is an explicit
/// argument and lookup results (`provider_is_bookable`, `slot_taken`)
/// arrive as data. Callers own persistence and notifications.
#[derive(Debug, Clone)]
pub struct BookingPolicy {
    cancellation_cutoff_hours: i64,
}

impl BookingPolicy {
    pub fn new(cancellation_cutoff_hours: i64) -> Self {
        Self { cancellation_cutoff_hours }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(config.cancellation_cutoff_hours)
    }

    pub fn cutoff_hours(&self) -> i64 {
        self.cancellation_cutoff_hours
    }

    /// Decide whether a booking request may proceed.
    ///
    /// `provider_is_bookable`: the target user exists with the provider
    /// flag set. `slot_taken`: a non-cancelled appointment already holds
    /// the canonical slot for this provider. A slot equal to `now` is
    /// still bookable; only slots strictly in the past are rejected.
    pub fn evaluate_booking(
        &self,
        provider_is_bookable: bool,
        requested_at: DateTime<Utc>,
        now: DateTime<Utc>,
        slot_taken: bool,
    ) -> Result<BookingDecision, PolicyViolation> {
        if !provider_is_bookable {
            return Err(PolicyViolation::InvalidProvider);
        }

        let slot = canonical_slot(requested_at);

        if slot < now {
            return Err(PolicyViolation::PastDate);
        }

        if slot_taken {
            return Err(PolicyViolation::SlotUnavailable);
        }

        Ok(BookingDecision { slot })
    }

    /// Decide whether the requester may cancel an appointment.
    ///
    /// Only the booking user may cancel, and only while the cutoff instant
    /// (`scheduled_at` minus the configured window) has not passed.
    /// An already-cancelled appointment is not special-cased: the same
    /// checks run again.
    pub fn evaluate_cancellation(
        &self,
        appointment: &Appointment,
        requester_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<CancellationDecision, PolicyViolation> {
        if appointment.user_id != requester_id {
            return Err(PolicyViolation::Unauthorized);
        }

        let cutoff = appointment.scheduled_at - Duration::hours(self.cancellation_cutoff_hours);
        if cutoff < now {
            return Err(PolicyViolation::CancellationWindowExpired(
                self.cancellation_cutoff_hours,
            ));
        }

        Ok(CancellationDecision { canceled_at: now })
    }
}
