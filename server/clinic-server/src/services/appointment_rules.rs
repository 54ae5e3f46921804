//! Appointment lifecycle guards
//!
//! Pure checks evaluated before any state change. Each guard returns the
//! client-facing error the handler should answer with.

use chrono::{DateTime, FixedOffset, Utc};
use database_layer::{Appointment, AppointmentStatus};

use crate::error::ApiError;
use crate::services::scheduling::to_local;

/// Minimum number of local calendar days between today and the appointment
/// for a patient to cancel it
pub const PATIENT_CANCEL_NOTICE_DAYS: i64 = 7;

/// Whole local calendar days from `now` until the appointment
pub fn days_until(scheduled_at: DateTime<Utc>, now: DateTime<Utc>, offset: FixedOffset) -> i64 {
    (to_local(scheduled_at, offset).date_naive() - to_local(now, offset).date_naive()).num_days()
}

/// `treatment_active` is `None` when the appointment has no treatment linked
fn treatment_allows_changes(treatment_active: Option<bool>) -> bool {
    treatment_active.unwrap_or(true)
}

/// Whether the owning patient may still move the appointment
pub fn patient_can_reschedule(
    appointment: &Appointment,
    treatment_active: Option<bool>,
    now: DateTime<Utc>,
) -> bool {
    appointment.status != AppointmentStatus::Cancelled
        && !appointment.attended
        && appointment.scheduled_at > now
        && treatment_allows_changes(treatment_active)
}

/// Whether the owning patient may still cancel the appointment
pub fn patient_can_cancel(appointment: &Appointment, now: DateTime<Utc>, offset: FixedOffset) -> bool {
    appointment.status.is_open()
        && appointment.scheduled_at > now
        && days_until(appointment.scheduled_at, now, offset) >= PATIENT_CANCEL_NOTICE_DAYS
}

/// Why a patient cancellation is refused, if it is
pub fn check_patient_cancel(
    appointment: &Appointment,
    now: DateTime<Utc>,
    offset: FixedOffset,
) -> Result<(), ApiError> {
    if !appointment.status.is_open() {
        return Err(ApiError::bad_request("Only pending or confirmed appointments can be cancelled"));
    }
    if appointment.scheduled_at <= now {
        return Err(ApiError::bad_request("Past appointments cannot be cancelled"));
    }
    if days_until(appointment.scheduled_at, now, offset) < PATIENT_CANCEL_NOTICE_DAYS {
        return Err(ApiError::bad_request(
            "Appointments can only be cancelled at least 7 days in advance. Contact the clinic for help",
        ));
    }
    Ok(())
}

/// Administrators may cancel any open appointment
pub fn check_admin_cancel(appointment: &Appointment) -> Result<(), ApiError> {
    if appointment.status.is_open() {
        Ok(())
    } else {
        Err(ApiError::bad_request("Only pending or confirmed appointments can be cancelled"))
    }
}

/// Whether an appointment may be moved at all
pub fn check_reschedulable(
    appointment: &Appointment,
    treatment_active: Option<bool>,
    now: DateTime<Utc>,
) -> Result<(), ApiError> {
    if appointment.status == AppointmentStatus::Cancelled {
        return Err(ApiError::bad_request("A cancelled appointment cannot be rescheduled"));
    }
    if appointment.attended {
        return Err(ApiError::bad_request("The appointment was already attended and cannot be rescheduled"));
    }
    if appointment.scheduled_at <= now {
        return Err(ApiError::bad_request("Past appointments cannot be rescheduled"));
    }
    if !treatment_allows_changes(treatment_active) {
        return Err(ApiError::bad_request("The treatment is finished; this appointment cannot be rescheduled"));
    }
    Ok(())
}

/// New appointment times must lie in the future
pub fn check_future(at: DateTime<Utc>, now: DateTime<Utc>) -> Result<(), ApiError> {
    if at <= now {
        Err(ApiError::bad_request("The appointment date and time must be in the future"))
    } else {
        Ok(())
    }
}

/// Doctor confirmation or cancellation is only possible while pending
pub fn check_pending(appointment: &Appointment) -> Result<(), ApiError> {
    if appointment.status == AppointmentStatus::Pending {
        Ok(())
    } else {
        Err(ApiError::bad_request("The appointment was already processed"))
    }
}

/// Follow-up visits are scheduled from a confirmed appointment
pub fn check_confirmed(appointment: &Appointment, action: &str) -> Result<(), ApiError> {
    if appointment.status == AppointmentStatus::Confirmed {
        Ok(())
    } else {
        Err(ApiError::bad_request(format!(
            "The appointment must be confirmed before {}",
            action
        )))
    }
}

/// Action requested on `POST /appointments/{id}/confirm`; the Spanish verbs are accepted too
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmAction {
    Confirm,
    Cancel,
}

impl ConfirmAction {
    pub fn parse(value: &str) -> Result<Self, ApiError> {
        match value.trim().to_ascii_lowercase().as_str() {
            "confirm" | "confirmar" => Ok(ConfirmAction::Confirm),
            "cancel" | "cancelar" => Ok(ConfirmAction::Cancel),
            _ => Err(ApiError::bad_request("Invalid action, use 'confirm' or 'cancel'")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use database_layer::AppointmentKind;
    use uuid::Uuid;

    fn offset() -> FixedOffset {
        FixedOffset::east_opt(-6 * 3600).unwrap()
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 3, 16, 0, 0).unwrap()
    }

    fn appointment(scheduled_at: DateTime<Utc>, status: AppointmentStatus) -> Appointment {
        Appointment {
            id: Uuid::new_v4(),
            patient_id: Uuid::new_v4(),
            doctor_id: Uuid::new_v4(),
            specialty_id: Uuid::new_v4(),
            scheduled_at,
            kind: AppointmentKind::Initial,
            status,
            treatment_id: None,
            consent_completed: false,
            attended: false,
            preferred_payment_method: None,
            created_by: None,
            updated_by: None,
            created_at: now(),
            updated_at: now(),
        }
    }

    #[test]
    fn test_patient_cancel_needs_seven_local_days() {
        let eight_days = appointment(now() + Duration::days(8), AppointmentStatus::Pending);
        assert!(patient_can_cancel(&eight_days, now(), offset()));
        assert!(check_patient_cancel(&eight_days, now(), offset()).is_ok());

        let three_days = appointment(now() + Duration::days(3), AppointmentStatus::Confirmed);
        assert!(!patient_can_cancel(&three_days, now(), offset()));
        assert!(check_patient_cancel(&three_days, now(), offset()).is_err());
    }

    #[test]
    fn test_cancel_notice_counts_local_dates() {
        // 2025-03-03 10:00 local; 2025-03-10 00:30 local is 7 local dates ahead
        let at = Utc.with_ymd_and_hms(2025, 3, 10, 6, 30, 0).unwrap();
        assert_eq!(days_until(at, now(), offset()), 7);
        assert!(patient_can_cancel(&appointment(at, AppointmentStatus::Pending), now(), offset()));

        // One hour earlier is still 2025-03-09 local
        let at = Utc.with_ymd_and_hms(2025, 3, 10, 5, 30, 0).unwrap();
        assert_eq!(days_until(at, now(), offset()), 6);
    }

    #[test]
    fn test_cancelled_appointment_cannot_be_cancelled_again() {
        let cancelled = appointment(now() + Duration::days(30), AppointmentStatus::Cancelled);
        assert!(!patient_can_cancel(&cancelled, now(), offset()));
        assert!(check_admin_cancel(&cancelled).is_err());
    }

    #[test]
    fn test_reschedule_flags() {
        let future = appointment(now() + Duration::days(1), AppointmentStatus::Pending);
        assert!(patient_can_reschedule(&future, None, now()));
        assert!(patient_can_reschedule(&future, Some(true), now()));
        assert!(!patient_can_reschedule(&future, Some(false), now()));
        assert!(check_reschedulable(&future, Some(false), now()).is_err());

        let mut attended = future.clone();
        attended.attended = true;
        assert!(!patient_can_reschedule(&attended, None, now()));
        assert!(check_reschedulable(&attended, None, now()).is_err());

        let past = appointment(now() - Duration::hours(1), AppointmentStatus::Confirmed);
        assert!(check_reschedulable(&past, None, now()).is_err());
    }

    #[test]
    fn test_pending_guard() {
        assert!(check_pending(&appointment(now(), AppointmentStatus::Pending)).is_ok());
        assert!(check_pending(&appointment(now(), AppointmentStatus::Confirmed)).is_err());
    }

    #[test]
    fn test_confirm_action_parse() {
        assert_eq!(ConfirmAction::parse("Confirm").unwrap(), ConfirmAction::Confirm);
        assert_eq!(ConfirmAction::parse("cancel").unwrap(), ConfirmAction::Cancel);
        assert_eq!(ConfirmAction::parse("cancelar").unwrap(), ConfirmAction::Cancel);
        assert!(ConfirmAction::parse("approve").is_err());
    }
}
