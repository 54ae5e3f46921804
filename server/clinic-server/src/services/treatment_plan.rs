//! Treatment follow-up dates and naming

use chrono::{DateTime, Duration, Utc};
use database_layer::{Treatment, TreatmentActivity};

/// Frequency used when a treatment is created on confirmation
pub const CONFIRMATION_FREQUENCY_DAYS: i32 = 15;

/// Frequency used when a doctor schedules a follow-up without a valid one
pub const FOLLOW_UP_FREQUENCY_DAYS: i32 = 30;

/// Longest accepted follow-up interval; matches the treatments table check
pub const MAX_FREQUENCY_DAYS: i32 = 365;

/// Longest treatment name derived from a report summary
const MAX_NAME_CHARS: usize = 200;

/// Suggested date of the next visit.
///
/// Counts `frequency_days` from the latest attended appointment, else the
/// latest appointment, else the treatment start. Finished treatments have none,
/// and neither does a date past chrono's range.
pub fn next_visit(treatment: &Treatment, activity: &TreatmentActivity) -> Option<DateTime<Utc>> {
    if !treatment.active {
        return None;
    }
    let base = activity
        .latest_attended
        .or(activity.latest_any)
        .unwrap_or(treatment.started_at);
    base.checked_add_signed(Duration::days(i64::from(treatment.frequency_days)))
}

/// Frequency requested by a doctor, falling back to 30 days when missing,
/// unparsable or outside 1..=365
pub fn follow_up_frequency(raw: Option<&serde_json::Value>) -> i32 {
    let parsed = match raw {
        Some(serde_json::Value::Number(n)) => n.as_i64(),
        Some(serde_json::Value::String(s)) => s.trim().parse::<i64>().ok(),
        _ => None,
    };
    parsed
        .and_then(|days| i32::try_from(days).ok())
        .filter(|days| (1..=MAX_FREQUENCY_DAYS).contains(days))
        .unwrap_or(FOLLOW_UP_FREQUENCY_DAYS)
}

/// Treatment name taken from a report summary; `None` when it is blank
pub fn name_from_summary(summary: &str) -> Option<String> {
    let trimmed = summary.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.chars().take(MAX_NAME_CHARS).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;
    use uuid::Uuid;

    fn treatment(active: bool) -> Treatment {
        Treatment {
            id: Uuid::new_v4(),
            patient_id: Uuid::new_v4(),
            doctor_id: Uuid::new_v4(),
            name: None,
            description: None,
            frequency_days: 15,
            started_at: Utc.with_ymd_and_hms(2025, 1, 1, 15, 0, 0).unwrap(),
            ended_at: None,
            active,
            close_reason: None,
        }
    }

    fn activity(attended: Option<DateTime<Utc>>, any: Option<DateTime<Utc>>) -> TreatmentActivity {
        TreatmentActivity {
            latest_attended: attended,
            latest_any: any,
            total_appointments: 0,
            total_prescriptions: 0,
        }
    }

    #[test]
    fn test_next_visit_prefers_attended() {
        let attended = Utc.with_ymd_and_hms(2025, 2, 1, 15, 0, 0).unwrap();
        let any = Utc.with_ymd_and_hms(2025, 2, 10, 15, 0, 0).unwrap();
        let next = next_visit(&treatment(true), &activity(Some(attended), Some(any))).unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2025, 2, 16, 15, 0, 0).unwrap());
    }

    #[test]
    fn test_next_visit_falls_back_to_latest_then_start() {
        let any = Utc.with_ymd_and_hms(2025, 2, 10, 15, 0, 0).unwrap();
        assert_eq!(
            next_visit(&treatment(true), &activity(None, Some(any))),
            Some(Utc.with_ymd_and_hms(2025, 2, 25, 15, 0, 0).unwrap())
        );
        assert_eq!(
            next_visit(&treatment(true), &activity(None, None)),
            Some(Utc.with_ymd_and_hms(2025, 1, 16, 15, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_finished_treatment_has_no_next_visit() {
        assert_eq!(next_visit(&treatment(false), &activity(None, None)), None);
    }

    #[test]
    fn test_follow_up_frequency() {
        assert_eq!(follow_up_frequency(None), 30);
        assert_eq!(follow_up_frequency(Some(&json!(21))), 21);
        assert_eq!(follow_up_frequency(Some(&json!("10"))), 10);
        assert_eq!(follow_up_frequency(Some(&json!("cada mes"))), 30);
        assert_eq!(follow_up_frequency(Some(&json!(0))), 30);
        assert_eq!(follow_up_frequency(Some(&json!(null))), 30);
    }

    #[test]
    fn test_follow_up_frequency_is_capped() {
        assert_eq!(follow_up_frequency(Some(&json!(365))), 365);
        assert_eq!(follow_up_frequency(Some(&json!(366))), 30);
        assert_eq!(follow_up_frequency(Some(&json!(2_000_000_000))), 30);
        assert_eq!(follow_up_frequency(Some(&json!("9999999999999"))), 30);
    }

    #[test]
    fn test_next_visit_out_of_range_is_none() {
        let mut stored = treatment(true);
        stored.frequency_days = i32::MAX;
        assert_eq!(next_visit(&stored, &activity(None, None)), None);

        let late = DateTime::<Utc>::MAX_UTC - Duration::days(10);
        stored.frequency_days = 15;
        assert_eq!(next_visit(&stored, &activity(Some(late), None)), None);
    }

    #[test]
    fn test_name_from_summary() {
        assert_eq!(name_from_summary("  Acné vulgar "), Some("Acné vulgar".to_string()));
        assert_eq!(name_from_summary("   "), None);
    }
}
