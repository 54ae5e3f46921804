//! Attended flag upkeep
//!
//! An appointment counts as attended once it has a FINAL report and a
//! prescription. The flag is recomputed inside the transaction of every
//! report or prescription change.

use database_layer::{AppointmentRepository, ClinicalRepository, DatabaseResult, TreatmentRepository};
use sqlx::PgConnection;
use tracing::debug;
use uuid::Uuid;

use crate::services::treatment_plan::name_from_summary;

pub fn is_attended(has_final_report: bool, has_prescription: bool) -> bool {
    has_final_report && has_prescription
}

/// Recompute and store the attended flag of an appointment
pub async fn refresh_attended(
    conn: &mut PgConnection,
    clinical: &ClinicalRepository,
    appointments: &AppointmentRepository,
    appointment_id: Uuid,
) -> DatabaseResult<bool> {
    let (has_final_report, has_prescription) = clinical.attendance_facts(&mut *conn, appointment_id).await?;
    let attended = is_attended(has_final_report, has_prescription);
    appointments.set_attended(&mut *conn, appointment_id, attended).await?;
    debug!(%appointment_id, attended, "Attended flag refreshed");
    Ok(attended)
}

/// Name the pair's active treatment after a report summary when it has no name yet
pub async fn name_active_treatment(
    conn: &mut PgConnection,
    treatments: &TreatmentRepository,
    patient_id: Uuid,
    doctor_id: Uuid,
    summary: &str,
) -> DatabaseResult<()> {
    let Some(name) = name_from_summary(summary) else {
        return Ok(());
    };
    if let Some(treatment) = treatments.active_for_pair(&mut *conn, patient_id, doctor_id).await? {
        if treatments.name_if_unnamed(&mut *conn, treatment.id, &name).await? {
            debug!(treatment_id = %treatment.id, "Treatment named from report summary");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attended_needs_both_records() {
        assert!(is_attended(true, true));
        assert!(!is_attended(true, false));
        assert!(!is_attended(false, true));
        assert!(!is_attended(false, false));
    }
}
