use chrono::{NaiveDate, NaiveTime};
use sqlx::{PgConnection, Pool, Postgres};
use uuid::Uuid;

use crate::error::DatabaseResult;
use crate::models::Consent;

/// Clinical text a doctor fills in before the patient signs
#[derive(Debug, Clone, Default)]
pub struct ConsentMedicalFields {
    pub primary_diagnosis: Option<String>,
    pub proposed_procedure: Option<String>,
    pub benefits: Option<String>,
    pub risks: Option<String>,
    pub alternatives: Option<String>,
    pub witness1_name: Option<String>,
    pub witness2_name: Option<String>,
}

impl ConsentMedicalFields {
    pub fn is_empty(&self) -> bool {
        [
            &self.primary_diagnosis,
            &self.proposed_procedure,
            &self.benefits,
            &self.risks,
            &self.alternatives,
            &self.witness1_name,
            &self.witness2_name,
        ]
        .iter()
        .all(|field| field.is_none())
    }
}

/// Where and when the consent was given
#[derive(Debug, Clone)]
pub struct ConsentSetting {
    pub place: String,
    pub date: NaiveDate,
    pub time: NaiveTime,
}

#[derive(sqlx::FromRow)]
struct UpsertedConsent {
    #[sqlx(flatten)]
    consent: Consent,
    inserted: bool,
}

/// Repository for per-appointment informed consents
#[derive(Debug, Clone)]
pub struct ConsentRepository {
    pool: Pool<Postgres>,
}

impl ConsentRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    pub async fn find_by_appointment(&self, appointment_id: Uuid) -> DatabaseResult<Option<Consent>> {
        let consent = sqlx::query_as::<_, Consent>("SELECT * FROM consents WHERE appointment_id = $1")
            .bind(appointment_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(consent)
    }

    /// Record the patient's signature; returns the consent and whether it was created
    pub async fn save_signature(
        &self,
        conn: &mut PgConnection,
        appointment_id: Uuid,
        setting: &ConsentSetting,
        signature_path: &str,
    ) -> DatabaseResult<(Consent, bool)> {
        let row = sqlx::query_as::<_, UpsertedConsent>(
            r#"
            INSERT INTO consents
                (appointment_id, place, consent_date, consent_time, patient_signature_path, signed_at)
            VALUES ($1, $2, $3, $4, $5, NOW())
            ON CONFLICT (appointment_id) DO UPDATE SET
                place = EXCLUDED.place,
                consent_date = EXCLUDED.consent_date,
                consent_time = EXCLUDED.consent_time,
                patient_signature_path = EXCLUDED.patient_signature_path,
                signed_at = EXCLUDED.signed_at,
                updated_at = NOW()
            RETURNING *, (xmax = 0) AS inserted
            "#,
        )
        .bind(appointment_id)
        .bind(&setting.place)
        .bind(setting.date)
        .bind(setting.time)
        .bind(signature_path)
        .fetch_one(conn)
        .await?;
        Ok((row.consent, row.inserted))
    }

    /// Record the doctor's clinical fields, keeping stored values for omitted ones
    pub async fn save_medical_fields(
        &self,
        conn: &mut PgConnection,
        appointment_id: Uuid,
        setting: &ConsentSetting,
        fields: &ConsentMedicalFields,
    ) -> DatabaseResult<(Consent, bool)> {
        let row = sqlx::query_as::<_, UpsertedConsent>(
            r#"
            INSERT INTO consents
                (appointment_id, place, consent_date, consent_time,
                 primary_diagnosis, proposed_procedure, benefits, risks, alternatives,
                 witness1_name, witness2_name)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ON CONFLICT (appointment_id) DO UPDATE SET
                primary_diagnosis = COALESCE(EXCLUDED.primary_diagnosis, consents.primary_diagnosis),
                proposed_procedure = COALESCE(EXCLUDED.proposed_procedure, consents.proposed_procedure),
                benefits = COALESCE(EXCLUDED.benefits, consents.benefits),
                risks = COALESCE(EXCLUDED.risks, consents.risks),
                alternatives = COALESCE(EXCLUDED.alternatives, consents.alternatives),
                witness1_name = COALESCE(EXCLUDED.witness1_name, consents.witness1_name),
                witness2_name = COALESCE(EXCLUDED.witness2_name, consents.witness2_name),
                updated_at = NOW()
            RETURNING *, (xmax = 0) AS inserted
            "#,
        )
        .bind(appointment_id)
        .bind(&setting.place)
        .bind(setting.date)
        .bind(setting.time)
        .bind(fields.primary_diagnosis.as_deref())
        .bind(fields.proposed_procedure.as_deref())
        .bind(fields.benefits.as_deref())
        .bind(fields.risks.as_deref())
        .bind(fields.alternatives.as_deref())
        .bind(fields.witness1_name.as_deref())
        .bind(fields.witness2_name.as_deref())
        .fetch_one(conn)
        .await?;
        Ok((row.consent, row.inserted))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_medical_fields_emptiness() {
        assert!(ConsentMedicalFields::default().is_empty());
        let fields = ConsentMedicalFields {
            risks: Some("Irritación leve".to_string()),
            ..Default::default()
        };
        assert!(!fields.is_empty());
    }
}
