// Payment rules shared by the transfer, in-office and reversal flows
use crate::error::{BillingError, BillingResult};
use crate::models::{Payment, PaymentMethod};
use rust_decimal::Decimal;
use std::str::FromStr;

/// Largest total a `NUMERIC(10,2)` column holds
/// (99,999,999.99; mantissa 9_999_999_999 split into 32-bit words)
pub const MAX_AMOUNT: Decimal = Decimal::from_parts(1_410_065_407, 2, 0, false, 2);

/// Parse a requested total, falling back to the clinic's default consultation fee
pub fn parse_amount(raw: Option<&str>, default: Decimal) -> BillingResult<Decimal> {
    let raw = match raw.map(str::trim) {
        None | Some("") => return Ok(default),
        Some(raw) => raw,
    };

    let amount = Decimal::from_str(raw)
        .map_err(|_| BillingError::Validation(format!("'{}' is not a valid amount", raw)))?;

    if amount.is_sign_negative() {
        return Err(BillingError::Validation("amount cannot be negative".to_string()));
    }

    let amount = amount.round_dp(2);
    if amount > MAX_AMOUNT {
        return Err(BillingError::Validation(format!("amount cannot exceed {}", MAX_AMOUNT)));
    }

    Ok(amount)
}

/// Reject a new payment when an open one of the same method exists
pub fn ensure_no_open_payment(existing: &[Payment], method: PaymentMethod) -> BillingResult<()> {
    if existing.iter().any(|p| p.method == method && p.is_open()) {
        let label = match method {
            PaymentMethod::Transfer => "a transfer payment",
            PaymentMethod::InOffice => "an in-office payment",
        };
        return Err(BillingError::Duplicate(format!(
            "this appointment already has {} pending or approved",
            label
        )));
    }
    Ok(())
}

/// A payment may be reverted once
pub fn ensure_revertible(payment: &Payment) -> BillingResult<()> {
    if payment.reversed {
        return Err(BillingError::Validation("payment was already reverted".to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PaymentDraft, PaymentStatus};
    use chrono::Utc;
    use proptest::prelude::*;
    use uuid::Uuid;

    fn payment_from(draft: PaymentDraft) -> Payment {
        let now = Utc::now();
        Payment {
            id: Uuid::new_v4(),
            patient_id: draft.patient_id,
            appointment_id: draft.appointment_id,
            total: draft.total,
            paid: draft.paid,
            paid_at: draft.paid_at,
            verified: draft.verified,
            method: draft.method,
            status: draft.status,
            receipt_path: draft.receipt_path,
            reversed: false,
            reversal_reason: None,
            reversed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn default_fee() -> Decimal {
        Decimal::new(90000, 2)
    }

    #[test]
    fn test_missing_amount_uses_default() {
        assert_eq!(parse_amount(None, default_fee()).unwrap(), default_fee());
        assert_eq!(parse_amount(Some("  "), default_fee()).unwrap(), default_fee());
    }

    #[test]
    fn test_amount_is_parsed_and_rounded() {
        assert_eq!(parse_amount(Some("450.5"), default_fee()).unwrap(), Decimal::new(45050, 2));
        assert_eq!(parse_amount(Some("10.005"), default_fee()).unwrap(), Decimal::new(1000, 2));
    }

    #[test]
    fn test_invalid_amounts_are_rejected() {
        assert!(matches!(parse_amount(Some("abc"), default_fee()), Err(BillingError::Validation(_))));
        assert!(matches!(parse_amount(Some("-1"), default_fee()), Err(BillingError::Validation(_))));
    }

    #[test]
    fn test_amount_upper_bound() {
        assert_eq!(
            parse_amount(Some("99999999.99"), default_fee()).unwrap(),
            Decimal::new(9_999_999_999, 2)
        );
        assert!(matches!(
            parse_amount(Some("100000000000"), default_fee()),
            Err(BillingError::Validation(_))
        ));
        assert!(matches!(
            parse_amount(Some("99999999.999"), default_fee()),
            Err(BillingError::Validation(_))
        ));
    }

    #[test]
    fn test_duplicate_open_payment_is_rejected() {
        let appointment = Uuid::new_v4();
        let existing = vec![payment_from(PaymentDraft::transfer(
            Uuid::new_v4(),
            appointment,
            default_fee(),
            "receipts/a.png".to_string(),
        ))];

        assert!(matches!(
            ensure_no_open_payment(&existing, PaymentMethod::Transfer),
            Err(BillingError::Duplicate(_))
        ));
        assert!(ensure_no_open_payment(&existing, PaymentMethod::InOffice).is_ok());
    }

    #[test]
    fn test_reversed_or_rejected_payments_do_not_block() {
        let mut reversed = payment_from(PaymentDraft::in_office(Uuid::new_v4(), Uuid::new_v4(), default_fee(), Utc::now()));
        reversed.reversed = true;
        let mut rejected = payment_from(PaymentDraft::in_office(Uuid::new_v4(), Uuid::new_v4(), default_fee(), Utc::now()));
        rejected.status = PaymentStatus::Rejected;

        assert!(ensure_no_open_payment(&[reversed.clone(), rejected], PaymentMethod::InOffice).is_ok());
        assert!(ensure_revertible(&reversed).is_err());
    }

    #[test]
    fn test_in_office_draft_is_settled() {
        let payment = payment_from(PaymentDraft::in_office(Uuid::new_v4(), Uuid::new_v4(), default_fee(), Utc::now()));
        assert_eq!(payment.outstanding(), Decimal::ZERO);
        assert!(payment.verified);
        assert_eq!(payment.status, PaymentStatus::Approved);
    }

    proptest! {
        #[test]
        fn prop_non_negative_cents_round_trip(cents in 0i64..10_000_000) {
            let amount = Decimal::new(cents, 2);
            let parsed = parse_amount(Some(&amount.to_string()), default_fee()).unwrap();
            prop_assert_eq!(parsed, amount);
        }

        #[test]
        fn prop_transfer_outstanding_equals_total(cents in 0i64..10_000_000) {
            let total = Decimal::new(cents, 2);
            let payment = payment_from(PaymentDraft::transfer(Uuid::new_v4(), Uuid::new_v4(), total, "r.png".to_string()));
            prop_assert_eq!(payment.outstanding(), total);
        }
    }
}
