//! Domain services used by the HTTP handlers

pub mod appointment_rules;
pub mod attendance;
pub mod consent_pdf;
pub mod media;
pub mod scheduling;
pub mod treatment_plan;
