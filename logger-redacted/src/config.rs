// Logger configuration
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggerConfig {
    pub redaction_enabled: bool,
    pub hash_for_correlation: bool,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            redaction_enabled: true,
            hash_for_correlation: true,
        }
    }
}

impl LoggerConfig {
    pub fn redaction_config(&self) -> crate::RedactionConfig {
        crate::RedactionConfig {
            redact_phones: self.redaction_enabled,
            redact_emails: self.redaction_enabled,
            redact_tokens: self.redaction_enabled,
            hash_for_correlation: self.hash_for_correlation,
        }
    }
}
