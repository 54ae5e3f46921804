use regex::Regex;
use lazy_static::lazy_static;
use sha2::{Sha256, Digest};
use base64::{Engine as _, engine::general_purpose};

lazy_static! {
    static ref EMAIL_REGEX: Regex = Regex::new(r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b").unwrap();
    static ref PHONE_REGEX: Regex = Regex::new(r"(?:\+52[-.\s]?)?\b\d{10}\b").unwrap();
    static ref BEARER_REGEX: Regex = Regex::new(r"Bearer\s+[A-Za-z0-9._~+/=-]+").unwrap();
}

/// PII redaction configuration
#[derive(Debug, Clone)]
pub struct RedactionConfig {
    pub redact_phones: bool,
    pub redact_emails: bool,
    pub redact_tokens: bool,
    pub hash_for_correlation: bool,
}

impl Default for RedactionConfig {
    fn default() -> Self {
        Self {
            redact_phones: true,
            redact_emails: true,
            redact_tokens: true,
            hash_for_correlation: true,
        }
    }
}

/// PII redactor for log messages
#[derive(Debug, Clone, Default)]
pub struct PiiRedactor {
    config: RedactionConfig,
}

impl PiiRedactor {
    pub fn new(config: RedactionConfig) -> Self {
        Self { config }
    }

    pub fn redact(&self, text: &str) -> String {
        let mut result = text.to_string();

        // Tokens first so digit runs inside a JWT are not mistaken for phones
        if self.config.redact_tokens {
            result = BEARER_REGEX.replace_all(&result, "Bearer [REDACTED]").into_owned();
        }

        if self.config.redact_emails {
            result = EMAIL_REGEX
                .replace_all(&result, |caps: &regex::Captures| {
                    self.redact_value("EMAIL", caps.get(0).map_or("", |m| m.as_str()))
                })
                .into_owned();
        }

        if self.config.redact_phones {
            result = PHONE_REGEX
                .replace_all(&result, |caps: &regex::Captures| {
                    self.redact_value("PHONE", caps.get(0).map_or("", |m| m.as_str()))
                })
                .into_owned();
        }

        result
    }

    /// Replace one known-sensitive value with a labelled marker
    pub fn redact_value(&self, label: &str, value: &str) -> String {
        if self.config.hash_for_correlation {
            format!("{}[{}]", label, self.hash_value(value))
        } else {
            format!("{}[***]", label)
        }
    }

    fn hash_value(&self, value: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(value.as_bytes());
        let result = hasher.finalize();
        let prefix: Vec<u8> = result.iter().take(8).copied().collect();
        general_purpose::STANDARD_NO_PAD.encode(prefix)
    }
}
