// Logging macros that run the message through the default redactor
#[macro_export]
macro_rules! redacted_info {
    ($($arg:tt)*) => {
        tracing::info!("{}", $crate::PiiRedactor::default().redact(&format!($($arg)*)))
    };
}

#[macro_export]
macro_rules! redacted_warn {
    ($($arg:tt)*) => {
        tracing::warn!("{}", $crate::PiiRedactor::default().redact(&format!($($arg)*)))
    };
}

#[cfg(test)]
mod tests {
    #[test]
    fn test_macros_accept_format_args() {
        let phone = "7551234567";
        redacted_info!("Patient registered with phone {}", phone);
        redacted_warn!("Login failed for {}", phone);
    }
}
