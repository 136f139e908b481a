use crate::filters::FilterError;
use crate::mailbox::EmailSummary;

// Longest suffix first so "B" does not shadow "KB".
const SIZE_UNITS: &[(&str, u64)] = &[
    ("TB", 1024 * 1024 * 1024 * 1024),
    ("GB", 1024 * 1024 * 1024),
    ("MB", 1024 * 1024),
    ("KB", 1024),
    ("B", 1),
];

/// Parse a human size such as `5MB`, `1.5GB` or `2048` into bytes.
/// Fractional results are truncated toward zero.
pub fn parse_size(input: &str) -> Result<u64, FilterError> {
    let normalized = input.trim().to_uppercase();
    let invalid = || FilterError::InvalidSize(input.to_string());

    for (unit, multiplier) in SIZE_UNITS {
        if let Some(number) = normalized.strip_suffix(unit) {
            let value: f64 = number.trim().parse().map_err(|_| invalid())?;
            if !value.is_finite() || value < 0.0 {
                return Err(invalid());
            }
            return Ok((value * *multiplier as f64) as u64);
        }
    }

    normalized.parse::<u64>().map_err(|_| invalid())
}

pub fn format_size(bytes: u64) -> String {
    let mut size = bytes as f64;
    for unit in ["B", "KB", "MB", "GB", "TB"] {
        if size < 1024.0 {
            return format!("{:.2} {}", size, unit);
        }
        size /= 1024.0;
    }
    format!("{:.2} PB", size)
}

pub fn format_email_preview(email: &EmailSummary) -> String {
    let or_default = |value: &str, default: &'static str| {
        if value.is_empty() {
            default.to_string()
        } else {
            value.to_string()
        }
    };

    format!(
        "From: {} | Date: {} | Size: {} | Subject: {}",
        or_default(&email.from, "Unknown"),
        or_default(&email.date, "Unknown Date"),
        format_size(email.size),
        or_default(&email.subject, "No Subject")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_size() {
        assert_eq!(parse_size("1024").unwrap(), 1024);
        assert_eq!(parse_size("1KB").unwrap(), 1024);
        assert_eq!(parse_size("5MB").unwrap(), 5 * 1024 * 1024);
        assert_eq!(parse_size("1024B").unwrap(), 1024);
        assert_eq!(parse_size(" 2 tb ").unwrap(), 2 * 1024u64.pow(4));
    }

    #[test]
    fn test_parse_size_fractional_truncates() {
        assert_eq!(
            parse_size("1.5GB").unwrap(),
            (1.5 * 1024.0 * 1024.0 * 1024.0) as u64
        );
        assert_eq!(parse_size("0.5kb").unwrap(), 512);
        assert_eq!(parse_size("1.0001KB").unwrap(), 1024);
    }

    #[test]
    fn test_parse_size_invalid() {
        for input in ["invalid", "XYZ", "", "MB", "-5MB", "1.5", "infKB", "5 MiB"] {
            assert!(
                matches!(parse_size(input), Err(FilterError::InvalidSize(_))),
                "expected error for {:?}",
                input
            );
        }
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(0), "0.00 B");
        assert_eq!(format_size(1023), "1023.00 B");
        assert_eq!(format_size(1024), "1.00 KB");
        assert_eq!(format_size(1024 * 1024), "1.00 MB");
        assert_eq!(format_size(5 * 1024 * 1024), "5.00 MB");
        assert_eq!(format_size(1024 * 1024 * 1024), "1.00 GB");
        assert_eq!(format_size(1024u64.pow(5)), "1.00 PB");
    }

    #[test]
    fn test_format_email_preview() {
        let email = EmailSummary {
            subject: "Test Email".to_string(),
            from: "test@example.com".to_string(),
            date: "2024-01-15".to_string(),
            size: 1024,
            ..EmailSummary::default()
        };
        let preview = format_email_preview(&email);
        assert!(preview.contains("test@example.com"));
        assert!(preview.contains("Test Email"));
        assert!(preview.contains("2024-01-15"));
        assert!(preview.contains("1.00 KB"));
    }

    #[test]
    fn test_format_email_preview_missing_fields() {
        let preview = format_email_preview(&EmailSummary::default());
        assert!(preview.contains("From: Unknown"));
        assert!(preview.contains("Unknown Date"));
        assert!(preview.contains("No Subject"));
        assert!(preview.contains("0.00 B"));
    }
}
