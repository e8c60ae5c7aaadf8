//! Parsing and formatting of human-readable byte sizes.

use thiserror::Error;

/// Error parsing a size string.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid size '{input}', expected format like '2GB', '500MB' or '1024KB'")]
pub struct SizeParseError {
    input: String,
}

impl SizeParseError {
    fn new(input: impl Into<String>) -> Self {
        Self {
            input: input.into(),
        }
    }
}

/// Parse a size like "2GB", "500MB", "1024KB" or a plain byte count.
///
/// Units are case-insensitive and decimal ("KB" = 1000) with binary
/// variants ("KiB" = 1024).
pub fn parse_size(value: &str) -> Result<u64, SizeParseError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(SizeParseError::new(value));
    }

    let lower = value.to_lowercase();
    let (number, multiplier): (&str, u64) = if let Some(n) = lower.strip_suffix("kib") {
        (n, 1024)
    } else if let Some(n) = lower.strip_suffix("mib") {
        (n, 1024 * 1024)
    } else if let Some(n) = lower.strip_suffix("gib") {
        (n, 1024 * 1024 * 1024)
    } else if let Some(n) = lower.strip_suffix("kb") {
        (n, 1000)
    } else if let Some(n) = lower.strip_suffix("mb") {
        (n, 1_000_000)
    } else if let Some(n) = lower.strip_suffix("gb") {
        (n, 1_000_000_000)
    } else if let Some(n) = lower.strip_suffix('b') {
        (n, 1)
    } else {
        (lower.as_str(), 1)
    };

    let number: u64 = number
        .trim()
        .parse()
        .map_err(|_| SizeParseError::new(value))?;
    number
        .checked_mul(multiplier)
        .ok_or_else(|| SizeParseError::new(value))
}

/// Render a byte count with the largest fitting decimal unit.
pub fn format_size(bytes: u64) -> String {
    if bytes >= 1_000_000_000 && bytes % 1_000_000_000 == 0 {
        format!("{}GB", bytes / 1_000_000_000)
    } else if bytes >= 1_000_000 && bytes % 1_000_000 == 0 {
        format!("{}MB", bytes / 1_000_000)
    } else if bytes >= 1000 && bytes % 1000 == 0 {
        format!("{}KB", bytes / 1000)
    } else {
        format!("{bytes}B")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_decimal_units() {
        assert_eq!(parse_size("2GB").unwrap(), 2_000_000_000);
        assert_eq!(parse_size("500MB").unwrap(), 500_000_000);
        assert_eq!(parse_size("1024KB").unwrap(), 1_024_000);
    }

    #[test]
    fn parses_binary_units() {
        assert_eq!(parse_size("1GiB").unwrap(), 1024 * 1024 * 1024);
        assert_eq!(parse_size("2MiB").unwrap(), 2 * 1024 * 1024);
    }

    #[test]
    fn parses_plain_bytes() {
        assert_eq!(parse_size("12345").unwrap(), 12345);
        assert_eq!(parse_size("64B").unwrap(), 64);
    }

    #[test]
    fn accepts_whitespace_and_case() {
        assert_eq!(parse_size(" 2 gb ").unwrap(), 2_000_000_000);
        assert_eq!(parse_size("100mb").unwrap(), 100_000_000);
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_size("").is_err());
        assert!(parse_size("lots").is_err());
        assert!(parse_size("-5MB").is_err());
        assert!(parse_size("1.5GB").is_err());
    }

    #[test]
    fn rejects_overflow() {
        assert!(parse_size("99999999999GB").is_err());
    }

    #[test]
    fn error_carries_the_input() {
        let err = parse_size("plenty").unwrap_err();
        assert_eq!(err, SizeParseError::new("plenty"));
        assert!(err.to_string().contains("'plenty'"));
    }

    #[test]
    fn format_picks_largest_exact_unit() {
        assert_eq!(format_size(2_000_000_000), "2GB");
        assert_eq!(format_size(500_000_000), "500MB");
        assert_eq!(format_size(64_000), "64KB");
        assert_eq!(format_size(1500), "1500B");
    }

    #[test]
    fn parse_format_roundtrip() {
        for size in ["2GB", "500MB", "64KB", "123B"] {
            assert_eq!(format_size(parse_size(size).unwrap()), size);
        }
    }
}
