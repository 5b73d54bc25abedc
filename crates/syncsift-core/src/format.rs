//! Human-readable formatting shared by reports and descriptions.

use std::time::Duration;

/// Format a byte count with binary units (e.g. "1.50 MiB").
pub fn format_size(bytes: u64) -> String {
    humansize::format_size(bytes, humansize::BINARY)
}

/// Format a duration as a coarse age.
pub fn format_age(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs < 60 {
        format!("{secs} seconds")
    } else if secs < 3600 {
        format!("{} minutes", secs / 60)
    } else if secs < 86400 {
        format!("{} hours", secs / 3600)
    } else if secs < 2_592_000 {
        format!("{} days", secs / 86400)
    } else if secs < 31_536_000 {
        format!("{} months", secs / 2_592_000)
    } else {
        format!("{:.1} years", secs as f64 / 31_536_000.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(0), "0 B");
        assert!(format_size(1024).ends_with("KiB"));
        let mib = format_size(1536 * 1024);
        assert!(mib.starts_with("1.5") && mib.ends_with("MiB"));
    }

    #[test]
    fn test_format_age() {
        assert_eq!(format_age(Duration::from_secs(30)), "30 seconds");
        assert_eq!(format_age(Duration::from_secs(7200)), "2 hours");
        assert_eq!(format_age(Duration::from_secs(172_800)), "2 days");
    }
}
