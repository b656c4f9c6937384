//! Human-readable rendering of access-log entries.

use chrono::NaiveDateTime;

use crate::log_entry::LogEntry;

/// Formats accepted for the tracker's `logTime` field.
const SOURCE_TIME_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S"];

const DISPLAY_TIME_FORMAT: &str = "%d %b %Y, %H:%M";

/// Render a source timestamp for display, falling back to the raw text.
pub fn format_display_time(timestamp: &str) -> String {
    // Offsets and zone suffixes are dropped; the portal reports local time.
    let trimmed = timestamp
        .get(..19)
        .filter(|_| timestamp.len() > 19 && !timestamp[19..].starts_with('.'))
        .unwrap_or(timestamp);

    SOURCE_TIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(trimmed, format).ok())
        .map(|time| time.format(DISPLAY_TIME_FORMAT).to_string())
        .unwrap_or_else(|| timestamp.to_string())
}

/// Notification title for an access entry.
pub fn access_title(entry: &LogEntry) -> String {
    format!("Data access: {}", entry.info_system)
}

/// One-line notification body for an access entry.
pub fn access_summary(entry: &LogEntry) -> String {
    format!("{} • {}", format_display_time(&entry.timestamp), entry.receiver)
}

/// Multi-line notification body listing every field of an entry.
pub fn access_details(entry: &LogEntry) -> String {
    format!(
        "Time: {}\nReceiver: {}\nSystem: {}\nAction: {}",
        format_display_time(&entry.timestamp),
        entry.receiver,
        entry.info_system,
        entry.action
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_plain_timestamp() {
        assert_eq!(format_display_time("2024-05-01T10:07:00"), "01 May 2024, 10:07");
    }

    #[test]
    fn formats_fractional_and_offset_timestamps() {
        assert_eq!(format_display_time("2024-05-01T10:07:00.123"), "01 May 2024, 10:07");
        assert_eq!(format_display_time("2024-05-01T10:07:00+03:00"), "01 May 2024, 10:07");
    }

    #[test]
    fn unparsable_timestamp_is_returned_verbatim() {
        assert_eq!(format_display_time("yesterday"), "yesterday");
        assert_eq!(format_display_time(""), "");
    }

    #[test]
    fn details_include_all_fields() {
        let entry = LogEntry::new("2024-05-01T10:07:00", "Politsei", "rahvastikuregister", "view");
        assert_eq!(access_title(&entry), "Data access: rahvastikuregister");
        assert_eq!(access_summary(&entry), "01 May 2024, 10:07 • Politsei");
        let details = access_details(&entry);
        assert!(details.contains("Receiver: Politsei"));
        assert!(details.contains("Action: view"));
    }
}
