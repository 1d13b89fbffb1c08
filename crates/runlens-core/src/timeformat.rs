use chrono::DateTime;
use chrono::Local;
use chrono::NaiveDateTime;
use chrono::TimeZone;

pub const PLACEHOLDER: &str = "—";

const CLOCK_FORMAT: &str = "%-I:%M:%S %p";

/// Renders an ISO-8601 timestamp as a 12-hour local clock time.
/// Empty input renders as the placeholder; unparsable input is returned as is.
pub fn format_timestamp(raw: Option<&str>) -> String {
    let raw = match raw.map(str::trim) {
        None | Some("") | Some(PLACEHOLDER) => return PLACEHOLDER.to_string(),
        Some(raw) => raw,
    };

    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return parsed.with_timezone(&Local).format(CLOCK_FORMAT).to_string();
    }
    // Offset-less timestamps are taken as local time.
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .and_then(|naive| Local.from_local_datetime(&naive).earliest())
        .map(|local| local.format(CLOCK_FORMAT).to_string())
        .unwrap_or_else(|| raw.to_string())
}
