use chrono::{DateTime, TimeZone};

/// Formats seconds as `HH:MM:SS`. Hours are not wrapped, so a full day shows as `24:00:00`.
pub fn format_hms(seconds: u64) -> String {
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;
    format!("{hours:02}:{minutes:02}:{secs:02}")
}

/// Whether two moments fall on the same calendar day of `now`'s timezone.
pub fn same_day<Tz: TimeZone, Other: TimeZone>(moment: &DateTime<Other>, now: &DateTime<Tz>) -> bool {
    moment.with_timezone(&now.timezone()).date_naive() == now.date_naive()
}
