use chrono::{DateTime, NaiveDate, Utc};

/// Handles the fixed-width `YYYYMMDDHHMMSS` build identifier.
///
/// The format is numeric and fixed width, so plain lexicographic string
/// comparison orders builds chronologically; no parsing is needed for
/// range tracking. Parsing is only used to display a build as a date
/// and to relate Nightly builds to calendar days.
pub struct BuildId;

impl BuildId {
    /// Parse a build id into an instant. Returns `None` for ids that
    /// are too short, non-numeric, or encode an impossible date.
    pub fn to_date(build_id: &str) -> Option<DateTime<Utc>> {
        let digits = build_id.get(..14)?;
        if !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let year: i32 = digits[0..4].parse().ok()?;
        let month: u32 = digits[4..6].parse().ok()?;
        let day: u32 = digits[6..8].parse().ok()?;
        let hour: u32 = digits[8..10].parse().ok()?;
        let minute: u32 = digits[10..12].parse().ok()?;
        let second: u32 = digits[12..14].parse().ok()?;
        Some(
            NaiveDate::from_ymd_opt(year, month, day)?
                .and_hms_opt(hour, minute, second)?
                .and_utc(),
        )
    }

    /// Human-readable date for build-range display, e.g. "Mon Jun 01 2015".
    pub fn display_date(build_id: &str) -> Option<String> {
        Self::to_date(build_id).map(|dt| dt.format("%a %b %d %Y").to_string())
    }
}
