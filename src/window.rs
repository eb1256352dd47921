/// Report windows.
///
/// Each report type maps to a since-date cutoff: weekly looks back exactly
/// seven days, monthly starts at the first of the current calendar month at
/// midnight in the configured timezone.
use chrono::{DateTime, Datelike, Duration, LocalResult, TimeZone, Utc};
use chrono_tz::Tz;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportType {
    Weekly,
    Monthly,
}

impl ReportType {
    pub fn label(&self) -> &'static str {
        match self {
            ReportType::Weekly => "weekly",
            ReportType::Monthly => "monthly",
        }
    }
}

impl std::fmt::Display for ReportType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Compute the inclusive lower bound of the scan window.
///
/// Messages with a timestamp strictly before the returned instant are
/// outside the window and terminate their surface's scan.
pub fn since_date(report_type: ReportType, now: DateTime<Utc>, tz: Tz) -> DateTime<Utc> {
    match report_type {
        ReportType::Weekly => now - Duration::days(7),
        ReportType::Monthly => {
            let local = now.with_timezone(&tz);
            match tz.with_ymd_and_hms(local.year(), local.month(), 1, 0, 0, 0) {
                LocalResult::Single(dt) | LocalResult::Ambiguous(dt, _) => dt.with_timezone(&Utc),
                // Midnight skipped by a DST transition; fall back to UTC
                // midnight of the same calendar day.
                LocalResult::None => Utc
                    .with_ymd_and_hms(local.year(), local.month(), 1, 0, 0, 0)
                    .unwrap(),
            }
        }
    }
}
