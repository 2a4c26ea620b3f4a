//! Filters shared by every analytics query.

use std::sync::LazyLock;

use chrono::{DateTime, Datelike, Duration, Local, NaiveDate, NaiveTime, TimeZone, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{ClaudioError, Result};
use crate::model::EventCategory;

static LAST_N: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:last|past)\s+(\d+)\s+(minute|hour|day|week|month)s?$")
        .expect("last-n pattern is valid")
});

static N_AGO: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d+)\s+(minute|hour|day|week|month)s?\s+ago$").expect("ago pattern is valid")
});

static LAST_UNIT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:last|past)\s+(minute|hour|day|week|month)$").expect("unit pattern is valid")
});

static SINCE_DATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^since\s+(\d{4}-\d{2}-\d{2})$").expect("since pattern is valid")
});

/// Named calendar windows. Weeks start on Monday.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TimePreset {
    Today,
    Yesterday,
    ThisWeek,
    LastWeek,
    ThisMonth,
    LastMonth,
    #[default]
    AllTime,
}

impl TimePreset {
    pub const ALL: [TimePreset; 7] = [
        Self::Today,
        Self::Yesterday,
        Self::ThisWeek,
        Self::LastWeek,
        Self::ThisMonth,
        Self::LastMonth,
        Self::AllTime,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Today => "today",
            Self::Yesterday => "yesterday",
            Self::ThisWeek => "this-week",
            Self::LastWeek => "last-week",
            Self::ThisMonth => "this-month",
            Self::LastMonth => "last-month",
            Self::AllTime => "all-time",
        }
    }
}

impl std::fmt::Display for TimePreset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TimePreset {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let key = s.trim().to_lowercase().replace([' ', '_'], "-");
        Self::ALL
            .into_iter()
            .find(|p| p.as_str() == key)
            .or(match key.as_str() {
                "all" => Some(Self::AllTime),
                _ => None,
            })
            .ok_or_else(|| format!("unknown time preset: {s}"))
    }
}

/// Which span of `hook_events.timestamp` a query covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimeWindow {
    /// Inclusive on both ends.
    Range {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
    LastDays(u32),
    Preset(TimePreset),
    /// Free text such as `last 3 days` or `since 2025-01-01`.
    Phrase(String),
}

impl Default for TimeWindow {
    fn default() -> Self {
        Self::Preset(TimePreset::AllTime)
    }
}

/// Resolved window as unix seconds: `start <= ts < end`, `None` = unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TimeBounds {
    pub start: Option<i64>,
    pub end: Option<i64>,
}

#[cfg(test)]
impl TimeBounds {
    fn contains(&self, ts: i64) -> bool {
        self.start.map_or(true, |s| ts >= s) && self.end.map_or(true, |e| ts < e)
    }
}

impl TimeWindow {
    /// Resolve against the local clock.
    pub fn resolve(&self) -> Result<TimeBounds> {
        self.resolve_at(Local::now())
    }

    /// Resolve relative to `now`; calendar presets use `now`'s timezone.
    pub fn resolve_at<Tz: TimeZone>(&self, now: DateTime<Tz>) -> Result<TimeBounds> {
        match self {
            Self::Range { start, end } => {
                if end < start {
                    return Err(ClaudioError::InvalidInput(format!(
                        "time range ends before it starts: {start} > {end}"
                    )));
                }
                Ok(TimeBounds {
                    start: Some(start.timestamp()),
                    end: Some(end.timestamp() + 1),
                })
            }
            Self::LastDays(days) => {
                // Windows reaching past the representable range are unbounded.
                let start = now
                    .checked_sub_signed(Duration::days(i64::from(*days)))
                    .map(|dt| dt.timestamp());
                Ok(TimeBounds { start, end: None })
            }
            Self::Preset(preset) => Ok(resolve_preset(*preset, &now)),
            Self::Phrase(text) => parse_phrase(text, &now),
        }
    }
}

fn start_of_day<Tz: TimeZone>(day: NaiveDate, tz: &Tz) -> i64 {
    let naive = day.and_time(NaiveTime::MIN);
    tz.from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.timestamp())
        .unwrap_or_else(|| naive.and_utc().timestamp())
}

fn first_of_month(day: NaiveDate) -> NaiveDate {
    day.with_day(1).unwrap_or(day)
}

fn previous_month_start(day: NaiveDate) -> NaiveDate {
    let first = first_of_month(day);
    let last_of_prev = first.pred_opt().unwrap_or(first);
    first_of_month(last_of_prev)
}

fn resolve_preset<Tz: TimeZone>(preset: TimePreset, now: &DateTime<Tz>) -> TimeBounds {
    let tz = now.timezone();
    let today = now.date_naive();
    let week_start = today - Duration::days(i64::from(today.weekday().num_days_from_monday()));
    let month_start = first_of_month(today);

    let (start, end) = match preset {
        TimePreset::Today => (Some(start_of_day(today, &tz)), None),
        TimePreset::Yesterday => (
            Some(start_of_day(today - Duration::days(1), &tz)),
            Some(start_of_day(today, &tz)),
        ),
        TimePreset::ThisWeek => (Some(start_of_day(week_start, &tz)), None),
        TimePreset::LastWeek => (
            Some(start_of_day(week_start - Duration::days(7), &tz)),
            Some(start_of_day(week_start, &tz)),
        ),
        TimePreset::ThisMonth => (Some(start_of_day(month_start, &tz)), None),
        TimePreset::LastMonth => (
            Some(start_of_day(previous_month_start(today), &tz)),
            Some(start_of_day(month_start, &tz)),
        ),
        TimePreset::AllTime => (None, None),
    };
    TimeBounds { start, end }
}

/// `None` when the span does not fit a `Duration`.
fn unit_duration(unit: &str, n: i64) -> Option<Duration> {
    match unit {
        "minute" => Duration::try_minutes(n),
        "hour" => Duration::try_hours(n),
        "week" => Duration::try_weeks(n),
        "month" => n.checked_mul(30).and_then(Duration::try_days),
        _ => Duration::try_days(n),
    }
}

/// Parse a natural-language window like `past 2 weeks` or `3 days ago`.
fn parse_phrase<Tz: TimeZone>(text: &str, now: &DateTime<Tz>) -> Result<TimeBounds> {
    let phrase = text.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase();

    if let Ok(preset) = phrase.parse::<TimePreset>() {
        return Ok(resolve_preset(preset, now));
    }

    let since = |d: Option<Duration>| {
        d.and_then(|d| now.clone().checked_sub_signed(d))
            .map(|start| TimeBounds {
                start: Some(start.timestamp()),
                end: None,
            })
            .ok_or_else(|| ClaudioError::InvalidInput(format!("window too large in '{text}'")))
    };

    if let Some(caps) = LAST_N.captures(&phrase).or_else(|| N_AGO.captures(&phrase)) {
        let n: i64 = caps[1]
            .parse()
            .map_err(|_| ClaudioError::InvalidInput(format!("number too large in '{text}'")))?;
        return since(unit_duration(&caps[2], n));
    }

    if let Some(caps) = LAST_UNIT.captures(&phrase) {
        return since(unit_duration(&caps[1], 1));
    }

    if let Some(caps) = SINCE_DATE.captures(&phrase) {
        let day = NaiveDate::parse_from_str(&caps[1], "%Y-%m-%d")
            .map_err(|e| ClaudioError::InvalidInput(format!("bad date in '{text}': {e}")))?;
        return Ok(TimeBounds {
            start: Some(start_of_day(day, &now.timezone())),
            end: None,
        });
    }

    if let Some(rest) = phrase.strip_prefix("since ") {
        if let Ok(preset @ (TimePreset::Today | TimePreset::Yesterday)) = rest.parse() {
            return Ok(TimeBounds {
                start: resolve_preset(preset, now).start,
                end: None,
            });
        }
    }

    Err(ClaudioError::InvalidInput(format!(
        "unrecognised time phrase: '{text}'"
    )))
}

/// Sort key for grouped analytics rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OrderBy {
    #[default]
    Count,
    Recent,
    Name,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Desc,
    Asc,
}

impl SortOrder {
    pub fn sql(&self) -> &'static str {
        match self {
            Self::Desc => "DESC",
            Self::Asc => "ASC",
        }
    }
}

/// Common filter for analytics queries.
#[derive(Debug, Clone, Default)]
pub struct AnalyticsFilter {
    pub window: TimeWindow,
    pub tool: Option<String>,
    pub category: Option<EventCategory>,
    pub soundpack: Option<String>,
    pub session: Option<String>,
    pub limit: Option<usize>,
    pub offset: usize,
    pub order_by: OrderBy,
    pub order: SortOrder,
}

impl AnalyticsFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_window(mut self, window: TimeWindow) -> Self {
        self.window = window;
        self
    }

    pub fn with_tool(mut self, tool: impl Into<String>) -> Self {
        self.tool = Some(tool.into());
        self
    }

    pub fn with_category(mut self, category: EventCategory) -> Self {
        self.category = Some(category);
        self
    }

    pub fn with_soundpack(mut self, soundpack: impl Into<String>) -> Self {
        self.soundpack = Some(soundpack.into());
        self
    }

    pub fn with_session(mut self, session: impl Into<String>) -> Self {
        self.session = Some(session.into());
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    pub fn with_order(mut self, order_by: OrderBy, order: SortOrder) -> Self {
        self.order_by = order_by;
        self.order = order;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Wednesday 2025-03-12 15:30:00 UTC
    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 12, 15, 30, 0).unwrap()
    }

    fn ts(y: i32, m: u32, d: u32) -> i64 {
        Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap().timestamp()
    }

    fn preset(p: TimePreset) -> TimeBounds {
        TimeWindow::Preset(p).resolve_at(now()).unwrap()
    }

    #[test]
    fn test_preset_today_and_yesterday() {
        assert_eq!(preset(TimePreset::Today).start, Some(ts(2025, 3, 12)));
        assert_eq!(preset(TimePreset::Today).end, None);
        let y = preset(TimePreset::Yesterday);
        assert_eq!((y.start, y.end), (Some(ts(2025, 3, 11)), Some(ts(2025, 3, 12))));
    }

    #[test]
    fn test_preset_weeks_start_monday() {
        assert_eq!(preset(TimePreset::ThisWeek).start, Some(ts(2025, 3, 10)));
        let lw = preset(TimePreset::LastWeek);
        assert_eq!((lw.start, lw.end), (Some(ts(2025, 3, 3)), Some(ts(2025, 3, 10))));
    }

    #[test]
    fn test_preset_months() {
        assert_eq!(preset(TimePreset::ThisMonth).start, Some(ts(2025, 3, 1)));
        let lm = preset(TimePreset::LastMonth);
        assert_eq!((lm.start, lm.end), (Some(ts(2025, 2, 1)), Some(ts(2025, 3, 1))));
    }

    #[test]
    fn test_last_month_across_year_boundary() {
        let jan = Utc.with_ymd_and_hms(2025, 1, 15, 8, 0, 0).unwrap();
        let lm = TimeWindow::Preset(TimePreset::LastMonth).resolve_at(jan).unwrap();
        assert_eq!((lm.start, lm.end), (Some(ts(2024, 12, 1)), Some(ts(2025, 1, 1))));
    }

    #[test]
    fn test_all_time_unbounded() {
        assert_eq!(preset(TimePreset::AllTime), TimeBounds::default());
        assert_eq!(TimeWindow::default(), TimeWindow::Preset(TimePreset::AllTime));
    }

    #[test]
    fn test_last_days() {
        let b = TimeWindow::LastDays(7).resolve_at(now()).unwrap();
        assert_eq!(b.start, Some(now().timestamp() - 7 * 86_400));
        assert!(b.contains(now().timestamp()));
    }

    #[test]
    fn test_range_inclusive() {
        let start = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2025, 1, 2, 0, 0, 0).unwrap();
        let b = TimeWindow::Range { start, end }.resolve_at(now()).unwrap();
        assert!(b.contains(end.timestamp()));
        assert!(!b.contains(end.timestamp() + 1));
        assert!(TimeWindow::Range { start: end, end: start }
            .resolve_at(now())
            .is_err());
    }

    #[test]
    fn test_preset_from_str() {
        assert_eq!("this week".parse(), Ok(TimePreset::ThisWeek));
        assert_eq!("Last_Month".parse(), Ok(TimePreset::LastMonth));
        assert_eq!("all".parse(), Ok(TimePreset::AllTime));
        assert!("fortnight".parse::<TimePreset>().is_err());
    }

    #[test]
    fn test_phrases() {
        let phrase = |s: &str| TimeWindow::Phrase(s.into()).resolve_at(now()).unwrap();
        let n = now().timestamp();

        assert_eq!(phrase("last 3 days").start, Some(n - 3 * 86_400));
        assert_eq!(phrase("Past  2 hours").start, Some(n - 2 * 3_600));
        assert_eq!(phrase("10 minutes ago").start, Some(n - 600));
        assert_eq!(phrase("past week").start, Some(n - 7 * 86_400));
        assert_eq!(phrase("last 1 month").start, Some(n - 30 * 86_400));
        assert_eq!(phrase("yesterday"), preset(TimePreset::Yesterday));
        assert_eq!(phrase("last week"), preset(TimePreset::LastWeek));
        assert_eq!(phrase("since 2025-03-01").start, Some(ts(2025, 3, 1)));
        assert_eq!(phrase("since yesterday").start, Some(ts(2025, 3, 11)));
        assert_eq!(phrase("since yesterday").end, None);
    }

    #[test]
    fn test_bad_phrases() {
        for text in ["whenever", "since 2025-13-45", "last -3 days", ""] {
            assert!(
                TimeWindow::Phrase(text.into()).resolve_at(now()).is_err(),
                "{text:?}"
            );
        }
        let huge = TimeWindow::Phrase("last 9999999999999 weeks".into()).resolve_at(now());
        assert!(matches!(huge, Err(ClaudioError::InvalidInput(_))));
    }

    #[test]
    fn test_last_days_beyond_calendar_is_unbounded() {
        let b = TimeWindow::LastDays(u32::MAX).resolve_at(now()).unwrap();
        assert_eq!(b.start, None);
    }

    #[test]
    fn test_filter_builder() {
        let f = AnalyticsFilter::new()
            .with_tool("git")
            .with_category(EventCategory::Loading)
            .with_session("s1")
            .with_soundpack("retro")
            .with_limit(5)
            .with_offset(10)
            .with_order(OrderBy::Recent, SortOrder::Asc);
        assert_eq!(f.tool.as_deref(), Some("git"));
        assert_eq!(f.limit, Some(5));
        assert_eq!(f.offset, 10);
        assert_eq!(f.order.sql(), "ASC");
    }
}
