//! Relative and partial Chinese timestamp resolution
//!
//! Listing cards show times such as `3分钟前`, `今天 09:15`, `4月9日 19:32`
//! or `2024年12月3日 10:00`. [`TimeResolver`] turns them into absolute
//! timestamps anchored to a reference "now" by trying an ordered list of
//! pure matchers; the first one that yields a value wins.
//!
//! Results are precise to the minute: seconds are always zero except when an
//! absolute input spells them out.

use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta, Timelike};
use regex::{Captures, Regex};
use std::sync::OnceLock;

/// Verdict of a single rule on one input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Match {
    /// The input is not in this rule's shape; try the next rule
    Skip,
    /// The rule produced a timestamp
    Resolved(NaiveDateTime),
    /// The input has this rule's shape but out-of-range values
    Invalid,
}

impl Match {
    fn settle(value: Option<NaiveDateTime>) -> Self {
        value.map_or(Self::Invalid, Self::Resolved)
    }
}

/// A single resolution rule
pub type Matcher = fn(&str, NaiveDateTime) -> Match;

/// Default rules, in priority order
pub const DEFAULT_MATCHERS: &[(&str, Matcher)] = &[
    ("just_now", just_now),
    ("minutes_ago", minutes_ago),
    ("hours_ago", hours_ago),
    ("composed", composed),
    ("full_date", full_date),
    ("split_tokens", split_tokens),
];

/// Ordered matcher list resolving listing time strings
///
/// The first rule that recognizes the input decides the result, including
/// when it rejects the values it found.
#[derive(Debug, Clone, Copy)]
pub struct TimeResolver {
    matchers: &'static [(&'static str, Matcher)],
}

impl TimeResolver {
    #[must_use]
    pub fn new() -> Self {
        Self {
            matchers: DEFAULT_MATCHERS,
        }
    }

    /// Resolve `raw` against `now`
    ///
    /// Never fails: an input no rule understands, or one a rule rejects,
    /// yields `None` and a warning.
    pub fn resolve(&self, raw: &str, now: NaiveDateTime) -> Option<NaiveDateTime> {
        let input = raw.trim();

        for (name, matcher) in self.matchers {
            match matcher(input, now) {
                Match::Skip => continue,
                Match::Resolved(resolved) => {
                    tracing::trace!(raw = %input, matcher = name, %resolved, "Resolved time");
                    return Some(resolved);
                }
                Match::Invalid => {
                    tracing::warn!(raw = %input, matcher = name, "Time string has out-of-range values");
                    return None;
                }
            }
        }

        tracing::warn!(raw = %input, "Failed to resolve time string");
        None
    }
}

impl Default for TimeResolver {
    fn default() -> Self {
        Self::new()
    }
}

/// Resolve with the default rules
pub fn resolve(raw: &str, now: NaiveDateTime) -> Option<NaiveDateTime> {
    TimeResolver::new().resolve(raw, now)
}

fn regex(cell: &'static OnceLock<Regex>, pattern: &str) -> &'static Regex {
    cell.get_or_init(|| Regex::new(pattern).expect("Invalid regex pattern"))
}

fn truncate_to_minute(t: NaiveDateTime) -> NaiveDateTime {
    t.with_second(0)
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(t)
}

/// `刚刚` ("just now")
pub fn just_now(input: &str, now: NaiveDateTime) -> Match {
    if input == "刚刚" {
        Match::Resolved(truncate_to_minute(now))
    } else {
        Match::Skip
    }
}

/// `<N>分钟前` ("N minutes ago")
pub fn minutes_ago(input: &str, now: NaiveDateTime) -> Match {
    static RE: OnceLock<Regex> = OnceLock::new();
    let Some(caps) = regex(&RE, r"^(\d+)\s*分钟前$").captures(input) else {
        return Match::Skip;
    };
    Match::settle(ago(&caps[1], now, TimeDelta::try_minutes))
}

/// `<N>小时前` ("N hours ago")
pub fn hours_ago(input: &str, now: NaiveDateTime) -> Match {
    static RE: OnceLock<Regex> = OnceLock::new();
    let Some(caps) = regex(&RE, r"^(\d+)\s*小时前$").captures(input) else {
        return Match::Skip;
    };
    Match::settle(ago(&caps[1], now, TimeDelta::try_hours))
}

fn ago(count: &str, now: NaiveDateTime, unit: fn(i64) -> Option<TimeDelta>) -> Option<NaiveDateTime> {
    let n: i64 = count.parse().ok()?;
    now.checked_sub_signed(unit(n)?).map(truncate_to_minute)
}

/// `(今天|昨天)?(M月D日)?\s*(H:MM)?`
///
/// With neither a day marker nor a month/day the leading token must already
/// be an absolute `YYYY-MM-DD` date.
pub fn composed(input: &str, now: NaiveDateTime) -> Match {
    static RE: OnceLock<Regex> = OnceLock::new();
    let Some(caps) = regex(
        &RE,
        r"^(今天|昨天)?(?:(\d{1,2})月(\d{1,2})日)?\s*(?:(\d{1,2}):(\d{2}))?$",
    )
    .captures(input) else {
        return Match::Skip;
    };

    Match::settle(compose(&caps, input, now))
}

fn compose(caps: &Captures<'_>, input: &str, now: NaiveDateTime) -> Option<NaiveDateTime> {
    let date = match (caps.get(1), caps.get(2), caps.get(3)) {
        (Some(marker), _, _) => relative_day(marker.as_str(), now)?,
        (None, Some(month), Some(day)) => {
            month_day(month.as_str().parse().ok()?, day.as_str().parse().ok()?, now)?
        }
        _ => absolute_date(input.split_whitespace().next()?)?,
    };

    Some(date.and_time(hour_minute(caps, 4)?))
}

/// `YYYY年M月D日 [H:MM]`
pub fn full_date(input: &str, _now: NaiveDateTime) -> Match {
    static RE: OnceLock<Regex> = OnceLock::new();
    let Some(caps) = regex(
        &RE,
        r"^(\d{4})年(\d{1,2})月(\d{1,2})日\s*(?:(\d{1,2}):(\d{2}))?$",
    )
    .captures(input) else {
        return Match::Skip;
    };

    let resolved = (|| {
        let date = NaiveDate::from_ymd_opt(
            caps[1].parse().ok()?,
            caps[2].parse().ok()?,
            caps[3].parse().ok()?,
        )?;
        Some(date.and_time(hour_minute(&caps, 4)?))
    })();

    Match::settle(resolved)
}

/// Optional `H:MM` in capture groups `first` and `first + 1`; midnight when absent
fn hour_minute(caps: &Captures<'_>, first: usize) -> Option<NaiveTime> {
    match (caps.get(first), caps.get(first + 1)) {
        (Some(h), Some(m)) => {
            NaiveTime::from_hms_opt(h.as_str().parse().ok()?, m.as_str().parse().ok()?, 0)
        }
        _ => Some(NaiveTime::MIN),
    }
}

/// Whitespace split into a date token and a time token (default `00:00`)
pub fn split_tokens(input: &str, now: NaiveDateTime) -> Match {
    let mut tokens = input.split_whitespace();
    let Some(date_token) = tokens.next() else {
        return Match::Skip;
    };
    let time_token = tokens.next().unwrap_or("00:00");

    Match::settle(split_date(date_token, now).zip(clock(time_token)).map(|(d, t)| d.and_time(t)))
}

fn split_date(token: &str, now: NaiveDateTime) -> Option<NaiveDate> {
    if let Some((month, rest)) = token.split_once('月') {
        let day = rest.strip_suffix('日').unwrap_or(rest).replace('日', "");
        month_day(month.parse().ok()?, day.parse().ok()?, now)
    } else if token.contains("今天") {
        relative_day("今天", now)
    } else if token.contains("昨天") {
        relative_day("昨天", now)
    } else {
        absolute_date(token)
    }
}

fn relative_day(marker: &str, now: NaiveDateTime) -> Option<NaiveDate> {
    match marker {
        "今天" => Some(now.date()),
        "昨天" => now.date().pred_opt(),
        _ => None,
    }
}

fn month_day(month: u32, day: u32, now: NaiveDateTime) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(now.year(), month, day)
}

fn absolute_date(token: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(token, "%Y-%m-%d").ok()
}

/// `H:MM` or `H:MM:SS`
fn clock(token: &str) -> Option<NaiveTime> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let caps = regex(&RE, r"^(\d{1,2}):(\d{2})(?::(\d{2}))?$").captures(token)?;
    let second = match caps.get(3) {
        Some(s) => s.as_str().parse().ok()?,
        None => 0,
    };
    NaiveTime::from_hms_opt(caps[1].parse().ok()?, caps[2].parse().ok()?, second)
}
