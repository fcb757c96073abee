// Timestamp normalization for the deal boards.
//
// Every board renders posting times differently: full datetimes, Korean
// relative phrases ("5분 전"), bare clock times, dotted or slashed dates.
// This module folds all of them into one KST-qualified absolute time.
//
// The reference "now" is always passed in by the caller instead of being read
// from the system clock, so relative and day-only formats resolve the same
// way under test as in production.

use chrono::{
    DateTime, Datelike, Duration, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, TimeZone,
};
use once_cell::sync::Lazy;
use regex::Regex;

const KST_OFFSET_SECS: i32 = 9 * 3600;
const CANONICAL_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// The fixed board timezone (UTC+9). All normalized timestamps carry it.
pub fn kst() -> FixedOffset {
    FixedOffset::east_opt(KST_OFFSET_SECS).expect("UTC+9 is a valid offset")
}

/// Input matched none of the recognized timestamp shapes, or matched one but
/// the residual date/number conversion was invalid (day 32, bad digits).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unrecognized timestamp: {input:?}")]
pub struct ParseFailure {
    pub input: String,
}

impl ParseFailure {
    fn new(input: &str) -> Self {
        Self {
            input: input.to_string(),
        }
    }
}

static MINUTES_AGO: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d+)\s*분\s*전").unwrap());
static HOURS_AGO: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d+)\s*시간\s*전").unwrap());
static DAYS_AGO: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d+)\s*일\s*전").unwrap());

/// Parses an arbitrary board timestamp into an absolute KST time.
///
/// Format families are tried in a fixed priority order, most specific first,
/// so a string matching several shapes resolves deterministically:
///
/// 1. exact `YYYY-MM-DD HH:MM:SS`
/// 2. relative phrases (`방금`/`초`, `N분 전`, `N시간 전`, `N일 전`)
/// 3. ISO-8601 (embedded zone honored; naive values get KST)
/// 4. `YYYY-MM-DD HH:MM[:SS]`
/// 5. `MM-DD HH:MM` (year taken from `now`, never rolled back)
/// 6. bare `HH:MM[:SS]` (today; yesterday when the result would be in the future)
/// 7. `YYYY.MM.DD` / `YY.MM.DD`
/// 8. `YYYY/MM/DD`
///
/// Never panics and never returns a foreign error type; anything that does
/// not parse cleanly comes back as [`ParseFailure`].
pub fn normalize(
    text: &str,
    now: DateTime<FixedOffset>,
) -> Result<DateTime<FixedOffset>, ParseFailure> {
    let zone = kst();
    let now = now.with_timezone(&zone);
    let text = text.trim();
    if text.is_empty() {
        return Err(ParseFailure::new(text));
    }

    // 1. The canonical board format, e.g. "2025-10-23 22:36:00".
    if text.len() == 19 && text.as_bytes()[10] == b' ' {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, CANONICAL_FORMAT) {
            return attach_zone(naive, zone, text);
        }
    }

    // 2. Relative phrases. "방금"/"초" both mean "effectively now".
    if text.contains("방금") || text.contains("초") {
        return Ok(now);
    }
    if let Some(caps) = MINUTES_AGO.captures(text) {
        return rewind(now, &caps[1], Duration::try_minutes, text);
    }
    if let Some(caps) = HOURS_AGO.captures(text) {
        return rewind(now, &caps[1], Duration::try_hours, text);
    }
    if let Some(caps) = DAYS_AGO.captures(text) {
        return rewind(now, &caps[1], Duration::try_days, text);
    }

    // 3. ISO-8601. A trailing Z is rewritten as an explicit UTC offset; a
    // value without any offset is assumed to be board-local (KST).
    if text.contains('T') {
        let fixed = match text.strip_suffix('Z') {
            Some(head) => format!("{head}+00:00"),
            None => text.to_string(),
        };
        if let Ok(parsed) = DateTime::parse_from_rfc3339(&fixed) {
            return Ok(parsed);
        }
        for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
            if let Ok(naive) = NaiveDateTime::parse_from_str(&fixed, format) {
                return attach_zone(naive, zone, text);
            }
        }
        return Err(ParseFailure::new(text));
    }

    // 4/5. Dash-separated date with a clock component.
    if text.contains('-') && text.contains(':') {
        for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"] {
            if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
                return attach_zone(naive, zone, text);
            }
        }
        // "MM-DD HH:MM": boards drop the year on same-year postings. The
        // current year is assumed even if that lands in the future.
        let with_year = format!("{}-{}", now.year(), text);
        if let Ok(naive) = NaiveDateTime::parse_from_str(&with_year, "%Y-%m-%d %H:%M") {
            return attach_zone(naive, zone, text);
        }
        return Err(ParseFailure::new(text));
    }

    // 6. Bare clock time, assumed today. A result after `now` means the
    // posting went up just before midnight and we crawled just after, so it
    // rolls back one day.
    if text.contains(':') && !text.contains('.') && !text.contains('/') {
        let time = NaiveTime::parse_from_str(text, "%H:%M:%S")
            .or_else(|_| NaiveTime::parse_from_str(text, "%H:%M"))
            .map_err(|_| ParseFailure::new(text))?;
        let candidate = attach_zone(now.date_naive().and_time(time), zone, text)?;
        if candidate > now {
            return candidate
                .checked_sub_signed(Duration::days(1))
                .ok_or_else(|| ParseFailure::new(text));
        }
        return Ok(candidate);
    }

    // 7. Dotted date, exactly three groups ("2025.10.23" or "25.10.23").
    if text.split('.').count() == 3 {
        for format in ["%Y.%m.%d", "%y.%m.%d"] {
            if let Ok(date) = NaiveDate::parse_from_str(text, format) {
                return attach_zone(date.and_time(NaiveTime::MIN), zone, text);
            }
        }
        return Err(ParseFailure::new(text));
    }

    // 8. Slash-separated date.
    if text.contains('/') {
        if let Ok(date) = NaiveDate::parse_from_str(text, "%Y/%m/%d") {
            return attach_zone(date.and_time(NaiveTime::MIN), zone, text);
        }
        return Err(ParseFailure::new(text));
    }

    Err(ParseFailure::new(text))
}

/// Renders an absolute time in the canonical exchange format,
/// `YYYY-MM-DD HH:MM:SS` in KST with the zone suffix stripped. Downstream
/// consumers treat the zone as implied.
pub fn to_canonical_string(t: &DateTime<FixedOffset>) -> String {
    t.with_timezone(&kst()).format(CANONICAL_FORMAT).to_string()
}

fn attach_zone(
    naive: NaiveDateTime,
    zone: FixedOffset,
    original: &str,
) -> Result<DateTime<FixedOffset>, ParseFailure> {
    zone.from_local_datetime(&naive)
        .single()
        .ok_or_else(|| ParseFailure::new(original))
}

fn rewind(
    now: DateTime<FixedOffset>,
    digits: &str,
    unit: fn(i64) -> Option<Duration>,
    original: &str,
) -> Result<DateTime<FixedOffset>, ParseFailure> {
    let n: i64 = digits.parse().map_err(|_| ParseFailure::new(original))?;
    unit(n)
        .and_then(|delta| now.checked_sub_signed(delta))
        .ok_or_else(|| ParseFailure::new(original))
}

/// Serde adapter rendering `DateTime<FixedOffset>` through the canonical
/// string format, for fields crossing the ingestion API boundary.
pub mod canonical {
    use super::{CANONICAL_FORMAT, kst};
    use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(t: &DateTime<FixedOffset>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&super::to_canonical_string(t))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<FixedOffset>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let text = String::deserialize(deserializer)?;
        let naive = NaiveDateTime::parse_from_str(&text, CANONICAL_FORMAT)
            .map_err(serde::de::Error::custom)?;
        kst()
            .from_local_datetime(&naive)
            .single()
            .ok_or_else(|| serde::de::Error::custom("ambiguous local timestamp"))
    }
}
