//! Cell-level parsers for the messy inputs real exports contain.
//!
//! The loader normalizes every row through these helpers exactly once, at
//! the ingestion boundary; the metric engine only ever sees clean values.

use chrono::NaiveDate;

// ── Dirty tokens ──────────────────────────────────────────────────────────────

/// Placeholder strings that mean "no value" in real-world exports.
const DIRTY_TOKENS: &[&str] = &[
    "", "nan", "na", "none", "n/a", "?", "??", "-", "###", "ok", "fail", "error", "check",
];

/// Whether a cell is a known junk placeholder rather than data.
pub fn is_dirty_token(raw: &str) -> bool {
    let trimmed = raw.trim().to_lowercase();
    DIRTY_TOKENS.contains(&trimmed.as_str())
}

// ── DateParser ────────────────────────────────────────────────────────────────

/// Parses dates from the variety of formats found in activity exports.
pub struct DateParser;

impl DateParser {
    /// Ordered list of accepted date formats; the first successful parse
    /// wins. Day-first slashed dates are tried before month-first.
    const DATE_FORMATS: &'static [&'static str] = &[
        "%Y-%m-%d",
        "%Y/%m/%d",
        "%d/%m/%Y",
        "%m/%d/%Y",
        "%d-%b-%Y",
        "%b-%d-%Y",
        "%d.%m.%Y",
        "%d-%m-%y",
        "%y-%m-%d",
    ];

    /// Timestamp formats accepted before falling back to date-only parsing.
    const DATETIME_FORMATS: &'static [&'static str] = &[
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S",
    ];

    /// Attempt to parse a raw cell into a [`NaiveDate`].
    ///
    /// Handles RFC 3339 timestamps (the date part is kept), plain
    /// timestamps, and the ordered date-format list. Junk placeholders and
    /// unparsable strings return `None`.
    pub fn parse(raw: &str) -> Option<NaiveDate> {
        let s = raw.trim();
        if is_dirty_token(s) {
            return None;
        }

        if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(s) {
            return Some(dt.date_naive());
        }

        for fmt in Self::DATETIME_FORMATS {
            if let Ok(dt) = chrono::NaiveDateTime::parse_from_str(s, fmt) {
                return Some(dt.date());
            }
        }

        for fmt in Self::DATE_FORMATS {
            if let Ok(date) = NaiveDate::parse_from_str(s, fmt) {
                return Some(date);
            }
        }

        None
    }
}

// ── NumericCleaner ────────────────────────────────────────────────────────────

/// Coerces messy numeric cells (thousands separators, currency symbols,
/// stray quotes) into floats.
pub struct NumericCleaner;

impl NumericCleaner {
    /// Parse a raw cell into a non-negative float.
    ///
    /// Junk placeholders, unparsable strings and negative amounts all yield
    /// `None`; a negative revenue cell is treated as unparseable rather
    /// than silently clamped.
    pub fn parse(raw: &str) -> Option<f64> {
        let s = raw.trim();
        if is_dirty_token(s) {
            return None;
        }

        let cleaned: String = s
            .chars()
            .filter(|c| !matches!(c, ',' | '"' | '$' | '€' | '£') && !c.is_whitespace())
            .collect();

        match cleaned.parse::<f64>() {
            Ok(n) if n >= 0.0 && n.is_finite() => Some(n),
            _ => None,
        }
    }
}

// ── FlagParser ────────────────────────────────────────────────────────────────

/// Coerces boolean-ish cells (conversion flags and the like) into `bool`.
pub struct FlagParser;

impl FlagParser {
    /// Parse a raw cell into a boolean.
    ///
    /// Accepts the usual spellings in either case; anything else, including
    /// junk placeholders, yields `None`.
    pub fn parse(raw: &str) -> Option<bool> {
        match raw.trim().to_lowercase().as_str() {
            "1" | "true" | "yes" | "y" => Some(true),
            "0" | "false" | "no" | "n" => Some(false),
            _ => None,
        }
    }
}

// ── Column resolution ─────────────────────────────────────────────────────────

/// Resolved header indices for the canonical columns.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnMap {
    pub user_id: Option<usize>,
    pub signup_date: Option<usize>,
    pub activity_date: Option<usize>,
    pub plan: Option<usize>,
    pub revenue: Option<usize>,
    pub status: Option<usize>,
    pub converted: Option<usize>,
    pub session_duration: Option<usize>,
    pub sessions_count: Option<usize>,
}

/// Matches raw headers against the canonical columns.
///
/// The alias table is an explicit ordered slice, no reflection. For each
/// canonical column the aliases are tried in order and the leftmost matching
/// header wins; a header claimed by one column is not considered for later
/// ones.
pub struct ColumnResolver;

impl ColumnResolver {
    const USER_ID_ALIASES: &'static [&'static str] =
        &["user_id", "user", "uid", "customer_id", "member_id", "id"];
    const SIGNUP_DATE_ALIASES: &'static [&'static str] = &[
        "signup_date",
        "signup",
        "created_at",
        "registration_date",
        "join_date",
    ];
    const ACTIVITY_DATE_ALIASES: &'static [&'static str] = &[
        "activity_date",
        "last_active",
        "last_activity",
        "activity",
        "event_date",
        "last_seen",
        "date",
    ];
    const PLAN_ALIASES: &'static [&'static str] = &["plan", "tier", "subscription"];
    const REVENUE_ALIASES: &'static [&'static str] = &["revenue", "mrr", "amount", "spend"];
    const STATUS_ALIASES: &'static [&'static str] = &["status", "state"];
    const CONVERTED_ALIASES: &'static [&'static str] = &["converted", "is_converted", "conversion"];
    const SESSION_DURATION_ALIASES: &'static [&'static str] =
        &["session_duration", "avg_session_duration", "duration"];
    const SESSIONS_COUNT_ALIASES: &'static [&'static str] =
        &["sessions_count", "session_count", "sessions", "num_sessions"];

    /// Resolve a raw header row into a [`ColumnMap`].
    ///
    /// Matching is case-insensitive; spaces and dashes in headers are
    /// treated as underscores.
    pub fn resolve(headers: &[String]) -> ColumnMap {
        let normalized: Vec<String> = headers.iter().map(|h| Self::normalize(h)).collect();
        let mut claimed = vec![false; normalized.len()];

        ColumnMap {
            user_id: Self::find(&normalized, &mut claimed, Self::USER_ID_ALIASES),
            signup_date: Self::find(&normalized, &mut claimed, Self::SIGNUP_DATE_ALIASES),
            activity_date: Self::find(&normalized, &mut claimed, Self::ACTIVITY_DATE_ALIASES),
            plan: Self::find(&normalized, &mut claimed, Self::PLAN_ALIASES),
            revenue: Self::find(&normalized, &mut claimed, Self::REVENUE_ALIASES),
            status: Self::find(&normalized, &mut claimed, Self::STATUS_ALIASES),
            converted: Self::find(&normalized, &mut claimed, Self::CONVERTED_ALIASES),
            session_duration: Self::find(&normalized, &mut claimed, Self::SESSION_DURATION_ALIASES),
            sessions_count: Self::find(&normalized, &mut claimed, Self::SESSIONS_COUNT_ALIASES),
        }
    }

    fn normalize(header: &str) -> String {
        header
            .trim()
            .to_lowercase()
            .replace([' ', '-'], "_")
    }

    fn find(headers: &[String], claimed: &mut [bool], aliases: &[&str]) -> Option<usize> {
        for alias in aliases {
            for (idx, header) in headers.iter().enumerate() {
                if !claimed[idx] && header == alias {
                    claimed[idx] = true;
                    return Some(idx);
                }
            }
        }
        None
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
