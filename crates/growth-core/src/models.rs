use chrono::{Datelike, Duration, NaiveDate, Weekday};
use serde::Serialize;
use std::collections::BTreeMap;

// ── UserStatus ────────────────────────────────────────────────────────────────

/// Normalized lifecycle state carried by an optional `status` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserStatus {
    Active,
    Churned,
    Inactive,
}

impl UserStatus {
    /// Normalize a raw status cell into one of the three canonical states.
    ///
    /// `"active"`, `"activated"` and
    /// `"current"` map to [`UserStatus::Active`]; `"churned"`, `"cancelled"`,
    /// `"canceled"` and `"lost"` map to [`UserStatus::Churned`]; anything
    /// else (including the empty string) is [`UserStatus::Inactive`].
    pub fn from_raw(raw: &str) -> UserStatus {
        match raw.trim().to_lowercase().as_str() {
            "active" | "activated" | "current" => UserStatus::Active,
            "churned" | "cancelled" | "canceled" | "lost" => UserStatus::Churned,
            _ => UserStatus::Inactive,
        }
    }
}

// ── Record ────────────────────────────────────────────────────────────────────

/// One normalized row of the uploaded activity export.
///
/// Invariant (enforced by the loader): `user_id` is non-empty and at least
/// one of `signup_date` / `activity_date` is present. Records are never
/// serialized; only derived metrics leave the process.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    /// Unique user key within the file.
    pub user_id: String,
    /// Date the user signed up, when the column resolved and parsed.
    pub signup_date: Option<NaiveDate>,
    /// Date of one activity event; a user may have many records.
    pub activity_date: Option<NaiveDate>,
    /// Optional plan / tier name, passed through untouched.
    pub plan: Option<String>,
    /// Optional revenue amount attributed to this row.
    pub revenue: Option<f64>,
    /// Optional normalized lifecycle status.
    pub status: Option<UserStatus>,
    /// Optional conversion flag (trial-to-paid or similar).
    pub converted: Option<bool>,
    /// Optional session duration in minutes.
    pub session_duration: Option<f64>,
    /// Optional number of sessions attributed to this row.
    pub sessions_count: Option<f64>,
}

// ── Period ────────────────────────────────────────────────────────────────────

/// A weekly bucket, identified by the Monday starting its ISO week.
///
/// All metric bucketing is weekly; the ordering of `Period` values is the
/// ordering of their start dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Period(NaiveDate);

impl Period {
    /// Bucket a date into its ISO week (weeks start on Monday).
    pub fn from_date(date: NaiveDate) -> Period {
        Period(date.week(Weekday::Mon).first_day())
    }

    /// The Monday this period starts on.
    pub fn start(&self) -> NaiveDate {
        self.0
    }

    /// The following week.
    pub fn next(&self) -> Period {
        Period(self.0 + Duration::days(7))
    }

    /// ISO week label, e.g. `"2024-W05"`.
    pub fn label(&self) -> String {
        format!(
            "{}-W{:02}",
            self.0.iso_week().year(),
            self.0.iso_week().week()
        )
    }

    /// Number of whole weeks from `self` to `other` (negative when `other`
    /// is earlier).
    pub fn offset_to(&self, other: Period) -> i64 {
        (other.0 - self.0).num_days() / 7
    }

    /// Every period from `start` through `end`, ascending and gap-free.
    pub fn range_inclusive(start: Period, end: Period) -> Vec<Period> {
        let mut periods = Vec::new();
        let mut current = start;
        while current <= end {
            periods.push(current);
            current = current.next();
        }
        periods
    }
}

// ── Metric values and trends ──────────────────────────────────────────────────

/// The payload of a single metric: a count, a 0..1 ratio, a currency sum,
/// or a plain scalar average (sessions, minutes).
///
/// Serializes untagged to a bare JSON number; the report is an output-only
/// contract, so none of these types deserialize.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MetricValue {
    Count(u64),
    Ratio(f64),
    Currency(f64),
    Scalar(f64),
}

impl MetricValue {
    /// Numeric view used for trend comparisons.
    pub fn as_f64(&self) -> f64 {
        match *self {
            MetricValue::Count(n) => n as f64,
            MetricValue::Ratio(r) => r,
            MetricValue::Currency(c) => c,
            MetricValue::Scalar(s) => s,
        }
    }
}

/// Which way a metric moved between the two most recent complete periods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    Up,
    Down,
    Flat,
}

/// Whether a larger value of a metric is good news.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Polarity {
    HigherIsBetter,
    LowerIsBetter,
}

/// Explicit per-metric polarity table.
///
/// `Trend::positive` is read from here, never inferred from the sign of the
/// change: a falling churn rate is good, a falling user count is not.
const POLARITY_TABLE: &[(&str, Polarity)] = &[
    ("total_users", Polarity::HigherIsBetter),
    ("new_users", Polarity::HigherIsBetter),
    ("active_users", Polarity::HigherIsBetter),
    ("churned_users", Polarity::LowerIsBetter),
    ("churn_rate", Polarity::LowerIsBetter),
    ("engagement_ratio", Polarity::HigherIsBetter),
    ("conversion_rate", Polarity::HigherIsBetter),
    ("avg_session_duration", Polarity::HigherIsBetter),
    ("avg_sessions_per_user", Polarity::HigherIsBetter),
    ("total_revenue", Polarity::HigherIsBetter),
    ("avg_revenue_per_user", Polarity::HigherIsBetter),
];

/// Look up the polarity for a metric key. Unknown keys default to
/// higher-is-better.
pub fn polarity_for(key: &str) -> Polarity {
    POLARITY_TABLE
        .iter()
        .find(|(k, _)| *k == key)
        .map(|(_, p)| *p)
        .unwrap_or(Polarity::HigherIsBetter)
}

/// Signed movement of a metric between the two latest complete periods.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Trend {
    /// `current - previous`, in the metric's own unit.
    pub change: f64,
    /// Sign of `change`, with a small tolerance for float noise.
    pub direction: TrendDirection,
    /// Whether the movement is good news per the polarity table.
    pub positive: bool,
}

impl Trend {
    /// Compare the current complete period against the previous one.
    ///
    /// A flat movement is reported as `positive: true` (nothing got worse).
    pub fn compare(current: f64, previous: f64, polarity: Polarity) -> Trend {
        let change = current - previous;
        let direction = if change.abs() < 1e-9 {
            TrendDirection::Flat
        } else if change > 0.0 {
            TrendDirection::Up
        } else {
            TrendDirection::Down
        };
        let positive = match (direction, polarity) {
            (TrendDirection::Flat, _) => true,
            (TrendDirection::Up, Polarity::HigherIsBetter) => true,
            (TrendDirection::Down, Polarity::LowerIsBetter) => true,
            _ => false,
        };
        Trend {
            change,
            direction,
            positive,
        }
    }
}

/// A named, labeled scalar derived from the dataset.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Metric {
    /// Stable machine key, e.g. `"churn_rate"`.
    pub key: String,
    /// Human-readable label, e.g. `"Churn rate"`.
    pub label: String,
    /// The metric value.
    pub value: MetricValue,
    /// Movement vs. the preceding complete period, when one exists.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trend: Option<Trend>,
}

// ── Per-period breakdown ──────────────────────────────────────────────────────

/// Weekly series backing both the headline metrics and the chart builder.
///
/// All vectors are indexed by `periods`, which is contiguous from the first
/// to the last observed ISO week (zero-filled where nothing happened).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeriodBreakdown {
    /// Contiguous ascending list of observed periods.
    pub periods: Vec<Period>,
    /// Distinct users who signed up in each period.
    pub new_users: Vec<u64>,
    /// Distinct users with at least one activity event in each period.
    pub active_users: Vec<u64>,
    /// Users active in the previous period with no activity in this one.
    pub churned_users: Vec<u64>,
    /// `churned / active(previous)`; `None` where churn cannot be judged
    /// (the first period, or an empty previous period).
    pub churn_rate: Vec<Option<f64>>,
}

impl PeriodBreakdown {
    /// Index of the latest complete period.
    ///
    /// The final observed week is treated as provisional (an export may end
    /// mid-week), so with two or more periods this is `len - 2`; a
    /// single-period dataset has no complete period and returns `None`.
    pub fn latest_complete(&self) -> Option<usize> {
        match self.periods.len() {
            0 | 1 => None,
            n => Some(n - 2),
        }
    }

    /// Index of the period preceding the latest complete one, when it exists.
    pub fn previous_complete(&self) -> Option<usize> {
        self.latest_complete().filter(|&i| i > 0).map(|i| i - 1)
    }
}

// ── Cohorts ───────────────────────────────────────────────────────────────────

/// Retention percentages for one signup-week cohort.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CohortRow {
    /// Number of users who signed up in the cohort week.
    pub size: usize,
    /// Percentage of the cohort active at week offset 0, 1, 2, …
    /// Offset 0 is 100.0 by construction.
    pub retention: Vec<f64>,
}

/// Retention table keyed by signup week.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CohortTable {
    /// Cohorts below this size are computed but excluded from aggregate
    /// reporting, so small samples don't dominate the narrative.
    pub min_cohort_size: usize,
    /// All cohorts, keyed by signup week, ascending.
    pub cohorts: BTreeMap<Period, CohortRow>,
}

impl CohortTable {
    /// Cohorts large enough to report on.
    pub fn reportable(&self) -> impl Iterator<Item = (&Period, &CohortRow)> {
        let min = self.min_cohort_size;
        self.cohorts.iter().filter(move |(_, row)| row.size >= min)
    }

    /// Mean retention (percent) at `offset` across reportable cohorts that
    /// extend that far. `None` when no cohort qualifies.
    pub fn average_retention_at(&self, offset: usize) -> Option<f64> {
        let values: Vec<f64> = self
            .reportable()
            .filter_map(|(_, row)| row.retention.get(offset).copied())
            .collect();
        if values.is_empty() {
            return None;
        }
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

// ── MetricSet ─────────────────────────────────────────────────────────────────

/// Everything the metric engine derives from one dataset.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricSet {
    /// Ordered headline metrics for display and the narrative prompt.
    pub metrics: Vec<Metric>,
    /// Weekly series backing the chart builder.
    pub breakdown: PeriodBreakdown,
    /// Signup-week cohort retention.
    pub cohorts: CohortTable,
}

impl MetricSet {
    /// Look up a headline metric by key.
    pub fn get(&self, key: &str) -> Option<&Metric> {
        self.metrics.iter().find(|m| m.key == key)
    }
}

// ── Chart-ready series ────────────────────────────────────────────────────────

/// One chart row: `{period, users, active, churn}`, ordered by period.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesPoint {
    /// ISO week label, e.g. `"2024-W05"`.
    pub period: String,
    /// New signups in the period.
    pub users: u64,
    /// Distinct active users in the period.
    pub active: u64,
    /// Users judged churned in the period.
    pub churn: u64,
}

/// One pie slice; values across the pie sum to exactly 100.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PieSlice {
    pub name: String,
    pub value: u64,
}

/// The chart-ready facet of the analysis result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Visualization {
    /// Weekly series, zero-filled over the observed range.
    #[serde(rename = "chartData")]
    pub chart_data: Vec<SeriesPoint>,
    /// Active/inactive split of the cumulative user base.
    #[serde(rename = "pieData")]
    pub pie_data: Vec<PieSlice>,
}

// ── Tests ─────────────────────────────────────────────────────────────────────
