//! Metric derivation: acquisition, churn, engagement, revenue.
//!
//! All computations are pure reads of the [`Dataset`] indices; the dataset
//! is never mutated. The engine degrades gracefully: a short dataset
//! yields metrics without trends, and only a dataset with zero formable
//! periods is an error.

use std::collections::HashSet;

use growth_core::error::InsufficientDataError;
use growth_core::models::{
    polarity_for, Metric, MetricSet, MetricValue, Period, PeriodBreakdown, Record, Trend,
    UserStatus,
};
use tracing::debug;

use crate::cohort::CohortAnalyzer;
use crate::dataset::Dataset;

// ── EngineConfig ──────────────────────────────────────────────────────────────

/// Tunables for the metric engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Cohorts smaller than this are excluded from aggregate reporting.
    pub min_cohort_size: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig { min_cohort_size: 5 }
    }
}

// ── MetricEngine ──────────────────────────────────────────────────────────────

/// Stateless calculator turning a dataset into a [`MetricSet`].
pub struct MetricEngine;

impl MetricEngine {
    /// Derive the full metric set for `dataset`.
    ///
    /// Fails with [`InsufficientDataError`] only when not a single period
    /// can be formed, which means no record carried a valid date; the
    /// loader normally catches this earlier.
    pub fn compute(
        dataset: &Dataset,
        config: &EngineConfig,
    ) -> Result<MetricSet, InsufficientDataError> {
        let Some((min, max)) = dataset.period_range() else {
            return Err(InsufficientDataError {
                reason: "no periods could be formed from the dataset".to_string(),
            });
        };

        let breakdown = Self::build_breakdown(dataset, min, max);
        let cohorts = CohortAnalyzer::compute(dataset, config.min_cohort_size);
        let metrics = Self::headline_metrics(dataset, &breakdown);

        debug!(
            "Computed {} headline metrics over {} periods",
            metrics.len(),
            breakdown.periods.len()
        );

        Ok(MetricSet {
            metrics,
            breakdown,
            cohorts,
        })
    }

    // ── Per-period series ─────────────────────────────────────────────────

    /// Weekly new/active/churn series over the contiguous observed range.
    ///
    /// Churn for period P counts users active in P−1 with no activity in P;
    /// it is `None` (never a fabricated zero) for the first period and for
    /// any period whose predecessor had no active users. Users
    /// first seen in the final period are never judged, since the period
    /// that would judge them lies outside the observed range.
    fn build_breakdown(dataset: &Dataset, min: Period, max: Period) -> PeriodBreakdown {
        let periods = Period::range_inclusive(min, max);

        let new_users: Vec<u64> = periods
            .iter()
            .map(|&p| dataset.signups_in(p) as u64)
            .collect();
        let active_users: Vec<u64> = periods
            .iter()
            .map(|&p| dataset.active_in(p) as u64)
            .collect();

        let mut churned_users = Vec::with_capacity(periods.len());
        let mut churn_rate = Vec::with_capacity(periods.len());
        for (i, &period) in periods.iter().enumerate() {
            if i == 0 {
                churned_users.push(0);
                churn_rate.push(None);
                continue;
            }
            match dataset.active_set(periods[i - 1]) {
                Some(previous) if !previous.is_empty() => {
                    let churned = previous
                        .iter()
                        .filter(|user| !dataset.was_active(user, period))
                        .count();
                    churned_users.push(churned as u64);
                    churn_rate.push(Some(churned as f64 / previous.len() as f64));
                }
                _ => {
                    churned_users.push(0);
                    churn_rate.push(None);
                }
            }
        }

        PeriodBreakdown {
            periods,
            new_users,
            active_users,
            churned_users,
            churn_rate,
        }
    }

    // ── Headline metrics ──────────────────────────────────────────────────

    /// Build the ordered headline metric list.
    ///
    /// Values reference the latest complete period (the final observed week
    /// is provisional); trends compare against the preceding complete
    /// period and are omitted, never fabricated, when the dataset spans
    /// fewer than two complete periods.
    fn headline_metrics(dataset: &Dataset, breakdown: &PeriodBreakdown) -> Vec<Metric> {
        // breakdown.periods is non-empty by construction here.
        let reference = breakdown
            .latest_complete()
            .unwrap_or(breakdown.periods.len() - 1);
        let previous = breakdown.previous_complete();

        let mut metrics = Vec::new();

        let count_metric = |key: &str, label: &str, current: u64, prior: Option<u64>| Metric {
            key: key.to_string(),
            label: label.to_string(),
            value: MetricValue::Count(current),
            trend: prior.map(|p| Trend::compare(current as f64, p as f64, polarity_for(key))),
        };

        // The total is the file-wide distinct count; its trend compares the
        // cumulative base at the two complete periods.
        let cumulative_ref = dataset.cumulative_users_through(breakdown.periods[reference]);
        metrics.push(Metric {
            key: "total_users".to_string(),
            label: "Total users".to_string(),
            value: MetricValue::Count(dataset.total_users() as u64),
            trend: previous.map(|i| {
                let cumulative_prev = dataset.cumulative_users_through(breakdown.periods[i]);
                Trend::compare(
                    cumulative_ref as f64,
                    cumulative_prev as f64,
                    polarity_for("total_users"),
                )
            }),
        });

        metrics.push(count_metric(
            "new_users",
            "New users",
            breakdown.new_users[reference],
            previous.map(|i| breakdown.new_users[i]),
        ));

        metrics.push(count_metric(
            "active_users",
            "Active users",
            breakdown.active_users[reference],
            previous.map(|i| breakdown.active_users[i]),
        ));

        if let Some(rate) = breakdown.churn_rate[reference] {
            let prior = previous.and_then(|i| breakdown.churn_rate[i]);
            metrics.push(Metric {
                key: "churn_rate".to_string(),
                label: "Churn rate".to_string(),
                value: MetricValue::Ratio(rate),
                trend: prior.map(|p| Trend::compare(rate, p, polarity_for("churn_rate"))),
            });
        }

        if let Some(engagement) = Self::engagement_at(dataset, breakdown, reference) {
            let prior = previous.and_then(|i| Self::engagement_at(dataset, breakdown, i));
            metrics.push(Metric {
                key: "engagement_ratio".to_string(),
                label: "Engagement ratio".to_string(),
                value: MetricValue::Ratio(engagement),
                trend: prior
                    .map(|p| Trend::compare(engagement, p, polarity_for("engagement_ratio"))),
            });
        }

        if let Some(churned) = Self::churned_status_count(dataset) {
            metrics.push(count_metric(
                "churned_users",
                "Churned users",
                churned,
                None,
            ));
        }

        if let Some(rate) = Self::conversion_rate(dataset) {
            metrics.push(Metric {
                key: "conversion_rate".to_string(),
                label: "Conversion rate".to_string(),
                value: MetricValue::Ratio(rate),
                trend: None,
            });
        }

        if let Some(avg) = Self::row_average(dataset, |r| r.session_duration) {
            metrics.push(Metric {
                key: "avg_session_duration".to_string(),
                label: "Avg session duration".to_string(),
                value: MetricValue::Scalar(avg),
                trend: None,
            });
        }

        if let Some(avg) = Self::row_average(dataset, |r| r.sessions_count) {
            metrics.push(Metric {
                key: "avg_sessions_per_user".to_string(),
                label: "Avg sessions per user".to_string(),
                value: MetricValue::Scalar(avg),
                trend: None,
            });
        }

        if let Some((total, average)) = Self::revenue_totals(dataset) {
            metrics.push(Metric {
                key: "total_revenue".to_string(),
                label: "Total revenue".to_string(),
                value: MetricValue::Currency(total),
                trend: None,
            });
            metrics.push(Metric {
                key: "avg_revenue_per_user".to_string(),
                label: "Avg revenue per user".to_string(),
                value: MetricValue::Currency(average),
                trend: None,
            });
        }

        metrics
    }

    /// Active users in the period ÷ cumulative distinct users through it.
    fn engagement_at(dataset: &Dataset, breakdown: &PeriodBreakdown, index: usize) -> Option<f64> {
        let cumulative = dataset.cumulative_users_through(breakdown.periods[index]);
        if cumulative == 0 {
            return None;
        }
        Some(breakdown.active_users[index] as f64 / cumulative as f64)
    }

    /// Distinct users carrying a churned status, when a status column exists.
    fn churned_status_count(dataset: &Dataset) -> Option<u64> {
        let mut any_status = false;
        let mut churned: HashSet<&str> = HashSet::new();
        for record in dataset.records() {
            if let Some(status) = record.status {
                any_status = true;
                if status == UserStatus::Churned {
                    churned.insert(record.user_id.as_str());
                }
            }
        }
        any_status.then(|| churned.len() as u64)
    }

    /// Fraction of rows flagged converted, when a conversion column exists.
    ///
    /// Rows where the flag did not parse count toward the denominator as
    /// not-converted, matching how the other row averages treat gaps.
    fn conversion_rate(dataset: &Dataset) -> Option<f64> {
        let any = dataset.records().iter().any(|r| r.converted.is_some());
        if !any {
            return None;
        }
        let converted = dataset
            .records()
            .iter()
            .filter(|r| r.converted == Some(true))
            .count();
        Some(converted as f64 / dataset.records().len() as f64)
    }

    /// Row-level mean of an optional numeric field, when any row carries it.
    ///
    /// Missing cells contribute zero to the sum but still count in the
    /// denominator, so partial columns do not inflate the average.
    fn row_average(dataset: &Dataset, field: impl Fn(&Record) -> Option<f64>) -> Option<f64> {
        let any = dataset.records().iter().any(|r| field(r).is_some());
        if !any {
            return None;
        }
        let total: f64 = dataset.records().iter().filter_map(&field).sum();
        Some(total / dataset.records().len() as f64)
    }

    /// `(total, per-user average)` over rows carrying revenue, when any do.
    fn revenue_totals(dataset: &Dataset) -> Option<(f64, f64)> {
        let total: f64 = dataset
            .records()
            .iter()
            .filter_map(|r| r.revenue)
            .sum();
        let any = dataset.records().iter().any(|r| r.revenue.is_some());
        if !any {
            return None;
        }
        let users = dataset.total_users().max(1);
        Some((total, total / users as f64))
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
