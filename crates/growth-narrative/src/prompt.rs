//! Deterministic prompt construction from aggregate metrics.
//!
//! Only derived numbers ever reach the prompt. Raw records, user ids, and
//! free-text columns stay on our side of the wire.

use growth_core::models::{Metric, MetricSet, MetricValue, TrendDirection};

/// Weekly points included in the prompt; older history adds tokens without
/// adding signal.
const MAX_PROMPT_WEEKS: usize = 12;

/// Builds the user message sent to the completion service.
pub struct PromptBuilder;

impl PromptBuilder {
    /// Render `set` into the analysis prompt. Same input, same output.
    pub fn build(set: &MetricSet) -> String {
        let mut prompt = String::from(
            "You are a SaaS growth analyst. Analyze these user metrics:\n",
        );

        for metric in &set.metrics {
            prompt.push_str(&format!("- {}\n", Self::metric_line(metric)));
        }

        let breakdown = &set.breakdown;
        if !breakdown.periods.is_empty() {
            prompt.push_str("\nWeekly series (new / active / churned):\n");
            let skip = breakdown.periods.len().saturating_sub(MAX_PROMPT_WEEKS);
            for i in skip..breakdown.periods.len() {
                prompt.push_str(&format!(
                    "- {}: {} / {} / {}\n",
                    breakdown.periods[i].label(),
                    breakdown.new_users[i],
                    breakdown.active_users[i],
                    breakdown.churned_users[i],
                ));
            }
        }

        let reportable = set.cohorts.reportable().count();
        if reportable > 0 {
            if let Some(avg) = set.cohorts.average_retention_at(1) {
                prompt.push_str(&format!(
                    "\nCohorts: {} signup cohorts at or above the reporting threshold; \
                     average week-1 retention {:.1}%.\n",
                    reportable, avg
                ));
            }
        }

        prompt.push_str(
            "\nProvide:\n\
             1. Data summary in plain English\n\
             2. 3 key observations\n\
             3. 2 actionable recommendations\n\
             Format: Markdown",
        );

        prompt
    }

    fn metric_line(metric: &Metric) -> String {
        let value = Self::format_value(&metric.value);
        match &metric.trend {
            Some(trend) => {
                let movement = match trend.direction {
                    TrendDirection::Up => "up",
                    TrendDirection::Down => "down",
                    TrendDirection::Flat => "flat",
                };
                format!(
                    "{}: {} ({} vs previous week)",
                    metric.label, value, movement
                )
            }
            None => format!("{}: {}", metric.label, value),
        }
    }

    fn format_value(value: &MetricValue) -> String {
        match value {
            MetricValue::Count(n) => n.to_string(),
            MetricValue::Ratio(r) => format!("{:.1}%", r * 100.0),
            MetricValue::Currency(c) => format!("{:.2}", c),
            MetricValue::Scalar(s) => format!("{:.1}", s),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use growth_core::models::{
        CohortTable, Metric, MetricSet, MetricValue, Period, PeriodBreakdown,
    };
    use std::collections::BTreeMap;

    fn metric(key: &str, label: &str, value: MetricValue) -> Metric {
        Metric {
            key: key.to_string(),
            label: label.to_string(),
            value,
            trend: None,
        }
    }

    fn small_set() -> MetricSet {
        let start = Period::from_date(chrono::NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        MetricSet {
            metrics: vec![
                metric("total_users", "Total users", MetricValue::Count(42)),
                metric("churn_rate", "Churn rate", MetricValue::Ratio(0.125)),
            ],
            breakdown: PeriodBreakdown {
                periods: vec![start, start.next()],
                new_users: vec![40, 2],
                active_users: vec![40, 35],
                churned_users: vec![0, 5],
                churn_rate: vec![None, Some(0.125)],
            },
            cohorts: CohortTable {
                min_cohort_size: 5,
                cohorts: BTreeMap::new(),
            },
        }
    }

    #[test]
    fn test_prompt_is_deterministic() {
        let set = small_set();
        assert_eq!(PromptBuilder::build(&set), PromptBuilder::build(&set));
    }

    #[test]
    fn test_prompt_contains_metrics_and_series() {
        let prompt = PromptBuilder::build(&small_set());
        assert!(prompt.contains("Total users: 42"));
        assert!(prompt.contains("Churn rate: 12.5%"));
        assert!(prompt.contains("2024-W01: 40 / 40 / 0"));
        assert!(prompt.contains("2024-W02: 2 / 35 / 5"));
        assert!(prompt.contains("2 actionable recommendations"));
    }

    #[test]
    fn test_prompt_truncates_long_series() {
        let mut set = small_set();
        let start = set.breakdown.periods[0];
        let periods: Vec<Period> = {
            let mut p = start;
            (0..30)
                .map(|_| {
                    let cur = p;
                    p = p.next();
                    cur
                })
                .collect()
        };
        set.breakdown = PeriodBreakdown {
            new_users: vec![1; 30],
            active_users: vec![1; 30],
            churned_users: vec![0; 30],
            churn_rate: vec![None; 30],
            periods,
        };
        let prompt = PromptBuilder::build(&set);
        let points = prompt
            .lines()
            .filter(|line| line.starts_with("- 2024-W"))
            .count();
        assert_eq!(points, MAX_PROMPT_WEEKS);
        // The kept points are the most recent ones.
        assert!(!prompt.contains("2024-W01:"));
    }
}
