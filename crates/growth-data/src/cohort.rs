//! Signup-week cohort retention.

use std::collections::BTreeMap;

use growth_core::models::{CohortRow, CohortTable, Period};
use tracing::debug;

use crate::dataset::Dataset;

/// Computes the retention table for every signup-week cohort.
pub struct CohortAnalyzer;

impl CohortAnalyzer {
    /// Build the [`CohortTable`] for `dataset`.
    ///
    /// Every cohort is computed, including ones below `min_cohort_size`;
    /// the table records the threshold so aggregate consumers can filter.
    /// Retention at offset 0 is 100 by construction: the cohort is defined
    /// as the users who signed up that week.
    pub fn compute(dataset: &Dataset, min_cohort_size: usize) -> CohortTable {
        let max_period = dataset.period_range().map(|(_, max)| max);

        let mut cohorts: BTreeMap<Period, CohortRow> = BTreeMap::new();

        for (&cohort_week, members) in dataset.signup_cohorts() {
            if members.is_empty() {
                continue;
            }
            let size = members.len();

            let max_offset = max_period
                .map(|max| cohort_week.offset_to(max).max(0) as usize)
                .unwrap_or(0);

            let mut retention = Vec::with_capacity(max_offset + 1);
            retention.push(100.0);

            let mut week = cohort_week;
            for _ in 1..=max_offset {
                week = week.next();
                let active = members
                    .iter()
                    .filter(|user| dataset.was_active(user, week))
                    .count();
                retention.push(active as f64 * 100.0 / size as f64);
            }

            cohorts.insert(cohort_week, CohortRow { size, retention });
        }

        debug!(
            "Computed {} cohorts ({} at or above min size {})",
            cohorts.len(),
            cohorts.values().filter(|c| c.size >= min_cohort_size).count(),
            min_cohort_size
        );

        CohortTable {
            min_cohort_size,
            cohorts,
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
