//! Chart-ready series shaped from the derived metrics.

use growth_core::models::{MetricSet, PieSlice, SeriesPoint, Visualization};

use crate::dataset::Dataset;

/// Shapes the weekly chart series and the active/inactive pie split.
pub struct SeriesBuilder;

impl SeriesBuilder {
    /// Build the [`Visualization`] facet from an already-computed metric set.
    pub fn build(dataset: &Dataset, set: &MetricSet) -> Visualization {
        Visualization {
            chart_data: Self::chart_points(set),
            pie_data: Self::pie_slices(dataset, set),
        }
    }

    /// One point per observed week, zero-filled. The breakdown already
    /// covers the contiguous range, so this is a straight projection.
    fn chart_points(set: &MetricSet) -> Vec<SeriesPoint> {
        set.breakdown
            .periods
            .iter()
            .enumerate()
            .map(|(i, period)| SeriesPoint {
                period: period.label(),
                users: set.breakdown.new_users[i],
                active: set.breakdown.active_users[i],
                churn: set.breakdown.churned_users[i],
            })
            .collect()
    }

    /// Active/inactive split of the user base at the latest complete period,
    /// as integer percentages summing to exactly 100.
    ///
    /// Both shares are floored; the leftover point (0 or 1) goes to the
    /// larger share, to the active share on a tie. An empty base yields an
    /// empty pie rather than a fabricated split.
    fn pie_slices(dataset: &Dataset, set: &MetricSet) -> Vec<PieSlice> {
        let breakdown = &set.breakdown;
        if breakdown.periods.is_empty() {
            return Vec::new();
        }
        let reference = breakdown
            .latest_complete()
            .unwrap_or(breakdown.periods.len() - 1);

        let base = dataset.cumulative_users_through(breakdown.periods[reference]) as u64;
        if base == 0 {
            return Vec::new();
        }
        let active = breakdown.active_users[reference].min(base);
        let inactive = base - active;

        let active_pct = active * 100 / base;
        let inactive_pct = inactive * 100 / base;
        let mut slices = vec![
            PieSlice {
                name: "Active Users".to_string(),
                value: active_pct,
            },
            PieSlice {
                name: "Inactive".to_string(),
                value: inactive_pct,
            },
        ];

        let leftover = 100 - active_pct - inactive_pct;
        if leftover > 0 {
            if inactive > active {
                slices[1].value += leftover;
            } else {
                slices[0].value += leftover;
            }
        }

        slices
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
