//! The serialized analysis report contract.

use chrono::{DateTime, Utc};
use growth_core::models::{Metric, Visualization};
use serde::Serialize;

/// Everything one analysis run produces, in the shape consumers expect.
///
/// Field names are part of the external contract; renames here are breaking
/// changes for every downstream chart. The report is output-only: nothing
/// in the pipeline reads one back, and the untagged metric values would not
/// survive a round trip anyway.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisReport {
    /// Ordered headline metrics.
    pub metrics: Vec<Metric>,
    /// Chart-ready series.
    #[serde(rename = "visualizationData")]
    pub visualization: Visualization,
    /// Prose summary of the metrics.
    pub ai_summary: String,
    /// `true` when `ai_summary` is the templated fallback.
    pub degraded: bool,
    /// Run diagnostics.
    pub metadata: ReportMetadata,
}

/// Diagnostics attached to every report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportMetadata {
    /// When the report was produced.
    pub generated_at: DateTime<Utc>,
    /// Rows that survived normalization.
    pub rows_loaded: usize,
    /// Rows dropped during normalization.
    pub skipped_rows: usize,
    /// Observed ISO weeks in the dataset.
    pub periods: usize,
    /// Wall-clock duration of the whole run, in milliseconds.
    pub elapsed_ms: u64,
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use growth_core::models::{MetricValue, PieSlice, SeriesPoint};

    fn sample_report() -> AnalysisReport {
        AnalysisReport {
            metrics: vec![Metric {
                key: "total_users".to_string(),
                label: "Total users".to_string(),
                value: MetricValue::Count(10),
                trend: None,
            }],
            visualization: Visualization {
                chart_data: vec![SeriesPoint {
                    period: "2024-W01".to_string(),
                    users: 10,
                    active: 10,
                    churn: 0,
                }],
                pie_data: vec![
                    PieSlice {
                        name: "Active Users".to_string(),
                        value: 100,
                    },
                    PieSlice {
                        name: "Inactive".to_string(),
                        value: 0,
                    },
                ],
            },
            ai_summary: "All ten users active.".to_string(),
            degraded: false,
            metadata: ReportMetadata {
                generated_at: Utc::now(),
                rows_loaded: 10,
                skipped_rows: 0,
                periods: 1,
                elapsed_ms: 12,
            },
        }
    }

    #[test]
    fn test_report_field_names() {
        let json = serde_json::to_value(sample_report()).unwrap();
        assert!(json.get("metrics").is_some());
        assert!(json.get("visualizationData").is_some());
        assert!(json.get("ai_summary").is_some());
        assert!(json["visualizationData"].get("chartData").is_some());
        assert!(json["visualizationData"].get("pieData").is_some());
        // Internal names must not leak.
        assert!(json.get("visualization").is_none());
    }

    #[test]
    fn test_metric_without_trend_omits_the_field() {
        let json = serde_json::to_value(sample_report()).unwrap();
        assert!(json["metrics"][0].get("trend").is_none());
    }

    #[test]
    fn test_metric_values_serialize_as_bare_numbers() {
        let mut report = sample_report();
        report.metrics.push(Metric {
            key: "total_revenue".to_string(),
            label: "Total revenue".to_string(),
            value: MetricValue::Currency(199.5),
            trend: None,
        });
        let json = serde_json::to_value(&report).unwrap();
        // No enum tags on the wire, whatever the value's unit.
        assert_eq!(json["metrics"][0]["value"], 10);
        assert_eq!(json["metrics"][1]["value"], 199.5);
    }
}
