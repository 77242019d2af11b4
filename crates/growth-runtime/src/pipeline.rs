//! End-to-end analysis: bytes in, report out.

use std::time::{Duration, Instant};

use chrono::Utc;
use growth_core::error::GrowthError;
use growth_data::loader::Loader;
use growth_data::metrics::{EngineConfig, MetricEngine};
use growth_data::series::SeriesBuilder;
use growth_narrative::{CompletionService, Summarizer};
use tracing::debug;

use crate::report::{AnalysisReport, ReportMetadata};

/// Tunables for one analysis run.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Cohorts below this size are excluded from aggregate reporting.
    pub min_cohort_size: usize,
    /// Deadline for the narrative request.
    pub narrative_timeout: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            min_cohort_size: 5,
            narrative_timeout: Duration::from_secs(20),
        }
    }
}

/// Run the full pipeline over one uploaded file.
///
/// Loading, metric derivation, and series shaping are synchronous pure
/// computation; awaiting the narrative is the only suspension point. With
/// `service = None` the narrative step is skipped and the templated
/// summary is used directly.
///
/// Metrics and series never depend on the narrative outcome, and the same
/// bytes always produce the same metrics and series.
pub async fn analyze(
    bytes: &[u8],
    extension_hint: Option<&str>,
    config: &PipelineConfig,
    service: Option<&dyn CompletionService>,
) -> Result<AnalysisReport, GrowthError> {
    let started = Instant::now();

    let outcome = Loader::load(bytes, extension_hint)?;
    let engine_config = EngineConfig {
        min_cohort_size: config.min_cohort_size,
    };
    let set = MetricEngine::compute(&outcome.dataset, &engine_config)?;
    let visualization = SeriesBuilder::build(&outcome.dataset, &set);

    let narrative = match service {
        Some(service) => {
            Summarizer::new(config.narrative_timeout)
                .summarize(&set, service)
                .await
        }
        None => Summarizer::fallback(&set),
    };

    let periods = set.breakdown.periods.len();
    debug!(
        "Analysis finished: {} rows, {} periods, degraded={}",
        outcome.rows_loaded, periods, narrative.degraded
    );

    Ok(AnalysisReport {
        metrics: set.metrics,
        visualization,
        ai_summary: narrative.text,
        degraded: narrative.degraded,
        metadata: ReportMetadata {
            generated_at: Utc::now(),
            rows_loaded: outcome.rows_loaded,
            skipped_rows: outcome.skipped_rows,
            periods,
            elapsed_ms: started.elapsed().as_millis() as u64,
        },
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use growth_core::models::MetricValue;
    use growth_narrative::CompletionError;

    struct FixedService(&'static str);

    #[async_trait]
    impl CompletionService for FixedService {
        async fn complete(&self, _prompt: &str) -> Result<String, CompletionError> {
            Ok(self.0.to_string())
        }
    }

    struct FailingService;

    #[async_trait]
    impl CompletionService for FailingService {
        async fn complete(&self, _prompt: &str) -> Result<String, CompletionError> {
            Err(CompletionError::EmptyResponse)
        }
    }

    /// Ten users sign up and are active in week 1; eight stay active in
    /// week 2, six in week 3, five in week 4.
    fn sample_csv() -> Vec<u8> {
        let weeks = ["2024-01-01", "2024-01-08", "2024-01-15", "2024-01-22"];
        let mut csv = String::from("user_id,signup_date,activity_date\n");
        for i in 0..10 {
            csv.push_str(&format!("u{},{},{}\n", i, weeks[0], weeks[0]));
            if i < 8 {
                csv.push_str(&format!("u{},,{}\n", i, weeks[1]));
            }
            if i < 6 {
                csv.push_str(&format!("u{},,{}\n", i, weeks[2]));
            }
            if i < 5 {
                csv.push_str(&format!("u{},,{}\n", i, weeks[3]));
            }
        }
        csv.into_bytes()
    }

    fn config() -> PipelineConfig {
        PipelineConfig::default()
    }

    #[tokio::test]
    async fn test_end_to_end_metrics() {
        let service = FixedService("Steady growth.");
        let report = analyze(&sample_csv(), Some("csv"), &config(), Some(&service))
            .await
            .unwrap();

        let total = report.metrics.iter().find(|m| m.key == "total_users").unwrap();
        assert_eq!(total.value, MetricValue::Count(10));

        // Week 1 signups show in the first chart point; week 2 churned two
        // of the ten week-1 actives.
        assert_eq!(report.visualization.chart_data.len(), 4);
        assert_eq!(report.visualization.chart_data[0].users, 10);
        assert_eq!(report.visualization.chart_data[1].churn, 2);

        assert_eq!(report.ai_summary, "Steady growth.");
        assert!(!report.degraded);
        assert_eq!(report.metadata.rows_loaded, 29);
        assert_eq!(report.metadata.periods, 4);
    }

    #[tokio::test]
    async fn test_narrative_failure_degrades_but_keeps_metrics() {
        let report = analyze(&sample_csv(), Some("csv"), &config(), Some(&FailingService))
            .await
            .unwrap();
        assert!(report.degraded);
        assert!(report.ai_summary.starts_with("Automated summary"));
        assert_eq!(report.visualization.chart_data.len(), 4);
        assert!(!report.metrics.is_empty());
    }

    #[tokio::test]
    async fn test_no_service_uses_fallback() {
        let report = analyze(&sample_csv(), Some("csv"), &config(), None)
            .await
            .unwrap();
        assert!(report.degraded);
        assert!(report.ai_summary.contains("Total users"));
    }

    #[tokio::test]
    async fn test_same_bytes_same_metrics() {
        let bytes = sample_csv();
        let a = analyze(&bytes, Some("csv"), &config(), None).await.unwrap();
        let b = analyze(&bytes, Some("csv"), &config(), None).await.unwrap();
        assert_eq!(a.metrics, b.metrics);
        assert_eq!(a.visualization, b.visualization);
        assert_eq!(a.ai_summary, b.ai_summary);
    }

    #[tokio::test]
    async fn test_empty_input_is_an_ingestion_error() {
        let err = analyze(&[], Some("csv"), &config(), None).await.unwrap_err();
        assert!(err.to_string().contains("Empty upload"));
    }

    #[tokio::test]
    async fn test_pie_slices_sum_to_100() {
        let report = analyze(&sample_csv(), Some("csv"), &config(), None)
            .await
            .unwrap();
        let total: u64 = report.visualization.pie_data.iter().map(|s| s.value).sum();
        assert_eq!(total, 100);
    }
}
