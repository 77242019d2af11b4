//! Narrative generation with a deterministic fallback.

use std::time::Duration;

use growth_core::models::{MetricSet, MetricValue, TrendDirection};
use tracing::{debug, warn};

use crate::prompt::PromptBuilder;
use crate::sanitize::sanitize_summary;
use crate::service::CompletionService;

/// The narrative facet of an analysis.
#[derive(Debug, Clone, PartialEq)]
pub struct NarrativeResult {
    /// Prose summary, either model-written or templated.
    pub text: String,
    /// `true` when the text is the templated fallback.
    pub degraded: bool,
}

/// Requests a summary from a [`CompletionService`] under a deadline and
/// synthesizes a templated one when that fails.
///
/// The narrative is strictly best-effort: no failure here ever propagates,
/// and there are no retries. A caller that goes away simply drops the
/// future and the in-flight request with it.
pub struct Summarizer {
    timeout: Duration,
}

impl Summarizer {
    pub fn new(timeout: Duration) -> Summarizer {
        Summarizer { timeout }
    }

    /// Produce the narrative for `set`.
    pub async fn summarize(
        &self,
        set: &MetricSet,
        service: &dyn CompletionService,
    ) -> NarrativeResult {
        let prompt = PromptBuilder::build(set);

        let outcome = tokio::time::timeout(self.timeout, service.complete(&prompt)).await;
        match outcome {
            Ok(Ok(raw)) => match sanitize_summary(&raw) {
                Some(text) => {
                    debug!("Narrative generated ({} chars)", text.chars().count());
                    NarrativeResult {
                        text,
                        degraded: false,
                    }
                }
                None => {
                    warn!("Completion returned no readable text, using fallback summary");
                    Self::fallback(set)
                }
            },
            Ok(Err(err)) => {
                warn!("Completion failed ({}), using fallback summary", err);
                Self::fallback(set)
            }
            Err(_) => {
                warn!(
                    "Completion timed out after {:?}, using fallback summary",
                    self.timeout
                );
                Self::fallback(set)
            }
        }
    }

    /// Templated summary built purely from the metrics.
    pub fn fallback(set: &MetricSet) -> NarrativeResult {
        let mut lines = vec![format!(
            "Automated summary: the dataset covers {} week(s).",
            set.breakdown.periods.len()
        )];

        for metric in &set.metrics {
            let value = match &metric.value {
                MetricValue::Count(n) => n.to_string(),
                MetricValue::Ratio(r) => format!("{:.1}%", r * 100.0),
                MetricValue::Currency(c) => format!("{:.2}", c),
                MetricValue::Scalar(s) => format!("{:.1}", s),
            };
            let line = match &metric.trend {
                Some(trend) => {
                    let movement = match trend.direction {
                        TrendDirection::Up => "up from",
                        TrendDirection::Down => "down from",
                        TrendDirection::Flat => "unchanged since",
                    };
                    format!(
                        "{} stood at {}, {} the previous week.",
                        metric.label, value, movement
                    )
                }
                None => format!("{} stood at {}.", metric.label, value),
            };
            lines.push(line);
        }

        if let Some(avg) = set.cohorts.average_retention_at(1) {
            lines.push(format!(
                "Average week-1 cohort retention was {:.1}%.",
                avg
            ));
        }

        NarrativeResult {
            text: lines.join(" "),
            degraded: true,
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
