mod bootstrap;

use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use growth_core::settings::Settings;
use growth_narrative::{CompletionService, HttpCompletionService, ServiceConfig};
use growth_runtime::pipeline::{analyze, PipelineConfig};

#[tokio::main]
async fn main() -> Result<()> {
    let settings = Settings::parse();

    bootstrap::setup_logging(&settings.log_level, settings.log_file.as_ref())?;

    tracing::info!("GrowthLens v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!("Analyzing {}", settings.input.display());

    let bytes = std::fs::read(&settings.input)
        .with_context(|| format!("failed to read {}", settings.input.display()))?;
    let hint = bootstrap::extension_hint(&settings.format, &settings.input);

    let config = PipelineConfig {
        min_cohort_size: settings.min_cohort_size as usize,
        narrative_timeout: Duration::from_secs(settings.timeout_secs),
    };

    // The narrative call needs a key; without one we go straight to the
    // templated summary instead of a guaranteed 401.
    let service: Option<HttpCompletionService> = if settings.no_narrative {
        None
    } else {
        match &settings.api_key {
            Some(key) => Some(HttpCompletionService::new(ServiceConfig {
                endpoint: settings.endpoint.clone(),
                model: settings.model.clone(),
                api_key: key.clone(),
            })?),
            None => {
                tracing::warn!(
                    "No API key configured (set GROWTHLENS_API_KEY); using templated summary"
                );
                None
            }
        }
    };

    let report = analyze(
        &bytes,
        hint.as_deref(),
        &config,
        service.as_ref().map(|s| s as &dyn CompletionService),
    )
    .await?;

    let json = serde_json::to_string_pretty(&report)?;
    match &settings.output {
        Some(path) => {
            std::fs::write(path, &json)
                .with_context(|| format!("failed to write {}", path.display()))?;
            tracing::info!("Report written to {}", path.display());
        }
        None => println!("{}", json),
    }

    Ok(())
}
