use clap::Parser;
use std::path::PathBuf;

// ── Settings (CLI) ─────────────────────────────────────────────────────────────

/// Growth analytics for user-activity exports
#[derive(Parser, Debug, Clone)]
#[command(
    name = "growthlens",
    about = "Derive growth, retention and cohort metrics from a CSV/XLSX activity export",
    version
)]
pub struct Settings {
    /// Path to the activity export (CSV or XLSX)
    pub input: PathBuf,

    /// Input format (auto = pick from extension, sniff content as fallback)
    #[arg(long, default_value = "auto", value_parser = ["auto", "csv", "xlsx"])]
    pub format: String,

    /// Write the JSON report here instead of stdout
    #[arg(long)]
    pub output: Option<PathBuf>,

    /// Cohorts smaller than this are excluded from aggregate reporting
    #[arg(long, default_value = "5", value_parser = clap::value_parser!(u32).range(1..=10_000))]
    pub min_cohort_size: u32,

    /// Skip the external narrative call and use the templated summary
    #[arg(long)]
    pub no_narrative: bool,

    /// Text-completion endpoint (OpenAI-style chat completions)
    #[arg(long, default_value = "https://models.github.ai/inference")]
    pub endpoint: String,

    /// Model name sent to the completion endpoint
    #[arg(long, default_value = "openai/gpt-4o")]
    pub model: String,

    /// API key for the completion endpoint
    #[arg(long, env = "GROWTHLENS_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Timeout for the narrative call, in seconds (10-30 recommended)
    #[arg(long, default_value = "20", value_parser = clap::value_parser!(u64).range(1..=120))]
    pub timeout_secs: u64,

    /// Logging level
    #[arg(long, default_value = "INFO", value_parser = ["DEBUG", "INFO", "WARNING", "ERROR", "CRITICAL"])]
    pub log_level: String,

    /// Log file path
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_defaults() {
        let settings = Settings::parse_from(["growthlens", "data.csv"]);
        assert_eq!(settings.input, PathBuf::from("data.csv"));
        assert_eq!(settings.format, "auto");
        assert_eq!(settings.min_cohort_size, 5);
        assert_eq!(settings.timeout_secs, 20);
        assert!(!settings.no_narrative);
        assert!(settings.output.is_none());
    }

    #[test]
    fn test_settings_overrides() {
        let settings = Settings::parse_from([
            "growthlens",
            "export.xlsx",
            "--format",
            "xlsx",
            "--min-cohort-size",
            "10",
            "--no-narrative",
            "--output",
            "report.json",
        ]);
        assert_eq!(settings.format, "xlsx");
        assert_eq!(settings.min_cohort_size, 10);
        assert!(settings.no_narrative);
        assert_eq!(settings.output, Some(PathBuf::from("report.json")));
    }

    #[test]
    fn test_settings_rejects_unknown_format() {
        let result = Settings::try_parse_from(["growthlens", "data.csv", "--format", "parquet"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_settings_rejects_zero_cohort_size() {
        let result =
            Settings::try_parse_from(["growthlens", "data.csv", "--min-cohort-size", "0"]);
        assert!(result.is_err());
    }
}
