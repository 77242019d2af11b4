use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

// ── Logging bootstrap ──────────────────────────────────────────────────────────

/// Initialise the global `tracing` subscriber.
///
/// `log_level` is mapped to a [`tracing_subscriber::EnvFilter`] directive.
/// Falls back to `"info"` if the level string is not recognised.
///
/// The `log_file` parameter is accepted for forward-compatibility but file
/// logging is not yet wired – all output currently goes to stderr, keeping
/// stdout clean for the JSON report.
pub fn setup_logging(log_level: &str, _log_file: Option<&PathBuf>) -> anyhow::Result<()> {
    let upper = log_level.to_uppercase();
    let normalised = match upper.as_str() {
        "DEBUG" | "CRITICAL" => "debug",
        "INFO" => "info",
        "WARNING" => "warn",
        "ERROR" => "error",
        other => other,
    };

    let filter = EnvFilter::try_new(normalised).unwrap_or_else(|_| EnvFilter::new("info"));

    let subscriber = fmt::layer()
        .with_target(false)
        .with_thread_ids(false)
        .with_writer(std::io::stderr);

    tracing_subscriber::registry()
        .with(filter)
        .with(subscriber)
        .init();

    Ok(())
}

/// The extension hint handed to the loader: an explicit `--format` wins,
/// otherwise the input path's extension.
pub fn extension_hint(format: &str, input: &std::path::Path) -> Option<String> {
    if format != "auto" {
        return Some(format.to_string());
    }
    input
        .extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_extension_hint_prefers_explicit_format() {
        assert_eq!(
            extension_hint("xlsx", Path::new("data.csv")),
            Some("xlsx".to_string())
        );
    }

    #[test]
    fn test_extension_hint_falls_back_to_path() {
        assert_eq!(
            extension_hint("auto", Path::new("export.XLSX")),
            Some("xlsx".to_string())
        );
        assert_eq!(
            extension_hint("auto", Path::new("data.csv")),
            Some("csv".to_string())
        );
    }

    #[test]
    fn test_extension_hint_none_without_extension() {
        assert_eq!(extension_hint("auto", Path::new("export")), None);
    }
}
