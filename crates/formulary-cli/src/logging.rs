//! Subscriber setup for the command-line tool
//!
//! Logs go to stderr so command output on stdout stays machine readable.

use crate::config::LoggingConfig;
use anyhow::{Result, anyhow};
use tracing_subscriber::EnvFilter;

/// Filter directive for a run: `RUST_LOG` wins, then `--verbose`, then the
/// configured filter
pub fn filter_directive(config: &LoggingConfig, verbose: bool, rust_log: Option<&str>) -> String {
    match rust_log {
        Some(directive) if !directive.trim().is_empty() => directive.to_string(),
        _ if verbose => "debug".to_string(),
        _ => config.filter.clone(),
    }
}

/// Install the global subscriber. Fails if one is already installed.
pub fn init_logging(config: &LoggingConfig, verbose: bool) -> Result<()> {
    let rust_log = std::env::var("RUST_LOG").ok();
    let directive = filter_directive(config, verbose, rust_log.as_deref());
    let filter = EnvFilter::try_new(&directive)
        .map_err(|err| anyhow!("invalid log filter '{directive}': {err}"))?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    let installed = if config.json { builder.json().try_init() } else { builder.try_init() };
    installed.map_err(|err| anyhow!("failed to install tracing subscriber: {err}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rust_log_takes_precedence() {
        let config = LoggingConfig { filter: "warn".to_string(), json: false };
        assert_eq!(filter_directive(&config, true, Some("formulary_core=trace")), "formulary_core=trace");
        assert_eq!(filter_directive(&config, true, Some("  ")), "debug");
        assert_eq!(filter_directive(&config, false, None), "warn");
    }

    #[test]
    fn configured_filters_are_valid_directives() {
        let config = LoggingConfig::default();
        assert!(EnvFilter::try_new(filter_directive(&config, false, None)).is_ok());
    }
}
