//! Structured logging setup via `tracing` + `tracing-subscriber`.
//!
//! Call [`init`] exactly once, at process start (the CLI entry point does
//! this before constructing the orchestrator). Adapters log request URLs
//! with credentials redacted at `debug`, provider/model failures at
//! `warn`, and phase transitions at `info`; the orchestrator wraps each
//! pipeline phase in a `tracing::info_span!`.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize the global `tracing` subscriber.
///
/// Honors `RUST_LOG` if set; otherwise falls back to `config.log_level`.
/// `json` selects structured JSON output (suited to log aggregation in
/// production); plain output is easier to read interactively.
pub fn init(config: &crate::Config, json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.clone()));

    let registry = tracing_subscriber::registry().with(filter);

    if json {
        let _ = registry.with(fmt::layer().json()).try_init();
    } else {
        let _ = registry.with(fmt::layer().with_target(true)).try_init();
    }
}

/// Redact an API key for inclusion in a log line: keep the first four
/// characters, mask the rest. None of the adapters currently log a raw
/// credential, but any that start doing so (e.g. NewsAPI's `apiKey` query
/// parameter) must route it through here first.
#[must_use]
pub fn redact(secret: &str) -> String {
    if secret.len() <= 4 {
        return "****".to_string();
    }
    format!("{}****", &secret[..4])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redact_keeps_prefix_and_masks_rest() {
        assert_eq!(redact("sk-ant-abcdef123456"), "sk-a****");
    }

    #[test]
    fn redact_short_secret_is_fully_masked() {
        assert_eq!(redact("ab"), "****");
    }
}
