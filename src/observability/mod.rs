use tracing_subscriber::EnvFilter;

use crate::config::{LogFormat, LoggingConfig};

/// Map a configured log level onto a tracing filter directive.
///
/// Returns `None` for "DISABLED". "WARNING" maps to WARN and "CRITICAL" to
/// ERROR; other names pass through.
#[must_use]
pub fn tracing_directive(log_level: &str) -> Option<String> {
    let level = log_level.to_uppercase();
    match level.as_str() {
        "DISABLED" => None,
        "WARNING" => Some("WARN".to_string()),
        "CRITICAL" => Some("ERROR".to_string()),
        _ => Some(level),
    }
}

/// Initialize the tracing subscriber from the logging config.
///
/// `RUST_LOG`, when set, takes precedence over the configured level.
pub fn init_tracing(logging: &LoggingConfig) {
    let Some(directive) = tracing_directive(&logging.level) else {
        return;
    };

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&directive))
        .unwrap_or_else(|_| EnvFilter::new("INFO"));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    match logging.format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}
