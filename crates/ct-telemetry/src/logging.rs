use tracing_subscriber::{fmt, EnvFilter};

/// Output encoding for log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Human,
    Json,
}

/// Build the level filter: `RUST_LOG` wins, otherwise `default_level`
/// (e.g. "info", "debug", "ct_daemon=debug,warn").
fn env_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}

/// Install the global subscriber.
///
/// Returns `false` when a subscriber was already installed, which makes the
/// call safe to repeat (e.g. once per test).
pub fn init(service_name: &str, default_level: &str, encoding: Encoding) -> bool {
    let builder = fmt()
        .with_env_filter(env_filter(default_level))
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .with_level(true);

    let installed = match encoding {
        Encoding::Human => builder.with_thread_ids(false).try_init().is_ok(),
        Encoding::Json => builder.json().try_init().is_ok(),
    };

    if installed {
        tracing::info!(service = service_name, ?encoding, "logging initialised");
    }
    installed
}

/// Initialize logging with human-readable output format.
pub fn init_logging(service_name: &str, default_level: &str) -> bool {
    init(service_name, default_level, Encoding::Human)
}

/// Initialize logging with JSON output format.
pub fn init_logging_json(service_name: &str, default_level: &str) -> bool {
    init(service_name, default_level, Encoding::Json)
}
