use ct_telemetry::logging;

#[test]
fn init_is_safe_to_repeat() {
    // Tests in this binary share one global subscriber, so at most one of
    // these calls can install it.
    logging::init_logging("test-service", "debug");
    let second = logging::init_logging("test-service", "info");
    assert!(!second, "second init must not replace the subscriber");

    tracing::info!(key = "value", "human-readable log line");
}

#[test]
fn json_after_human_is_a_noop() {
    logging::init_logging("test-service", "info");
    assert!(!logging::init_logging_json("test-service-json", "info"));

    tracing::info!(key = "value", "json log line");
}

#[test]
fn default_level_fallback() {
    std::env::remove_var("RUST_LOG");
    logging::init("fallback-test", "warn", logging::Encoding::Human);
}
