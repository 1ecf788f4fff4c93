use std::time::Duration;

use ct_core::config::{Config, ElectionMode, LogFormat, OverlapPolicy};

#[test]
fn default_config() {
    let cfg = Config::default();
    assert_eq!(cfg.general.node_name, "caretaker");
    assert_eq!(cfg.general.log_level, "info");
    assert_eq!(cfg.general.log_format, LogFormat::Human);
    assert_eq!(cfg.caretaker.tick_period(), Duration::from_secs(60));
    assert_eq!(cfg.caretaker.leadership_timeout(), Duration::from_secs(10));
    assert_eq!(cfg.caretaker.overlap, OverlapPolicy::Concurrent);
    assert_eq!(cfg.election.mode, ElectionMode::Standalone);
    assert!(cfg.jobs.is_empty());
    cfg.validate().expect("defaults validate");
}

#[test]
fn config_roundtrip() {
    let mut cfg = Config::default();
    cfg.jobs = toml::from_str::<Config>(
        r#"
[[jobs]]
name = "expire-audit"
command = ["expire-audit", "--older-than", "7d"]
timeout_secs = 120
"#,
    )
    .expect("parse jobs")
    .jobs;

    let toml_str = cfg.to_toml().expect("serialize to toml");
    assert!(toml_str.contains("expire-audit"));

    let parsed = Config::from_toml(&toml_str).expect("parse toml back");
    assert_eq!(parsed.general.node_name, cfg.general.node_name);
    assert_eq!(parsed.caretaker.tick_period_secs, cfg.caretaker.tick_period_secs);
    assert_eq!(parsed.jobs.len(), 1);
    assert_eq!(parsed.jobs[0].timeout(), Some(Duration::from_secs(120)));
}

#[test]
fn config_partial_toml() {
    let partial = r#"
[caretaker]
tick_period_secs = 5
overlap = "skip_if_running"

[election]
mode = "command"
command = ["sh", "-c", "test -f /var/run/leader"]
"#;
    let cfg = Config::from_toml(partial).expect("parse partial");
    assert_eq!(cfg.caretaker.tick_period(), Duration::from_secs(5));
    assert_eq!(cfg.caretaker.overlap, OverlapPolicy::SkipIfRunning);
    assert_eq!(cfg.election.mode, ElectionMode::Command);
    // defaults should fill in the rest
    assert_eq!(cfg.caretaker.leadership_timeout_secs, 10);
    assert_eq!(cfg.election.timeout(), Duration::from_secs(5));
    assert_eq!(cfg.general.log_level, "info");
}

#[test]
fn zero_tick_period_fails_validation() {
    let err = Config::from_toml("[caretaker]\ntick_period_secs = 0\n").expect_err("should fail");
    assert!(err.to_string().contains("tick_period_secs"));
}

#[test]
fn command_mode_requires_command() {
    let err = Config::from_toml("[election]\nmode = \"command\"\n").expect_err("should fail");
    assert!(err.to_string().contains("election.command"));
}

#[test]
fn duplicate_job_names_fail_validation() {
    let doc = r#"
[[jobs]]
name = "expire-audit"
command = ["a"]

[[jobs]]
name = "expire-audit"
command = ["b"]
"#;
    let err = Config::from_toml(doc).expect_err("should fail");
    assert!(err.to_string().contains("duplicate job name"));
}

#[test]
fn empty_job_command_fails_validation() {
    let doc = r#"
[[jobs]]
name = "noop"
command = []
"#;
    let err = Config::from_toml(doc).expect_err("should fail");
    assert!(err.to_string().contains("jobs.noop"));
}

#[test]
fn unknown_log_format_is_a_parse_error() {
    let err = Config::from_toml("[general]\nlog_format = \"xml\"\n").expect_err("should fail");
    assert!(err.to_string().starts_with("parse:"));
}

#[test]
fn load_from_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "[general]\nnode_name = \"db-east-1\"\n").expect("write config");

    let cfg = Config::load_from(&path).expect("load");
    assert_eq!(cfg.general.node_name, "db-east-1");
}

#[test]
fn load_from_missing_file_is_io_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let err = Config::load_from(dir.path().join("missing.toml")).expect_err("should fail");
    assert!(err.to_string().starts_with("io:"));
}
