use std::io::Write;

use std::path::Path;

use sport_analyst::{AnalystConfig, Analyzer, BackendKind};

/// Load without consulting the process environment.
fn load_isolated(path: &Path) -> anyhow::Result<AnalystConfig> {
    AnalystConfig::load_with(path, |_| None)
}

#[test]
fn loads_toml_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
bulk_concurrency = 6

[backend]
kind = "cloud"
provider = "anthropic"
model = "claude-sonnet-4-20250514"
timeout_ms = 12000

[weights]
computer_vision = 0.20
sport_specific = 0.35
benchmarking = 0.20
injury_risk = 0.10
coaching = 0.15
"#
    )
    .unwrap();

    let config = load_isolated(file.path()).unwrap();
    assert_eq!(config.bulk_concurrency, 6);
    assert_eq!(config.min_ai_tags, 3);
    assert!(config.validate().is_ok());

    let descriptor = config.descriptor();
    assert_eq!(descriptor.kind, BackendKind::Cloud);
    assert_eq!(descriptor.endpoint_ref, "https://api.anthropic.com/v1");
    assert_eq!(descriptor.timeout_ms, 12_000);
    assert_eq!(config.weights.sport_specific, 0.35);
}

#[test]
fn missing_file_is_reported_with_its_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.toml");
    let err = load_isolated(&path).unwrap_err();
    assert!(format!("{err:#}").contains("absent.toml"));
}

#[test]
fn malformed_file_is_rejected() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "bulk_concurrency = \"many\"").unwrap();
    assert!(load_isolated(file.path()).is_err());
}

#[tokio::test]
async fn invalid_file_values_fail_analyzer_construction() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "bulk_concurrency = 0").unwrap();
    let config = load_isolated(file.path()).unwrap();
    let err = Analyzer::new(config).err().unwrap();
    assert!(err.is_configuration());
}

#[test]
fn overrides_win_over_file_values() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "[backend]\nkind = \"local\"\ntimeout_ms = 12000").unwrap();

    let config = AnalystConfig::load_with(file.path(), |name| match name {
        "ANALYST_TIMEOUT_MS" => Some("4500".to_string()),
        "ANALYST_MODEL" => Some("tagger-v2".to_string()),
        _ => None,
    })
    .unwrap();

    assert_eq!(config.backend.timeout_ms, 4_500);
    assert_eq!(config.backend.model, "tagger-v2");
    assert_eq!(config.backend.kind, BackendKind::Local);
}
