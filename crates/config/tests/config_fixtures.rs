//! Integration tests for parsing config fixtures.

use insight_config::{
    CURRENT_CONFIG_VERSION, InsightConfig, StateStorageMode, parse_insight_config_json,
    parse_insight_config_toml, to_pretty_toml,
};
use insight_shared::ErrorCode;
use std::error::Error;
use std::fs;
use std::path::Path;

fn read_fixture(name: &str) -> Result<String, Box<dyn Error>> {
    let path = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name);
    Ok(fs::read_to_string(path)?)
}

#[test]
fn parses_valid_fixture_and_normalizes() -> Result<(), Box<dyn Error>> {
    let config = parse_insight_config_json(&read_fixture("insight.valid.json")?)?;

    assert_eq!(config.version, CURRENT_CONFIG_VERSION);
    assert_eq!(
        config.remote.api_base_url.as_ref(),
        "https://index.example.com",
        "base url should be trimmed"
    );
    assert_eq!(config.remote.max_concurrent_requests, Some(8));
    assert_eq!(config.sync.max_batch_bytes, 1_048_576);

    let directories: Vec<&str> = config
        .sync
        .ignore_patterns
        .directories
        .iter()
        .map(AsRef::as_ref)
        .collect();
    assert_eq!(directories, vec!["(^|/)node_modules$", "(^|/)target$"]);
    Ok(())
}

#[test]
fn default_toml_fixture_matches_defaults() -> Result<(), Box<dyn Error>> {
    let config = parse_insight_config_toml(&read_fixture("insight.default.toml")?)?;
    let defaults = InsightConfig::default().validate_and_normalize()?;

    assert_eq!(config, defaults);
    assert_eq!(config.state.storage, StateStorageMode::Project);
    Ok(())
}

#[test]
fn invalid_version_fixture_is_rejected() -> Result<(), Box<dyn Error>> {
    let error = parse_insight_config_json(&read_fixture("insight.invalid-version.json")?)
        .err()
        .ok_or("expected version error")?;

    assert_eq!(error.code, ErrorCode::new("config", "invalid_version"));
    assert_eq!(error.metadata_value("found"), Some("7"));
    Ok(())
}

#[test]
fn pretty_toml_parses_back() -> Result<(), Box<dyn Error>> {
    let config = parse_insight_config_json(&read_fixture("insight.valid.json")?)?;
    let rendered = to_pretty_toml(&config)?;
    let reparsed = parse_insight_config_toml(&rendered)?;

    assert_eq!(reparsed, config);
    Ok(())
}
