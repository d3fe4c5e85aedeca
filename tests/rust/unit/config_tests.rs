//! Unit tests for translator configuration loading

use std::io::Write;

use queryweave::config::{ConfigError, OutputFormat, TranslatorConfig};
use serial_test::serial;

const ENV_KEYS: [&str; 3] = [
    "QUERYWEAVE_MAX_SUBQUERY_DEPTH",
    "QUERYWEAVE_OUTPUT_FORMAT",
    "QUERYWEAVE_LOG",
];

fn clear_env() {
    for key in ENV_KEYS {
        std::env::remove_var(key);
    }
}

#[test]
#[serial]
fn test_from_env_defaults() {
    clear_env();
    let config = TranslatorConfig::from_env().unwrap();
    assert_eq!(config, TranslatorConfig::default());
}

#[test]
#[serial]
fn test_from_env_values() {
    clear_env();
    std::env::set_var("QUERYWEAVE_MAX_SUBQUERY_DEPTH", "12");
    std::env::set_var("QUERYWEAVE_OUTPUT_FORMAT", "json");
    std::env::set_var("QUERYWEAVE_LOG", "queryweave=trace");

    let config = TranslatorConfig::from_env().unwrap();
    clear_env();

    assert_eq!(config.max_subquery_depth, 12);
    assert_eq!(config.output_format, OutputFormat::Json);
    assert_eq!(config.log_filter, "queryweave=trace");
    assert_eq!(config.to_rewrite_ctx().max_subquery_depth, 12);
}

#[test]
#[serial]
fn test_from_env_rejects_unparsable_depth() {
    clear_env();
    std::env::set_var("QUERYWEAVE_MAX_SUBQUERY_DEPTH", "deep");
    let result = TranslatorConfig::from_env();
    clear_env();

    match result {
        Err(ConfigError::Parse { field, value, .. }) => {
            assert_eq!(field, "QUERYWEAVE_MAX_SUBQUERY_DEPTH");
            assert_eq!(value, "deep");
        }
        other => panic!("expected parse error, got {:?}", other),
    }
}

#[test]
#[serial]
fn test_from_env_validates_range() {
    clear_env();
    std::env::set_var("QUERYWEAVE_MAX_SUBQUERY_DEPTH", "0");
    let result = TranslatorConfig::from_env();
    clear_env();

    assert!(matches!(result, Err(ConfigError::Validation(_))));
}

#[test]
fn test_from_yaml_file_with_partial_settings() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "max_subquery_depth: 8").unwrap();
    writeln!(file, "output_format: json").unwrap();

    let config = TranslatorConfig::from_yaml_file(file.path()).unwrap();
    assert_eq!(config.max_subquery_depth, 8);
    assert_eq!(config.output_format, OutputFormat::Json);
    assert_eq!(config.log_filter, "info");
}

#[test]
fn test_from_yaml_file_out_of_range() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "max_subquery_depth: 4096").unwrap();

    let result = TranslatorConfig::from_yaml_file(file.path());
    assert!(matches!(result, Err(ConfigError::Validation(_))));
}

#[test]
fn test_missing_yaml_file() {
    let dir = tempfile::tempdir().unwrap();
    let result = TranslatorConfig::from_yaml_file(dir.path().join("absent.yaml"));
    assert!(matches!(result, Err(ConfigError::Parse { ref field, .. }) if field == "yaml_file"));
}
