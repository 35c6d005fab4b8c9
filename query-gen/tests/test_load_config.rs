use serial_test::serial;
use std::env;
use std::fs::write;
use std::path::PathBuf;
use tempfile::NamedTempFile;

use query_gen::cli::{resolve_config, GenerateArgs};
use query_gen::load_config::load_config;
use query_gen_core::config::GeneratorConfig;

#[test]
#[serial]
fn test_load_config_full_file() {
    let config_yaml = r#"
collection_source: https://github.com/ansible-collections/vmware.vmware
collection_name: vmware.vmware
output_path: ./out/event_query.yml
report_path: ./out/review.txt
modules_to_analyze: [guest_info, vm]
extension_version: 1.4.0
check_mode: true
model:
  model: some-model
  timeout_secs: 30
  max_retries: 5
  batch_size: 4
cache_dir: ./.cache
http:
  timeout_secs: 10
  github_api: https://github.example.com/api/v3
"#;
    let config_file = NamedTempFile::new().expect("temp file");
    write(config_file.path(), config_yaml).unwrap();
    env::set_var("ANTHROPIC_API_KEY", "sk-from-env");
    env::remove_var("GITHUB_TOKEN");

    let config = load_config(config_file.path()).expect("Config should load");

    assert_eq!(
        config.collection_source,
        "https://github.com/ansible-collections/vmware.vmware"
    );
    assert_eq!(config.output_path, PathBuf::from("./out/event_query.yml"));
    assert_eq!(config.resolved_report_path(), PathBuf::from("./out/review.txt"));
    assert_eq!(
        config.modules_to_analyze.as_deref(),
        Some(&["guest_info".to_string(), "vm".to_string()][..])
    );
    assert!(config.check_mode);
    assert_eq!(config.model.batch_size, 4);
    assert_eq!(config.model.max_retries, 5);
    assert_eq!(config.model.api_key.as_deref(), Some("sk-from-env"));
    assert_eq!(config.http.github_api, "https://github.example.com/api/v3");
    assert_eq!(config.http.galaxy_api, "https://galaxy.ansible.com");
    assert!(config.http.github_token.is_none());

    env::remove_var("ANTHROPIC_API_KEY");
}

#[test]
#[serial]
fn test_api_key_in_file_is_ignored() {
    let config_file = NamedTempFile::new().expect("temp file");
    write(
        config_file.path(),
        "collection_source: cisco.ios\nmodel:\n  api_key: sk-in-file\n",
    )
    .unwrap();
    env::remove_var("ANTHROPIC_API_KEY");

    let config = load_config(config_file.path()).expect("Config should load");
    assert!(config.model.api_key.is_none());
}

#[test]
#[serial]
fn test_flags_override_file_values() {
    let config_file = NamedTempFile::new().expect("temp file");
    write(
        config_file.path(),
        "collection_source: cisco.ios\noutput_path: ./from-file.yml\n",
    )
    .unwrap();
    env::remove_var("ANTHROPIC_API_KEY");

    let args = GenerateArgs {
        config: Some(config_file.path().to_path_buf()),
        output: Some(PathBuf::from("./from-flag.yml")),
        modules: vec!["ios_facts".into()],
        api_key: Some("sk-flag".into()),
        ..Default::default()
    };
    let config = resolve_config(&args).expect("Config should resolve");
    assert_eq!(config.collection_source, "cisco.ios");
    assert_eq!(config.output_path, PathBuf::from("./from-flag.yml"));
    assert_eq!(config.modules_to_analyze, Some(vec!["ios_facts".to_string()]));
    assert_eq!(config.model.api_key.as_deref(), Some("sk-flag"));
}

#[test]
#[serial]
fn test_load_config_errors_on_missing_file_and_bad_yaml() {
    assert!(load_config("/definitely/not/here.yml").is_err());

    let config_file = NamedTempFile::new().expect("temp file");
    write(config_file.path(), "collection_source: [unclosed").unwrap();
    let err = load_config(config_file.path()).unwrap_err();
    assert!(err.to_string().contains("Failed to parse config YAML"));
}

#[test]
#[serial]
fn test_minimal_file_keeps_core_defaults() {
    let config_file = NamedTempFile::new().expect("temp file");
    write(config_file.path(), "collection_source: cisco.ios\nmodel:\n  batch_size: 2\n").unwrap();
    env::remove_var("ANTHROPIC_API_KEY");

    let config = load_config(config_file.path()).expect("Config should load");
    let defaults = GeneratorConfig::default();
    assert_eq!(config.collection_source, "cisco.ios");
    assert_eq!(config.output_path, defaults.output_path);
    assert_eq!(config.extension_version, defaults.extension_version);
    assert_eq!(config.model.batch_size, 2);
    assert_eq!(config.model.endpoint, defaults.model.endpoint);
    assert_eq!(config.http.timeout_secs, defaults.http.timeout_secs);
    assert!(!config.check_mode);
}
