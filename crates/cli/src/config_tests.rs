// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Knita Contributors

use super::*;

#[test]
fn missing_file_yields_defaults() {
    let config = CliConfig::load(Some(Path::new("/nonexistent/.knita.yaml"))).unwrap();
    assert!(!config.executors.local.disabled);
    assert!(config.executors.local.labels.is_empty());
    assert!(config.executors.remote.is_empty());
}

#[test]
fn full_config_parses() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(".knita.yaml");
    std::fs::write(
        &path,
        concat!(
            "executors:\n",
            "  local:\n",
            "    disabled: true\n",
            "    labels:\n",
            "      - linux\n",
            "  remote:\n",
            "    - address: 10.0.0.5:9091\n",
            "    - disabled: true\n",
            "      address: 10.0.0.6:9091\n",
        ),
    )
    .unwrap();
    let config = CliConfig::load(Some(&path)).unwrap();
    assert!(config.executors.local.disabled);
    assert_eq!(config.executors.local.labels, vec!["linux"]);
    assert_eq!(config.executors.remote.len(), 2);
    assert_eq!(config.executors.remote[0].address, "10.0.0.5:9091");
    assert!(!config.executors.remote[0].disabled);
    assert!(config.executors.remote[1].disabled);
}

#[test]
fn malformed_yaml_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(".knita.yaml");
    std::fs::write(&path, "executors: [").unwrap();
    assert!(CliConfig::load(Some(&path)).is_err());
}

#[test]
fn default_path_is_under_home() {
    if let Some(path) = default_path() {
        assert!(path.ends_with(".knita.yaml"));
    }
}
