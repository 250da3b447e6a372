use super::*;

use std::collections::HashMap;

fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let vars: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |key| vars.get(key).cloned()
}

#[test]
fn missing_file_yields_defaults() {
    let dir = tempfile::tempdir().expect("tempdir");
    let settings =
        load_settings_with_env(&dir.path().join("groups.toml"), env_from(&[])).expect("settings");
    assert_eq!(settings, Settings::default());
    assert_eq!(settings.undo_window(), Duration::from_millis(3_000));
}

#[test]
fn file_values_override_defaults() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("groups.toml");
    fs::write(
        &path,
        "database_url = \"sqlite://./other.db\"\nundo_window_ms = 5000\n",
    )
    .expect("write config");

    let settings = load_settings_with_env(&path, env_from(&[])).expect("settings");
    assert_eq!(settings.database_url, "sqlite://./other.db");
    assert_eq!(settings.undo_window_ms, 5_000);
    assert_eq!(settings.log_filter, "info");
}

#[test]
fn environment_overrides_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("groups.toml");
    fs::write(&path, "undo_window_ms = 5000\n").expect("write config");

    let settings = load_settings_with_env(
        &path,
        env_from(&[
            ("GROUPS_DATABASE_URL", "sqlite://./a.db"),
            ("APP__DATABASE_URL", "sqlite://./b.db"),
            ("APP__UNDO_WINDOW_MS", "250"),
            ("APP__LOG_FILTER", "client_core=debug"),
        ]),
    )
    .expect("settings");
    assert_eq!(settings.database_url, "sqlite://./b.db");
    assert_eq!(settings.undo_window_ms, 250);
    assert_eq!(settings.log_filter, "client_core=debug");
}

#[test]
fn malformed_values_are_errors() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("groups.toml");

    let err = load_settings_with_env(&path, env_from(&[("APP__UNDO_WINDOW_MS", "soon")]))
        .expect_err("invalid env");
    assert!(matches!(
        err,
        SettingsError::InvalidValue {
            key: "APP__UNDO_WINDOW_MS",
            ..
        }
    ));

    fs::write(&path, "undo_window_ms = \"later\"\n").expect("write config");
    let err = load_settings_with_env(&path, env_from(&[])).expect_err("invalid file");
    assert!(matches!(err, SettingsError::Parse { .. }));
}
