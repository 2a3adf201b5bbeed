// src/config/settings.rs

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

/// Settings as read from `settings.json`.
///
/// ```json
/// {
///     "devUrl": "http://localhost:8888",
///     "proxyPort": 3000,
///     "themeBase": "wp-content/themes",
///     "themeName": "base"
/// }
/// ```
///
/// Only `devUrl` is required; everything else has defaults matching the
/// conventional theme layout.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    /// Upstream URL the local dev proxy forwards to.
    pub dev_url: String,

    /// Local port the dev proxy listens on.
    #[serde(default = "default_proxy_port")]
    pub proxy_port: u16,

    /// Directory containing all themes.
    #[serde(default = "default_theme_base")]
    pub theme_base: String,

    /// Name of the theme to build.
    #[serde(default = "default_theme_name")]
    pub theme_name: String,

    /// Optional class-selector namespace applied by the stylesheet task.
    #[serde(default)]
    pub css_namespace: Option<String>,
}

fn default_proxy_port() -> u16 {
    3000
}

fn default_theme_base() -> String {
    "wp-content/themes".to_string()
}

fn default_theme_name() -> String {
    "base".to_string()
}

/// Load settings from a JSON file.
///
/// A missing or malformed file is a hard error: the dev proxy cannot start
/// without an upstream URL, so there is no recovery path. The URL itself is
/// not validated here; a bad value surfaces when the proxy fails to connect.
pub fn load_settings(path: impl AsRef<Path>) -> Result<Settings> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)
        .with_context(|| format!("reading settings file at {:?}", path))?;

    let settings: Settings = serde_json::from_str(&contents)
        .with_context(|| format!("parsing JSON settings from {:?}", path))?;

    Ok(settings)
}

/// Immutable build-wide configuration, populated once at startup and
/// threaded into every task invocation as a parameter.
#[derive(Debug, Clone)]
pub struct BuildConfig {
    /// Production mode: reload notifications become no-ops.
    pub production: bool,
    pub settings: Settings,
}

impl BuildConfig {
    pub fn new(production: bool, settings: Settings) -> Self {
        Self {
            production,
            settings,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn loads_minimal_settings_with_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, r#"{ "devUrl": "http://localhost:8888" }"#).unwrap();

        let s = load_settings(&path).unwrap();
        assert_eq!(s.dev_url, "http://localhost:8888");
        assert_eq!(s.proxy_port, 3000);
        assert_eq!(s.theme_base, "wp-content/themes");
        assert_eq!(s.theme_name, "base");
        assert!(s.css_namespace.is_none());
    }

    #[test]
    fn missing_settings_file_is_an_error() {
        let dir = tempdir().unwrap();
        assert!(load_settings(dir.path().join("nope.json")).is_err());
    }

    #[test]
    fn malformed_settings_file_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(load_settings(&path).is_err());
    }

    #[test]
    fn missing_dev_url_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, r#"{ "proxyPort": 3001 }"#).unwrap();
        assert!(load_settings(&path).is_err());
    }
}
