use std::env;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use toml::Value;

use crate::ids::PropertyId;

pub const DEFAULT_CONFIG_PATH: &str = ".wikibadges/config.toml";
pub const DEFAULT_COMMONS_CATEGORY_PROPERTY: &str = "P373";
pub const DEFAULT_API_URL: &str = "https://www.wikidata.org/w/api.php";
pub const DEFAULT_USER_AGENT: &str = "wikibadges/0.2";
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

const PROPERTY_ENV: &str = "WIKIBADGES_COMMONS_CATEGORY_PROPERTY";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("commons_category_property must be a property id string or empty, got {found}")]
    WrongType { found: &'static str },
    #[error("commons_category_property {value:?} is not a property id")]
    Malformed { value: String },
}

/// Raw file layout. The property setting is kept untyped so that a value of
/// the wrong type is reported as a [`ConfigError`] instead of a parse error.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
pub struct BadgesConfig {
    #[serde(default)]
    pub sidebar: SidebarSection,
    #[serde(default)]
    pub api: ApiSection,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
pub struct SidebarSection {
    pub commons_category_property: Option<Value>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct ApiSection {
    pub url: Option<String>,
    pub user_agent: Option<String>,
    pub timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiSettings {
    pub url: String,
    pub user_agent: String,
    pub timeout_ms: u64,
}

impl BadgesConfig {
    /// Resolve the commons category property: env > config > default.
    /// `Ok(None)` means the feature is disabled (empty string, or `none` in
    /// the environment).
    pub fn commons_category_property(&self) -> Result<Option<PropertyId>, ConfigError> {
        if let Ok(value) = env::var(PROPERTY_ENV) {
            let trimmed = value.trim();
            if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("none") {
                return Ok(None);
            }
            return parse_property_setting(&Value::String(trimmed.to_string()));
        }
        match &self.sidebar.commons_category_property {
            Some(value) => parse_property_setting(value),
            None => parse_property_setting(&Value::String(
                DEFAULT_COMMONS_CATEGORY_PROPERTY.to_string(),
            )),
        }
    }

    /// Resolve API settings: env > config > defaults.
    pub fn api_settings(&self) -> ApiSettings {
        ApiSettings {
            url: env_override("WIKIBADGES_API_URL")
                .or_else(|| self.api.url.clone())
                .unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            user_agent: env_override("WIKIBADGES_USER_AGENT")
                .or_else(|| self.api.user_agent.clone())
                .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string()),
            timeout_ms: env_override("WIKIBADGES_HTTP_TIMEOUT_MS")
                .and_then(|value| value.parse::<u64>().ok())
                .or(self.api.timeout_ms)
                .unwrap_or(DEFAULT_TIMEOUT_MS),
        }
    }
}

/// Validate a raw property setting. Strings must parse as a property id, or
/// be empty to disable the feature; every other type is rejected.
pub fn parse_property_setting(value: &Value) -> Result<Option<PropertyId>, ConfigError> {
    match value {
        Value::String(raw) if raw.trim().is_empty() => Ok(None),
        Value::String(raw) => PropertyId::parse(raw)
            .map(Some)
            .map_err(|_| ConfigError::Malformed { value: raw.clone() }),
        other => Err(ConfigError::WrongType {
            found: other.type_str(),
        }),
    }
}

fn env_override(key: &str) -> Option<String> {
    let value = env::var(key).ok()?;
    let trimmed = value.trim().to_string();
    if trimmed.is_empty() { None } else { Some(trimmed) }
}

/// Load and validate a BadgesConfig from a TOML file. Returns default if the
/// file doesn't exist. An invalid property setting fails here, before any
/// sidebar is touched.
pub fn load_config(config_path: &Path) -> Result<BadgesConfig> {
    let config = if config_path.exists() {
        let content = fs::read_to_string(config_path)
            .with_context(|| format!("failed to read {}", config_path.display()))?;
        toml::from_str::<BadgesConfig>(&content)
            .with_context(|| format!("failed to parse {}", config_path.display()))?
    } else {
        BadgesConfig::default()
    };
    config
        .commons_category_property()
        .with_context(|| format!("invalid setting in {}", config_path.display()))?;
    Ok(config)
}

/// Set or clear `[sidebar] commons_category_property` while preserving all
/// other config sections. `None` writes an empty string, which disables the
/// feature. Returns `true` when a write occurred.
pub fn patch_sidebar_config(config_path: &Path, property: Option<&PropertyId>) -> Result<bool> {
    let mut root = if config_path.exists() {
        let content = fs::read_to_string(config_path)
            .with_context(|| format!("failed to read {}", config_path.display()))?;
        toml::from_str::<Value>(&content)
            .with_context(|| format!("failed to parse {}", config_path.display()))?
    } else {
        Value::Table(Default::default())
    };
    let original = root.clone();

    let root_table = root.as_table_mut().ok_or_else(|| {
        anyhow::anyhow!(
            "top-level TOML must be a table in {}",
            config_path.display()
        )
    })?;
    let sidebar_entry = root_table
        .entry("sidebar".to_string())
        .or_insert_with(|| Value::Table(Default::default()));
    let sidebar_table = sidebar_entry.as_table_mut().ok_or_else(|| {
        anyhow::anyhow!("[sidebar] must be a table in {}", config_path.display())
    })?;
    let rendered_property = property.map(ToString::to_string).unwrap_or_default();
    sidebar_table.insert(
        "commons_category_property".to_string(),
        Value::String(rendered_property),
    );

    if root == original {
        return Ok(false);
    }

    if let Some(parent) = config_path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let rendered = toml::to_string_pretty(&root).context("failed to serialize config TOML")?;
    fs::write(config_path, rendered)
        .with_context(|| format!("failed to write {}", config_path.display()))?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use tempfile::tempdir;

    // Tests below never set WIKIBADGES_* variables, so resolution only sees
    // the file contents.

    fn parse(content: &str) -> BadgesConfig {
        toml::from_str(content).expect("parse config")
    }

    #[test]
    fn default_config_uses_p373() {
        let config = BadgesConfig::default();
        let property = config.commons_category_property().expect("valid");
        assert_eq!(property.map(|p| p.to_string()), Some("P373".to_string()));
    }

    #[test]
    fn empty_string_disables_the_feature() {
        let config = parse("[sidebar]\ncommons_category_property = \"\"\n");
        assert_eq!(config.commons_category_property(), Ok(None));
    }

    #[test]
    fn explicit_property_is_used() {
        let config = parse("[sidebar]\ncommons_category_property = \"p12\"\n");
        let property = config.commons_category_property().expect("valid");
        assert_eq!(property.map(|p| p.to_string()), Some("P12".to_string()));
    }

    #[rstest]
    #[case("commons_category_property = [\":(\"]", "array")]
    #[case("commons_category_property = false", "boolean")]
    #[case("commons_category_property = 373", "integer")]
    #[case("commons_category_property = { id = \"P373\" }", "table")]
    fn wrong_types_are_configuration_errors(#[case] line: &str, #[case] found: &'static str) {
        let config = parse(&format!("[sidebar]\n{line}\n"));
        assert_eq!(
            config.commons_category_property(),
            Err(ConfigError::WrongType { found })
        );
    }

    #[rstest]
    #[case("Q373")]
    #[case(":(")]
    #[case("P")]
    fn malformed_strings_are_configuration_errors(#[case] value: &str) {
        let config = parse(&format!("[sidebar]\ncommons_category_property = \"{value}\"\n"));
        assert_eq!(
            config.commons_category_property(),
            Err(ConfigError::Malformed {
                value: value.to_string()
            })
        );
    }

    #[test]
    fn load_config_returns_default_for_missing_file() {
        let config = load_config(Path::new("/nonexistent/config.toml")).expect("load config");
        assert_eq!(config, BadgesConfig::default());
    }

    #[test]
    fn load_config_fails_fast_on_invalid_property() {
        let temp = tempdir().expect("tempdir");
        let config_path = temp.path().join("config.toml");
        fs::write(&config_path, "[sidebar]\ncommons_category_property = false\n")
            .expect("write config");
        let error = load_config(&config_path).expect_err("must fail");
        assert!(error.to_string().contains("invalid setting"));
    }

    #[test]
    fn load_config_returns_error_for_invalid_toml() {
        let temp = tempdir().expect("tempdir");
        let config_path = temp.path().join("config.toml");
        fs::write(&config_path, "[sidebar\nurl = \"oops\"").expect("write config");
        let error = load_config(&config_path).expect_err("must fail");
        assert!(error.to_string().contains("failed to parse"));
    }

    #[test]
    fn api_settings_fall_back_to_defaults() {
        let config = parse("[api]\nuser_agent = \"test-agent/1.0\"\n");
        let settings = config.api_settings();
        assert_eq!(settings.url, DEFAULT_API_URL);
        assert_eq!(settings.user_agent, "test-agent/1.0");
        assert_eq!(settings.timeout_ms, DEFAULT_TIMEOUT_MS);
    }

    #[test]
    fn patch_sidebar_config_preserves_other_sections() {
        let temp = tempdir().expect("tempdir");
        let config_path = temp.path().join(".wikibadges").join("config.toml");
        fs::create_dir_all(config_path.parent().expect("parent")).expect("mkdir");
        fs::write(&config_path, "[api]\nurl = \"https://test.wikidata.org/w/api.php\"\n")
            .expect("write config");

        let property = PropertyId::parse("P12").expect("property");
        assert!(patch_sidebar_config(&config_path, Some(&property)).expect("patch"));
        assert!(!patch_sidebar_config(&config_path, Some(&property)).expect("patch again"));

        let config = load_config(&config_path).expect("load config");
        assert_eq!(
            config.api.url.as_deref(),
            Some("https://test.wikidata.org/w/api.php")
        );
        assert_eq!(config.commons_category_property(), Ok(Some(property)));

        assert!(patch_sidebar_config(&config_path, None).expect("disable"));
        let config = load_config(&config_path).expect("load config");
        assert_eq!(config.commons_category_property(), Ok(None));
    }
}
