use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Backend used when neither the config file nor the environment names one
pub const DEFAULT_API_URL: &str = "http://localhost:5000/api";

pub const DEFAULT_PREVIEW_PORT: u16 = 8080;

pub const ENV_API_URL: &str = "SITEKIT_API_URL";
pub const ENV_TOKEN: &str = "SITEKIT_TOKEN";

/// Raw TOML configuration structure
/// Every section and field is optional; defaults are filled in on conversion
#[derive(Debug, Default, Deserialize)]
struct RawConfig {
    #[serde(default)]
    api: RawApiConfig,
    #[serde(default)]
    preview: RawPreviewConfig,
}

#[derive(Debug, Default, Deserialize)]
struct RawApiConfig {
    base_url: Option<String>,
    token: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawPreviewConfig {
    port: Option<u16>,
}

/// Resolved client configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Config {
    pub api: ApiConfig,
    pub preview: PreviewConfig,
}

/// Generation backend connection settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApiConfig {
    pub base_url: String,
    /// Bearer credential, never logged
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PreviewConfig {
    pub port: u16,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api: ApiConfig {
                base_url: DEFAULT_API_URL.to_string(),
                token: None,
            },
            preview: PreviewConfig {
                port: DEFAULT_PREVIEW_PORT,
            },
        }
    }
}

impl Config {
    /// Apply `SITEKIT_API_URL` / `SITEKIT_TOKEN` from the process environment
    pub fn with_env(self) -> Result<Self> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary lookup (the environment, in production)
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_API_URL) {
            self.api.base_url = validate_base_url(&url, ENV_API_URL)?;
        }
        if let Some(token) = lookup(ENV_TOKEN) {
            self.api.token = normalize_token(Some(token));
        }
        Ok(self)
    }

    /// Serialize back to the on-disk TOML layout
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::InvalidData(e.to_string()))
    }
}

/// Path to the global config file: `~/.sitekit/config.toml`
pub fn default_config_path() -> Result<PathBuf> {
    let home = std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .map_err(|_| Error::ConfigParse("Could not determine home directory".to_string()))?;
    Ok(PathBuf::from(home).join(".sitekit").join("config.toml"))
}

/// Load config from a file path. A missing file yields the defaults.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let path = path.as_ref();
    if !path.exists() {
        tracing::debug!(path = %path.display(), "No config file, using defaults");
        return Ok(Config::default());
    }
    let content = fs::read_to_string(path)?;
    parse_config_str(&content)
}

/// Write config to a file path, creating the parent directory
pub fn save_config<P: AsRef<Path>>(path: P, config: &Config) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, config.to_toml_string()?)?;
    Ok(())
}

/// Parse config from a string (useful for testing)
pub fn parse_config_str(content: &str) -> Result<Config> {
    let raw: RawConfig = toml::from_str(content)?;

    let base_url = match raw.api.base_url {
        Some(url) => validate_base_url(&url, "api.base_url")?,
        None => DEFAULT_API_URL.to_string(),
    };

    let port = raw.preview.port.unwrap_or(DEFAULT_PREVIEW_PORT);
    if port == 0 {
        return Err(Error::ConfigParse(
            "preview.port must be between 1 and 65535".to_string(),
        ));
    }

    Ok(Config {
        api: ApiConfig {
            base_url,
            token: normalize_token(raw.api.token),
        },
        preview: PreviewConfig { port },
    })
}

/// Validate a backend URL and trim trailing slashes.
///
/// Only `http://` and `https://` URLs are accepted; the field name is
/// included in the error so the user can find the bad value.
pub fn validate_base_url(url: &str, field_name: &str) -> Result<String> {
    let trimmed = url.trim();
    if trimmed.is_empty() {
        return Err(Error::ConfigParse(format!("Empty URL in '{}'", field_name)));
    }
    if !(trimmed.starts_with("http://") || trimmed.starts_with("https://")) {
        return Err(Error::ConfigParse(format!(
            "URL in '{}' must start with http:// or https://: '{}'",
            field_name, trimmed
        )));
    }
    Ok(trimmed.trim_end_matches('/').to_string())
}

pub fn normalize_token(token: Option<String>) -> Option<String> {
    token
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_empty_config_uses_defaults() {
        let config = parse_config_str("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.api.base_url, DEFAULT_API_URL);
        assert_eq!(config.preview.port, 8080);
    }

    #[test]
    fn test_parse_full_config() {
        let toml = r#"
[api]
base_url = "https://sites.example.com/api/"
token = "  secret-token  "

[preview]
port = 9000
        "#;

        let config = parse_config_str(toml).unwrap();
        assert_eq!(config.api.base_url, "https://sites.example.com/api");
        assert_eq!(config.api.token.as_deref(), Some("secret-token"));
        assert_eq!(config.preview.port, 9000);
    }

    #[test]
    fn test_parse_config_rejects_bad_scheme() {
        let result = parse_config_str("[api]\nbase_url = \"ftp://example.com\"\n");
        assert!(result.is_err());
        let message = result.unwrap_err().to_string();
        assert!(message.contains("api.base_url"));
        assert!(message.contains("http://"));
    }

    #[test]
    fn test_parse_config_rejects_zero_port() {
        let result = parse_config_str("[preview]\nport = 0\n");
        assert!(result.unwrap_err().to_string().contains("preview.port"));
    }

    #[test]
    fn test_empty_token_is_absent() {
        let config = parse_config_str("[api]\ntoken = \"\"\n").unwrap();
        assert!(config.api.token.is_none());
    }

    #[test]
    fn test_overrides_take_precedence() {
        let config = parse_config_str("[api]\ntoken = \"from-file\"\n")
            .unwrap()
            .with_overrides(|key| match key {
                ENV_API_URL => Some("http://127.0.0.1:5000/api/".to_string()),
                ENV_TOKEN => Some("from-env".to_string()),
                _ => None,
            })
            .unwrap();

        assert_eq!(config.api.base_url, "http://127.0.0.1:5000/api");
        assert_eq!(config.api.token.as_deref(), Some("from-env"));
    }

    #[test]
    fn test_override_validates_url() {
        let result = Config::default().with_overrides(|key| {
            (key == ENV_API_URL).then(|| "localhost:5000".to_string())
        });
        assert!(result.unwrap_err().to_string().contains(ENV_API_URL));
    }

    #[test]
    fn test_missing_file_loads_defaults() {
        let dir = TempDir::new().unwrap();
        let config = load_config(dir.path().join("config.toml")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_save_then_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let mut config = Config::default();
        config.api.token = Some("abc".to_string());
        config.preview.port = 8181;

        save_config(&path, &config).unwrap();
        assert_eq!(load_config(&path).unwrap(), config);
    }
}
