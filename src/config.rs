//! Configuration for dumph
//!
//! Settings live in `~/.config/dumph/config.toml`. Conduit credentials
//! can also come from the `~/.arcrc` file Arcanist writes, so an existing
//! `arc install-certificate` setup works without extra configuration.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Shown with any credential or connectivity failure.
pub const CREDENTIAL_HINT: &str = "check the [conduit] section of ~/.config/dumph/config.toml, \
     or run `arc install-certificate` to store a token in ~/.arcrc";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("could not determine the {0} directory")]
    NoDirectory(&'static str),
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Toml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("no Conduit host configured")]
    NoHost,
    #[error("no Conduit API token for {0}")]
    NoToken(String),
}

/// Main configuration structure
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub conduit: ConduitConfig,

    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConduitConfig {
    /// Phabricator base URL, e.g. "https://phabricator.example.com"
    #[serde(default)]
    pub host: Option<String>,

    /// Conduit API token ("api-...")
    #[serde(default)]
    pub token: Option<String>,

    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Ids per lookup request
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_batch_size() -> usize {
    crate::pagination::BATCH_SIZE
}

impl Default for ConduitConfig {
    fn default() -> Self {
        Self {
            host: None,
            token: None,
            timeout_secs: default_timeout_secs(),
            batch_size: default_batch_size(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// "csv" or "html"
    #[serde(default = "default_format")]
    pub format: String,

    /// File whose contents go into the `<head>` of html output
    #[serde(default)]
    pub assets: Option<PathBuf>,
}

fn default_format() -> String {
    "csv".to_string()
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: default_format(),
            assets: None,
        }
    }
}

impl Config {
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        let config_dir = dirs::config_dir().ok_or(ConfigError::NoDirectory("config"))?;
        Ok(config_dir.join("dumph").join("config.toml"))
    }

    /// Load configuration from `path`.
    /// Returns default config if the file doesn't exist
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Toml {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// The parts of Arcanist's `~/.arcrc` that hold Conduit credentials
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Arcrc {
    #[serde(default)]
    pub hosts: BTreeMap<String, ArcrcHost>,

    #[serde(default)]
    pub config: ArcrcConfig,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct ArcrcHost {
    #[serde(default)]
    pub token: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct ArcrcConfig {
    #[serde(default)]
    pub default: Option<String>,
}

impl Arcrc {
    pub fn path() -> Result<PathBuf, ConfigError> {
        let home = dirs::home_dir().ok_or(ConfigError::NoDirectory("home"))?;
        Ok(home.join(".arcrc"))
    }

    /// Returns an empty arcrc if the file doesn't exist
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| ConfigError::Json {
            path: path.to_path_buf(),
            source,
        })
    }

    /// The token stored for `host`, however either side spells the URL.
    pub fn token_for(&self, host: &str) -> Option<&str> {
        let wanted = api_base(host);
        self.hosts
            .iter()
            .find(|(url, _)| api_base(url) == wanted)
            .and_then(|(_, entry)| entry.token.as_deref())
            .filter(|token| !token.is_empty())
    }

    /// `config.default`, or the only host when there is exactly one.
    pub fn default_host(&self) -> Option<&str> {
        if let Some(host) = self.config.default.as_deref() {
            return Some(host);
        }
        let mut hosts = self.hosts.keys();
        match (hosts.next(), hosts.next()) {
            (Some(only), None) => Some(only.as_str()),
            _ => None,
        }
    }
}

/// Where to send requests and what to authenticate them with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Always ends in `/api/`
    pub api_base: String,
    pub token: String,
}

/// Pick the host (command line, then config, then arcrc) and its token
/// (config, then arcrc).
pub fn resolve_credentials(
    cli_host: Option<&str>,
    conduit: &ConduitConfig,
    arcrc: &Arcrc,
) -> Result<Credentials, ConfigError> {
    let host = cli_host
        .or(conduit.host.as_deref())
        .or_else(|| arcrc.default_host())
        .filter(|h| !h.trim().is_empty())
        .ok_or(ConfigError::NoHost)?;
    let api_base = api_base(host);

    let token = conduit
        .token
        .as_deref()
        .filter(|t| !t.is_empty())
        .or_else(|| arcrc.token_for(&api_base))
        .ok_or_else(|| ConfigError::NoToken(api_base.clone()))?;

    Ok(Credentials {
        token: token.to_string(),
        api_base,
    })
}

/// Normalize a host URL to its Conduit endpoint base:
/// `phab.example.com`, `https://phab.example.com/` and
/// `https://phab.example.com/api` all become `https://phab.example.com/api/`.
pub fn api_base(host: &str) -> String {
    let host = host.trim().trim_end_matches('/');
    let host = if host.contains("://") {
        host.to_string()
    } else {
        format!("https://{}", host)
    };
    let host = host.strip_suffix("/api").unwrap_or(&host);
    format!("{}/api/", host)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.conduit.timeout_secs, 60);
        assert_eq!(config.conduit.batch_size, 100);
        assert_eq!(config.output.format, "csv");
        assert!(config.conduit.host.is_none());
    }

    #[test]
    fn test_load_missing_config() {
        let temp_dir = TempDir::new().unwrap();
        let config = Config::load(&temp_dir.path().join("config.toml")).unwrap();
        assert_eq!(config.conduit.timeout_secs, 60);
    }

    #[test]
    fn test_load_config_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        fs::write(
            &path,
            r#"
[conduit]
host = "https://phab.example.com"
token = "api-secret"
batch_size = 50

[output]
format = "html"
assets = "/usr/share/dumph/report.html"
"#,
        )
        .unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.conduit.host.as_deref(), Some("https://phab.example.com"));
        assert_eq!(config.conduit.token.as_deref(), Some("api-secret"));
        assert_eq!(config.conduit.batch_size, 50);
        assert_eq!(config.conduit.timeout_secs, 60);
        assert_eq!(config.output.format, "html");
        assert_eq!(
            config.output.assets,
            Some(PathBuf::from("/usr/share/dumph/report.html"))
        );
    }

    #[test]
    fn test_invalid_config_reports_path() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        fs::write(&path, "[conduit\nhost = ").unwrap();

        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Toml { .. }));
        assert!(err.to_string().contains("config.toml"));
    }

    #[test]
    fn test_load_arcrc() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(".arcrc");
        fs::write(
            &path,
            r#"{
  "hosts": {
    "https://phab.example.com/api/": {"token": "api-from-arc"},
    "https://other.example.org/api/": {"token": "api-other"}
  },
  "config": {"default": "https://phab.example.com"}
}"#,
        )
        .unwrap();

        let arcrc = Arcrc::load(&path).unwrap();
        assert_eq!(arcrc.default_host(), Some("https://phab.example.com"));
        assert_eq!(arcrc.token_for("phab.example.com"), Some("api-from-arc"));
        assert_eq!(arcrc.token_for("https://other.example.org/"), Some("api-other"));
        assert_eq!(arcrc.token_for("https://unknown.example.net"), None);
    }

    #[test]
    fn test_missing_arcrc_is_empty() {
        let temp_dir = TempDir::new().unwrap();
        let arcrc = Arcrc::load(&temp_dir.path().join(".arcrc")).unwrap();
        assert!(arcrc.hosts.is_empty());
        assert_eq!(arcrc.default_host(), None);
    }

    #[test]
    fn test_api_base_normalization() {
        assert_eq!(api_base("phab.example.com"), "https://phab.example.com/api/");
        assert_eq!(api_base("https://phab.example.com/"), "https://phab.example.com/api/");
        assert_eq!(api_base("https://phab.example.com/api"), "https://phab.example.com/api/");
        assert_eq!(api_base("http://localhost:8080/api/"), "http://localhost:8080/api/");
    }

    fn arcrc_with(hosts: &[(&str, &str)], default: Option<&str>) -> Arcrc {
        Arcrc {
            hosts: hosts
                .iter()
                .map(|(url, token)| {
                    (
                        url.to_string(),
                        ArcrcHost {
                            token: Some(token.to_string()),
                        },
                    )
                })
                .collect(),
            config: ArcrcConfig {
                default: default.map(str::to_string),
            },
        }
    }

    #[test]
    fn test_credentials_precedence() {
        let arcrc = arcrc_with(
            &[
                ("https://a.example.com/api/", "api-a"),
                ("https://b.example.com/api/", "api-b"),
            ],
            Some("https://a.example.com"),
        );
        let mut conduit = ConduitConfig::default();

        // arcrc default host and its token
        let creds = resolve_credentials(None, &conduit, &arcrc).unwrap();
        assert_eq!(creds.api_base, "https://a.example.com/api/");
        assert_eq!(creds.token, "api-a");

        // config host beats the arcrc default
        conduit.host = Some("b.example.com".to_string());
        let creds = resolve_credentials(None, &conduit, &arcrc).unwrap();
        assert_eq!(creds.api_base, "https://b.example.com/api/");
        assert_eq!(creds.token, "api-b");

        // command line beats config
        let creds = resolve_credentials(Some("https://a.example.com/"), &conduit, &arcrc).unwrap();
        assert_eq!(creds.token, "api-a");

        // config token beats arcrc
        conduit.token = Some("api-config".to_string());
        let creds = resolve_credentials(None, &conduit, &arcrc).unwrap();
        assert_eq!(creds.token, "api-config");
    }

    #[test]
    fn test_single_arcrc_host_is_used() {
        let arcrc = arcrc_with(&[("https://only.example.com/api/", "api-only")], None);
        let creds = resolve_credentials(None, &ConduitConfig::default(), &arcrc).unwrap();
        assert_eq!(creds.api_base, "https://only.example.com/api/");
        assert_eq!(creds.token, "api-only");
    }

    #[test]
    fn test_missing_host_or_token() {
        let err = resolve_credentials(None, &ConduitConfig::default(), &Arcrc::default()).unwrap_err();
        assert!(matches!(err, ConfigError::NoHost));

        let err = resolve_credentials(
            Some("phab.example.com"),
            &ConduitConfig::default(),
            &Arcrc::default(),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::NoToken(ref host) if host == "https://phab.example.com/api/"));
    }
}
