use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

use crate::error::ErrorCode;

/// Keys every secret must carry.
pub const REQUIRED_SECRETS: [&str; 3] = ["bugzilla_url", "bugzilla_token", "api_url"];

/// Fatal configuration problems. These abort the run before any sync work.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing value {key} in secret {path}")]
    MissingSecret { key: &'static str, path: String },

    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {}: {message}", .path.display())]
    Parse { path: PathBuf, message: String },

    #[error("failed to fetch secret {path}: {message}")]
    Fetch { path: String, message: String },
}

impl ConfigError {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::MissingSecret { .. } | Self::Fetch { .. } => ErrorCode::MissingSecret,
            Self::Read { .. } | Self::Parse { .. } => ErrorCode::ConfigParseError,
        }
    }
}

/// Credentials and endpoints for one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Secrets {
    pub tracker_url: String,
    pub tracker_token: String,
    pub remote_api_url: String,
}

impl Secrets {
    /// Validate a raw secret map and pick the required keys out of it.
    ///
    /// Trailing slashes are stripped from both URLs.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingSecret`] naming the first required key
    /// that is absent or not a string.
    pub fn from_map(map: &Map<String, Value>, path: &str) -> Result<Self, ConfigError> {
        let get = |key: &'static str| {
            map.get(key)
                .and_then(Value::as_str)
                .map(ToOwned::to_owned)
                .ok_or_else(|| ConfigError::MissingSecret {
                    key,
                    path: path.to_string(),
                })
        };

        let [tracker_url, tracker_token, remote_api_url] = REQUIRED_SECRETS;
        Ok(Self {
            tracker_url: get(tracker_url)?.trim_end_matches('/').to_string(),
            tracker_token: get(tracker_token)?,
            remote_api_url: get(remote_api_url)?.trim_end_matches('/').to_string(),
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SyncConfig {
    #[serde(default)]
    pub secrets: SecretsConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub tracker: TrackerConfig,
    #[serde(default)]
    pub analyzer: AnalyzerConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecretsConfig {
    /// Secret path, e.g. `project/releng/shipit/bot`.
    #[serde(default)]
    pub path: Option<String>,
    /// Secrets service used with client credentials. Runs without
    /// credentials always go through the in-task proxy.
    #[serde(default = "default_secrets_base_url")]
    pub base_url: String,
}

impl Default for SecretsConfig {
    fn default() -> Self {
        Self {
            path: None,
            base_url: default_secrets_base_url(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackerConfig {
    /// Upper bound on concurrent attachment requests per query.
    #[serde(default = "default_attachment_workers")]
    pub attachment_workers: usize,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            attachment_workers: default_attachment_workers(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyzerConfig {
    #[serde(default = "default_analyzer_program")]
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            program: default_analyzer_program(),
            args: Vec::new(),
        }
    }
}

/// Load the config from `explicit`, else from the user config dir, else defaults.
///
/// An explicit path must exist; the user-level file is optional.
///
/// # Errors
///
/// Returns [`ConfigError::Read`] or [`ConfigError::Parse`] when a config file
/// exists but cannot be used.
pub fn load_config(explicit: Option<&Path>) -> Result<SyncConfig, ConfigError> {
    if let Some(path) = explicit {
        return read_config(path);
    }

    let Some(config_dir) = dirs::config_dir() else {
        return Ok(SyncConfig::default());
    };

    let path = config_dir.join("bugsync/config.toml");
    if !path.exists() {
        return Ok(SyncConfig::default());
    }

    read_config(&path)
}

fn read_config(path: &Path) -> Result<SyncConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    toml::from_str::<SyncConfig>(&content).map_err(|err| ConfigError::Parse {
        path: path.to_path_buf(),
        message: err.to_string(),
    })
}

/// Public Taskcluster secrets service.
pub const DEFAULT_SECRETS_URL: &str = "https://secrets.taskcluster.net/v1";

fn default_secrets_base_url() -> String {
    DEFAULT_SECRETS_URL.to_string()
}

const fn default_timeout_secs() -> u64 {
    60
}

fn default_user_agent() -> String {
    format!("bugsync/{}", env!("CARGO_PKG_VERSION"))
}

const fn default_attachment_workers() -> usize {
    4
}

fn default_analyzer_program() -> String {
    "patch-analysis".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn secret_map(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object, got {other}"),
        }
    }

    #[test]
    fn secrets_require_every_key() {
        let map = secret_map(json!({
            "bugzilla_url": "https://bugzilla.example.org/",
            "api_url": "https://api.example.org"
        }));

        let err = Secrets::from_map(&map, "project/bot").expect_err("token missing");
        assert!(matches!(
            err,
            ConfigError::MissingSecret {
                key: "bugzilla_token",
                ..
            }
        ));
        assert_eq!(
            err.to_string(),
            "missing value bugzilla_token in secret project/bot"
        );
        assert_eq!(err.code(), ErrorCode::MissingSecret);
    }

    #[test]
    fn secrets_strip_trailing_slashes() {
        let map = secret_map(json!({
            "bugzilla_url": "https://bugzilla.example.org/",
            "bugzilla_token": "tok",
            "api_url": "https://api.example.org//",
            "unrelated": 1
        }));

        let secrets = Secrets::from_map(&map, "p").expect("valid");
        assert_eq!(secrets.tracker_url, "https://bugzilla.example.org");
        assert_eq!(secrets.remote_api_url, "https://api.example.org");
        assert_eq!(secrets.tracker_token, "tok");
    }

    #[test]
    fn non_string_secret_counts_as_missing() {
        let map = secret_map(json!({
            "bugzilla_url": 5,
            "bugzilla_token": "tok",
            "api_url": "https://api.example.org"
        }));
        assert!(Secrets::from_map(&map, "p").is_err());
    }

    #[test]
    fn empty_config_uses_defaults() {
        let cfg: SyncConfig = toml::from_str("").expect("parse");
        assert_eq!(cfg, SyncConfig::default());
        assert_eq!(cfg.secrets.base_url, DEFAULT_SECRETS_URL);
        assert_eq!(cfg.http.timeout_secs, 60);
        assert_eq!(cfg.tracker.attachment_workers, 4);
        assert_eq!(cfg.analyzer.program, "patch-analysis");
    }

    #[test]
    fn explicit_config_file_is_loaded() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("bugsync.toml");
        std::fs::write(
            &path,
            r#"
[secrets]
path = "project/releng/shipit/bot"

[http]
timeout_secs = 5

[analyzer]
program = "/usr/local/bin/analyze"
args = ["--json"]
"#,
        )
        .expect("write config");

        let cfg = load_config(Some(&path)).expect("load");
        assert_eq!(cfg.secrets.path.as_deref(), Some("project/releng/shipit/bot"));
        assert_eq!(cfg.http.timeout_secs, 5);
        assert!(cfg.http.user_agent.starts_with("bugsync/"));
        assert_eq!(cfg.analyzer.args, vec!["--json".to_string()]);
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = load_config(Some(&dir.path().join("nope.toml"))).expect_err("missing");
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn malformed_config_reports_parse_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "[http]\ntimeout_secs = \"soon\"\n").expect("write");

        let err = load_config(Some(&path)).expect_err("bad type");
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert_eq!(err.code(), ErrorCode::ConfigParseError);
    }
}
