use bugsync_core::config::{ConfigError, Secrets};
use bugsync_core::SecretProvider;
use serde_json::{Map, Value};
use std::path::PathBuf;
use tracing::info;
use url::Url;

use super::hawk::{self, Credentials};
use super::{Method, decode, send};

/// In-task Taskcluster proxy. Requests through it need no credentials.
pub const TASKCLUSTER_PROXY_URL: &str = "http://taskcluster/secrets/v1";

/// Taskcluster secrets service.
pub struct TaskclusterSecrets {
    agent: ureq::Agent,
    base_url: String,
    credentials: Option<Credentials>,
}

impl TaskclusterSecrets {
    /// With credentials, requests go to `base_url` and are Hawk-signed.
    /// Without, they go unsigned through [`TASKCLUSTER_PROXY_URL`].
    pub fn new(agent: ureq::Agent, base_url: &str, credentials: Option<Credentials>) -> Self {
        let base_url = if credentials.is_some() {
            base_url
        } else {
            TASKCLUSTER_PROXY_URL
        };
        Self {
            agent,
            base_url: base_url.trim_end_matches('/').to_string(),
            credentials,
        }
    }

    fn fetch(&self, path: &str) -> anyhow::Result<Value> {
        let url = format!("{}/secret/{}", self.base_url, path.trim_start_matches('/'));
        let mut request = self.agent.get(&url);
        if let Some(credentials) = &self.credentials {
            let header = hawk::sign(credentials, Method::Get, &Url::parse(&url)?, None)?;
            request = request.set("Authorization", &header);
        }
        let response = send(request, Method::Get, &url, None)?;
        Ok(decode(response, &url)?)
    }
}

impl SecretProvider for TaskclusterSecrets {
    fn load(&self, path: &str) -> Result<Secrets, ConfigError> {
        info!(path, "Loading secrets from Taskcluster");
        let fetched = self.fetch(path).map_err(|err| ConfigError::Fetch {
            path: path.to_string(),
            message: format!("{err:#}"),
        })?;
        let secret = secret_object(fetched).ok_or_else(|| ConfigError::Fetch {
            path: path.to_string(),
            message: "response has no secret object".to_string(),
        })?;
        Secrets::from_map(&secret, path)
    }
}

/// Secrets read from a local TOML or JSON file, for runs outside a task.
///
/// The file may hold the keys at the top level or under `secret`, as the
/// Taskcluster API returns them.
pub struct FileSecrets {
    path: PathBuf,
}

impl FileSecrets {
    pub const fn new(path: PathBuf) -> Self {
        Self { path }
    }

    fn read(&self) -> Result<Value, ConfigError> {
        let content = std::fs::read_to_string(&self.path).map_err(|source| ConfigError::Read {
            path: self.path.clone(),
            source,
        })?;

        let is_json = self
            .path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        let parsed = if is_json {
            serde_json::from_str::<Value>(&content).map_err(|err| err.to_string())
        } else {
            toml::from_str::<Value>(&content).map_err(|err| err.to_string())
        };

        parsed.map_err(|message| ConfigError::Parse {
            path: self.path.clone(),
            message,
        })
    }
}

impl SecretProvider for FileSecrets {
    fn load(&self, _path: &str) -> Result<Secrets, ConfigError> {
        let display = self.path.display().to_string();
        let secret = secret_object(self.read()?).ok_or_else(|| ConfigError::Parse {
            path: self.path.clone(),
            message: "expected a table of secret values".to_string(),
        })?;
        Secrets::from_map(&secret, &display)
    }
}

fn secret_object(value: Value) -> Option<Map<String, Value>> {
    let Value::Object(mut map) = value else {
        return None;
    };
    match map.remove("secret") {
        Some(Value::Object(inner)) => Some(inner),
        Some(other) => {
            map.insert("secret".to_string(), other);
            Some(map)
        }
        None => Some(map),
    }
}
