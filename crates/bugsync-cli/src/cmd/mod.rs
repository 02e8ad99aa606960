pub mod analyses;
pub mod completions;
pub mod hash;
pub mod run;

use anyhow::{Result, anyhow};
use bugsync_core::config::{SyncConfig, load_config};
use bugsync_core::error::ErrorCode;
use bugsync_core::{ConfigError, SecretProvider, Secrets};
use clap::Args;
use std::path::PathBuf;
use tracing::info;

use crate::client::analyzer::CommandAnalyzer;
use crate::client::bugzilla::BugzillaClient;
use crate::client::hawk::Credentials;
use crate::client::remote::HttpRemoteStore;
use crate::client::render::MarkdownRenderer;
use crate::client::secrets::{FileSecrets, TaskclusterSecrets};
use crate::client::build_agent;
use crate::output::{CliError, OutputMode, render_error};

/// Where credentials come from. Shared by every command that talks to the
/// tracker or the remote store.
#[derive(Args, Debug, Clone, Default)]
pub struct SecretArgs {
    /// Taskcluster secret holding `bugzilla_url`, `bugzilla_token` and `api_url`.
    #[arg(long, conflicts_with = "secrets_file")]
    pub secrets_path: Option<String>,

    /// Read the secret from a local TOML or JSON file instead.
    #[arg(long)]
    pub secrets_file: Option<PathBuf>,

    /// Taskcluster client id, used to sign secret and API requests.
    #[arg(long, env = "TASKCLUSTER_CLIENT_ID")]
    pub client_id: Option<String>,

    /// Taskcluster access token.
    #[arg(long, env = "TASKCLUSTER_ACCESS_TOKEN", hide_env_values = true)]
    pub access_token: Option<String>,

    /// Config file (default: `<config dir>/bugsync/config.toml`).
    #[arg(long)]
    pub config: Option<PathBuf>,
}

impl SecretArgs {
    fn credentials(&self) -> Option<Credentials> {
        match (&self.client_id, &self.access_token) {
            (Some(id), Some(token)) if !id.is_empty() && !token.is_empty() => {
                Some(Credentials::new(id.as_str(), token.as_str()))
            }
            _ => None,
        }
    }
}

/// Configuration, secrets and credentials for one command.
pub struct Session {
    pub config: SyncConfig,
    pub secrets: Secrets,
    credentials: Option<Credentials>,
    agent: ureq::Agent,
}

impl Session {
    /// Load the config and the secret. Failures are rendered with their error
    /// code before being returned.
    pub fn open(args: &SecretArgs, output: OutputMode) -> Result<Self> {
        let config = load_config(args.config.as_deref()).or_else(|err| fail(output, &err))?;
        let agent = build_agent(&config.http);
        let credentials = args.credentials();

        let secrets = match &args.secrets_file {
            Some(path) => FileSecrets::new(path.clone()).load(&path.display().to_string()),
            None => {
                let Some(path) = args.secrets_path.clone().or_else(|| config.secrets.path.clone())
                else {
                    let message = "no secret configured: pass --secrets-path or --secrets-file, \
                                   or set secrets.path in the config file";
                    render_error(output, &CliError::with_code(message, ErrorCode::MissingSecret))?;
                    return Err(anyhow!(message));
                };
                TaskclusterSecrets::new(agent.clone(), &config.secrets.base_url, credentials.clone())
                    .load(&path)
            }
        }
        .or_else(|err| fail(output, &err))?;

        info!(tracker = %secrets.tracker_url, api = %secrets.remote_api_url, "Loaded secrets");
        Ok(Self {
            config,
            secrets,
            credentials,
            agent,
        })
    }

    pub fn remote(&self) -> HttpRemoteStore {
        HttpRemoteStore::new(
            self.agent.clone(),
            &self.secrets.remote_api_url,
            self.credentials.clone(),
        )
    }

    pub fn tracker(&self) -> BugzillaClient {
        BugzillaClient::new(
            self.agent.clone(),
            &self.secrets.tracker_url,
            Some(self.secrets.tracker_token.clone()),
            &self.config.tracker,
        )
    }

    pub fn analyzer(&self) -> CommandAnalyzer {
        CommandAnalyzer::new(
            &self.config.analyzer,
            MarkdownRenderer::new(&self.secrets.tracker_url),
        )
    }
}

fn fail<T>(output: OutputMode, err: &ConfigError) -> Result<T> {
    render_error(output, &CliError::with_code(err.to_string(), err.code()))?;
    Err(anyhow!("{err}"))
}
