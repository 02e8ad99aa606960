use bugsync_core::model::{Analysis, AnalysisId, AnalysisPayload, BugId};
use bugsync_core::{ClientError, RemoteStore};
use serde::Deserialize;
use std::cell::Cell;
use tracing::debug;
use url::Url;

use super::hawk::{self, Credentials};
use super::{Method, decode, send};

const CONTENT_TYPE: &str = "application/json";

#[derive(Debug, Deserialize)]
struct AnalysisDetails {
    #[serde(default)]
    bugs: Vec<RemoteBug>,
}

#[derive(Debug, Deserialize)]
struct RemoteBug {
    bugzilla_id: BugId,
}

/// Remote analysis store reached over HTTP, every request Hawk-signed.
pub struct HttpRemoteStore {
    agent: ureq::Agent,
    api_url: String,
    credentials: Option<Credentials>,
    requests: Cell<usize>,
}

impl HttpRemoteStore {
    pub fn new(agent: ureq::Agent, api_url: &str, credentials: Option<Credentials>) -> Self {
        Self {
            agent,
            api_url: api_url.trim_end_matches('/').to_string(),
            credentials,
            requests: Cell::new(0),
        }
    }

    pub fn request_count(&self) -> usize {
        self.requests.get()
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.api_url)
    }

    fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<&str>,
    ) -> Result<ureq::Response, ClientError> {
        self.requests.set(self.requests.get() + 1);
        let url = self.url(path);
        debug!(%method, url, "remote request");

        let mut request = self
            .agent
            .request(method.as_str(), &url)
            .set("Content-Type", CONTENT_TYPE);

        if let Some(credentials) = &self.credentials {
            let header = authorization(credentials, method, &url, body.unwrap_or_default())
                .map_err(|err| ClientError::Transport {
                    method: method.to_string(),
                    url: url.clone(),
                    message: format!("{err:#}"),
                })?;
            request = request.set("Authorization", &header);
        }

        send(request, method, &url, body)
    }
}

fn authorization(
    credentials: &Credentials,
    method: Method,
    url: &str,
    body: &str,
) -> anyhow::Result<String> {
    let parsed = Url::parse(url)?;
    hawk::sign(credentials, method, &parsed, Some((CONTENT_TYPE, body.as_bytes())))
}

impl RemoteStore for HttpRemoteStore {
    fn list_analyses(&self) -> Result<Vec<Analysis>, ClientError> {
        let response = self.request(Method::Get, "/analysis", None)?;
        decode(response, &self.url("/analysis"))
    }

    fn analysis_bugs(&self, id: AnalysisId) -> Result<Vec<BugId>, ClientError> {
        let path = format!("/analysis/{id}");
        let response = self.request(Method::Get, &path, None)?;
        let details: AnalysisDetails = decode(response, &self.url(&path))?;
        Ok(details.bugs.into_iter().map(|bug| bug.bugzilla_id).collect())
    }

    fn upsert(&self, payload: &AnalysisPayload) -> Result<(), ClientError> {
        let body = serde_json::to_string(payload).map_err(|err| ClientError::Decode {
            url: self.url("/bugs"),
            message: format!("cannot encode payload of bug {}: {err}", payload.bug_id),
        })?;
        self.request(Method::Post, "/bugs", Some(&body))?;
        Ok(())
    }

    fn delete(&self, bug_id: BugId) -> Result<(), ClientError> {
        self.request(Method::Delete, &format!("/bugs/{bug_id}"), None)?;
        Ok(())
    }
}
