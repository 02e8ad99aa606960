use bugsync_core::config::TrackerConfig;
use bugsync_core::model::{BugId, QueryParams, UserProfile};
use bugsync_core::{ClientError, Tracker, TrackerBugs};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use tracing::{debug, info, warn};

use super::{Method, decode, send};

const API_KEY_HEADER: &str = "X-Bugzilla-API-Key";

/// Bugs per attachment request. Keeps the query string well under common
/// URL length limits.
const ATTACHMENT_BATCH_SIZE: usize = 50;

#[derive(Debug, Deserialize)]
struct BugsResponse {
    #[serde(default)]
    bugs: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct AttachmentsResponse {
    #[serde(default)]
    bugs: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
struct UsersResponse {
    #[serde(default)]
    users: Vec<UserProfile>,
}

/// Bugzilla REST client.
///
/// All configuration is passed in at construction; nothing is read from
/// globals or the environment.
pub struct BugzillaClient {
    agent: ureq::Agent,
    base_url: String,
    token: Option<String>,
    attachment_workers: usize,
    requests: AtomicUsize,
}

impl BugzillaClient {
    pub fn new(
        agent: ureq::Agent,
        base_url: &str,
        token: Option<String>,
        config: &TrackerConfig,
    ) -> Self {
        let base_url = base_url.trim_end_matches('/').to_string();
        info!("Use bugzilla server {base_url}");
        Self {
            agent,
            base_url,
            token: token.filter(|token| !token.is_empty()),
            attachment_workers: config.attachment_workers.max(1),
            requests: AtomicUsize::new(0),
        }
    }

    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::Relaxed)
    }

    fn get(&self, url: &str) -> Result<ureq::Response, ClientError> {
        self.requests.fetch_add(1, Ordering::Relaxed);
        debug!(url, "GET");

        let mut request = self.agent.get(url).set("Accept", "application/json");
        if let Some(token) = &self.token {
            request = request.set(API_KEY_HEADER, token);
        }
        send(request, Method::Get, url, None)
    }

    /// One request for the whole batch.
    fn fetch_attachments(&self, batch: &[BugId]) -> Result<Vec<(BugId, Value)>, ClientError> {
        let Some(url) = attachment_url(&self.base_url, batch) else {
            return Ok(Vec::new());
        };
        let response: AttachmentsResponse = decode(self.get(&url)?, &url)?;
        Ok(parse_attachments(response.bugs))
    }

    /// Fetch attachment lists for `ids` in batches of
    /// [`ATTACHMENT_BATCH_SIZE`], spread over at most `attachment_workers`
    /// scoped threads. Blocks until every worker is done.
    fn fetch_all_attachments(
        &self,
        ids: &[BugId],
    ) -> Result<BTreeMap<BugId, Value>, ClientError> {
        let mut attachments = BTreeMap::new();
        if ids.is_empty() {
            return Ok(attachments);
        }

        let batches: Vec<&[BugId]> = ids.chunks(ATTACHMENT_BATCH_SIZE).collect();
        let per_worker = batches.len().div_ceil(self.attachment_workers);
        let results: Vec<Result<Vec<(BugId, Value)>, ClientError>> = thread::scope(|scope| {
            let handles: Vec<_> = batches
                .chunks(per_worker)
                .map(|assigned| {
                    scope.spawn(move || -> Result<Vec<(BugId, Value)>, ClientError> {
                        let mut fetched = Vec::new();
                        for batch in assigned {
                            fetched.extend(self.fetch_attachments(batch)?);
                        }
                        Ok(fetched)
                    })
                })
                .collect();

            handles
                .into_iter()
                .map(|handle| {
                    handle.join().unwrap_or_else(|_| {
                        Err(ClientError::Transport {
                            method: Method::Get.to_string(),
                            url: format!("{}/rest/bug", self.base_url),
                            message: "attachment worker panicked".to_string(),
                        })
                    })
                })
                .collect()
        });

        for result in results {
            attachments.extend(result?);
        }
        Ok(attachments)
    }
}

impl Tracker for BugzillaClient {
    fn query(&self, params: &QueryParams) -> Result<TrackerBugs, ClientError> {
        let url = format!("{}/rest/bug?{}", self.base_url, query_string(params));
        let response: BugsResponse = decode(self.get(&url)?, &url)?;
        let records = parse_bugs(response.bugs);

        let ids: Vec<BugId> = records.keys().copied().collect();
        let attachments = self.fetch_all_attachments(&ids)?;
        debug!(
            bugs = records.len(),
            attachments = attachments.len(),
            requests = self.request_count(),
            "Fetched query"
        );

        Ok(TrackerBugs {
            records,
            attachments,
        })
    }

    fn lookup_users(&self, keys: &[String]) -> Result<Vec<UserProfile>, ClientError> {
        let url = format!("{}/rest/user?{}", self.base_url, user_query(keys));
        let response: UsersResponse = decode(self.get(&url)?, &url)?;
        Ok(response.users)
    }

    fn bug_url(&self, bug_id: BugId) -> String {
        format!("{}/{bug_id}", self.base_url)
    }
}

/// Encode search parameters. Raw strings are forwarded as-is.
fn query_string(params: &QueryParams) -> String {
    match params {
        QueryParams::Raw(raw) => raw.trim_start_matches('?').to_string(),
        QueryParams::Fields(_) => {
            let mut serializer = url::form_urlencoded::Serializer::new(String::new());
            for (key, value) in params.pairs().unwrap_or_default() {
                serializer.append_pair(&key, &value);
            }
            serializer.finish()
        }
    }
}

/// Numeric keys are looked up as `ids`, everything else as `names`.
fn user_query(keys: &[String]) -> String {
    let mut serializer = url::form_urlencoded::Serializer::new(String::new());
    for key in keys {
        if key.parse::<u64>().is_ok() {
            serializer.append_pair("ids", key);
        } else {
            serializer.append_pair("names", key);
        }
    }
    serializer.finish()
}

/// `/rest/bug/{first}/attachment?ids={rest}...`: the first bug goes in the
/// path, the others as repeated `ids`.
fn attachment_url(base_url: &str, batch: &[BugId]) -> Option<String> {
    let (first, rest) = batch.split_first()?;
    let mut url = format!("{base_url}/rest/bug/{first}/attachment");
    if !rest.is_empty() {
        let mut serializer = url::form_urlencoded::Serializer::new(String::new());
        for bug_id in rest {
            serializer.append_pair("ids", &bug_id.to_string());
        }
        url.push('?');
        url.push_str(&serializer.finish());
    }
    Some(url)
}

fn parse_bugs(bugs: Vec<Value>) -> BTreeMap<BugId, Value> {
    let mut records = BTreeMap::new();
    for bug in bugs {
        match bug.get("id").and_then(Value::as_u64) {
            Some(id) => {
                records.insert(BugId(id), bug);
            }
            None => warn!("Skipping bug record without a numeric id"),
        }
    }
    records
}

fn parse_attachments(bugs: Map<String, Value>) -> Vec<(BugId, Value)> {
    bugs.into_iter()
        .filter_map(|(key, list)| key.parse::<BugId>().ok().map(|id| (id, list)))
        .collect()
}
