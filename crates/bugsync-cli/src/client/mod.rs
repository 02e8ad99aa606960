//! Concrete collaborators: Bugzilla, the remote analysis store, secrets, the
//! patch analyzer, and the uplift comment renderer.

pub mod analyzer;
pub mod bugzilla;
pub mod hawk;
pub mod remote;
pub mod render;
pub mod secrets;

use bugsync_core::ClientError;
use bugsync_core::config::HttpConfig;
use serde::de::DeserializeOwned;
use std::fmt;
use std::time::Duration;

/// HTTP verbs the clients issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Delete,
}

impl Method {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Shared agent carrying the configured timeout and user agent.
pub fn build_agent(http: &HttpConfig) -> ureq::Agent {
    ureq::AgentBuilder::new()
        .timeout(Duration::from_secs(http.timeout_secs))
        .user_agent(&http.user_agent)
        .build()
}

/// Send `request`, turning transport failures and non-2xx answers into
/// [`ClientError`]s that carry the method and URL.
pub fn send(
    request: ureq::Request,
    method: Method,
    url: &str,
    body: Option<&str>,
) -> Result<ureq::Response, ClientError> {
    let result = match body {
        Some(body) => request.send_string(body),
        None => request.call(),
    };

    match result {
        Ok(response) => Ok(response),
        Err(ureq::Error::Status(status, response)) => Err(ClientError::Status {
            method: method.to_string(),
            url: url.to_string(),
            status,
            body: response.into_string().unwrap_or_default(),
        }),
        Err(ureq::Error::Transport(transport)) => Err(ClientError::Transport {
            method: method.to_string(),
            url: url.to_string(),
            message: transport.to_string(),
        }),
    }
}

pub fn decode<T: DeserializeOwned>(response: ureq::Response, url: &str) -> Result<T, ClientError> {
    response.into_json::<T>().map_err(|err| ClientError::Decode {
        url: url.to_string(),
        message: err.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn method_names_are_uppercase() {
        assert_eq!(Method::Get.to_string(), "GET");
        assert_eq!(Method::Post.as_str(), "POST");
        assert_eq!(Method::Delete.as_str(), "DELETE");
    }
}
