//! Hawk request signing (`hawk.1`, HMAC-SHA256).
//!
//! Only the client side is implemented: building the `Authorization` header
//! for an outgoing request. Server responses are not verified.

use anyhow::{Context, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use hmac::{Hmac, Mac};
use rand::Rng;
use rand::distributions::Alphanumeric;
use sha2::{Digest, Sha256};
use std::fmt;
use url::Url;

use super::Method;

type HmacSha256 = Hmac<Sha256>;

const NONCE_LEN: usize = 6;

/// Hawk client credentials (Taskcluster client id and access token).
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub id: String,
    pub key: String,
}

impl Credentials {
    pub fn new(id: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            key: key.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("id", &self.id)
            .field("key", &"<redacted>")
            .finish()
    }
}

/// Everything that goes into one request MAC.
#[derive(Debug, Clone)]
pub struct Artifacts<'a> {
    pub method: Method,
    pub url: &'a Url,
    pub ts: i64,
    pub nonce: &'a str,
    pub hash: Option<&'a str>,
    pub ext: Option<&'a str>,
}

impl Artifacts<'_> {
    /// The `hawk.1.header` string the MAC is computed over.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL has no host or no known port.
    pub fn normalized(&self) -> Result<String> {
        let host = self
            .url
            .host_str()
            .with_context(|| format!("url {} has no host", self.url))?;
        let port = self
            .url
            .port_or_known_default()
            .with_context(|| format!("url {} has no port", self.url))?;
        let resource = match self.url.query() {
            Some(query) => format!("{}?{query}", self.url.path()),
            None => self.url.path().to_string(),
        };

        Ok(format!(
            "hawk.1.header\n{ts}\n{nonce}\n{method}\n{resource}\n{host}\n{port}\n{hash}\n{ext}\n",
            ts = self.ts,
            nonce = self.nonce,
            method = self.method,
            host = host.to_ascii_lowercase(),
            hash = self.hash.unwrap_or_default(),
            ext = self.ext.unwrap_or_default(),
        ))
    }

    /// Base64 HMAC-SHA256 of [`Self::normalized`] under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL cannot be normalized.
    pub fn mac(&self, key: &str) -> Result<String> {
        let mut mac = HmacSha256::new_from_slice(key.as_bytes())
            .map_err(|err| anyhow::anyhow!("invalid hawk key: {err}"))?;
        mac.update(self.normalized()?.as_bytes());
        Ok(STANDARD.encode(mac.finalize().into_bytes()))
    }

    /// Full `Authorization` header value.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL cannot be normalized.
    pub fn header(&self, credentials: &Credentials) -> Result<String> {
        let mac = self.mac(&credentials.key)?;
        let mut header = format!(
            "Hawk id=\"{}\", ts=\"{}\", nonce=\"{}\"",
            credentials.id, self.ts, self.nonce
        );
        if let Some(hash) = self.hash {
            header.push_str(&format!(", hash=\"{hash}\""));
        }
        if let Some(ext) = self.ext {
            header.push_str(&format!(", ext=\"{ext}\""));
        }
        header.push_str(&format!(", mac=\"{mac}\""));
        Ok(header)
    }
}

/// Base64 SHA-256 over `hawk.1.payload\n{content_type}\n{body}\n`.
///
/// Content-type parameters (`; charset=...`) are ignored and the mime type is
/// lowercased.
pub fn payload_hash(content_type: &str, body: &[u8]) -> String {
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    let mut hasher = Sha256::new();
    hasher.update(b"hawk.1.payload\n");
    hasher.update(mime.as_bytes());
    hasher.update(b"\n");
    hasher.update(body);
    hasher.update(b"\n");
    STANDARD.encode(hasher.finalize())
}

fn nonce() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(NONCE_LEN)
        .map(char::from)
        .collect()
}

/// Sign a request with the current time and a fresh nonce.
///
/// `payload` is the content type and body to hash. Requests signed with
/// `None` carry no `hash` attribute.
///
/// # Errors
///
/// Returns an error if the URL cannot be normalized.
pub fn sign(
    credentials: &Credentials,
    method: Method,
    url: &Url,
    payload: Option<(&str, &[u8])>,
) -> Result<String> {
    let hash = payload.map(|(content_type, body)| payload_hash(content_type, body));
    let nonce = nonce();
    Artifacts {
        method,
        url,
        ts: chrono::Utc::now().timestamp(),
        nonce: &nonce,
        hash: hash.as_deref(),
        ext: None,
    }
    .header(credentials)
}
