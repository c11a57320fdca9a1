//! HTTP client for the hosted share-persistence backend.
//!
//! The backend stores share links created by dashboard owners. This
//! client covers the two operations the state core needs: fetching a
//! share record by token and bumping its access counter. Everything else
//! about shares (creation, listing, revocation UIs) belongs to the
//! embedding application.

use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, HeaderValue};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;
use uuid::Uuid;

use crate::error::Error;

// ── Wire types ───────────────────────────────────────────────────────

/// A share record as stored by the backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShareRecord {
    pub id: Uuid,

    /// `"public"` or `"member"`. Kept as a string on the wire so unknown
    /// kinds from newer backends deserialize instead of failing.
    pub kind: String,

    /// Whether the share is currently active (owner can revoke).
    pub active: bool,

    /// Optional expiry. `None` means the share never expires.
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,

    /// How many times the share has been read.
    #[serde(default)]
    pub access_count: u64,
}

#[derive(Deserialize)]
struct ErrorResponse {
    #[serde(default)]
    message: Option<String>,
}

// ── Client ───────────────────────────────────────────────────────────

/// Async client for the share backend.
///
/// Bearer-key authentication, JSON REST endpoints under `/v1/`.
pub struct ShareApiClient {
    http: reqwest::Client,
    base_url: Url,
}

impl ShareApiClient {
    /// Build from a base URL and API key.
    ///
    /// Injects `Authorization: Bearer <key>` as a default header on every
    /// request; the header value is marked sensitive so it never appears
    /// in debug output.
    pub fn new(base_url: &str, api_key: &SecretString) -> Result<Self, Error> {
        let mut headers = HeaderMap::new();
        let mut auth = HeaderValue::from_str(&format!("Bearer {}", api_key.expose_secret()))
            .map_err(|e| Error::ShareApi {
                message: format!("invalid API key header value: {e}"),
                status: 0,
            })?;
        auth.set_sensitive(true);
        headers.insert(reqwest::header::AUTHORIZATION, auth);

        let http = reqwest::Client::builder().default_headers(headers).build()?;
        let base_url = normalize_base_url(base_url)?;

        Ok(Self { http, base_url })
    }

    /// Wrap an existing `reqwest::Client` (caller manages auth headers).
    pub fn from_reqwest(base_url: &str, http: reqwest::Client) -> Result<Self, Error> {
        Ok(Self {
            http,
            base_url: normalize_base_url(base_url)?,
        })
    }

    /// Fetch a share record by token. Returns `Ok(None)` when the backend
    /// does not know the token — "not found" is an outcome here, not an
    /// error, because the caller must distinguish it from access denial.
    pub async fn fetch_share(&self, token: &str) -> Result<Option<ShareRecord>, Error> {
        let url = self.url(&format!("v1/shares/{token}"))?;
        debug!("GET {url}");

        let resp = self.http.get(url).send().await?;
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        self.handle_response(resp).await.map(Some)
    }

    /// Increment the access counter for a token.
    ///
    /// Best-effort from the caller's perspective: the validator logs a
    /// failure here but never fails the read because of it.
    pub async fn record_access(&self, token: &str) -> Result<(), Error> {
        let url = self.url(&format!("v1/shares/{token}/access"))?;
        debug!("POST {url}");

        let resp = self.http.post(url).send().await?;
        self.handle_empty(resp).await
    }

    // ── Helpers ──────────────────────────────────────────────────────

    fn url(&self, path: &str) -> Result<Url, Error> {
        // base_url always ends with `/`, so joining relative paths works.
        Ok(self.base_url.join(path)?)
    }

    async fn handle_response<T: serde::de::DeserializeOwned>(
        &self,
        resp: reqwest::Response,
    ) -> Result<T, Error> {
        let status = resp.status();
        if status.is_success() {
            let body = resp.text().await?;
            serde_json::from_str(&body).map_err(|e| {
                let preview = body.get(..200).unwrap_or(&body);
                Error::Deserialization {
                    message: format!("{e} (body preview: {preview:?})"),
                    body,
                }
            })
        } else {
            Err(self.error_from(resp).await)
        }
    }

    async fn handle_empty(&self, resp: reqwest::Response) -> Result<(), Error> {
        if resp.status().is_success() {
            Ok(())
        } else {
            Err(self.error_from(resp).await)
        }
    }

    async fn error_from(&self, resp: reqwest::Response) -> Error {
        let status = resp.status().as_u16();
        let body = resp.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorResponse>(&body)
            .ok()
            .and_then(|e| e.message)
            .unwrap_or_else(|| format!("unexpected response: {body}"));
        Error::ShareApi { message, status }
    }
}

fn normalize_base_url(raw: &str) -> Result<Url, Error> {
    let mut url = Url::parse(raw)?;
    let path = url.path().trim_end_matches('/').to_owned();
    url.set_path(&format!("{path}/"));
    Ok(url)
}
