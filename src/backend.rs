//! HTTP client for the extraction backend.
//!
//! ```text
//! GET  /matters/{case}/runs                      list runs
//! POST /matters/{case}/runs        {}            start a new run
//! POST /runs/{run}/cancel                        cancel a run
//! GET  /runs/{run}/artifacts/by-name/{name}      named artifact
//! GET  /runs/{run}/artifacts/{type}              typed artifact
//! ```
//!
//! Path segments are percent-encoded on the wire. Every request carries the
//! headers produced by [`RequestSigner`]; the token's `pth` claim holds the
//! decoded path, which is what the backend sees after routing. Non-2xx responses become
//! [`FetchError::Status`] with a message extracted by [`parse_api_error`].

use async_trait::async_trait;
use reqwest::Method;
use serde_json::Value;
use std::time::Duration;
use urlencoding::encode;

use crate::artifacts::{ArtifactRef, ArtifactSource};
use crate::auth::RequestSigner;
use crate::config::Config;
use crate::error::FetchError;
use crate::models::{parse_list, Run};

pub struct BackendClient {
    client: reqwest::Client,
    base_url: String,
    signer: RequestSigner,
}

impl BackendClient {
    pub fn new(base_url: &str, timeout: Duration, signer: RequestSigner) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            signer,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, FetchError> {
        Self::new(
            &config.backend.base_url,
            Duration::from_secs(config.backend.timeout_secs),
            RequestSigner::from_config(&config.auth),
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// All runs for a case, in the order the backend returns them.
    ///
    /// Accepts a bare array or an object wrapping it under `runs`.
    /// Malformed entries are skipped.
    pub async fn list_runs(&self, case_id: &str) -> Result<Vec<Run>, FetchError> {
        let path = RoutePath::new("/matters/{}/runs", &[case_id]);
        let body = self.request(Method::GET, &path, None).await?;
        let list = match &body {
            Value::Array(_) => Some(&body),
            Value::Object(map) => map.get("runs"),
            _ => None,
        };
        Ok(parse_list(list))
    }

    /// Trigger a fresh extraction run. Returns the backend's body unchanged.
    pub async fn start_run(&self, case_id: &str) -> Result<Value, FetchError> {
        let path = RoutePath::new("/matters/{}/runs", &[case_id]);
        self.request(Method::POST, &path, Some(Value::Object(Default::default())))
            .await
    }

    pub async fn cancel_run(&self, run_id: &str) -> Result<Value, FetchError> {
        let path = RoutePath::new("/runs/{}/cancel", &[run_id]);
        self.request(Method::POST, &path, None).await
    }

    pub async fn fetch_named(&self, run_id: &str, name: &str) -> Result<Value, FetchError> {
        let path = RoutePath::new("/runs/{}/artifacts/by-name/{}", &[run_id, name]);
        self.request(Method::GET, &path, None).await
    }

    pub async fn fetch_typed(&self, run_id: &str, artifact_type: &str) -> Result<Value, FetchError> {
        let path = RoutePath::new("/runs/{}/artifacts/{}", &[run_id, artifact_type]);
        self.request(Method::GET, &path, None).await
    }

    async fn request(
        &self,
        method: Method,
        path: &RoutePath,
        body: Option<Value>,
    ) -> Result<Value, FetchError> {
        let url = format!("{}{}", self.base_url, path.wire);
        tracing::debug!(%method, %url, "backend request");

        let mut req = self.client.request(method.clone(), &url);
        for (name, value) in self.signer.headers(method.as_str(), &path.signed) {
            req = req.header(name, value);
        }
        if let Some(body) = body {
            req = req.json(&body);
        }

        let resp = req.send().await?;
        let status = resp.status();
        let text = resp.text().await?;

        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                message: parse_api_error(&text),
            });
        }

        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&text)?)
    }
}

/// A request path in its percent-encoded and decoded forms.
struct RoutePath {
    wire: String,
    signed: String,
}

impl RoutePath {
    /// Substitute each `{}` in `template` with the next parameter.
    fn new(template: &str, params: &[&str]) -> Self {
        let mut wire = String::with_capacity(template.len());
        let mut signed = String::with_capacity(template.len());
        let mut params = params.iter();
        for (i, piece) in template.split("{}").enumerate() {
            if i > 0 {
                if let Some(param) = params.next() {
                    wire.push_str(&encode(param));
                    signed.push_str(param);
                }
            }
            wire.push_str(piece);
            signed.push_str(piece);
        }
        Self { wire, signed }
    }
}

#[async_trait]
impl ArtifactSource for BackendClient {
    async fn fetch(&self, run_id: &str, artifact: &ArtifactRef) -> Result<Value, FetchError> {
        match artifact {
            ArtifactRef::Named(name) => self.fetch_named(run_id, name).await,
            ArtifactRef::Typed(ty) => self.fetch_typed(run_id, ty).await,
        }
    }
}

/// Extract a human-readable message from an error body.
///
/// Tries a JSON string, then the `error`, `detail` and `message` fields;
/// anything else yields the raw text.
pub fn parse_api_error(text: &str) -> String {
    match serde_json::from_str::<Value>(text) {
        Ok(Value::String(s)) => s,
        Ok(Value::Object(map)) => ["error", "detail", "message"]
            .iter()
            .find_map(|key| map.get(*key).and_then(Value::as_str))
            .map(str::to_string)
            .unwrap_or_else(|| text.to_string()),
        _ => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_api_error_precedence() {
        assert_eq!(parse_api_error(r#"{"error":"a","detail":"b"}"#), "a");
        assert_eq!(parse_api_error(r#"{"detail":"b","message":"c"}"#), "b");
        assert_eq!(parse_api_error(r#"{"message":"c"}"#), "c");
        assert_eq!(parse_api_error(r#""plain json string""#), "plain json string");
    }

    #[test]
    fn test_parse_api_error_fallbacks() {
        assert_eq!(parse_api_error("Bad Gateway"), "Bad Gateway");
        // Non-string detail (FastAPI validation lists) falls through to raw.
        let raw = r#"{"detail":[{"loc":["body"]}]}"#;
        assert_eq!(parse_api_error(raw), raw);
        assert_eq!(parse_api_error(""), "");
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let client = BackendClient::new(
            "http://localhost:8000/",
            Duration::from_secs(5),
            RequestSigner::new(Default::default(), None, 60),
        )
        .unwrap();
        assert_eq!(client.base_url(), "http://localhost:8000");
    }

    #[test]
    fn test_route_path_forms() {
        let path = RoutePath::new("/runs/{}/artifacts/by-name/{}", &["A", "graphs/v2 final.json"]);
        assert_eq!(path.wire, "/runs/A/artifacts/by-name/graphs%2Fv2%20final.json");
        assert_eq!(path.signed, "/runs/A/artifacts/by-name/graphs/v2 final.json");

        let path = RoutePath::new("/runs/{}/cancel", &["r1"]);
        assert_eq!(path.wire, "/runs/r1/cancel");
        assert_eq!(path.signed, path.wire);
    }
}
