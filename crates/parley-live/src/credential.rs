//! Ephemeral credential acquisition.
//!
//! The issuance service hands out a short-lived bearer secret for one
//! handshake attempt, plus (optionally) the realtime endpoint to post the
//! offer to. The secret is single use, never persisted, and never logged in
//! full — only success or failure is narrated.

use crate::config::LiveConfig;
use crate::error::LiveError;
use async_trait::async_trait;
use parley_types::Emotion;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use tracing::{debug, info};

/// A short-lived bearer credential for one handshake attempt.
#[derive(Clone)]
pub struct Credential {
    secret: String,
    endpoint: String,
}

impl Credential {
    /// Builds a credential from its parts. Intended for brokers and tests.
    pub fn new(secret: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            endpoint: endpoint.into(),
        }
    }

    /// The bearer secret.
    pub fn secret(&self) -> &str {
        &self.secret
    }

    /// The realtime endpoint to post the offer to.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("secret", &"[REDACTED]")
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

/// The credential issuance seam used by the session state machine.
///
/// Implementations never retry — retry policy belongs to the caller, and in
/// the orchestrator every retry is a fresh user-triggered call.
#[async_trait]
pub trait CredentialBroker: Send + Sync {
    /// Requests one credential for the given model/emotion pair.
    async fn fetch_credential(
        &self,
        model: &str,
        emotion: Emotion,
    ) -> Result<Credential, LiveError>;
}

/// Outcome of probing an issuance response for a secret.
#[derive(Debug, Clone, PartialEq, Eq)]
enum SecretLookup {
    Found(String),
    Missing,
}

/// Probes the issuance response body for a bearer secret.
///
/// The issuance contract is not fully standardized, so the known shapes are
/// tried in order: `{client_secret: {value}}`, `{client_secret: "…"}`, then
/// `{api_key}`. This leniency is a compatibility shim for an unstable
/// upstream contract, not a designed multi-format protocol.
fn extract_secret(body: &Value) -> SecretLookup {
    fn nested_client_secret(v: &Value) -> Option<String> {
        v.get("client_secret")?
            .get("value")?
            .as_str()
            .map(str::to_owned)
    }
    fn plain_client_secret(v: &Value) -> Option<String> {
        v.get("client_secret")?.as_str().map(str::to_owned)
    }
    fn plain_api_key(v: &Value) -> Option<String> {
        v.get("api_key")?.as_str().map(str::to_owned)
    }

    type Probe = fn(&Value) -> Option<String>;
    const PROBES: &[Probe] = &[nested_client_secret, plain_client_secret, plain_api_key];

    for probe in PROBES {
        if let Some(secret) = probe(body) {
            if !secret.is_empty() {
                return SecretLookup::Found(secret);
            }
        }
    }
    SecretLookup::Missing
}

#[derive(Debug, Serialize)]
struct IssuanceRequest<'a> {
    model: &'a str,
    emotion: Emotion,
}

/// HTTP credential broker against the backend issuance endpoint.
#[derive(Debug, Clone)]
pub struct HttpCredentialBroker {
    client: reqwest::Client,
    api_base: String,
    realtime_base: String,
}

impl HttpCredentialBroker {
    /// Creates a broker from the orchestrator configuration.
    pub fn new(config: &LiveConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_base: config.api_base.clone(),
            realtime_base: config.realtime_base.clone(),
        }
    }

    /// Endpoint to use when the issuance response does not name one.
    fn fallback_endpoint(&self, model: &str) -> String {
        format!("{}?model={}", self.realtime_base, model)
    }
}

#[async_trait]
impl CredentialBroker for HttpCredentialBroker {
    async fn fetch_credential(
        &self,
        model: &str,
        emotion: Emotion,
    ) -> Result<Credential, LiveError> {
        let url = format!("{}/api/realtime/session", self.api_base);
        debug!(%model, %emotion, "requesting ephemeral realtime credential");

        let resp = self
            .client
            .post(&url)
            .json(&IssuanceRequest { model, emotion })
            .send()
            .await
            .map_err(|e| LiveError::CredentialFetch(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(LiveError::CredentialFetch(format!(
                "issuance service answered {status}: {body}"
            )));
        }

        let body: Value = resp
            .json()
            .await
            .map_err(|e| LiveError::CredentialFetch(e.to_string()))?;

        let secret = match extract_secret(&body) {
            SecretLookup::Found(secret) => secret,
            SecretLookup::Missing => return Err(LiveError::CredentialMissing),
        };

        let endpoint = body
            .get("url")
            .and_then(Value::as_str)
            .filter(|u| !u.is_empty())
            .map(str::to_owned)
            .unwrap_or_else(|| self.fallback_endpoint(model));

        info!(%endpoint, "ephemeral credential received");
        Ok(Credential::new(secret, endpoint))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn nested_client_secret_shape() {
        let body = json!({"client_secret": {"value": "tok"}});
        assert_eq!(extract_secret(&body), SecretLookup::Found("tok".into()));
    }

    #[test]
    fn plain_client_secret_shape() {
        let body = json!({"client_secret": "tok2"});
        assert_eq!(extract_secret(&body), SecretLookup::Found("tok2".into()));
    }

    #[test]
    fn api_key_shape() {
        let body = json!({"api_key": "tok3"});
        assert_eq!(extract_secret(&body), SecretLookup::Found("tok3".into()));
    }

    #[test]
    fn shapes_are_tried_in_order() {
        let body = json!({"client_secret": {"value": "nested"}, "api_key": "flat"});
        assert_eq!(extract_secret(&body), SecretLookup::Found("nested".into()));
    }

    #[test]
    fn missing_secret() {
        assert_eq!(extract_secret(&json!({"url": "x"})), SecretLookup::Missing);
        assert_eq!(extract_secret(&json!({})), SecretLookup::Missing);
        assert_eq!(
            extract_secret(&json!({"client_secret": ""})),
            SecretLookup::Missing
        );
        assert_eq!(
            extract_secret(&json!({"client_secret": 42})),
            SecretLookup::Missing
        );
    }

    #[test]
    fn debug_redacts_secret() {
        let credential = Credential::new("super-secret", "https://example/rt");
        let rendered = format!("{credential:?}");
        assert!(!rendered.contains("super-secret"));
        assert!(rendered.contains("[REDACTED]"));
        assert!(rendered.contains("https://example/rt"));
    }

    #[test]
    fn fallback_endpoint_carries_model() {
        let broker = HttpCredentialBroker::new(&LiveConfig::default());
        let endpoint = broker.fallback_endpoint("gpt-4o-realtime-preview-2024-12-17");
        assert_eq!(
            endpoint,
            "https://api.openai.com/v1/realtime?model=gpt-4o-realtime-preview-2024-12-17"
        );
    }
}
