use crate::error::ScenarioError;
use async_trait::async_trait;
use parley_types::{Emotion, ScenarioDocument};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Result of a successful scenario creation call.
#[derive(Debug, Clone, Deserialize)]
pub struct CreatedScenario {
    /// Session identifier assigned by the authoring service.
    pub session_id: String,
    /// The generated scenario document.
    pub scenario: ScenarioDocument,
}

/// The authoring-service seam used by the session state machine.
///
/// The orchestrator only ever creates and publishes scenarios; everything
/// else about the authoring service is opaque to it.
#[async_trait]
pub trait ScenarioService: Send + Sync {
    /// Generates a scenario from a prompt and emotion tag.
    async fn create_scenario(
        &self,
        prompt: &str,
        emotion: Emotion,
    ) -> Result<CreatedScenario, ScenarioError>;

    /// Publishes a previously created scenario.
    async fn publish_scenario(&self, session_id: &str) -> Result<(), ScenarioError>;
}

#[derive(Debug, Serialize)]
struct CreateRequest<'a> {
    prompt: &'a str,
    emotion: Emotion,
}

#[derive(Debug, Serialize)]
struct PublishRequest<'a> {
    session_id: &'a str,
}

/// HTTP client for the scenario authoring service.
#[derive(Debug, Clone)]
pub struct ScenarioClient {
    client: reqwest::Client,
    api_base: String,
}

impl ScenarioClient {
    /// Creates a client against the given API base address
    /// (e.g. `http://localhost:8000`).
    pub fn new(api_base: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_base: api_base.into(),
        }
    }

    async fn rejected(resp: reqwest::Response) -> ScenarioError {
        let status = resp.status().as_u16();
        let body = resp.text().await.unwrap_or_default();
        ScenarioError::Rejected { status, body }
    }
}

#[async_trait]
impl ScenarioService for ScenarioClient {
    async fn create_scenario(
        &self,
        prompt: &str,
        emotion: Emotion,
    ) -> Result<CreatedScenario, ScenarioError> {
        let url = format!("{}/api/scenario/create", self.api_base);
        debug!(%emotion, "requesting scenario generation");

        let resp = self
            .client
            .post(&url)
            .json(&CreateRequest { prompt, emotion })
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(Self::rejected(resp).await);
        }

        let created: CreatedScenario = resp
            .json()
            .await
            .map_err(|e| ScenarioError::Malformed(e.to_string()))?;

        info!(
            session_id = %created.session_id,
            title = %created.scenario.title,
            "scenario generated"
        );
        Ok(created)
    }

    async fn publish_scenario(&self, session_id: &str) -> Result<(), ScenarioError> {
        let url = format!("{}/api/scenario/publish", self.api_base);

        let resp = self
            .client
            .post(&url)
            .json(&PublishRequest { session_id })
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(Self::rejected(resp).await);
        }

        info!(%session_id, "scenario published");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn created_scenario_parses() {
        let json = r#"{
            "session_id": "abc-123",
            "scenario": {"title": "T", "overview": "O", "roles": []}
        }"#;
        let created: CreatedScenario = serde_json::from_str(json).unwrap();
        assert_eq!(created.session_id, "abc-123");
        assert_eq!(created.scenario.title, "T");
    }

    #[test]
    fn created_scenario_rejects_missing_session_id() {
        let json = r#"{"scenario": {"title": "T"}}"#;
        assert!(serde_json::from_str::<CreatedScenario>(json).is_err());
    }

    #[test]
    fn create_request_wire_shape() {
        let req = CreateRequest {
            prompt: "test",
            emotion: Emotion::Happy,
        };
        let value = serde_json::to_value(&req).unwrap();
        assert_eq!(value["prompt"], "test");
        assert_eq!(value["emotion"], "happy");
    }
}
