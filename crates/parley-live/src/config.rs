/// Default realtime model requested from the credential issuance service.
pub const DEFAULT_REALTIME_MODEL: &str = "gpt-4o-realtime-preview-2024-12-17";

/// Orchestrator configuration.
///
/// The API base address is the only externally configured value; it is
/// supplied at process start by whoever constructs the orchestrator. There is
/// no CLI surface, no environment variables, and no on-disk state in the
/// core.
#[derive(Debug, Clone)]
pub struct LiveConfig {
    /// Base address of the backend exposing the scenario and credential
    /// issuance endpoints (e.g. `http://localhost:8000`).
    pub api_base: String,

    /// Base address of the realtime endpoint, used when the issuance
    /// response does not name one.
    pub realtime_base: String,

    /// Realtime model identifier sent to the issuance service.
    pub model: String,
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self {
            api_base: "http://localhost:8000".to_string(),
            realtime_base: "https://api.openai.com/v1/realtime".to_string(),
            model: DEFAULT_REALTIME_MODEL.to_string(),
        }
    }
}

impl LiveConfig {
    /// Creates a configuration for the given backend base address, keeping
    /// defaults for everything else.
    pub fn new(api_base: impl Into<String>) -> Self {
        Self {
            api_base: api_base.into(),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = LiveConfig::default();
        assert_eq!(config.api_base, "http://localhost:8000");
        assert_eq!(config.model, DEFAULT_REALTIME_MODEL);
        assert!(config.realtime_base.starts_with("https://"));
    }

    #[test]
    fn new_overrides_api_base_only() {
        let config = LiveConfig::new("http://backend:9000");
        assert_eq!(config.api_base, "http://backend:9000");
        assert_eq!(config.model, DEFAULT_REALTIME_MODEL);
    }
}
