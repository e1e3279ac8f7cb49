//! Scenario document types produced by the authoring service.
//!
//! The document is an opaque payload as far as the orchestrator is concerned:
//! the core only reads `title`, `overview`, and `roles` for display and
//! logging. Every field defaults when absent — the authoring service is a
//! generative model behind an HTTP API and field coverage varies.

use serde::{Deserialize, Serialize};

/// A generated roleplay scenario.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScenarioDocument {
    /// Short scenario title.
    #[serde(default)]
    pub title: String,
    /// One-paragraph summary of the situation.
    #[serde(default)]
    pub overview: String,
    /// Ordered participant roles.
    #[serde(default)]
    pub roles: Vec<ScenarioRole>,
    /// Suggested opening exchange.
    #[serde(default)]
    pub opening_dialogue: Vec<DialogueLine>,
    /// Training goals for the operator.
    #[serde(default)]
    pub learning_goals: Vec<String>,
}

/// A participant role within a scenario.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScenarioRole {
    /// Display name of the role (e.g. "Guest", "Staff").
    pub name: String,
    /// Playing instructions for the role.
    #[serde(default)]
    pub instructions: String,
}

/// A single line of suggested dialogue.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DialogueLine {
    /// The role speaking the line.
    pub speaker: String,
    /// The line itself.
    pub line: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_document_parses() {
        let json = r#"{
            "title": "Slow Service",
            "overview": "An angry guest complains about a wrong order.",
            "roles": [
                {"name": "Guest", "instructions": "Be specific about the issue."},
                {"name": "Staff", "instructions": "Listen and resolve."}
            ],
            "opening_dialogue": [
                {"speaker": "Guest", "line": "My order is wrong!"}
            ],
            "learning_goals": ["De-escalation"]
        }"#;
        let doc: ScenarioDocument = serde_json::from_str(json).unwrap();
        assert_eq!(doc.title, "Slow Service");
        assert_eq!(doc.roles.len(), 2);
        assert_eq!(doc.roles[0].name, "Guest");
        assert_eq!(doc.opening_dialogue[0].speaker, "Guest");
        assert_eq!(doc.learning_goals, vec!["De-escalation"]);
    }

    #[test]
    fn sparse_document_defaults() {
        let doc: ScenarioDocument = serde_json::from_str(r#"{"title": "Bare"}"#).unwrap();
        assert_eq!(doc.title, "Bare");
        assert!(doc.overview.is_empty());
        assert!(doc.roles.is_empty());
        assert!(doc.opening_dialogue.is_empty());
    }
}
