use thiserror::Error;

/// Errors that can occur while talking to the scenario authoring service.
#[derive(Debug, Error)]
pub enum ScenarioError {
    /// The HTTP call itself failed (connect, TLS, timeout).
    #[error("scenario request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The service answered with a non-success status.
    #[error("scenario service rejected the request ({status}): {body}")]
    Rejected { status: u16, body: String },

    /// The service answered 2xx but the body did not decode into a
    /// scenario document.
    #[error("scenario service returned a malformed document: {0}")]
    Malformed(String),
}
