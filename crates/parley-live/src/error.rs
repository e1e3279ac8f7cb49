use thiserror::Error;

/// Errors surfaced by the live session orchestrator.
///
/// Every error raised along the `start_live` chain is caught at the state
/// machine boundary, narrated into the transcript, and resolves the machine
/// to `Failed` — it is never left to terminate the process. Authoring errors
/// (`ScenarioCreation`, `PublishFailed`) leave the machine state unchanged so
/// the operator can retry explicitly.
#[derive(Debug, Error)]
pub enum LiveError {
    /// The authoring service call failed or returned a malformed document.
    #[error("scenario creation failed: {0}")]
    ScenarioCreation(String),

    /// The publish call failed.
    #[error("scenario publish failed: {0}")]
    PublishFailed(String),

    /// An operation that needs a session was called without one.
    #[error("no active session")]
    NoActiveSession,

    /// `start_live` was called while a live attempt was already in flight.
    #[error("a live connection attempt is already in progress")]
    AlreadyConnecting,

    /// The credential issuance call failed at the HTTP level.
    #[error("credential fetch failed: {0}")]
    CredentialFetch(String),

    /// The issuance response carried no usable secret under any known shape.
    #[error("credential response contained no usable secret")]
    CredentialMissing,

    /// The local audio input device could not be acquired.
    #[error("audio input device unavailable: {0}")]
    DeviceUnavailable(String),

    /// The realtime endpoint answered the offer with a non-success status.
    /// The body is carried verbatim for diagnostics.
    #[error("realtime endpoint rejected the offer ({status}): {body}")]
    HandshakeRejected { status: u16, body: String },

    /// Any other failure during the offer/answer exchange.
    #[error("handshake failed: {0}")]
    Handshake(String),
}

impl From<webrtc::Error> for LiveError {
    fn from(e: webrtc::Error) -> Self {
        Self::Handshake(e.to_string())
    }
}
