//! Live session orchestration for the Parley roleplay voice trainer.
//!
//! Turns a published scenario into an active, bidirectional audio + event
//! channel with a remote realtime endpoint: ephemeral credential exchange,
//! microphone acquisition, the SDP offer/answer handshake, side-channel
//! event routing into an append-only transcript, and deterministic teardown
//! of everything on stop or failure.
//!
//! # Architecture
//!
//! [`SessionStateMachine`] is the top-level controller. It owns the lifecycle
//! (`Idle → ScenarioReady → Published → Connecting → Live → Stopped/Failed`)
//! and sequences the collaborators behind trait seams:
//!
//! - [`CredentialBroker`] — one ephemeral credential per handshake attempt.
//! - [`MediaCapture`] — exclusive microphone access, released deterministically.
//! - [`Connector`] — the offer/answer exchange; sole owner of peer-connection
//!   and side-channel handles.
//! - [`EventChannelRouter`] — classifies inbound side-channel payloads into
//!   transcript entries; decode failure degrades, never aborts.
//!
//! All user-visible narration funnels into the [`TranscriptLog`].

pub mod config;
pub mod credential;
pub mod error;
pub mod events;
pub mod handshake;
pub mod media;
pub mod session;
pub mod transcript;

pub use config::{LiveConfig, DEFAULT_REALTIME_MODEL};
pub use credential::{Credential, CredentialBroker, HttpCredentialBroker};
pub use error::LiveError;
pub use events::EventChannelRouter;
pub use handshake::{Connector, LinkState, LiveConnection, RemoteAudioSink, WebRtcConnector};
pub use media::{DeviceCapture, LocalAudioStream, MediaCapture};
pub use session::{SessionState, SessionStateMachine};
pub use transcript::TranscriptLog;

use parley_scenario::ScenarioClient;
use std::sync::Arc;

/// Builds a fully wired orchestrator against the given configuration: HTTP
/// scenario client, HTTP credential broker, default-device capture, and the
/// WebRTC connector, all sharing one transcript log.
pub fn build_orchestrator(config: &LiveConfig) -> SessionStateMachine {
    let log = Arc::new(TranscriptLog::new());
    let router = Arc::new(EventChannelRouter::new(Arc::clone(&log)));
    SessionStateMachine::new(
        Arc::new(ScenarioClient::new(config.api_base.clone())),
        Arc::new(HttpCredentialBroker::new(config)),
        Arc::new(DeviceCapture::new()),
        Arc::new(WebRtcConnector::new(router, Arc::clone(&log))),
        log,
        config.model.clone(),
    )
}
