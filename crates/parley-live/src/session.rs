//! Session lifecycle state machine.
//!
//! Owns the single active [`Session`] and sequences the live chain:
//! credential fetch, device acquisition, then the peer-connection handshake.
//! Exactly one live attempt is in flight at a time — a second `start_live`
//! while one is connecting is rejected, not queued — and at most one
//! [`LiveConnection`] exists at any time. Every user-visible status change is
//! narrated into the [`TranscriptLog`].
//!
//! Locking discipline: the inner state is guarded by a mutex that is never
//! held across a suspension point. The live chain takes what it needs out of
//! the state, awaits, and re-locks to commit the transition; `stop_live`
//! during a connect attempt cancels the attempt's token and the in-flight
//! chain observes it before committing to `Live`.

use crate::credential::CredentialBroker;
use crate::error::LiveError;
use crate::handshake::{Connector, LiveConnection};
use crate::media::MediaCapture;
use crate::transcript::TranscriptLog;
use parley_scenario::ScenarioService;
use parley_types::{Emotion, Session, SpeakerRole};
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Lifecycle of the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    /// No scenario yet.
    Idle,
    /// Scenario generated, not yet published.
    ScenarioReady,
    /// Scenario published; live session may start.
    Published,
    /// A live attempt is in flight.
    Connecting,
    /// Bidirectional audio and events are flowing.
    Live,
    /// A stop was requested and teardown is in progress.
    Stopping,
    /// Live session ended.
    Stopped,
    /// The live chain failed; the reason is narrated in the transcript.
    Failed(String),
}

struct SessionInner {
    state: SessionState,
    session: Option<Session>,
    live: Option<LiveConnection>,
    cancel: Option<CancellationToken>,
}

/// Top-level controller for one scenario session and its live connection.
pub struct SessionStateMachine {
    scenarios: Arc<dyn ScenarioService>,
    broker: Arc<dyn CredentialBroker>,
    capture: Arc<dyn MediaCapture>,
    connector: Arc<dyn Connector>,
    log: Arc<TranscriptLog>,
    model: String,
    inner: Mutex<SessionInner>,
}

impl SessionStateMachine {
    /// Wires the state machine to its collaborators.
    pub fn new(
        scenarios: Arc<dyn ScenarioService>,
        broker: Arc<dyn CredentialBroker>,
        capture: Arc<dyn MediaCapture>,
        connector: Arc<dyn Connector>,
        log: Arc<TranscriptLog>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            scenarios,
            broker,
            capture,
            connector,
            log,
            model: model.into(),
            inner: Mutex::new(SessionInner {
                state: SessionState::Idle,
                session: None,
                live: None,
                cancel: None,
            }),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, SessionInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        self.lock().state.clone()
    }

    /// The active session, if any.
    pub fn session(&self) -> Option<Session> {
        self.lock().session.clone()
    }

    /// The transcript log fed by this machine.
    pub fn transcript(&self) -> Arc<TranscriptLog> {
        Arc::clone(&self.log)
    }

    /// Hands the remote audio sink of the live connection to the caller.
    pub fn take_remote_audio(&self) -> Option<crate::handshake::RemoteAudioSink> {
        self.lock().live.as_mut().and_then(LiveConnection::take_remote_sink)
    }

    fn narrate(&self, text: impl Into<String>) {
        self.log.append(SpeakerRole::System, text);
    }

    /// Generates a fresh scenario.
    ///
    /// Valid whenever no live attempt or connection is active. On success the
    /// machine holds a new session with a fresh id and moves to
    /// `ScenarioReady`; on failure the state is unchanged so the call can be
    /// retried as-is.
    pub async fn create_scenario(
        &self,
        prompt: &str,
        emotion: Emotion,
    ) -> Result<Session, LiveError> {
        {
            let inner = self.lock();
            if matches!(
                inner.state,
                SessionState::Connecting | SessionState::Live | SessionState::Stopping
            ) {
                return Err(LiveError::AlreadyConnecting);
            }
        }

        self.narrate("Generating scenario...");
        let created = match self.scenarios.create_scenario(prompt, emotion).await {
            Ok(created) => created,
            Err(e) => {
                warn!(error = %e, "scenario creation failed");
                self.narrate(format!("Scenario generation failed: {e}"));
                return Err(LiveError::ScenarioCreation(e.to_string()));
            }
        };

        let session = Session {
            session_id: created.session_id,
            scenario: Some(created.scenario),
            published: false,
            emotion,
        };

        {
            let mut inner = self.lock();
            inner.session = Some(session.clone());
            inner.state = SessionState::ScenarioReady;
        }
        info!(session_id = %session.session_id, "scenario ready");
        self.narrate("Scenario generated.");
        Ok(session)
    }

    /// Publishes the active scenario.
    ///
    /// Calling without a session is a precondition violation surfaced to the
    /// caller; it never mutates state. Publishing an already-published
    /// session is a no-op — `published` never reverts.
    pub async fn publish(&self) -> Result<(), LiveError> {
        let session_id = {
            let inner = self.lock();
            let session = inner.session.as_ref().ok_or(LiveError::NoActiveSession)?;
            if session.published {
                return Ok(());
            }
            session.session_id.clone()
        };

        if let Err(e) = self.scenarios.publish_scenario(&session_id).await {
            warn!(error = %e, "publish failed");
            self.narrate(format!("Publish failed: {e}"));
            return Err(LiveError::PublishFailed(e.to_string()));
        }

        {
            let mut inner = self.lock();
            if let Some(session) = inner.session.as_mut() {
                session.published = true;
            }
            inner.state = SessionState::Published;
        }
        self.narrate("Scenario published.");
        Ok(())
    }

    /// Opens the live voice session.
    ///
    /// Valid from `Published`, or from `Live` as a rejoin (the previous
    /// connection is stopped first). A second call while an attempt is
    /// connecting fails with [`LiveError::AlreadyConnecting`] and does not
    /// start a second handshake. On any failure along the chain every
    /// partially-acquired resource is released before the machine settles in
    /// `Failed`.
    pub async fn start_live(&self) -> Result<(), LiveError> {
        let (emotion, cancel, previous) = {
            let mut inner = self.lock();
            match inner.state {
                SessionState::Connecting | SessionState::Stopping => {
                    return Err(LiveError::AlreadyConnecting)
                }
                SessionState::Published | SessionState::Live => {}
                _ => return Err(LiveError::NoActiveSession),
            }
            let session = inner.session.as_ref().ok_or(LiveError::NoActiveSession)?;
            if !session.published {
                return Err(LiveError::NoActiveSession);
            }
            let emotion = session.emotion;
            let cancel = CancellationToken::new();
            inner.cancel = Some(cancel.clone());
            inner.state = SessionState::Connecting;
            (emotion, cancel, inner.live.take())
        };

        // Rejoin: at most one live connection may exist, so the old one is
        // stopped before a new attempt begins.
        if let Some(mut old) = previous {
            self.narrate("Restarting live session...");
            self.connector.disconnect(&mut old).await;
        }

        self.narrate("Requesting realtime session credential...");
        let credential = match self.broker.fetch_credential(&self.model, emotion).await {
            Ok(credential) => credential,
            Err(e) => return self.fail_attempt(e),
        };
        self.narrate("Realtime credential received.");

        if cancel.is_cancelled() {
            return self.finish_cancelled(None).await;
        }

        let stream = match self.capture.acquire().await {
            Ok(stream) => stream,
            Err(e) => return self.fail_attempt(e),
        };
        self.narrate("Microphone acquired.");

        if cancel.is_cancelled() {
            self.capture.release(stream).await;
            return self.finish_cancelled(None).await;
        }

        self.narrate("Connecting to realtime endpoint...");
        let conn = match self.connector.connect(&credential, stream).await {
            // The connector owns teardown of everything it created, including
            // the stream it took ownership of.
            Ok(conn) => conn,
            Err(e) => return self.fail_attempt(e),
        };

        // The final cancellation check and the commit share one critical
        // section: a stop that lands between the handshake finishing and the
        // commit must win, never be overwritten by a late `Live`.
        let aborted = {
            let mut inner = self.lock();
            if cancel.is_cancelled()
                || matches!(
                    inner.state,
                    SessionState::Stopping | SessionState::Stopped
                )
            {
                Some(conn)
            } else {
                inner.live = Some(conn);
                inner.state = SessionState::Live;
                inner.cancel = None;
                None
            }
        };
        if let Some(conn) = aborted {
            return self.finish_cancelled(Some(conn)).await;
        }
        info!("live session established");
        self.narrate("Live session established.");
        Ok(())
    }

    /// Stops the live session, releasing every connection resource.
    ///
    /// Safe to call from any state and any number of times; releasing an
    /// unacquired resource is a no-op. During a connect attempt this cancels
    /// the attempt, which finishes its own teardown.
    pub async fn stop_live(&self) -> Result<(), LiveError> {
        let conn = {
            let mut inner = self.lock();
            match inner.state {
                SessionState::Connecting => {
                    if let Some(cancel) = inner.cancel.take() {
                        cancel.cancel();
                    }
                    inner.state = SessionState::Stopping;
                    return Ok(());
                }
                SessionState::Live | SessionState::Stopping | SessionState::Stopped => {}
                _ => return Ok(()),
            }
            inner.cancel = None;
            match inner.live.take() {
                Some(conn) => {
                    inner.state = SessionState::Stopping;
                    conn
                }
                None => {
                    inner.state = SessionState::Stopped;
                    return Ok(());
                }
            }
        };

        let mut conn = conn;
        self.connector.disconnect(&mut conn).await;
        self.lock().state = SessionState::Stopped;
        self.narrate("Live session stopped.");
        Ok(())
    }

    /// Narrates a chain failure, records the `Failed` state, and propagates
    /// the error. If the attempt was cancelled while failing, the stop wins.
    fn fail_attempt(&self, e: LiveError) -> Result<(), LiveError> {
        warn!(error = %e, "live session failed");
        self.narrate(format!("Live session failed: {e}"));
        let mut inner = self.lock();
        let cancelled = inner
            .cancel
            .as_ref()
            .map(CancellationToken::is_cancelled)
            .unwrap_or(matches!(
                inner.state,
                SessionState::Stopping | SessionState::Stopped
            ));
        inner.cancel = None;
        inner.state = if cancelled {
            SessionState::Stopped
        } else {
            SessionState::Failed(e.to_string())
        };
        drop(inner);
        Err(e)
    }

    /// Finishes a cancelled attempt: tears down whatever the chain had
    /// acquired and settles in `Stopped`. Cancellation is not an error.
    async fn finish_cancelled(&self, conn: Option<LiveConnection>) -> Result<(), LiveError> {
        if let Some(mut conn) = conn {
            self.connector.disconnect(&mut conn).await;
        }
        {
            let mut inner = self.lock();
            inner.cancel = None;
            inner.state = SessionState::Stopped;
        }
        self.narrate("Live session stopped.");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_equality_includes_failure_reason() {
        assert_eq!(
            SessionState::Failed("x".into()),
            SessionState::Failed("x".into())
        );
        assert_ne!(SessionState::Failed("x".into()), SessionState::Stopped);
    }
}
