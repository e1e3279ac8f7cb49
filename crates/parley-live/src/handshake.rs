//! Peer-connection handshake with the remote realtime endpoint.
//!
//! [`WebRtcConnector`] is the only component that creates peer-connection and
//! side-channel objects, and it owns their teardown. One call to
//! [`Connector::connect`] performs the full offer/answer exchange: local
//! offer committed, SDP posted to the credential's endpoint as an
//! authenticated `application/sdp` request, and the answer committed as the
//! remote description. Any failure along the way tears down whatever was
//! created in that call before the error propagates.

use crate::credential::Credential;
use crate::error::LiveError;
use crate::events::EventChannelRouter;
use crate::media::LocalAudioStream;
use crate::transcript::TranscriptLog;
use async_trait::async_trait;
use parley_types::SpeakerRole;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::api::APIBuilder;
use webrtc::data_channel::data_channel_message::DataChannelMessage;
use webrtc::data_channel::RTCDataChannel;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::track::track_local::TrackLocal;
use webrtc::track::track_remote::TrackRemote;

/// Label of the ordered, reliable data channel carrying structured events.
const SIDE_CHANNEL_LABEL: &str = "oai-datachannel";

/// Lifecycle of one live connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LinkState {
    /// Created but not yet through the handshake.
    #[default]
    New,
    /// Remote description committed; media and events are flowing.
    Live,
    /// Torn down.
    Closed,
}

/// Receiver side of the remote audio: tracks the peer attaches show up here
/// for the caller to render.
#[derive(Debug)]
pub struct RemoteAudioSink {
    rx: mpsc::UnboundedReceiver<Arc<TrackRemote>>,
}

impl RemoteAudioSink {
    /// A sink with nothing behind it, for connections without remote media.
    pub fn detached() -> Self {
        let (_, rx) = mpsc::unbounded_channel();
        Self { rx }
    }

    /// Waits for the next remote track. Returns `None` once the connection
    /// is torn down.
    pub async fn next_track(&mut self) -> Option<Arc<TrackRemote>> {
        self.rx.recv().await
    }
}

/// One live attempt's worth of handles: peer connection, side channel, local
/// media, and remote sink.
///
/// The four handles are owned together and released together by
/// [`teardown`](LiveConnection::teardown) — partial release is a bug. The
/// struct tolerates partially-initialized state so that teardown is always
/// safe, including mid-handshake.
#[derive(Default)]
pub struct LiveConnection {
    peer: Option<Arc<RTCPeerConnection>>,
    side_channel: Option<Arc<RTCDataChannel>>,
    local_stream: Option<LocalAudioStream>,
    remote_sink: Option<RemoteAudioSink>,
    state: LinkState,
}

impl std::fmt::Debug for LiveConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiveConnection")
            .field("state", &self.state)
            .field("peer", &self.peer.is_some())
            .field("side_channel", &self.side_channel.is_some())
            .field("local_stream", &self.local_stream.is_some())
            .field("remote_sink", &self.remote_sink.is_some())
            .finish()
    }
}

impl LiveConnection {
    /// A connection with no handles acquired yet.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Attaches the local stream this connection will own.
    pub fn attach_local_stream(&mut self, stream: LocalAudioStream) {
        self.local_stream = Some(stream);
    }

    /// Marks the handshake complete.
    pub fn mark_live(&mut self) {
        self.state = LinkState::Live;
    }

    /// Current lifecycle state.
    pub fn state(&self) -> LinkState {
        self.state
    }

    /// Whether the handshake completed and teardown has not run.
    pub fn is_live(&self) -> bool {
        self.state == LinkState::Live
    }

    /// Hands the remote audio sink to the caller for rendering.
    pub fn take_remote_sink(&mut self) -> Option<RemoteAudioSink> {
        self.remote_sink.take()
    }

    /// Releases every handle this connection holds. Idempotent and always
    /// safe to call, regardless of how far the handshake got.
    pub async fn teardown(&mut self) {
        if let Some(dc) = self.side_channel.take() {
            if let Err(e) = dc.close().await {
                debug!(error = %e, "side channel close failed");
            }
        }
        if let Some(pc) = self.peer.take() {
            if let Err(e) = pc.close().await {
                debug!(error = %e, "peer connection close failed");
            }
        }
        if let Some(mut stream) = self.local_stream.take() {
            stream.stop();
        }
        self.remote_sink = None;
        self.state = LinkState::Closed;
    }
}

/// The handshake seam used by the session state machine.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Performs one full offer/answer exchange. Takes ownership of the local
    /// stream; on failure everything created inside the call — including the
    /// stream — has been torn down before the error returns.
    async fn connect(
        &self,
        credential: &Credential,
        local: LocalAudioStream,
    ) -> Result<LiveConnection, LiveError>;

    /// Releases a connection. Idempotent, always safe to call.
    async fn disconnect(&self, conn: &mut LiveConnection);
}

/// Production connector over the `webrtc` crate.
pub struct WebRtcConnector {
    http: reqwest::Client,
    router: Arc<EventChannelRouter>,
    log: Arc<TranscriptLog>,
}

impl WebRtcConnector {
    /// Creates a connector routing side-channel events through the given
    /// router and narrating into the given transcript log.
    pub fn new(router: Arc<EventChannelRouter>, log: Arc<TranscriptLog>) -> Self {
        Self {
            http: reqwest::Client::new(),
            router,
            log,
        }
    }

    async fn try_connect(
        &self,
        credential: &Credential,
        conn: &mut LiveConnection,
    ) -> Result<(), LiveError> {
        // Peer connection with default codecs and interceptors.
        let mut media = MediaEngine::default();
        media.register_default_codecs()?;
        let mut registry = Registry::new();
        registry = register_default_interceptors(registry, &mut media)
            .map_err(|e| LiveError::Handshake(e.to_string()))?;
        let api = APIBuilder::new()
            .with_media_engine(media)
            .with_interceptor_registry(registry)
            .build();
        let pc = Arc::new(api.new_peer_connection(RTCConfiguration::default()).await?);
        conn.peer = Some(Arc::clone(&pc));

        // Remote audio lands in the sink the caller renders from.
        let (track_tx, track_rx) = mpsc::unbounded_channel();
        conn.remote_sink = Some(RemoteAudioSink { rx: track_rx });
        let log = Arc::clone(&self.log);
        pc.on_track(Box::new(move |track, _, _| {
            let log = Arc::clone(&log);
            let track_tx = track_tx.clone();
            Box::pin(async move {
                info!(kind = %track.kind(), "remote track attached");
                log.append(SpeakerRole::System, "Remote audio attached.");
                let _ = track_tx.send(track);
            })
        }));

        // Ordered, reliable side channel for structured events.
        let dc = pc.create_data_channel(SIDE_CHANNEL_LABEL, None).await?;
        let router = Arc::clone(&self.router);
        dc.on_message(Box::new(move |msg: DataChannelMessage| {
            let router = Arc::clone(&router);
            Box::pin(async move {
                let raw = String::from_utf8_lossy(&msg.data).into_owned();
                router.on_message(&raw);
            })
        }));
        conn.side_channel = Some(dc);

        // Outbound media.
        if let Some(stream) = conn.local_stream.as_ref() {
            for track in stream.tracks() {
                let _ = pc
                    .add_track(Arc::clone(track) as Arc<dyn TrackLocal + Send + Sync>)
                    .await?;
            }
        }

        // Local offer, committed once ICE gathering settles.
        let offer = pc.create_offer(None).await?;
        let mut gathered = pc.gathering_complete_promise().await;
        pc.set_local_description(offer).await?;
        let _ = gathered.recv().await;
        let local_desc = pc
            .local_description()
            .await
            .ok_or_else(|| LiveError::Handshake("local description missing after offer".into()))?;

        // One authenticated SDP exchange. No retry: the credential is single
        // use and retry policy belongs to the caller.
        debug!(endpoint = credential.endpoint(), "posting offer");
        let resp = self
            .http
            .post(credential.endpoint())
            .bearer_auth(credential.secret())
            .header(reqwest::header::CONTENT_TYPE, "application/sdp")
            .body(local_desc.sdp)
            .send()
            .await
            .map_err(|e| LiveError::Handshake(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(LiveError::HandshakeRejected { status, body });
        }

        let answer_sdp = resp
            .text()
            .await
            .map_err(|e| LiveError::Handshake(e.to_string()))?;
        let answer = RTCSessionDescription::answer(answer_sdp)?;
        pc.set_remote_description(answer).await?;
        Ok(())
    }
}

#[async_trait]
impl Connector for WebRtcConnector {
    async fn connect(
        &self,
        credential: &Credential,
        local: LocalAudioStream,
    ) -> Result<LiveConnection, LiveError> {
        let mut conn = LiveConnection::empty();
        conn.attach_local_stream(local);

        match self.try_connect(credential, &mut conn).await {
            Ok(()) => {
                conn.mark_live();
                info!("live connection established");
                Ok(conn)
            }
            Err(e) => {
                warn!(error = %e, "handshake failed, tearing down partial connection");
                conn.teardown().await;
                Err(e)
            }
        }
    }

    async fn disconnect(&self, conn: &mut LiveConnection) {
        conn.teardown().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn teardown_of_empty_connection_is_safe_and_idempotent() {
        let mut conn = LiveConnection::empty();
        assert_eq!(conn.state(), LinkState::New);
        conn.teardown().await;
        conn.teardown().await;
        assert_eq!(conn.state(), LinkState::Closed);
        assert!(!conn.is_live());
    }

    #[tokio::test]
    async fn teardown_stops_an_attached_local_stream() {
        let stream = LocalAudioStream::detached();
        let flag = stream.stop_flag();

        let mut conn = LiveConnection::empty();
        conn.attach_local_stream(stream);
        conn.teardown().await;

        assert!(flag.load(std::sync::atomic::Ordering::SeqCst));
    }

    #[tokio::test]
    async fn detached_sink_yields_no_tracks() {
        let mut sink = RemoteAudioSink::detached();
        assert!(sink.next_track().await.is_none());
    }
}
