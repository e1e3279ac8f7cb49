//! Exercises the real WebRTC connector against an endpoint that cannot
//! answer, verifying the failure path releases everything it acquired.

use parley_live::{
    Connector, Credential, EventChannelRouter, LiveError, LocalAudioStream, TranscriptLog,
    WebRtcConnector,
};
use std::sync::atomic::Ordering;
use std::sync::Arc;

fn connector() -> (WebRtcConnector, Arc<TranscriptLog>) {
    let log = Arc::new(TranscriptLog::new());
    let router = Arc::new(EventChannelRouter::new(Arc::clone(&log)));
    (WebRtcConnector::new(router, Arc::clone(&log)), log)
}

#[tokio::test]
async fn unreachable_endpoint_fails_and_tears_down() {
    let (connector, _log) = connector();
    // Port 9 (discard) is not listening; the offer post fails at the
    // transport level after the local side of the handshake completed.
    let credential = Credential::new("ephemeral", "http://127.0.0.1:9/realtime");

    let stream = LocalAudioStream::detached();
    let flag = stream.stop_flag();

    let err = connector
        .connect(&credential, stream)
        .await
        .expect_err("offer post must fail");
    assert!(matches!(err, LiveError::Handshake(_)));
    assert!(
        flag.load(Ordering::SeqCst),
        "local stream must be stopped after a failed handshake"
    );
}

#[tokio::test]
async fn disconnect_after_failed_connect_is_safe() {
    let (connector, _log) = connector();
    let credential = Credential::new("ephemeral", "http://127.0.0.1:9/realtime");

    let _ = connector
        .connect(&credential, LocalAudioStream::detached())
        .await;

    // A connection that never came back from connect leaves nothing behind;
    // tearing down a fresh empty one twice must also hold.
    let mut conn = parley_live::LiveConnection::empty();
    connector.disconnect(&mut conn).await;
    connector.disconnect(&mut conn).await;
    assert!(!conn.is_live());
}
