//! Local audio capture.
//!
//! [`DeviceCapture`] opens the default input device through CPAL and pumps
//! microphone audio into a WebRTC-local track as 20 ms Opus frames. The CPAL
//! stream handle is `!Send` on some platforms, so the stream lives on a
//! dedicated capture thread and is stopped through an atomic flag; dropping
//! the stream releases the device.

use crate::error::LiveError;
use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::RecvTimeoutError;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};
use webrtc::api::media_engine::MIME_TYPE_OPUS;
use webrtc::media::Sample;
use webrtc::rtp_transceiver::rtp_codec::RTCRtpCodecCapability;
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;

/// Capture sample rate. Opus and WebRTC both want 48 kHz.
const SAMPLE_RATE: u32 = 48_000;

/// Samples per encoded frame: 20 ms at 48 kHz mono.
const FRAME_SAMPLES: usize = 960;

/// Duration of one encoded frame.
const FRAME_DURATION: Duration = Duration::from_millis(20);

/// Upper bound for one encoded Opus packet.
const MAX_OPUS_PACKET: usize = 4000;

/// An acquired local audio stream: the outbound tracks plus the capture
/// machinery keeping them fed.
///
/// All handles are released together by [`LocalAudioStream::stop`]; stopping
/// an already-stopped or never-started stream is a no-op.
pub struct LocalAudioStream {
    tracks: Vec<Arc<TrackLocalStaticSample>>,
    halt: Arc<AtomicBool>,
    pump: Option<thread::JoinHandle<()>>,
}

impl std::fmt::Debug for LocalAudioStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalAudioStream")
            .field("tracks", &self.tracks.len())
            .field("stopped", &self.is_stopped())
            .finish()
    }
}

impl LocalAudioStream {
    /// A stream with no capture behind it. Used where outbound audio is not
    /// available (and by test doubles).
    pub fn detached() -> Self {
        Self {
            tracks: Vec::new(),
            halt: Arc::new(AtomicBool::new(false)),
            pump: None,
        }
    }

    /// The outbound tracks to attach to a peer connection.
    pub fn tracks(&self) -> &[Arc<TrackLocalStaticSample>] {
        &self.tracks
    }

    /// Stops capture and drops every track. Idempotent.
    pub fn stop(&mut self) {
        if self.halt.swap(true, Ordering::SeqCst) {
            return;
        }
        // The capture thread observes the flag, drops the CPAL stream (which
        // releases the device), and exits on its own.
        self.pump.take();
        self.tracks.clear();
        debug!("local audio stream stopped");
    }

    /// Whether [`stop`](Self::stop) has run.
    pub fn is_stopped(&self) -> bool {
        self.halt.load(Ordering::SeqCst)
    }

    /// A flag that flips once this stream stops, observable after the stream
    /// itself has been consumed.
    pub fn stop_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.halt)
    }
}

impl Drop for LocalAudioStream {
    fn drop(&mut self) {
        self.stop();
    }
}

/// The media acquisition seam used by the session state machine.
#[async_trait]
pub trait MediaCapture: Send + Sync {
    /// Requests exclusive access to the local audio input device.
    async fn acquire(&self) -> Result<LocalAudioStream, LiveError>;

    /// Releases a stream obtained from [`acquire`](Self::acquire). Must be
    /// called exactly once per successful acquire on paths where the stream
    /// is not handed to a connection.
    async fn release(&self, stream: LocalAudioStream);
}

/// Microphone capture through the default CPAL input device.
#[derive(Debug, Clone, Default)]
pub struct DeviceCapture;

impl DeviceCapture {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl MediaCapture for DeviceCapture {
    async fn acquire(&self) -> Result<LocalAudioStream, LiveError> {
        let device = cpal::default_host()
            .default_input_device()
            .ok_or_else(|| LiveError::DeviceUnavailable("no input device available".into()))?;
        let device_name = device.name().unwrap_or_else(|_| "unknown".to_string());

        let track = Arc::new(TrackLocalStaticSample::new(
            RTCRtpCodecCapability {
                mime_type: MIME_TYPE_OPUS.to_owned(),
                clock_rate: SAMPLE_RATE,
                channels: 1,
                ..Default::default()
            },
            "audio".to_owned(),
            "parley-mic".to_owned(),
        ));

        let halt = Arc::new(AtomicBool::new(false));
        let (ready_tx, ready_rx) = oneshot::channel();

        let pump = {
            let track = Arc::clone(&track);
            let halt = Arc::clone(&halt);
            thread::Builder::new()
                .name("parley-capture".to_string())
                .spawn(move || capture_loop(device, track, halt, ready_tx))
                .map_err(|e| LiveError::DeviceUnavailable(e.to_string()))?
        };

        match ready_rx.await {
            Ok(Ok(())) => {}
            Ok(Err(reason)) => return Err(LiveError::DeviceUnavailable(reason)),
            Err(_) => {
                return Err(LiveError::DeviceUnavailable(
                    "capture thread exited before startup".into(),
                ))
            }
        }

        info!(device = %device_name, "microphone acquired");
        Ok(LocalAudioStream {
            tracks: vec![track],
            halt,
            pump: Some(pump),
        })
    }

    async fn release(&self, mut stream: LocalAudioStream) {
        stream.stop();
    }
}

/// Runs on the capture thread: owns the CPAL stream, accumulates 20 ms
/// frames, Opus-encodes them, and writes them to the local track.
fn capture_loop(
    device: cpal::Device,
    track: Arc<TrackLocalStaticSample>,
    halt: Arc<AtomicBool>,
    ready_tx: oneshot::Sender<Result<(), String>>,
) {
    let mut encoder = match opus::Encoder::new(SAMPLE_RATE, opus::Channels::Mono, opus::Application::Voip)
    {
        Ok(encoder) => encoder,
        Err(e) => {
            let _ = ready_tx.send(Err(format!("opus encoder init failed: {e}")));
            return;
        }
    };

    let runtime = match tokio::runtime::Builder::new_current_thread().build() {
        Ok(rt) => rt,
        Err(e) => {
            let _ = ready_tx.send(Err(format!("capture runtime init failed: {e}")));
            return;
        }
    };

    let stream_config = cpal::StreamConfig {
        channels: 1,
        sample_rate: cpal::SampleRate(SAMPLE_RATE),
        buffer_size: cpal::BufferSize::Default,
    };

    let (chunk_tx, chunk_rx) = std::sync::mpsc::channel::<Vec<f32>>();
    let stream = match device.build_input_stream(
        &stream_config,
        move |data: &[f32], _: &cpal::InputCallbackInfo| {
            let _ = chunk_tx.send(data.to_vec());
        },
        |err| warn!(error = %err, "input stream error"),
        None,
    ) {
        Ok(stream) => stream,
        Err(e) => {
            let _ = ready_tx.send(Err(e.to_string()));
            return;
        }
    };

    if let Err(e) = stream.play() {
        let _ = ready_tx.send(Err(e.to_string()));
        return;
    }
    let _ = ready_tx.send(Ok(()));

    let mut pcm: Vec<i16> = Vec::with_capacity(FRAME_SAMPLES);
    while !halt.load(Ordering::SeqCst) {
        let chunk = match chunk_rx.recv_timeout(Duration::from_millis(100)) {
            Ok(chunk) => chunk,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        };

        for sample in chunk {
            pcm.push((sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16);
            if pcm.len() < FRAME_SAMPLES {
                continue;
            }
            match encoder.encode_vec(&pcm, MAX_OPUS_PACKET) {
                Ok(data) => {
                    let frame = Sample {
                        data: data.into(),
                        duration: FRAME_DURATION,
                        ..Default::default()
                    };
                    if let Err(e) = runtime.block_on(track.write_sample(&frame)) {
                        debug!(error = %e, "dropping frame, track not writable");
                    }
                }
                Err(e) => warn!(error = %e, "opus encode failed"),
            }
            pcm.clear();
        }
    }
    // Dropping the stream here releases the input device.
    drop(stream);
    debug!("capture thread exited");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detached_stream_has_no_tracks() {
        let stream = LocalAudioStream::detached();
        assert!(stream.tracks().is_empty());
        assert!(!stream.is_stopped());
    }

    #[test]
    fn stop_is_idempotent() {
        let mut stream = LocalAudioStream::detached();
        let flag = stream.stop_flag();
        stream.stop();
        stream.stop();
        assert!(stream.is_stopped());
        assert!(flag.load(Ordering::SeqCst));
    }

    #[test]
    fn drop_stops_the_stream() {
        let stream = LocalAudioStream::detached();
        let flag = stream.stop_flag();
        drop(stream);
        assert!(flag.load(Ordering::SeqCst));
    }
}
