//! Outbound audio framing and pacing
//!
//! Every response is bracketed by [`AUDIO_STREAM_START`] and [`AUDIO_STREAM_END`].
//! Audio between the markers is sliced into fixed-size frames and sent at the
//! rate the device can play them, followed by a short silence pad so the
//! device's DAC drains cleanly.

use std::time::Duration;

use async_trait::async_trait;

/// Sent before the first frame of a response
pub const AUDIO_STREAM_START: &str = "AUDIO_STREAM_START";

/// Sent after the silence pad of a response
pub const AUDIO_STREAM_END: &str = "AUDIO_STREAM_END";

/// The client socket is gone
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("client socket closed")]
pub struct SocketClosed;

/// Outcome of one send
pub type Delivery = std::result::Result<(), SocketClosed>;

/// Where paced audio goes
///
/// Implementations report [`SocketClosed`] once the peer is gone; callers stop
/// sending at that point without treating it as an error.
#[async_trait]
pub trait AudioSink: Send {
    /// Whether sends can still reach the client
    fn is_open(&self) -> bool;

    /// Send a control text
    async fn send_text(&mut self, text: &str) -> Delivery;

    /// Send one binary frame
    async fn send_binary(&mut self, frame: Vec<u8>) -> Delivery;
}

/// Frame size and timing of outbound audio
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pacer {
    pub frame_bytes: usize,
    pub frame_delay: Duration,
    pub silence_bytes: usize,
    pub end_delay: Duration,
}

impl Default for Pacer {
    fn default() -> Self {
        Self {
            frame_bytes: 2048,
            frame_delay: Duration::from_millis(50),
            silence_bytes: 1600,
            end_delay: Duration::from_millis(100),
        }
    }
}

impl Pacer {
    /// Same framing with a different inter-frame delay
    #[must_use]
    pub const fn with_frame_delay(self, frame_delay: Duration) -> Self {
        Self {
            frame_delay,
            ..self
        }
    }

    /// Open a response
    ///
    /// # Errors
    ///
    /// Returns [`SocketClosed`] if the sink is closed
    pub async fn begin(&self, sink: &mut dyn AudioSink) -> Delivery {
        if !sink.is_open() {
            return Err(SocketClosed);
        }
        sink.send_text(AUDIO_STREAM_START).await
    }

    /// Send a payload as paced frames
    ///
    /// The last frame may be shorter than `frame_bytes`. The sink is checked
    /// before every frame.
    ///
    /// # Errors
    ///
    /// Returns [`SocketClosed`] as soon as the sink closes
    pub async fn stream(&self, sink: &mut dyn AudioSink, payload: &[u8]) -> Delivery {
        let frame_bytes = self.frame_bytes.max(1);
        let frames = payload.len().div_ceil(frame_bytes);
        tracing::trace!(bytes = payload.len(), frames, "streaming audio");

        for chunk in payload.chunks(frame_bytes) {
            if !sink.is_open() {
                return Err(SocketClosed);
            }
            sink.send_binary(chunk.to_vec()).await?;
            tokio::time::sleep(self.frame_delay).await;
        }
        Ok(())
    }

    /// Close a response: silence pad, a short wait, then the end marker
    ///
    /// # Errors
    ///
    /// Returns [`SocketClosed`] if the sink closes first
    pub async fn finish(&self, sink: &mut dyn AudioSink) -> Delivery {
        if !sink.is_open() {
            return Err(SocketClosed);
        }
        if self.silence_bytes > 0 {
            sink.send_binary(vec![0u8; self.silence_bytes]).await?;
        }
        tokio::time::sleep(self.end_delay).await;

        if !sink.is_open() {
            return Err(SocketClosed);
        }
        sink.send_text(AUDIO_STREAM_END).await
    }

    /// Send one complete response: start marker, frames, silence, end marker
    ///
    /// # Errors
    ///
    /// Returns [`SocketClosed`] if the sink closes at any point
    pub async fn play(&self, sink: &mut dyn AudioSink, payload: &[u8]) -> Delivery {
        self.begin(sink).await?;
        self.stream(sink, payload).await?;
        self.finish(sink).await
    }
}
