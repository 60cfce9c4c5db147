//! Inbound frame classification and utterance assembly

use axum::body::Bytes;

/// Control text that ends an utterance
pub const END_OF_STREAM: &str = "END_OF_STREAM";

/// One message received from the device
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// A full-size binary audio frame
    Audio(Bytes),
    /// Control text, including binary messages of the wrong length
    Control(String),
}

impl Inbound {
    /// Classify a binary message by its length
    #[must_use]
    pub fn from_binary(data: Bytes, frame_len: usize) -> Self {
        if data.len() == frame_len {
            Self::Audio(data)
        } else {
            Self::Control(String::from_utf8_lossy(&data).into_owned())
        }
    }

    /// Whether this message ends the current utterance
    #[must_use]
    pub fn is_end_of_stream(&self) -> bool {
        matches!(self, Self::Control(text) if text.trim() == END_OF_STREAM)
    }
}

/// Audio collected between two end-of-utterance markers
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Utterance {
    pub bytes: Vec<u8>,
    pub frames: usize,
    /// Frames were dropped because the utterance hit the cap
    pub truncated: bool,
}

impl Utterance {
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.frames == 0
    }
}

/// Per-session frame accumulator
///
/// Frames are kept in arrival order. [`IngestBuffer::flush`] always leaves the
/// buffer empty, whatever happens to the returned utterance.
#[derive(Debug)]
pub struct IngestBuffer {
    frame_len: usize,
    max_frames: usize,
    frames: Vec<Bytes>,
    dropped: usize,
}

impl IngestBuffer {
    /// Create a buffer for frames of `frame_len` bytes, holding at most `max_frames`
    #[must_use]
    pub const fn new(frame_len: usize, max_frames: usize) -> Self {
        Self {
            frame_len,
            max_frames,
            frames: Vec::new(),
            dropped: 0,
        }
    }

    /// Expected inbound frame length
    #[must_use]
    pub const fn frame_len(&self) -> usize {
        self.frame_len
    }

    /// Append a frame; returns false when it was dropped at the cap
    pub fn push(&mut self, frame: Bytes) -> bool {
        if self.frames.len() >= self.max_frames {
            if self.dropped == 0 {
                tracing::warn!(max_frames = self.max_frames, "utterance cap reached, dropping frames");
            }
            self.dropped += 1;
            return false;
        }
        tracing::trace!(bytes = frame.len(), frames = self.frames.len() + 1, "frame buffered");
        self.frames.push(frame);
        true
    }

    /// Concatenate buffered frames into one utterance and reset
    pub fn flush(&mut self) -> Utterance {
        let frames = std::mem::take(&mut self.frames);
        let truncated = std::mem::take(&mut self.dropped) > 0;

        let mut bytes = Vec::with_capacity(frames.iter().map(Bytes::len).sum());
        for frame in &frames {
            bytes.extend_from_slice(frame);
        }

        Utterance {
            bytes,
            frames: frames.len(),
            truncated,
        }
    }

    /// Discard everything buffered
    pub fn clear(&mut self) {
        self.frames.clear();
        self.dropped = 0;
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}
