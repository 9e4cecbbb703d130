//! Recording lifecycle and capture finalization.
//!
//! Drives a [`CaptureStream`] through acquire → buffer → release and turns
//! the buffered chunks into one immutable [`AudioCapture`].

use crate::audio::stream::CaptureStream;
use crate::error::{Result, VoxcheckError};
use tracing::warn;

/// A finalized recording: opaque capture bytes plus a media type tag.
///
/// Immutable once built; consumers read, they never edit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioCapture {
    bytes: Vec<u8>,
    media_type: String,
}

impl AudioCapture {
    /// Build a capture from raw bytes and a media type tag.
    pub fn new(bytes: Vec<u8>, media_type: impl Into<String>) -> Self {
        Self {
            bytes,
            media_type: media_type.into(),
        }
    }

    /// The capture payload.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Payload length in bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// True when the capture holds no audio data at all.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Media type tag, e.g. `audio/pcm;rate=16000`.
    pub fn media_type(&self) -> &str {
        &self.media_type
    }
}

/// Manages a single recording: owns the capture stream and an append-only,
/// arrival-ordered chunk buffer.
///
/// One acquire event per `start()`, one release event per `stop()`, never
/// both for a call that failed. `stop()` finalizes the buffered chunks into
/// an [`AudioCapture`] by concatenating them in arrival order, bit for bit.
pub struct Recorder<S: CaptureStream> {
    stream: S,
    chunks: Vec<Vec<u8>>,
    active: bool,
}

impl<S: CaptureStream> Recorder<S> {
    /// Create a recorder over the given capture stream.
    pub fn new(stream: S) -> Self {
        Self {
            stream,
            chunks: Vec::new(),
            active: false,
        }
    }

    /// Whether a recording is in progress.
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Total bytes buffered so far for the current recording.
    pub fn buffered_bytes(&self) -> usize {
        self.chunks.iter().map(Vec::len).sum()
    }

    /// Whether the underlying stream runs out of data on its own.
    pub fn stream_is_finite(&self) -> bool {
        self.stream.is_finite()
    }

    /// Acquire the stream and begin buffering chunks.
    ///
    /// # Errors
    /// `AlreadyRecording` if a recording is in progress (the stream is not
    /// touched), or the stream's acquire error (`PermissionDenied` /
    /// `DeviceUnavailable`). A failed start performs no release.
    pub fn start(&mut self) -> Result<()> {
        if self.active {
            return Err(VoxcheckError::AlreadyRecording);
        }
        self.stream.acquire()?;
        self.active = true;
        Ok(())
    }

    /// Move all pending chunks from the stream into the buffer.
    ///
    /// Called periodically while recording so the stream's own queue stays
    /// small. Chunks are appended strictly in arrival order.
    ///
    /// # Returns
    /// Number of bytes appended by this poll
    pub fn poll(&mut self) -> Result<usize> {
        if !self.active {
            return Err(VoxcheckError::NotRecording);
        }
        self.drain_pending()
    }

    /// Release the stream and finalize the buffered chunks into a capture.
    ///
    /// The capture is the concatenation of every buffered chunk in arrival
    /// order; its length equals the sum of the chunk lengths.
    ///
    /// # Errors
    /// `NotRecording` if no recording is in progress (nothing changes).
    /// If the release itself fails the recorder stays active.
    pub fn stop(&mut self) -> Result<AudioCapture> {
        if !self.active {
            return Err(VoxcheckError::NotRecording);
        }

        // Release first so the stream stops producing; anything it already
        // produced stays readable and is picked up by the final drain.
        self.stream.release()?;
        self.active = false;

        if let Err(e) = self.drain_pending() {
            self.chunks.clear();
            return Err(e);
        }

        let capture = AudioCapture::new(self.chunks.concat(), self.stream.media_type());
        self.chunks.clear();
        Ok(capture)
    }

    /// Drop the current recording without producing a capture.
    ///
    /// Releases the stream (best effort) and clears the buffer. Used by the
    /// reset path; a no-op when idle.
    pub fn discard(&mut self) {
        if self.active {
            if let Err(e) = self.stream.release() {
                warn!("failed to release capture stream on discard: {e}");
            }
            self.active = false;
        }
        self.chunks.clear();
    }

    fn drain_pending(&mut self) -> Result<usize> {
        let mut appended = 0;
        loop {
            let chunk = self.stream.read_chunk()?;
            if chunk.is_empty() {
                break;
            }
            appended += chunk.len();
            self.chunks.push(chunk);
        }
        Ok(appended)
    }
}
