use crate::defaults;
use crate::error::{Result, VoxcheckError};
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Trait for microphone stream backends.
///
/// This is the platform boundary the recorder talks to: acquire the stream,
/// drain ordered binary chunks, release the stream. Implementations exist for
/// real devices (cpal), WAV input, and tests (mock).
pub trait CaptureStream: Send + Sync {
    /// Acquire the underlying input stream and begin producing chunks.
    ///
    /// # Returns
    /// Ok(()) once the stream is live, or a `PermissionDenied` /
    /// `DeviceUnavailable` error
    fn acquire(&mut self) -> Result<()>;

    /// Release the underlying input stream. No chunks are produced afterwards.
    fn release(&mut self) -> Result<()>;

    /// Read the next pending chunk of capture bytes.
    ///
    /// # Returns
    /// The chunk in arrival order, or an empty vector when nothing is pending
    fn read_chunk(&mut self) -> Result<Vec<u8>>;

    /// Media type tag describing the chunk payload (e.g. `audio/pcm;rate=16000`).
    fn media_type(&self) -> &str;

    /// Whether this stream runs out of data on its own (WAV input) rather
    /// than producing chunks until released (live microphone).
    fn is_finite(&self) -> bool {
        false
    }
}

impl<S: CaptureStream + ?Sized> CaptureStream for Box<S> {
    fn acquire(&mut self) -> Result<()> {
        (**self).acquire()
    }

    fn release(&mut self) -> Result<()> {
        (**self).release()
    }

    fn read_chunk(&mut self) -> Result<Vec<u8>> {
        (**self).read_chunk()
    }

    fn media_type(&self) -> &str {
        (**self).media_type()
    }

    fn is_finite(&self) -> bool {
        (**self).is_finite()
    }
}

/// Mock capture stream for testing.
///
/// Emits a scripted sequence of chunks, one per `read_chunk` call, and counts
/// acquire/release events so tests can assert on device lifecycle behavior.
#[derive(Debug, Clone)]
pub struct MockCaptureStream {
    is_acquired: bool,
    chunks: VecDeque<Vec<u8>>,
    media_type: String,
    finite: bool,
    should_fail_acquire: bool,
    should_deny_permission: bool,
    should_fail_release: bool,
    should_fail_read: bool,
    error_message: String,
    acquire_count: Arc<AtomicUsize>,
    release_count: Arc<AtomicUsize>,
}

impl MockCaptureStream {
    /// Create a new mock stream with no pending chunks
    pub fn new() -> Self {
        Self {
            is_acquired: false,
            chunks: VecDeque::new(),
            media_type: defaults::PCM_MEDIA_TYPE.to_string(),
            finite: false,
            should_fail_acquire: false,
            should_deny_permission: false,
            should_fail_release: false,
            should_fail_read: false,
            error_message: "mock capture error".to_string(),
            acquire_count: Arc::new(AtomicUsize::new(0)),
            release_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Script the chunks the stream will emit, in order
    pub fn with_chunks<I>(mut self, chunks: I) -> Self
    where
        I: IntoIterator,
        I::Item: AsRef<[u8]>,
    {
        self.chunks = chunks.into_iter().map(|c| c.as_ref().to_vec()).collect();
        self
    }

    /// Configure the media type tag
    pub fn with_media_type(mut self, media_type: &str) -> Self {
        self.media_type = media_type.to_string();
        self
    }

    /// Present as a finite source (like WAV input)
    pub fn with_finite(mut self) -> Self {
        self.finite = true;
        self
    }

    /// Configure the mock to fail acquire with `DeviceUnavailable`
    pub fn with_acquire_failure(mut self) -> Self {
        self.should_fail_acquire = true;
        self
    }

    /// Configure the mock to fail acquire with `PermissionDenied`
    pub fn with_permission_failure(mut self) -> Self {
        self.should_deny_permission = true;
        self
    }

    /// Configure the mock to fail on release
    pub fn with_release_failure(mut self) -> Self {
        self.should_fail_release = true;
        self
    }

    /// Configure the mock to fail on read
    pub fn with_read_failure(mut self) -> Self {
        self.should_fail_read = true;
        self
    }

    /// Configure the error message for failures
    pub fn with_error_message(mut self, message: &str) -> Self {
        self.error_message = message.to_string();
        self
    }

    /// Check if the stream is currently acquired
    pub fn is_acquired(&self) -> bool {
        self.is_acquired
    }

    /// Shared acquire-event counter; clone before moving the mock into a
    /// recorder to assert on it afterwards
    pub fn acquire_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.acquire_count)
    }

    /// Shared release-event counter
    pub fn release_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.release_count)
    }
}

impl Default for MockCaptureStream {
    fn default() -> Self {
        Self::new()
    }
}

impl CaptureStream for MockCaptureStream {
    fn acquire(&mut self) -> Result<()> {
        if self.should_deny_permission {
            return Err(VoxcheckError::PermissionDenied {
                message: self.error_message.clone(),
            });
        }
        if self.should_fail_acquire {
            return Err(VoxcheckError::DeviceUnavailable {
                message: self.error_message.clone(),
            });
        }
        self.acquire_count.fetch_add(1, Ordering::SeqCst);
        self.is_acquired = true;
        Ok(())
    }

    fn release(&mut self) -> Result<()> {
        if self.should_fail_release {
            return Err(VoxcheckError::Capture {
                message: self.error_message.clone(),
            });
        }
        self.release_count.fetch_add(1, Ordering::SeqCst);
        self.is_acquired = false;
        Ok(())
    }

    fn read_chunk(&mut self) -> Result<Vec<u8>> {
        if self.should_fail_read {
            return Err(VoxcheckError::Capture {
                message: self.error_message.clone(),
            });
        }
        Ok(self.chunks.pop_front().unwrap_or_default())
    }

    fn media_type(&self) -> &str {
        &self.media_type
    }

    fn is_finite(&self) -> bool {
        self.finite
    }
}
