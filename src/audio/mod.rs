//! Audio capture: stream abstraction, recorder, and capture backends.

#[cfg(feature = "cpal-audio")]
pub mod device;
pub mod recorder;
pub mod stream;
pub mod wav;

#[cfg(feature = "cpal-audio")]
pub use device::{CpalCaptureStream, list_devices, suppress_audio_warnings};
pub use recorder::{AudioCapture, Recorder};
pub use stream::{CaptureStream, MockCaptureStream};
pub use wav::WavCaptureStream;
