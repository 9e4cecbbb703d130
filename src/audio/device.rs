//! Real microphone capture using CPAL (Cross-Platform Audio Library).

use crate::audio::stream::CaptureStream;
use crate::audio::wav::samples_to_le_bytes;
use crate::defaults;
use crate::error::{Result, VoxcheckError};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam_channel::{Receiver, Sender, TryRecvError};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{info, warn};

/// Run a closure with stderr temporarily redirected to /dev/null.
///
/// This suppresses noisy ALSA/JACK/PipeWire messages that CPAL triggers
/// when probing audio backends. The messages are harmless but confusing to users.
///
/// # Safety
/// Uses `libc::dup`/`libc::dup2` to save and restore file descriptor 2 (stderr).
/// Safe as long as no other thread is concurrently manipulating fd 2.
fn with_suppressed_stderr<F, R>(f: F) -> R
where
    F: FnOnce() -> R,
{
    unsafe {
        let saved_fd = libc::dup(2);
        let devnull = libc::open(c"/dev/null".as_ptr(), libc::O_WRONLY);
        if saved_fd >= 0 && devnull >= 0 {
            libc::dup2(devnull, 2);
            libc::close(devnull);
        }

        let result = f();

        if saved_fd >= 0 {
            libc::dup2(saved_fd, 2);
            libc::close(saved_fd);
        }

        result
    }
}

/// Suppress noisy JACK/ALSA error messages that occur during audio backend probing.
/// These are harmless but confusing to users.
///
/// # Safety
/// This modifies environment variables which is safe when called before spawning threads.
pub fn suppress_audio_warnings() {
    // SAFETY: Called at startup before any threads are spawned
    unsafe {
        std::env::set_var("JACK_NO_START_SERVER", "1");
        std::env::set_var("JACK_NO_AUDIO_RESERVATION", "1");
        std::env::set_var("PIPEWIRE_DEBUG", "0");
        std::env::set_var("ALSA_DEBUG", "0");
        std::env::set_var("PW_LOG", "0");
    }
}

/// Preferred device names on PipeWire/PulseAudio systems.
const PREFERRED_DEVICES: &[&str] = &["pipewire", "pulse", "PulseAudio"];

/// Device name patterns to filter out (not useful for voice input).
const FILTERED_PATTERNS: &[&str] = &[
    "surround",
    "front:",
    "rear:",
    "center:",
    "side:",
    "Digital Output",
    "HDMI",
    "S/PDIF",
];

/// Check if a device name should be filtered out.
fn should_filter_device(name: &str) -> bool {
    let lower = name.to_lowercase();
    FILTERED_PATTERNS
        .iter()
        .any(|pattern| lower.contains(&pattern.to_lowercase()))
}

/// Check if a device is a preferred device.
fn is_preferred_device(name: &str) -> bool {
    let lower = name.to_lowercase();
    PREFERRED_DEVICES
        .iter()
        .any(|pref| lower.contains(&pref.to_lowercase()))
}

/// Classify a backend error string into the recorder error taxonomy.
///
/// CPAL reports everything as backend-specific strings, so permission
/// problems have to be recognized by message content; anything else is
/// treated as the device being unavailable.
fn classify_stream_error(context: &str, detail: &str) -> VoxcheckError {
    let lower = detail.to_lowercase();
    let denied = ["permission", "denied", "unauthorized", "not authorized"]
        .iter()
        .any(|needle| lower.contains(needle));
    if denied {
        VoxcheckError::PermissionDenied {
            message: format!("{}: {}", context, detail),
        }
    } else {
        VoxcheckError::DeviceUnavailable {
            message: format!("{}: {}", context, detail),
        }
    }
}

/// List all available audio input devices with filtering and recommendations.
///
/// # Returns
/// A vector of device names, with preferred devices marked with "\[recommended\]".
/// Filters out obviously unusable devices (surround channels, HDMI, etc.).
///
/// # Errors
/// Returns `VoxcheckError::DeviceUnavailable` if device enumeration fails.
///
/// # Note
/// During enumeration, cpal may output ALSA/JACK warnings to stderr while
/// probing backends. These warnings are harmless and can be safely ignored.
pub fn list_devices() -> Result<Vec<String>> {
    with_suppressed_stderr(|| {
        let host = cpal::default_host();
        let devices = host
            .input_devices()
            .map_err(|e| VoxcheckError::DeviceUnavailable {
                message: format!("Failed to enumerate input devices: {}", e),
            })?;

        let mut device_names = Vec::new();
        for device in devices {
            if let Ok(name) = device.name() {
                if should_filter_device(&name) {
                    continue;
                }

                if is_preferred_device(&name) {
                    device_names.push(format!("{} [recommended]", name));
                } else {
                    device_names.push(name);
                }
            }
        }

        Ok(device_names)
    })
}

/// Get the best default input device, preferring PipeWire/PulseAudio.
///
/// Tries in order:
/// 1. PipeWire
/// 2. PulseAudio/Pulse
/// 3. System default
///
/// This ensures we respect the desktop's audio device selection.
fn get_best_default_device() -> Result<cpal::Device> {
    with_suppressed_stderr(|| {
        let host = cpal::default_host();

        if let Ok(devices) = host.input_devices() {
            for device in devices {
                if let Ok(name) = device.name()
                    && is_preferred_device(&name)
                {
                    return Ok(device);
                }
            }
        }

        host.default_input_device()
            .ok_or_else(|| VoxcheckError::DeviceUnavailable {
                message: "no default input device".to_string(),
            })
    })
}

/// Wrapper for cpal::Stream to make it Send.
///
/// SAFETY: We ensure that the stream is only accessed from a single thread at
/// a time through the Mutex wrapper in CpalCaptureStream. The stream methods
/// are called synchronously and don't cross thread boundaries unsafely.
struct SendableStream(cpal::Stream);

unsafe impl Send for SendableStream {}

/// Mix multi-channel audio to mono and resample to the target rate.
fn convert_to_mono_16khz_i16(
    samples: &[i16],
    channels: usize,
    source_rate: u32,
    target_rate: u32,
) -> Vec<i16> {
    // Mix to mono by averaging channels
    let mono: Vec<i16> = if channels == 1 {
        samples.to_vec()
    } else {
        samples
            .chunks_exact(channels)
            .map(|frame| {
                let sum: i32 = frame.iter().map(|&s| s as i32).sum();
                (sum / channels as i32) as i16
            })
            .collect()
    };

    if source_rate == target_rate {
        mono
    } else {
        crate::audio::wav::resample(&mono, source_rate, target_rate)
    }
}

/// Real microphone capture stream using CPAL.
///
/// Converts everything to 16-bit PCM at 16kHz mono and hands the recorder one
/// byte chunk per input callback, in callback order. Tries the preferred
/// format first (i16/16kHz/mono), then falls back to the device's native
/// config with software conversion (channel mixing + resampling).
///
/// Note: The stream is wrapped in SendableStream + Mutex to make it
/// Send+Sync. This is safe because we ensure exclusive access through the
/// Mutex.
pub struct CpalCaptureStream {
    device: cpal::Device,
    stream: Mutex<Option<SendableStream>>,
    chunk_tx: Sender<Vec<u8>>,
    chunk_rx: Receiver<Vec<u8>>,
    callback_count: std::sync::Arc<AtomicU64>,
    sample_rate: u32,
    media_type: String,
}

impl CpalCaptureStream {
    /// Create a new CPAL capture stream.
    ///
    /// # Arguments
    /// * `device_name` - Optional device name. If None, uses the default input device.
    ///
    /// # Errors
    /// Returns `DeviceUnavailable` if the device cannot be found or the
    /// backend cannot enumerate devices.
    pub fn new(device_name: Option<&str>) -> Result<Self> {
        let device = with_suppressed_stderr(|| {
            let host = cpal::default_host();

            if let Some(name) = device_name {
                let devices =
                    host.input_devices()
                        .map_err(|e| VoxcheckError::DeviceUnavailable {
                            message: format!("Failed to enumerate devices: {}", e),
                        })?;

                let mut found_device = None;
                for dev in devices {
                    if let Ok(dev_name) = dev.name()
                        && dev_name == name
                    {
                        found_device = Some(dev);
                        break;
                    }
                }

                found_device.ok_or_else(|| VoxcheckError::DeviceUnavailable {
                    message: format!("input device not found: {}", name),
                })
            } else {
                get_best_default_device()
            }
        })?;

        let (chunk_tx, chunk_rx) = crossbeam_channel::unbounded();

        Ok(Self {
            device,
            stream: Mutex::new(None),
            chunk_tx,
            chunk_rx,
            callback_count: std::sync::Arc::new(AtomicU64::new(0)),
            sample_rate: defaults::SAMPLE_RATE,
            media_type: defaults::PCM_MEDIA_TYPE.to_string(),
        })
    }

    /// Capture at a non-default rate. The PCM media type follows the rate.
    pub fn with_sample_rate(mut self, rate: u32) -> Self {
        self.sample_rate = rate;
        self.media_type = format!("audio/pcm;rate={}", rate);
        self
    }

    /// Build the audio stream with the configured format.
    ///
    /// Tries in order:
    /// 1. i16/16kHz/mono — preferred, zero-copy path
    /// 2. f32/16kHz/mono — for devices that only expose float formats
    /// 3. Device default config — native rate/channels with software conversion
    ///
    /// Step 3 handles PipeWire setups where the ALSA compatibility layer accepts
    /// non-native configs but never fires the data callback.
    fn build_stream(&self) -> Result<cpal::Stream> {
        let preferred_config = cpal::StreamConfig {
            channels: 1,
            sample_rate: self.sample_rate,
            buffer_size: cpal::BufferSize::Default,
        };

        let err_callback = |err| {
            warn!("audio stream error: {}", err);
        };

        // Try i16/16kHz/mono — works with PipeWire/PulseAudio which convert transparently
        let tx = self.chunk_tx.clone();
        let counter = std::sync::Arc::clone(&self.callback_count);
        if let Ok(stream) = self.device.build_input_stream(
            &preferred_config,
            move |data: &[i16], _: &cpal::InputCallbackInfo| {
                counter.fetch_add(1, Ordering::Relaxed);
                if !data.is_empty() {
                    tx.send(samples_to_le_bytes(data)).ok();
                }
            },
            err_callback,
            None,
        ) {
            return Ok(stream);
        }

        // Try f32/16kHz/mono — for devices that only expose float formats
        let tx = self.chunk_tx.clone();
        let counter = std::sync::Arc::clone(&self.callback_count);
        if let Ok(stream) = self.device.build_input_stream(
            &preferred_config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                counter.fetch_add(1, Ordering::Relaxed);
                if !data.is_empty() {
                    let samples: Vec<i16> = data
                        .iter()
                        .map(|&s| (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16)
                        .collect();
                    tx.send(samples_to_le_bytes(&samples)).ok();
                }
            },
            err_callback,
            None,
        ) {
            return Ok(stream);
        }

        // Fallback: capture at device's native config, convert in software.
        // Some PipeWire-ALSA setups accept non-native configs but never deliver data.
        self.build_stream_native()
    }

    /// Build a stream using the device's default/native config, with software
    /// channel mixing (stereo→mono) and resampling (native rate→16kHz).
    fn build_stream_native(&self) -> Result<cpal::Stream> {
        use cpal::SampleFormat;

        let default_config =
            self.device
                .default_input_config()
                .map_err(|e| VoxcheckError::DeviceUnavailable {
                    message: format!("Failed to query default input config: {}", e),
                })?;

        let native_rate = default_config.sample_rate();
        let native_channels = default_config.channels() as usize;
        let target_rate = self.sample_rate;

        let stream_config: cpal::StreamConfig = default_config.clone().into();

        info!(
            "using native audio format ({}ch/{}Hz/{:?}), converting in software",
            native_channels,
            native_rate,
            default_config.sample_format(),
        );

        let err_callback = |err| {
            warn!("audio stream error: {}", err);
        };

        let tx = self.chunk_tx.clone();
        let counter = std::sync::Arc::clone(&self.callback_count);

        match default_config.sample_format() {
            SampleFormat::I16 => self
                .device
                .build_input_stream(
                    &stream_config,
                    move |data: &[i16], _: &cpal::InputCallbackInfo| {
                        counter.fetch_add(1, Ordering::Relaxed);
                        let converted = convert_to_mono_16khz_i16(
                            data,
                            native_channels,
                            native_rate,
                            target_rate,
                        );
                        if !converted.is_empty() {
                            tx.send(samples_to_le_bytes(&converted)).ok();
                        }
                    },
                    err_callback,
                    None,
                )
                .map_err(|e| {
                    classify_stream_error("Failed to build native i16 stream", &e.to_string())
                }),
            SampleFormat::F32 => self
                .device
                .build_input_stream(
                    &stream_config,
                    move |data: &[f32], _: &cpal::InputCallbackInfo| {
                        counter.fetch_add(1, Ordering::Relaxed);
                        let i16_data: Vec<i16> = data
                            .iter()
                            .map(|&s| (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16)
                            .collect();
                        let converted = convert_to_mono_16khz_i16(
                            &i16_data,
                            native_channels,
                            native_rate,
                            target_rate,
                        );
                        if !converted.is_empty() {
                            tx.send(samples_to_le_bytes(&converted)).ok();
                        }
                    },
                    err_callback,
                    None,
                )
                .map_err(|e| {
                    classify_stream_error("Failed to build native f32 stream", &e.to_string())
                }),
            fmt => Err(VoxcheckError::DeviceUnavailable {
                message: format!(
                    "Unsupported native sample format: {:?}. \
                     Try specifying a device with --device.",
                    fmt
                ),
            }),
        }
    }

    fn lock_stream(&self) -> Result<std::sync::MutexGuard<'_, Option<SendableStream>>> {
        self.stream.lock().map_err(|e| VoxcheckError::Capture {
            message: format!("Failed to lock stream: {}", e),
        })
    }
}

impl CaptureStream for CpalCaptureStream {
    fn acquire(&mut self) -> Result<()> {
        {
            let stream_guard = self.lock_stream()?;
            if stream_guard.is_some() {
                return Ok(()); // Already acquired
            }
        }

        // Discard chunks left over from a previous acquisition so a new
        // recording starts from a clean slate.
        while self.chunk_rx.try_recv().is_ok() {}
        self.callback_count.store(0, Ordering::Relaxed);

        let stream = self.build_stream()?;
        stream
            .play()
            .map_err(|e| classify_stream_error("Failed to start audio stream", &e.to_string()))?;

        // Wait briefly to check if the CPAL callback actually fires.
        // Some PipeWire-ALSA setups accept non-native configs but never deliver data.
        std::thread::sleep(std::time::Duration::from_millis(200));

        let final_stream = if self.callback_count.load(Ordering::Relaxed) == 0 {
            // Preferred config didn't deliver data — drop it, clear the
            // channel, try the native config instead
            drop(stream);
            while self.chunk_rx.try_recv().is_ok() {}

            let native_stream = self.build_stream_native()?;
            native_stream.play().map_err(|e| {
                classify_stream_error("Failed to start native audio stream", &e.to_string())
            })?;
            native_stream
        } else {
            stream
        };

        let mut stream_guard = self.lock_stream()?;
        *stream_guard = Some(SendableStream(final_stream));
        Ok(())
    }

    fn release(&mut self) -> Result<()> {
        let mut stream_guard = self.lock_stream()?;

        if let Some(sendable_stream) = stream_guard.take() {
            sendable_stream.0.pause().map_err(|e| VoxcheckError::Capture {
                message: format!("Failed to stop audio stream: {}", e),
            })?;
        }
        Ok(())
    }

    fn read_chunk(&mut self) -> Result<Vec<u8>> {
        match self.chunk_rx.try_recv() {
            Ok(chunk) => Ok(chunk),
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => Ok(Vec::new()),
        }
    }

    fn media_type(&self) -> &str {
        &self.media_type
    }

    fn is_finite(&self) -> bool {
        false
    }
}
