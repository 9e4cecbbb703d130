//! Voice check application entry point.
//!
//! Orchestrates the complete check flow:
//! record → analyze → report

use std::io::{self, IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::analysis::SimulatedEvaluator;
use crate::audio::{CaptureStream, WavCaptureStream};
#[cfg(feature = "cpal-audio")]
use crate::audio::{CpalCaptureStream, list_devices, suppress_audio_warnings};
use crate::cli::ConfigAction;
use crate::config::Config;
use crate::error::{Result, VoxcheckError};
use crate::pipeline::{PipelineState, Session};
use crate::render;

/// Run a single authenticity check: record → analyze → report.
///
/// # Arguments
/// * `config` - Base configuration (can be overridden by CLI args)
/// * `device` - Optional device override from CLI
/// * `duration` - Recording window in seconds (ignored for finite sources)
/// * `wav` - Optional WAV file to check instead of recording ("-" = stdin)
/// * `json` - Emit the report as a single JSON line on stdout
/// * `quiet` - Suppress progress messages
///
/// # Returns
/// Ok(()) when a report was produced or the check was cancelled; an error
/// if capture or analysis failed.
pub async fn run_check_command(
    mut config: Config,
    device: Option<String>,
    duration: u64,
    wav: Option<PathBuf>,
    json: bool,
    quiet: bool,
) -> Result<()> {
    // Apply CLI overrides
    if let Some(d) = device {
        config.audio.device = Some(d);
    }
    config.validate()?;

    let stream = build_capture_stream(&config, wav.as_deref())?;
    let finite = stream.is_finite();

    let evaluator = Arc::new(SimulatedEvaluator::new().with_delay_range(
        Duration::from_millis(config.analysis.min_delay_ms),
        Duration::from_millis(config.analysis.max_delay_ms),
    ));
    let session = Session::new(stream, evaluator);

    session.start().await?;

    if finite {
        if !quiet {
            eprintln!("Reading capture...");
        }
        // stop() drains whatever the source still holds
        session.stop().await?;
    } else if !record_window(&session, Duration::from_secs(duration), quiet).await? {
        // Cancelled mid-recording
        return Ok(());
    }

    if !quiet {
        eprintln!("Analyzing...");
    }

    match session.wait_for_outcome().await {
        PipelineState::Result(report) => {
            if json {
                println!("{}", render::format_report_json(&report)?);
            } else {
                let color = io::stdout().is_terminal();
                println!("{}", render::format_report(&report, color));
            }
            Ok(())
        }
        PipelineState::Failed(failure) => Err(VoxcheckError::Other(failure.message)),
        _ => Err(VoxcheckError::Other(
            "Check ended before a result was produced".to_string(),
        )),
    }
}

/// Choose the capture source: WAV file, piped stdin, or live microphone.
fn build_capture_stream(config: &Config, wav: Option<&Path>) -> Result<Box<dyn CaptureStream>> {
    if let Some(path) = wav {
        if path == Path::new("-") {
            return Ok(Box::new(WavCaptureStream::from_stdin()?));
        }
        return Ok(Box::new(WavCaptureStream::from_path(path)?));
    }

    // Piped input without --wav still means WAV-on-stdin
    if !io::stdin().is_terminal() {
        return Ok(Box::new(WavCaptureStream::from_stdin()?));
    }

    #[cfg(feature = "cpal-audio")]
    {
        // Suppress noisy JACK/ALSA warnings before touching the backend
        suppress_audio_warnings();
        let device = config.audio.device.as_deref();
        let stream = CpalCaptureStream::new(device)?.with_sample_rate(config.audio.sample_rate);
        Ok(Box::new(stream))
    }

    #[cfg(not(feature = "cpal-audio"))]
    {
        let _ = config;
        Err(VoxcheckError::DeviceUnavailable {
            message: "Built without live capture support; pass --wav or pipe a WAV file"
                .to_string(),
        })
    }
}

/// Hold the recording open for the requested window, showing a countdown
/// meter on stderr.
///
/// Returns Ok(false) if the user cancelled with Ctrl+C; the session is
/// reset in that case.
async fn record_window(session: &Session, window: Duration, quiet: bool) -> Result<bool> {
    let deadline = tokio::time::Instant::now() + window;
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        let now = tokio::time::Instant::now();
        if now >= deadline {
            break;
        }

        if !quiet {
            let remaining = (deadline - now).as_secs_f32();
            let buffered = session.buffered_bytes().await;
            eprint!(
                "\r\x1b[2KRecording... {:.1}s left ({} KiB captured)",
                remaining,
                buffered / 1024
            );
            io::stderr().flush().ok();
        }

        tokio::select! {
            _ = tokio::time::sleep(Duration::from_millis(100)) => {}
            result = &mut ctrl_c => {
                result.map_err(|e| {
                    VoxcheckError::Other(format!("Failed to wait for Ctrl+C: {}", e))
                })?;
                if !quiet {
                    render::clear_line();
                    eprintln!("Cancelled.");
                }
                session.reset().await;
                return Ok(false);
            }
        }
    }

    if !quiet {
        render::clear_line();
    }
    session.stop().await?;
    Ok(true)
}

/// List available input devices.
pub fn run_devices_command() -> Result<()> {
    #[cfg(feature = "cpal-audio")]
    {
        let devices = list_devices()?;
        if devices.is_empty() {
            println!("No audio input devices found.");
        } else {
            println!("Available input devices:");
            for name in devices {
                println!("  {name}");
            }
        }
        Ok(())
    }

    #[cfg(not(feature = "cpal-audio"))]
    {
        Err(VoxcheckError::DeviceUnavailable {
            message: "Built without live capture support".to_string(),
        })
    }
}

/// Show configuration details.
pub fn run_config_command(config: &Config, action: &ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let rendered = toml::to_string_pretty(config)
                .map_err(|e| VoxcheckError::Other(format!("Failed to render config: {e}")))?;
            print!("{rendered}");
        }
        ConfigAction::Path => {
            println!("{}", Config::default_path().display());
        }
    }
    Ok(())
}
