//! Error types for voxcheck.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum VoxcheckError {
    // Configuration errors
    #[error("Configuration file not found at {path}")]
    ConfigFileNotFound { path: String },

    #[error("Invalid configuration value for {key}: {message}")]
    ConfigInvalidValue { key: String, message: String },

    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    // Recorder errors
    #[error("Microphone permission denied: {message}")]
    PermissionDenied { message: String },

    #[error("Audio device unavailable: {message}")]
    DeviceUnavailable { message: String },

    #[error("No recording in progress")]
    NotRecording,

    #[error("A recording is already in progress")]
    AlreadyRecording,

    #[error("Audio capture failed: {message}")]
    Capture { message: String },

    // Pipeline errors
    #[error("Pipeline is not idle; reset before starting a new check")]
    NotIdle,

    // Evaluation errors
    #[error("Capture is empty; nothing to evaluate")]
    EmptyCapture,

    #[error("Evaluation failed: {message}")]
    Evaluation { message: String },

    // General I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Generic error for cases not covered above
    #[error("{0}")]
    Other(String),
}

// Type alias for convenience
pub type Result<T> = std::result::Result<T, VoxcheckError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_config_file_not_found_display() {
        let error = VoxcheckError::ConfigFileNotFound {
            path: "/path/to/config.toml".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Configuration file not found at /path/to/config.toml"
        );
    }

    #[test]
    fn test_config_invalid_value_display() {
        let error = VoxcheckError::ConfigInvalidValue {
            key: "analysis.min_delay_ms".to_string(),
            message: "must not exceed max_delay_ms".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Invalid configuration value for analysis.min_delay_ms: must not exceed max_delay_ms"
        );
    }

    #[test]
    fn test_permission_denied_display() {
        let error = VoxcheckError::PermissionDenied {
            message: "input stream rejected by backend".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Microphone permission denied: input stream rejected by backend"
        );
    }

    #[test]
    fn test_device_unavailable_display() {
        let error = VoxcheckError::DeviceUnavailable {
            message: "no default input device".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Audio device unavailable: no default input device"
        );
    }

    #[test]
    fn test_not_recording_display() {
        assert_eq!(
            VoxcheckError::NotRecording.to_string(),
            "No recording in progress"
        );
    }

    #[test]
    fn test_already_recording_display() {
        assert_eq!(
            VoxcheckError::AlreadyRecording.to_string(),
            "A recording is already in progress"
        );
    }

    #[test]
    fn test_capture_display() {
        let error = VoxcheckError::Capture {
            message: "stream closed mid-read".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Audio capture failed: stream closed mid-read"
        );
    }

    #[test]
    fn test_not_idle_display() {
        assert_eq!(
            VoxcheckError::NotIdle.to_string(),
            "Pipeline is not idle; reset before starting a new check"
        );
    }

    #[test]
    fn test_empty_capture_display() {
        assert_eq!(
            VoxcheckError::EmptyCapture.to_string(),
            "Capture is empty; nothing to evaluate"
        );
    }

    #[test]
    fn test_evaluation_display() {
        let error = VoxcheckError::Evaluation {
            message: "backend returned garbage".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Evaluation failed: backend returned garbage"
        );
    }

    #[test]
    fn test_other_display() {
        let error = VoxcheckError::Other("unexpected error".to_string());
        assert_eq!(error.to_string(), "unexpected error");
    }

    #[test]
    fn test_from_io_error() {
        let io_error = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let error: VoxcheckError = io_error.into();
        assert!(error.to_string().contains("file not found"));
    }

    #[test]
    fn test_from_toml_error() {
        let toml_str = "invalid = toml = syntax";
        let toml_error = toml::from_str::<toml::Value>(toml_str).unwrap_err();
        let error: VoxcheckError = toml_error.into();
        assert!(error.to_string().contains("Configuration error"));
    }

    #[test]
    fn test_result_type_alias() {
        fn returns_result() -> Result<i32> {
            Ok(42)
        }
        assert_eq!(returns_result().unwrap(), 42);

        fn returns_error() -> Result<i32> {
            Err(VoxcheckError::Other("test error".to_string()))
        }
        assert!(returns_error().is_err());
    }

    #[test]
    fn test_error_source_chain_io() {
        let io_error = io::Error::new(io::ErrorKind::PermissionDenied, "access denied");
        let error: VoxcheckError = io_error.into();

        let error_trait: &dyn std::error::Error = &error;
        assert!(error_trait.source().is_some());
    }

    #[test]
    fn test_error_is_send_and_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<VoxcheckError>();
        assert_sync::<VoxcheckError>();
    }

    #[test]
    fn test_error_debug_format() {
        let error = VoxcheckError::ConfigFileNotFound {
            path: "/test/path".to_string(),
        };
        let debug_str = format!("{:?}", error);
        assert!(debug_str.contains("ConfigFileNotFound"));
        assert!(debug_str.contains("/test/path"));
    }
}
