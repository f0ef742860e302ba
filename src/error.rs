//! Error types for the watchdog

use std::path::PathBuf;
use thiserror::Error;

/// Result type for watchdog operations
pub type Result<T> = std::result::Result<T, WatchError>;

/// Top-level error type
#[derive(Debug, Error)]
pub enum WatchError {
    /// Window capture failed for one instance
    #[error("capture failed: {0}")]
    Capture(#[from] CaptureError),

    /// A reference image could not be loaded
    #[error("template load failed: {0}")]
    TemplateLoad(#[from] TemplateLoadError),

    /// Template is larger than the frame in at least one axis
    #[error("template {template} ({tw}x{th}) exceeds frame ({fw}x{fh})")]
    DimensionMismatch {
        template: String,
        tw: u32,
        th: u32,
        fw: u32,
        fh: u32,
    },

    /// The device-control tool reported a failure
    #[error("device control failed: {0}")]
    ExternalTool(#[from] ExternalToolError),

    /// The backing process no longer exists
    #[error("process {pid} no longer exists")]
    ProcessGone { pid: u32 },

    /// Two instance windows carry the same numeric suffix
    #[error("duplicate instance index {index}: '{first}' and '{second}'")]
    DuplicateInstanceIndex {
        index: u32,
        first: String,
        second: String,
    },

    /// Process termination was denied or the process already exited
    #[error("failed to terminate pid {pid}: {detail}")]
    TerminateFailed { pid: u32, detail: String },

    /// Monitor start requested while already running
    #[error("monitor already running")]
    AlreadyRunning,

    /// The monitoring worker thread could not be spawned
    #[error("failed to spawn monitor worker: {0}")]
    WorkerSpawn(String),

    /// Configuration file could not be read or parsed
    #[error("config error at {path}: {detail}")]
    Config { path: PathBuf, detail: String },
}

/// Why a window capture failed
#[derive(Debug, Error)]
pub enum CaptureError {
    /// Handle no longer resolves to a window
    #[error("window handle is no longer valid")]
    InvalidHandle,

    /// Window reports zero width or height
    #[error("window has zero size")]
    ZeroSize,

    /// The underlying device-copy primitive failed
    #[error("capture device error: {0}")]
    DeviceError(String),
}

/// Why a reference image failed to load
#[derive(Debug, Error)]
pub enum TemplateLoadError {
    #[error("template not found: {0}")]
    NotFound(PathBuf),

    #[error("failed to decode {path}: {detail}")]
    DecodeError { path: PathBuf, detail: String },
}

/// Failures from the external device-control tool
#[derive(Debug, Error)]
pub enum ExternalToolError {
    /// `connect` returned a failure status
    #[error("connect to {address} failed: {detail}")]
    ConnectFailed { address: String, detail: String },

    /// Address absent from the active-connections list after connect
    #[error("device {address} not in active device list")]
    DeviceNotListed { address: String },

    /// The tool exited with a non-zero status
    #[error("command '{command}' failed: {detail}")]
    CommandFailed { command: String, detail: String },

    /// The tool did not finish within the allowed wall-clock time
    #[error("command '{command}' timed out after {timeout_ms}ms")]
    Timeout { command: String, timeout_ms: u64 },

    /// The tool binary could not be launched at all
    #[error("failed to launch '{command}': {detail}")]
    SpawnFailed { command: String, detail: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capture_error_display() {
        let err = WatchError::Capture(CaptureError::ZeroSize);
        assert!(err.to_string().contains("zero size"));
    }

    #[test]
    fn test_duplicate_index_display() {
        let err = WatchError::DuplicateInstanceIndex {
            index: 3,
            first: "LDPlayer-3".into(),
            second: "LDPlayer-3".into(),
        };
        let s = err.to_string();
        assert!(s.contains("duplicate instance index 3"));
        assert!(s.contains("LDPlayer-3"));
    }

    #[test]
    fn test_external_tool_display() {
        let err = ExternalToolError::DeviceNotListed {
            address: "127.0.0.1:5561".into(),
        };
        assert!(err.to_string().contains("127.0.0.1:5561"));

        let err = ExternalToolError::Timeout {
            command: "adb devices".into(),
            timeout_ms: 5000,
        };
        assert!(err.to_string().contains("5000ms"));
    }
}
