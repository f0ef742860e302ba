//! Device-control channel
//!
//! Taps are delivered over adb. Each emulator instance listens on a
//! port derived from its window index, so addressing is a pure function
//! of the index and two config values. Every external invocation runs
//! under a wall-clock timeout: a hung adb server must not stall the
//! monitoring worker.

use std::io::Read;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use crate::error::ExternalToolError;

/// Derive the adb address for an instance index:
/// `base_port + index * stride` on loopback.
///
/// Saturates on an absurd index rather than overflowing; the resulting
/// address simply never shows up in the active list.
pub fn address_for(index: u32, base_port: u16, stride: u16) -> String {
    let port = (base_port as u32).saturating_add(index.saturating_mul(stride as u32));
    format!("127.0.0.1:{}", port)
}

/// Control channel to a device farm
pub trait DeviceChannel: Send {
    /// Establish a connection to the address
    fn connect(&mut self, address: &str) -> Result<(), ExternalToolError>;

    /// Addresses currently in the active (usable) state
    fn list_active_addresses(&mut self) -> Result<Vec<String>, ExternalToolError>;

    /// Inject a tap at device-native coordinates
    fn tap(&mut self, address: &str, x: i32, y: i32) -> Result<(), ExternalToolError>;
}

/// adb-backed channel, shelling out to the configured binary
pub struct AdbChannel {
    adb_path: PathBuf,
    timeout: Duration,
}

impl AdbChannel {
    pub fn new(adb_path: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            adb_path: adb_path.into(),
            timeout,
        }
    }

    fn run(&self, args: &[&str]) -> Result<String, ExternalToolError> {
        let command = format!("{} {}", self.adb_path.display(), args.join(" "));
        log::debug!("running: {}", command);
        run_with_timeout(&self.adb_path, args, self.timeout, &command)
    }
}

impl DeviceChannel for AdbChannel {
    fn connect(&mut self, address: &str) -> Result<(), ExternalToolError> {
        let output = self.run(&["connect", address])?;

        // adb prints "failed to connect ..." with exit code 0
        if output.contains("failed") || output.contains("cannot") {
            return Err(ExternalToolError::ConnectFailed {
                address: address.to_string(),
                detail: output.trim().to_string(),
            });
        }
        Ok(())
    }

    fn list_active_addresses(&mut self) -> Result<Vec<String>, ExternalToolError> {
        let output = self.run(&["devices"])?;
        Ok(parse_device_list(&output))
    }

    fn tap(&mut self, address: &str, x: i32, y: i32) -> Result<(), ExternalToolError> {
        let x = x.to_string();
        let y = y.to_string();
        self.run(&["-s", address, "shell", "input", "tap", &x, &y])?;
        Ok(())
    }
}

/// Parse `adb devices` output, keeping only entries in the `device`
/// state (offline/unauthorized entries are not usable for taps).
fn parse_device_list(output: &str) -> Vec<String> {
    output
        .lines()
        .skip(1)
        .filter_map(|line| {
            let mut fields = line.split_whitespace();
            let serial = fields.next()?;
            let state = fields.next()?;
            (state == "device").then(|| serial.to_string())
        })
        .collect()
}

/// Run a command with bounded wall-clock exposure, killing it on
/// expiry. Returns combined stdout+stderr text on success.
fn run_with_timeout(
    program: &PathBuf,
    args: &[&str],
    timeout: Duration,
    command: &str,
) -> Result<String, ExternalToolError> {
    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| ExternalToolError::SpawnFailed {
            command: command.to_string(),
            detail: e.to_string(),
        })?;

    // Drain pipes on their own threads so the child cannot block on a
    // full pipe while we poll for exit.
    let stdout = child.stdout.take();
    let stderr = child.stderr.take();
    let out_reader = std::thread::spawn(move || read_all(stdout));
    let err_reader = std::thread::spawn(move || read_all(stderr));

    let deadline = Instant::now() + timeout;
    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) => {
                if Instant::now() >= deadline {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(ExternalToolError::Timeout {
                        command: command.to_string(),
                        timeout_ms: timeout.as_millis() as u64,
                    });
                }
                std::thread::sleep(Duration::from_millis(20));
            }
            Err(e) => {
                return Err(ExternalToolError::CommandFailed {
                    command: command.to_string(),
                    detail: e.to_string(),
                })
            }
        }
    };

    let stdout = out_reader.join().unwrap_or_default();
    let stderr = err_reader.join().unwrap_or_default();
    let combined = format!("{}{}", stdout, stderr);

    if status.success() {
        Ok(combined)
    } else {
        Err(ExternalToolError::CommandFailed {
            command: command.to_string(),
            detail: combined.trim().to_string(),
        })
    }
}

fn read_all(pipe: Option<impl Read>) -> String {
    let mut text = String::new();
    if let Some(mut pipe) = pipe {
        let _ = pipe.read_to_string(&mut text);
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_mapping() {
        assert_eq!(address_for(0, 5555, 2), "127.0.0.1:5555");
        assert_eq!(address_for(1, 5555, 2), "127.0.0.1:5557");
        assert_eq!(address_for(3, 5555, 2), "127.0.0.1:5561");
        assert_eq!(address_for(0, 16384, 32), "127.0.0.1:16384");
    }

    #[test]
    fn test_address_mapping_saturates_on_huge_index() {
        // A window titled e.g. "LDPlayer-4294967295" must not panic
        assert_eq!(
            address_for(u32::MAX, 5555, 2),
            format!("127.0.0.1:{}", u32::MAX)
        );
    }

    #[test]
    fn test_parse_device_list() {
        let output = "List of devices attached\n\
                      127.0.0.1:5555\tdevice\n\
                      127.0.0.1:5557\toffline\n\
                      emulator-5554\tdevice\n\
                      127.0.0.1:5559\tunauthorized\n\n";
        let devices = parse_device_list(output);
        assert_eq!(devices, vec!["127.0.0.1:5555", "emulator-5554"]);
    }

    #[test]
    fn test_parse_device_list_empty() {
        assert!(parse_device_list("List of devices attached\n\n").is_empty());
    }

    #[test]
    fn test_spawn_failure_is_reported() {
        let mut channel = AdbChannel::new("/nonexistent/adb", Duration::from_millis(200));
        let err = channel.list_active_addresses().unwrap_err();
        assert!(matches!(err, ExternalToolError::SpawnFailed { .. }));
    }

    #[test]
    #[cfg(unix)]
    fn test_timeout_kills_hung_command() {
        let start = Instant::now();
        let err = run_with_timeout(
            &PathBuf::from("sleep"),
            &["10"],
            Duration::from_millis(150),
            "sleep 10",
        )
        .unwrap_err();
        assert!(matches!(err, ExternalToolError::Timeout { .. }));
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[test]
    #[cfg(unix)]
    fn test_nonzero_exit_is_command_failed() {
        let err = run_with_timeout(
            &PathBuf::from("false"),
            &[],
            Duration::from_secs(2),
            "false",
        )
        .unwrap_err();
        assert!(matches!(err, ExternalToolError::CommandFailed { .. }));
    }

    #[test]
    #[cfg(unix)]
    fn test_successful_command_returns_output() {
        let output = run_with_timeout(
            &PathBuf::from("echo"),
            &["hello"],
            Duration::from_secs(2),
            "echo hello",
        )
        .unwrap();
        assert_eq!(output.trim(), "hello");
    }
}
