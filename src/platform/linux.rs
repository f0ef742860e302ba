//! Linux process primitives via /proc
//!
//! Window enumeration and capture are Windows-only; on Linux the crate
//! still provides process listing, liveness and termination so the
//! monitor's liveness pass and the test suite work headlessly.

use std::fs;
use std::path::Path;

use crate::error::{Result, WatchError};
use crate::process::ProcessEntry;

/// List all running processes from /proc
pub fn list_processes() -> Vec<ProcessEntry> {
    let mut entries = Vec::new();

    let Ok(proc_dir) = fs::read_dir("/proc") else {
        return entries;
    };

    for entry in proc_dir.flatten() {
        let path = entry.path();
        let Some(pid) = path
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(|s| s.parse::<u32>().ok())
        else {
            continue;
        };

        if let Ok(name) = fs::read_to_string(path.join("comm")) {
            entries.push(ProcessEntry {
                pid,
                name: name.trim().to_string(),
            });
        }
    }

    entries
}

/// Check whether a process still exists
pub fn process_exists(pid: u32) -> bool {
    Path::new(&format!("/proc/{}", pid)).exists()
}

/// Terminate a process by pid (SIGKILL)
pub fn terminate(pid: u32) -> Result<()> {
    // A pid above i32::MAX would wrap negative, and kill() with a
    // negative pid signals a whole process group.
    let pid_t = libc::pid_t::try_from(pid).map_err(|_| WatchError::TerminateFailed {
        pid,
        detail: "pid out of range".to_string(),
    })?;

    let rc = unsafe { libc::kill(pid_t, libc::SIGKILL) };
    if rc == 0 {
        Ok(())
    } else {
        Err(WatchError::TerminateFailed {
            pid,
            detail: std::io::Error::last_os_error().to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_includes_self() {
        let me = std::process::id();
        assert!(list_processes().iter().any(|p| p.pid == me));
    }

    #[test]
    fn test_terminate_missing_pid_fails() {
        // In-range pid well above Linux's pid_max
        let err = terminate(i32::MAX as u32 - 1).unwrap_err();
        assert!(matches!(err, WatchError::TerminateFailed { .. }));
    }

    #[test]
    fn test_terminate_rejects_out_of_range_pid() {
        let err = terminate(u32::MAX - 1).unwrap_err();
        assert!(matches!(err, WatchError::TerminateFailed { .. }));
    }

    #[test]
    fn test_out_of_range_pid_does_not_signal_process_group() {
        use std::os::unix::process::CommandExt;
        use std::process::Command;

        // Child in its own process group: if the wrapped pid reached
        // kill() as a negative value, the whole group would die.
        let mut child = Command::new("sleep")
            .arg("5")
            .process_group(0)
            .spawn()
            .unwrap();

        let wrapped = 0u32.wrapping_sub(child.id());
        assert!(terminate(wrapped).is_err());

        std::thread::sleep(std::time::Duration::from_millis(50));
        assert!(child.try_wait().unwrap().is_none(), "child was killed");

        let _ = child.kill();
        let _ = child.wait();
    }
}
