//! Process listing, liveness and termination

use crate::error::Result;

/// A running process as reported by the OS
#[derive(Debug, Clone)]
pub struct ProcessEntry {
    pub pid: u32,
    pub name: String,
}

/// Source of process information and control.
///
/// Termination is always pid-based. Killing by executable name would
/// take down every emulator instance sharing the binary, not just the
/// one that matched.
pub trait ProcessSource: Send + Sync {
    /// List all running processes
    fn list_processes(&self) -> Vec<ProcessEntry>;

    /// Check whether a process still exists
    fn process_exists(&self, pid: u32) -> bool;

    /// Request termination of a single process by pid
    fn terminate(&self, pid: u32) -> Result<()>;
}

/// OS-backed process source
pub struct SystemProcesses;

#[cfg(target_os = "linux")]
impl ProcessSource for SystemProcesses {
    fn list_processes(&self) -> Vec<ProcessEntry> {
        crate::platform::linux::list_processes()
    }

    fn process_exists(&self, pid: u32) -> bool {
        crate::platform::linux::process_exists(pid)
    }

    fn terminate(&self, pid: u32) -> Result<()> {
        crate::platform::linux::terminate(pid)
    }
}

#[cfg(target_os = "windows")]
impl ProcessSource for SystemProcesses {
    fn list_processes(&self) -> Vec<ProcessEntry> {
        crate::platform::windows::list_processes()
    }

    fn process_exists(&self, pid: u32) -> bool {
        crate::platform::windows::process_exists(pid)
    }

    fn terminate(&self, pid: u32) -> Result<()> {
        crate::platform::windows::terminate(pid)
    }
}
