//! Monitor state types
//!
//! The watch set has exactly one writer (the monitoring worker);
//! everyone else reads cloned snapshots. Removals discovered during a
//! traversal are collected by the worker and applied between
//! iterations, never mid-traversal.

use serde::{Deserialize, Serialize};

/// One watched instance as seen in a snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchedInstance {
    pub pid: u32,
    /// Window title once discovered; empty until the first lookup
    #[serde(default)]
    pub label: String,
}

impl WatchedInstance {
    /// Label for logs/events, falling back to the pid
    pub fn display_label(&self) -> String {
        if self.label.is_empty() {
            format!("pid {}", self.pid)
        } else {
            self.label.clone()
        }
    }
}

/// Consistent, cloneable view of the monitor
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MonitorSnapshot {
    /// Whether the monitoring worker is running
    pub running: bool,
    /// Instances currently under surveillance
    pub watched: Vec<WatchedInstance>,
    /// Completed monitoring cycles since start
    pub cycles: u64,
}

impl MonitorSnapshot {
    pub fn is_watched(&self, pid: u32) -> bool {
        self.watched.iter().any(|w| w.pid == pid)
    }

    pub fn watched_pids(&self) -> Vec<u32> {
        self.watched.iter().map(|w| w.pid).collect()
    }

    /// Record the window title discovered for a watched pid
    pub fn set_label(&mut self, pid: u32, label: &str) {
        if let Some(entry) = self.watched.iter_mut().find(|w| w.pid == pid) {
            if entry.label != label {
                entry.label = label.to_string();
            }
        }
    }

    /// Drop a pid from the watch set, returning its entry
    pub fn remove(&mut self, pid: u32) -> Option<WatchedInstance> {
        let idx = self.watched.iter().position(|w| w.pid == pid)?;
        Some(self.watched.remove(idx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(pids: &[u32]) -> MonitorSnapshot {
        MonitorSnapshot {
            running: true,
            watched: pids
                .iter()
                .map(|&pid| WatchedInstance {
                    pid,
                    label: String::new(),
                })
                .collect(),
            cycles: 0,
        }
    }

    #[test]
    fn test_watch_and_remove() {
        let mut state = snapshot(&[10, 20]);
        assert!(state.is_watched(10));

        let removed = state.remove(10).unwrap();
        assert_eq!(removed.pid, 10);
        assert!(!state.is_watched(10));
        assert_eq!(state.watched_pids(), vec![20]);

        assert!(state.remove(10).is_none());
    }

    #[test]
    fn test_labels() {
        let mut state = snapshot(&[10]);
        assert_eq!(state.watched[0].display_label(), "pid 10");

        state.set_label(10, "LDPlayer-2");
        assert_eq!(state.watched[0].display_label(), "LDPlayer-2");

        // Unknown pid is a no-op
        state.set_label(99, "LDPlayer-9");
        assert_eq!(state.watched.len(), 1);
    }
}
