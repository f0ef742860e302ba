//! Events emitted by the monitor
//!
//! Observers (the presentation layer) get coarse notifications only:
//! instance removals and the stop transition. Granular per-template
//! failures stay in the log stream so unattended operation is never
//! interrupted.

use std::time::Instant;

/// Why an instance left the watch set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemovalReason {
    /// Liveness check came back negative
    ProcessGone,
    /// A terminal template matched and the instance was killed
    TerminalMatch,
}

/// Event emitted by the monitoring loop
#[derive(Debug, Clone)]
pub enum MonitorEvent {
    /// A template crossed the confidence threshold on an instance
    Matched {
        label: String,
        template: String,
        confidence: f32,
        timestamp: Instant,
    },
    /// A tap was delivered at device coordinates
    Tapped { label: String, x: i32, y: i32 },
    /// An instance was dropped from the watch set
    InstanceRemoved {
        label: String,
        pid: u32,
        reason: RemovalReason,
    },
    /// The monitor transitioned to Stopped (watch set empty)
    Stopped,
}

/// Callback type for monitor events
pub type MonitorCallback = Box<dyn Fn(MonitorEvent) + Send + Sync>;

/// Event handler that can have multiple listeners
pub struct EventHandler {
    callbacks: Vec<MonitorCallback>,
}

impl EventHandler {
    pub fn new() -> Self {
        Self {
            callbacks: Vec::new(),
        }
    }

    /// Add a callback for monitor events
    pub fn subscribe(&mut self, callback: MonitorCallback) {
        self.callbacks.push(callback);
    }

    /// Emit an event to all listeners
    pub fn emit(&self, event: MonitorEvent) {
        for callback in &self.callbacks {
            callback(event.clone());
        }
    }

    pub fn has_listeners(&self) -> bool {
        !self.callbacks.is_empty()
    }
}

impl Default for EventHandler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_emit_reaches_all_listeners() {
        let mut handler = EventHandler::new();
        assert!(!handler.has_listeners());

        let count = Arc::new(AtomicUsize::new(0));
        for _ in 0..2 {
            let c = count.clone();
            handler.subscribe(Box::new(move |_| {
                c.fetch_add(1, Ordering::SeqCst);
            }));
        }
        assert!(handler.has_listeners());

        handler.emit(MonitorEvent::Stopped);
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }
}
