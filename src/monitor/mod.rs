//! Instance surveillance
//!
//! - `MonitorSnapshot` - consistent read-only view of the watch set
//! - `InstanceMonitor` - worker loop driving capture, matching, dispatch
//! - `MonitorEvent` - coarse notifications for observers

mod events;
mod runner;
mod state;

pub use events::{EventHandler, MonitorCallback, MonitorEvent, RemovalReason};
pub use runner::{InstanceMonitor, MonitorDeps};
pub use state::{MonitorSnapshot, WatchedInstance};
