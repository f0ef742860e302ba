//! emuwatch
//!
//! Visual watchdog for a farm of emulator instances on one machine.
//! Watches `LDPlayer-<n>`-style windows, captures their content even
//! while occluded, template-matches known on-screen states against
//! reference images, and reacts by terminating the owning process or
//! injecting a tap over the per-instance adb channel.
//!
//! # Example
//!
//! ```ignore
//! use emuwatch::{InstanceMonitor, MonitorEvent, WatchConfig};
//!
//! let config = WatchConfig::load("emuwatch.toml")?;
//! let mut monitor = InstanceMonitor::with_system_sources(&config);
//! monitor.subscribe(Box::new(|event| {
//!     if let MonitorEvent::InstanceRemoved { label, .. } = event {
//!         println!("{} removed", label);
//!     }
//! }));
//! monitor.start(selected_pids)?;
//! ```

pub mod capture;
pub mod config;
pub mod device;
pub mod dispatch;
pub mod error;
pub mod matching;
pub mod monitor;
pub mod platform;
pub mod process;
pub mod template;
pub mod window;

// Re-export commonly used types
pub use capture::{CaptureSource, Frame};
pub use config::WatchConfig;
pub use device::{AdbChannel, DeviceChannel};
pub use dispatch::{to_device_coordinates, ActionDispatcher};
pub use error::{CaptureError, ExternalToolError, Result, TemplateLoadError, WatchError};
pub use matching::{MatchEngine, MatchReport, TemplateHit};
pub use monitor::{InstanceMonitor, MonitorDeps, MonitorEvent, MonitorSnapshot, RemovalReason};
pub use process::{ProcessEntry, ProcessSource, SystemProcesses};
pub use template::{Template, TemplateRole, TemplateStore};
pub use window::{Instance, WindowDirectory, WindowHandle, WindowInfo, WindowSource};
