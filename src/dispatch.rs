//! Coordinate mapping and action dispatch
//!
//! A confirmed match becomes either a kill of the owning process or a
//! tap at device-native coordinates. Side effects here are exactly-once
//! per invocation; nothing retries within a cycle.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::device::{address_for, DeviceChannel};
use crate::error::ExternalToolError;
use crate::process::ProcessSource;
use crate::window::Instance;

/// Convert a capture-space point into device input space.
///
/// The capture path introduces a constant centered border (window
/// chrome / letterboxing) around the true rendered content, so the
/// point shifts by half the size difference on each axis, truncated
/// toward zero. Equal sizes make this a no-op.
pub fn to_device_coordinates(
    point: (u32, u32),
    capture: (u32, u32),
    device: (u32, u32),
) -> (i32, i32) {
    let dx = (capture.0 as i32 - device.0 as i32) / 2;
    let dy = (capture.1 as i32 - device.1 as i32) / 2;
    (point.0 as i32 - dx, point.1 as i32 - dy)
}

/// Dispatches kill and tap actions for confirmed matches
pub struct ActionDispatcher {
    processes: Arc<dyn ProcessSource>,
    device: Mutex<Box<dyn DeviceChannel>>,
    base_port: u16,
    port_stride: u16,
    device_resolution: (u32, u32),
}

impl ActionDispatcher {
    pub fn new(
        processes: Arc<dyn ProcessSource>,
        device: Box<dyn DeviceChannel>,
        base_port: u16,
        port_stride: u16,
        device_resolution: (u32, u32),
    ) -> Self {
        Self {
            processes,
            device: Mutex::new(device),
            base_port,
            port_stride,
            device_resolution,
        }
    }

    /// Request termination of the instance's owning process.
    ///
    /// Permission and already-exited failures are logged, never
    /// propagated: a failed kill must not halt the monitoring loop.
    pub fn terminate(&self, instance: &Instance) {
        match self.processes.terminate(instance.pid) {
            Ok(()) => log::info!("terminated {} (pid {})", instance.label, instance.pid),
            Err(e) => log::warn!(
                "failed to terminate {} (pid {}): {}",
                instance.label,
                instance.pid,
                e
            ),
        }
    }

    /// Tap the instance's device at a capture-space point.
    ///
    /// Connects to the derived per-instance address only when it is
    /// not already in the active-connections list, re-verifies it
    /// shows up there, and only then submits the tap. An address still
    /// missing after the connect attempt skips the tap for this cycle.
    pub fn tap(
        &self,
        instance: &Instance,
        point: (u32, u32),
        capture_size: (u32, u32),
    ) -> Result<(i32, i32), ExternalToolError> {
        let address = address_for(instance.index, self.base_port, self.port_stride);
        let (x, y) = to_device_coordinates(point, capture_size, self.device_resolution);

        let mut device = self.device.lock();
        let mut active = device.list_active_addresses()?;
        if !active.iter().any(|a| a == &address) {
            device.connect(&address)?;
            active = device.list_active_addresses()?;
            if !active.iter().any(|a| a == &address) {
                return Err(ExternalToolError::DeviceNotListed { address });
            }
        }

        device.tap(&address, x, y)?;
        log::info!("tapped {} at ({}, {}) via {}", instance.label, x, y, address);
        Ok((x, y))
    }
}
