//! OS-specific window, capture and process primitives

#[cfg(target_os = "linux")]
pub mod linux;

#[cfg(target_os = "windows")]
pub mod windows;

#[cfg(target_os = "windows")]
pub use windows::{GdiCapture, SystemWindows};
