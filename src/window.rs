//! Instance window discovery
//!
//! Emulator instances are identified by window titles of the form
//! `<prefix><n>` ("LDPlayer-0", "LDPlayer-1", ...). The numeric suffix
//! is the instance index and doubles as the adb addressing key, so two
//! windows sharing a suffix is a configuration fault, not a tie to
//! break silently.

use crate::error::{Result, WatchError};

/// Opaque OS window reference.
///
/// Weak by convention: looked up fresh each cycle, never cached across
/// process exit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WindowHandle(pub isize);

/// A visible top-level window as reported by the OS
#[derive(Debug, Clone)]
pub struct WindowInfo {
    pub handle: WindowHandle,
    pub title: String,
    pub owner_pid: u32,
}

/// Source of visible top-level windows
pub trait WindowSource: Send {
    fn enumerate_visible_windows(&self) -> Vec<WindowInfo>;
}

/// One emulator window/process pair under surveillance
#[derive(Debug, Clone)]
pub struct Instance {
    pub pid: u32,
    /// Numeric suffix from the window title
    pub index: u32,
    /// Full window title, unique and stable per emulator slot
    pub label: String,
    pub handle: WindowHandle,
}

/// Enumerates emulator instance windows by title pattern
pub struct WindowDirectory {
    source: Box<dyn WindowSource>,
    prefix: String,
}

impl WindowDirectory {
    pub fn new(source: Box<dyn WindowSource>, prefix: impl Into<String>) -> Self {
        Self {
            source,
            prefix: prefix.into(),
        }
    }

    /// List instances matching `<prefix><n>`, ordered by `n` ascending.
    ///
    /// No matching windows is an empty list, never an error. A repeated
    /// numeric suffix is an error: picking one of the two would tap or
    /// kill the wrong instance.
    pub fn list_instances(&self) -> Result<Vec<Instance>> {
        let mut instances: Vec<Instance> = Vec::new();

        for window in self.source.enumerate_visible_windows() {
            let Some(suffix) = window.title.strip_prefix(&self.prefix) else {
                continue;
            };
            let Ok(index) = suffix.parse::<u32>() else {
                continue;
            };
            instances.push(Instance {
                pid: window.owner_pid,
                index,
                label: window.title.clone(),
                handle: window.handle,
            });
        }

        instances.sort_by_key(|i| i.index);

        for pair in instances.windows(2) {
            if pair[0].index == pair[1].index {
                return Err(WatchError::DuplicateInstanceIndex {
                    index: pair[0].index,
                    first: pair[0].label.clone(),
                    second: pair[1].label.clone(),
                });
            }
        }

        Ok(instances)
    }
}
