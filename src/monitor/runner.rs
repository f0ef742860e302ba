//! Monitoring loop
//!
//! One dedicated worker thread cycles over the watch set on a fixed
//! interval: liveness check, fresh window lookup, capture, template
//! pass, dispatch. One instance's trouble never halts surveillance of
//! the others.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use super::events::{EventHandler, MonitorCallback, MonitorEvent, RemovalReason};
use super::state::{MonitorSnapshot, WatchedInstance};
use crate::capture::CaptureSource;
use crate::config::WatchConfig;
use crate::device::DeviceChannel;
use crate::dispatch::ActionDispatcher;
use crate::error::{Result, WatchError};
use crate::matching::{MatchEngine, MatchReport};
use crate::process::ProcessSource;
use crate::template::{TemplateRole, TemplateStore};
use crate::window::{WindowDirectory, WindowSource};

/// External collaborators the monitor drives
pub struct MonitorDeps {
    pub windows: Box<dyn WindowSource>,
    pub capture: Box<dyn CaptureSource>,
    pub processes: Arc<dyn ProcessSource>,
    pub device: Box<dyn DeviceChannel>,
}

/// Everything one cycle needs, owned together so restarts reuse it
struct Pipeline {
    directory: WindowDirectory,
    capture: Box<dyn CaptureSource>,
    processes: Arc<dyn ProcessSource>,
    dispatcher: ActionDispatcher,
    engine: MatchEngine,
    store: TemplateStore,
    confidence: f32,
}

/// Watches a set of emulator instances and reacts to template matches
pub struct InstanceMonitor {
    state: Arc<Mutex<MonitorSnapshot>>,
    running: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
    events: Arc<Mutex<EventHandler>>,
    pipeline: Arc<Mutex<Pipeline>>,
    interval: Duration,
}

impl InstanceMonitor {
    pub fn new(config: &WatchConfig, deps: MonitorDeps) -> Self {
        let dispatcher = ActionDispatcher::new(
            deps.processes.clone(),
            deps.device,
            config.adb_base_port,
            config.adb_port_stride,
            (config.device_width, config.device_height),
        );
        let pipeline = Pipeline {
            directory: WindowDirectory::new(deps.windows, config.window_prefix.clone()),
            capture: deps.capture,
            processes: deps.processes,
            dispatcher,
            engine: MatchEngine::new(config.base_width, config.base_height),
            store: TemplateStore::new(config.template_dir.clone()),
            confidence: config.confidence,
        };

        Self {
            state: Arc::new(Mutex::new(MonitorSnapshot::default())),
            running: Arc::new(AtomicBool::new(false)),
            worker: None,
            events: Arc::new(Mutex::new(EventHandler::new())),
            pipeline: Arc::new(Mutex::new(pipeline)),
            interval: Duration::from_millis(config.interval_ms),
        }
    }

    /// Monitor backed by the real OS window, capture, process and adb
    /// sources.
    #[cfg(target_os = "windows")]
    pub fn with_system_sources(config: &WatchConfig) -> Self {
        use crate::device::AdbChannel;
        use crate::platform::{GdiCapture, SystemWindows};
        use crate::process::SystemProcesses;

        let deps = MonitorDeps {
            windows: Box::new(SystemWindows),
            capture: Box::new(GdiCapture),
            processes: Arc::new(SystemProcesses),
            device: Box::new(AdbChannel::new(
                config.adb_path.clone(),
                Duration::from_millis(config.command_timeout_ms),
            )),
        };
        Self::new(config, deps)
    }

    /// Consistent snapshot of the watch set and run state
    pub fn state(&self) -> MonitorSnapshot {
        self.state.lock().clone()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Register a callback for monitor events
    pub fn subscribe(&self, callback: MonitorCallback) {
        self.events.lock().subscribe(callback);
    }

    /// Inject a diagnostics observer into the match engine
    pub fn set_match_observer<F>(&self, observer: F)
    where
        F: Fn(&MatchReport<'_>) + Send + Sync + 'static,
    {
        self.pipeline.lock().engine.set_observer(observer);
    }

    /// Start watching the given pids.
    ///
    /// Returns `Ok(false)` without starting when the watch set is
    /// empty; that is a reported no-op, not a fatal error. Starting
    /// while already running is an error.
    pub fn start(&mut self, pids: Vec<u32>) -> Result<bool> {
        if self.running.load(Ordering::SeqCst) {
            return Err(WatchError::AlreadyRunning);
        }

        let mut watched: Vec<WatchedInstance> = Vec::new();
        for pid in pids {
            if !watched.iter().any(|w| w.pid == pid) {
                watched.push(WatchedInstance {
                    pid,
                    label: String::new(),
                });
            }
        }

        if watched.is_empty() {
            log::warn!("monitor start requested with an empty watch set");
            return Ok(false);
        }

        {
            let mut state = self.state.lock();
            state.running = true;
            state.cycles = 0;
            state.watched = watched;
        }
        self.running.store(true, Ordering::SeqCst);

        let running = self.running.clone();
        let state = self.state.clone();
        let events = self.events.clone();
        let pipeline = self.pipeline.clone();
        let interval = self.interval;

        let handle = thread::Builder::new()
            .name("instance-monitor".to_string())
            .spawn(move || {
                run_monitor_loop(running, state, events, pipeline, interval);
            })
            .map_err(|e| WatchError::WorkerSpawn(e.to_string()))?;

        self.worker = Some(handle);
        log::info!("instance monitor started");
        Ok(true)
    }

    /// Stop monitoring.
    ///
    /// Always allowed, also while a cycle is in flight: the worker
    /// observes the flag at the next checkpoint and exits.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);

        if let Some(handle) = self.worker.take() {
            let _ = handle.join();
        }

        self.state.lock().running = false;
        log::info!("instance monitor stopped");
    }
}

impl Drop for InstanceMonitor {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run_monitor_loop(
    running: Arc<AtomicBool>,
    state: Arc<Mutex<MonitorSnapshot>>,
    events: Arc<Mutex<EventHandler>>,
    pipeline: Arc<Mutex<Pipeline>>,
    interval: Duration,
) {
    while running.load(Ordering::SeqCst) {
        let cycle_start = Instant::now();

        // An unexpected cycle error is logged and the loop continues
        // after the standard interval.
        if let Err(e) = run_cycle(&running, &state, &events, &pipeline) {
            log::error!("monitoring cycle failed: {}", e);
        }

        {
            let mut s = state.lock();
            s.cycles += 1;
            if s.watched.is_empty() {
                s.running = false;
                drop(s);
                running.store(false, Ordering::SeqCst);
                log::info!("watch set empty, monitoring stopped");
                events.lock().emit(MonitorEvent::Stopped);
                break;
            }
        }

        let elapsed = cycle_start.elapsed();
        if elapsed < interval {
            sleep_responsive(&running, interval - elapsed);
        }
    }
}

/// Sleep in short slices so a stop request is not held up by a long
/// cycle interval.
fn sleep_responsive(running: &AtomicBool, total: Duration) {
    let deadline = Instant::now() + total;
    while running.load(Ordering::SeqCst) {
        let now = Instant::now();
        if now >= deadline {
            break;
        }
        thread::sleep((deadline - now).min(Duration::from_millis(50)));
    }
}

fn run_cycle(
    running: &AtomicBool,
    state: &Mutex<MonitorSnapshot>,
    events: &Mutex<EventHandler>,
    pipeline: &Mutex<Pipeline>,
) -> Result<()> {
    let pipeline = pipeline.lock();

    // Liveness pass: staleness is resolved here, before any capture
    // attempt, and removals are applied before the template phase.
    let watched = state.lock().watched.clone();
    for entry in &watched {
        if pipeline.processes.process_exists(entry.pid) {
            continue;
        }
        state.lock().remove(entry.pid);
        log::info!("{} disappeared, removed from watch set", entry.display_label());
        events.lock().emit(MonitorEvent::InstanceRemoved {
            label: entry.display_label(),
            pid: entry.pid,
            reason: RemovalReason::ProcessGone,
        });
    }

    let watched = state.lock().watched.clone();
    if watched.is_empty() {
        return Ok(());
    }

    // Window handles are looked up fresh each cycle, never cached.
    let instances = pipeline.directory.list_instances()?;

    // Templates load once per cycle and are shared across instances.
    let templates = pipeline.store.load_all();
    if templates.is_empty() {
        log::debug!("no templates loaded, nothing to match");
        return Ok(());
    }

    let mut pending_removals: Vec<(WatchedInstance, RemovalReason)> = Vec::new();

    for entry in &watched {
        if !running.load(Ordering::SeqCst) {
            break;
        }

        let Some(instance) = instances.iter().find(|i| i.pid == entry.pid) else {
            log::debug!("no instance window for pid {} this cycle", entry.pid);
            continue;
        };
        state.lock().set_label(entry.pid, &instance.label);

        // One frame per instance per cycle, reused for every template.
        let frame = match pipeline.capture.capture(instance.handle) {
            Ok(frame) => frame,
            Err(e) => {
                log::warn!("capture failed for {}: {}", instance.label, e);
                continue;
            }
        };

        for template in &templates {
            if !running.load(Ordering::SeqCst) {
                break;
            }

            let Some(hit) = pipeline.engine.find(&frame, template, pipeline.confidence) else {
                continue;
            };

            log::info!(
                "{} matched '{}' (confidence {:.3})",
                instance.label,
                template.name,
                hit.confidence
            );
            events.lock().emit(MonitorEvent::Matched {
                label: instance.label.clone(),
                template: template.name.clone(),
                confidence: hit.confidence,
                timestamp: Instant::now(),
            });

            match template.role {
                TemplateRole::Terminal => {
                    pipeline.dispatcher.terminate(instance);
                    pending_removals.push((
                        WatchedInstance {
                            pid: instance.pid,
                            label: instance.label.clone(),
                        },
                        RemovalReason::TerminalMatch,
                    ));
                    // The instance is being removed; its remaining
                    // templates are moot this cycle.
                    break;
                }
                TemplateRole::Action => {
                    match pipeline
                        .dispatcher
                        .tap(instance, hit.point, (frame.width, frame.height))
                    {
                        Ok((x, y)) => events.lock().emit(MonitorEvent::Tapped {
                            label: instance.label.clone(),
                            x,
                            y,
                        }),
                        Err(e) => log::warn!("tap skipped for {}: {}", instance.label, e),
                    }
                }
            }
        }
    }

    // Apply removals between iterations, never during traversal.
    for (entry, reason) in pending_removals {
        state.lock().remove(entry.pid);
        events.lock().emit(MonitorEvent::InstanceRemoved {
            label: entry.display_label(),
            pid: entry.pid,
            reason,
        });
    }

    Ok(())
}
