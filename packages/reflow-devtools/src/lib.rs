use reflow_scheduler::{FlushObserver, Scheduler};
use std::rc::{Rc, Weak};

#[cfg(debug_assertions)]
mod internal {
    use serde::{Deserialize, Serialize};
    use std::sync::Mutex;

    #[derive(Debug, Clone, Serialize, Deserialize, Default)]
    pub struct SchedulerMetrics {
        pub flushes_completed: u64,
        pub jobs_recorded: u64,
        pub last_flush_timestamp: f64,
    }

    #[derive(Debug, Clone, Serialize, Deserialize, Default)]
    pub struct DevToolsSnapshot {
        pub metrics: SchedulerMetrics,
    }

    /// Push target for live snapshots (an IDE panel, a websocket, ...).
    pub trait DevBridge: Send + Sync {
        fn send_snapshot(&self, snapshot: &DevToolsSnapshot);
    }

    pub struct DevToolsContext {
        snapshot: Mutex<DevToolsSnapshot>,
        bridge: Mutex<Option<Box<dyn DevBridge>>>,
    }

    impl DevToolsContext {
        pub fn new() -> Self {
            Self {
                snapshot: Mutex::new(DevToolsSnapshot::default()),
                bridge: Mutex::new(None),
            }
        }

        pub fn set_bridge(&self, bridge: Box<dyn DevBridge>) {
            let mut b = self.bridge.lock().unwrap();
            *b = Some(bridge);
        }

        pub fn record_flush(&self, timestamp: f64) {
            let mut snapshot = self.snapshot.lock().unwrap();
            snapshot.metrics.flushes_completed += 1;
            snapshot.metrics.last_flush_timestamp = timestamp;

            if let Some(bridge) = self.bridge.lock().unwrap().as_ref() {
                bridge.send_snapshot(&snapshot);
            }
        }

        /// Fed by the host, which knows how many jobs each cycle ran.
        pub fn record_jobs(&self, count: u64) {
            let mut snapshot = self.snapshot.lock().unwrap();
            snapshot.metrics.jobs_recorded += count;
        }

        pub fn export_state(&self) -> String {
            let snapshot = self.snapshot.lock().unwrap();
            serde_json::to_string(&*snapshot).unwrap_or_default()
        }
    }

    use std::sync::OnceLock;
    pub static DEVTOOLS: OnceLock<DevToolsContext> = OnceLock::new();
}

#[cfg(debug_assertions)]
pub use internal::*;

// Production no-op implementation
#[cfg(not(debug_assertions))]
pub mod production {
    pub struct DevToolsContext;
    impl DevToolsContext {
        pub fn record_flush(&self, _: f64) {}
        pub fn record_jobs(&self, _: u64) {}
        pub fn export_state(&self) -> String {
            String::new()
        }
    }
    pub static DEVTOOLS: DevToolsContext = DevToolsContext;
}

#[cfg(not(debug_assertions))]
pub use production::*;

pub fn devtools() -> &'static DevToolsContext {
    #[cfg(debug_assertions)]
    {
        DEVTOOLS.get_or_init(DevToolsContext::new)
    }
    #[cfg(not(debug_assertions))]
    {
        &DEVTOOLS
    }
}

/// Observer handed to a scheduler (with `devtools` enabled in its config)
/// so completed flushes land in the global context. Holds the scheduler
/// weakly; the scheduler owns the probe.
pub struct FlushProbe {
    scheduler: Weak<Scheduler>,
}

impl FlushProbe {
    pub fn new(scheduler: &Rc<Scheduler>) -> Self {
        Self {
            scheduler: Rc::downgrade(scheduler),
        }
    }
}

impl FlushObserver for FlushProbe {
    fn on_flush_complete(&self) {
        if let Some(scheduler) = self.scheduler.upgrade() {
            devtools().record_flush(scheduler.current_flush_timestamp());
        }
    }
}
