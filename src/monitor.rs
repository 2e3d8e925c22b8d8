//! Periodic connection health checks.
//!
//! One thread, one timer. While disconnected the server is probed on the
//! slow interval, looking for it to come back; while connected, on the
//! fast interval so a drop is noticed sooner. Ticks run back to back on
//! the monitor thread and never overlap.

use std::{
    sync::{
        Arc,
        mpsc::{self, RecvTimeoutError, Sender},
    },
    thread::{self, JoinHandle},
    time::Duration,
};

use tracing::{debug, info, warn};

use crate::{config::MonitorConfig, remote::RemoteClient};

/// Probe intervals for each connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Schedule {
    pub connected: Duration,
    pub disconnected: Duration,
}

impl Default for Schedule {
    fn default() -> Self {
        MonitorConfig::default().into()
    }
}

impl From<MonitorConfig> for Schedule {
    fn from(config: MonitorConfig) -> Self {
        Self {
            connected: Duration::from_secs(config.connected_interval_secs),
            disconnected: Duration::from_secs(config.disconnected_interval_secs),
        }
    }
}

impl Schedule {
    /// The same interval regardless of state.
    pub fn fixed(interval: Duration) -> Self {
        Self {
            connected: interval,
            disconnected: interval,
        }
    }

    pub fn interval(self, connected: bool) -> Duration {
        if connected {
            self.connected
        } else {
            self.disconnected
        }
    }
}

/// Handle to a running monitor thread. Dropping it stops the thread.
pub struct HealthMonitor {
    stop: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl HealthMonitor {
    /// Start probing `remote` on `schedule`.
    ///
    /// `on_tick` runs on the monitor thread after every probe with the
    /// probe's result; callers refresh their views on `true`.
    pub fn start(
        remote: Arc<RemoteClient>,
        schedule: Schedule,
        mut on_tick: impl FnMut(bool) + Send + 'static,
    ) -> Self {
        let (stop_tx, stop_rx) = mpsc::channel::<()>();

        let handle = thread::spawn(move || {
            let mut wait = schedule.interval(remote.is_connected());
            info!(?schedule, "health monitor started");
            loop {
                match stop_rx.recv_timeout(wait) {
                    Err(RecvTimeoutError::Timeout) => {}
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
                let connected = remote.health_probe();
                debug!(connected, "health tick");
                on_tick(connected);
                wait = schedule.interval(connected);
            }
            info!("health monitor stopped");
        });

        Self {
            stop: Some(stop_tx),
            handle: Some(handle),
        }
    }

    /// Stop the thread and wait for an in-flight tick to finish.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Some(handle) = self.handle.take()
            && handle.join().is_err()
        {
            warn!("health monitor thread panicked");
        }
    }
}

impl Drop for HealthMonitor {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl RemoteClient {
    /// Probe on a fixed interval with no tick callback.
    pub fn start_periodic_health_check(self: &Arc<Self>, interval: Duration) -> HealthMonitor {
        HealthMonitor::start(Arc::clone(self), Schedule::fixed(interval), |_| {})
    }
}
