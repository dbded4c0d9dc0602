//! # Network Monitor
//!
//! Periodic connectivity probing, published as immutable status snapshots.
//!
//! ## Status Model
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Network Status Levels                              │
//! │                                                                         │
//! │   Disconnected ──► InternetOnly ──► FullyConnected                      │
//! │                                                                         │
//! │   check 1: raw internet reachability (TCP connect, 3s timeout)          │
//! │   check 2: tax portal reachability (HTTP) - only when check 1 passed    │
//! │                                                                         │
//! │   The monitor is an actor owning its state exclusively. Consumers       │
//! │   (invoice service, submission queue) read snapshots from a watch       │
//! │   channel; a transition is observable via `changed()` without any       │
//! │   polling of shared state.                                              │
//! │                                                                         │
//! │   Probes NEVER run on the signing path. Only the decision to *also*     │
//! │   submit remotely reads the snapshot, and that read is lock-free.       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use kassa_core::types::{NetworkSnapshot, NetworkStatus};

use crate::authority::AuthorityClient;
use crate::config::NetworkConfig;
use crate::error::{FiscalError, FiscalResult};

// =============================================================================
// Reachability Probe
// =============================================================================

/// The two probes the monitor runs. Split out as a trait so tests can
/// script connectivity without sockets.
pub trait ReachabilityProbe: Send + Sync + 'static {
    /// Low-level internet reachability, short timeout.
    fn internet_reachable(&self) -> impl Future<Output = bool> + Send;

    /// Tax portal reachability. Only called when the internet probe passed.
    fn authority_reachable(&self) -> impl Future<Output = bool> + Send;
}

/// Production probe: TCP connect for internet, the authority client's own
/// reachability check for the portal.
pub struct StandardProbe<A> {
    probe_addr: String,
    probe_timeout: Duration,
    authority: Arc<A>,
}

impl<A: AuthorityClient> StandardProbe<A> {
    /// Creates the probe from network configuration.
    pub fn new(config: &NetworkConfig, authority: Arc<A>) -> Self {
        StandardProbe {
            probe_addr: config.probe_addr.clone(),
            probe_timeout: Duration::from_secs(config.probe_timeout_secs),
            authority,
        }
    }
}

impl<A: AuthorityClient> ReachabilityProbe for StandardProbe<A> {
    async fn internet_reachable(&self) -> bool {
        match timeout(self.probe_timeout, TcpStream::connect(&self.probe_addr)).await {
            Ok(Ok(_)) => true,
            Ok(Err(e)) => {
                debug!(addr = %self.probe_addr, error = %e, "Internet probe failed");
                false
            }
            Err(_) => {
                debug!(addr = %self.probe_addr, "Internet probe timed out");
                false
            }
        }
    }

    async fn authority_reachable(&self) -> bool {
        self.authority.check_reachable().await
    }
}

// =============================================================================
// Monitor Commands & Handle
// =============================================================================

enum MonitorCommand {
    /// Force an immediate recomputation and reply with the fresh snapshot.
    CheckNow(oneshot::Sender<NetworkSnapshot>),
    /// Graceful shutdown.
    Shutdown,
}

/// Handle for reading status and controlling the monitor.
#[derive(Clone)]
pub struct NetworkMonitorHandle {
    status_rx: watch::Receiver<NetworkSnapshot>,
    cmd_tx: mpsc::Sender<MonitorCommand>,
}

impl NetworkMonitorHandle {
    /// The latest published snapshot. Lock-free read.
    pub fn status(&self) -> NetworkSnapshot {
        *self.status_rx.borrow()
    }

    /// Subscribes to snapshot updates; `changed()` wakes on transitions.
    pub fn subscribe(&self) -> watch::Receiver<NetworkSnapshot> {
        self.status_rx.clone()
    }

    /// Forces a probe outside the regular interval and returns the result.
    pub async fn check_now(&self) -> FiscalResult<NetworkSnapshot> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.cmd_tx
            .send(MonitorCommand::CheckNow(reply_tx))
            .await
            .map_err(|_| FiscalError::ChannelError("network monitor stopped".into()))?;
        reply_rx
            .await
            .map_err(|_| FiscalError::ChannelError("network monitor dropped reply".into()))
    }

    /// Triggers graceful shutdown.
    pub async fn shutdown(&self) -> FiscalResult<()> {
        self.cmd_tx
            .send(MonitorCommand::Shutdown)
            .await
            .map_err(|_| FiscalError::ChannelError("network monitor stopped".into()))
    }
}

// =============================================================================
// Network Monitor
// =============================================================================

/// Actor recomputing the connectivity status on a fixed interval.
pub struct NetworkMonitor<P> {
    probe: P,
    interval: Duration,
    status_tx: watch::Sender<NetworkSnapshot>,
    cmd_rx: mpsc::Receiver<MonitorCommand>,
}

impl<P: ReachabilityProbe> NetworkMonitor<P> {
    /// Creates a monitor and its handle. Call [`NetworkMonitor::run`] on a
    /// spawned task to start probing.
    pub fn new(probe: P, config: &NetworkConfig) -> (Self, NetworkMonitorHandle) {
        let initial = NetworkSnapshot {
            status: NetworkStatus::Disconnected,
            last_checked: Utc::now(),
        };
        let (status_tx, status_rx) = watch::channel(initial);
        let (cmd_tx, cmd_rx) = mpsc::channel(8);

        let monitor = NetworkMonitor {
            probe,
            interval: Duration::from_secs(config.probe_interval_secs),
            status_tx,
            cmd_rx,
        };
        let handle = NetworkMonitorHandle { status_rx, cmd_tx };

        (monitor, handle)
    }

    /// Runs the probe loop. Spawn this as a background task.
    pub async fn run(mut self) {
        info!(interval_secs = self.interval.as_secs(), "Network monitor starting");

        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.recompute().await;
                }

                Some(cmd) = self.cmd_rx.recv() => {
                    match cmd {
                        MonitorCommand::CheckNow(reply) => {
                            let snapshot = self.recompute().await;
                            // Caller may have given up waiting; that's fine.
                            let _ = reply.send(snapshot);
                        }
                        MonitorCommand::Shutdown => {
                            info!("Network monitor shutting down");
                            break;
                        }
                    }
                }
            }
        }

        info!("Network monitor stopped");
    }

    /// Probes, publishes the snapshot, and logs transitions.
    async fn recompute(&self) -> NetworkSnapshot {
        let status = if !self.probe.internet_reachable().await {
            NetworkStatus::Disconnected
        } else if self.probe.authority_reachable().await {
            NetworkStatus::FullyConnected
        } else {
            NetworkStatus::InternetOnly
        };

        let snapshot = NetworkSnapshot {
            status,
            last_checked: Utc::now(),
        };

        let previous = self.status_tx.borrow().status;
        if previous != status {
            if status == NetworkStatus::Disconnected {
                warn!(from = %previous, to = %status, "Network status transition");
            } else {
                info!(from = %previous, to = %status, "Network status transition");
            }
        } else {
            debug!(status = %status, "Network status unchanged");
        }

        self.status_tx.send_replace(snapshot);
        snapshot
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[derive(Default)]
    struct MockProbe {
        internet: Arc<AtomicBool>,
        authority: Arc<AtomicBool>,
    }

    impl ReachabilityProbe for MockProbe {
        async fn internet_reachable(&self) -> bool {
            self.internet.load(Ordering::SeqCst)
        }

        async fn authority_reachable(&self) -> bool {
            self.authority.load(Ordering::SeqCst)
        }
    }

    fn spawn_monitor(probe: MockProbe) -> NetworkMonitorHandle {
        let (monitor, handle) = NetworkMonitor::new(probe, &NetworkConfig::default());
        tokio::spawn(monitor.run());
        handle
    }

    #[tokio::test]
    async fn test_status_levels() {
        let internet = Arc::new(AtomicBool::new(false));
        let authority = Arc::new(AtomicBool::new(false));
        let handle = spawn_monitor(MockProbe {
            internet: Arc::clone(&internet),
            authority: Arc::clone(&authority),
        });

        assert_eq!(
            handle.check_now().await.unwrap().status,
            NetworkStatus::Disconnected
        );

        internet.store(true, Ordering::SeqCst);
        assert_eq!(
            handle.check_now().await.unwrap().status,
            NetworkStatus::InternetOnly
        );

        authority.store(true, Ordering::SeqCst);
        assert_eq!(
            handle.check_now().await.unwrap().status,
            NetworkStatus::FullyConnected
        );
    }

    #[tokio::test]
    async fn test_transition_is_observable_via_subscription() {
        let internet = Arc::new(AtomicBool::new(true));
        let authority = Arc::new(AtomicBool::new(true));
        let handle = spawn_monitor(MockProbe {
            internet: Arc::clone(&internet),
            authority: Arc::clone(&authority),
        });

        let mut subscription = handle.subscribe();
        handle.check_now().await.unwrap();
        subscription.changed().await.unwrap();
        assert_eq!(
            subscription.borrow_and_update().status,
            NetworkStatus::FullyConnected
        );

        internet.store(false, Ordering::SeqCst);
        handle.check_now().await.unwrap();
        subscription.changed().await.unwrap();
        assert_eq!(
            subscription.borrow_and_update().status,
            NetworkStatus::Disconnected
        );
    }

    #[tokio::test]
    async fn test_last_checked_moves_forward() {
        let handle = spawn_monitor(MockProbe::default());

        let first = handle.check_now().await.unwrap();
        let second = handle.check_now().await.unwrap();
        assert!(second.last_checked >= first.last_checked);
    }

    #[tokio::test]
    async fn test_shutdown_stops_the_actor() {
        let handle = spawn_monitor(MockProbe::default());
        handle.shutdown().await.unwrap();

        // Give the task a moment to drain the command.
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(handle.check_now().await.is_err());
    }
}
