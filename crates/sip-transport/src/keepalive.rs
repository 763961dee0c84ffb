//! Connection keep-alive.
//!
//! [`KeepAliveManager`] periodically exercises the send path of a transport
//! with a double-CRLF ping frame. The peer discards the frame without
//! parsing; the point is that a dead connection fails the send, which is
//! reported to a [`ConnectionMonitor`] so the owning engine can tear the
//! session down instead of waiting for an inactivity timeout.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::transport::SipTransport;

/// Callback for keep-alive failures.
#[async_trait]
pub trait ConnectionMonitor: Send + Sync {
    /// Called once when a keep-alive probe fails; the connection should be
    /// treated as lost.
    async fn connection_lost(&self, reason: &str);
}

struct ProbeTask {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Periodically probes a transport and reports failures.
///
/// `start` and `stop` are idempotent. Probing stops on its own after the
/// first failure; the monitor is notified exactly once.
pub struct KeepAliveManager {
    transport: Arc<dyn SipTransport>,
    monitor: Arc<dyn ConnectionMonitor>,
    interval: Duration,
    task: Mutex<Option<ProbeTask>>,
}

impl KeepAliveManager {
    /// Create a manager probing `transport` every `interval`.
    pub fn new(
        transport: Arc<dyn SipTransport>,
        monitor: Arc<dyn ConnectionMonitor>,
        interval: Duration,
    ) -> Self {
        Self {
            transport,
            monitor,
            interval,
            task: Mutex::new(None),
        }
    }

    /// Start probing. A no-op if a probe task is already running.
    pub fn start(&self) {
        let mut guard = self.task.lock();
        if let Some(task) = guard.as_ref() {
            if !task.handle.is_finished() {
                debug!("keep-alive already running");
                return;
            }
        }

        let cancel = CancellationToken::new();
        let handle = spawn_probe_loop(
            self.transport.clone(),
            self.monitor.clone(),
            self.interval,
            cancel.clone(),
        );
        *guard = Some(ProbeTask { cancel, handle });
    }

    /// Stop probing and wait for the probe task to finish. A no-op if not
    /// running.
    pub async fn stop(&self) {
        let task = self.task.lock().take();
        if let Some(task) = task {
            task.cancel.cancel();
            let _ = task.handle.await;
            debug!("keep-alive stopped");
        }
    }

    /// Whether a probe task is currently running.
    pub fn is_running(&self) -> bool {
        self.task
            .lock()
            .as_ref()
            .is_some_and(|task| !task.handle.is_finished())
    }
}

fn spawn_probe_loop(
    transport: Arc<dyn SipTransport>,
    monitor: Arc<dyn ConnectionMonitor>,
    interval: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // The first tick completes immediately; consume it so the first probe
        // goes out one full interval after start.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("keep-alive cancelled");
                    break;
                }
                _ = ticker.tick() => {
                    if let Err(e) = transport.send_probe().await {
                        warn!(error = %e, "keep-alive probe failed");
                        monitor.connection_lost(&e.to_string()).await;
                        break;
                    }
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Result, TransportError};
    use rims_sip_core::SipMessage;
    use std::net::SocketAddr;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, Default)]
    struct CountingTransport {
        probes: AtomicUsize,
        fail: bool,
    }

    impl CountingTransport {
        fn failing() -> Self {
            Self {
                probes: AtomicUsize::new(0),
                fail: true,
            }
        }
    }

    #[async_trait]
    impl SipTransport for CountingTransport {
        fn local_addr(&self) -> Result<SocketAddr> {
            Ok("127.0.0.1:5060".parse().unwrap())
        }

        async fn send_message(&self, _message: SipMessage, _destination: SocketAddr) -> Result<()> {
            Ok(())
        }

        async fn send_probe(&self) -> Result<()> {
            self.probes.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(TransportError::send_failed("wire is dead"))
            } else {
                Ok(())
            }
        }

        async fn close(&self) -> Result<()> {
            Ok(())
        }

        fn is_closed(&self) -> bool {
            false
        }
    }

    #[derive(Default)]
    struct RecordingMonitor {
        reasons: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ConnectionMonitor for RecordingMonitor {
        async fn connection_lost(&self, reason: &str) {
            self.reasons.lock().push(reason.to_string());
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_probes_flow_on_interval() {
        let transport = Arc::new(CountingTransport::default());
        let monitor = Arc::new(RecordingMonitor::default());
        let manager =
            KeepAliveManager::new(transport.clone(), monitor.clone(), Duration::from_secs(1));

        manager.start();
        tokio::time::sleep(Duration::from_millis(3500)).await;

        assert_eq!(transport.probes.load(Ordering::SeqCst), 3);
        assert!(monitor.reasons.lock().is_empty());
        manager.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_probe_failure_notifies_monitor_once() {
        let transport = Arc::new(CountingTransport::failing());
        let monitor = Arc::new(RecordingMonitor::default());
        let manager =
            KeepAliveManager::new(transport.clone(), monitor.clone(), Duration::from_secs(5));

        manager.start();
        tokio::time::sleep(Duration::from_secs(6)).await;

        {
            let reasons = monitor.reasons.lock();
            assert_eq!(reasons.len(), 1);
            assert!(reasons[0].contains("wire is dead"));
        }

        // The probe loop stops after the first failure.
        tokio::time::sleep(Duration::from_secs(20)).await;
        assert_eq!(transport.probes.load(Ordering::SeqCst), 1);
        assert_eq!(monitor.reasons.lock().len(), 1);
        assert!(!manager.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_is_idempotent() {
        let transport = Arc::new(CountingTransport::default());
        let monitor = Arc::new(RecordingMonitor::default());
        let manager =
            KeepAliveManager::new(transport.clone(), monitor.clone(), Duration::from_secs(1));

        manager.start();
        manager.start();
        tokio::time::sleep(Duration::from_millis(2500)).await;

        // A single probe loop, not two.
        assert_eq!(transport.probes.load(Ordering::SeqCst), 2);
        manager.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_cancels_probing() {
        let transport = Arc::new(CountingTransport::default());
        let monitor = Arc::new(RecordingMonitor::default());
        let manager =
            KeepAliveManager::new(transport.clone(), monitor.clone(), Duration::from_secs(1));

        manager.start();
        assert!(manager.is_running());
        tokio::time::sleep(Duration::from_millis(1500)).await;
        manager.stop().await;
        assert!(!manager.is_running());

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(transport.probes.load(Ordering::SeqCst), 1);

        // Stopping again is harmless.
        manager.stop().await;
    }
}
