//! Forwarding Manager
//!
//! Owns the delivery queue, the registered sinks and the scheduler task.
//!
//! Lifecycle: `Stopped → Running → Stopping → Stopped`. Sinks can only be
//! registered while stopped. `stop` lets the current window finish and its
//! batch dispatch complete before the scheduler exits. The scheduler task
//! itself moves the manager back to `Stopped` when it ends, so a cancelled
//! `stop` still completes.

use crate::batch::{BatchScheduler, WindowClose};
use crate::config::{ForwarderConfig, HecConfig, RelayConfig, SyslogConfig, WebhookConfig};
use crate::error::{RelayError, Result};
use crate::event::Event;
use crate::fanout::FanoutCoordinator;
use crate::queue::{Admission, DeliveryQueue};
use crate::sink::{HecSink, Sink, SinkKind, SyslogSink, WebhookSink};
use crate::stats::{DropReason, ForwardObserver, ForwarderMetrics, ForwarderStats, NoopObserver};
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// Manager lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManagerState {
    Stopped,
    Running,
    Stopping,
}

struct Lifecycle {
    state: ManagerState,
    shutdown: Option<watch::Sender<bool>>,
    /// Sender side is dropped when the scheduler task ends
    exited: Option<watch::Receiver<()>>,
}

pub struct ForwardingManager {
    config: ForwarderConfig,
    queue: Arc<DeliveryQueue>,
    sinks: RwLock<Vec<Arc<dyn Sink>>>,
    lifecycle: Arc<Mutex<Lifecycle>>,
    stats: Arc<ForwarderStats>,
    observer: Arc<dyn ForwardObserver>,
}

impl ForwardingManager {
    pub fn new(config: ForwarderConfig) -> Self {
        Self::with_observer(config, Arc::new(NoopObserver))
    }

    pub fn with_observer(config: ForwarderConfig, observer: Arc<dyn ForwardObserver>) -> Self {
        let queue = Arc::new(DeliveryQueue::new(config.queue_capacity, config.overflow_policy));
        Self {
            config,
            queue,
            sinks: RwLock::new(Vec::new()),
            lifecycle: Arc::new(Mutex::new(Lifecycle {
                state: ManagerState::Stopped,
                shutdown: None,
                exited: None,
            })),
            stats: Arc::new(ForwarderStats::default()),
            observer,
        }
    }

    /// Build a manager and register every configured destination.
    pub fn from_config(config: &RelayConfig) -> Result<Self> {
        config.forwarder.validate()?;
        let manager = Self::new(config.forwarder.clone());

        if let Some(hec) = &config.hec {
            manager.add_hec_sink(hec)?;
        }
        if let Some(syslog) = &config.syslog {
            manager.add_syslog_sink(syslog)?;
        }
        if let Some(webhook) = &config.webhook {
            manager.add_webhook_sink(webhook)?;
        }

        Ok(manager)
    }

    // =========================================================================
    // Sink registration
    // =========================================================================

    /// Register a sink. Rejected unless the manager is stopped.
    pub fn add_sink(&self, sink: Arc<dyn Sink>) -> Result<()> {
        self.ensure_stopped()?;
        tracing::info!(sink = %sink.name(), kind = %sink.kind(), "Adding SIEM sink");
        self.sinks.write().push(sink);
        Ok(())
    }

    pub fn add_hec_sink(&self, config: &HecConfig) -> Result<()> {
        self.ensure_stopped()?;
        self.add_sink(Arc::new(HecSink::new(config)?))
    }

    pub fn add_syslog_sink(&self, config: &SyslogConfig) -> Result<()> {
        self.ensure_stopped()?;
        self.add_sink(Arc::new(SyslogSink::new(config)?))
    }

    pub fn add_webhook_sink(&self, config: &WebhookConfig) -> Result<()> {
        self.ensure_stopped()?;
        self.add_sink(Arc::new(WebhookSink::new(config)?))
    }

    /// Registered sinks as `(kind, name)`, in registration order.
    pub fn sinks(&self) -> Vec<(SinkKind, String)> {
        self.sinks
            .read()
            .iter()
            .map(|s| (s.kind(), s.name().to_string()))
            .collect()
    }

    fn ensure_stopped(&self) -> Result<()> {
        if self.lifecycle.lock().state == ManagerState::Stopped {
            Ok(())
        } else {
            Err(RelayError::ManagerRunning)
        }
    }

    // =========================================================================
    // Enqueue
    // =========================================================================

    /// Queue an event for forwarding. Never blocks, never fails; overflow is
    /// handled by the configured policy and reported through logs, stats and
    /// the observer.
    pub fn enqueue(&self, event: Event) {
        match self.queue.push(event) {
            Admission::Accepted => {
                self.stats.record_enqueued();
            }
            Admission::Evicted(old) => {
                self.stats.record_enqueued();
                self.stats.record_dropped();
                tracing::warn!(event_id = %old.id(), "Queue full, evicted oldest event");
                self.observer.on_event_dropped(&old, DropReason::Evicted);
            }
            Admission::Rejected(event) => {
                let reason = if self.queue.is_closed() {
                    DropReason::Closed
                } else {
                    DropReason::QueueFull
                };
                self.stats.record_dropped();
                tracing::warn!(event_id = %event.id(), reason = ?reason, "Event dropped");
                self.observer.on_event_dropped(&event, reason);
            }
        }
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Start the scheduler loop.
    ///
    /// Returns `false` without side effects when the manager is not stopped
    /// or no tokio runtime is available.
    pub fn start(&self) -> bool {
        let mut lifecycle = self.lifecycle.lock();
        if lifecycle.state != ManagerState::Stopped {
            tracing::warn!(state = ?lifecycle.state, "Forwarding already active, start ignored");
            return false;
        }

        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(e) => {
                tracing::error!(error = %e, "Cannot start forwarding outside a tokio runtime");
                return false;
            }
        };

        let sinks = self.sinks.read().clone();
        if sinks.is_empty() {
            tracing::warn!("Starting SIEM forwarding with no sinks registered");
        }

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (exited_tx, exited_rx) = watch::channel(());
        let guard = ExitGuard {
            lifecycle: self.lifecycle.clone(),
            _exited: exited_tx,
        };
        let scheduler_loop = SchedulerLoop {
            queue: self.queue.clone(),
            scheduler: BatchScheduler::new(
                self.queue.clone(),
                self.config.batch_size,
                self.config.batch_timeout(),
            ),
            fanout: FanoutCoordinator::new(sinks),
            backoff: self.config.error_backoff(),
            stats: self.stats.clone(),
            observer: self.observer.clone(),
        };

        runtime.spawn(async move {
            let _guard = guard;
            scheduler_loop.run(shutdown_rx).await;
        });
        lifecycle.shutdown = Some(shutdown_tx);
        lifecycle.exited = Some(exited_rx);
        lifecycle.state = ManagerState::Running;

        tracing::info!(
            batch_size = self.config.batch_size,
            batch_timeout_ms = self.config.batch_timeout_ms,
            "Starting SIEM event forwarding service"
        );
        true
    }

    /// Stop the scheduler loop and wait for it to exit.
    ///
    /// The in-progress window still closes normally and its batch is
    /// dispatched. Events left in the queue stay there for the next `start`.
    /// No-op when stopped; while stopping, waits for the same exit.
    pub async fn stop(&self) {
        if let Some(exited) = self.request_stop() {
            Self::wait_exited(exited).await;
        }
    }

    /// Stop accepting events, deliver everything already queued, then stop.
    ///
    /// Windows close as soon as the queue is drained instead of waiting for
    /// their deadline. The queue stays closed afterwards.
    pub async fn shutdown(&self) {
        let exited = self.request_stop();
        self.close();
        if let Some(exited) = exited {
            Self::wait_exited(exited).await;
        }
    }

    /// Stop accepting events.
    ///
    /// Queued events are still delivered. Once the queue is drained a running
    /// scheduler reports `QueueError::Closed` and backs off until stopped.
    pub fn close(&self) {
        self.queue.close();
        tracing::info!(queued = self.queue.len(), "Delivery queue closed");
    }

    fn request_stop(&self) -> Option<watch::Receiver<()>> {
        let mut lifecycle = self.lifecycle.lock();
        match lifecycle.state {
            ManagerState::Stopped => {
                tracing::debug!("Stop ignored, forwarding not running");
                return None;
            }
            ManagerState::Running => {
                lifecycle.state = ManagerState::Stopping;
                if let Some(shutdown) = &lifecycle.shutdown {
                    let _ = shutdown.send(true);
                }
                tracing::info!("Stopping SIEM event forwarding service");
            }
            ManagerState::Stopping => {}
        }
        lifecycle.exited.clone()
    }

    async fn wait_exited(mut exited: watch::Receiver<()>) {
        // Nothing is ever sent; this resolves with an error once the
        // scheduler task drops the sender.
        while exited.changed().await.is_ok() {}
    }

    pub fn state(&self) -> ManagerState {
        self.lifecycle.lock().state
    }

    pub fn is_running(&self) -> bool {
        self.state() == ManagerState::Running
    }

    pub fn metrics(&self) -> ForwarderMetrics {
        self.stats.snapshot(self.queue.len())
    }
}

impl Drop for ForwardingManager {
    fn drop(&mut self) {
        if let Some(shutdown) = &self.lifecycle.lock().shutdown {
            let _ = shutdown.send(true);
        }
    }
}

/// Returns the manager to `Stopped` when the scheduler task ends, whether it
/// returns, panics or is dropped with the runtime.
struct ExitGuard {
    lifecycle: Arc<Mutex<Lifecycle>>,
    _exited: watch::Sender<()>,
}

impl Drop for ExitGuard {
    fn drop(&mut self) {
        let mut lifecycle = self.lifecycle.lock();
        lifecycle.state = ManagerState::Stopped;
        lifecycle.shutdown = None;
        lifecycle.exited = None;
        tracing::info!("SIEM event forwarding stopped");
    }
}

/// Background loop: collect a window, dispatch it, repeat.
struct SchedulerLoop {
    queue: Arc<DeliveryQueue>,
    scheduler: BatchScheduler,
    fanout: FanoutCoordinator,
    backoff: Duration,
    stats: Arc<ForwarderStats>,
    observer: Arc<dyn ForwardObserver>,
}

impl SchedulerLoop {
    async fn run(self, mut shutdown: watch::Receiver<bool>) {
        tracing::debug!(sinks = self.fanout.sink_count(), "Scheduler loop started");

        while !self.should_exit(&shutdown) {
            let window = self.scheduler.collect().await;
            let closed_by = window.closed_by;

            if !window.events.is_empty() {
                let report = self.fanout.dispatch(window.events).await;
                self.stats.record_batch(&report);
                self.observer.on_batch_dispatched(&report);
            }

            if let WindowClose::Failed(e) = closed_by {
                if *shutdown.borrow() {
                    tracing::debug!("Delivery queue drained during shutdown");
                    break;
                }

                self.stats.record_loop_error();
                self.observer.on_loop_error(&e);
                tracing::error!(
                    error = %e,
                    backoff_ms = self.backoff.as_millis() as u64,
                    "Error in forwarding loop"
                );

                tokio::select! {
                    _ = tokio::time::sleep(self.backoff) => {}
                    _ = shutdown.changed() => {}
                }
            }
        }

        tracing::debug!("Scheduler loop exited");
    }

    /// Exit between windows once asked to, but flush a closed queue first.
    fn should_exit(&self, shutdown: &watch::Receiver<bool>) -> bool {
        let requested = *shutdown.borrow();
        requested && !(self.queue.is_closed() && !self.queue.is_empty())
    }
}
