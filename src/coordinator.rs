use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::client::XeniaClient;
use crate::diff::diff_states;
use crate::error::ErrorInfo;
use crate::protocol::map_status;
use crate::types::*;
use crate::{Error, Result};

pub const DEFAULT_UPDATE_INTERVAL: Duration = Duration::from_secs(30);
/// Time the machine needs to settle after a control command before it is re-polled.
pub const DEFAULT_REFRESH_DELAY: Duration = Duration::from_secs(5);

type EventCallback = Box<dyn Fn(&Event) + Send + Sync>;
type SnapshotCallback = Box<dyn Fn(&Snapshot) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Ready,
    Refreshing,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    Updated,
    /// Another refresh was already in flight; this call did nothing.
    Coalesced,
}

pub struct CoordinatorBuilder {
    client: Arc<XeniaClient>,
    update_interval: Duration,
    refresh_delay: Duration,
    event_callbacks: Vec<EventCallback>,
    snapshot_callbacks: Vec<SnapshotCallback>,
}

impl CoordinatorBuilder {
    pub fn new(client: Arc<XeniaClient>) -> Self {
        Self {
            client,
            update_interval: DEFAULT_UPDATE_INTERVAL,
            refresh_delay: DEFAULT_REFRESH_DELAY,
            event_callbacks: Vec::new(),
            snapshot_callbacks: Vec::new(),
        }
    }

    /// Periodic refresh cadence. `Duration::ZERO` disables the timer.
    pub fn update_interval(mut self, interval: Duration) -> Self {
        self.update_interval = interval;
        self
    }

    pub fn refresh_delay(mut self, delay: Duration) -> Self {
        self.refresh_delay = delay;
        self
    }

    pub fn on_event(mut self, f: impl Fn(&Event) + Send + Sync + 'static) -> Self {
        self.event_callbacks.push(Box::new(f));
        self
    }

    pub fn on_snapshot(mut self, f: impl Fn(&Snapshot) + Send + Sync + 'static) -> Self {
        self.snapshot_callbacks.push(Box::new(f));
        self
    }

    /// Run the first refresh and, if it succeeds, start the periodic timer.
    /// A failed first refresh is returned as-is: there is no snapshot to serve.
    pub async fn start(self) -> Result<Coordinator> {
        debug!(host = self.client.host(), "running first refresh");
        let data = self.client.fetch_status().await.inspect_err(|e| {
            warn!(host = self.client.host(), error = %e, "first refresh failed");
        })?;

        let snapshot = Arc::new(Snapshot {
            state: map_status(&data),
            last_updated: Utc::now(),
            last_error: None,
        });
        let (sender, _) = watch::channel(Arc::clone(&snapshot));

        let coordinator = Coordinator {
            inner: Arc::new(Inner {
                client: self.client,
                refresh_delay: self.refresh_delay,
                snapshot: sender,
                phase: Mutex::new(Phase::Ready),
                in_flight: AtomicBool::new(false),
                event_callbacks: self.event_callbacks,
                snapshot_callbacks: self.snapshot_callbacks,
                cancel: CancellationToken::new(),
                task: Mutex::new(None),
                stopped: AtomicBool::new(false),
            }),
        };

        for cb in &coordinator.inner.snapshot_callbacks {
            cb(&snapshot);
        }

        if !self.update_interval.is_zero() {
            let handle = tokio::spawn(refresh_task(
                Arc::downgrade(&coordinator.inner),
                self.update_interval,
                coordinator.inner.cancel.clone(),
            ));
            if let Ok(mut task) = coordinator.inner.task.lock() {
                *task = Some(handle);
            }
        }

        Ok(coordinator)
    }
}

struct Inner {
    client: Arc<XeniaClient>,
    refresh_delay: Duration,
    snapshot: watch::Sender<Arc<Snapshot>>,
    phase: Mutex<Phase>,
    in_flight: AtomicBool,
    event_callbacks: Vec<EventCallback>,
    snapshot_callbacks: Vec<SnapshotCallback>,
    cancel: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
    stopped: AtomicBool,
}

/// Owns the cached [`Snapshot`] and is the only writer to it. At most one
/// status poll is in flight per coordinator; refreshes that arrive while one
/// is running are dropped, not queued.
#[derive(Clone)]
pub struct Coordinator {
    inner: Arc<Inner>,
}

impl Coordinator {
    pub fn builder(client: Arc<XeniaClient>) -> CoordinatorBuilder {
        CoordinatorBuilder::new(client)
    }

    pub fn client(&self) -> &Arc<XeniaClient> {
        &self.inner.client
    }

    /// Current snapshot. Never blocks on, or triggers, a fetch.
    pub fn snapshot(&self) -> Arc<Snapshot> {
        Arc::clone(&*self.inner.snapshot.borrow())
    }

    /// Receiver notified once per completed refresh.
    pub fn subscribe(&self) -> watch::Receiver<Arc<Snapshot>> {
        self.inner.snapshot.subscribe()
    }

    pub fn phase(&self) -> Phase {
        self.inner
            .phase
            .lock()
            .map(|phase| *phase)
            .unwrap_or(Phase::Failed)
    }

    /// Timer-driven refresh.
    pub async fn scheduled_refresh(&self) -> Result<RefreshOutcome> {
        self.refresh("scheduled").await
    }

    /// Refresh after a write: waits for the machine to settle, then polls.
    pub async fn request_refresh(&self) -> Result<RefreshOutcome> {
        if !self.inner.refresh_delay.is_zero() {
            trace!(delay = ?self.inner.refresh_delay, "delaying requested refresh");
            tokio::time::sleep(self.inner.refresh_delay).await;
        }
        self.refresh("requested").await
    }

    /// Stop the periodic timer. Returns false if already stopped or the task panicked.
    pub async fn shutdown(&self) -> bool {
        if self.inner.stopped.swap(true, Ordering::SeqCst) {
            return false;
        }
        self.inner.cancel.cancel();

        let handle = self.inner.task.lock().ok().and_then(|mut task| task.take());
        match handle {
            Some(handle) => handle.await.is_ok(),
            None => true,
        }
    }

    async fn refresh(&self, trigger: &'static str) -> Result<RefreshOutcome> {
        let Some(_guard) = InFlightGuard::acquire(&self.inner.in_flight) else {
            trace!(trigger, "refresh already in flight, dropping");
            return Ok(RefreshOutcome::Coalesced);
        };

        self.set_phase(Phase::Refreshing);
        trace!(trigger, "refreshing");

        match self.inner.client.fetch_status().await {
            Ok(data) => {
                self.apply_success(map_status(&data));
                Ok(RefreshOutcome::Updated)
            }
            Err(e) => {
                self.apply_failure(&e);
                Err(e)
            }
        }
    }

    fn apply_success(&self, state: ApplianceState) {
        let previous = self.snapshot();
        let events = diff_states(&previous.state, &state);

        let snapshot = Arc::new(Snapshot {
            state,
            last_updated: Utc::now(),
            last_error: None,
        });
        self.inner.snapshot.send_replace(Arc::clone(&snapshot));
        self.set_phase(Phase::Ready);

        if !events.is_empty() {
            debug!(count = events.len(), "state changed");
        }
        self.dispatch(&events, &snapshot);
    }

    fn apply_failure(&self, err: &Error) {
        let previous = self.snapshot();
        let info = ErrorInfo::from_error(err);

        let mut events = vec![Event::RefreshFailed {
            kind: info.kind,
            message: info.message.clone(),
        }];
        if info.kind.requires_reauth() {
            warn!(host = self.inner.client.host(), "machine rejected credentials, re-authentication required");
            events.push(Event::ReauthRequired);
        } else {
            warn!(kind = ?info.kind, error = %err, "refresh failed, keeping last known state");
        }

        let snapshot = Arc::new(Snapshot {
            state: previous.state.clone(),
            last_updated: previous.last_updated,
            last_error: Some(info),
        });
        self.inner.snapshot.send_replace(Arc::clone(&snapshot));
        self.set_phase(Phase::Failed);

        self.dispatch(&events, &snapshot);
    }

    fn dispatch(&self, events: &[Event], snapshot: &Snapshot) {
        for event in events {
            for cb in &self.inner.event_callbacks {
                cb(event);
            }
        }
        for cb in &self.inner.snapshot_callbacks {
            cb(snapshot);
        }
    }

    fn set_phase(&self, phase: Phase) {
        if let Ok(mut current) = self.inner.phase.lock() {
            *current = phase;
        }
    }
}

struct InFlightGuard<'a>(&'a AtomicBool);

impl<'a> InFlightGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

async fn refresh_task(weak: Weak<Inner>, period: Duration, cancel: CancellationToken) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval.tick().await; // the first refresh already ran in start()

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = interval.tick() => {
                let Some(inner) = weak.upgrade() else { break };
                let coordinator = Coordinator { inner };
                match coordinator.scheduled_refresh().await {
                    Ok(RefreshOutcome::Coalesced) => trace!("scheduled refresh coalesced"),
                    Ok(RefreshOutcome::Updated) => {}
                    // Already recorded in the snapshot and logged.
                    Err(_) => {}
                }
            }
        }
    }

    debug!("refresh task stopped");
}
