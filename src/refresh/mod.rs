//! Generic refresh controller shared by every stream.
//!
//! A controller owns the latest input of one stream, turns input changes and
//! timer ticks into fetch cycles, and publishes an immutable [`UiSnapshot`]
//! after every state change. Cycles are ordered by request id: a result is
//! applied only if no newer cycle was started in the meantime.

pub mod batch;
pub mod session;
pub mod timer;


use crate::core::error::FetchError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use session::{RefreshSession, RequestTracker};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use timer::{Debouncer, RepeatingTask, TickControl};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshPolicy {
    /// Quiet period before a submitted input is fetched
    pub debounce: Duration,
    /// `None` disables auto-refresh
    pub auto_refresh: Option<Duration>,
}

impl RefreshPolicy {
    pub fn manual() -> Self {
        RefreshPolicy {
            debounce: Duration::ZERO,
            auto_refresh: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    User,
    Timer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshState {
    Idle,
    Loading { first: bool },
    Ready,
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    Applied,
    /// Fetch failed; the degraded value and an error message were published
    Failed,
    /// Superseded by a newer request; nothing was published
    Stale,
    /// Timer tick while another cycle was in flight
    Skipped,
    Stopped,
}

/// What observers see. Replaced wholesale on every change.
#[derive(Debug, Clone, PartialEq)]
pub struct UiSnapshot<V> {
    pub state: RefreshState,
    pub value: Option<V>,
    pub loading: bool,
    pub error: Option<String>,
    pub last_update: Option<DateTime<Utc>>,
    pub auto_refresh: bool,
}

impl<V> UiSnapshot<V> {
    fn initial(auto_refresh: bool) -> Self {
        UiSnapshot {
            state: RefreshState::Idle,
            value: None,
            loading: false,
            error: None,
            last_update: None,
            auto_refresh,
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.state == RefreshState::Stopped
    }
}

/// Stream-specific behaviour plugged into a [`RefreshController`].
#[async_trait]
pub trait Refresher: Send + Sync + 'static {
    type Input: Clone + Send + Sync + 'static;
    type Fetched: Send + 'static;
    type Value: Clone + Send + Sync + 'static;

    async fn fetch(&self, input: &Self::Input) -> Result<Self::Fetched, FetchError>;

    /// Builds the next value from a successful fetch and the value currently
    /// on screen.
    fn fold(
        &self,
        input: &Self::Input,
        fetched: Self::Fetched,
        previous: Option<&Self::Value>,
        at: DateTime<Utc>,
    ) -> Self::Value;

    /// Value to keep on screen after a failed fetch.
    fn degrade(&self, _input: &Self::Input, previous: Option<&Self::Value>) -> Option<Self::Value> {
        previous.cloned()
    }

    fn failure_message(&self, err: &FetchError) -> String {
        err.to_string()
    }
}

struct Shared<R: Refresher> {
    name: &'static str,
    refresher: R,
    policy: RefreshPolicy,
    snapshot: watch::Sender<Arc<UiSnapshot<R::Value>>>,
    input: Mutex<Option<R::Input>>,
    requests: Arc<RequestTracker>,
    debouncer: Debouncer,
    auto_task: Mutex<Option<RepeatingTask>>,
    auto_enabled: AtomicBool,
    has_succeeded: AtomicBool,
    shutdown: CancellationToken,
}

impl<R: Refresher> Shared<R> {
    fn publish(&self, update: impl FnOnce(&mut UiSnapshot<R::Value>)) {
        self.snapshot.send_modify(|slot| {
            let mut next = (**slot).clone();
            update(&mut next);
            *slot = Arc::new(next);
        });
    }

    fn publish_loading(&self, trigger: Trigger) {
        self.publish(|next| {
            let first = next.value.is_none();
            next.state = RefreshState::Loading { first };
            next.loading = first || trigger == Trigger::User;
            if trigger == Trigger::User {
                next.error = None;
            }
        });
    }

    fn apply(
        &self,
        session: &RefreshSession,
        input: &R::Input,
        fetched: Result<R::Fetched, FetchError>,
    ) -> CycleOutcome {
        let now = Utc::now();
        let mut outcome = CycleOutcome::Stale;
        self.snapshot.send_if_modified(|slot| {
            if self.shutdown.is_cancelled() {
                outcome = CycleOutcome::Stopped;
                return false;
            }
            if !session.is_current() {
                return false;
            }

            let mut next = (**slot).clone();
            match fetched {
                Ok(data) => {
                    next.value = Some(self.refresher.fold(input, data, slot.value.as_ref(), now));
                    next.error = None;
                    next.last_update = Some(now);
                    outcome = CycleOutcome::Applied;
                }
                Err(e) => {
                    warn!(stream = self.name, error = %e, "Refresh failed");
                    next.value = self.refresher.degrade(input, slot.value.as_ref());
                    next.error = Some(self.refresher.failure_message(&e));
                    outcome = CycleOutcome::Failed;
                }
            }
            next.state = RefreshState::Ready;
            next.loading = false;
            *slot = Arc::new(next);
            true
        });
        outcome
    }
}

async fn run_cycle<R: Refresher>(
    shared: &Arc<Shared<R>>,
    trigger: Trigger,
    input: R::Input,
    session: RefreshSession,
) -> CycleOutcome {
    if shared.shutdown.is_cancelled() {
        return CycleOutcome::Stopped;
    }
    debug!(
        stream = shared.name,
        request_id = session.request_id(),
        ?trigger,
        "Refresh started"
    );
    shared.publish_loading(trigger);

    let fetched = tokio::select! {
        biased;
        _ = shared.shutdown.cancelled() => return CycleOutcome::Stopped,
        result = shared.refresher.fetch(&input) => result,
    };

    let outcome = shared.apply(&session, &input, fetched);
    debug!(
        stream = shared.name,
        request_id = session.request_id(),
        elapsed_ms = session.started_at().elapsed().as_millis() as u64,
        ?outcome,
        "Refresh finished"
    );
    if outcome == CycleOutcome::Applied && !shared.has_succeeded.swap(true, Ordering::SeqCst) {
        arm_auto_refresh(shared);
    }
    outcome
}

async fn tick<R: Refresher>(shared: &Arc<Shared<R>>) -> CycleOutcome {
    if shared.requests.in_flight() > 0 {
        debug!(stream = shared.name, "Previous refresh still in flight, skipping tick");
        return CycleOutcome::Skipped;
    }
    let Some(input) = shared.input.lock().clone() else {
        return CycleOutcome::Skipped;
    };
    let session = shared.requests.begin();
    run_cycle(shared, Trigger::Timer, input, session).await
}

/// Starts the periodic task if the stream allows it, has succeeded once and
/// the user has not switched it off.
fn arm_auto_refresh<R: Refresher>(shared: &Arc<Shared<R>>) {
    let Some(period) = shared.policy.auto_refresh else {
        return;
    };
    if shared.shutdown.is_cancelled()
        || !shared.auto_enabled.load(Ordering::SeqCst)
        || !shared.has_succeeded.load(Ordering::SeqCst)
    {
        return;
    }

    let weak: Weak<Shared<R>> = Arc::downgrade(shared);
    let task = RepeatingTask::spawn(period, shared.shutdown.child_token(), move || {
        let weak = weak.clone();
        async move {
            let Some(shared) = weak.upgrade() else {
                return TickControl::Stop;
            };
            if !shared.auto_enabled.load(Ordering::SeqCst) {
                return TickControl::Stop;
            }
            tick(&shared).await;
            TickControl::Continue
        }
    });
    info!(stream = shared.name, ?period, "Auto-refresh armed");
    if let Some(previous) = shared.auto_task.lock().replace(task) {
        previous.cancel();
    }
}

/// Drives one stream. Dropping the controller stops it.
pub struct RefreshController<R: Refresher> {
    shared: Arc<Shared<R>>,
}

impl<R: Refresher> RefreshController<R> {
    pub fn new(name: &'static str, refresher: R, policy: RefreshPolicy) -> Self {
        let auto_enabled = policy.auto_refresh.is_some();
        let (snapshot, _) = watch::channel(Arc::new(UiSnapshot::initial(auto_enabled)));
        let shutdown = CancellationToken::new();
        let shared = Shared {
            name,
            refresher,
            policy,
            snapshot,
            input: Mutex::new(None),
            requests: Arc::new(RequestTracker::new()),
            debouncer: Debouncer::new(policy.debounce, shutdown.clone()),
            auto_task: Mutex::new(None),
            auto_enabled: AtomicBool::new(auto_enabled),
            has_succeeded: AtomicBool::new(false),
            shutdown,
        };
        RefreshController {
            shared: Arc::new(shared),
        }
    }

    pub fn refresher(&self) -> &R {
        &self.shared.refresher
    }

    pub fn policy(&self) -> RefreshPolicy {
        self.shared.policy
    }

    pub fn snapshot(&self) -> Arc<UiSnapshot<R::Value>> {
        self.shared.snapshot.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<UiSnapshot<R::Value>>> {
        self.shared.snapshot.subscribe()
    }

    pub fn current_input(&self) -> Option<R::Input> {
        self.shared.input.lock().clone()
    }

    /// Records `input` after the debounce delay and fetches it. A newer
    /// submission within the delay replaces this one.
    pub fn submit(&self, input: R::Input) {
        if self.is_stopped() {
            return;
        }
        if self.shared.debouncer.delay().is_zero() {
            drop(self.spawn_refresh_with(input));
            return;
        }
        let shared = Arc::clone(&self.shared);
        self.shared.debouncer.schedule(async move {
            *shared.input.lock() = Some(input.clone());
            let session = shared.requests.begin();
            run_cycle(&shared, Trigger::User, input, session).await;
        });
    }

    /// Fetches the current input immediately. Without an input there is
    /// nothing to refresh.
    pub async fn refresh(&self) -> CycleOutcome {
        match self.current_input() {
            Some(input) => self.refresh_with(input).await,
            None => CycleOutcome::Skipped,
        }
    }

    /// Replaces the input and fetches it immediately, bypassing the debounce.
    pub async fn refresh_with(&self, input: R::Input) -> CycleOutcome {
        if self.is_stopped() {
            return CycleOutcome::Stopped;
        }
        self.shared.debouncer.cancel();
        *self.shared.input.lock() = Some(input.clone());
        let session = self.shared.requests.begin();
        run_cycle(&self.shared, Trigger::User, input, session).await
    }

    /// Like [`refresh_with`](Self::refresh_with), but the request id is issued
    /// before returning so the cycle is ordered against later calls.
    pub fn spawn_refresh_with(&self, input: R::Input) -> JoinHandle<CycleOutcome> {
        let shared = Arc::clone(&self.shared);
        if self.is_stopped() {
            return tokio::spawn(async { CycleOutcome::Stopped });
        }
        self.shared.debouncer.cancel();
        *self.shared.input.lock() = Some(input.clone());
        let session = self.shared.requests.begin();
        tokio::spawn(async move { run_cycle(&shared, Trigger::User, input, session).await })
    }

    /// Drops the input, discards every in-flight result and replaces the
    /// value with `reset(previous)`.
    pub fn clear(&self, reset: impl FnOnce(Option<&R::Value>) -> Option<R::Value>) {
        if self.is_stopped() {
            return;
        }
        self.shared.debouncer.cancel();
        *self.shared.input.lock() = None;
        self.shared.requests.invalidate();
        self.shared.publish(|next| {
            next.value = reset(next.value.as_ref());
            next.error = None;
            next.loading = false;
            next.state = if next.value.is_some() {
                RefreshState::Ready
            } else {
                RefreshState::Idle
            };
        });
    }

    /// Replaces the input and rewrites the value on screen without fetching.
    pub fn amend(&self, input: R::Input, update: impl FnOnce(&R::Value) -> R::Value) {
        if self.is_stopped() {
            return;
        }
        *self.shared.input.lock() = Some(input);
        self.shared.publish(|next| {
            next.value = next.value.as_ref().map(update);
        });
    }

    pub fn set_auto_refresh(&self, enabled: bool) {
        if self.is_stopped() {
            return;
        }
        self.shared.auto_enabled.store(enabled, Ordering::SeqCst);
        self.shared.publish(|next| next.auto_refresh = enabled);
        if enabled {
            arm_auto_refresh(&self.shared);
        } else if let Some(task) = self.shared.auto_task.lock().take() {
            task.cancel();
            info!(stream = self.shared.name, "Auto-refresh disabled");
        }
    }

    pub fn is_auto_refresh_armed(&self) -> bool {
        self.shared
            .auto_task
            .lock()
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }

    pub fn in_flight(&self) -> usize {
        self.shared.requests.in_flight()
    }

    /// No debounced submission is waiting and no cycle is running.
    pub fn is_idle(&self) -> bool {
        !self.shared.debouncer.is_pending() && self.in_flight() == 0
    }

    pub fn is_stopped(&self) -> bool {
        self.shared.shutdown.is_cancelled()
    }

    /// Cancels pending and periodic work and discards in-flight results.
    /// Calling it again has no effect.
    pub fn stop(&self) {
        if self.shared.shutdown.is_cancelled() {
            return;
        }
        self.shared.shutdown.cancel();
        self.shared.debouncer.cancel();
        self.shared.requests.invalidate();
        if let Some(task) = self.shared.auto_task.lock().take() {
            task.cancel();
        }
        self.shared.publish(|next| {
            next.state = RefreshState::Stopped;
            next.loading = false;
        });
        info!(stream = self.shared.name, "Refresh stopped");
    }
}

impl<R: Refresher> Drop for RefreshController<R> {
    fn drop(&mut self) {
        self.stop();
    }
}
