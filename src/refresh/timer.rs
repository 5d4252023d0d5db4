//! Cancellable timers: a repeating task and an input debouncer.

use parking_lot::Mutex;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickControl {
    Continue,
    Stop,
}

/// Runs `tick` every `period` until the token is cancelled or a tick asks to
/// stop. A tick is awaited before the next period starts, so ticks of one
/// task never overlap.
#[derive(Debug)]
pub struct RepeatingTask {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

impl RepeatingTask {
    pub fn spawn<F, Fut>(period: Duration, token: CancellationToken, mut tick: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = TickControl> + Send + 'static,
    {
        let task_token = token.clone();
        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    _ = task_token.cancelled() => break,
                    _ = tokio::time::sleep(period) => {}
                }
                if tick().await == TickControl::Stop {
                    break;
                }
            }
            debug!("Repeating task finished");
        });
        RepeatingTask { token, handle }
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for RepeatingTask {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

/// Delays an action until no newer action has been scheduled for `delay`.
#[derive(Debug)]
pub struct Debouncer {
    delay: Duration,
    parent: CancellationToken,
    pending: Arc<Mutex<Option<CancellationToken>>>,
}

impl Debouncer {
    /// Pending actions are also cancelled when `parent` is.
    pub fn new(delay: Duration, parent: CancellationToken) -> Self {
        Debouncer {
            delay,
            parent,
            pending: Arc::new(Mutex::new(None)),
        }
    }

    /// Cancels any pending action and schedules `action`. Once the delay has
    /// elapsed the action runs to completion.
    pub fn schedule<Fut>(&self, action: Fut)
    where
        Fut: Future<Output = ()> + Send + 'static,
    {
        let token = self.parent.child_token();
        if let Some(previous) = self.pending.lock().replace(token.clone()) {
            previous.cancel();
        }

        let delay = self.delay;
        let pending = Arc::clone(&self.pending);
        tokio::spawn(async move {
            tokio::select! {
                biased;
                _ = token.cancelled() => return,
                _ = tokio::time::sleep(delay) => {}
            }
            // Inputs landing exactly on the deadline still supersede this one
            tokio::task::yield_now().await;
            {
                // Replacing the slot cancels under the same lock
                let mut slot = pending.lock();
                if token.is_cancelled() {
                    return;
                }
                slot.take();
            }
            action.await;
        });
    }

    pub fn cancel(&self) {
        if let Some(pending) = self.pending.lock().take() {
            pending.cancel();
        }
    }

    /// True between `schedule` and the moment the action starts.
    pub fn is_pending(&self) -> bool {
        self.pending.lock().is_some()
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test(start_paused = true)]
    async fn test_repeating_task_ticks_until_cancelled() {
        let ticks = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&ticks);
        let task = RepeatingTask::spawn(Duration::from_secs(3), CancellationToken::new(), move || {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                TickControl::Continue
            }
        });

        tokio::time::sleep(Duration::from_millis(9_500)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 3);

        task.cancel();
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 3);
        assert!(task.is_finished());
    }

    #[tokio::test(start_paused = true)]
    async fn test_repeating_task_stops_on_request() {
        let ticks = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&ticks);
        let task = RepeatingTask::spawn(Duration::from_secs(1), CancellationToken::new(), move || {
            let counter = Arc::clone(&counter);
            async move {
                if counter.fetch_add(1, Ordering::SeqCst) == 1 {
                    TickControl::Stop
                } else {
                    TickControl::Continue
                }
            }
        });

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 2);
        assert!(task.is_finished());
    }

    #[tokio::test(start_paused = true)]
    async fn test_debouncer_runs_only_last_action() {
        let fired = Arc::new(Mutex::new(Vec::new()));
        let debouncer = Debouncer::new(Duration::from_millis(300), CancellationToken::new());

        for (wait, value) in [(0, 1), (100, 2), (50, 3)] {
            tokio::time::sleep(Duration::from_millis(wait)).await;
            let fired = Arc::clone(&fired);
            debouncer.schedule(async move { fired.lock().push(value) });
        }

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(*fired.lock(), vec![3]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_debouncer_pending_until_fired() {
        let debouncer = Debouncer::new(Duration::from_millis(300), CancellationToken::new());
        assert!(!debouncer.is_pending());

        debouncer.schedule(async {});
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(debouncer.is_pending());
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(!debouncer.is_pending());

        debouncer.schedule(async {});
        debouncer.cancel();
        assert!(!debouncer.is_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn test_debouncer_parent_cancellation() {
        let fired = Arc::new(AtomicUsize::new(0));
        let parent = CancellationToken::new();
        let debouncer = Debouncer::new(Duration::from_millis(300), parent.clone());

        let counter = Arc::clone(&fired);
        debouncer.schedule(async move {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        parent.cancel();

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }
}
