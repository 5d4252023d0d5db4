//! Request ids for ordering refresh results.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use tokio::time::Instant;

/// Issues monotonic request ids for one stream and counts refreshes in flight.
#[derive(Debug, Default)]
pub struct RequestTracker {
    latest: AtomicU64,
    in_flight: AtomicUsize,
}

impl RequestTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issues the next id. The returned session counts as in flight until
    /// dropped.
    pub fn begin(self: &Arc<Self>) -> RefreshSession {
        let request_id = self.latest.fetch_add(1, Ordering::SeqCst) + 1;
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        RefreshSession {
            request_id,
            started_at: Instant::now(),
            tracker: Arc::clone(self),
        }
    }

    pub fn is_latest(&self, request_id: u64) -> bool {
        self.latest.load(Ordering::SeqCst) == request_id
    }

    /// Makes every outstanding session stale.
    pub fn invalidate(&self) {
        self.latest.fetch_add(1, Ordering::SeqCst);
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }
}

/// One refresh cycle in progress.
#[derive(Debug)]
pub struct RefreshSession {
    request_id: u64,
    started_at: Instant,
    tracker: Arc<RequestTracker>,
}

impl RefreshSession {
    pub fn request_id(&self) -> u64 {
        self.request_id
    }

    pub fn started_at(&self) -> Instant {
        self.started_at
    }

    /// False once a newer request was issued or the stream was invalidated.
    pub fn is_current(&self) -> bool {
        self.tracker.is_latest(self.request_id)
    }
}

impl Drop for RefreshSession {
    fn drop(&mut self) {
        self.tracker.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_newer_request_supersedes_older() {
        let tracker = Arc::new(RequestTracker::new());
        let first = tracker.begin();
        let second = tracker.begin();

        assert_eq!(first.request_id(), 1);
        assert_eq!(second.request_id(), 2);
        assert!(!first.is_current());
        assert!(second.is_current());
        assert_eq!(tracker.in_flight(), 2);

        drop(first);
        assert_eq!(tracker.in_flight(), 1);
        drop(second);
        assert_eq!(tracker.in_flight(), 0);
    }

    #[test]
    fn test_invalidate_makes_everything_stale() {
        let tracker = Arc::new(RequestTracker::new());
        let session = tracker.begin();
        tracker.invalidate();
        assert!(!session.is_current());
        assert!(tracker.is_latest(2));
    }
}
