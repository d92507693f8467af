use crate::coord::Rect;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardState {
    Idle,
    Suppressing,
}

#[derive(Debug, Default)]
struct Inner {
    holds: AtomicUsize,
    pending: Mutex<VecDeque<Rect>>,
    discarded: AtomicUsize,
}

/// Receives `RangeChanged` notifications from a surface and queues them for
/// the worksheet, dropping them while a structural edit holds the guard.
#[derive(Debug, Clone, Default)]
pub struct ChangeInbox {
    inner: Arc<Inner>,
}

impl ChangeInbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Called by the surface. Returns whether the notification was queued.
    pub fn deliver(&self, extent: Rect) -> bool {
        if self.state() == GuardState::Suppressing {
            self.inner.discarded.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(extent = %extent, "change notification discarded during structural edit");
            return false;
        }
        self.inner.pending.lock().push_back(extent);
        true
    }

    pub fn state(&self) -> GuardState {
        if self.inner.holds.load(Ordering::Acquire) > 0 {
            GuardState::Suppressing
        } else {
            GuardState::Idle
        }
    }

    /// Enters `Suppressing`; dropping the guard returns to `Idle` on every
    /// exit path, including early returns and unwinding.
    pub fn suppress(&self) -> SuppressionGuard {
        self.inner.holds.fetch_add(1, Ordering::AcqRel);
        SuppressionGuard {
            inbox: self.clone(),
        }
    }

    pub fn drain(&self) -> Vec<Rect> {
        self.inner.pending.lock().drain(..).collect()
    }

    /// Puts extents back ahead of anything delivered since, keeping their order.
    pub fn requeue_front(&self, extents: Vec<Rect>) {
        let mut pending = self.inner.pending.lock();
        for extent in extents.into_iter().rev() {
            pending.push_front(extent);
        }
    }

    pub fn pending(&self) -> usize {
        self.inner.pending.lock().len()
    }

    /// Notifications dropped while suppressed, since creation.
    pub fn discarded(&self) -> usize {
        self.inner.discarded.load(Ordering::Relaxed)
    }
}

#[must_use = "notifications are only suppressed while the guard is alive"]
#[derive(Debug)]
pub struct SuppressionGuard {
    inbox: ChangeInbox,
}

impl Drop for SuppressionGuard {
    fn drop(&mut self) {
        self.inbox.inner.holds.fetch_sub(1, Ordering::AcqRel);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coord::Coord;

    fn extent() -> Rect {
        Rect::cell(Coord::new(0, 0))
    }

    #[test]
    fn guard_discards_then_releases() {
        let inbox = ChangeInbox::new();
        {
            let _guard = inbox.suppress();
            assert_eq!(inbox.state(), GuardState::Suppressing);
            assert!(!inbox.deliver(extent()));
        }
        assert_eq!(inbox.state(), GuardState::Idle);
        assert!(inbox.deliver(extent()));
        assert_eq!(inbox.drain(), vec![extent()]);
        assert_eq!(inbox.discarded(), 1);
    }

    #[test]
    fn guard_released_on_early_return() {
        fn fails(inbox: &ChangeInbox) -> Result<(), ()> {
            let _guard = inbox.suppress();
            Err(())
        }

        let inbox = ChangeInbox::new();
        assert!(fails(&inbox).is_err());
        assert_eq!(inbox.state(), GuardState::Idle);
    }

    #[test]
    fn requeued_extents_go_ahead_of_new_ones() {
        let inbox = ChangeInbox::new();
        let late = Rect::cell(Coord::new(9, 9));
        inbox.deliver(late);
        inbox.requeue_front(vec![extent(), Rect::cell(Coord::new(1, 0))]);
        assert_eq!(
            inbox.drain(),
            vec![extent(), Rect::cell(Coord::new(1, 0)), late]
        );
    }
}
