use std::sync::{Arc, Mutex};

use tokio::sync::Notify;

/// Admission gate bounding how many transfers run at once.
///
/// Waiting happens at [`acquire`](Self::acquire), never at submission. The
/// limit can be changed while jobs are running: raising it admits waiters
/// immediately, lowering it only affects future admissions.
#[derive(Debug)]
pub struct TransferLimiter {
    state: Mutex<LimiterState>,
    notify: Notify,
}

#[derive(Debug)]
struct LimiterState {
    active: usize,
    max: usize,
}

/// A claimed slot. Dropping it releases the slot.
#[derive(Debug)]
pub struct TransferPermit {
    limiter: Arc<TransferLimiter>,
}

impl Drop for TransferPermit {
    fn drop(&mut self) {
        self.limiter.release();
    }
}

impl TransferLimiter {
    /// Creates a limiter admitting up to `max` transfers (minimum 1).
    pub fn new(max: usize) -> Self {
        Self {
            state: Mutex::new(LimiterState {
                active: 0,
                max: max.max(1),
            }),
            notify: Notify::new(),
        }
    }

    /// Waits until a slot is free and claims it.
    pub async fn acquire(self: &Arc<Self>) -> TransferPermit {
        loop {
            // Register interest before checking so a release between the
            // check and the await is not missed.
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(permit) = self.try_acquire() {
                return permit;
            }
            notified.await;
        }
    }

    /// Claims a slot if one is free right now.
    pub fn try_acquire(self: &Arc<Self>) -> Option<TransferPermit> {
        let mut s = self.state.lock().unwrap();
        if s.active < s.max {
            s.active += 1;
            return Some(TransferPermit {
                limiter: Arc::clone(self),
            });
        }
        None
    }

    fn release(&self) {
        {
            let mut s = self.state.lock().unwrap();
            s.active = s.active.saturating_sub(1);
        }
        self.notify.notify_one();
    }

    /// Changes the limit (minimum 1) and wakes every waiter.
    pub fn set_max(&self, max: usize) {
        {
            let mut s = self.state.lock().unwrap();
            s.max = max.max(1);
        }
        self.notify.notify_waiters();
    }

    /// Current limit.
    pub fn max(&self) -> usize {
        self.state.lock().unwrap().max
    }

    /// Number of slots currently claimed.
    pub fn active(&self) -> usize {
        self.state.lock().unwrap().active
    }
}
