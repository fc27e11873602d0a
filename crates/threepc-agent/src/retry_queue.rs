use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::time::Duration;
use threepc_types::Ticket;
use tokio::sync::Mutex;

const RETRY_SETTLE: Duration = Duration::from_millis(10);
const RETRY_POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Orders retries of wounded (or otherwise transient-failed) tickets so the
/// oldest one is always admitted first, regardless of the order in which
/// wounding actually happened. Wound-wait already guarantees the holder of a
/// conflicting lock is never younger than its wounder; this queue extends
/// that guarantee to the retry dispatch layer, so a flood of younger retries
/// cannot repeatedly cut in front of an older one waiting its turn.
pub struct RetryQueue {
    waiting: Mutex<BinaryHeap<Reverse<Ticket>>>,
}

impl RetryQueue {
    pub fn new() -> Self {
        Self {
            waiting: Mutex::new(BinaryHeap::new()),
        }
    }

    /// Registers `ticket` and blocks until it is the smallest (oldest)
    /// ticket currently registered. Callers not in contention with anyone
    /// return after one settle interval.
    pub async fn admit(&self, ticket: Ticket) {
        self.waiting.lock().await.push(Reverse(ticket));
        tokio::time::sleep(RETRY_SETTLE).await;
        loop {
            let mut waiting = self.waiting.lock().await;
            if waiting.peek() == Some(&Reverse(ticket)) {
                waiting.pop();
                return;
            }
            drop(waiting);
            tokio::time::sleep(RETRY_POLL_INTERVAL).await;
        }
    }
}

impl Default for RetryQueue {
    fn default() -> Self {
        Self::new()
    }
}
