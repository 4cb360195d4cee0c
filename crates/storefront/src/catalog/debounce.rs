//! Quiet-period debouncing for search input.
//!
//! Every call takes a ticket. A ticket is current until a newer one is
//! issued. Callers wait out the quiet period, then check that their ticket is
//! still current before and after doing the work, so only the last input of a
//! burst runs and late results of superseded inputs are dropped.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Identifies one debounced request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket(u64);

#[derive(Debug)]
pub struct Debouncer {
    quiet: Duration,
    latest: AtomicU64,
}

impl Debouncer {
    #[must_use]
    pub const fn new(quiet: Duration) -> Self {
        Self {
            quiet,
            latest: AtomicU64::new(0),
        }
    }

    /// Supersede every outstanding ticket and return a new one.
    pub fn issue(&self) -> Ticket {
        Ticket(self.latest.fetch_add(1, Ordering::SeqCst) + 1)
    }

    #[must_use]
    pub fn is_current(&self, ticket: Ticket) -> bool {
        self.latest.load(Ordering::SeqCst) == ticket.0
    }

    /// Wait out the quiet period. Returns whether the ticket survived it.
    pub async fn settle(&self, ticket: Ticket) -> bool {
        tokio::time::sleep(self.quiet).await;
        self.is_current(ticket)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_newer_ticket_supersedes() {
        let debouncer = Debouncer::new(Duration::from_millis(300));
        let first = debouncer.issue();
        assert!(debouncer.is_current(first));
        let second = debouncer.issue();
        assert!(!debouncer.is_current(first));
        assert!(debouncer.is_current(second));
    }

    #[tokio::test(start_paused = true)]
    async fn test_settle_waits_quiet_period() {
        let debouncer = Debouncer::new(Duration::from_millis(300));
        let start = tokio::time::Instant::now();
        let ticket = debouncer.issue();
        assert!(debouncer.settle(ticket).await);
        assert!(start.elapsed() >= Duration::from_millis(300));
    }
}
