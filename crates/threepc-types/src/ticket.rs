use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// A system-wide unique transaction identifier.
///
/// Ordering on the numeric value implements wound-wait: a ticket with a
/// smaller number is older and can wound a conflicting holder with a larger
/// number.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Ticket(u64);

impl Ticket {
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn value(&self) -> u64 {
        self.0
    }

    /// `true` if `other` is strictly younger than `self` (i.e. `other` would
    /// be wounded by `self` under wound-wait).
    pub fn is_older_than(&self, other: &Ticket) -> bool {
        self.0 < other.0
    }
}

impl fmt::Debug for Ticket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Ticket({})", self.0)
    }
}

impl fmt::Display for Ticket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Mints monotonically increasing ticket numbers.
///
/// A single ticket machine is the sole source of ticket numbers for a
/// deployment; brokers pull from it in `begin()`. Backed by a plain
/// `AtomicU64` rather than a mutex since the only operation is a fetch-add.
pub struct TicketMachine {
    next: AtomicU64,
}

impl TicketMachine {
    pub fn new() -> Self {
        Self {
            next: AtomicU64::new(1),
        }
    }

    /// Starts minting from `start` (used by recovery/tests to avoid
    /// re-issuing ticket numbers already observed in shard state).
    pub fn starting_at(start: u64) -> Self {
        Self {
            next: AtomicU64::new(start),
        }
    }

    pub fn next_ticket(&self) -> Ticket {
        Ticket::new(self.next.fetch_add(1, Ordering::SeqCst))
    }
}

impl Default for TicketMachine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tickets_increase_monotonically() {
        let machine = TicketMachine::new();
        let a = machine.next_ticket();
        let b = machine.next_ticket();
        assert!(a.is_older_than(&b));
        assert!(a < b);
    }

    #[test]
    fn starting_at_resumes_from_given_value() {
        let machine = TicketMachine::starting_at(100);
        assert_eq!(machine.next_ticket().value(), 100);
        assert_eq!(machine.next_ticket().value(), 101);
    }
}
