//! Feedback-delay timer
//!
//! After a quiz answer the session waits a fixed delay before moving on. The
//! wait is represented by a ticket stamped with the timer's epoch; cancelling
//! or rescheduling bumps the epoch so an outstanding ticket can never fire
//! into a session that has moved on.

use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, FixedOffset};

/// A scheduled auto-advance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdvanceTicket {
    pub epoch: u64,
    pub due_at: DateTime<FixedOffset>,
    pub delay: StdDuration,
}

/// At most one pending advance per session.
#[derive(Debug, Default)]
pub struct AdvanceTimer {
    epoch: u64,
    pending: Option<AdvanceTicket>,
}

impl AdvanceTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces any pending advance with a new one due `delay` after `now`.
    pub fn schedule(&mut self, now: DateTime<FixedOffset>, delay: StdDuration) -> AdvanceTicket {
        self.epoch += 1;
        let offset = Duration::from_std(delay).unwrap_or_else(|_| Duration::zero());
        let ticket = AdvanceTicket {
            epoch: self.epoch,
            due_at: now + offset,
            delay,
        };
        self.pending = Some(ticket);
        ticket
    }

    /// Drops the pending advance, if any.
    pub fn cancel(&mut self) -> bool {
        self.epoch += 1;
        self.pending.take().is_some()
    }

    pub fn pending(&self) -> Option<AdvanceTicket> {
        self.pending
    }

    /// Consumes the pending advance when `ticket` is still the current one.
    pub fn take_if_current(&mut self, ticket: AdvanceTicket) -> bool {
        if self.pending == Some(ticket) && ticket.epoch == self.epoch {
            self.pending = None;
            true
        } else {
            false
        }
    }

    /// Consumes the pending advance once `now` has reached its due time.
    pub fn take_due(&mut self, now: DateTime<FixedOffset>) -> Option<AdvanceTicket> {
        match self.pending {
            Some(ticket) if now >= ticket.due_at => {
                self.pending = None;
                Some(ticket)
            }
            _ => None,
        }
    }
}
