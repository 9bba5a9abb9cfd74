//! Effective election status.
//!
//! The contract exposes two signals that can disagree for a while: the stored
//! `is_active` flag and the deadline. The effective status combines both with
//! the chain's clock and is derived on demand from the latest observation.
//!
//! ```text
//! Unknown --observe()--> Open | Closed
//! Open    --observe() past deadline / flag cleared--> Closed
//! Open    --force_closed(ConclusionEvent | VoteRejected)--> Closed
//! Closed  --(anything)--> Closed
//! ```
//!
//! There is no way back from `Closed`.

use std::fmt::Display;

use log::info;

/// `true` while the election accepts votes. `now == deadline` is already closed.
pub fn effective_active(is_active_flag: bool, deadline: u64, now: u64) -> bool {
    is_active_flag && now < deadline
}

/// Why an election stopped accepting votes, ordered by authority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ClosureCause {
    /// The chain clock reached the deadline.
    Deadline,
    /// The contract cleared its `is_active` flag before the deadline.
    FlagCleared,
    /// A vote was rejected because the election had concluded.
    VoteRejected,
    /// The contract emitted `ElectionConcluded`.
    ConclusionEvent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElectionStatus {
    Open,
    Closed(ClosureCause),
}

impl ElectionStatus {
    pub fn is_open(&self) -> bool {
        matches!(self, ElectionStatus::Open)
    }
}

impl Display for ElectionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ElectionStatus::Open => write!(f, "Open"),
            ElectionStatus::Closed(cause) => write!(f, "Closed({cause:?})"),
        }
    }
}

/// Raw inputs of one reconciliation pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Observation {
    pub is_active_flag: bool,
    pub deadline: u64,
    pub now: u64,
}

impl Observation {
    fn derive(&self) -> ElectionStatus {
        if effective_active(self.is_active_flag, self.deadline, self.now) {
            ElectionStatus::Open
        } else if self.now >= self.deadline {
            ElectionStatus::Closed(ClosureCause::Deadline)
        } else {
            ElectionStatus::Closed(ClosureCause::FlagCleared)
        }
    }
}

/// Latest observation of one election plus the one-way closure latch.
#[derive(Debug, Clone, Default)]
pub struct StatusCell {
    last: Option<Observation>,
    closed: Option<ClosureCause>,
}

impl StatusCell {
    /// `None` until something was observed or forced.
    pub fn status(&self) -> Option<ElectionStatus> {
        if let Some(cause) = self.closed {
            return Some(ElectionStatus::Closed(cause));
        }
        self.last.as_ref().map(Observation::derive)
    }

    pub fn last_now(&self) -> Option<u64> {
        self.last.map(|o| o.now)
    }

    /// Records a read of flag, deadline and clock. Returns `true` if the
    /// visible status (open / closed / unknown) changed.
    ///
    /// The clock never moves backwards: a read that completes after a newer one
    /// keeps the newer `now`.
    pub fn observe(&mut self, observation: Observation) -> bool {
        let before = self.status().map(|s| s.is_open());
        let now = match self.last {
            Some(last) => last.now.max(observation.now),
            None => observation.now,
        };
        let merged = Observation { now, ..observation };
        self.last = Some(merged);
        if let ElectionStatus::Closed(cause) = merged.derive() {
            self.latch(cause);
        }
        before != self.status().map(|s| s.is_open())
    }

    /// Closes the election regardless of flag and clock. Returns `true` if it
    /// was not already closed.
    pub fn force_closed(&mut self, cause: ClosureCause) -> bool {
        let was_closed = self.closed.is_some();
        self.latch(cause);
        !was_closed
    }

    fn latch(&mut self, cause: ClosureCause) {
        match self.closed {
            // Keep the most authoritative cause.
            Some(current) if current >= cause => {}
            Some(current) => {
                info!("[latch] Closure cause upgraded from {current:?} to {cause:?}");
                self.closed = Some(cause);
            }
            None => {
                info!("[latch] Transitioning to Closed({cause:?})");
                self.closed = Some(cause);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn obs(flag: bool, deadline: u64, now: u64) -> Observation {
        Observation {
            is_active_flag: flag,
            deadline,
            now,
        }
    }

    #[test]
    fn test_deadline_boundary_is_closed() {
        assert!(effective_active(true, 100, 99));
        assert!(!effective_active(true, 100, 100));
        assert!(!effective_active(true, 100, 101));
        assert!(!effective_active(false, 100, 50));
    }

    #[test]
    fn test_unknown_until_observed() {
        let cell = StatusCell::default();
        assert_eq!(cell.status(), None);
        assert_eq!(cell.last_now(), None);
    }

    #[test]
    fn test_closed_never_reopens() {
        let mut cell = StatusCell::default();
        assert!(cell.observe(obs(true, 100, 10)));
        assert_eq!(cell.status(), Some(ElectionStatus::Open));

        assert!(cell.observe(obs(true, 100, 100)));
        assert_eq!(
            cell.status(),
            Some(ElectionStatus::Closed(ClosureCause::Deadline))
        );

        // A stale read from before the deadline cannot reopen it.
        assert!(!cell.observe(obs(true, 100, 50)));
        assert!(!cell.observe(obs(true, 200, 150)));
        assert_eq!(
            cell.status(),
            Some(ElectionStatus::Closed(ClosureCause::Deadline))
        );
        assert_eq!(cell.last_now(), Some(150));
    }

    #[test]
    fn test_flag_cleared_before_deadline() {
        let mut cell = StatusCell::default();
        cell.observe(obs(false, 100, 10));
        assert_eq!(
            cell.status(),
            Some(ElectionStatus::Closed(ClosureCause::FlagCleared))
        );
    }

    #[test]
    fn test_conclusion_event_outranks_other_causes() {
        let mut cell = StatusCell::default();
        cell.observe(obs(true, 100, 120));
        assert!(!cell.force_closed(ClosureCause::ConclusionEvent));
        assert_eq!(
            cell.status(),
            Some(ElectionStatus::Closed(ClosureCause::ConclusionEvent))
        );
        // A weaker cause arriving later does not downgrade it.
        cell.force_closed(ClosureCause::VoteRejected);
        cell.observe(obs(false, 100, 130));
        assert_eq!(
            cell.status(),
            Some(ElectionStatus::Closed(ClosureCause::ConclusionEvent))
        );
    }

    #[test]
    fn test_force_closed_without_observation() {
        let mut cell = StatusCell::default();
        assert!(cell.force_closed(ClosureCause::ConclusionEvent));
        assert!(!cell.observe(obs(true, 100, 10)));
        assert!(!cell.status().unwrap().is_open());
    }
}
