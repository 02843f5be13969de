//! Per-channel pending request state machine.
//!
//! `Idle -> InFlight -> InFlight + Queued -> InFlight(queued) -> ...`
//!
//! At most one request per channel is in flight; a newer size overwrites the
//! queued slot instead of stacking.

use std::collections::HashMap;
use std::hash::Hash;

pub type Size = (u32, u32);

/// Request state of one channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PendingState {
    #[default]
    Idle,
    InFlight {
        size: Size,
        queued: Option<Size>,
    },
}

impl PendingState {
    /// The size the channel currently wants, if a request is outstanding.
    pub fn desired(&self) -> Option<Size> {
        match *self {
            PendingState::Idle => None,
            PendingState::InFlight { size, queued } => Some(queued.unwrap_or(size)),
        }
    }
}

/// What the caller must do after [`PendingLedger::request`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestAction {
    /// Send a message to the worker now.
    Send(Size),
    /// Stored in the queued slot; sent once the in-flight request returns.
    Queued(Size),
    /// Already in flight or queued; nothing to send.
    Duplicate,
}

/// What the caller must do after [`PendingLedger::complete`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Completion {
    /// The delivered result matches the desired size and should be adopted.
    pub adopt: bool,
    /// A queued size that must be sent now.
    pub reissue: Option<Size>,
}

/// In-flight and queued-next sizes for every channel.
#[derive(Debug)]
pub struct PendingLedger<K> {
    states: HashMap<K, PendingState>,
}

impl<K> Default for PendingLedger<K> {
    fn default() -> Self {
        Self {
            states: HashMap::new(),
        }
    }
}

impl<K: Copy + Eq + Hash> PendingLedger<K> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self, key: K) -> PendingState {
        self.states.get(&key).copied().unwrap_or_default()
    }

    pub fn request(&mut self, key: K, size: Size) -> RequestAction {
        let state = self.states.entry(key).or_default();
        match *state {
            PendingState::Idle => {
                *state = PendingState::InFlight { size, queued: None };
                RequestAction::Send(size)
            }
            PendingState::InFlight {
                size: in_flight,
                queued,
            } => {
                if size == in_flight {
                    // Back to what is already on its way; drop the stale queued size.
                    *state = PendingState::InFlight {
                        size: in_flight,
                        queued: None,
                    };
                    RequestAction::Duplicate
                } else if queued == Some(size) {
                    RequestAction::Duplicate
                } else {
                    *state = PendingState::InFlight {
                        size: in_flight,
                        queued: Some(size),
                    };
                    RequestAction::Queued(size)
                }
            }
        }
    }

    /// Record that a result of `delivered` size arrived for `key`.
    pub fn complete(&mut self, key: K, delivered: Size) -> Completion {
        let state = self.states.remove(&key).unwrap_or_default();
        match state {
            // Nothing outstanding: the result was superseded by a reset.
            PendingState::Idle => Completion {
                adopt: false,
                reissue: None,
            },
            PendingState::InFlight { size, queued } => {
                let desired = queued.unwrap_or(size);
                let adopt = delivered == desired;
                let reissue = queued.filter(|&q| q != delivered);
                if let Some(next) = reissue {
                    self.states.insert(
                        key,
                        PendingState::InFlight {
                            size: next,
                            queued: None,
                        },
                    );
                }
                Completion { adopt, reissue }
            }
        }
    }

    /// Clear the in-flight slot after a failed request, issuing any queued size.
    pub fn fail(&mut self, key: K) -> Option<Size> {
        match self.states.remove(&key) {
            Some(PendingState::InFlight {
                queued: Some(next), ..
            }) => {
                self.states.insert(
                    key,
                    PendingState::InFlight {
                        size: next,
                        queued: None,
                    },
                );
                Some(next)
            }
            _ => None,
        }
    }

    pub fn forget(&mut self, key: K) {
        self.states.remove(&key);
    }

    pub fn clear(&mut self) {
        self.states.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_request_is_sent() {
        let mut ledger = PendingLedger::new();
        assert_eq!(ledger.request(1, (64, 64)), RequestAction::Send((64, 64)));
        assert_eq!(
            ledger.state(1),
            PendingState::InFlight {
                size: (64, 64),
                queued: None
            }
        );
    }

    #[test]
    fn test_identical_requests_are_deduplicated() {
        let mut ledger = PendingLedger::new();
        ledger.request(1, (64, 64));
        assert_eq!(ledger.request(1, (64, 64)), RequestAction::Duplicate);
        ledger.request(1, (32, 32));
        assert_eq!(ledger.request(1, (32, 32)), RequestAction::Duplicate);
    }

    #[test]
    fn test_queued_slot_is_overwritten() {
        let mut ledger = PendingLedger::new();
        ledger.request(1, (64, 64));
        assert_eq!(ledger.request(1, (32, 32)), RequestAction::Queued((32, 32)));
        assert_eq!(ledger.request(1, (16, 16)), RequestAction::Queued((16, 16)));
        assert_eq!(ledger.state(1).desired(), Some((16, 16)));

        let completion = ledger.complete(1, (64, 64));
        assert!(!completion.adopt);
        assert_eq!(completion.reissue, Some((16, 16)));

        let completion = ledger.complete(1, (16, 16));
        assert!(completion.adopt);
        assert_eq!(completion.reissue, None);
        assert_eq!(ledger.state(1), PendingState::Idle);
    }

    #[test]
    fn test_returning_to_in_flight_size_drops_queue() {
        let mut ledger = PendingLedger::new();
        ledger.request(1, (64, 64));
        ledger.request(1, (32, 32));
        assert_eq!(ledger.request(1, (64, 64)), RequestAction::Duplicate);
        let completion = ledger.complete(1, (64, 64));
        assert!(completion.adopt);
        assert_eq!(completion.reissue, None);
    }

    #[test]
    fn test_completion_without_request_is_discarded() {
        let mut ledger: PendingLedger<u32> = PendingLedger::new();
        let completion = ledger.complete(7, (8, 8));
        assert!(!completion.adopt);
        assert_eq!(completion.reissue, None);
    }

    #[test]
    fn test_fail_promotes_queued() {
        let mut ledger = PendingLedger::new();
        ledger.request(1, (64, 64));
        assert_eq!(ledger.fail(1), None);
        ledger.request(1, (64, 64));
        ledger.request(1, (32, 32));
        assert_eq!(ledger.fail(1), Some((32, 32)));
        assert_eq!(ledger.state(1).desired(), Some((32, 32)));
    }
}
