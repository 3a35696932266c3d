//! Exchange state machine
//!
//! Governs when a node initiates an exchange round and when it absorbs
//! incoming data. The machine is a tagged state plus a pure transition
//! function; the worker executes the returned action after each step.
//!
//! Idle → Exchanging → Processing → Idle for pull and push-pull. Push has
//! no Processing state: it leaves Exchanging straight back to Idle and
//! drains updates inline while Idle. Entering Exchanging is edge-triggered
//! by the external round signal, one exchange per trigger.

use crate::config::ProtocolKind;

/// States of the exchange machine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExchangeState {
    /// Waiting for a trigger or pending updates
    Idle,
    /// Performing this round's sends
    Exchanging,
    /// Absorbing the updates queue (pull and push-pull only)
    Processing,
}

/// Inputs sampled by the worker at the top of a tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ExchangeInputs {
    /// A round trigger was consumed this tick
    pub trigger: bool,
    /// The updates queue is non-empty
    pub updates_pending: bool,
}

/// What the worker must do after a step.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExchangeAction {
    /// Nothing this tick
    None,
    /// Select a neighbor and perform the active-exchange sends
    StartExchange,
    /// Drain and ingest the updates queue
    DrainUpdates,
}

/// Advance the machine by one tick.
pub fn step(
    protocol: ProtocolKind,
    state: ExchangeState,
    inputs: ExchangeInputs,
) -> (ExchangeState, ExchangeAction) {
    match state {
        ExchangeState::Idle => {
            if inputs.trigger {
                (ExchangeState::Exchanging, ExchangeAction::StartExchange)
            } else if inputs.updates_pending {
                match protocol {
                    // Push absorbs inline, without a dedicated state.
                    ProtocolKind::Push => (ExchangeState::Idle, ExchangeAction::DrainUpdates),
                    ProtocolKind::Pull | ProtocolKind::PushPull => {
                        (ExchangeState::Processing, ExchangeAction::DrainUpdates)
                    }
                }
            } else {
                (ExchangeState::Idle, ExchangeAction::None)
            }
        }
        ExchangeState::Exchanging => match protocol {
            ProtocolKind::Push => (ExchangeState::Idle, ExchangeAction::None),
            ProtocolKind::Pull | ProtocolKind::PushPull => {
                (ExchangeState::Processing, ExchangeAction::DrainUpdates)
            }
        },
        ExchangeState::Processing => (ExchangeState::Idle, ExchangeAction::None),
    }
}

#[cfg(test)]
#[allow(clippy::panic, clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    const QUIET: ExchangeInputs = ExchangeInputs {
        trigger: false,
        updates_pending: false,
    };
    const TRIGGERED: ExchangeInputs = ExchangeInputs {
        trigger: true,
        updates_pending: false,
    };
    const UPDATES: ExchangeInputs = ExchangeInputs {
        trigger: false,
        updates_pending: true,
    };

    #[test]
    fn test_idle_stays_idle_when_quiet() {
        for protocol in [ProtocolKind::Push, ProtocolKind::Pull, ProtocolKind::PushPull] {
            assert_eq!(
                step(protocol, ExchangeState::Idle, QUIET),
                (ExchangeState::Idle, ExchangeAction::None)
            );
        }
    }

    #[test]
    fn test_trigger_starts_exactly_one_exchange() {
        for protocol in [ProtocolKind::Push, ProtocolKind::Pull, ProtocolKind::PushPull] {
            assert_eq!(
                step(protocol, ExchangeState::Idle, TRIGGERED),
                (ExchangeState::Exchanging, ExchangeAction::StartExchange)
            );
        }
    }

    #[test]
    fn test_trigger_outranks_pending_updates() {
        let both = ExchangeInputs {
            trigger: true,
            updates_pending: true,
        };
        assert_eq!(
            step(ProtocolKind::Pull, ExchangeState::Idle, both),
            (ExchangeState::Exchanging, ExchangeAction::StartExchange)
        );
    }

    #[test]
    fn test_pull_cycle_goes_through_processing() {
        let (s, _) = step(ProtocolKind::Pull, ExchangeState::Idle, TRIGGERED);
        let (s, action) = step(ProtocolKind::Pull, s, QUIET);
        assert_eq!((s, action), (ExchangeState::Processing, ExchangeAction::DrainUpdates));
        assert_eq!(
            step(ProtocolKind::Pull, s, UPDATES),
            (ExchangeState::Idle, ExchangeAction::None),
            "processing returns to idle regardless of new arrivals"
        );
    }

    #[test]
    fn test_push_has_no_processing_state() {
        let (s, _) = step(ProtocolKind::Push, ExchangeState::Idle, TRIGGERED);
        assert_eq!(
            step(ProtocolKind::Push, s, UPDATES),
            (ExchangeState::Idle, ExchangeAction::None),
            "push returns straight to idle after the exchange"
        );
        assert_eq!(
            step(ProtocolKind::Push, ExchangeState::Idle, UPDATES),
            (ExchangeState::Idle, ExchangeAction::DrainUpdates),
            "push drains inline while idle"
        );
    }

    #[test]
    fn test_pushpull_matches_pull_shape() {
        assert_eq!(
            step(ProtocolKind::PushPull, ExchangeState::Idle, UPDATES),
            (ExchangeState::Processing, ExchangeAction::DrainUpdates)
        );
        assert_eq!(
            step(ProtocolKind::PushPull, ExchangeState::Exchanging, QUIET),
            (ExchangeState::Processing, ExchangeAction::DrainUpdates)
        );
    }
}
