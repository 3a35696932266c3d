//! Reply state machine
//!
//! Governs when a node answers pending requests. Idle advances to Replying
//! whenever the pending-requests queue is non-empty; Replying drains the
//! queue and returns to Idle. Push nodes never receive requests, so their
//! reply machine simply never leaves Idle.

/// States of the reply machine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReplyState {
    /// Nothing to answer
    Idle,
    /// Draining the pending-requests queue
    Replying,
}

/// Inputs sampled by the worker at the top of a tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReplyInputs {
    /// The pending-requests queue is non-empty
    pub requests_pending: bool,
}

/// What the worker must do after a step.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReplyAction {
    /// Nothing this tick
    None,
    /// Drain and answer the pending-requests queue
    DrainRequests,
}

/// Advance the machine by one tick.
pub fn step(state: ReplyState, inputs: ReplyInputs) -> (ReplyState, ReplyAction) {
    match state {
        ReplyState::Idle if inputs.requests_pending => {
            (ReplyState::Replying, ReplyAction::DrainRequests)
        }
        ReplyState::Idle => (ReplyState::Idle, ReplyAction::None),
        ReplyState::Replying => (ReplyState::Idle, ReplyAction::None),
    }
}
