//! Reference model of the keep-alive machine.
//!
//! Deliberately naive: a counter and a state, updated exactly as the rules
//! read. Model-based tests drive it and the real session with the same
//! [`Operation`] sequence and compare what they observe.

use derec_core::{KeepAliveConfig, KeepAliveState};

/// One step applied to both the model and the real session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// Timer fires once
    Tick,
    /// A keep-alive response arrives
    Response {
        /// Share version the response carries
        stored_share_version: u16,
    },
    /// A keep-alive request arrives
    Request,
    /// The periodic timer is stopped
    StopTimer,
}

/// What the model predicts after each operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeepAliveModel {
    max_normal: u32,
    max_fast: u32,
    /// Liveness state
    pub state: KeepAliveState,
    /// Requests sent since the last response
    pub unresponded: u32,
    /// Requests queued so far
    pub requests_sent: u32,
    /// Responses queued so far (answers to inbound requests)
    pub responses_sent: u32,
}

impl KeepAliveModel {
    /// Fresh model for `config`
    pub fn new(config: &KeepAliveConfig) -> Self {
        Self {
            max_normal: config.max_unresponded_normal,
            max_fast: config.max_unresponded_fast,
            state: KeepAliveState::OutOfSync,
            unresponded: 0,
            requests_sent: 0,
            responses_sent: 0,
        }
    }

    /// Apply one operation. `version_known` says whether the store has a
    /// share version for the peer.
    pub fn apply(&mut self, op: Operation, version_known: bool) {
        match op {
            Operation::Tick => {
                self.requests_sent += 1;
                self.unresponded += 1;
                if self.unresponded > self.max_fast {
                    self.state = KeepAliveState::OutOfSync;
                } else if self.unresponded > self.max_normal {
                    self.state = KeepAliveState::FasterKeepAlives;
                }
            },
            Operation::Response { .. } => {
                self.unresponded = 0;
                self.state = KeepAliveState::InSync;
            },
            Operation::Request => {
                if version_known {
                    self.responses_sent += 1;
                }
            },
            Operation::StopTimer => {},
        }
    }
}
