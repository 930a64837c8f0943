//! Model-based property tests for the keep-alive machine.
//!
//! These tests generate random operation sequences and verify that the real
//! session behaves identically to the reference model.
//!
//! # Architecture
//!
//! ```text
//! proptest generates: Vec<Operation>
//!                          │
//!           ┌──────────────┼──────────────┐
//!           ▼              ▼              ▼
//!    KeepAliveModel  KeepAliveSession  Compare
//!      (reference)       (real)        Observations
//! ```

use std::{sync::Arc, time::Instant};

use derec_core::{
    KeepAliveConfig, KeepAliveSession, MemoryShareVersionStore, PeerId, Session,
    ShareVersionStore,
};
use derec_harness::{KeepAliveModel, Operation};
use derec_proto::{
    KeepAliveRequest, KeepAliveResponse, Message, ProtocolStatus, ProtocolType,
    StoreLockboxShareResponse,
};
use proptest::prelude::*;

const PEER: PeerId = PeerId(7);

/// Real session wrapper that mirrors the model's interface.
struct RealKeepAlive {
    session: Session,
    requests_sent: u32,
    responses_sent: u32,
}

impl RealKeepAlive {
    fn new(config: KeepAliveConfig, store: MemoryShareVersionStore) -> Self {
        let session = KeepAliveSession::new(PEER, config, Arc::new(store), Instant::now());
        Self { session: session.into(), requests_sent: 0, responses_sent: 0 }
    }

    fn fresh() -> Self {
        Self::new(KeepAliveConfig::default(), MemoryShareVersionStore::new())
    }

    fn keep_alive(&self) -> &KeepAliveSession {
        self.session.as_keep_alive().expect("keep-alive session")
    }

    fn apply(&mut self, op: Operation) {
        match op {
            Operation::Tick => {
                self.session.as_keep_alive_mut().expect("keep-alive session").on_timer_tick();
            },
            Operation::Response { stored_share_version } => {
                let message = Message::from(KeepAliveResponse::new(stored_share_version));
                assert_eq!(self.session.process_message(&message), Ok(true));
            },
            Operation::Request => {
                let message = Message::from(KeepAliveRequest::new());
                assert_eq!(self.session.process_message(&message), Ok(true));
            },
            Operation::StopTimer => self.session.stop_timer(),
        }

        for message in self.session.drain_outbox() {
            match message {
                Message::KeepAliveRequest(_) => self.requests_sent += 1,
                Message::KeepAliveResponse(_) => self.responses_sent += 1,
                other => panic!("keep-alive session queued {other:?}"),
            }
        }
    }
}

fn operation_strategy() -> impl Strategy<Value = Operation> {
    prop_oneof![
        // Weight towards ticks so sequences reach the fast and out-of-sync bands
        8 => Just(Operation::Tick),
        2 => any::<u16>().prop_map(|v| Operation::Response { stored_share_version: v }),
        2 => Just(Operation::Request),
        1 => Just(Operation::StopTimer),
    ]
}

proptest! {
    /// State, counter and traffic match the model after every operation.
    #[test]
    fn prop_model_matches_real(
        known_version in proptest::option::of(any::<u16>()),
        ops in prop::collection::vec(operation_strategy(), 0..80),
    ) {
        let store = MemoryShareVersionStore::new();
        if let Some(version) = known_version {
            store.record_share_version(PEER, version).unwrap();
        }

        let config = KeepAliveConfig::default();
        let mut model = KeepAliveModel::new(&config);
        let mut real = RealKeepAlive::new(config, store);

        for (i, op) in ops.iter().enumerate() {
            model.apply(*op, known_version.is_some());
            real.apply(*op);

            prop_assert_eq!(
                model.state,
                real.keep_alive().state(),
                "state diverged at operation {}: {:?}",
                i,
                op
            );
            prop_assert_eq!(model.unresponded, real.keep_alive().unresponded_requests());
            prop_assert_eq!(model.requests_sent, real.requests_sent);
            prop_assert_eq!(model.responses_sent, real.responses_sent);
        }
    }

    /// Keep-alive sessions never finish, whatever happens to them.
    #[test]
    fn prop_status_never_terminal(ops in prop::collection::vec(operation_strategy(), 0..80)) {
        let mut real = RealKeepAlive::fresh();

        for op in ops {
            real.apply(op);
            prop_assert!(!real.session.protocol_status().is_terminal());
            prop_assert_eq!(real.session.protocol_type(), ProtocolType::KeepAlive);
        }
    }

    /// Messages of other protocols never disturb a keep-alive session.
    #[test]
    fn prop_foreign_messages_ignored(share_version in any::<u16>(), ticks in 0..20u32) {
        let mut real = RealKeepAlive::fresh();
        for _ in 0..ticks {
            real.apply(Operation::Tick);
        }
        let before = (real.keep_alive().state(), real.keep_alive().unresponded_requests());

        let foreign = Message::from(StoreLockboxShareResponse::new(share_version));
        prop_assert_eq!(real.session.process_message(&foreign), Ok(false));
        prop_assert_eq!(
            (real.keep_alive().state(), real.keep_alive().unresponded_requests()),
            before
        );
    }
}

#[test]
fn fresh_session_is_not_started() {
    let real = RealKeepAlive::fresh();
    assert_eq!(real.session.protocol_status(), ProtocolStatus::NotStarted);
}
