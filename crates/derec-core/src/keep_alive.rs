//! Keep-alive session state machine.
//!
//! Sends a keep-alive request on every timer tick and degrades its view of
//! the peer as requests go unanswered.
//!
//! # State Machine
//!
//! ```text
//!              response                  > max_unresponded_normal
//! ┌───────────┐ ───────> ┌────────┐ ──────────────────────────> ┌──────────────────┐
//! │ OutOfSync │          │ InSync │                             │ FasterKeepAlives │
//! └───────────┘ <─────── └────────┘ <────────────────────────── └──────────────────┘
//!       ^   > max_unresponded_fast            response                   │
//!       └────────────────────────────────────────────────────────────────┘
//!                              > max_unresponded_fast
//! ```
//!
//! There is no terminal state. Only a keep-alive response resets the
//! unanswered counter.
//!
//! # Timers
//!
//! - **Normal period**: 10 seconds between requests
//! - **Fast period**: 5 seconds while in `FasterKeepAlives`

use std::{
    fmt,
    sync::Arc,
    time::{Duration, Instant},
};

use derec_proto::{KeepAliveRequest, KeepAliveResponse, Message, ProtocolType};

use crate::{
    error::SessionError, peer::PeerId, session::SessionCore, store::ShareVersionStore,
    timer::PeriodicTimer,
};

/// Period between requests while the peer is answering
pub const NORMAL_PERIOD: Duration = Duration::from_secs(10);

/// Period between requests while in [`KeepAliveState::FasterKeepAlives`]
pub const FAST_PERIOD: Duration = Duration::from_secs(5);

/// Unanswered requests tolerated before speeding up
pub const MAX_UNRESPONDED_NORMAL: u32 = 5;

/// Unanswered requests tolerated before declaring the peer out of sync
pub const MAX_UNRESPONDED_FAST: u32 = MAX_UNRESPONDED_NORMAL + 10;

/// Keep-alive liveness state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeepAliveState {
    /// No recent response from the peer
    OutOfSync,
    /// Peer answered recently
    InSync,
    /// Too many unanswered requests; probing at the fast period
    FasterKeepAlives,
}

impl KeepAliveState {
    /// Stable name, used in logs and errors
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::OutOfSync => "OutOfSync",
            Self::InSync => "InSync",
            Self::FasterKeepAlives => "FasterKeepAlives",
        }
    }
}

impl fmt::Display for KeepAliveState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Keep-alive configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeepAliveConfig {
    /// Period between requests in `OutOfSync` and `InSync`
    pub normal_period: Duration,
    /// Period between requests in `FasterKeepAlives`
    pub fast_period: Duration,
    /// Unanswered requests above which the session speeds up
    pub max_unresponded_normal: u32,
    /// Unanswered requests above which the peer is out of sync
    pub max_unresponded_fast: u32,
}

impl Default for KeepAliveConfig {
    fn default() -> Self {
        Self {
            normal_period: NORMAL_PERIOD,
            fast_period: FAST_PERIOD,
            max_unresponded_normal: MAX_UNRESPONDED_NORMAL,
            max_unresponded_fast: MAX_UNRESPONDED_FAST,
        }
    }
}

/// Keep-alive session with one peer.
///
/// The periodic timer starts at construction. Its ticks are delivered by
/// [`KeepAliveSession::poll_timer`], or directly through
/// [`KeepAliveSession::on_timer_tick`].
pub struct KeepAliveSession {
    pub(crate) core: SessionCore,
    peer: PeerId,
    config: KeepAliveConfig,
    state: KeepAliveState,
    unresponded_requests: u32,
    timer: PeriodicTimer,
    store: Arc<dyn ShareVersionStore>,
}

impl KeepAliveSession {
    /// Open a session in `OutOfSync` and start its timer at `now`
    pub fn new(
        peer: PeerId,
        config: KeepAliveConfig,
        store: Arc<dyn ShareVersionStore>,
        now: Instant,
    ) -> Self {
        let timer = PeriodicTimer::start(now, config.normal_period);
        Self {
            core: SessionCore::new(),
            peer,
            config,
            state: KeepAliveState::OutOfSync,
            unresponded_requests: 0,
            timer,
            store,
        }
    }

    /// Remote party
    pub fn peer(&self) -> PeerId {
        self.peer
    }

    /// Current liveness state
    pub fn state(&self) -> KeepAliveState {
        self.state
    }

    /// Requests sent since the last response
    pub fn unresponded_requests(&self) -> u32 {
        self.unresponded_requests
    }

    /// True until [`KeepAliveSession::stop_periodic_timer`] is called
    pub fn timer_running(&self) -> bool {
        self.timer.is_running()
    }

    /// When the next tick is due, or `None` once the timer is stopped
    pub fn next_tick(&self) -> Option<Instant> {
        self.timer.next_due()
    }

    /// Handle one timer tick: queue a request and re-evaluate the state
    pub fn on_timer_tick(&mut self) {
        self.core.activate();
        self.core.enqueue(KeepAliveRequest::new());
        self.unresponded_requests = self.unresponded_requests.saturating_add(1);

        let next = if self.unresponded_requests > self.config.max_unresponded_fast {
            KeepAliveState::OutOfSync
        } else if self.unresponded_requests > self.config.max_unresponded_normal {
            KeepAliveState::FasterKeepAlives
        } else {
            self.state
        };
        self.transition(next);
    }

    /// Fire every tick due at `now`. Returns the number fired.
    ///
    /// Never fires once the timer is stopped.
    pub fn poll_timer(&mut self, now: Instant) -> usize {
        let mut fired = 0;
        while self.timer.poll(now) {
            self.on_timer_tick();
            fired += 1;
        }
        fired
    }

    /// Stop the periodic timer. Idempotent; the protocol status is unchanged.
    pub fn stop_periodic_timer(&mut self) {
        if self.timer.is_running() {
            tracing::debug!(peer = %self.peer, "keep-alive timer stopped");
        }
        self.timer.stop();
    }

    /// Apply an inbound message.
    ///
    /// - other protocols: `Ok(false)`, no side effects
    /// - request: answered with the peer's stored share version, if known
    /// - response: back to `InSync`, unanswered counter reset
    pub fn process_message(&mut self, message: &Message) -> Result<bool, SessionError> {
        if message.protocol_type() != ProtocolType::KeepAlive {
            return Ok(false);
        }

        match message {
            Message::KeepAliveRequest(_) => {
                let known = self.store.share_version(self.peer)?;
                self.core.activate();
                match known {
                    Some(version) => self.core.enqueue(KeepAliveResponse::new(version)),
                    None => {
                        tracing::trace!(peer = %self.peer, "no share version known, not answering");
                    },
                }
            },
            Message::KeepAliveResponse(response) => {
                self.core.activate();
                tracing::trace!(
                    peer = %self.peer,
                    stored_share_version = response.stored_share_version(),
                    "keep-alive response"
                );
                self.unresponded_requests = 0;
                self.transition(KeepAliveState::InSync);
            },
            other => {
                return Err(SessionError::UnexpectedMessageType {
                    state: self.state.as_str(),
                    message_type: other.message_type(),
                });
            },
        }
        Ok(true)
    }

    fn transition(&mut self, next: KeepAliveState) {
        if next == self.state {
            return;
        }
        tracing::debug!(
            peer = %self.peer,
            from = %self.state,
            to = %next,
            unresponded = self.unresponded_requests,
            "keep-alive state change"
        );
        self.state = next;

        let period = match next {
            KeepAliveState::FasterKeepAlives => self.config.fast_period,
            KeepAliveState::OutOfSync | KeepAliveState::InSync => self.config.normal_period,
        };
        self.timer.set_period(period);
    }
}

impl fmt::Debug for KeepAliveSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeepAliveSession")
            .field("peer", &self.peer)
            .field("status", &self.core.status())
            .field("state", &self.state)
            .field("unresponded_requests", &self.unresponded_requests)
            .field("timer", &self.timer)
            .finish_non_exhaustive()
    }
}
