//! DeRec protocol core logic
//!
//! Session state machines for the DeRec social recovery protocols, decoupled
//! from I/O. Sessions receive typed messages and explicit time, queue the
//! messages they want to send, and never touch a socket or a clock.
//!
//! # Architecture
//!
//! Inbound bytes are decoded by `derec-proto` into a [`Message`]. The
//! [`SessionManager`] routes it to the open session for the sender and its
//! protocol, or asks the [`ProtocolDispatcher`] whether it starts a new
//! conversation. Whatever the session queued comes back as [`Outbound`]
//! messages for the caller to encode and send.
//!
//! Timers are explicit too: the caller polls them with the current time and
//! each due tick is delivered to the session as an event.
//!
//! # Components
//!
//! - [`session`]: the session enum and its shared status/outbox contract
//! - [`keep_alive`]: liveness state machine
//! - [`pairing`]: pairing exchange
//! - [`lockbox`]: lockbox share distribution
//! - [`dispatcher`]: opens sessions
//! - [`manager`]: routes messages to sessions
//! - [`store`]: shared peer to share version table
//! - [`timer`]: explicitly polled periodic timer
//! - [`mod@env`]: environment abstraction (time, RNG)
//! - [`error`]: session and store error types
//!
//! [`Message`]: derec_proto::Message

pub mod dispatcher;
pub mod env;
pub mod error;
pub mod keep_alive;
pub mod lockbox;
pub mod manager;
pub mod pairing;
pub mod peer;
pub mod session;
pub mod store;
pub mod timer;

pub use dispatcher::{ProtocolDispatcher, SessionConfig};
pub use env::Environment;
pub use error::{SessionError, StoreError};
pub use keep_alive::{KeepAliveConfig, KeepAliveSession, KeepAliveState};
pub use lockbox::LockboxSession;
pub use manager::{Outbound, SessionManager};
pub use pairing::{PairingProfile, PairingRole, PairingSession, PairingStage, PeerContact};
pub use peer::PeerId;
pub use session::Session;
pub use store::{MemoryShareVersionStore, ShareVersionStore};
