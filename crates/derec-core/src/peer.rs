//! Peer identity.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifies the remote party of a session.
///
/// Opaque to this crate: the caller maps its transport addresses or contact
/// records onto peer ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PeerId(pub u64);

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

impl From<u64> for PeerId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}
