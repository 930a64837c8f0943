//! Share version store.
//!
//! Tracks, per peer, the newest lockbox share version that peer is known to
//! hold. Lockbox-update sessions write it; keep-alive sessions read it to
//! answer requests. One store is shared by every session of a local identity.
//!
//! Durable persistence is the caller's job. [`MemoryShareVersionStore`] can
//! export and restore a CBOR snapshot for that purpose.

use std::{
    collections::{BTreeMap, HashMap},
    sync::{Arc, Mutex, MutexGuard},
};

use serde::{Deserialize, Serialize};

use crate::{error::StoreError, peer::PeerId};

/// Peer to share version table.
///
/// # Invariants
///
/// - Versions only advance: `record_share_version` with a version at or below
///   the stored one leaves the table unchanged.
/// - Concurrent readers and writers never lose the highest recorded version.
pub trait ShareVersionStore: Send + Sync {
    /// Newest known share version for `peer`
    fn share_version(&self, peer: PeerId) -> Result<Option<u16>, StoreError>;

    /// Record `version` for `peer`. Returns true if the table changed.
    fn record_share_version(&self, peer: PeerId, version: u16) -> Result<bool, StoreError>;
}

/// In-memory store, cloneable and shared across sessions.
///
/// Clones share the same table.
#[derive(Debug, Clone, Default)]
pub struct MemoryShareVersionStore {
    inner: Arc<Mutex<HashMap<PeerId, u16>>>,
}

/// Serialized form of a store. Ordered so equal tables encode identically.
#[derive(Debug, Serialize, Deserialize)]
struct Snapshot {
    versions: BTreeMap<PeerId, u16>,
}

impl MemoryShareVersionStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of peers with a recorded version
    pub fn len(&self) -> Result<usize, StoreError> {
        Ok(self.lock()?.len())
    }

    /// True if no version has been recorded
    pub fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.lock()?.is_empty())
    }

    /// Encode the table as CBOR
    pub fn snapshot(&self) -> Result<Vec<u8>, StoreError> {
        let versions = self.lock()?.iter().map(|(peer, version)| (*peer, *version)).collect();

        let mut bytes = Vec::new();
        ciborium::into_writer(&Snapshot { versions }, &mut bytes)
            .map_err(|e| StoreError::Snapshot(e.to_string()))?;
        Ok(bytes)
    }

    /// Rebuild a store from [`MemoryShareVersionStore::snapshot`] output
    pub fn restore(bytes: &[u8]) -> Result<Self, StoreError> {
        let snapshot: Snapshot =
            ciborium::from_reader(bytes).map_err(|e| StoreError::Snapshot(e.to_string()))?;

        Ok(Self { inner: Arc::new(Mutex::new(snapshot.versions.into_iter().collect())) })
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<PeerId, u16>>, StoreError> {
        self.inner.lock().map_err(|_| StoreError::Poisoned)
    }
}

impl ShareVersionStore for MemoryShareVersionStore {
    fn share_version(&self, peer: PeerId) -> Result<Option<u16>, StoreError> {
        Ok(self.lock()?.get(&peer).copied())
    }

    fn record_share_version(&self, peer: PeerId, version: u16) -> Result<bool, StoreError> {
        let mut table = self.lock()?;
        match table.get(&peer) {
            Some(&current) if current >= version => Ok(false),
            _ => {
                table.insert(peer, version);
                Ok(true)
            },
        }
    }
}

impl<S: ShareVersionStore + ?Sized> ShareVersionStore for Arc<S> {
    fn share_version(&self, peer: PeerId) -> Result<Option<u16>, StoreError> {
        (**self).share_version(peer)
    }

    fn record_share_version(&self, peer: PeerId, version: u16) -> Result<bool, StoreError> {
        (**self).record_share_version(peer, version)
    }
}
