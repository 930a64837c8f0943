//! In-memory transport between session managers.
//!
//! Each node is a [`SessionManager`] with its own share version store.
//! Outbound messages are encoded, queued as [`Datagram`]s and delivered in
//! FIFO order when the test asks for it. Sealed messages use a per-link
//! ChaCha20-Poly1305 key drawn from the seeded RNG; the nonce travels next to
//! the bytes, the way a real transport frame would carry it.
//!
//! While two nodes are partitioned, datagrams between them are dropped.

use std::{
    collections::{BTreeMap, BTreeSet, VecDeque},
    time::Duration,
};

use derec_core::{
    Environment, MemoryShareVersionStore, Outbound, PeerId, SessionConfig, SessionError,
    SessionManager,
};
use derec_proto::{ChaChaCipher, Envelope, ProtocolType};
use thiserror::Error;

use crate::SimEnv;

/// Errors raised while driving a world
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WorldError {
    /// No node with this id was added
    #[error("unknown node: {0}")]
    UnknownNode(PeerId),

    /// The sending node's session manager failed
    #[error(transparent)]
    Session(#[from] SessionError),
}

/// Encoded message in flight
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Datagram {
    /// Sender
    pub from: PeerId,
    /// Receiver
    pub to: PeerId,
    /// Nonce the message was sealed with
    pub nonce: [u8; ChaChaCipher::NONCE_SIZE],
    /// Wire bytes
    pub bytes: Vec<u8>,
}

/// Deterministic network of session managers.
pub struct World {
    env: SimEnv,
    nodes: BTreeMap<PeerId, SessionManager<MemoryShareVersionStore>>,
    links: BTreeMap<(PeerId, PeerId), ChaChaCipher>,
    in_flight: VecDeque<Datagram>,
    partitions: BTreeSet<(PeerId, PeerId)>,
    delivered: usize,
    dropped: usize,
    errors: Vec<(PeerId, SessionError)>,
}

impl World {
    /// Empty world driven by `env`
    pub fn new(env: SimEnv) -> Self {
        Self {
            env,
            nodes: BTreeMap::new(),
            links: BTreeMap::new(),
            in_flight: VecDeque::new(),
            partitions: BTreeSet::new(),
            delivered: 0,
            dropped: 0,
            errors: Vec::new(),
        }
    }

    /// Add a node with `config`
    pub fn add_node(&mut self, peer: PeerId, config: SessionConfig) {
        self.nodes.insert(peer, SessionManager::new(config, MemoryShareVersionStore::new()));
    }

    /// Environment driving this world
    pub fn env(&self) -> &SimEnv {
        &self.env
    }

    /// Session manager of `peer`
    pub fn node(&self, peer: PeerId) -> Option<&SessionManager<MemoryShareVersionStore>> {
        self.nodes.get(&peer)
    }

    /// Mutable session manager of `peer`
    pub fn node_mut(
        &mut self,
        peer: PeerId,
    ) -> Option<&mut SessionManager<MemoryShareVersionStore>> {
        self.nodes.get_mut(&peer)
    }

    /// Datagrams waiting for delivery
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Datagrams delivered so far
    pub fn delivered(&self) -> usize {
        self.delivered
    }

    /// Datagrams dropped by partitions so far
    pub fn dropped(&self) -> usize {
        self.dropped
    }

    /// Errors raised by receivers, in delivery order
    pub fn errors(&self) -> &[(PeerId, SessionError)] {
        &self.errors
    }

    /// Drop all traffic between `a` and `b` until healed
    pub fn partition(&mut self, a: PeerId, b: PeerId) {
        tracing::debug!(%a, %b, "partition");
        self.partitions.insert(link_key(a, b));
    }

    /// Restore traffic between `a` and `b`
    pub fn heal(&mut self, a: PeerId, b: PeerId) {
        tracing::debug!(%a, %b, "heal");
        self.partitions.remove(&link_key(a, b));
    }

    /// Open a session on `from` towards `to` and send what it queued
    pub fn start(
        &mut self,
        from: PeerId,
        to: PeerId,
        protocol: ProtocolType,
    ) -> Result<(), WorldError> {
        let now = self.env.now();
        let outbound = self.manager(from)?.start(to, protocol, now)?;
        self.submit(from, outbound)
    }

    /// Have `from` start pairing with `to`
    pub fn begin_pairing(&mut self, from: PeerId, to: PeerId) -> Result<(), WorldError> {
        let now = self.env.now();
        let nonce = self.env.random_u8();
        let outbound = self.manager(from)?.begin_pairing(to, nonce, now)?;
        self.submit(from, outbound)
    }

    /// Have `from` send a lockbox share to `to`
    pub fn send_share(
        &mut self,
        from: PeerId,
        to: PeerId,
        share_version: u16,
        share: &[u8],
    ) -> Result<(), WorldError> {
        let now = self.env.now();
        let outbound = self.manager(from)?.send_share(to, share_version, share, now)?;
        self.submit(from, outbound)
    }

    /// Advance the clock, fire due timers on every node, and queue the results
    pub fn advance(&mut self, duration: Duration) -> Result<(), WorldError> {
        self.env.advance(duration);
        let now = self.env.now();

        let mut queued = Vec::new();
        for (peer, manager) in &mut self.nodes {
            queued.push((*peer, manager.poll_timers(now)));
        }
        for (peer, outbound) in queued {
            self.submit(peer, outbound)?;
        }
        Ok(())
    }

    /// Deliver the oldest datagram. Returns false if nothing was in flight.
    ///
    /// Receiver errors are recorded in [`World::errors`], not returned.
    pub fn deliver_one(&mut self) -> Result<bool, WorldError> {
        let Some(datagram) = self.in_flight.pop_front() else {
            return Ok(false);
        };

        if self.partitions.contains(&link_key(datagram.from, datagram.to)) {
            tracing::trace!(from = %datagram.from, to = %datagram.to, "dropped by partition");
            self.dropped += 1;
            return Ok(true);
        }

        let now = self.env.now();
        let key = link_key(datagram.from, datagram.to);
        self.ensure_link(key);
        let cipher = self.links.get(&key);
        let receiver = self.nodes.get_mut(&datagram.to);
        let (Some(cipher), Some(receiver)) = (cipher, receiver) else {
            self.dropped += 1;
            return Ok(true);
        };

        let envelope = Envelope::new(cipher, &datagram.nonce);
        let result = receiver.handle_inbound(datagram.from, &datagram.bytes, Some(envelope), now);
        self.delivered += 1;

        match result {
            Ok(outbound) => self.submit(datagram.to, outbound)?,
            Err(err) => {
                tracing::debug!(to = %datagram.to, error = %err, "receiver rejected datagram");
                self.errors.push((datagram.to, err));
            },
        }
        Ok(true)
    }

    /// Deliver until nothing is in flight. Returns the number of datagrams
    /// taken off the queue.
    pub fn deliver_all(&mut self) -> Result<usize, WorldError> {
        let mut count = 0;
        while self.deliver_one()? {
            count += 1;
        }
        Ok(count)
    }

    /// Remove every datagram in flight, for inspection or tampering
    pub fn take_in_flight(&mut self) -> Vec<Datagram> {
        self.in_flight.drain(..).collect()
    }

    /// Queue raw datagrams behind whatever is in flight
    pub fn inject(&mut self, datagrams: impl IntoIterator<Item = Datagram>) {
        self.in_flight.extend(datagrams);
    }

    /// Encode `outbound` from `from` and queue it
    pub fn submit(&mut self, from: PeerId, outbound: Vec<Outbound>) -> Result<(), WorldError> {
        for message in outbound {
            let nonce = self.env.random_nonce::<{ ChaChaCipher::NONCE_SIZE }>();
            let key = link_key(from, message.peer);
            self.ensure_link(key);
            let Some(cipher) = self.links.get(&key) else {
                continue;
            };
            let bytes = message.encode(Some(Envelope::new(cipher, &nonce)))?;
            tracing::trace!(
                %from,
                to = %message.peer,
                message_type = ?message.message.message_type(),
                len = bytes.len(),
                "queued"
            );
            self.in_flight.push_back(Datagram { from, to: message.peer, nonce, bytes });
        }
        Ok(())
    }

    /// Create the cipher for a link on first use
    fn ensure_link(&mut self, key: (PeerId, PeerId)) {
        if !self.links.contains_key(&key) {
            let secret = self.env.random_nonce::<{ ChaChaCipher::KEY_SIZE }>();
            self.links.insert(key, ChaChaCipher::new(&secret));
        }
    }

    fn manager(
        &mut self,
        peer: PeerId,
    ) -> Result<&mut SessionManager<MemoryShareVersionStore>, WorldError> {
        self.nodes.get_mut(&peer).ok_or(WorldError::UnknownNode(peer))
    }
}

fn link_key(a: PeerId, b: PeerId) -> (PeerId, PeerId) {
    if a <= b { (a, b) } else { (b, a) }
}
