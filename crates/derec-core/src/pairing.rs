//! Pairing session.
//!
//! Carries the three pairing messages between an initiator and a responder.
//! Key agreement itself is out of scope: the session exchanges contact
//! details and ephemeral public keys and leaves deriving the session key to
//! the caller.
//!
//! ```text
//! Initiator                         Responder
//!   begin() ── PairingRequest ────────> (session starts)
//!           <── PairingResponse (sealed)
//!   DoneSuccess ── PairingAck (sealed) ─> DoneSuccess
//! ```
//!
//! A pairing message in the wrong stage fails the session (`DoneFailure`).
//! Any pairing message after the session finished is rejected without
//! further change.

use derec_proto::{
    Message, MessageType, OperatingMode, PairingAck, PairingRequest, PairingResponse,
    ProtocolStatus, ProtocolType,
};

use crate::{error::SessionError, peer::PeerId, session::SessionCore};

/// Local details advertised during pairing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairingProfile {
    /// Display name shown to the peer
    pub name: String,
    /// Contact phone number
    pub phone: String,
    /// Ephemeral public key for this pairing
    pub ecdh_public_key: Vec<u8>,
    /// Mode this device is operating in
    pub operating_mode: OperatingMode,
    /// Nonces offered to the peer in a pairing response
    pub nonces: Vec<u8>,
}

impl Default for PairingProfile {
    fn default() -> Self {
        Self {
            name: String::new(),
            phone: String::new(),
            ecdh_public_key: Vec::new(),
            operating_mode: OperatingMode::Normal,
            nonces: Vec::new(),
        }
    }
}

/// Contact details received from the peer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerContact {
    /// Peer's display name
    pub name: String,
    /// Peer's phone number
    pub phone: String,
    /// Peer's ephemeral public key
    pub ecdh_public_key: Vec<u8>,
    /// Peer's operating mode
    pub operating_mode: OperatingMode,
}

/// Which side of the pairing this session plays
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairingRole {
    /// Sent the request
    Initiator,
    /// Answered the request
    Responder,
}

/// Progress through the exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairingStage {
    /// Nothing sent or received yet
    Idle,
    /// Request sent, waiting for the response
    AwaitingResponse,
    /// Response sent, waiting for the ack
    AwaitingAck,
    /// Exchange completed
    Paired,
    /// Exchange aborted by an out-of-order message
    Failed,
}

impl PairingStage {
    /// Stable name, used in logs and errors
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::AwaitingResponse => "AwaitingResponse",
            Self::AwaitingAck => "AwaitingAck",
            Self::Paired => "Paired",
            Self::Failed => "Failed",
        }
    }
}

/// Pairing session with one peer.
#[derive(Debug, Clone)]
pub struct PairingSession {
    pub(crate) core: SessionCore,
    peer: PeerId,
    profile: PairingProfile,
    stage: PairingStage,
    role: Option<PairingRole>,
    counter: u8,
    peer_contact: Option<PeerContact>,
    peer_nonce: Option<u8>,
    peer_nonces: Vec<u8>,
}

impl PairingSession {
    /// Open an idle session
    pub fn new(peer: PeerId, profile: PairingProfile) -> Self {
        Self {
            core: SessionCore::new(),
            peer,
            profile,
            stage: PairingStage::Idle,
            role: None,
            counter: 0,
            peer_contact: None,
            peer_nonce: None,
            peer_nonces: Vec::new(),
        }
    }

    /// Remote party
    pub fn peer(&self) -> PeerId {
        self.peer
    }

    /// Current stage
    pub fn stage(&self) -> PairingStage {
        self.stage
    }

    /// Role, once the session has sent or received its first message
    pub fn role(&self) -> Option<PairingRole> {
        self.role
    }

    /// What the peer told us about itself
    pub fn peer_contact(&self) -> Option<&PeerContact> {
        self.peer_contact.as_ref()
    }

    /// Nonce from the peer's request (responder side)
    pub fn peer_nonce(&self) -> Option<u8> {
        self.peer_nonce
    }

    /// Nonces offered in the peer's response (initiator side)
    pub fn peer_nonces(&self) -> &[u8] {
        &self.peer_nonces
    }

    /// Start pairing as the initiator by queueing a request carrying `nonce`.
    ///
    /// # Errors
    ///
    /// [`SessionError::UnexpectedMessageType`] unless the session is idle.
    pub fn begin(&mut self, nonce: u8) -> Result<(), SessionError> {
        if self.stage != PairingStage::Idle {
            return Err(self.unexpected(MessageType::PairingRequest));
        }

        let request = PairingRequest::new(
            self.next_counter(),
            nonce,
            self.profile.operating_mode,
            self.profile.name.clone(),
            self.profile.phone.clone(),
            self.profile.ecdh_public_key.clone(),
        );
        self.core.enqueue(request);
        self.role = Some(PairingRole::Initiator);
        self.enter(PairingStage::AwaitingResponse);
        self.core.activate();
        Ok(())
    }

    /// Apply an inbound message. Other protocols return `Ok(false)`.
    pub fn process_message(&mut self, message: &Message) -> Result<bool, SessionError> {
        if message.protocol_type() != ProtocolType::Pairing {
            return Ok(false);
        }

        if self.core.status().is_terminal() {
            return Err(self.unexpected(message.message_type()));
        }

        match (self.stage, message) {
            (PairingStage::Idle, Message::PairingRequest(request)) => {
                self.peer_contact = Some(PeerContact {
                    name: request.name().to_owned(),
                    phone: request.phone().to_owned(),
                    ecdh_public_key: request.ecdh_public_key().to_vec(),
                    operating_mode: request.operating_mode(),
                });
                self.peer_nonce = Some(request.nonce());

                let response = PairingResponse::new(
                    self.next_counter(),
                    self.profile.nonces.clone(),
                    self.profile.operating_mode,
                    self.profile.name.clone(),
                    self.profile.phone.clone(),
                    self.profile.ecdh_public_key.clone(),
                );
                self.core.enqueue(response);
                self.role = Some(PairingRole::Responder);
                self.core.activate();
                self.enter(PairingStage::AwaitingAck);
            },
            (PairingStage::AwaitingResponse, Message::PairingResponse(response)) => {
                self.peer_contact = Some(PeerContact {
                    name: response.name().to_owned(),
                    phone: response.phone().to_owned(),
                    ecdh_public_key: response.ecdh_public_key().to_vec(),
                    operating_mode: response.operating_mode(),
                });
                self.peer_nonces = response.nonces().to_vec();

                self.core.enqueue(PairingAck::new());
                self.finish(PairingStage::Paired, ProtocolStatus::DoneSuccess);
            },
            (PairingStage::AwaitingAck, Message::PairingAck(_)) => {
                self.finish(PairingStage::Paired, ProtocolStatus::DoneSuccess);
            },
            (_, other) => {
                let err = self.unexpected(other.message_type());
                tracing::warn!(peer = %self.peer, error = %err, "pairing aborted");
                self.finish(PairingStage::Failed, ProtocolStatus::DoneFailure);
                return Err(err);
            },
        }
        Ok(true)
    }

    fn next_counter(&mut self) -> u8 {
        let counter = self.counter;
        self.counter = self.counter.wrapping_add(1);
        counter
    }

    fn enter(&mut self, stage: PairingStage) {
        tracing::debug!(
            peer = %self.peer,
            from = self.stage.as_str(),
            to = stage.as_str(),
            "pairing stage"
        );
        self.stage = stage;
    }

    fn finish(&mut self, stage: PairingStage, status: ProtocolStatus) {
        self.enter(stage);
        self.core.set_status(status);
    }

    fn unexpected(&self, message_type: MessageType) -> SessionError {
        SessionError::UnexpectedMessageType { state: self.stage.as_str(), message_type }
    }
}
