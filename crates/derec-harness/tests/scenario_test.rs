//! End-to-end scenarios between simulated peers.
//!
//! Every scenario runs two session managers over the in-memory [`World`]
//! transport with a seeded environment, so failures reproduce exactly.

use std::time::Duration;

use derec_core::{
    KeepAliveState, PairingProfile, PairingRole, PairingStage, PeerId, SessionConfig,
    SessionError, ShareVersionStore,
    keep_alive::{FAST_PERIOD, NORMAL_PERIOD},
};
use derec_harness::{SimEnv, World};
use derec_proto::{OperatingMode, ProtocolError, ProtocolStatus, ProtocolType};
use tracing_subscriber::EnvFilter;

const ALICE: PeerId = PeerId(0xA11CE);
const BOB: PeerId = PeerId(0xB0B);

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn config(name: &str, phone: &str, key_byte: u8) -> SessionConfig {
    SessionConfig {
        pairing: PairingProfile {
            name: name.to_owned(),
            phone: phone.to_owned(),
            ecdh_public_key: vec![key_byte; 32],
            operating_mode: OperatingMode::Normal,
            nonces: vec![key_byte, key_byte.wrapping_add(1)],
        },
        ..SessionConfig::default()
    }
}

fn world(seed: u64) -> World {
    init_tracing();
    let mut world = World::new(SimEnv::with_seed(seed));
    world.add_node(ALICE, config("Alice", "4081111111", 0xAA));
    world.add_node(BOB, config("Bob", "4082222222", 0xBB));
    world
}

fn keep_alive_state(world: &World, owner: PeerId, peer: PeerId) -> Option<KeepAliveState> {
    world
        .node(owner)?
        .session(peer, ProtocolType::KeepAlive)?
        .as_keep_alive()
        .map(|session| session.state())
}

#[test]
fn pairing_completes_on_both_sides() {
    let mut world = world(1);

    world.begin_pairing(ALICE, BOB).unwrap();
    // request, sealed response, sealed ack
    assert_eq!(world.deliver_all().unwrap(), 3);
    assert!(world.errors().is_empty(), "{:?}", world.errors());

    let alice = world.node(ALICE).unwrap().session(BOB, ProtocolType::Pairing).unwrap();
    let bob = world.node(BOB).unwrap().session(ALICE, ProtocolType::Pairing).unwrap();
    assert_eq!(alice.protocol_status(), ProtocolStatus::DoneSuccess);
    assert_eq!(bob.protocol_status(), ProtocolStatus::DoneSuccess);

    let alice = alice.as_pairing().unwrap();
    let bob = bob.as_pairing().unwrap();
    assert_eq!(alice.role(), Some(PairingRole::Initiator));
    assert_eq!(bob.role(), Some(PairingRole::Responder));
    assert_eq!(alice.stage(), PairingStage::Paired);
    assert_eq!(alice.peer_contact().map(|c| c.name.as_str()), Some("Bob"));
    assert_eq!(bob.peer_contact().map(|c| c.phone.as_str()), Some("4081111111"));
    assert_eq!(alice.peer_nonces(), &[0xBB, 0xBC]);
}

#[test]
fn keep_alive_round_trip_brings_peer_in_sync() {
    let mut world = world(2);

    // Bob knows which share version Alice holds, so he can answer her.
    world.node(BOB).unwrap().store().record_share_version(ALICE, 34).unwrap();
    world.start(ALICE, BOB, ProtocolType::KeepAlive).unwrap();
    assert_eq!(keep_alive_state(&world, ALICE, BOB), Some(KeepAliveState::OutOfSync));

    world.advance(Duration::from_secs(10)).unwrap();
    world.deliver_all().unwrap();

    assert_eq!(keep_alive_state(&world, ALICE, BOB), Some(KeepAliveState::InSync));
    // Bob's side was opened by Alice's request.
    assert!(world.node(BOB).unwrap().session(ALICE, ProtocolType::KeepAlive).is_some());
}

#[test]
fn partition_degrades_then_heal_recovers() {
    let mut world = world(3);
    world.node(BOB).unwrap().store().record_share_version(ALICE, 1).unwrap();
    world.start(ALICE, BOB, ProtocolType::KeepAlive).unwrap();

    world.advance(Duration::from_secs(10)).unwrap();
    world.deliver_all().unwrap();
    assert_eq!(keep_alive_state(&world, ALICE, BOB), Some(KeepAliveState::InSync));

    world.partition(ALICE, BOB);
    for _ in 0..6 {
        world.advance(NORMAL_PERIOD).unwrap();
        world.deliver_all().unwrap();
    }
    assert_eq!(keep_alive_state(&world, ALICE, BOB), Some(KeepAliveState::FasterKeepAlives));

    // The tick already scheduled lands a normal period later and fast ticks
    // follow. Nine more reach the fast threshold; the tenth crosses it.
    world.advance(NORMAL_PERIOD).unwrap();
    world.deliver_all().unwrap();
    for _ in 0..8 {
        world.advance(FAST_PERIOD).unwrap();
        world.deliver_all().unwrap();
    }
    assert_eq!(keep_alive_state(&world, ALICE, BOB), Some(KeepAliveState::FasterKeepAlives));

    world.advance(FAST_PERIOD).unwrap();
    world.deliver_all().unwrap();
    assert_eq!(keep_alive_state(&world, ALICE, BOB), Some(KeepAliveState::OutOfSync));
    assert!(world.dropped() > 0);

    world.heal(ALICE, BOB);
    world.advance(Duration::from_secs(10)).unwrap();
    world.deliver_all().unwrap();
    assert_eq!(keep_alive_state(&world, ALICE, BOB), Some(KeepAliveState::InSync));
}

#[test]
fn share_update_feeds_keep_alive_answers() {
    let mut world = world(4);

    // Bob must expect share traffic from Alice before it arrives.
    world.start(BOB, ALICE, ProtocolType::LockboxSharesUpdate).unwrap();
    world.send_share(ALICE, BOB, 5, &[0xde, 0xad, 0xbe, 0xef]).unwrap();
    world.deliver_all().unwrap();

    assert_eq!(world.node(BOB).unwrap().store().share_version(ALICE), Ok(Some(5)));
    assert_eq!(world.node(ALICE).unwrap().store().share_version(BOB), Ok(Some(5)));
    let owner = world.node(ALICE).unwrap().session(BOB, ProtocolType::LockboxSharesUpdate);
    assert_eq!(owner.map(|s| s.protocol_status()), Some(ProtocolStatus::DoneSuccess));

    world.start(ALICE, BOB, ProtocolType::KeepAlive).unwrap();
    world.advance(Duration::from_secs(10)).unwrap();
    world.deliver_all().unwrap();
    assert_eq!(keep_alive_state(&world, ALICE, BOB), Some(KeepAliveState::InSync));
}

#[test]
fn unsolicited_share_is_discarded() {
    let mut world = world(5);

    world.send_share(ALICE, BOB, 9, &[1]).unwrap();
    world.deliver_all().unwrap();

    assert_eq!(world.node(BOB).unwrap().store().share_version(ALICE), Ok(None));
    assert!(world.node(BOB).unwrap().session(ALICE, ProtocolType::LockboxSharesUpdate).is_none());
}

#[test]
fn stray_response_fails_the_pairing_session() {
    let mut world = world(6);

    world.begin_pairing(ALICE, BOB).unwrap();
    world.deliver_one().unwrap();
    // Bob's response is in flight. Alice closes and restarts, so the response
    // lands on a session that never sent a request.
    world.node_mut(ALICE).unwrap().close(BOB, ProtocolType::Pairing);
    world.start(ALICE, BOB, ProtocolType::Pairing).unwrap();
    world.deliver_all().unwrap();

    assert!(matches!(
        world.errors(),
        [(peer, SessionError::UnexpectedMessageType { state: "Idle", .. })] if *peer == ALICE
    ));
    let alice = world.node(ALICE).unwrap().session(BOB, ProtocolType::Pairing).unwrap();
    assert_eq!(alice.protocol_status(), ProtocolStatus::DoneFailure);
}

#[test]
fn tampered_datagram_is_rejected() {
    let mut world = world(7);

    world.begin_pairing(ALICE, BOB).unwrap();
    world.deliver_one().unwrap();
    assert_eq!(world.in_flight(), 1);

    // Flip a bit in the tag of Bob's sealed response before Alice sees it.
    let mut datagrams = world.take_in_flight();
    let last = datagrams[0].bytes.len() - 1;
    datagrams[0].bytes[last] ^= 0x01;
    world.inject(datagrams);
    world.deliver_all().unwrap();

    assert_eq!(
        world.errors(),
        &[(ALICE, SessionError::Protocol(ProtocolError::AuthenticationFailed))]
    );
    let alice = world.node(ALICE).unwrap().session(BOB, ProtocolType::Pairing).unwrap();
    assert_eq!(alice.protocol_status(), ProtocolStatus::Active);
}

#[test]
fn same_seed_same_traffic() {
    fn run(seed: u64) -> Vec<Vec<u8>> {
        let mut world = world(seed);
        world.begin_pairing(ALICE, BOB).unwrap();
        world.deliver_one().unwrap();
        world.take_in_flight().into_iter().map(|d| d.bytes).collect()
    }

    assert_eq!(run(11), run(11));
    assert_ne!(run(11), run(12));
}
