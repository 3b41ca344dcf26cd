//! Integration tests for the resend coordinator and send paths.
//!
//! All tests are deterministic and synchronous; the transport is a
//! mock that records every send.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use dlcsync_node::coordinator::{ConnState, ResendCoordinator, ResendOutcome};
use dlcsync_node::gate::PeerGates;
use dlcsync_node::incoming::handle_inbound;
use dlcsync_node::outgoing::send_outbound;
use dlcsync_node::transport::Transport;
use dlcsync_storage::engine::StorageEngine;
use dlcsync_storage::messages::{MessageLog, NewMessage, RecordOutcome};
use dlcsync_storage::outbound::OutboundCursor;
use dlcsync_types::config::SyncConfig;
use dlcsync_types::{Direction, DlcSyncError, MessageHash, PeerId, Result};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

static COUNTER: AtomicU32 = AtomicU32::new(0);

/// Returns a unique temporary directory for each test.
fn temp_dir() -> PathBuf {
    let id = COUNTER.fetch_add(1, Ordering::SeqCst);
    let dir = std::env::temp_dir().join(format!(
        "dlcsync-coord-test-{}-{}-{}",
        std::process::id(),
        id,
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0),
    ));
    let _ = std::fs::create_dir_all(&dir);
    dir
}

fn cleanup(path: &PathBuf) {
    let _ = std::fs::remove_dir_all(path);
}

fn peer(id: &str) -> PeerId {
    PeerId::new(id).unwrap()
}

fn hash(h: &str) -> MessageHash {
    MessageHash::new(h).unwrap()
}

fn outbound(h: &str, p: &str, kind: &str) -> NewMessage {
    NewMessage {
        hash: hash(h),
        direction: Direction::Outbound,
        peer_id: peer(p),
        message_type: kind.to_string(),
        message_sub_type: String::new(),
    }
}

/// Transport mock recording every send; can be switched to fail.
struct MockTransport {
    sent: Mutex<Vec<(PeerId, Vec<u8>)>>,
    fail: AtomicBool,
}

impl MockTransport {
    fn new() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail: AtomicBool::new(false),
        }
    }

    fn sent(&self) -> Vec<(PeerId, Vec<u8>)> {
        self.sent.lock().unwrap().clone()
    }

    fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }
}

impl Transport for MockTransport {
    fn send(&self, peer_id: &PeerId, body: &[u8]) -> Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(DlcSyncError::Transport {
                reason: "mock transport down".into(),
            });
        }
        self.sent.lock().unwrap().push((peer_id.clone(), body.to_vec()));
        Ok(())
    }
}

/// Opens the full fixture: engine, log, coordinator, gates, transport.
fn fixture(dir: &PathBuf) -> (MessageLog, ResendCoordinator, PeerGates, MockTransport) {
    let engine = StorageEngine::open(dir, &SyncConfig::default()).unwrap();
    let log = MessageLog::new(Arc::clone(&engine)).unwrap();
    let cursor = OutboundCursor::new(engine).unwrap();
    (
        log,
        ResendCoordinator::new(cursor),
        PeerGates::new(),
        MockTransport::new(),
    )
}

// ===========================================================================
// 1. Connect with nothing pending
// ===========================================================================

#[test]
fn connect_with_no_pointer_goes_idle() {
    let dir = temp_dir();
    let (_log, coordinator, gates, transport) = fixture(&dir);
    let p = peer("peerA");

    assert_eq!(coordinator.state(&p), ConnState::Disconnected);

    let outcome = coordinator.on_peer_connected(&p, &gates, &transport).unwrap();
    assert_eq!(outcome, ResendOutcome::NothingPending);
    assert_eq!(coordinator.state(&p), ConnState::Idle);
    assert!(transport.sent().is_empty());

    cleanup(&dir);
}

// ===========================================================================
// 2. Resend determinism
// ===========================================================================

#[test]
fn connect_resends_pointer_exactly_once() {
    let dir = temp_dir();
    let (log, coordinator, gates, transport) = fixture(&dir);
    let p = peer("peerA");

    log.record_outbound(&outbound("42", "peerA", "offer"), b"offer-body")
        .unwrap();

    let outcome = coordinator.on_peer_connected(&p, &gates, &transport).unwrap();
    assert_eq!(
        outcome,
        ResendOutcome::Resent {
            message_hash: hash("42")
        }
    );
    assert_eq!(coordinator.state(&p), ConnState::AwaitingAck);

    let sent = transport.sent();
    assert_eq!(sent.len(), 1, "exactly one transmission per connect");
    assert_eq!(sent[0].0, p);
    assert_eq!(sent[0].1, b"offer-body");

    cleanup(&dir);
}

#[test]
fn flapping_link_resends_once_per_connect() {
    let dir = temp_dir();
    let (log, coordinator, gates, transport) = fixture(&dir);
    let p = peer("peerA");

    log.record_outbound(&outbound("42", "peerA", "offer"), b"offer-body")
        .unwrap();

    for _ in 0..3 {
        coordinator.on_peer_connected(&p, &gates, &transport).unwrap();
        coordinator.on_peer_disconnected(&p);
        assert_eq!(coordinator.state(&p), ConnState::Disconnected);
    }

    // One send per connect event, never more.
    assert_eq!(transport.sent().len(), 3);
    assert!(coordinator.cursor().get(&p).unwrap().is_some());

    cleanup(&dir);
}

// ===========================================================================
// 3. Implicit acknowledgement
// ===========================================================================

#[test]
fn inbound_is_implicit_ack() {
    let dir = temp_dir();
    let (log, coordinator, gates, transport) = fixture(&dir);
    let p = peer("peerA");

    log.record_outbound(&outbound("42", "peerA", "offer"), b"offer-body")
        .unwrap();
    coordinator.on_peer_connected(&p, &gates, &transport).unwrap();
    assert_eq!(coordinator.state(&p), ConnState::AwaitingAck);

    let outcome = handle_inbound(
        &log,
        &coordinator,
        &p,
        hash("100"),
        "accept".into(),
        String::new(),
    )
    .unwrap();
    assert_eq!(outcome, RecordOutcome::Inserted);
    assert_eq!(coordinator.state(&p), ConnState::Idle);

    cleanup(&dir);
}

#[test]
fn duplicate_inbound_still_acks() {
    let dir = temp_dir();
    let (log, coordinator, gates, transport) = fixture(&dir);
    let p = peer("peerA");

    // The peer already sent message 100 on a previous connection.
    handle_inbound(&log, &coordinator, &p, hash("100"), "accept".into(), String::new()).unwrap();

    log.record_outbound(&outbound("42", "peerA", "sign"), b"sign-body")
        .unwrap();
    coordinator.on_peer_connected(&p, &gates, &transport).unwrap();
    assert_eq!(coordinator.state(&p), ConnState::AwaitingAck);

    // Replay of 100: recorded as duplicate, but still proves liveness.
    let outcome = handle_inbound(
        &log,
        &coordinator,
        &p,
        hash("100"),
        "accept".into(),
        String::new(),
    )
    .unwrap();
    assert_eq!(outcome, RecordOutcome::AlreadyRecorded);
    assert_eq!(coordinator.state(&p), ConnState::Idle);

    cleanup(&dir);
}

#[test]
fn inbound_outside_awaiting_ack_is_noop() {
    let dir = temp_dir();
    let (_log, coordinator, _gates, _transport) = fixture(&dir);
    let p = peer("peerA");

    coordinator.on_inbound(&p);
    assert_eq!(coordinator.state(&p), ConnState::Disconnected);

    cleanup(&dir);
}

// ===========================================================================
// 4. Failure handling
// ===========================================================================

#[test]
fn busy_gate_rejects_resend() {
    let dir = temp_dir();
    let (log, coordinator, gates, transport) = fixture(&dir);
    let p = peer("peerA");

    log.record_outbound(&outbound("42", "peerA", "offer"), b"offer-body")
        .unwrap();

    let _held = gates.try_acquire(&p).unwrap();
    let result = coordinator.on_peer_connected(&p, &gates, &transport);
    assert!(matches!(result, Err(DlcSyncError::Busy { .. })));
    assert_eq!(coordinator.state(&p), ConnState::Connected);
    assert!(transport.sent().is_empty());

    cleanup(&dir);
}

#[test]
fn transport_failure_keeps_pointer_for_next_connect() {
    let dir = temp_dir();
    let (log, coordinator, gates, transport) = fixture(&dir);
    let p = peer("peerA");

    log.record_outbound(&outbound("42", "peerA", "offer"), b"offer-body")
        .unwrap();

    transport.set_fail(true);
    let result = coordinator.on_peer_connected(&p, &gates, &transport);
    assert!(matches!(result, Err(DlcSyncError::Transport { .. })));
    assert_eq!(coordinator.state(&p), ConnState::Connected);
    assert!(coordinator.cursor().get(&p).unwrap().is_some());

    // The link recovers: the next connect event succeeds.
    transport.set_fail(false);
    let outcome = coordinator.on_peer_connected(&p, &gates, &transport).unwrap();
    assert_eq!(
        outcome,
        ResendOutcome::Resent {
            message_hash: hash("42")
        }
    );
    assert_eq!(transport.sent().len(), 1);

    cleanup(&dir);
}

// ===========================================================================
// 5. Outbound send path
// ===========================================================================

#[test]
fn send_outbound_records_then_transmits() {
    let dir = temp_dir();
    let (log, coordinator, gates, transport) = fixture(&dir);
    let p = peer("peerA");

    let msg = outbound("42", "peerA", "offer");
    let outcome = send_outbound(&log, &gates, &transport, &msg, b"offer-body").unwrap();
    assert_eq!(outcome, RecordOutcome::Inserted);

    assert!(log.lookup(&hash("42")).unwrap().is_some());
    let pointer = coordinator.cursor().get(&p).unwrap().unwrap();
    assert_eq!(pointer.message_hash, hash("42"));
    assert_eq!(transport.sent().len(), 1);

    // A later reconnect replays exactly the transmitted body.
    coordinator.on_peer_disconnected(&p);
    coordinator.on_peer_connected(&p, &gates, &transport).unwrap();
    let sent = transport.sent();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0].1, sent[1].1);

    cleanup(&dir);
}

#[test]
fn send_outbound_rejected_while_gate_held() {
    let dir = temp_dir();
    let (log, _coordinator, gates, transport) = fixture(&dir);
    let p = peer("peerA");

    let _held = gates.try_acquire(&p).unwrap();
    let result = send_outbound(&log, &gates, &transport, &outbound("42", "peerA", "offer"), b"x");
    assert!(matches!(result, Err(DlcSyncError::Busy { .. })));
    assert!(transport.sent().is_empty());
    assert!(log.lookup(&hash("42")).unwrap().is_none());

    cleanup(&dir);
}

#[test]
fn send_outbound_persists_even_if_transport_fails() {
    let dir = temp_dir();
    let (log, coordinator, gates, transport) = fixture(&dir);
    let p = peer("peerA");

    transport.set_fail(true);
    let result = send_outbound(&log, &gates, &transport, &outbound("42", "peerA", "offer"), b"body");
    assert!(matches!(result, Err(DlcSyncError::Transport { .. })));

    // Persist-before-transmit: the pointer already covers the message.
    assert!(log.lookup(&hash("42")).unwrap().is_some());
    let pointer = coordinator.cursor().get(&p).unwrap().unwrap();
    assert_eq!(pointer.message_body, b"body");

    // The next connect delivers it.
    transport.set_fail(false);
    coordinator.on_peer_connected(&p, &gates, &transport).unwrap();
    assert_eq!(transport.sent().len(), 1);
    assert_eq!(transport.sent()[0].1, b"body");

    cleanup(&dir);
}

// ===========================================================================
// 6. Cross-peer independence
// ===========================================================================

#[test]
fn peers_resend_independently() {
    let dir = temp_dir();
    let (log, coordinator, gates, transport) = fixture(&dir);
    let a = peer("peerA");
    let b = peer("peerB");

    log.record_outbound(&outbound("1", "peerA", "offer"), b"to-a").unwrap();
    log.record_outbound(&outbound("2", "peerB", "offer"), b"to-b").unwrap();

    // Peer A's gate being held must not affect peer B.
    let _held = gates.try_acquire(&a).unwrap();
    let outcome = coordinator.on_peer_connected(&b, &gates, &transport).unwrap();
    assert_eq!(
        outcome,
        ResendOutcome::Resent {
            message_hash: hash("2")
        }
    );
    assert_eq!(coordinator.state(&b), ConnState::AwaitingAck);
    assert_eq!(coordinator.state(&a), ConnState::Disconnected);

    let sent = transport.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, b);
    assert_eq!(sent[0].1, b"to-b");

    cleanup(&dir);
}
