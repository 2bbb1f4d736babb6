//! Peer-announce session management.
//!
//! Sessions are sharded by peer id in a [`DashMap`] so that handling is
//! parallel across peers but strictly sequential within a single peer's
//! session.

pub mod error;
pub mod framing;
pub mod protocol;

use {
  dashmap::DashMap,
  error::ProtocolError,
  libp2p::PeerId,
  protocol::{
    Action,
    BlockAnnounceHandshake,
    BlockAnnounceMessage,
    BlockRequest,
    HandshakeState,
    PeerSession,
  },
  std::{
    collections::HashSet,
    sync::atomic::{AtomicU64, Ordering},
  },
};

/// The syncer collaborator: handed a validated announcement, may ask for
/// a follow-up block.
pub trait Syncer: Send + Sync {
  fn handle_block_announce(&self, msg: &BlockAnnounceMessage) -> Option<BlockRequest>;
}

/// Dispatches outbound wire traffic and session lifecycle decisions. The
/// FSM in [`protocol::PeerSession`] never touches I/O directly — this is
/// the seam a real transport (or a test double) plugs into.
pub trait Transport: Send + Sync {
  fn send_handshake(&self, peer: PeerId, hs: &BlockAnnounceHandshake);
  fn send_announce(&self, peer: PeerId, msg: &BlockAnnounceMessage);
  fn send_block_request(&self, peer: PeerId, req: &BlockRequest);
  fn open_stream(&self, peer: PeerId);
  fn drop_peer(&self, peer: PeerId);
}

/// Tracks peer sessions and dispatches FSM actions against a [`Transport`]
/// and [`Syncer`] collaborator. One instance is shared across all peer
/// tasks; access is serialized per-entry via the DashMap shard lock
/// rather than a single global mutex.
pub struct SessionTable<T: Transport, S: Syncer> {
  sessions: DashMap<PeerId, PeerSession>,
  genesis_hash: crate::primitives::Hash,
  our_handshake: BlockAnnounceHandshake,
  request_tracker: DashMap<PeerId, HashSet<u64>>,
  next_request_id: AtomicU64,
  transport: T,
  syncer: S,
}

impl<T: Transport, S: Syncer> SessionTable<T, S> {
  pub fn new(
    genesis_hash: crate::primitives::Hash,
    our_handshake: BlockAnnounceHandshake,
    transport: T,
    syncer: S,
  ) -> Self {
    Self {
      sessions: DashMap::new(),
      genesis_hash,
      our_handshake,
      request_tracker: DashMap::new(),
      next_request_id: AtomicU64::new(0),
      transport,
      syncer,
    }
  }

  fn dispatch(&self, peer: PeerId, action: Action) {
    match action {
      Action::SendHandshake => self.transport.send_handshake(peer, &self.our_handshake),
      Action::FlushAnnounce(msg) => self.transport.send_announce(peer, &msg),
      Action::HandToSyncer(msg) => {
        if let Some(mut req) = self.syncer.handle_block_announce(&msg) {
          req.id = self.next_request_id.fetch_add(1, Ordering::Relaxed);
          self
            .request_tracker
            .entry(peer)
            .or_default()
            .insert(req.id);
          self.transport.send_block_request(peer, &req);
        }
      }
      Action::OpenAndSendHandshake => {
        self.transport.open_stream(peer);
        self.transport.send_handshake(peer, &self.our_handshake);
      }
      Action::SendAnnounceNow(msg) => self.transport.send_announce(peer, &msg),
      Action::DropPeer => {
        self.transport.drop_peer(peer);
        self.sessions.remove(&peer);
        self.request_tracker.remove(&peer);
      }
      Action::None => {}
    }
  }

  /// Handles an inbound handshake, validating that its genesis hash
  /// matches ours; a mismatch is treated as invalid.
  pub fn on_recv_handshake(&self, peer: PeerId, hs: BlockAnnounceHandshake) {
    let valid = hs.genesis_hash == self.genesis_hash;
    let action = self
      .sessions
      .entry(peer)
      .or_insert_with(PeerSession::new)
      .on_recv_handshake(valid);
    self.dispatch(peer, action);
  }

  pub fn on_recv_announcement(&self, peer: PeerId, msg: BlockAnnounceMessage) {
    let action = self
      .sessions
      .entry(peer)
      .or_insert_with(PeerSession::new)
      .on_recv_announcement(msg);
    self.dispatch(peer, action);
  }

  pub fn request_local_announce(&self, peer: PeerId, msg: BlockAnnounceMessage) {
    let action = self
      .sessions
      .entry(peer)
      .or_insert_with(PeerSession::new)
      .on_local_announce_request(msg);
    self.dispatch(peer, action);
  }

  pub fn on_disconnect(&self, peer: PeerId) {
    self.sessions.remove(&peer);
    self.request_tracker.remove(&peer);
  }

  pub fn state_of(&self, peer: &PeerId) -> Option<HandshakeState> {
    self.sessions.get(peer).map(|s| s.state())
  }

  /// Whether this request id has already been tracked for this peer,
  /// for deduplication.
  pub fn is_request_tracked(&self, peer: &PeerId, id: u64) -> bool {
    self
      .request_tracker
      .get(peer)
      .map(|s| s.contains(&id))
      .unwrap_or(false)
  }
}

pub use error::ProtocolError as NetworkError;

#[cfg(test)]
mod tests {
  use {
    super::*,
    protocol::BlockAnnounceMessage,
    std::sync::{Arc, Mutex},
  };

  #[derive(Default)]
  struct RecordingTransport {
    dropped: Mutex<Vec<PeerId>>,
  }

  impl Transport for Arc<RecordingTransport> {
    fn send_handshake(&self, _peer: PeerId, _hs: &BlockAnnounceHandshake) {}
    fn send_announce(&self, _peer: PeerId, _msg: &BlockAnnounceMessage) {}
    fn send_block_request(&self, _peer: PeerId, _req: &BlockRequest) {}
    fn open_stream(&self, _peer: PeerId) {}
    fn drop_peer(&self, peer: PeerId) {
      self.dropped.lock().unwrap().push(peer);
    }
  }

  struct NullSyncer;
  impl Syncer for NullSyncer {
    fn handle_block_announce(&self, _msg: &BlockAnnounceMessage) -> Option<BlockRequest> {
      None
    }
  }

  #[test]
  fn genesis_mismatch_marks_invalid_and_no_announcement() {
    let genesis = crate::primitives::Hash::digest(b"genesis");
    let transport = Arc::new(RecordingTransport::default());
    let table = SessionTable::new(
      genesis,
      BlockAnnounceHandshake {
        roles: 0,
        best_block_number: 0,
        best_block_hash: genesis,
        genesis_hash: genesis,
      },
      transport.clone(),
      NullSyncer,
    );

    let peer = PeerId::random();
    table.on_recv_handshake(
      peer,
      BlockAnnounceHandshake {
        roles: 0,
        best_block_number: 0,
        best_block_hash: genesis,
        genesis_hash: crate::primitives::Hash::digest(b"different"),
      },
    );

    // NONE + invalid handshake marks the session INVALID but does not
    // drop it yet (spec §4.F); removal happens on the next error.
    assert_eq!(table.state_of(&peer), Some(HandshakeState::Invalid));
    assert!(transport.dropped.lock().unwrap().is_empty());
  }
}
