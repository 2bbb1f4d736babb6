//! The block-announce protocol state machine.
//!
//! Protocol id is `<genesis-hash-prefix>/block-announces/1`. This is a
//! small per-peer handshake-then-announce FSM over a single substream,
//! hand-rolled rather than layered over a general-purpose gossip
//! substrate: a task-per-peer-session bridges the swarm event loop to
//! the rest of the node via an mpsc channel.

use {
  super::error::ProtocolError,
  crate::{
    block::DigestItem,
    codec::{decode_compact_u64, encode_compact_u64},
    primitives::Hash,
  },
};

/// `BlockAnnounceHandshake`: `(roles, best_block_number,
/// best_block_hash, genesis_hash)`, all SCALE-encoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockAnnounceHandshake {
  pub roles: u8,
  pub best_block_number: u64,
  pub best_block_hash: Hash,
  pub genesis_hash: Hash,
}

impl BlockAnnounceHandshake {
  pub fn encode(&self) -> Vec<u8> {
    let mut out = vec![self.roles];
    out.extend_from_slice(&self.best_block_number.to_le_bytes());
    out.extend_from_slice(self.best_block_hash.as_bytes());
    out.extend_from_slice(self.genesis_hash.as_bytes());
    out
  }

  pub fn decode(buf: &[u8]) -> Result<Self, ProtocolError> {
    if buf.len() != 1 + 8 + 32 + 32 {
      return Err(ProtocolError::Decode("bad handshake length".into()));
    }
    let roles = buf[0];
    let best_block_number = u64::from_le_bytes(buf[1..9].try_into().unwrap());
    let best_block_hash = Hash::from_bytes(buf[9..41].try_into().unwrap());
    let genesis_hash = Hash::from_bytes(buf[41..73].try_into().unwrap());
    Ok(Self {
      roles,
      best_block_number,
      best_block_hash,
      genesis_hash,
    })
  }
}

/// `BlockAnnounceMessage`: `(parent_hash, number: compact<uN>,
/// state_root, extrinsics_root, digest: sequence<DigestItem>, best_block)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockAnnounceMessage {
  pub parent_hash: Hash,
  pub number: u64,
  pub state_root: Hash,
  pub extrinsics_root: Hash,
  pub digest: Vec<DigestItem>,
  pub best_block: bool,
}

impl BlockAnnounceMessage {
  pub fn encode(&self) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(self.parent_hash.as_bytes());
    encode_compact_u64(self.number, &mut out).expect("writing to a Vec cannot fail");
    out.extend_from_slice(self.state_root.as_bytes());
    out.extend_from_slice(self.extrinsics_root.as_bytes());
    encode_compact_u64(self.digest.len() as u64, &mut out)
      .expect("writing to a Vec cannot fail");
    for item in &self.digest {
      out.extend_from_slice(&item.engine_id);
      encode_compact_u64(item.payload.len() as u64, &mut out)
        .expect("writing to a Vec cannot fail");
      out.extend_from_slice(&item.payload);
    }
    out.push(self.best_block as u8);
    out
  }

  pub fn decode(buf: &[u8]) -> Result<Self, ProtocolError> {
    let mut cursor = std::io::Cursor::new(buf);
    let mut read32 = |c: &mut std::io::Cursor<&[u8]>| -> Result<Hash, ProtocolError> {
      use std::io::Read;
      let mut arr = [0u8; 32];
      c.read_exact(&mut arr)
        .map_err(|e| ProtocolError::Decode(e.to_string()))?;
      Ok(Hash::from_bytes(arr))
    };

    let parent_hash = read32(&mut cursor)?;
    let number = decode_compact_u64(&mut cursor)
      .map_err(|e| ProtocolError::Decode(e.to_string()))?;
    let state_root = read32(&mut cursor)?;
    let extrinsics_root = read32(&mut cursor)?;
    let digest_len = decode_compact_u64(&mut cursor)
      .map_err(|e| ProtocolError::Decode(e.to_string()))?;

    let mut digest = Vec::with_capacity(digest_len as usize);
    for _ in 0..digest_len {
      use std::io::Read;
      let mut engine_id = [0u8; 4];
      cursor
        .read_exact(&mut engine_id)
        .map_err(|e| ProtocolError::Decode(e.to_string()))?;
      let payload_len = decode_compact_u64(&mut cursor)
        .map_err(|e| ProtocolError::Decode(e.to_string()))?;
      let mut payload = vec![0u8; payload_len as usize];
      cursor
        .read_exact(&mut payload)
        .map_err(|e| ProtocolError::Decode(e.to_string()))?;
      digest.push(DigestItem { engine_id, payload });
    }

    let mut best_block_byte = [0u8; 1];
    {
      use std::io::Read;
      cursor
        .read_exact(&mut best_block_byte)
        .map_err(|e| ProtocolError::Decode(e.to_string()))?;
    }

    Ok(Self {
      parent_hash,
      number,
      state_root,
      extrinsics_root,
      digest,
      best_block: best_block_byte[0] != 0,
    })
  }
}

/// `BlockRequest`: `(id, fields, start_from, direction, max)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockRequest {
  pub id: u64,
  pub fields: u8,
  pub start_from: StartFrom,
  pub direction: Direction,
  pub max: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartFrom {
  Hash(Hash),
  Number(u64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
  Ascending,
  Descending,
}

/// Per-peer handshake negotiation state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeState {
  None,
  Sent,
  Validated,
  Invalid,
}

/// The result of feeding an inbound/local event into a [`PeerSession`].
/// The caller (the peer task) acts on this; the FSM itself never touches
/// the network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
  /// Send our handshake on this stream.
  SendHandshake,
  /// Flush a previously-stashed announcement now that the peer validated.
  FlushAnnounce(BlockAnnounceMessage),
  /// Hand the announcement to the syncer collaborator.
  HandToSyncer(BlockAnnounceMessage),
  /// Open the stream and send our handshake (first local announce on a
  /// fresh session).
  OpenAndSendHandshake,
  /// Send the announcement on the open stream right away.
  SendAnnounceNow(BlockAnnounceMessage),
  /// Drop the peer: protocol violation or invalid handshake.
  DropPeer,
  /// Nothing to do (duplicate handshake, buffered announce, skipped
  /// resend on an invalid session, etc).
  None,
}

/// Per-peer session state, transitioned by inbound stream messages and
/// outbound send requests.
#[derive(Debug, Clone)]
pub struct PeerSession {
  state: HandshakeState,
  pending_announce: Option<BlockAnnounceMessage>,
}

impl Default for PeerSession {
  fn default() -> Self {
    Self::new()
  }
}

impl PeerSession {
  pub fn new() -> Self {
    Self {
      state: HandshakeState::None,
      pending_announce: None,
    }
  }

  pub fn state(&self) -> HandshakeState {
    self.state
  }

  /// An inbound handshake validity check has completed (valid iff its
  /// genesis hash matches ours).
  pub fn on_recv_handshake(&mut self, valid: bool) -> Action {
    use HandshakeState::*;
    match (self.state, valid) {
      (None, true) => {
        self.state = Validated;
        Action::SendHandshake
      }
      (Sent, true) => {
        self.state = Validated;
        match self.pending_announce.take() {
          Some(msg) => Action::FlushAnnounce(msg),
          None => Action::None,
        }
      }
      (Validated, true) => Action::None,
      (Invalid, true) => Action::None,
      (None, false) => {
        self.state = Invalid;
        Action::None
      }
      (Sent, false) => {
        self.state = Invalid;
        Action::DropPeer
      }
      (Validated, false) => Action::DropPeer,
      (Invalid, false) => Action::None,
    }
  }

  /// An inbound `BlockAnnounceMessage` arrived.
  pub fn on_recv_announcement(&mut self, msg: BlockAnnounceMessage) -> Action {
    use HandshakeState::*;
    match self.state {
      None | Sent => {
        self.pending_announce = Some(msg);
        Action::None
      }
      Validated => Action::HandToSyncer(msg),
      Invalid => Action::DropPeer,
    }
  }

  /// The local node wants to announce `msg` to this peer.
  pub fn on_local_announce_request(&mut self, msg: BlockAnnounceMessage) -> Action {
    use HandshakeState::*;
    match self.state {
      None => {
        self.pending_announce = Some(msg);
        self.state = Sent;
        Action::OpenAndSendHandshake
      }
      Sent => {
        self.pending_announce = Some(msg);
        Action::SendHandshake
      }
      Validated => Action::SendAnnounceNow(msg),
      Invalid => Action::None,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn announce(n: u64) -> BlockAnnounceMessage {
    BlockAnnounceMessage {
      parent_hash: Hash::ZERO,
      number: n,
      state_root: Hash::ZERO,
      extrinsics_root: Hash::ZERO,
      digest: vec![],
      best_block: true,
    }
  }

  #[test]
  fn valid_handshake_from_none_sends_ours() {
    let mut s = PeerSession::new();
    assert_eq!(s.on_recv_handshake(true), Action::SendHandshake);
    assert_eq!(s.state(), HandshakeState::Validated);
  }

  #[test]
  fn invalid_handshake_from_none_marks_invalid_without_dropping() {
    let mut s = PeerSession::new();
    // NONE + invalid handshake: no response, no drop yet (spec §4.F).
    assert_eq!(s.on_recv_handshake(false), Action::None);
    assert_eq!(s.state(), HandshakeState::Invalid);
    // the peer is dropped on the next error, e.g. a subsequent announcement.
    assert_eq!(s.on_recv_announcement(announce(1)), Action::DropPeer);
  }

  #[test]
  fn invalid_handshake_from_sent_drops() {
    let mut s = PeerSession::new();
    s.on_local_announce_request(announce(1));
    assert_eq!(s.state(), HandshakeState::Sent);
    assert_eq!(s.on_recv_handshake(false), Action::DropPeer);
    assert_eq!(s.state(), HandshakeState::Invalid);
  }

  #[test]
  fn pending_announce_flushed_on_validation() {
    let mut s = PeerSession::new();
    assert_eq!(
      s.on_local_announce_request(announce(1)),
      Action::OpenAndSendHandshake
    );
    assert_eq!(s.state(), HandshakeState::Sent);
    assert_eq!(
      s.on_recv_handshake(true),
      Action::FlushAnnounce(announce(1))
    );
  }

  #[test]
  fn announcement_handed_to_syncer_once_validated() {
    let mut s = PeerSession::new();
    s.on_recv_handshake(true);
    assert_eq!(
      s.on_recv_announcement(announce(5)),
      Action::HandToSyncer(announce(5))
    );
  }

  #[test]
  fn announce_wire_roundtrip() {
    let msg = BlockAnnounceMessage {
      parent_hash: Hash::digest(b"parent"),
      number: 424242,
      state_root: Hash::digest(b"state"),
      extrinsics_root: Hash::digest(b"ext"),
      digest: vec![DigestItem {
        engine_id: *b"BABE",
        payload: vec![9, 9, 9],
      }],
      best_block: true,
    };
    let encoded = msg.encode();
    let decoded = BlockAnnounceMessage::decode(&encoded).unwrap();
    assert_eq!(msg, decoded);
  }

  #[test]
  fn handshake_wire_roundtrip() {
    let hs = BlockAnnounceHandshake {
      roles: 4,
      best_block_number: 10,
      best_block_hash: Hash::digest(b"bbh"),
      genesis_hash: Hash::digest(b"gen"),
    };
    let encoded = hs.encode();
    let decoded = BlockAnnounceHandshake::decode(&encoded).unwrap();
    assert_eq!(hs, decoded);
  }
}
