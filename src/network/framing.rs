//! Length-prefixed wire framing for the block-announce protocol.
//!
//! An `unsigned_varint` compact-integer length prefix wraps an opaque
//! SCALE-encoded payload. The first inbound message on a fresh stream is
//! always a handshake and every later one an announcement, so the
//! payload is a tagged enum over those two variants with an exhaustive
//! match on receipt.

use {
  super::{
    error::ProtocolError,
    protocol::{BlockAnnounceHandshake, BlockAnnounceMessage},
  },
  asynchronous_codec::{Bytes, BytesMut, Decoder, Encoder},
  unsigned_varint::codec::UviBytes,
};

/// A framed block-announce stream message, tagged by stream position
/// rather than by an on-wire discriminant: the handshake is always
/// first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WireMessage {
  Handshake(BlockAnnounceHandshake),
  Announcement(BlockAnnounceMessage),
}

/// Codec for one block-announce substream. Stateful: it remembers whether
/// the handshake has already been read/written on this stream so it can
/// dispatch the next frame to the right decoder.
pub struct BlockAnnounceCodec {
  length_codec: UviBytes,
  handshake_seen: bool,
}

impl BlockAnnounceCodec {
  pub fn new() -> Self {
    Self {
      length_codec: UviBytes::default(),
      handshake_seen: false,
    }
  }
}

impl Default for BlockAnnounceCodec {
  fn default() -> Self {
    Self::new()
  }
}

impl Encoder for BlockAnnounceCodec {
  type Error = ProtocolError;
  type Item = WireMessage;

  fn encode(&mut self, item: Self::Item, dst: &mut BytesMut) -> Result<(), Self::Error> {
    let buf = match item {
      WireMessage::Handshake(hs) => hs.encode(),
      WireMessage::Announcement(msg) => msg.encode(),
    };
    self.length_codec.encode(Bytes::from(buf), dst)?;
    Ok(())
  }
}

impl Decoder for BlockAnnounceCodec {
  type Error = ProtocolError;
  type Item = WireMessage;

  fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
    let packet = match self.length_codec.decode(src)? {
      Some(packet) => packet,
      None => return Ok(None),
    };

    let message = if !self.handshake_seen {
      self.handshake_seen = true;
      WireMessage::Handshake(BlockAnnounceHandshake::decode(&packet)?)
    } else {
      WireMessage::Announcement(BlockAnnounceMessage::decode(&packet)?)
    };
    Ok(Some(message))
  }
}
