//! Block, header and body types.

use {
  crate::{codec::encode_compact_u64, primitives::Hash},
  serde::{Deserialize, Serialize},
};

/// An opaque consensus log entry carried in a block header's digest.
///
/// The engine id identifies the consensus engine that produced the entry
/// (e.g. BABE pre-digests, GRANDPA authority-set changes); its payload is
/// opaque to this kernel, which only needs to hash and relay it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DigestItem {
  pub engine_id: [u8; 4],
  pub payload: Vec<u8>,
}

/// A block header.
///
/// `Hash(Header)` is deterministic: blake2b-256 over the SCALE encoding of
/// this struct.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
  pub parent_hash: Hash,
  pub number: u64,
  pub state_root: Hash,
  pub extrinsics_root: Hash,
  pub digest: Vec<DigestItem>,
}

impl Header {
  /// Computes the block hash by SCALE-encoding this header and hashing it
  /// with blake2b-256.
  pub fn hash(&self) -> Hash {
    Hash::digest(&self.scale_encode())
  }

  fn scale_encode(&self) -> Vec<u8> {
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
    out
  }
}

/// An opaque, already-signed transaction byte string.
pub type Extrinsic = Vec<u8>;

/// An ordered sequence of extrinsics.
pub type Body = Vec<Extrinsic>;

/// A full block: header plus body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
  pub header: Header,
  pub body: Body,
}

impl Block {
  pub fn hash(&self) -> Hash {
    self.header.hash()
  }

  pub fn parent_hash(&self) -> Hash {
    self.header.parent_hash
  }

  pub fn number(&self) -> u64 {
    self.header.number
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn header(parent: Hash, number: u64) -> Header {
    Header {
      parent_hash: parent,
      number,
      state_root: Hash::digest(format!("state{number}").as_bytes()),
      extrinsics_root: Hash::digest(format!("ext{number}").as_bytes()),
      digest: vec![],
    }
  }

  #[test]
  fn hash_is_deterministic_and_sensitive_to_fields() {
    let h1 = header(Hash::ZERO, 1);
    let h2 = header(Hash::ZERO, 1);
    assert_eq!(h1.hash(), h2.hash());

    let h3 = header(Hash::ZERO, 2);
    assert_ne!(h1.hash(), h3.hash());
  }

  #[test]
  fn digest_items_affect_hash() {
    let mut h1 = header(Hash::ZERO, 1);
    let h_without = h1.hash();
    h1.digest.push(DigestItem {
      engine_id: *b"BABE",
      payload: vec![1, 2, 3],
    });
    assert_ne!(h_without, h1.hash());
  }
}
