//! SCALE (Simple Concatenated Aggregate Little-Endian) primitives and the
//! trie partial-key codec.
//!
//! Hand-rolled rather than pulled from a dependency: the exact byte layout
//! is the trust boundary for every state root in the chain, so this crate
//! owns it directly instead of trusting an external implementation.

mod compact;
mod partial_key;

pub use compact::{decode_compact_u64, encode_compact_u64};
pub use partial_key::{encode_partial_key, decode_partial_key, NodeKind, PartialKeyError};
