mod b58;
mod hash;
mod keys;

pub use b58::ToBase58String;
pub use hash::Hash;
pub use keys::{Keypair, KeypairError, Pubkey};
