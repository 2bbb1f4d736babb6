//! Generates ed25519 keypairs and prints them in the formats this
//! kernel understands: base58 (the node identity display convention) and
//! hex (the keystore's public-key lookup key).

use {
  ed25519_dalek::{Keypair, SecretKey},
  rand::{rngs::ThreadRng, RngCore},
};

fn main() {
  let mut rng = ThreadRng::default();
  let count: u32 = std::env::args()
    .nth(1)
    .unwrap_or_else(|| "1".to_owned())
    .parse()
    .expect("count must be a number");

  for _ in 0..count {
    let mut randbytes = [0u8; 32];
    rng.fill_bytes(&mut randbytes);
    let secret = SecretKey::from_bytes(&randbytes).unwrap();
    let public = (&secret).into();
    let keypair = Keypair { secret, public };

    println!("pubkey (base58): {}", bs58::encode(keypair.public.as_bytes()).into_string());
    println!("pubkey (hex):    {}", hex::encode(keypair.public.as_bytes()));
    println!("secret (base58): {}", bs58::encode(keypair.secret.as_bytes()).into_string());
    println!();
  }
}
