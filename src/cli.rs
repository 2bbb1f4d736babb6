//! CLI surface wiring the kernel together: keypair/listen-address/peer
//! flags, genesis-file loading, and the data-directory layout a node
//! needs at startup.

use {
  crate::{block::Block, primitives::Keypair},
  clap::Parser,
  libp2p::{multiaddr::Protocol, Multiaddr},
  serde::{Deserialize, Serialize},
  std::{
    net::{IpAddr, SocketAddr},
    path::PathBuf,
  },
};

#[derive(Debug, Parser)]
#[clap(version, about)]
pub struct CliOpts {
  #[clap(short, long, help = "secret key of this node's block-announce identity")]
  pub keypair: Keypair,

  #[clap(long, help = "listen address", default_value = "0.0.0.0")]
  pub addr: Vec<IpAddr>,

  #[clap(long, help = "listen port", default_value = "30333")]
  pub port: u16,

  #[clap(
    short,
    long,
    parse(from_occurrences),
    help = "use verbose output (-vv very verbose output)"
  )]
  pub verbose: u64,

  #[clap(long, help = "address of a known peer to bootstrap p2p networking from")]
  pub peer: Vec<SocketAddr>,

  #[clap(long, parse(from_os_str), help = "path to the chain genesis file")]
  pub genesis: PathBuf,

  #[clap(
    long,
    parse(from_os_str),
    help = "data directory (trie + block storage)"
  )]
  pub data_dir: Option<PathBuf>,
}

impl CliOpts {
  pub fn listen_multiaddrs(&self) -> Vec<Multiaddr> {
    self
      .addr
      .iter()
      .map(|addr| {
        let mut maddr = Multiaddr::empty();
        maddr.push(match *addr {
          IpAddr::V4(addr) => Protocol::Ip4(addr),
          IpAddr::V6(addr) => Protocol::Ip6(addr),
        });
        maddr.push(Protocol::Tcp(self.port));
        maddr
      })
      .collect()
  }

  pub fn peers(&self) -> Vec<Multiaddr> {
    self
      .peer
      .iter()
      .map(|addr| {
        let mut maddr = Multiaddr::empty();
        maddr.push(match *addr {
          SocketAddr::V4(addr) => Protocol::Ip4(*addr.ip()),
          SocketAddr::V6(addr) => Protocol::Ip6(*addr.ip()),
        });
        maddr.push(Protocol::Tcp(addr.port()));
        maddr
      })
      .collect()
  }

  pub fn p2p_identity(&self) -> libp2p::identity::Keypair {
    libp2p::identity::Keypair::Ed25519(
      libp2p::identity::ed25519::SecretKey::from_bytes(&mut self.keypair.secret().to_bytes())
        .unwrap()
        .into(),
    )
  }

  /// Data directory, expanding `~` via `shellexpand`, defaulting to a
  /// chain-id-scoped directory under the system temp dir when
  /// `--data-dir` isn't given.
  pub fn data_dir(&self, chain_id: &str) -> std::io::Result<PathBuf> {
    match &self.data_dir {
      Some(dir) => Ok(PathBuf::from(shellexpand::tilde(
        &dir.to_string_lossy(),
      ).into_owned())),
      None => {
        let mut dir = std::env::temp_dir();
        dir.push(chain_id);
        std::fs::create_dir_all(&dir)?;
        Ok(dir)
      }
    }
  }

  /// Reads the genesis configuration from its JSON serialized form.
  pub fn genesis(&self) -> Result<GenesisConfig, std::io::Error> {
    let json = std::fs::read_to_string(&self.genesis)?;
    let genesis: GenesisConfig = serde_json::from_str(&json)
      .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
    Ok(genesis)
  }
}

/// The genesis configuration loaded from disk: chain identity, the
/// genesis block itself, the initial runtime code blob, and the initial
/// trie state, all needed to bootstrap `Kernel::new`. Genesis *assembly*
/// tooling (building this file in the first place) isn't this loader's
/// job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenesisConfig {
  pub chain_id: String,
  pub genesis_block: Block,
  /// Hex-encoded initial runtime code blob.
  pub code_hex: String,
  /// Hex-encoded `(key, value)` pairs making up the initial trie state.
  pub state: Vec<(String, String)>,
}

impl GenesisConfig {
  pub fn code(&self) -> Result<Vec<u8>, hex::FromHexError> {
    hex::decode(&self.code_hex)
  }

  pub fn state(&self) -> Result<crate::storage::TrieState, hex::FromHexError> {
    let mut state = crate::storage::TrieState::new();
    for (k, v) in &self.state {
      state.insert(hex::decode(k)?, hex::decode(v)?);
    }
    Ok(state)
  }
}
