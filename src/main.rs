mod block;
mod cli;
mod codec;
mod facade;
mod keystore;
mod network;
mod pool;
mod primitives;
mod reorg;
mod runtime;
mod storage;
mod telemetry;
mod tree;

use {
  cli::CliOpts,
  clap::Parser,
  facade::{Announcer, Kernel, TransactionGossip},
  network::protocol::BlockAnnounceMessage,
  runtime::{InstanceFactory, InvalidTransaction, RuntimeError, RuntimeInstance, RuntimeVersion, Validity},
  std::sync::Arc,
  storage::SledStorage,
  telemetry::TracingOnlySink,
  tokio::sync::mpsc::{unbounded_channel, UnboundedSender},
  tracing::{info, Level},
  tracing_subscriber::{
    filter::filter_fn,
    prelude::__tracing_subscriber_SubscriberExt,
    util::SubscriberInitExt,
    Layer,
  },
};

#[global_allocator]
static ALLOC: jemallocator::Jemalloc = jemallocator::Jemalloc;

/// A runtime instance that shells out to nothing: the WASM executor is an
/// external collaborator this kernel does not ship. This stand-in only
/// carries the code blob's identity, enough for the registry's
/// copy-on-write bookkeeping to function; constructing a real `Instance`
/// from a code blob is the job of the executor.
struct OpaqueInstance {
  code: Vec<u8>,
  code_hash: primitives::Hash,
}

impl RuntimeInstance for OpaqueInstance {
  fn version(&self) -> RuntimeVersion {
    RuntimeVersion {
      spec_name: "kernel".into(),
      spec_version: 1,
      impl_version: 1,
    }
  }

  fn metadata(&self) -> Vec<u8> {
    self.code.clone()
  }

  fn validate_transaction(&self, _extrinsic: &[u8]) -> Result<Validity, InvalidTransaction> {
    Ok(Validity {
      priority: 0,
      requires: vec![],
      provides: vec![],
      longevity: 64,
      propagate: true,
    })
  }

  fn execute_block(&self, _header_and_body: &[u8]) -> Result<(), RuntimeError> {
    Err(RuntimeError::ExecutionFailed(
      "no WASM executor is wired into this kernel binary".into(),
    ))
  }

  fn code_hash(&self) -> primitives::Hash {
    self.code_hash
  }
}

fn opaque_instance_factory() -> InstanceFactory<OpaqueInstance> {
  Arc::new(|code: &[u8]| {
    Ok(Arc::new(OpaqueInstance {
      code: code.to_vec(),
      code_hash: primitives::Hash::digest(code),
    }))
  })
}

struct ChannelAnnouncer(UnboundedSender<BlockAnnounceMessage>);
impl Announcer for ChannelAnnouncer {
  fn announce(&self, msg: BlockAnnounceMessage) {
    let _ = self.0.send(msg);
  }
}

struct ChannelGossip(UnboundedSender<Vec<u8>>);
impl TransactionGossip for ChannelGossip {
  fn gossip_transaction(&self, bytes: &[u8]) {
    let _ = self.0.send(bytes.to_vec());
  }
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> anyhow::Result<()> {
  let opts = CliOpts::parse();

  let loglevel = match opts.verbose {
    1 => Level::DEBUG,
    2 => Level::TRACE,
    _ => Level::INFO,
  };
  tracing_subscriber::registry()
    .with(tracing_subscriber::fmt::layer().with_filter(filter_fn(move |metadata| {
      metadata.level() <= &loglevel
    })))
    .init();

  info!("starting kernel node");
  info!("version: {}", env!("CARGO_PKG_VERSION"));
  info!("listen addresses: {:?}", opts.listen_multiaddrs());
  info!("p2p identity: {}", opts.p2p_identity().public().to_peer_id());

  let genesis = opts.genesis()?;
  let data_dir = opts.data_dir(&genesis.chain_id)?;
  info!("data directory: {}", data_dir.display());
  info!("genesis hash: {}", genesis.genesis_block.hash());

  let storage = Arc::new(SledStorage::open(&data_dir)?);
  let initial_state = genesis
    .state()
    .map_err(|e| anyhow::anyhow!("invalid genesis state encoding: {e}"))?;
  let code = genesis
    .code()
    .map_err(|e| anyhow::anyhow!("invalid genesis code encoding: {e}"))?;
  storage.store_trie(&initial_state)?;

  let telemetry = Arc::new(TracingOnlySink);
  let keystore = Arc::new(keystore::Keystore::new(vec![*b"babe", *b"gran"]));

  let (announce_tx, mut announce_rx) = unbounded_channel();
  let (gossip_tx, mut gossip_rx) = unbounded_channel();

  let genesis_runtime = Arc::new(OpaqueInstance {
    code_hash: primitives::Hash::digest(&code),
    code,
  });

  let kernel = Arc::new(Kernel::new(
    genesis.genesis_block.clone(),
    genesis_runtime,
    opaque_instance_factory(),
    storage,
    keystore,
    Arc::new(ChannelAnnouncer(announce_tx)),
    Arc::new(ChannelGossip(gossip_tx)),
    telemetry,
    1024,
  ));

  info!("best block: {}", kernel.best_block());

  // a shared cancellation token; long-running operations accept one and
  // return Cancelled immediately on trip. At the top of the process this
  // is ctrl-c; a real per-peer stream task would derive a child token
  // from this one.
  let shutdown = tokio_util::sync::CancellationToken::new();
  let shutdown_signal = shutdown.clone();
  tokio::spawn(async move {
    let _ = tokio::signal::ctrl_c().await;
    shutdown_signal.cancel();
  });

  // core service loop: drains the facade's outbound announcement and
  // gossip channels. Dialing peers and the substream machinery that would
  // carry these over the wire belongs to the libp2p host.
  loop {
    tokio::select! {
      _ = shutdown.cancelled() => {
        info!("shutdown requested, stopping kernel service loop");
        break;
      }
      Some(announcement) = announce_rx.recv() => {
        info!(
          number = announcement.number,
          best = announcement.best_block,
          "broadcasting block announcement"
        );
      }
      Some(bytes) = gossip_rx.recv() => {
        info!(len = bytes.len(), "gossiping extrinsic to peers");
      }
      else => break,
    }
  }

  Ok(())
}
