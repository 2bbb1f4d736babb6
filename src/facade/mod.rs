//! The core service facade: composes the partial-key codec, block tree,
//! runtime registry, transaction pool, reorg controller and
//! block-announce protocol behind the operations a node's production
//! loop / RPC layer calls.

mod error;

pub use error::FacadeError;

use {
  crate::{
    block::{Block, Extrinsic},
    network::protocol::BlockAnnounceMessage,
    pool::TransactionPool,
    primitives::Hash,
    reorg::{self, BlockBodyLookup},
    runtime::{InstanceFactory, RuntimeInstance, RuntimeRegistry, CODE_STORAGE_KEY},
    storage::{StorageState, TrieState},
    tree::BlockTree,
  },
  std::{collections::HashMap, sync::Arc},
};

/// Broadcasts a validated announcement to connected peers. Transport/
/// fanout itself belongs to the network layer; this is the seam the
/// facade calls into.
pub trait Announcer: Send + Sync {
  fn announce(&self, msg: BlockAnnounceMessage);
}

/// Propagates a submitted extrinsic to peers via transaction gossip,
/// delegated to the transport layer.
pub trait TransactionGossip: Send + Sync {
  fn gossip_transaction(&self, bytes: &[u8]);
}

struct BlockCache {
  blocks: parking_lot::RwLock<HashMap<Hash, Block>>,
}

impl BlockCache {
  fn new() -> Self {
    Self {
      blocks: parking_lot::RwLock::new(HashMap::new()),
    }
  }

  fn insert(&self, block: Block) {
    self.blocks.write().insert(block.hash(), block);
  }

  fn get(&self, hash: Hash) -> Option<Block> {
    self.blocks.read().get(&hash).cloned()
  }
}

impl BlockBodyLookup for BlockCache {
  fn body(&self, hash: Hash) -> Option<Vec<Extrinsic>> {
    self.get(hash).map(|b| b.body)
  }
}

/// The kernel facade. Generic over the runtime instance type, as
/// [`RuntimeRegistry`] is.
pub struct Kernel<R: RuntimeInstance> {
  tree: parking_lot::RwLock<BlockTree>,
  blocks: BlockCache,
  runtime: RuntimeRegistry<R>,
  instance_factory: InstanceFactory<R>,
  pool: parking_lot::Mutex<TransactionPool>,
  storage: Arc<dyn StorageState>,
  keystore: Arc<crate::keystore::Keystore>,
  announcer: Arc<dyn Announcer>,
  gossip: Arc<dyn TransactionGossip>,
  genesis_hash: Hash,
}

impl<R: RuntimeInstance> Kernel<R> {
  #[allow(clippy::too_many_arguments)]
  pub fn new(
    genesis: Block,
    genesis_runtime: Arc<R>,
    instance_factory: InstanceFactory<R>,
    storage: Arc<dyn StorageState>,
    keystore: Arc<crate::keystore::Keystore>,
    announcer: Arc<dyn Announcer>,
    gossip: Arc<dyn TransactionGossip>,
    telemetry: Arc<dyn crate::telemetry::TelemetrySink>,
    retention_capacity: usize,
  ) -> Self {
    let genesis_hash = genesis.hash();
    let tree = BlockTree::new(genesis_hash, genesis.number());
    let blocks = BlockCache::new();
    blocks.insert(genesis);

    let runtime = RuntimeRegistry::new(telemetry.clone());
    runtime.store_runtime(genesis_hash, genesis_runtime).expect("genesis binds cleanly");
    runtime.set_best_block(genesis_hash);

    Self {
      tree: parking_lot::RwLock::new(tree),
      blocks,
      runtime,
      instance_factory,
      pool: parking_lot::Mutex::new(TransactionPool::new(telemetry, retention_capacity)),
      storage,
      keystore,
      announcer,
      gossip,
      genesis_hash,
    }
  }

  pub fn best_block(&self) -> Hash {
    self.tree.read().best_block()
  }

  /// Appends a produced block to the tree, handles any runtime code
  /// change it introduces, maintains the pool against its body,
  /// reconciles the pool on any head change, and broadcasts an
  /// announcement.
  pub fn handle_block_produced(
    &self,
    block: Block,
    new_state: TrieState,
    arrival_time_ms: u64,
  ) -> Result<(), FacadeError> {
    let block_hash = block.hash();
    let parent_hash = block.parent_hash();

    let old_head = {
      let mut tree = self.tree.write();
      let old_head = tree.best_block();
      tree.add_block(&block, arrival_time_ms)?;
      old_head
    };

    self.storage.store_trie(&new_state)?;
    self.blocks.insert(block.clone());

    let parent_runtime = self.runtime.get_runtime(Some(parent_hash))?;
    let new_code = new_state.get(CODE_STORAGE_KEY).cloned();
    self.runtime.handle_runtime_changes(
      |_key| new_code.clone(),
      &parent_runtime,
      block_hash,
      &self.instance_factory,
    )?;

    self.pool.lock().maintain(&block.body);

    let new_head = self.tree.read().best_block();
    self.runtime.set_best_block(new_head);

    if new_head != old_head {
      let tree = self.tree.read();
      reorg::reorg(&tree, &mut self.pool.lock(), &self.blocks, old_head, new_head)?;
    }

    self.announcer.announce(BlockAnnounceMessage {
      parent_hash,
      number: block.number(),
      state_root: block.header.state_root,
      extrinsics_root: block.header.extrinsics_root,
      digest: block.header.digest.clone(),
      best_block: new_head == block_hash,
    });

    Ok(())
  }

  /// Validates a submitted extrinsic against the head runtime; on
  /// success, inserts it into the pool queue and gossips it to peers.
  pub fn handle_submitted_extrinsic(&self, bytes: Extrinsic) -> Result<(), FacadeError> {
    let runtime = self.runtime.get_runtime(None)?;
    match runtime.validate_transaction(&bytes) {
      Ok(validity) => {
        self.pool.lock().add_to_queue(bytes.clone(), validity);
        self.gossip.gossip_transaction(&bytes);
        Ok(())
      }
      Err(invalid) => Err(FacadeError::ExtrinsicRejected(invalid)),
    }
  }

  /// Walks the canonical chain from `from` to `to` (inclusive, `to`
  /// defaulting to the current head), including only keys whose value
  /// changed at that block relative to its parent.
  pub fn query_storage(
    &self,
    from: Hash,
    to: Option<Hash>,
    keys: &[Vec<u8>],
  ) -> Result<HashMap<Hash, HashMap<Vec<u8>, Vec<u8>>>, FacadeError> {
    let to = to.unwrap_or_else(|| self.tree.read().best_block());
    let path = self.tree.read().subchain(from, to)?;

    let mut result = HashMap::new();
    let mut previous_state: Option<TrieState> = None;

    for hash in path {
      let block = self.blocks.get(hash).ok_or(FacadeError::UnknownBlock(hash))?;
      let state = self.storage.trie_state(block.header.state_root)?;

      let mut changed = HashMap::new();
      for key in keys {
        let current = state.get(key);
        let previous = previous_state.as_ref().and_then(|s| s.get(key));
        if current != previous {
          if let Some(value) = current {
            changed.insert(key.clone(), value.clone());
          }
        }
      }
      if !changed.is_empty() {
        result.insert(hash, changed);
      }
      previous_state = Some(state);
    }

    Ok(result)
  }

  /// Resolves `block_hash` (defaulting to head), fetches the state
  /// root, and asks storage for a proof covering `keys`.
  pub fn get_read_proof_at(
    &self,
    block_hash: Option<Hash>,
    keys: &[Vec<u8>],
  ) -> Result<(Hash, Vec<Vec<u8>>), FacadeError> {
    let hash = block_hash.unwrap_or_else(|| self.tree.read().best_block());
    let block = self.blocks.get(hash).ok_or(FacadeError::UnknownBlock(hash))?;
    let proof = self.storage.generate_trie_proof(block.header.state_root, keys)?;
    Ok((hash, proof))
  }

  pub fn get_runtime_version(&self) -> Result<crate::runtime::RuntimeVersion, FacadeError> {
    Ok(self.runtime.get_runtime(None)?.version())
  }

  pub fn get_metadata(&self) -> Result<Vec<u8>, FacadeError> {
    Ok(self.runtime.get_runtime(None)?.metadata())
  }

  /// A thin wrapper over the runtime's metadata-driven session-key
  /// codec; decodes the flat `(key_type_id, public_key)*` encoding the
  /// wire format uses.
  pub fn decode_session_keys(&self, encoded: &[u8]) -> Vec<(crate::keystore::KeyTypeId, Vec<u8>)> {
    encoded
      .chunks_exact(4 + 32)
      .map(|chunk| {
        let mut key_type = [0u8; 4];
        key_type.copy_from_slice(&chunk[..4]);
        (key_type, chunk[4..].to_vec())
      })
      .collect()
  }

  pub fn has_key(&self, key_type: crate::keystore::KeyTypeId, public_key_hex: &str) -> bool {
    self.keystore.has_key(key_type, public_key_hex)
  }

  pub fn insert_key(
    &self,
    key_type: crate::keystore::KeyTypeId,
    public_key_hex: &str,
    secret: Vec<u8>,
  ) -> Result<(), FacadeError> {
    Ok(self.keystore.insert_key(key_type, public_key_hex, secret)?)
  }

  pub fn genesis_hash(&self) -> Hash {
    self.genesis_hash
  }
}

#[cfg(test)]
mod tests {
  use {
    super::*,
    crate::{
      block::{Body, DigestItem, Header},
      runtime::{RuntimeError, RuntimeVersion, Validity},
      storage::InMemoryStorage,
      telemetry::RecordingSink,
    },
  };

  struct FakeInstance {
    code_hash: Hash,
  }

  impl RuntimeInstance for FakeInstance {
    fn version(&self) -> RuntimeVersion {
      RuntimeVersion {
        spec_name: "fake".into(),
        spec_version: 1,
        impl_version: 1,
      }
    }
    fn metadata(&self) -> Vec<u8> {
      vec![7]
    }
    fn validate_transaction(
      &self,
      _extrinsic: &[u8],
    ) -> Result<Validity, crate::runtime::InvalidTransaction> {
      Ok(Validity {
        priority: 1,
        requires: vec![],
        provides: vec![],
        longevity: 64,
        propagate: true,
      })
    }
    fn execute_block(&self, _header_and_body: &[u8]) -> Result<(), RuntimeError> {
      Ok(())
    }
    fn code_hash(&self) -> Hash {
      self.code_hash
    }
  }

  struct NullAnnouncer;
  impl Announcer for NullAnnouncer {
    fn announce(&self, _msg: BlockAnnounceMessage) {}
  }

  struct NullGossip;
  impl TransactionGossip for NullGossip {
    fn gossip_transaction(&self, _bytes: &[u8]) {}
  }

  fn genesis_block() -> Block {
    Block {
      header: Header {
        parent_hash: Hash::ZERO,
        number: 0,
        state_root: Hash::ZERO,
        extrinsics_root: Hash::ZERO,
        digest: vec![],
      },
      body: Body::new(),
    }
  }

  fn kernel() -> Kernel<FakeInstance> {
    let genesis = genesis_block();
    let genesis_runtime = Arc::new(FakeInstance {
      code_hash: Hash::digest(b"code-v1"),
    });
    let factory: InstanceFactory<FakeInstance> = Arc::new(|code: &[u8]| {
      Ok(Arc::new(FakeInstance {
        code_hash: Hash::digest(code),
      }))
    });
    Kernel::new(
      genesis,
      genesis_runtime,
      factory,
      Arc::new(InMemoryStorage::new()),
      Arc::new(crate::keystore::Keystore::new(vec![*b"babe"])),
      Arc::new(NullAnnouncer),
      Arc::new(NullGossip),
      Arc::new(RecordingSink::new()),
      16,
    )
  }

  #[test]
  fn handle_block_produced_appends_and_advances_head() {
    let kernel = kernel();
    let genesis_hash = kernel.genesis_hash();

    let block = Block {
      header: Header {
        parent_hash: genesis_hash,
        number: 1,
        state_root: Hash::digest(b"state1"),
        extrinsics_root: Hash::ZERO,
        digest: vec![DigestItem {
          engine_id: *b"BABE",
          payload: vec![],
        }],
      },
      body: vec![b"tx1".to_vec()],
    };

    kernel
      .handle_block_produced(block.clone(), TrieState::new(), 100)
      .unwrap();

    assert_eq!(kernel.best_block(), block.hash());
  }

  #[test]
  fn submitted_extrinsic_lands_in_queue() {
    let kernel = kernel();
    kernel.handle_submitted_extrinsic(b"tx".to_vec()).unwrap();
    assert_eq!(kernel.pool.lock().queue_len(), 1);
  }

  #[test]
  fn query_storage_returns_only_changed_keys() {
    let kernel = kernel();
    let genesis_hash = kernel.genesis_hash();

    let mut s1 = TrieState::new();
    s1.insert(b"k1".to_vec(), b"v1".to_vec());
    let root1 = kernel.storage.store_trie(&s1).unwrap();
    let b1 = Block {
      header: Header {
        parent_hash: genesis_hash,
        number: 1,
        state_root: root1,
        extrinsics_root: Hash::ZERO,
        digest: vec![],
      },
      body: Body::new(),
    };
    kernel.handle_block_produced(b1.clone(), s1.clone(), 0).unwrap();

    let mut s2 = s1.clone();
    s2.insert(b"k2".to_vec(), b"v2".to_vec());
    let root2 = kernel.storage.store_trie(&s2).unwrap();
    let b2 = Block {
      header: Header {
        parent_hash: b1.hash(),
        number: 2,
        state_root: root2,
        extrinsics_root: Hash::ZERO,
        digest: vec![],
      },
      body: Body::new(),
    };
    kernel.handle_block_produced(b2.clone(), s2, 1).unwrap();

    let result = kernel
      .query_storage(b1.hash(), Some(b2.hash()), &[b"k1".to_vec(), b"k2".to_vec()])
      .unwrap();

    // k1 unchanged between b1 and b2, so only b2's k2 insertion shows up.
    assert!(result.contains_key(&b1.hash()));
    assert!(result.contains_key(&b2.hash()));
    assert!(!result[&b2.hash()].contains_key(&b"k1".to_vec()));
    assert_eq!(result[&b2.hash()][&b"k2".to_vec()], b"v2".to_vec());
  }
}
