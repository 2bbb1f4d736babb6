//! The runtime registry: block hash → WASM runtime instance, with
//! copy-on-write identity sharing across non-upgrading blocks and a
//! separate, non-mutating code-substitution path.
//!
//! Generic over an injected `RuntimeInstance` trait so that constructing
//! a runtime from a code blob (`InstanceFactory`) stays an external
//! collaborator — the WASM executor itself lives outside this crate.

mod error;

pub use error::RuntimeError;

use {
  crate::{
    primitives::Hash,
    telemetry::{TelemetryEvent, TelemetrySink},
  },
  std::{collections::HashMap, sync::Arc},
};

/// The state key under which the runtime code blob is stored.
pub const CODE_STORAGE_KEY: &[u8] = b":code";

/// The concrete shape of an "opaque runtime instance". A real
/// implementation wraps a Wasmer/Wasmtime module; construction from a code
/// blob is delegated to an [`InstanceFactory`].
pub trait RuntimeInstance: Send + Sync {
  fn version(&self) -> RuntimeVersion;
  fn metadata(&self) -> Vec<u8>;
  fn validate_transaction(&self, extrinsic: &[u8]) -> Result<Validity, InvalidTransaction>;
  fn execute_block(&self, header_and_body: &[u8]) -> Result<(), RuntimeError>;
  fn code_hash(&self) -> Hash;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeVersion {
  pub spec_name: String,
  pub spec_version: u32,
  pub impl_version: u32,
}

/// Transaction validity outcome. `requires`/`provides` are dependency
/// tags used by the pool to decide eligibility.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Validity {
  pub priority: u64,
  pub requires: Vec<Vec<u8>>,
  pub provides: Vec<Vec<u8>>,
  pub longevity: u64,
  pub propagate: bool,
}

/// Why a `validate_transaction` call failed, classified for pool
/// eviction: fatal errors drop the extrinsic, retryable ones keep it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvalidTransaction {
  BadSignature,
  Future,
  Stale,
  Custom(u8),
}

impl InvalidTransaction {
  pub fn is_retryable(&self) -> bool {
    matches!(self, InvalidTransaction::Future | InvalidTransaction::Stale)
  }
}

/// Constructs a [`RuntimeInstance`] from a raw code blob. External
/// collaborator; the executor itself is out of scope.
pub type InstanceFactory<R> = Arc<dyn Fn(&[u8]) -> Result<Arc<R>, RuntimeError> + Send + Sync>;

/// Block hash → runtime instance map, behind a reader/writer lock;
/// instances must themselves be reentrant under concurrent reads.
pub struct RuntimeRegistry<R: RuntimeInstance> {
  bindings: parking_lot::RwLock<HashMap<Hash, Arc<R>>>,
  best_block: parking_lot::RwLock<Option<Hash>>,
  code_substitutions: parking_lot::RwLock<HashMap<Hash, Hash>>,
  telemetry: Arc<dyn TelemetrySink>,
}

impl<R: RuntimeInstance> RuntimeRegistry<R> {
  pub fn new(telemetry: Arc<dyn TelemetrySink>) -> Self {
    Self {
      bindings: parking_lot::RwLock::new(HashMap::new()),
      best_block: parking_lot::RwLock::new(None),
      code_substitutions: parking_lot::RwLock::new(HashMap::new()),
      telemetry,
    }
  }

  /// Records which block is currently best, so `get_runtime(None)`
  /// resolves to the instance bound to it.
  pub fn set_best_block(&self, block_hash: Hash) {
    *self.best_block.write() = Some(block_hash);
  }

  pub fn get_runtime(&self, block_hash: Option<Hash>) -> Result<Arc<R>, RuntimeError> {
    let hash = match block_hash {
      Some(h) => h,
      None => self.best_block.read().ok_or(RuntimeError::NotFound(Hash::ZERO))?,
    };
    self
      .bindings
      .read()
      .get(&hash)
      .cloned()
      .ok_or(RuntimeError::NotFound(hash))
  }

  /// Idempotent; rebinding the same hash to a *different* instance is a
  /// logic error.
  pub fn store_runtime(&self, block_hash: Hash, instance: Arc<R>) -> Result<(), RuntimeError> {
    let mut bindings = self.bindings.write();
    match bindings.get(&block_hash) {
      Some(existing) if existing.code_hash() != instance.code_hash() => {
        Err(RuntimeError::ConflictingBinding(block_hash))
      }
      _ => {
        bindings.insert(block_hash, instance);
        Ok(())
      }
    }
  }

  /// Reads `:code` from `new_state`. Binds `new_block_hash` to the
  /// parent's instance (identity shared) when unchanged, else constructs
  /// and binds a fresh instance and emits `RuntimeUpgraded`.
  pub fn handle_runtime_changes<F>(
    &self,
    read_code: F,
    parent_runtime: &Arc<R>,
    new_block_hash: Hash,
    factory: &InstanceFactory<R>,
  ) -> Result<Arc<R>, RuntimeError>
  where
    F: FnOnce(&[u8]) -> Option<Vec<u8>>,
  {
    let new_code = read_code(CODE_STORAGE_KEY);
    let new_code_hash = new_code.as_deref().map(Hash::digest);

    let instance = if new_code_hash == Some(parent_runtime.code_hash())
      || new_code_hash.is_none()
    {
      parent_runtime.clone()
    } else {
      let code = new_code.expect("new_code_hash is Some only when new_code is Some");
      let instance = factory(&code)?;
      self.telemetry.emit(TelemetryEvent::RuntimeUpgraded {
        block_hash: new_block_hash,
        code_hash: instance.code_hash(),
      });
      instance
    };

    self.store_runtime(new_block_hash, instance.clone())?;
    Ok(instance)
  }

  /// Constructs a replacement instance for `block_hash` without mutating
  /// the parent's `code_hash` — that hash is authenticated by the block
  /// header, so a substitution must never rewrite it.
  pub fn handle_code_substitution(
    &self,
    block_hash: Hash,
    code: &[u8],
    constructor: &InstanceFactory<R>,
  ) -> Result<Arc<R>, RuntimeError> {
    let replacement = constructor(code)?;
    self.code_substitutions.write().insert(block_hash, block_hash);
    self.bindings.write().insert(block_hash, replacement.clone());
    Ok(replacement)
  }

  /// The block hash most recently substituted, if any.
  pub fn code_substituted_block_hash(&self, block_hash: Hash) -> Option<Hash> {
    self.code_substitutions.read().get(&block_hash).copied()
  }
}

#[cfg(test)]
mod tests {
  use {super::*, crate::telemetry::RecordingSink};

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
      vec![]
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
      Ok(())
    }
    fn code_hash(&self) -> Hash {
      self.code_hash
    }
  }

  fn factory() -> InstanceFactory<FakeInstance> {
    Arc::new(|code: &[u8]| {
      Ok(Arc::new(FakeInstance {
        code_hash: Hash::digest(code),
      }))
    })
  }

  #[test]
  fn unchanged_code_shares_instance_identity() {
    let telemetry = Arc::new(RecordingSink::new());
    let registry = RuntimeRegistry::new(telemetry.clone());
    let parent_code = b"code-v1".to_vec();
    let parent = Arc::new(FakeInstance {
      code_hash: Hash::digest(&parent_code),
    });
    let parent_hash = Hash::digest(b"parent-block");
    registry.store_runtime(parent_hash, parent.clone()).unwrap();
    registry.set_best_block(parent_hash);

    let child_hash = Hash::digest(b"child-block");
    let child = registry
      .handle_runtime_changes(
        |_| Some(parent_code.clone()),
        &parent,
        child_hash,
        &factory(),
      )
      .unwrap();

    assert_eq!(child.code_hash(), parent.code_hash());
    assert!(Arc::ptr_eq(&child, &parent));
    assert!(telemetry.events().is_empty());

    // the parent binding is unaffected.
    let fetched_parent = registry.get_runtime(Some(parent_hash)).unwrap();
    assert_eq!(fetched_parent.code_hash(), parent.code_hash());
  }

  #[test]
  fn changed_code_creates_new_instance_and_emits_upgrade() {
    let telemetry = Arc::new(RecordingSink::new());
    let registry = RuntimeRegistry::new(telemetry.clone());
    let parent = Arc::new(FakeInstance {
      code_hash: Hash::digest(b"code-v1"),
    });
    let parent_hash = Hash::digest(b"parent-block");
    registry.store_runtime(parent_hash, parent.clone()).unwrap();

    let child_hash = Hash::digest(b"child-block");
    let child = registry
      .handle_runtime_changes(
        |_| Some(b"code-v2".to_vec()),
        &parent,
        child_hash,
        &factory(),
      )
      .unwrap();

    assert_ne!(child.code_hash(), parent.code_hash());
    assert_eq!(telemetry.events().len(), 1);

    let fetched_parent = registry.get_runtime(Some(parent_hash)).unwrap();
    assert_eq!(fetched_parent.code_hash(), Hash::digest(b"code-v1"));
  }

  #[test]
  fn code_substitution_does_not_mutate_parent() {
    let registry: RuntimeRegistry<FakeInstance> =
      RuntimeRegistry::new(Arc::new(RecordingSink::new()));
    let parent_hash = Hash::digest(b"parent-block");
    let parent = Arc::new(FakeInstance {
      code_hash: Hash::digest(b"code-v1"),
    });
    registry.store_runtime(parent_hash, parent.clone()).unwrap();

    let substituted_hash = Hash::digest(b"bad-historical-block");
    registry
      .handle_code_substitution(substituted_hash, b"patched-code", &factory())
      .unwrap();

    assert_eq!(
      registry.code_substituted_block_hash(substituted_hash),
      Some(substituted_hash)
    );
    let fetched_parent = registry.get_runtime(Some(parent_hash)).unwrap();
    assert_eq!(fetched_parent.code_hash(), Hash::digest(b"code-v1"));
  }
}
