//! The transaction pool reconciler.
//!
//! Two `BTreeMap`-backed ordered multimaps (priority as sort key,
//! insertion sequence as tiebreak) with an auxiliary hash index for O(1)
//! removal-by-hash.

mod error;

pub use error::PoolError;

use {
  crate::{
    block::Extrinsic,
    primitives::Hash,
    runtime::{InvalidTransaction, Validity},
    telemetry::{TelemetryEvent, TelemetrySink},
  },
  std::{
    cmp::Reverse,
    collections::{BTreeMap, HashMap, VecDeque},
    sync::{
      atomic::{AtomicU64, Ordering},
      Arc,
    },
  },
};

#[derive(Debug, Clone)]
struct PoolEntry {
  extrinsic: Extrinsic,
  validity: Validity,
  seq: u64,
}

/// Bounded log of extrinsics dropped during reorg revalidation, for
/// diagnostics and telemetry.
pub struct RetentionLog {
  capacity: usize,
  entries: parking_lot::Mutex<VecDeque<(Hash, String)>>,
}

impl RetentionLog {
  pub fn new(capacity: usize) -> Self {
    Self {
      capacity,
      entries: parking_lot::Mutex::new(VecDeque::with_capacity(capacity)),
    }
  }

  fn record(&self, hash: Hash, reason: String) {
    let mut entries = self.entries.lock();
    if entries.len() == self.capacity {
      entries.pop_front();
    }
    entries.push_back((hash, reason));
  }

  pub fn entries(&self) -> Vec<(Hash, String)> {
    self.entries.lock().iter().cloned().collect()
  }
}

/// Two disjoint sets, `queue` (ready to include) and `pending` (awaiting
/// inclusion from a previous branch), ordered by descending priority
/// with insertion-order tiebreak.
pub struct TransactionPool {
  queue_order: BTreeMap<(Reverse<u64>, u64), Hash>,
  queue_entries: HashMap<Hash, PoolEntry>,
  pending: HashMap<Hash, PoolEntry>,
  next_seq: AtomicU64,
  retention: Arc<RetentionLog>,
  telemetry: Arc<dyn TelemetrySink>,
}

impl TransactionPool {
  pub fn new(telemetry: Arc<dyn TelemetrySink>, retention_capacity: usize) -> Self {
    Self {
      queue_order: BTreeMap::new(),
      queue_entries: HashMap::new(),
      pending: HashMap::new(),
      next_seq: AtomicU64::new(0),
      retention: Arc::new(RetentionLog::new(retention_capacity)),
      telemetry,
    }
  }

  pub fn retention_log(&self) -> &RetentionLog {
    &self.retention
  }

  fn next_seq(&self) -> u64 {
    self.next_seq.fetch_add(1, Ordering::Relaxed)
  }

  /// Inserts a validated extrinsic directly into `queue`.
  pub fn add_to_queue(&mut self, extrinsic: Extrinsic, validity: Validity) -> Hash {
    let hash = Hash::digest(&extrinsic);
    let seq = self.next_seq();
    self
      .queue_order
      .insert((Reverse(validity.priority), seq), hash);
    self.queue_entries.insert(
      hash,
      PoolEntry {
        extrinsic,
        validity,
        seq,
      },
    );
    hash
  }

  fn add_to_pending(&mut self, extrinsic: Extrinsic, validity: Validity) -> Hash {
    let hash = Hash::digest(&extrinsic);
    let seq = self.next_seq();
    self.pending.insert(
      hash,
      PoolEntry {
        extrinsic,
        validity,
        seq,
      },
    );
    hash
  }

  /// Pops the highest-priority queued extrinsic (ties by insertion order).
  pub fn pop(&mut self) -> Option<Extrinsic> {
    let key = *self.queue_order.keys().next()?;
    let hash = self.queue_order.remove(&key)?;
    self.queue_entries.remove(&hash).map(|e| e.extrinsic)
  }

  pub fn remove_extrinsic(&mut self, hash: &Hash) {
    if let Some(entry) = self.queue_entries.remove(hash) {
      self.queue_order.remove(&(Reverse(entry.validity.priority), entry.seq));
    }
    self.pending.remove(hash);
  }

  pub fn pending(&self) -> impl Iterator<Item = &Extrinsic> {
    self.pending.values().map(|e| &e.extrinsic)
  }

  pub fn queue_len(&self) -> usize {
    self.queue_entries.len()
  }

  pub fn pending_len(&self) -> usize {
    self.pending.len()
  }

  pub fn contains_pending(&self, extrinsic: &[u8]) -> bool {
    self.pending.contains_key(&Hash::digest(extrinsic))
  }

  /// For each extrinsic in `block.body`, evict it from both sets.
  pub fn maintain(&mut self, body: &[Extrinsic]) {
    for extrinsic in body {
      let hash = Hash::digest(extrinsic);
      self.remove_extrinsic(&hash);
    }
  }

  /// Like [`maintain`](Self::maintain), but only evicts from `queue`.
  ///
  /// Used when advancing into a block during a reorg: that block may
  /// re-include an extrinsic a retreat earlier in the same chain history
  /// returned to `pending` awaiting revalidation. Seeing the same bytes
  /// land back on a canonical block doesn't resolve that entry on its
  /// own — only `revalidate_pending` clears `pending`, so the retention
  /// log and its telemetry counter stay meaningful.
  pub fn maintain_advance(&mut self, body: &[Extrinsic]) {
    for extrinsic in body {
      let hash = Hash::digest(extrinsic);
      if let Some(entry) = self.queue_entries.remove(&hash) {
        self.queue_order.remove(&(Reverse(entry.validity.priority), entry.seq));
      }
    }
  }

  /// On reorg retreat: re-insert every extrinsic of a discarded block
  /// into `pending`, not `queue` — it has not been re-validated against
  /// the new head.
  pub fn on_retreat(&mut self, body: &[Extrinsic]) {
    for extrinsic in body {
      if self.queue_entries.contains_key(&Hash::digest(extrinsic))
        || self.pending.contains_key(&Hash::digest(extrinsic))
      {
        continue;
      }
      // retreated extrinsics carry no known validity yet; a longevity-0,
      // minimum-priority placeholder keeps them out of `queue` ordering
      // until `revalidate_pending` assigns a real one.
      self.add_to_pending(
        extrinsic.clone(),
        Validity {
          priority: 0,
          requires: vec![],
          provides: vec![],
          longevity: 0,
          propagate: false,
        },
      );
    }
  }

  /// Calls `validate` (the runtime's `ValidateTransaction`) for each
  /// pending extrinsic; moves successfully revalidated ones into `queue`,
  /// drops fatally-invalid ones into the retention log, and keeps
  /// retryable ones in `pending`.
  pub fn revalidate_pending<F>(&mut self, mut validate: F)
  where
    F: FnMut(&Extrinsic) -> Result<Validity, InvalidTransaction>,
  {
    let pending_hashes: Vec<Hash> = self.pending.keys().copied().collect();
    for hash in pending_hashes {
      let entry = match self.pending.get(&hash) {
        Some(e) => e.clone(),
        None => continue,
      };
      match validate(&entry.extrinsic) {
        Ok(validity) => {
          self.pending.remove(&hash);
          self.add_to_queue(entry.extrinsic, validity);
        }
        Err(invalid) if invalid.is_retryable() => {
          // stays in pending, validity unchanged.
        }
        Err(invalid) => {
          self.pending.remove(&hash);
          let reason = format!("{invalid:?}");
          self.retention.record(hash, reason.clone());
          self
            .telemetry
            .emit(TelemetryEvent::DroppedOnReorg { extrinsic_hash: hash, reason });
        }
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use {super::*, crate::telemetry::RecordingSink};

  fn validity(priority: u64) -> Validity {
    Validity {
      priority,
      requires: vec![],
      provides: vec![],
      longevity: 64,
      propagate: true,
    }
  }

  fn pool() -> TransactionPool {
    TransactionPool::new(Arc::new(RecordingSink::new()), 16)
  }

  #[test]
  fn pops_in_descending_priority_with_insertion_tiebreak() {
    let mut pool = pool();
    pool.add_to_queue(b"a".to_vec(), validity(1));
    pool.add_to_queue(b"b".to_vec(), validity(4));
    pool.add_to_queue(b"c".to_vec(), validity(2));
    pool.add_to_queue(b"d".to_vec(), validity(17));
    pool.add_to_queue(b"e".to_vec(), validity(2));

    let order: Vec<Extrinsic> = std::iter::from_fn(|| pool.pop()).collect();
    assert_eq!(
      order,
      vec![
        b"d".to_vec(),
        b"b".to_vec(),
        b"c".to_vec(),
        b"e".to_vec(),
        b"a".to_vec(),
      ]
    );
  }

  #[test]
  fn maintain_removes_included_extrinsics() {
    let mut pool = pool();
    pool.add_to_queue(b"a".to_vec(), validity(1));
    pool.add_to_queue(b"b".to_vec(), validity(4));

    pool.maintain(&[b"a".to_vec()]);

    let order: Vec<Extrinsic> = std::iter::from_fn(|| pool.pop()).collect();
    assert_eq!(order, vec![b"b".to_vec()]);
  }

  #[test]
  fn retreat_reinserts_into_pending_not_queue() {
    let mut pool = pool();
    pool.on_retreat(&[b"e".to_vec()]);

    assert_eq!(pool.queue_len(), 0);
    assert!(pool.contains_pending(b"e"));
  }

  #[test]
  fn revalidate_moves_valid_and_drops_fatal() {
    let mut pool = pool();
    pool.on_retreat(&[b"ok".to_vec(), b"bad-sig".to_vec(), b"too-soon".to_vec()]);

    pool.revalidate_pending(|e| {
      if e == b"ok" {
        Ok(validity(9))
      } else if e == b"bad-sig" {
        Err(InvalidTransaction::BadSignature)
      } else {
        Err(InvalidTransaction::Future)
      }
    });

    assert_eq!(pool.queue_len(), 1);
    assert!(pool.contains_pending(b"too-soon"));
    assert!(!pool.contains_pending(b"bad-sig"));
    assert_eq!(pool.retention_log().entries().len(), 1);
  }
}
