//! The chain reorg controller: computes the retreat/advance path between
//! two block-tree nodes and orchestrates the block tree and transaction
//! pool as the chain head moves between them.

mod error;

pub use error::ReorgError;

use crate::{
  block::Extrinsic,
  pool::TransactionPool,
  primitives::Hash,
  tree::{BlockTree, TreeError},
};

/// Looks up the body of a block already known to the tree. A separate
/// collaborator rather than a field on `TreeNode` since block bodies are
/// a storage-layer concern, not a tree-shape one.
pub trait BlockBodyLookup {
  fn body(&self, hash: Hash) -> Option<Vec<Extrinsic>>;
}

/// Computes `anc = highest_common_ancestor(old_head, new_head)`, then
/// retreats the discarded branch (newest first) and advances the new one
/// (oldest first), reconciling `pool` at each step.
///
/// Advance uses [`TransactionPool::maintain_advance`], not the generic
/// `maintain`: a block being re-advanced into may re-include an
/// extrinsic a sibling retreat earlier in this chain's history returned
/// to `pending`, and that placement is only resolved by revalidation,
/// not by the extrinsic's bytes reappearing on a canonical block.
///
/// No-op when `old_head == new_head`. When `new_head` is a direct
/// descendant of `old_head` the retreat set is empty and only advance
/// runs. A missing common ancestor is `DisjointChains` and must not
/// commit any head change — the caller rolls back by simply not swapping
/// its stored head.
pub fn reorg(
  tree: &BlockTree,
  pool: &mut TransactionPool,
  bodies: &dyn BlockBodyLookup,
  old_head: Hash,
  new_head: Hash,
) -> Result<(), ReorgError> {
  if old_head == new_head {
    return Ok(());
  }

  let anc = match tree.highest_common_ancestor(old_head, new_head) {
    Ok(hash) => hash,
    Err(TreeError::DisjointChains) => return Err(ReorgError::DisjointChains),
    Err(e) => return Err(e.into()),
  };

  let mut retreat = tree.subchain(anc, old_head)?;
  retreat.retain(|h| *h != anc);
  retreat.reverse(); // newest first

  let mut advance = tree.subchain(anc, new_head)?;
  advance.retain(|h| *h != anc); // oldest first, already in that order

  for hash in retreat {
    let body = bodies.body(hash).ok_or(ReorgError::MissingBody(hash))?;
    pool.on_retreat(&body);
  }

  for hash in advance {
    let body = bodies.body(hash).ok_or(ReorgError::MissingBody(hash))?;
    pool.maintain_advance(&body);
  }

  Ok(())
}

#[cfg(test)]
mod tests {
  use {
    super::*,
    crate::{
      block::{Block, Body, Header},
      telemetry::RecordingSink,
    },
    std::{collections::HashMap, sync::Arc},
  };

  struct MapBodies(HashMap<Hash, Vec<Extrinsic>>);
  impl BlockBodyLookup for MapBodies {
    fn body(&self, hash: Hash) -> Option<Vec<Extrinsic>> {
      self.0.get(&hash).cloned()
    }
  }

  fn block(parent: Hash, number: u64, extra: u8, body: Body) -> Block {
    Block {
      header: Header {
        parent_hash: parent,
        number,
        state_root: Hash::digest(&[number as u8, extra]),
        extrinsics_root: Hash::ZERO,
        digest: vec![],
      },
      body,
    }
  }

  #[test]
  fn fork_and_back_reinserts_extrinsic_exactly_once() {
    let genesis = Hash::digest(b"genesis");
    let mut tree = BlockTree::new(genesis, 0);
    let mut bodies = HashMap::new();

    // linear chain g,1,2,3,4,5
    let b1 = block(genesis, 1, 0, vec![]);
    tree.add_block(&b1, 0).unwrap();
    bodies.insert(b1.hash(), b1.body.clone());
    let b2 = block(b1.hash(), 2, 0, vec![]);
    tree.add_block(&b2, 0).unwrap();
    bodies.insert(b2.hash(), b2.body.clone());
    let b3 = block(b2.hash(), 3, 0, vec![]);
    tree.add_block(&b3, 0).unwrap();
    bodies.insert(b3.hash(), b3.body.clone());
    let extrinsic: Extrinsic = b"e".to_vec();
    let b4 = block(b3.hash(), 4, 0, vec![]);
    tree.add_block(&b4, 0).unwrap();
    bodies.insert(b4.hash(), b4.body.clone());
    let b5 = block(b4.hash(), 5, 0, vec![]);
    tree.add_block(&b5, 0).unwrap();
    bodies.insert(b5.hash(), b5.body.clone());

    // fork branch 2,3',4' where 4' contains extrinsic e
    let b3p = block(b2.hash(), 3, 1, vec![]);
    tree.add_block(&b3p, 0).unwrap();
    bodies.insert(b3p.hash(), b3p.body.clone());
    let b4p = block(b3p.hash(), 4, 1, vec![extrinsic.clone()]);
    tree.add_block(&b4p, 0).unwrap();
    bodies.insert(b4p.hash(), b4p.body.clone());

    let mut pool = TransactionPool::new(Arc::new(RecordingSink::new()), 16);
    let lookup = MapBodies(bodies);

    reorg(&tree, &mut pool, &lookup, b4p.hash(), b5.hash()).unwrap();
    reorg(&tree, &mut pool, &lookup, b5.hash(), b4p.hash()).unwrap();

    assert!(pool.contains_pending(&extrinsic));
    assert_eq!(pool.pending_len(), 1);
  }

  #[test]
  fn direct_descendant_is_advance_only() {
    let genesis = Hash::digest(b"genesis");
    let mut tree = BlockTree::new(genesis, 0);
    let mut bodies = HashMap::new();
    let e: Extrinsic = b"tx".to_vec();
    let b1 = block(genesis, 1, 0, vec![e.clone()]);
    tree.add_block(&b1, 0).unwrap();
    bodies.insert(b1.hash(), b1.body.clone());

    let mut pool = TransactionPool::new(Arc::new(RecordingSink::new()), 16);
    pool.add_to_queue(
      e.clone(),
      crate::runtime::Validity {
        priority: 1,
        requires: vec![],
        provides: vec![],
        longevity: 10,
        propagate: true,
      },
    );
    let lookup = MapBodies(bodies);

    reorg(&tree, &mut pool, &lookup, genesis, b1.hash()).unwrap();
    assert_eq!(pool.queue_len(), 0);
  }

  #[test]
  fn disjoint_chains_is_fatal() {
    let genesis_a = Hash::digest(b"a");
    let tree_a = BlockTree::new(genesis_a, 0);
    let lookup = MapBodies(HashMap::new());
    let mut pool = TransactionPool::new(Arc::new(RecordingSink::new()), 16);

    let unrelated = Hash::digest(b"unrelated");
    let err = reorg(&tree_a, &mut pool, &lookup, genesis_a, unrelated).unwrap_err();
    assert!(matches!(err, ReorgError::DisjointChains) || matches!(err, ReorgError::Tree(_)));
  }
}
