//! The in-memory block tree.
//!
//! Implemented as an arena (a flat `Vec<Node>`) with children/parent links
//! stored as indices, rather than a graph of `Rc<RefCell<Node>>` handles —
//! this keeps pruning a bulk index release instead of a pointer-juggling
//! tree walk.

mod error;

pub use error::TreeError;

use crate::{block::Block, primitives::Hash};

type Index = usize;

#[derive(Debug, Clone)]
struct Node {
  hash: Hash,
  parent_hash: Hash,
  parent: Option<Index>,
  number: u64,
  depth: u64,
  arrival_time_ms: u64,
  children: Vec<Index>,
}

/// An in-memory forest of candidate blocks rooted at the last finalized
/// block.
#[derive(Debug)]
pub struct BlockTree {
  nodes: Vec<Node>,
  by_hash: std::collections::HashMap<Hash, Index>,
  root: Index,
  head: Index,
}

impl BlockTree {
  /// Creates a new tree rooted (and headed) at the given finalized block.
  pub fn new(finalized_hash: Hash, finalized_number: u64) -> Self {
    let root_node = Node {
      hash: finalized_hash,
      parent_hash: Hash::ZERO,
      parent: None,
      number: finalized_number,
      depth: 0,
      arrival_time_ms: 0,
      children: Vec::new(),
    };
    let mut by_hash = std::collections::HashMap::new();
    by_hash.insert(finalized_hash, 0);
    Self {
      nodes: vec![root_node],
      by_hash,
      root: 0,
      head: 0,
    }
  }

  fn index_of(&self, hash: Hash) -> Option<Index> {
    self.by_hash.get(&hash).copied()
  }

  /// Inserts a new block into the tree.
  ///
  /// Rejects with [`TreeError::ParentNotFound`] if the parent is unknown,
  /// or [`TreeError::BlockAlreadyExists`] if the block is already present.
  /// On success, re-evaluates the fork-choice rule and may update `head`.
  pub fn add_block(
    &mut self,
    block: &Block,
    arrival_time_ms: u64,
  ) -> Result<(), TreeError> {
    let hash = block.hash();
    if self.by_hash.contains_key(&hash) {
      return Err(TreeError::BlockAlreadyExists(hash));
    }
    let parent_hash = block.parent_hash();
    let parent_idx = self
      .index_of(parent_hash)
      .ok_or(TreeError::ParentNotFound(parent_hash))?;

    let depth = self.nodes[parent_idx].depth + 1;
    let new_idx = self.nodes.len();
    self.nodes.push(Node {
      hash,
      parent_hash,
      parent: Some(parent_idx),
      number: block.number(),
      depth,
      arrival_time_ms,
      children: Vec::new(),
    });
    self.nodes[parent_idx].children.push(new_idx);
    self.by_hash.insert(hash, new_idx);

    self.recompute_head();
    Ok(())
  }

  /// Recomputes `head` among all leaves using the fork-choice rule (spec
  /// §4.B): greatest depth, tie-broken by earliest arrival time, then by
  /// lexicographically smallest hash.
  fn recompute_head(&mut self) {
    let mut best: Option<Index> = None;
    for &idx in self.leaf_indices().iter() {
      best = Some(match best {
        None => idx,
        Some(current) => {
          let a = &self.nodes[idx];
          let b = &self.nodes[current];
          let better = match a.depth.cmp(&b.depth) {
            std::cmp::Ordering::Greater => true,
            std::cmp::Ordering::Less => false,
            std::cmp::Ordering::Equal => {
              match a.arrival_time_ms.cmp(&b.arrival_time_ms) {
                std::cmp::Ordering::Less => true,
                std::cmp::Ordering::Greater => false,
                std::cmp::Ordering::Equal => {
                  a.hash.as_bytes() < b.hash.as_bytes()
                }
              }
            }
          };
          if better {
            idx
          } else {
            current
          }
        }
      });
    }
    // the root itself is a leaf when no blocks have been added yet.
    self.head = best.unwrap_or(self.root);
  }

  fn leaf_indices(&self) -> Vec<Index> {
    self
      .nodes
      .iter()
      .enumerate()
      .filter(|(_, n)| n.children.is_empty())
      .map(|(i, _)| i)
      .collect()
  }

  /// The current head's hash. O(1).
  pub fn best_block(&self) -> Hash {
    self.nodes[self.head].hash
  }

  /// All nodes with no children.
  pub fn leaves(&self) -> Vec<Hash> {
    self.leaf_indices().iter().map(|&i| self.nodes[i].hash).collect()
  }

  /// Depth-first walk from `b` looking for `a`. `a == b` is always `true`.
  /// Returns `false` if either node is absent.
  pub fn is_descendant_of(&self, a: Hash, b: Hash) -> bool {
    if a == b {
      return self.by_hash.contains_key(&a);
    }
    let (Some(mut cur), Some(_)) = (self.index_of(b), self.index_of(a)) else {
      return false;
    };
    loop {
      let node = &self.nodes[cur];
      if node.hash == a {
        return true;
      }
      match node.parent {
        Some(p) => cur = p,
        None => return false,
      }
    }
  }

  /// Walks `descendant.parent` until `ancestor` is reached, then reverses.
  /// Fails with [`TreeError::NotOnPath`] if `ancestor` is never reached.
  pub fn subchain(&self, ancestor: Hash, descendant: Hash) -> Result<Vec<Hash>, TreeError> {
    let mut idx = self
      .index_of(descendant)
      .ok_or(TreeError::NotOnPath(descendant))?;
    self
      .index_of(ancestor)
      .ok_or(TreeError::NotOnPath(ancestor))?;

    let mut path = Vec::new();
    loop {
      let node = &self.nodes[idx];
      path.push(node.hash);
      if node.hash == ancestor {
        path.reverse();
        return Ok(path);
      }
      match node.parent {
        Some(p) => idx = p,
        None => return Err(TreeError::NotOnPath(ancestor)),
      }
    }
  }

  /// Walks both nodes to equal depth, then steps in lockstep toward the
  /// root until they converge.
  pub fn highest_common_ancestor(&self, a: Hash, b: Hash) -> Result<Hash, TreeError> {
    let mut ia = self.index_of(a).ok_or(TreeError::NotOnPath(a))?;
    let mut ib = self.index_of(b).ok_or(TreeError::NotOnPath(b))?;

    while self.nodes[ia].depth > self.nodes[ib].depth {
      ia = self.nodes[ia].parent.expect("depth > 0 implies a parent");
    }
    while self.nodes[ib].depth > self.nodes[ia].depth {
      ib = self.nodes[ib].parent.expect("depth > 0 implies a parent");
    }
    while ia != ib {
      ia = self.nodes[ia].parent.ok_or(TreeError::DisjointChains)?;
      ib = self.nodes[ib].parent.ok_or(TreeError::DisjointChains)?;
    }
    Ok(self.nodes[ia].hash)
  }

  /// Rewrites `root` to the finalized node, releasing the discarded
  /// subtrees (siblings of the finalized block along its ancestor chain,
  /// and all ancestors).
  pub fn prune_below(&mut self, finalized_hash: Hash) -> Result<(), TreeError> {
    let new_root = self
      .index_of(finalized_hash)
      .ok_or(TreeError::NotOnPath(finalized_hash))?;

    // collect the subtree rooted at new_root (the nodes we keep).
    let mut keep = std::collections::HashSet::new();
    let mut stack = vec![new_root];
    while let Some(idx) = stack.pop() {
      keep.insert(idx);
      stack.extend(self.nodes[idx].children.iter().copied());
    }

    let mut remap = std::collections::HashMap::new();
    let mut new_nodes = Vec::with_capacity(keep.len());
    // stable order: iterate by original index so children indices can be
    // remapped in a second pass.
    let mut ordered: Vec<Index> = keep.into_iter().collect();
    ordered.sort_unstable();
    for (new_idx, &old_idx) in ordered.iter().enumerate() {
      remap.insert(old_idx, new_idx);
    }
    for &old_idx in &ordered {
      let old = &self.nodes[old_idx];
      new_nodes.push(Node {
        hash: old.hash,
        parent_hash: old.parent_hash,
        parent: if old_idx == new_root {
          None
        } else {
          old.parent.map(|p| remap[&p])
        },
        number: old.number,
        depth: old.depth - self.nodes[new_root].depth,
        arrival_time_ms: old.arrival_time_ms,
        children: old.children.iter().map(|c| remap[c]).collect(),
      });
    }

    let new_by_hash = new_nodes
      .iter()
      .enumerate()
      .map(|(i, n)| (n.hash, i))
      .collect();

    self.nodes = new_nodes;
    self.by_hash = new_by_hash;
    self.root = remap[&new_root];
    self.recompute_head();
    Ok(())
  }
}
