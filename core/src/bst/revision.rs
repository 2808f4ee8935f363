use std::convert::TryFrom;
use std::mem;

use log::{debug, trace};

use super::{Augment, Compare, NodeId, Tree, TreeError};

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Clone, Copy)]
pub struct RevisionId(u32);

impl RevisionId {
  fn index(self) -> usize {
    self.0 as usize
  }
}

/// A committed diff, one node of the revision tree.
///
/// While the tree state is at or below the revision, `inserted` nodes are live and
/// `erased` nodes are free. Toggling the revision swaps both sets, so it always
/// describes the transition that would be applied by the next toggle.
#[derive(Debug, Clone)]
pub struct Revision<T> {
  parent: Option<RevisionId>,
  children: Vec<RevisionId>,
  depth: usize,

  inserted: Vec<NodeId>,
  erased: Vec<NodeId>,
  // payload snapshots, parallel to the node lists
  inserted_data: Option<Vec<T>>,
  erased_data: Option<Vec<T>>,
  changed: Vec<(NodeId, T)>,
}

impl<T> Revision<T> {
  fn new(parent: Option<RevisionId>, depth: usize) -> Revision<T> {
    Revision {
      parent,
      children: Vec::new(),
      depth,
      inserted: Vec::new(),
      erased: Vec::new(),
      inserted_data: None,
      erased_data: None,
      changed: Vec::new(),
    }
  }

  pub fn parent(&self) -> Option<RevisionId> {
    self.parent
  }

  pub fn children(&self) -> &[RevisionId] {
    &self.children
  }

  pub fn depth(&self) -> usize {
    self.depth
  }

  /// Number of node insertions, erasures and changes recorded.
  pub fn len(&self) -> usize {
    self.inserted.len() + self.erased.len() + self.changed.len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }
}

fn alloc_error(what: &'static str) -> TreeError {
  TreeError::Alloc { what }
}

impl<T, C, A> Tree<T, C, A> {
  pub fn tip(&self) -> Option<RevisionId> {
    self.tip
  }

  /// # Panics
  ///
  /// Panics when the revision does not belong to this tree.
  pub fn revision(&self, id: RevisionId) -> &Revision<T> {
    &self.revisions[id.index()]
  }

  pub fn revision_count(&self) -> usize {
    self.revisions.len()
  }

  fn parent_of(&self, id: RevisionId) -> RevisionId {
    self.revisions[id.index()].parent.unwrap_or(id)
  }

  fn common_ancestor(&self, mut a: RevisionId, mut b: RevisionId) -> RevisionId {
    while self.revisions[a.index()].depth > self.revisions[b.index()].depth {
      a = self.parent_of(a);
    }
    while self.revisions[b.index()].depth > self.revisions[a.index()].depth {
      b = self.parent_of(b);
    }
    while a != b {
      a = self.parent_of(a);
      b = self.parent_of(b);
    }
    a
  }

  fn push_revision(&mut self, revision: Revision<T>) -> Result<RevisionId, TreeError> {
    let id = u32::try_from(self.revisions.len())
      .map(RevisionId)
      .map_err(|_| alloc_error("revision id"))?;
    self
      .revisions
      .try_reserve(1)
      .map_err(|_| alloc_error("revision"))?;
    self.revisions.push(revision);
    Ok(id)
  }

  fn touch(&mut self, node: NodeId, touched: &mut Vec<NodeId>) {
    let entry = &mut self.nodes[node.index()];
    if entry.was_in_tree.is_none() {
      entry.was_in_tree = Some(entry.in_tree);
      touched.push(node);
    }
  }
}

impl<T, C, A> Tree<T, C, A>
where
  T: Clone,
  C: Compare<T>,
  A: Augment<T>,
{
  /// Captures the changes made since the previous commit into a new revision.
  ///
  /// The first commit only creates the root revision and starts tracking. When
  /// nothing changed, the current tip is returned.
  pub fn commit(&mut self) -> Result<RevisionId, TreeError> {
    let tip = match self.tip {
      Some(tip) => tip,
      None => {
        let root = self.push_revision(Revision::new(None, 0))?;
        self.tip = Some(root);
        debug!("History started at {:?}", root);
        return Ok(root);
      }
    };

    let mut inserted = Vec::new();
    let mut erased = Vec::new();
    let mut erased_data = Vec::new();
    let mut changed = Vec::new();
    inserted
      .try_reserve(self.inserted.len())
      .map_err(|_| alloc_error("inserted set"))?;
    erased
      .try_reserve(self.erased.len())
      .and_then(|_| erased_data.try_reserve(self.erased.len()))
      .map_err(|_| alloc_error("erased set"))?;
    changed
      .try_reserve(self.saved.len())
      .map_err(|_| alloc_error("changed set"))?;
    self
      .revisions
      .try_reserve(1)
      .and_then(|_| self.revisions[tip.index()].children.try_reserve(1))
      .map_err(|_| alloc_error("revision"))?;

    for (node, original) in self.saved.drain(..) {
      let entry = &mut self.nodes[node.index()];
      entry.saved = false;
      if entry.in_tree {
        changed.push((node, original));
      } else {
        // the erasure snapshot must hold the payload from before the window
        entry.data = original;
      }
    }

    for node in self.inserted.drain(..) {
      let entry = &mut self.nodes[node.index()];
      entry.inserted = false;
      if entry.in_tree {
        inserted.push(node);
      }
    }

    for node in self.erased.drain(..) {
      let entry = &self.nodes[node.index()];
      if !entry.in_tree {
        erased.push(node);
        erased_data.push(entry.data.clone());
      }
    }

    if inserted.is_empty() && erased.is_empty() && changed.is_empty() {
      trace!("Nothing to commit on top of {:?}", tip);
      return Ok(tip);
    }

    for &node in &erased {
      self.free_push(node);
    }

    let depth = self.revisions[tip.index()].depth + 1;
    let mut revision = Revision::new(Some(tip), depth);
    debug!(
      "Committing on top of {:?}: {} inserted, {} erased, {} changed",
      tip,
      inserted.len(),
      erased.len(),
      changed.len()
    );
    revision.inserted = inserted;
    revision.erased = erased;
    revision.erased_data = Some(erased_data);
    revision.changed = changed;

    let id = self.push_revision(revision)?;
    self.revisions[tip.index()].children.push(id);
    self.tip = Some(id);
    Ok(id)
  }

  /// Discards the changes made since the last commit.
  ///
  /// Returns the nodes whose membership in the tree changed.
  pub fn revert(&mut self) -> Vec<NodeId> {
    let mut affected = Vec::new();

    for (node, original) in mem::take(&mut self.saved) {
      self.nodes[node.index()].saved = false;
      if self.nodes[node.index()].in_tree {
        self.erase_node(node);
        self.nodes[node.index()].data = original;
        self.insert_node(node);
      } else {
        self.nodes[node.index()].data = original;
      }
    }

    for node in mem::take(&mut self.inserted) {
      let entry = &mut self.nodes[node.index()];
      entry.inserted = false;
      if entry.in_tree {
        self.erase_node(node);
        self.free_push(node);
        affected.push(node);
      }
    }

    for node in mem::take(&mut self.erased) {
      if !self.nodes[node.index()].in_tree {
        self.insert_node(node);
        affected.push(node);
      }
    }

    if !affected.is_empty() {
      trace!("Reverted {} nodes", affected.len());
    }
    affected
  }

  /// Moves the tree to any committed revision, discarding uncommitted changes.
  ///
  /// Returns the nodes whose membership differs between the state before the call
  /// and the state of `target`.
  pub fn update(&mut self, target: RevisionId) -> Vec<NodeId> {
    debug_assert!(
      target.index() < self.revisions.len(),
      "revision {:?} does not belong to this tree",
      target
    );

    let mut touched = self.revert();
    let tip = match self.tip {
      Some(tip) => tip,
      None => return touched,
    };
    if tip == target {
      return touched;
    }

    for &node in &touched {
      let entry = &mut self.nodes[node.index()];
      entry.was_in_tree = Some(!entry.in_tree);
    }

    let ancestor = self.common_ancestor(tip, target);
    debug!("Updating {:?} -> {:?} through {:?}", tip, target, ancestor);

    let mut current = tip;
    while current != ancestor {
      self.toggle(current, &mut touched);
      current = self.parent_of(current);
    }

    let mut path = Vec::new();
    let mut current = target;
    while current != ancestor {
      path.push(current);
      current = self.parent_of(current);
    }
    for &revision in path.iter().rev() {
      self.toggle(revision, &mut touched);
    }

    self.tip = Some(target);

    let nodes = &mut self.nodes;
    touched.retain(|node| {
      let entry = &mut nodes[node.index()];
      let changed = entry.was_in_tree != Some(entry.in_tree);
      entry.was_in_tree = None;
      changed
    });
    touched
  }

  /// Applies a revision in reverse and flips it to describe the opposite transition.
  fn toggle(&mut self, id: RevisionId, touched: &mut Vec<NodeId>) {
    let revision = &mut self.revisions[id.index()];
    let inserted = mem::take(&mut revision.inserted);
    let erased = mem::take(&mut revision.erased);
    let inserted_data = revision.inserted_data.take();
    let erased_data = revision.erased_data.take();
    let mut changed = mem::take(&mut revision.changed);

    trace!(
      "Toggling {:?}: {} back in, {} out, {} swapped",
      id,
      erased.len(),
      inserted.len(),
      changed.len()
    );

    for (index, &node) in erased.iter().enumerate() {
      self.free_remove(node);
      if let Some(data) = erased_data.as_ref().and_then(|data| data.get(index)) {
        self.nodes[node.index()].data = data.clone();
      }
      self.touch(node, touched);
      self.insert_node(node);
    }

    for &node in &inserted {
      self.touch(node, touched);
      self.erase_node(node);
    }

    for (node, data) in changed.iter_mut() {
      self.erase_node(*node);
      mem::swap(&mut self.nodes[node.index()].data, data);
      self.insert_node(*node);
    }

    let inserted_data = match inserted_data {
      Some(data) => data,
      None => inserted
        .iter()
        .map(|node| self.nodes[node.index()].data.clone())
        .collect(),
    };
    for &node in &inserted {
      self.free_push(node);
    }

    let revision = &mut self.revisions[id.index()];
    revision.inserted = erased;
    revision.erased = inserted;
    revision.inserted_data = erased_data;
    revision.erased_data = Some(inserted_data);
    revision.changed = changed;
  }
}
