use super::{Augment, Compare, Node, NodeId, Tree, LEFT, RIGHT};

use std::cmp::Ordering;

impl<T, C, A> Tree<T, C, A>
where
  C: Compare<T>,
  A: Augment<T>,
{
  /// Child slot of `parent`, the root slot for `None`.
  fn link(&self, parent: Option<NodeId>, dir: usize) -> Option<NodeId> {
    match parent {
      Some(parent) => self.nodes[parent.index()].child[dir],
      None => self.root,
    }
  }

  fn set_link(&mut self, parent: Option<NodeId>, dir: usize, child: Option<NodeId>) {
    match parent {
      Some(parent) => self.nodes[parent.index()].child[dir] = child,
      None => self.root = child,
    }
  }

  fn fix_child(&mut self, parent: NodeId, dir: usize) {
    if let Some(child) = self.nodes[parent.index()].child[dir] {
      let child = &mut self.nodes[child.index()];
      child.parent = Some(parent);
      child.side = dir;
    }
  }

  fn set_child(&mut self, parent: Option<NodeId>, dir: usize, child: Option<NodeId>) {
    self.set_link(parent, dir, child);
    match parent {
      Some(parent) => self.fix_child(parent, dir),
      None => {
        if let Some(child) = child {
          let child = &mut self.nodes[child.index()];
          child.parent = None;
          child.side = LEFT;
        }
      }
    }
  }

  /// Exchanges the positions of two nodes in the tree, payloads stay in place.
  /// `b` must not be an ancestor of `a`.
  fn swap_nodes(&mut self, a: NodeId, b: NodeId) {
    let (a_parent, a_side) = {
      let node = &self.nodes[a.index()];
      (node.parent, node.side)
    };
    let (b_parent, b_side) = {
      let node = &self.nodes[b.index()];
      (node.parent, node.side)
    };

    let a_slot = self.link(a_parent, a_side);
    let b_slot = self.link(b_parent, b_side);
    self.set_link(a_parent, a_side, b_slot);
    self.set_link(b_parent, b_side, a_slot);

    let (a_node, b_node) = pair_mut(&mut self.nodes, a, b);
    std::mem::swap(&mut a_node.parent, &mut b_node.parent);
    std::mem::swap(&mut a_node.child, &mut b_node.child);
    std::mem::swap(&mut a_node.balance, &mut b_node.balance);
    std::mem::swap(&mut a_node.side, &mut b_node.side);

    self.fix_child(a, LEFT);
    self.fix_child(a, RIGHT);
    self.fix_child(b, LEFT);
    self.fix_child(b, RIGHT);
  }

  fn augment_node(&mut self, node: NodeId) {
    let [left, right] = self.nodes[node.index()].child;
    let pivot = node.index();
    let (before, rest) = self.nodes.split_at_mut(pivot);
    if let Some((current, after)) = rest.split_first_mut() {
      let (before, after) = (&*before, &*after);
      let left = left.map(|child| sibling(before, after, pivot, child));
      let right = right.map(|child| sibling(before, after, pivot, child));
      self.augment.update(&mut current.data, left, right);
    }
  }

  fn update_to_top(&mut self, mut node: Option<NodeId>) {
    while let Some(current) = node {
      self.augment_node(current);
      node = self.nodes[current.index()].parent;
    }
  }

  /// Rotates an unbalanced subtree. Does not touch the balance of the parent.
  /// Returns true if a rotation happened and decreased the subtree height.
  fn rebalance(&mut self, node: NodeId) -> bool {
    let balance = self.nodes[node.index()].balance;
    if balance >= -1 && balance <= 1 {
      return false;
    }

    let dir = if balance > 0 { RIGHT } else { LEFT };
    let heavy = match self.nodes[node.index()].child[1 - dir] {
      Some(heavy) => heavy,
      None => return false,
    };
    let heavy_balance = self.nodes[heavy.index()].balance;
    let double = heavy_balance != 0 && ((balance > 0) != (heavy_balance > 0));
    let top = if double {
      match self.nodes[heavy.index()].child[dir] {
        Some(top) => top,
        None => return false,
      }
    } else {
      heavy
    };

    let (parent, side) = {
      let entry = &self.nodes[node.index()];
      (entry.parent, entry.side)
    };
    self.set_child(parent, side, Some(top));
    let inner = self.nodes[top.index()].child[dir];
    self.set_child(Some(node), 1 - dir, inner);
    self.set_child(Some(top), dir, Some(node));

    if double {
      let inner = self.nodes[top.index()].child[1 - dir];
      self.set_child(Some(heavy), dir, inner);
      self.set_child(Some(top), 1 - dir, Some(heavy));
      self.augment_node(heavy);

      let top_balance = self.nodes[top.index()].balance;
      self.nodes[node.index()].balance = 0;
      self.nodes[heavy.index()].balance = 0;
      if top_balance != 0 {
        if (dir == RIGHT) == (top_balance > 0) {
          self.nodes[node.index()].balance = -top_balance;
        } else {
          self.nodes[heavy.index()].balance = -top_balance;
        }
        self.nodes[top.index()].balance = 0;
      }
    } else if heavy_balance != 0 {
      self.nodes[node.index()].balance = 0;
      self.nodes[heavy.index()].balance = 0;
    } else if dir == RIGHT {
      self.nodes[node.index()].balance = 1;
      self.nodes[heavy.index()].balance = -1;
    } else {
      self.nodes[node.index()].balance = -1;
      self.nodes[heavy.index()].balance = 1;
    }

    self.update_to_top(Some(node));

    // a rotation around a balanced heavy child keeps the height
    heavy_balance != 0
  }

  /// Links a detached node into the tree by its payload and retraces.
  pub(super) fn insert_node(&mut self, node: NodeId) {
    debug_assert!(!self.nodes[node.index()].in_tree);
    {
      let entry = &mut self.nodes[node.index()];
      entry.balance = 0;
      entry.child = [None, None];
    }

    let mut parent = None;
    let mut dir = LEFT;
    while let Some(current) = self.link(parent, dir) {
      parent = Some(current);
      let order = self
        .cmp
        .compare(&self.nodes[node.index()].data, &self.nodes[current.index()].data);
      dir = if order != Ordering::Less { RIGHT } else { LEFT };
    }

    self.set_child(parent, dir, Some(node));
    self.update_to_top(Some(node));

    while let Some(current) = parent {
      let entry = &mut self.nodes[current.index()];
      entry.balance += if dir == RIGHT { -1 } else { 1 };
      if entry.balance == 0 || self.rebalance(current) {
        break;
      }
      let entry = &self.nodes[current.index()];
      dir = entry.side;
      parent = entry.parent;
    }

    self.nodes[node.index()].in_tree = true;
    self.size += 1;
  }

  /// Unlinks a node from the tree and retraces. Returns the successor.
  pub(super) fn erase_node(&mut self, node: NodeId) -> NodeId {
    debug_assert!(self.nodes[node.index()].in_tree);
    let next = self.next(node);

    let [left, right] = self.nodes[node.index()].child;
    if left.is_some() && right.is_some() {
      self.swap_nodes(node, next);
    }

    let (parent, side, only) = {
      let entry = &self.nodes[node.index()];
      (entry.parent, entry.side, entry.child[LEFT].or(entry.child[RIGHT]))
    };
    self.set_child(parent, side, only);
    self.update_to_top(parent);

    let mut dir = side;
    let mut current = parent;
    while let Some(at) = current {
      let upper = self.nodes[at.index()].parent;
      let entry = &mut self.nodes[at.index()];
      entry.balance += if dir == RIGHT { 1 } else { -1 };
      dir = entry.side;
      if entry.balance != 0 && !self.rebalance(at) {
        break;
      }
      current = upper;
    }

    let entry = &mut self.nodes[node.index()];
    entry.in_tree = false;
    entry.parent = None;
    entry.child = [None, None];
    self.size -= 1;
    next
  }
}

fn sibling<'a, T>(before: &'a [Node<T>], after: &'a [Node<T>], pivot: usize, node: NodeId) -> &'a T {
  let index = node.index();
  if index < pivot {
    &before[index].data
  } else {
    &after[index - pivot - 1].data
  }
}

fn pair_mut<T>(nodes: &mut [Node<T>], a: NodeId, b: NodeId) -> (&mut Node<T>, &mut Node<T>) {
  debug_assert_ne!(a, b);
  if a.index() < b.index() {
    let (low, high) = nodes.split_at_mut(b.index());
    (&mut low[a.index()], &mut high[0])
  } else {
    let (low, high) = nodes.split_at_mut(a.index());
    (&mut high[0], &mut low[b.index()])
  }
}
