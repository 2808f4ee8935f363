//! Versioned, augmentable AVL tree.
//!
//! Nodes live in an arena and are addressed by [`NodeId`]s that stay valid for the
//! whole life of the tree: committing, reverting and updating never move a payload
//! to a different node, so ids can be stored by other structures (channel indexes
//! keep ids of track notes, for instance).
//!
//! The history works like a revision-control system. [`Tree::commit`] captures the
//! insertions, erasures and changes made since the previous commit into a
//! [`Revision`], and [`Tree::update`] moves the tree to any committed revision by
//! toggling the diffs found on the path between the two revisions. Until the first
//! commit the tree behaves as a plain AVL tree without any bookkeeping.

mod avl;
mod range;
mod revision;

use std::cmp::Ordering;
use std::convert::TryFrom;
use std::mem;
use std::ops::Index;

use failure::Fail;

pub use self::range::{Interval, MaxOff};
pub use self::revision::{Revision, RevisionId};

const LEFT: usize = 0;
const RIGHT: usize = 1;

#[derive(Debug, Fail, PartialEq, Eq, Clone)]
pub enum TreeError {
  #[fail(display = "Failed to allocate memory for a {}", what)]
  Alloc { what: &'static str },
}

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Clone, Copy)]
pub struct NodeId(u32);

impl NodeId {
  fn index(self) -> usize {
    self.0 as usize
  }
}

/// One-past-the-last and one-before-the-first position.
pub const END: NodeId = NodeId(u32::max_value());

/// Ordering of the payloads stored in a tree.
pub trait Compare<T> {
  fn compare(&self, a: &T, b: &T) -> Ordering;
}

impl<T, F> Compare<T> for F
where
  F: Fn(&T, &T) -> Ordering,
{
  fn compare(&self, a: &T, b: &T) -> Ordering {
    self(a, b)
  }
}

/// Derived per-subtree data.
///
/// `update` is called bottom-up on every node whose subtree changed, after both
/// children were updated. It must only read the node payload and its children.
pub trait Augment<T> {
  fn update(&self, node: &mut T, left: Option<&T>, right: Option<&T>);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoAugment;

impl<T> Augment<T> for NoAugment {
  fn update(&self, _node: &mut T, _left: Option<&T>, _right: Option<&T>) {}
}

#[derive(Debug, Clone, Copy)]
struct FreeLink {
  prev: NodeId,
  next: NodeId,
}

#[derive(Debug, Clone)]
struct Node<T> {
  parent: Option<NodeId>,
  child: [Option<NodeId>; 2],
  side: usize,
  balance: i8,

  in_tree: bool,
  inserted: bool,
  saved: bool,

  free: Option<FreeLink>,
  // membership at the start of an update
  was_in_tree: Option<bool>,

  data: T,
}

impl<T> Node<T> {
  fn new(data: T) -> Node<T> {
    Node {
      parent: None,
      child: [None, None],
      side: LEFT,
      balance: 0,
      in_tree: false,
      inserted: false,
      saved: false,
      free: None,
      was_in_tree: None,
      data,
    }
  }
}

pub struct Tree<T, C, A = NoAugment> {
  nodes: Vec<Node<T>>,
  root: Option<NodeId>,
  size: usize,

  cmp: C,
  augment: A,

  tip: Option<RevisionId>,
  revisions: Vec<Revision<T>>,

  inserted: Vec<NodeId>,
  erased: Vec<NodeId>,
  saved: Vec<(NodeId, T)>,
  free: Option<NodeId>,
}

impl<T, C> Tree<T, C, NoAugment>
where
  C: Compare<T>,
{
  pub fn new(cmp: C) -> Tree<T, C, NoAugment> {
    Tree::with_augment(cmp, NoAugment)
  }
}

impl<T, C, A> Tree<T, C, A> {
  pub fn with_augment(cmp: C, augment: A) -> Tree<T, C, A> {
    Tree {
      nodes: Vec::new(),
      root: None,
      size: 0,
      cmp,
      augment,
      tip: None,
      revisions: Vec::new(),
      inserted: Vec::new(),
      erased: Vec::new(),
      saved: Vec::new(),
      free: None,
    }
  }

  pub fn size(&self) -> usize {
    self.size
  }

  pub fn is_empty(&self) -> bool {
    self.root.is_none()
  }

  pub fn root(&self) -> Option<NodeId> {
    self.root
  }

  pub fn begin(&self) -> NodeId {
    self.root.map_or(END, |root| self.child_most(root, LEFT))
  }

  pub fn end(&self) -> NodeId {
    END
  }

  pub fn is_end(&self, node: NodeId) -> bool {
    node == END
  }

  pub fn next(&self, node: NodeId) -> NodeId {
    self.adjacent(node, RIGHT)
  }

  pub fn prev(&self, node: NodeId) -> NodeId {
    self.adjacent(node, LEFT)
  }

  pub fn left(&self, node: NodeId) -> Option<NodeId> {
    self.nodes[node.index()].child[LEFT]
  }

  pub fn right(&self, node: NodeId) -> Option<NodeId> {
    self.nodes[node.index()].child[RIGHT]
  }

  /// Payload of a node.
  ///
  /// Erased nodes keep their payload until they are recycled, which makes the
  /// nodes reported by [`Tree::revert`] and [`Tree::update`] readable.
  ///
  /// # Panics
  ///
  /// Panics when called with [`END`].
  pub fn get(&self, node: NodeId) -> &T {
    &self.nodes[node.index()].data
  }

  pub fn in_tree(&self, node: NodeId) -> bool {
    node != END && self.nodes[node.index()].in_tree
  }

  pub fn iter(&self) -> Iter<'_, T, C, A> {
    self.iter_from(self.begin())
  }

  pub fn iter_from(&self, node: NodeId) -> Iter<'_, T, C, A> {
    Iter { tree: self, node }
  }

  fn child_most(&self, mut node: NodeId, dir: usize) -> NodeId {
    while let Some(child) = self.nodes[node.index()].child[dir] {
      node = child;
    }
    node
  }

  fn adjacent(&self, node: NodeId, dir: usize) -> NodeId {
    if node == END {
      return match (dir, self.root) {
        (LEFT, Some(root)) => self.child_most(root, RIGHT),
        _ => END,
      };
    }

    if let Some(child) = self.nodes[node.index()].child[dir] {
      return self.child_most(child, 1 - dir);
    }

    let mut node = node;
    while let Some(parent) = self.nodes[node.index()].parent {
      if self.nodes[node.index()].side != dir {
        return parent;
      }
      node = parent;
    }
    END
  }

  fn alloc_node(&mut self, data: T) -> Result<NodeId, TreeError> {
    if let Some(node) = self.free_pop() {
      self.nodes[node.index()].data = data;
      return Ok(node);
    }

    let node = u32::try_from(self.nodes.len())
      .ok()
      .filter(|&index| index != END.0)
      .map(NodeId)
      .ok_or(TreeError::Alloc { what: "node id" })?;
    self
      .nodes
      .try_reserve(1)
      .map_err(|_| TreeError::Alloc { what: "node" })?;
    self.nodes.push(Node::new(data));
    Ok(node)
  }

  fn free_push(&mut self, node: NodeId) {
    debug_assert!(self.nodes[node.index()].free.is_none());
    let link = match self.free {
      None => FreeLink {
        prev: node,
        next: node,
      },
      Some(head) => {
        let prev = self.nodes[head.index()].free.map_or(head, |link| link.prev);
        self.set_free_next(prev, node);
        self.set_free_prev(head, node);
        FreeLink { prev, next: head }
      }
    };
    self.nodes[node.index()].free = Some(link);
    self.free = Some(node);
  }

  fn free_remove(&mut self, node: NodeId) {
    let link = match self.nodes[node.index()].free.take() {
      Some(link) => link,
      None => {
        debug_assert!(false, "node {:?} is not in the free list", node);
        return;
      }
    };

    if link.next == node {
      self.free = None;
    } else {
      self.set_free_next(link.prev, link.next);
      self.set_free_prev(link.next, link.prev);
      if self.free == Some(node) {
        self.free = Some(link.next);
      }
    }
  }

  fn free_pop(&mut self) -> Option<NodeId> {
    let node = self.free?;
    self.free_remove(node);
    Some(node)
  }

  fn set_free_next(&mut self, node: NodeId, next: NodeId) {
    if let Some(link) = self.nodes[node.index()].free.as_mut() {
      link.next = next;
    }
  }

  fn set_free_prev(&mut self, node: NodeId, prev: NodeId) {
    if let Some(link) = self.nodes[node.index()].free.as_mut() {
      link.prev = prev;
    }
  }

  fn erased_node(&mut self, node: NodeId) {
    if self.tip.is_some() && !self.nodes[node.index()].inserted {
      self.erased.push(node);
    } else {
      self.free_push(node);
    }
  }
}

impl<T, C, A> Tree<T, C, A>
where
  C: Compare<T>,
  A: Augment<T>,
{
  pub fn insert(&mut self, data: T) -> Result<NodeId, TreeError> {
    let tracking = self.tip.is_some();
    if tracking {
      self
        .inserted
        .try_reserve(1)
        .map_err(|_| TreeError::Alloc {
          what: "inserted list entry",
        })?;
    }

    let node = self.alloc_node(data)?;
    if tracking && !self.nodes[node.index()].inserted {
      self.nodes[node.index()].inserted = true;
      self.inserted.push(node);
    }

    self.insert_node(node);
    Ok(node)
  }

  /// Erases a node and returns its successor.
  pub fn erase(&mut self, node: NodeId) -> NodeId {
    let next = self.erase_node(node);
    self.erased_node(node);
    next
  }

  pub fn erase_range(&mut self, begin: NodeId, end: NodeId) {
    let mut node = begin;
    while node != end {
      node = self.erase(node);
    }
  }

  /// Replaces the payload of a node, moving it to the position required by the new
  /// payload, and returns the previous payload.
  pub fn change(&mut self, node: NodeId, data: T) -> Result<T, TreeError>
  where
    T: Clone,
  {
    let entry = &self.nodes[node.index()];
    debug_assert!(entry.in_tree, "changing a node that is not in the tree");
    let backup = self.tip.is_some() && entry.in_tree && !entry.inserted && !entry.saved;

    if backup {
      self
        .saved
        .try_reserve(1)
        .map_err(|_| TreeError::Alloc {
          what: "saved list entry",
        })?;
    }

    self.erase_node(node);
    let old = mem::replace(&mut self.nodes[node.index()].data, data);
    if backup {
      self.nodes[node.index()].saved = true;
      self.saved.push((node, old.clone()));
    }
    self.insert_node(node);

    Ok(old)
  }

  pub fn clear(&mut self) {
    let mut pending: Vec<NodeId> = self.root.into_iter().collect();
    let mut erased = Vec::with_capacity(self.size);
    while let Some(node) = pending.pop() {
      let entry = &mut self.nodes[node.index()];
      debug_assert!(entry.in_tree);
      entry.in_tree = false;
      pending.extend(entry.child.iter().flatten());
      erased.push(node);
    }

    self.root = None;
    self.size = 0;
    for node in erased {
      self.erased_node(node);
    }
  }

  pub fn find(&self, key: &T) -> Option<NodeId> {
    let node = self.lower_bound(key);
    if node != END && self.cmp.compare(self.get(node), key) == Ordering::Equal {
      Some(node)
    } else {
      None
    }
  }

  /// First node not ordered before `key`, or [`END`].
  pub fn lower_bound(&self, key: &T) -> NodeId {
    self.bound(key, Ordering::Equal)
  }

  /// First node ordered after `key`, or [`END`].
  pub fn upper_bound(&self, key: &T) -> NodeId {
    self.bound(key, Ordering::Greater)
  }

  fn bound(&self, key: &T, bound: Ordering) -> NodeId {
    let mut found = END;
    let mut next = self.root;
    while let Some(node) = next {
      let good = self.cmp.compare(self.get(node), key) >= bound;
      if good {
        found = node;
      }
      next = self.nodes[node.index()].child[if good { LEFT } else { RIGHT }];
    }
    found
  }
}

impl<T, C, A> Index<NodeId> for Tree<T, C, A> {
  type Output = T;

  fn index(&self, node: NodeId) -> &T {
    self.get(node)
  }
}

pub struct Iter<'a, T, C, A> {
  tree: &'a Tree<T, C, A>,
  node: NodeId,
}

impl<'a, T, C, A> Iterator for Iter<'a, T, C, A> {
  type Item = (NodeId, &'a T);

  fn next(&mut self) -> Option<Self::Item> {
    if self.node == END {
      return None;
    }
    let node = self.node;
    self.node = self.tree.next(node);
    Some((node, self.tree.get(node)))
  }
}

#[cfg(test)]
impl<T, C, A> Tree<T, C, A>
where
  C: Compare<T>,
{
  /// Checks links, balance factors, ordering and size.
  pub(crate) fn assert_valid(&self) {
    let (_height, size) = self.check_subtree(self.root, None, LEFT);
    assert_eq!(size, self.size);

    let nodes: Vec<NodeId> = self.iter().map(|(node, _)| node).collect();
    assert_eq!(nodes.len(), self.size);
    for pair in nodes.windows(2) {
      assert_ne!(
        self.cmp.compare(self.get(pair[0]), self.get(pair[1])),
        Ordering::Greater
      );
    }
  }

  fn check_subtree(&self, node: Option<NodeId>, parent: Option<NodeId>, side: usize) -> (i32, usize) {
    let node = match node {
      Some(node) => node,
      None => return (0, 0),
    };

    let entry = &self.nodes[node.index()];
    assert!(entry.in_tree);
    assert_eq!(entry.parent, parent);
    assert_eq!(entry.side, side);

    let (left_height, left_size) = self.check_subtree(entry.child[LEFT], Some(node), LEFT);
    let (right_height, right_size) = self.check_subtree(entry.child[RIGHT], Some(node), RIGHT);
    assert_eq!(i32::from(entry.balance), left_height - right_height);
    assert!(entry.balance >= -1 && entry.balance <= 1);

    (
      left_height.max(right_height) + 1,
      left_size + right_size + 1,
    )
  }
}

#[cfg(test)]
pub(crate) mod test {

  use std::cmp::Ordering;

  use proptest::prelude::*;

  use super::{Augment, NodeId, Tree, END};

  #[derive(Debug, Clone, Copy, PartialEq)]
  pub struct Elem {
    pub value: i32,
    pub size: usize,
  }

  impl Elem {
    pub fn new(value: i32) -> Elem {
      Elem { value, size: 1 }
    }
  }

  pub struct SubtreeSize;

  impl Augment<Elem> for SubtreeSize {
    fn update(&self, node: &mut Elem, left: Option<&Elem>, right: Option<&Elem>) {
      node.size = 1 + left.map_or(0, |e| e.size) + right.map_or(0, |e| e.size);
    }
  }

  pub fn by_value(a: &Elem, b: &Elem) -> Ordering {
    a.value.cmp(&b.value)
  }

  pub type ElemTree = Tree<Elem, fn(&Elem, &Elem) -> Ordering, SubtreeSize>;

  pub fn elem_tree() -> ElemTree {
    Tree::with_augment(by_value as fn(&Elem, &Elem) -> Ordering, SubtreeSize)
  }

  /// Structural checks plus the subtree size augmentation.
  pub fn assert_tree(tree: &ElemTree) {
    tree.assert_valid();
    for (node, elem) in tree.iter() {
      let left = tree.left(node).map_or(0, |child| tree[child].size);
      let right = tree.right(node).map_or(0, |child| tree[child].size);
      assert_eq!(elem.size, 1 + left + right);
    }
  }

  pub fn values(tree: &ElemTree) -> Vec<i32> {
    tree.iter().map(|(_, elem)| elem.value).collect()
  }

  pub fn find(tree: &ElemTree, value: i32) -> Option<NodeId> {
    tree.find(&Elem::new(value))
  }

  #[test]
  pub fn empty_tree() {
    let tree = elem_tree();
    assert!(tree.is_empty());
    assert_eq!(tree.size(), 0);
    assert_eq!(tree.begin(), END);
    assert_eq!(tree.prev(tree.end()), END);
    assert_eq!(tree.next(tree.end()), END);
    assert_eq!(find(&tree, 1), None);
  }

  #[test]
  pub fn insert_keeps_order_and_balance() {
    let mut tree = elem_tree();
    for value in &[50, 20, 80, 10, 30, 25, 27, 26, 90, 95, 99, 1, 2, 3] {
      tree.insert(Elem::new(*value)).unwrap();
      assert_tree(&tree);
    }
    assert_eq!(
      values(&tree),
      vec![1, 2, 3, 10, 20, 25, 26, 27, 30, 50, 80, 90, 95, 99]
    );
  }

  #[test]
  pub fn ascending_inserts_stay_logarithmic() {
    let mut tree = elem_tree();
    for value in 0..1024 {
      tree.insert(Elem::new(value)).unwrap();
    }
    assert_tree(&tree);
    let root = tree.root().unwrap();
    assert_eq!(tree[root].size, 1024);
  }

  #[test]
  pub fn equal_keys_are_kept_in_insertion_order() {
    let mut tree = elem_tree();
    let first = tree.insert(Elem::new(7)).unwrap();
    let second = tree.insert(Elem::new(7)).unwrap();
    let third = tree.insert(Elem::new(7)).unwrap();
    let order: Vec<NodeId> = tree.iter().map(|(node, _)| node).collect();
    assert_eq!(order, vec![first, second, third]);
    assert_eq!(find(&tree, 7), Some(first));
  }

  #[test]
  pub fn navigation_wraps_through_end() {
    let mut tree = elem_tree();
    for value in &[3, 1, 2] {
      tree.insert(Elem::new(*value)).unwrap();
    }
    let first = tree.begin();
    let last = tree.prev(tree.end());
    assert_eq!(tree[first].value, 1);
    assert_eq!(tree[last].value, 3);
    assert_eq!(tree.prev(first), END);
    assert_eq!(tree.next(last), END);
    assert_eq!(tree[tree.next(first)].value, 2);
    assert_eq!(tree[tree.prev(last)].value, 2);
  }

  #[test]
  pub fn bounds() {
    let mut tree = elem_tree();
    for value in &[10, 20, 20, 30] {
      tree.insert(Elem::new(*value)).unwrap();
    }
    let lower = tree.lower_bound(&Elem::new(20));
    let upper = tree.upper_bound(&Elem::new(20));
    assert_eq!(tree[lower].value, 20);
    assert_eq!(tree[tree.prev(lower)].value, 10);
    assert_eq!(tree[upper].value, 30);
    assert_eq!(tree.lower_bound(&Elem::new(5)), tree.begin());
    assert_eq!(tree.upper_bound(&Elem::new(5)), tree.begin());
    assert_eq!(tree.lower_bound(&Elem::new(31)), END);
    assert_eq!(tree.upper_bound(&Elem::new(30)), END);
    assert_eq!(find(&tree, 25), None);
  }

  #[test]
  pub fn erase_returns_successor() {
    let mut tree = elem_tree();
    for value in 0..32 {
      tree.insert(Elem::new(value)).unwrap();
    }
    let node = find(&tree, 15).unwrap();
    let next = tree.erase(node);
    assert_eq!(tree[next].value, 16);
    assert!(!tree.in_tree(node));
    assert_tree(&tree);

    let last = find(&tree, 31).unwrap();
    assert_eq!(tree.erase(last), END);
    assert_eq!(tree.size(), 30);
  }

  #[test]
  pub fn erase_range_removes_half_open_span() {
    let mut tree = elem_tree();
    for value in 0..20 {
      tree.insert(Elem::new(value)).unwrap();
    }
    let begin = tree.lower_bound(&Elem::new(5));
    let end = tree.lower_bound(&Elem::new(15));
    tree.erase_range(begin, end);
    assert_tree(&tree);
    assert_eq!(
      values(&tree),
      vec![0, 1, 2, 3, 4, 15, 16, 17, 18, 19]
    );
  }

  #[test]
  pub fn change_moves_node() {
    let mut tree = elem_tree();
    for value in 0..10 {
      tree.insert(Elem::new(value * 10)).unwrap();
    }
    let node = find(&tree, 20).unwrap();
    let old = tree.change(node, Elem::new(55)).unwrap();
    assert_eq!(old.value, 20);
    assert_eq!(tree[node].value, 55);
    assert_eq!(tree[tree.next(node)].value, 60);
    assert_tree(&tree);
  }

  #[test]
  pub fn erased_nodes_are_recycled_without_history() {
    let mut tree = elem_tree();
    let node = tree.insert(Elem::new(1)).unwrap();
    tree.erase(node);
    let recycled = tree.insert(Elem::new(2)).unwrap();
    assert_eq!(node, recycled);
    assert_eq!(tree[recycled].value, 2);
  }

  #[test]
  pub fn clear_empties_the_tree() {
    let mut tree = elem_tree();
    for value in 0..100 {
      tree.insert(Elem::new(value)).unwrap();
    }
    tree.clear();
    assert!(tree.is_empty());
    assert_eq!(tree.size(), 0);
    assert_eq!(tree.iter().count(), 0);
    for value in 0..10 {
      tree.insert(Elem::new(value)).unwrap();
    }
    assert_tree(&tree);
  }

  #[derive(Debug, Clone)]
  pub enum Op {
    Insert(i32),
    Erase(usize),
    Change(usize, i32),
  }

  pub fn ops() -> impl Strategy<Value = Vec<Op>> {
    prop::collection::vec(
      prop_oneof![
        3 => (0..200i32).prop_map(Op::Insert),
        2 => any::<usize>().prop_map(Op::Erase),
        1 => (any::<usize>(), 0..200i32).prop_map(|(at, value)| Op::Change(at, value)),
      ],
      0..200,
    )
  }

  /// Applies `ops` to the tree, picking erase and change targets by position.
  pub fn apply(tree: &mut ElemTree, ops: &[Op]) {
    for op in ops {
      match *op {
        Op::Insert(value) => {
          tree.insert(Elem::new(value)).unwrap();
        }
        Op::Erase(at) if !tree.is_empty() => {
          let (node, _) = tree.iter().nth(at % tree.size()).unwrap();
          tree.erase(node);
        }
        Op::Change(at, value) if !tree.is_empty() => {
          let (node, _) = tree.iter().nth(at % tree.size()).unwrap();
          tree.change(node, Elem::new(value)).unwrap();
        }
        _ => {}
      }
    }
  }

  proptest! {
    #[test]
    fn invariants_hold_after_any_sequence(ops in ops()) {
      let mut tree = elem_tree();
      let mut expected = Vec::new();
      for op in &ops {
        match *op {
          Op::Insert(value) => {
            tree.insert(Elem::new(value)).unwrap();
            expected.push(value);
          }
          Op::Erase(at) if !tree.is_empty() => {
            let (node, elem) = tree.iter().nth(at % tree.size()).unwrap();
            let value = elem.value;
            tree.erase(node);
            let pos = expected.iter().position(|v| *v == value).unwrap();
            expected.remove(pos);
          }
          Op::Change(at, value) if !tree.is_empty() => {
            let (node, elem) = tree.iter().nth(at % tree.size()).unwrap();
            let old = elem.value;
            tree.change(node, Elem::new(value)).unwrap();
            let pos = expected.iter().position(|v| *v == old).unwrap();
            expected[pos] = value;
          }
          _ => {}
        }
        assert_tree(&tree);
      }
      expected.sort();
      prop_assert_eq!(values(&tree), expected);
    }
  }
}
