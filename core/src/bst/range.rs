use super::{Augment, NodeId, Tree, LEFT, RIGHT};

/// Payloads covering the half-open time span `[on, off)`.
///
/// `max_off` is the augmented field kept by [`MaxOff`], the largest `off` of the
/// subtree rooted at the node.
pub trait Interval {
  type Time: Ord + Copy;

  fn on(&self) -> Self::Time;
  fn off(&self) -> Self::Time;
  fn max_off(&self) -> Self::Time;
  fn set_max_off(&mut self, max_off: Self::Time);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct MaxOff;

impl<T: Interval> Augment<T> for MaxOff {
  fn update(&self, node: &mut T, left: Option<&T>, right: Option<&T>) {
    let max_off = left
      .into_iter()
      .chain(right)
      .map(Interval::max_off)
      .fold(node.off(), |max, off| max.max(off));
    node.set_max_off(max_off);
  }
}

impl<T: Interval, C, A> Tree<T, C, A> {
  /// Visits every node whose interval overlaps `[begin, end)` in key order: left
  /// subtree, node, right subtree.
  ///
  /// The walk stops at the first visit returning `Some`, and that value is
  /// returned, so an early stop yields the first overlapping node in key order.
  pub fn for_range<R, F>(&self, begin: T::Time, end: T::Time, mut visit: F) -> Option<R>
  where
    F: FnMut(NodeId, &T) -> Option<R>,
  {
    let root = self.root?;
    self.visit_range(root, begin, end, &mut visit)
  }

  /// Overlapping nodes, in order.
  pub fn range(&self, begin: T::Time, end: T::Time) -> Vec<NodeId> {
    let mut nodes = Vec::new();
    self.for_range(begin, end, |node, _| -> Option<()> {
      nodes.push(node);
      None
    });
    nodes
  }

  fn visit_range<R, F>(&self, node: NodeId, begin: T::Time, end: T::Time, visit: &mut F) -> Option<R>
  where
    F: FnMut(NodeId, &T) -> Option<R>,
  {
    let entry = &self.nodes[node.index()];

    if let Some(left) = entry.child[LEFT] {
      if self.nodes[left.index()].data.max_off() > begin {
        if let Some(found) = self.visit_range(left, begin, end, visit) {
          return Some(found);
        }
      }
    }

    let data = &entry.data;
    if begin < data.off() && data.on() < end {
      if let Some(found) = visit(node, data) {
        return Some(found);
      }
    }

    match entry.child[RIGHT] {
      Some(right) if self.nodes[right.index()].data.max_off() > begin && data.on() < end => {
        self.visit_range(right, begin, end, visit)
      }
      _ => None,
    }
  }
}
