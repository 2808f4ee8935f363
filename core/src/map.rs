//! Piecewise-constant time to value maps, used for controller curves.
//!
//! Each entry marks the time at which the value changes; before the first entry the
//! map yields its default value.

use std::cmp::Ordering;

use crate::bst::{Compare, NodeId, RevisionId, Tree, TreeError, END};
use crate::time::Ticks;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MapEntry {
  pub time: Ticks,
  pub value: i32,
}

impl MapEntry {
  fn key(time: Ticks) -> MapEntry {
    MapEntry { time, value: 0 }
  }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ByTime;

impl Compare<MapEntry> for ByTime {
  fn compare(&self, a: &MapEntry, b: &MapEntry) -> Ordering {
    a.time.cmp(&b.time)
  }
}

pub struct ValueMap {
  tree: Tree<MapEntry, ByTime>,
  default_value: i32,
}

impl ValueMap {
  pub fn new(default_value: i32) -> ValueMap {
    ValueMap {
      tree: Tree::new(ByTime),
      default_value,
    }
  }

  pub fn default_value(&self) -> i32 {
    self.default_value
  }

  pub fn len(&self) -> usize {
    self.tree.size()
  }

  pub fn is_empty(&self) -> bool {
    self.tree.is_empty()
  }

  /// Change points in time order.
  pub fn iter(&self) -> impl Iterator<Item = (NodeId, MapEntry)> + '_ {
    self.tree.iter().map(|(node, entry)| (node, *entry))
  }

  pub fn find(&self, time: Ticks) -> Option<NodeId> {
    self.tree.find(&MapEntry::key(time))
  }

  pub fn entry(&self, node: NodeId) -> MapEntry {
    self.tree[node]
  }

  /// Value in effect at `time`.
  pub fn get(&self, time: Ticks) -> i32 {
    self.get_change(time).1
  }

  /// Value in effect at `time` and the time it took effect, zero for the default.
  pub fn get_change(&self, time: Ticks) -> (Ticks, i32) {
    let node = self.tree.upper_bound(&MapEntry::key(time));
    if node == self.tree.begin() {
      return (Ticks::zero(), self.default_value);
    }
    let entry = self.tree[self.tree.prev(node)];
    (entry.time, entry.value)
  }

  /// Time of the first change after `time`.
  pub fn next_change(&self, time: Ticks) -> Option<Ticks> {
    let node = self.tree.upper_bound(&MapEntry::key(time));
    if node == END {
      None
    } else {
      Some(self.tree[node].time)
    }
  }

  pub fn set(&mut self, time: Ticks, value: i32) -> Result<(), TreeError> {
    if let Some(node) = self.find(time) {
      self.tree.erase(node);
    }
    if self.get(time) != value {
      self.tree.insert(MapEntry { time, value })?;
    }
    Ok(())
  }

  /// Sets `value` on `[begin, end)`, keeping the value in effect from `end` on.
  pub fn set_range(&mut self, begin: Ticks, end: Ticks, value: i32) -> Result<(), TreeError> {
    if begin >= end {
      return Ok(());
    }

    let end_value = self.get(end);
    self.clear_inside(begin, end);
    self.set(begin, value)?;
    self.set(end, end_value)
  }

  pub fn set_node(&mut self, node: NodeId, value: i32) -> Result<(), TreeError> {
    let mut entry = self.tree[node];
    entry.value = value;
    self.tree.change(node, entry)?;
    Ok(())
  }

  /// Adds `delta` to every value taking effect in `[begin, end)`.
  pub fn add(&mut self, begin: Ticks, end: Ticks, delta: i32) -> Result<(), TreeError> {
    if begin >= end {
      return Ok(());
    }

    let end_value = self.get(end);
    let mut time = begin;
    while time < end {
      let next = self.time_of(self.tree.upper_bound(&MapEntry::key(time)));
      let value = self.get(time).saturating_add(delta);
      self.set(time, value)?;
      time = next;
    }
    self.set(end, end_value)
  }

  /// Copies the curve of `[begin, end)` into `dest` starting at `dest_begin`. The
  /// values of `dest` after the copied span are kept.
  pub fn copy_to(
    &self,
    begin: Ticks,
    end: Ticks,
    dest: &mut ValueMap,
    dest_begin: Ticks,
  ) -> Result<(), TreeError> {
    if begin >= end {
      return Ok(());
    }

    let dest_end = dest_begin + (end - begin);
    let end_value = dest.get(dest_end);
    dest.clear_inside(dest_begin, dest_end);
    dest.set(dest_begin, self.get(begin))?;

    let start = self.tree.upper_bound(&MapEntry::key(begin));
    for (_, entry) in self.tree.iter_from(start) {
      if entry.time >= end {
        break;
      }
      dest.set(dest_begin + (entry.time - begin), entry.value)?;
    }

    dest.set(dest_end, end_value)
  }

  /// Whether both maps yield the same values everywhere in `[begin, end)`.
  pub fn eq_range(&self, other: &ValueMap, begin: Ticks, end: Ticks) -> bool {
    let mut value = self.get(begin);
    if value != other.get(begin) {
      return false;
    }

    let key = MapEntry::key(begin);
    let mut a = self.tree.upper_bound(&key);
    let mut b = other.tree.upper_bound(&key);
    loop {
      while self.time_of(a) < end && self.tree[a].value == value {
        a = self.tree.next(a);
      }
      while other.time_of(b) < end && other.tree[b].value == value {
        b = other.tree.next(b);
      }

      let (time_a, time_b) = (self.time_of(a), other.time_of(b));
      if time_a >= end || time_b >= end {
        return time_a >= end && time_b >= end;
      }
      if time_a != time_b || self.tree[a].value != other.tree[b].value {
        return false;
      }

      value = self.tree[a].value;
      a = self.tree.next(a);
      b = other.tree.next(b);
    }
  }

  pub fn clear(&mut self) {
    self.tree.clear();
  }

  pub fn commit(&mut self) -> Result<RevisionId, TreeError> {
    self.tree.commit()
  }

  pub fn revert(&mut self) {
    self.tree.revert();
  }

  pub fn update(&mut self, revision: RevisionId) {
    self.tree.update(revision);
  }

  fn time_of(&self, node: NodeId) -> Ticks {
    if node == END {
      Ticks::MAX
    } else {
      self.tree[node].time
    }
  }

  /// Erases the entries strictly inside `(begin, end)`.
  fn clear_inside(&mut self, begin: Ticks, end: Ticks) {
    let first = self.tree.upper_bound(&MapEntry::key(begin));
    let last = self.tree.lower_bound(&MapEntry::key(end));
    self.tree.erase_range(first, last);
  }
}

#[cfg(test)]
mod test {

  use super::ValueMap;
  use crate::time::Ticks;

  fn t(ticks: i32) -> Ticks {
    Ticks::new(ticks)
  }

  fn points(map: &ValueMap) -> Vec<(i32, i32)> {
    map
      .iter()
      .map(|(_, entry)| (entry.time.value(), entry.value))
      .collect()
  }

  #[test]
  pub fn default_value_before_first_change() {
    let mut map = ValueMap::new(64);
    assert_eq!(map.get(t(0)), 64);
    map.set(t(10), 1).unwrap();
    assert_eq!(map.get(t(9)), 64);
    assert_eq!(map.get_change(t(9)), (t(0), 64));
    assert_eq!(map.get(t(10)), 1);
    assert_eq!(map.get_change(t(500)), (t(10), 1));
  }

  #[test]
  pub fn set_skips_redundant_changes() {
    let mut map = ValueMap::new(0);
    map.set(t(0), 0).unwrap();
    assert!(map.is_empty());
    map.set(t(5), 3).unwrap();
    map.set(t(8), 3).unwrap();
    assert_eq!(points(&map), vec![(5, 3)]);
    map.set(t(5), 7).unwrap();
    assert_eq!(points(&map), vec![(5, 7)]);
  }

  #[test]
  pub fn set_range_restores_following_value() {
    let mut map = ValueMap::new(0);
    map.set(t(0), 1).unwrap();
    map.set(t(10), 2).unwrap();
    map.set(t(20), 3).unwrap();

    map.set_range(t(5), t(15), 9).unwrap();
    assert_eq!(points(&map), vec![(0, 1), (5, 9), (15, 2), (20, 3)]);

    map.set_range(t(15), t(15), 4).unwrap();
    assert_eq!(map.len(), 4);
  }

  #[test]
  pub fn add_shifts_every_piece() {
    let mut map = ValueMap::new(10);
    map.set(t(10), 20).unwrap();
    map.add(t(5), t(15), 1).unwrap();
    assert_eq!(points(&map), vec![(5, 11), (10, 21), (15, 20)]);
    assert_eq!(map.get(t(100)), 20);
  }

  #[test]
  pub fn copy_keeps_destination_tail() {
    let mut source = ValueMap::new(0);
    source.set(t(0), 5).unwrap();
    source.set(t(4), 6).unwrap();
    source.set(t(12), 7).unwrap();

    let mut dest = ValueMap::new(0);
    dest.set(t(100), 1).unwrap();
    dest.set(t(200), 2).unwrap();

    source.copy_to(t(2), t(10), &mut dest, t(100)).unwrap();
    assert_eq!(points(&dest), vec![(100, 5), (102, 6), (108, 1), (200, 2)]);
    assert!(!source.eq_range(&dest, t(4), t(6)));
  }

  #[test]
  pub fn eq_range_compares_pieces() {
    let mut a = ValueMap::new(0);
    a.set(t(5), 2).unwrap();
    a.set(t(10), 3).unwrap();

    let mut b = ValueMap::new(0);
    b.set(t(5), 2).unwrap();
    b.set(t(10), 3).unwrap();
    b.set(t(30), 4).unwrap();

    assert!(a.eq_range(&b, t(0), t(30)));
    assert!(!a.eq_range(&b, t(0), t(31)));
    assert!(a.eq_range(&b, t(7), t(9)));

    let mut c = ValueMap::new(0);
    c.set(t(5), 2).unwrap();
    c.set(t(11), 3).unwrap();
    assert!(!a.eq_range(&c, t(0), t(20)));
    assert!(a.eq_range(&c, t(0), t(10)));

    let mut d = ValueMap::new(0);
    d.set(t(5), 2).unwrap();
    d.set(t(10), 3).unwrap();
    let node = d.find(t(10)).unwrap();
    d.set_node(node, 2).unwrap();
    let mut e = ValueMap::new(0);
    e.set(t(5), 2).unwrap();
    assert_eq!(d.len(), 2);
    assert!(d.eq_range(&e, t(0), t(20)));
  }

  #[test]
  pub fn set_node_changes_value_in_place() {
    let mut map = ValueMap::new(0);
    map.set(t(3), 1).unwrap();
    let node = map.find(t(3)).unwrap();
    map.set_node(node, 8).unwrap();
    assert_eq!(map.get(t(3)), 8);
    assert_eq!(map.entry(node).value, 8);
  }

  #[test]
  pub fn history() {
    let mut map = ValueMap::new(0);
    let empty = map.commit().unwrap();
    map.set_range(t(0), t(10), 5).unwrap();
    let filled = map.commit().unwrap();

    map.set(t(0), 6).unwrap();
    map.revert();
    assert_eq!(map.get(t(0)), 5);

    map.update(empty);
    assert!(map.is_empty());
    map.update(filled);
    assert_eq!(points(&map), vec![(0, 5), (10, 0)]);
  }
}
