//! Output channels and the notes assigned to them.

use std::cmp::Ordering;

use log::trace;

use crate::bst::{Compare, Interval, MaxOff, NodeId, RevisionId, Tree, TreeError};
use crate::map::ValueMap;
use crate::note::{Note, NoteRef};
use crate::time::Ticks;

pub const CHANNELS: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelCtrl {
  Program,
  PitchWheel,
}

impl ChannelCtrl {
  pub const ALL: [ChannelCtrl; 2] = [ChannelCtrl::Program, ChannelCtrl::PitchWheel];

  pub fn default_value(self) -> i32 {
    match self {
      ChannelCtrl::Program => 0,
      ChannelCtrl::PitchWheel => 0,
    }
  }

  fn index(self) -> usize {
    self as usize
  }
}

/// Entry of the channel note index, a copy of the note key plus the note it stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelNote {
  pub on: Ticks,
  pub off: Ticks,
  pub midipitch: u8,
  pub note: NoteRef,
  max_off: Ticks,
}

impl ChannelNote {
  fn new(note: NoteRef, data: &Note) -> ChannelNote {
    ChannelNote {
      on: data.on,
      off: data.off,
      midipitch: data.midipitch,
      note,
      max_off: data.off,
    }
  }
}

impl Interval for ChannelNote {
  type Time = Ticks;

  fn on(&self) -> Ticks {
    self.on
  }

  fn off(&self) -> Ticks {
    self.off
  }

  fn max_off(&self) -> Ticks {
    self.max_off
  }

  fn set_max_off(&mut self, max_off: Ticks) {
    self.max_off = max_off;
  }
}

/// Note key first, then the note identity so every entry has a unique position.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChannelOrder;

impl Compare<ChannelNote> for ChannelOrder {
  fn compare(&self, a: &ChannelNote, b: &ChannelNote) -> Ordering {
    a.on
      .cmp(&b.on)
      .then(a.off.cmp(&b.off))
      .then(a.midipitch.cmp(&b.midipitch))
      .then(a.note.cmp(&b.note))
  }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChannelRevision {
  notes: RevisionId,
  ctrl: [RevisionId; 2],
}

pub struct Channel {
  number: u8,
  notes: Tree<ChannelNote, ChannelOrder, MaxOff>,
  ctrl: [ValueMap; 2],
}

impl Channel {
  pub fn new(number: u8) -> Channel {
    Channel {
      number,
      notes: Tree::with_augment(ChannelOrder, MaxOff),
      ctrl: [
        ValueMap::new(ChannelCtrl::Program.default_value()),
        ValueMap::new(ChannelCtrl::PitchWheel.default_value()),
      ],
    }
  }

  pub fn number(&self) -> u8 {
    self.number
  }

  pub fn len(&self) -> usize {
    self.notes.size()
  }

  pub fn is_empty(&self) -> bool {
    self.notes.is_empty()
  }

  pub fn ctrl(&self, ctrl: ChannelCtrl) -> &ValueMap {
    &self.ctrl[ctrl.index()]
  }

  pub fn ctrl_mut(&mut self, ctrl: ChannelCtrl) -> &mut ValueMap {
    &mut self.ctrl[ctrl.index()]
  }

  /// Assigned notes in key order.
  pub fn notes(&self) -> impl Iterator<Item = NoteRef> + '_ {
    self.notes.iter().map(|(_, entry)| entry.note)
  }

  pub(crate) fn insert(&mut self, note: NoteRef, data: &Note) -> Result<NodeId, TreeError> {
    self.notes.insert(ChannelNote::new(note, data))
  }

  /// Removes the entry of `note`, found by the key it was inserted with.
  pub(crate) fn erase(&mut self, note: NoteRef, data: &Note) -> bool {
    match self.notes.find(&ChannelNote::new(note, data)) {
      Some(node) => {
        self.notes.erase(node);
        true
      }
      None => false,
    }
  }

  pub fn contains(&self, note: NoteRef, data: &Note) -> bool {
    self.notes.find(&ChannelNote::new(note, data)).is_some()
  }

  pub fn for_range<R, F>(&self, begin: Ticks, end: Ticks, mut visit: F) -> Option<R>
  where
    F: FnMut(&ChannelNote) -> Option<R>,
  {
    self.notes.for_range(begin, end, |_, entry| visit(entry))
  }

  /// Notes sounding somewhere in `[begin, end)`.
  pub fn range(&self, begin: Ticks, end: Ticks) -> Vec<NoteRef> {
    self
      .notes
      .range(begin, end)
      .into_iter()
      .map(|node| self.notes[node].note)
      .collect()
  }

  pub fn has_free_spot(&self, begin: Ticks, end: Ticks) -> bool {
    self.for_range(begin, end, |_| Some(())).is_none()
  }

  pub fn commit(&mut self) -> Result<ChannelRevision, TreeError> {
    Ok(ChannelRevision {
      notes: self.notes.commit()?,
      ctrl: [self.ctrl[0].commit()?, self.ctrl[1].commit()?],
    })
  }

  /// Moves every index to the revision.
  ///
  /// Entry nodes are recycled across branches, so one node can stand for
  /// different notes before and after the update. Owners that count assignments
  /// recount them from [`Channel::notes`] afterwards.
  pub fn update(&mut self, revision: &ChannelRevision) {
    let moved = self.notes.update(revision.notes).len();
    for (map, revision) in self.ctrl.iter_mut().zip(revision.ctrl.iter()) {
      map.update(*revision);
    }
    if moved > 0 {
      trace!("Channel {}: {} entries moved", self.number, moved);
    }
  }
}

#[cfg(test)]
mod test {

  use super::{Channel, ChannelCtrl};
  use crate::bst::NodeId;
  use crate::note::{Note, NoteRef};
  use crate::time::Ticks;
  use crate::track::TrackId;

  fn note(on: i32, off: i32, pitch: u8) -> Note {
    Note::new(Ticks::new(on), Ticks::new(off), i16::from(pitch), pitch)
  }

  fn note_ref(track: u32, node: NodeId) -> NoteRef {
    NoteRef {
      track: TrackId::new(track),
      node,
    }
  }

  /// Notes stored in a scratch track, for ids.
  fn ids(count: usize) -> Vec<NodeId> {
    let mut track = crate::track::Track::new(TrackId::new(0), crate::notesystem::CHANMASK_ALL);
    (0..count)
      .map(|i| track.insert(note(i as i32, i as i32 + 1, 60)).unwrap())
      .collect()
  }

  #[test]
  pub fn ctrl_defaults() {
    let channel = Channel::new(3);
    assert_eq!(channel.number(), 3);
    assert_eq!(channel.ctrl(ChannelCtrl::Program).get(Ticks::zero()), 0);
    assert_eq!(channel.ctrl(ChannelCtrl::PitchWheel).get(Ticks::zero()), 0);
  }

  #[test]
  pub fn overlap_queries() {
    let ids = ids(3);
    let mut channel = Channel::new(0);
    let a = note_ref(0, ids[0]);
    let b = note_ref(0, ids[1]);
    let c = note_ref(1, ids[2]);
    channel.insert(a, &note(0, 10, 60)).unwrap();
    channel.insert(b, &note(5, 15, 62)).unwrap();
    channel.insert(c, &note(20, 30, 64)).unwrap();

    assert_eq!(channel.range(Ticks::new(8), Ticks::new(20)), vec![a, b]);
    assert!(channel.has_free_spot(Ticks::new(15), Ticks::new(20)));
    assert!(!channel.has_free_spot(Ticks::new(14), Ticks::new(20)));
  }

  #[test]
  pub fn same_key_from_two_tracks() {
    let ids = ids(1);
    let mut channel = Channel::new(0);
    let data = note(0, 10, 60);
    let first = note_ref(0, ids[0]);
    let second = note_ref(1, ids[0]);
    channel.insert(first, &data).unwrap();
    channel.insert(second, &data).unwrap();

    assert!(channel.erase(second, &data));
    assert!(!channel.erase(second, &data));
    assert!(channel.contains(first, &data));
    assert_eq!(channel.len(), 1);
  }

  #[test]
  pub fn update_restores_entries() {
    let ids = ids(2);
    let mut channel = Channel::new(9);
    let a = note_ref(0, ids[0]);
    let b = note_ref(0, ids[1]);
    channel.insert(a, &note(0, 10, 36)).unwrap();
    let first = channel.commit().unwrap();

    channel.insert(b, &note(10, 20, 38)).unwrap();
    channel
      .ctrl_mut(ChannelCtrl::Program)
      .set_range(Ticks::zero(), Ticks::new(20), 5)
      .unwrap();
    let second = channel.commit().unwrap();

    channel.update(&first);
    assert_eq!(channel.notes().collect::<Vec<_>>(), vec![a]);
    assert_eq!(channel.ctrl(ChannelCtrl::Program).get(Ticks::new(5)), 0);
    channel.update(&second);
    assert_eq!(channel.notes().collect::<Vec<_>>(), vec![a, b]);
    assert_eq!(channel.ctrl(ChannelCtrl::Program).get(Ticks::new(5)), 5);
  }
}
