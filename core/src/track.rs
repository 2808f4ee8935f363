use std::cmp::Ordering;
use std::fmt;

use log::trace;

use crate::bst::{Compare, Interval, MaxOff, NodeId, RevisionId, Tree, TreeError};
use crate::channel::CHANNELS;
use crate::map::ValueMap;
use crate::note::Note;
use crate::notesystem::{ChanMask, NoteSystem, CHANMASK_DRUMS};
use crate::time::Ticks;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TrackId(u32);

impl TrackId {
  pub(crate) fn new(index: u32) -> TrackId {
    TrackId(index)
  }

  pub(crate) fn index(self) -> usize {
    self.0 as usize
  }
}

impl fmt::Display for TrackId {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    write!(f, "{}", self.0)
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackCtrl {
  Balance,
  Expression,
}

impl TrackCtrl {
  pub const ALL: [TrackCtrl; 2] = [TrackCtrl::Balance, TrackCtrl::Expression];

  pub fn default_value(self) -> i32 {
    match self {
      TrackCtrl::Balance => 64,
      TrackCtrl::Expression => 127,
    }
  }
}

/// Settings that hold one value for the whole track.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackValue {
  Volume,
  Pan,
}

impl TrackValue {
  pub fn default_value(self) -> i32 {
    match self {
      TrackValue::Volume => 100,
      TrackValue::Pan => 64,
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackNote {
  pub note: Note,
  max_off: Ticks,
}

impl Interval for TrackNote {
  type Time = Ticks;

  fn on(&self) -> Ticks {
    self.note.on
  }

  fn off(&self) -> Ticks {
    self.note.off
  }

  fn max_off(&self) -> Ticks {
    self.max_off
  }

  fn set_max_off(&mut self, max_off: Ticks) {
    self.max_off = max_off;
  }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoteOrder;

impl Compare<TrackNote> for NoteOrder {
  fn compare(&self, a: &TrackNote, b: &TrackNote) -> Ordering {
    a.note.key_cmp(&b.note)
  }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrackRevision {
  notes: RevisionId,
  ctrl: [RevisionId; 2],
  values: [i32; 2],
  name: String,
  primary_program: Option<u8>,
}

pub struct Track {
  id: TrackId,
  notes: Tree<TrackNote, NoteOrder, MaxOff>,
  notesystem: NoteSystem,
  ctrl: [ValueMap; 2],
  values: [i32; 2],
  chanmask: ChanMask,
  channel_usage: [u32; CHANNELS],
  name: String,
  primary_program: Option<u8>,
}

impl Track {
  pub fn new(id: TrackId, chanmask: ChanMask) -> Track {
    let notesystem = if chanmask == CHANMASK_DRUMS {
      NoteSystem::Drums
    } else {
      NoteSystem::MidiStd
    };
    Track {
      id,
      notes: Tree::with_augment(NoteOrder, MaxOff),
      notesystem,
      ctrl: [
        ValueMap::new(TrackCtrl::Balance.default_value()),
        ValueMap::new(TrackCtrl::Expression.default_value()),
      ],
      values: [
        TrackValue::Volume.default_value(),
        TrackValue::Pan.default_value(),
      ],
      chanmask,
      channel_usage: [0; CHANNELS],
      name: String::new(),
      primary_program: None,
    }
  }

  pub fn id(&self) -> TrackId {
    self.id
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn set_name<S: Into<String>>(&mut self, name: S) {
    self.name = name.into();
  }

  pub fn notesystem(&self) -> NoteSystem {
    self.notesystem
  }

  /// Existing notes keep their MIDI keys.
  pub fn set_notesystem(&mut self, notesystem: NoteSystem) {
    self.notesystem = notesystem;
  }

  pub fn chanmask(&self) -> ChanMask {
    self.chanmask
  }

  pub fn is_drums(&self) -> bool {
    self.chanmask == CHANMASK_DRUMS
  }

  pub fn ctrl(&self, ctrl: TrackCtrl) -> &ValueMap {
    &self.ctrl[ctrl as usize]
  }

  pub fn ctrl_mut(&mut self, ctrl: TrackCtrl) -> &mut ValueMap {
    &mut self.ctrl[ctrl as usize]
  }

  pub fn value(&self, value: TrackValue) -> i32 {
    self.values[value as usize]
  }

  pub fn set_value(&mut self, value: TrackValue, data: i32) {
    self.values[value as usize] = data;
  }

  pub fn primary_program(&self) -> Option<u8> {
    self.primary_program
  }

  pub(crate) fn set_primary_program(&mut self, program: u8) {
    self.primary_program = Some(program);
  }

  /// Number of notes of this track assigned to a channel.
  pub fn channel_usage(&self, channel: u8) -> u32 {
    self.channel_usage[usize::from(channel)]
  }

  pub(crate) fn use_channel(&mut self, channel: u8) {
    self.channel_usage[usize::from(channel)] += 1;
  }

  pub(crate) fn release_channel(&mut self, channel: u8) {
    let usage = &mut self.channel_usage[usize::from(channel)];
    debug_assert!(*usage > 0, "channel {} is not used by track {}", channel, self.id);
    *usage = usage.saturating_sub(1);
  }

  pub(crate) fn clear_channel_usage(&mut self) {
    self.channel_usage = [0; CHANNELS];
  }

  pub fn len(&self) -> usize {
    self.notes.size()
  }

  pub fn is_empty(&self) -> bool {
    self.notes.is_empty()
  }

  /// Notes in key order.
  pub fn notes(&self) -> impl Iterator<Item = (NodeId, &Note)> + '_ {
    self.notes.iter().map(|(node, entry)| (node, &entry.note))
  }

  /// Whether the node holds a note currently in the track.
  pub fn contains(&self, node: NodeId) -> bool {
    self.notes.in_tree(node)
  }

  /// # Panics
  ///
  /// Panics when called with the end position.
  pub fn note(&self, node: NodeId) -> &Note {
    &self.notes[node].note
  }

  pub fn first(&self) -> Option<NodeId> {
    self.notes.root().map(|_| self.notes.begin())
  }

  pub(crate) fn insert(&mut self, note: Note) -> Result<NodeId, TreeError> {
    self.notes.insert(TrackNote {
      note,
      max_off: note.off,
    })
  }

  pub(crate) fn erase(&mut self, node: NodeId) {
    self.notes.erase(node);
  }

  pub(crate) fn clear(&mut self) {
    self.notes.clear();
  }

  /// Replaces a note, returning the previous one.
  pub(crate) fn change(&mut self, node: NodeId, note: Note) -> Result<Note, TreeError> {
    let old = self.notes.change(
      node,
      TrackNote {
        note,
        max_off: note.off,
      },
    )?;
    Ok(old.note)
  }

  pub fn for_range<R, F>(&self, begin: Ticks, end: Ticks, mut visit: F) -> Option<R>
  where
    F: FnMut(NodeId, &Note) -> Option<R>,
  {
    self
      .notes
      .for_range(begin, end, |node, entry| visit(node, &entry.note))
  }

  /// Notes sounding somewhere in `[begin, end)` with a pitch in `[pitch_begin, pitch_end)`.
  pub fn range(&self, begin: Ticks, end: Ticks, pitch_begin: i16, pitch_end: i16) -> Vec<NodeId> {
    let mut nodes = Vec::new();
    self.for_range(begin, end, |node, note| -> Option<()> {
      if pitch_begin <= note.pitch && note.pitch < pitch_end {
        nodes.push(node);
      }
      None
    });
    nodes
  }

  /// End of the last sounding note.
  pub fn length(&self) -> Ticks {
    self
      .notes
      .root()
      .map_or(Ticks::zero(), |root| self.notes[root].max_off)
  }

  pub(crate) fn commit(&mut self) -> Result<TrackRevision, TreeError> {
    Ok(TrackRevision {
      notes: self.notes.commit()?,
      ctrl: [self.ctrl[0].commit()?, self.ctrl[1].commit()?],
      values: self.values,
      name: self.name.clone(),
      primary_program: self.primary_program,
    })
  }

  /// Discards the uncommitted note and controller changes.
  pub(crate) fn revert(&mut self) -> Vec<NodeId> {
    let affected = self.notes.revert();
    for map in self.ctrl.iter_mut() {
      map.revert();
    }
    affected
  }

  /// Returns the notes that were added or removed.
  pub(crate) fn update(&mut self, revision: &TrackRevision) -> Vec<NodeId> {
    let affected = self.notes.update(revision.notes);
    for (map, revision) in self.ctrl.iter_mut().zip(revision.ctrl.iter()) {
      map.update(*revision);
    }
    self.values = revision.values;
    self.name = revision.name.clone();
    self.primary_program = revision.primary_program;
    if !affected.is_empty() {
      trace!("Track {}: {} notes moved", self.id, affected.len());
    }
    affected
  }
}

#[cfg(test)]
mod test {

  use super::{Track, TrackCtrl, TrackId, TrackValue};
  use crate::note::Note;
  use crate::notesystem::{NoteSystem, CHANMASK_DRUMS, CHANMASK_NODRUMS};
  use crate::time::Ticks;

  fn note(on: i32, off: i32, pitch: i16) -> Note {
    Note::new(Ticks::new(on), Ticks::new(off), pitch, pitch as u8)
  }

  fn track() -> Track {
    Track::new(TrackId::new(0), CHANMASK_NODRUMS)
  }

  #[test]
  pub fn defaults() {
    let track = track();
    assert_eq!(track.value(TrackValue::Volume), 100);
    assert_eq!(track.value(TrackValue::Pan), 64);
    assert_eq!(track.ctrl(TrackCtrl::Balance).get(Ticks::zero()), 64);
    assert_eq!(track.ctrl(TrackCtrl::Expression).get(Ticks::zero()), 127);
    assert_eq!(track.notesystem(), NoteSystem::MidiStd);
    assert!(!track.is_drums());
    assert_eq!(track.length(), Ticks::zero());
    assert_eq!(track.first(), None);

    let drums = Track::new(TrackId::new(1), CHANMASK_DRUMS);
    assert!(drums.is_drums());
    assert_eq!(drums.notesystem(), NoteSystem::Drums);
  }

  #[test]
  pub fn length_follows_latest_off() {
    let mut track = track();
    track.insert(note(0, 100, 60)).unwrap();
    let long = track.insert(note(10, 500, 62)).unwrap();
    track.insert(note(400, 450, 64)).unwrap();
    assert_eq!(track.length(), Ticks::new(500));

    track.erase(long);
    assert_eq!(track.length(), Ticks::new(450));
  }

  #[test]
  pub fn range_filters_pitch() {
    let mut track = track();
    let low = track.insert(note(0, 10, 40)).unwrap();
    let high = track.insert(note(5, 15, 80)).unwrap();
    track.insert(note(20, 30, 60)).unwrap();

    assert_eq!(track.range(Ticks::new(8), Ticks::new(20), 0, 128), vec![low, high]);
    assert_eq!(track.range(Ticks::new(8), Ticks::new(20), 50, 128), vec![high]);
    assert!(track.range(Ticks::new(8), Ticks::new(20), 41, 80).is_empty());
  }

  #[test]
  pub fn change_moves_note() {
    let mut track = track();
    let node = track.insert(note(0, 10, 60)).unwrap();
    track.insert(note(5, 10, 60)).unwrap();
    let old = track.change(node, note(20, 40, 60)).unwrap();
    assert_eq!(old.on, Ticks::zero());
    assert_eq!(track.notes().last().map(|(last, _)| last), Some(node));
    assert_eq!(track.length(), Ticks::new(40));
  }

  #[test]
  pub fn revisions_restore_settings() {
    let mut track = track();
    track.insert(note(0, 10, 60)).unwrap();
    let first = track.commit().unwrap();

    track.set_name("lead");
    track.set_value(TrackValue::Volume, 90);
    track.set_primary_program(12);
    let added = track.insert(note(10, 20, 62)).unwrap();
    track
      .ctrl_mut(TrackCtrl::Expression)
      .set(Ticks::new(10), 100)
      .unwrap();
    let second = track.commit().unwrap();

    assert_eq!(track.update(&first), vec![added]);
    assert_eq!(track.name(), "");
    assert_eq!(track.value(TrackValue::Volume), 100);
    assert_eq!(track.primary_program(), None);
    assert_eq!(track.ctrl(TrackCtrl::Expression).get(Ticks::new(15)), 127);
    assert_eq!(track.len(), 1);

    assert_eq!(track.update(&second), vec![added]);
    assert_eq!(track.name(), "lead");
    assert_eq!(track.primary_program(), Some(12));
    assert!(track.contains(added));
  }

  #[test]
  pub fn channel_usage_counts() {
    let mut track = track();
    track.use_channel(3);
    track.use_channel(3);
    track.release_channel(3);
    assert_eq!(track.channel_usage(3), 1);
    assert_eq!(track.channel_usage(4), 0);
  }
}
