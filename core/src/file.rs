//! A score file: tracks, output channels and the file-wide controller curves, all
//! versioned together.
//!
//! Every mutation goes through [`File`] so that the channel indexes and the
//! per-track channel usage always mirror the channel stored in each note. A file
//! revision bundles the revisions of every tree it owns, and [`File::update`]
//! fans out to all of them.

use std::convert::TryFrom;
use std::fmt;

use failure::Fail;
use log::{debug, trace, warn};

use crate::bst::{RevisionId, TreeError};
use crate::channel::{Channel, ChannelCtrl, ChannelRevision, CHANNELS};
use crate::config::FileConfig;
use crate::map::ValueMap;
use crate::note::{Note, NoteRef};
use crate::notesystem::{ChanMask, NOTES};
use crate::time::{Signature, Tempo, Ticks};
use crate::track::{Track, TrackId, TrackRevision};

#[derive(Debug, Fail)]
pub enum FileError {
  #[fail(display = "Too many tracks, the limit is {}", limit)]
  TooManyTracks { limit: usize },

  #[fail(display = "Track {} does not exist", track)]
  UnknownTrack { track: TrackId },

  #[fail(display = "The note is not in track {}", track)]
  UnknownNote { track: TrackId },

  #[fail(display = "Pitch {} can not be played by the note system of the track", pitch)]
  InvalidPitch { pitch: i16 },

  #[fail(display = "Invalid note span [{}, {})", on, off)]
  InvalidSpan { on: Ticks, off: Ticks },

  #[fail(display = "Invalid channel {}", channel)]
  InvalidChannel { channel: u8 },

  #[fail(display = "Invalid program {}", program)]
  InvalidProgram { program: u8 },

  #[fail(display = "Revision {} does not exist", revision)]
  UnknownRevision { revision: usize },

  #[fail(display = "{}", cause)]
  Tree { cause: TreeError },
}

impl From<TreeError> for FileError {
  fn from(cause: TreeError) -> FileError {
    FileError::Tree { cause }
  }
}

pub type FileResult<T> = Result<T, FileError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileCtrl {
  Tempo,
  TimeSignature,
}

impl FileCtrl {
  fn index(self) -> usize {
    self as usize
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FileRevisionId(usize);

impl FileRevisionId {
  pub fn index(self) -> usize {
    self.0
  }
}

impl fmt::Display for FileRevisionId {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    write!(f, "{}", self.0)
  }
}

#[derive(Debug, Clone, PartialEq)]
struct FileRevision {
  tracks: Vec<TrackId>,
  track_revs: Vec<TrackRevision>,
  channels: Vec<ChannelRevision>,
  ctrl: [RevisionId; 2],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Measure {
  /// Measures are numbered from one.
  pub number: i32,
  pub signature: Signature,
  pub begin: Ticks,
  /// Cut short when the signature changes inside the measure.
  pub end: Ticks,
  /// Length of one beat.
  pub part_size: Ticks,
}

pub struct File {
  division: u32,
  max_tracks: usize,
  /// Every track ever created, indexed by id.
  tracks: Vec<Track>,
  live: Vec<TrackId>,
  channels: Vec<Channel>,
  ctrl: [ValueMap; 2],
  /// Number of the measure starting at each signature change.
  measure_index: ValueMap,
  revisions: Vec<FileRevision>,
  current: Option<FileRevisionId>,
}

impl File {
  pub fn new(config: &FileConfig) -> File {
    File {
      division: config.clamped_division(),
      max_tracks: config.max_tracks,
      tracks: Vec::new(),
      live: Vec::new(),
      channels: (0..CHANNELS as u8).map(Channel::new).collect(),
      ctrl: [
        ValueMap::new(i32::from(config.initial_tempo())),
        ValueMap::new(config.initial_signature().encode()),
      ],
      measure_index: ValueMap::new(1),
      revisions: Vec::new(),
      current: None,
    }
  }

  /// Ticks per quarter note.
  pub fn division(&self) -> u32 {
    self.division
  }

  pub fn add_track(&mut self, chanmask: ChanMask) -> FileResult<TrackId> {
    let limit = self.max_tracks;
    if self.live.len() >= limit {
      warn!("Track limit of {} reached", limit);
      return Err(FileError::TooManyTracks { limit });
    }
    let index = u32::try_from(self.tracks.len()).map_err(|_| FileError::TooManyTracks { limit })?;
    let id = TrackId::new(index);
    self.tracks.push(Track::new(id, chanmask));
    self.live.push(id);
    debug!("Added track {}", id);
    Ok(id)
  }

  /// Live tracks in creation order.
  pub fn tracks(&self) -> impl Iterator<Item = &Track> + '_ {
    self.live.iter().map(move |id| &self.tracks[id.index()])
  }

  pub fn track(&self, id: TrackId) -> Option<&Track> {
    self.live_track(id).ok()
  }

  pub fn track_mut(&mut self, id: TrackId) -> Option<&mut Track> {
    self.live_track_mut(id).ok()
  }

  /// # Panics
  ///
  /// Panics when the number is not below [`CHANNELS`].
  pub fn channel(&self, number: u8) -> &Channel {
    &self.channels[usize::from(number)]
  }

  pub fn channels(&self) -> impl Iterator<Item = &Channel> + '_ {
    self.channels.iter()
  }

  pub fn ctrl(&self, ctrl: FileCtrl) -> &ValueMap {
    &self.ctrl[ctrl.index()]
  }

  pub fn note(&self, note: NoteRef) -> FileResult<&Note> {
    let track = self.live_track(note.track)?;
    if track.contains(note.node) {
      Ok(track.note(note.node))
    } else {
      Err(FileError::UnknownNote { track: note.track })
    }
  }

  /// Adds a note without a channel. The MIDI key comes from the note system of the track.
  pub fn insert_note(&mut self, track: TrackId, on: Ticks, off: Ticks, pitch: i16) -> FileResult<NoteRef> {
    if on < Ticks::zero() || on >= off || off == Ticks::MAX {
      return Err(FileError::InvalidSpan { on, off });
    }
    let track_data = self.live_track_mut(track)?;
    let info = track_data
      .notesystem()
      .pitch_info(pitch)
      .ok_or(FileError::InvalidPitch { pitch })?;
    let node = track_data.insert(Note::new(on, off, pitch, info.midipitch))?;
    trace!("Track {}: inserted note [{}, {}) pitch {}", track, on, off, pitch);
    Ok(NoteRef { track, node })
  }

  pub fn erase_note(&mut self, note: NoteRef) -> FileResult<()> {
    let data = *self.note(note)?;
    if let Some(channel) = data.channel {
      self.channels[usize::from(channel)].erase(note, &data);
      self.tracks[note.track.index()].release_channel(channel);
    }
    self.tracks[note.track.index()].erase(note.node);
    trace!("Track {}: erased note {}", note.track, data);
    Ok(())
  }

  /// Erases every note of a track.
  pub fn clear_track(&mut self, track: TrackId) -> FileResult<()> {
    let track_data = self.live_track_mut(track)?;
    let assigned: Vec<(NoteRef, Note)> = track_data
      .notes()
      .filter(|(_, note)| note.channel.is_some())
      .map(|(node, note)| (NoteRef { track, node }, *note))
      .collect();
    for (note, data) in assigned {
      if let Some(channel) = data.channel {
        self.channels[usize::from(channel)].erase(note, &data);
        self.tracks[track.index()].release_channel(channel);
      }
    }
    self.tracks[track.index()].clear();
    debug!("Track {}: cleared", track);
    Ok(())
  }

  /// Moves a note to another pitch of its note system, bending the channel it is
  /// assigned to when the pitch falls between MIDI keys.
  pub fn set_note_pitch(&mut self, note: NoteRef, pitch: i16) -> FileResult<()> {
    let old = *self.note(note)?;
    let track = &mut self.tracks[note.track.index()];
    let info = track
      .notesystem()
      .pitch_info(pitch)
      .ok_or(FileError::InvalidPitch { pitch })?;

    let mut new = old;
    new.pitch = pitch;
    new.midipitch = info.midipitch;

    match old.channel {
      Some(channel) => {
        let channel = &mut self.channels[usize::from(channel)];
        channel.erase(note, &old);
        track.change(note.node, new)?;
        channel.insert(note, &new)?;
        channel
          .ctrl_mut(ChannelCtrl::PitchWheel)
          .set_range(new.on, new.off, info.wheel)?;
      }
      None => {
        track.change(note.node, new)?;
      }
    }
    Ok(())
  }

  /// Assigns a note to an output channel, or takes it off its channel with `None`.
  ///
  /// The channel controllers over the note span follow the note: they are copied
  /// from the previous channel, or derived from the track program and the note
  /// pitch when the note had no channel.
  pub fn set_note_channel(&mut self, note: NoteRef, channel: Option<u8>) -> FileResult<()> {
    if let Some(number) = channel {
      if usize::from(number) >= CHANNELS {
        return Err(FileError::InvalidChannel { channel: number });
      }
    }
    let old = *self.note(note)?;
    if old.channel == channel {
      return Ok(());
    }

    let program = self.program(note.track)?;
    let track = &mut self.tracks[note.track.index()];
    let mut new = old;
    new.channel = channel;

    if let Some(from) = old.channel {
      self.channels[usize::from(from)].erase(note, &old);
      track.release_channel(from);
    }
    track.change(note.node, new)?;

    if let Some(to) = channel {
      track.use_channel(to);
      self.channels[usize::from(to)].insert(note, &new)?;
      match old.channel {
        Some(from) => {
          let (source, dest) = channel_pair(&mut self.channels, usize::from(from), usize::from(to));
          for &ctrl in ChannelCtrl::ALL.iter() {
            source
              .ctrl(ctrl)
              .copy_to(new.on, new.off, dest.ctrl_mut(ctrl), new.on)?;
          }
        }
        None => {
          let wheel = track
            .notesystem()
            .pitch_info(new.pitch)
            .map_or(0, |info| info.wheel);
          let dest = &mut self.channels[usize::from(to)];
          dest
            .ctrl_mut(ChannelCtrl::Program)
            .set_range(new.on, new.off, i32::from(program))?;
          dest
            .ctrl_mut(ChannelCtrl::PitchWheel)
            .set_range(new.on, new.off, wheel)?;
        }
      }
    }
    trace!("Track {}: note {} now on channel {:?}", note.track, old, channel);
    Ok(())
  }

  /// Sets the program of a track, rewriting the program curve of every channel
  /// under the notes of the track.
  pub fn set_program(&mut self, track: TrackId, program: u8) -> FileResult<()> {
    if i16::from(program) >= NOTES {
      return Err(FileError::InvalidProgram { program });
    }
    let track_data = self.live_track_mut(track)?;
    track_data.set_primary_program(program);

    let track_data = &self.tracks[track.index()];
    for (_, note) in track_data.notes() {
      if let Some(channel) = note.channel {
        self.channels[usize::from(channel)]
          .ctrl_mut(ChannelCtrl::Program)
          .set_range(note.on, note.off, i32::from(program))?;
      }
    }
    debug!("Track {}: program {}", track, program);
    Ok(())
  }

  /// The primary program of the track, else the program its first assigned note plays.
  pub fn program(&self, track: TrackId) -> FileResult<u8> {
    let track = self.live_track(track)?;
    if let Some(program) = track.primary_program() {
      return Ok(program);
    }
    let program = track
      .notes()
      .find_map(|(_, note)| {
        note.channel.map(|channel| {
          self.channels[usize::from(channel)]
            .ctrl(ChannelCtrl::Program)
            .get(note.on)
        })
      })
      .unwrap_or(0);
    Ok(program as u8)
  }

  pub fn set_tempo(&mut self, time: Ticks, tempo: Tempo) -> FileResult<()> {
    self.ctrl[FileCtrl::Tempo.index()].set(time, i32::from(tempo))?;
    Ok(())
  }

  pub fn tempo_at(&self, time: Ticks) -> Tempo {
    Tempo::from(self.ctrl[FileCtrl::Tempo.index()].get(time))
  }

  pub fn set_signature(&mut self, time: Ticks, signature: Signature) -> FileResult<()> {
    self.ctrl[FileCtrl::TimeSignature.index()].set(time, signature.encode())?;
    self.regen_measure_index()
  }

  pub fn signature_at(&self, time: Ticks) -> Signature {
    Signature::decode(self.ctrl[FileCtrl::TimeSignature.index()].get(time))
  }

  /// End of the last sounding note of any live track.
  pub fn length(&self) -> Ticks {
    self
      .tracks()
      .map(Track::length)
      .max()
      .unwrap_or_else(Ticks::zero)
  }

  /// Measures overlapping `[begin, end)`.
  pub fn measures(&self, begin: Ticks, end: Ticks) -> Vec<Measure> {
    let mut measures = Vec::new();
    let mut begin = begin.max(Ticks::zero());
    while begin < end {
      let cutoff = self
        .measure_index
        .next_change(begin)
        .unwrap_or(Ticks::MAX);
      self.measures_until(begin, end, cutoff, &mut measures);
      begin = cutoff;
    }
    measures
  }

  pub fn measure_at(&self, time: Ticks) -> Option<Measure> {
    self.measures(time, time + Ticks::new(1)).into_iter().next()
  }

  pub fn current_revision(&self) -> Option<FileRevisionId> {
    self.current
  }

  pub fn revision_count(&self) -> usize {
    self.revisions.len()
  }

  pub fn find_revision(&self, index: usize) -> FileResult<FileRevisionId> {
    if index < self.revisions.len() {
      Ok(FileRevisionId(index))
    } else {
      Err(FileError::UnknownRevision { revision: index })
    }
  }

  /// Commits every tree of the file. Returns the current revision when nothing changed.
  pub fn commit(&mut self) -> FileResult<FileRevisionId> {
    let mut track_revs = Vec::with_capacity(self.live.len());
    for id in self.live.iter() {
      track_revs.push(self.tracks[id.index()].commit()?);
    }
    let mut channels = Vec::with_capacity(CHANNELS);
    for channel in self.channels.iter_mut() {
      channels.push(channel.commit()?);
    }
    let ctrl = [self.ctrl[0].commit()?, self.ctrl[1].commit()?];
    self.regen_measure_index()?;

    let revision = FileRevision {
      tracks: self.live.clone(),
      track_revs,
      channels,
      ctrl,
    };
    if let Some(current) = self.current {
      if self.revisions[current.0] == revision {
        return Ok(current);
      }
    }

    let id = FileRevisionId(self.revisions.len());
    self.revisions.push(revision);
    self.current = Some(id);
    debug!("Committed revision {}", id);
    Ok(id)
  }

  /// Discards everything done since the last commit.
  pub fn revert(&mut self) -> FileResult<()> {
    match self.current {
      Some(current) => self.update(current),
      None => Ok(()),
    }
  }

  /// Moves the whole file to a committed revision, dropping uncommitted changes.
  pub fn update(&mut self, id: FileRevisionId) -> FileResult<()> {
    let revision = self
      .revisions
      .get(id.0)
      .ok_or(FileError::UnknownRevision { revision: id.0 })?;

    for track in self.live.iter() {
      if !revision.tracks.contains(track) {
        self.tracks[track.index()].revert();
      }
    }
    for (track, track_rev) in revision.tracks.iter().zip(revision.track_revs.iter()) {
      let moved = self.tracks[track.index()].update(track_rev);
      if !moved.is_empty() {
        trace!("Track {}: {} notes moved", track, moved.len());
      }
    }
    self.live = revision.tracks.clone();

    for (channel, channel_rev) in self.channels.iter_mut().zip(revision.channels.iter()) {
      channel.update(channel_rev);
    }
    for (map, map_rev) in self.ctrl.iter_mut().zip(revision.ctrl.iter()) {
      map.update(*map_rev);
    }
    self.recount_channel_usage();

    self.current = Some(id);
    self.regen_measure_index()?;
    debug!("Updated to revision {}", id);
    Ok(())
  }

  fn recount_channel_usage(&mut self) {
    for track in self.tracks.iter_mut() {
      track.clear_channel_usage();
    }
    for channel in self.channels.iter() {
      for note in channel.notes() {
        self.tracks[note.track.index()].use_channel(channel.number());
      }
    }
  }

  fn live_track(&self, id: TrackId) -> FileResult<&Track> {
    if self.live.contains(&id) {
      Ok(&self.tracks[id.index()])
    } else {
      Err(FileError::UnknownTrack { track: id })
    }
  }

  fn live_track_mut(&mut self, id: TrackId) -> FileResult<&mut Track> {
    if self.live.contains(&id) {
      Ok(&mut self.tracks[id.index()])
    } else {
      Err(FileError::UnknownTrack { track: id })
    }
  }

  fn regen_measure_index(&mut self) -> FileResult<()> {
    self.measure_index.clear();
    let signatures = &self.ctrl[FileCtrl::TimeSignature.index()];
    let mut signature = Signature::decode(signatures.default_value());
    let mut time = Ticks::zero();
    let mut number = 1;
    for (_, change) in signatures.iter() {
      let size = signature.measure_ticks(self.division).max(Ticks::new(1));
      let elapsed = change.time - time;
      number += (elapsed + size - Ticks::new(1)) / size;
      signature = Signature::decode(change.value);
      time = change.time;
      self.measure_index.set(time, number)?;
    }
    Ok(())
  }

  /// Appends the measures starting in `[begin, end)` before `cutoff`, under the
  /// signature in effect at `begin`.
  fn measures_until(&self, begin: Ticks, end: Ticks, cutoff: Ticks, measures: &mut Vec<Measure>) {
    let (start, number) = self.measure_index.get_change(begin);
    let signature = self.signature_at(begin);
    let size = signature.measure_ticks(self.division).max(Ticks::new(1));
    let skipped = (begin - start) / size;

    let mut measure = Measure {
      number: number + skipped,
      signature,
      begin: start + size * skipped,
      end: start + size * (skipped + 1),
      part_size: signature.beat_ticks(self.division),
    };
    while measure.begin < end && measure.begin < cutoff {
      let mut visible = measure;
      if visible.end > cutoff {
        visible.end = cutoff;
      }
      measures.push(visible);
      measure.number += 1;
      measure.begin += size;
      measure.end += size;
    }
  }
}

fn channel_pair(channels: &mut [Channel], from: usize, to: usize) -> (&Channel, &mut Channel) {
  if from < to {
    let (head, tail) = channels.split_at_mut(to);
    (&head[from], &mut tail[0])
  } else {
    let (head, tail) = channels.split_at_mut(from);
    (&tail[0], &mut head[to])
  }
}
