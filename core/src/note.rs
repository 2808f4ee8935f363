use std::cmp::Ordering;
use std::fmt;

use crate::bst::NodeId;
use crate::time::Ticks;
use crate::track::TrackId;

pub const DEFAULT_VELOCITY: u8 = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Note {
  pub on: Ticks,
  pub off: Ticks,
  /// Pitch in the note system of the track.
  pub pitch: i16,
  pub midipitch: u8,
  pub on_velocity: u8,
  pub off_velocity: u8,
  /// Output channel, `None` until a channel has been assigned.
  pub channel: Option<u8>,
}

impl Note {
  pub fn new(on: Ticks, off: Ticks, pitch: i16, midipitch: u8) -> Note {
    Note {
      on,
      off,
      pitch,
      midipitch,
      on_velocity: DEFAULT_VELOCITY,
      off_velocity: DEFAULT_VELOCITY,
      channel: None,
    }
  }

  pub fn length(&self) -> Ticks {
    self.off - self.on
  }

  /// Order of notes inside tracks and channels.
  pub fn key_cmp(&self, other: &Note) -> Ordering {
    self
      .on
      .cmp(&other.on)
      .then(self.off.cmp(&other.off))
      .then(self.midipitch.cmp(&other.midipitch))
  }
}

impl fmt::Display for Note {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    write!(f, "[{}, {}) pitch {}", self.on, self.off, self.pitch)?;
    if self.midipitch as i16 != self.pitch {
      write!(f, " (key {})", self.midipitch)?;
    }
    match self.channel {
      Some(channel) => write!(f, " channel {}", channel),
      None => Ok(()),
    }
  }
}

/// A note stored in a track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NoteRef {
  pub track: TrackId,
  pub node: NodeId,
}
