//! Mapping from track pitches to MIDI keys.

pub type ChanMask = u16;

pub const CHANMASK_ALL: ChanMask = 0xffff;
pub const CHANMASK_DRUMS: ChanMask = 1 << 9;
pub const CHANMASK_NODRUMS: ChanMask = CHANMASK_ALL & !CHANMASK_DRUMS;

/// Number of MIDI keys.
pub const NOTES: i16 = 128;

/// Pitch wheel offset for one semitone.
const WHEEL_SEMITONE: f32 = 4096.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PitchInfo {
  pub midipitch: u8,
  pub wheel: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoteSystem {
  /// Pitches are MIDI keys.
  MidiStd,
  /// MIDI keys played on the drum channel.
  Drums,
  /// Equal temperament with the given number of steps per octave.
  Tet(u8),
}

impl Default for NoteSystem {
  fn default() -> NoteSystem {
    NoteSystem::MidiStd
  }
}

impl NoteSystem {
  /// Zero steps stands for the drum system.
  pub fn tet(steps: u8) -> NoteSystem {
    match steps {
      0 => NoteSystem::Drums,
      steps => NoteSystem::Tet(steps),
    }
  }

  pub fn chanmask(self) -> ChanMask {
    match self {
      NoteSystem::Drums => CHANMASK_DRUMS,
      _ => CHANMASK_NODRUMS,
    }
  }

  /// First pitch past the playable range.
  pub fn end_pitch(self) -> i16 {
    match self {
      NoteSystem::MidiStd | NoteSystem::Drums => NOTES,
      NoteSystem::Tet(steps) => (i32::from(NOTES) * i32::from(steps) / 12) as i16,
    }
  }

  /// Staff level of a pitch, counted from the bottom. MIDI keys get an extra
  /// level for the line at each octave and one between E and F.
  pub fn pitch_to_level(self, pitch: i16) -> i32 {
    let pitch = i32::from(pitch);
    match self {
      NoteSystem::MidiStd | NoteSystem::Drums => {
        let octave_lines = 1 + pitch / 12;
        let ef_lines = (pitch + 7) / 12;
        pitch + octave_lines + ef_lines
      }
      NoteSystem::Tet(_) => pitch,
    }
  }

  /// Pitch drawn at `level`, `None` for line levels and levels past the range.
  pub fn level_to_pitch(self, level: i32) -> Option<i16> {
    let (mut begin, mut end) = (0, self.end_pitch());
    while begin < end {
      let pitch = begin + (end - begin) / 2;
      let found = self.pitch_to_level(pitch);
      if level < found {
        end = pitch;
      } else if level == found {
        return Some(pitch);
      } else {
        begin = pitch + 1;
      }
    }
    None
  }

  pub fn levels(self) -> i32 {
    self.pitch_to_level(self.end_pitch() - 1) + 1
  }

  /// MIDI key and pitch wheel offset that render `pitch`, or `None` when the pitch
  /// cannot be played.
  pub fn pitch_info(self, pitch: i16) -> Option<PitchInfo> {
    if pitch < 0 || pitch >= self.end_pitch() {
      return None;
    }

    match self {
      NoteSystem::MidiStd | NoteSystem::Drums => Some(PitchInfo {
        midipitch: pitch as u8,
        wheel: 0,
      }),
      NoteSystem::Tet(steps) => {
        let exact = f32::from(pitch) * 12.0 / f32::from(steps);
        let midipitch = (exact + 0.5) as i16;
        if midipitch >= NOTES {
          return None;
        }
        Some(PitchInfo {
          midipitch: midipitch as u8,
          wheel: ((exact - f32::from(midipitch)) * WHEEL_SEMITONE) as i32,
        })
      }
    }
  }
}
