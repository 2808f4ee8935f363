use std::fmt;

use crate::time::Ticks;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Signature {
  num_beats: u8,  // numerator
  note_value: u8, // denominator
}

impl Signature {
  /// # Panics
  ///
  /// Panics when the note value is not a power of two up to 64 or there are no beats.
  pub fn new(num_beats: u8, note_value: u8) -> Signature {
    match Signature::checked(num_beats, note_value) {
      Some(signature) => signature,
      None => panic!("Invalid time signature {}/{}", num_beats, note_value),
    }
  }

  pub fn checked(num_beats: u8, note_value: u8) -> Option<Signature> {
    if num_beats > 0 && note_value.is_power_of_two() && note_value <= 64 {
      Some(Signature {
        num_beats,
        note_value,
      })
    } else {
      None
    }
  }

  pub fn get_num_beats(&self) -> u8 {
    self.num_beats
  }

  pub fn get_note_value(&self) -> u8 {
    self.note_value
  }

  /// Length of one beat for a file division given in ticks per quarter note.
  pub fn beat_ticks(&self, division: u32) -> Ticks {
    let ticks = u64::from(division) * 4 / u64::from(self.note_value);
    Ticks::new(ticks.min(i32::max_value() as u64) as i32)
  }

  pub fn measure_ticks(&self, division: u32) -> Ticks {
    self.beat_ticks(division) * i32::from(self.num_beats)
  }

  /// Value stored in controller maps: numerator in the low byte, log2 of the
  /// denominator above it.
  pub fn encode(&self) -> i32 {
    i32::from(self.num_beats) | (self.note_value.trailing_zeros() as i32) << 8
  }

  pub fn decode(value: i32) -> Signature {
    let num_beats = (value & 0xff) as u8;
    let note_value = 1u8 << ((value >> 8) & 0x7).min(6);
    Signature {
      num_beats: num_beats.max(1),
      note_value,
    }
  }
}

impl Default for Signature {
  fn default() -> Signature {
    Signature {
      num_beats: 4,
      note_value: 4,
    }
  }
}

impl fmt::Display for Signature {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    write!(f, "{}/{}", self.num_beats, self.note_value)
  }
}

#[cfg(test)]
mod test {

  use super::Signature;
  use crate::time::Ticks;

  #[test]
  pub fn signature_new() {
    let signature = Signature::new(3, 4);
    assert_eq!(signature.get_num_beats(), 3);
    assert_eq!(signature.get_note_value(), 4);
  }

  #[test]
  pub fn checked() {
    assert!(Signature::checked(7, 8).is_some());
    assert!(Signature::checked(0, 4).is_none());
    assert!(Signature::checked(4, 3).is_none());
    assert!(Signature::checked(4, 128).is_none());
  }

  #[test]
  pub fn encoding() {
    assert_eq!(Signature::new(4, 4).encode(), 4 | 2 << 8);
    assert_eq!(Signature::new(6, 8).encode(), 6 | 3 << 8);
    assert_eq!(Signature::decode(Signature::new(5, 16).encode()), Signature::new(5, 16));
  }

  #[test]
  pub fn sizes() {
    let signature = Signature::new(6, 8);
    assert_eq!(signature.beat_ticks(240), Ticks::new(120));
    assert_eq!(signature.measure_ticks(240), Ticks::new(720));
  }

  #[test]
  pub fn sizes_saturate() {
    let signature = Signature::new(4, 1);
    assert_eq!(signature.beat_ticks(u32::max_value()), Ticks::MAX);
    assert_eq!(signature.measure_ticks(u32::max_value()), Ticks::MAX);
  }
}
