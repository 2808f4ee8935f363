use std::fmt;

const MICROS_PER_MINUTE: u32 = 60_000_000;

/// Tempo as microseconds per quarter note, the way MIDI files store it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tempo(u32);

impl Tempo {
  pub fn new(micros_per_quarter: u32) -> Tempo {
    Tempo(micros_per_quarter.max(1))
  }

  pub fn from_bpm(bpm: u16) -> Tempo {
    Tempo::new(MICROS_PER_MINUTE / u32::from(bpm.max(1)))
  }

  pub fn get_value(&self) -> u32 {
    self.0
  }

  pub fn bpm(&self) -> u16 {
    (MICROS_PER_MINUTE / self.0).min(u32::from(u16::max_value())) as u16
  }
}

impl Default for Tempo {
  fn default() -> Tempo {
    Tempo::from_bpm(120)
  }
}

impl From<Tempo> for i32 {
  fn from(item: Tempo) -> Self {
    item.0 as i32
  }
}

impl From<i32> for Tempo {
  fn from(item: i32) -> Self {
    Tempo::new(item.max(1) as u32)
  }
}

impl fmt::Display for Tempo {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    write!(f, "{} bpm", self.bpm())
  }
}
