use failure::Error;

use serde_derive::Deserialize;

use std::fs::File;
use std::io::Read;

use crate::time::{Signature, Tempo};

/// Largest division a MIDI file header can express.
pub const MAX_DIVISION: u32 = 0x7fff;

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct SignatureConfig {
  pub num_beats: u8,
  pub note_value: u8,
}

impl Default for SignatureConfig {
  fn default() -> SignatureConfig {
    SignatureConfig {
      num_beats: 4,
      note_value: 4,
    }
  }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct FileConfig {
  /// Ticks per quarter note.
  pub division: u32,
  pub max_tracks: usize,
  /// Initial tempo in beats per minute.
  pub tempo: u16,
  pub signature: SignatureConfig,
}

impl Default for FileConfig {
  fn default() -> FileConfig {
    FileConfig {
      division: 240,
      max_tracks: 32,
      tempo: 120,
      signature: SignatureConfig::default(),
    }
  }
}

impl FileConfig {
  /// The configured division, kept within `1..=MAX_DIVISION`.
  pub fn clamped_division(&self) -> u32 {
    self.division.max(1).min(MAX_DIVISION)
  }

  pub fn initial_tempo(&self) -> Tempo {
    Tempo::from_bpm(self.tempo)
  }

  /// Falls back to 4/4 when the configured signature is invalid.
  pub fn initial_signature(&self) -> Signature {
    Signature::checked(self.signature.num_beats, self.signature.note_value).unwrap_or_default()
  }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct Config {
  pub file: FileConfig,
}

impl Default for Config {
  fn default() -> Config {
    Config {
      file: FileConfig::default(),
    }
  }
}

impl Config {
  pub fn from_file<'a, T>(path: T) -> Result<Config, Error>
  where
    T: Into<&'a str>,
  {
    let mut content = String::new();
    let path_str = path.into();
    let mut file = File::open(path_str)?;
    file.read_to_string(&mut content)?;
    let config: Config = toml::from_str(&content)?;
    Ok(config)
  }

  pub fn from_str<'a, T>(content: T) -> Result<Config, Error>
  where
    T: Into<&'a str>,
  {
    let config: Config = toml::from_str(content.into())?;
    Ok(config)
  }
}
