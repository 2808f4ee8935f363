use failure::Error;

use serde_derive::Deserialize;

use std::fs::File;
use std::io::Read;

use score_core::config::FileConfig;

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct Config {
  pub file: FileConfig,
  pub shell: ShellConfig,
}

impl Default for Config {
  fn default() -> Config {
    Config {
      file: FileConfig::default(),
      shell: ShellConfig::default(),
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

  #[allow(dead_code)]
  pub fn from_str<'a, T>(content: T) -> Result<Config, Error>
  where
    T: Into<&'a str>,
  {
    let config: Config = toml::from_str(content.into())?;
    Ok(config)
  }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct ShellConfig {
  /// Print every command before its output.
  pub echo: bool,
}

impl Default for ShellConfig {
  fn default() -> ShellConfig {
    ShellConfig { echo: false }
  }
}

#[cfg(test)]
mod test {

  use super::Config;

  #[test]
  pub fn defaults() {
    let config = Config::from_str("").unwrap();
    assert!(!config.shell.echo);
    assert_eq!(config.file.division, 240);
  }

  #[test]
  pub fn sections() {
    let config = Config::from_str(
      r#"
      [file]
      division = 480
      max_tracks = 4

      [shell]
      echo = true
      "#,
    )
    .unwrap();
    assert!(config.shell.echo);
    assert_eq!(config.file.division, 480);
    assert_eq!(config.file.max_tracks, 4);
    assert_eq!(config.file.tempo, 120);
  }
}
