use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

use log::{debug, info, warn, LevelFilter};

use failure::{Error, Fail};

use log4rs::append::console::{ConsoleAppender, Target};
use log4rs::config::{Appender, Config as LogConfig, Root};
use log4rs::encode::pattern::PatternEncoder;

mod config;
use crate::config::Config;

mod shell;
use crate::shell::Shell;

const SCORE_CONFIG: &str = "SCORE_CONFIG";
const DEFAULT_SCORE_CONFIG: &str = "score.toml";

const SCORE_LOG_CONFIG: &str = "SCORE_LOG_CONFIG";
const DEFAULT_SCORE_LOG_CONFIG: &str = "log4rs.yaml";

const LOG_PATTERN: &str = "{d(%H:%M:%S%.3f)} {l:5} {t} - {m}{n}";

#[derive(Debug, Fail)]
enum MainError {
  #[fail(display = "Failed to init logging: {}", cause)]
  LoggingInit { cause: String },

  #[fail(display = "Failed to open the script {}: {}", path, cause)]
  OpenScript { path: String, cause: io::Error },
}

fn main() -> Result<(), Error> {
  init_logging()?;

  let config = init_config()?;

  let input = open_input()?;

  run(input, &config)
}

fn init_logging() -> Result<(), Error> {
  let log_config_path =
    std::env::var(SCORE_LOG_CONFIG).unwrap_or_else(|_| DEFAULT_SCORE_LOG_CONFIG.to_string());

  if Path::new(&log_config_path).exists() {
    log4rs::init_file(log_config_path.as_str(), Default::default()).map_err(|err| {
      MainError::LoggingInit {
        cause: err.to_string(),
      }
    })?;
  } else {
    let stderr = ConsoleAppender::builder()
      .target(Target::Stderr)
      .encoder(Box::new(PatternEncoder::new(LOG_PATTERN)))
      .build();

    let log_config = LogConfig::builder()
      .appender(Appender::builder().build("stderr", Box::new(stderr)))
      .build(Root::builder().appender("stderr").build(LevelFilter::Warn))
      .map_err(|err| MainError::LoggingInit {
        cause: err.to_string(),
      })?;

    log4rs::init_config(log_config).map_err(|err| MainError::LoggingInit {
      cause: err.to_string(),
    })?;
  }

  Ok(())
}

fn init_config() -> Result<Config, Error> {
  let config_path =
    std::env::var(SCORE_CONFIG).unwrap_or_else(|_| DEFAULT_SCORE_CONFIG.to_string());

  let config = if Path::new(&config_path).exists() {
    info!("Loading configuration from {} ...", config_path);
    Config::from_file(config_path.as_str())?
  } else {
    info!("No configuration at {}, using defaults", config_path);
    Config::default()
  };
  debug!("{:#?}", config);

  Ok(config)
}

/// The script named by the first argument, stdin otherwise.
fn open_input() -> Result<Box<dyn BufRead>, Error> {
  match std::env::args().nth(1) {
    Some(path) => {
      let file = File::open(&path).map_err(|cause| MainError::OpenScript {
        path: path.clone(),
        cause,
      })?;
      Ok(Box::new(BufReader::new(file)))
    }
    None => Ok(Box::new(BufReader::new(io::stdin()))),
  }
}

fn run(input: Box<dyn BufRead>, config: &Config) -> Result<(), Error> {
  let mut shell = Shell::new(&config.file);

  for (index, line) in input.lines().enumerate() {
    let line = line?;
    if config.shell.echo && !line.trim().is_empty() {
      println!("> {}", line);
    }
    match shell.execute(&line) {
      Ok(output) => {
        if !output.is_empty() {
          println!("{}", output);
        }
      }
      Err(err) => {
        warn!("line {}: {}", index + 1, err);
        println!("error at line {}: {}", index + 1, err);
      }
    }
  }

  Ok(())
}
