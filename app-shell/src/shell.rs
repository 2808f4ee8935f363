use std::fmt::Write;
use std::str::{FromStr, SplitWhitespace};

use failure::Fail;
use log::debug;

use score_core::config::FileConfig;
use score_core::file::{File, FileError};
use score_core::note::NoteRef;
use score_core::notesystem::{CHANMASK_DRUMS, CHANMASK_NODRUMS};
use score_core::time::{Signature, Tempo, Ticks};
use score_core::track::{Track, TrackId};

#[derive(Debug, Fail)]
pub enum ShellError {
  #[fail(display = "Unknown command {}", command)]
  UnknownCommand { command: String },

  #[fail(display = "Missing argument <{}>", name)]
  MissingArgument { name: &'static str },

  #[fail(display = "Invalid argument <{}>: {}", name, value)]
  InvalidArgument { name: &'static str, value: String },

  #[fail(display = "There is no track at position {}", position)]
  UnknownTrack { position: usize },

  #[fail(display = "No note at {} with pitch {}", on, pitch)]
  NoteNotFound { on: Ticks, pitch: i16 },

  #[fail(display = "{}", cause)]
  File { cause: FileError },
}

impl From<FileError> for ShellError {
  fn from(cause: FileError) -> ShellError {
    ShellError::File { cause }
  }
}

pub type ShellResult<T> = Result<T, ShellError>;

struct Args<'a> {
  words: SplitWhitespace<'a>,
}

impl<'a> Args<'a> {
  fn next<T: FromStr>(&mut self, name: &'static str) -> ShellResult<T> {
    let word = self
      .words
      .next()
      .ok_or(ShellError::MissingArgument { name })?;
    word.parse().map_err(|_| ShellError::InvalidArgument {
      name,
      value: word.to_string(),
    })
  }

  fn ticks(&mut self, name: &'static str) -> ShellResult<Ticks> {
    self.next::<i32>(name).map(Ticks::new)
  }

  fn optional(&mut self) -> Option<&'a str> {
    self.words.next()
  }
}

/// Line oriented command interpreter over a [`File`].
pub struct Shell {
  file: File,
}

impl Shell {
  pub fn new(config: &FileConfig) -> Shell {
    Shell {
      file: File::new(config),
    }
  }

  pub fn file(&self) -> &File {
    &self.file
  }

  /// Runs one command line, returning what it prints. Blank lines and `#` comments
  /// print nothing.
  pub fn execute(&mut self, line: &str) -> ShellResult<String> {
    let line = line.split('#').next().unwrap_or("");
    let mut words = line.split_whitespace();
    let command = match words.next() {
      Some(command) => command,
      None => return Ok(String::new()),
    };
    debug!("Command: {}", line.trim());

    let mut args = Args { words };
    let mut out = String::new();
    match command {
      "track" => {
        let chanmask = match args.optional() {
          None => CHANMASK_NODRUMS,
          Some("drums") => CHANMASK_DRUMS,
          Some(value) => {
            return Err(ShellError::InvalidArgument {
              name: "kind",
              value: value.to_string(),
            })
          }
        };
        self.file.add_track(chanmask)?;
        let _ = write!(out, "track {}", self.file.tracks().count() - 1);
      }
      "note" => {
        let track = self.track_arg(&mut args)?;
        let on = args.ticks("on")?;
        let off = args.ticks("off")?;
        let pitch = args.next("pitch")?;
        let note = self.file.insert_note(track, on, off, pitch)?;
        let _ = write!(out, "{}", self.file.note(note)?);
      }
      "erase" => {
        let note = self.note_arg(&mut args)?;
        self.file.erase_note(note)?;
      }
      "channel" => {
        let note = self.note_arg(&mut args)?;
        let channel = match args.optional() {
          Some("none") => None,
          Some(value) => Some(value.parse().map_err(|_| ShellError::InvalidArgument {
            name: "channel",
            value: value.to_string(),
          })?),
          None => return Err(ShellError::MissingArgument { name: "channel" }),
        };
        self.file.set_note_channel(note, channel)?;
      }
      "pitch" => {
        let note = self.note_arg(&mut args)?;
        let pitch = args.next("new")?;
        self.file.set_note_pitch(note, pitch)?;
      }
      "program" => {
        let track = self.track_arg(&mut args)?;
        let program = args.next("program")?;
        self.file.set_program(track, program)?;
      }
      "tempo" => {
        let time = args.ticks("time")?;
        let bpm = args.next("bpm")?;
        self.file.set_tempo(time, Tempo::from_bpm(bpm))?;
      }
      "signature" => {
        let time = args.ticks("time")?;
        let num_beats = args.next("beats")?;
        let note_value: u8 = args.next("note value")?;
        let signature =
          Signature::checked(num_beats, note_value).ok_or(ShellError::InvalidArgument {
            name: "note value",
            value: note_value.to_string(),
          })?;
        self.file.set_signature(time, signature)?;
      }
      "commit" => {
        let revision = self.file.commit()?;
        let _ = write!(out, "revision {}", revision);
      }
      "update" => {
        let revision = self.file.find_revision(args.next("revision")?)?;
        self.file.update(revision)?;
      }
      "revert" => self.file.revert()?,
      "range" => {
        let track = self.track_arg(&mut args)?;
        let begin = args.ticks("begin")?;
        let end = args.ticks("end")?;
        if let Some(track) = self.file.track(track) {
          let notes = track.range(begin, end, i16::min_value(), i16::max_value());
          for node in notes {
            let _ = writeln!(out, "{}", track.note(node));
          }
        }
      }
      "measures" => {
        let begin = args.ticks("begin")?;
        let end = args.ticks("end")?;
        for measure in self.file.measures(begin, end) {
          let _ = writeln!(
            out,
            "{} [{}, {}) {}",
            measure.number, measure.begin, measure.end, measure.signature
          );
        }
      }
      "dump" => self.dump(&mut out),
      _ => {
        return Err(ShellError::UnknownCommand {
          command: command.to_string(),
        })
      }
    }
    Ok(out.trim_end().to_string())
  }

  fn dump(&self, out: &mut String) {
    match self.file.current_revision() {
      Some(revision) => {
        let _ = writeln!(out, "revision {}", revision);
      }
      None => {
        let _ = writeln!(out, "no revision");
      }
    }
    for (position, track) in self.file.tracks().enumerate() {
      let _ = writeln!(out, "track {}: {} notes", position, track.len());
      for (_, note) in track.notes() {
        let _ = writeln!(out, "  {}", note);
      }
    }
  }

  fn track_arg(&self, args: &mut Args) -> ShellResult<TrackId> {
    let position = args.next("track")?;
    self
      .file
      .tracks()
      .nth(position)
      .map(Track::id)
      .ok_or(ShellError::UnknownTrack { position })
  }

  fn note_arg(&self, args: &mut Args) -> ShellResult<NoteRef> {
    let track = self.track_arg(args)?;
    let on = args.ticks("on")?;
    let pitch = args.next("pitch")?;
    self
      .file
      .track(track)
      .and_then(|data| {
        data
          .notes()
          .find(|(_, note)| note.on == on && note.pitch == pitch)
      })
      .map(|(node, _)| NoteRef { track, node })
      .ok_or(ShellError::NoteNotFound { on, pitch })
  }
}

#[cfg(test)]
mod test {

  use super::{Shell, ShellError};
  use score_core::config::FileConfig;

  fn run(shell: &mut Shell, lines: &[&str]) -> Vec<String> {
    lines
      .iter()
      .map(|line| shell.execute(line).unwrap())
      .collect()
  }

  #[test]
  pub fn comments_and_blanks() {
    let mut shell = Shell::new(&FileConfig::default());
    assert_eq!(shell.execute("").unwrap(), "");
    assert_eq!(shell.execute("   # nothing").unwrap(), "");
  }

  #[test]
  pub fn notes_and_history() {
    let mut shell = Shell::new(&FileConfig::default());
    let out = run(
      &mut shell,
      &[
        "track",
        "note 0 0 10 60",
        "note 0 5 15 62 # overlapping",
        "commit",
        "channel 0 0 60 3",
        "commit",
        "update 0",
      ],
    );
    assert_eq!(out[0], "track 0");
    assert_eq!(out[1], "[0, 10) pitch 60");
    assert_eq!(out[3], "revision 0");
    assert_eq!(out[5], "revision 1");
    assert_eq!(shell.file().channel(3).len(), 0);

    shell.execute("update 1").unwrap();
    assert_eq!(shell.file().channel(3).len(), 1);
    assert_eq!(
      shell.execute("range 0 8 20").unwrap(),
      "[0, 10) pitch 60 channel 3\n[5, 15) pitch 62"
    );
  }

  #[test]
  pub fn measures() {
    let mut shell = Shell::new(&FileConfig::default());
    shell.execute("signature 960 3 4").unwrap();
    assert_eq!(
      shell.execute("measures 0 1700").unwrap(),
      "1 [0, 960) 4/4\n2 [960, 1680) 3/4\n3 [1680, 2400) 3/4"
    );
  }

  #[test]
  pub fn errors() {
    let mut shell = Shell::new(&FileConfig::default());
    match shell.execute("bogus") {
      Err(ShellError::UnknownCommand { command }) => assert_eq!(command, "bogus"),
      other => panic!("unexpected {:?}", other),
    }
    match shell.execute("note 0 0 10 60") {
      Err(ShellError::UnknownTrack { position }) => assert_eq!(position, 0),
      other => panic!("unexpected {:?}", other),
    }
    shell.execute("track").unwrap();
    match shell.execute("note 0 0") {
      Err(ShellError::MissingArgument { name }) => assert_eq!(name, "off"),
      other => panic!("unexpected {:?}", other),
    }
    match shell.execute("erase 0 0 60") {
      Err(ShellError::NoteNotFound { .. }) => {}
      other => panic!("unexpected {:?}", other),
    }
    assert!(shell.execute("signature 0 3 5").is_err());
    assert!(shell.execute("update 4").is_err());
  }
}
