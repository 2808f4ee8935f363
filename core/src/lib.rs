pub mod bst;
pub mod channel;
pub mod config;
pub mod file;
pub mod map;
pub mod note;
pub mod notesystem;
pub mod time;
pub mod track;
