//! vivace — an MP3 playback engine with playlist support.
//!
//! The crate is the model half of a desktop music player: it owns tracks,
//! playlists and the playback state machine, and talks to the (external)
//! user interface through the [`engine::PlayerObserver`] trait. Rendering,
//! menus and file dialogs are someone else's problem.

pub mod config;
pub mod engine;
pub mod playlist;
pub mod track;

pub use engine::{MusicPlayer, PlaybackHandle, PlaybackInfo, PlaybackState, PlayerObserver};
pub use playlist::{Direction, Playlist};
pub use track::Track;
