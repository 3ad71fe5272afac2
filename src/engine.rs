//! Playback engine.
//!
//! All mutable playback state lives on a single engine thread; transport
//! commands from the UI and lifecycle events from decode workers arrive on
//! the same channel, so every operation is atomic with respect to worker
//! callbacks. Audio output sits behind the [`AudioOutput`] trait with a
//! `rodio` implementation for production and a scripted one in the tests.

mod observer;
mod output;
mod player;
mod thread;
mod tracker;
mod types;
mod worker;

pub use observer::PlayerObserver;
pub use output::{AudioOutput, OutputFactory, OutputHandle, RodioOutput};
pub use player::MusicPlayer;
pub use types::{PlaybackHandle, PlaybackInfo, PlaybackState, TransitionCause};

#[cfg(test)]
mod tests;
