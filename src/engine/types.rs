//! Engine-internal small types and shared handles.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::playlist::Playlist;
use crate::track::Track;

/// The transport state of the engine. "No track loaded" is `Stopped` with
/// an empty current-track slot.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PlaybackState {
    Stopped,
    Playing,
    Paused,
}

impl Default for PlaybackState {
    fn default() -> Self {
        Self::Stopped
    }
}

/// Why a decode worker stopped.
///
/// Recorded per worker generation when the engine halts one deliberately;
/// a finish event with no recorded cause is a natural end. This replaces
/// the usual pressed-next/pressed-prev flag pair with an explicit value the
/// finish handler can match on.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TransitionCause {
    NaturalEnd,
    UserSkip,
    UserSeek,
    UserStop,
    UserPause,
}

/// Everything the engine thread reacts to: transport commands sent by the
/// owning [`MusicPlayer`](super::MusicPlayer) handle, and lifecycle events
/// reported by decode workers.
#[derive(Debug)]
pub enum EngineCmd {
    /// Load a single track (drops any playlist context) and play it.
    LoadTrack(Track),
    /// Read a playlist file, then load and play its first entry.
    LoadPlaylist(PathBuf),
    /// Load an already-built playlist and play its first entry.
    LoadQueue(Playlist),
    Play,
    Pause,
    Stop,
    /// Seek to an absolute position; clamped to `[0, duration]`.
    Seek(Duration),
    Next,
    Previous,
    ToggleShuffle,
    ToggleRepeat,
    VolumeUp,
    VolumeDown,
    /// Stop playback and exit the engine thread.
    Shutdown,
    Worker(WorkerEvent),
}

/// Lifecycle events a decode worker reports back into the engine channel.
#[derive(Debug)]
pub enum WorkerEvent {
    Started { generation: u64 },
    Finished { generation: u64 },
}

/// Snapshot of playback state shared with pull-style UIs.
#[derive(Debug, Clone, Default)]
pub struct PlaybackInfo {
    pub state: PlaybackState,
    /// Estimated elapsed time in the current track; advanced by the
    /// position tracker, reset by load/stop/seek, frozen while paused.
    pub elapsed: Duration,
    /// Cursor position in the current playlist view, if a playlist is loaded.
    pub position: Option<usize>,
    pub shuffled: bool,
    pub repeat: bool,
    /// Output volume, 0..=100.
    pub volume: u8,
}

pub type PlaybackHandle = Arc<Mutex<PlaybackInfo>>;
