//! Public handle to the playback engine.

use std::path::PathBuf;
use std::sync::mpsc::{self, Sender};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use crate::config::Settings;
use crate::playlist::Playlist;
use crate::track::Track;

use super::observer::PlayerObserver;
use super::output::{AudioOutput, OutputFactory, RodioOutput};
use super::thread::spawn_engine_thread;
use super::types::{EngineCmd, PlaybackHandle, PlaybackInfo};

/// The playback engine's public face.
///
/// Every transport operation enqueues a command; the engine thread applies
/// them in arrival order, interleaved with worker lifecycle events, so each
/// operation is atomic from the caller's point of view.
pub struct MusicPlayer {
    tx: Sender<EngineCmd>,
    info: PlaybackHandle,
    join: Mutex<Option<JoinHandle<()>>>,
}

impl MusicPlayer {
    /// Build an engine over the given output. `make_output` runs on the
    /// engine thread, because audio streams are generally not `Send`.
    pub fn new(
        make_output: OutputFactory,
        observer: Arc<dyn PlayerObserver>,
        settings: Settings,
    ) -> Self {
        let (tx, rx) = mpsc::channel::<EngineCmd>();
        let info: PlaybackHandle = Arc::new(Mutex::new(PlaybackInfo::default()));

        let join = spawn_engine_thread(
            make_output,
            observer,
            settings,
            rx,
            tx.clone(),
            Arc::clone(&info),
        );

        Self {
            tx,
            info,
            join: Mutex::new(Some(join)),
        }
    }

    /// Engine over the default audio device.
    pub fn with_default_output(observer: Arc<dyn PlayerObserver>, settings: Settings) -> Self {
        let make_output: OutputFactory = Box::new(|| {
            let output = RodioOutput::open_default()?;
            Ok(Box::new(output) as Box<dyn AudioOutput>)
        });
        Self::new(make_output, observer, settings)
    }

    /// Shared snapshot handle for pull-style UIs.
    pub fn playback_handle(&self) -> PlaybackHandle {
        Arc::clone(&self.info)
    }

    /// The current snapshot, cloned out of the shared handle.
    pub fn snapshot(&self) -> PlaybackInfo {
        self.info
            .lock()
            .map(|info| info.clone())
            .unwrap_or_default()
    }

    /// Load a single track (dropping playlist context) and play it.
    pub fn load_track(&self, track: Track) {
        self.send(EngineCmd::LoadTrack(track));
    }

    /// Read a playlist file and play its first entry. Read failures are
    /// reported through the observer; engine state stays as it was.
    pub fn load_playlist(&self, path: impl Into<PathBuf>) {
        self.send(EngineCmd::LoadPlaylist(path.into()));
    }

    /// Load an already-built playlist and play its first entry.
    pub fn load_queue(&self, playlist: Playlist) {
        self.send(EngineCmd::LoadQueue(playlist));
    }

    pub fn play(&self) {
        self.send(EngineCmd::Play);
    }

    pub fn pause(&self) {
        self.send(EngineCmd::Pause);
    }

    pub fn stop(&self) {
        self.send(EngineCmd::Stop);
    }

    /// Seek to an absolute position in the current track; clamped to
    /// `[0, duration]`, then playback restarts from there.
    pub fn seek(&self, target: Duration) {
        self.send(EngineCmd::Seek(target));
    }

    pub fn next(&self) {
        self.send(EngineCmd::Next);
    }

    pub fn previous(&self) {
        self.send(EngineCmd::Previous);
    }

    pub fn toggle_shuffle(&self) {
        self.send(EngineCmd::ToggleShuffle);
    }

    pub fn toggle_repeat(&self) {
        self.send(EngineCmd::ToggleRepeat);
    }

    pub fn volume_up(&self) {
        self.send(EngineCmd::VolumeUp);
    }

    pub fn volume_down(&self) {
        self.send(EngineCmd::VolumeDown);
    }

    /// Stop playback and wait for the engine thread to exit.
    pub fn shutdown(&self) {
        self.send(EngineCmd::Shutdown);
        if let Ok(mut join) = self.join.lock() {
            if let Some(handle) = join.take() {
                let _ = handle.join();
            }
        }
    }

    fn send(&self, cmd: EngineCmd) {
        // A dead engine thread means shutdown already happened; commands
        // sent after that are dropped.
        let _ = self.tx.send(cmd);
    }
}
