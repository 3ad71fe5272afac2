//! The engine actor thread.
//!
//! Owns every piece of mutable playback state: current track, playlist,
//! transport state, worker and tracker lifetimes. Commands and worker
//! events are consumed from one channel in arrival order, which is the
//! whole synchronization story.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::sync::mpsc::{Receiver, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, warn};

use crate::config::Settings;
use crate::playlist::{Direction, Playlist};
use crate::track::Track;

use super::observer::PlayerObserver;
use super::output::{AudioOutput, OutputFactory};
use super::tracker::PositionTracker;
use super::types::{EngineCmd, PlaybackHandle, PlaybackState, TransitionCause, WorkerEvent};
use super::worker::DecodeWorker;

pub(super) fn spawn_engine_thread(
    make_output: OutputFactory,
    observer: Arc<dyn PlayerObserver>,
    settings: Settings,
    rx: Receiver<EngineCmd>,
    events: Sender<EngineCmd>,
    info: PlaybackHandle,
) -> JoinHandle<()> {
    thread::spawn(move || {
        // The output is built here because audio streams are usually not
        // `Send`; without one there is nothing to play through.
        let output = match make_output() {
            Ok(output) => output,
            Err(e) => {
                observer.error(&format!("audio output unavailable: {e:#}"));
                return;
            }
        };

        let mut engine = Engine {
            output,
            observer,
            events,
            info,
            tick: Duration::from_millis(settings.tracker.tick_ms),
            queue: None,
            current: None,
            state: PlaybackState::Stopped,
            shuffle_pref: settings.playback.shuffle,
            repeat_pref: settings.playback.repeat,
            volume: settings.audio.volume.min(100),
            generation: 0,
            worker: None,
            tracker: None,
            halted: HashMap::new(),
            failures: 0,
        };
        engine.sync_info();
        engine.run(rx);
    })
}

struct Engine {
    output: Box<dyn AudioOutput>,
    observer: Arc<dyn PlayerObserver>,
    /// Sender side of the engine's own channel, handed to decode workers
    /// for lifecycle events.
    events: Sender<EngineCmd>,
    info: PlaybackHandle,
    tick: Duration,

    queue: Option<Playlist>,
    current: Option<Track>,
    state: PlaybackState,
    /// Shuffle/repeat as last toggled by the user; seeds every newly
    /// loaded playlist.
    shuffle_pref: bool,
    repeat_pref: bool,
    volume: u8,

    /// Bumped for every spawned decode worker; distinguishes the current
    /// worker's events from a halted predecessor's.
    generation: u64,
    worker: Option<DecodeWorker>,
    tracker: Option<PositionTracker>,
    /// Cause recorded for each deliberately halted worker generation. A
    /// finish event with no entry here is a natural end.
    halted: HashMap<u64, TransitionCause>,
    /// Consecutive failed opens; bounds error auto-advance on a playlist
    /// where nothing decodes.
    failures: usize,
}

impl Engine {
    fn run(&mut self, rx: Receiver<EngineCmd>) {
        while let Ok(cmd) = rx.recv() {
            match cmd {
                EngineCmd::LoadTrack(track) => self.load_track(track),
                EngineCmd::LoadPlaylist(path) => self.load_playlist(&path),
                EngineCmd::LoadQueue(queue) => self.load_queue(queue),
                EngineCmd::Play => self.play(),
                EngineCmd::Pause => self.pause(),
                EngineCmd::Stop => self.stop(),
                EngineCmd::Seek(target) => self.seek(target),
                EngineCmd::Next => self.skip(Direction::Next),
                EngineCmd::Previous => self.skip(Direction::Previous),
                EngineCmd::ToggleShuffle => self.toggle_shuffle(),
                EngineCmd::ToggleRepeat => self.toggle_repeat(),
                EngineCmd::VolumeUp => self.set_volume(self.volume.saturating_add(10).min(100)),
                EngineCmd::VolumeDown => self.set_volume(self.volume.saturating_sub(10)),
                EngineCmd::Shutdown => break,
                EngineCmd::Worker(WorkerEvent::Started { generation }) => {
                    self.on_worker_started(generation)
                }
                EngineCmd::Worker(WorkerEvent::Finished { generation }) => {
                    self.on_worker_finished(generation)
                }
            }
        }

        self.halt_worker(TransitionCause::UserStop);
        self.cancel_tracker();
    }

    // ---- transport commands ----

    fn load_track(&mut self, track: Track) {
        self.queue = None;
        self.halt_worker(TransitionCause::UserStop);
        self.cancel_tracker();
        self.begin_track(track);
    }

    fn load_playlist(&mut self, path: &Path) {
        match Playlist::from_file(path) {
            Ok(playlist) => self.load_queue(playlist),
            Err(e) => {
                // Prior state (or no state at all) is left untouched.
                warn!(error = %e, "playlist load failed");
                self.observer.error(&format!("{e:#}"));
            }
        }
    }

    fn load_queue(&mut self, mut queue: Playlist) {
        if queue.is_empty() {
            debug!("ignoring empty playlist");
            return;
        }
        queue.set_repeat(self.repeat_pref);
        if self.shuffle_pref && !queue.shuffled() {
            queue.toggle_shuffle();
        }

        self.halt_worker(TransitionCause::UserStop);
        self.cancel_tracker();
        let first = queue.current().cloned();
        self.queue = Some(queue);
        if let Some(track) = first {
            self.begin_track(track);
        }
    }

    fn play(&mut self) {
        match self.state {
            PlaybackState::Playing => {}
            PlaybackState::Paused | PlaybackState::Stopped => {
                if self.current.is_some() {
                    // Resumes from the frozen elapsed position; loads and
                    // stops reset it to zero, a prior seek leaves it
                    // wherever the user pointed.
                    self.start_playback();
                }
            }
        }
    }

    fn pause(&mut self) {
        if self.state != PlaybackState::Playing {
            return;
        }
        self.halt_worker(TransitionCause::UserPause);
        self.cancel_tracker();
        self.state = PlaybackState::Paused;
        self.sync_info();
    }

    fn stop(&mut self) {
        self.halt_worker(TransitionCause::UserStop);
        self.cancel_tracker();
        self.state = PlaybackState::Stopped;
        self.set_elapsed(Duration::ZERO);
        self.sync_info();
    }

    fn seek(&mut self, target: Duration) {
        let Some(track) = self.current.as_ref() else {
            return;
        };
        // Never an error: out-of-range targets clamp to the track bounds.
        let clamped = target.min(track.duration);
        self.halt_worker(TransitionCause::UserSeek);
        self.cancel_tracker();
        self.set_elapsed(clamped);
        self.start_playback();
    }

    fn skip(&mut self, dir: Direction) {
        let Some(queue) = self.queue.as_ref() else {
            return;
        };
        if !queue.can_advance(dir) {
            // Leaves playback at rest on the current track.
            debug!(?dir, "skip is a no-op at this position");
            return;
        }
        self.halt_worker(TransitionCause::UserSkip);
        self.cancel_tracker();
        let next = self.queue.as_mut().and_then(|q| q.advance(dir)).cloned();
        if let Some(track) = next {
            self.begin_track(track);
        }
    }

    fn toggle_shuffle(&mut self) {
        self.shuffle_pref = !self.shuffle_pref;
        if let Some(queue) = self.queue.as_mut() {
            // Reorders the view only; the current track keeps playing.
            queue.toggle_shuffle();
        }
        self.sync_info();
    }

    fn toggle_repeat(&mut self) {
        self.repeat_pref = !self.repeat_pref;
        if let Some(queue) = self.queue.as_mut() {
            queue.toggle_repeat();
        }
        self.sync_info();
    }

    fn set_volume(&mut self, volume: u8) {
        self.volume = volume;
        if let Some(worker) = &self.worker {
            worker.set_volume(volume as f32 / 100.0);
        }
        self.sync_info();
    }

    // ---- playback lifecycle ----

    /// Install `track` as the current track and start it from zero.
    /// Callers have already halted the previous worker.
    fn begin_track(&mut self, track: Track) {
        self.set_elapsed(Duration::ZERO);
        self.observer.track_changed(&track);
        self.current = Some(track);
        self.start_playback();
    }

    /// Open an output handle at the current elapsed position and hand it to
    /// a fresh decode worker. The previous worker is always halted and
    /// joined before this runs, so two handles never overlap.
    fn start_playback(&mut self) {
        let Some(track) = self.current.clone() else {
            return;
        };

        let start_at = self.elapsed().min(track.duration);
        self.generation += 1;
        let generation = self.generation;

        match self
            .output
            .open(&track, start_at, self.volume as f32 / 100.0)
        {
            Ok(handle) => {
                self.failures = 0;
                self.worker = Some(DecodeWorker::spawn(generation, handle, self.events.clone()));
                self.state = PlaybackState::Playing;
                self.sync_info();
            }
            Err(e) => {
                warn!(track = %track.path.display(), error = %e, "failed to start playback");
                self.observer.error(&format!("{e:#}"));
                self.failures += 1;
                // An undecodable track ends "naturally" so the auto-advance
                // machine keeps moving, but one full pass over the playlist
                // without a single successful open gives up instead of
                // cycling forever under repeat.
                let exhausted = self
                    .queue
                    .as_ref()
                    .is_none_or(|queue| self.failures >= queue.len());
                if exhausted {
                    self.finish_playlist();
                } else {
                    self.auto_advance();
                }
            }
        }
    }

    /// Natural-end handling: behaves as if next were pressed, except at the
    /// end of the playlist where playback ends in place.
    fn auto_advance(&mut self) {
        if self.state == PlaybackState::Paused {
            return;
        }
        let advanced = match self.queue.as_mut() {
            Some(queue) if queue.can_advance(Direction::Next) => {
                queue.advance(Direction::Next).cloned()
            }
            _ => None,
        };
        match advanced {
            Some(track) => self.begin_track(track),
            None => self.finish_playlist(),
        }
    }

    /// End-of-playlist terminal condition: stay on the current track and
    /// index, report so the UI can re-enable play and disable pause.
    fn finish_playlist(&mut self) {
        self.state = PlaybackState::Stopped;
        self.set_elapsed(Duration::ZERO);
        self.sync_info();
        self.observer.playback_ended();
    }

    // ---- worker events ----

    fn on_worker_started(&mut self, generation: u64) {
        if generation != self.generation || self.state != PlaybackState::Playing {
            // Stale worker, or the transport has already moved on.
            return;
        }
        if self.tracker.is_none() {
            self.tracker = Some(PositionTracker::spawn(
                self.tick,
                Arc::clone(&self.info),
                Arc::clone(&self.observer),
            ));
        }
    }

    fn on_worker_finished(&mut self, generation: u64) {
        let cause = match self.halted.remove(&generation) {
            Some(cause) => cause,
            None if generation == self.generation => TransitionCause::NaturalEnd,
            None => return,
        };
        debug!(generation, ?cause, "decode worker finished");

        if cause != TransitionCause::NaturalEnd {
            // A deliberate transition; its successor state is already in place.
            return;
        }

        if let Some(worker) = self.worker.take() {
            // Output already drained; this just joins the worker thread.
            worker.halt();
        }
        self.cancel_tracker();
        self.auto_advance();
    }

    // ---- shared state plumbing ----

    fn halt_worker(&mut self, cause: TransitionCause) {
        if let Some(worker) = self.worker.take() {
            self.halted.insert(worker.generation(), cause);
            worker.halt();
        }
    }

    fn cancel_tracker(&mut self) {
        if let Some(tracker) = self.tracker.take() {
            tracker.cancel();
        }
    }

    fn elapsed(&self) -> Duration {
        self.info.lock().map(|info| info.elapsed).unwrap_or_default()
    }

    fn set_elapsed(&mut self, elapsed: Duration) {
        if let Ok(mut info) = self.info.lock() {
            info.elapsed = elapsed;
        }
        self.observer.position_changed(elapsed);
    }

    fn sync_info(&mut self) {
        if let Ok(mut info) = self.info.lock() {
            info.state = self.state;
            info.position = self.queue.as_ref().map(|q| q.current_pos());
            info.shuffled = self
                .queue
                .as_ref()
                .map(|q| q.shuffled())
                .unwrap_or(self.shuffle_pref);
            info.repeat = self
                .queue
                .as_ref()
                .map(|q| q.repeat())
                .unwrap_or(self.repeat_pref);
            info.volume = self.volume;
        }
    }
}
