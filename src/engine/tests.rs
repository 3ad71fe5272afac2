use std::path::PathBuf;
use std::sync::{Arc, Condvar, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::bail;
use tempfile::TempDir;

use crate::config::Settings;
use crate::track::Track;

use super::observer::PlayerObserver;
use super::output::{AudioOutput, OutputFactory, OutputHandle};
use super::player::MusicPlayer;
use super::types::PlaybackState;

// ---- test doubles ----

#[derive(Debug, Clone, PartialEq, Eq)]
enum UiEvent {
    TrackChanged(String),
    PlaybackEnded,
    Error(String),
}

#[derive(Default)]
struct RecordingObserver {
    events: Mutex<Vec<UiEvent>>,
}

impl RecordingObserver {
    fn events(&self) -> Vec<UiEvent> {
        self.events.lock().unwrap().clone()
    }

    fn saw(&self, event: &UiEvent) -> bool {
        self.events().contains(event)
    }

    fn saw_ended(&self) -> bool {
        self.saw(&UiEvent::PlaybackEnded)
    }

    fn saw_error(&self) -> bool {
        self.events()
            .iter()
            .any(|e| matches!(e, UiEvent::Error(_)))
    }
}

impl PlayerObserver for RecordingObserver {
    fn track_changed(&self, track: &Track) {
        self.events
            .lock()
            .unwrap()
            .push(UiEvent::TrackChanged(track.path.display().to_string()));
    }

    fn position_changed(&self, _elapsed: Duration) {}

    fn playback_ended(&self) {
        self.events.lock().unwrap().push(UiEvent::PlaybackEnded);
    }

    fn error(&self, message: &str) {
        self.events
            .lock()
            .unwrap()
            .push(UiEvent::Error(message.to_string()));
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HandleEvent {
    Opened(u32),
    Closed(u32),
}

#[derive(Default)]
struct HandleFlags {
    ended: bool,
    stopped: bool,
}

/// Scripted output handle: playback "runs" until a test calls `finish`
/// (natural end) or the engine calls `stop`.
struct TestHandle {
    id: u32,
    flags: Mutex<HandleFlags>,
    cond: Condvar,
    log: Arc<Mutex<Vec<HandleEvent>>>,
}

impl TestHandle {
    /// Simulate the decode library reaching end of stream.
    fn finish(&self) {
        let mut flags = self.flags.lock().unwrap();
        flags.ended = true;
        self.cond.notify_all();
    }
}

impl OutputHandle for TestHandle {
    fn set_volume(&self, _volume: f32) {}

    fn wait_until_end(&self) {
        let mut flags = self.flags.lock().unwrap();
        while !flags.ended && !flags.stopped {
            flags = self.cond.wait(flags).unwrap();
        }
        drop(flags);
        // The waiting worker is the handle's owner; its return is the
        // moment the handle is released.
        self.log.lock().unwrap().push(HandleEvent::Closed(self.id));
    }

    fn stop(&self) {
        let mut flags = self.flags.lock().unwrap();
        flags.stopped = true;
        self.cond.notify_all();
    }
}

#[derive(Debug, Clone)]
struct OpenRecord {
    path: PathBuf,
    start_at: Duration,
    volume: f32,
}

/// Shared view into everything the test output observed.
#[derive(Default, Clone)]
struct OutputProbe {
    log: Arc<Mutex<Vec<HandleEvent>>>,
    opens: Arc<Mutex<Vec<OpenRecord>>>,
    handles: Arc<Mutex<Vec<Arc<TestHandle>>>>,
}

impl OutputProbe {
    fn opens(&self) -> Vec<OpenRecord> {
        self.opens.lock().unwrap().clone()
    }

    fn open_count(&self) -> usize {
        self.opens.lock().unwrap().len()
    }

    fn finish_handle(&self, index: usize) {
        let handle = Arc::clone(&self.handles.lock().unwrap()[index]);
        handle.finish();
    }

    fn log(&self) -> Vec<HandleEvent> {
        self.log.lock().unwrap().clone()
    }

    /// At no point may two output handles be open at once.
    fn assert_no_overlap(&self) {
        let log = self.log();
        let mut open = 0i32;
        for event in &log {
            match event {
                HandleEvent::Opened(_) => {
                    open += 1;
                    assert!(open <= 1, "overlapping output handles: {log:?}");
                }
                HandleEvent::Closed(_) => open -= 1,
            }
        }
    }
}

struct TestOutput {
    probe: OutputProbe,
    fail_suffixes: Vec<String>,
    next_id: u32,
}

impl AudioOutput for TestOutput {
    fn open(
        &mut self,
        track: &Track,
        start_at: Duration,
        volume: f32,
    ) -> anyhow::Result<Arc<dyn OutputHandle>> {
        let path = track.path.clone();
        let name = path.to_string_lossy().to_string();
        if self.fail_suffixes.iter().any(|s| name.ends_with(s)) {
            bail!("cannot decode {name}");
        }

        self.next_id += 1;
        let handle = Arc::new(TestHandle {
            id: self.next_id,
            flags: Mutex::new(HandleFlags::default()),
            cond: Condvar::new(),
            log: Arc::clone(&self.probe.log),
        });

        self.probe
            .log
            .lock()
            .unwrap()
            .push(HandleEvent::Opened(self.next_id));
        self.probe.opens.lock().unwrap().push(OpenRecord {
            path,
            start_at,
            volume,
        });
        self.probe.handles.lock().unwrap().push(Arc::clone(&handle));
        Ok(handle)
    }
}

// ---- fixtures ----

/// Long enough that no tracker tick fires during a test; elapsed then moves
/// only through explicit seeks, keeping assertions deterministic.
const FROZEN_TICK_MS: u64 = 3_600_000;

struct Fixture {
    player: MusicPlayer,
    observer: Arc<RecordingObserver>,
    probe: OutputProbe,
}

fn settings_with_tick(tick_ms: u64) -> Settings {
    let mut settings = Settings::default();
    settings.tracker.tick_ms = tick_ms;
    settings
}

fn fixture(settings: Settings) -> Fixture {
    fixture_failing(&[], settings)
}

fn fixture_failing(fail_suffixes: &[&str], settings: Settings) -> Fixture {
    let observer = Arc::new(RecordingObserver::default());
    let probe = OutputProbe::default();
    let output = TestOutput {
        probe: probe.clone(),
        fail_suffixes: fail_suffixes.iter().map(|s| s.to_string()).collect(),
        next_id: 0,
    };
    let make_output: OutputFactory =
        Box::new(move || Ok(Box::new(output) as Box<dyn AudioOutput>));
    let observer_dyn: Arc<dyn PlayerObserver> = observer.clone();
    let player = MusicPlayer::new(make_output, observer_dyn, settings);
    Fixture {
        player,
        observer,
        probe,
    }
}

impl Fixture {
    fn state(&self) -> PlaybackState {
        self.player.snapshot().state
    }

    /// Round-trip a volume nudge through the command channel. The channel
    /// is FIFO, so once the nudge is visible every earlier command has been
    /// fully processed. Lets tests assert that something did NOT happen.
    fn drain(&self) {
        let before = self.player.snapshot().volume;
        self.player.volume_down();
        wait_until(|| self.player.snapshot().volume != before, "queue drain");
        self.player.volume_up();
        wait_until(|| self.player.snapshot().volume == before, "queue drain restore");
    }
}

fn wait_until(cond: impl Fn() -> bool, what: &str) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if cond() {
            return;
        }
        thread::sleep(Duration::from_millis(2));
    }
    panic!("timed out waiting for {what}");
}

fn synthetic(secs: u64) -> Track {
    Track {
        path: PathBuf::from("/t/synth.mp3"),
        title: "Synth".into(),
        artist: "N/A".into(),
        display: "Synth".into(),
        duration: Duration::from_secs(secs),
        sample_rate: 44_100,
        frame_count: secs * 38,
    }
}

fn write_playlist(names: &[&str]) -> (TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let body: String = names
        .iter()
        .map(|n| format!("{}\n", dir.path().join(n).display()))
        .collect();
    let file = dir.path().join("list.txt");
    std::fs::write(&file, body).unwrap();
    (dir, file)
}

// ---- tests ----

#[test]
fn load_track_plays_from_the_start() {
    let f = fixture(settings_with_tick(FROZEN_TICK_MS));
    f.player.load_track(synthetic(100));

    wait_until(|| f.probe.open_count() == 1, "first open");
    wait_until(|| f.state() == PlaybackState::Playing, "playing");

    let opens = f.probe.opens();
    assert_eq!(opens[0].start_at, Duration::ZERO);
    assert!(f.observer.saw(&UiEvent::TrackChanged("/t/synth.mp3".into())));
}

#[test]
fn seek_clamps_to_track_bounds_and_restarts() {
    let f = fixture(settings_with_tick(FROZEN_TICK_MS));
    f.player.load_track(synthetic(100));
    wait_until(|| f.probe.open_count() == 1, "first open");

    f.player.seek(Duration::from_secs(30));
    wait_until(|| f.probe.open_count() == 2, "seek restart");
    assert_eq!(f.probe.opens()[1].start_at, Duration::from_secs(30));

    // Past end-of-track clamps to the duration, never beyond.
    f.player.seek(Duration::from_secs(10_000));
    wait_until(|| f.probe.open_count() == 3, "clamped seek restart");
    assert_eq!(f.probe.opens()[2].start_at, Duration::from_secs(100));
    assert_eq!(f.state(), PlaybackState::Playing);
}

#[test]
fn pause_then_play_resumes_at_the_frozen_position() {
    let f = fixture(settings_with_tick(FROZEN_TICK_MS));
    f.player.load_track(synthetic(100));
    wait_until(|| f.probe.open_count() == 1, "first open");

    f.player.seek(Duration::from_secs(2));
    wait_until(|| f.probe.open_count() == 2, "seek restart");

    f.player.pause();
    wait_until(|| f.state() == PlaybackState::Paused, "paused");
    assert_eq!(f.player.snapshot().elapsed, Duration::from_secs(2));

    f.player.play();
    wait_until(|| f.probe.open_count() == 3, "resume open");
    assert_eq!(f.probe.opens()[2].start_at, Duration::from_secs(2));
    assert_eq!(f.state(), PlaybackState::Playing);
}

#[test]
fn next_at_last_index_without_repeat_is_a_noop() {
    let (_dir, file) = write_playlist(&["a.mp3", "b.mp3"]);
    let f = fixture(settings_with_tick(FROZEN_TICK_MS));
    f.player.load_playlist(file);
    wait_until(|| f.probe.open_count() == 1, "first open");

    f.player.next();
    wait_until(|| f.probe.open_count() == 2, "advance to b");

    f.player.next();
    f.drain();

    // Still on b, still playing, no restart.
    assert_eq!(f.probe.open_count(), 2);
    assert_eq!(f.player.snapshot().position, Some(1));
    assert_eq!(f.state(), PlaybackState::Playing);
}

#[test]
fn next_at_last_index_with_repeat_wraps_to_first() {
    let (_dir, file) = write_playlist(&["a.mp3", "b.mp3"]);
    let mut settings = settings_with_tick(FROZEN_TICK_MS);
    settings.playback.repeat = true;

    let f = fixture(settings);
    f.player.load_playlist(file);
    wait_until(|| f.probe.open_count() == 1, "first open");

    f.player.next();
    wait_until(|| f.probe.open_count() == 2, "advance to b");
    f.player.next();
    wait_until(|| f.probe.open_count() == 3, "wrap to a");

    assert!(f.probe.opens()[2].path.ends_with("a.mp3"));
    assert_eq!(f.player.snapshot().position, Some(0));
    assert_eq!(f.state(), PlaybackState::Playing);
}

#[test]
fn previous_at_first_index_is_always_a_noop() {
    let (_dir, file) = write_playlist(&["a.mp3", "b.mp3"]);
    let mut settings = settings_with_tick(FROZEN_TICK_MS);
    settings.playback.repeat = true;

    let f = fixture(settings);
    f.player.load_playlist(file);
    wait_until(|| f.probe.open_count() == 1, "first open");

    f.player.previous();
    f.drain();

    assert_eq!(f.probe.open_count(), 1);
    assert_eq!(f.player.snapshot().position, Some(0));

    // A normal previous still works from later positions.
    f.player.next();
    wait_until(|| f.probe.open_count() == 2, "advance to b");
    f.player.previous();
    wait_until(|| f.probe.open_count() == 3, "back to a");
    assert!(f.probe.opens()[2].path.ends_with("a.mp3"));
}

#[test]
fn shuffle_toggle_twice_restores_order_and_keeps_current_track() {
    let (_dir, file) = write_playlist(&["a.mp3", "b.mp3", "c.mp3"]);
    let f = fixture(settings_with_tick(FROZEN_TICK_MS));
    f.player.load_playlist(file);
    wait_until(|| f.probe.open_count() == 1, "first open");

    f.player.toggle_shuffle();
    wait_until(|| f.player.snapshot().shuffled, "shuffle on");
    f.player.toggle_shuffle();
    wait_until(|| !f.player.snapshot().shuffled, "shuffle off");
    f.drain();

    // Reordering the view never restarts the current track.
    assert_eq!(f.probe.open_count(), 1);
    assert_eq!(f.player.snapshot().position, Some(0));

    // Load order is back: the successor of a is b.
    f.player.next();
    wait_until(|| f.probe.open_count() == 2, "advance after unshuffle");
    assert!(f.probe.opens()[1].path.ends_with("b.mp3"));
}

#[test]
fn output_handles_never_overlap_across_transitions() {
    let (_dir, file) = write_playlist(&["a.mp3", "b.mp3", "c.mp3"]);
    let f = fixture(settings_with_tick(FROZEN_TICK_MS));
    f.player.load_playlist(file);
    wait_until(|| f.probe.open_count() == 1, "first open");

    f.player.next();
    wait_until(|| f.probe.open_count() == 2, "second open");
    f.player.seek(Duration::from_secs(1));
    wait_until(|| f.probe.open_count() == 3, "seek restart");
    f.player.load_track(synthetic(100));
    wait_until(|| f.probe.open_count() == 4, "single track open");

    f.probe.assert_no_overlap();
}

#[test]
fn natural_end_auto_advances_then_reports_end_of_playlist() {
    let (_dir, file) = write_playlist(&["a.mp3", "b.mp3"]);
    let f = fixture(settings_with_tick(FROZEN_TICK_MS));
    f.player.load_playlist(file);
    wait_until(|| f.probe.open_count() == 1, "first open");

    // a ends naturally: the engine behaves as if next were pressed.
    f.probe.finish_handle(0);
    wait_until(|| f.probe.open_count() == 2, "auto-advance to b");
    assert!(f.probe.opens()[1].path.ends_with("b.mp3"));
    assert_eq!(f.player.snapshot().position, Some(1));

    // b ends naturally: end of playlist, no wrap, no crash.
    f.probe.finish_handle(1);
    wait_until(|| f.observer.saw_ended(), "end of playlist");

    assert_eq!(f.probe.open_count(), 2);
    assert_eq!(f.player.snapshot().position, Some(1));
    assert_eq!(f.state(), PlaybackState::Stopped);
    f.probe.assert_no_overlap();
}

#[test]
fn natural_end_with_repeat_wraps_instead_of_ending() {
    let (_dir, file) = write_playlist(&["a.mp3", "b.mp3"]);
    let mut settings = settings_with_tick(FROZEN_TICK_MS);
    settings.playback.repeat = true;

    let f = fixture(settings);
    f.player.load_playlist(file);
    wait_until(|| f.probe.open_count() == 1, "first open");

    f.probe.finish_handle(0);
    wait_until(|| f.probe.open_count() == 2, "auto-advance to b");
    f.probe.finish_handle(1);
    wait_until(|| f.probe.open_count() == 3, "wrap back to a");

    assert!(f.probe.opens()[2].path.ends_with("a.mp3"));
    assert_eq!(f.player.snapshot().position, Some(0));
    assert!(!f.observer.saw_ended());
}

#[test]
fn playlist_read_failure_reports_error_and_keeps_state() {
    let f = fixture(settings_with_tick(FROZEN_TICK_MS));
    f.player.load_track(synthetic(100));
    wait_until(|| f.state() == PlaybackState::Playing, "playing");

    f.player.load_playlist("/definitely/not/here.txt");
    wait_until(|| f.observer.saw_error(), "error report");

    // Prior playback is untouched: no partial playlist swap.
    assert_eq!(f.state(), PlaybackState::Playing);
    assert_eq!(f.probe.open_count(), 1);
    assert_eq!(f.player.snapshot().position, None);
}

#[test]
fn empty_playlist_file_is_ignored() {
    let (_dir, file) = write_playlist(&[]);
    let f = fixture(settings_with_tick(FROZEN_TICK_MS));
    f.player.load_playlist(file);
    f.drain();

    assert_eq!(f.probe.open_count(), 0);
    assert_eq!(f.state(), PlaybackState::Stopped);
}

#[test]
fn undecodable_track_reports_error_and_advances() {
    let (_dir, file) = write_playlist(&["a.mp3", "b.mp3"]);
    let f = fixture_failing(&["a.mp3"], settings_with_tick(FROZEN_TICK_MS));
    f.player.load_playlist(file);

    // a fails to open, which counts as a natural end; b plays.
    wait_until(|| f.probe.open_count() == 1, "skip to b");
    assert!(f.probe.opens()[0].path.ends_with("b.mp3"));
    assert!(f.observer.saw_error());
    wait_until(|| f.state() == PlaybackState::Playing, "playing b");
}

#[test]
fn playlist_where_nothing_decodes_gives_up() {
    let (_dir, file) = write_playlist(&["a.mp3", "b.mp3"]);
    let mut settings = settings_with_tick(FROZEN_TICK_MS);
    // Repeat would otherwise let the failure loop wrap forever.
    settings.playback.repeat = true;

    let f = fixture_failing(&["a.mp3", "b.mp3"], settings);
    f.player.load_playlist(file);
    wait_until(|| f.observer.saw_ended(), "gave up");

    assert_eq!(f.probe.open_count(), 0);
    assert_eq!(f.state(), PlaybackState::Stopped);
}

#[test]
fn stop_resets_elapsed_and_play_starts_over() {
    let f = fixture(settings_with_tick(FROZEN_TICK_MS));
    f.player.load_track(synthetic(100));
    wait_until(|| f.probe.open_count() == 1, "first open");

    f.player.seek(Duration::from_secs(5));
    wait_until(|| f.probe.open_count() == 2, "seek restart");

    f.player.stop();
    wait_until(|| f.state() == PlaybackState::Stopped, "stopped");
    assert_eq!(f.player.snapshot().elapsed, Duration::ZERO);

    f.player.play();
    wait_until(|| f.probe.open_count() == 3, "restart");
    assert_eq!(f.probe.opens()[2].start_at, Duration::ZERO);
}

#[test]
fn volume_steps_clamp_at_both_ends() {
    let f = fixture(settings_with_tick(FROZEN_TICK_MS));

    f.player.volume_up();
    f.drain();
    assert_eq!(f.player.snapshot().volume, 100);

    for _ in 0..12 {
        f.player.volume_down();
    }
    wait_until(|| f.player.snapshot().volume == 0, "volume floor");

    // Opens carry the current volume.
    f.player.load_track(synthetic(100));
    wait_until(|| f.probe.open_count() == 1, "open at volume 0");
    assert_eq!(f.probe.opens()[0].volume, 0.0);
}

#[test]
fn tracker_advances_elapsed_and_pause_freezes_it() {
    let f = fixture(settings_with_tick(10));
    f.player.load_track(synthetic(100));
    wait_until(
        || f.player.snapshot().elapsed > Duration::ZERO,
        "tracker tick",
    );

    f.player.pause();
    wait_until(|| f.state() == PlaybackState::Paused, "paused");

    let frozen = f.player.snapshot().elapsed;
    thread::sleep(Duration::from_millis(60));
    assert_eq!(f.player.snapshot().elapsed, frozen);
}

#[test]
fn shutdown_halts_the_active_worker() {
    let f = fixture(settings_with_tick(FROZEN_TICK_MS));
    f.player.load_track(synthetic(100));
    wait_until(|| f.probe.open_count() == 1, "first open");

    f.player.shutdown();

    let log = f.probe.log();
    assert_eq!(log.last(), Some(&HandleEvent::Closed(1)));
}
