//! Audio output abstraction.
//!
//! The engine drives playback through [`AudioOutput`]/[`OutputHandle`] so
//! the state machine can be exercised without an audio device. The
//! production implementation decodes with `rodio` and plays through a
//! `Sink` on the default output stream.

use std::fs::File;
use std::io::BufReader;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use rodio::{Decoder, OutputStream, OutputStreamBuilder, Sink, Source};

use crate::track::Track;

/// Opens one output handle per played track.
pub trait AudioOutput {
    /// Start playing `track` from `start_at`, at `volume` in `0.0..=1.0`.
    /// Returns the handle controlling this one playback.
    fn open(&mut self, track: &Track, start_at: Duration, volume: f32)
    -> Result<Arc<dyn OutputHandle>>;
}

/// One in-flight playback. Exactly one handle is open at a time; the engine
/// stops the previous one and waits for its worker to return before opening
/// the next.
pub trait OutputHandle: Send + Sync {
    fn set_volume(&self, volume: f32);

    /// Block until playback finishes or [`stop`](OutputHandle::stop) is
    /// called from another thread.
    fn wait_until_end(&self);

    /// Halt output and unblock `wait_until_end`.
    fn stop(&self);
}

/// Constructor for the engine's output, invoked on the engine thread.
/// The default `rodio` stream is not `Send`, so it cannot be built by the
/// caller and moved in.
pub type OutputFactory = Box<dyn FnOnce() -> Result<Box<dyn AudioOutput>> + Send>;

/// `rodio`-backed output on the default audio device.
pub struct RodioOutput {
    stream: OutputStream,
}

impl RodioOutput {
    pub fn open_default() -> Result<Self> {
        let mut stream =
            OutputStreamBuilder::open_default_stream().context("no audio output device")?;
        // rodio logs to stderr when OutputStream is dropped. That's useful in
        // debugging, but noisy for an embedding application.
        stream.log_on_drop(false);
        Ok(Self { stream })
    }
}

impl AudioOutput for RodioOutput {
    fn open(
        &mut self,
        track: &Track,
        start_at: Duration,
        volume: f32,
    ) -> Result<Arc<dyn OutputHandle>> {
        let file = File::open(&track.path)
            .with_context(|| format!("failed to open {}", track.path.display()))?;

        let source = Decoder::new(BufReader::new(file))
            .with_context(|| format!("failed to decode {}", track.path.display()))?
            // `skip_duration` is the seeking primitive; `Duration::ZERO` is fine.
            .skip_duration(start_at);

        let sink = Sink::connect_new(self.stream.mixer());
        sink.set_volume(volume);
        sink.append(source);
        sink.play();

        Ok(Arc::new(RodioHandle { sink }))
    }
}

struct RodioHandle {
    sink: Sink,
}

impl OutputHandle for RodioHandle {
    fn set_volume(&self, volume: f32) {
        self.sink.set_volume(volume);
    }

    fn wait_until_end(&self) {
        self.sink.sleep_until_end();
    }

    fn stop(&self) {
        // Clears the sink, which also wakes `sleep_until_end`.
        self.sink.stop();
    }
}
