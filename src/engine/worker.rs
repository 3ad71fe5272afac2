//! The per-track decode worker.
//!
//! One worker exists per active playback. It blocks inside the output
//! handle until the track ends or the engine stops the handle, and reports
//! started/finished lifecycle events back into the engine channel. The
//! generation id lets the engine tell a stale worker's events from the
//! current one's.

use std::sync::Arc;
use std::sync::mpsc::Sender;
use std::thread::{self, JoinHandle};

use tracing::debug;

use super::output::OutputHandle;
use super::types::{EngineCmd, WorkerEvent};

pub(super) struct DecodeWorker {
    generation: u64,
    handle: Arc<dyn OutputHandle>,
    join: Option<JoinHandle<()>>,
}

impl DecodeWorker {
    pub(super) fn spawn(
        generation: u64,
        handle: Arc<dyn OutputHandle>,
        events: Sender<EngineCmd>,
    ) -> Self {
        let wait_handle = Arc::clone(&handle);
        let join = thread::spawn(move || {
            debug!(generation, "playback started");
            let _ = events.send(EngineCmd::Worker(WorkerEvent::Started { generation }));

            wait_handle.wait_until_end();

            debug!(generation, "playback finished");
            let _ = events.send(EngineCmd::Worker(WorkerEvent::Finished { generation }));
        });

        Self {
            generation,
            handle,
            join: Some(join),
        }
    }

    pub(super) fn generation(&self) -> u64 {
        self.generation
    }

    pub(super) fn set_volume(&self, volume: f32) {
        self.handle.set_volume(volume);
    }

    /// Stop the output handle and wait for the worker thread to release it.
    /// After this returns no audio is flowing, so the caller may open the
    /// next handle without overlap.
    pub(super) fn halt(mut self) {
        self.handle.stop();
        if let Some(join) = self.join.take() {
            let _ = join.join();
        }
    }
}
