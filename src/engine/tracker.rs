//! The position tracker.
//!
//! A per-playback thread that estimates elapsed time by adding its tick
//! interval to the shared snapshot while the state is Playing, pushing each
//! new value to the observer. The estimate is not derived from decoder
//! progress; drift within a tick is accepted. Cancellation is cooperative:
//! the engine clears the flag and the tracker exits on its next wake.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use super::observer::PlayerObserver;
use super::types::{PlaybackHandle, PlaybackState};

pub(super) struct PositionTracker {
    active: Arc<AtomicBool>,
}

impl PositionTracker {
    pub(super) fn spawn(
        tick: Duration,
        info: PlaybackHandle,
        observer: Arc<dyn PlayerObserver>,
    ) -> Self {
        let active = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&active);

        thread::spawn(move || {
            loop {
                thread::sleep(tick);

                let elapsed = {
                    let mut info = match info.lock() {
                        Ok(info) => info,
                        Err(_) => break,
                    };
                    // Checked under the lock: the engine cancels before it
                    // resets elapsed, so a cancelled tracker can never tick
                    // on top of a fresh position.
                    if !flag.load(Ordering::Acquire) {
                        break;
                    }
                    if info.state != PlaybackState::Playing {
                        continue;
                    }
                    info.elapsed += tick;
                    info.elapsed
                };

                observer.position_changed(elapsed);
            }
        });

        Self { active }
    }

    /// Request termination. The tracker notices on its next tick; the engine
    /// does not wait for it.
    pub(super) fn cancel(self) {
        self.active.store(false, Ordering::Release);
    }
}
