//! The engine-to-UI contract.

use std::time::Duration;

use crate::track::Track;

/// Implemented by the user interface (or any other collaborator) that wants
/// to mirror engine activity. The engine calls these from its own threads;
/// implementations should return quickly and must not call back into the
/// player from within a notification.
pub trait PlayerObserver: Send + Sync {
    /// A new track occupies the current-track slot. Fired before its
    /// playback starts, so title/artist/cover can render immediately.
    fn track_changed(&self, track: &Track);

    /// The elapsed-position estimate moved (tracker tick, seek, or reset).
    fn position_changed(&self, elapsed: Duration);

    /// The last track finished and there is nothing left to auto-advance
    /// to: re-enable "play", disable "pause".
    fn playback_ended(&self);

    /// A non-fatal failure the user should see (unreadable playlist,
    /// undecodable file). The engine is already back in a safe state.
    fn error(&self, message: &str);
}
