//! Track model: one audio file plus its derived, read-only metadata.
//!
//! Metadata extraction is delegated to `lofty`. A file whose tags cannot be
//! read still yields a usable [`Track`] carrying placeholder metadata, so a
//! single corrupt entry never blocks playback of the rest of a playlist.

use std::path::{Path, PathBuf};
use std::time::Duration;

use lofty::prelude::*;
use lofty::probe::Probe;
use tracing::debug;

/// Title used when a file's tags cannot be read.
pub const PLACEHOLDER_TITLE: &str = "Unknown";
/// Artist used when a file's tags cannot be read.
pub const PLACEHOLDER_ARTIST: &str = "N/A";

/// Samples per MPEG layer III frame; used to derive a frame count from the
/// decoded duration and sample rate.
const SAMPLES_PER_FRAME: u64 = 1152;

/// One audio file and its display/playback metadata.
///
/// Immutable once constructed: [`Track::load`] reads the file's tags exactly
/// once and nothing mutates the result afterwards.
#[derive(Debug, Clone)]
pub struct Track {
    pub path: PathBuf,
    pub title: String,
    pub artist: String,
    /// Precomputed "Artist - Title" line for UIs.
    pub display: String,
    /// Total decoded duration; zero when metadata could not be read.
    pub duration: Duration,
    /// Sample rate in Hz; zero when metadata could not be read.
    pub sample_rate: u32,
    /// Estimated MPEG frame count over the whole file.
    pub frame_count: u64,
}

fn make_display(title: &str, artist: &str) -> String {
    let artist = artist.trim();
    if artist.is_empty() || artist == PLACEHOLDER_ARTIST {
        title.to_string()
    } else {
        format!("{} - {}", artist, title)
    }
}

fn frames_for(duration: Duration, sample_rate: u32) -> u64 {
    let millis = duration.as_millis() as u64;
    (millis as u128 * sample_rate as u128 / (SAMPLES_PER_FRAME as u128 * 1000)) as u64
}

impl Track {
    /// Read a track's metadata from `path`.
    ///
    /// Never fails: an unreadable or untagged file produces a placeholder
    /// track ("Unknown"/"N/A", zero duration) and playback of other entries
    /// proceeds as usual.
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();

        let tagged = match Probe::open(path).and_then(|probe| probe.read()) {
            Ok(tagged) => tagged,
            Err(e) => {
                debug!(path = %path.display(), error = %e, "metadata read failed, using placeholders");
                return Self::placeholder(path);
            }
        };

        let properties = tagged.properties();
        let duration = properties.duration();
        let sample_rate = properties.sample_rate().unwrap_or(0);

        let mut title = PLACEHOLDER_TITLE.to_string();
        let mut artist = PLACEHOLDER_ARTIST.to_string();

        if let Some(tag) = tagged.primary_tag().or_else(|| tagged.first_tag()) {
            if let Some(v) = tag.title() {
                if !v.trim().is_empty() {
                    title = v.trim().to_string();
                }
            }
            if let Some(v) = tag.artist() {
                if !v.trim().is_empty() {
                    artist = v.trim().to_string();
                }
            }
        }

        let display = make_display(&title, &artist);

        Self {
            path: path.to_path_buf(),
            title,
            artist,
            display,
            duration,
            sample_rate,
            frame_count: frames_for(duration, sample_rate),
        }
    }

    /// A track carrying only its path; everything else is placeholder data.
    pub fn placeholder(path: impl AsRef<Path>) -> Self {
        let title = PLACEHOLDER_TITLE.to_string();
        let artist = PLACEHOLDER_ARTIST.to_string();
        let display = make_display(&title, &artist);
        Self {
            path: path.as_ref().to_path_buf(),
            title,
            artist,
            display,
            duration: Duration::ZERO,
            sample_rate: 0,
            frame_count: 0,
        }
    }

    /// Frames per millisecond of playback.
    ///
    /// `None` when the duration is zero (placeholder tracks): the rate is
    /// undefined there and callers must handle the absence explicitly.
    pub fn frame_rate_per_ms(&self) -> Option<f64> {
        let millis = self.duration.as_millis();
        if millis == 0 {
            return None;
        }
        Some(self.frame_count as f64 / millis as f64)
    }

    /// Map an elapsed position to a frame offset into the file, clamped to
    /// `[0, frame_count]`. Elapsed beyond the duration never lands past the
    /// final frame.
    pub fn frame_offset(&self, elapsed: Duration) -> u64 {
        if self.duration.is_zero() || self.frame_count == 0 {
            return 0;
        }
        let ratio = elapsed.as_secs_f64() / self.duration.as_secs_f64();
        let frame = (ratio * self.frame_count as f64) as u64;
        frame.min(self.frame_count)
    }

    /// Duration rendered as `MM:SS` for display.
    pub fn length_display(&self) -> String {
        let minutes = self.duration.as_secs() / 60;
        let seconds = self.duration.as_secs() % 60;
        format!("{:02}:{:02}", minutes, seconds)
    }
}
