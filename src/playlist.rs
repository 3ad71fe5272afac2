//! Playlist store: ordered tracks, a cursor, and shuffle/repeat policies.
//!
//! The shuffled view is a permutation over track indices; the underlying
//! load order is never mutated, so disabling shuffle restores it exactly.
//! Playlist files are plain text, one path per line (UTF-8).

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use rand::seq::SliceRandom;
use tracing::debug;

use crate::track::Track;

/// Which way [`Playlist::advance`] moves the cursor.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Direction {
    Next,
    Previous,
}

/// An ordered collection of tracks with a current-position cursor.
#[derive(Debug, Clone)]
pub struct Playlist {
    /// Tracks in load order; never reordered.
    tracks: Vec<Track>,
    /// View order: identity when unshuffled, a permutation otherwise.
    order: Vec<usize>,
    /// Cursor into `order`; meaningful only when `tracks` is non-empty.
    pos: usize,
    shuffled: bool,
    repeat: bool,
}

impl Playlist {
    /// Build a playlist from a list of file paths, in order.
    ///
    /// A path whose metadata cannot be read still yields a placeholder
    /// track, preserving index alignment with the input list. Duplicate
    /// paths are kept as-is.
    pub fn from_paths<I, P>(paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let tracks: Vec<Track> = paths.into_iter().map(Track::load).collect();
        let order = (0..tracks.len()).collect();
        Self {
            tracks,
            order,
            pos: 0,
            shuffled: false,
            repeat: false,
        }
    }

    /// Read a playlist file: one path per line, blank lines skipped.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read playlist {}", path.display()))?;

        let paths: Vec<PathBuf> = text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(PathBuf::from)
            .collect();

        debug!(path = %path.display(), entries = paths.len(), "loaded playlist file");
        Ok(Self::from_paths(paths))
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    /// The track under the cursor.
    pub fn current(&self) -> Option<&Track> {
        self.order.get(self.pos).and_then(|&i| self.tracks.get(i))
    }

    /// Cursor position within the current (possibly shuffled) view.
    pub fn current_pos(&self) -> usize {
        self.pos
    }

    pub fn shuffled(&self) -> bool {
        self.shuffled
    }

    pub fn repeat(&self) -> bool {
        self.repeat
    }

    pub fn set_repeat(&mut self, repeat: bool) {
        self.repeat = repeat;
    }

    /// Flip the repeat flag; affects only `advance(Next)` wrap-around.
    pub fn toggle_repeat(&mut self) {
        self.repeat = !self.repeat;
    }

    /// Whether `advance(dir)` would move the cursor.
    ///
    /// `Next` at the last position moves only when repeat is on; `Previous`
    /// at position zero never moves, repeat or not.
    pub fn can_advance(&self, dir: Direction) -> bool {
        if self.tracks.is_empty() {
            return false;
        }
        match dir {
            Direction::Next => self.pos + 1 < self.order.len() || self.repeat,
            Direction::Previous => self.pos > 0,
        }
    }

    /// Move the cursor and return the new current track, or `None` when the
    /// move is a no-op (end of list without repeat, or start of list).
    pub fn advance(&mut self, dir: Direction) -> Option<&Track> {
        if !self.can_advance(dir) {
            return None;
        }
        match dir {
            Direction::Next => {
                if self.pos + 1 >= self.order.len() {
                    self.pos = 0;
                } else {
                    self.pos += 1;
                }
            }
            Direction::Previous => self.pos -= 1,
        }
        self.current()
    }

    /// Toggle the shuffled view.
    ///
    /// Enabling generates a fresh permutation and moves the cursor to the
    /// current track's position within it; disabling restores load order and
    /// relocates the cursor the same way. The current track's identity is
    /// preserved across both toggles. Lists shorter than two tracks have
    /// nothing to shuffle and are left untouched.
    pub fn toggle_shuffle(&mut self) {
        if self.tracks.len() < 2 {
            return;
        }

        let current = self.order.get(self.pos).copied();
        self.shuffled = !self.shuffled;

        if self.shuffled {
            self.order.shuffle(&mut rand::rng());
        } else {
            self.order = (0..self.tracks.len()).collect();
        }

        if let Some(current) = current {
            self.pos = self.order.iter().position(|&i| i == current).unwrap_or(0);
        }
    }
}
