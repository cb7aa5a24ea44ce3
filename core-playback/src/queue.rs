//! # Track Queue Store
//!
//! The authoritative ordered list of tracks plus the active pointer.
//!
//! Every mutation validates all of its indices before touching the list, so a
//! rejected call leaves the queue exactly as it was. The store is plain data;
//! serialization of concurrent callers happens in the player's worker.
//!
//! When the active track is removed the pointer becomes undefined, but the
//! store remembers where the removed track sat (the *resume slot*) so the
//! next advancement continues with whatever moved into that place.

use crate::error::{PlaybackError, Result};
use crate::track::Track;
use bridge_traits::playback::RepeatMode;
use std::collections::BTreeSet;

/// What to do after the rendered track ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
    /// Render the track at this index.
    Play(usize),
    /// Nothing follows; the queue ended.
    Ended,
    /// Nothing was active; ignore the signal.
    Idle,
}

/// Result of [`Queue::remove`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Removal {
    pub removed: usize,
    /// The active track was among the removed ones.
    pub active_removed: bool,
}

/// Ordered track list with an optional active index.
#[derive(Debug, Clone, Default)]
pub struct Queue {
    tracks: Vec<Track>,
    active: Option<usize>,
    resume_slot: Option<usize>,
}

impl Queue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    /// Track at `index`, `None` when out of range.
    pub fn get(&self, index: i64) -> Option<&Track> {
        usize::try_from(index).ok().and_then(|i| self.tracks.get(i))
    }

    pub fn active_index(&self) -> Option<usize> {
        self.active
    }

    pub fn active_track(&self) -> Option<&Track> {
        self.active.and_then(|i| self.tracks.get(i))
    }

    /// Slot the removed active track occupied, if the pointer is undefined
    /// because of a removal.
    pub fn resume_slot(&self) -> Option<usize> {
        self.resume_slot
    }

    /// Checks that `index` names an existing track.
    pub fn validate_index(&self, index: i64) -> Result<usize> {
        usize::try_from(index)
            .ok()
            .filter(|i| *i < self.tracks.len())
            .ok_or_else(|| PlaybackError::out_of_bounds(index, self.tracks.len()))
    }

    /// Insert `tracks` before `insert_before` (`-1` appends).
    ///
    /// Returns the index of the first inserted track.
    pub fn add(&mut self, tracks: Vec<Track>, insert_before: i64) -> Result<usize> {
        let len = self.tracks.len();
        let at = match insert_before {
            -1 => len,
            index => usize::try_from(index)
                .ok()
                .filter(|i| *i <= len)
                .ok_or_else(|| PlaybackError::out_of_bounds(index, len))?,
        };

        let count = tracks.len();
        self.tracks.splice(at..at, tracks);

        if let Some(active) = self.active.as_mut() {
            if at <= *active {
                *active += count;
            }
        }
        if let Some(slot) = self.resume_slot.as_mut() {
            if at < *slot {
                *slot += count;
            }
        }

        Ok(at)
    }

    /// Remove every listed index at once. Duplicates are ignored.
    pub fn remove(&mut self, indices: &[i64]) -> Result<Removal> {
        let doomed = indices
            .iter()
            .map(|&index| self.validate_index(index))
            .collect::<Result<BTreeSet<usize>>>()?;

        let below = |position: usize| doomed.range(..position).count();

        let mut outcome = Removal {
            removed: doomed.len(),
            active_removed: false,
        };

        if let Some(active) = self.active {
            if doomed.contains(&active) {
                outcome.active_removed = true;
                self.active = None;
                self.resume_slot = Some(active - below(active));
            } else {
                self.active = Some(active - below(active));
            }
        } else if let Some(slot) = self.resume_slot {
            self.resume_slot = Some(slot - below(slot));
        }

        let mut position = 0;
        self.tracks.retain(|_| {
            let keep = !doomed.contains(&position);
            position += 1;
            keep
        });

        Ok(outcome)
    }

    /// Relocate the track at `from` so it ends up at `to`.
    pub fn move_track(&mut self, from: i64, to: i64) -> Result<()> {
        let from = self.validate_index(from)?;
        let to = self.validate_index(to)?;
        if from == to {
            return Ok(());
        }

        let track = self.tracks.remove(from);
        self.tracks.insert(to, track);

        if let Some(active) = self.active {
            self.active = Some(if active == from {
                to
            } else if from < active && active <= to {
                active - 1
            } else if to <= active && active < from {
                active + 1
            } else {
                active
            });
        } else if let Some(slot) = self.resume_slot {
            if from < slot && to >= slot {
                self.resume_slot = Some(slot - 1);
            } else if from >= slot && to < slot {
                self.resume_slot = Some(slot + 1);
            }
        }

        Ok(())
    }

    /// Remove everything after the active track. Returns how many were removed.
    ///
    /// Without an active track, everything from the resume slot on counts as
    /// upcoming. With neither, the whole queue does.
    pub fn remove_upcoming(&mut self) -> usize {
        let keep = match (self.active, self.resume_slot) {
            (Some(active), _) => active + 1,
            (None, Some(slot)) => slot,
            (None, None) => 0,
        };
        let keep = keep.min(self.tracks.len());
        let removed = self.tracks.len() - keep;
        self.tracks.truncate(keep);
        removed
    }

    /// Swap the track at `index` for `track`. Returns `true` if it is active.
    pub fn replace(&mut self, index: i64, track: Track) -> Result<bool> {
        let index = self.validate_index(index)?;
        self.tracks[index] = track;
        Ok(self.active == Some(index))
    }

    /// Make `index` the active track.
    pub fn set_active(&mut self, index: i64) -> Result<usize> {
        let index = self.validate_index(index)?;
        self.active = Some(index);
        self.resume_slot = None;
        Ok(index)
    }

    /// Forget the active pointer without touching the tracks.
    pub fn deactivate(&mut self) {
        self.active = None;
        self.resume_slot = None;
    }

    pub fn clear(&mut self) {
        self.tracks.clear();
        self.deactivate();
    }

    /// Where playback continues after the active track ended on its own.
    pub fn after_track_end(&self, repeat: RepeatMode) -> Advance {
        let len = self.tracks.len();
        match (self.active, self.resume_slot) {
            (Some(active), _) => match repeat {
                RepeatMode::Track => Advance::Play(active),
                RepeatMode::Queue => Advance::Play((active + 1) % len.max(1)),
                RepeatMode::Off if active + 1 < len => Advance::Play(active + 1),
                RepeatMode::Off => Advance::Ended,
            },
            (None, Some(slot)) => match repeat {
                _ if slot < len => Advance::Play(slot),
                RepeatMode::Queue if len > 0 => Advance::Play(0),
                _ => Advance::Ended,
            },
            (None, None) => Advance::Idle,
        }
    }

    /// Target of an explicit skip-to-next, `None` at the boundary.
    pub fn next_index(&self, repeat: RepeatMode) -> Option<usize> {
        let len = self.tracks.len();
        if len == 0 {
            return None;
        }
        let candidate = match (self.active, self.resume_slot) {
            (Some(active), _) => active + 1,
            (None, Some(slot)) => slot,
            (None, None) => 0,
        };
        if candidate < len {
            Some(candidate)
        } else if repeat == RepeatMode::Queue {
            Some(0)
        } else {
            None
        }
    }

    /// Target of an explicit skip-to-previous, `None` at the boundary.
    pub fn previous_index(&self, repeat: RepeatMode) -> Option<usize> {
        let len = self.tracks.len();
        let current = self.active.or(self.resume_slot)?;
        if current > 0 && current - 1 < len {
            Some(current - 1)
        } else if repeat == RepeatMode::Queue && len > 0 {
            Some(len - 1)
        } else {
            None
        }
    }
}
