use crate::library;
use crate::model::{RepeatMode, TrackInfo};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

/// Index that follows `current` when a track finishes or the user skips forward.
///
/// `None` is only returned for an empty playlist. Under `RepeatMode::Off` the
/// last index maps onto itself; callers treat that as "end of playlist".
pub fn next_index<R: Rng + ?Sized>(
    current: Option<usize>,
    len: usize,
    shuffle: bool,
    repeat: RepeatMode,
    rng: &mut R,
) -> Option<usize> {
    if len == 0 {
        return None;
    }

    let Some(current) = current.filter(|idx| *idx < len) else {
        return Some(if shuffle { rng.random_range(0..len) } else { 0 });
    };

    if repeat == RepeatMode::One {
        return Some(current);
    }
    if shuffle {
        return Some(rng.random_range(0..len));
    }

    match repeat {
        RepeatMode::All => Some((current + 1) % len),
        _ => Some((current + 1).min(len - 1)),
    }
}

pub fn previous_index<R: Rng + ?Sized>(
    current: Option<usize>,
    len: usize,
    shuffle: bool,
    repeat: RepeatMode,
    rng: &mut R,
) -> Option<usize> {
    if len == 0 {
        return None;
    }
    if shuffle {
        return Some(rng.random_range(0..len));
    }

    let current = current.filter(|idx| *idx < len).unwrap_or(0);
    match (current, repeat) {
        (0, RepeatMode::All) => Some(len - 1),
        (0, _) => Some(0),
        (idx, _) => Some(idx - 1),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackEnd {
    Play(PathBuf),
    Stop,
}

#[derive(Debug)]
pub struct PlayerCore {
    pub playlist: Vec<PathBuf>,
    pub current: Option<usize>,
    pub selected: usize,
    pub shuffle: bool,
    pub repeat: RepeatMode,
    pub dirty: bool,
    pub status: String,
    track_info: HashMap<PathBuf, TrackInfo>,
    rng: SmallRng,
}

impl Default for PlayerCore {
    fn default() -> Self {
        Self::new()
    }
}

impl PlayerCore {
    pub fn new() -> Self {
        Self::with_rng(SmallRng::from_os_rng())
    }

    pub fn with_seed(seed: u64) -> Self {
        Self::with_rng(SmallRng::seed_from_u64(seed))
    }

    fn with_rng(rng: SmallRng) -> Self {
        Self {
            playlist: Vec::new(),
            current: None,
            selected: 0,
            shuffle: false,
            repeat: RepeatMode::Off,
            dirty: true,
            status: String::from("Ready"),
            track_info: HashMap::new(),
            rng,
        }
    }

    pub fn len(&self) -> usize {
        self.playlist.len()
    }

    pub fn is_empty(&self) -> bool {
        self.playlist.is_empty()
    }

    pub fn current_path(&self) -> Option<&Path> {
        self.current
            .and_then(|idx| self.playlist.get(idx))
            .map(PathBuf::as_path)
    }

    pub fn current_info(&self) -> Option<&TrackInfo> {
        self.current_path().and_then(|path| self.track_info.get(path))
    }

    pub fn track_info(&self, path: &Path) -> Option<&TrackInfo> {
        self.track_info.get(path)
    }

    pub fn set_track_info(&mut self, path: PathBuf, info: TrackInfo) {
        self.track_info.insert(path, info);
        self.dirty = true;
    }

    pub fn row_label(&self, idx: usize) -> String {
        let Some(path) = self.playlist.get(idx) else {
            return String::new();
        };
        match self.track_info.get(path) {
            Some(info) if info.title != TrackInfo::UNKNOWN_TITLE => {
                if info.artist == TrackInfo::UNKNOWN_ARTIST {
                    info.title.clone()
                } else {
                    format!("{} - {}", info.artist, info.title)
                }
            }
            _ => library::display_name(path),
        }
    }

    pub fn set_playlist(&mut self, paths: Vec<PathBuf>) {
        let mut seen = HashSet::new();
        self.playlist = paths
            .into_iter()
            .filter(|path| library::is_audio_file(path) && seen.insert(path.clone()))
            .collect();
        self.current = (!self.playlist.is_empty()).then_some(0);
        self.selected = 0;
        let count = self.playlist.len();
        self.set_status(&format!("Loaded {count} tracks"));
    }

    pub fn append(&mut self, paths: Vec<PathBuf>) -> usize {
        let mut seen: HashSet<PathBuf> = self.playlist.iter().cloned().collect();
        let before = self.playlist.len();
        self.playlist.extend(
            paths
                .into_iter()
                .filter(|path| library::is_audio_file(path) && seen.insert(path.clone())),
        );
        let added = self.playlist.len() - before;
        self.set_status(&format!("Added {added} tracks"));
        added
    }

    /// Removes the given rows. Returns true when the current track was among them.
    pub fn remove(&mut self, rows: &[usize]) -> bool {
        let doomed: HashSet<usize> = rows
            .iter()
            .copied()
            .filter(|row| *row < self.playlist.len())
            .collect();
        if doomed.is_empty() {
            return false;
        }

        let removed_current = self.current.is_some_and(|idx| doomed.contains(&idx));
        self.current = match self.current {
            Some(idx) if !removed_current => {
                Some(idx - doomed.iter().filter(|row| **row < idx).count())
            }
            _ => None,
        };

        let mut row = 0;
        self.playlist.retain(|_| {
            let keep = !doomed.contains(&row);
            row += 1;
            keep
        });
        self.clamp_selection();

        let count = doomed.len();
        self.set_status(&format!("Removed {count} tracks"));
        removed_current
    }

    pub fn move_row(&mut self, from: usize, to: usize) -> bool {
        let len = self.playlist.len();
        if from >= len || to >= len || from == to {
            return false;
        }

        let path = self.playlist.remove(from);
        self.playlist.insert(to, path);
        self.current = self.current.map(|idx| {
            if idx == from {
                to
            } else if from < idx && idx <= to {
                idx - 1
            } else if to <= idx && idx < from {
                idx + 1
            } else {
                idx
            }
        });
        if self.selected == from {
            self.selected = to;
        }
        self.dirty = true;
        true
    }

    pub fn clear(&mut self) {
        self.playlist.clear();
        self.current = None;
        self.selected = 0;
        self.set_status("Playlist cleared");
    }

    pub fn select(&mut self, idx: usize) -> Option<PathBuf> {
        let path = self.playlist.get(idx)?.clone();
        self.current = Some(idx);
        self.selected = idx;
        self.dirty = true;
        Some(path)
    }

    pub fn select_next_row(&mut self) {
        if self.selected + 1 < self.playlist.len() {
            self.selected += 1;
            self.dirty = true;
        }
    }

    pub fn select_prev_row(&mut self) {
        if self.selected > 0 {
            self.selected -= 1;
            self.dirty = true;
        }
    }

    pub fn activate_selected(&mut self) -> Option<PathBuf> {
        self.select(self.selected)
    }

    pub fn skip_next(&mut self) -> Option<PathBuf> {
        if self.playlist.is_empty() {
            self.set_status("Playlist is empty");
            return None;
        }

        let next = next_index(
            self.current,
            self.playlist.len(),
            self.shuffle,
            RepeatMode::All,
            &mut self.rng,
        )?;
        self.select(next)
    }

    pub fn skip_previous(&mut self) -> Option<PathBuf> {
        if self.playlist.is_empty() {
            self.set_status("Playlist is empty");
            return None;
        }

        let prev = previous_index(
            self.current,
            self.playlist.len(),
            self.shuffle,
            RepeatMode::All,
            &mut self.rng,
        )?;
        self.select(prev)
    }

    pub fn on_track_end(&mut self) -> TrackEnd {
        let Some(current) = self.current else {
            return TrackEnd::Stop;
        };
        // Repeat off ends on the last row, shuffled or not.
        if self.repeat == RepeatMode::Off && current + 1 >= self.playlist.len() {
            self.set_status("End of playlist");
            return TrackEnd::Stop;
        }

        let Some(next) = next_index(
            Some(current),
            self.playlist.len(),
            self.shuffle,
            self.repeat,
            &mut self.rng,
        ) else {
            return TrackEnd::Stop;
        };

        match self.select(next) {
            Some(path) => TrackEnd::Play(path),
            None => TrackEnd::Stop,
        }
    }

    pub fn toggle_shuffle(&mut self) -> bool {
        self.shuffle = !self.shuffle;
        let state = if self.shuffle { "on" } else { "off" };
        self.set_status(&format!("Shuffle {state}"));
        self.shuffle
    }

    pub fn cycle_repeat(&mut self) -> RepeatMode {
        self.set_repeat(self.repeat.next());
        self.repeat
    }

    pub fn set_repeat(&mut self, mode: RepeatMode) {
        self.repeat = mode;
        self.set_status(&format!("Repeat {mode}"));
    }

    pub fn set_status(&mut self, message: &str) {
        self.status = message.to_string();
        self.dirty = true;
    }

    fn clamp_selection(&mut self) {
        self.selected = self.selected.min(self.playlist.len().saturating_sub(1));
    }
}
