//! Playback queue state machine.
//!
//! The queue is driven by hardware transport buttons as well as the UI, so every
//! operation is total: requests that cannot apply (advancing past the tail,
//! toggling an empty queue) degrade to no-ops instead of failing.

use std::collections::HashSet;

/// Kind of playable unit. Collections currently only yield videos.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaylistItemKind {
    #[default]
    Video,
}

/// A playable unit. Two items are the same item when their ids match.
#[derive(Clone, Debug, serde::Deserialize, serde::Serialize)]
pub struct PlaylistItem {
    pub kind: PlaylistItemKind,
    /// Stable business identifier (the video's `bvid`).
    pub id: String,
    pub title: String,
    pub cover_url: String,
    pub owner_mid: Option<u64>,
    pub owner_name: Option<String>,
}

impl PartialEq for PlaylistItem {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for PlaylistItem {}

impl PlaylistItem {
    pub fn video(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            kind: PlaylistItemKind::Video,
            id: id.into(),
            title: title.into(),
            cover_url: String::new(),
            owner_mid: None,
            owner_name: None,
        }
    }
}

/// Read-only copy of the queue handed to the rendering layer.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct QueueSnapshot {
    pub items: Vec<PlaylistItem>,
    pub current_index: Option<usize>,
    pub playing: bool,
}

impl QueueSnapshot {
    pub fn current(&self) -> Option<&PlaylistItem> {
        self.current_index.and_then(|index| self.items.get(index))
    }
}

/// Ordered queue with a play cursor.
///
/// Invariants: `current_index` is always a valid index when set, `playing` is
/// false whenever the queue is empty, and item ids are unique.
#[derive(Clone, Debug, Default)]
pub struct PlaybackQueue {
    items: Vec<PlaylistItem>,
    current_index: Option<usize>,
    playing: bool,
}

impl PlaybackQueue {
    pub fn new() -> PlaybackQueue {
        PlaybackQueue::default()
    }

    /// Replaces the queue and starts from the first item.
    ///
    /// Returns whether the observable state changed.
    pub fn play_all(&mut self, items: Vec<PlaylistItem>) -> bool {
        let before = self.snapshot();
        self.items = dedup_by_id(items, &HashSet::new());
        self.current_index = if self.items.is_empty() { None } else { Some(0) };
        self.playing = !self.items.is_empty();
        before != self.snapshot()
    }

    /// Appends items that are not queued yet. An empty, unset queue starts
    /// playing the appended items as if `play_all` had been called.
    pub fn enqueue(&mut self, items: Vec<PlaylistItem>) -> bool {
        if self.items.is_empty() && self.current_index.is_none() {
            if items.is_empty() {
                return false;
            }
            return self.play_all(items);
        }

        let existing: HashSet<String> = self.items.iter().map(|item| item.id.clone()).collect();
        let appended = dedup_by_id(items, &existing);
        if appended.is_empty() {
            return false;
        }
        self.items.extend(appended);
        true
    }

    /// Makes `item` the immediate play target.
    ///
    /// A queued item is seeked to; an unknown item is inserted right after the
    /// current position (or at the front when nothing is selected).
    pub fn play_one(&mut self, item: PlaylistItem) -> bool {
        let before_index = self.current_index;
        let before_playing = self.playing;

        if let Some(position) = self.items.iter().position(|queued| queued.id == item.id) {
            self.current_index = Some(position);
            self.playing = true;
            return before_index != self.current_index || !before_playing;
        }

        let insert_at = match self.current_index {
            Some(index) => index + 1,
            None => 0,
        };
        self.items.insert(insert_at, item);
        self.current_index = Some(insert_at);
        self.playing = true;
        true
    }

    /// Advances to the following item. At the tail this is a no-op and the
    /// playing flag is left as is.
    pub fn next(&mut self) -> bool {
        match self.current_index {
            Some(index) if index + 1 < self.items.len() => {
                self.current_index = Some(index + 1);
                true
            }
            _ => false,
        }
    }

    /// Retreats to the preceding item; no-op at the head.
    pub fn prev(&mut self) -> bool {
        match self.current_index {
            Some(index) if index > 0 => {
                self.current_index = Some(index - 1);
                true
            }
            _ => false,
        }
    }

    pub fn toggle_play(&mut self) -> bool {
        if self.items.is_empty() {
            return false;
        }
        self.playing = !self.playing;
        true
    }

    pub fn clear(&mut self) -> bool {
        let changed = !self.items.is_empty() || self.current_index.is_some() || self.playing;
        self.items.clear();
        self.current_index = None;
        self.playing = false;
        changed
    }

    pub fn current(&self) -> Option<&PlaylistItem> {
        self.current_index.and_then(|index| self.items.get(index))
    }

    pub fn current_index(&self) -> Option<usize> {
        self.current_index
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn items(&self) -> &[PlaylistItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn snapshot(&self) -> QueueSnapshot {
        QueueSnapshot {
            items: self.items.clone(),
            current_index: self.current_index,
            playing: self.playing,
        }
    }
}

// Keeps the first occurrence of each id, skipping ids in `already_queued`.
fn dedup_by_id(items: Vec<PlaylistItem>, already_queued: &HashSet<String>) -> Vec<PlaylistItem> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|item| !already_queued.contains(&item.id) && seen.insert(item.id.clone()))
        .collect()
}
