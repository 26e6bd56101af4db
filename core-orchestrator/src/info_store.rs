//! Per-tag playback position store.
//!
//! Snapshots survive session teardown so a session recreated for the same
//! tag resumes where the previous one stopped. Writes are first-writer-wins:
//! once a snapshot exists, later saves are ignored until it is consumed by a
//! restore or explicitly cleared.

use bridge_traits::PlaybackInfo;
use std::collections::HashMap;

use crate::types::Tag;

#[derive(Debug, Default)]
pub struct PlaybackInfoStore {
    entries: HashMap<Tag, PlaybackInfo>,
}

impl PlaybackInfoStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `info` unless the tag is the sentinel or already has a snapshot.
    ///
    /// Returns `true` when the snapshot was written.
    pub fn try_save(&mut self, tag: &Tag, info: PlaybackInfo) -> bool {
        if tag.is_sentinel() || self.entries.contains_key(tag) {
            return false;
        }
        self.entries.insert(tag.clone(), info);
        true
    }

    /// Remove and return the snapshot for `tag`.
    pub fn take(&mut self, tag: &Tag) -> Option<PlaybackInfo> {
        if tag.is_sentinel() {
            return None;
        }
        self.entries.remove(tag)
    }

    pub fn get(&self, tag: &Tag) -> Option<&PlaybackInfo> {
        self.entries.get(tag)
    }

    pub fn remove(&mut self, tag: &Tag) -> Option<PlaybackInfo> {
        self.entries.remove(tag)
    }

    pub fn contains(&self, tag: &Tag) -> bool {
        self.entries.contains_key(tag)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
