//! Story queue - fixed story order plus the active cursor.
//!
//! The sequence never changes during a session; only the cursor moves
//! (and `viewed` flags flip). Navigation past either end is a no-op,
//! there is no wraparound.

use log::warn;

use crate::entities::{Story, group_starts};

#[derive(Clone, Debug, Default)]
pub struct StoryQueue {
    stories: Vec<Story>,
    active: usize,
}

impl StoryQueue {
    /// Create queue with cursor at `start`.
    ///
    /// Out-of-range `start` falls back to 0.
    pub fn new(stories: Vec<Story>, start: usize) -> Self {
        let active = if start < stories.len() {
            start
        } else {
            if !stories.is_empty() {
                warn!(
                    "Start index {} out of range for {} stories, starting at 0",
                    start,
                    stories.len()
                );
            }
            0
        };
        Self { stories, active }
    }

    pub fn len(&self) -> usize {
        self.stories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stories.is_empty()
    }

    /// Cursor position, None for an empty queue
    pub fn active_index(&self) -> Option<usize> {
        (!self.stories.is_empty()).then_some(self.active)
    }

    pub fn current(&self) -> Option<&Story> {
        self.stories.get(self.active)
    }

    pub fn get(&self, index: usize) -> Option<&Story> {
        self.stories.get(index)
    }

    pub fn stories(&self) -> &[Story] {
        &self.stories
    }

    /// Story right after the cursor (look-ahead preload target)
    pub fn peek_next(&self) -> Option<&Story> {
        if self.has_next() {
            self.stories.get(self.active + 1)
        } else {
            None
        }
    }

    pub fn has_next(&self) -> bool {
        self.active + 1 < self.stories.len()
    }

    pub fn has_prev(&self) -> bool {
        self.active > 0 && !self.stories.is_empty()
    }

    /// Move cursor forward by exactly one. Returns the new current story.
    pub fn advance(&mut self) -> Option<&Story> {
        if !self.has_next() {
            return None;
        }
        self.active += 1;
        self.stories.get(self.active)
    }

    /// Move cursor back by exactly one. Returns the new current story.
    pub fn retreat(&mut self) -> Option<&Story> {
        if !self.has_prev() {
            return None;
        }
        self.active -= 1;
        self.stories.get(self.active)
    }

    /// Jump directly to `index` if it is in bounds.
    pub fn jump_to(&mut self, index: usize) -> Option<&Story> {
        if index >= self.stories.len() {
            return None;
        }
        self.active = index;
        self.stories.get(self.active)
    }

    /// First story of author group `group` (groups are runs of one `user_id`)
    pub fn group_start(&self, group: usize) -> Option<usize> {
        group_starts(&self.stories).get(group).copied()
    }

    /// First story of the group after the active one
    pub fn next_group_start(&self) -> Option<usize> {
        let active = self.active_index()?;
        group_starts(&self.stories).into_iter().find(|&start| start > active)
    }

    /// First story of the group before the active one
    pub fn prev_group_start(&self) -> Option<usize> {
        let active = self.active_index()?;
        let starts = group_starts(&self.stories);
        let current = starts.iter().rposition(|&start| start <= active)?;
        current.checked_sub(1).map(|prev| starts[prev])
    }

    /// Mark the active story viewed. Returns true on its first view.
    pub fn mark_active_viewed(&mut self) -> bool {
        match self.stories.get_mut(self.active) {
            Some(story) if !story.viewed => {
                story.viewed = true;
                true
            }
            _ => false,
        }
    }
}
