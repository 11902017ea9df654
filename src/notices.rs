//! Transient notices (toasts) shown to the user.

use std::{
    collections::VecDeque,
    time::{Duration, Instant},
};

use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Success,
    Warning,
    Danger,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Notice {
    pub id: Uuid,
    pub title: String,
    pub level: NoticeLevel,
    pub deadline: Instant,
}

/// Bounded list of visible notices; the oldest one is evicted first.
#[derive(Debug, Clone)]
pub struct NoticeBoard {
    visible: VecDeque<Notice>,
    max_visible: usize,
    timeout: Duration,
}

impl NoticeBoard {
    pub fn new(max_visible: usize, timeout: Duration) -> Self {
        Self {
            visible: VecDeque::new(),
            max_visible: max_visible.max(1),
            timeout,
        }
    }

    pub fn push(&mut self, title: impl Into<String>, level: NoticeLevel) -> Notice {
        self.push_at(title, level, Instant::now())
    }

    pub fn push_at(
        &mut self,
        title: impl Into<String>,
        level: NoticeLevel,
        now: Instant,
    ) -> Notice {
        let notice = Notice {
            id: Uuid::new_v4(),
            title: title.into(),
            level,
            deadline: now + self.timeout,
        };
        self.visible.push_back(notice.clone());
        while self.visible.len() > self.max_visible {
            self.visible.pop_front();
        }
        notice
    }

    /// Drops expired notices, returning how many were removed.
    pub fn prune(&mut self, now: Instant) -> usize {
        let before = self.visible.len();
        self.visible.retain(|notice| notice.deadline > now);
        before - self.visible.len()
    }

    pub fn visible(&self) -> impl Iterator<Item = &Notice> {
        self.visible.iter()
    }

    pub fn len(&self) -> usize {
        self.visible.len()
    }

    pub fn is_empty(&self) -> bool {
        self.visible.is_empty()
    }
}
