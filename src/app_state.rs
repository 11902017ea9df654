//! Explicitly owned process-wide state.
//!
//! One `AppState` lives inside the runtime task, which is its only writer.
//! Tests build isolated instances instead of sharing a global.

use std::time::Duration;

use crate::{
    config::Config,
    notices::{Notice, NoticeBoard, NoticeLevel},
    playlist::PlaybackQueue,
    protocol::UpdateInfo,
    search_state::SearchState,
    session::{SessionCoordinator, SessionStore, SwitchRequestOutcome, NOT_SIGNED_IN_NOTICE},
};

/// Update availability shown as a banner; purely informational.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateBanner {
    pub is_update_available: bool,
    pub latest_version: String,
    pub release_notes: String,
}

impl UpdateBanner {
    /// Returns false when the same update was already announced.
    pub fn apply(&mut self, info: &UpdateInfo) -> bool {
        let next = UpdateBanner {
            is_update_available: true,
            latest_version: info.latest_version.clone(),
            release_notes: info.release_notes.clone(),
        };
        if *self == next {
            return false;
        }
        *self = next;
        true
    }
}

/// Path of the view currently displayed.
#[derive(Debug, Clone)]
pub struct ViewRouter {
    current: String,
}

impl Default for ViewRouter {
    fn default() -> Self {
        Self {
            current: "/".to_string(),
        }
    }
}

impl ViewRouter {
    /// Navigating to the view already shown is a no-op.
    pub fn navigate(&mut self, path: &str) -> bool {
        if path.is_empty() || path == self.current {
            return false;
        }
        self.current = path.to_string();
        true
    }

    pub fn current(&self) -> &str {
        &self.current
    }
}

/// Result of an account-switch request, with the notice produced when the
/// signed-in guard fails.
#[derive(Debug, Clone)]
pub struct AccountSwitchUpdate {
    pub outcome: SwitchRequestOutcome,
    pub notice: Option<Notice>,
}

#[derive(Debug, Clone)]
pub struct AppState {
    pub queue: PlaybackQueue,
    pub search: SearchState,
    pub session: SessionStore,
    pub session_coordinator: SessionCoordinator,
    pub update_banner: UpdateBanner,
    pub view: ViewRouter,
    pub notices: NoticeBoard,
    notice_capacity: usize,
    notice_timeout: Duration,
}

impl AppState {
    pub fn new(config: &Config) -> Self {
        let notice_capacity = config.notices.max_visible as usize;
        let notice_timeout = Duration::from_millis(u64::from(config.notices.toast_timeout_ms));
        Self {
            queue: PlaybackQueue::new(),
            search: SearchState::new(),
            session: SessionStore::default(),
            session_coordinator: SessionCoordinator::new(),
            update_banner: UpdateBanner::default(),
            view: ViewRouter::default(),
            notices: NoticeBoard::new(notice_capacity, notice_timeout),
            notice_capacity,
            notice_timeout,
        }
    }

    /// Returns every domain to its start-of-process state.
    pub fn reset(&mut self) {
        self.queue.clear();
        self.search = SearchState::new();
        self.session = SessionStore::default();
        self.session_coordinator = SessionCoordinator::new();
        self.update_banner = UpdateBanner::default();
        self.view = ViewRouter::default();
        self.notices = NoticeBoard::new(self.notice_capacity, self.notice_timeout);
    }

    pub fn request_account_switch(&mut self) -> AccountSwitchUpdate {
        let outcome = self
            .session_coordinator
            .request_account_switch(&self.session);
        let notice = match outcome {
            SwitchRequestOutcome::NotSignedIn => {
                Some(self.notices.push(NOT_SIGNED_IN_NOTICE, NoticeLevel::Warning))
            }
            SwitchRequestOutcome::PromptOpened(_) | SwitchRequestOutcome::AlreadyPending => None,
        };
        AccountSwitchUpdate { outcome, notice }
    }
}

#[cfg(test)]
mod tests {
    use super::{AppState, UpdateBanner, ViewRouter};
    use crate::{
        config::Config,
        playlist::PlaylistItem,
        protocol::UpdateInfo,
        session::{SessionPhase, SwitchRequestOutcome, UserSession},
    };

    #[test]
    fn test_update_banner_ignores_duplicate_announcement() {
        let mut banner = UpdateBanner::default();
        let info = UpdateInfo {
            latest_version: "1.4.0".to_string(),
            release_notes: "notes".to_string(),
        };
        assert!(banner.apply(&info));
        assert!(banner.is_update_available);
        assert!(!banner.apply(&info));
    }

    #[test]
    fn test_view_router_skips_same_and_empty_paths() {
        let mut view = ViewRouter::default();
        assert_eq!(view.current(), "/");
        assert!(view.navigate("/collection/9"));
        assert!(!view.navigate("/collection/9"));
        assert!(!view.navigate(""));
        assert_eq!(view.current(), "/collection/9");
        assert!(view.navigate("/settings"));
        assert_eq!(view.current(), "/settings");
    }

    #[test]
    fn test_signed_out_switch_request_pushes_warning_notice() {
        let mut state = AppState::new(&Config::default());
        let update = state.request_account_switch();
        assert_eq!(update.outcome, SwitchRequestOutcome::NotSignedIn);
        assert!(update.notice.is_some());
        assert_eq!(state.notices.len(), 1);
        assert_eq!(state.session_coordinator.phase(), &SessionPhase::Idle);
    }

    #[test]
    fn test_reset_restores_start_state() {
        let mut state = AppState::new(&Config::default());
        state.queue.play_all(vec![PlaylistItem::video("BV1", "one")]);
        state.session.sign_in(UserSession {
            mid: 3,
            name: "viewer".to_string(),
        });
        state.request_account_switch();
        state.view.navigate("/settings");

        state.reset();
        assert!(state.queue.is_empty());
        assert!(!state.session.is_signed_in());
        assert_eq!(state.session_coordinator.phase(), &SessionPhase::Idle);
        assert_eq!(state.view.current(), "/");
        assert!(state.notices.is_empty());
    }
}
