//! Event-bus protocol shared by all runtime components.
//!
//! Host commands enter from the cross-process bridge, intents enter from the
//! rendering layer, and notifications leave the runtime after it applies a
//! change to the state it owns.

use std::str::FromStr;

use uuid::Uuid;

use crate::{
    app_state::UpdateBanner,
    collection::{MediaCollection, MediaEntry},
    notices::Notice,
    playlist::{PlaylistItem, QueueSnapshot},
    session::{SessionPhase, UserSession},
};

/// Top-level envelope for all bus traffic.
#[derive(Debug, Clone)]
pub enum Message {
    Host(HostCommand),
    Queue(QueueMessage),
    Search(SearchMessage),
    Collection(CollectionMessage),
    Session(SessionMessage),
    View(ViewMessage),
    Shutdown,
}

/// Transport button pressed outside the UI process (taskbar thumbnail
/// buttons, media keys).
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportOp {
    Prev,
    Next,
    Toggle,
}

impl FromStr for TransportOp {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "prev" => Ok(Self::Prev),
            "next" => Ok(Self::Next),
            "toggle" => Ok(Self::Toggle),
            other => Err(format!("unknown transport op '{other}'")),
        }
    }
}

/// Update availability pushed by the host's updater.
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateInfo {
    pub latest_version: String,
    #[serde(default)]
    pub release_notes: String,
}

/// Commands the host process may deliver at any time, in any order, possibly
/// more than once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostCommand {
    Navigate(String),
    Transport(TransportOp),
    AccountSwitchRequested,
    UpdateAvailable(UpdateInfo),
}

impl HostCommand {
    pub fn tag(&self) -> &'static str {
        match self {
            HostCommand::Navigate(_) => "navigate",
            HostCommand::Transport(_) => "transport",
            HostCommand::AccountSwitchRequested => "account-switch-requested",
            HostCommand::UpdateAvailable(_) => "update-available",
        }
    }
}

/// Queue intents and the queue-changed notification.
#[derive(Debug, Clone)]
pub enum QueueMessage {
    PlayAll(Vec<PlaylistItem>),
    Enqueue(Vec<PlaylistItem>),
    PlayOne(PlaylistItem),
    Transport(TransportOp),
    Clear,
    /// Published after every effective queue mutation.
    QueueChanged(QueueSnapshot),
}

#[derive(Debug, Clone)]
pub enum SearchMessage {
    /// Search box content changed (one message per keystroke).
    Edited(String),
    /// Explicit "search now" (Enter) using the latest raw term.
    SubmitNow,
    /// Debounce window elapsed for `term`; stale tickets are dropped.
    DebounceElapsed { term: String, ticket: u64 },
    ResultsChanged {
        committed_term: String,
        results: Vec<MediaEntry>,
        pagination_enabled: bool,
    },
}

#[derive(Debug, Clone)]
pub enum CollectionMessage {
    Load {
        season_id: u64,
    },
    Loaded {
        season_id: u64,
        result: Result<MediaCollection, String>,
    },
}

#[derive(Debug, Clone)]
pub enum SessionMessage {
    SignedIn(UserSession),
    ConfirmOrCancel(bool),
    ConfirmFinished {
        confirmation_id: Uuid,
        result: Result<(), String>,
    },
    PhaseChanged(SessionPhase),
    /// Local session was cleared by a confirmed account switch. Independent
    /// regions (the login prompt) react to this without coupling to the runtime.
    SessionEnded,
}

/// Notifications for the rendering layer that are not owned by a single domain.
#[derive(Debug, Clone)]
pub enum ViewMessage {
    NoticeShown(Notice),
    UpdateBannerChanged(UpdateBanner),
    ViewChanged(String),
}
