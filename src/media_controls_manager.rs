//! OS media controls bridge (MPRIS/SMTC/Now Playing).
//!
//! Media keys and the platform's transport buttons are fed into the host
//! bridge as player commands, the same path the host process uses. Queue
//! changes are mirrored back to the platform as playback state and metadata.

use std::sync::{Arc, Mutex};

use log::{info, warn};
use souvlaki::{MediaControlEvent, MediaControls, MediaMetadata, MediaPlayback, PlatformConfig};
use tokio::sync::broadcast::{error::RecvError, Receiver};

use crate::{
    host_bridge::LocalHostBridge,
    playlist::{PlaylistItem, QueueSnapshot},
    protocol::{HostCommand, Message, QueueMessage, TransportOp},
};

const MEDIA_CONTROLS_DISPLAY_NAME: &str = "ReelQueue";
const MEDIA_CONTROLS_DBUS_NAME: &str = "reelqueue";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PlaybackPublishState {
    Stopped,
    Paused,
    Playing,
}

impl PlaybackPublishState {
    fn of(snapshot: &QueueSnapshot) -> Self {
        match snapshot.current() {
            None => PlaybackPublishState::Stopped,
            Some(_) if snapshot.playing => PlaybackPublishState::Playing,
            Some(_) => PlaybackPublishState::Paused,
        }
    }
}

/// Owns the platform media controls and mirrors the queue onto them.
pub struct MediaControlsManager {
    bus_consumer: Receiver<Message>,
    controls: Option<MediaControls>,
    /// Shared with the control event handler so Play and Pause can be checked
    /// against what the platform currently shows.
    last_published_playback: Arc<Mutex<Option<PlaybackPublishState>>>,
    last_published_item_id: Option<String>,
}

impl MediaControlsManager {
    /// Creates a manager and attempts to initialize platform media controls.
    pub fn new(bus_consumer: Receiver<Message>, bridge: LocalHostBridge) -> Self {
        let last_published_playback = Arc::new(Mutex::new(None));
        Self {
            bus_consumer,
            controls: Self::create_controls(bridge, Arc::clone(&last_published_playback)),
            last_published_playback,
            last_published_item_id: None,
        }
    }

    #[cfg(not(target_os = "windows"))]
    fn create_controls(
        bridge: LocalHostBridge,
        playback_state: Arc<Mutex<Option<PlaybackPublishState>>>,
    ) -> Option<MediaControls> {
        let mut controls = match MediaControls::new(PlatformConfig {
            display_name: MEDIA_CONTROLS_DISPLAY_NAME,
            dbus_name: MEDIA_CONTROLS_DBUS_NAME,
            hwnd: None,
        }) {
            Ok(controls) => controls,
            Err(err) => {
                warn!(
                    "MediaControlsManager: failed to create media controls backend: {}",
                    err
                );
                return None;
            }
        };

        if let Err(err) = controls.attach(move |event| {
            let published = match playback_state.lock() {
                Ok(state) => *state,
                Err(poisoned) => *poisoned.into_inner(),
            };
            if let Some(op) = Self::map_control_event(event, published) {
                bridge.emit(HostCommand::Transport(op));
            }
        }) {
            warn!(
                "MediaControlsManager: failed to attach media controls handler: {}",
                err
            );
            return None;
        }

        Some(controls)
    }

    #[cfg(target_os = "windows")]
    fn create_controls(
        _bridge: LocalHostBridge,
        _playback_state: Arc<Mutex<Option<PlaybackPublishState>>>,
    ) -> Option<MediaControls> {
        // Souvlaki needs an HWND on Windows and this process has no window of its own.
        warn!("MediaControlsManager: Windows media controls are disabled without an HWND");
        None
    }

    /// The queue only has a toggle, so Play and Pause are forwarded as one
    /// only when they would change the published state.
    fn map_control_event(
        event: MediaControlEvent,
        published: Option<PlaybackPublishState>,
    ) -> Option<TransportOp> {
        let is_playing = published == Some(PlaybackPublishState::Playing);
        match event {
            MediaControlEvent::Next => Some(TransportOp::Next),
            MediaControlEvent::Previous => Some(TransportOp::Prev),
            MediaControlEvent::Toggle => Some(TransportOp::Toggle),
            MediaControlEvent::Play if !is_playing => Some(TransportOp::Toggle),
            MediaControlEvent::Pause if is_playing => Some(TransportOp::Toggle),
            _ => None,
        }
    }

    fn published_playback(&self) -> Option<PlaybackPublishState> {
        match self.last_published_playback.lock() {
            Ok(state) => *state,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    fn publish_playback_if_needed(&mut self, snapshot: &QueueSnapshot) {
        let desired_state = PlaybackPublishState::of(snapshot);
        if self.published_playback() == Some(desired_state) {
            return;
        }

        let Some(controls) = self.controls.as_mut() else {
            return;
        };

        let playback = match desired_state {
            PlaybackPublishState::Stopped => MediaPlayback::Stopped,
            PlaybackPublishState::Paused => MediaPlayback::Paused { progress: None },
            PlaybackPublishState::Playing => MediaPlayback::Playing { progress: None },
        };

        if let Err(err) = controls.set_playback(playback) {
            warn!(
                "MediaControlsManager: failed to publish playback state {:?}: {}",
                desired_state, err
            );
            return;
        }

        match self.last_published_playback.lock() {
            Ok(mut state) => *state = Some(desired_state),
            Err(poisoned) => *poisoned.into_inner() = Some(desired_state),
        }
    }

    fn publish_metadata_if_needed(&mut self, current: Option<&PlaylistItem>) {
        let current_id = current.map(|item| item.id.clone());
        if self.last_published_item_id == current_id {
            return;
        }

        let Some(controls) = self.controls.as_mut() else {
            return;
        };

        let publish_result = match current {
            Some(item) => controls.set_metadata(MediaMetadata {
                title: Some(item.title.as_str()),
                artist: item.owner_name.as_deref(),
                album: None,
                cover_url: (!item.cover_url.is_empty()).then_some(item.cover_url.as_str()),
                duration: None,
            }),
            None => controls.set_metadata(MediaMetadata::default()),
        };

        if let Err(err) = publish_result {
            warn!("MediaControlsManager: failed to publish metadata: {}", err);
            return;
        }

        self.last_published_item_id = current_id;
    }

    fn handle_message(&mut self, message: Message) {
        if let Message::Queue(QueueMessage::QueueChanged(snapshot)) = message {
            self.publish_playback_if_needed(&snapshot);
            self.publish_metadata_if_needed(snapshot.current());
        }
    }

    /// Starts the blocking manager loop.
    pub fn run(&mut self) {
        info!("MediaControlsManager: started");
        loop {
            match self.bus_consumer.blocking_recv() {
                Ok(Message::Shutdown) => break,
                Ok(message) => self.handle_message(message),
                Err(RecvError::Lagged(skipped)) => {
                    warn!("MediaControlsManager: bus lagged by {} messages", skipped);
                }
                Err(RecvError::Closed) => break,
            }
        }
    }
}
