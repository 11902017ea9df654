use std::{any::Any, thread};

use log::info;
use tokio::sync::broadcast;

#[cfg(feature = "os-media-controls")]
use crate::media_controls_manager::MediaControlsManager;
use crate::{
    host_bridge::LocalHostBridge,
    host_ipc::StdioHostLink,
    protocol::{CollectionMessage, Message},
};

pub struct BackgroundServicesConfig {
    pub bus_sender: broadcast::Sender<Message>,
    pub bridge: LocalHostBridge,
    /// `0` skips the startup collection load.
    pub startup_season_id: u64,
}

fn panic_payload_to_string(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        return (*s).to_string();
    }
    if let Some(s) = payload.downcast_ref::<String>() {
        return s.clone();
    }
    "non-string panic payload".to_string()
}

/// Starts the host link reader and optional OS integrations, then queues the
/// startup collection load. Must be called after the runtime has subscribed.
pub fn spawn_background_services(config: BackgroundServicesConfig) {
    let BackgroundServicesConfig {
        bus_sender,
        bridge,
        startup_season_id,
    } = config;

    let host_link_bridge = bridge.clone();
    let host_link_bus_sender = bus_sender.clone();
    thread::spawn(move || {
        let run_result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            StdioHostLink::read_stdin(&host_link_bridge);
        }));
        if let Err(payload) = run_result {
            log::error!(
                "Host link thread terminated due to panic: {}",
                panic_payload_to_string(payload.as_ref())
            );
        }
        // Without a host there is nothing left to coordinate.
        let _ = host_link_bus_sender.send(Message::Shutdown);
    });

    #[cfg(feature = "os-media-controls")]
    {
        let media_controls_bus_receiver = bus_sender.subscribe();
        let media_controls_bridge = bridge.clone();
        thread::spawn(move || {
            let mut media_controls_manager =
                MediaControlsManager::new(media_controls_bus_receiver, media_controls_bridge);
            media_controls_manager.run();
        });
    }

    if startup_season_id != 0 {
        info!("Loading startup collection {}", startup_season_id);
        let _ = bus_sender.send(Message::Collection(CollectionMessage::Load {
            season_id: startup_season_id,
        }));
    }
}
