//! Dispatch of host-process commands onto in-process handlers.
//!
//! The router has no state of its own. Listeners registered on the bridge only
//! forward commands onto the bus; the runtime then calls [`CommandRouter::dispatch`]
//! with the live state it owns, so transport commands always act on the
//! current queue rather than on whatever existed at registration time.

use log::{debug, warn};
use tokio::sync::broadcast::Sender;

use crate::{
    app_state::{AccountSwitchUpdate, AppState},
    host_bridge::{HostBridge, Subscription},
    playlist::PlaybackQueue,
    protocol::{HostCommand, Message, TransportOp},
};

/// What a dispatched command changed.
#[derive(Debug, Clone)]
pub enum RouterEffect {
    ViewChanged(String),
    QueueChanged,
    AccountSwitch(AccountSwitchUpdate),
    UpdateBannerChanged,
    /// The command was valid but changed nothing (tail `next`, duplicate delivery).
    Unchanged,
}

pub struct CommandRouter;

impl CommandRouter {
    pub fn dispatch(state: &mut AppState, command: HostCommand) -> RouterEffect {
        debug!("CommandRouter: dispatching {}", command.tag());
        match command {
            HostCommand::Navigate(path) => {
                if state.view.navigate(&path) {
                    RouterEffect::ViewChanged(path)
                } else {
                    RouterEffect::Unchanged
                }
            }
            HostCommand::Transport(op) => {
                if Self::apply_transport(&mut state.queue, op) {
                    RouterEffect::QueueChanged
                } else {
                    RouterEffect::Unchanged
                }
            }
            HostCommand::AccountSwitchRequested => {
                RouterEffect::AccountSwitch(state.request_account_switch())
            }
            HostCommand::UpdateAvailable(info) => {
                if state.update_banner.apply(&info) {
                    RouterEffect::UpdateBannerChanged
                } else {
                    RouterEffect::Unchanged
                }
            }
        }
    }

    pub fn apply_transport(queue: &mut PlaybackQueue, op: TransportOp) -> bool {
        match op {
            TransportOp::Prev => queue.prev(),
            TransportOp::Next => queue.next(),
            TransportOp::Toggle => queue.toggle_play(),
        }
    }

    /// Registers one forwarding listener per host channel.
    ///
    /// Keep the returned handle for as long as the owner is mounted; dropping or
    /// disposing it removes every listener.
    pub fn attach(bridge: &dyn HostBridge, bus_sender: Sender<Message>) -> RouterSubscriptions {
        let navigate_sender = bus_sender.clone();
        let navigate = bridge.on_navigate(Box::new(move |path| {
            forward(&navigate_sender, HostCommand::Navigate(path));
        }));

        let transport_sender = bus_sender.clone();
        let transport = bridge.on_player_command(Box::new(move |op| {
            forward(&transport_sender, HostCommand::Transport(op));
        }));

        let switch_sender = bus_sender.clone();
        let switch_account = bridge.on_switch_account(Box::new(move || {
            forward(&switch_sender, HostCommand::AccountSwitchRequested);
        }));

        let update = bridge.on_update_available(Box::new(move |info| {
            forward(&bus_sender, HostCommand::UpdateAvailable(info));
        }));

        RouterSubscriptions {
            subscriptions: vec![navigate, transport, switch_account, update],
        }
    }
}

fn forward(bus_sender: &Sender<Message>, command: HostCommand) {
    let tag = command.tag();
    if bus_sender.send(Message::Host(command)).is_err() {
        warn!("CommandRouter: dropped {} command, no bus receivers", tag);
    }
}

/// Owns the router's bridge registrations.
#[derive(Debug)]
pub struct RouterSubscriptions {
    subscriptions: Vec<Subscription>,
}

impl RouterSubscriptions {
    pub fn dispose(&mut self) {
        for subscription in &mut self.subscriptions {
            subscription.dispose();
        }
    }

    pub fn is_active(&self) -> bool {
        self.subscriptions
            .iter()
            .any(|subscription| !subscription.is_disposed())
    }
}
