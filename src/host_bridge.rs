//! Boundary between the UI process and the host process.
//!
//! The host pushes commands through listener registrations; every registration
//! hands back a [`Subscription`] that must be disposed when its owner is torn
//! down, otherwise handlers pile up across remounts.

use std::{
    fmt,
    future::Future,
    pin::Pin,
    sync::{Arc, Mutex, MutexGuard, Weak},
};

use log::{debug, trace};

use crate::protocol::{HostCommand, TransportOp, UpdateInfo};

/// Completion of a request sent to the host.
pub type HostCall = Pin<Box<dyn Future<Output = Result<(), String>> + Send>>;

pub type NavigateHandler = Box<dyn Fn(String) + Send + Sync>;
pub type PlayerCommandHandler = Box<dyn Fn(TransportOp) + Send + Sync>;
pub type SwitchAccountHandler = Box<dyn Fn() + Send + Sync>;
pub type UpdateAvailableHandler = Box<dyn Fn(UpdateInfo) + Send + Sync>;

/// Deregistration handle for one host listener.
///
/// `dispose` is idempotent and also runs on drop.
pub struct Subscription {
    dispose: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub fn new(dispose: impl FnOnce() + Send + 'static) -> Self {
        Self {
            dispose: Some(Box::new(dispose)),
        }
    }

    pub fn dispose(&mut self) {
        if let Some(dispose) = self.dispose.take() {
            dispose();
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.dispose.is_none()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

/// Host capabilities consumed by the UI process.
pub trait HostBridge: Send + Sync {
    fn on_navigate(&self, handler: NavigateHandler) -> Subscription;
    fn on_player_command(&self, handler: PlayerCommandHandler) -> Subscription;
    fn on_switch_account(&self, handler: SwitchAccountHandler) -> Subscription;
    fn on_update_available(&self, handler: UpdateAvailableHandler) -> Subscription;
    /// Asks the host to present its primary window.
    fn switch_to_main_window(&self) -> HostCall;
}

/// Requests flowing from the UI process to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostRequest {
    SwitchToMainWindow,
}

/// Transport for outbound host requests.
pub trait HostRequestSink: Send + Sync {
    fn send_request(&self, request: HostRequest) -> HostCall;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostChannel {
    Navigate,
    PlayerCommand,
    SwitchAccount,
    UpdateAvailable,
}

impl HostChannel {
    pub fn of(command: &HostCommand) -> Self {
        match command {
            HostCommand::Navigate(_) => HostChannel::Navigate,
            HostCommand::Transport(_) => HostChannel::PlayerCommand,
            HostCommand::AccountSwitchRequested => HostChannel::SwitchAccount,
            HostCommand::UpdateAvailable(_) => HostChannel::UpdateAvailable,
        }
    }
}

type Listener = Arc<dyn Fn(&HostCommand) + Send + Sync>;

#[derive(Default)]
struct ListenerRegistry {
    next_id: u64,
    listeners: Vec<(u64, HostChannel, Listener)>,
}

/// In-process bridge: keeps listener registries and fans host commands out to
/// them. Whatever carries the host's messages (IPC link, OS media controls)
/// calls [`LocalHostBridge::emit`].
#[derive(Clone)]
pub struct LocalHostBridge {
    registry: Arc<Mutex<ListenerRegistry>>,
    requests: Arc<dyn HostRequestSink>,
}

impl LocalHostBridge {
    pub fn new(requests: Arc<dyn HostRequestSink>) -> Self {
        Self {
            registry: Arc::new(Mutex::new(ListenerRegistry::default())),
            requests,
        }
    }

    /// Delivers `command` to every listener registered on its channel.
    /// Returns how many listeners were called.
    pub fn emit(&self, command: HostCommand) -> usize {
        let channel = HostChannel::of(&command);
        let listeners: Vec<Listener> = {
            let registry = lock_registry(&self.registry);
            registry
                .listeners
                .iter()
                .filter(|(_, listener_channel, _)| *listener_channel == channel)
                .map(|(_, _, listener)| Arc::clone(listener))
                .collect()
        };
        if listeners.is_empty() {
            debug!("LocalHostBridge: no listener for {}", command.tag());
        }
        for listener in &listeners {
            listener(&command);
        }
        listeners.len()
    }

    pub fn listener_count(&self, channel: HostChannel) -> usize {
        lock_registry(&self.registry)
            .listeners
            .iter()
            .filter(|(_, listener_channel, _)| *listener_channel == channel)
            .count()
    }

    fn register(&self, channel: HostChannel, listener: Listener) -> Subscription {
        let id = {
            let mut registry = lock_registry(&self.registry);
            registry.next_id += 1;
            let id = registry.next_id;
            registry.listeners.push((id, channel, listener));
            id
        };
        trace!("LocalHostBridge: registered listener {} on {:?}", id, channel);

        let registry: Weak<Mutex<ListenerRegistry>> = Arc::downgrade(&self.registry);
        Subscription::new(move || {
            if let Some(registry) = registry.upgrade() {
                lock_registry(&registry)
                    .listeners
                    .retain(|(listener_id, _, _)| *listener_id != id);
                trace!("LocalHostBridge: disposed listener {}", id);
            }
        })
    }
}

impl HostBridge for LocalHostBridge {
    fn on_navigate(&self, handler: NavigateHandler) -> Subscription {
        self.register(
            HostChannel::Navigate,
            Arc::new(move |command| {
                if let HostCommand::Navigate(path) = command {
                    handler(path.clone());
                }
            }),
        )
    }

    fn on_player_command(&self, handler: PlayerCommandHandler) -> Subscription {
        self.register(
            HostChannel::PlayerCommand,
            Arc::new(move |command| {
                if let HostCommand::Transport(op) = command {
                    handler(*op);
                }
            }),
        )
    }

    fn on_switch_account(&self, handler: SwitchAccountHandler) -> Subscription {
        self.register(
            HostChannel::SwitchAccount,
            Arc::new(move |command| {
                if let HostCommand::AccountSwitchRequested = command {
                    handler();
                }
            }),
        )
    }

    fn on_update_available(&self, handler: UpdateAvailableHandler) -> Subscription {
        self.register(
            HostChannel::UpdateAvailable,
            Arc::new(move |command| {
                if let HostCommand::UpdateAvailable(info) = command {
                    handler(info.clone());
                }
            }),
        )
    }

    fn switch_to_main_window(&self) -> HostCall {
        self.requests.send_request(HostRequest::SwitchToMainWindow)
    }
}

fn lock_registry(registry: &Mutex<ListenerRegistry>) -> MutexGuard<'_, ListenerRegistry> {
    match registry.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::{HostCall, HostRequest, HostRequestSink};
    use std::sync::{Arc, Mutex};

    /// Records outbound requests and answers with a preset outcome.
    #[derive(Default)]
    pub(crate) struct RecordingSink {
        pub(crate) requests: Mutex<Vec<HostRequest>>,
        pub(crate) failure: Mutex<Option<String>>,
        pub(crate) never_answers: Mutex<bool>,
    }

    impl RecordingSink {
        pub(crate) fn new() -> Arc<Self> {
            Arc::new(Self::default())
        }

        pub(crate) fn failing(message: &str) -> Arc<Self> {
            let sink = Self::default();
            *sink.failure.lock().unwrap() = Some(message.to_string());
            Arc::new(sink)
        }

        pub(crate) fn hanging() -> Arc<Self> {
            let sink = Self::default();
            *sink.never_answers.lock().unwrap() = true;
            Arc::new(sink)
        }

        pub(crate) fn recorded(&self) -> Vec<HostRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    impl HostRequestSink for RecordingSink {
        fn send_request(&self, request: HostRequest) -> HostCall {
            self.requests.lock().unwrap().push(request);
            let failure = self.failure.lock().unwrap().clone();
            let never_answers = *self.never_answers.lock().unwrap();
            Box::pin(async move {
                if never_answers {
                    std::future::pending::<()>().await;
                }
                match failure {
                    Some(message) => Err(message),
                    None => Ok(()),
                }
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{test_support::RecordingSink, HostBridge, HostChannel, LocalHostBridge};
    use crate::protocol::{HostCommand, TransportOp, UpdateInfo};
    use std::sync::{Arc, Mutex};

    fn bridge() -> LocalHostBridge {
        LocalHostBridge::new(RecordingSink::new())
    }

    #[test]
    fn test_emit_reaches_only_listeners_on_matching_channel() {
        let bridge = bridge();
        let ops = Arc::new(Mutex::new(Vec::new()));
        let paths = Arc::new(Mutex::new(Vec::new()));

        let ops_sink = Arc::clone(&ops);
        let _player =
            bridge.on_player_command(Box::new(move |op| ops_sink.lock().unwrap().push(op)));
        let paths_sink = Arc::clone(&paths);
        let _nav = bridge.on_navigate(Box::new(move |path| paths_sink.lock().unwrap().push(path)));

        assert_eq!(bridge.emit(HostCommand::Transport(TransportOp::Next)), 1);
        assert_eq!(bridge.emit(HostCommand::Navigate("/settings".to_string())), 1);
        assert_eq!(bridge.emit(HostCommand::AccountSwitchRequested), 0);

        assert_eq!(*ops.lock().unwrap(), vec![TransportOp::Next]);
        assert_eq!(*paths.lock().unwrap(), vec!["/settings".to_string()]);
    }

    #[test]
    fn test_dispose_is_idempotent_and_stops_delivery() {
        let bridge = bridge();
        let count = Arc::new(Mutex::new(0));
        let counter = Arc::clone(&count);
        let mut subscription = bridge.on_switch_account(Box::new(move || {
            *counter.lock().unwrap() += 1;
        }));

        bridge.emit(HostCommand::AccountSwitchRequested);
        subscription.dispose();
        subscription.dispose();
        assert!(subscription.is_disposed());
        bridge.emit(HostCommand::AccountSwitchRequested);

        assert_eq!(*count.lock().unwrap(), 1);
        assert_eq!(bridge.listener_count(HostChannel::SwitchAccount), 0);
    }

    #[test]
    fn test_dropping_subscription_deregisters() {
        let bridge = bridge();
        {
            let _subscription = bridge.on_update_available(Box::new(|_info: UpdateInfo| {}));
            assert_eq!(bridge.listener_count(HostChannel::UpdateAvailable), 1);
        }
        assert_eq!(bridge.listener_count(HostChannel::UpdateAvailable), 0);
    }

    #[test]
    fn test_repeated_mounts_do_not_accumulate_handlers() {
        let bridge = bridge();
        let count = Arc::new(Mutex::new(0));
        for _ in 0..5 {
            let counter = Arc::clone(&count);
            let mut subscription = bridge.on_player_command(Box::new(move |_| {
                *counter.lock().unwrap() += 1;
            }));
            subscription.dispose();
        }
        let counter = Arc::clone(&count);
        let _mounted = bridge.on_player_command(Box::new(move |_| {
            *counter.lock().unwrap() += 1;
        }));

        bridge.emit(HostCommand::Transport(TransportOp::Toggle));
        assert_eq!(*count.lock().unwrap(), 1);
    }

    #[test]
    fn test_disposing_after_bridge_is_gone_is_harmless() {
        let bridge = bridge();
        let mut subscription = bridge.on_navigate(Box::new(|_| {}));
        drop(bridge);
        subscription.dispose();
        assert!(subscription.is_disposed());
    }

    #[test]
    fn test_listener_may_dispose_other_subscriptions_while_emitting() {
        let bridge = bridge();
        let other = Arc::new(Mutex::new(Some(bridge.on_navigate(Box::new(|_| {})))));
        let other_handle = Arc::clone(&other);
        let _first = bridge.on_navigate(Box::new(move |_| {
            if let Some(mut subscription) = other_handle.lock().unwrap().take() {
                subscription.dispose();
            }
        }));

        bridge.emit(HostCommand::Navigate("/".to_string()));
        assert_eq!(bridge.listener_count(HostChannel::Navigate), 1);
    }
}
