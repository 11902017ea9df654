//! Single-consumer runtime loop that owns [`AppState`].
//!
//! Every mutation enters as a bus message and is applied here, in order. Work
//! that has to wait (the debounce timer, collection fetches, the host call of a
//! confirmed account switch) runs in its own task and reports back through the
//! bus, so the loop never blocks on it.

use std::{sync::Arc, time::Duration};

use log::{debug, info, trace, warn};
use tokio::{
    sync::broadcast::{error::RecvError, Receiver, Sender},
    time::Instant,
};

use crate::{
    app_state::AppState,
    collection::{CollectionSource, MediaCollection},
    command_router::{CommandRouter, RouterEffect, RouterSubscriptions},
    config::Config,
    debounce::DebounceScheduler,
    host_bridge::HostBridge,
    notices::{Notice, NoticeLevel},
    playlist::PlaylistItem,
    protocol::{
        CollectionMessage, HostCommand, Message, QueueMessage, SearchMessage, SessionMessage,
        TransportOp, ViewMessage,
    },
    session::{
        bounded_host_call, ConfirmResolution, SwitchRequestOutcome, UserSession,
        SWITCH_FAILED_NOTICE,
    },
};

const NOTICE_PRUNE_INTERVAL: Duration = Duration::from_millis(250);
const COLLECTION_FAILED_NOTICE: &str = "Failed to load collection";
/// Slack past the confirm timeout before an unreported host call is given up on.
const CONFIRM_RESULT_GRACE: Duration = Duration::from_secs(1);

pub struct AppRuntime {
    state: AppState,
    bus_receiver: Receiver<Message>,
    bus_sender: Sender<Message>,
    bridge: Arc<dyn HostBridge>,
    collection_source: Arc<dyn CollectionSource>,
    debounce: DebounceScheduler,
    debounce_delay: Duration,
    confirm_timeout: Duration,
    confirm_in_flight: Option<(uuid::Uuid, Instant)>,
    router_subscriptions: RouterSubscriptions,
}

impl AppRuntime {
    /// Builds the runtime and attaches the command router to `bridge`, so host
    /// commands are queued on the bus from this point on.
    pub fn new(
        config: &Config,
        bus_receiver: Receiver<Message>,
        bus_sender: Sender<Message>,
        bridge: Arc<dyn HostBridge>,
        collection_source: Arc<dyn CollectionSource>,
    ) -> Self {
        let router_subscriptions = CommandRouter::attach(bridge.as_ref(), bus_sender.clone());
        Self {
            state: AppState::new(config),
            bus_receiver,
            bus_sender,
            bridge,
            collection_source,
            debounce: DebounceScheduler::new(),
            debounce_delay: Duration::from_millis(u64::from(config.search.debounce_ms)),
            confirm_timeout: Duration::from_millis(u64::from(config.session.confirm_timeout_ms)),
            confirm_in_flight: None,
            router_subscriptions,
        }
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Processes bus traffic until `Shutdown` or until every sender is gone.
    pub async fn run(&mut self) {
        info!("AppRuntime: started");
        let mut prune_tick = tokio::time::interval(NOTICE_PRUNE_INTERVAL);
        prune_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                received = self.bus_receiver.recv() => match received {
                    Ok(Message::Shutdown) => {
                        info!("AppRuntime: shutdown requested");
                        break;
                    }
                    Ok(message) => self.handle_message(message),
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(
                            "AppRuntime lagged on bus, skipped {} message(s)",
                            skipped
                        );
                    }
                    Err(RecvError::Closed) => {
                        warn!("AppRuntime: bus closed");
                        break;
                    }
                },
                _ = prune_tick.tick() => {
                    self.prune_notices();
                    self.expire_stale_confirmation(Instant::now());
                }
            }
        }

        self.debounce.cancel();
        self.router_subscriptions.dispose();
        info!("AppRuntime: stopped");
    }

    pub fn handle_message(&mut self, message: Message) {
        match message {
            Message::Host(command) => self.handle_host_command(command),
            Message::Queue(message) => self.handle_queue_message(message),
            Message::Search(message) => self.handle_search_message(message),
            Message::Collection(message) => self.handle_collection_message(message),
            Message::Session(message) => self.handle_session_message(message),
            Message::View(_) => trace!("AppRuntime: ignoring view notification"),
            Message::Shutdown => debug!("AppRuntime: shutdown handled by run loop"),
        }
    }

    fn handle_host_command(&mut self, command: HostCommand) {
        match CommandRouter::dispatch(&mut self.state, command) {
            RouterEffect::ViewChanged(path) => {
                self.publish(Message::View(ViewMessage::ViewChanged(path)));
            }
            RouterEffect::QueueChanged => self.publish_queue(),
            RouterEffect::AccountSwitch(update) => {
                if let Some(notice) = update.notice {
                    self.publish_notice(notice);
                }
                if let SwitchRequestOutcome::PromptOpened(_) = update.outcome {
                    self.publish_phase();
                }
            }
            RouterEffect::UpdateBannerChanged => {
                info!(
                    "AppRuntime: update available: {}",
                    self.state.update_banner.latest_version
                );
                self.publish(Message::View(ViewMessage::UpdateBannerChanged(
                    self.state.update_banner.clone(),
                )));
            }
            RouterEffect::Unchanged => trace!("AppRuntime: host command changed nothing"),
        }
    }

    fn handle_queue_message(&mut self, message: QueueMessage) {
        let changed = match message {
            QueueMessage::PlayAll(items) => self.state.queue.play_all(items),
            QueueMessage::Enqueue(items) => self.state.queue.enqueue(items),
            QueueMessage::PlayOne(item) => self.state.queue.play_one(item),
            QueueMessage::Transport(op) => {
                CommandRouter::apply_transport(&mut self.state.queue, op)
            }
            QueueMessage::Clear => self.state.queue.clear(),
            QueueMessage::QueueChanged(_) => return,
        };
        if changed {
            self.publish_queue();
        } else {
            debug!("AppRuntime: queue intent changed nothing");
        }
    }

    fn handle_search_message(&mut self, message: SearchMessage) {
        match message {
            SearchMessage::Edited(term) => {
                self.state.search.set_raw_term(term.clone());
                let ticket = self.debounce.next_ticket();
                let bus_sender = self.bus_sender.clone();
                self.debounce.schedule(term, self.debounce_delay, move |term| {
                    let _ = bus_sender.send(Message::Search(SearchMessage::DebounceElapsed {
                        term,
                        ticket,
                    }));
                });
            }
            SearchMessage::SubmitNow => {
                let term = self.state.search.raw_term().to_string();
                let search = &mut self.state.search;
                let mut changed = false;
                self.debounce.commit_now(term, |term| {
                    changed = search.commit(term);
                });
                if changed {
                    self.publish_results();
                }
            }
            SearchMessage::DebounceElapsed { term, ticket } => {
                if !self.debounce.is_current(ticket) {
                    debug!("AppRuntime: dropping superseded search commit {}", ticket);
                    return;
                }
                if self.state.search.commit(term) {
                    self.publish_results();
                }
            }
            SearchMessage::ResultsChanged { .. } => {}
        }
    }

    fn handle_collection_message(&mut self, message: CollectionMessage) {
        match message {
            CollectionMessage::Load { season_id } => self.spawn_collection_fetch(season_id),
            CollectionMessage::Loaded { season_id, result } => match result {
                Ok(collection) => self.apply_collection(season_id, collection),
                Err(err) => {
                    warn!(
                        "AppRuntime: failed to load collection {}: {}",
                        season_id, err
                    );
                    let notice = self
                        .state
                        .notices
                        .push(COLLECTION_FAILED_NOTICE, NoticeLevel::Danger);
                    self.publish_notice(notice);
                }
            },
        }
    }

    fn spawn_collection_fetch(&self, season_id: u64) {
        let source = Arc::clone(&self.collection_source);
        let bus_sender = self.bus_sender.clone();
        tokio::spawn(async move {
            let result = tokio::task::spawn_blocking(move || source.fetch_collection(season_id))
                .await
                .unwrap_or_else(|err| Err(format!("collection fetch task failed: {err}")));
            let _ = bus_sender.send(Message::Collection(CollectionMessage::Loaded {
                season_id,
                result,
            }));
        });
    }

    fn apply_collection(&mut self, season_id: u64, collection: MediaCollection) {
        info!(
            "AppRuntime: loaded collection {} ({} videos)",
            season_id,
            collection.medias.len()
        );
        self.state.search.set_source(collection.medias);
        self.publish_results();
    }

    fn handle_session_message(&mut self, message: SessionMessage) {
        match message {
            SessionMessage::SignedIn(user) => {
                info!("AppRuntime: signed in as {}", user.name);
                self.state.session.sign_in(user);
            }
            SessionMessage::ConfirmOrCancel(confirmed) => {
                match self.state.session_coordinator.resolve(confirmed) {
                    ConfirmResolution::Cancelled => self.publish_phase(),
                    ConfirmResolution::Confirm(confirmation_id) => {
                        self.start_account_switch(confirmation_id);
                        self.publish_phase();
                    }
                    ConfirmResolution::Ignored => {
                        debug!("AppRuntime: no confirmation awaiting an answer");
                    }
                }
            }
            SessionMessage::ConfirmFinished {
                confirmation_id,
                result,
            } => {
                self.finish_account_switch(confirmation_id, result);
            }
            SessionMessage::PhaseChanged(_) | SessionMessage::SessionEnded => {}
        }
    }

    fn start_account_switch(&mut self, confirmation_id: uuid::Uuid) {
        if let Some(previous) = self.state.session.clear() {
            info!("AppRuntime: cleared session of {}", previous.name);
        }
        self.publish(Message::Session(SessionMessage::SessionEnded));
        self.confirm_in_flight = Some((confirmation_id, Instant::now()));
        let call = self.bridge.switch_to_main_window();
        let timeout = self.confirm_timeout;
        let bus_sender = self.bus_sender.clone();
        tokio::spawn(async move {
            let result = bounded_host_call(call, timeout).await;
            let _ = bus_sender.send(Message::Session(SessionMessage::ConfirmFinished {
                confirmation_id,
                result,
            }));
        });
    }

    fn finish_account_switch(&mut self, confirmation_id: uuid::Uuid, result: Result<(), String>) {
        if !self
            .state
            .session_coordinator
            .finish_confirm(confirmation_id, &result)
        {
            debug!("AppRuntime: stale confirmation {}", confirmation_id);
            return;
        }
        self.confirm_in_flight = None;
        if result.is_err() {
            let notice = self
                .state
                .notices
                .push(SWITCH_FAILED_NOTICE, NoticeLevel::Danger);
            self.publish_notice(notice);
        }
        self.publish_phase();
    }

    /// Closes a confirmation whose result never came back over the bus, e.g.
    /// because this receiver lagged past it.
    pub fn expire_stale_confirmation(&mut self, now: Instant) {
        let Some((confirmation_id, started_at)) = self.confirm_in_flight else {
            return;
        };
        let waited = now.saturating_duration_since(started_at);
        if waited < self.confirm_timeout + CONFIRM_RESULT_GRACE {
            return;
        }
        warn!(
            "AppRuntime: confirmation {} never reported back, closing it",
            confirmation_id
        );
        self.finish_account_switch(
            confirmation_id,
            Err("confirmation result was lost".to_string()),
        );
    }

    fn prune_notices(&mut self) {
        let expired = self.state.notices.prune(std::time::Instant::now());
        if expired > 0 {
            trace!("AppRuntime: {} notice(s) expired", expired);
        }
    }

    fn publish(&self, message: Message) {
        if self.bus_sender.send(message).is_err() {
            trace!("AppRuntime: notification had no receivers");
        }
    }

    fn publish_queue(&self) {
        self.publish(Message::Queue(QueueMessage::QueueChanged(
            self.state.queue.snapshot(),
        )));
    }

    fn publish_results(&self) {
        let search = &self.state.search;
        self.publish(Message::Search(SearchMessage::ResultsChanged {
            committed_term: search.committed_term().to_string(),
            results: search.filtered().to_vec(),
            pagination_enabled: search.pagination_enabled(),
        }));
    }

    fn publish_phase(&self) {
        self.publish(Message::Session(SessionMessage::PhaseChanged(
            self.state.session_coordinator.phase().clone(),
        )));
    }

    fn publish_notice(&self, notice: Notice) {
        self.publish(Message::View(ViewMessage::NoticeShown(notice)));
    }
}

/// Handle through which the rendering layer expresses user intents.
#[derive(Clone)]
pub struct AppIntents {
    bus_sender: Sender<Message>,
}

impl AppIntents {
    pub fn new(bus_sender: Sender<Message>) -> Self {
        Self { bus_sender }
    }

    pub fn search(&self, term: impl Into<String>) {
        self.send(Message::Search(SearchMessage::Edited(term.into())));
    }

    pub fn search_now(&self) {
        self.send(Message::Search(SearchMessage::SubmitNow));
    }

    pub fn transport(&self, op: TransportOp) {
        self.send(Message::Queue(QueueMessage::Transport(op)));
    }

    pub fn confirm_or_cancel(&self, confirmed: bool) {
        self.send(Message::Session(SessionMessage::ConfirmOrCancel(confirmed)));
    }

    pub fn play_all(&self, items: Vec<PlaylistItem>) {
        self.send(Message::Queue(QueueMessage::PlayAll(items)));
    }

    pub fn enqueue(&self, items: Vec<PlaylistItem>) {
        self.send(Message::Queue(QueueMessage::Enqueue(items)));
    }

    pub fn play_one(&self, item: PlaylistItem) {
        self.send(Message::Queue(QueueMessage::PlayOne(item)));
    }

    pub fn clear_queue(&self) {
        self.send(Message::Queue(QueueMessage::Clear));
    }

    pub fn load_collection(&self, season_id: u64) {
        self.send(Message::Collection(CollectionMessage::Load { season_id }));
    }

    pub fn sign_in(&self, user: UserSession) {
        self.send(Message::Session(SessionMessage::SignedIn(user)));
    }

    pub fn shutdown(&self) {
        self.send(Message::Shutdown);
    }

    fn send(&self, message: Message) {
        if self.bus_sender.send(message).is_err() {
            warn!("AppIntents: runtime is not listening");
        }
    }
}
