//! Signed-in session and the account-switch confirmation flow.
//!
//! The coordinator is a two-state machine (`Idle`, `AwaitingConfirmation`).
//! It only decides transitions; the runtime performs the side effects of a
//! confirmed switch and reports back through [`SessionCoordinator::finish_confirm`].

use std::time::Duration;

use log::{debug, warn};
use uuid::Uuid;

use crate::host_bridge::HostCall;

/// Notice shown when an account switch is requested while signed out.
pub const NOT_SIGNED_IN_NOTICE: &str = "Not signed in";
/// Notice shown when the confirmed switch could not reach the host.
pub const SWITCH_FAILED_NOTICE: &str = "Account switch failed";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserSession {
    pub mid: u64,
    pub name: String,
}

/// Local authentication state.
#[derive(Debug, Clone, Default)]
pub struct SessionStore {
    user: Option<UserSession>,
}

impl SessionStore {
    pub fn sign_in(&mut self, user: UserSession) {
        self.user = Some(user);
    }

    pub fn clear(&mut self) -> Option<UserSession> {
        self.user.take()
    }

    pub fn current(&self) -> Option<&UserSession> {
        self.user.as_ref()
    }

    pub fn is_signed_in(&self) -> bool {
        self.user.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmationKind {
    AccountSwitch,
}

/// The single outstanding destructive-action prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingConfirmation {
    pub id: Uuid,
    pub kind: ConfirmationKind,
    pub visible: bool,
    /// The confirm action has started and its host call has not returned yet.
    pub in_flight: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionPhase {
    #[default]
    Idle,
    AwaitingConfirmation(PendingConfirmation),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwitchRequestOutcome {
    PromptOpened(Uuid),
    /// Guard failed: nobody is signed in, so there is nothing to switch away from.
    NotSignedIn,
    /// A prompt is already open; duplicate deliveries collapse into it.
    AlreadyPending,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmResolution {
    Cancelled,
    /// Run the switch for this confirmation, then call `finish_confirm`.
    Confirm(Uuid),
    Ignored,
}

#[derive(Debug, Clone, Default)]
pub struct SessionCoordinator {
    phase: SessionPhase,
}

impl SessionCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> &SessionPhase {
        &self.phase
    }

    pub fn is_prompt_visible(&self) -> bool {
        matches!(&self.phase, SessionPhase::AwaitingConfirmation(pending) if pending.visible)
    }

    pub fn request_account_switch(&mut self, store: &SessionStore) -> SwitchRequestOutcome {
        if let SessionPhase::AwaitingConfirmation(_) = self.phase {
            debug!("SessionCoordinator: account switch already awaiting confirmation");
            return SwitchRequestOutcome::AlreadyPending;
        }
        if !store.is_signed_in() {
            return SwitchRequestOutcome::NotSignedIn;
        }

        let id = Uuid::new_v4();
        self.phase = SessionPhase::AwaitingConfirmation(PendingConfirmation {
            id,
            kind: ConfirmationKind::AccountSwitch,
            visible: true,
            in_flight: false,
        });
        SwitchRequestOutcome::PromptOpened(id)
    }

    /// Applies the user's answer to the open prompt.
    pub fn resolve(&mut self, confirmed: bool) -> ConfirmResolution {
        let SessionPhase::AwaitingConfirmation(pending) = &mut self.phase else {
            return ConfirmResolution::Ignored;
        };
        if pending.in_flight {
            return ConfirmResolution::Ignored;
        }
        if confirmed {
            pending.in_flight = true;
            return ConfirmResolution::Confirm(pending.id);
        }
        self.phase = SessionPhase::Idle;
        ConfirmResolution::Cancelled
    }

    /// Closes the prompt once the confirm action has finished, whatever its
    /// outcome. Returns false for an id that is no longer pending.
    pub fn finish_confirm(&mut self, id: Uuid, result: &Result<(), String>) -> bool {
        let is_pending = matches!(
            &self.phase,
            SessionPhase::AwaitingConfirmation(pending) if pending.id == id
        );
        if !is_pending {
            return false;
        }
        if let Err(err) = result {
            warn!("SessionCoordinator: account switch failed: {}", err);
        }
        self.phase = SessionPhase::Idle;
        true
    }
}

/// Awaits a host call, turning expiry into an error.
pub async fn bounded_host_call(call: HostCall, timeout: Duration) -> Result<(), String> {
    match tokio::time::timeout(timeout, call).await {
        Ok(result) => result,
        Err(_) => Err(format!(
            "host did not answer within {} ms",
            timeout.as_millis()
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::{
        bounded_host_call, ConfirmResolution, SessionCoordinator, SessionPhase, SessionStore,
        SwitchRequestOutcome, UserSession,
    };
    use std::time::Duration;

    fn signed_in() -> SessionStore {
        let mut store = SessionStore::default();
        store.sign_in(UserSession {
            mid: 1,
            name: "viewer".to_string(),
        });
        store
    }

    #[test]
    fn test_switch_without_session_stays_idle() {
        let mut coordinator = SessionCoordinator::new();
        let outcome = coordinator.request_account_switch(&SessionStore::default());
        assert_eq!(outcome, SwitchRequestOutcome::NotSignedIn);
        assert_eq!(coordinator.phase(), &SessionPhase::Idle);
        assert!(!coordinator.is_prompt_visible());
    }

    #[test]
    fn test_switch_with_session_opens_single_prompt() {
        let mut coordinator = SessionCoordinator::new();
        let store = signed_in();
        let SwitchRequestOutcome::PromptOpened(id) = coordinator.request_account_switch(&store)
        else {
            panic!("expected prompt to open");
        };
        assert!(coordinator.is_prompt_visible());
        assert_eq!(
            coordinator.request_account_switch(&store),
            SwitchRequestOutcome::AlreadyPending
        );
        match coordinator.phase() {
            SessionPhase::AwaitingConfirmation(pending) => assert_eq!(pending.id, id),
            SessionPhase::Idle => panic!("expected awaiting confirmation"),
        }
    }

    #[test]
    fn test_cancel_returns_to_idle() {
        let mut coordinator = SessionCoordinator::new();
        coordinator.request_account_switch(&signed_in());
        assert_eq!(coordinator.resolve(false), ConfirmResolution::Cancelled);
        assert_eq!(coordinator.phase(), &SessionPhase::Idle);
        assert_eq!(coordinator.resolve(true), ConfirmResolution::Ignored);
    }

    #[test]
    fn test_confirm_then_finish_returns_to_idle_even_on_failure() {
        let mut coordinator = SessionCoordinator::new();
        coordinator.request_account_switch(&signed_in());
        let ConfirmResolution::Confirm(id) = coordinator.resolve(true) else {
            panic!("expected confirm");
        };
        assert_eq!(coordinator.resolve(true), ConfirmResolution::Ignored);
        assert!(coordinator.is_prompt_visible());

        assert!(coordinator.finish_confirm(id, &Err("host unavailable".to_string())));
        assert_eq!(coordinator.phase(), &SessionPhase::Idle);
        assert!(!coordinator.finish_confirm(id, &Ok(())));
    }

    #[test]
    fn test_clear_session_returns_previous_user() {
        let mut store = signed_in();
        assert_eq!(store.current().map(|user| user.mid), Some(1));
        assert!(store.clear().is_some());
        assert!(!store.is_signed_in());
        assert!(store.clear().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_bounded_host_call_times_out() {
        let call = Box::pin(async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok::<(), String>(())
        });
        let result = bounded_host_call(call, Duration::from_millis(500)).await;
        assert!(result.unwrap_err().contains("500 ms"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_bounded_host_call_passes_through_result() {
        let ok =
            bounded_host_call(Box::pin(async { Ok::<(), String>(()) }), Duration::from_secs(1))
                .await;
        assert!(ok.is_ok());
        let err = bounded_host_call(
            Box::pin(async { Err::<(), String>("rejected".to_string()) }),
            Duration::from_secs(1),
        )
        .await;
        assert_eq!(err, Err("rejected".to_string()));
    }
}
