//! Session gate
//!
//! Decides from locally persisted credentials whether a protected view may
//! render. Nothing here talks to the storefront API: a present token is
//! trusted until the API rejects it.
//!
//! Every read that cannot be trusted (unreadable store, corrupt record, bad
//! timestamp) counts as signed out.

use std::{fmt, sync::Arc};

use jiff::{SignedDuration, Timestamp};
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::{
    api::ApiError,
    session::{AdminUser, AuthSession, SessionUser},
    storage::{SessionStore, StorageEvent, StoreError, keys},
};

/// How long an admin sign-in stays valid.
pub const ADMIN_SESSION_WINDOW: SignedDuration = SignedDuration::from_hours(24);

/// Value of [`keys::ADMIN_AUTHENTICATED`] while an admin is signed in.
const ADMIN_FLAG: &str = "true";

/// Errors raised while writing session state.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The backing store failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A session record could not be encoded.
    #[error("failed to encode session record: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Which predicate protects a view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateKind {
    /// Customer views (cart, checkout, orders, profile).
    User,

    /// The admin panel.
    Admin,
}

/// Result of evaluating a gate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum GateState {
    /// Not evaluated yet. Nothing protected may render.
    #[default]
    Unknown,

    /// The predicate held at the last evaluation.
    Authenticated,

    /// The predicate failed at the last evaluation.
    Unauthenticated,
}

impl From<bool> for GateState {
    fn from(authenticated: bool) -> Self {
        if authenticated {
            GateState::Authenticated
        } else {
            GateState::Unauthenticated
        }
    }
}

/// What a guarded view should do for a given [`GateState`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardOutcome<V> {
    /// Show a loading indicator.
    Loading,

    /// Render the protected view.
    Render(V),

    /// Navigate to the given route.
    Redirect(String),
}

/// Map `state` to the outcome for a protected view.
///
/// `view` is only built once the gate has authenticated, so protected content
/// never exists in the `Unknown` state.
pub fn guard<V>(
    state: GateState,
    view: impl FnOnce() -> V,
    fallback: impl Into<String>,
) -> GuardOutcome<V> {
    match state {
        GateState::Unknown => GuardOutcome::Loading,
        GateState::Authenticated => GuardOutcome::Render(view()),
        GateState::Unauthenticated => GuardOutcome::Redirect(fallback.into()),
    }
}

/// What the profile store holds for the admin session.
enum AdminSession {
    /// Neither admin key is present.
    Absent,

    /// Flag and record present, record inside the window.
    Valid,

    /// Anything else: partial, corrupt, expired or unreadable.
    Invalid,
}

/// Session predicates and mutations over the tab and profile stores.
#[derive(Clone)]
pub struct SessionGate {
    tab: Arc<dyn SessionStore>,
    profile: Arc<dyn SessionStore>,
}

impl SessionGate {
    /// Create a gate over a tab-scoped store (customer session) and a
    /// profile-scoped store (admin session).
    pub fn new(tab: Arc<dyn SessionStore>, profile: Arc<dyn SessionStore>) -> Self {
        SessionGate { tab, profile }
    }

    /// Whether a customer session token is present.
    ///
    /// An empty token counts as absent.
    pub fn is_authenticated(&self) -> bool {
        self.token().is_some()
    }

    /// Whether an admin is signed in, as of now.
    ///
    /// See [`SessionGate::is_admin_authenticated_at`].
    pub fn is_admin_authenticated(&self) -> bool {
        self.is_admin_authenticated_at(Timestamp::now())
    }

    /// Whether an admin is signed in, as of `now`.
    ///
    /// Requires the admin flag and a parsable admin record whose login time is
    /// at most [`ADMIN_SESSION_WINDOW`] before `now`. A login time after `now`
    /// is treated as malformed. Whenever the answer is `false` and some admin
    /// state was present, both admin keys are cleared.
    pub fn is_admin_authenticated_at(&self, now: Timestamp) -> bool {
        match self.admin_session(now) {
            AdminSession::Valid => true,
            AdminSession::Absent => false,
            AdminSession::Invalid => {
                self.clear_admin();
                false
            }
        }
    }

    /// Evaluate the predicate for `kind`.
    pub fn evaluate(&self, kind: GateKind) -> GateState {
        match kind {
            GateKind::User => self.is_authenticated().into(),
            GateKind::Admin => self.is_admin_authenticated().into(),
        }
    }

    /// Persist a new customer session.
    ///
    /// # Errors
    ///
    /// Returns a [`SessionError`] if the session cannot be stored.
    pub fn sign_in(&self, session: &AuthSession) -> Result<(), SessionError> {
        let user = serde_json::to_string(&session.user)?;

        self.tab.set(keys::TOKEN, &session.token)?;
        self.tab.set(keys::USER, &user)?;

        info!(user = %session.user.id, "signed in");

        Ok(())
    }

    /// Remove the customer session.
    ///
    /// # Errors
    ///
    /// Returns a [`SessionError`] if the store cannot be written.
    pub fn sign_out(&self) -> Result<(), SessionError> {
        self.tab.remove(keys::TOKEN)?;
        self.tab.remove(keys::USER)?;

        info!("signed out");

        Ok(())
    }

    /// The opaque session token, if one is present.
    pub fn token(&self) -> Option<String> {
        match self.tab.get(keys::TOKEN) {
            Ok(token) => token.filter(|token| !token.is_empty()),
            Err(error) => {
                warn!(%error, "failed to read session token, treating as signed out");
                None
            }
        }
    }

    /// The signed-in customer, if the stored record is readable.
    pub fn current_user(&self) -> Option<SessionUser> {
        let raw = match self.tab.get(keys::USER) {
            Ok(raw) => raw?,
            Err(error) => {
                warn!(%error, "failed to read session user");
                return None;
            }
        };

        serde_json::from_str(&raw)
            .inspect_err(|error| warn!(%error, "session user record is corrupt"))
            .ok()
    }

    /// Persist an admin sign-in, stamped with the current time.
    ///
    /// # Errors
    ///
    /// Returns a [`SessionError`] if the record cannot be stored.
    pub fn admin_sign_in(&self, admin: AdminUser) -> Result<AdminUser, SessionError> {
        self.admin_sign_in_at(admin, Timestamp::now())
    }

    /// Persist an admin sign-in, stamped with `login_at`.
    ///
    /// # Errors
    ///
    /// Returns a [`SessionError`] if the record cannot be stored.
    pub fn admin_sign_in_at(
        &self,
        admin: AdminUser,
        login_at: Timestamp,
    ) -> Result<AdminUser, SessionError> {
        let admin = AdminUser { login_at, ..admin };
        let record = serde_json::to_string(&admin)?;

        self.profile.set(keys::ADMIN_USER, &record)?;
        self.profile.set(keys::ADMIN_AUTHENTICATED, ADMIN_FLAG)?;

        info!(admin = %admin.id, "admin signed in");

        Ok(admin)
    }

    /// Remove the admin session.
    ///
    /// # Errors
    ///
    /// Returns a [`SessionError`] if the store cannot be written.
    pub fn admin_sign_out(&self) -> Result<(), SessionError> {
        self.profile.remove(keys::ADMIN_AUTHENTICATED)?;
        self.profile.remove(keys::ADMIN_USER)?;

        info!("admin signed out");

        Ok(())
    }

    /// React to a failed API call. Authentication failures clear the customer
    /// session; returns whether that happened.
    pub fn handle_api_error(&self, error: &ApiError) -> bool {
        if !error.is_auth_failure() {
            return false;
        }

        warn!(%error, "storefront API rejected the session");

        if let Err(error) = self.sign_out() {
            warn!(%error, "failed to clear rejected session");
        }

        true
    }

    /// Change events from the tab store.
    pub fn tab_events(&self) -> broadcast::Receiver<StorageEvent> {
        self.tab.subscribe()
    }

    /// Change events from the profile store.
    pub fn profile_events(&self) -> broadcast::Receiver<StorageEvent> {
        self.profile.subscribe()
    }

    fn admin_session(&self, now: Timestamp) -> AdminSession {
        let (flag, record) = match (
            self.profile.get(keys::ADMIN_AUTHENTICATED),
            self.profile.get(keys::ADMIN_USER),
        ) {
            (Ok(flag), Ok(record)) => (flag, record),
            (Err(error), _) | (_, Err(error)) => {
                warn!(%error, "failed to read admin session");
                return AdminSession::Invalid;
            }
        };

        if flag.is_none() && record.is_none() {
            return AdminSession::Absent;
        }

        if flag.as_deref() != Some(ADMIN_FLAG) {
            return AdminSession::Invalid;
        }

        let Some(record) = record else {
            return AdminSession::Invalid;
        };

        let admin: AdminUser = match serde_json::from_str(&record) {
            Ok(admin) => admin,
            Err(error) => {
                warn!(%error, "admin record is corrupt");
                return AdminSession::Invalid;
            }
        };

        let elapsed = now.duration_since(admin.login_at);

        if elapsed.is_negative() {
            warn!(login_at = %admin.login_at, "admin login time is in the future");
            return AdminSession::Invalid;
        }

        if elapsed >= ADMIN_SESSION_WINDOW {
            debug!(login_at = %admin.login_at, "admin session expired");
            return AdminSession::Invalid;
        }

        AdminSession::Valid
    }

    fn clear_admin(&self) {
        if let Err(error) = self.admin_sign_out() {
            warn!(%error, "failed to clear admin session");
        }
    }
}

impl fmt::Debug for SessionGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionGate").finish_non_exhaustive()
    }
}
