//! Gate watcher
//!
//! Keeps a protected view's [`GateState`] current. The state starts as
//! [`GateState::Unknown`], is evaluated once on mount and is then re-evaluated
//! whenever the view regains focus or either session store reports a change.
//!
//! Store events do not cover every writer (another process editing the profile
//! file, for one), so a fixed poll re-checks the gate as a fallback.

use std::time::Duration;

use tokio::{
    sync::{broadcast::error::RecvError, mpsc, watch},
    time::{self, MissedTickBehavior},
};
use tracing::{debug, trace};

use crate::{
    session::gate::{GateKind, GateState, SessionGate},
    storage::StorageEvent,
};

/// Fallback re-evaluation period.
pub const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Why the gate was re-evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateTrigger {
    /// The protected view mounted.
    Mount,

    /// The view regained focus.
    Focus,

    /// A session store reported a change.
    StorageChanged,

    /// The fallback poll fired.
    Poll,
}

/// Lifecycle events from the protected view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewEvent {
    /// The view regained focus.
    Focus,

    /// The view went away; the watcher stops.
    Unmount,
}

/// Re-evaluates a [`SessionGate`] and publishes state changes.
#[derive(Debug)]
pub struct GateWatcher {
    gate: SessionGate,
    kind: GateKind,
    state: watch::Sender<GateState>,
    poll_interval: Duration,
}

impl GateWatcher {
    /// Create a watcher for `kind` and the receiver views read their state from.
    pub fn new(gate: SessionGate, kind: GateKind) -> (Self, watch::Receiver<GateState>) {
        let (state, receiver) = watch::channel(GateState::Unknown);

        let watcher = GateWatcher {
            gate,
            kind,
            state,
            poll_interval: POLL_INTERVAL,
        };

        (watcher, receiver)
    }

    /// Replace the fallback poll period.
    #[must_use]
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Evaluate the gate now, publishing the result if it changed.
    pub fn reevaluate(&self, trigger: GateTrigger) -> GateState {
        let next = self.gate.evaluate(self.kind);

        self.state.send_if_modified(|current| {
            if *current == next {
                trace!(?trigger, state = ?next, "gate state unchanged");
                return false;
            }

            debug!(?trigger, kind = ?self.kind, from = ?*current, to = ?next, "gate state changed");
            *current = next;

            true
        });

        next
    }

    /// Watch the gate until the view unmounts or its event channel closes.
    pub async fn run(self, mut views: mpsc::Receiver<ViewEvent>) {
        // Subscribe before the first evaluation so no change slips between them.
        let mut tab = self.gate.tab_events();
        let mut profile = self.gate.profile_events();
        let mut tab_open = true;
        let mut profile_open = true;

        let first_poll = time::Instant::now() + self.poll_interval;
        let mut poll = time::interval_at(first_poll, self.poll_interval);
        poll.set_missed_tick_behavior(MissedTickBehavior::Delay);

        self.reevaluate(GateTrigger::Mount);

        loop {
            tokio::select! {
                event = views.recv() => match event {
                    Some(ViewEvent::Focus) => {
                        self.reevaluate(GateTrigger::Focus);
                    }
                    Some(ViewEvent::Unmount) | None => break,
                },
                event = tab.recv(), if tab_open => {
                    tab_open = self.on_storage_event(event);
                }
                event = profile.recv(), if profile_open => {
                    profile_open = self.on_storage_event(event);
                }
                _ = poll.tick() => {
                    self.reevaluate(GateTrigger::Poll);
                }
            }
        }

        debug!(kind = ?self.kind, "gate watcher stopped");
    }

    /// Handle one store notification. Returns `false` once the store's event
    /// channel has closed.
    fn on_storage_event(&self, event: Result<StorageEvent, RecvError>) -> bool {
        match event {
            Ok(StorageEvent { key }) => {
                trace!(%key, "session store changed");
                self.reevaluate(GateTrigger::StorageChanged);
                true
            }
            Err(RecvError::Lagged(skipped)) => {
                trace!(skipped, "session store events lagged");
                self.reevaluate(GateTrigger::StorageChanged);
                true
            }
            Err(RecvError::Closed) => false,
        }
    }
}
