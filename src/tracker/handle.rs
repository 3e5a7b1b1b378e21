use std::sync::{Arc, Mutex};

use serde_json::{json, Value};

use crate::tracker::api::{methods, BufferedCall, Tracker};
use crate::tracker::error::TrackerResult;
use crate::tracker::LOGGER;

/// The single tracker handle application code holds for the life of the app.
///
/// Clones share state: a handle created before the Matomo library loads starts
/// out buffering, and the same handle becomes a plain passthrough once
/// [`TrackerHandle::bind`] hands it the real tracker. Calls made while
/// buffering cannot observe a return value; that limitation is accepted, the
/// append itself always succeeds.
#[derive(Clone)]
pub struct TrackerHandle {
    inner: Arc<HandleInner>,
}

struct HandleInner {
    state: Mutex<HandleState>,
}

enum HandleState {
    /// Pre-readiness: calls are captured in arrival order.
    Buffering(Vec<BufferedCall>),
    /// Post-readiness: calls forward synchronously.
    Bound(Arc<dyn Tracker>),
    /// Buffering was disabled; pre-readiness calls are dropped.
    Inert,
}

impl TrackerHandle {
    pub fn buffering() -> Self {
        Self::with_state(HandleState::Buffering(Vec::new()))
    }

    pub fn inert() -> Self {
        Self::with_state(HandleState::Inert)
    }

    pub fn bound(tracker: Arc<dyn Tracker>) -> Self {
        Self::with_state(HandleState::Bound(tracker))
    }

    fn with_state(state: HandleState) -> Self {
        Self {
            inner: Arc::new(HandleInner {
                state: Mutex::new(state),
            }),
        }
    }

    /// Forwards `name(args)` to the real tracker, or captures it until one
    /// becomes available.
    pub fn dispatch(&self, name: &str, args: Vec<Value>) -> TrackerResult<()> {
        let mut state = self.inner.state.lock().unwrap();
        match &mut *state {
            HandleState::Bound(tracker) => tracker.invoke(name, &args),
            HandleState::Buffering(buffer) => {
                LOGGER.debug(format!("delaying call to tracker: {name}"));
                buffer.push(BufferedCall::new(name, args));
                Ok(())
            }
            HandleState::Inert => Ok(()),
        }
    }

    /// One-shot hand-off to the real tracker.
    ///
    /// The state lock is held across the drain and the flip, so buffered calls
    /// reach the tracker in exact arrival order, each exactly once, strictly
    /// before any call dispatched after `bind` returns. The tracker must not
    /// call back into this handle. A second bind keeps the first tracker.
    pub fn bind(&self, tracker: Arc<dyn Tracker>) {
        let mut state = self.inner.state.lock().unwrap();
        match std::mem::replace(&mut *state, HandleState::Inert) {
            HandleState::Buffering(buffer) => {
                for call in buffer {
                    match tracker.invoke(&call.name, &call.args) {
                        Ok(()) => LOGGER.debug(format!("calling delayed {} on tracker", call.name)),
                        Err(err) => {
                            LOGGER.debug(format!("skipping delayed {}: {err}", call.name))
                        }
                    }
                }
                *state = HandleState::Bound(tracker);
            }
            HandleState::Inert => *state = HandleState::Bound(tracker),
            HandleState::Bound(existing) => {
                LOGGER.debug("tracker is already bound");
                *state = HandleState::Bound(existing);
            }
        }
    }

    pub fn is_bound(&self) -> bool {
        matches!(*self.inner.state.lock().unwrap(), HandleState::Bound(_))
    }

    /// Number of captured calls still waiting for the real tracker.
    pub fn buffered_len(&self) -> usize {
        match &*self.inner.state.lock().unwrap() {
            HandleState::Buffering(buffer) => buffer.len(),
            _ => 0,
        }
    }

    pub fn set_document_title(&self, title: &str) -> TrackerResult<()> {
        self.dispatch(methods::SET_DOCUMENT_TITLE, vec![json!(title)])
    }

    pub fn set_custom_url(&self, url: &str) -> TrackerResult<()> {
        self.dispatch(methods::SET_CUSTOM_URL, vec![json!(url)])
    }

    pub fn set_referrer_url(&self, url: &str) -> TrackerResult<()> {
        self.dispatch(methods::SET_REFERRER_URL, vec![json!(url)])
    }

    pub fn track_page_view(&self, title: &str) -> TrackerResult<()> {
        self.dispatch(methods::TRACK_PAGE_VIEW, vec![json!(title)])
    }

    pub fn set_consent(&self, granted: bool) -> TrackerResult<()> {
        self.dispatch(methods::SET_CONSENT, vec![json!(granted)])
    }

    pub fn set_consent_given(&self) -> TrackerResult<()> {
        self.dispatch(methods::SET_CONSENT_GIVEN, vec![])
    }

    pub fn remember_consent_given(&self, expires_seconds: u32) -> TrackerResult<()> {
        self.dispatch(methods::REMEMBER_CONSENT_GIVEN, vec![json!(expires_seconds)])
    }

    pub fn forget_consent_given(&self) -> TrackerResult<()> {
        self.dispatch(methods::FORGET_CONSENT_GIVEN, vec![])
    }

    pub fn require_consent(&self) -> TrackerResult<()> {
        self.dispatch(methods::REQUIRE_CONSENT, vec![])
    }

    pub fn disable_cookies(&self) -> TrackerResult<()> {
        self.dispatch(methods::DISABLE_COOKIES, vec![])
    }

    pub fn set_do_not_track(&self, enabled: bool) -> TrackerResult<()> {
        self.dispatch(methods::SET_DO_NOT_TRACK, vec![json!(enabled)])
    }
}
