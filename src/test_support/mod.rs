//! Test doubles shared across the crate's unit tests.

use std::sync::{Arc, LazyLock, Mutex};

use serde_json::{json, Value};

use crate::tracker::{BufferedCall, MatomoLibrary, Tracker, TrackerResult};

/// Serializes tests that touch process environment variables.
pub static ENV_GUARD: LazyLock<Mutex<()>> = LazyLock::new(|| Mutex::new(()));

/// Tracker double that records every call in arrival order.
#[derive(Default, Clone)]
pub struct RecordingTracker {
    calls: Arc<Mutex<Vec<BufferedCall>>>,
}

impl RecordingTracker {
    pub fn calls(&self) -> Vec<BufferedCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_names(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|call| call.name.clone())
            .collect()
    }

    fn record(&self, name: &str, args: Vec<Value>) -> TrackerResult<()> {
        self.calls.lock().unwrap().push(BufferedCall::new(name, args));
        Ok(())
    }
}

impl Tracker for RecordingTracker {
    fn set_document_title(&self, title: &str) -> TrackerResult<()> {
        self.record("setDocumentTitle", vec![json!(title)])
    }

    fn set_custom_url(&self, url: &str) -> TrackerResult<()> {
        self.record("setCustomUrl", vec![json!(url)])
    }

    fn set_referrer_url(&self, url: &str) -> TrackerResult<()> {
        self.record("setReferrerUrl", vec![json!(url)])
    }

    fn track_page_view(&self, title: &str) -> TrackerResult<()> {
        self.record("trackPageView", vec![json!(title)])
    }

    fn set_consent_given(&self) -> TrackerResult<()> {
        self.record("setConsentGiven", vec![])
    }

    fn remember_consent_given(&self, expires_seconds: u32) -> TrackerResult<()> {
        self.record("rememberConsentGiven", vec![json!(expires_seconds)])
    }

    fn forget_consent_given(&self) -> TrackerResult<()> {
        self.record("forgetConsentGiven", vec![])
    }

    fn require_consent(&self) -> TrackerResult<()> {
        self.record("requireConsent", vec![])
    }

    fn disable_cookies(&self) -> TrackerResult<()> {
        self.record("disableCookies", vec![])
    }

    fn set_do_not_track(&self, enabled: bool) -> TrackerResult<()> {
        self.record("setDoNotTrack", vec![json!(enabled)])
    }
}

/// Library double handing out a shared [`RecordingTracker`].
#[derive(Default, Clone)]
pub struct RecordingLibrary {
    tracker: RecordingTracker,
    requests: Arc<Mutex<Vec<(String, u32)>>>,
}

impl RecordingLibrary {
    pub fn tracker(&self) -> RecordingTracker {
        self.tracker.clone()
    }

    pub fn requests(&self) -> Vec<(String, u32)> {
        self.requests.lock().unwrap().clone()
    }
}

impl MatomoLibrary for RecordingLibrary {
    fn get_tracker(&self, tracker_url: &str, site_id: u32) -> TrackerResult<Arc<dyn Tracker>> {
        self.requests
            .lock()
            .unwrap()
            .push((tracker_url.to_string(), site_id));
        Ok(Arc::new(self.tracker.clone()))
    }
}
