use std::sync::Arc;

use serde_json::Value;

use crate::tracker::error::{invalid_argument, unknown_method, TrackerResult};

/// Matomo API method names, as the tracker object exposes them on the wire.
pub mod methods {
    pub const SET_DOCUMENT_TITLE: &str = "setDocumentTitle";
    pub const SET_CUSTOM_URL: &str = "setCustomUrl";
    pub const SET_REFERRER_URL: &str = "setReferrerUrl";
    pub const TRACK_PAGE_VIEW: &str = "trackPageView";
    pub const SET_CONSENT_GIVEN: &str = "setConsentGiven";
    pub const REMEMBER_CONSENT_GIVEN: &str = "rememberConsentGiven";
    pub const FORGET_CONSENT_GIVEN: &str = "forgetConsentGiven";
    pub const REQUIRE_CONSENT: &str = "requireConsent";
    pub const DISABLE_COOKIES: &str = "disableCookies";
    pub const SET_DO_NOT_TRACK: &str = "setDoNotTrack";
    /// Convenience method added by the factory, not part of the Matomo API.
    pub const SET_CONSENT: &str = "setConsent";
}

/// The call surface of a live Matomo tracker.
///
/// There is no generic interception primitive to lean on here, so the method
/// set is enumerated and [`Tracker::invoke`] routes by-name calls (buffered
/// replays in particular) onto the typed surface. Names outside the set fail
/// with `matomo/unknown-method`.
pub trait Tracker: Send + Sync {
    fn set_document_title(&self, title: &str) -> TrackerResult<()>;
    fn set_custom_url(&self, url: &str) -> TrackerResult<()>;
    fn set_referrer_url(&self, url: &str) -> TrackerResult<()>;
    fn track_page_view(&self, title: &str) -> TrackerResult<()>;
    fn set_consent_given(&self) -> TrackerResult<()>;
    fn remember_consent_given(&self, expires_seconds: u32) -> TrackerResult<()>;
    fn forget_consent_given(&self) -> TrackerResult<()>;
    fn require_consent(&self) -> TrackerResult<()>;
    fn disable_cookies(&self) -> TrackerResult<()>;
    fn set_do_not_track(&self, enabled: bool) -> TrackerResult<()>;

    /// Dispatches a captured `(name, args)` call onto the typed surface.
    fn invoke(&self, name: &str, args: &[Value]) -> TrackerResult<()> {
        match name {
            methods::SET_DOCUMENT_TITLE => self.set_document_title(str_arg(name, args, 0)?),
            methods::SET_CUSTOM_URL => self.set_custom_url(str_arg(name, args, 0)?),
            methods::SET_REFERRER_URL => self.set_referrer_url(str_arg(name, args, 0)?),
            methods::TRACK_PAGE_VIEW => self.track_page_view(str_arg(name, args, 0)?),
            methods::SET_CONSENT_GIVEN => self.set_consent_given(),
            methods::REMEMBER_CONSENT_GIVEN => {
                self.remember_consent_given(u32_arg(name, args, 0)?)
            }
            methods::FORGET_CONSENT_GIVEN => self.forget_consent_given(),
            methods::REQUIRE_CONSENT => self.require_consent(),
            methods::DISABLE_COOKIES => self.disable_cookies(),
            methods::SET_DO_NOT_TRACK => self.set_do_not_track(bool_arg(name, args, 0)?),
            other => Err(unknown_method(other)),
        }
    }
}

impl std::fmt::Debug for dyn Tracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tracker").finish_non_exhaustive()
    }
}

fn str_arg<'a>(name: &str, args: &'a [Value], index: usize) -> TrackerResult<&'a str> {
    args.get(index).and_then(Value::as_str).ok_or_else(|| {
        invalid_argument(format!("{name}: expected a string as argument {index}"))
    })
}

fn u32_arg(name: &str, args: &[Value], index: usize) -> TrackerResult<u32> {
    args.get(index)
        .and_then(Value::as_u64)
        .and_then(|v| u32::try_from(v).ok())
        .ok_or_else(|| invalid_argument(format!("{name}: expected a number as argument {index}")))
}

fn bool_arg(name: &str, args: &[Value], index: usize) -> TrackerResult<bool> {
    args.get(index).and_then(Value::as_bool).ok_or_else(|| {
        invalid_argument(format!("{name}: expected a boolean as argument {index}"))
    })
}

/// Boundary to the external Matomo library once it has loaded.
pub trait MatomoLibrary: Send + Sync {
    fn get_tracker(&self, tracker_url: &str, site_id: u32) -> TrackerResult<Arc<dyn Tracker>>;
}

/// A method call captured while no real tracker existed yet.
///
/// Appended in arrival order, consumed exactly once when the real tracker
/// becomes available, never reused afterwards.
#[derive(Clone, Debug, PartialEq)]
pub struct BufferedCall {
    pub name: String,
    pub args: Vec<Value>,
}

impl BufferedCall {
    pub fn new(name: impl Into<String>, args: Vec<Value>) -> Self {
        Self {
            name: name.into(),
            args,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::RecordingTracker;
    use crate::tracker::error::TrackerErrorCode;
    use serde_json::json;

    #[test]
    fn invoke_routes_to_typed_methods() {
        let tracker = RecordingTracker::default();
        tracker
            .invoke(methods::SET_DOCUMENT_TITLE, &[json!("Home")])
            .unwrap();
        tracker
            .invoke(methods::REMEMBER_CONSENT_GIVEN, &[json!(3600)])
            .unwrap();
        tracker
            .invoke(methods::SET_DO_NOT_TRACK, &[json!(true)])
            .unwrap();
        tracker.invoke(methods::TRACK_PAGE_VIEW, &[json!("Home")]).unwrap();

        assert_eq!(
            tracker.calls(),
            vec![
                BufferedCall::new(methods::SET_DOCUMENT_TITLE, vec![json!("Home")]),
                BufferedCall::new(methods::REMEMBER_CONSENT_GIVEN, vec![json!(3600)]),
                BufferedCall::new(methods::SET_DO_NOT_TRACK, vec![json!(true)]),
                BufferedCall::new(methods::TRACK_PAGE_VIEW, vec![json!("Home")]),
            ]
        );
    }

    #[test]
    fn invoke_rejects_unknown_names() {
        let tracker = RecordingTracker::default();
        let err = tracker.invoke("enableHeartBeatTimer", &[]).unwrap_err();
        assert_eq!(err.code, TrackerErrorCode::UnknownMethod);
        assert!(tracker.calls().is_empty());
    }

    #[test]
    fn invoke_rejects_malformed_arguments() {
        let tracker = RecordingTracker::default();
        let err = tracker
            .invoke(methods::SET_CUSTOM_URL, &[json!(42)])
            .unwrap_err();
        assert_eq!(err.code, TrackerErrorCode::InvalidArgument);

        let err = tracker
            .invoke(methods::REMEMBER_CONSENT_GIVEN, &[])
            .unwrap_err();
        assert_eq!(err.code, TrackerErrorCode::InvalidArgument);
        assert!(tracker.calls().is_empty());
    }
}
