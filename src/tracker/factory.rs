use std::sync::Arc;

use serde_json::Value;

use crate::config::ResolvedOptions;
use crate::tracker::api::{methods, BufferedCall, Tracker};
use crate::tracker::error::{library_unavailable, TrackerResult};
use crate::tracker::registry::LibraryRegistry;
use crate::tracker::LOGGER;

/// Builds and configures a real tracker from the installed Matomo library.
///
/// Augmentation happens in a fixed order: the consent convenience wrapper,
/// the verbose-logging wrapper when enabled, then the static cookie/consent/
/// do-not-track policies, and finally a FIFO drain of `buffered`. A buffered
/// call whose method the tracker does not know is skipped; the rest of the
/// drain proceeds.
pub fn create_tracker(
    options: &ResolvedOptions,
    registry: &LibraryRegistry,
    buffered: Vec<BufferedCall>,
) -> TrackerResult<Arc<dyn Tracker>> {
    // Callers only reach this after readiness; check anyway.
    let library = registry.get().ok_or_else(|| {
        LOGGER.debug("matomo library not installed, unable to create a tracker");
        library_unavailable("matomo library is not installed")
    })?;

    let tracker = library.get_tracker(&options.tracker_url, options.site_id)?;
    let tracker: Arc<dyn Tracker> = Arc::new(ConfiguredTracker {
        inner: tracker,
        consent_expires: options.consent_expires,
    });
    let tracker: Arc<dyn Tracker> = if options.verbose {
        Arc::new(VerboseTracker { inner: tracker })
    } else {
        tracker
    };

    LOGGER.debug(format!(
        "created tracker for site {} to {}",
        options.site_id, options.tracker_url
    ));

    if !options.cookies {
        tracker.disable_cookies()?;
    }
    if options.consent_required {
        tracker.require_consent()?;
    }
    if options.do_not_track {
        tracker.set_do_not_track(true)?;
    }

    for call in buffered {
        match tracker.invoke(&call.name, &call.args) {
            Ok(()) => LOGGER.debug(format!("calling delayed {} on tracker", call.name)),
            Err(err) => LOGGER.debug(format!("skipping delayed {}: {err}", call.name)),
        }
    }

    Ok(tracker)
}

/// Adds the `setConsent` convenience on top of the raw tracker: grant maps to
/// session or remembered consent depending on the configured expiry, revoke
/// forgets it.
struct ConfiguredTracker {
    inner: Arc<dyn Tracker>,
    consent_expires: u32,
}

impl ConfiguredTracker {
    fn set_consent(&self, granted: bool) -> TrackerResult<()> {
        if granted {
            if self.consent_expires > 0 {
                self.inner.remember_consent_given(self.consent_expires)
            } else {
                self.inner.set_consent_given()
            }
        } else {
            self.inner.forget_consent_given()
        }
    }
}

impl Tracker for ConfiguredTracker {
    fn set_document_title(&self, title: &str) -> TrackerResult<()> {
        self.inner.set_document_title(title)
    }

    fn set_custom_url(&self, url: &str) -> TrackerResult<()> {
        self.inner.set_custom_url(url)
    }

    fn set_referrer_url(&self, url: &str) -> TrackerResult<()> {
        self.inner.set_referrer_url(url)
    }

    fn track_page_view(&self, title: &str) -> TrackerResult<()> {
        self.inner.track_page_view(title)
    }

    fn set_consent_given(&self) -> TrackerResult<()> {
        self.inner.set_consent_given()
    }

    fn remember_consent_given(&self, expires_seconds: u32) -> TrackerResult<()> {
        self.inner.remember_consent_given(expires_seconds)
    }

    fn forget_consent_given(&self) -> TrackerResult<()> {
        self.inner.forget_consent_given()
    }

    fn require_consent(&self) -> TrackerResult<()> {
        self.inner.require_consent()
    }

    fn disable_cookies(&self) -> TrackerResult<()> {
        self.inner.disable_cookies()
    }

    fn set_do_not_track(&self, enabled: bool) -> TrackerResult<()> {
        self.inner.set_do_not_track(enabled)
    }

    fn invoke(&self, name: &str, args: &[Value]) -> TrackerResult<()> {
        if name == methods::SET_CONSENT {
            // An omitted or non-boolean value grants, mirroring the original
            // `setConsent()` call convention.
            let granted = args.first().and_then(Value::as_bool).unwrap_or(true);
            self.set_consent(granted)
        } else {
            self.inner.invoke(name, args)
        }
    }
}

/// Logs every call (method name plus JSON-rendered arguments) before
/// delegating; arguments and results pass through untouched.
struct VerboseTracker {
    inner: Arc<dyn Tracker>,
}

impl VerboseTracker {
    fn log_call(&self, name: &str, args: &[Value]) {
        let rendered = serde_json::to_string(args).unwrap_or_else(|_| "[]".to_string());
        LOGGER.debug(format!("calling tracker.{name} with args {rendered}"));
    }
}

impl Tracker for VerboseTracker {
    fn set_document_title(&self, title: &str) -> TrackerResult<()> {
        self.log_call(methods::SET_DOCUMENT_TITLE, &[Value::from(title)]);
        self.inner.set_document_title(title)
    }

    fn set_custom_url(&self, url: &str) -> TrackerResult<()> {
        self.log_call(methods::SET_CUSTOM_URL, &[Value::from(url)]);
        self.inner.set_custom_url(url)
    }

    fn set_referrer_url(&self, url: &str) -> TrackerResult<()> {
        self.log_call(methods::SET_REFERRER_URL, &[Value::from(url)]);
        self.inner.set_referrer_url(url)
    }

    fn track_page_view(&self, title: &str) -> TrackerResult<()> {
        self.log_call(methods::TRACK_PAGE_VIEW, &[Value::from(title)]);
        self.inner.track_page_view(title)
    }

    fn set_consent_given(&self) -> TrackerResult<()> {
        self.log_call(methods::SET_CONSENT_GIVEN, &[]);
        self.inner.set_consent_given()
    }

    fn remember_consent_given(&self, expires_seconds: u32) -> TrackerResult<()> {
        self.log_call(methods::REMEMBER_CONSENT_GIVEN, &[Value::from(expires_seconds)]);
        self.inner.remember_consent_given(expires_seconds)
    }

    fn forget_consent_given(&self) -> TrackerResult<()> {
        self.log_call(methods::FORGET_CONSENT_GIVEN, &[]);
        self.inner.forget_consent_given()
    }

    fn require_consent(&self) -> TrackerResult<()> {
        self.log_call(methods::REQUIRE_CONSENT, &[]);
        self.inner.require_consent()
    }

    fn disable_cookies(&self) -> TrackerResult<()> {
        self.log_call(methods::DISABLE_COOKIES, &[]);
        self.inner.disable_cookies()
    }

    fn set_do_not_track(&self, enabled: bool) -> TrackerResult<()> {
        self.log_call(methods::SET_DO_NOT_TRACK, &[Value::from(enabled)]);
        self.inner.set_do_not_track(enabled)
    }

    fn invoke(&self, name: &str, args: &[Value]) -> TrackerResult<()> {
        self.log_call(name, args);
        self.inner.invoke(name, args)
    }
}
