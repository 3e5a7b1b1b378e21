use std::sync::Arc;
use std::time::Duration;

use crate::platform::runtime;
use crate::router::{Router, RouteTransition, Unsubscribe, LOGGER};
use crate::tracker::TrackerHandle;

/// Reads the current document title. Looked up at report time, after the
/// track delay, because page code typically rewrites the title asynchronously
/// once a navigation completes.
pub type TitleSource = Arc<dyn Fn() -> String + Send + Sync>;

/// Page-level facts the host shell supplies: the site base URL and where to
/// read the document title from.
#[derive(Clone)]
pub struct PageContext {
    pub base_url: String,
    pub title: TitleSource,
}

impl PageContext {
    pub fn new(base_url: impl Into<String>, title: TitleSource) -> Self {
        Self {
            base_url: base_url.into(),
            title,
        }
    }
}

/// Reports a page view for every completed route change.
///
/// One subscription, installed once, live for the application's lifetime.
/// Reports go through the tracker handle, so route changes that happen before
/// the Matomo library loads are buffered like any other call.
#[derive(Clone)]
pub struct RouteReporter {
    inner: Arc<ReporterInner>,
}

struct ReporterInner {
    handle: TrackerHandle,
    base_url: String,
    track_delay: Duration,
    title: TitleSource,
}

impl RouteReporter {
    pub fn new(
        handle: TrackerHandle,
        base_url: impl Into<String>,
        track_delay: Duration,
        title: TitleSource,
    ) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            inner: Arc::new(ReporterInner {
                handle,
                base_url,
                track_delay,
                title,
            }),
        }
    }

    /// Subscribes to the router; each transition is reported after the
    /// configured delay.
    pub fn attach(&self, router: &Router) -> Unsubscribe {
        let inner = self.inner.clone();
        router.after_each(move |transition| {
            let inner = inner.clone();
            let transition = transition.clone();
            runtime::spawn_detached(async move {
                runtime::sleep(inner.track_delay).await;
                inner.report(&transition);
            });
        })
    }
}

impl ReporterInner {
    fn report(&self, transition: &RouteTransition) {
        let title = (self.title)();
        let url = format!("{}{}", self.base_url, transition.to.full_path);

        if let Err(err) = self.handle.set_document_title(&title) {
            LOGGER.debug(format!("failed to set document title: {err}"));
        }
        if let Err(err) = self.handle.set_custom_url(&url) {
            LOGGER.debug(format!("failed to set custom url: {err}"));
        }
        if let Some(from) = &transition.from {
            let referrer = format!("{}{}", self.base_url, from.full_path);
            if let Err(err) = self.handle.set_referrer_url(&referrer) {
                LOGGER.debug(format!("failed to set referrer url: {err}"));
            }
        }
        if let Err(err) = self.handle.track_page_view(&title) {
            LOGGER.debug(format!("failed to track page view: {err}"));
        }
    }
}
