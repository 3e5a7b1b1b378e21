mod reporter;

pub use reporter::{PageContext, RouteReporter, TitleSource};

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, LazyLock, Mutex};

use crate::logger::Logger;

pub(crate) static LOGGER: LazyLock<Logger> = LazyLock::new(|| Logger::new("@matomo/router"));

/// A resolved location, reduced to what page-view reporting needs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Location {
    pub full_path: String,
}

impl Location {
    pub fn new(full_path: impl Into<String>) -> Self {
        Self {
            full_path: full_path.into(),
        }
    }
}

/// A completed route change. `from` is absent on the initial load.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RouteTransition {
    pub to: Location,
    pub from: Option<Location>,
}

/// Removes a subscription when called. Dropping it without calling leaves the
/// subscription in place for the life of the router.
pub type Unsubscribe = Box<dyn FnOnce() + Send + 'static>;

type RouteCallback = Arc<dyn Fn(&RouteTransition) + Send + Sync + 'static>;

/// In-process stand-in for the host router at the navigation boundary.
///
/// [`Router::navigate`] completes a route change and notifies every
/// `after_each` subscriber with the `{to, from}` pair, initial load included.
#[derive(Clone, Default)]
pub struct Router {
    inner: Arc<RouterInner>,
}

#[derive(Default)]
struct RouterInner {
    next_id: AtomicU64,
    subscribers: Mutex<Vec<(u64, RouteCallback)>>,
    current: Mutex<Option<Location>>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn after_each<F>(&self, callback: F) -> Unsubscribe
    where
        F: Fn(&RouteTransition) + Send + Sync + 'static,
    {
        let id = self.inner.next_id.fetch_add(1, Ordering::SeqCst);
        self.inner
            .subscribers
            .lock()
            .unwrap()
            .push((id, Arc::new(callback)));

        let inner = Arc::downgrade(&self.inner);
        Box::new(move || {
            if let Some(inner) = inner.upgrade() {
                inner
                    .subscribers
                    .lock()
                    .unwrap()
                    .retain(|(subscriber_id, _)| *subscriber_id != id);
            }
        })
    }

    /// Completes a navigation to `to` and fires every subscriber.
    pub fn navigate(&self, to: Location) {
        let from = self.inner.current.lock().unwrap().replace(to.clone());
        let transition = RouteTransition { to, from };
        let subscribers: Vec<RouteCallback> = self
            .inner
            .subscribers
            .lock()
            .unwrap()
            .iter()
            .map(|(_, callback)| callback.clone())
            .collect();
        for callback in subscribers {
            callback(&transition);
        }
    }

    pub fn current(&self) -> Option<Location> {
        self.inner.current.lock().unwrap().clone()
    }
}
