use std::sync::{Arc, LazyLock};

use crate::config::TrackerOptions;
use crate::logger::Logger;
use crate::platform::runtime;
use crate::router::{PageContext, RouteReporter, Router, Unsubscribe};
use crate::tracker::error::unsupported_capability;
use crate::tracker::{
    create_tracker, wait_until, LibraryRegistry, TrackerHandle, TrackerResult, POLL_INTERVAL,
};

pub(crate) static LOGGER: LazyLock<Logger> = LazyLock::new(|| Logger::new("@matomo/plugin"));

/// The installed integration: the tracker handle injected into the
/// application plus the live route subscription.
pub struct MatomoPlugin {
    handle: TrackerHandle,
    subscription: Option<Unsubscribe>,
}

impl std::fmt::Debug for MatomoPlugin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MatomoPlugin").finish_non_exhaustive()
    }
}

impl MatomoPlugin {
    /// The handle application code calls tracker methods on.
    pub fn tracker(&self) -> &TrackerHandle {
        &self.handle
    }

    /// Stops route-change reporting. Not used in normal operation; the
    /// subscription otherwise lives as long as the application.
    pub fn detach(mut self) {
        if let Some(unsubscribe) = self.subscription.take() {
            unsubscribe();
        }
    }
}

/// Wires tracking into the application, mirroring what the host shell runs at
/// startup.
///
/// Returns `Ok(None)` when tracking stays off: development builds without
/// `debug`, or block-loading setups where the library never arrived. In the
/// non-blocking path the returned handle buffers calls until the library is
/// installed into `registry`; the install watcher then builds the real
/// tracker and hands it over.
pub async fn setup(
    options: TrackerOptions,
    registry: Arc<LibraryRegistry>,
    router: &Router,
    page: PageContext,
) -> TrackerResult<Option<MatomoPlugin>> {
    if !options.tracking_enabled() {
        LOGGER.debug("tracking disabled in this development build");
        return Ok(None);
    }
    let options = options.resolve()?;

    let handle = if options.block_loading {
        let registry_for_poll = registry.clone();
        let available = wait_until(
            move || registry_for_poll.is_available(),
            options.ready_timeout,
            POLL_INTERVAL,
        )
        .await;
        if !available {
            if options.debug {
                LOGGER.warn("matomo library was not installed within the readiness timeout");
            }
            return Ok(None);
        }
        TrackerHandle::bound(create_tracker(&options, &registry, Vec::new())?)
    } else if registry.is_available() {
        TrackerHandle::bound(create_tracker(&options, &registry, Vec::new())?)
    } else {
        let handle = if options.add_no_proxy_workaround {
            TrackerHandle::buffering()
        } else {
            let err = unsupported_capability(
                "call buffering disabled; calls made before the library loads are lost",
            );
            LOGGER.debug(err.to_string());
            TrackerHandle::inert()
        };

        let watcher_handle = handle.clone();
        let watcher_options = options.clone();
        let watcher_registry = registry.clone();
        registry.on_install(move |_library| {
            match create_tracker(&watcher_options, &watcher_registry, Vec::new()) {
                Ok(tracker) => watcher_handle.bind(tracker),
                Err(err) => LOGGER.debug(format!("unable to create tracker: {err}")),
            }
        });

        // The watchdog only reports absence; a late install is still picked
        // up by the watcher above.
        let watchdog_registry = registry.clone();
        let ready_timeout = options.ready_timeout;
        let debug = options.debug;
        runtime::spawn_detached(async move {
            runtime::sleep(ready_timeout).await;
            if !watchdog_registry.is_available() {
                if debug {
                    LOGGER.warn("matomo library was not installed within the readiness timeout");
                } else {
                    LOGGER.debug("matomo library was not installed within the readiness timeout");
                }
            }
        });

        handle
    };

    let reporter = RouteReporter::new(
        handle.clone(),
        page.base_url.clone(),
        options.track_delay,
        page.title.clone(),
    );
    let subscription = reporter.attach(router);

    Ok(Some(MatomoPlugin {
        handle,
        subscription: Some(subscription),
    }))
}
