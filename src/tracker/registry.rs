use std::sync::{Arc, LazyLock, Mutex};
use std::time::Duration;

use crate::platform::runtime;
use crate::tracker::api::MatomoLibrary;
use crate::tracker::LOGGER;

/// Poll interval used by [`wait_until`] in block-loading mode.
pub const POLL_INTERVAL: Duration = Duration::from_millis(10);

type InstallWatcher = Box<dyn FnOnce(&Arc<dyn MatomoLibrary>) + Send>;

/// The well-known binding the external Matomo script installs itself into.
///
/// This stands in for the `window.Piwik` global: absent until the script
/// finishes loading, then present for the life of the application. The first
/// [`LibraryRegistry::install`] wins and fires every registered watcher
/// exactly once, synchronously; later installs log a debug note and are
/// ignored, so the readiness transition can never fire twice.
#[derive(Default)]
pub struct LibraryRegistry {
    state: Mutex<RegistryState>,
}

#[derive(Default)]
struct RegistryState {
    library: Option<Arc<dyn MatomoLibrary>>,
    watchers: Vec<InstallWatcher>,
}

impl LibraryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn install(&self, library: Arc<dyn MatomoLibrary>) {
        let watchers = {
            let mut state = self.state.lock().unwrap();
            if state.library.is_some() {
                LOGGER.debug("matomo library is already installed");
                return;
            }
            state.library = Some(library.clone());
            std::mem::take(&mut state.watchers)
        };
        // Fired outside the lock so watchers may consult the registry.
        for watcher in watchers {
            watcher(&library);
        }
    }

    /// Runs `callback` once the library is installed; immediately when it
    /// already is.
    pub fn on_install<F>(&self, callback: F)
    where
        F: FnOnce(&Arc<dyn MatomoLibrary>) + Send + 'static,
    {
        let mut state = self.state.lock().unwrap();
        if let Some(library) = state.library.clone() {
            drop(state);
            callback(&library);
        } else {
            state.watchers.push(Box::new(callback));
        }
    }

    pub fn get(&self) -> Option<Arc<dyn MatomoLibrary>> {
        self.state.lock().unwrap().library.clone()
    }

    pub fn is_available(&self) -> bool {
        self.state.lock().unwrap().library.is_some()
    }

    #[cfg(test)]
    pub(crate) fn reset(&self) {
        *self.state.lock().unwrap() = RegistryState::default();
    }
}

/// Process-wide registry instance, shared the way the page-global would be.
#[derive(Clone)]
pub struct GlobalLibraryRegistry(Arc<LibraryRegistry>);

impl GlobalLibraryRegistry {
    pub fn shared() -> Self {
        static INSTANCE: LazyLock<Arc<LibraryRegistry>> =
            LazyLock::new(|| Arc::new(LibraryRegistry::new()));
        Self(INSTANCE.clone())
    }

    pub fn inner(&self) -> &Arc<LibraryRegistry> {
        &self.0
    }
}

/// Polls `condition` every `interval` until it holds or `timeout` elapses.
///
/// Returns whether the condition became true; a timeout completes normally
/// and leaves it to the caller to log the absence.
pub async fn wait_until<F>(condition: F, timeout: Duration, interval: Duration) -> bool
where
    F: Fn() -> bool,
{
    let interval = interval.max(Duration::from_millis(1));
    let mut waited = Duration::ZERO;
    while !condition() {
        if waited >= timeout {
            return false;
        }
        runtime::sleep(interval).await;
        waited += interval;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::RecordingLibrary;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn install_makes_library_available() {
        let registry = LibraryRegistry::new();
        assert!(!registry.is_available());
        registry.install(Arc::new(RecordingLibrary::default()));
        assert!(registry.is_available());
        assert!(registry.get().is_some());
    }

    #[test]
    fn first_install_wins() {
        let registry = LibraryRegistry::new();
        let first = RecordingLibrary::default();
        let second = RecordingLibrary::default();
        registry.install(Arc::new(first.clone()));
        registry.install(Arc::new(second.clone()));

        let library = registry.get().unwrap();
        library.get_tracker("https://example.com/piwik.php", 1).unwrap();
        assert_eq!(first.requests().len(), 1);
        assert!(second.requests().is_empty());
    }

    #[test]
    fn watcher_fires_exactly_once_across_repeated_installs() {
        let registry = LibraryRegistry::new();
        let fired = Arc::new(AtomicUsize::new(0));
        let fired_in_watcher = fired.clone();
        registry.on_install(move |_| {
            fired_in_watcher.fetch_add(1, Ordering::SeqCst);
        });

        registry.install(Arc::new(RecordingLibrary::default()));
        registry.install(Arc::new(RecordingLibrary::default()));
        registry.install(Arc::new(RecordingLibrary::default()));
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn watcher_fires_immediately_when_already_installed() {
        let registry = LibraryRegistry::new();
        registry.install(Arc::new(RecordingLibrary::default()));

        let fired = Arc::new(AtomicUsize::new(0));
        let fired_in_watcher = fired.clone();
        registry.on_install(move |_| {
            fired_in_watcher.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn watchers_may_consult_the_registry() {
        let registry = Arc::new(LibraryRegistry::new());
        let registry_in_watcher = registry.clone();
        let observed = Arc::new(AtomicUsize::new(0));
        let observed_in_watcher = observed.clone();
        registry.on_install(move |_| {
            if registry_in_watcher.is_available() {
                observed_in_watcher.fetch_add(1, Ordering::SeqCst);
            }
        });
        registry.install(Arc::new(RecordingLibrary::default()));
        assert_eq!(observed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn shared_registry_is_process_wide() {
        let first = GlobalLibraryRegistry::shared();
        let second = GlobalLibraryRegistry::shared();
        assert!(Arc::ptr_eq(first.inner(), second.inner()));

        first.inner().install(Arc::new(RecordingLibrary::default()));
        assert!(second.inner().is_available());
        first.inner().reset();
        assert!(!second.inner().is_available());
    }

    #[tokio::test(flavor = "current_thread")]
    async fn wait_until_resolves_when_condition_turns_true() {
        let registry = Arc::new(LibraryRegistry::new());
        let registry_for_task = registry.clone();
        runtime::spawn_detached(async move {
            runtime::sleep(Duration::from_millis(20)).await;
            registry_for_task.install(Arc::new(RecordingLibrary::default()));
        });

        let registry_for_poll = registry.clone();
        let available = wait_until(
            move || registry_for_poll.is_available(),
            Duration::from_secs(1),
            Duration::from_millis(5),
        )
        .await;
        assert!(available);
        assert!(registry.is_available());
    }

    #[tokio::test(flavor = "current_thread")]
    async fn wait_until_times_out_without_failing() {
        let available = wait_until(
            || false,
            Duration::from_millis(30),
            Duration::from_millis(5),
        )
        .await;
        assert!(!available);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn wait_until_accepts_zero_interval() {
        let available = wait_until(|| true, Duration::from_millis(10), Duration::ZERO).await;
        assert!(available);
    }
}
