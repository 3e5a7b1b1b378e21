//! Timer and task plumbing behind the delayed route reports and the
//! readiness polling loop.

use std::future::Future;
use std::time::Duration;

/// Runs `future` to completion in the background without awaiting it.
///
/// The crate's spawn sites are synchronous (`Router::navigate` fires the
/// reporter's delayed task, `plugin::setup` starts the readiness watchdog), so
/// the task is handed to the ambient tokio runtime when one exists and to a
/// shared timer thread otherwise.
#[cfg(not(target_arch = "wasm32"))]
pub fn spawn_detached<F>(future: F)
where
    F: Future<Output = ()> + Send + 'static,
{
    use std::sync::LazyLock;
    use tokio::runtime::{Builder, Handle};

    static TIMER_THREAD: LazyLock<Handle> = LazyLock::new(|| {
        let runtime = Builder::new_current_thread()
            .enable_time()
            .build()
            .expect("tokio runtime for detached tracker tasks");
        let handle = runtime.handle().clone();
        std::thread::Builder::new()
            .name("matomo-timers".into())
            .spawn(move || runtime.block_on(std::future::pending::<()>()))
            .expect("spawning the matomo timer thread");
        handle
    });

    match Handle::try_current() {
        Ok(handle) => {
            handle.spawn(future);
        }
        Err(_) => {
            TIMER_THREAD.spawn(future);
        }
    }
}

#[cfg(target_arch = "wasm32")]
pub fn spawn_detached<F>(future: F)
where
    F: Future<Output = ()> + 'static,
{
    wasm_bindgen_futures::spawn_local(future);
}

/// Waits for `duration`; the timer behind the track delay and the readiness
/// poll interval.
pub async fn sleep(duration: Duration) {
    #[cfg(not(target_arch = "wasm32"))]
    tokio::time::sleep(duration).await;

    #[cfg(target_arch = "wasm32")]
    gloo_timers::future::sleep(duration).await;
}
