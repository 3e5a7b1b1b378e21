mod api;
pub mod error;
mod factory;
mod handle;
mod registry;

pub use api::{methods, BufferedCall, MatomoLibrary, Tracker};
pub use error::{TrackerError, TrackerErrorCode, TrackerResult};
pub use factory::create_tracker;
pub use handle::TrackerHandle;
pub use registry::{wait_until, GlobalLibraryRegistry, LibraryRegistry, POLL_INTERVAL};

use std::sync::LazyLock;

use crate::logger::Logger;

pub(crate) static LOGGER: LazyLock<Logger> = LazyLock::new(|| Logger::new("@matomo/tracker"));
