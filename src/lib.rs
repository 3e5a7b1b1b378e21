//! Matomo web-analytics integration for single-page-application routing.
//!
//! The crate wires a Matomo tracker into a client-side router: application
//! code obtains a [`tracker::TrackerHandle`] immediately and can call tracker
//! methods before the Matomo library has finished loading. Calls issued early
//! are buffered and replayed, in order, the moment the library is installed
//! into the [`tracker::LibraryRegistry`]; afterwards the handle is a plain
//! passthrough. [`router::RouteReporter`] reports a page view (title, URL,
//! referrer) after every completed route change, and [`plugin::setup`] ties
//! the pieces together the way the host shell would.

pub mod config;
pub mod logger;
pub mod platform;
pub mod plugin;
pub mod router;
pub mod tracker;

#[cfg(test)]
pub mod test_support;
