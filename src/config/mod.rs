use std::time::Duration;

use serde::Deserialize;
use url::Url;

use crate::platform::environment;
use crate::tracker::error::{invalid_config, TrackerResult};

/// Path of the tracking endpoint relative to the Matomo base URL.
pub const TRACKER_ENDPOINT_SUFFIX: &str = "piwik.php";
/// Path of the tracker script relative to the Matomo base URL.
pub const SCRIPT_SUFFIX: &str = "piwik.js";
/// Delay between a completed route change and the page-view report.
pub const DEFAULT_TRACK_DELAY_MS: u64 = 350;
/// How long to wait for the Matomo library before reporting its absence.
pub const DEFAULT_READY_TIMEOUT_MS: u64 = 10_000;

/// Raw options bag, typically deserialized from the host shell's runtime
/// config. Resolved into [`ResolvedOptions`] exactly once at startup.
#[derive(Clone, Debug, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TrackerOptions {
    pub site_id: u32,
    pub matomo_url: String,
    pub tracker_url: String,
    pub script_url: String,
    pub track_delay: u64,
    pub ready_timeout: u64,
    pub debug: bool,
    pub verbose: bool,
    pub cookies: bool,
    pub consent_required: bool,
    pub consent_expires: u32,
    pub do_not_track: bool,
    pub block_loading: bool,
    pub add_no_proxy_workaround: bool,
}

impl Default for TrackerOptions {
    fn default() -> Self {
        Self {
            site_id: 0,
            matomo_url: String::new(),
            tracker_url: String::new(),
            script_url: String::new(),
            track_delay: DEFAULT_TRACK_DELAY_MS,
            ready_timeout: DEFAULT_READY_TIMEOUT_MS,
            debug: false,
            verbose: false,
            cookies: true,
            consent_required: false,
            consent_expires: 0,
            do_not_track: false,
            block_loading: false,
            add_no_proxy_workaround: true,
        }
    }
}

impl TrackerOptions {
    /// Whether tracking should run at all. Development builds stay silent
    /// unless `debug` is set or the toolchain marked a production build.
    pub fn tracking_enabled(&self) -> bool {
        !environment::is_development() || self.debug || environment::is_production_build()
    }

    /// Fills the derived URLs and validates the result.
    pub fn resolve(self) -> TrackerResult<ResolvedOptions> {
        if self.site_id == 0 {
            return Err(invalid_config("siteId is required"));
        }

        let tracker_url = if self.tracker_url.is_empty() {
            format!("{}{}", self.matomo_url, TRACKER_ENDPOINT_SUFFIX)
        } else {
            self.tracker_url
        };
        // An explicit trackerUrl works without a base URL; the script URL then
        // stays empty and the host shell loads the library on its own.
        let script_url = if self.script_url.is_empty() && !self.matomo_url.is_empty() {
            format!("{}{}", self.matomo_url, SCRIPT_SUFFIX)
        } else {
            self.script_url
        };

        Url::parse(&tracker_url)
            .map_err(|err| invalid_config(format!("invalid tracker url \"{tracker_url}\": {err}")))?;
        if !script_url.is_empty() {
            Url::parse(&script_url).map_err(|err| {
                invalid_config(format!("invalid script url \"{script_url}\": {err}"))
            })?;
        }

        Ok(ResolvedOptions {
            site_id: self.site_id,
            tracker_url,
            script_url,
            track_delay: Duration::from_millis(self.track_delay),
            ready_timeout: Duration::from_millis(self.ready_timeout),
            debug: self.debug,
            verbose: self.verbose,
            cookies: self.cookies,
            consent_required: self.consent_required,
            consent_expires: self.consent_expires,
            do_not_track: self.do_not_track,
            block_loading: self.block_loading,
            add_no_proxy_workaround: self.add_no_proxy_workaround,
        })
    }
}

/// Validated configuration, immutable for the life of the application.
#[derive(Clone, Debug)]
pub struct ResolvedOptions {
    pub site_id: u32,
    pub tracker_url: String,
    pub script_url: String,
    pub track_delay: Duration,
    pub ready_timeout: Duration,
    pub debug: bool,
    pub verbose: bool,
    pub cookies: bool,
    pub consent_required: bool,
    pub consent_expires: u32,
    pub do_not_track: bool,
    pub block_loading: bool,
    pub add_no_proxy_workaround: bool,
}

impl ResolvedOptions {
    /// The script tag the host shell must inject to load the Matomo library,
    /// or `None` when no script URL is configured and the host loads it
    /// itself.
    pub fn script_source(&self) -> Option<ScriptTag> {
        if self.script_url.is_empty() {
            return None;
        }
        Some(ScriptTag {
            src: self.script_url.clone(),
            defer: true,
            async_load: true,
        })
    }
}

/// Description of the `<script>` element loading the tracker library.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScriptTag {
    pub src: String,
    pub defer: bool,
    pub async_load: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::ENV_GUARD;
    use std::env;

    fn base_options() -> TrackerOptions {
        TrackerOptions {
            site_id: 3,
            matomo_url: "https://stats.example.com/".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn defaults_match_documented_values() {
        let opts = TrackerOptions::default();
        assert_eq!(opts.track_delay, 350);
        assert_eq!(opts.ready_timeout, 10_000);
        assert!(opts.cookies);
        assert!(!opts.consent_required);
        assert_eq!(opts.consent_expires, 0);
        assert!(!opts.do_not_track);
        assert!(!opts.block_loading);
        assert!(opts.add_no_proxy_workaround);
    }

    #[test]
    fn derives_tracker_and_script_urls_from_base() {
        let resolved = base_options().resolve().unwrap();
        assert_eq!(resolved.tracker_url, "https://stats.example.com/piwik.php");
        assert_eq!(resolved.script_url, "https://stats.example.com/piwik.js");
    }

    #[test]
    fn explicit_urls_are_preserved() {
        let mut opts = base_options();
        opts.tracker_url = "https://collect.example.com/matomo.php".to_string();
        opts.script_url = "https://cdn.example.com/matomo.js".to_string();
        let resolved = opts.resolve().unwrap();
        assert_eq!(resolved.tracker_url, "https://collect.example.com/matomo.php");
        assert_eq!(resolved.script_url, "https://cdn.example.com/matomo.js");
    }

    #[test]
    fn explicit_tracker_url_needs_no_base_url() {
        let opts = TrackerOptions {
            site_id: 3,
            tracker_url: "https://collect.example.com/matomo.php".to_string(),
            ..Default::default()
        };
        let resolved = opts.resolve().unwrap();
        assert_eq!(resolved.tracker_url, "https://collect.example.com/matomo.php");
        assert_eq!(resolved.script_url, "");
        assert_eq!(resolved.script_source(), None);
    }

    #[test]
    fn missing_site_id_is_rejected() {
        let opts = TrackerOptions {
            matomo_url: "https://stats.example.com/".to_string(),
            ..Default::default()
        };
        let err = opts.resolve().unwrap_err();
        assert_eq!(err.code_str(), "matomo/invalid-config");
    }

    #[test]
    fn unparseable_url_is_rejected() {
        let opts = TrackerOptions {
            site_id: 3,
            ..Default::default()
        };
        let err = opts.resolve().unwrap_err();
        assert_eq!(err.code_str(), "matomo/invalid-config");
    }

    #[test]
    fn deserializes_camel_case_runtime_config() {
        let opts: TrackerOptions = serde_json::from_str(
            r#"{
                "siteId": 12,
                "matomoUrl": "https://stats.example.com/",
                "consentExpires": 3600,
                "doNotTrack": true,
                "readyTimeout": 5000,
                "blockLoading": false
            }"#,
        )
        .unwrap();
        assert_eq!(opts.site_id, 12);
        assert_eq!(opts.consent_expires, 3600);
        assert_eq!(opts.ready_timeout, 5000);
        assert!(opts.do_not_track);
        assert!(opts.cookies);
        assert_eq!(opts.track_delay, 350);
    }

    #[test]
    fn script_source_describes_deferred_async_tag() {
        let resolved = base_options().resolve().unwrap();
        assert_eq!(
            resolved.script_source(),
            Some(ScriptTag {
                src: "https://stats.example.com/piwik.js".to_string(),
                defer: true,
                async_load: true,
            })
        );
    }

    #[test]
    fn tracking_disabled_in_development_unless_debug_or_production() {
        let _guard = ENV_GUARD.lock().unwrap();
        unsafe { env::set_var("MATOMO_FORCE_ENVIRONMENT", "development") };
        unsafe { env::remove_var("NODE_ENV") };

        let opts = base_options();
        assert!(!opts.tracking_enabled());

        let mut debug_opts = base_options();
        debug_opts.debug = true;
        assert!(debug_opts.tracking_enabled());

        unsafe { env::set_var("NODE_ENV", "production") };
        assert!(opts.tracking_enabled());

        unsafe { env::remove_var("NODE_ENV") };
        unsafe { env::remove_var("MATOMO_FORCE_ENVIRONMENT") };
        assert!(opts.tracking_enabled());
    }
}
