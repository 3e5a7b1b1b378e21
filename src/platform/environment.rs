use std::env;

fn forced_environment() -> Option<String> {
    env::var("MATOMO_FORCE_ENVIRONMENT").ok()
}

/// True when the host shell runs a development build.
///
/// Browsers have no process environment; the host signals the build kind
/// through `MATOMO_FORCE_ENVIRONMENT`. Absent any signal we assume a
/// production-like deployment.
pub fn is_development() -> bool {
    matches!(forced_environment().as_deref(), Some("development"))
}

/// True when the surrounding toolchain marked this a production build.
pub fn is_production_build() -> bool {
    env::var("NODE_ENV").map(|v| v == "production").unwrap_or(false)
}
