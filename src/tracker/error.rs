use std::fmt::{Display, Formatter};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TrackerErrorCode {
    InvalidConfig,
    InvalidArgument,
    LibraryUnavailable,
    UnsupportedCapability,
    UnknownMethod,
}

impl TrackerErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrackerErrorCode::InvalidConfig => "matomo/invalid-config",
            TrackerErrorCode::InvalidArgument => "matomo/invalid-argument",
            TrackerErrorCode::LibraryUnavailable => "matomo/library-unavailable",
            TrackerErrorCode::UnsupportedCapability => "matomo/unsupported-capability",
            TrackerErrorCode::UnknownMethod => "matomo/unknown-method",
        }
    }
}

#[derive(Clone, Debug)]
pub struct TrackerError {
    pub code: TrackerErrorCode,
    message: String,
}

impl TrackerError {
    pub fn new(code: TrackerErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn code_str(&self) -> &'static str {
        self.code.as_str()
    }
}

impl Display for TrackerError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.code_str())
    }
}

impl std::error::Error for TrackerError {}

pub type TrackerResult<T> = Result<T, TrackerError>;

pub fn invalid_config(message: impl Into<String>) -> TrackerError {
    TrackerError::new(TrackerErrorCode::InvalidConfig, message)
}

pub fn invalid_argument(message: impl Into<String>) -> TrackerError {
    TrackerError::new(TrackerErrorCode::InvalidArgument, message)
}

pub fn library_unavailable(message: impl Into<String>) -> TrackerError {
    TrackerError::new(TrackerErrorCode::LibraryUnavailable, message)
}

pub fn unsupported_capability(message: impl Into<String>) -> TrackerError {
    TrackerError::new(TrackerErrorCode::UnsupportedCapability, message)
}

pub fn unknown_method(name: &str) -> TrackerError {
    TrackerError::new(
        TrackerErrorCode::UnknownMethod,
        format!("tracker has no method named {name}"),
    )
}
