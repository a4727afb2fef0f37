use thiserror::Error;

/// Setup-time failures. All of these surface before the clock starts.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid parameter for {variable}: {reason}")]
    InvalidParameter {
        variable: &'static str,
        reason: String,
    },

    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error("unknown component kind: {0}")]
    UnknownKind(String),

    #[error("malformed configuration: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Wire header failures. Receivers discard the fragment and count it.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum HeaderError {
    #[error("header truncated: need {needed} bytes, have {available}")]
    Truncated { needed: usize, available: usize },

    #[error("{field} index {value} exceeds the 16-bit field")]
    FieldOverflow { field: &'static str, value: u32 },
}

pub(crate) fn check_param(
    variable: &'static str,
    ok: bool,
    reason: impl FnOnce() -> String,
) -> Result<(), ConfigError> {
    if ok {
        Ok(())
    } else {
        Err(ConfigError::InvalidParameter {
            variable,
            reason: reason(),
        })
    }
}
