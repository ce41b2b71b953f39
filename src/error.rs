use anyhow::Error as AnyhowError;
use thiserror::Error;

/// Result alias for errors emitted by the analysis and its driver.
pub type SafeBuffersResult<T> = Result<T, SafeBuffersError>;

/// Structured error type for the analysis subsystems.
#[derive(Debug, Error)]
pub enum SafeBuffersError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed syntax tree export: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid configuration: {0}")]
    Config(String),

    /// The caller handed the analysis something it cannot analyze.
    #[error("precondition violated: {0}")]
    Precondition(String),

    #[error("{0}")]
    Other(String),
}

impl SafeBuffersError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn precondition(msg: impl Into<String>) -> Self {
        Self::Precondition(msg.into())
    }

    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }

    /// Convert to anyhow::Error for interop with anyhow-based code.
    pub fn into_anyhow(self) -> AnyhowError {
        AnyhowError::new(self)
    }
}

impl From<AnyhowError> for SafeBuffersError {
    fn from(err: AnyhowError) -> Self {
        SafeBuffersError::other(err.to_string())
    }
}

/// Mirrors `anyhow::bail!` but returns a precondition failure.
#[macro_export]
macro_rules! buffers_bail {
    ($($arg:tt)*) => {
        return Err($crate::error::SafeBuffersError::precondition(format!($($arg)*)));
    };
}

/// Mirrors `anyhow::ensure!`.
#[macro_export]
macro_rules! buffers_ensure {
    ($cond:expr, $($arg:tt)*) => {
        if !($cond) {
            $crate::buffers_bail!($($arg)*);
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    fn checked(n: usize) -> SafeBuffersResult<usize> {
        crate::buffers_ensure!(n > 0, "expected a positive count, got {n}");
        Ok(n)
    }

    #[test]
    fn ensure_reports_precondition() {
        let err = checked(0).expect_err("zero is rejected");
        assert!(matches!(err, SafeBuffersError::Precondition(_)));
        assert_eq!(
            err.to_string(),
            "precondition violated: expected a positive count, got 0"
        );
        assert_eq!(checked(3).expect("positive"), 3);
    }

    #[test]
    fn anyhow_round_trip_keeps_message() {
        let err: SafeBuffersError = anyhow::anyhow!("boom").into();
        assert_eq!(err.to_string(), "boom");
        assert_eq!(err.into_anyhow().to_string(), "boom");
    }
}
