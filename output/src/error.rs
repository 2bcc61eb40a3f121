use std::sync::Arc;

use crate::ElementType;

/// Error carried by a rejected output.
///
/// Every waiter on a rejected output observes the same error,
/// so it must be cheap to clone: arbitrary failures are shared behind an `Arc`.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    #[error("operation was canceled")]
    Canceled,
    #[error("context deadline exceeded")]
    DeadlineExceeded,
    #[error("value is not of the expected type {expected}")]
    TypeMismatch { expected: ElementType },
    #[error("{0:#}")]
    Failed(Arc<anyhow::Error>),
}

impl Error {
    /// Wrap any error produced by a provider or an applier.
    pub fn failed(e: impl Into<anyhow::Error>) -> Self {
        e.into().into()
    }

    /// True if this error came from a canceled or expired context,
    /// including one that was wrapped with extra context on the way out.
    pub fn is_canceled(&self) -> bool {
        match self {
            Self::Canceled | Self::DeadlineExceeded => true,
            Self::TypeMismatch { .. } => false,
            Self::Failed(e) => e
                .chain()
                .filter_map(|cause| cause.downcast_ref::<Error>())
                .any(Error::is_canceled),
        }
    }
}

impl From<anyhow::Error> for Error {
    fn from(e: anyhow::Error) -> Self {
        // don't double-wrap errors that started out as ours,
        // but keep any context added on top of them:
        if e.chain().count() > 1 {
            return Self::Failed(Arc::new(e));
        }
        match e.downcast::<Error>() {
            Ok(e) => e,
            Err(e) => Self::Failed(Arc::new(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failed_keeps_own_variants() {
        let e = Error::failed(Error::Canceled);
        assert!(matches!(e, Error::Canceled));
        assert!(e.is_canceled());
    }

    #[test]
    fn test_failed_wraps_foreign_errors() {
        let e = Error::failed(anyhow::anyhow!("bucket quota exceeded"));
        assert!(matches!(e, Error::Failed(_)));
        assert!(!e.is_canceled());
        assert_eq!(e.to_string(), "bucket quota exceeded");
    }

    #[test]
    fn test_failed_display_includes_context() {
        use anyhow::Context;
        let inner: Result<(), anyhow::Error> = Err(anyhow::anyhow!("connection reset"));
        let e = Error::failed(inner.context("while creating bucket").unwrap_err());
        assert_eq!(e.to_string(), "while creating bucket: connection reset");
    }

    #[test]
    fn test_context_on_own_error_is_kept() {
        let wrapped = anyhow::Error::new(Error::DeadlineExceeded).context("while creating bucket");
        let e = Error::from(wrapped);
        assert!(matches!(e, Error::Failed(_)));
        assert_eq!(e.to_string(), "while creating bucket: context deadline exceeded");
        assert!(e.is_canceled());

        let mismatch = Error::TypeMismatch { expected: ElementType::any() };
        let e = Error::from(anyhow::Error::new(mismatch).context("while reading size"));
        assert!(e.to_string().starts_with("while reading size: value is not of the expected type"));
        assert!(!e.is_canceled());
    }
}
