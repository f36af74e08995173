use thiserror::Error;

use crate::signals::Signal;

pub type Result<T> = std::result::Result<T, FeedError>;

#[derive(Debug, Error)]
pub enum FeedError {
    /// One personalization signal could not be loaded. Never returned to
    /// callers; the collector logs it and falls back to the empty default.
    #[error("failed to fetch signal `{signal}`: {source}")]
    SignalFetch {
        signal: Signal,
        #[source]
        source: anyhow::Error,
    },

    /// Every signal fetch for the viewer failed.
    #[error("failed to collect any personalization signal for viewer `{viewer_id}`")]
    SignalCollection { viewer_id: String },

    #[error("failed to fetch candidate articles: {0}")]
    CandidateFetch(#[source] anyhow::Error),

    #[error("invalid option `{field}`: {reason}")]
    Configuration { field: &'static str, reason: String },
}

impl FeedError {
    pub fn configuration(field: &'static str, reason: impl Into<String>) -> Self {
        FeedError::Configuration {
            field,
            reason: reason.into(),
        }
    }

    /// Whether the caller should fall back to a cached or trending feed.
    pub fn is_upstream_failure(&self) -> bool {
        matches!(
            self,
            FeedError::CandidateFetch(_) | FeedError::SignalCollection { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_message_names_field() {
        let err = FeedError::configuration("limit", "must not be negative");
        assert_eq!(err.to_string(), "invalid option `limit`: must not be negative");
        assert!(!err.is_upstream_failure());
    }

    #[test]
    fn test_candidate_fetch_keeps_source() {
        let err = FeedError::CandidateFetch(anyhow::anyhow!("connection refused"));
        assert!(err.to_string().contains("connection refused"));
        assert!(std::error::Error::source(&err).is_some());
        assert!(err.is_upstream_failure());
    }

    #[test]
    fn test_signal_fetch_names_signal() {
        let err = FeedError::SignalFetch {
            signal: Signal::CategoryAffinity,
            source: anyhow::anyhow!("timeout"),
        };
        assert_eq!(
            err.to_string(),
            "failed to fetch signal `category_affinity`: timeout"
        );
    }
}
