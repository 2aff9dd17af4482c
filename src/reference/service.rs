//! Contract with the remote station/waveform service.

use super::{BoundingBox, Station};
use crate::time::QueryWindow;
use crate::waveform::TimeSeries;
use async_trait::async_trait;

/// Why a remote request produced nothing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RemoteError {
    /// The service has no data for the request.
    #[error("no data available")]
    NoData,

    /// The request never got a response (connect, TLS, timeout).
    #[error("transport error: {0}")]
    Transport(String),

    /// The service answered with an error status.
    #[error("HTTP {status}: {message}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response excerpt.
        message: String,
    },

    /// The response body could not be decoded.
    #[error("undecodable response: {0}")]
    Decode(String),
}

impl RemoteError {
    /// Whether trying again might succeed.
    ///
    /// "No data" and malformed responses are answers, not accidents.
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(_) => true,
            Self::Status { status, .. } => *status >= 500 || *status == 429,
            Self::NoData | Self::Decode(_) => false,
        }
    }
}

/// Remote archive of permanent stations.
#[async_trait]
pub trait StationService: Send + Sync {
    /// Stations of `network` operating during `window` inside `bbox`.
    async fn list_stations(
        &self,
        network: &str,
        window: &QueryWindow,
        bbox: &BoundingBox,
    ) -> Result<Vec<Station>, RemoteError>;

    /// Waveforms of one station's channels (`channel` may contain `?`/`*`).
    async fn get_waveform(
        &self,
        network: &str,
        station: &str,
        channel: &str,
        location: &str,
        window: &QueryWindow,
    ) -> Result<Vec<TimeSeries>, RemoteError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_classification() {
        assert!(!RemoteError::NoData.is_retryable());
        assert!(!RemoteError::Decode("x".to_string()).is_retryable());
        assert!(RemoteError::Transport("refused".to_string()).is_retryable());
        let status = |status| RemoteError::Status {
            status,
            message: String::new(),
        };
        assert!(status(503).is_retryable());
        assert!(status(429).is_retryable());
        assert!(!status(400).is_retryable());
    }
}
