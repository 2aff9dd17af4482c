//! FDSN web-service client (station and dataselect).

use super::service::{RemoteError, StationService};
use super::station::read_stations;
use super::{BoundingBox, Station};
use crate::constants::reference::{CONNECT_TIMEOUT_SECS, RETRY_BASE_DELAY_MS};
use crate::constants::APP_NAME;
use crate::error::{Error, Result};
use crate::time::{QueryWindow, Timestamp};
use crate::waveform::{TimeSeries, mseed};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tracing::{debug, warn};

const STATION_PATH: &str = "/fdsnws/station/1/query";
const DATASELECT_PATH: &str = "/fdsnws/dataselect/1/query";

/// Longest excerpt of an error body kept in [`RemoteError::Status`].
const ERROR_BODY_LIMIT: usize = 200;

/// Client for a data centre's FDSN web services.
#[derive(Debug, Clone)]
pub struct FdsnClient {
    client: Client,
    base_url: String,
    retries: u32,
}

impl FdsnClient {
    /// Create a client; `timeout` bounds each request.
    pub fn new(base_url: &str, timeout: Duration, retries: u32) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .timeout(timeout)
            .user_agent(format!("{APP_NAME}/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::HttpClient { source: e })?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            retries,
        })
    }

    /// Station service query parameters.
    pub fn station_query(
        network: &str,
        window: &QueryWindow,
        bbox: &BoundingBox,
    ) -> Vec<(&'static str, String)> {
        vec![
            ("network", network.to_string()),
            ("starttime", fdsn_time(window.start())),
            ("endtime", fdsn_time(window.end())),
            ("minlatitude", bbox.min_latitude.to_string()),
            ("maxlatitude", bbox.max_latitude.to_string()),
            ("minlongitude", bbox.min_longitude.to_string()),
            ("maxlongitude", bbox.max_longitude.to_string()),
            ("level", "station".to_string()),
            ("format", "text".to_string()),
            ("nodata", "404".to_string()),
        ]
    }

    /// Dataselect query parameters; an empty location is sent as `--`.
    pub fn dataselect_query(
        network: &str,
        station: &str,
        channel: &str,
        location: &str,
        window: &QueryWindow,
    ) -> Vec<(&'static str, String)> {
        let location = if location.is_empty() { "--" } else { location };
        vec![
            ("network", network.to_string()),
            ("station", station.to_string()),
            ("location", location.to_string()),
            ("channel", channel.to_string()),
            ("starttime", fdsn_time(window.start())),
            ("endtime", fdsn_time(window.end())),
            ("nodata", "404".to_string()),
        ]
    }

    /// GET request for a service path with encoded query parameters.
    fn request(&self, path: &str, query: &[(&str, String)]) -> reqwest::RequestBuilder {
        self.client
            .get(format!("{}{path}", self.base_url))
            .query(query)
    }

    /// GET with retries for transient failures.
    async fn get_bytes(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> std::result::Result<Vec<u8>, RemoteError> {
        let mut attempt = 0;
        loop {
            match self.fetch_once(path, query).await {
                Err(e) if e.is_retryable() && attempt < self.retries => {
                    let delay = Duration::from_millis(RETRY_BASE_DELAY_MS << attempt.min(16));
                    warn!("Request failed ({e}), retrying in {delay:?}: {path}");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                other => return other,
            }
        }
    }

    async fn fetch_once(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> std::result::Result<Vec<u8>, RemoteError> {
        let request = self
            .request(path, query)
            .build()
            .map_err(|e| RemoteError::Transport(e.to_string()))?;
        debug!("GET {}", request.url());
        let response = self
            .client
            .execute(request)
            .await
            .map_err(|e| RemoteError::Transport(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::NO_CONTENT || status == StatusCode::NOT_FOUND {
            return Err(RemoteError::NoData);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RemoteError::Status {
                status: status.as_u16(),
                message: body.chars().take(ERROR_BODY_LIMIT).collect(),
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| RemoteError::Transport(e.to_string()))?;
        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl StationService for FdsnClient {
    async fn list_stations(
        &self,
        network: &str,
        window: &QueryWindow,
        bbox: &BoundingBox,
    ) -> std::result::Result<Vec<Station>, RemoteError> {
        let query = Self::station_query(network, window, bbox);
        let body = self.get_bytes(STATION_PATH, &query).await?;
        read_stations(body.as_slice()).map_err(RemoteError::Decode)
    }

    async fn get_waveform(
        &self,
        network: &str,
        station: &str,
        channel: &str,
        location: &str,
        window: &QueryWindow,
    ) -> std::result::Result<Vec<TimeSeries>, RemoteError> {
        let query = Self::dataselect_query(network, station, channel, location, window);
        let body = self.get_bytes(DATASELECT_PATH, &query).await?;
        let series = mseed::decode(&body).map_err(RemoteError::Decode)?;
        if series.is_empty() {
            return Err(RemoteError::NoData);
        }
        Ok(series)
    }
}

/// Time in the form FDSN services accept (UTC, no zone suffix).
fn fdsn_time(ts: Timestamp) -> String {
    ts.to_datetime().map_or_else(
        || ts.to_string(),
        |dt| dt.format("%Y-%m-%dT%H:%M:%S%.6f").to_string(),
    )
}
