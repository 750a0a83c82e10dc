use reqwest::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("Failed to build HTTP client")]
    ClientBuild(#[source] reqwest::Error),

    #[error("Network request failed for {0}")]
    Network(String, #[source] reqwest::Error),

    /// A 400 attributed to the coordinates; the location should be resolved again.
    #[error("Location rejected by the forecast service ({url}): {body}")]
    ForecastRejected { url: String, body: String },

    /// A 400 whose body points at the request itself rather than the location.
    #[error("Forecast service refused the request ({url}): {body}")]
    BadRequest { url: String, body: String },

    #[error("HTTP request failed for {url} with status {status}")]
    Status { url: String, status: StatusCode },
}

impl HttpError {
    /// True for the one failure the pipeline recovers from by re-resolving the location.
    pub fn is_location_rejection(&self) -> bool {
        matches!(self, HttpError::ForecastRejected { .. })
    }
}
