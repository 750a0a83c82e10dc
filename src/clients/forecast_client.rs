//! Blocking HTTP access to the documentation page and the point-forecast API,
//! with the failure classification every caller relies on.

use crate::clients::error::HttpError;
use crate::config::{PipelineConfig, RejectionPolicy};
use crate::types::location::Location;
use log::{debug, info, warn};
use reqwest::blocking::Client;
use reqwest::StatusCode;

/// A successful response, body already read.
///
/// Reading the body consumes the `reqwest` response, so the connection is back in
/// the pool (or closed) by the time this value exists.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub url: String,
    pub status: StatusCode,
    pub body: String,
}

pub(crate) fn build_client(config: &PipelineConfig) -> Result<Client, HttpError> {
    Client::builder()
        .timeout(config.request_timeout())
        .user_agent(config.user_agent.as_str())
        .build()
        .map_err(HttpError::ClientBuild)
}

pub struct ForecastClient {
    client: Client,
    api_base_url: String,
    category: String,
    version: u32,
    rejection: RejectionPolicy,
}

impl ForecastClient {
    pub fn new(config: &PipelineConfig) -> Result<Self, HttpError> {
        Ok(Self {
            client: build_client(config)?,
            api_base_url: config.api_base_url.trim_end_matches('/').to_string(),
            category: config.category.clone(),
            version: config.version,
            rejection: config.rejection.clone(),
        })
    }

    /// The point-forecast URL, coordinates with five decimals.
    pub fn forecast_url(&self, location: &Location) -> String {
        format!(
            "{}/api/category/{}/version/{}/geotype/point/lon/{:.5}/lat/{:.5}/data.json",
            self.api_base_url, self.category, self.version, location.longitude, location.latitude
        )
    }

    /// Fetches the forecast for `location`, or `url` verbatim when no location is given.
    ///
    /// # Errors
    ///
    /// * [`HttpError::ForecastRejected`] for a 400 attributed to the coordinates.
    /// * [`HttpError::BadRequest`] for any other 400.
    /// * [`HttpError::Status`] for every other non-2xx status.
    /// * [`HttpError::Network`] for connection failures and the request timeout.
    pub fn get(&self, url: &str, location: Option<&Location>) -> Result<ApiResponse, HttpError> {
        let url = match location {
            Some(location) => self.forecast_url(location),
            None => url.to_string(),
        };
        info!("Requesting {}", url);

        let response = self
            .client
            .get(&url)
            .send()
            .map_err(|e| HttpError::Network(url.clone(), e))?;
        let status = response.status();

        if status.is_success() {
            let body = response
                .text()
                .map_err(|e| HttpError::Network(url.clone(), e))?;
            debug!("Received {} bytes from {}", body.len(), url);
            return Ok(ApiResponse { url, status, body });
        }

        let body = response.text().unwrap_or_default();
        warn!("HTTP error for {}: {}", url, status);
        Err(self.classify(url, status, body))
    }

    fn classify(&self, url: String, status: StatusCode, body: String) -> HttpError {
        if status != StatusCode::BAD_REQUEST {
            return HttpError::Status { url, status };
        }
        let location_rejected = match &self.rejection {
            RejectionPolicy::AnyBadRequest => true,
            RejectionPolicy::BodyMarkers(markers) => {
                let lowered = body.to_lowercase();
                lowered.trim().is_empty()
                    || markers
                        .iter()
                        .any(|marker| lowered.contains(&marker.to_lowercase()))
            }
        };
        if location_rejected {
            HttpError::ForecastRejected { url, body }
        } else {
            HttpError::BadRequest { url, body }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use tokio::runtime::Runtime;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    /// A mock server reachable from blocking code. Keep the runtime alive for as
    /// long as the server is used.
    pub(crate) fn mock_server() -> (Runtime, MockServer) {
        let runtime = Runtime::new().unwrap();
        let server = runtime.block_on(MockServer::start());
        (runtime, server)
    }

    pub(crate) fn mount(runtime: &Runtime, server: &MockServer, mock: Mock) {
        runtime.block_on(mock.mount(server));
    }

    fn client_for(server: &MockServer, rejection: RejectionPolicy) -> ForecastClient {
        let config = PipelineConfig::builder()
            .api_base_url(server.uri())
            .rejection(rejection)
            .build();
        ForecastClient::new(&config).unwrap()
    }

    fn stockholm() -> Location {
        Location::new("Stockholm", "Stockholm, Sverige", 59.33, 18.06).unwrap()
    }

    const FORECAST_PATH: &str =
        "/api/category/pmp3g/version/2/geotype/point/lon/18.06000/lat/59.33000/data.json";

    #[test]
    fn forecast_url_uses_five_decimals() {
        let config = PipelineConfig::builder()
            .api_base_url("https://example.test/")
            .build();
        let client = ForecastClient::new(&config).unwrap();
        let location = Location::new("x", "x", 59.329_323_4, 18.068_581_1).unwrap();
        assert_eq!(
            client.forecast_url(&location),
            "https://example.test/api/category/pmp3g/version/2/geotype/point/lon/18.06858/lat/59.32932/data.json"
        );
    }

    #[test]
    fn success_returns_body_unmodified() {
        let (runtime, server) = mock_server();
        mount(
            &runtime,
            &server,
            Mock::given(method("GET"))
                .and(path(FORECAST_PATH))
                .respond_with(ResponseTemplate::new(200).set_body_string("{\"timeSeries\":[]}")),
        );
        let client = client_for(&server, RejectionPolicy::default());
        let response = client.get("ignored", Some(&stockholm())).unwrap();
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.body, "{\"timeSeries\":[]}");
        assert!(response.url.ends_with(FORECAST_PATH));
    }

    #[test]
    fn url_is_fetched_verbatim_without_location() {
        let (runtime, server) = mock_server();
        mount(
            &runtime,
            &server,
            Mock::given(method("GET"))
                .and(path("/docs/parameters.html"))
                .respond_with(ResponseTemplate::new(200).set_body_string("<html></html>")),
        );
        let client = client_for(&server, RejectionPolicy::default());
        let url = format!("{}/docs/parameters.html", server.uri());
        assert_eq!(client.get(&url, None).unwrap().body, "<html></html>");
    }

    fn out_of_bounds() -> RejectionPolicy {
        RejectionPolicy::BodyMarkers(vec!["out of bounds".to_string()])
    }

    #[test]
    fn any_bad_request_is_a_location_rejection_by_default() {
        let (runtime, server) = mock_server();
        mount(
            &runtime,
            &server,
            Mock::given(method("GET"))
                .respond_with(ResponseTemplate::new(400).set_body_string("{\"status\":400}")),
        );
        let client = client_for(&server, RejectionPolicy::default());
        let err = client.get("", Some(&stockholm())).unwrap_err();
        assert!(err.is_location_rejection(), "{err:?}");
    }

    #[test]
    fn bad_request_with_marker_is_location_rejection() {
        let (runtime, server) = mock_server();
        mount(
            &runtime,
            &server,
            Mock::given(method("GET")).respond_with(
                ResponseTemplate::new(400).set_body_string("Requested point is out of bounds"),
            ),
        );
        let client = client_for(&server, out_of_bounds());
        let err = client.get("", Some(&stockholm())).unwrap_err();
        assert!(err.is_location_rejection(), "{err:?}");
    }

    #[test]
    fn bad_request_without_marker_is_fatal_when_markers_are_required() {
        let (runtime, server) = mock_server();
        mount(
            &runtime,
            &server,
            Mock::given(method("GET"))
                .respond_with(ResponseTemplate::new(400).set_body_string("unknown version")),
        );
        let client = client_for(&server, out_of_bounds());
        let err = client.get("", Some(&stockholm())).unwrap_err();
        assert!(matches!(err, HttpError::BadRequest { .. }), "{err:?}");

        let lenient = client_for(&server, RejectionPolicy::AnyBadRequest);
        assert!(lenient
            .get("", Some(&stockholm()))
            .unwrap_err()
            .is_location_rejection());
    }

    #[test]
    fn server_errors_are_classified_as_status() {
        let (runtime, server) = mock_server();
        mount(
            &runtime,
            &server,
            Mock::given(method("GET")).respond_with(ResponseTemplate::new(503)),
        );
        let client = client_for(&server, RejectionPolicy::default());
        match client.get("", Some(&stockholm())) {
            Err(HttpError::Status { status, .. }) => {
                assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE)
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn slow_responses_time_out() {
        let (runtime, server) = mock_server();
        mount(
            &runtime,
            &server,
            Mock::given(method("GET")).respond_with(
                ResponseTemplate::new(200).set_delay(std::time::Duration::from_millis(800)),
            ),
        );
        let config = PipelineConfig::builder()
            .api_base_url(server.uri())
            .request_timeout_ms(100)
            .build();
        let client = ForecastClient::new(&config).unwrap();
        let err = client.get("", Some(&stockholm())).unwrap_err();
        assert!(matches!(err, HttpError::Network(..)), "{err:?}");
    }

    #[test]
    fn unreachable_host_is_network_error() {
        let config = PipelineConfig::builder().request_timeout_ms(500).build();
        let client = ForecastClient::new(&config).unwrap();
        let err = client.get("http://127.0.0.1:9/nothing", None).unwrap_err();
        assert!(matches!(err, HttpError::Network(..)), "{err:?}");
    }
}
