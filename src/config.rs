//! Pipeline configuration: endpoints, timeouts, artifact location and the
//! policies for retries, naming collisions, malformed rows and rejected requests.
//!
//! Built in code through [`PipelineConfig::builder`] or read from a TOML file with
//! [`PipelineConfig::load_from_path`]; every field has a default so a file only
//! needs the keys it changes.

use crate::prompt::RetryPolicy;
use crate::utils::default_artifact_dir;
use bon::Builder;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_DOC_URL: &str = "https://opendata.smhi.se/apidocs/metfcst/parameters.html";
pub const DEFAULT_API_BASE_URL: &str = "https://opendata-download-metfcst.smhi.se";
pub const DEFAULT_GEOCODER_URL: &str = "https://nominatim.openstreetmap.org";
pub const DEFAULT_CONTAINER_ID: &str = "pmp3g-parameters";
pub const DEFAULT_CONFIG_FILE: &str = "smhi-forecast.toml";

/// Parameter keys the pmp3g documentation is expected to list.
pub const PMP3G_PARAMETERS: [&str; 19] = [
    "msl", "t", "vis", "wd", "ws", "r", "tstm", "tcc_mean", "lcc_mean", "mcc_mean", "hcc_mean",
    "gust", "pmin", "pmax", "spp", "pcat", "pmean", "pmedian", "Wsymb2",
];

/// What to do when an artifact name is already taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollisionPolicy {
    /// Ask the operator for another name (bounded by the retry policy).
    Prompt,
    /// Append `-1`, `-2`, ... until a free name is found.
    Suffix,
    /// Refuse with [`crate::StoreError::NamingCollision`].
    Fail,
}

/// How a stage treats rows it cannot interpret.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RowPolicy {
    /// Drop the row and keep going.
    Skip,
    /// Fail the whole stage.
    Fail,
}

/// How an HTTP 400 from the forecast API is classified.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "mode", content = "markers")]
pub enum RejectionPolicy {
    /// Every 400 means the coordinates were rejected and another address is asked for.
    #[default]
    AnyBadRequest,
    /// A 400 means rejected coordinates when its body is empty or contains one of
    /// the markers (case-insensitive); any other 400 is a fatal bad request.
    BodyMarkers(Vec<String>),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{0}'")]
    Read(PathBuf, #[source] std::io::Error),

    #[error("Invalid config file '{0}'")]
    Parse(PathBuf, #[source] toml::de::Error),
}

/// Everything the pipeline needs to know that is not typed by the operator.
#[derive(Debug, Clone, PartialEq, Builder, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Parameter documentation page.
    #[builder(into, default = DEFAULT_DOC_URL.to_string())]
    pub doc_url: String,
    /// Base URL of the forecast API, without trailing slash.
    #[builder(into, default = DEFAULT_API_BASE_URL.to_string())]
    pub api_base_url: String,
    #[builder(into, default = "pmp3g".to_string())]
    pub category: String,
    #[builder(default = 2)]
    pub version: u32,
    /// Base URL of the Nominatim-compatible geocoder.
    #[builder(into, default = DEFAULT_GEOCODER_URL.to_string())]
    pub geocoder_url: String,
    /// Restricts geocoding to these ISO country codes (comma separated); empty for no filter.
    #[builder(into, default = "se".to_string())]
    pub country_codes: String,
    #[builder(into, default = concat!("smhi-forecast/", env!("CARGO_PKG_VERSION")).to_string())]
    pub user_agent: String,
    /// Per-request HTTP timeout in milliseconds.
    #[builder(default = 3_000)]
    pub request_timeout_ms: u64,
    /// Directory holding every artifact of a run.
    #[builder(into, default = default_artifact_dir())]
    pub artifact_dir: PathBuf,
    /// Write into a fresh `run-<timestamp>` directory below `artifact_dir`.
    #[builder(default = false)]
    pub per_run_directory: bool,
    /// `id` of the element wrapping the parameter table.
    #[builder(into, default = DEFAULT_CONTAINER_ID.to_string())]
    pub container_id: String,
    /// Parameter keys that must appear in the crawled table.
    #[builder(default = PMP3G_PARAMETERS.iter().map(|s| s.to_string()).collect::<Vec<_>>())]
    pub expected_parameters: Vec<String>,
    #[builder(default)]
    pub retry: RetryPolicy,
    /// How many times a rejected location may send the run back to address entry.
    #[builder(default = 3)]
    pub max_location_rejections: u32,
    #[builder(default = CollisionPolicy::Prompt)]
    pub collision: CollisionPolicy,
    #[builder(default = RowPolicy::Skip)]
    pub doc_rows: RowPolicy,
    #[builder(default = RowPolicy::Fail)]
    pub forecast_rows: RowPolicy,
    #[builder(default)]
    pub rejection: RejectionPolicy,
    #[builder(into, default = "parameters_smhi".to_string())]
    pub parameter_table_name: String,
    #[builder(into, default = "smhi".to_string())]
    pub forecast_name: String,
    #[builder(into, default = "weather_sample".to_string())]
    pub sample_name: String,
    /// Chart size in pixels.
    #[builder(default = (1600, 800))]
    pub chart_size: (u32, u32),
    /// TrueType fonts tried in order for chart text; the bundled DejaVu Sans is
    /// used when none of them loads.
    ///
    /// The font is registered once per process: the first chart rendered decides
    /// it, and the `font_paths` of later configurations are not consulted.
    #[builder(default = default_font_paths())]
    pub font_paths: Vec<PathBuf>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig::builder().build()
    }
}

impl PipelineConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Loads `smhi-forecast.toml` from the working directory, falling back to the
    /// defaults when the file does not exist.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Path::new(DEFAULT_CONFIG_FILE);
        if !path.exists() {
            log::info!("No {DEFAULT_CONFIG_FILE} found, using default configuration");
            return Ok(Self::default());
        }
        Self::load_from_path(path)
    }

    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents =
            std::fs::read_to_string(path).map_err(|e| ConfigError::Read(path.to_path_buf(), e))?;
        let config = toml::from_str::<PipelineConfig>(&contents)
            .map_err(|e| ConfigError::Parse(path.to_path_buf(), e))?;
        log::info!("Loaded configuration from {}", path.display());
        Ok(config)
    }
}

fn default_font_paths() -> Vec<PathBuf> {
    [
        "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
        "/usr/share/fonts/dejavu/DejaVuSans.ttf",
        "/usr/share/fonts/TTF/DejaVuSans.ttf",
        "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
        "/Library/Fonts/Arial.ttf",
        "/System/Library/Fonts/Supplemental/Arial.ttf",
        "C:\\Windows\\Fonts\\arial.ttf",
    ]
    .into_iter()
    .map(PathBuf::from)
    .collect()
}
