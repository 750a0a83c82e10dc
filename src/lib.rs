//! Crawl the SMHI parameter documentation, geocode an address, fetch a ten-day
//! point forecast and chart one parameter of it.
//!
//! The stages can be used on their own or driven in order by [`Pipeline`]:
//!
//! ```no_run
//! use smhi_forecast::{NominatimGeocoder, Pipeline, PipelineConfig, StdinPrompt};
//!
//! # fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = PipelineConfig::load()?;
//! let geocoder = NominatimGeocoder::new(&config)?;
//! let mut pipeline = Pipeline::builder()
//!     .config(config)
//!     .geocoder(Box::new(geocoder))
//!     .build()?;
//! let outcome = pipeline.run(Some("Stockholm"), &mut StdinPrompt)?;
//! println!("Chart saved to {}", outcome.chart.display());
//! # Ok(())
//! # }
//! ```

mod clients;
mod config;
mod docs;
mod error;
mod filtering;
mod location;
mod pipeline;
mod plot;
mod prompt;
mod selector;
mod store;
mod types;
mod utils;

pub use config::*;
pub use error::{FailureClass, ForecastError};
pub use pipeline::*;
pub use prompt::*;

pub use clients::error::HttpError;
pub use clients::forecast_client::{ApiResponse, ForecastClient};

pub use docs::crawler::{DocCrawler, DocTable, RawTable};
pub use docs::error::CrawlError;

pub use location::error::LocationError;
pub use location::geocoder::{Geocoder, NominatimGeocoder};
pub use location::resolver::LocationResolver;

pub use store::artifacts::{ArtifactStore, CSV, PNG};
pub use store::error::StoreError;
pub use store::forecast_store::{parse_forecast, ForecastStore};
pub use store::frame::{raw_frame, series_frame, series_rows};

pub use filtering::{ForecastFrameFilterExt, SampleFilter};
pub use plot::{PlotError, Plotter};
pub use selector::ParameterSelector;

pub use types::forecast::*;
pub use types::location::Location;
pub use types::parameter::ParameterMetadata;

pub use utils::{create_run_dir, default_artifact_dir};
