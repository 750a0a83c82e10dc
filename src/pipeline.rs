//! The forecast pipeline driver.
//!
//! ```text
//! Init -> CrawlDoc -> SelectParam -> ResolveLocation -> FetchForecast -> Persist -> Filter -> Plot -> Done
//!                                          ^                 |
//!                                          +-- rejected -----+
//! ```
//!
//! Each stage either loops locally (prompts, naming collisions) or hands its error
//! to the driver, which re-enters `ResolveLocation` for a rejected location and
//! aborts with a [`PipelineError`] otherwise.

use crate::clients::forecast_client::{ApiResponse, ForecastClient};
use crate::config::PipelineConfig;
use crate::docs::crawler::{DocCrawler, DocTable};
use crate::error::ForecastError;
use crate::filtering::SampleFilter;
use crate::location::geocoder::Geocoder;
use crate::location::resolver::LocationResolver;
use crate::plot::Plotter;
use crate::prompt::{check_cancelled, Prompt};
use crate::selector::ParameterSelector;
use crate::store::artifacts::ArtifactStore;
use crate::store::forecast_store::ForecastStore;
use crate::types::forecast::FilteredSample;
use crate::types::location::Location;
use crate::types::parameter::ParameterMetadata;
use bon::bon;
use log::{info, warn};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Init,
    CrawlDoc,
    SelectParam,
    ResolveLocation,
    FetchForecast,
    Persist,
    Filter,
    Plot,
    Done,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Init => "init",
            Stage::CrawlDoc => "crawl documentation",
            Stage::SelectParam => "select parameter",
            Stage::ResolveLocation => "resolve location",
            Stage::FetchForecast => "fetch forecast",
            Stage::Persist => "persist forecast",
            Stage::Filter => "filter sample",
            Stage::Plot => "plot",
            Stage::Done => "done",
        };
        f.write_str(name)
    }
}

/// A run aborted in `stage`.
#[derive(Debug, Error)]
#[error("Aborted during '{stage}'")]
pub struct PipelineError {
    pub stage: Stage,
    #[source]
    pub source: ForecastError,
}

impl PipelineError {
    pub fn new(stage: Stage, source: impl Into<ForecastError>) -> Self {
        Self {
            stage,
            source: source.into(),
        }
    }

    /// Process exit status for this failure; see [`crate::FailureClass`].
    pub fn exit_code(&self) -> i32 {
        self.source.failure_class().exit_code()
    }
}

fn at<T, E: Into<ForecastError>>(stage: Stage, result: Result<T, E>) -> Result<T, PipelineError> {
    result.map_err(|e| PipelineError::new(stage, e))
}

/// Everything a successful run produced.
#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    pub parameters: DocTable,
    pub parameter: ParameterMetadata,
    pub location: Location,
    /// Artifact name of the raw forecast dump.
    pub forecast_artifact: String,
    pub forecast_rows: usize,
    pub sample: FilteredSample,
    pub chart: PathBuf,
    pub location_rejections: u32,
}

pub struct Pipeline {
    config: PipelineConfig,
    client: ForecastClient,
    artifacts: ArtifactStore,
    crawler: DocCrawler,
    selector: ParameterSelector,
    resolver: LocationResolver,
    forecast_store: ForecastStore,
    sample_filter: SampleFilter,
    plotter: Plotter,
    cancel: CancellationToken,
    stage: Stage,
}

#[bon]
impl Pipeline {
    /// Wires every stage from `config`.
    ///
    /// # Errors
    ///
    /// Fails when the HTTP client cannot be built or the artifact directory cannot
    /// be created.
    #[builder]
    pub fn new(
        config: PipelineConfig,
        geocoder: Box<dyn Geocoder>,
        #[builder(default)] cancel: CancellationToken,
    ) -> Result<Self, ForecastError> {
        let client = ForecastClient::new(&config)?;
        let artifacts = ArtifactStore::from_config(&config, cancel.clone())?;
        info!("Artifacts are written to {}", artifacts.dir().display());
        Ok(Self {
            crawler: DocCrawler::new(&config),
            selector: ParameterSelector::new(config.retry, cancel.clone()),
            resolver: LocationResolver::new(geocoder, config.retry, cancel.clone()),
            forecast_store: ForecastStore::new(artifacts.clone(), config.forecast_rows),
            sample_filter: SampleFilter::new(artifacts.clone()),
            plotter: Plotter::new(artifacts.clone(), &config),
            client,
            artifacts,
            config,
            cancel,
            stage: Stage::Init,
        })
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn artifact_dir(&self) -> PathBuf {
        self.artifacts.dir().to_path_buf()
    }

    fn enter(&mut self, stage: Stage) -> Result<(), PipelineError> {
        at(stage, check_cancelled(&self.cancel, "the next stage"))?;
        info!("Stage: {} -> {}", self.stage, stage);
        self.stage = stage;
        Ok(())
    }

    /// Resolves a location and fetches its forecast, going back to address entry
    /// when the forecast service rejects the coordinates.
    fn locate_and_fetch(
        &mut self,
        address: Option<&str>,
        prompt: &mut dyn Prompt,
    ) -> Result<(Location, ApiResponse, u32), PipelineError> {
        let mut address = address.map(str::to_string);
        let mut rejections = 0;
        let mut provider_failures = 0;

        loop {
            self.enter(Stage::ResolveLocation)?;
            let location = match self.resolver.resolve(address.take().as_deref(), prompt) {
                Ok(location) => location,
                Err(e)
                    if e.is_provider_failure()
                        && provider_failures + 1 < self.config.retry.max_attempts =>
                {
                    provider_failures += 1;
                    warn!("Geocoding failed ({}), asking again", e);
                    prompt.say(&format!(">>> {e}"));
                    continue;
                }
                Err(e) => return Err(PipelineError::new(Stage::ResolveLocation, e)),
            };

            self.enter(Stage::FetchForecast)?;
            match self.client.get(&self.config.api_base_url, Some(&location)) {
                Ok(response) => return Ok((location, response, rejections)),
                Err(e)
                    if e.is_location_rejection()
                        && rejections < self.config.max_location_rejections =>
                {
                    rejections += 1;
                    warn!(
                        "Forecast rejected {} ({}/{})",
                        location.display_name, rejections, self.config.max_location_rejections
                    );
                    prompt.say(&format!(
                        ">>> Location not found, please enter a Swedish city: {e}"
                    ));
                }
                Err(e) => return Err(PipelineError::new(Stage::FetchForecast, e)),
            }
        }
    }

    /// Runs every stage once. `address` skips the first address prompt.
    pub fn run(
        &mut self,
        address: Option<&str>,
        prompt: &mut dyn Prompt,
    ) -> Result<PipelineOutcome, PipelineError> {
        self.stage = Stage::Init;

        self.enter(Stage::CrawlDoc)?;
        let parameters = at(
            Stage::CrawlDoc,
            self.crawler.crawl(&self.client, &self.artifacts, prompt),
        )?;

        self.enter(Stage::SelectParam)?;
        let parameter = at(
            Stage::SelectParam,
            self.selector.select(&parameters.parameters, prompt),
        )?;

        let (location, response, location_rejections) = self.locate_and_fetch(address, prompt)?;

        self.enter(Stage::Persist)?;
        let forecast_artifact = at(
            Stage::Persist,
            self.forecast_store
                .persist(&response, &self.config.forecast_name, prompt),
        )?;
        let series = at(Stage::Persist, self.forecast_store.load(&forecast_artifact))?;

        self.enter(Stage::Filter)?;
        let sample = at(
            Stage::Filter,
            self.sample_filter
                .filter(&series, parameter.key(), &self.config.sample_name, prompt),
        )?;

        self.enter(Stage::Plot)?;
        let chart = at(
            Stage::Plot,
            self.plotter
                .render(&sample.artifact, &location, &parameter, prompt),
        )?;

        self.enter(Stage::Done)?;
        Ok(PipelineOutcome {
            parameters,
            parameter,
            location,
            forecast_artifact,
            forecast_rows: series.len(),
            sample,
            chart,
            location_rejections,
        })
    }
}
