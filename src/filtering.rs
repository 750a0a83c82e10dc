use crate::config::RowPolicy;
use crate::prompt::Prompt;
use crate::store::artifacts::{ArtifactStore, CSV};
use crate::store::error::StoreError;
use crate::store::frame::{series_frame, series_rows};
use crate::types::forecast::{mean_of, FilteredSample, ForecastSeries, COL_NAME};
use log::info;
use polars::prelude::{col, lit, IntoLazy, LazyFrame};

pub trait ForecastFrameFilterExt {
    /// Keeps the rows whose `Name` column equals `key`.
    ///
    /// # Returns
    /// A new `LazyFrame` with the filter applied. Missing columns surface as errors
    /// on `collect`.
    fn filter_parameter(self, key: &str) -> LazyFrame;
}

impl ForecastFrameFilterExt for LazyFrame {
    fn filter_parameter(self, key: &str) -> LazyFrame {
        self.filter(col(COL_NAME).eq(lit(key)))
    }
}

/// Reduces a forecast series to one parameter and persists the subset.
pub struct SampleFilter {
    artifacts: ArtifactStore,
}

impl SampleFilter {
    pub fn new(artifacts: ArtifactStore) -> Self {
        Self { artifacts }
    }

    /// Filters `series` to `key`, computes the mean over every value of the subset
    /// and writes it (derived schema) under `name` or the name the collision policy
    /// settles on.
    ///
    /// # Errors
    ///
    /// [`StoreError::EmptySample`] when no row carries `key`; nothing is written then.
    pub fn filter(
        &self,
        series: &ForecastSeries,
        key: &str,
        name: &str,
        prompt: &mut dyn Prompt,
    ) -> Result<FilteredSample, StoreError> {
        let mut subset = series_frame(&series.rows)?
            .lazy()
            .filter_parameter(key)
            .collect()?;
        let rows = series_rows(&subset, self.artifacts.dir(), RowPolicy::Fail)?;
        let mean = mean_of(rows.iter().map(|r| &r.row)).ok_or_else(|| StoreError::EmptySample {
            key: key.to_string(),
        })?;

        let artifact = self.artifacts.write_csv(name, &mut subset, prompt)?;
        info!(
            "{}.{} holds {} rows of '{}', mean {:.3}",
            artifact,
            CSV,
            rows.len(),
            key,
            mean
        );
        Ok(FilteredSample {
            key: key.to_string(),
            rows,
            mean,
            artifact,
        })
    }
}
