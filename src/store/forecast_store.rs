//! Persists the raw forecast response as CSV rows and reloads it with the
//! calendar fields derived.

use crate::clients::forecast_client::ApiResponse;
use crate::config::RowPolicy;
use crate::prompt::Prompt;
use crate::store::artifacts::{ArtifactStore, CSV};
use crate::store::error::StoreError;
use crate::store::frame::{raw_frame, series_rows};
use crate::types::forecast::{ForecastRow, ForecastSeries};
use log::info;
use serde::de::Error as _;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ForecastResponse {
    time_series: Vec<TimeStep>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TimeStep {
    valid_time: String,
    parameters: Vec<ParameterValues>,
}

#[derive(Debug, Deserialize)]
struct ParameterValues {
    name: String,
    unit: String,
    values: Vec<f64>,
}

/// Flattens a forecast body into one row per (time step, parameter).
///
/// # Errors
///
/// [`StoreError::MalformedResponse`] when the body is not JSON, lacks the
/// `timeSeries` shape, or reports a parameter without values.
pub fn parse_forecast(body: &str, url: &str) -> Result<Vec<ForecastRow>, StoreError> {
    let malformed = |source: serde_json::Error| StoreError::MalformedResponse {
        url: url.to_string(),
        source,
    };
    let response: ForecastResponse = serde_json::from_str(body).map_err(malformed)?;

    let mut rows = Vec::new();
    for step in response.time_series {
        let timestamp = step.valid_time.trim().trim_end_matches('Z').to_string();
        for parameter in step.parameters {
            if parameter.values.is_empty() {
                return Err(malformed(serde_json::Error::custom(format!(
                    "parameter '{}' at {} has no values",
                    parameter.name, timestamp
                ))));
            }
            rows.push(ForecastRow {
                composite_timestamp: timestamp.clone(),
                parameter_name: parameter.name,
                unit: parameter.unit,
                values: parameter.values,
            });
        }
    }
    Ok(rows)
}

pub struct ForecastStore {
    artifacts: ArtifactStore,
    row_policy: RowPolicy,
}

impl ForecastStore {
    pub fn new(artifacts: ArtifactStore, row_policy: RowPolicy) -> Self {
        Self {
            artifacts,
            row_policy,
        }
    }

    pub fn artifacts(&self) -> &ArtifactStore {
        &self.artifacts
    }

    /// Writes the raw dump (`Composite_Dates,Name,Unit,Values`) and returns the
    /// artifact name it was stored under.
    ///
    /// The body is parsed before any name is claimed, so a malformed response
    /// leaves no file behind.
    pub fn persist(
        &self,
        response: &ApiResponse,
        name: &str,
        prompt: &mut dyn Prompt,
    ) -> Result<String, StoreError> {
        let rows = parse_forecast(&response.body, &response.url)?;
        let mut df = raw_frame(&rows)?;
        let name = self.artifacts.write_csv(name, &mut df, prompt)?;
        info!("{}.{} was created with {} rows", name, CSV, rows.len());
        Ok(name)
    }

    /// Reads a raw dump back and derives `Date`, `Time`, `Date_Time` and `Weekday`.
    ///
    /// # Errors
    ///
    /// With the default [`RowPolicy::Fail`] a single malformed timestamp fails the
    /// whole load with [`StoreError::MalformedTimestamp`].
    pub fn load(&self, name: &str) -> Result<ForecastSeries, StoreError> {
        let path = self.artifacts.path_for(name, CSV);
        let df = self.artifacts.read_csv(name)?;
        let rows = series_rows(&df, &path, self.row_policy)?;
        info!("Loaded {} forecast rows from {}", rows.len(), path.display());
        Ok(ForecastSeries { rows })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::config::CollisionPolicy;
    use crate::prompt::{RetryPolicy, ScriptedPrompt};
    use reqwest::StatusCode;
    use std::io::Write;
    use std::path::Path;
    use tokio_util::sync::CancellationToken;

    pub(crate) const TWO_STEPS: &str = r#"{
        "approvedTime": "2021-01-01T10:00:00Z",
        "referenceTime": "2021-01-01T10:00:00Z",
        "geometry": {"type": "Point", "coordinates": [[18.06, 59.33]]},
        "timeSeries": [
            {"validTime": "2021-01-01T12:00:00Z", "parameters": [
                {"name": "t", "levelType": "hl", "level": 2, "unit": "Cel", "values": [-1.5]},
                {"name": "ws", "levelType": "hl", "level": 10, "unit": "m/s", "values": [4.2]}
            ]},
            {"validTime": "2021-01-01T13:00:00Z", "parameters": [
                {"name": "t", "levelType": "hl", "level": 2, "unit": "Cel", "values": [-0.5]},
                {"name": "ws", "levelType": "hl", "level": 10, "unit": "m/s", "values": [3.8]}
            ]}
        ]
    }"#;

    pub(crate) fn response(body: &str) -> ApiResponse {
        ApiResponse {
            url: "http://forecast.test/data.json".to_string(),
            status: StatusCode::OK,
            body: body.to_string(),
        }
    }

    fn store(dir: &Path, policy: RowPolicy) -> ForecastStore {
        let artifacts = ArtifactStore::new(
            dir,
            CollisionPolicy::Fail,
            RetryPolicy::default(),
            CancellationToken::new(),
        )
        .unwrap();
        ForecastStore::new(artifacts, policy)
    }

    #[test]
    fn persist_writes_one_row_per_step_and_parameter() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path(), RowPolicy::Fail);
        let name = store
            .persist(&response(TWO_STEPS), "smhi", &mut ScriptedPrompt::default())
            .unwrap();
        assert_eq!(name, "smhi");

        let text = std::fs::read_to_string(dir.path().join("smhi.csv")).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "Composite_Dates,Name,Unit,Values");
        assert_eq!(lines[1], "2021-01-01T12:00:00,t,Cel,-1.5");
        assert_eq!(lines.len(), 5);
    }

    #[test]
    fn multi_values_are_stored_bracket_free() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path(), RowPolicy::Fail);
        let body = r#"{"timeSeries": [{"validTime": "2021-01-01T12:00:00Z", "parameters": [
            {"name": "pmean", "unit": "kg/m2/h", "values": [0.1, 0.25]}]}]}"#;
        store
            .persist(&response(body), "multi", &mut ScriptedPrompt::default())
            .unwrap();
        let text = std::fs::read_to_string(dir.path().join("multi.csv")).unwrap();
        assert!(text.contains("\"0.1, 0.25\""), "{text}");
        assert!(!text.contains('['));

        let series = store.load("multi").unwrap();
        assert_eq!(series.rows[0].row.values, vec![0.1, 0.25]);
    }

    #[test]
    fn malformed_body_leaves_no_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path(), RowPolicy::Fail);
        let err = store
            .persist(
                &response("<html>Service Unavailable</html>"),
                "smhi",
                &mut ScriptedPrompt::default(),
            )
            .unwrap_err();
        assert!(matches!(err, StoreError::MalformedResponse { .. }));
        assert!(err.is_malformed_data());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn wrong_shape_and_empty_values_are_malformed() {
        assert!(matches!(
            parse_forecast(r#"{"series": []}"#, "u"),
            Err(StoreError::MalformedResponse { .. })
        ));
        let empty = r#"{"timeSeries": [{"validTime": "2021-01-01T12:00:00Z", "parameters": [
            {"name": "t", "unit": "Cel", "values": []}]}]}"#;
        assert!(matches!(
            parse_forecast(empty, "u"),
            Err(StoreError::MalformedResponse { .. })
        ));
    }

    #[test]
    fn load_derives_calendar_fields() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path(), RowPolicy::Fail);
        let name = store
            .persist(&response(TWO_STEPS), "smhi", &mut ScriptedPrompt::default())
            .unwrap();
        let series = store.load(&name).unwrap();

        assert_eq!(series.len(), 4);
        let first = &series.rows[0];
        assert_eq!(first.date, "2021-01-01");
        assert_eq!(first.time, "12:00:00");
        assert_eq!(first.weekday, "Friday");
        assert_eq!(first.date_time_text(), "2021-01-01 12:00:00");
        assert_eq!(series.parameter_names(), vec!["t", "ws"]);
    }

    fn write_raw(dir: &Path, name: &str, text: &str) {
        let mut file = std::fs::File::create(dir.join(format!("{name}.csv"))).unwrap();
        file.write_all(text.as_bytes()).unwrap();
    }

    #[test]
    fn load_fails_hard_on_a_malformed_timestamp() {
        let dir = tempfile::tempdir().unwrap();
        write_raw(
            dir.path(),
            "broken",
            "Composite_Dates,Name,Unit,Values\n2021-01-01T12:00:00,t,Cel,1\nyesterday,t,Cel,2\n",
        );
        let err = store(dir.path(), RowPolicy::Fail).load("broken").unwrap_err();
        match err {
            StoreError::MalformedTimestamp { row, value } => {
                assert_eq!(row, 1);
                assert_eq!(value, "yesterday");
            }
            other => panic!("unexpected error: {other:?}"),
        }

        let lenient = store(dir.path(), RowPolicy::Skip).load("broken").unwrap();
        assert_eq!(lenient.len(), 1);
    }

    #[test]
    fn load_reports_missing_file_and_columns() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path(), RowPolicy::Fail);
        assert!(matches!(store.load("absent"), Err(StoreError::Io(..))));

        write_raw(dir.path(), "narrow", "Composite_Dates,Name\n2021-01-01T12:00:00,t\n");
        assert!(matches!(
            store.load("narrow"),
            Err(StoreError::MissingColumn { .. })
        ));
    }
}
