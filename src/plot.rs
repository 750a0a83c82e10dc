//! Renders a filtered sample as a PNG line chart with a mean overlay.

use crate::config::{PipelineConfig, RowPolicy};
use crate::prompt::Prompt;
use crate::store::artifacts::{ArtifactStore, CSV, PNG};
use crate::store::error::StoreError;
use crate::store::frame::series_rows;
use crate::types::forecast::{mean_of, SeriesRow};
use crate::types::location::Location;
use crate::types::parameter::ParameterMetadata;
use chrono::{Duration, NaiveDateTime};
use log::{debug, info, warn};
use plotters::coord::Shift;
use plotters::drawing::DrawingAreaErrorKind;
use plotters::prelude::*;
use plotters::style::register_font;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use thiserror::Error;

const FONT_FAMILY: &str = "smhi-chart";

/// DejaVu Sans, used when none of the configured fonts can be registered.
static BUNDLED_FONT: &[u8] = include_bytes!("../assets/fonts/DejaVuSans.ttf");

static FONT: OnceLock<Result<String, String>> = OnceLock::new();

#[derive(Debug, Error)]
pub enum PlotError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Sample '{0}' has no rows to plot")]
    EmptySeries(String),

    #[error("Failed to draw chart: {0}")]
    Draw(String),
}

impl<E: std::error::Error + Send + Sync> From<DrawingAreaErrorKind<E>> for PlotError {
    fn from(e: DrawingAreaErrorKind<E>) -> Self {
        PlotError::Draw(e.to_string())
    }
}

/// Registers the first usable font of `paths` for chart text, falling back to
/// the bundled DejaVu Sans.
///
/// Registration happens once per process; later calls reuse the first outcome
/// whatever paths they pass. Returns where the font came from.
fn chart_font(paths: &[PathBuf]) -> Result<&'static str, PlotError> {
    let registered = FONT.get_or_init(|| {
        for path in paths {
            let Ok(bytes) = std::fs::read(path) else {
                debug!("Font {} not readable", path.display());
                continue;
            };
            let bytes: &'static [u8] = Box::leak(bytes.into_boxed_slice());
            match register_font(FONT_FAMILY, FontStyle::Normal, bytes) {
                Ok(()) => {
                    info!("Chart font: {}", path.display());
                    return Ok(path.display().to_string());
                }
                Err(_) => warn!("Unusable font {}", path.display()),
            }
        }
        register_font(FONT_FAMILY, FontStyle::Normal, BUNDLED_FONT)
            .map(|()| {
                info!("Chart font: bundled DejaVu Sans");
                "bundled DejaVu Sans".to_string()
            })
            .map_err(|_| "no chart font".to_string())
    });
    match registered {
        Ok(source) => Ok(source.as_str()),
        Err(reason) => Err(PlotError::Draw(reason.clone())),
    }
}

/// One chart point per row: hours since the first timestamp and the primary value.
fn chart_points(rows: &[SeriesRow]) -> Vec<(f64, f64)> {
    let Some(start) = rows.iter().map(|r| r.date_time).min() else {
        return Vec::new();
    };
    let mut points: Vec<(f64, f64)> = rows
        .iter()
        .map(|r| {
            let hours = (r.date_time - start).num_minutes() as f64 / 60.0;
            (hours, r.row.primary_value())
        })
        .filter(|(_, y)| y.is_finite())
        .collect();
    points.sort_by(|a, b| a.0.total_cmp(&b.0));
    points
}

fn padded(min: f64, max: f64) -> (f64, f64) {
    let pad = if max > min { (max - min) * 0.05 } else { 1.0 };
    (min - pad, max + pad)
}

/// What one chart shows.
struct Chart<'a> {
    points: Vec<(f64, f64)>,
    mean: f64,
    start: NaiveDateTime,
    title: String,
    parameter: &'a ParameterMetadata,
}

impl<'a> Chart<'a> {
    fn new(
        rows: &[SeriesRow],
        sample_name: &str,
        location: &Location,
        parameter: &'a ParameterMetadata,
    ) -> Result<Self, PlotError> {
        let empty = || PlotError::EmptySeries(sample_name.to_string());
        let mean = mean_of(rows.iter().map(|r| &r.row)).ok_or_else(empty)?;
        let start = rows.iter().map(|r| r.date_time).min().ok_or_else(empty)?;
        Ok(Self {
            points: chart_points(rows),
            mean,
            start,
            title: format!("Forecast for the next 10 days in {}", location.display_name),
            parameter,
        })
    }

    fn draw<DB: DrawingBackend>(&self, root: &DrawingArea<DB, Shift>) -> Result<(), PlotError> {
        let points = &self.points;
        let mean = self.mean;
        let max_x = points.last().map(|p| p.0).filter(|x| *x > 0.0).unwrap_or(1.0);
        let (min_y, max_y) = padded(
            points.iter().map(|p| p.1).fold(mean, f64::min),
            points.iter().map(|p| p.1).fold(mean, f64::max),
        );

        root.fill(&WHITE)?;

        let mut chart = ChartBuilder::on(root)
            .margin(20)
            .caption(&self.title, (FONT_FAMILY, 28).into_font())
            .x_label_area_size(60)
            .y_label_area_size(80)
            .build_cartesian_2d(0f64..max_x, min_y..max_y)?;

        let start = self.start;
        let x_label = |x: &f64| {
            (start + Duration::minutes((x * 60.0).round() as i64))
                .format("%a %d %H:%M")
                .to_string()
        };
        chart
            .configure_mesh()
            .x_labels(10)
            .x_label_formatter(&x_label)
            .y_desc(self.parameter.description.as_str())
            .label_style((FONT_FAMILY, 14).into_font())
            .axis_desc_style((FONT_FAMILY, 18).into_font())
            .draw()?;

        let line = GREEN.stroke_width(3);
        chart
            .draw_series(LineSeries::new(points.iter().copied(), line))?
            .label(self.parameter.unit.as_str())
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], line));

        // Flat dashed line at the sample mean.
        let dash = max_x / 120.0;
        let dashes = (0..120).step_by(2).map(|i| {
            let x0 = i as f64 * dash;
            PathElement::new(vec![(x0, mean), (x0 + dash, mean)], BLACK.stroke_width(1))
        });
        chart
            .draw_series(dashes)?
            .label("Mean")
            .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], BLACK));

        chart
            .configure_series_labels()
            .label_font((FONT_FAMILY, 16).into_font())
            .background_style(WHITE.mix(0.8))
            .draw()?;

        root.present()?;
        Ok(())
    }
}

pub struct Plotter {
    artifacts: ArtifactStore,
    size: (u32, u32),
    font_paths: Vec<PathBuf>,
}

impl Plotter {
    pub fn new(artifacts: ArtifactStore, config: &PipelineConfig) -> Self {
        Self {
            artifacts,
            size: config.chart_size,
            font_paths: config.font_paths.clone(),
        }
    }

    /// Reloads `<sample_name>.csv` and saves the chart as `<sample_name>.png`.
    ///
    /// The title names `location`, the y axis is labelled with the parameter
    /// description and the legend shows its unit next to `Mean`. An existing PNG of
    /// the same name is never replaced; the collision policy picks another name.
    ///
    /// The line plots each row's primary (first) value while the dashed line is
    /// the mean of every value in the sample. For parameters reported at several
    /// levels the mean therefore need not sit on the plotted line.
    pub fn render(
        &self,
        sample_name: &str,
        location: &Location,
        parameter: &ParameterMetadata,
        prompt: &mut dyn Prompt,
    ) -> Result<PathBuf, PlotError> {
        let csv_path = self.artifacts.path_for(sample_name, CSV);
        let df = self.artifacts.read_csv(sample_name)?;
        let rows = series_rows(&df, &csv_path, RowPolicy::Fail)?;
        let chart = Chart::new(&rows, sample_name, location, parameter)?;
        chart_font(&self.font_paths)?;

        let name = self.artifacts.write_new_at(sample_name, PNG, prompt, |path: &Path| {
            let root = BitMapBackend::new(path, self.size).into_drawing_area();
            chart.draw(&root)
        })?;

        let png = self.artifacts.path_for(&name, PNG);
        info!("Chart saved to {}", png.display());
        Ok(png)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CollisionPolicy;
    use crate::prompt::{RetryPolicy, ScriptedPrompt};
    use crate::store::frame::series_frame;
    use crate::types::forecast::ForecastRow;
    use tokio_util::sync::CancellationToken;

    fn rows() -> Vec<SeriesRow> {
        [("2021-01-01T12:00:00", 1.0), ("2021-01-01T13:00:00", 3.0), ("2021-01-02T00:00:00", 2.0)]
            .into_iter()
            .map(|(ts, v)| {
                SeriesRow::derive(ForecastRow {
                    composite_timestamp: ts.to_string(),
                    parameter_name: "t".to_string(),
                    unit: "Cel".to_string(),
                    values: vec![v],
                })
                .unwrap()
            })
            .collect()
    }

    fn parameter() -> ParameterMetadata {
        ParameterMetadata {
            index: 1,
            name: "t".to_string(),
            unit: "Cel".to_string(),
            description: "Air temperature".to_string(),
            level_type: "hl".to_string(),
            level: "2".to_string(),
            value_range: String::new(),
        }
    }

    fn plotter(dir: &Path) -> Plotter {
        let config = PipelineConfig::builder()
            .chart_size((400, 200))
            .font_paths(vec![])
            .build();
        let store = ArtifactStore::new(
            dir,
            CollisionPolicy::Suffix,
            RetryPolicy::default(),
            CancellationToken::new(),
        )
        .unwrap();
        Plotter::new(store, &config)
    }

    #[test]
    fn points_are_hours_from_the_first_row() {
        let points = chart_points(&rows());
        assert_eq!(points, vec![(0.0, 1.0), (1.0, 3.0), (12.0, 2.0)]);
    }

    #[test]
    fn mean_covers_every_level_while_the_line_uses_the_first() {
        let mut rows = rows();
        rows[0].row.values = vec![1.0, 5.0];
        let location = Location::new("Stockholm", "Stockholm", 59.33, 18.06).unwrap();
        let parameter = parameter();
        let chart = Chart::new(&rows, "weather_sample", &location, &parameter).unwrap();
        assert_eq!(chart.points[0], (0.0, 1.0));
        assert!((chart.mean - 11.0 / 4.0).abs() < 1e-12);
    }

    #[test]
    fn font_is_registered_once_per_process() {
        let first = chart_font(&[]).unwrap();
        let second = chart_font(&[PathBuf::from("/other/font.ttf")]).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn chart_text_is_drawn_without_configured_fonts() {
        chart_font(&[PathBuf::from("/nonexistent/font.ttf")]).unwrap();
        let location = Location::new("Stockholm", "Stockholm, Sverige", 59.33, 18.06).unwrap();
        let parameter = parameter();
        let chart = Chart::new(&rows(), "weather_sample", &location, &parameter).unwrap();
        assert_eq!(chart.title, "Forecast for the next 10 days in Stockholm, Sverige");

        let (width, height) = (400u32, 200u32);
        let mut buffer = vec![0u8; (width * height * 3) as usize];
        {
            let root = BitMapBackend::with_buffer(&mut buffer, (width, height)).into_drawing_area();
            chart.draw(&root).unwrap();
        }
        // The caption sits in the band between the top margin and the plot area.
        let caption_band = (20..48u32).flat_map(|y| (100..300u32).map(move |x| (x, y)));
        let inked = caption_band
            .filter(|&(x, y)| {
                let i = ((y * width + x) * 3) as usize;
                buffer[i..i + 3] != [255, 255, 255]
            })
            .count();
        assert!(inked > 0, "no caption pixels drawn");
    }

    #[test]
    fn render_writes_a_png_next_to_the_sample() {
        let dir = tempfile::tempdir().unwrap();
        let plotter = plotter(dir.path());
        let mut prompt = ScriptedPrompt::default();
        plotter
            .artifacts
            .write_csv("weather_sample", &mut series_frame(&rows()).unwrap(), &mut prompt)
            .unwrap();
        let location = Location::new("Stockholm", "Stockholm, Sverige", 59.33, 18.06).unwrap();

        let png = plotter
            .render("weather_sample", &location, &parameter(), &mut prompt)
            .unwrap();
        assert_eq!(png, dir.path().join("weather_sample.png"));
        let bytes = std::fs::read(&png).unwrap();
        assert_eq!(&bytes[..4], b"\x89PNG");

        // A second render keeps the first chart.
        let second = plotter
            .render("weather_sample", &location, &parameter(), &mut prompt)
            .unwrap();
        assert_eq!(second, dir.path().join("weather_sample-1.png"));
    }

    #[test]
    fn missing_sample_fails_without_touching_other_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let plotter = plotter(dir.path());
        std::fs::write(dir.path().join("smhi.csv"), "kept").unwrap();
        let location = Location::new("Stockholm", "", 59.33, 18.06).unwrap();

        let err = plotter
            .render("absent", &location, &parameter(), &mut ScriptedPrompt::default())
            .unwrap_err();
        assert!(matches!(err, PlotError::Store(StoreError::Io(..))));
        assert_eq!(std::fs::read_to_string(dir.path().join("smhi.csv")).unwrap(), "kept");
        assert!(!dir.path().join("absent.png").exists());
    }
}
