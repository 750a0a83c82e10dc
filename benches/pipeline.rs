use criterion::{black_box, criterion_group, criterion_main, Criterion};
use polars::prelude::IntoLazy;
use smhi_forecast::{
    parse_forecast, series_frame, ForecastFrameFilterExt, ForecastRow, SeriesRow,
};

const PARAMETERS: [(&str, &str); 4] = [("t", "Cel"), ("ws", "m/s"), ("msl", "hPa"), ("pmean", "kg/m2/h")];

/// Ten days of hourly steps, four parameters each.
fn forecast_body() -> String {
    let steps: Vec<String> = (0..240)
        .map(|h| {
            let parameters: Vec<String> = PARAMETERS
                .iter()
                .map(|(name, unit)| {
                    format!(r#"{{"name":"{name}","unit":"{unit}","values":[{}.5]}}"#, h % 30)
                })
                .collect();
            format!(
                r#"{{"validTime":"2021-01-{:02}T{:02}:00:00Z","parameters":[{}]}}"#,
                1 + h / 24,
                h % 24,
                parameters.join(",")
            )
        })
        .collect();
    format!(r#"{{"timeSeries":[{}]}}"#, steps.join(","))
}

fn bench_pipeline(c: &mut Criterion) {
    let body = forecast_body();
    let rows: Vec<ForecastRow> = parse_forecast(&body, "bench").unwrap();
    let series: Vec<SeriesRow> = rows.iter().cloned().filter_map(SeriesRow::derive).collect();
    let frame = series_frame(&series).unwrap();

    c.bench_function("parse_forecast", |b| {
        b.iter(|| parse_forecast(black_box(&body), "bench"))
    });
    c.bench_function("derive_series", |b| {
        b.iter(|| {
            black_box(&rows)
                .iter()
                .cloned()
                .filter_map(SeriesRow::derive)
                .count()
        })
    });
    c.bench_function("filter_parameter", |b| {
        b.iter(|| {
            frame
                .clone()
                .lazy()
                .filter_parameter(black_box("t"))
                .collect()
                .unwrap()
                .height()
        })
    });
}

criterion_group!(benches, bench_pipeline);
criterion_main!(benches);
