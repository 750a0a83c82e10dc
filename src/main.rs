use log::error;
use smhi_forecast::{
    ForecastError, NominatimGeocoder, Pipeline, PipelineConfig, Prompt, StdinPrompt,
};
use std::error::Error;
use std::process;

/// Logs `err` with its causes and returns the exit status for it.
fn report(err: &dyn Error, code: i32) -> i32 {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(&format!("\n  caused by: {cause}"));
        source = cause.source();
    }
    error!("{message}");
    eprintln!(">>> {message}");
    code
}

fn fail(err: impl Into<ForecastError>) -> i32 {
    let err = err.into();
    report(&err, err.failure_class().exit_code())
}

fn run(prompt: &mut StdinPrompt) -> Result<(), i32> {
    let config = PipelineConfig::load().map_err(fail)?;
    let geocoder = NominatimGeocoder::new(&config).map_err(fail)?;
    let mut pipeline = Pipeline::builder()
        .config(config)
        .geocoder(Box::new(geocoder))
        .build()
        .map_err(fail)?;

    let outcome = pipeline
        .run(None, prompt)
        .map_err(|e| report(&e, e.exit_code()))?;
    prompt.say(&format!(
        ">>> {} rows of '{}' for {} (mean {:.2} {})",
        outcome.sample.rows.len(),
        outcome.parameter.key(),
        outcome.location.display_name,
        outcome.sample.mean,
        outcome.parameter.unit
    ));
    prompt.say(&format!(">>> Chart: {}", outcome.chart.display()));
    Ok(())
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut prompt = StdinPrompt;
    match run(&mut prompt) {
        Ok(()) => prompt.say(">>> Finished!"),
        Err(code) => process::exit(code),
    }
}
