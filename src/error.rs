use crate::clients::error::HttpError;
use crate::config::ConfigError;
use crate::docs::error::CrawlError;
use crate::location::error::LocationError;
use crate::plot::PlotError;
use crate::prompt::PromptError;
use crate::store::error::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ForecastError {
    #[error(transparent)]
    Crawl(#[from] CrawlError),

    #[error(transparent)]
    Location(#[from] LocationError),

    #[error(transparent)]
    Http(#[from] HttpError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Plot(#[from] PlotError),

    #[error(transparent)]
    Prompt(#[from] PromptError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Why a run was aborted, as far as the exit status is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// A remote service (documentation page, geocoder, forecast API) failed.
    ExternalService,
    /// Data arrived but did not have the expected shape.
    MalformedData,
    /// The operator did not provide usable input in time.
    Operator,
    /// Local configuration or filesystem trouble.
    Local,
}

impl FailureClass {
    pub fn exit_code(self) -> i32 {
        match self {
            FailureClass::Local => 1,
            FailureClass::ExternalService => 2,
            FailureClass::MalformedData => 3,
            FailureClass::Operator => 4,
        }
    }
}

fn http_class(_: &HttpError) -> FailureClass {
    FailureClass::ExternalService
}

fn store_class(e: &StoreError) -> FailureClass {
    match e {
        _ if e.is_malformed_data() => FailureClass::MalformedData,
        StoreError::Naming(_) | StoreError::NamingCollision { .. } => FailureClass::Operator,
        _ => FailureClass::Local,
    }
}

impl ForecastError {
    pub fn failure_class(&self) -> FailureClass {
        match self {
            ForecastError::Crawl(e) => match e {
                CrawlError::SchemaNotFound { .. }
                | CrawlError::SchemaDrift { .. }
                | CrawlError::MalformedRow { .. } => FailureClass::MalformedData,
                CrawlError::Selector(_) => FailureClass::Local,
                CrawlError::Http(e) => http_class(e),
                CrawlError::Store(e) => store_class(e),
            },
            ForecastError::Location(e) => match e {
                LocationError::Provider { .. } => FailureClass::ExternalService,
                LocationError::ProviderReply { .. } => FailureClass::MalformedData,
                LocationError::NotFound { .. } | LocationError::Prompt(_) => {
                    FailureClass::Operator
                }
            },
            ForecastError::Http(e) => http_class(e),
            ForecastError::Store(e) => store_class(e),
            ForecastError::Plot(e) => match e {
                PlotError::Store(e) => store_class(e),
                PlotError::EmptySeries(_) => FailureClass::MalformedData,
                PlotError::Draw(_) => FailureClass::Local,
            },
            ForecastError::Prompt(_) => FailureClass::Operator,
            ForecastError::Config(_) => FailureClass::Local,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn exit_codes_separate_service_from_data_failures() {
        let service: ForecastError = HttpError::Status {
            url: "u".into(),
            status: StatusCode::BAD_GATEWAY,
        }
        .into();
        let schema: ForecastError = CrawlError::SchemaNotFound {
            container: "pmp3g-parameters".into(),
            url: "u".into(),
        }
        .into();
        let malformed: ForecastError = StoreError::MalformedTimestamp {
            row: 0,
            value: "x".into(),
        }
        .into();
        let operator: ForecastError = PromptError::Closed.into();

        assert_eq!(service.failure_class().exit_code(), 2);
        assert_eq!(schema.failure_class(), FailureClass::MalformedData);
        assert_eq!(malformed.failure_class().exit_code(), 3);
        assert_eq!(operator.failure_class().exit_code(), 4);
        assert_ne!(
            service.failure_class().exit_code(),
            malformed.failure_class().exit_code()
        );
    }

    #[test]
    fn wrapped_store_errors_keep_their_class() {
        let e: ForecastError = CrawlError::Store(StoreError::NamingCollision {
            name: "parameters_smhi".into(),
            dir: "/tmp".into(),
        })
        .into();
        assert_eq!(e.failure_class(), FailureClass::Operator);

        let e: ForecastError = PlotError::Store(StoreError::Io(
            "/tmp/x.csv".into(),
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        ))
        .into();
        assert_eq!(e.failure_class(), FailureClass::Local);
    }
}
