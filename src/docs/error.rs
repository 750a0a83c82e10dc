use crate::clients::error::HttpError;
use crate::store::error::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CrawlError {
    /// The documentation page no longer has the element wrapping the parameter table.
    #[error("Crawler cannot find element '{container}'. Please visit {url} to update the id")]
    SchemaNotFound { container: String, url: String },

    /// The table was found but some expected parameter keys are missing from it.
    #[error("Parameter table at {url} is missing expected parameters: {}", missing.join(", "))]
    SchemaDrift { missing: Vec<String>, url: String },

    #[error("Row {row} has {cells} cells, expected 6")]
    MalformedRow { row: usize, cells: usize },

    #[error("Invalid CSS selector: {0}")]
    Selector(String),

    #[error(transparent)]
    Http(#[from] HttpError),

    #[error(transparent)]
    Store(#[from] StoreError),
}
