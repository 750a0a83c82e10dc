use crate::clients::error::HttpError;
use crate::prompt::PromptError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LocationError {
    /// No attempt produced a match before the retry bound was reached.
    #[error("The location was not found: '{query}' ({attempts} attempts)")]
    NotFound { query: String, attempts: u32 },

    /// The geocoding service failed; this attempt yields no location.
    #[error("Geocoding '{query}' failed")]
    Provider {
        query: String,
        #[source]
        source: HttpError,
    },

    #[error("Geocoder returned an unreadable reply for '{query}'")]
    ProviderReply {
        query: String,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Prompt(#[from] PromptError),
}

impl LocationError {
    pub fn is_provider_failure(&self) -> bool {
        matches!(
            self,
            LocationError::Provider { .. } | LocationError::ProviderReply { .. }
        )
    }
}
