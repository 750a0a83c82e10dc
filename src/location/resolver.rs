use crate::location::error::LocationError;
use crate::location::geocoder::Geocoder;
use crate::prompt::{check_cancelled, Prompt, RetryPolicy};
use crate::types::location::Location;
use log::{info, warn};
use tokio_util::sync::CancellationToken;

const WHAT: &str = "an address";
const ADDRESS_PROMPT: &str = "<<< Please enter an address: city in Sweden ";

/// Resolves operator addresses to coordinates, re-prompting on "not found".
pub struct LocationResolver {
    geocoder: Box<dyn Geocoder>,
    retry: RetryPolicy,
    cancel: CancellationToken,
}

impl LocationResolver {
    pub fn new(geocoder: Box<dyn Geocoder>, retry: RetryPolicy, cancel: CancellationToken) -> Self {
        Self {
            geocoder,
            retry,
            cancel,
        }
    }

    /// Geocodes `address`, or asks the operator for one when it is `None`.
    ///
    /// Every unknown address costs one attempt of the retry policy and leads to a
    /// fresh prompt.
    ///
    /// # Errors
    ///
    /// * [`LocationError::NotFound`] once the attempts are used up.
    /// * [`LocationError::Provider`] / [`LocationError::ProviderReply`] as soon as the
    ///   geocoding service fails; the caller decides whether to call again.
    /// * [`LocationError::Prompt`] when the operator input closes or the run is cancelled.
    pub fn resolve(
        &self,
        address: Option<&str>,
        prompt: &mut dyn Prompt,
    ) -> Result<Location, LocationError> {
        let mut given = address.map(str::to_string);
        let mut last_query = String::new();

        for attempt in self.retry.attempts() {
            check_cancelled(&self.cancel, WHAT)?;
            let query = match given.take() {
                Some(query) => query,
                None => prompt.ask(ADDRESS_PROMPT)?,
            };
            let query = query.trim().to_string();
            if query.is_empty() {
                prompt.say(">>> The address is empty");
                continue;
            }

            match self.geocoder.geocode(&query)? {
                Some(location) => {
                    info!("Resolved '{}' on attempt {}", query, attempt);
                    return Ok(location);
                }
                None => {
                    warn!("No match for '{}' (attempt {})", query, attempt);
                    prompt.say(&format!(">>> The location was not found: {query}"));
                    last_query = query;
                }
            }
        }

        Err(LocationError::NotFound {
            query: last_query,
            attempts: self.retry.max_attempts.max(1),
        })
    }
}
