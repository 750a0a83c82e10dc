use crate::prompt::{ask_until, Prompt, PromptError, RetryPolicy};
use crate::types::parameter::ParameterMetadata;
use log::info;
use tokio_util::sync::CancellationToken;

const WHAT: &str = "a parameter index";

/// Lets the operator pick one parameter from the crawled table.
pub struct ParameterSelector {
    retry: RetryPolicy,
    cancel: CancellationToken,
}

impl ParameterSelector {
    pub fn new(retry: RetryPolicy, cancel: CancellationToken) -> Self {
        Self { retry, cancel }
    }

    /// Lists `index <---> description` and reads an index until it names an entry.
    pub fn select(
        &self,
        table: &[ParameterMetadata],
        prompt: &mut dyn Prompt,
    ) -> Result<ParameterMetadata, PromptError> {
        for parameter in table {
            prompt.say(&format!("{} <---> {}", parameter.index, parameter.description));
        }

        let chosen = ask_until(
            prompt,
            self.retry,
            &self.cancel,
            WHAT,
            ">>> Enter an index number: ",
            |answer| {
                let index = answer
                    .parse::<usize>()
                    .map_err(|e| format!("Not a valid digit: {e}"))?;
                table
                    .iter()
                    .find(|p| p.index == index)
                    .cloned()
                    .ok_or_else(|| {
                        format!(
                            "Index {index} not found, choose between 0 and {}",
                            table.len().saturating_sub(1)
                        )
                    })
            },
        )?;
        info!("Selected parameter {}", chosen);
        Ok(chosen)
    }
}
