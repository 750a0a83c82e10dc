//! Operator interaction: the [`Prompt`] seam, a stdin implementation for the
//! binary, a scripted implementation for tests and batch runs, and the bounded
//! retry policy shared by every interactive loop.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::io::{self, BufRead, Write};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Error)]
pub enum PromptError {
    #[error("Operator input stream closed")]
    Closed,

    #[error("Failed to talk to the operator")]
    Io(#[from] io::Error),

    #[error("Cancelled while waiting for {what}")]
    Cancelled { what: &'static str },

    #[error("Gave up on {what} after {attempts} attempts")]
    AttemptsExhausted { what: &'static str, attempts: u32 },
}

/// Where questions go and answers come from.
pub trait Prompt {
    /// Shows `message` and returns the operator's answer without the line ending.
    fn ask(&mut self, message: &str) -> Result<String, PromptError>;

    /// Shows an informational line that needs no answer.
    fn say(&mut self, message: &str);
}

/// Bounds every interactive loop of the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum number of answers read before giving up. `0` is treated as `1`.
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_attempts: 5 }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32) -> Self {
        Self { max_attempts }
    }

    /// Attempt numbers `1..=max_attempts`.
    pub fn attempts(&self) -> std::ops::RangeInclusive<u32> {
        1..=self.max_attempts.max(1)
    }

    pub fn exhausted(&self, what: &'static str) -> PromptError {
        PromptError::AttemptsExhausted {
            what,
            attempts: self.max_attempts.max(1),
        }
    }
}

/// Fails with [`PromptError::Cancelled`] once `token` is cancelled.
pub fn check_cancelled(token: &CancellationToken, what: &'static str) -> Result<(), PromptError> {
    if token.is_cancelled() {
        Err(PromptError::Cancelled { what })
    } else {
        Ok(())
    }
}

/// Asks until `parse` accepts an answer, reporting each rejection to the operator.
pub fn ask_until<T>(
    prompt: &mut dyn Prompt,
    policy: RetryPolicy,
    token: &CancellationToken,
    what: &'static str,
    message: &str,
    mut parse: impl FnMut(&str) -> Result<T, String>,
) -> Result<T, PromptError> {
    for attempt in policy.attempts() {
        check_cancelled(token, what)?;
        let answer = prompt.ask(message)?;
        match parse(answer.trim()) {
            Ok(value) => return Ok(value),
            Err(reason) => {
                log::debug!("Rejected {what} (attempt {attempt}): {reason}");
                prompt.say(&format!(">>> {reason}"));
            }
        }
    }
    Err(policy.exhausted(what))
}

/// Reads answers from stdin and writes questions to stdout.
#[derive(Debug, Default)]
pub struct StdinPrompt;

impl Prompt for StdinPrompt {
    fn ask(&mut self, message: &str) -> Result<String, PromptError> {
        let mut stdout = io::stdout().lock();
        write!(stdout, "{message}")?;
        stdout.flush()?;
        drop(stdout);

        let mut line = String::new();
        if io::stdin().lock().read_line(&mut line)? == 0 {
            return Err(PromptError::Closed);
        }
        Ok(line.trim_end_matches(['\r', '\n']).to_string())
    }

    fn say(&mut self, message: &str) {
        println!("{message}");
    }
}

/// Replays canned answers and records everything shown to the operator.
///
/// Running out of answers behaves like a closed stdin, so a batch run never blocks.
#[derive(Debug, Default, Clone)]
pub struct ScriptedPrompt {
    answers: VecDeque<String>,
    pub transcript: Vec<String>,
}

impl ScriptedPrompt {
    pub fn new<I, S>(answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            answers: answers.into_iter().map(Into::into).collect(),
            transcript: Vec::new(),
        }
    }

    pub fn remaining(&self) -> usize {
        self.answers.len()
    }
}

impl Prompt for ScriptedPrompt {
    fn ask(&mut self, message: &str) -> Result<String, PromptError> {
        self.transcript.push(message.to_string());
        self.answers.pop_front().ok_or(PromptError::Closed)
    }

    fn say(&mut self, message: &str) {
        self.transcript.push(message.to_string());
    }
}
