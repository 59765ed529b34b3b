pub mod ollama;
pub mod openai;
pub mod prompt_builder;
mod prompts;
mod stream;

use thiserror::Error;

/// Failures surfaced to whoever asked for a generated message.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum GenerateError {
    #[error("On-device model not available. Run `mergebot status` or `mergebot pull`.")]
    ProviderUnavailable,

    #[error("No OpenAI API key configured.")]
    MissingCredential,

    #[error("{0}")]
    RequestFailed(String),
}

/// A text-generation backend.
///
/// `Ok(None)` means the backend produced nothing usable; it is up to the caller
/// whether that is an error.
pub trait GenerationProvider {
    fn generate(&self, prompt: &str) -> Result<Option<String>, GenerateError>;
}

/// Truncate long strings for debug logging.
pub(crate) fn truncate(s: &str, max_len: usize) -> String {
    match s.char_indices().nth(max_len) {
        None => s.to_string(),
        Some((cut, _)) => format!("{}...\n[truncated {} chars]", &s[..cut], s.len() - cut),
    }
}
