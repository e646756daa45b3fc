use serde_json::Value;
use thiserror::Error;

pub mod helius;
pub mod history;
pub mod retry;

/// One page of enhanced transactions, as raw JSON elements.
///
/// Elements are kept as [`Value`] so that a single malformed transaction can
/// be skipped without losing the rest of the page (or the pagination cursor,
/// which is read from the last raw element).
pub type Page = Vec<Value>;

/// The public interface for fetching transaction history pages.
///
/// Exists as a trait so that unit tests can mock the API responses.
pub trait Transport {
    /// Get the page of transactions for `address` older than the `before`
    /// signature, newest first. An empty page signals end of history.
    fn get_page(&self, address: &str, before: Option<&str>) -> Result<Page, FetchError>;
}

/// A single-request failure. All variants are retryable; the retry policy only
/// distinguishes [`FetchError::RateLimited`] to cap its backoff delay.
#[derive(Clone, Debug, Error)]
pub enum FetchError {
    #[error("Rate limited by the transactions API")]
    RateLimited,

    #[error("Unexpected HTTP status {0}")]
    Status(u16),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Unreadable response body: {0}")]
    Body(String),
}

impl retry::Retryable for FetchError {
    fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited)
    }
}
