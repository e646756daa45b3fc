use super::{FetchError, Page, Transport};
use std::time::Duration;
use tracing::{debug, trace};
use ureq::tls::{TlsConfig, TlsProvider};
use ureq::Agent;

/// Default Helius API server. Override with the `HELIUS_API_URL` environment
/// variable. See `cargo run -- --help`
pub const DEFAULT_API_URL: &str = "https://api.helius.xyz";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Client for the Helius enhanced-transactions API.
///
/// Holds the API credential explicitly; nothing here reads the environment.
pub struct HeliusClient {
    agent: Agent,
    api_server: String,
    api_key: String,
}

impl HeliusClient {
    /// Create a new Helius client with the provided API server URI and
    /// credential.
    ///
    /// # Example
    ///
    /// ```no_run
    /// # use solexport::client::helius::{HeliusClient, DEFAULT_API_URL};
    /// let client = HeliusClient::new(DEFAULT_API_URL, "my-api-key".to_string());
    /// ```
    pub fn new(api_server: &str, api_key: String) -> Self {
        let agent = Agent::from(
            Agent::config_builder()
                .timeout_global(Some(REQUEST_TIMEOUT))
                .tls_config(
                    TlsConfig::builder()
                        .provider(TlsProvider::NativeTls)
                        .build(),
                )
                .build(),
        );

        Self {
            agent,
            api_server: api_server.trim_end_matches('/').to_string(),
            api_key,
        }
    }
}

impl Transport for HeliusClient {
    fn get_page(&self, address: &str, before: Option<&str>) -> Result<Page, FetchError> {
        let url = format!(
            "{server}/v0/addresses/{address}/transactions",
            server = self.api_server
        );

        debug!("Requesting transactions for `{address}` before {before:?}");

        let mut req = self.agent.get(&url).query("api-key", &self.api_key);
        if let Some(before) = before {
            req = req.query("before", before);
        }

        let mut resp = req.call().map_err(|err| match err {
            ureq::Error::StatusCode(429) => FetchError::RateLimited,
            ureq::Error::StatusCode(status) => FetchError::Status(status),
            err => FetchError::Transport(err.to_string()),
        })?;

        let page: Page = resp
            .body_mut()
            .read_json()
            .map_err(|err| FetchError::Body(err.to_string()))?;

        debug!("Received {} transactions", page.len());
        trace!("{page:#?}");

        Ok(page)
    }
}
