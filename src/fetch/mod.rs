// src/fetch/mod.rs

pub mod raw;
pub mod retry;
pub mod transport;

pub use raw::{RawResponse, ResponseParseError};
pub use retry::{RetryPolicy, Sleeper, ThreadSleeper};
pub use transport::{HttpTransport, TransientFetchError, Transport};

use thiserror::Error;
use tracing::{error, info, instrument, warn};
use url::Url;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("fetch failed after {attempts} attempts: {last}")]
    Exhausted {
        attempts: u32,
        #[source]
        last: TransientFetchError,
    },
    #[error(transparent)]
    Parse(#[from] ResponseParseError),
}

/// One parameterized request against the statistics API.
#[derive(Debug, Clone)]
pub struct CensusQuery {
    pub endpoint: Url,
    pub variables: Vec<String>,
    pub geography: String,
    pub key: String,
}

impl CensusQuery {
    /// `endpoint?get=<vars>&for=<geography>&key=<key>`
    pub fn url(&self) -> Url {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut()
            .append_pair("get", &self.variables.join(","))
            .append_pair("for", &self.geography)
            .append_pair("key", &self.key);
        url
    }

    /// Parameters safe to log.
    fn describe(&self) -> String {
        format!(
            "get={} for={} key=<redacted>",
            self.variables.join(","),
            self.geography
        )
    }
}

/// Fetch client owning the transport and the retry discipline.
pub struct CensusClient<T, S> {
    transport: T,
    sleeper: S,
    policy: RetryPolicy,
}

impl<T: Transport, S: Sleeper> CensusClient<T, S> {
    pub fn new(transport: T, sleeper: S, policy: RetryPolicy) -> Self {
        Self {
            transport,
            sleeper,
            policy,
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Run `query` until it yields a decodable table or attempts run out.
    /// Malformed payloads fail at once.
    #[instrument(level = "info", skip_all, fields(geography = %query.geography))]
    pub fn fetch(&self, query: &CensusQuery) -> Result<RawResponse, FetchError> {
        let url = query.url();
        let params = query.describe();
        let max = self.policy.max_attempts();
        let mut attempt = 0;

        loop {
            info!(attempt = attempt + 1, max, %params, "fetching");
            match self.transport.get(&url) {
                Ok(body) => {
                    return match RawResponse::from_json(&body) {
                        Ok(raw) => {
                            info!(attempt = attempt + 1, rows = raw.len(), "fetched");
                            Ok(raw)
                        }
                        Err(e) => {
                            error!(attempt = attempt + 1, error = %e, "undecodable response");
                            Err(e.into())
                        }
                    };
                }
                Err(e) => match self.policy.delay_after(attempt) {
                    Some(delay) => {
                        warn!(
                            attempt = attempt + 1,
                            max,
                            delay_ms = delay.as_millis() as u64,
                            error = %e,
                            "Retrying"
                        );
                        self.sleeper.sleep(delay);
                        attempt += 1;
                    }
                    None => {
                        error!(attempt = attempt + 1, max, error = %e, "Exhausted retries");
                        return Err(FetchError::Exhausted {
                            attempts: attempt + 1,
                            last: e,
                        });
                    }
                },
            }
        }
    }
}
