use reqwest::blocking::Client;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Failures worth another attempt.
#[derive(Debug, Error)]
pub enum TransientFetchError {
    #[error("request failed: {0}")]
    Request(String),
    #[error("request timed out: {0}")]
    Timeout(String),
    #[error("HTTP status {status}")]
    Status { status: u16 },
    #[error("reading response body failed: {0}")]
    Body(String),
}

/// One blocking GET returning the body of a 2xx response.
pub trait Transport {
    fn get(&self, url: &Url) -> Result<String, TransientFetchError>;
}

impl<T: Transport + ?Sized> Transport for &T {
    fn get(&self, url: &Url) -> Result<String, TransientFetchError> {
        (**self).get(url)
    }
}

/// `reqwest` blocking client with a per-request timeout.
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(timeout).gzip(true).build()?;
        Ok(Self { client })
    }
}

impl Transport for HttpTransport {
    fn get(&self, url: &Url) -> Result<String, TransientFetchError> {
        // errors are stripped of their URL so the key never reaches a log
        let resp = self.client.get(url.clone()).send().map_err(|e| {
            let e = e.without_url();
            if e.is_timeout() {
                TransientFetchError::Timeout(e.to_string())
            } else {
                TransientFetchError::Request(e.to_string())
            }
        })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(TransientFetchError::Status {
                status: status.as_u16(),
            });
        }

        resp.text()
            .map_err(|e| TransientFetchError::Body(e.without_url().to_string()))
    }
}
