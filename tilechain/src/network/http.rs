//! HTTP client abstraction for testability

use std::time::Duration;

use thiserror::Error;

/// Default request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Errors from a single HTTP transfer.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum HttpError {
    /// The client could not be constructed.
    #[error("Failed to create HTTP client: {0}")]
    Client(String),

    /// The request could not be sent or the body could not be read.
    #[error("Request failed: {0}")]
    Request(String),

    /// The server answered with a non-success status.
    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },
}

/// Trait for HTTP client operations.
///
/// This abstraction allows for dependency injection and easier testing
/// by enabling mock HTTP clients in tests. One call is one attempt; retry
/// policy, if any, belongs to the caller.
pub trait HttpClient: Send + Sync {
    /// Performs an HTTP GET request.
    ///
    /// # Arguments
    ///
    /// * `url` - The URL to request
    ///
    /// # Returns
    ///
    /// The response body as bytes or an error.
    fn get(&self, url: &str) -> Result<Vec<u8>, HttpError>;
}

/// Real HTTP client implementation using reqwest.
///
/// Uses the blocking client: requests run on provider worker threads, never
/// on a caller's thread.
pub struct ReqwestClient {
    client: reqwest::blocking::Client,
}

impl ReqwestClient {
    /// Creates a new ReqwestClient with default configuration.
    pub fn new() -> Result<Self, HttpError> {
        Self::with_timeout(DEFAULT_TIMEOUT_SECS, None)
    }

    /// Creates a new ReqwestClient with custom timeout and user agent.
    ///
    /// Many public tile servers reject requests without an identifying
    /// user agent.
    pub fn with_timeout(timeout_secs: u64, user_agent: Option<&str>) -> Result<Self, HttpError> {
        let mut builder =
            reqwest::blocking::Client::builder().timeout(Duration::from_secs(timeout_secs));
        if let Some(agent) = user_agent {
            builder = builder.user_agent(agent.to_string());
        }

        let client = builder
            .build()
            .map_err(|e| HttpError::Client(e.to_string()))?;

        Ok(Self { client })
    }
}

impl HttpClient for ReqwestClient {
    fn get(&self, url: &str) -> Result<Vec<u8>, HttpError> {
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|e| HttpError::Request(e.to_string()))?;

        // Check HTTP status
        if !response.status().is_success() {
            return Err(HttpError::Status {
                status: response.status().as_u16(),
                url: url.to_string(),
            });
        }

        // Read response body
        response
            .bytes()
            .map(|b| b.to_vec())
            .map_err(|e| HttpError::Request(format!("Failed to read response: {}", e)))
    }
}
