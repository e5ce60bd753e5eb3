//! Network collaborators used by the network-backed providers.
//!
//! - [`ConnectivityProbe`] - polled by the dispatcher's eligibility filter
//! - [`HttpClient`] - single-attempt byte transfer, mockable in tests
//! - [`TileFetcher`] - download a tile and persist it to the tile store

mod connectivity;
mod fetcher;
mod http;

pub use connectivity::{AlwaysConnected, ConnectivityProbe, ManualConnectivity};
pub use fetcher::{HttpTileFetcher, TileFetcher};
pub use http::{HttpClient, HttpError, ReqwestClient, DEFAULT_TIMEOUT_SECS};

#[cfg(test)]
pub use http::tests::MockHttpClient;
