//! Remote tile service access
//!
//! This module names the databases the service exposes, builds their
//! manifest, packet and image URLs, and defines the HTTP transport used to
//! fetch them.
//!
//! # Transport
//!
//! All network access goes through [`AsyncHttpClient`] so the caching and
//! traversal layers can be exercised against in-memory stubs:
//!
//! ```ignore
//! use timemachine::provider::{AsyncReqwestClient, Database};
//!
//! let client = AsyncReqwestClient::new()?;
//! let url = Database::TimeMachine.packet_url("0123", 42);
//! let response = client.get(&url).await?;
//! ```

mod database;
mod http;
mod types;

pub use database::Database;
pub use http::{
    format_http_date, parse_http_date, AsyncHttpClient, AsyncReqwestClient, ConditionalResponse,
    HttpResponse, DEFAULT_TIMEOUT_SECS,
};
pub use types::ProviderError;

#[cfg(test)]
pub use http::tests::{MockAsyncHttpClient, MockRoute};
