//! Declarative client configuration.
//!
//! [`HttpClientOptions`] mirrors the builder settings of
//! [`HttpClientBuilder`](crate::HttpClientBuilder) in a form that can be loaded
//! from a configuration file.
//!
//! # Example
//!
//! ```ignore
//! let options: HttpClientOptions = serde_json::from_str(r#"{
//!     "base_address": "https://orders.internal/api/",
//!     "timeout_ms": 2500,
//!     "default_headers": { "x-tenant": "contoso" }
//! }"#)?;
//!
//! let mut builder = HttpClientBuilder::new("orders");
//! builder.options(&options)?;
//! ```

use std::collections::BTreeMap;
use std::time::Duration;

use serde::Deserialize;

/// Options for a named client.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HttpClientOptions {
    /// Base address that relative request URIs are resolved against.
    pub base_address: Option<String>,
    /// Timeout for a whole send, handlers included.
    pub timeout_ms: Option<u64>,
    /// Headers added to every request that does not already carry them.
    pub default_headers: BTreeMap<String, String>,
}

impl HttpClientOptions {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }
}
