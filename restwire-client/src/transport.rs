//! Default primary transport.
//!
//! [`HyperTransport`] is what a named client sends through when its settings
//! supply no base handler. It negotiates HTTP/1.1 or HTTP/2 over rustls
//! (ring, bundled Mozilla roots) and pools connections per client.
//!
//! ```ignore
//! use restwire_client::transport::HyperTransportBuilder;
//! use std::time::Duration;
//!
//! let transport = HyperTransportBuilder::new()
//!     .connect_timeout(Duration::from_secs(2))
//!     .build()?;
//! builder.primary_handler(Arc::new(transport));
//! ```

mod connector;
mod hyper;

pub use connector::{build_https_connector, default_tls_config};
pub use hyper::{HyperTransport, HyperTransportBuilder};

pub use rustls::ClientConfig as TlsClientConfig;
