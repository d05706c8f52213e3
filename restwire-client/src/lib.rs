//! Named HTTP client pipelines for Rust.
//!
//! This crate provides the outbound half of `restwire`: an [`HttpClient`]
//! built from a primary handler (the innermost sender, a [`HyperTransport`] by
//! default) wrapped by delegating handlers.
//!
//! ## Features
//!
//! - Replaceable primary handler ([`Transport`])
//! - Delegating handlers ([`HeaderHandler`], [`FnHandler`])
//! - Per-request bearer tokens ([`AuthHeaderHandler`])
//! - Base address, default headers and a whole-send timeout
//! - Declarative options loaded with serde ([`HttpClientOptions`])
//! - `tower::Service` implementation for [`HttpClient`]
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use restwire_client::{HttpClientBuilder, HyperTransport, HeaderHandler};
//!
//! let mut builder = HttpClientBuilder::new("orders");
//! builder
//!     .base_address("https://orders.internal/api/".parse()?)
//!     .with_handler(HeaderHandler::new("x-tenant", "contoso"));
//! let client = builder.build(Arc::new(HyperTransport::new()?));
//!
//! let response = client
//!     .send(http::Request::get("/orders/7").body(bytes::Bytes::new())?)
//!     .await?;
//! ```
//!
//! ## Authorization
//!
//! [`AuthHeaderHandler`] is a primary handler: it asks its [`TokenGetter`] for
//! a token on every request, sets `Authorization: Bearer <token>` and forwards
//! to the transport it wraps. A failing getter fails the request before
//! anything reaches the network.
//!
//! ```ignore
//! use restwire_client::{AuthHeaderHandler, token_getter};
//!
//! let getter = token_getter(|_req| async { Ok(vault.token().await?) });
//! builder.wrap_primary_handler(move |inner| Arc::new(AuthHeaderHandler::new(getter, inner)));
//! ```
//!
//! ## Cancellation
//!
//! A send is a plain future. Dropping it cancels the handler chain, the token
//! lookup and the in-flight request. [`HttpClientBuilder::timeout`] bounds the
//! whole send and surfaces as [`ClientError::Timeout`].
//!
//! ## Feature Flags
//!
//! | Feature | Description | Dependencies |
//! |---------|-------------|--------------|
//! | `tracing` | `http.send` span per request, token failures logged | `tracing` |

mod auth;
mod builder;
mod client;
pub mod config;
mod error;
pub mod handler;
pub mod transport;

pub use auth::{AuthHeaderHandler, DEFAULT_AUTH_SCHEME, TokenGetter, token_getter};
pub use builder::{HttpClientBuilder, PrimaryWrapper};
pub use client::HttpClient;
pub use config::HttpClientOptions;
pub use error::ClientError;

// Re-export from handler module
pub use handler::{
    BoxFuture, DelegatingHandler, FnHandler, FnTransport, HandlerChain, HeaderHandler, Next,
    SendFunc, Transport, transport_fn,
};

// Re-export transport types at the top level for convenience
pub use transport::{HyperTransport, HyperTransportBuilder, TlsClientConfig};

pub use bytes::Bytes;

/// Request type sent through a pipeline.
pub type HttpRequest = http::Request<Bytes>;

/// Response type returned by a pipeline.
pub type HttpResponse = http::Response<Bytes>;
