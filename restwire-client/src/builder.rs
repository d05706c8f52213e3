//! Client builder.
//!
//! Provides the configuration surface of a named [`HttpClient`]: base address,
//! default headers, timeout, the primary handler and the delegating handlers
//! around it.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use http::{HeaderMap, HeaderName, HeaderValue, Uri};

use crate::client::HttpClient;
use crate::config::HttpClientOptions;
use crate::handler::{DelegatingHandler, HandlerChain, Transport, transport_fn};
use crate::ClientError;

/// Decorates the primary handler once it is known.
pub type PrimaryWrapper = Box<dyn FnOnce(Arc<dyn Transport>) -> Arc<dyn Transport> + Send>;

/// Builder for an [`HttpClient`].
///
/// The primary handler is the innermost sender. It is the default transport
/// handed to [`build`](Self::build) unless [`primary_handler`](Self::primary_handler)
/// replaces it. Wrappers registered with
/// [`wrap_primary_handler`](Self::wrap_primary_handler) decorate whichever
/// primary handler ends up in place, and delegating handlers wrap the result.
///
/// # Example
///
/// ```ignore
/// use restwire_client::{HeaderHandler, HttpClientBuilder};
/// use std::time::Duration;
///
/// let mut builder = HttpClientBuilder::new("orders");
/// builder
///     .base_address("https://orders.internal/api/".parse()?)
///     .timeout(Duration::from_secs(5))
///     .with_handler(HeaderHandler::new("x-tenant", "contoso"));
/// let client = builder.build(default_transport);
/// ```
pub struct HttpClientBuilder {
    /// Name of the client, used for diagnostics.
    name: String,
    /// Base address for relative request URIs.
    base_address: Option<Uri>,
    /// Headers added to requests that lack them.
    default_headers: HeaderMap,
    /// Timeout for a whole send.
    timeout: Option<Duration>,
    /// Replacement for the default transport.
    primary: Option<Arc<dyn Transport>>,
    /// Decorators applied to the primary handler, in registration order.
    primary_wrappers: Vec<PrimaryWrapper>,
    /// Delegating handlers around the primary handler.
    handlers: HandlerChain,
}

impl std::fmt::Debug for HttpClientBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClientBuilder")
            .field("name", &self.name)
            .field("base_address", &self.base_address)
            .field("default_headers", &self.default_headers)
            .field("timeout", &self.timeout)
            .field("primary", &self.primary.is_some())
            .field("primary_wrappers", &self.primary_wrappers.len())
            .field("handlers", &self.handlers)
            .finish()
    }
}

impl HttpClientBuilder {
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            base_address: None,
            default_headers: HeaderMap::new(),
            timeout: None,
            primary: None,
            primary_wrappers: Vec::new(),
            handlers: HandlerChain::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Set the base address relative request URIs are resolved against.
    pub fn base_address(&mut self, base_address: Uri) -> &mut Self {
        self.base_address = Some(base_address);
        self
    }

    /// Add a header sent with every request that does not set it itself.
    pub fn default_header(&mut self, name: HeaderName, value: HeaderValue) -> &mut Self {
        self.default_headers.insert(name, value);
        self
    }

    /// Set the timeout for a whole send, handlers and token lookup included.
    pub fn timeout(&mut self, timeout: Duration) -> &mut Self {
        self.timeout = Some(timeout);
        self
    }

    /// Replace the default transport as primary handler.
    pub fn primary_handler(&mut self, transport: Arc<dyn Transport>) -> &mut Self {
        self.primary = Some(transport);
        self
    }

    /// Decorate the primary handler, whichever it turns out to be.
    pub fn wrap_primary_handler<F>(&mut self, wrapper: F) -> &mut Self
    where
        F: FnOnce(Arc<dyn Transport>) -> Arc<dyn Transport> + Send + 'static,
    {
        self.primary_wrappers.push(Box::new(wrapper));
        self
    }

    /// Add a delegating handler. The first handler added sees requests first.
    pub fn with_handler<H: DelegatingHandler + 'static>(&mut self, handler: H) -> &mut Self {
        self.handlers.push(Arc::new(handler));
        self
    }

    /// Add a shared delegating handler.
    pub fn add_handler(&mut self, handler: Arc<dyn DelegatingHandler>) -> &mut Self {
        self.handlers.push(handler);
        self
    }

    /// Apply declarative options.
    pub fn options(&mut self, options: &HttpClientOptions) -> Result<&mut Self, ClientError> {
        if let Some(base_address) = &options.base_address {
            let uri = base_address
                .parse::<Uri>()
                .map_err(|e| ClientError::Protocol(format!("invalid base address {}: {}", base_address, e)))?;
            self.base_address(uri);
        }
        if let Some(timeout) = options.timeout() {
            self.timeout(timeout);
        }
        for (name, value) in &options.default_headers {
            let name = name
                .parse::<HeaderName>()
                .map_err(|_| ClientError::Protocol(format!("invalid header name: {}", name)))?;
            let value = HeaderValue::from_str(value)?;
            self.default_header(name, value);
        }
        Ok(self)
    }

    pub fn has_primary_handler(&self) -> bool {
        self.primary.is_some()
    }

    pub fn primary_wrapper_count(&self) -> usize {
        self.primary_wrappers.len()
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }

    /// Build the client on top of `default_transport`.
    pub fn build(self, default_transport: Arc<dyn Transport>) -> HttpClient {
        match self.build_with(|| Ok::<_, Infallible>(default_transport)) {
            Ok(client) => client,
            Err(never) => match never {},
        }
    }

    /// Build the client, calling `default_transport` only when no primary
    /// handler replaced it.
    pub fn build_with<F, E>(self, default_transport: F) -> Result<HttpClient, E>
    where
        F: FnOnce() -> Result<Arc<dyn Transport>, E>,
    {
        let mut primary = match self.primary {
            Some(primary) => primary,
            None => default_transport()?,
        };
        for wrapper in self.primary_wrappers {
            primary = wrapper(primary);
        }
        let send = self.handlers.wrap(transport_fn(primary));

        Ok(HttpClient::new(
            self.name,
            send,
            self.base_address,
            self.default_headers,
            self.timeout,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{FnTransport, HeaderHandler, HttpRequest, HttpResponse};
    use bytes::Bytes;

    fn labeled(label: &'static str) -> Arc<dyn Transport> {
        Arc::new(FnTransport::new(move |_req: HttpRequest| async move {
            Ok(HttpResponse::new(Bytes::from_static(label.as_bytes())))
        }))
    }

    #[tokio::test]
    async fn test_default_transport_is_primary() {
        let client = HttpClientBuilder::new("orders").build(labeled("default"));
        let response = client.send(HttpRequest::new(Bytes::new())).await.unwrap();
        assert_eq!(response.body(), &Bytes::from_static(b"default"));
    }

    #[tokio::test]
    async fn test_primary_handler_replaces_default() {
        let mut builder = HttpClientBuilder::new("orders");
        builder.primary_handler(labeled("custom"));
        let client = builder.build(labeled("default"));

        let response = client.send(HttpRequest::new(Bytes::new())).await.unwrap();
        assert_eq!(response.body(), &Bytes::from_static(b"custom"));
    }

    #[test]
    fn test_build_with_skips_default_when_replaced() {
        let mut builder = HttpClientBuilder::new("orders");
        builder.primary_handler(labeled("custom"));
        let client = builder.build_with(|| Err(ClientError::transport("no sockets")));
        assert!(client.is_ok());

        let client = HttpClientBuilder::new("orders")
            .build_with(|| Err::<Arc<dyn Transport>, _>(ClientError::transport("no sockets")));
        assert!(matches!(client, Err(ClientError::Transport(_))));
    }

    #[tokio::test]
    async fn test_wrapper_sees_final_primary() {
        let mut builder = HttpClientBuilder::new("orders");
        builder.wrap_primary_handler(|inner| {
            Arc::new(FnTransport::new(move |req: HttpRequest| {
                let inner = inner.clone();
                async move {
                    let response = inner.send(req).await?;
                    let mut body = b"wrapped:".to_vec();
                    body.extend_from_slice(response.body());
                    Ok(HttpResponse::new(Bytes::from(body)))
                }
            })) as Arc<dyn Transport>
        });
        builder.primary_handler(labeled("custom"));
        let client = builder.build(labeled("default"));

        let response = client.send(HttpRequest::new(Bytes::new())).await.unwrap();
        assert_eq!(response.body(), &Bytes::from_static(b"wrapped:custom"));
    }

    #[test]
    fn test_options_reject_bad_header() {
        let mut builder = HttpClientBuilder::new("orders");
        let mut options = HttpClientOptions::default();
        options
            .default_headers
            .insert("bad header".to_string(), "v".to_string());
        assert!(builder.options(&options).is_err());
    }

    #[test]
    fn test_counts() {
        let mut builder = HttpClientBuilder::new("orders");
        builder
            .with_handler(HeaderHandler::new("x-a", "1"))
            .timeout(Duration::from_secs(1));
        assert_eq!(builder.handler_count(), 1);
        assert!(!builder.has_primary_handler());
        assert_eq!(builder.primary_wrapper_count(), 0);
    }
}
