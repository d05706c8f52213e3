//! Outbound handler pipeline.
//!
//! A pipeline is a primary [`Transport`] (the innermost sender) wrapped by any
//! number of [`DelegatingHandler`]s. Handlers can add cross-cutting logic such
//! as:
//! - Adding headers
//! - Logging and metrics
//! - Rejecting requests before they reach the network
//!
//! # Example
//!
//! ```ignore
//! use restwire_client::{FnHandler, HeaderHandler, HttpClientBuilder};
//!
//! let mut builder = HttpClientBuilder::new("orders");
//! builder
//!     .with_handler(HeaderHandler::new("x-tenant", "contoso"))
//!     .with_handler(FnHandler::new(|req, next| {
//!         Box::pin(async move {
//!             println!("sending {}", req.uri());
//!             next.call(req).await
//!         })
//!     }));
//! let client = builder.build(default_transport);
//! ```

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use http::{HeaderName, HeaderValue};

use crate::{ClientError, HttpRequest, HttpResponse};

/// Type alias for a boxed future returning a result.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// The signature of a send operation.
///
/// Handlers wrap this function to add logic before and after the call.
pub type SendFunc =
    Arc<dyn Fn(HttpRequest) -> BoxFuture<'static, Result<HttpResponse, ClientError>> + Send + Sync>;

/// A primary handler: the innermost sender of a pipeline.
///
/// [`HyperTransport`](crate::HyperTransport) is the default implementation.
/// Anything that can turn a request into a response (a mock, a recording
/// transport, a custom stack) can take its place.
pub trait Transport: Send + Sync + 'static {
    /// Send a request and receive a response.
    fn send(&self, request: HttpRequest) -> BoxFuture<'static, Result<HttpResponse, ClientError>>;
}

/// Adapt a [`Transport`] into the [`SendFunc`] shape handlers wrap.
pub fn transport_fn(transport: Arc<dyn Transport>) -> SendFunc {
    Arc::new(move |request: HttpRequest| transport.send(request))
}

/// A closure-backed [`Transport`].
///
/// # Example
///
/// ```ignore
/// use restwire_client::{FnTransport, HttpResponse};
///
/// let transport = FnTransport::new(|_req| async {
///     Ok(HttpResponse::new(bytes::Bytes::from_static(b"ok")))
/// });
/// ```
pub struct FnTransport<F> {
    func: F,
}

impl<F, Fut> FnTransport<F>
where
    F: Fn(HttpRequest) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<HttpResponse, ClientError>> + Send + 'static,
{
    pub fn new(func: F) -> Self {
        Self { func }
    }
}

impl<F> std::fmt::Debug for FnTransport<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnTransport").finish()
    }
}

impl<F, Fut> Transport for FnTransport<F>
where
    F: Fn(HttpRequest) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<HttpResponse, ClientError>> + Send + 'static,
{
    fn send(&self, request: HttpRequest) -> BoxFuture<'static, Result<HttpResponse, ClientError>> {
        Box::pin((self.func)(request))
    }
}

/// The "next" function in the handler chain.
///
/// Call this to proceed to the next handler or the primary transport.
#[derive(Clone)]
pub struct Next {
    inner: SendFunc,
}

impl Next {
    pub(crate) fn new(inner: SendFunc) -> Self {
        Self { inner }
    }

    /// Call the next handler or the primary transport.
    pub async fn call(self, request: HttpRequest) -> Result<HttpResponse, ClientError> {
        (self.inner)(request).await
    }
}

/// A handler that wraps the rest of the pipeline.
pub trait DelegatingHandler: Send + Sync {
    /// Wrap the next send function.
    ///
    /// The default implementation passes through to the next function unchanged.
    fn wrap(&self, next: SendFunc) -> SendFunc {
        next
    }
}

/// A chain of handlers that are applied in order.
#[derive(Clone, Default)]
pub struct HandlerChain {
    handlers: Vec<Arc<dyn DelegatingHandler>>,
}

impl std::fmt::Debug for HandlerChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerChain")
            .field("count", &self.handlers.len())
            .finish()
    }
}

impl HandlerChain {
    /// Create a new empty handler chain.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a handler to the chain.
    pub fn push(&mut self, handler: Arc<dyn DelegatingHandler>) {
        self.handlers.push(handler);
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Wrap a send function with all handlers in the chain.
    ///
    /// Handlers are applied in reverse order so that the first handler
    /// added is the first to see the request.
    pub fn wrap(&self, next: SendFunc) -> SendFunc {
        let mut wrapped = next;
        for handler in self.handlers.iter().rev() {
            wrapped = handler.wrap(wrapped);
        }
        wrapped
    }
}

/// A handler that adds a header to every request.
#[derive(Clone, Debug)]
pub struct HeaderHandler {
    name: HeaderName,
    value: HeaderValue,
}

impl HeaderHandler {
    /// Create a new header handler.
    ///
    /// # Panics
    ///
    /// Panics if the header name or value is invalid.
    pub fn new(name: &str, value: &str) -> Self {
        Self {
            name: name.parse().expect("invalid header name"),
            value: value.parse().expect("invalid header value"),
        }
    }

    /// Try to create a new header handler, returning an error if invalid.
    pub fn try_new(name: &str, value: &str) -> Result<Self, ClientError> {
        let name = name
            .parse()
            .map_err(|_| ClientError::Protocol(format!("invalid header name: {}", name)))?;
        let value = value
            .parse()
            .map_err(|_| ClientError::Protocol(format!("invalid header value: {}", value)))?;
        Ok(Self { name, value })
    }

    pub fn from_parts(name: HeaderName, value: HeaderValue) -> Self {
        Self { name, value }
    }
}

impl DelegatingHandler for HeaderHandler {
    fn wrap(&self, next: SendFunc) -> SendFunc {
        let name = self.name.clone();
        let value = self.value.clone();
        Arc::new(move |mut request: HttpRequest| {
            request.headers_mut().insert(name.clone(), value.clone());
            next(request)
        })
    }
}

/// A function-based handler.
///
/// # Example
///
/// ```ignore
/// use restwire_client::{FnHandler, HttpRequest, Next};
///
/// let logging = FnHandler::new(|req: HttpRequest, next: Next| {
///     Box::pin(async move {
///         println!("sending {}", req.uri());
///         let result = next.call(req).await;
///         println!("done");
///         result
///     })
/// });
/// ```
pub struct FnHandler<F> {
    func: F,
}

impl<F> FnHandler<F>
where
    F: Fn(HttpRequest, Next) -> BoxFuture<'static, Result<HttpResponse, ClientError>>
        + Send
        + Sync
        + Clone
        + 'static,
{
    pub fn new(func: F) -> Self {
        Self { func }
    }
}

impl<F> DelegatingHandler for FnHandler<F>
where
    F: Fn(HttpRequest, Next) -> BoxFuture<'static, Result<HttpResponse, ClientError>>
        + Send
        + Sync
        + Clone
        + 'static,
{
    fn wrap(&self, next: SendFunc) -> SendFunc {
        let func = self.func.clone();
        Arc::new(move |request: HttpRequest| {
            let next = Next::new(next.clone());
            func(request, next)
        })
    }
}

impl<F: Clone> Clone for FnHandler<F> {
    fn clone(&self) -> Self {
        Self {
            func: self.func.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use http::HeaderMap;

    fn capturing_next() -> (SendFunc, Arc<std::sync::Mutex<Option<HeaderMap>>>) {
        let captured = Arc::new(std::sync::Mutex::new(None));
        let captured_clone = captured.clone();
        let next: SendFunc = Arc::new(move |req: HttpRequest| {
            let captured = captured_clone.clone();
            Box::pin(async move {
                *captured.lock().unwrap() = Some(req.headers().clone());
                Ok(HttpResponse::new(Bytes::new()))
            }) as BoxFuture<'static, _>
        });
        (next, captured)
    }

    #[test]
    fn test_handler_chain_empty() {
        let chain = HandlerChain::new();
        assert!(chain.is_empty());
        assert_eq!(chain.len(), 0);
    }

    #[tokio::test]
    async fn test_header_handler() {
        let handler = HeaderHandler::new("x-auth", "secret");
        let (next, captured) = capturing_next();

        let wrapped = handler.wrap(next);
        let _ = wrapped(HttpRequest::new(Bytes::new())).await;

        let headers = captured.lock().unwrap().take().unwrap();
        assert_eq!(headers.get("x-auth").unwrap(), "secret");
    }

    #[test]
    fn test_header_handler_try_new_rejects_invalid_name() {
        assert!(HeaderHandler::try_new("bad header", "v").is_err());
    }

    #[tokio::test]
    async fn test_fn_handler() {
        let handler = FnHandler::new(|mut req: HttpRequest, next: Next| {
            Box::pin(async move {
                req.headers_mut()
                    .insert("x-modified", "true".parse().unwrap());
                next.call(req).await
            }) as BoxFuture<'static, _>
        });
        let (next, captured) = capturing_next();

        let wrapped = handler.wrap(next);
        let _ = wrapped(HttpRequest::new(Bytes::new())).await;

        let headers = captured.lock().unwrap().take().unwrap();
        assert_eq!(headers.get("x-modified").unwrap(), "true");
    }

    #[tokio::test]
    async fn test_handler_chain_order() {
        let order = Arc::new(std::sync::Mutex::new(Vec::new()));
        let mut chain = HandlerChain::new();
        for label in ["first", "second"] {
            let order = order.clone();
            chain.push(Arc::new(FnHandler::new(move |req: HttpRequest, next: Next| {
                order.lock().unwrap().push(label);
                Box::pin(next.call(req)) as BoxFuture<'static, _>
            })));
        }
        let (next, _captured) = capturing_next();

        let wrapped = chain.wrap(next);
        let _ = wrapped(HttpRequest::new(Bytes::new())).await;

        assert_eq!(*order.lock().unwrap(), vec!["first", "second"]);
    }

    #[tokio::test]
    async fn test_fn_transport() {
        let transport: Arc<dyn Transport> = Arc::new(FnTransport::new(|req: HttpRequest| async move {
            Ok(HttpResponse::new(Bytes::from(req.uri().path().to_string())))
        }));
        let send = transport_fn(transport);
        let request = http::Request::builder()
            .uri("/orders/7")
            .body(Bytes::new())
            .unwrap();

        let response = send(request).await.unwrap();
        assert_eq!(response.body(), &Bytes::from_static(b"/orders/7"));
    }
}
