//! Named HTTP client.
//!
//! This module provides [`HttpClient`], a cheap-to-clone handle on a fully
//! composed pipeline. It is built once per name by
//! [`HttpClientBuilder::build`](crate::HttpClientBuilder::build) and never
//! reconfigured afterwards.

use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use http::{HeaderMap, Uri};
use http::uri::PathAndQuery;
#[cfg(feature = "tracing")]
use tracing::Instrument;

use crate::handler::{BoxFuture, SendFunc};
use crate::{ClientError, HttpRequest, HttpResponse};

/// A composed outbound pipeline.
#[derive(Clone)]
pub struct HttpClient {
    /// Name the client was built under.
    name: Arc<str>,
    /// Entry point of the handler chain.
    send: SendFunc,
    /// Base address for relative request URIs.
    base_address: Option<Uri>,
    /// Headers added to requests that lack them.
    default_headers: Arc<HeaderMap>,
    /// Timeout for a whole send.
    timeout: Option<Duration>,
}

impl std::fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient")
            .field("name", &self.name)
            .field("base_address", &self.base_address)
            .field("default_headers", &self.default_headers)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl HttpClient {
    pub(crate) fn new(
        name: String,
        send: SendFunc,
        base_address: Option<Uri>,
        default_headers: HeaderMap,
        timeout: Option<Duration>,
    ) -> Self {
        Self {
            name: name.into(),
            send,
            base_address,
            default_headers: Arc::new(default_headers),
            timeout,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn base_address(&self) -> Option<&Uri> {
        self.base_address.as_ref()
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Send a request through the pipeline.
    ///
    /// Relative URIs are resolved against the base address and default headers
    /// are added where missing. Errors from handlers, token getters and the
    /// transport are returned unchanged.
    pub async fn send(&self, mut request: HttpRequest) -> Result<HttpResponse, ClientError> {
        self.prepare(&mut request)?;

        #[cfg(feature = "tracing")]
        let span = tracing::debug_span!(
            "http.send",
            client = %self.name,
            method = %request.method(),
            uri = %request.uri(),
        );

        let call = (self.send)(request);
        let call = async move {
            match self.timeout {
                Some(timeout) => match tokio::time::timeout(timeout, call).await {
                    Ok(result) => result,
                    Err(_) => Err(ClientError::Timeout(timeout)),
                },
                None => call.await,
            }
        };

        #[cfg(feature = "tracing")]
        let call = call.instrument(span);

        call.await
    }

    fn prepare(&self, request: &mut HttpRequest) -> Result<(), ClientError> {
        if let Some(base) = &self.base_address {
            let uri = request.uri();
            if uri.scheme().is_none() && uri.authority().is_none() {
                *request.uri_mut() = resolve_uri(base, uri)?;
            }
        }
        for (name, value) in self.default_headers.iter() {
            if !request.headers().contains_key(name) {
                request.headers_mut().insert(name.clone(), value.clone());
            }
        }
        Ok(())
    }
}

/// Join a relative URI onto a base address.
///
/// `relative` has neither scheme nor authority, so its path is in origin form
/// and starts with `/`.
fn resolve_uri(base: &Uri, relative: &Uri) -> Result<Uri, ClientError> {
    let base_path = base.path().trim_end_matches('/');
    let relative = relative
        .path_and_query()
        .map(PathAndQuery::as_str)
        .unwrap_or("/");
    let joined = format!("{}{}", base_path, relative);

    let mut parts = base.clone().into_parts();
    parts.path_and_query = Some(
        joined
            .parse()
            .map_err(|e| ClientError::Protocol(format!("invalid request path {}: {}", joined, e)))?,
    );
    Uri::from_parts(parts).map_err(|e| ClientError::Protocol(format!("invalid request uri: {}", e)))
}

impl tower_service::Service<HttpRequest> for HttpClient {
    type Response = HttpResponse;
    type Error = ClientError;
    type Future = BoxFuture<'static, Result<HttpResponse, ClientError>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: HttpRequest) -> Self::Future {
        let client = self.clone();
        Box::pin(async move { client.send(request).await })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{FnTransport, HttpClientBuilder, Transport};
    use bytes::Bytes;
    use http::HeaderValue;
    use tower::ServiceExt;

    fn echo_uri() -> Arc<dyn Transport> {
        Arc::new(FnTransport::new(|req: HttpRequest| async move {
            Ok(HttpResponse::new(Bytes::from(req.uri().to_string())))
        }))
    }

    fn request(uri: &str) -> HttpRequest {
        http::Request::builder().uri(uri).body(Bytes::new()).unwrap()
    }

    #[test]
    fn test_resolve_uri() {
        let relative: Uri = "/orders/7?expand=lines".parse().unwrap();

        let base: Uri = "https://orders.internal/api/".parse().unwrap();
        let resolved = resolve_uri(&base, &relative).unwrap();
        assert_eq!(resolved, "https://orders.internal/api/orders/7?expand=lines");

        let base: Uri = "https://orders.internal/api".parse().unwrap();
        let resolved = resolve_uri(&base, &relative).unwrap();
        assert_eq!(resolved, "https://orders.internal/api/orders/7?expand=lines");

        let base: Uri = "https://orders.internal".parse().unwrap();
        let resolved = resolve_uri(&base, &"/orders".parse().unwrap()).unwrap();
        assert_eq!(resolved, "https://orders.internal/orders");
    }

    #[test]
    fn test_bare_name_is_not_relative() {
        // `orders` parses as an authority, so `prepare` leaves it alone.
        let uri: Uri = "orders".parse().unwrap();
        assert!(uri.authority().is_some());
        assert!("orders/7".parse::<Uri>().is_err());
    }

    #[tokio::test]
    async fn test_absolute_uri_untouched() {
        let mut builder = HttpClientBuilder::new("orders");
        builder.base_address("https://orders.internal/api".parse().unwrap());
        let client = builder.build(echo_uri());

        let response = client.send(request("http://elsewhere/x")).await.unwrap();
        assert_eq!(response.body(), &Bytes::from_static(b"http://elsewhere/x"));
    }

    #[tokio::test]
    async fn test_default_headers_do_not_override() {
        let transport: Arc<dyn Transport> = Arc::new(FnTransport::new(|req: HttpRequest| async move {
            let tenant = req.headers()["x-tenant"].to_str().unwrap().to_string();
            Ok(HttpResponse::new(Bytes::from(tenant)))
        }));
        let mut builder = HttpClientBuilder::new("orders");
        builder.default_header("x-tenant".parse().unwrap(), HeaderValue::from_static("contoso"));
        let client = builder.build(transport);

        let response = client.send(request("/")).await.unwrap();
        assert_eq!(response.body(), &Bytes::from_static(b"contoso"));

        let mut req = request("/");
        req.headers_mut()
            .insert("x-tenant", HeaderValue::from_static("fabrikam"));
        let response = client.send(req).await.unwrap();
        assert_eq!(response.body(), &Bytes::from_static(b"fabrikam"));
    }

    #[tokio::test]
    async fn test_timeout() {
        let slow: Arc<dyn Transport> = Arc::new(FnTransport::new(|_req: HttpRequest| async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(HttpResponse::new(Bytes::new()))
        }));
        let mut builder = HttpClientBuilder::new("orders");
        builder.timeout(Duration::from_millis(20));
        let client = builder.build(slow);

        let err = client.send(request("/")).await.unwrap_err();
        assert!(err.is_timeout());
    }

    #[tokio::test]
    async fn test_tower_service() {
        let mut builder = HttpClientBuilder::new("orders");
        builder.base_address("https://orders.internal".parse().unwrap());
        let client = builder.build(echo_uri());

        let response = client.oneshot(request("/health")).await.unwrap();
        assert_eq!(response.body(), &Bytes::from_static(b"https://orders.internal/health"));
    }
}
