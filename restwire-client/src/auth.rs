//! Authorization-decorating primary handler.
//!
//! [`AuthHeaderHandler`] obtains a token for every outbound request and
//! attaches it as a bearer credential before handing the request to the
//! transport it wraps.

use std::future::Future;
use std::sync::Arc;

use http::HeaderValue;
use http::header::AUTHORIZATION;

use crate::handler::{BoxFuture, Transport};
use crate::{ClientError, HttpRequest, HttpResponse};

/// Scheme used when the request does not already carry an `Authorization` header.
pub const DEFAULT_AUTH_SCHEME: &str = "Bearer";

/// A possibly-suspending getter for the authorization token of a request.
///
/// The getter receives the outgoing request so it can pick a token per host
/// or per path. Its future is awaited inside the send future, so dropping the
/// send future (or hitting the client timeout) cancels it.
pub type TokenGetter =
    Arc<dyn Fn(&HttpRequest) -> BoxFuture<'static, Result<String, ClientError>> + Send + Sync>;

/// Build a [`TokenGetter`] from an async closure.
pub fn token_getter<F, Fut>(getter: F) -> TokenGetter
where
    F: Fn(&HttpRequest) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<String, ClientError>> + Send + 'static,
{
    Arc::new(move |request: &HttpRequest| Box::pin(getter(request)) as BoxFuture<'static, _>)
}

/// Primary handler that attaches a bearer token and forwards to `inner`.
#[derive(Clone)]
pub struct AuthHeaderHandler {
    getter: TokenGetter,
    inner: Arc<dyn Transport>,
}

impl std::fmt::Debug for AuthHeaderHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthHeaderHandler").finish_non_exhaustive()
    }
}

impl AuthHeaderHandler {
    pub fn new(getter: TokenGetter, inner: Arc<dyn Transport>) -> Self {
        Self { getter, inner }
    }
}

/// Build the `Authorization` value, keeping the scheme of an existing header.
fn authorization_value(existing: Option<&HeaderValue>, token: &str) -> Result<HeaderValue, ClientError> {
    let scheme = existing
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split_whitespace().next())
        .unwrap_or(DEFAULT_AUTH_SCHEME);
    let mut value = HeaderValue::from_str(&format!("{} {}", scheme, token))?;
    value.set_sensitive(true);
    Ok(value)
}

impl Transport for AuthHeaderHandler {
    fn send(&self, mut request: HttpRequest) -> BoxFuture<'static, Result<HttpResponse, ClientError>> {
        let token = (self.getter)(&request);
        let inner = self.inner.clone();
        Box::pin(async move {
            let token = match token.await {
                Ok(token) => token,
                Err(err) => {
                    #[cfg(feature = "tracing")]
                    tracing::debug!(error = %err, "failed to obtain authorization token");
                    return Err(err);
                }
            };
            let value = authorization_value(request.headers().get(AUTHORIZATION), &token)?;
            request.headers_mut().insert(AUTHORIZATION, value);
            inner.send(request).await
        })
    }
}
