//! Handler-chain composition from client settings.
//!
//! The primary slot of a named client holds, from the outside in:
//! the authorization handler (when a token getter is set), then the base
//! handler from the settings (when a factory is set), else the default
//! transport. Delegating handlers added on the client wrap all of it.

use std::fmt;
use std::sync::Arc;

use restwire_client::{AuthHeaderHandler, HttpClientBuilder, TokenGetter, Transport};

use crate::settings::ClientSettings;

/// What the settings of a registration ask of its client's primary slot.
#[derive(Clone)]
pub enum ChainDecision {
    /// Leave the default transport in place.
    UseDefault,
    /// Replace the default transport with this handler.
    UseBase(Arc<dyn Transport>),
    /// Put an authorization handler in front of `inner`, or of the default
    /// transport when `inner` is `None`.
    UseAuthWrapping {
        getter: TokenGetter,
        inner: Option<Arc<dyn Transport>>,
    },
}

impl fmt::Debug for ChainDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChainDecision::UseDefault => f.write_str("UseDefault"),
            ChainDecision::UseBase(_) => f.write_str("UseBase"),
            ChainDecision::UseAuthWrapping { inner, .. } => f
                .debug_struct("UseAuthWrapping")
                .field("inner", &inner.is_some())
                .finish_non_exhaustive(),
        }
    }
}

/// Decide the primary slot of a client from its settings.
///
/// Invokes the base-handler factory when one is set; performs no I/O.
pub fn compose(settings: Option<&ClientSettings>) -> ChainDecision {
    let Some(settings) = settings else {
        return ChainDecision::UseDefault;
    };
    let base = settings.handler_factory().map(|factory| factory());
    match (settings.token_getter(), base) {
        (Some(getter), inner) => ChainDecision::UseAuthWrapping {
            getter: getter.clone(),
            inner,
        },
        (None, Some(base)) => ChainDecision::UseBase(base),
        (None, None) => ChainDecision::UseDefault,
    }
}

impl ChainDecision {
    pub fn kind(&self) -> &'static str {
        match self {
            ChainDecision::UseDefault => "default",
            ChainDecision::UseBase(_) => "base",
            ChainDecision::UseAuthWrapping { .. } => "auth",
        }
    }

    /// Install the decision on a client builder.
    ///
    /// The authorization handler decorates whichever primary handler the
    /// builder ends up with, so it stays in front of the transport even if
    /// the primary handler is replaced later.
    pub fn apply(self, builder: &mut HttpClientBuilder) {
        match self {
            ChainDecision::UseDefault => {}
            ChainDecision::UseBase(base) => {
                builder.primary_handler(base);
            }
            ChainDecision::UseAuthWrapping { getter, inner } => {
                if let Some(inner) = inner {
                    builder.primary_handler(inner);
                }
                builder.wrap_primary_handler(move |primary| {
                    Arc::new(AuthHeaderHandler::new(getter, primary)) as Arc<dyn Transport>
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use http::header::AUTHORIZATION;
    use restwire_client::{FnTransport, HttpRequest, HttpResponse};

    fn labeled(label: &'static str) -> Arc<dyn Transport> {
        Arc::new(FnTransport::new(move |req: HttpRequest| async move {
            let auth = req
                .headers()
                .get(AUTHORIZATION)
                .and_then(|v| v.to_str().ok())
                .unwrap_or("-")
                .to_string();
            Ok(HttpResponse::new(Bytes::from(format!("{} {}", label, auth))))
        }))
    }

    async fn send_through(decision: ChainDecision) -> String {
        let mut builder = HttpClientBuilder::new("pinger");
        decision.apply(&mut builder);
        let client = builder.build(labeled("default"));
        let response = client.send(HttpRequest::new(Bytes::new())).await.unwrap();
        String::from_utf8(response.into_body().to_vec()).unwrap()
    }

    #[test]
    fn test_compose_without_settings() {
        assert_eq!(compose(None).kind(), "default");
        assert_eq!(compose(Some(&ClientSettings::new())).kind(), "default");
    }

    #[test]
    fn test_compose_variants() {
        let base = ClientSettings::new().http_message_handler_factory(|| labeled("base"));
        assert_eq!(compose(Some(&base)).kind(), "base");

        let auth = ClientSettings::new().authorization_token(|| "t".to_string());
        assert!(matches!(
            compose(Some(&auth)),
            ChainDecision::UseAuthWrapping { inner: None, .. }
        ));

        let both = base.authorization_token(|| "t".to_string());
        assert!(matches!(
            compose(Some(&both)),
            ChainDecision::UseAuthWrapping { inner: Some(_), .. }
        ));
    }

    #[tokio::test]
    async fn test_apply() {
        assert_eq!(send_through(ChainDecision::UseDefault).await, "default -");
        assert_eq!(send_through(ChainDecision::UseBase(labeled("base"))).await, "base -");

        let settings = ClientSettings::new().authorization_token(|| "tok-123".to_string());
        assert_eq!(
            send_through(compose(Some(&settings))).await,
            "default Bearer tok-123"
        );

        let settings = settings.http_message_handler_factory(|| labeled("base"));
        assert_eq!(
            send_through(compose(Some(&settings))).await,
            "base Bearer tok-123"
        );
    }
}
