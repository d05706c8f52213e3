//! Per-contract client settings.
//!
//! Each registration binds one [`ContractSettings`] as a singleton under the
//! contract's settings role and its key. The producer runs on first
//! resolution and never again for the life of the provider.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use restwire_client::{ClientError, HttpRequest, TokenGetter, Transport, token_getter};

use crate::RegistrationError;
use crate::container::{
    ErasedService, Lifetime, ServiceCollection, ServiceId, ServiceKey, ServiceProvider, ServiceRole,
};
use crate::contract::ContractType;

/// Produces the base (primary) handler of a client.
pub type HandlerFactory = Arc<dyn Fn() -> Arc<dyn Transport> + Send + Sync>;

/// Settings of one client registration.
///
/// Only two fields influence the pipeline: the base-handler factory and the
/// authorization getter. Everything else about the client is configured on
/// its [`NamedClientBuilder`](crate::NamedClientBuilder).
///
/// # Example
///
/// ```ignore
/// let settings = ClientSettings::new()
///     .authorization_header_value_getter(|_req| async { vault.token().await });
/// ```
#[derive(Clone, Default)]
pub struct ClientSettings {
    http_message_handler_factory: Option<HandlerFactory>,
    authorization_header_value_getter: Option<TokenGetter>,
}

impl fmt::Debug for ClientSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientSettings")
            .field(
                "http_message_handler_factory",
                &self.http_message_handler_factory.is_some(),
            )
            .field(
                "authorization_header_value_getter",
                &self.authorization_header_value_getter.is_some(),
            )
            .finish()
    }
}

impl ClientSettings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Supply the base handler that replaces the default transport.
    pub fn http_message_handler_factory<F>(mut self, factory: F) -> Self
    where
        F: Fn() -> Arc<dyn Transport> + Send + Sync + 'static,
    {
        self.http_message_handler_factory = Some(Arc::new(factory));
        self
    }

    /// Supply an async getter for the bearer token of each request.
    pub fn authorization_header_value_getter<F, Fut>(mut self, getter: F) -> Self
    where
        F: Fn(&HttpRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<String, ClientError>> + Send + 'static,
    {
        self.authorization_header_value_getter = Some(token_getter(getter));
        self
    }

    /// Supply a synchronous token source.
    pub fn authorization_token<F>(self, token: F) -> Self
    where
        F: Fn() -> String + Send + Sync + 'static,
    {
        self.authorization_header_value_getter(move |_req: &HttpRequest| {
            futures::future::ready(Ok::<_, ClientError>(token()))
        })
    }

    pub fn handler_factory(&self) -> Option<&HandlerFactory> {
        self.http_message_handler_factory.as_ref()
    }

    pub fn token_getter(&self) -> Option<&TokenGetter> {
        self.authorization_header_value_getter.as_ref()
    }

    /// Returns whether neither field is set.
    pub fn is_empty(&self) -> bool {
        self.http_message_handler_factory.is_none() && self.authorization_header_value_getter.is_none()
    }
}

/// Settings bound to a contract registration.
#[derive(Clone, Debug)]
pub struct ContractSettings {
    pub contract: ContractType,
    pub settings: Option<Arc<ClientSettings>>,
}

pub(crate) fn settings_id(contract: &ContractType, key: Option<ServiceKey>) -> ServiceId {
    contract.service_id(ServiceRole::Settings, key)
}

/// Bind the settings of `contract` under `key`.
pub fn bind_settings<F>(services: &mut ServiceCollection, contract: &ContractType, key: Option<ServiceKey>, producer: F)
where
    F: Fn(&ServiceProvider) -> Option<ClientSettings> + Send + Sync + 'static,
{
    let id = settings_id(contract, key);
    let bound = contract.clone();
    let service = id.to_string();
    services.add_service(
        id,
        Lifetime::Singleton,
        Arc::new(move |provider: &ServiceProvider| -> Result<ErasedService, RegistrationError> {
            let settings = producer(provider).map(Arc::new);
            tracing::debug!(
                service = %service,
                has_settings = settings.is_some(),
                "produced client settings"
            );
            let value = Arc::new(ContractSettings {
                contract: bound.clone(),
                settings,
            });
            Ok(Arc::new(value) as ErasedService)
        }),
    );
}

/// Resolve the settings bound for `contract` under `key`.
pub fn resolve_settings(
    provider: &ServiceProvider,
    contract: &ContractType,
    key: Option<&ServiceKey>,
) -> Result<Arc<ContractSettings>, RegistrationError> {
    provider.get_required_as::<ContractSettings>(&settings_id(contract, key.cloned()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::Pinger;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_settings_resolved_once() {
        let contract = ContractType::of::<dyn Pinger>();
        let produced = Arc::new(AtomicUsize::new(0));
        let counter = produced.clone();

        let mut services = ServiceCollection::new();
        bind_settings(&mut services, &contract, None, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Some(ClientSettings::new().authorization_token(|| "t".to_string()))
        });
        let provider = services.build();

        let a = resolve_settings(&provider, &contract, None).unwrap();
        let b = resolve_settings(&provider, &contract, None).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(produced.load(Ordering::SeqCst), 1);
        assert_eq!(a.contract, contract);
        assert!(a.settings.as_ref().unwrap().token_getter().is_some());
    }

    #[test]
    fn test_keyed_settings_are_separate() {
        let contract = ContractType::of::<dyn Pinger>();
        let mut services = ServiceCollection::new();
        bind_settings(&mut services, &contract, Some("a".into()), |_| None);
        bind_settings(&mut services, &contract, Some("b".into()), |_| Some(ClientSettings::new()));
        let provider = services.build();

        let a = resolve_settings(&provider, &contract, Some(&"a".into())).unwrap();
        let b = resolve_settings(&provider, &contract, Some(&"b".into())).unwrap();
        assert!(a.settings.is_none());
        assert!(b.settings.as_ref().unwrap().is_empty());
        assert!(resolve_settings(&provider, &contract, None).unwrap_err().is_not_registered());
    }

    #[tokio::test]
    async fn test_sync_token_source() {
        let settings = ClientSettings::new().authorization_token(|| "tok-123".to_string());
        let getter = settings.token_getter().unwrap();
        let token = getter(&HttpRequest::new(Default::default())).await.unwrap();
        assert_eq!(token, "tok-123");
    }

    #[test]
    fn test_debug_hides_closures() {
        let settings = ClientSettings::new().authorization_token(String::new);
        assert_eq!(
            format!("{:?}", settings),
            "ClientSettings { http_message_handler_factory: false, authorization_header_value_getter: true }"
        );
    }
}
