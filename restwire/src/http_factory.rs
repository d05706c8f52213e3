//! Named HTTP clients.
//!
//! Configure actions are collected per client name while services are
//! registered. The provider builds each registered client the first time it
//! is asked for, running the actions in order, and hands out clones
//! afterwards. Unregistered names get a fresh default client on every call.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use restwire_client::{
    ClientError, DelegatingHandler, HttpClient, HttpClientBuilder, HttpClientOptions, HyperTransport,
    Transport,
};

use crate::RegistrationError;
use crate::container::{ServiceCollection, ServiceProvider, TransportFactory};

/// Configures a named client while it is being built.
pub type ConfigureAction =
    Arc<dyn Fn(&ServiceProvider, &mut HttpClientBuilder) -> Result<(), RegistrationError> + Send + Sync>;

/// Wrap a closure as a [`ConfigureAction`].
pub fn configure_action<F>(action: F) -> ConfigureAction
where
    F: Fn(&ServiceProvider, &mut HttpClientBuilder) -> Result<(), RegistrationError> + Send + Sync + 'static,
{
    Arc::new(action)
}

#[derive(Clone, Default)]
struct ClientRegistration {
    /// Primary-slot action installed by the registrar; runs first.
    chain: Option<ConfigureAction>,
    actions: Vec<ConfigureAction>,
}

/// Registration-time state of the named clients.
#[derive(Default)]
pub(crate) struct HttpClientRegistry {
    clients: HashMap<String, ClientRegistration>,
    default_transport: Option<TransportFactory>,
}

impl fmt::Debug for HttpClientRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpClientRegistry")
            .field("clients", &self.clients.keys().collect::<Vec<_>>())
            .field("default_transport", &self.default_transport.is_some())
            .finish()
    }
}

impl HttpClientRegistry {
    pub(crate) fn add_action(&mut self, name: &str, action: ConfigureAction) {
        self.clients.entry(name.to_string()).or_default().actions.push(action);
    }

    pub(crate) fn set_chain_action(&mut self, name: &str, action: ConfigureAction) {
        let registration = self.clients.entry(name.to_string()).or_default();
        if registration.chain.replace(action).is_some() {
            tracing::debug!(client = name, "replacing handler chain of named client");
        }
    }

    pub(crate) fn set_default_transport(&mut self, factory: TransportFactory) {
        self.default_transport = Some(factory);
    }

    pub(crate) fn add_entry(&mut self, name: &str) {
        self.clients.entry(name.to_string()).or_default();
    }
}

type ClientSlot = Arc<Mutex<Option<HttpClient>>>;

/// Builds and caches named clients for a provider.
pub(crate) struct HttpClientFactory {
    clients: HashMap<String, ClientRegistration>,
    default_transport: TransportFactory,
    slots: Mutex<HashMap<String, ClientSlot>>,
}

impl HttpClientFactory {
    pub(crate) fn new(registry: HttpClientRegistry) -> Self {
        let default_transport = registry.default_transport.unwrap_or_else(|| {
            Arc::new(|| -> Result<Arc<dyn Transport>, ClientError> {
                Ok(Arc::new(HyperTransport::new()?) as Arc<dyn Transport>)
            }) as TransportFactory
        });
        Self {
            clients: registry.clients,
            default_transport,
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Get the client `name`, building it on first use.
    ///
    /// Only registered names are cached. Any other name gets a fresh client on
    /// the default transport each time, so ad-hoc names never accumulate.
    pub(crate) fn create_client(
        &self,
        provider: &ServiceProvider,
        name: &str,
    ) -> Result<HttpClient, RegistrationError> {
        let Some(registration) = self.clients.get(name) else {
            return self.build_client(provider, name, None);
        };

        let slot = self.slots.lock().entry(name.to_string()).or_default().clone();
        let mut slot = slot.lock();
        if let Some(client) = slot.as_ref() {
            return Ok(client.clone());
        }
        let client = self.build_client(provider, name, Some(registration))?;
        *slot = Some(client.clone());
        Ok(client)
    }

    fn build_client(
        &self,
        provider: &ServiceProvider,
        name: &str,
        registration: Option<&ClientRegistration>,
    ) -> Result<HttpClient, RegistrationError> {
        let mut builder = HttpClientBuilder::new(name);
        if let Some(registration) = registration {
            for action in registration.chain.iter().chain(registration.actions.iter()) {
                action(provider, &mut builder)?;
            }
        }
        let handlers = builder.handler_count();
        let client = builder.build_with(|| (self.default_transport)())?;
        tracing::debug!(
            client = name,
            handlers,
            registered = registration.is_some(),
            "built named http client"
        );
        Ok(client)
    }

    #[cfg(test)]
    pub(crate) fn cached_clients(&self) -> usize {
        self.slots.lock().len()
    }
}

/// Further configuration of a named client.
///
/// Returned by [`ServiceCollection::http_client`] and by every registrar
/// entry point. Actions run in the order they are added, after the handler
/// chain derived from the registration's settings.
///
/// ```ignore
/// services
///     .add_rest_client::<dyn OrdersApi>(None)
///     .configure_client(|client| {
///         client.timeout(Duration::from_secs(5));
///     })
///     .add_handler(|_| Ok(Arc::new(HeaderHandler::new("x-tenant", "contoso")) as Arc<dyn DelegatingHandler>));
/// ```
pub struct NamedClientBuilder<'a> {
    services: &'a mut ServiceCollection,
    name: String,
}

impl fmt::Debug for NamedClientBuilder<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NamedClientBuilder")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl<'a> NamedClientBuilder<'a> {
    pub(crate) fn new(services: &'a mut ServiceCollection, name: String) -> Self {
        services.clients.add_entry(&name);
        Self { services, name }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Configure the client builder.
    pub fn configure_client<F>(self, configure: F) -> Self
    where
        F: Fn(&mut HttpClientBuilder) + Send + Sync + 'static,
    {
        self.configure_client_with(move |_, builder| {
            configure(builder);
            Ok(())
        })
    }

    /// Configure the client builder with access to the container.
    pub fn configure_client_with<F>(self, configure: F) -> Self
    where
        F: Fn(&ServiceProvider, &mut HttpClientBuilder) -> Result<(), RegistrationError> + Send + Sync + 'static,
    {
        self.services.clients.add_action(&self.name, configure_action(configure));
        self
    }

    /// Apply declarative options.
    pub fn options(self, options: HttpClientOptions) -> Self {
        self.configure_client_with(move |_, builder| {
            builder
                .options(&options)
                .map_err(|e| RegistrationError::InvalidConfiguration(e.to_string()))?;
            Ok(())
        })
    }

    /// Add a delegating handler built from the container.
    pub fn add_handler<F>(self, factory: F) -> Self
    where
        F: Fn(&ServiceProvider) -> Result<Arc<dyn DelegatingHandler>, RegistrationError> + Send + Sync + 'static,
    {
        self.configure_client_with(move |provider, builder| {
            builder.add_handler(factory(provider)?);
            Ok(())
        })
    }

    /// Add a delegating handler registered in the container as `H`.
    pub fn add_handler_service<H>(self) -> Self
    where
        H: DelegatingHandler + Send + Sync + 'static,
    {
        self.add_handler(|provider| Ok(provider.get_required::<H>()? as Arc<dyn DelegatingHandler>))
    }

    /// Replace the primary handler.
    ///
    /// An authorization handler from the registration's settings stays in
    /// front of the replacement.
    pub fn configure_primary_handler<F>(self, factory: F) -> Self
    where
        F: Fn(&ServiceProvider) -> Result<Arc<dyn Transport>, RegistrationError> + Send + Sync + 'static,
    {
        self.configure_client_with(move |provider, builder| {
            builder.primary_handler(factory(provider)?);
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{recording_transport, request};
    use restwire_client::HeaderHandler;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_unknown_name_gets_default_client() {
        let (transport, seen) = recording_transport("default");
        let mut services = ServiceCollection::new();
        services.set_default_transport(move || Ok(transport.clone()));
        let provider = services.build();

        let client = provider.http_client("anything").unwrap();
        assert_eq!(client.name(), "anything");
        client.send(request("/ping")).await.unwrap();
        assert_eq!(seen.lock().len(), 1);
    }

    #[test]
    fn test_client_built_once() {
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = runs.clone();
        let mut services = ServiceCollection::new();
        services.set_default_transport(|| Ok(recording_transport("default").0));
        services.http_client("orders").configure_client(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        let provider = services.build();

        provider.http_client("orders").unwrap();
        provider.http_client("orders").unwrap();
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_actions_and_handlers() {
        let (transport, seen) = recording_transport("default");
        let mut services = ServiceCollection::new();
        services.set_default_transport(move || Ok(transport.clone()));
        services
            .http_client("orders")
            .configure_client(|client| {
                client.base_address("https://orders.internal/api".parse().unwrap());
            })
            .add_handler(|_| Ok(Arc::new(HeaderHandler::new("x-tenant", "contoso")) as Arc<dyn DelegatingHandler>));
        let provider = services.build();

        let client = provider.http_client("orders").unwrap();
        client.send(request("/orders/7")).await.unwrap();

        let seen = seen.lock();
        assert_eq!(seen[0].uri, "https://orders.internal/api/orders/7");
        assert_eq!(seen[0].headers["x-tenant"], "contoso");
    }

    #[test]
    fn test_invalid_options() {
        let mut services = ServiceCollection::new();
        services.set_default_transport(|| Ok(recording_transport("default").0));
        let options = HttpClientOptions {
            base_address: Some("not a uri".to_string()),
            ..Default::default()
        };
        services.http_client("orders").options(options);
        let provider = services.build();

        assert!(matches!(
            provider.http_client("orders"),
            Err(RegistrationError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_unregistered_names_are_not_cached() {
        let built = Arc::new(AtomicUsize::new(0));
        let counter = built.clone();
        let mut services = ServiceCollection::new();
        services.set_default_transport(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(recording_transport("default").0)
        });
        services.http_client("orders");
        let provider = services.build();

        provider.http_client("adhoc-1").unwrap();
        provider.http_client("adhoc-1").unwrap();
        provider.http_client("adhoc-2").unwrap();
        assert_eq!(built.load(Ordering::SeqCst), 3);
        assert_eq!(provider.cached_clients(), 0);

        provider.http_client("orders").unwrap();
        provider.http_client("orders").unwrap();
        assert_eq!(built.load(Ordering::SeqCst), 4);
        assert_eq!(provider.cached_clients(), 1);
    }

    #[tokio::test]
    async fn test_replaced_primary_skips_default_transport() {
        let (transport, seen) = recording_transport("custom");
        let mut services = ServiceCollection::new();
        services.set_default_transport(|| Err(ClientError::transport("no sockets")));
        services
            .http_client("orders")
            .configure_primary_handler(move |_| Ok(transport.clone()));
        let provider = services.build();

        let client = provider.http_client("orders").unwrap();
        client.send(request("/ping")).await.unwrap();
        assert_eq!(seen.lock().len(), 1);
    }

    #[test]
    fn test_default_transport_error_propagates() {
        let mut services = ServiceCollection::new();
        services.set_default_transport(|| Err(ClientError::transport("no sockets")));
        let provider = services.build();

        assert!(matches!(
            provider.http_client("orders"),
            Err(RegistrationError::Client(ClientError::Transport(_)))
        ));
    }
}
