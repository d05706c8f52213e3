//! Typed rest clients in a dependency-injection container.
//!
//! `restwire` binds a contract (a trait describing a remote API, used as
//! `dyn OrdersApi`) to a named HTTP client inside a [`ServiceCollection`].
//! For each registration it binds:
//!
//! - a [`ContractSettings`], produced once per provider;
//! - a [`RequestBuilder`] built from those settings;
//! - a named [`HttpClient`] whose primary handler follows the settings: the
//!   default transport, a caller-supplied base handler, and/or an
//!   authorization handler in front of either;
//! - a transient factory returning a fresh contract instance over the two.
//!
//! ## Example
//!
//! ```ignore
//! use restwire::{ClientSettings, Contract, RestClientServices, ServiceCollection};
//!
//! impl Contract for dyn OrdersApi {
//!     fn create(client: HttpClient, builder: Arc<dyn RequestBuilder>) -> Arc<Self> {
//!         Arc::new(OrdersClient::new(RestClient::new(client, builder)))
//!     }
//! }
//!
//! let mut services = ServiceCollection::new();
//! services.add_rest_client::<dyn OrdersApi>(Some(
//!     ClientSettings::new().authorization_token(|| std::env::var("ORDERS_TOKEN").unwrap_or_default()),
//! ));
//!
//! let provider = services.build();
//! let orders = provider.get_required::<dyn OrdersApi>()?;
//! ```
//!
//! ## Keyed Registrations
//!
//! The same contract can be registered several times under different
//! [`ServiceKey`]s. Each key has its own settings, request builder and
//! named client.
//!
//! ```ignore
//! services.add_keyed_rest_client::<dyn OrdersApi>("eu", Some(eu_settings));
//! services.add_keyed_rest_client::<dyn OrdersApi>("us", Some(us_settings));
//!
//! let eu = provider.get_required_keyed::<dyn OrdersApi>("eu")?;
//! ```
//!
//! ## Runtime Registration
//!
//! Contracts can be registered from data through a [`ContractCatalog`]. The
//! request builder is then created through the single generic factory
//! method of [`RequestBuilderFactory`], discovered once per process.
//!
//! ```ignore
//! let mut catalog = ContractCatalog::new();
//! catalog.register::<dyn OrdersApi>("orders");
//!
//! let contract = catalog.resolve("orders")?;
//! services.add_rest_client_for(&contract, None)?;
//! ```
//!
//! ## Logging
//!
//! Registration, settings production, request-builder construction and
//! named-client construction emit `tracing` debug events. Enable the
//! `tracing` feature of `restwire-client` for per-request spans.

mod chain;
mod container;
mod contract;
mod error;
mod http_factory;
mod naming;
mod registrar;
mod request_builder;
mod settings;

#[cfg(test)]
mod testing;

pub use chain::{ChainDecision, compose};
pub use container::{
    ErasedFactory, ErasedService, Lifetime, ServiceCollection, ServiceId, ServiceKey, ServiceProvider,
    ServiceRole, TransportFactory, TypeKey,
};
pub use contract::{Contract, ContractCatalog, ContractType, RestClient, RestService};
pub use error::RegistrationError;
pub use http_factory::{ConfigureAction, NamedClientBuilder, configure_action};
pub use naming::{unique_name, unique_name_for};
pub use registrar::RestClientServices;
pub use request_builder::{
    FactoryInvoke, FactoryMethod, RequestBuilder, RequestBuilderFactory, RequestBuilderSurface,
    TypedRequestBuilder, bind_request_builder, bind_request_builder_dynamic, default_factory_method,
    discover_factory_method, factory_invoke, resolve_request_builder,
};
pub use settings::{ClientSettings, ContractSettings, HandlerFactory, bind_settings, resolve_settings};

// Re-export the client crate for contract implementations
pub use restwire_client;
pub use restwire_client::{ClientError, HttpClient, HttpClientBuilder, HttpRequest, HttpResponse};
