//! Contract types.
//!
//! A contract is a trait describing a remote API, registered as its trait
//! object type (`dyn OrdersApi`). Implementing [`Contract`] for the trait
//! object tells the registrar how to turn a named [`HttpClient`] and a bound
//! [`RequestBuilder`] into an instance.
//!
//! # Example
//!
//! ```ignore
//! pub trait OrdersApi: Send + Sync {
//!     fn get_order(&self, id: u64) -> BoxFuture<'_, Result<Order, ClientError>>;
//! }
//!
//! struct OrdersClient(RestClient);
//!
//! impl OrdersApi for OrdersClient { /* ... */ }
//!
//! impl Contract for dyn OrdersApi {
//!     fn create(client: HttpClient, builder: Arc<dyn RequestBuilder>) -> Arc<Self> {
//!         Arc::new(OrdersClient(RestClient::new(client, builder)))
//!     }
//! }
//! ```
//!
//! A [`ContractType`] is the runtime form of a contract: it can be stored,
//! looked up by name in a [`ContractCatalog`] and registered without the
//! static type in scope.

use std::any::TypeId;
use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::sync::Arc;

use bytes::Bytes;
use http::Method;
use restwire_client::{ClientError, HttpClient, HttpResponse};

use crate::RegistrationError;
use crate::container::{ErasedService, ServiceId, ServiceKey, ServiceRole, TypeKey};
use crate::request_builder::{RequestBuilder, RequestBuilderFactory};
use crate::settings::ClientSettings;

/// A remote API that can be materialized over an HTTP client.
pub trait Contract: Send + Sync + 'static {
    /// Build an instance over `client`, using `builder` to shape requests.
    fn create(client: HttpClient, builder: Arc<dyn RequestBuilder>) -> Arc<Self>;
}

/// Operations that need the static type of a contract.
trait ErasedContract: Send + Sync {
    fn request_builder(&self, settings: Option<Arc<ClientSettings>>) -> Arc<dyn RequestBuilder>;

    fn create(&self, client: HttpClient, builder: Arc<dyn RequestBuilder>) -> ErasedService;
}

struct ContractShim<T: ?Sized>(PhantomData<fn() -> *const T>);

impl<T: ?Sized + Contract> ErasedContract for ContractShim<T> {
    fn request_builder(&self, settings: Option<Arc<ClientSettings>>) -> Arc<dyn RequestBuilder> {
        RequestBuilderFactory::for_type::<T>(settings)
    }

    fn create(&self, client: HttpClient, builder: Arc<dyn RequestBuilder>) -> ErasedService {
        Arc::new(RestService::for_type::<T>(client, builder)) as ErasedService
    }
}

/// Runtime identifier of a contract.
#[derive(Clone)]
pub struct ContractType {
    key: TypeKey,
    shim: Arc<dyn ErasedContract>,
}

impl ContractType {
    pub fn of<T: ?Sized + Contract>() -> Self {
        Self {
            key: TypeKey::of::<T>(),
            shim: Arc::new(ContractShim::<T>(PhantomData)),
        }
    }

    pub fn type_id(&self) -> TypeId {
        self.key.type_id()
    }

    pub fn name(&self) -> &'static str {
        self.key.name()
    }

    pub fn type_key(&self) -> TypeKey {
        self.key
    }

    /// Id of the registration providing `role` for this contract under `key`.
    pub fn service_id(&self, role: ServiceRole, key: Option<ServiceKey>) -> ServiceId {
        ServiceId::new(self.key.with_role(role), key)
    }

    /// Build the request builder of this contract over `settings`.
    pub(crate) fn request_builder(&self, settings: Option<Arc<ClientSettings>>) -> Arc<dyn RequestBuilder> {
        self.shim.request_builder(settings)
    }
}

impl PartialEq for ContractType {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for ContractType {}

impl Hash for ContractType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}

impl fmt::Debug for ContractType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ContractType").field(&self.name()).finish()
    }
}

/// Named contracts for data-driven registration.
///
/// ```ignore
/// let mut catalog = ContractCatalog::new();
/// catalog.register::<dyn OrdersApi>("orders");
///
/// for name in config.clients.keys() {
///     services.add_rest_client_for(&catalog.resolve(name)?, None)?;
/// }
/// ```
#[derive(Clone, Debug, Default)]
pub struct ContractCatalog {
    contracts: BTreeMap<String, ContractType>,
}

impl ContractCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<T: ?Sized + Contract>(&mut self, name: impl Into<String>) -> &mut Self {
        self.contracts.insert(name.into(), ContractType::of::<T>());
        self
    }

    pub fn resolve(&self, name: &str) -> Result<ContractType, RegistrationError> {
        self.contracts
            .get(name)
            .cloned()
            .ok_or_else(|| RegistrationError::UnknownContract(name.to_string()))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.contracts.keys().map(String::as_str)
    }
}

/// Builds contract instances.
pub struct RestService;

impl RestService {
    pub fn for_type<T: ?Sized + Contract>(client: HttpClient, builder: Arc<dyn RequestBuilder>) -> Arc<T> {
        T::create(client, builder)
    }

    /// Build an instance of a contract known only at runtime.
    ///
    /// The result holds an `Arc<T>` for the contract's static type.
    pub fn for_contract(
        contract: &ContractType,
        client: HttpClient,
        builder: Arc<dyn RequestBuilder>,
    ) -> ErasedService {
        contract.shim.create(client, builder)
    }
}

/// A named client paired with the request builder of its registration.
///
/// Contract implementations usually wrap one of these.
#[derive(Clone)]
pub struct RestClient {
    client: HttpClient,
    builder: Arc<dyn RequestBuilder>,
}

impl fmt::Debug for RestClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RestClient")
            .field("client", &self.client)
            .field("contract", self.builder.contract())
            .finish()
    }
}

impl RestClient {
    pub fn new(client: HttpClient, builder: Arc<dyn RequestBuilder>) -> Self {
        Self { client, builder }
    }

    pub fn http_client(&self) -> &HttpClient {
        &self.client
    }

    pub fn request_builder(&self) -> &Arc<dyn RequestBuilder> {
        &self.builder
    }

    /// Build a request for `path` and send it through the client pipeline.
    pub async fn send(&self, method: Method, path: &str, body: Bytes) -> Result<HttpResponse, ClientError> {
        let request = self.builder.build_request(method, path, body)?;
        self.client.send(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Other, Pinger};

    #[test]
    fn test_contract_type_identity() {
        assert_eq!(ContractType::of::<dyn Pinger>(), ContractType::of::<dyn Pinger>());
        assert_ne!(ContractType::of::<dyn Pinger>(), ContractType::of::<dyn Other>());
        assert!(ContractType::of::<dyn Pinger>().name().contains("Pinger"));
    }

    #[test]
    fn test_catalog() {
        let mut catalog = ContractCatalog::new();
        catalog.register::<dyn Pinger>("pinger").register::<dyn Other>("other");

        assert_eq!(catalog.resolve("pinger").unwrap(), ContractType::of::<dyn Pinger>());
        assert_eq!(catalog.names().collect::<Vec<_>>(), vec!["other", "pinger"]);
        assert!(matches!(
            catalog.resolve("billing"),
            Err(RegistrationError::UnknownContract(name)) if name == "billing"
        ));
    }

    #[test]
    fn test_service_ids_differ_by_role_and_key() {
        let contract = ContractType::of::<dyn Pinger>();
        let settings = contract.service_id(ServiceRole::Settings, None);
        let builder = contract.service_id(ServiceRole::RequestBuilder, None);
        let keyed = contract.service_id(ServiceRole::Settings, Some("a".into()));

        assert_ne!(settings, builder);
        assert_ne!(settings, keyed);
        assert_eq!(settings, ServiceId::new(contract.type_key().with_role(ServiceRole::Settings), None));
    }
}
