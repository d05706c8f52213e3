//! Request builders and their binding.
//!
//! Every registration owns one [`RequestBuilder`], built from its settings the
//! first time it is resolved and shared for the life of the provider.
//!
//! Two binding paths exist:
//! - [`bind_request_builder`] for contracts known statically, which calls
//!   [`RequestBuilderFactory::for_type`] directly;
//! - [`bind_request_builder_dynamic`] for a runtime [`ContractType`], which
//!   locates the single generic one-parameter factory method of a
//!   [`RequestBuilderSurface`] and invokes it for the contract. The lookup
//!   fails at registration time when the surface offers zero or several
//!   such methods.

use std::fmt;
use std::marker::PhantomData;
use std::sync::{Arc, OnceLock};

use bytes::Bytes;
use http::Method;
use http::header::{ACCEPT, CONTENT_TYPE, HeaderValue};
use restwire_client::{ClientError, HttpRequest};

use crate::RegistrationError;
use crate::container::{
    ErasedService, Lifetime, ServiceCollection, ServiceId, ServiceKey, ServiceProvider, ServiceRole,
};
use crate::contract::{Contract, ContractType};
use crate::settings::{ClientSettings, resolve_settings};

/// Builds the HTTP requests of one contract registration.
pub trait RequestBuilder: Send + Sync {
    /// Contract the builder serves.
    fn contract(&self) -> &ContractType;

    /// Settings the builder was created with.
    fn settings(&self) -> Option<&Arc<ClientSettings>>;

    /// Build a request for `path`, relative to the client's base address.
    fn build_request(&self, method: Method, path: &str, body: Bytes) -> Result<HttpRequest, ClientError>;
}

/// Request builder for the contract `T`.
pub struct TypedRequestBuilder<T: ?Sized> {
    contract: ContractType,
    settings: Option<Arc<ClientSettings>>,
    _contract: PhantomData<fn() -> *const T>,
}

impl<T: ?Sized> fmt::Debug for TypedRequestBuilder<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypedRequestBuilder")
            .field("contract", &self.contract)
            .field("settings", &self.settings)
            .finish()
    }
}

impl<T: ?Sized + Contract> TypedRequestBuilder<T> {
    pub fn new(settings: Option<Arc<ClientSettings>>) -> Self {
        Self {
            contract: ContractType::of::<T>(),
            settings,
            _contract: PhantomData,
        }
    }
}

impl<T: ?Sized + Contract> RequestBuilder for TypedRequestBuilder<T> {
    fn contract(&self) -> &ContractType {
        &self.contract
    }

    fn settings(&self) -> Option<&Arc<ClientSettings>> {
        self.settings.as_ref()
    }

    fn build_request(&self, method: Method, path: &str, body: Bytes) -> Result<HttpRequest, ClientError> {
        let mut builder = http::Request::builder()
            .method(method)
            .uri(path)
            .header(ACCEPT, HeaderValue::from_static("application/json"));
        if !body.is_empty() {
            builder = builder.header(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        }
        Ok(builder.body(body)?)
    }
}

/// Entry points for building request builders.
pub struct RequestBuilderFactory;

impl RequestBuilderFactory {
    /// Build the request builder of `T` over `settings`.
    pub fn for_type<T: ?Sized + Contract>(settings: Option<Arc<ClientSettings>>) -> Arc<dyn RequestBuilder> {
        Arc::new(TypedRequestBuilder::<T>::new(settings))
    }

    /// Build the request builder of `T` with default settings.
    pub fn for_type_default<T: ?Sized + Contract>() -> Arc<dyn RequestBuilder> {
        Self::for_type::<T>(None)
    }
}

/// Invokes a factory method for a runtime contract.
pub type FactoryInvoke = Arc<
    dyn Fn(&ContractType, Option<Arc<ClientSettings>>) -> Result<Arc<dyn RequestBuilder>, RegistrationError>
        + Send
        + Sync,
>;

/// Wrap a closure as a [`FactoryInvoke`].
pub fn factory_invoke<F>(invoke: F) -> FactoryInvoke
where
    F: Fn(&ContractType, Option<Arc<ClientSettings>>) -> Result<Arc<dyn RequestBuilder>, RegistrationError>
        + Send
        + Sync
        + 'static,
{
    Arc::new(invoke)
}

/// One factory method offered by a [`RequestBuilderSurface`].
#[derive(Clone)]
pub struct FactoryMethod {
    pub name: &'static str,
    /// Whether the method is generic over the contract type.
    pub generic: bool,
    /// Number of value parameters.
    pub params: usize,
    pub invoke: FactoryInvoke,
}

impl fmt::Debug for FactoryMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FactoryMethod")
            .field("name", &self.name)
            .field("generic", &self.generic)
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

impl FactoryMethod {
    fn is_candidate(&self) -> bool {
        self.generic && self.params == 1
    }
}

/// A set of factory methods that can build request builders.
pub trait RequestBuilderSurface: Send + Sync {
    fn name(&self) -> &'static str;

    fn methods(&self) -> Vec<FactoryMethod>;
}

impl RequestBuilderSurface for RequestBuilderFactory {
    fn name(&self) -> &'static str {
        "RequestBuilderFactory"
    }

    fn methods(&self) -> Vec<FactoryMethod> {
        vec![
            FactoryMethod {
                name: "for_type",
                generic: true,
                params: 1,
                invoke: factory_invoke(|contract, settings| {
                    Ok(contract.request_builder(settings))
                }),
            },
            FactoryMethod {
                name: "for_type_default",
                generic: true,
                params: 0,
                invoke: factory_invoke(|contract, _settings| {
                    Ok(contract.request_builder(None))
                }),
            },
        ]
    }
}

/// Find the single generic one-parameter factory method of `surface`.
pub fn discover_factory_method(surface: &dyn RequestBuilderSurface) -> Result<FactoryMethod, RegistrationError> {
    let mut candidates: Vec<FactoryMethod> = surface
        .methods()
        .into_iter()
        .filter(FactoryMethod::is_candidate)
        .collect();

    match candidates.len() {
        0 => Err(RegistrationError::NoFactoryMethod {
            surface: surface.name(),
        }),
        1 => {
            let method = candidates.remove(0);
            tracing::debug!(
                surface = surface.name(),
                method = method.name,
                "discovered request builder factory method"
            );
            Ok(method)
        }
        _ => Err(RegistrationError::AmbiguousFactoryMethod {
            surface: surface.name(),
            candidates: candidates.iter().map(|m| m.name).collect(),
        }),
    }
}

/// The factory method of [`RequestBuilderFactory`], discovered once per process.
pub fn default_factory_method() -> Result<FactoryMethod, RegistrationError> {
    static METHOD: OnceLock<Result<FactoryMethod, RegistrationError>> = OnceLock::new();
    METHOD
        .get_or_init(|| discover_factory_method(&RequestBuilderFactory))
        .clone()
}

pub(crate) fn request_builder_id(contract: &ContractType, key: Option<ServiceKey>) -> ServiceId {
    contract.service_id(ServiceRole::RequestBuilder, key)
}

fn register(
    services: &mut ServiceCollection,
    contract: &ContractType,
    key: Option<ServiceKey>,
    build: FactoryInvoke,
) {
    let id = request_builder_id(contract, key.clone());
    let bound = contract.clone();
    services.add_service(
        id,
        Lifetime::Singleton,
        Arc::new(move |provider: &ServiceProvider| -> Result<ErasedService, RegistrationError> {
            let settings = resolve_settings(provider, &bound, key.as_ref())?;
            let builder = build(&bound, settings.settings.clone())?;
            tracing::debug!(contract = bound.name(), key = ?key, "built request builder");
            Ok(Arc::new(builder) as ErasedService)
        }),
    );
}

/// Bind the request builder of `T` under `key`.
pub fn bind_request_builder<T: ?Sized + Contract>(services: &mut ServiceCollection, key: Option<ServiceKey>) {
    register(
        services,
        &ContractType::of::<T>(),
        key,
        factory_invoke(|_contract, settings| {
            Ok(RequestBuilderFactory::for_type::<T>(settings))
        }),
    );
}

/// Bind the request builder of a runtime `contract` under `key`.
///
/// `surface` defaults to [`RequestBuilderFactory`]. Fails when the surface
/// has no single generic one-parameter factory method.
pub fn bind_request_builder_dynamic(
    services: &mut ServiceCollection,
    contract: &ContractType,
    key: Option<ServiceKey>,
    surface: Option<&dyn RequestBuilderSurface>,
) -> Result<(), RegistrationError> {
    let method = match surface {
        Some(surface) => discover_factory_method(surface)?,
        None => default_factory_method()?,
    };
    register(services, contract, key, method.invoke);
    Ok(())
}

/// Resolve the request builder bound for `contract` under `key`.
pub fn resolve_request_builder(
    provider: &ServiceProvider,
    contract: &ContractType,
    key: Option<&ServiceKey>,
) -> Result<Arc<dyn RequestBuilder>, RegistrationError> {
    provider.get_required_as::<dyn RequestBuilder>(&request_builder_id(contract, key.cloned()))
}
