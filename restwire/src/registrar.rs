//! Rest client registration.
//!
//! [`RestClientServices`] adds typed rest clients to a [`ServiceCollection`].
//! Every entry point performs the same four steps for its contract and key:
//!
//! 1. bind the settings ([`bind_settings`]);
//! 2. bind the request builder, statically or through factory-method
//!    discovery for a runtime [`ContractType`];
//! 3. install the handler chain derived from the settings on the named
//!    client, which is built on first use;
//! 4. register a transient factory for the contract that combines the named
//!    client with the bound request builder.
//!
//! # Example
//!
//! ```ignore
//! use restwire::{ClientSettings, RestClientServices, ServiceCollection};
//!
//! let mut services = ServiceCollection::new();
//! services
//!     .add_rest_client::<dyn OrdersApi>(Some(
//!         ClientSettings::new().authorization_header_value_getter(|_req| async { fetch_token().await }),
//!     ))
//!     .configure_client(|client| {
//!         client.base_address("https://orders.internal/api/".parse().unwrap());
//!     });
//!
//! let provider = services.build();
//! let orders = provider.get_required::<dyn OrdersApi>()?;
//! ```

use std::sync::Arc;

use crate::RegistrationError;
use crate::chain::compose;
use crate::container::{
    ErasedService, Lifetime, ServiceCollection, ServiceKey, ServiceProvider, ServiceRole,
};
use crate::contract::{Contract, ContractType, RestService};
use crate::http_factory::{NamedClientBuilder, configure_action};
use crate::naming::unique_name;
use crate::request_builder::{
    RequestBuilderSurface, bind_request_builder, bind_request_builder_dynamic, resolve_request_builder,
};
use crate::settings::{ClientSettings, bind_settings, resolve_settings};

/// Registration of typed rest clients.
pub trait RestClientServices {
    /// Register `T` with optional settings.
    fn add_rest_client<T: ?Sized + Contract>(
        &mut self,
        settings: Option<ClientSettings>,
    ) -> NamedClientBuilder<'_>;

    /// Register `T`, producing its settings from the container on first use.
    ///
    /// `client_name` overrides the generated name of the backing client.
    fn add_rest_client_with<T, F>(
        &mut self,
        producer: F,
        client_name: Option<&str>,
    ) -> NamedClientBuilder<'_>
    where
        T: ?Sized + Contract,
        F: Fn(&ServiceProvider) -> Option<ClientSettings> + Send + Sync + 'static;

    /// Register `T` under `key`.
    fn add_keyed_rest_client<T: ?Sized + Contract>(
        &mut self,
        key: impl Into<ServiceKey>,
        settings: Option<ClientSettings>,
    ) -> NamedClientBuilder<'_>;

    fn add_keyed_rest_client_with<T, F>(
        &mut self,
        key: impl Into<ServiceKey>,
        producer: F,
        client_name: Option<&str>,
    ) -> NamedClientBuilder<'_>
    where
        T: ?Sized + Contract,
        F: Fn(&ServiceProvider) -> Option<ClientSettings> + Send + Sync + 'static;

    /// Register a contract known only at runtime.
    fn add_rest_client_for(
        &mut self,
        contract: &ContractType,
        settings: Option<ClientSettings>,
    ) -> Result<NamedClientBuilder<'_>, RegistrationError>;

    fn add_rest_client_for_with<F>(
        &mut self,
        contract: &ContractType,
        producer: F,
        client_name: Option<&str>,
    ) -> Result<NamedClientBuilder<'_>, RegistrationError>
    where
        F: Fn(&ServiceProvider) -> Option<ClientSettings> + Send + Sync + 'static;

    fn add_keyed_rest_client_for(
        &mut self,
        contract: &ContractType,
        key: impl Into<ServiceKey>,
        settings: Option<ClientSettings>,
    ) -> Result<NamedClientBuilder<'_>, RegistrationError>;

    fn add_keyed_rest_client_for_with<F>(
        &mut self,
        contract: &ContractType,
        key: impl Into<ServiceKey>,
        producer: F,
        client_name: Option<&str>,
    ) -> Result<NamedClientBuilder<'_>, RegistrationError>
    where
        F: Fn(&ServiceProvider) -> Option<ClientSettings> + Send + Sync + 'static;

    /// Register a runtime contract, discovering the request-builder factory
    /// method on `surface`.
    ///
    /// Fails before anything is registered when `surface` has zero or several
    /// candidate methods.
    fn add_rest_client_with_surface<F>(
        &mut self,
        contract: &ContractType,
        key: Option<ServiceKey>,
        producer: F,
        client_name: Option<&str>,
        surface: &dyn RequestBuilderSurface,
    ) -> Result<NamedClientBuilder<'_>, RegistrationError>
    where
        F: Fn(&ServiceProvider) -> Option<ClientSettings> + Send + Sync + 'static;
}

fn fixed(
    settings: Option<ClientSettings>,
) -> impl Fn(&ServiceProvider) -> Option<ClientSettings> + Send + Sync + 'static {
    move |_: &ServiceProvider| settings.clone()
}

impl RestClientServices for ServiceCollection {
    fn add_rest_client<T: ?Sized + Contract>(
        &mut self,
        settings: Option<ClientSettings>,
    ) -> NamedClientBuilder<'_> {
        register_static::<T, _>(self, None, fixed(settings), None)
    }

    fn add_rest_client_with<T, F>(
        &mut self,
        producer: F,
        client_name: Option<&str>,
    ) -> NamedClientBuilder<'_>
    where
        T: ?Sized + Contract,
        F: Fn(&ServiceProvider) -> Option<ClientSettings> + Send + Sync + 'static,
    {
        register_static::<T, _>(self, None, producer, client_name)
    }

    fn add_keyed_rest_client<T: ?Sized + Contract>(
        &mut self,
        key: impl Into<ServiceKey>,
        settings: Option<ClientSettings>,
    ) -> NamedClientBuilder<'_> {
        register_static::<T, _>(self, Some(key.into()), fixed(settings), None)
    }

    fn add_keyed_rest_client_with<T, F>(
        &mut self,
        key: impl Into<ServiceKey>,
        producer: F,
        client_name: Option<&str>,
    ) -> NamedClientBuilder<'_>
    where
        T: ?Sized + Contract,
        F: Fn(&ServiceProvider) -> Option<ClientSettings> + Send + Sync + 'static,
    {
        register_static::<T, _>(self, Some(key.into()), producer, client_name)
    }

    fn add_rest_client_for(
        &mut self,
        contract: &ContractType,
        settings: Option<ClientSettings>,
    ) -> Result<NamedClientBuilder<'_>, RegistrationError> {
        register_dynamic(self, contract, None, fixed(settings), None, None)
    }

    fn add_rest_client_for_with<F>(
        &mut self,
        contract: &ContractType,
        producer: F,
        client_name: Option<&str>,
    ) -> Result<NamedClientBuilder<'_>, RegistrationError>
    where
        F: Fn(&ServiceProvider) -> Option<ClientSettings> + Send + Sync + 'static,
    {
        register_dynamic(self, contract, None, producer, client_name, None)
    }

    fn add_keyed_rest_client_for(
        &mut self,
        contract: &ContractType,
        key: impl Into<ServiceKey>,
        settings: Option<ClientSettings>,
    ) -> Result<NamedClientBuilder<'_>, RegistrationError> {
        register_dynamic(self, contract, Some(key.into()), fixed(settings), None, None)
    }

    fn add_keyed_rest_client_for_with<F>(
        &mut self,
        contract: &ContractType,
        key: impl Into<ServiceKey>,
        producer: F,
        client_name: Option<&str>,
    ) -> Result<NamedClientBuilder<'_>, RegistrationError>
    where
        F: Fn(&ServiceProvider) -> Option<ClientSettings> + Send + Sync + 'static,
    {
        register_dynamic(self, contract, Some(key.into()), producer, client_name, None)
    }

    fn add_rest_client_with_surface<F>(
        &mut self,
        contract: &ContractType,
        key: Option<ServiceKey>,
        producer: F,
        client_name: Option<&str>,
        surface: &dyn RequestBuilderSurface,
    ) -> Result<NamedClientBuilder<'_>, RegistrationError>
    where
        F: Fn(&ServiceProvider) -> Option<ClientSettings> + Send + Sync + 'static,
    {
        register_dynamic(self, contract, key, producer, client_name, Some(surface))
    }
}

fn register_static<'a, T, F>(
    services: &'a mut ServiceCollection,
    key: Option<ServiceKey>,
    producer: F,
    client_name: Option<&str>,
) -> NamedClientBuilder<'a>
where
    T: ?Sized + Contract,
    F: Fn(&ServiceProvider) -> Option<ClientSettings> + Send + Sync + 'static,
{
    let contract = ContractType::of::<T>();
    bind_settings(services, &contract, key.clone(), producer);
    bind_request_builder::<T>(services, key.clone());
    let name = install_chain(services, &contract, key.clone(), client_name);

    let client_name = name.clone();
    let bound = contract.clone();
    let bound_key = key.clone();
    let factory = move |provider: &ServiceProvider| -> Result<Arc<T>, RegistrationError> {
        let client = provider.http_client(&client_name)?;
        let builder = resolve_request_builder(provider, &bound, bound_key.as_ref())?;
        Ok(RestService::for_type::<T>(client, builder))
    };
    match key.clone() {
        Some(key) => services.add_keyed_transient::<T, _>(key, factory),
        None => services.add_transient::<T, _>(factory),
    };

    tracing::debug!(
        contract = contract.name(),
        key = ?key,
        client = %name,
        "registered rest client"
    );
    services.http_client(name)
}

fn register_dynamic<'a, F>(
    services: &'a mut ServiceCollection,
    contract: &ContractType,
    key: Option<ServiceKey>,
    producer: F,
    client_name: Option<&str>,
    surface: Option<&dyn RequestBuilderSurface>,
) -> Result<NamedClientBuilder<'a>, RegistrationError>
where
    F: Fn(&ServiceProvider) -> Option<ClientSettings> + Send + Sync + 'static,
{
    // Discovery runs before the settings are bound so a bad surface leaves
    // the collection untouched.
    bind_request_builder_dynamic(services, contract, key.clone(), surface)?;
    bind_settings(services, contract, key.clone(), producer);
    let name = install_chain(services, contract, key.clone(), client_name);

    let client_name = name.clone();
    let bound = contract.clone();
    let bound_key = key.clone();
    services.add_service(
        contract.service_id(ServiceRole::Service, key.clone()),
        Lifetime::Transient,
        Arc::new(move |provider: &ServiceProvider| -> Result<ErasedService, RegistrationError> {
            let client = provider.http_client(&client_name)?;
            let builder = resolve_request_builder(provider, &bound, bound_key.as_ref())?;
            Ok(RestService::for_contract(&bound, client, builder))
        }),
    );

    tracing::debug!(
        contract = contract.name(),
        key = ?key,
        client = %name,
        "registered rest client"
    );
    Ok(services.http_client(name))
}

/// Attach the settings-derived handler chain to the registration's client.
fn install_chain(
    services: &mut ServiceCollection,
    contract: &ContractType,
    key: Option<ServiceKey>,
    client_name: Option<&str>,
) -> String {
    let name = client_name
        .map(str::to_string)
        .unwrap_or_else(|| unique_name(contract, key.as_ref()));

    let bound = contract.clone();
    let client = name.clone();
    services.clients.set_chain_action(
        &name,
        configure_action(move |provider, builder| {
            let settings = resolve_settings(provider, &bound, key.as_ref())?;
            let decision = compose(settings.settings.as_deref());
            tracing::debug!(client = %client, decision = decision.kind(), "applying handler chain");
            decision.apply(builder);
            Ok(())
        }),
    );
    name
}
