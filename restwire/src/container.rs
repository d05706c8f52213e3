//! Dependency-injection container.
//!
//! Registrations are collected on a [`ServiceCollection`] and frozen into a
//! [`ServiceProvider`] by [`ServiceCollection::build`]. Services are keyed by
//! interface type (usually a trait object such as `dyn OrdersApi`), an
//! optional [`ServiceKey`], and a [`ServiceRole`] that keeps the settings and
//! request builder of a contract apart from the contract itself.
//!
//! Values are stored as `Arc<T>` inside `Arc<dyn Any + Send + Sync>` and
//! downcast on read, which works for unsized `T`.
//!
//! # Example
//!
//! ```ignore
//! let mut services = ServiceCollection::new();
//! services.add_singleton::<Config, _>(|_| Ok(Arc::new(Config::load()?)));
//! services.add_transient::<dyn Clock, _>(|_| Ok(Arc::new(SystemClock) as Arc<dyn Clock>));
//!
//! let provider = services.build();
//! let config = provider.get_required::<Config>()?;
//! ```

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use restwire_client::{ClientError, HttpClient, Transport};

use crate::RegistrationError;
use crate::http_factory::{HttpClientFactory, HttpClientRegistry, NamedClientBuilder};

/// A resolved service with its concrete type erased.
///
/// The value is always an `Arc<T>` for the interface type `T` of the
/// registration.
pub type ErasedService = Arc<dyn Any + Send + Sync>;

/// A type-erased service factory.
pub type ErasedFactory =
    Arc<dyn Fn(&ServiceProvider) -> Result<ErasedService, RegistrationError> + Send + Sync>;

/// Produces the default primary transport of named clients.
pub type TransportFactory =
    Arc<dyn Fn() -> Result<Arc<dyn Transport>, ClientError> + Send + Sync>;

/// Opaque key distinguishing multiple registrations of the same type.
///
/// Strings and integers are accepted. Keys of different kinds never compare
/// equal, so `1` and `"1"` are distinct keys.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ServiceKey(KeyValue);

#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
enum KeyValue {
    Int(i128),
    Str(Arc<str>),
}

impl ServiceKey {
    pub fn new(key: impl Into<ServiceKey>) -> Self {
        key.into()
    }

    /// The key's text, if it is a string key.
    pub fn as_str(&self) -> Option<&str> {
        match &self.0 {
            KeyValue::Str(key) => Some(key),
            KeyValue::Int(_) => None,
        }
    }

    /// The key's value, if it is an integer key.
    pub fn as_int(&self) -> Option<i128> {
        match self.0 {
            KeyValue::Int(key) => Some(key),
            KeyValue::Str(_) => None,
        }
    }
}

impl fmt::Debug for ServiceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            KeyValue::Int(key) => fmt::Debug::fmt(key, f),
            KeyValue::Str(key) => fmt::Debug::fmt(&**key, f),
        }
    }
}

impl fmt::Display for ServiceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            KeyValue::Int(key) => fmt::Display::fmt(key, f),
            KeyValue::Str(key) => f.write_str(key),
        }
    }
}

impl From<&str> for ServiceKey {
    fn from(key: &str) -> Self {
        Self(KeyValue::Str(key.into()))
    }
}

impl From<String> for ServiceKey {
    fn from(key: String) -> Self {
        Self(KeyValue::Str(key.into()))
    }
}

impl From<Arc<str>> for ServiceKey {
    fn from(key: Arc<str>) -> Self {
        Self(KeyValue::Str(key))
    }
}

macro_rules! int_key {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for ServiceKey {
                fn from(key: $ty) -> Self {
                    Self(KeyValue::Int(i128::from(key)))
                }
            }
        )*
    };
}

int_key!(i8, i16, i32, i64, u8, u16, u32, u64);

impl From<usize> for ServiceKey {
    fn from(key: usize) -> Self {
        // usize is at most 64 bits on supported targets
        Self(KeyValue::Int(key as i128))
    }
}

/// What a registration provides for its type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ServiceRole {
    /// The type itself.
    Service,
    /// The bound settings of a contract.
    Settings,
    /// The bound request builder of a contract.
    RequestBuilder,
}

/// Stable type key; works for `T = dyn Trait`.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeKey {
    id: TypeId,
    name: &'static str,
    role: ServiceRole,
}

impl TypeKey {
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self::from_parts(TypeId::of::<T>(), std::any::type_name::<T>(), ServiceRole::Service)
    }

    pub fn from_parts(id: TypeId, name: &'static str, role: ServiceRole) -> Self {
        Self { id, name, role }
    }

    pub fn with_role(self, role: ServiceRole) -> Self {
        Self { role, ..self }
    }

    pub fn type_id(&self) -> TypeId {
        self.id
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn role(&self) -> ServiceRole {
        self.role
    }
}

impl fmt::Debug for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.role {
            ServiceRole::Service => f.write_str(self.name),
            ServiceRole::Settings => write!(f, "{} (settings)", self.name),
            ServiceRole::RequestBuilder => write!(f, "{} (request builder)", self.name),
        }
    }
}

/// Identifies one registration: a type key plus an optional service key.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct ServiceId {
    type_key: TypeKey,
    key: Option<ServiceKey>,
}

impl ServiceId {
    pub fn new(type_key: TypeKey, key: Option<ServiceKey>) -> Self {
        Self { type_key, key }
    }

    pub fn of<T: ?Sized + 'static>(key: Option<ServiceKey>) -> Self {
        Self::new(TypeKey::of::<T>(), key)
    }

    pub fn type_key(&self) -> &TypeKey {
        &self.type_key
    }

    pub fn key(&self) -> Option<&ServiceKey> {
        self.key.as_ref()
    }
}

impl fmt::Debug for ServiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl fmt::Display for ServiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.key {
            Some(key) => write!(f, "{:?} [key={:?}]", self.type_key, key),
            None => write!(f, "{:?}", self.type_key),
        }
    }
}

/// How long a resolved instance lives.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Lifetime {
    /// Built on first resolution, shared for the life of the provider.
    Singleton,
    /// Built on every resolution.
    Transient,
}

struct Registration {
    lifetime: Lifetime,
    factory: ErasedFactory,
    /// Pre-built value for instance registrations.
    instance: Option<ErasedService>,
}

/// Mutable set of registrations, consumed by [`build`](Self::build).
#[derive(Default)]
pub struct ServiceCollection {
    registrations: HashMap<ServiceId, Registration>,
    pub(crate) clients: HttpClientRegistry,
}

impl fmt::Debug for ServiceCollection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceCollection")
            .field("services", &self.registrations.keys().collect::<Vec<_>>())
            .field("clients", &self.clients)
            .finish()
    }
}

impl ServiceCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.registrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registrations.is_empty()
    }

    pub fn contains(&self, id: &ServiceId) -> bool {
        self.registrations.contains_key(id)
    }

    /// Register an erased factory. A second registration of the same id
    /// replaces the first.
    pub fn add_service(&mut self, id: ServiceId, lifetime: Lifetime, factory: ErasedFactory) -> &mut Self {
        self.insert(
            id,
            Registration {
                lifetime,
                factory,
                instance: None,
            },
        );
        self
    }

    pub fn add_singleton<T, F>(&mut self, factory: F) -> &mut Self
    where
        T: ?Sized + Send + Sync + 'static,
        F: Fn(&ServiceProvider) -> Result<Arc<T>, RegistrationError> + Send + Sync + 'static,
    {
        self.add_service(ServiceId::of::<T>(None), Lifetime::Singleton, erase(factory))
    }

    pub fn add_keyed_singleton<T, F>(&mut self, key: impl Into<ServiceKey>, factory: F) -> &mut Self
    where
        T: ?Sized + Send + Sync + 'static,
        F: Fn(&ServiceProvider) -> Result<Arc<T>, RegistrationError> + Send + Sync + 'static,
    {
        self.add_service(
            ServiceId::of::<T>(Some(key.into())),
            Lifetime::Singleton,
            erase(factory),
        )
    }

    pub fn add_transient<T, F>(&mut self, factory: F) -> &mut Self
    where
        T: ?Sized + Send + Sync + 'static,
        F: Fn(&ServiceProvider) -> Result<Arc<T>, RegistrationError> + Send + Sync + 'static,
    {
        self.add_service(ServiceId::of::<T>(None), Lifetime::Transient, erase(factory))
    }

    pub fn add_keyed_transient<T, F>(&mut self, key: impl Into<ServiceKey>, factory: F) -> &mut Self
    where
        T: ?Sized + Send + Sync + 'static,
        F: Fn(&ServiceProvider) -> Result<Arc<T>, RegistrationError> + Send + Sync + 'static,
    {
        self.add_service(
            ServiceId::of::<T>(Some(key.into())),
            Lifetime::Transient,
            erase(factory),
        )
    }

    /// Register an already-built singleton.
    pub fn add_instance<T>(&mut self, instance: Arc<T>) -> &mut Self
    where
        T: ?Sized + Send + Sync + 'static,
    {
        let id = ServiceId::of::<T>(None);
        let erased: ErasedService = Arc::new(instance);
        let value = erased.clone();
        self.insert(
            id,
            Registration {
                lifetime: Lifetime::Singleton,
                factory: Arc::new(move |_: &ServiceProvider| -> Result<ErasedService, RegistrationError> {
                    Ok(value.clone())
                }),
                instance: Some(erased),
            },
        );
        self
    }

    /// Configure the named client `name`.
    pub fn http_client(&mut self, name: impl Into<String>) -> NamedClientBuilder<'_> {
        NamedClientBuilder::new(self, name.into())
    }

    /// Replace the default primary transport of every named client.
    pub fn set_default_transport<F>(&mut self, factory: F) -> &mut Self
    where
        F: Fn() -> Result<Arc<dyn Transport>, ClientError> + Send + Sync + 'static,
    {
        self.clients.set_default_transport(Arc::new(factory));
        self
    }

    /// Freeze the registrations into a provider.
    pub fn build(self) -> ServiceProvider {
        let services = self
            .registrations
            .into_iter()
            .map(|(id, registration)| {
                let slot = Mutex::new(registration.instance);
                (
                    id,
                    Entry {
                        lifetime: registration.lifetime,
                        factory: registration.factory,
                        slot,
                    },
                )
            })
            .collect();

        ServiceProvider {
            inner: Arc::new(ProviderInner {
                services,
                clients: HttpClientFactory::new(self.clients),
            }),
        }
    }

    fn insert(&mut self, id: ServiceId, registration: Registration) {
        if self.registrations.insert(id.clone(), registration).is_some() {
            tracing::debug!(service = %id, "replacing existing registration");
        }
    }
}

fn erase<T, F>(factory: F) -> ErasedFactory
where
    T: ?Sized + Send + Sync + 'static,
    F: Fn(&ServiceProvider) -> Result<Arc<T>, RegistrationError> + Send + Sync + 'static,
{
    Arc::new(move |provider: &ServiceProvider| -> Result<ErasedService, RegistrationError> {
        let instance = factory(provider)?;
        Ok(Arc::new(instance) as ErasedService)
    })
}

struct Entry {
    lifetime: Lifetime,
    factory: ErasedFactory,
    /// Cached singleton; the lock is held while the singleton is built.
    slot: Mutex<Option<ErasedService>>,
}

struct ProviderInner {
    services: HashMap<ServiceId, Entry>,
    clients: HttpClientFactory,
}

/// Immutable, cheaply clonable view of the registrations.
///
/// Singletons are built on first resolution under a per-registration lock, so
/// concurrent first resolutions build one value. A singleton factory that
/// resolves itself, directly or through another singleton, deadlocks.
#[derive(Clone)]
pub struct ServiceProvider {
    inner: Arc<ProviderInner>,
}

impl fmt::Debug for ServiceProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceProvider")
            .field("services", &self.inner.services.len())
            .finish_non_exhaustive()
    }
}

impl ServiceProvider {
    pub fn contains(&self, id: &ServiceId) -> bool {
        self.inner.services.contains_key(id)
    }

    /// Resolve a service without knowing its type statically.
    pub fn get_required_service(&self, id: &ServiceId) -> Result<ErasedService, RegistrationError> {
        let entry = self
            .inner
            .services
            .get(id)
            .ok_or_else(|| RegistrationError::not_registered(id.to_string()))?;

        match entry.lifetime {
            Lifetime::Transient => (entry.factory)(self),
            Lifetime::Singleton => {
                let mut slot = entry.slot.lock();
                if let Some(instance) = slot.as_ref() {
                    return Ok(instance.clone());
                }
                let instance = (entry.factory)(self)?;
                *slot = Some(instance.clone());
                Ok(instance)
            }
        }
    }

    /// Resolve a service and downcast it to `Arc<T>`.
    pub fn get_required_as<T>(&self, id: &ServiceId) -> Result<Arc<T>, RegistrationError>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        let erased = self.get_required_service(id)?;
        erased
            .downcast_ref::<Arc<T>>()
            .cloned()
            .ok_or_else(|| RegistrationError::TypeMismatch {
                service: id.to_string(),
            })
    }

    pub fn get_required<T>(&self) -> Result<Arc<T>, RegistrationError>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.get_required_as::<T>(&ServiceId::of::<T>(None))
    }

    pub fn get_required_keyed<T>(&self, key: impl Into<ServiceKey>) -> Result<Arc<T>, RegistrationError>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.get_required_as::<T>(&ServiceId::of::<T>(Some(key.into())))
    }

    /// Resolve a service if it is registered.
    pub fn get<T>(&self) -> Result<Option<Arc<T>>, RegistrationError>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.optional(&ServiceId::of::<T>(None))
    }

    pub fn get_keyed<T>(&self, key: impl Into<ServiceKey>) -> Result<Option<Arc<T>>, RegistrationError>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.optional(&ServiceId::of::<T>(Some(key.into())))
    }

    /// Get the named client `name`, building it on first use.
    ///
    /// Names without a registration get a client on the default transport.
    pub fn http_client(&self, name: &str) -> Result<HttpClient, RegistrationError> {
        self.inner.clients.create_client(self, name)
    }

    #[cfg(test)]
    pub(crate) fn cached_clients(&self) -> usize {
        self.inner.clients.cached_clients()
    }

    fn optional<T>(&self, id: &ServiceId) -> Result<Option<Arc<T>>, RegistrationError>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        if !self.contains(id) {
            return Ok(None);
        }
        self.get_required_as::<T>(id).map(Some)
    }
}
