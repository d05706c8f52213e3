//! Registration error types.

use restwire_client::ClientError;

/// Errors raised while registering or resolving services.
///
/// Configuration problems surface at registration time; missing
/// registrations surface the first time the container is asked for them.
#[derive(Clone, Debug, thiserror::Error)]
pub enum RegistrationError {
    /// Nothing is registered under the requested service id.
    #[error("service not registered: {service}")]
    ServiceNotRegistered { service: String },

    /// A registration exists but produced an instance of another type.
    #[error("service {service} resolved to an instance of another type")]
    TypeMismatch { service: String },

    /// The request-builder surface has no generic single-parameter factory method.
    #[error("no generic factory method with one parameter found on {surface}")]
    NoFactoryMethod { surface: &'static str },

    /// The request-builder surface has more than one candidate factory method.
    #[error("ambiguous factory method on {surface}: candidates {candidates:?}")]
    AmbiguousFactoryMethod {
        surface: &'static str,
        candidates: Vec<&'static str>,
    },

    /// A contract name was not found in the catalog.
    #[error("unknown contract: {0}")]
    UnknownContract(String),

    /// Client options could not be applied.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Building a client or request failed.
    #[error(transparent)]
    Client(#[from] ClientError),
}

impl RegistrationError {
    pub fn not_registered<S: Into<String>>(service: S) -> Self {
        RegistrationError::ServiceNotRegistered {
            service: service.into(),
        }
    }

    /// Returns whether the error comes from a missing registration.
    pub fn is_not_registered(&self) -> bool {
        matches!(self, RegistrationError::ServiceNotRegistered { .. })
    }
}
