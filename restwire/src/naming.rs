//! Names of per-registration HTTP clients.

use std::any::TypeId;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use crate::container::ServiceKey;
use crate::contract::ContractType;

/// Name of the HTTP client backing `contract` under `key`.
///
/// Stable within a process. Different contracts, or different keys of one
/// contract (including no key at all), never share a name. The result is an
/// opaque lookup key; do not parse it.
pub fn unique_name(contract: &ContractType, key: Option<&ServiceKey>) -> String {
    name_from_parts(contract.type_id(), contract.name(), key)
}

pub fn unique_name_for<T: ?Sized + 'static>(key: Option<&ServiceKey>) -> String {
    name_from_parts(TypeId::of::<T>(), std::any::type_name::<T>(), key)
}

fn name_from_parts(id: TypeId, type_name: &str, key: Option<&ServiceKey>) -> String {
    // Type names are not guaranteed unique, the TypeId is.
    let mut hasher = DefaultHasher::new();
    id.hash(&mut hasher);
    let mut name = format!("{}#{:016x}", type_name, hasher.finish());
    if let Some(key) = key {
        name.push_str(&format!(", key={:?}", key));
    }
    name
}

#[cfg(test)]
mod tests {
    use super::*;

    trait OrdersApi {}
    trait InventoryApi {}

    #[test]
    fn test_names_are_distinct() {
        let key = ServiceKey::from("a");
        let plain = unique_name_for::<dyn OrdersApi>(None);
        let keyed = unique_name_for::<dyn OrdersApi>(Some(&key));
        let other = unique_name_for::<dyn InventoryApi>(None);

        assert_ne!(plain, keyed);
        assert_ne!(plain, other);
        assert_ne!(keyed, other);
        assert_ne!(keyed, unique_name_for::<dyn OrdersApi>(Some(&"b".into())));
    }

    #[test]
    fn test_names_are_stable() {
        let key = ServiceKey::from("a");
        assert_eq!(
            unique_name_for::<dyn OrdersApi>(Some(&key)),
            unique_name_for::<dyn OrdersApi>(Some(&key.clone())),
        );
    }

    #[test]
    fn test_name_shape() {
        let name = unique_name_for::<dyn OrdersApi>(Some(&"a".into()));
        assert!(name.contains("OrdersApi#"));
        assert!(name.ends_with(r#", key="a""#));
    }
}
