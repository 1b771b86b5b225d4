use crate::backend::Backend;
use crate::codec::Codec;
use crate::errors::CacheError;
use crate::key::DerivedKey;
use crate::registry::NamespaceDescriptor;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Lookup / populate against one namespace's table.
pub struct CacheStore<'a, C> {
    backend: &'a dyn Backend,
    namespace: &'a NamespaceDescriptor,
    codec: &'a C,
}

impl<'a, C: Codec> CacheStore<'a, C> {
    pub fn new(backend: &'a dyn Backend, namespace: &'a NamespaceDescriptor, codec: &'a C) -> Self {
        Self {
            backend,
            namespace,
            codec,
        }
    }

    /// Decoded value stored under `key`, or `None`.
    ///
    /// A record that fails to decode is an error, never treated as a miss.
    pub fn lookup<T: DeserializeOwned>(&self, key: &DerivedKey) -> Result<Option<T>, CacheError> {
        match self.backend.get(self.namespace.name(), key.as_bytes())? {
            Some(bytes) => self.codec.decode(&bytes).map(Some),
            None => Ok(None),
        }
    }

    /// Encode and insert `value`, committed before returning. Returns `false`
    /// if a record for `key` already existed; that record is kept.
    pub fn store<T: Serialize + ?Sized>(&self, key: &DerivedKey, value: &T) -> Result<bool, CacheError> {
        let encoded = self.codec.encode(value)?;
        let inserted = self
            .backend
            .insert(self.namespace.name(), key.as_bytes(), &encoded)?;
        if !inserted {
            tracing::debug!(
                namespace = self.namespace.name(),
                key = %key.digest(),
                "record already present, keeping existing value"
            );
        }
        Ok(inserted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::args::CallArgs;
    use crate::backend::SqliteBackend;
    use crate::codec::JsonCodec;
    use crate::key::derive_key;
    use crate::registry::NamespaceRegistry;

    fn setup(name: &str) -> (SqliteBackend, NamespaceDescriptor) {
        let backend = SqliteBackend::memory().unwrap();
        let ns = NamespaceRegistry::new().get_or_create(&backend, name).unwrap();
        (backend, ns)
    }

    #[test]
    fn miss_then_store_then_hit() {
        let (backend, ns) = setup("square");
        let store = CacheStore::new(&backend, &ns, &JsonCodec);
        let key = derive_key(&JsonCodec, &CallArgs::from_positional((4,)).unwrap()).unwrap();

        assert_eq!(store.lookup::<i64>(&key).unwrap(), None);
        assert!(store.store(&key, &16_i64).unwrap());
        assert_eq!(store.lookup::<i64>(&key).unwrap(), Some(16));
    }

    #[test]
    fn duplicate_store_keeps_first_value() {
        let (backend, ns) = setup("square");
        let store = CacheStore::new(&backend, &ns, &JsonCodec);
        let key = derive_key(&JsonCodec, &CallArgs::from_positional((4,)).unwrap()).unwrap();

        assert!(store.store(&key, &16_i64).unwrap());
        assert!(!store.store(&key, &99_i64).unwrap());
        assert_eq!(store.lookup::<i64>(&key).unwrap(), Some(16));
    }

    #[test]
    fn corrupted_record_is_an_error() {
        let (backend, ns) = setup("square");
        let key = derive_key(&JsonCodec, &CallArgs::from_positional((4,)).unwrap()).unwrap();
        backend
            .insert(ns.name(), key.as_bytes(), b"\xde\xad\xbe\xef")
            .unwrap();

        let store = CacheStore::new(&backend, &ns, &JsonCodec);
        assert!(matches!(
            store.lookup::<i64>(&key),
            Err(CacheError::Codec(_))
        ));
    }

    #[test]
    fn composite_values_round_trip() {
        let (backend, ns) = setup("echo");
        let store = CacheStore::new(&backend, &ns, &JsonCodec);
        let value = (3_i64, 0.22_f64, "foo".to_string());
        let key = derive_key(&JsonCodec, &CallArgs::from_positional((value.clone(),)).unwrap())
            .unwrap();

        store.store(&key, &value).unwrap();
        assert_eq!(store.lookup::<(i64, f64, String)>(&key).unwrap(), Some(value));
    }
}
