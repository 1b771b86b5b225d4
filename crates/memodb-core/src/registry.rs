//! Namespace bookkeeping: which cache tables exist for the current handle.

use crate::backend::Backend;
use crate::errors::CacheError;
use std::collections::HashMap;

const MAX_NAMESPACE_LEN: usize = 128;

/// One logical cache table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespaceDescriptor {
    name: String,
    created: bool,
}

impl NamespaceDescriptor {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// True once the table has been created (or confirmed) in storage.
    pub fn is_created(&self) -> bool {
        self.created
    }
}

/// Check that `name` can be used as a table name.
pub fn validate_namespace(name: &str) -> Result<(), CacheError> {
    let mut chars = name.chars();
    let first_ok = chars
        .next()
        .map(|c| c.is_ascii_alphabetic() || c == '_')
        .unwrap_or(false);
    if !first_ok
        || name.len() > MAX_NAMESPACE_LEN
        || !chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        || name.to_ascii_lowercase().starts_with("sqlite_")
    {
        return Err(CacheError::InvalidNamespace(name.to_string()));
    }
    Ok(())
}

/// Registered namespaces for one connection handle.
#[derive(Debug, Default)]
pub struct NamespaceRegistry {
    entries: HashMap<String, NamespaceDescriptor>,
}

impl NamespaceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the registered descriptor, or create the table and register it.
    pub fn get_or_create(
        &mut self,
        backend: &dyn Backend,
        name: &str,
    ) -> Result<NamespaceDescriptor, CacheError> {
        if let Some(existing) = self.entries.get(name) {
            return Ok(existing.clone());
        }
        validate_namespace(name)?;
        backend.create_table(name)?;
        tracing::debug!(namespace = name, "cache table ready");

        let desc = NamespaceDescriptor {
            name: name.to_string(),
            created: true,
        };
        self.entries.insert(name.to_string(), desc.clone());
        Ok(desc)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.entries.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::SqliteBackend;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingBackend {
        inner: SqliteBackend,
        creates: AtomicUsize,
    }

    impl Backend for CountingBackend {
        fn create_table(&self, table: &str) -> Result<(), CacheError> {
            self.creates.fetch_add(1, Ordering::SeqCst);
            self.inner.create_table(table)
        }
        fn get(&self, table: &str, key: &[u8]) -> Result<Option<Vec<u8>>, CacheError> {
            self.inner.get(table, key)
        }
        fn insert(&self, table: &str, key: &[u8], value: &[u8]) -> Result<bool, CacheError> {
            self.inner.insert(table, key, value)
        }
    }

    #[test]
    fn valid_names() {
        for name in ["square", "_private", "fib_2", "A"] {
            validate_namespace(name).unwrap();
        }
    }

    #[test]
    fn invalid_names() {
        let long = "x".repeat(MAX_NAMESPACE_LEN + 1);
        for name in ["", "2fast", "drop table", "a-b", "t\"; --", "sqlite_master", long.as_str()] {
            assert!(
                matches!(validate_namespace(name), Err(CacheError::InvalidNamespace(_))),
                "{name:?} should be rejected"
            );
        }
    }

    #[test]
    fn second_lookup_does_not_touch_storage() {
        let backend = CountingBackend {
            inner: SqliteBackend::memory().unwrap(),
            creates: AtomicUsize::new(0),
        };
        let mut reg = NamespaceRegistry::new();

        let first = reg.get_or_create(&backend, "square").unwrap();
        let second = reg.get_or_create(&backend, "square").unwrap();
        assert_eq!(first, second);
        assert!(first.is_created());
        assert_eq!(backend.creates.load(Ordering::SeqCst), 1);

        reg.get_or_create(&backend, "cube").unwrap();
        assert_eq!(backend.creates.load(Ordering::SeqCst), 2);
        assert_eq!(reg.names(), vec!["cube".to_string(), "square".to_string()]);
    }

    #[test]
    fn invalid_name_is_not_registered() {
        let backend = SqliteBackend::memory().unwrap();
        let mut reg = NamespaceRegistry::new();
        assert!(reg.get_or_create(&backend, "bad name").is_err());
        assert!(reg.is_empty());
    }

    #[test]
    fn creation_is_idempotent_in_storage() {
        let backend = SqliteBackend::memory().unwrap();
        backend.create_table("square").unwrap();
        backend.insert("square", b"k", b"v").unwrap();

        let mut reg = NamespaceRegistry::new();
        reg.get_or_create(&backend, "square").unwrap();
        assert_eq!(backend.get("square", b"k").unwrap(), Some(b"v".to_vec()));
    }
}
