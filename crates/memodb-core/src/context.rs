//! Connection + namespace registry bundle shared by memoized functions.

use crate::backend::{Backend, SqliteBackend};
use crate::config::CacheConfig;
use crate::errors::CacheError;
use crate::registry::{NamespaceDescriptor, NamespaceRegistry};
use crate::target::ConnectTarget;
use std::fmt;
use std::sync::{Arc, Mutex};

/// An active storage connection.
#[derive(Clone)]
pub struct Handle {
    target: String,
    backend: Arc<dyn Backend>,
    sqlite: Option<SqliteBackend>,
}

impl Handle {
    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn backend(&self) -> &dyn Backend {
        self.backend.as_ref()
    }

    /// The SQLite backend behind this handle, when it is one.
    pub fn sqlite(&self) -> Option<&SqliteBackend> {
        self.sqlite.as_ref()
    }

    /// True if both handles share the same underlying connection.
    pub fn same_connection(&self, other: &Handle) -> bool {
        Arc::ptr_eq(&self.backend, &other.backend)
    }
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handle").field("target", &self.target).finish()
    }
}

#[derive(Default)]
struct ContextState {
    handle: Option<Handle>,
    registry: NamespaceRegistry,
}

impl ContextState {
    fn replace(&mut self, handle: Handle) {
        if let Some(old) = &self.handle {
            tracing::info!(from = %old.target, to = %handle.target, "replacing cache connection");
        } else {
            tracing::info!(url = %handle.target, "cache connection established");
        }
        self.handle = Some(handle);
        // Tables registered against the old target do not exist on the new one.
        self.registry = NamespaceRegistry::new();
    }
}

/// Holds at most one connection handle and the namespaces registered on it.
///
/// Cloning is cheap and clones share state: a `connect` or `disconnect`
/// through one clone is seen by every memoized function holding another.
#[derive(Clone)]
pub struct CacheContext {
    state: Arc<Mutex<ContextState>>,
    config: Arc<CacheConfig>,
}

impl Default for CacheContext {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CacheContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let target = self
            .state
            .lock()
            .ok()
            .and_then(|s| s.handle.as_ref().map(|h| h.target.clone()));
        f.debug_struct("CacheContext")
            .field("target", &target)
            .finish()
    }
}

impl CacheContext {
    /// Unconnected context with default settings.
    pub fn new() -> Self {
        Self::with_config(CacheConfig::default())
    }

    /// Unconnected context; `cfg` applies to later `connect` calls.
    pub fn with_config(cfg: CacheConfig) -> Self {
        Self {
            state: Arc::new(Mutex::new(ContextState::default())),
            config: Arc::new(cfg),
        }
    }

    /// Context connected to `cfg.database_url` when one is set.
    pub fn from_config(cfg: CacheConfig) -> Result<Self, CacheError> {
        let url = cfg.database_url.clone();
        let ctx = Self::with_config(cfg);
        if let Some(url) = url {
            ctx.connect(&url)?;
        }
        Ok(ctx)
    }

    /// Context connected to a fresh in-memory database.
    pub fn ephemeral() -> Result<Self, CacheError> {
        let ctx = Self::new();
        ctx.connect("sqlite://")?;
        Ok(ctx)
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Connect to `target`. Reconnecting to the current target returns the
    /// existing handle; any other target replaces it.
    pub fn connect(&self, target: &str) -> Result<Handle, CacheError> {
        let parsed = ConnectTarget::parse(target)?;
        let canonical = parsed.to_string();

        let mut state = self.state.lock()?;
        if let Some(existing) = &state.handle {
            if existing.target == canonical {
                return Ok(existing.clone());
            }
        }

        let sqlite = SqliteBackend::open(&parsed, &self.config)?;
        let handle = Handle {
            target: canonical,
            backend: Arc::new(sqlite.clone()),
            sqlite: Some(sqlite),
        };
        state.replace(handle.clone());
        Ok(handle)
    }

    /// Use a caller-supplied backend under `label`. Same replace-or-reuse
    /// rule as [`CacheContext::connect`], keyed on the label.
    pub fn attach(&self, label: &str, backend: Arc<dyn Backend>) -> Result<Handle, CacheError> {
        let mut state = self.state.lock()?;
        if let Some(existing) = &state.handle {
            if existing.target == label {
                return Ok(existing.clone());
            }
        }
        let handle = Handle {
            target: label.to_string(),
            backend,
            sqlite: None,
        };
        state.replace(handle.clone());
        Ok(handle)
    }

    /// Drop the current handle, returning it.
    pub fn disconnect(&self) -> Result<Option<Handle>, CacheError> {
        let mut state = self.state.lock()?;
        state.registry = NamespaceRegistry::new();
        let old = state.handle.take();
        if let Some(h) = &old {
            tracing::info!(url = %h.target, "cache connection dropped");
        }
        Ok(old)
    }

    /// The current handle, or `MissingConnection`.
    pub fn handle(&self) -> Result<Handle, CacheError> {
        let state = self.state.lock()?;
        state.handle.clone().ok_or(CacheError::MissingConnection)
    }

    pub fn is_connected(&self) -> bool {
        self.state
            .lock()
            .map(|s| s.handle.is_some())
            .unwrap_or(false)
    }

    /// Register `name`, creating its table on first use.
    pub fn get_or_create_namespace(&self, name: &str) -> Result<NamespaceDescriptor, CacheError> {
        self.resolve(name).map(|(_, ns)| ns)
    }

    /// Current handle plus the registered namespace, in one step.
    pub(crate) fn resolve(&self, name: &str) -> Result<(Handle, NamespaceDescriptor), CacheError> {
        let mut state = self.state.lock()?;
        let handle = state.handle.clone().ok_or(CacheError::MissingConnection)?;
        let ns = state.registry.get_or_create(handle.backend(), name)?;
        Ok((handle, ns))
    }

    /// Names registered on the current handle, sorted.
    pub fn namespaces(&self) -> Result<Vec<String>, CacheError> {
        Ok(self.state.lock()?.registry.names())
    }

    /// True if this and `other` share state.
    pub fn same_context(&self, other: &CacheContext) -> bool {
        Arc::ptr_eq(&self.state, &other.state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unconnected_context_reports_missing_connection() {
        let ctx = CacheContext::new();
        assert!(!ctx.is_connected());
        assert!(ctx.handle().unwrap_err().is_missing_connection());
        assert!(ctx
            .get_or_create_namespace("square")
            .unwrap_err()
            .is_missing_connection());
    }

    #[test]
    fn reconnect_same_target_is_noop() {
        let ctx = CacheContext::new();
        let a = ctx.connect("sqlite://").unwrap();
        let b = ctx.connect("sqlite://:memory:").unwrap();
        assert!(a.same_connection(&b));
        assert_eq!(a.target(), "sqlite://");
    }

    #[test]
    fn connect_other_target_replaces_and_resets_registry() {
        let dir = tempfile::tempdir().unwrap();
        let file = format!("sqlite:///{}", dir.path().join("c.db").display());

        let ctx = CacheContext::new();
        let mem = ctx.connect("sqlite://").unwrap();
        ctx.get_or_create_namespace("square").unwrap();
        assert_eq!(ctx.namespaces().unwrap(), vec!["square".to_string()]);

        let disk = ctx.connect(&file).unwrap();
        assert!(!mem.same_connection(&disk));
        assert!(ctx.handle().unwrap().same_connection(&disk));
        assert!(ctx.namespaces().unwrap().is_empty());

        ctx.get_or_create_namespace("square").unwrap();
        assert_eq!(
            disk.sqlite().unwrap().tables().unwrap(),
            vec!["square".to_string()]
        );
    }

    #[test]
    fn disconnect_then_missing() {
        let ctx = CacheContext::ephemeral().unwrap();
        assert!(ctx.is_connected());
        assert!(ctx.disconnect().unwrap().is_some());
        assert!(ctx.handle().unwrap_err().is_missing_connection());
        assert!(ctx.disconnect().unwrap().is_none());
    }

    #[test]
    fn clones_share_state() {
        let a = CacheContext::new();
        let b = a.clone();
        a.connect("sqlite://").unwrap();
        assert!(b.is_connected());
        assert!(a.same_context(&b));
        assert!(!a.same_context(&CacheContext::new()));
    }

    #[test]
    fn from_config_connects_when_url_set() {
        let ctx = CacheContext::from_config(CacheConfig {
            database_url: Some(":memory:".into()),
            busy_timeout_ms: 250,
            ..Default::default()
        })
        .unwrap();
        assert!(ctx.is_connected());
        assert_eq!(ctx.config().busy_timeout_ms, 250);

        let ctx = CacheContext::from_config(CacheConfig::default()).unwrap();
        assert!(!ctx.is_connected());
    }

    #[test]
    fn invalid_target_leaves_state_unchanged() {
        let ctx = CacheContext::ephemeral().unwrap();
        let before = ctx.handle().unwrap();
        assert!(matches!(
            ctx.connect("mysql://db"),
            Err(CacheError::InvalidTarget(_))
        ));
        assert!(ctx.handle().unwrap().same_connection(&before));
    }

    #[test]
    fn attach_custom_backend() {
        let ctx = CacheContext::new();
        let backend: Arc<dyn Backend> = Arc::new(SqliteBackend::memory().unwrap());
        let h = ctx.attach("custom", backend.clone()).unwrap();
        assert_eq!(h.target(), "custom");
        assert!(h.sqlite().is_none());
        let again = ctx.attach("custom", Arc::new(SqliteBackend::memory().unwrap())).unwrap();
        assert!(h.same_connection(&again));
    }
}
