//! The memoizing wrapper.

use crate::args::CallArgs;
use crate::codec::{Codec, JsonCodec};
use crate::context::CacheContext;
use crate::errors::{CacheError, MemoError};
use crate::global;
use crate::key::derive_key;
use crate::store::CacheStore;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;

/// Construction options for [`Memoized`].
#[derive(Debug, Clone, Default)]
pub struct MemoOptions<C = JsonCodec> {
    namespace: Option<String>,
    context: Option<CacheContext>,
    codec: C,
}

impl MemoOptions<JsonCodec> {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<C> MemoOptions<C> {
    /// Table name to use instead of the function identity.
    pub fn namespace(mut self, name: impl Into<String>) -> Self {
        self.namespace = Some(name.into());
        self
    }

    /// Context to use instead of the process-wide default.
    pub fn context(mut self, ctx: CacheContext) -> Self {
        self.context = Some(ctx);
        self
    }

    pub fn codec<D: Codec>(self, codec: D) -> MemoOptions<D> {
        MemoOptions {
            namespace: self.namespace,
            context: self.context,
            codec,
        }
    }
}

/// Identity of a named function item, taken from its type name.
///
/// Closures have no usable name and yield `None`.
pub fn function_identity<F>() -> Option<String> {
    let full = std::any::type_name::<F>();
    if full.contains("{{closure}}") {
        return None;
    }
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().map(str::to_string)
}

/// A function whose results are persisted per argument set.
///
/// The wrapped function receives the call's [`CallArgs`] and returns
/// `Result<R, E>`. Successful results are stored and served on later calls
/// with equal arguments without invoking the function again; errors are
/// passed through and never stored.
pub struct Memoized<F, C = JsonCodec> {
    func: F,
    context: CacheContext,
    namespace: String,
    codec: C,
}

impl<F, C: Codec> Memoized<F, C> {
    /// Wrap `func`, identified by `identity` unless `opts` names a namespace.
    ///
    /// Resolves the context (falling back to the process-wide one, then to an
    /// in-memory store) and creates the namespace table.
    pub fn wrap(identity: &str, func: F, opts: MemoOptions<C>) -> Result<Self, CacheError> {
        let context = match opts.context {
            Some(ctx) => ctx,
            None => global::context_for_wrap()?,
        };
        let namespace = opts.namespace.unwrap_or_else(|| identity.to_string());
        context.get_or_create_namespace(&namespace)?;

        Ok(Self {
            func,
            context,
            namespace,
            codec: opts.codec,
        })
    }

    /// Like [`Memoized::wrap`], with the identity taken from `F`'s type name.
    /// Closures need an explicit namespace.
    pub fn wrap_fn(func: F, opts: MemoOptions<C>) -> Result<Self, CacheError> {
        let identity = match (&opts.namespace, function_identity::<F>()) {
            (Some(ns), _) => ns.clone(),
            (None, Some(id)) => id,
            (None, None) => {
                return Err(CacheError::InvalidNamespace(
                    std::any::type_name::<F>().to_string(),
                ))
            }
        };
        Self::wrap(&identity, func, opts)
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn context(&self) -> &CacheContext {
        &self.context
    }

    /// Call through the cache.
    pub fn call<R, E>(&self, args: &CallArgs) -> Result<R, MemoError<E>>
    where
        F: Fn(&CallArgs) -> Result<R, E>,
        R: Serialize + DeserializeOwned,
    {
        // A dropped connection is a hard error; no reconnect.
        let (handle, ns) = self.context.resolve(&self.namespace)?;
        let key = derive_key(&self.codec, args)?;
        let store = CacheStore::new(handle.backend(), &ns, &self.codec);

        if let Some(hit) = store.lookup::<R>(&key)? {
            tracing::debug!(namespace = %self.namespace, key = %key.digest(), "cache hit");
            return Ok(hit);
        }
        tracing::debug!(namespace = %self.namespace, key = %key.digest(), "cache miss");

        let answer = (self.func)(args).map_err(MemoError::Function)?;
        store.store(&key, &answer)?;
        Ok(answer)
    }

    /// Call with positional arguments only, e.g. `square.call_positional((4,))`.
    pub fn call_positional<A, R, E>(&self, positional: A) -> Result<R, MemoError<E>>
    where
        A: Serialize,
        F: Fn(&CallArgs) -> Result<R, E>,
        R: Serialize + DeserializeOwned,
    {
        let args = CallArgs::from_positional(positional).map_err(CacheError::Arguments)?;
        self.call(&args)
    }

    /// True if a result for `args` is already stored.
    pub fn is_cached(&self, args: &CallArgs) -> Result<bool, CacheError> {
        let (handle, ns) = self.context.resolve(&self.namespace)?;
        let key = derive_key(&self.codec, args)?;
        Ok(handle.backend().get(ns.name(), key.as_bytes())?.is_some())
    }
}

impl<F, C> fmt::Debug for Memoized<F, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Memoized")
            .field("namespace", &self.namespace)
            .field("context", &self.context)
            .finish_non_exhaustive()
    }
}
