//! Process-wide default context.
//!
//! Memoized functions built without an explicit [`CacheContext`] use this one.
//! If nothing has connected it by the time the first such function is
//! wrapped, it is connected to an in-memory database and a warning is
//! emitted.

use crate::context::{CacheContext, Handle};
use crate::errors::CacheError;
use lazy_static::lazy_static;

/// Target used for the ephemeral fallback.
pub const EPHEMERAL_TARGET: &str = "sqlite://";

const FALLBACK_WARNING: &str =
    "no cache database connected; defaulting to an in-memory SQLite database";

lazy_static! {
    static ref DEFAULT_CONTEXT: CacheContext = CacheContext::new();
}

pub fn default_context() -> &'static CacheContext {
    &DEFAULT_CONTEXT
}

/// Connect the process-wide context. Same target is a no-op; a different
/// target replaces the connection for every function using the default.
pub fn connect(target: &str) -> Result<Handle, CacheError> {
    DEFAULT_CONTEXT.connect(target)
}

/// Drop the process-wide connection. Functions using the default context
/// fail with `MissingConnection` until something connects again.
pub fn disconnect() -> Result<Option<Handle>, CacheError> {
    DEFAULT_CONTEXT.disconnect()
}

pub fn is_connected() -> bool {
    DEFAULT_CONTEXT.is_connected()
}

/// The default context, connected to the ephemeral store if needed.
pub(crate) fn context_for_wrap() -> Result<CacheContext, CacheError> {
    let ctx = default_context();
    if !ctx.is_connected() {
        emit_fallback_warning();
        ctx.connect(EPHEMERAL_TARGET)?;
        if !ctx.is_connected() {
            return Err(CacheError::MissingConnection);
        }
    }
    Ok(ctx.clone())
}

fn emit_fallback_warning() {
    // Without a subscriber a tracing event goes nowhere; the warning must be seen.
    let routed =
        tracing::dispatcher::get_default(|d| !d.is::<tracing::subscriber::NoSubscriber>());
    if routed {
        tracing::warn!("{}", FALLBACK_WARNING);
    } else {
        eprintln!("WARNING: {}", FALLBACK_WARNING);
    }
}
