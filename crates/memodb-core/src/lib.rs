//! Durable memoization of function results in SQLite tables.
//!
//! A memoized function gets its own table (its namespace). Each call's
//! arguments are encoded into a canonical key; a stored result for that key
//! is returned without running the function, otherwise the function runs and
//! its successful result is written before being returned.
//!
//! ```no_run
//! use memodb_core::{global, ArgError, CallArgs, MemoOptions, Memoized};
//!
//! fn square(args: &CallArgs) -> Result<i64, ArgError> {
//!     let x: i64 = args.get(0)?;
//!     Ok(x * x)
//! }
//!
//! # fn main() -> anyhow::Result<()> {
//! global::connect("sqlite:///cache.db")?;
//! let square = Memoized::wrap_fn(square, MemoOptions::new())?;
//! assert_eq!(square.call_positional((4,))?, 16);
//! # Ok(())
//! # }
//! ```

pub mod args;
pub mod backend;
pub mod codec;
pub mod config;
pub mod context;
pub mod errors;
pub mod global;
pub mod key;
pub mod memo;
pub mod registry;
pub mod store;
pub mod target;

pub use args::{ArgError, CallArgs};
pub use backend::{Backend, SqliteBackend};
pub use codec::{Codec, JsonCodec};
pub use config::CacheConfig;
pub use context::{CacheContext, Handle};
pub use errors::{CacheError, MemoError};
pub use key::{derive_key, DerivedKey};
pub use memo::{function_identity, MemoOptions, Memoized};
pub use registry::NamespaceDescriptor;
pub use store::CacheStore;
pub use target::ConnectTarget;
