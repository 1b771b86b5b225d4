use crate::args::CallArgs;
use crate::codec::Codec;
use crate::errors::CacheError;
use sha2::{Digest, Sha256};
use std::fmt;

/// Canonical bytes identifying one call's argument set.
///
/// The bytes themselves are the storage key; there is no hashing step, so
/// uniqueness is exactly that of the codec's encoding.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct DerivedKey(Vec<u8>);

impl DerivedKey {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Short sha256 digest for log fields.
    pub fn digest(&self) -> String {
        let mut h = Sha256::new();
        h.update(&self.0);
        let full = hex::encode(h.finalize());
        full[..16].to_string()
    }
}

impl fmt::Debug for DerivedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DerivedKey({}, {} bytes)", self.digest(), self.0.len())
    }
}

/// Encode `(positional, named sorted by name)` through the codec.
pub fn derive_key<C: Codec>(codec: &C, args: &CallArgs) -> Result<DerivedKey, CacheError> {
    let named = args.sorted_named();
    let bytes = codec.encode(&(args.positional(), named))?;
    Ok(DerivedKey(bytes))
}
