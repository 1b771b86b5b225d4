//! Call arguments passed through a memoized function.

use crate::codec::all_floats_finite;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use thiserror::Error;

/// Errors from building or reading [`CallArgs`].
#[derive(Debug, Error)]
pub enum ArgError {
    #[error("argument could not be converted: {0}")]
    Convert(#[from] serde_json::Error),

    #[error("missing positional argument at index {0}")]
    MissingPositional(usize),

    #[error("missing named argument {0:?}")]
    MissingNamed(String),

    #[error("positional arguments must serialize to a sequence, got {0}")]
    NotASequence(&'static str),

    #[error("non-finite float in call arguments")]
    NonFinite,
}

/// Positional and named arguments of one call.
///
/// Positional values keep call order. Named values are kept sorted by name,
/// so insertion order at the call site never affects the derived cache key.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallArgs {
    positional: Vec<Value>,
    named: BTreeMap<String, Value>,
}

impl CallArgs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a tuple (or any value serializing to a sequence), e.g.
    /// `CallArgs::from_positional((4,))`.
    pub fn from_positional<T: Serialize>(args: T) -> Result<Self, ArgError> {
        match to_finite_value(args)? {
            Value::Array(positional) => Ok(Self {
                positional,
                named: BTreeMap::new(),
            }),
            Value::Null => Ok(Self::default()),
            other => Err(ArgError::NotASequence(kind_of(&other))),
        }
    }

    /// Append a positional argument.
    pub fn arg<T: Serialize>(mut self, value: T) -> Result<Self, ArgError> {
        self.positional.push(to_finite_value(value)?);
        Ok(self)
    }

    /// Set a named argument, replacing any earlier value under the same name.
    pub fn named<T: Serialize>(mut self, name: impl Into<String>, value: T) -> Result<Self, ArgError> {
        self.named.insert(name.into(), to_finite_value(value)?);
        Ok(self)
    }

    pub fn positional(&self) -> &[Value] {
        &self.positional
    }

    pub fn named_args(&self) -> &BTreeMap<String, Value> {
        &self.named
    }

    pub fn len(&self) -> usize {
        self.positional.len() + self.named.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Typed read of the positional argument at `index`.
    pub fn get<T: DeserializeOwned>(&self, index: usize) -> Result<T, ArgError> {
        let v = self
            .positional
            .get(index)
            .ok_or(ArgError::MissingPositional(index))?;
        Ok(T::deserialize(v)?)
    }

    /// Typed read of a named argument.
    pub fn get_named<T: DeserializeOwned>(&self, name: &str) -> Result<T, ArgError> {
        let v = self
            .named
            .get(name)
            .ok_or_else(|| ArgError::MissingNamed(name.to_string()))?;
        Ok(T::deserialize(v)?)
    }

    /// Typed read of a named argument that may be absent.
    pub fn get_named_or<T: DeserializeOwned>(&self, name: &str, default: T) -> Result<T, ArgError> {
        match self.named.get(name) {
            Some(v) => Ok(T::deserialize(v)?),
            None => Ok(default),
        }
    }

    /// Named arguments as `(name, value)` pairs in name order.
    pub fn sorted_named(&self) -> Vec<(&str, &Value)> {
        self.named.iter().map(|(k, v)| (k.as_str(), v)).collect()
    }
}

// serde_json turns NaN and infinities into `null`, which would alias `None`.
fn to_finite_value<T: Serialize>(value: T) -> Result<Value, ArgError> {
    if !all_floats_finite(&value) {
        return Err(ArgError::NonFinite);
    }
    Ok(serde_json::to_value(value)?)
}

fn kind_of(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
