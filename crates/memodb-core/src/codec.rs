//! Value encoding used both for stored results and for key derivation.

use crate::errors::CacheError;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Bytes-in / bytes-out value codec.
///
/// Implementations must round-trip (`decode(encode(v)) == v`) and must be
/// deterministic: the same value always encodes to the same bytes, because
/// derived cache keys are produced by this codec.
pub trait Codec: Send + Sync {
    fn encode<T: Serialize + ?Sized>(&self, value: &T) -> Result<Vec<u8>, CacheError>;

    fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T, CacheError>;
}

/// Compact JSON codec.
///
/// Object keys are emitted in sorted order (serde_json's default map is a
/// `BTreeMap`), so dynamic values encode deterministically. Non-finite floats
/// are not representable and are rejected rather than silently turned into
/// `null`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn encode<T: Serialize + ?Sized>(&self, value: &T) -> Result<Vec<u8>, CacheError> {
        let tree = serde_json::to_value(value).map_err(CacheError::codec)?;
        if contains_null_float(&tree, value)? {
            return Err(CacheError::codec("non-finite float cannot be encoded"));
        }
        serde_json::to_vec(&tree).map_err(CacheError::codec)
    }

    fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T, CacheError> {
        serde_json::from_slice(bytes).map_err(CacheError::codec)
    }
}

// serde_json maps NaN and infinities to `null`. Detect that by re-encoding with
// a serializer that refuses non-finite floats.
fn contains_null_float<T: Serialize + ?Sized>(
    tree: &serde_json::Value,
    value: &T,
) -> Result<bool, CacheError> {
    if !has_null(tree) {
        return Ok(false);
    }
    Ok(value.serialize(FiniteCheck).is_err())
}

/// True if `value` contains no NaN or infinite float.
pub(crate) fn all_floats_finite<T: Serialize + ?Sized>(value: &T) -> bool {
    value.serialize(FiniteCheck).is_ok()
}

fn has_null(v: &serde_json::Value) -> bool {
    match v {
        serde_json::Value::Null => true,
        serde_json::Value::Array(items) => items.iter().any(has_null),
        serde_json::Value::Object(map) => map.values().any(has_null),
        _ => false,
    }
}

/// Serializer that only walks the value, failing on the first non-finite float.
struct FiniteCheck;

#[derive(Debug)]
struct NonFinite;

impl std::fmt::Display for NonFinite {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("non-finite float")
    }
}

impl std::error::Error for NonFinite {}

impl serde::ser::Error for NonFinite {
    fn custom<M: std::fmt::Display>(_msg: M) -> Self {
        NonFinite
    }
}

macro_rules! accept {
    ($($name:ident: $ty:ty),* $(,)?) => {
        $(fn $name(self, _v: $ty) -> Result<(), NonFinite> { Ok(()) })*
    };
}

impl serde::Serializer for FiniteCheck {
    type Ok = ();
    type Error = NonFinite;
    type SerializeSeq = Self;
    type SerializeTuple = Self;
    type SerializeTupleStruct = Self;
    type SerializeTupleVariant = Self;
    type SerializeMap = Self;
    type SerializeStruct = Self;
    type SerializeStructVariant = Self;

    accept!(
        serialize_bool: bool,
        serialize_i8: i8,
        serialize_i16: i16,
        serialize_i32: i32,
        serialize_i64: i64,
        serialize_i128: i128,
        serialize_u8: u8,
        serialize_u16: u16,
        serialize_u32: u32,
        serialize_u64: u64,
        serialize_u128: u128,
        serialize_char: char,
        serialize_str: &str,
        serialize_bytes: &[u8],
        serialize_unit_struct: &'static str,
    );

    fn serialize_f32(self, v: f32) -> Result<(), NonFinite> {
        if v.is_finite() {
            Ok(())
        } else {
            Err(NonFinite)
        }
    }

    fn serialize_f64(self, v: f64) -> Result<(), NonFinite> {
        if v.is_finite() {
            Ok(())
        } else {
            Err(NonFinite)
        }
    }

    fn serialize_none(self) -> Result<(), NonFinite> {
        Ok(())
    }

    fn serialize_some<T: Serialize + ?Sized>(self, value: &T) -> Result<(), NonFinite> {
        value.serialize(self)
    }

    fn serialize_unit(self) -> Result<(), NonFinite> {
        Ok(())
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _index: u32,
        _variant: &'static str,
    ) -> Result<(), NonFinite> {
        Ok(())
    }

    fn serialize_newtype_struct<T: Serialize + ?Sized>(
        self,
        _name: &'static str,
        value: &T,
    ) -> Result<(), NonFinite> {
        value.serialize(self)
    }

    fn serialize_newtype_variant<T: Serialize + ?Sized>(
        self,
        _name: &'static str,
        _index: u32,
        _variant: &'static str,
        value: &T,
    ) -> Result<(), NonFinite> {
        value.serialize(self)
    }

    fn serialize_seq(self, _len: Option<usize>) -> Result<Self, NonFinite> {
        Ok(self)
    }

    fn serialize_tuple(self, _len: usize) -> Result<Self, NonFinite> {
        Ok(self)
    }

    fn serialize_tuple_struct(self, _name: &'static str, _len: usize) -> Result<Self, NonFinite> {
        Ok(self)
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Self, NonFinite> {
        Ok(self)
    }

    fn serialize_map(self, _len: Option<usize>) -> Result<Self, NonFinite> {
        Ok(self)
    }

    fn serialize_struct(self, _name: &'static str, _len: usize) -> Result<Self, NonFinite> {
        Ok(self)
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Self, NonFinite> {
        Ok(self)
    }
}

impl serde::ser::SerializeSeq for FiniteCheck {
    type Ok = ();
    type Error = NonFinite;
    fn serialize_element<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), NonFinite> {
        value.serialize(FiniteCheck)
    }
    fn end(self) -> Result<(), NonFinite> {
        Ok(())
    }
}

impl serde::ser::SerializeTuple for FiniteCheck {
    type Ok = ();
    type Error = NonFinite;
    fn serialize_element<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), NonFinite> {
        value.serialize(FiniteCheck)
    }
    fn end(self) -> Result<(), NonFinite> {
        Ok(())
    }
}

impl serde::ser::SerializeTupleStruct for FiniteCheck {
    type Ok = ();
    type Error = NonFinite;
    fn serialize_field<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), NonFinite> {
        value.serialize(FiniteCheck)
    }
    fn end(self) -> Result<(), NonFinite> {
        Ok(())
    }
}

impl serde::ser::SerializeTupleVariant for FiniteCheck {
    type Ok = ();
    type Error = NonFinite;
    fn serialize_field<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), NonFinite> {
        value.serialize(FiniteCheck)
    }
    fn end(self) -> Result<(), NonFinite> {
        Ok(())
    }
}

impl serde::ser::SerializeMap for FiniteCheck {
    type Ok = ();
    type Error = NonFinite;
    fn serialize_key<T: Serialize + ?Sized>(&mut self, key: &T) -> Result<(), NonFinite> {
        key.serialize(FiniteCheck)
    }
    fn serialize_value<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), NonFinite> {
        value.serialize(FiniteCheck)
    }
    fn end(self) -> Result<(), NonFinite> {
        Ok(())
    }
}

impl serde::ser::SerializeStruct for FiniteCheck {
    type Ok = ();
    type Error = NonFinite;
    fn serialize_field<T: Serialize + ?Sized>(
        &mut self,
        _key: &'static str,
        value: &T,
    ) -> Result<(), NonFinite> {
        value.serialize(FiniteCheck)
    }
    fn end(self) -> Result<(), NonFinite> {
        Ok(())
    }
}

impl serde::ser::SerializeStructVariant for FiniteCheck {
    type Ok = ();
    type Error = NonFinite;
    fn serialize_field<T: Serialize + ?Sized>(
        &mut self,
        _key: &'static str,
        value: &T,
    ) -> Result<(), NonFinite> {
        value.serialize(FiniteCheck)
    }
    fn end(self) -> Result<(), NonFinite> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn round_trips_representative_values() {
        let codec = JsonCodec;

        let n: i64 = -42;
        assert_eq!(codec.decode::<i64>(&codec.encode(&n).unwrap()).unwrap(), n);

        let f: f64 = 0.77;
        assert_eq!(codec.decode::<f64>(&codec.encode(&f).unwrap()).unwrap(), f);

        let s = "hello".to_string();
        assert_eq!(codec.decode::<String>(&codec.encode(&s).unwrap()).unwrap(), s);

        let t = (3_i64, 0.11_f64, "bar".to_string());
        assert_eq!(
            codec.decode::<(i64, f64, String)>(&codec.encode(&t).unwrap()).unwrap(),
            t
        );

        let nested: Vec<Option<(u8, Vec<String>)>> =
            vec![None, Some((7, vec!["a".into(), "b".into()]))];
        assert_eq!(
            codec
                .decode::<Vec<Option<(u8, Vec<String>)>>>(&codec.encode(&nested).unwrap())
                .unwrap(),
            nested
        );
    }

    #[test]
    fn map_encoding_is_order_independent() {
        let codec = JsonCodec;
        let mut a = HashMap::new();
        let mut b = HashMap::new();
        for (k, v) in [("x", 1), ("y", 2), ("z", 3)] {
            a.insert(k, v);
        }
        for (k, v) in [("z", 3), ("x", 1), ("y", 2)] {
            b.insert(k, v);
        }
        assert_eq!(codec.encode(&a).unwrap(), codec.encode(&b).unwrap());
    }

    #[test]
    fn integer_and_float_encode_differently() {
        let codec = JsonCodec;
        assert_ne!(codec.encode(&1_i64).unwrap(), codec.encode(&1.0_f64).unwrap());
    }

    #[test]
    fn rejects_non_finite_floats() {
        let codec = JsonCodec;
        let err = codec.encode(&(1, f64::NAN)).unwrap_err();
        assert!(matches!(err, CacheError::Codec(_)));
        assert!(codec.encode(&vec![f64::INFINITY]).is_err());
        // Genuine nulls are fine.
        assert!(codec.encode(&(1, Option::<i32>::None)).is_ok());
    }

    #[test]
    fn corrupted_bytes_fail_to_decode() {
        let codec = JsonCodec;
        let err = codec.decode::<i64>(b"\x00\xffnot json").unwrap_err();
        assert!(matches!(err, CacheError::Codec(_)));
    }
}
