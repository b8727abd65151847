//! Encode any `serde::Serialize` value as a [`Variant`].
//!
//! Mapping:
//!
//! - structs and maps become untyped [`Dictionary`] values keyed by String
//!   (map keys keep whatever Variant they serialize to)
//! - sequences and tuples become untyped [`VariantArray`] values
//! - `None`, `()` and unit structs become [`Variant::Nil`]
//! - unit enum variants become their name as a String; data-carrying
//!   variants become a single-entry Dictionary `{ name: payload }`
//! - byte slices become `PackedByteArray`
//!
//! ```
//! use hostbind_core::{to_variant, Variant};
//!
//! #[derive(serde::Serialize)]
//! struct Save { level: u32, name: String }
//!
//! let v = to_variant(&Save { level: 3, name: "ann".into() }).unwrap();
//! let Variant::Dictionary(dict) = v else { panic!() };
//! assert_eq!(dict.get(&Variant::String("level".into())), Some(Variant::Int(3)));
//! ```

use serde::ser::{self, Serialize};

use crate::error::VariantError;
use crate::variant::{ToVariant, Variant};
use crate::{Dictionary, GString, VariantArray};

/// Serialize `value` into a Variant.
pub fn to_variant<T: Serialize + ?Sized>(value: &T) -> Result<Variant, VariantError> {
    value.serialize(VariantSerializer)
}

/// The serde serializer producing [`Variant`] values.
pub struct VariantSerializer;

impl ser::Serializer for VariantSerializer {
    type Ok = Variant;
    type Error = VariantError;

    type SerializeSeq = SeqEncoder;
    type SerializeTuple = SeqEncoder;
    type SerializeTupleStruct = SeqEncoder;
    type SerializeTupleVariant = VariantPayload<SeqEncoder>;
    type SerializeMap = MapEncoder;
    type SerializeStruct = MapEncoder;
    type SerializeStructVariant = VariantPayload<MapEncoder>;

    fn serialize_bool(self, v: bool) -> Result<Variant, VariantError> {
        Ok(Variant::Bool(v))
    }

    fn serialize_i8(self, v: i8) -> Result<Variant, VariantError> {
        Ok(v.to_variant())
    }

    fn serialize_i16(self, v: i16) -> Result<Variant, VariantError> {
        Ok(v.to_variant())
    }

    fn serialize_i32(self, v: i32) -> Result<Variant, VariantError> {
        Ok(v.to_variant())
    }

    fn serialize_i64(self, v: i64) -> Result<Variant, VariantError> {
        Ok(Variant::Int(v))
    }

    fn serialize_u8(self, v: u8) -> Result<Variant, VariantError> {
        Ok(v.to_variant())
    }

    fn serialize_u16(self, v: u16) -> Result<Variant, VariantError> {
        Ok(v.to_variant())
    }

    fn serialize_u32(self, v: u32) -> Result<Variant, VariantError> {
        Ok(v.to_variant())
    }

    fn serialize_u64(self, v: u64) -> Result<Variant, VariantError> {
        i64::try_from(v)
            .map(Variant::Int)
            .map_err(|_| VariantError::Custom(format!("u64 value {v} exceeds the host int range")))
    }

    fn serialize_f32(self, v: f32) -> Result<Variant, VariantError> {
        Ok(v.to_variant())
    }

    fn serialize_f64(self, v: f64) -> Result<Variant, VariantError> {
        Ok(Variant::Float(v))
    }

    fn serialize_char(self, v: char) -> Result<Variant, VariantError> {
        Ok(Variant::String(GString::from(v.to_string())))
    }

    fn serialize_str(self, v: &str) -> Result<Variant, VariantError> {
        Ok(Variant::String(GString::from(v)))
    }

    fn serialize_bytes(self, v: &[u8]) -> Result<Variant, VariantError> {
        Ok(Variant::PackedByteArray(v.to_vec()))
    }

    fn serialize_none(self) -> Result<Variant, VariantError> {
        Ok(Variant::Nil)
    }

    fn serialize_some<T: Serialize + ?Sized>(self, value: &T) -> Result<Variant, VariantError> {
        value.serialize(self)
    }

    fn serialize_unit(self) -> Result<Variant, VariantError> {
        Ok(Variant::Nil)
    }

    fn serialize_unit_struct(self, _name: &'static str) -> Result<Variant, VariantError> {
        Ok(Variant::Nil)
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _index: u32,
        variant: &'static str,
    ) -> Result<Variant, VariantError> {
        self.serialize_str(variant)
    }

    fn serialize_newtype_struct<T: Serialize + ?Sized>(
        self,
        _name: &'static str,
        value: &T,
    ) -> Result<Variant, VariantError> {
        value.serialize(self)
    }

    fn serialize_newtype_variant<T: Serialize + ?Sized>(
        self,
        _name: &'static str,
        _index: u32,
        variant: &'static str,
        value: &T,
    ) -> Result<Variant, VariantError> {
        tagged(variant, to_variant(value)?)
    }

    fn serialize_seq(self, _len: Option<usize>) -> Result<SeqEncoder, VariantError> {
        Ok(SeqEncoder::default())
    }

    fn serialize_tuple(self, len: usize) -> Result<SeqEncoder, VariantError> {
        self.serialize_seq(Some(len))
    }

    fn serialize_tuple_struct(self, _name: &'static str, len: usize) -> Result<SeqEncoder, VariantError> {
        self.serialize_seq(Some(len))
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _index: u32,
        variant: &'static str,
        _len: usize,
    ) -> Result<VariantPayload<SeqEncoder>, VariantError> {
        Ok(VariantPayload {
            name: variant,
            inner: SeqEncoder::default(),
        })
    }

    fn serialize_map(self, _len: Option<usize>) -> Result<MapEncoder, VariantError> {
        Ok(MapEncoder::default())
    }

    fn serialize_struct(self, _name: &'static str, _len: usize) -> Result<MapEncoder, VariantError> {
        Ok(MapEncoder::default())
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _index: u32,
        variant: &'static str,
        _len: usize,
    ) -> Result<VariantPayload<MapEncoder>, VariantError> {
        Ok(VariantPayload {
            name: variant,
            inner: MapEncoder::default(),
        })
    }
}

fn tagged(name: &str, payload: Variant) -> Result<Variant, VariantError> {
    let dict = Dictionary::new();
    dict.insert(Variant::String(GString::from(name)), payload)?;
    Ok(Variant::Dictionary(dict))
}

/// Sequence under construction.
#[derive(Default)]
pub struct SeqEncoder {
    items: Vec<Variant>,
}

impl SeqEncoder {
    fn finish(self) -> Result<Variant, VariantError> {
        let array = VariantArray::new();
        for item in self.items {
            array.push(item)?;
        }
        Ok(Variant::Array(array))
    }
}

impl ser::SerializeSeq for SeqEncoder {
    type Ok = Variant;
    type Error = VariantError;

    fn serialize_element<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), VariantError> {
        self.items.push(to_variant(value)?);
        Ok(())
    }

    fn end(self) -> Result<Variant, VariantError> {
        self.finish()
    }
}

impl ser::SerializeTuple for SeqEncoder {
    type Ok = Variant;
    type Error = VariantError;

    fn serialize_element<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), VariantError> {
        ser::SerializeSeq::serialize_element(self, value)
    }

    fn end(self) -> Result<Variant, VariantError> {
        self.finish()
    }
}

impl ser::SerializeTupleStruct for SeqEncoder {
    type Ok = Variant;
    type Error = VariantError;

    fn serialize_field<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), VariantError> {
        ser::SerializeSeq::serialize_element(self, value)
    }

    fn end(self) -> Result<Variant, VariantError> {
        self.finish()
    }
}

/// Map or struct under construction.
#[derive(Default)]
pub struct MapEncoder {
    entries: Vec<(Variant, Variant)>,
    pending_key: Option<Variant>,
}

impl MapEncoder {
    fn finish(self) -> Result<Variant, VariantError> {
        let dict = Dictionary::new();
        for (key, value) in self.entries {
            dict.insert(key, value)?;
        }
        Ok(Variant::Dictionary(dict))
    }
}

impl ser::SerializeMap for MapEncoder {
    type Ok = Variant;
    type Error = VariantError;

    fn serialize_key<T: Serialize + ?Sized>(&mut self, key: &T) -> Result<(), VariantError> {
        self.pending_key = Some(to_variant(key)?);
        Ok(())
    }

    fn serialize_value<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), VariantError> {
        let key = self
            .pending_key
            .take()
            .ok_or_else(|| VariantError::Custom("map value without a key".to_string()))?;
        self.entries.push((key, to_variant(value)?));
        Ok(())
    }

    fn end(self) -> Result<Variant, VariantError> {
        self.finish()
    }
}

impl ser::SerializeStruct for MapEncoder {
    type Ok = Variant;
    type Error = VariantError;

    fn serialize_field<T: Serialize + ?Sized>(
        &mut self,
        key: &'static str,
        value: &T,
    ) -> Result<(), VariantError> {
        self.entries
            .push((Variant::String(GString::from(key)), to_variant(value)?));
        Ok(())
    }

    fn end(self) -> Result<Variant, VariantError> {
        self.finish()
    }
}

/// Payload of a data-carrying enum variant.
pub struct VariantPayload<E> {
    name: &'static str,
    inner: E,
}

impl ser::SerializeTupleVariant for VariantPayload<SeqEncoder> {
    type Ok = Variant;
    type Error = VariantError;

    fn serialize_field<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), VariantError> {
        ser::SerializeSeq::serialize_element(&mut self.inner, value)
    }

    fn end(self) -> Result<Variant, VariantError> {
        tagged(self.name, self.inner.finish()?)
    }
}

impl ser::SerializeStructVariant for VariantPayload<MapEncoder> {
    type Ok = Variant;
    type Error = VariantError;

    fn serialize_field<T: Serialize + ?Sized>(
        &mut self,
        key: &'static str,
        value: &T,
    ) -> Result<(), VariantError> {
        ser::SerializeStruct::serialize_field(&mut self.inner, key, value)
    }

    fn end(self) -> Result<Variant, VariantError> {
        tagged(self.name, self.inner.finish()?)
    }
}
