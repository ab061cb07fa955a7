//! Merged request input for [`Request::bind`](crate::request::Request::bind)
//!
//! Path parameters, the JSON body (or the query string when there is no
//! body) and declared headers are collected into one field map, later
//! sources overriding earlier ones. Values that arrived as text are parsed on
//! demand, so `id: u64` binds from a `{id}` path segment the same way it
//! binds from a JSON number.

use std::collections::BTreeMap;

use serde::de::value::{MapDeserializer, SeqDeserializer, StringDeserializer};
use serde::de::{self, DeserializeOwned, Deserializer, IntoDeserializer, Visitor};
use serde_json::Value;

/// One bound field, either decoded JSON or raw text from the URI or headers
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Source {
    Json(Value),
    Text(Vec<String>),
}

/// Field map assembled from every request source
#[derive(Debug, Default)]
pub(crate) struct Fields {
    fields: BTreeMap<String, Source>,
    body: Option<Value>,
}

impl Fields {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Add text values under `key`, replacing any earlier source
    pub(crate) fn text(&mut self, key: impl Into<String>, values: Vec<String>) {
        if !values.is_empty() {
            self.fields.insert(key.into(), Source::Text(values));
        }
    }

    /// Add text pairs, grouping repeated keys
    pub(crate) fn text_pairs<I, K, V>(&mut self, pairs: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut grouped: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for (key, value) in pairs {
            grouped.entry(key.into()).or_default().push(value.into());
        }
        for (key, values) in grouped {
            self.text(key, values);
        }
    }

    /// Overlay a decoded JSON body
    ///
    /// Object members become fields. Any other JSON value replaces the whole
    /// input and is deserialized as is.
    pub(crate) fn json(&mut self, body: Value) {
        match body {
            Value::Object(members) => {
                for (key, value) in members {
                    self.fields.insert(key, Source::Json(value));
                }
            }
            other => self.body = Some(other),
        }
    }

    pub(crate) fn deserialize<T: DeserializeOwned>(self) -> Result<T, serde_json::Error> {
        if let Some(body) = self.body {
            return T::deserialize(body);
        }
        let deserializer: MapDeserializer<'_, _, serde_json::Error> =
            MapDeserializer::new(self.fields.into_iter());
        T::deserialize(deserializer)
    }
}

impl Source {
    fn first_text(values: Vec<String>) -> String {
        values.into_iter().next().unwrap_or_default()
    }
}

impl<'de> IntoDeserializer<'de, serde_json::Error> for Source {
    type Deserializer = Self;

    fn into_deserializer(self) -> Self {
        self
    }
}

macro_rules! parse_text {
    ($($method:ident => $visit:ident),* $(,)?) => {
        $(
            fn $method<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
                match self {
                    Self::Json(value) => value.$method(visitor),
                    Self::Text(values) => {
                        let text = Self::first_text(values);
                        visitor.$visit(
                            text.trim()
                                .parse()
                                .map_err(<Self::Error as de::Error>::custom)?,
                        )
                    }
                }
            }
        )*
    };
}

macro_rules! as_text {
    ($($method:ident),* $(,)?) => {
        $(
            fn $method<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
                match self {
                    Self::Json(value) => value.$method(visitor),
                    Self::Text(_) => self.deserialize_any(visitor),
                }
            }
        )*
    };
}

impl<'de> Deserializer<'de> for Source {
    type Error = serde_json::Error;

    fn deserialize_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        match self {
            Self::Json(value) => value.deserialize_any(visitor),
            Self::Text(values) => visitor.visit_string(Self::first_text(values)),
        }
    }

    parse_text! {
        deserialize_bool => visit_bool,
        deserialize_i8 => visit_i8,
        deserialize_i16 => visit_i16,
        deserialize_i32 => visit_i32,
        deserialize_i64 => visit_i64,
        deserialize_u8 => visit_u8,
        deserialize_u16 => visit_u16,
        deserialize_u32 => visit_u32,
        deserialize_u64 => visit_u64,
        deserialize_f32 => visit_f32,
        deserialize_f64 => visit_f64,
        deserialize_char => visit_char,
    }

    as_text! {
        deserialize_str,
        deserialize_string,
        deserialize_bytes,
        deserialize_byte_buf,
        deserialize_unit,
        deserialize_map,
        deserialize_identifier,
        deserialize_ignored_any,
    }

    fn deserialize_option<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        match self {
            Self::Json(value) => value.deserialize_option(visitor),
            Self::Text(_) => visitor.visit_some(self),
        }
    }

    fn deserialize_seq<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        match self {
            Self::Json(value) => value.deserialize_seq(visitor),
            Self::Text(values) => visitor.visit_seq(SeqDeserializer::new(
                values.into_iter().map(|value| Self::Text(vec![value])),
            )),
        }
    }

    fn deserialize_tuple<V: Visitor<'de>>(
        self,
        len: usize,
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        match self {
            Self::Json(value) => value.deserialize_tuple(len, visitor),
            Self::Text(_) => self.deserialize_seq(visitor),
        }
    }

    fn deserialize_tuple_struct<V: Visitor<'de>>(
        self,
        name: &'static str,
        len: usize,
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        match self {
            Self::Json(value) => value.deserialize_tuple_struct(name, len, visitor),
            Self::Text(_) => self.deserialize_seq(visitor),
        }
    }

    fn deserialize_unit_struct<V: Visitor<'de>>(
        self,
        name: &'static str,
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        match self {
            Self::Json(value) => value.deserialize_unit_struct(name, visitor),
            Self::Text(_) => self.deserialize_any(visitor),
        }
    }

    fn deserialize_newtype_struct<V: Visitor<'de>>(
        self,
        name: &'static str,
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        match self {
            Self::Json(value) => value.deserialize_newtype_struct(name, visitor),
            Self::Text(_) => visitor.visit_newtype_struct(self),
        }
    }

    fn deserialize_struct<V: Visitor<'de>>(
        self,
        name: &'static str,
        fields: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        match self {
            Self::Json(value) => value.deserialize_struct(name, fields, visitor),
            Self::Text(_) => self.deserialize_any(visitor),
        }
    }

    fn deserialize_enum<V: Visitor<'de>>(
        self,
        name: &'static str,
        variants: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        match self {
            Self::Json(value) => value.deserialize_enum(name, variants, visitor),
            Self::Text(values) => {
                let variant: StringDeserializer<serde_json::Error> =
                    Self::first_text(values).into_deserializer();
                visitor.visit_enum(variant)
            }
        }
    }
}

/// Field name bound from header `name`: lowercase, `-` replaced by `_`
pub(crate) fn header_field(name: &str) -> String {
    name.to_ascii_lowercase().replace('-', "_")
}
