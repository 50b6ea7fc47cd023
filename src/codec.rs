//! Document codec
//!
//! Encodes the entry map as one JSON object according to
//! [`SerializeOptions`], and decodes a whole document back into a map.
//!
//! ## Output shapes
//! ```text
//! compact             {"b":1,"a":[true,null]}
//! pretty(2)           {
//!                       "b": 1,
//!                       "a": [ ... ]
//!                     }
//! sort_keys           {"a":[true,null],"b":1}
//! ensure_ascii        {"city":"Krak\u00f3w"}
//! ```

use std::io;

use serde::ser::{
    SerializeMap, SerializeSeq, SerializeStruct, SerializeStructVariant, SerializeTuple,
    SerializeTupleStruct, SerializeTupleVariant,
};
use serde::Serialize;
use serde_json::ser::{CompactFormatter, Formatter, PrettyFormatter, Serializer};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::options::SerializeOptions;

/// Why a document could not be turned into an entry map
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("malformed JSON: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("top-level document is {0}, expected an object")]
    NotAnObject(&'static str),
}

// =============================================================================
// Encoding
// =============================================================================

/// Write `entries` as a single JSON document
pub fn encode<W: io::Write>(
    writer: W,
    entries: &Map<String, Value>,
    options: &SerializeOptions,
) -> serde_json::Result<()> {
    match options.indent {
        Some(width) => {
            let indent = vec![b' '; width];
            let pretty = PrettyFormatter::with_indent(&indent);
            if options.ensure_ascii {
                emit(writer, AsciiEscape(pretty), entries, options)
            } else {
                emit(writer, pretty, entries, options)
            }
        }
        None if options.ensure_ascii => emit(writer, AsciiEscape(CompactFormatter), entries, options),
        None => emit(writer, CompactFormatter, entries, options),
    }
}

/// Encode into a fresh buffer
pub fn to_vec(entries: &Map<String, Value>, options: &SerializeOptions) -> serde_json::Result<Vec<u8>> {
    let mut buf = Vec::with_capacity(128);
    encode(&mut buf, entries, options)?;
    Ok(buf)
}

fn emit<W, F>(
    writer: W,
    formatter: F,
    entries: &Map<String, Value>,
    options: &SerializeOptions,
) -> serde_json::Result<()>
where
    W: io::Write,
    F: Formatter,
{
    let mut serializer = Serializer::with_formatter(writer, formatter);
    if options.sorts_keys() {
        SortedMap(entries).serialize(&mut serializer)
    } else {
        entries.serialize(&mut serializer)
    }
}

/// Serializes a value with every nested object's keys in sorted order
struct Sorted<'a>(&'a Value);

impl Serialize for Sorted<'_> {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.0 {
            Value::Object(map) => SortedMap(map).serialize(serializer),
            Value::Array(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(&Sorted(item))?;
                }
                seq.end()
            }
            other => other.serialize(serializer),
        }
    }
}

struct SortedMap<'a>(&'a Map<String, Value>);

impl Serialize for SortedMap<'_> {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut pairs: Vec<(&String, &Value)> = self.0.iter().collect();
        pairs.sort_unstable_by(|a, b| a.0.cmp(b.0));

        let mut map = serializer.serialize_map(Some(pairs.len()))?;
        for (key, value) in pairs {
            map.serialize_entry(key, &Sorted(value))?;
        }
        map.end()
    }
}

/// Wraps a formatter and escapes non-ASCII string content as `\uXXXX`.
///
/// serde_json already escapes quotes, backslashes and control characters
/// before handing fragments over, so only the remaining non-ASCII chars need
/// rewriting here. Chars outside the BMP become a surrogate pair.
struct AsciiEscape<F>(F);

impl<F: Formatter> Formatter for AsciiEscape<F> {
    fn write_string_fragment<W>(&mut self, writer: &mut W, fragment: &str) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        let mut start = 0;
        for (idx, ch) in fragment.char_indices() {
            if ch.is_ascii() {
                continue;
            }
            if start < idx {
                writer.write_all(fragment[start..idx].as_bytes())?;
            }
            let mut units = [0u16; 2];
            for unit in ch.encode_utf16(&mut units) {
                write!(writer, "\\u{:04x}", unit)?;
            }
            start = idx + ch.len_utf8();
        }
        writer.write_all(fragment[start..].as_bytes())
    }

    // Layout is owned by the wrapped formatter

    fn begin_array<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.0.begin_array(writer)
    }

    fn end_array<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.0.end_array(writer)
    }

    fn begin_array_value<W: ?Sized + io::Write>(&mut self, writer: &mut W, first: bool) -> io::Result<()> {
        self.0.begin_array_value(writer, first)
    }

    fn end_array_value<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.0.end_array_value(writer)
    }

    fn begin_object<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.0.begin_object(writer)
    }

    fn end_object<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.0.end_object(writer)
    }

    fn begin_object_key<W: ?Sized + io::Write>(&mut self, writer: &mut W, first: bool) -> io::Result<()> {
        self.0.begin_object_key(writer, first)
    }

    fn end_object_key<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.0.end_object_key(writer)
    }

    fn begin_object_value<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.0.begin_object_value(writer)
    }

    fn end_object_value<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.0.end_object_value(writer)
    }
}

// =============================================================================
// Representability
// =============================================================================

/// A value JSON has no encoding for
#[derive(Debug, Error)]
#[error("{0}")]
pub struct Unrepresentable(String);

impl serde::ser::Error for Unrepresentable {
    fn custom<T: std::fmt::Display>(msg: T) -> Self {
        Unrepresentable(msg.to_string())
    }
}

/// Reject values containing NaN or infinities.
///
/// serde_json quietly turns non-finite floats into `null`, both in
/// `to_value` and when writing, so they have to be caught on the way in.
pub fn check_representable<T: Serialize + ?Sized>(value: &T) -> Result<(), Unrepresentable> {
    value.serialize(FiniteCheck)
}

/// Walks a `Serialize` value and fails on the first non-finite float
#[derive(Clone, Copy)]
struct FiniteCheck;

macro_rules! accept {
    ($($method:ident: $ty:ty),* $(,)?) => {
        $(
            fn $method(self, _v: $ty) -> Result<(), Unrepresentable> {
                Ok(())
            }
        )*
    };
}

fn finite(v: f64) -> Result<(), Unrepresentable> {
    if v.is_finite() {
        Ok(())
    } else {
        Err(Unrepresentable(format!("{} is not a finite number", v)))
    }
}

impl serde::Serializer for FiniteCheck {
    type Ok = ();
    type Error = Unrepresentable;
    type SerializeSeq = Self;
    type SerializeTuple = Self;
    type SerializeTupleStruct = Self;
    type SerializeTupleVariant = Self;
    type SerializeMap = Self;
    type SerializeStruct = Self;
    type SerializeStructVariant = Self;

    accept! {
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
    }

    fn serialize_f32(self, v: f32) -> Result<(), Unrepresentable> {
        finite(f64::from(v))
    }

    fn serialize_f64(self, v: f64) -> Result<(), Unrepresentable> {
        finite(v)
    }

    fn serialize_none(self) -> Result<(), Unrepresentable> {
        Ok(())
    }

    fn serialize_some<T: Serialize + ?Sized>(self, value: &T) -> Result<(), Unrepresentable> {
        value.serialize(self)
    }

    fn serialize_unit(self) -> Result<(), Unrepresentable> {
        Ok(())
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _index: u32,
        _variant: &'static str,
    ) -> Result<(), Unrepresentable> {
        Ok(())
    }

    fn serialize_newtype_struct<T: Serialize + ?Sized>(
        self,
        _name: &'static str,
        value: &T,
    ) -> Result<(), Unrepresentable> {
        value.serialize(self)
    }

    fn serialize_newtype_variant<T: Serialize + ?Sized>(
        self,
        _name: &'static str,
        _index: u32,
        _variant: &'static str,
        value: &T,
    ) -> Result<(), Unrepresentable> {
        value.serialize(self)
    }

    fn serialize_seq(self, _len: Option<usize>) -> Result<Self, Unrepresentable> {
        Ok(self)
    }

    fn serialize_tuple(self, _len: usize) -> Result<Self, Unrepresentable> {
        Ok(self)
    }

    fn serialize_tuple_struct(self, _name: &'static str, _len: usize) -> Result<Self, Unrepresentable> {
        Ok(self)
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Self, Unrepresentable> {
        Ok(self)
    }

    fn serialize_map(self, _len: Option<usize>) -> Result<Self, Unrepresentable> {
        Ok(self)
    }

    fn serialize_struct(self, _name: &'static str, _len: usize) -> Result<Self, Unrepresentable> {
        Ok(self)
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Self, Unrepresentable> {
        Ok(self)
    }
}

impl SerializeSeq for FiniteCheck {
    type Ok = ();
    type Error = Unrepresentable;

    fn serialize_element<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), Unrepresentable> {
        value.serialize(*self)
    }

    fn end(self) -> Result<(), Unrepresentable> {
        Ok(())
    }
}

impl SerializeTuple for FiniteCheck {
    type Ok = ();
    type Error = Unrepresentable;

    fn serialize_element<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), Unrepresentable> {
        value.serialize(*self)
    }

    fn end(self) -> Result<(), Unrepresentable> {
        Ok(())
    }
}

impl SerializeTupleStruct for FiniteCheck {
    type Ok = ();
    type Error = Unrepresentable;

    fn serialize_field<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), Unrepresentable> {
        value.serialize(*self)
    }

    fn end(self) -> Result<(), Unrepresentable> {
        Ok(())
    }
}

impl SerializeTupleVariant for FiniteCheck {
    type Ok = ();
    type Error = Unrepresentable;

    fn serialize_field<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), Unrepresentable> {
        value.serialize(*self)
    }

    fn end(self) -> Result<(), Unrepresentable> {
        Ok(())
    }
}

impl SerializeMap for FiniteCheck {
    type Ok = ();
    type Error = Unrepresentable;

    fn serialize_key<T: Serialize + ?Sized>(&mut self, key: &T) -> Result<(), Unrepresentable> {
        key.serialize(*self)
    }

    fn serialize_value<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), Unrepresentable> {
        value.serialize(*self)
    }

    fn end(self) -> Result<(), Unrepresentable> {
        Ok(())
    }
}

impl SerializeStruct for FiniteCheck {
    type Ok = ();
    type Error = Unrepresentable;

    fn serialize_field<T: Serialize + ?Sized>(
        &mut self,
        _key: &'static str,
        value: &T,
    ) -> Result<(), Unrepresentable> {
        value.serialize(*self)
    }

    fn end(self) -> Result<(), Unrepresentable> {
        Ok(())
    }
}

impl SerializeStructVariant for FiniteCheck {
    type Ok = ();
    type Error = Unrepresentable;

    fn serialize_field<T: Serialize + ?Sized>(
        &mut self,
        _key: &'static str,
        value: &T,
    ) -> Result<(), Unrepresentable> {
        value.serialize(*self)
    }

    fn end(self) -> Result<(), Unrepresentable> {
        Ok(())
    }
}

// =============================================================================
// Decoding
// =============================================================================

/// Parse a complete document into an entry map
pub fn decode(bytes: &[u8]) -> Result<Map<String, Value>, DecodeError> {
    match serde_json::from_slice::<Value>(bytes)? {
        Value::Object(map) => Ok(map),
        other => Err(DecodeError::NotAnObject(type_name(&other))),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
