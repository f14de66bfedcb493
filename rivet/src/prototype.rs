//! Structured type values.
//!
//! A structured value is assembled field by field with [`PrototypeBuilder`],
//! then [`finish`][PrototypeBuilder::finish]ed into an immutable
//! [`Prototype`] which can be indexed or read sequentially with
//! [`FieldReader`].
//!
//! A builder cannot be read:
//!
//! ```compile_fail
//! let builder = rivet::PrototypeBuilder::new("point");
//! builder.reader();
//! ```
//!
//! and a finished prototype cannot be appended:
//!
//! ```compile_fail
//! let point = rivet::PrototypeBuilder::new("point").finish();
//! point.push(1);
//! ```
use rust_decimal::Decimal;
use std::{collections::HashMap, fmt, sync::Arc};
use time::{Date, PrimitiveDateTime};

use crate::{
    Error, Result,
    error::ErrorKind,
    value::{FromValue, ToValue, TypedValue},
};

/// Append only phase of a [`Prototype`].
#[derive(Debug, Clone)]
pub struct PrototypeBuilder {
    type_name: Arc<str>,
    fields: Vec<TypedValue>,
}

impl PrototypeBuilder {
    pub fn new(type_name: impl Into<Arc<str>>) -> PrototypeBuilder {
        PrototypeBuilder {
            type_name: type_name.into(),
            fields: Vec::new(),
        }
    }

    /// Append a field.
    pub fn push(&mut self, value: impl ToValue) -> &mut Self {
        self.fields.push(value.to_value());
        self
    }

    /// Builder style [`push`][PrototypeBuilder::push].
    pub fn field(mut self, value: impl ToValue) -> Self {
        self.push(value);
        self
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn finish(self) -> Prototype {
        Prototype {
            type_name: self.type_name,
            fields: self.fields,
        }
    }
}

/// Finished structured value.
#[derive(Clone, PartialEq)]
pub struct Prototype {
    type_name: Arc<str>,
    fields: Vec<TypedValue>,
}

impl Prototype {
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub(crate) fn type_name_arc(&self) -> Arc<str> {
        self.type_name.clone()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Field at `index`, out of range is
    /// [`ValueIllegal`][ErrorKind::ValueIllegal].
    pub fn get(&self, index: usize) -> Result<&TypedValue> {
        self.fields.get(index).ok_or_else(|| {
            Error::value_illegal(format!(
                "field index {index} out of range for `{}` with {} fields",
                self.type_name,
                self.fields.len()
            ))
        })
    }

    pub fn fields(&self) -> &[TypedValue] {
        &self.fields
    }

    /// Sequential reader from the first field.
    pub fn reader(&self) -> FieldReader<'_> {
        FieldReader {
            prototype: self,
            cursor: 0,
            was_null: false,
        }
    }

    /// Construct `T` from this prototype.
    pub fn decode<T: FromPrototype>(&self) -> Result<T> {
        T::from_prototype(self)
    }
}

impl fmt::Debug for Prototype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut dbg = f.debug_tuple(&self.type_name);
        for field in &self.fields {
            dbg.field(field);
        }
        dbg.finish()
    }
}

/// Sequential field reader of a [`Prototype`].
#[derive(Debug)]
pub struct FieldReader<'a> {
    prototype: &'a Prototype,
    cursor: usize,
    was_null: bool,
}

macro_rules! read {
    ($($(#[$doc:meta])* $name:ident -> $ty:ty, $as:ident;)*) => {$(
        $(#[$doc])*
        pub fn $name(&mut self) -> Result<$ty> {
            self.read_value()?.$as()
        }
    )*};
}

impl<'a> FieldReader<'a> {
    /// Read the next field, reading past the last field is
    /// [`UdtStreamExhausted`][ErrorKind::UdtStreamExhausted].
    pub fn read_value(&mut self) -> Result<&'a TypedValue> {
        let Some(value) = self.prototype.fields.get(self.cursor) else {
            return Err(ErrorKind::UdtStreamExhausted {
                type_name: self.prototype.type_name.to_string(),
                len: self.prototype.fields.len(),
            }
            .into());
        };
        self.cursor += 1;
        self.was_null = value.is_null();
        Ok(value)
    }

    /// Read and convert the next field.
    pub fn read<T: FromValue>(&mut self) -> Result<T> {
        T::from_value(self.read_value()?)
    }

    read! {
        /// Returns `false` on NULL.
        read_bool -> bool, as_bool;
        /// Returns `0` on NULL.
        read_int -> i32, as_int;
        read_long -> i64, as_long;
        read_double -> f64, as_double;
        read_decimal -> Option<Decimal>, as_decimal;
        read_string -> Option<String>, as_string;
        read_bytes -> Option<bytes::Bytes>, as_bytes;
        read_date -> Option<Date>, as_date;
        read_timestamp -> Option<PrimitiveDateTime>, as_timestamp;
        read_prototype -> Option<Arc<Prototype>>, as_prototype;
    }

    /// Returns `true` if the last read field was null.
    pub fn was_null(&self) -> bool {
        self.was_null
    }

    /// Number of fields not yet read.
    pub fn remaining(&self) -> usize {
        self.prototype.fields.len() - self.cursor
    }
}

/// Type that can be reconstructed from a [`Prototype`].
///
/// Use the derive macro to implement for a struct, each field is read in
/// declaration order.
pub trait FromPrototype: Sized {
    /// Structured type name this type is registered under.
    const TYPE_NAME: &'static str;

    fn from_prototype(prototype: &Prototype) -> Result<Self>;
}

type Constructor<T> = Box<dyn Fn(&Prototype) -> Result<T> + Send + Sync>;

/// Registered constructors by structured type name.
pub struct TypeMap<T> {
    constructors: HashMap<Arc<str>, Constructor<T>>,
}

impl<T> TypeMap<T> {
    pub fn new() -> Self {
        Self { constructors: HashMap::new() }
    }

    /// Register a constructor for `type_name`, replacing any previous one.
    pub fn register<F>(&mut self, type_name: impl Into<Arc<str>>, constructor: F) -> &mut Self
    where
        F: Fn(&Prototype) -> Result<T> + Send + Sync + 'static,
    {
        self.constructors.insert(type_name.into(), Box::new(constructor));
        self
    }

    /// Register `U` under [`FromPrototype::TYPE_NAME`].
    pub fn register_type<U>(&mut self) -> &mut Self
    where
        U: FromPrototype + Into<T> + 'static,
        T: 'static,
    {
        self.register(U::TYPE_NAME, |p| U::from_prototype(p).map(Into::into))
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.constructors.contains_key(type_name)
    }

    /// Construct the registered target of the prototype type name.
    ///
    /// Unknown type name is [`MissingMapping`][ErrorKind::MissingMapping],
    /// failed constructor is
    /// [`ConstructionFailed`][ErrorKind::ConstructionFailed].
    pub fn construct(&self, prototype: &Prototype) -> Result<T> {
        let Some(constructor) = self.constructors.get(prototype.type_name()) else {
            return Err(Error::missing_mapping(prototype.type_name().to_owned()));
        };
        constructor(prototype).map_err(|err| {
            ErrorKind::ConstructionFailed {
                type_name: prototype.type_name().to_owned(),
                reason: err.to_string(),
            }
            .into()
        })
    }
}

impl<T> Default for TypeMap<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for TypeMap<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.constructors.keys()).finish()
    }
}
