use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::{Map, Number, Value};

use crate::{
    Error, FromValue, Result, TypedValue,
    value::{Document, Native},
    wire::WireType,
};

/// Convert json text or document value with [`serde`].
///
/// Decoding accepts [`WireType::Json`] and character text, or a
/// [`Document`] which is first converted into a json object.
#[derive(Debug)]
pub struct Json<T>(pub T);

impl<T: Serialize> Json<T> {
    /// Serialize into a [`WireType::Json`] value.
    pub fn to_typed_value(&self) -> Result<TypedValue> {
        let text = serde_json::to_string(&self.0)
            .map_err(|e| Error::illegal_argument(format!("failed to serialize json: {e}")))?;
        Ok(TypedValue::new(WireType::Json, Native::String(text)))
    }
}

impl<T: DeserializeOwned> FromValue for Json<T> {
    fn from_value(value: &TypedValue) -> Result<Self> {
        let json = match value.as_object() {
            Some(Native::Document(doc)) => document_to_json(doc)?,
            _ => match value.as_string()? {
                Some(text) => serde_json::from_str(&text).map_err(invalid)?,
                None => Value::Null,
            },
        };
        serde_json::from_value(json).map(Json).map_err(invalid)
    }
}

fn invalid(err: serde_json::Error) -> Error {
    Error::value_illegal(format!("invalid json: {err}"))
}

fn document_to_json(doc: &Document) -> Result<Value> {
    let mut map = Map::with_capacity(doc.len());
    for (key, value) in doc.iter() {
        map.insert(key.to_owned(), to_json(value)?);
    }
    Ok(Value::Object(map))
}

fn to_json(value: &TypedValue) -> Result<Value> {
    if value.is_null() {
        return Ok(Value::Null);
    }
    let json = match value.as_object() {
        Some(Native::Bool(b)) => Value::Bool(*b),
        Some(Native::Byte(_) | Native::Short(_) | Native::Int(_) | Native::Long(_)) => {
            Value::Number(value.as_long()?.into())
        }
        Some(Native::Float(_) | Native::Double(_)) => {
            Number::from_f64(value.as_double()?).map_or(Value::Null, Value::Number)
        }
        Some(Native::List(items)) => Value::Array(items.iter().map(to_json).collect::<Result<_>>()?),
        Some(Native::Array(array)) => {
            Value::Array(array.elements().iter().map(to_json).collect::<Result<_>>()?)
        }
        Some(Native::Document(doc)) => document_to_json(doc)?,
        _ => value.as_string()?.map_or(Value::Null, Value::String),
    };
    Ok(json)
}

impl<T: Serialize> Serialize for Json<T> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.0.serialize(serializer)
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Json<T> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        Ok(Self(T::deserialize(deserializer)?))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[derive(Debug, PartialEq, serde::Deserialize, serde::Serialize)]
    struct Point {
        x: i32,
        tags: Vec<String>,
    }

    #[test]
    fn text_and_document() {
        let point = Point { x: 4, tags: vec!["a".into()] };
        let value = Json(&point).to_typed_value().unwrap();
        assert_eq!(value.wire_type(), WireType::Json);
        assert_eq!(Json::<Point>::from_value(&value).unwrap().0, point);

        let doc = Document::new()
            .with("x", 4i16)
            .with("tags", TypedValue::from_list(vec![TypedValue::from_string("a")]));
        let value = TypedValue::from_document(doc);
        assert_eq!(Json::<Point>::from_value(&value).unwrap().0, point);
    }

    #[test]
    fn invalid_text() {
        let value = TypedValue::from_string("{");
        assert!(Json::<Point>::from_value(&value).is_err());
    }
}
