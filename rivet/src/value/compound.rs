//! Composite values.
use super::{FromValue, ToValue, TypedValue};
use crate::{Error, Result, wire::WireType};

/// Sequence of values sharing one wire type.
#[derive(Debug, Clone, PartialEq)]
pub struct Array {
    element_type: WireType,
    elements: Vec<TypedValue>,
}

impl Array {
    /// Element type is taken from the first element, an empty array has
    /// `Null` element type.
    pub fn new(elements: Vec<TypedValue>) -> Result<Array> {
        let element_type = elements.first().map_or(WireType::Null, TypedValue::wire_type);
        Self::with_type(element_type, elements)
    }

    /// Fails with [`IllegalArgument`][crate::error::ErrorKind::IllegalArgument]
    /// if any element has different wire type.
    pub fn with_type(element_type: WireType, elements: Vec<TypedValue>) -> Result<Array> {
        if let Some(e) = elements.iter().find(|e| e.wire_type() != element_type) {
            return Err(Error::illegal_argument(format!(
                "heterogeneous array, expected `{element_type}` element found `{}`",
                e.wire_type()
            )));
        }
        Ok(Array { element_type, elements })
    }

    pub fn element_type(&self) -> WireType {
        self.element_type
    }

    pub fn elements(&self) -> &[TypedValue] {
        &self.elements
    }

    pub fn into_elements(self) -> Vec<TypedValue> {
        self.elements
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&TypedValue> {
        self.elements.get(index)
    }
}

/// Ordered key value document.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Document {
    entries: Vec<(String, TypedValue)>,
}

impl Document {
    pub fn new() -> Document {
        Document::default()
    }

    /// Insert or replace entry, insertion order is kept.
    pub fn insert(&mut self, key: impl Into<String>, value: impl ToValue) {
        let key = key.into();
        let value = value.to_value();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, v)) => *v = value,
            None => self.entries.push((key, value)),
        }
    }

    /// Builder style [`insert`][Document::insert].
    pub fn with(mut self, key: impl Into<String>, value: impl ToValue) -> Document {
        self.insert(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&TypedValue> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Get and convert entry.
    pub fn try_get<T: FromValue>(&self, key: &str) -> Result<T> {
        match self.get(key) {
            Some(value) => T::from_value(value),
            None => Err(Error::value_illegal(format!("document key not found: {key:?}"))),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &TypedValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn into_entries(self) -> Vec<(String, TypedValue)> {
        self.entries
    }
}

impl FromIterator<(String, TypedValue)> for Document {
    fn from_iter<I: IntoIterator<Item = (String, TypedValue)>>(iter: I) -> Self {
        let mut document = Document::new();
        for (key, value) in iter {
            document.insert(key, value);
        }
        document
    }
}

impl IntoIterator for Document {
    type Item = (String, TypedValue);

    type IntoIter = std::vec::IntoIter<(String, TypedValue)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

/// Graph query result element.
#[derive(Debug, Clone, PartialEq)]
pub enum GraphElement {
    Vertex {
        id: Box<TypedValue>,
        label: String,
        properties: Document,
    },
    Edge {
        id: Box<TypedValue>,
        label: String,
        from: Box<TypedValue>,
        to: Box<TypedValue>,
        properties: Document,
    },
    /// Alternating vertices and edges.
    Path(Vec<GraphElement>),
}

impl GraphElement {
    pub fn wire_type(&self) -> WireType {
        match self {
            GraphElement::Vertex { .. } => WireType::Vertex,
            GraphElement::Edge { .. } => WireType::Edge,
            GraphElement::Path(_) => WireType::Path,
        }
    }

    /// Returns [`None`] for path.
    pub fn id(&self) -> Option<&TypedValue> {
        match self {
            GraphElement::Vertex { id, .. } | GraphElement::Edge { id, .. } => Some(id),
            GraphElement::Path(_) => None,
        }
    }

    pub fn label(&self) -> Option<&str> {
        match self {
            GraphElement::Vertex { label, .. } | GraphElement::Edge { label, .. } => Some(label),
            GraphElement::Path(_) => None,
        }
    }

    pub fn properties(&self) -> Option<&Document> {
        match self {
            GraphElement::Vertex { properties, .. } | GraphElement::Edge { properties, .. } => {
                Some(properties)
            }
            GraphElement::Path(_) => None,
        }
    }

    /// Returns `true` if this is an edge with `vertex` on either end.
    ///
    /// Ids are compared by value, an `Int32` id matches an equal `Int64` one.
    pub fn is_incident(&self, vertex: &TypedValue) -> bool {
        match self {
            GraphElement::Edge { from, to, .. } => **from == *vertex || **to == *vertex,
            _ => false,
        }
    }
}
