use super::{deserialize_all_at, deserialize_at, mismatch, required, serialize, serialize_all};
use crate::{
    Error, Result,
    prototype::PrototypeBuilder,
    types::ClientType as C,
    value::{Array, Document, GraphElement, Native, TypedValue},
    wire::{GraphValue, ValueCase as V, WireType, WireValue},
};

fn entries_to_wire(document: &Document) -> Result<Vec<(String, WireValue)>> {
    document
        .iter()
        .map(|(key, value)| Ok((key.to_owned(), serialize(value)?)))
        .collect()
}

fn entries_from_wire(entries: &[(String, WireValue)], nested: usize) -> Result<Document> {
    entries
        .iter()
        .map(|(key, value)| Ok((key.clone(), deserialize_at(value, nested)?)))
        .collect()
}

fn graph_to_wire(element: &GraphElement) -> Result<GraphValue> {
    Ok(match element {
        GraphElement::Vertex { id, label, properties } => GraphValue::Vertex {
            id: Box::new(serialize(id)?),
            label: label.clone(),
            properties: entries_to_wire(properties)?,
        },
        GraphElement::Edge { id, label, from, to, properties } => GraphValue::Edge {
            id: Box::new(serialize(id)?),
            label: label.clone(),
            from: Box::new(serialize(from)?),
            to: Box::new(serialize(to)?),
            properties: entries_to_wire(properties)?,
        },
        GraphElement::Path(items) => GraphValue::Path(
            items
                .iter()
                .map(|e| Ok(WireValue::new(e.wire_type(), V::Graph(graph_to_wire(e)?))))
                .collect::<Result<_>>()?,
        ),
    })
}

fn graph_from_wire(graph: &GraphValue, nested: usize) -> Result<GraphElement> {
    Ok(match graph {
        GraphValue::Vertex { id, label, properties } => GraphElement::Vertex {
            id: Box::new(deserialize_at(id, nested)?),
            label: label.clone(),
            properties: entries_from_wire(properties, nested)?,
        },
        GraphValue::Edge { id, label, from, to, properties } => GraphElement::Edge {
            id: Box::new(deserialize_at(id, nested)?),
            label: label.clone(),
            from: Box::new(deserialize_at(from, nested)?),
            to: Box::new(deserialize_at(to, nested)?),
            properties: entries_from_wire(properties, nested)?,
        },
        GraphValue::Path(items) => GraphElement::Path(
            items
                .iter()
                .map(|item| match deserialize_at(item, nested)?.into_native() {
                    Some(Native::Graph(element)) => Ok(element),
                    _ => Err(Error::illegal_argument(format!(
                        "path element must be a graph element, found `{}`",
                        item.wire_type
                    ))),
                })
                .collect::<Result<_>>()?,
        ),
    })
}

// ===== encoders =====

pub(super) fn encode_udt(value: &TypedValue) -> Result<V> {
    let prototype = required(value, value.as_prototype(), "Prototype")?;
    Ok(V::Udt {
        type_name: prototype.type_name().to_owned(),
        fields: serialize_all(prototype.fields())?,
    })
}

pub(super) fn encode_row(value: &TypedValue) -> Result<V> {
    let items = required(value, value.as_list(), "Row")?;
    Ok(V::Row(serialize_all(items)?))
}

pub(super) fn encode_list(value: &TypedValue) -> Result<V> {
    let items = required(value, value.as_list(), "List")?;
    Ok(V::List(serialize_all(items)?))
}

pub(super) fn encode_array(value: &TypedValue) -> Result<V> {
    let array = required(value, value.as_array(), "Array")?;
    Ok(V::Array {
        element_type: array.element_type(),
        elements: serialize_all(array.elements())?,
    })
}

pub(super) fn encode_document(value: &TypedValue) -> Result<V> {
    let document = required(value, value.as_document(), "Document")?;
    Ok(V::Document(entries_to_wire(document)?))
}

pub(super) fn encode_graph(value: &TypedValue) -> Result<V> {
    let element = required(value, value.as_graph(), "GraphElement")?;
    Ok(V::Graph(graph_to_wire(element)?))
}

// ===== decoders =====

/// `Udt` is a named prototype, `Row` an anonymous sequence.
pub(super) fn decode_struct(wire_type: WireType, client_type: C, case: &V, nested: usize) -> Result<TypedValue> {
    match (client_type, wire_type, case) {
        (C::Struct, WireType::Udt, V::Udt { type_name, fields }) => {
            let mut builder = PrototypeBuilder::new(type_name.as_str());
            for field in fields {
                builder.push(deserialize_at(field, nested)?);
            }
            Ok(TypedValue::from_prototype(builder.finish()))
        }
        (C::Struct, WireType::Row, V::Row(items)) => {
            Ok(TypedValue::new(wire_type, Native::List(deserialize_all_at(items, nested)?)))
        }
        _ => Err(mismatch(wire_type, client_type, case)),
    }
}

pub(super) fn decode_list(wire_type: WireType, client_type: C, case: &V, nested: usize) -> Result<TypedValue> {
    match (client_type, case) {
        (C::List, V::List(items)) => Ok(TypedValue::new(wire_type, Native::List(deserialize_all_at(items, nested)?))),
        _ => Err(mismatch(wire_type, client_type, case)),
    }
}

/// Element types are validated before any element is materialized.
pub(super) fn decode_array(wire_type: WireType, client_type: C, case: &V, nested: usize) -> Result<TypedValue> {
    let (C::Array, V::Array { element_type, elements }) = (client_type, case) else {
        return Err(mismatch(wire_type, client_type, case));
    };

    if let Some(e) = elements.iter().find(|e| e.wire_type != *element_type) {
        return Err(Error::illegal_argument(format!(
            "heterogeneous array, expected `{element_type}` element found `{}`",
            e.wire_type
        )));
    }

    let array = Array::with_type(*element_type, deserialize_all_at(elements, nested)?)?;
    Ok(TypedValue::new(wire_type, Native::Array(array)))
}

pub(super) fn decode_document(wire_type: WireType, client_type: C, case: &V, nested: usize) -> Result<TypedValue> {
    match (client_type, case) {
        (C::Document, V::Document(entries)) => {
            Ok(TypedValue::new(wire_type, Native::Document(entries_from_wire(entries, nested)?)))
        }
        _ => Err(mismatch(wire_type, client_type, case)),
    }
}

pub(super) fn decode_graph(wire_type: WireType, client_type: C, case: &V, nested: usize) -> Result<TypedValue> {
    let element = match (client_type, case) {
        (C::Vertex, V::Graph(graph @ GraphValue::Vertex { .. }))
        | (C::Edge, V::Graph(graph @ GraphValue::Edge { .. }))
        | (C::Path, V::Graph(graph @ GraphValue::Path(_))) => graph_from_wire(graph, nested)?,
        _ => return Err(mismatch(wire_type, client_type, case)),
    };
    Ok(TypedValue::new(wire_type, Native::Graph(element)))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{codec::deserialize, error::ErrorKind};

    fn vertex(id: i64) -> GraphElement {
        GraphElement::Vertex {
            id: Box::new(TypedValue::from_long(id)),
            label: "city".into(),
            properties: Document::new(),
        }
    }

    #[test]
    fn path_of_elements() {
        let edge = GraphElement::Edge {
            id: Box::new(TypedValue::from_int(10)),
            label: "road".into(),
            from: Box::new(TypedValue::from_long(1)),
            to: Box::new(TypedValue::from_long(2)),
            properties: Document::new().with("km", 12.5),
        };
        let path = TypedValue::from_graph(GraphElement::Path(vec![vertex(1), edge, vertex(2)]));
        let wire = serialize(&path).unwrap();
        let back = deserialize(&wire).unwrap();
        assert_eq!(back, path);

        let GraphElement::Path(items) = back.as_graph().unwrap().unwrap() else {
            panic!("expected path");
        };
        assert!(items[1].is_incident(&TypedValue::from_int(2)));
    }

    #[test]
    fn graph_shape_must_match_type() {
        let wire = serialize(&TypedValue::from_graph(vertex(1))).unwrap();
        let wrong = WireValue::new(WireType::Edge, wire.case);
        assert!(matches!(deserialize(&wrong).unwrap_err().kind(), ErrorKind::IllegalArgument(_)));
    }

    #[test]
    fn row_and_udt_cases_are_distinct() {
        let wire = WireValue::new(WireType::Row, V::Udt { type_name: "t".into(), fields: vec![] });
        assert!(deserialize(&wire).is_err());

        let wire = WireValue::new(WireType::Row, V::Row(vec![WireValue::new(WireType::Bool, V::Bool(true))]));
        let row = deserialize(&wire).unwrap();
        assert_eq!(row.wire_type(), WireType::Row);
        assert_eq!(row.as_list().unwrap().unwrap().len(), 1);
    }

    #[test]
    fn nested_failure_propagates() {
        let wire = WireValue::new(
            WireType::List,
            V::List(vec![WireValue::new(WireType::Date, V::String("today".into()))]),
        );
        assert!(matches!(deserialize(&wire).unwrap_err().kind(), ErrorKind::IllegalArgument(_)));
    }
}
