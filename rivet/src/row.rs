//! Relational result row.
//!
//! - [`Row`]
//! - [`FromRow`]
//! - [`Index`]
use std::{fmt, sync::Arc};

use crate::{
    Error, Result,
    codec,
    value::{FromValue, TypedValue},
    wire::WireValue,
};

/// One row of a relational result frame.
///
/// Column names are shared by every row of the frame.
#[derive(Clone, PartialEq)]
pub struct Row {
    columns: Arc<[String]>,
    values: Vec<TypedValue>,
}

impl Row {
    pub fn new(columns: Arc<[String]>, values: Vec<TypedValue>) -> Row {
        Row { columns, values }
    }

    /// Decode a wire row.
    pub(crate) fn decode(columns: Arc<[String]>, values: &[WireValue]) -> Result<Row> {
        if columns.len() != values.len() {
            return Err(Error::illegal_argument(format!(
                "row has {} values for {} columns",
                values.len(),
                columns.len()
            )));
        }
        Ok(Row { columns, values: codec::deserialize_all(values)? })
    }

    /// Returns `true` if row contains no columns.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Returns the number of columns.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn values(&self) -> &[TypedValue] {
        &self.values
    }

    /// Get column value.
    pub fn get<I: Index>(&self, idx: I) -> Result<&TypedValue> {
        let nth = idx.position(&self.columns)?;
        Ok(&self.values[nth])
    }

    /// Try get and convert column.
    pub fn try_get<I: Index, T: FromValue>(&self, idx: I) -> Result<T> {
        T::from_value(self.get(idx)?)
    }

    /// Try decode type using [`FromRow`] implementation.
    pub fn decode_as<D: FromRow>(self) -> Result<D> {
        D::from_row(self)
    }
}

impl IntoIterator for Row {
    type Item = TypedValue;

    type IntoIter = std::vec::IntoIter<TypedValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.values.into_iter()
    }
}

impl fmt::Debug for Row {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.columns.iter().zip(&self.values)).finish()
    }
}

// ===== Traits =====

/// Type that can be constructed from a row.
pub trait FromRow: Sized {
    /// Construct self from row.
    fn from_row(row: Row) -> Result<Self>;
}

impl FromRow for Row {
    fn from_row(row: Row) -> Result<Self> {
        Ok(row)
    }
}

impl FromRow for () {
    fn from_row(_: Row) -> Result<Self> {
        Ok(())
    }
}

macro_rules! from_row_tuple {
    ($($t:ident $i:literal),*) => {
        impl<$($t),*> FromRow for ($($t),*,)
        where
            $($t: FromValue),*
        {
            fn from_row(row: Row) -> Result<Self> {
                Ok((
                    $(row.try_get::<_, $t>($i)?),*,
                ))
            }
        }
    };
}

from_row_tuple!(T0 0);
from_row_tuple!(T0 0, T1 1);
from_row_tuple!(T0 0, T1 1, T2 2);
from_row_tuple!(T0 0, T1 1, T2 2, T3 3);
from_row_tuple!(T0 0, T1 1, T2 2, T3 3, T4 4);
from_row_tuple!(T0 0, T1 1, T2 2, T3 3, T4 4, T5 5);

/// Type that can be used for indexing column.
pub trait Index: Sized + sealed::Sealed {
    /// Returns the nth column.
    fn position(self, columns: &[String]) -> Result<usize>;
}

impl Index for usize {
    fn position(self, columns: &[String]) -> Result<usize> {
        match self < columns.len() {
            true => Ok(self),
            false => Err(Error::value_illegal(format!(
                "column index {} out of bounds of {}",
                itoa::Buffer::new().format(self),
                columns.len()
            ))),
        }
    }
}

impl Index for &str {
    fn position(self, columns: &[String]) -> Result<usize> {
        columns
            .iter()
            .position(|e| e.eq_ignore_ascii_case(self))
            .ok_or_else(|| Error::value_illegal(format!("column not found: {self:?}")))
    }
}

mod sealed {
    pub trait Sealed { }
    impl Sealed for usize { }
    impl Sealed for &str { }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{error::ErrorKind, wire::{ValueCase, WireType}};

    fn row() -> Row {
        let columns: Arc<[String]> = ["id".to_owned(), "Name".to_owned()].into();
        Row::decode(
            columns,
            &[
                WireValue::new(WireType::Int64, ValueCase::Long(300)),
                WireValue::null(WireType::Varchar),
            ],
        )
        .unwrap()
    }

    #[test]
    fn get_by_index_and_name() {
        let row = row();
        assert_eq!(row.try_get::<_, i64>(0).unwrap(), 300);
        assert_eq!(row.try_get::<_, i8>("id").unwrap(), 44);
        assert_eq!(row.try_get::<_, Option<String>>("name").unwrap(), None);
        assert!(matches!(row.try_get::<_, String>(1).unwrap_err().kind(), ErrorKind::ValueIllegal(_)));
        assert!(matches!(row.get(2).unwrap_err().kind(), ErrorKind::ValueIllegal(_)));
        assert!(matches!(row.get("missing").unwrap_err().kind(), ErrorKind::ValueIllegal(_)));
    }

    #[test]
    fn tuple() {
        let (id, name) = row().decode_as::<(i32, Option<String>)>().unwrap();
        assert_eq!(id, 300);
        assert_eq!(name, None);
    }

    #[test]
    fn arity_mismatch() {
        let columns: Arc<[String]> = ["id".to_owned()].into();
        assert!(Row::decode(columns, &[]).is_err());
    }
}
