//! Row factories.
//!
//! A row factory turns one raw result row into whatever the caller wants to
//! work with. Any function or closure with the signature
//!
//! ```ignore
//! FnMut(&Columns, &rusqlite::Row<'_>) -> rusqlite::Result<T>
//! ```
//!
//! can be passed to [`Session::query_with`](crate::storage::Session::query_with).
//! [`named`] is the default used by [`Session::query`](crate::storage::Session::query).

use std::ops::Index;

use rusqlite::Row;
use rusqlite::types::{Value, ValueRef};
use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::snapshot::SnapshotValue;

/// Result-set metadata handed to every factory call.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Columns {
    names: Vec<String>,
}

impl Columns {
    #[must_use]
    pub fn new(names: Vec<String>) -> Self {
        Self { names }
    }

    /// Column names in result order.
    #[must_use]
    pub fn names(&self) -> &[String] {
        &self.names
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Position of the first column with this name.
    #[must_use]
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }
}

/// A row as an ordered, name-keyed mapping.
///
/// Field order follows the result columns. Serializes to a JSON object with
/// the same value encoding as snapshot files.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Record {
    fields: Vec<(String, Value)>,
}

impl Record {
    /// Value of the named column.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    /// Column names in result order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(n, _)| n.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(n, v)| (n.as_str(), v))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Values in result order.
    #[must_use]
    pub fn into_values(self) -> Vec<Value> {
        self.fields.into_iter().map(|(_, v)| v).collect()
    }
}

impl<K: Into<String>> FromIterator<(K, Value)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, Value)>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

impl Index<&str> for Record {
    type Output = Value;

    fn index(&self, name: &str) -> &Value {
        self.get(name)
            .unwrap_or_else(|| panic!("no column named {name:?} in record"))
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (name, value) in &self.fields {
            map.serialize_entry(name, &SnapshotValue::Sql(value.clone()))?;
        }
        map.end()
    }
}

/// Default factory: a [`Record`] keyed by column name.
///
/// # Errors
///
/// Returns an error if a column cannot be read.
pub fn named(columns: &Columns, row: &Row<'_>) -> rusqlite::Result<Record> {
    columns
        .names()
        .iter()
        .enumerate()
        .map(|(i, name)| Ok((name.clone(), owned_value(row, i)?)))
        .collect::<rusqlite::Result<Vec<_>>>()
        .map(|fields| Record { fields })
}

/// Positional factory: the row's values in column order.
///
/// # Errors
///
/// Returns an error if a column cannot be read.
pub fn positional(columns: &Columns, row: &Row<'_>) -> rusqlite::Result<Vec<Value>> {
    (0..columns.len()).map(|i| owned_value(row, i)).collect()
}

/// Scalar factory: only the first column.
///
/// # Errors
///
/// Returns an error if the result has no columns.
pub fn first_column(_columns: &Columns, row: &Row<'_>) -> rusqlite::Result<Value> {
    owned_value(row, 0)
}

/// Read one column as an owned [`Value`].
///
/// TEXT that is not valid UTF-8 is reported as `rusqlite::Error::Utf8Error`;
/// read it with `row.get_ref` in a custom factory to get the raw bytes.
///
/// # Errors
///
/// Returns an error if the column does not exist or holds invalid UTF-8 text.
pub fn owned_value(row: &Row<'_>, index: usize) -> rusqlite::Result<Value> {
    Ok(match row.get_ref(index)? {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Integer(i),
        ValueRef::Real(f) => Value::Real(f),
        ValueRef::Text(bytes) => Value::Text(
            std::str::from_utf8(bytes)
                .map_err(rusqlite::Error::Utf8Error)?
                .to_owned(),
        ),
        ValueRef::Blob(bytes) => Value::Blob(bytes.to_vec()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    fn run<T>(
        sql: &str,
        mut factory: impl FnMut(&Columns, &Row<'_>) -> rusqlite::Result<T>,
    ) -> Vec<T> {
        let conn = Connection::open_in_memory().unwrap();
        let mut stmt = conn.prepare(sql).unwrap();
        let columns = Columns::new(stmt.column_names().into_iter().map(String::from).collect());
        stmt.query_map([], |row| factory(&columns, row))
            .unwrap()
            .collect::<rusqlite::Result<_>>()
            .unwrap()
    }

    #[test]
    fn test_named_factory() {
        let rows = run("SELECT 1 AS ID, 'a' AS Name", named);
        let expected: Record = [("ID", Value::Integer(1)), ("Name", Value::Text("a".into()))]
            .into_iter()
            .collect();

        assert_eq!(rows, vec![expected]);
        assert_eq!(rows[0]["Name"], Value::Text("a".into()));
        assert_eq!(rows[0].keys().collect::<Vec<_>>(), ["ID", "Name"]);
        assert!(rows[0].get("missing").is_none());
    }

    #[test]
    fn test_positional_and_first_column() {
        assert_eq!(
            run("SELECT 2.5, NULL", positional),
            vec![vec![Value::Real(2.5), Value::Null]]
        );
        assert_eq!(run("SELECT X'01', 9", first_column), vec![Value::Blob(vec![1])]);
    }

    #[test]
    fn test_invalid_utf8_text_is_an_error() {
        let conn = Connection::open_in_memory().unwrap();
        let mut stmt = conn.prepare("SELECT CAST(X'FF' AS TEXT) AS t").unwrap();
        let columns = Columns::new(vec!["t".into()]);
        let result: rusqlite::Result<Vec<Record>> = stmt
            .query_map([], |row| named(&columns, row))
            .unwrap()
            .collect();

        assert!(matches!(result, Err(rusqlite::Error::Utf8Error(_))));
    }

    #[test]
    fn test_record_serializes_in_column_order() {
        let record: Record = [("z", Value::Integer(1)), ("a", Value::Blob(vec![255]))]
            .into_iter()
            .collect();
        assert_eq!(
            serde_json::to_string(&record).unwrap(),
            r#"{"z":1,"a":{"blob":"/w=="}}"#
        );
    }

    #[test]
    fn test_columns_lookup() {
        let columns = Columns::new(vec!["a".into(), "b".into()]);
        assert_eq!(columns.index_of("b"), Some(1));
        assert_eq!(columns.index_of("c"), None);
        assert_eq!(columns.len(), 2);
    }
}
