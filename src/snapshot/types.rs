//! Snapshot types.
//!
//! This module defines the in-memory shape of a snapshot file and the JSON
//! encoding of individual SQLite values. The file layout is documented on
//! [`Snapshot`].

use std::fmt;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use rusqlite::ToSql;
use rusqlite::types::{ToSqlOutput, Value, ValueRef};
use serde::de::{self, Deserializer, MapAccess, Visitor};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};

/// Current snapshot format version.
pub const FORMAT_VERSION: u32 = 1;

/// Full textual image of a database.
///
/// ```json
/// {
///   "format": 1,
///   "tables": {
///     "Table2": {
///       "sql": "CREATE TABLE Table2 (ID INTEGER PRIMARY KEY, Name TEXT)",
///       "columns": [
///         {"name":"ID","datatype":"INTEGER","primary_key":1},
///         {"name":"Name","datatype":"TEXT"}
///       ],
///       "rows": [
///         [1,"a"],
///         [2,"b"]
///       ]
///     }
///   },
///   "schema": ["CREATE INDEX idx_name ON Table2 (Name)"]
/// }
/// ```
///
/// `tables` is a JSON object keyed by table name. Its order is significant:
/// tables are created and populated in document order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Format version, see [`FORMAT_VERSION`].
    #[serde(default = "default_format")]
    pub format: u32,
    /// Tables in creation order.
    #[serde(with = "table_map")]
    pub tables: Vec<TableSnapshot>,
    /// Indexes, views and triggers, replayed after all rows are inserted.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub schema: Vec<String>,
}

fn default_format() -> u32 {
    FORMAT_VERSION
}

impl Default for Snapshot {
    fn default() -> Self {
        Self {
            format: FORMAT_VERSION,
            tables: Vec::new(),
            schema: Vec::new(),
        }
    }
}

impl Snapshot {
    /// Look up a table by name.
    #[must_use]
    pub fn table(&self, name: &str) -> Option<&TableSnapshot> {
        self.tables.iter().find(|t| t.name == name)
    }

    /// Total number of rows across all tables.
    #[must_use]
    pub fn row_count(&self) -> usize {
        self.tables.iter().map(|t| t.rows.len()).sum()
    }
}

/// One table: its definition and every row.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TableSnapshot {
    /// Table name. Carried by the enclosing map key in the file.
    #[serde(skip)]
    pub name: String,
    /// Original `CREATE TABLE` statement, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sql: Option<String>,
    /// Columns in schema order.
    pub columns: Vec<ColumnSpec>,
    /// Rows in stable order, each positionally aligned with `columns`.
    #[serde(default)]
    pub rows: Vec<Vec<SnapshotValue>>,
}

impl TableSnapshot {
    /// Column names in schema order.
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }
}

/// Column definition, as reported by `PRAGMA table_xinfo`.
///
/// `unique` and `autoincrement` are never produced by a dump (the original
/// `CREATE TABLE` is kept instead) but are honored in hand-written snapshots
/// that omit `sql`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ColumnSpec {
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub datatype: String,
    #[serde(default, skip_serializing_if = "is_false")]
    pub not_null: bool,
    /// 1-based position within the primary key, 0 if not part of it.
    #[serde(default, skip_serializing_if = "is_zero")]
    pub primary_key: u32,
    /// Default value expression, verbatim SQL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub unique: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub autoincrement: bool,
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn is_false(b: &bool) -> bool {
    !*b
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn is_zero(n: &u32) -> bool {
    *n == 0
}

// ── Values ────────────────────────────────────────────────────

/// An SQLite value with a lossless JSON encoding.
///
/// | SQLite             | JSON                      |
/// |--------------------|---------------------------|
/// | NULL               | `null`                    |
/// | INTEGER            | `42`                      |
/// | REAL               | `42.0`, `1e300`           |
/// | REAL (±inf)        | `{"real":"inf"}`          |
/// | TEXT               | `"text"`                  |
/// | TEXT (not UTF-8)   | `{"text":"<base64>"}`     |
/// | BLOB               | `{"blob":"<base64>"}`     |
#[derive(Debug, Clone, PartialEq)]
pub enum SnapshotValue {
    /// Any value whose text, if any, is valid UTF-8.
    Sql(Value),
    /// TEXT holding bytes that are not valid UTF-8.
    RawText(Vec<u8>),
}

impl From<Value> for SnapshotValue {
    fn from(value: Value) -> Self {
        Self::Sql(value)
    }
}

impl From<ValueRef<'_>> for SnapshotValue {
    fn from(value: ValueRef<'_>) -> Self {
        match value {
            ValueRef::Null => Self::Sql(Value::Null),
            ValueRef::Integer(i) => Self::Sql(Value::Integer(i)),
            ValueRef::Real(f) => Self::Sql(Value::Real(f)),
            ValueRef::Text(bytes) => match std::str::from_utf8(bytes) {
                Ok(text) => Self::Sql(Value::Text(text.to_owned())),
                Err(_) => Self::RawText(bytes.to_vec()),
            },
            ValueRef::Blob(bytes) => Self::Sql(Value::Blob(bytes.to_vec())),
        }
    }
}

impl ToSql for SnapshotValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        match self {
            Self::Sql(value) => value.to_sql(),
            Self::RawText(bytes) => Ok(ToSqlOutput::Borrowed(ValueRef::Text(bytes))),
        }
    }
}

impl Serialize for SnapshotValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let value = match self {
            Self::Sql(value) => value,
            Self::RawText(bytes) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("text", &BASE64.encode(bytes))?;
                return map.end();
            }
        };

        match value {
            Value::Null => serializer.serialize_none(),
            Value::Integer(i) => serializer.serialize_i64(*i),
            Value::Real(f) if f.is_finite() => serializer.serialize_f64(*f),
            Value::Real(f) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("real", if *f > 0.0 { "inf" } else { "-inf" })?;
                map.end()
            }
            Value::Text(s) => serializer.serialize_str(s),
            Value::Blob(bytes) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("blob", &BASE64.encode(bytes))?;
                map.end()
            }
        }
    }
}

impl<'de> Deserialize<'de> for SnapshotValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = serde_json::Value::deserialize(deserializer)?;
        decode_value(raw).map_err(de::Error::custom)
    }
}

fn decode_value(raw: serde_json::Value) -> Result<SnapshotValue, String> {
    use serde_json::Value as Json;

    let value = match raw {
        Json::Null => Value::Null,
        Json::Bool(b) => Value::Integer(i64::from(b)),
        Json::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::Integer(i)
            } else if n.is_u64() {
                return Err(format!("integer {n} does not fit in 64 bits"));
            } else {
                n.as_f64()
                    .map(Value::Real)
                    .ok_or_else(|| format!("unrepresentable number {n}"))?
            }
        }
        Json::String(s) => Value::Text(s),
        Json::Object(map) if map.len() == 1 => {
            let (tag, inner) = map.into_iter().next().ok_or("empty value object")?;
            match (tag.as_str(), inner) {
                ("blob", Json::String(encoded)) => Value::Blob(decode_base64(&encoded)?),
                ("text", Json::String(encoded)) => {
                    let bytes = decode_base64(&encoded)?;
                    return Ok(match String::from_utf8(bytes) {
                        Ok(text) => SnapshotValue::Sql(Value::Text(text)),
                        Err(e) => SnapshotValue::RawText(e.into_bytes()),
                    });
                }
                ("real", Json::String(s)) => match s.as_str() {
                    "inf" => Value::Real(f64::INFINITY),
                    "-inf" => Value::Real(f64::NEG_INFINITY),
                    other => return Err(format!("unknown real literal {other:?}")),
                },
                (tag, _) => return Err(format!("unknown value tag {tag:?}")),
            }
        }
        Json::Object(_) => return Err("value objects must have exactly one key".to_string()),
        Json::Array(_) => return Err("arrays are not SQLite values".to_string()),
    };

    Ok(SnapshotValue::Sql(value))
}

fn decode_base64(encoded: &str) -> Result<Vec<u8>, String> {
    BASE64
        .decode(encoded.as_bytes())
        .map_err(|e| format!("invalid base64: {e}"))
}

/// Serde adapter storing `Vec<TableSnapshot>` as an order-preserving JSON
/// object keyed by table name.
mod table_map {
    use super::*;

    pub fn serialize<S: Serializer>(
        tables: &[TableSnapshot],
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(tables.len()))?;
        for table in tables {
            map.serialize_entry(&table.name, table)?;
        }
        map.end()
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Vec<TableSnapshot>, D::Error> {
        deserializer.deserialize_map(TablesVisitor)
    }

    struct TablesVisitor;

    impl<'de> Visitor<'de> for TablesVisitor {
        type Value = Vec<TableSnapshot>;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("an object mapping table names to tables")
        }

        fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
            let mut tables: Vec<TableSnapshot> = Vec::new();
            while let Some((name, mut table)) = access.next_entry::<String, TableSnapshot>()? {
                if tables.iter().any(|t| t.name == name) {
                    return Err(de::Error::custom(format!("duplicate table {name:?}")));
                }
                table.name = name;
                tables.push(table);
            }
            Ok(tables)
        }
    }
}

// ── Outcomes ──────────────────────────────────────────────────

/// Counts for a dump or restore.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SnapshotStats {
    /// Number of tables.
    pub tables: usize,
    /// Number of rows across all tables.
    pub rows: usize,
    /// Number of indexes, views and triggers.
    pub schema_objects: usize,
}

impl SnapshotStats {
    #[must_use]
    pub fn of(snapshot: &Snapshot) -> Self {
        Self {
            tables: snapshot.tables.len(),
            rows: snapshot.row_count(),
            schema_objects: snapshot.schema.len(),
        }
    }
}

/// What a dump did with the snapshot file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum DumpOutcome {
    /// The snapshot file was (re)written.
    Written(SnapshotStats),
    /// The rendered snapshot matched the file byte for byte; nothing written.
    Unchanged(SnapshotStats),
    /// The dump was skipped: nothing changed since the restore, or dumping
    /// is disabled for this session.
    Skipped,
}

impl DumpOutcome {
    /// Returns true if the snapshot file was written.
    #[must_use]
    pub fn wrote(&self) -> bool {
        matches!(self, Self::Written(_))
    }
}

/// Relationship between a database and its snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncState {
    /// Snapshot content matches the database.
    InSync,
    /// Contents differ and the snapshot was modified more recently.
    SnapshotNewer,
    /// Contents differ and the database was modified more recently.
    DatabaseNewer,
    /// Only the database exists.
    SnapshotMissing,
    /// Only the snapshot exists.
    DatabaseMissing,
    /// Neither file exists.
    Empty,
}

impl fmt::Display for SyncState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::InSync => "in sync",
            Self::SnapshotNewer => "snapshot is newer than database",
            Self::DatabaseNewer => "database is newer than snapshot",
            Self::SnapshotMissing => "snapshot does not exist yet",
            Self::DatabaseMissing => "database does not exist yet",
            Self::Empty => "neither database nor snapshot exists",
        };
        f.write_str(text)
    }
}

/// Sync status information, as shown by `jsqlon status`.
#[derive(Debug, Clone, Serialize)]
pub struct SyncStatus {
    pub database: String,
    pub snapshot: String,
    pub state: SyncState,
    /// Modification time of the database file (RFC 3339).
    pub database_modified: Option<String>,
    /// Modification time of the snapshot file (RFC 3339).
    pub snapshot_modified: Option<String>,
    /// Content hash of the database rendered as a snapshot.
    pub database_hash: Option<String>,
    /// Content hash of the snapshot file, after normalizing its layout.
    pub snapshot_hash: Option<String>,
}
