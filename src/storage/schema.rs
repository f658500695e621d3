//! Catalog introspection.
//!
//! Everything a dump needs to know about the database's shape comes from
//! `sqlite_master` and `pragma_table_xinfo`. Internal `sqlite_*` tables are
//! never reported.

use rusqlite::{Connection, Result};
use tracing::warn;

use crate::snapshot::ColumnSpec;

/// A user table as recorded in `sqlite_master`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableInfo {
    pub name: String,
    /// The `CREATE TABLE` statement.
    pub sql: Option<String>,
    pub without_rowid: bool,
}

/// List user tables in creation order.
///
/// Virtual tables are skipped with a warning: their content lives in shadow
/// tables managed by the owning module.
///
/// # Errors
///
/// Returns an error if the catalog query fails.
pub fn user_tables(conn: &Connection) -> Result<Vec<TableInfo>> {
    let mut stmt = conn.prepare(
        "SELECT name, sql FROM sqlite_master
         WHERE type = 'table' AND name NOT LIKE 'sqlite\\_%' ESCAPE '\\'
         ORDER BY rowid",
    )?;

    let rows = stmt.query_map([], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, Option<String>>(1)?))
    })?;

    let mut tables = Vec::new();
    for row in rows {
        let (name, sql) = row?;
        let normalized = sql
            .as_deref()
            .map(|s| s.split_whitespace().collect::<Vec<_>>().join(" ").to_ascii_uppercase())
            .unwrap_or_default();

        if normalized.starts_with("CREATE VIRTUAL TABLE") {
            warn!(table = %name, "Skipping virtual table");
            continue;
        }

        tables.push(TableInfo {
            without_rowid: normalized.contains("WITHOUT ROWID"),
            name,
            sql,
        });
    }

    Ok(tables)
}

/// Returns true if the database holds at least one user table.
///
/// # Errors
///
/// Returns an error if the catalog query fails.
pub fn has_user_tables(conn: &Connection) -> Result<bool> {
    conn.query_row(
        "SELECT EXISTS (SELECT 1 FROM sqlite_master
         WHERE type = 'table' AND name NOT LIKE 'sqlite\\_%' ESCAPE '\\')",
        [],
        |row| row.get(0),
    )
}

/// Stored columns of a table in schema order.
///
/// Generated columns are left out: they cannot be inserted and are
/// recomputed from the other columns.
///
/// # Errors
///
/// Returns an error if the pragma query fails.
pub fn table_columns(conn: &Connection, table: &str) -> Result<Vec<ColumnSpec>> {
    let mut stmt = conn.prepare(
        "SELECT name, type, \"notnull\", dflt_value, pk, hidden
         FROM pragma_table_xinfo(?1) ORDER BY cid",
    )?;

    let rows = stmt.query_map([table], |row| {
        let hidden: i64 = row.get(5)?;
        Ok((
            hidden,
            ColumnSpec {
                name: row.get(0)?,
                datatype: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
                not_null: row.get(2)?,
                default: row.get(3)?,
                primary_key: row.get(4)?,
                ..ColumnSpec::default()
            },
        ))
    })?;

    let mut columns = Vec::new();
    for row in rows {
        let (hidden, column) = row?;
        if hidden == 0 {
            columns.push(column);
        }
    }
    Ok(columns)
}

/// SQL of indexes, views and triggers in creation order.
///
/// Automatic indexes (for `UNIQUE` and `PRIMARY KEY` constraints) have no SQL
/// and are recreated with their table.
///
/// # Errors
///
/// Returns an error if the catalog query fails.
pub fn schema_objects(conn: &Connection) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT sql FROM sqlite_master
         WHERE type IN ('index', 'view', 'trigger') AND sql IS NOT NULL
         ORDER BY rowid",
    )?;
    stmt.query_map([], |row| row.get(0))?.collect()
}

/// `ORDER BY` clause giving a stable row order for a table.
///
/// Rowid tables are read in rowid order. `WITHOUT ROWID` tables are read in
/// primary key order.
#[must_use]
pub fn stable_order(table: &TableInfo, columns: &[ColumnSpec]) -> String {
    if table.without_rowid {
        let mut keys: Vec<&ColumnSpec> = columns.iter().filter(|c| c.primary_key > 0).collect();
        keys.sort_by_key(|c| c.primary_key);
        let keys: Vec<String> = keys.iter().map(|c| quote_ident(&c.name)).collect();
        return format!("ORDER BY {}", keys.join(", "));
    }

    // A user column may shadow `rowid`; fall back to its aliases.
    let alias = ["rowid", "_rowid_", "oid"]
        .into_iter()
        .find(|alias| !columns.iter().any(|c| c.name.eq_ignore_ascii_case(alias)))
        .unwrap_or("rowid");
    format!("ORDER BY {alias}")
}

/// Quote an identifier for use in generated SQL.
#[must_use]
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE b (id INTEGER PRIMARY KEY AUTOINCREMENT, name TEXT NOT NULL DEFAULT 'x');
             CREATE TABLE a (k TEXT, v BLOB, PRIMARY KEY (v, k)) WITHOUT ROWID;
             CREATE TABLE g (x INTEGER, y INTEGER GENERATED ALWAYS AS (x * 2) VIRTUAL);
             CREATE INDEX idx_b_name ON b (name);
             CREATE VIEW v_b AS SELECT name FROM b;",
        )
        .unwrap();
        conn
    }

    #[test]
    fn test_user_tables_in_creation_order() {
        let conn = conn();
        let tables = user_tables(&conn).unwrap();
        let names: Vec<_> = tables.iter().map(|t| t.name.as_str()).collect();

        // sqlite_sequence (from AUTOINCREMENT) is internal.
        assert_eq!(names, ["b", "a", "g"]);
        assert!(!tables[0].without_rowid);
        assert!(tables[1].without_rowid);
    }

    #[test]
    fn test_has_user_tables() {
        let empty = Connection::open_in_memory().unwrap();
        assert!(!has_user_tables(&empty).unwrap());
        assert!(has_user_tables(&conn()).unwrap());
    }

    #[test]
    fn test_table_columns() {
        let conn = conn();
        let columns = table_columns(&conn, "b").unwrap();

        assert_eq!(columns.len(), 2);
        assert_eq!(columns[0].name, "id");
        assert_eq!(columns[0].datatype, "INTEGER");
        assert_eq!(columns[0].primary_key, 1);
        assert!(columns[1].not_null);
        assert_eq!(columns[1].default.as_deref(), Some("'x'"));
    }

    #[test]
    fn test_generated_columns_are_skipped() {
        let conn = conn();
        let columns = table_columns(&conn, "g").unwrap();
        let names: Vec<_> = columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["x"]);
    }

    #[test]
    fn test_schema_objects() {
        let objects = schema_objects(&conn()).unwrap();
        assert_eq!(objects.len(), 2);
        assert!(objects[0].starts_with("CREATE INDEX idx_b_name"));
        assert!(objects[1].starts_with("CREATE VIEW v_b"));
    }

    #[test]
    fn test_stable_order() {
        let conn = conn();
        let tables = user_tables(&conn).unwrap();

        let b = table_columns(&conn, "b").unwrap();
        assert_eq!(stable_order(&tables[0], &b), "ORDER BY rowid");

        let a = table_columns(&conn, "a").unwrap();
        assert_eq!(stable_order(&tables[1], &a), "ORDER BY \"v\", \"k\"");

        let shadowed = vec![ColumnSpec {
            name: "rowid".into(),
            ..ColumnSpec::default()
        }];
        assert_eq!(stable_order(&tables[0], &shadowed), "ORDER BY _rowid_");
    }

    #[test]
    fn test_quote_ident() {
        assert_eq!(quote_ident("Table2"), "\"Table2\"");
        assert_eq!(quote_ident("we\"ird"), "\"we\"\"ird\"");
    }
}
