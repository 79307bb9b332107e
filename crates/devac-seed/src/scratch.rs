//! Scratch relational connection used while mutating or querying a seed.
//!
//! Partitions are loaded into in-memory SQLite tables created from the
//! declarative schema, mutated or queried as SQL, and dumped back to row
//! objects in insertion order so re-encoding stays deterministic.

use devac_core::error::StorageError;
use devac_core::schema::{ColumnType, Partition};
use rusqlite::Connection;
use rusqlite::types::Value as SqlValue;
use serde_json::Value;

fn relational(e: rusqlite::Error) -> StorageError {
    StorageError::Relational(Box::new(e))
}

/// Escape a string for inclusion in generated SQL: single quotes doubled,
/// wrapped in single quotes.
pub fn sql_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

/// Escape a LIKE pattern fragment: quote-doubling plus `%`/`_` escaping.
pub fn like_fragment(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

/// Tabular result of an ad-hoc SQL query.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl QueryResult {
    /// Rows as objects keyed by column name.
    pub fn objects(&self) -> Vec<Value> {
        self.rows
            .iter()
            .map(|row| {
                let map = self
                    .columns
                    .iter()
                    .cloned()
                    .zip(row.iter().cloned())
                    .collect();
                Value::Object(map)
            })
            .collect()
    }
}

/// An in-memory SQLite connection holding partition mirrors.
pub struct Scratch {
    conn: Connection,
}

impl Scratch {
    pub fn open() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory().map_err(relational)?;
        Ok(Self { conn })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Create a table for a partition and bulk-insert its rows.
    pub fn load(
        &mut self,
        table: &str,
        partition: Partition,
        rows: &[Value],
    ) -> Result<(), StorageError> {
        self.conn
            .execute_batch(&partition.create_table_sql(table))
            .map_err(relational)?;

        let columns = partition.columns();
        let placeholders = vec!["?"; columns.len()].join(", ");
        let insert = format!(
            "INSERT INTO {table} ({}) VALUES ({placeholders})",
            partition.column_names().join(", ")
        );

        let tx = self.conn.transaction().map_err(relational)?;
        {
            let mut stmt = tx.prepare_cached(&insert).map_err(relational)?;
            for row in rows {
                let params: Vec<SqlValue> = columns
                    .iter()
                    .map(|cdef| {
                        let cell = row.get(cdef.name).unwrap_or(&Value::Null);
                        cell_to_sql(cdef.ty, cell)
                    })
                    .collect();
                stmt.execute(rusqlite::params_from_iter(params))
                    .map_err(relational)?;
            }
        }
        tx.commit().map_err(relational)?;
        Ok(())
    }

    /// Execute a mutating statement, returning affected row count.
    pub fn execute<P: rusqlite::Params>(&self, sql: &str, params: P) -> Result<usize, StorageError> {
        self.conn.execute(sql, params).map_err(relational)
    }

    /// Dump a partition mirror back to row objects in insertion order.
    pub fn dump(&self, table: &str, partition: Partition) -> Result<Vec<Value>, StorageError> {
        let sql = format!(
            "SELECT {} FROM {table} ORDER BY rowid",
            partition.column_names().join(", ")
        );
        self.dump_sql(&sql, partition)
    }

    /// Dump the result of an arbitrary SELECT over one partition's columns.
    /// The statement must select the partition's columns in canonical order.
    pub fn dump_sql(&self, sql: &str, partition: Partition) -> Result<Vec<Value>, StorageError> {
        let columns = partition.columns();
        let mut stmt = self.conn.prepare(sql).map_err(relational)?;
        let mut rows = stmt.query([]).map_err(relational)?;

        let mut out = Vec::new();
        while let Some(row) = rows.next().map_err(relational)? {
            let mut map = serde_json::Map::new();
            for (i, cdef) in columns.iter().enumerate() {
                let cell = sql_to_cell(cdef.ty, row, i)?;
                if !cell.is_null() {
                    map.insert(cdef.name.to_string(), cell);
                }
            }
            out.push(Value::Object(map));
        }
        Ok(out)
    }

    /// Run an arbitrary read query and collect a tabular result.
    pub fn query(&self, sql: &str) -> Result<QueryResult, StorageError> {
        query_connection(&self.conn, sql)
    }
}

/// Run a read query against any connection, collecting a tabular result.
pub fn query_connection(conn: &Connection, sql: &str) -> Result<QueryResult, StorageError> {
    let mut stmt = conn.prepare(sql).map_err(relational)?;
    let columns: Vec<String> = stmt.column_names().iter().map(|s| s.to_string()).collect();
    let column_count = columns.len();

    let mut rows = stmt.query([]).map_err(relational)?;
    let mut out = Vec::new();
    while let Some(row) = rows.next().map_err(relational)? {
        let mut values = Vec::with_capacity(column_count);
        for i in 0..column_count {
            let value = match row.get_ref(i).map_err(relational)? {
                rusqlite::types::ValueRef::Null => Value::Null,
                rusqlite::types::ValueRef::Integer(n) => Value::from(n),
                rusqlite::types::ValueRef::Real(f) => {
                    serde_json::Number::from_f64(f).map_or(Value::Null, Value::Number)
                }
                rusqlite::types::ValueRef::Text(t) => {
                    Value::String(String::from_utf8_lossy(t).into_owned())
                }
                rusqlite::types::ValueRef::Blob(b) => {
                    Value::String(format!("<blob {} bytes>", b.len()))
                }
            };
            values.push(value);
        }
        out.push(values);
    }
    Ok(QueryResult { columns, rows: out })
}

fn cell_to_sql(ty: ColumnType, cell: &Value) -> SqlValue {
    match (ty, cell) {
        (_, Value::Null) => SqlValue::Null,
        (ColumnType::Json, v) => SqlValue::Text(v.to_string()),
        (ColumnType::Text, Value::String(s)) => SqlValue::Text(s.clone()),
        (ColumnType::Text, v) => SqlValue::Text(v.to_string()),
        (ColumnType::Int, Value::Number(n)) => SqlValue::Integer(n.as_i64().unwrap_or(0)),
        (ColumnType::Int, Value::Bool(b)) => SqlValue::Integer(i64::from(*b)),
        (ColumnType::Int, _) => SqlValue::Integer(0),
        (ColumnType::Bool, Value::Bool(b)) => SqlValue::Integer(i64::from(*b)),
        (ColumnType::Bool, Value::Number(n)) => {
            SqlValue::Integer(i64::from(n.as_i64().unwrap_or(0) != 0))
        }
        (ColumnType::Bool, _) => SqlValue::Integer(0),
    }
}

fn sql_to_cell(ty: ColumnType, row: &rusqlite::Row<'_>, i: usize) -> Result<Value, StorageError> {
    let cell = match ty {
        ColumnType::Text => row
            .get::<_, Option<String>>(i)
            .map_err(relational)?
            .map_or(Value::Null, Value::String),
        ColumnType::Json => match row.get::<_, Option<String>>(i).map_err(relational)? {
            Some(raw) => {
                serde_json::from_str(&raw).map_err(|e| StorageError::CorruptPartition {
                    path: "<scratch>".into(),
                    detail: format!("invalid JSON cell: {e}"),
                })?
            }
            None => Value::Null,
        },
        ColumnType::Int => row
            .get::<_, Option<i64>>(i)
            .map_err(relational)?
            .map_or(Value::Null, Value::from),
        ColumnType::Bool => row
            .get::<_, Option<bool>>(i)
            .map_err(relational)?
            .map_or(Value::Null, Value::Bool),
    };
    Ok(cell)
}
