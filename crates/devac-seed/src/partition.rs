//! Generic Parquet encode/decode for partition rows, driven entirely by the
//! declarative column schema.
//!
//! Rows travel as JSON objects keyed by column name (the serde shape of the
//! model types). Compression is pinned to `UNCOMPRESSED` so re-encoding
//! unchanged rows is byte-identical.

use devac_core::error::StorageError;
use devac_core::schema::{ColumnDef, ColumnType, Partition};
use parquet::basic::Compression;
use parquet::data_type::{BoolType, ByteArray, ByteArrayType, Int64Type};
use parquet::file::properties::WriterProperties;
use parquet::file::reader::FileReader;
use parquet::file::reader::SerializedFileReader;
use parquet::file::writer::SerializedFileWriter;
use parquet::schema::parser::parse_message_type;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;

fn columnar_err(path: &Path, e: impl std::error::Error + Send + Sync + 'static) -> StorageError {
    StorageError::Columnar {
        path: path.to_path_buf(),
        source: Box::new(e),
    }
}

/// Encode rows into Parquet bytes in canonical column order.
pub fn encode_rows(partition: Partition, rows: &[Value]) -> Result<Vec<u8>, StorageError> {
    let virt = Path::new(partition.file_name());
    let schema = Arc::new(
        parse_message_type(&partition.parquet_message_type()).map_err(|e| columnar_err(virt, e))?,
    );
    let props = Arc::new(
        WriterProperties::builder()
            .set_compression(Compression::UNCOMPRESSED)
            .set_created_by("devac".to_string())
            .build(),
    );

    let mut buf = Vec::new();
    let mut writer = SerializedFileWriter::new(&mut buf, schema, props)
        .map_err(|e| columnar_err(virt, e))?;
    let mut row_group = writer.next_row_group().map_err(|e| columnar_err(virt, e))?;

    let columns = partition.columns();
    let mut idx = 0usize;
    while let Some(mut col_writer) = row_group.next_column().map_err(|e| columnar_err(virt, e))? {
        let cdef = &columns[idx];
        match cdef.ty {
            ColumnType::Text | ColumnType::Json => {
                let (values, defs) = collect_strings(rows, cdef);
                col_writer
                    .typed::<ByteArrayType>()
                    .write_batch(&values, defs.as_deref(), None)
                    .map_err(|e| columnar_err(virt, e))?;
            }
            ColumnType::Int => {
                let (values, defs) = collect_ints(rows, cdef);
                col_writer
                    .typed::<Int64Type>()
                    .write_batch(&values, defs.as_deref(), None)
                    .map_err(|e| columnar_err(virt, e))?;
            }
            ColumnType::Bool => {
                let (values, defs) = collect_bools(rows, cdef);
                col_writer
                    .typed::<BoolType>()
                    .write_batch(&values, defs.as_deref(), None)
                    .map_err(|e| columnar_err(virt, e))?;
            }
        }
        col_writer.close().map_err(|e| columnar_err(virt, e))?;
        idx += 1;
    }
    row_group.close().map_err(|e| columnar_err(virt, e))?;
    writer.close().map_err(|e| columnar_err(virt, e))?;
    Ok(buf)
}

/// Read all rows of a partition file. A missing file reads as empty.
pub fn read_rows(path: &Path, partition: Partition) -> Result<Vec<Value>, StorageError> {
    let file = match std::fs::File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(StorageError::io(path, e)),
    };
    let reader = SerializedFileReader::new(file).map_err(|e| columnar_err(path, e))?;
    let iter = reader.get_row_iter(None).map_err(|e| columnar_err(path, e))?;

    let mut rows = Vec::new();
    for row in iter {
        let row = row.map_err(|e| columnar_err(path, e))?;
        let value = row.to_json_value();
        rows.push(decode_row(path, partition, value)?);
    }
    Ok(rows)
}

/// Undo storage encoding: parse JSON columns, drop nulls so serde defaults
/// apply on deserialization.
fn decode_row(path: &Path, partition: Partition, value: Value) -> Result<Value, StorageError> {
    let Value::Object(mut map) = value else {
        return Err(StorageError::CorruptPartition {
            path: path.to_path_buf(),
            detail: "row is not an object".to_string(),
        });
    };
    for cdef in partition.columns() {
        if cdef.ty == ColumnType::Json
            && let Some(Value::String(raw)) = map.get(cdef.name)
        {
            let parsed =
                serde_json::from_str(raw).map_err(|e| StorageError::CorruptPartition {
                    path: path.to_path_buf(),
                    detail: format!("column {} holds invalid JSON: {e}", cdef.name),
                })?;
            map.insert(cdef.name.to_string(), parsed);
        }
    }
    map.retain(|_, v| !v.is_null());
    Ok(Value::Object(map))
}

/// Serialize model values into row objects.
pub fn to_rows<T: Serialize>(items: &[T]) -> Result<Vec<Value>, StorageError> {
    items
        .iter()
        .map(|item| {
            serde_json::to_value(item).map_err(|e| StorageError::CorruptPartition {
                path: "<memory>".into(),
                detail: e.to_string(),
            })
        })
        .collect()
}

/// Deserialize row objects back into model values.
pub fn from_rows<T: DeserializeOwned>(rows: Vec<Value>) -> Result<Vec<T>, StorageError> {
    rows.into_iter()
        .map(|row| {
            serde_json::from_value(row).map_err(|e| StorageError::CorruptPartition {
                path: "<memory>".into(),
                detail: e.to_string(),
            })
        })
        .collect()
}

fn collect_strings(rows: &[Value], cdef: &ColumnDef) -> (Vec<ByteArray>, Option<Vec<i16>>) {
    let mut values = Vec::with_capacity(rows.len());
    let mut defs = Vec::with_capacity(rows.len());
    for row in rows {
        let cell = row.get(cdef.name).unwrap_or(&Value::Null);
        let text = match (cdef.ty, cell) {
            (_, Value::Null) => None,
            (ColumnType::Json, v) => Some(v.to_string()),
            (_, Value::String(s)) => Some(s.clone()),
            (_, v) => Some(v.to_string()),
        };
        match text {
            Some(s) => {
                defs.push(1);
                values.push(ByteArray::from(s.into_bytes()));
            }
            None if cdef.nullable => defs.push(0),
            None => {
                // Required column with no value: store the type's empty form.
                defs.push(1);
                let empty = if cdef.ty == ColumnType::Json { "null" } else { "" };
                values.push(ByteArray::from(empty));
            }
        }
    }
    if cdef.nullable {
        (values, Some(defs))
    } else {
        (values, None)
    }
}

fn collect_ints(rows: &[Value], cdef: &ColumnDef) -> (Vec<i64>, Option<Vec<i16>>) {
    let mut values = Vec::with_capacity(rows.len());
    let mut defs = Vec::with_capacity(rows.len());
    for row in rows {
        let cell = row.get(cdef.name).unwrap_or(&Value::Null);
        let n = match cell {
            Value::Number(n) => n.as_i64(),
            Value::Bool(b) => Some(i64::from(*b)),
            _ => None,
        };
        match n {
            Some(n) => {
                defs.push(1);
                values.push(n);
            }
            None if cdef.nullable => defs.push(0),
            None => {
                defs.push(1);
                values.push(0);
            }
        }
    }
    if cdef.nullable {
        (values, Some(defs))
    } else {
        (values, None)
    }
}

fn collect_bools(rows: &[Value], cdef: &ColumnDef) -> (Vec<bool>, Option<Vec<i16>>) {
    let mut values = Vec::with_capacity(rows.len());
    let mut defs = Vec::with_capacity(rows.len());
    for row in rows {
        let cell = row.get(cdef.name).unwrap_or(&Value::Null);
        let b = match cell {
            Value::Bool(b) => Some(*b),
            Value::Number(n) => n.as_i64().map(|n| n != 0),
            _ => None,
        };
        match b {
            Some(b) => {
                defs.push(1);
                values.push(b);
            }
            None if cdef.nullable => defs.push(0),
            None => {
                defs.push(1);
                values.push(false);
            }
        }
    }
    if cdef.nullable {
        (values, Some(defs))
    } else {
        (values, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use devac_core::model::{Edge, EdgeType};
    use tempfile::TempDir;

    fn edge(source: &str, target: &str) -> Edge {
        Edge {
            source_entity_id: source.to_string(),
            target_entity_id: target.to_string(),
            edge_type: EdgeType::Calls,
            source_file_path: "/src/a.ts".to_string(),
            source_line: 10,
            source_column: 4,
            properties: Default::default(),
            source_file_hash: "h1".to_string(),
            branch: "base".to_string(),
            is_deleted: false,
        }
    }

    #[test]
    fn encode_decode_roundtrip() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("edges.parquet");
        let edges = vec![edge("a", "b"), edge("a", "unresolved:Base")];

        let rows = to_rows(&edges).unwrap();
        let bytes = encode_rows(Partition::Edges, &rows).unwrap();
        std::fs::write(&path, &bytes).unwrap();

        let read = read_rows(&path, Partition::Edges).unwrap();
        let back: Vec<Edge> = from_rows(read).unwrap();
        assert_eq!(back, edges);
    }

    #[test]
    fn encoding_is_deterministic() {
        let rows = to_rows(&[edge("a", "b")]).unwrap();
        let first = encode_rows(Partition::Edges, &rows).unwrap();
        let second = encode_rows(Partition::Edges, &rows).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn missing_file_reads_empty() {
        let tmp = TempDir::new().unwrap();
        let rows = read_rows(&tmp.path().join("nodes.parquet"), Partition::Nodes).unwrap();
        assert!(rows.is_empty());
    }

    #[test]
    fn empty_partition_roundtrips() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("effects.parquet");
        let bytes = encode_rows(Partition::Effects, &[]).unwrap();
        std::fs::write(&path, &bytes).unwrap();
        let rows = read_rows(&path, Partition::Effects).unwrap();
        assert!(rows.is_empty());
    }
}
