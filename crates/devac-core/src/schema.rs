//! Declarative partition schema: one column-definition table per partition
//! from which the Parquet message type, SQL DDL, and canonical column order
//! all derive. Serialized rows must follow this exact column order.

use std::fmt::Write as _;

/// Current seed schema version, written to `meta.json`.
pub const SCHEMA_VERSION: u32 = 2;

/// Storage type of one column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    /// UTF-8 string (also carries RFC 3339 timestamps).
    Text,
    /// 64-bit signed integer.
    Int,
    Bool,
    /// JSON document stored as UTF-8 text; parsed back to a value on read.
    Json,
}

/// One column of a partition.
#[derive(Debug, Clone, Copy)]
pub struct ColumnDef {
    pub name: &'static str,
    pub ty: ColumnType,
    pub nullable: bool,
    pub primary_key: bool,
}

const fn col(name: &'static str, ty: ColumnType) -> ColumnDef {
    ColumnDef {
        name,
        ty,
        nullable: false,
        primary_key: false,
    }
}

const fn opt(name: &'static str, ty: ColumnType) -> ColumnDef {
    ColumnDef {
        name,
        ty,
        nullable: true,
        primary_key: false,
    }
}

const fn pk(name: &'static str, ty: ColumnType) -> ColumnDef {
    ColumnDef {
        name,
        ty,
        nullable: false,
        primary_key: true,
    }
}

use ColumnType::{Bool, Int, Json, Text};

const NODE_COLUMNS: &[ColumnDef] = &[
    pk("entity_id", Text),
    col("name", Text),
    col("qualified_name", Text),
    col("kind", Text),
    col("file_path", Text),
    col("start_line", Int),
    col("end_line", Int),
    col("start_column", Int),
    col("end_column", Int),
    col("is_exported", Bool),
    col("is_default_export", Bool),
    col("is_async", Bool),
    col("is_static", Bool),
    col("is_abstract", Bool),
    col("is_generator", Bool),
    col("visibility", Text),
    opt("type_signature", Text),
    opt("documentation", Text),
    col("decorators", Json),
    col("type_parameters", Json),
    col("properties", Json),
    col("source_file_hash", Text),
    col("branch", Text),
    col("is_deleted", Bool),
    col("updated_at", Text),
];

const EDGE_COLUMNS: &[ColumnDef] = &[
    col("source_entity_id", Text),
    col("target_entity_id", Text),
    col("edge_type", Text),
    col("source_file_path", Text),
    col("source_line", Int),
    col("source_column", Int),
    col("properties", Json),
    col("source_file_hash", Text),
    col("branch", Text),
    col("is_deleted", Bool),
];

const EXTERNAL_REF_COLUMNS: &[ColumnDef] = &[
    col("source_entity_id", Text),
    col("module_specifier", Text),
    col("imported_symbol", Text),
    opt("local_alias", Text),
    col("import_style", Text),
    col("is_type_only", Bool),
    col("is_reexport", Bool),
    opt("export_alias", Text),
    opt("target_entity_id", Text),
    col("is_resolved", Bool),
    col("source_file_path", Text),
    col("source_line", Int),
    col("source_column", Int),
    col("source_file_hash", Text),
    col("branch", Text),
    col("is_deleted", Bool),
];

const EFFECT_COLUMNS: &[ColumnDef] = &[
    pk("effect_id", Text),
    col("effect_type", Text),
    opt("timestamp", Text),
    col("source_entity_id", Text),
    col("source_file_path", Text),
    col("source_line", Int),
    col("source_column", Int),
    col("branch", Text),
    col("properties", Json),
    col("source_file_hash", Text),
    col("is_deleted", Bool),
    // FunctionCall
    opt("callee_name", Text),
    opt("callee_qualified_name", Text),
    opt("is_method_call", Bool),
    opt("is_async", Bool),
    opt("is_constructor", Bool),
    opt("argument_count", Int),
    opt("is_external", Bool),
    opt("external_module", Text),
    // Store / Retrieve
    opt("store_type", Text),
    opt("retrieve_type", Text),
    opt("operation", Text),
    opt("target_resource", Text),
    opt("source_resource", Text),
    opt("provider", Text),
    // Send
    opt("send_type", Text),
    opt("method", Text),
    opt("target", Text),
    opt("is_third_party", Bool),
    opt("service_name", Text),
    // Request / Response
    opt("route_pattern", Text),
    opt("status_code", Int),
    opt("content_type", Text),
    opt("framework", Text),
    // Condition / Loop / Group / ValidationResult / SeedUpdated / FileChanged
    opt("expression", Text),
    opt("loop_kind", Text),
    opt("group_name", Text),
    opt("group_members", Json),
    opt("validator", Text),
    opt("passed", Bool),
    opt("detail", Text),
    opt("package_path", Text),
    opt("file_count", Int),
    opt("change_kind", Text),
];

const FILE_HASH_COLUMNS: &[ColumnDef] = &[
    pk("file_path", Text),
    col("source_file_hash", Text),
    col("parse_time_ms", Int),
    opt("parsed_at", Text),
    col("is_deleted", Bool),
];

/// The five partitions of a seed branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Partition {
    Nodes,
    Edges,
    ExternalRefs,
    Effects,
    FileHashes,
}

impl Partition {
    pub const ALL: [Partition; 5] = [
        Partition::Nodes,
        Partition::Edges,
        Partition::ExternalRefs,
        Partition::Effects,
        Partition::FileHashes,
    ];

    /// Logical relation name (also the reader's view name).
    pub fn table_name(&self) -> &'static str {
        match self {
            Self::Nodes => "nodes",
            Self::Edges => "edges",
            Self::ExternalRefs => "external_refs",
            Self::Effects => "effects",
            Self::FileHashes => "file_hashes",
        }
    }

    /// On-disk file name within a branch directory.
    pub fn file_name(&self) -> &'static str {
        match self {
            Self::Nodes => "nodes.parquet",
            Self::Edges => "edges.parquet",
            Self::ExternalRefs => "external_refs.parquet",
            Self::Effects => "effects.parquet",
            Self::FileHashes => "file_hashes.parquet",
        }
    }

    pub fn columns(&self) -> &'static [ColumnDef] {
        match self {
            Self::Nodes => NODE_COLUMNS,
            Self::Edges => EDGE_COLUMNS,
            Self::ExternalRefs => EXTERNAL_REF_COLUMNS,
            Self::Effects => EFFECT_COLUMNS,
            Self::FileHashes => FILE_HASH_COLUMNS,
        }
    }

    /// Canonical ordered column names.
    pub fn column_names(&self) -> Vec<&'static str> {
        self.columns().iter().map(|c| c.name).collect()
    }

    /// Parquet message type in canonical column order.
    pub fn parquet_message_type(&self) -> String {
        let mut out = format!("message {} {{\n", self.table_name());
        for c in self.columns() {
            let repetition = if c.nullable { "optional" } else { "required" };
            let physical = match c.ty {
                ColumnType::Text | ColumnType::Json => "BYTE_ARRAY",
                ColumnType::Int => "INT64",
                ColumnType::Bool => "BOOLEAN",
            };
            let annotation = match c.ty {
                ColumnType::Text | ColumnType::Json => " (STRING)",
                _ => "",
            };
            let _ = writeln!(out, "  {repetition} {physical} {}{annotation};", c.name);
        }
        out.push('}');
        out
    }

    /// `CREATE TABLE` DDL for a relational mirror of this partition.
    ///
    /// The declared primary key is deliberately not enforced here: feature
    /// branches keep superseded row versions alongside live ones (`is_deleted`
    /// markers), so the mirror must accept key repeats. The key remains part
    /// of the column contract for consumers of the Parquet layout.
    pub fn create_table_sql(&self, table: &str) -> String {
        let mut parts = Vec::new();
        for c in self.columns() {
            let sql_ty = match c.ty {
                ColumnType::Text | ColumnType::Json => "TEXT",
                ColumnType::Int => "INTEGER",
                ColumnType::Bool => "BOOLEAN",
            };
            let null = if c.nullable { "" } else { " NOT NULL" };
            parts.push(format!("{} {sql_ty}{null}", c.name));
        }
        format!("CREATE TABLE {table} ({})", parts.join(", "))
    }

    /// Declared primary-key columns, in canonical order.
    pub fn primary_key(&self) -> Vec<&'static str> {
        self.columns()
            .iter()
            .filter(|c| c.primary_key)
            .map(|c| c.name)
            .collect()
    }
}
