//! Graph data model: nodes, edges, import references, and semantic effects.
//!
//! All kinds are closed sum types matched exhaustively. Rows persist to the
//! columnar partitions described in [`crate::schema`]; serde field names are
//! the column names.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Free-form per-row property bag. BTreeMap keeps serialized output stable.
pub type Properties = BTreeMap<String, serde_json::Value>;

/// The kind of a graph node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Module,
    Class,
    Interface,
    Function,
    Method,
    Property,
    Variable,
    Constant,
    Parameter,
    Type,
    Decorator,
    Story,
    Unknown,
}

impl NodeKind {
    /// Stable lowercase name, as embedded in entity IDs and partition rows.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Module => "module",
            Self::Class => "class",
            Self::Interface => "interface",
            Self::Function => "function",
            Self::Method => "method",
            Self::Property => "property",
            Self::Variable => "variable",
            Self::Constant => "constant",
            Self::Parameter => "parameter",
            Self::Type => "type",
            Self::Decorator => "decorator",
            Self::Story => "story",
            Self::Unknown => "unknown",
        }
    }

    /// Parse from the stable name. Unrecognized names map to `Unknown`.
    pub fn parse(s: &str) -> Self {
        match s {
            "module" => Self::Module,
            "class" => Self::Class,
            "interface" => Self::Interface,
            "function" => Self::Function,
            "method" => Self::Method,
            "property" => Self::Property,
            "variable" => Self::Variable,
            "constant" => Self::Constant,
            "parameter" => Self::Parameter,
            "type" => Self::Type,
            "decorator" => Self::Decorator,
            "story" => Self::Story,
            _ => Self::Unknown,
        }
    }
}

/// Member visibility.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    #[default]
    Public,
    Protected,
    Private,
}

/// One graph vertex.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub entity_id: String,
    pub name: String,
    pub qualified_name: String,
    pub kind: NodeKind,
    pub file_path: String,
    pub start_line: u32,
    pub end_line: u32,
    pub start_column: u32,
    pub end_column: u32,
    #[serde(default)]
    pub is_exported: bool,
    #[serde(default)]
    pub is_default_export: bool,
    #[serde(default)]
    pub is_async: bool,
    #[serde(default)]
    pub is_static: bool,
    #[serde(default)]
    pub is_abstract: bool,
    #[serde(default)]
    pub is_generator: bool,
    #[serde(default)]
    pub visibility: Visibility,
    #[serde(default)]
    pub type_signature: Option<String>,
    #[serde(default)]
    pub documentation: Option<String>,
    /// Decorator names in source order.
    #[serde(default)]
    pub decorators: Vec<String>,
    #[serde(default)]
    pub type_parameters: Vec<String>,
    #[serde(default)]
    pub properties: Properties,
    #[serde(default)]
    pub source_file_hash: String,
    #[serde(default)]
    pub branch: String,
    #[serde(default)]
    pub is_deleted: bool,
    pub updated_at: DateTime<Utc>,
}

impl Node {
    /// A node with the given identity and location, everything else defaulted.
    pub fn new(
        entity_id: impl Into<String>,
        name: impl Into<String>,
        qualified_name: impl Into<String>,
        kind: NodeKind,
        file_path: impl Into<String>,
    ) -> Self {
        Self {
            entity_id: entity_id.into(),
            name: name.into(),
            qualified_name: qualified_name.into(),
            kind,
            file_path: file_path.into(),
            start_line: 0,
            end_line: 0,
            start_column: 0,
            end_column: 0,
            is_exported: false,
            is_default_export: false,
            is_async: false,
            is_static: false,
            is_abstract: false,
            is_generator: false,
            visibility: Visibility::Public,
            type_signature: None,
            documentation: None,
            decorators: Vec::new(),
            type_parameters: Vec::new(),
            properties: Properties::new(),
            source_file_hash: String::new(),
            branch: String::new(),
            is_deleted: false,
            updated_at: Utc::now(),
        }
    }
}

/// The kind of a directed relationship between two nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EdgeType {
    Contains,
    Extends,
    Implements,
    Calls,
    References,
    Decorates,
    ParameterOf,
    Returns,
    Throws,
}

impl EdgeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Contains => "CONTAINS",
            Self::Extends => "EXTENDS",
            Self::Implements => "IMPLEMENTS",
            Self::Calls => "CALLS",
            Self::References => "REFERENCES",
            Self::Decorates => "DECORATES",
            Self::ParameterOf => "PARAMETER_OF",
            Self::Returns => "RETURNS",
            Self::Throws => "THROWS",
        }
    }
}

/// One directed relationship. The target may carry the textual
/// `unresolved:<symbol>` sentinel until a resolver pass rewrites it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub source_entity_id: String,
    pub target_entity_id: String,
    pub edge_type: EdgeType,
    pub source_file_path: String,
    pub source_line: u32,
    pub source_column: u32,
    #[serde(default)]
    pub properties: Properties,
    #[serde(default)]
    pub source_file_hash: String,
    #[serde(default)]
    pub branch: String,
    #[serde(default)]
    pub is_deleted: bool,
}

/// How a symbol was imported.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ImportStyle {
    #[default]
    Named,
    Default,
    Namespace,
    SideEffect,
}

/// One import binding from a module specifier into a file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExternalRef {
    /// The importing entity (usually the file's module node).
    pub source_entity_id: String,
    pub module_specifier: String,
    /// Imported symbol name, or `*` for namespace imports.
    pub imported_symbol: String,
    #[serde(default)]
    pub local_alias: Option<String>,
    #[serde(default)]
    pub import_style: ImportStyle,
    #[serde(default)]
    pub is_type_only: bool,
    #[serde(default)]
    pub is_reexport: bool,
    #[serde(default)]
    pub export_alias: Option<String>,
    /// Resolved lazily; `Some` iff `is_resolved`.
    #[serde(default)]
    pub target_entity_id: Option<String>,
    #[serde(default)]
    pub is_resolved: bool,
    pub source_file_path: String,
    pub source_line: u32,
    pub source_column: u32,
    #[serde(default)]
    pub source_file_hash: String,
    #[serde(default)]
    pub branch: String,
    #[serde(default)]
    pub is_deleted: bool,
}

/// Storage backend classification for Store/Retrieve effects.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreType {
    Database,
    Cache,
    File,
    Queue,
    #[default]
    External,
}

impl StoreType {
    /// Parse a catalog value, normalizing anything unrecognized to the default.
    pub fn parse_lenient(s: &str) -> Self {
        match s {
            "database" => Self::Database,
            "cache" => Self::Cache,
            "file" => Self::File,
            "queue" => Self::Queue,
            _ => Self::External,
        }
    }
}

/// Transport classification for Send effects.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SendType {
    #[default]
    Http,
    Grpc,
    Queue,
    Email,
    Webhook,
    Websocket,
}

impl SendType {
    /// Parse a catalog value, normalizing anything unrecognized to the default.
    pub fn parse_lenient(s: &str) -> Self {
        match s {
            "grpc" => Self::Grpc,
            "queue" => Self::Queue,
            "email" => Self::Email,
            "webhook" => Self::Webhook,
            "websocket" => Self::Websocket,
            _ => Self::Http,
        }
    }
}

/// Fields shared by every effect variant.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EffectBase {
    pub effect_id: String,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    pub source_entity_id: String,
    pub source_file_path: String,
    pub source_line: u32,
    pub source_column: u32,
    #[serde(default)]
    pub branch: String,
    #[serde(default)]
    pub properties: Properties,
    #[serde(default)]
    pub source_file_hash: String,
    #[serde(default)]
    pub is_deleted: bool,
}

/// One semantically-tagged operation.
///
/// Serializes flat (base fields inline) with an `effect_type` discriminant,
/// which is exactly the shape of an effects-partition row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "effect_type")]
pub enum Effect {
    FunctionCall {
        #[serde(flatten)]
        base: EffectBase,
        callee_name: String,
        callee_qualified_name: String,
        #[serde(default)]
        is_method_call: bool,
        #[serde(default)]
        is_async: bool,
        #[serde(default)]
        is_constructor: bool,
        #[serde(default)]
        argument_count: u32,
        #[serde(default)]
        is_external: bool,
        #[serde(default)]
        external_module: Option<String>,
    },
    Store {
        #[serde(flatten)]
        base: EffectBase,
        store_type: StoreType,
        operation: String,
        target_resource: String,
        #[serde(default)]
        provider: Option<String>,
    },
    Retrieve {
        #[serde(flatten)]
        base: EffectBase,
        retrieve_type: StoreType,
        operation: String,
        source_resource: String,
        #[serde(default)]
        provider: Option<String>,
    },
    Send {
        #[serde(flatten)]
        base: EffectBase,
        send_type: SendType,
        #[serde(default)]
        method: Option<String>,
        target: String,
        #[serde(default)]
        is_third_party: bool,
        #[serde(default)]
        service_name: Option<String>,
    },
    Request {
        #[serde(flatten)]
        base: EffectBase,
        method: String,
        route_pattern: String,
        #[serde(default)]
        framework: Option<String>,
    },
    Response {
        #[serde(flatten)]
        base: EffectBase,
        #[serde(default)]
        status_code: Option<u32>,
        #[serde(default)]
        content_type: Option<String>,
        #[serde(default)]
        framework: Option<String>,
    },
    Condition {
        #[serde(flatten)]
        base: EffectBase,
        #[serde(default)]
        expression: Option<String>,
    },
    Loop {
        #[serde(flatten)]
        base: EffectBase,
        #[serde(default)]
        loop_kind: Option<String>,
    },
    Group {
        #[serde(flatten)]
        base: EffectBase,
        group_name: String,
        #[serde(default)]
        group_members: Vec<String>,
    },
    ValidationResult {
        #[serde(flatten)]
        base: EffectBase,
        validator: String,
        passed: bool,
        #[serde(default)]
        detail: Option<String>,
    },
    SeedUpdated {
        #[serde(flatten)]
        base: EffectBase,
        package_path: String,
        #[serde(default)]
        file_count: u64,
    },
    FileChanged {
        #[serde(flatten)]
        base: EffectBase,
        change_kind: String,
    },
}

impl Effect {
    /// The discriminant name, as stored in the `effect_type` column.
    pub fn effect_type(&self) -> &'static str {
        match self {
            Self::FunctionCall { .. } => "FunctionCall",
            Self::Store { .. } => "Store",
            Self::Retrieve { .. } => "Retrieve",
            Self::Send { .. } => "Send",
            Self::Request { .. } => "Request",
            Self::Response { .. } => "Response",
            Self::Condition { .. } => "Condition",
            Self::Loop { .. } => "Loop",
            Self::Group { .. } => "Group",
            Self::ValidationResult { .. } => "ValidationResult",
            Self::SeedUpdated { .. } => "SeedUpdated",
            Self::FileChanged { .. } => "FileChanged",
        }
    }

    pub fn base(&self) -> &EffectBase {
        match self {
            Self::FunctionCall { base, .. }
            | Self::Store { base, .. }
            | Self::Retrieve { base, .. }
            | Self::Send { base, .. }
            | Self::Request { base, .. }
            | Self::Response { base, .. }
            | Self::Condition { base, .. }
            | Self::Loop { base, .. }
            | Self::Group { base, .. }
            | Self::ValidationResult { base, .. }
            | Self::SeedUpdated { base, .. }
            | Self::FileChanged { base, .. } => base,
        }
    }

    pub fn base_mut(&mut self) -> &mut EffectBase {
        match self {
            Self::FunctionCall { base, .. }
            | Self::Store { base, .. }
            | Self::Retrieve { base, .. }
            | Self::Send { base, .. }
            | Self::Request { base, .. }
            | Self::Response { base, .. }
            | Self::Condition { base, .. }
            | Self::Loop { base, .. }
            | Self::Group { base, .. }
            | Self::ValidationResult { base, .. }
            | Self::SeedUpdated { base, .. }
            | Self::FileChanged { base, .. } => base,
        }
    }
}

/// Uniform output of one file parse, independent of source language.
///
/// Also the wire shape of the out-of-process front-end protocol (camelCase
/// keys on the wire).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StructuralParseResult {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
    pub external_refs: Vec<ExternalRef>,
    pub effects: Vec<Effect>,
    pub source_file_hash: String,
    pub file_path: String,
    pub parse_time_ms: u64,
    pub warnings: Vec<String>,
}

impl StructuralParseResult {
    /// An empty result for the given file (e.g. an empty source file).
    pub fn empty(file_path: impl Into<String>, source_file_hash: impl Into<String>) -> Self {
        Self {
            file_path: file_path.into(),
            source_file_hash: source_file_hash.into(),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
            && self.edges.is_empty()
            && self.external_refs.is_empty()
            && self.effects.is_empty()
    }

    /// Stamp every row with the given branch and this result's file hash.
    pub fn stamp(&mut self, branch: &str) {
        for node in &mut self.nodes {
            node.branch = branch.to_string();
            node.source_file_hash = self.source_file_hash.clone();
        }
        for edge in &mut self.edges {
            edge.branch = branch.to_string();
            edge.source_file_hash = self.source_file_hash.clone();
        }
        for r in &mut self.external_refs {
            r.branch = branch.to_string();
            r.source_file_hash = self.source_file_hash.clone();
        }
        for effect in &mut self.effects {
            let base = effect.base_mut();
            base.branch = branch.to_string();
            base.source_file_hash = self.source_file_hash.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> EffectBase {
        EffectBase {
            effect_id: "fx-1".to_string(),
            source_entity_id: "repo:pkg:function:abc".to_string(),
            source_file_path: "/src/a.ts".to_string(),
            source_line: 3,
            source_column: 7,
            ..EffectBase::default()
        }
    }

    #[test]
    fn effect_serializes_flat_with_discriminant() {
        let effect = Effect::Store {
            base: base(),
            store_type: StoreType::Database,
            operation: "insert".to_string(),
            target_resource: "users".to_string(),
            provider: None,
        };
        let value = serde_json::to_value(&effect).unwrap();
        assert_eq!(value["effect_type"], "Store");
        assert_eq!(value["effect_id"], "fx-1");
        assert_eq!(value["store_type"], "database");
        assert_eq!(value["operation"], "insert");
    }

    #[test]
    fn effect_roundtrips_through_row_shape() {
        let effect = Effect::FunctionCall {
            base: base(),
            callee_name: "insert".to_string(),
            callee_qualified_name: "db.insert".to_string(),
            is_method_call: true,
            is_async: false,
            is_constructor: false,
            argument_count: 2,
            is_external: false,
            external_module: None,
        };
        let value = serde_json::to_value(&effect).unwrap();
        let back: Effect = serde_json::from_value(value).unwrap();
        assert_eq!(back, effect);
    }

    #[test]
    fn lenient_enum_parsing_normalizes_to_default() {
        assert_eq!(StoreType::parse_lenient("database"), StoreType::Database);
        assert_eq!(StoreType::parse_lenient("blockchain"), StoreType::External);
        assert_eq!(SendType::parse_lenient("webhook"), SendType::Webhook);
        assert_eq!(SendType::parse_lenient("carrier-pigeon"), SendType::Http);
    }

    #[test]
    fn parse_result_wire_shape_is_camel_case() {
        let result = StructuralParseResult::empty("/src/a.ts", "deadbeef");
        let value = serde_json::to_value(&result).unwrap();
        assert!(value.get("externalRefs").is_some());
        assert!(value.get("sourceFileHash").is_some());
        assert_eq!(value["filePath"], "/src/a.ts");
    }

    #[test]
    fn stamp_propagates_branch_and_hash() {
        let mut result = StructuralParseResult::empty("/src/a.ts", "cafe01");
        result.nodes.push(Node::new(
            "r:p:function:1",
            "f",
            "f",
            NodeKind::Function,
            "/src/a.ts",
        ));
        result.effects.push(Effect::Condition {
            base: base(),
            expression: None,
        });
        result.stamp("feature/x");
        assert_eq!(result.nodes[0].branch, "feature/x");
        assert_eq!(result.nodes[0].source_file_hash, "cafe01");
        assert_eq!(result.effects[0].base().branch, "feature/x");
    }
}
