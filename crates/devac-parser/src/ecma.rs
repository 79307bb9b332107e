//! Shared tree-sitter walker for the ECMAScript family (TypeScript,
//! JavaScript). The grammars share node kinds for everything we extract, so
//! both front-ends drive this one walker.

use devac_core::entity_id::{EntityId, ScopePath, normalize_path, unresolved};
use devac_core::error::ParseError;
use devac_core::model::{
    Edge, EdgeType, Effect, EffectBase, ExternalRef, ImportStyle, Node, NodeKind,
    StructuralParseResult, Visibility,
};
use crate::registry::ParseOptions;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Instant;

/// SHA-256 of a file's content, hex-encoded.
pub fn source_hash(content: &str) -> String {
    let digest = Sha256::digest(content.as_bytes());
    let mut out = String::with_capacity(64);
    for byte in digest {
        out.push_str(&format!("{byte:02x}"));
    }
    out
}

/// Parse JS-like content into a structural result.
pub fn parse_source(
    content: &str,
    path: &Path,
    options: &ParseOptions,
    language: &tree_sitter::Language,
) -> Result<StructuralParseResult, ParseError> {
    let started = Instant::now();
    let file_path = normalize_path(&path.display().to_string());
    let hash = source_hash(content);

    if content.trim().is_empty() {
        return Ok(StructuralParseResult::empty(file_path, hash));
    }

    let mut parser = tree_sitter::Parser::new();
    parser
        .set_language(language)
        .map_err(|e| ParseError::ExternalToolFailure {
            file: file_path.clone(),
            detail: format!("failed to load grammar: {e}"),
        })?;
    let Some(tree) = parser.parse(content.as_bytes(), None) else {
        return Err(ParseError::ExternalToolFailure {
            file: file_path.clone(),
            detail: "tree-sitter produced no tree".to_string(),
        });
    };

    let module_stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("module")
        .to_string();
    let module_id = EntityId::generate(
        &options.repo,
        &options.package_path,
        NodeKind::Module,
        &file_path,
        &module_stem,
    )
    .to_string();

    let mut ctx = Walker {
        source: content,
        file_path: file_path.clone(),
        repo: options.repo.clone(),
        package_path: options.package_path.clone(),
        module_id,
        effect_prefix: hash[..12].to_string(),
        effect_seq: 0,
        imports: BTreeMap::new(),
        scope: ScopePath::new(),
        result: StructuralParseResult::empty(file_path, hash),
    };

    let root = tree.root_node();
    if root.has_error() {
        ctx.result
            .warnings
            .push("syntax errors present; extracted entities may be partial".to_string());
    }

    ctx.walk(&root, &Enclosing::Module, &Modifiers::default());
    ctx.result.parse_time_ms = started.elapsed().as_millis() as u64;
    Ok(ctx.result)
}

/// What entity currently encloses the walk position.
enum Enclosing {
    Module,
    /// entity_id of the surrounding class body.
    Class(String),
    /// entity_id of the surrounding function or method.
    Callable(String),
}

impl Enclosing {
    fn effect_source(&self, module_id: &str) -> String {
        match self {
            Enclosing::Module => module_id.to_string(),
            Enclosing::Class(id) | Enclosing::Callable(id) => id.clone(),
        }
    }
}

/// Export context carried from an `export_statement` into its declaration.
#[derive(Default, Clone, Copy)]
struct Modifiers {
    exported: bool,
    default_export: bool,
}

struct Walker<'a> {
    source: &'a str,
    file_path: String,
    repo: String,
    package_path: String,
    module_id: String,
    effect_prefix: String,
    effect_seq: u32,
    /// local binding name → module specifier, for external-call detection.
    imports: BTreeMap<String, String>,
    scope: ScopePath,
    result: StructuralParseResult,
}

impl Walker<'_> {
    fn text(&self, node: &tree_sitter::Node) -> &str {
        &self.source[node.byte_range()]
    }

    fn entity_id(&self, kind: NodeKind, scoped_name: &str) -> String {
        EntityId::generate(
            &self.repo,
            &self.package_path,
            kind,
            &self.file_path,
            scoped_name,
        )
        .to_string()
    }

    fn next_effect_id(&mut self, node: &tree_sitter::Node) -> String {
        let id = format!(
            "{}:{}:{}:{}",
            self.effect_prefix,
            node.start_position().row + 1,
            node.start_position().column,
            self.effect_seq
        );
        self.effect_seq += 1;
        id
    }

    fn effect_base(&mut self, node: &tree_sitter::Node, source_entity_id: String) -> EffectBase {
        EffectBase {
            effect_id: self.next_effect_id(node),
            timestamp: None,
            source_entity_id,
            source_file_path: self.file_path.clone(),
            source_line: node.start_position().row as u32 + 1,
            source_column: node.start_position().column as u32,
            ..EffectBase::default()
        }
    }

    fn edge(
        &mut self,
        source_entity_id: &str,
        target_entity_id: String,
        edge_type: EdgeType,
        node: &tree_sitter::Node,
    ) {
        self.result.edges.push(Edge {
            source_entity_id: source_entity_id.to_string(),
            target_entity_id,
            edge_type,
            source_file_path: self.file_path.clone(),
            source_line: node.start_position().row as u32 + 1,
            source_column: node.start_position().column as u32,
            properties: BTreeMap::new(),
            source_file_hash: String::new(),
            branch: String::new(),
            is_deleted: false,
        });
    }

    fn walk(&mut self, node: &tree_sitter::Node, enclosing: &Enclosing, modifiers: &Modifiers) {
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            match child.kind() {
                "import_statement" => self.handle_import(&child),
                "export_statement" => self.handle_export(&child, enclosing),
                "class_declaration" | "abstract_class_declaration" => {
                    self.handle_class(&child, modifiers);
                }
                "function_declaration" | "generator_function_declaration" => {
                    self.handle_function(&child, enclosing, modifiers);
                }
                "interface_declaration" => self.handle_interface(&child, modifiers),
                "type_alias_declaration" | "enum_declaration" => {
                    self.handle_type_decl(&child, modifiers);
                }
                "lexical_declaration" | "variable_declaration" => {
                    self.handle_variables(&child, enclosing, modifiers);
                }
                "call_expression" => {
                    self.handle_call(&child, enclosing, false);
                    self.walk(&child, enclosing, &Modifiers::default());
                }
                "new_expression" => {
                    self.handle_call(&child, enclosing, true);
                    self.walk(&child, enclosing, &Modifiers::default());
                }
                "if_statement" => {
                    self.handle_condition(&child, enclosing);
                    self.walk(&child, enclosing, &Modifiers::default());
                }
                "for_statement" | "for_in_statement" | "while_statement" | "do_statement" => {
                    self.handle_loop(&child, enclosing);
                    self.walk(&child, enclosing, &Modifiers::default());
                }
                "throw_statement" => {
                    self.handle_throw(&child, enclosing);
                    self.walk(&child, enclosing, &Modifiers::default());
                }
                // Declarations read their own decorators; recursing here
                // would double-count the decorator's call expression.
                "decorator" => {}
                _ => self.walk(&child, enclosing, &Modifiers::default()),
            }
        }
    }

    fn handle_export(&mut self, node: &tree_sitter::Node, enclosing: &Enclosing) {
        // `export { A } from './x'` re-exports without declaring anything.
        if let Some(source) = node.child_by_field_name("source") {
            let specifier = strip_quotes(self.text(&source)).to_string();
            self.collect_reexports(node, &specifier);
            return;
        }

        let mut modifiers = Modifiers {
            exported: true,
            default_export: false,
        };
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            if child.kind() == "default" {
                modifiers.default_export = true;
            }
        }
        self.walk(node, enclosing, &modifiers);
    }

    fn collect_reexports(&mut self, node: &tree_sitter::Node, specifier: &str) {
        let mut cursor = node.walk();
        let mut pushed = false;
        for clause in node.children(&mut cursor) {
            if clause.kind() != "export_clause" {
                continue;
            }
            let mut inner = clause.walk();
            for spec in clause.children(&mut inner) {
                if spec.kind() != "export_specifier" {
                    continue;
                }
                let name = spec
                    .child_by_field_name("name")
                    .map(|n| self.text(&n).to_string())
                    .unwrap_or_default();
                let alias = spec
                    .child_by_field_name("alias")
                    .map(|n| self.text(&n).to_string());
                self.push_ref(node, specifier, &name, None, ImportStyle::Named, true, alias);
                pushed = true;
            }
        }
        if !pushed {
            // `export * from './x'`
            self.push_ref(node, specifier, "*", None, ImportStyle::Namespace, true, None);
        }
    }

    fn handle_import(&mut self, node: &tree_sitter::Node) {
        let Some(source) = node.child_by_field_name("source") else {
            return;
        };
        let specifier = strip_quotes(self.text(&source)).to_string();

        let mut is_type_only = false;
        let mut clause = None;
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            match child.kind() {
                "type" => is_type_only = true,
                "import_clause" => clause = Some(child),
                _ => {}
            }
        }

        let Some(clause) = clause else {
            // `import './polyfill'`
            self.push_typed_ref(node, &specifier, "*", None, ImportStyle::SideEffect, is_type_only);
            return;
        };

        let mut inner = clause.walk();
        for item in clause.children(&mut inner) {
            match item.kind() {
                "identifier" => {
                    let local = self.text(&item).to_string();
                    self.imports.insert(local.clone(), specifier.clone());
                    self.push_typed_ref(
                        node,
                        &specifier,
                        "default",
                        Some(local),
                        ImportStyle::Default,
                        is_type_only,
                    );
                }
                "namespace_import" => {
                    let local = item
                        .named_child(0)
                        .map(|n| self.text(&n).to_string())
                        .unwrap_or_default();
                    self.imports.insert(local.clone(), specifier.clone());
                    self.push_typed_ref(
                        node,
                        &specifier,
                        "*",
                        Some(local),
                        ImportStyle::Namespace,
                        is_type_only,
                    );
                }
                "named_imports" => {
                    let mut specs = item.walk();
                    for spec in item.children(&mut specs) {
                        if spec.kind() != "import_specifier" {
                            continue;
                        }
                        let name = spec
                            .child_by_field_name("name")
                            .map(|n| self.text(&n).to_string())
                            .unwrap_or_default();
                        let alias = spec
                            .child_by_field_name("alias")
                            .map(|n| self.text(&n).to_string());
                        let local = alias.clone().unwrap_or_else(|| name.clone());
                        self.imports.insert(local, specifier.clone());
                        self.push_typed_ref(
                            node,
                            &specifier,
                            &name,
                            alias,
                            ImportStyle::Named,
                            is_type_only,
                        );
                    }
                }
                _ => {}
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn push_ref(
        &mut self,
        node: &tree_sitter::Node,
        specifier: &str,
        symbol: &str,
        local_alias: Option<String>,
        style: ImportStyle,
        is_reexport: bool,
        export_alias: Option<String>,
    ) {
        self.result.external_refs.push(ExternalRef {
            source_entity_id: self.module_id.clone(),
            module_specifier: specifier.to_string(),
            imported_symbol: symbol.to_string(),
            local_alias,
            import_style: style,
            is_type_only: false,
            is_reexport,
            export_alias,
            target_entity_id: None,
            is_resolved: false,
            source_file_path: self.file_path.clone(),
            source_line: node.start_position().row as u32 + 1,
            source_column: node.start_position().column as u32,
            source_file_hash: String::new(),
            branch: String::new(),
            is_deleted: false,
        });
    }

    fn push_typed_ref(
        &mut self,
        node: &tree_sitter::Node,
        specifier: &str,
        symbol: &str,
        local_alias: Option<String>,
        style: ImportStyle,
        is_type_only: bool,
    ) {
        self.push_ref(node, specifier, symbol, local_alias, style, false, None);
        if is_type_only
            && let Some(r) = self.result.external_refs.last_mut()
        {
            r.is_type_only = true;
        }
    }

    fn handle_class(&mut self, node: &tree_sitter::Node, modifiers: &Modifiers) {
        let Some(name_node) = node.child_by_field_name("name") else {
            return;
        };
        let name = self.text(&name_node).to_string();
        let scoped = self.scope.scoped(&name);
        let entity_id = self.entity_id(NodeKind::Class, &scoped);

        let mut class_node = self.make_node(NodeKind::Class, &entity_id, &name, &scoped, node);
        class_node.is_exported = modifiers.exported;
        class_node.is_default_export = modifiers.default_export;
        class_node.is_abstract = node.kind() == "abstract_class_declaration";
        class_node.decorators = self.collect_decorators(node, &entity_id);
        class_node.type_parameters = self.collect_type_parameters(node);
        class_node.documentation = self.doc_comment(node);
        self.result.nodes.push(class_node);

        self.collect_heritage(node, &entity_id);

        if let Some(body) = node.child_by_field_name("body") {
            self.scope.push(name);
            let enclosing = Enclosing::Class(entity_id.clone());
            let mut cursor = body.walk();
            for member in body.children(&mut cursor) {
                match member.kind() {
                    "method_definition" | "abstract_method_signature" => {
                        self.handle_method(&member, &entity_id);
                    }
                    "public_field_definition" | "field_definition" | "property_signature" => {
                        self.handle_field(&member, &entity_id);
                    }
                    _ => self.walk(&member, &enclosing, &Modifiers::default()),
                }
            }
            self.scope.pop();
        }
    }

    fn collect_heritage(&mut self, class: &tree_sitter::Node, entity_id: &str) {
        let mut cursor = class.walk();
        for child in class.children(&mut cursor) {
            if child.kind() != "class_heritage" {
                continue;
            }
            let mut inner = child.walk();
            let mut saw_clause = false;
            for clause in child.children(&mut inner) {
                match clause.kind() {
                    "extends_clause" => {
                        saw_clause = true;
                        if let Some(value) = clause
                            .child_by_field_name("value")
                            .or_else(|| clause.named_child(0))
                        {
                            let parent = first_identifier_text(self.source, &value)
                                .unwrap_or_else(|| self.text(&value).to_string());
                            self.edge(entity_id, unresolved(&parent), EdgeType::Extends, &clause);
                        }
                    }
                    "implements_clause" => {
                        saw_clause = true;
                        let mut types = clause.walk();
                        for ty in clause.named_children(&mut types) {
                            let iface = first_identifier_text(self.source, &ty)
                                .unwrap_or_else(|| self.text(&ty).to_string());
                            self.edge(entity_id, unresolved(&iface), EdgeType::Implements, &clause);
                        }
                    }
                    _ => {}
                }
            }
            // JS grammar: `class A extends B` puts the expression directly
            // under class_heritage.
            if !saw_clause
                && let Some(value) = child.named_child(0)
            {
                let parent = first_identifier_text(self.source, &value)
                    .unwrap_or_else(|| self.text(&value).to_string());
                self.edge(entity_id, unresolved(&parent), EdgeType::Extends, &child);
            }
        }
    }

    fn handle_method(&mut self, node: &tree_sitter::Node, class_id: &str) {
        let Some(name_node) = node.child_by_field_name("name") else {
            return;
        };
        let name = self.text(&name_node).to_string();
        let scoped = self.scope.scoped(&name);
        let entity_id = self.entity_id(NodeKind::Method, &scoped);

        let mut method = self.make_node(NodeKind::Method, &entity_id, &name, &scoped, node);
        method.is_async = has_token(node, "async");
        method.is_static = has_token(node, "static");
        method.is_generator = has_token(node, "*");
        method.is_abstract = node.kind() == "abstract_method_signature";
        method.visibility = accessibility(self.source, node);
        method.decorators = self.collect_decorators(node, &entity_id);
        method.type_signature = self.signature_text(node);
        method.documentation = self.doc_comment(node);
        self.result.nodes.push(method);

        self.edge(class_id, entity_id.clone(), EdgeType::Contains, node);
        self.collect_return_edge(node, &entity_id);

        if let Some(body) = node.child_by_field_name("body") {
            let inner = Enclosing::Callable(entity_id);
            self.walk(&body, &inner, &Modifiers::default());
        }
    }

    fn handle_field(&mut self, node: &tree_sitter::Node, class_id: &str) {
        let Some(name_node) = node.child_by_field_name("name") else {
            return;
        };
        let name = self.text(&name_node).to_string();
        let scoped = self.scope.scoped(&name);
        let entity_id = self.entity_id(NodeKind::Property, &scoped);

        let mut field = self.make_node(NodeKind::Property, &entity_id, &name, &scoped, node);
        field.is_static = has_token(node, "static");
        field.visibility = accessibility(self.source, node);
        field.type_signature = node
            .child_by_field_name("type")
            .map(|t| self.text(&t).trim_start_matches(':').trim().to_string());
        self.result.nodes.push(field);

        self.edge(class_id, entity_id, EdgeType::Contains, node);
    }

    fn handle_function(
        &mut self,
        node: &tree_sitter::Node,
        enclosing: &Enclosing,
        modifiers: &Modifiers,
    ) {
        let Some(name_node) = node.child_by_field_name("name") else {
            return;
        };
        let name = self.text(&name_node).to_string();
        let scoped = self.scope.scoped(&name);
        let entity_id = self.entity_id(NodeKind::Function, &scoped);

        let mut func = self.make_node(NodeKind::Function, &entity_id, &name, &scoped, node);
        func.is_exported = modifiers.exported;
        func.is_default_export = modifiers.default_export;
        func.is_async = has_token(node, "async");
        func.is_generator =
            node.kind() == "generator_function_declaration" || has_token(node, "*");
        func.type_signature = self.signature_text(node);
        func.documentation = self.doc_comment(node);
        self.result.nodes.push(func);

        // Nested functions hang off their enclosing callable.
        if let Enclosing::Callable(outer) = enclosing {
            self.edge(outer, entity_id.clone(), EdgeType::Contains, node);
        }
        self.collect_return_edge(node, &entity_id);

        if let Some(body) = node.child_by_field_name("body") {
            self.scope.push(name);
            let inner = Enclosing::Callable(entity_id);
            self.walk(&body, &inner, &Modifiers::default());
            self.scope.pop();
        }
    }

    fn handle_interface(&mut self, node: &tree_sitter::Node, modifiers: &Modifiers) {
        let Some(name_node) = node.child_by_field_name("name") else {
            return;
        };
        let name = self.text(&name_node).to_string();
        let scoped = self.scope.scoped(&name);
        let entity_id = self.entity_id(NodeKind::Interface, &scoped);

        let mut iface = self.make_node(NodeKind::Interface, &entity_id, &name, &scoped, node);
        iface.is_exported = modifiers.exported;
        iface.type_parameters = self.collect_type_parameters(node);
        iface.documentation = self.doc_comment(node);
        self.result.nodes.push(iface);

        // `interface A extends B, C`
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            if child.kind() == "extends_type_clause" || child.kind() == "extends_clause" {
                let mut types = child.walk();
                for ty in child.named_children(&mut types) {
                    let parent = first_identifier_text(self.source, &ty)
                        .unwrap_or_else(|| self.text(&ty).to_string());
                    self.edge(&entity_id, unresolved(&parent), EdgeType::Extends, &child);
                }
            }
        }
    }

    fn handle_type_decl(&mut self, node: &tree_sitter::Node, modifiers: &Modifiers) {
        let Some(name_node) = node.child_by_field_name("name") else {
            return;
        };
        let name = self.text(&name_node).to_string();
        let scoped = self.scope.scoped(&name);
        let entity_id = self.entity_id(NodeKind::Type, &scoped);

        let mut ty = self.make_node(NodeKind::Type, &entity_id, &name, &scoped, node);
        ty.is_exported = modifiers.exported;
        self.result.nodes.push(ty);
    }

    fn handle_variables(
        &mut self,
        node: &tree_sitter::Node,
        enclosing: &Enclosing,
        modifiers: &Modifiers,
    ) {
        // Only module-level declarations become entities; locals inside
        // callables are noise at graph granularity.
        if !matches!(enclosing, Enclosing::Module) {
            self.walk(node, enclosing, &Modifiers::default());
            return;
        }
        let is_const = node
            .child(0)
            .is_some_and(|c| self.text(&c) == "const");

        let mut cursor = node.walk();
        for declarator in node.named_children(&mut cursor) {
            if declarator.kind() != "variable_declarator" {
                continue;
            }
            let Some(name_node) = declarator.child_by_field_name("name") else {
                continue;
            };
            if name_node.kind() != "identifier" {
                continue; // destructuring patterns stay anonymous
            }
            let name = self.text(&name_node).to_string();
            let value = declarator.child_by_field_name("value");
            let is_function_value = value.as_ref().is_some_and(|v| {
                matches!(v.kind(), "arrow_function" | "function_expression" | "function")
            });

            let kind = if is_function_value {
                NodeKind::Function
            } else if is_const {
                NodeKind::Constant
            } else {
                NodeKind::Variable
            };
            let scoped = self.scope.scoped(&name);
            let entity_id = self.entity_id(kind, &scoped);

            let mut var = self.make_node(kind, &entity_id, &name, &scoped, &declarator);
            var.is_exported = modifiers.exported;
            var.is_default_export = modifiers.default_export;
            if let Some(v) = &value {
                var.is_async = has_token(v, "async");
            }
            self.result.nodes.push(var);

            if let Some(v) = value {
                if v.kind() == "new_expression" {
                    if let Some(ctor) = v.child_by_field_name("constructor") {
                        let target = self.text(&ctor).to_string();
                        self.edge(&entity_id, unresolved(&target), EdgeType::References, &v);
                    }
                    self.handle_call(&v, &Enclosing::Callable(entity_id.clone()), true);
                } else if is_function_value {
                    self.scope.push(name);
                    let inner = Enclosing::Callable(entity_id);
                    self.walk(&v, &inner, &Modifiers::default());
                    self.scope.pop();
                } else {
                    self.walk(&v, &Enclosing::Callable(entity_id), &Modifiers::default());
                }
            }
        }
    }

    fn handle_call(&mut self, node: &tree_sitter::Node, enclosing: &Enclosing, is_constructor: bool) {
        let callee = if is_constructor {
            node.child_by_field_name("constructor")
        } else {
            node.child_by_field_name("function")
        };
        let Some(callee) = callee else { return };

        let qualified = self.text(&callee).to_string();
        let (callee_name, is_method_call) = match callee.kind() {
            "member_expression" => (
                callee
                    .child_by_field_name("property")
                    .map(|p| self.text(&p).to_string())
                    .unwrap_or_else(|| qualified.clone()),
                true,
            ),
            _ => (qualified.clone(), false),
        };

        let argument_count = node
            .child_by_field_name("arguments")
            .map_or(0, |a| a.named_child_count() as u32);
        let is_await = node
            .parent()
            .is_some_and(|p| p.kind() == "await_expression");

        // External when the root binding of the callee came from an import.
        let root_binding = qualified
            .split(['.', '('])
            .next()
            .unwrap_or(&qualified)
            .to_string();
        let external_module = self.imports.get(&root_binding).cloned();

        let source_entity_id = enclosing.effect_source(&self.module_id);
        let base = self.effect_base(node, source_entity_id.clone());
        self.result.effects.push(Effect::FunctionCall {
            base,
            callee_name: callee_name.clone(),
            callee_qualified_name: qualified,
            is_method_call,
            is_async: is_await,
            is_constructor,
            argument_count,
            is_external: external_module.is_some(),
            external_module,
        });

        // Plain identifier callees inside a callable also become CALLS edges
        // for the resolver pass; member calls stay effect-only.
        if !is_method_call
            && !is_constructor
            && let Enclosing::Callable(caller) = enclosing
        {
            let caller = caller.clone();
            self.edge(&caller, unresolved(&callee_name), EdgeType::Calls, node);
        }
    }

    fn handle_condition(&mut self, node: &tree_sitter::Node, enclosing: &Enclosing) {
        let expression = node
            .child_by_field_name("condition")
            .map(|c| truncate(self.text(&c), 120));
        let source = enclosing.effect_source(&self.module_id);
        let base = self.effect_base(node, source);
        self.result.effects.push(Effect::Condition { base, expression });
    }

    fn handle_loop(&mut self, node: &tree_sitter::Node, enclosing: &Enclosing) {
        let loop_kind = match node.kind() {
            "for_statement" => "for",
            "for_in_statement" => "for-in",
            "while_statement" => "while",
            "do_statement" => "do",
            other => other,
        };
        let source = enclosing.effect_source(&self.module_id);
        let base = self.effect_base(node, source);
        self.result.effects.push(Effect::Loop {
            base,
            loop_kind: Some(loop_kind.to_string()),
        });
    }

    fn handle_throw(&mut self, node: &tree_sitter::Node, enclosing: &Enclosing) {
        let Enclosing::Callable(thrower) = enclosing else {
            return;
        };
        // `throw new SomeError(...)` links the callable to the error type.
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            if child.kind() == "new_expression"
                && let Some(ctor) = child.child_by_field_name("constructor")
            {
                let target = self.text(&ctor).to_string();
                let thrower = thrower.clone();
                self.edge(&thrower, unresolved(&target), EdgeType::Throws, &child);
            }
        }
    }

    fn collect_return_edge(&mut self, node: &tree_sitter::Node, entity_id: &str) {
        if let Some(return_type) = node.child_by_field_name("return_type")
            && let Some(name) = first_identifier_text(self.source, &return_type)
        {
            self.edge(entity_id, unresolved(&name), EdgeType::Returns, &return_type);
        }
    }

    fn collect_decorators(&mut self, node: &tree_sitter::Node, entity_id: &str) -> Vec<String> {
        let mut decorators = Vec::new();
        self.collect_decorators_from(node, entity_id, &mut decorators);
        // `@dec export class C {}` hangs the decorator off the export
        // statement rather than the declaration.
        if let Some(parent) = node.parent()
            && parent.kind() == "export_statement"
        {
            self.collect_decorators_from(&parent, entity_id, &mut decorators);
        }
        decorators
    }

    fn collect_decorators_from(
        &mut self,
        node: &tree_sitter::Node,
        entity_id: &str,
        decorators: &mut Vec<String>,
    ) {
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            if child.kind() == "decorator" {
                let name = self
                    .text(&child)
                    .trim_start_matches('@')
                    .split('(')
                    .next()
                    .unwrap_or_default()
                    .trim()
                    .to_string();
                let eid = entity_id.to_string();
                self.edge(&eid, unresolved(&name), EdgeType::Decorates, &child);
                decorators.push(name);
            }
        }
    }

    fn collect_type_parameters(&self, node: &tree_sitter::Node) -> Vec<String> {
        let Some(params) = node.child_by_field_name("type_parameters") else {
            return Vec::new();
        };
        self.text(&params)
            .trim_start_matches('<')
            .trim_end_matches('>')
            .split(',')
            .map(|p| p.split([' ', ':']).next().unwrap_or("").trim().to_string())
            .filter(|p| !p.is_empty())
            .collect()
    }

    fn signature_text(&self, node: &tree_sitter::Node) -> Option<String> {
        let params = node.child_by_field_name("parameters")?;
        let mut signature = self.text(&params).to_string();
        if let Some(return_type) = node.child_by_field_name("return_type") {
            signature.push_str(self.text(&return_type));
        }
        Some(signature)
    }

    fn doc_comment(&self, node: &tree_sitter::Node) -> Option<String> {
        let prev = node.prev_sibling()?;
        if prev.kind() == "comment" {
            let text = self.text(&prev);
            if text.starts_with("/**") {
                return Some(text.to_string());
            }
        }
        None
    }

    fn make_node(
        &self,
        kind: NodeKind,
        entity_id: &str,
        name: &str,
        qualified_name: &str,
        ts_node: &tree_sitter::Node,
    ) -> Node {
        let mut node = Node::new(entity_id, name, qualified_name, kind, self.file_path.clone());
        node.start_line = ts_node.start_position().row as u32 + 1;
        node.end_line = ts_node.end_position().row as u32 + 1;
        node.start_column = ts_node.start_position().column as u32;
        node.end_column = ts_node.end_position().column as u32;
        node
    }
}

fn strip_quotes(s: &str) -> &str {
    s.trim_matches(|c| c == '\'' || c == '"' || c == '`')
}

fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        s.to_string()
    } else {
        let mut end = max;
        while !s.is_char_boundary(end) {
            end -= 1;
        }
        s[..end].to_string()
    }
}

/// Does the declaration carry the given anonymous token (`async`, `static`, `*`)?
fn has_token(node: &tree_sitter::Node, token: &str) -> bool {
    let mut cursor = node.walk();
    node.children(&mut cursor).any(|c| c.kind() == token)
}

fn accessibility(source: &str, node: &tree_sitter::Node) -> Visibility {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.kind() == "accessibility_modifier" {
            return match &source[child.byte_range()] {
                "private" => Visibility::Private,
                "protected" => Visibility::Protected,
                _ => Visibility::Public,
            };
        }
    }
    Visibility::Public
}

/// First identifier-ish token inside a node (e.g. `Base` out of `Base<T>`).
fn first_identifier_text(source: &str, node: &tree_sitter::Node) -> Option<String> {
    if matches!(node.kind(), "identifier" | "type_identifier") {
        return Some(source[node.byte_range()].to_string());
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if let Some(found) = first_identifier_text(source, &child) {
            return Some(found);
        }
    }
    None
}
