//! Stable entity identity: `<repo>:<package-path>:<kind>:<scope-hash>`.
//!
//! The scope hash is SHA-256 over the normalized (file path, scoped name,
//! kind) tuple, truncated to 64 bits. Same tuple always yields the same ID;
//! distinct tuples collide with negligible probability.

use crate::model::NodeKind;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Textual prefix carried by edge/ref targets until a resolver pass runs.
pub const UNRESOLVED_PREFIX: &str = "unresolved:";

/// Build an unresolved-target sentinel for a symbol.
pub fn unresolved(symbol: &str) -> String {
    format!("{UNRESOLVED_PREFIX}{symbol}")
}

/// Whether a target string is an unresolved sentinel.
pub fn is_unresolved(target: &str) -> bool {
    target.starts_with(UNRESOLVED_PREFIX)
}

/// Extract the symbol from an unresolved sentinel, if it is one.
pub fn unresolved_symbol(target: &str) -> Option<&str> {
    target.strip_prefix(UNRESOLVED_PREFIX)
}

/// A parsed entity ID. The hash component is opaque.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityId {
    pub repo: String,
    pub package_path: String,
    pub kind: NodeKind,
    pub scope_hash: String,
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}:{}",
            self.repo,
            self.package_path,
            self.kind.as_str(),
            self.scope_hash
        )
    }
}

impl EntityId {
    /// Generate the ID for an entity scope.
    ///
    /// `file_path` is normalized (forward slashes, trimmed); case is
    /// preserved. `scoped_name` follows the scope rules: free functions are
    /// `name`, members `Class.member`, nested scopes `outer.inner`.
    pub fn generate(
        repo: &str,
        package_path: &str,
        kind: NodeKind,
        file_path: &str,
        scoped_name: &str,
    ) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(normalize_path(file_path).as_bytes());
        hasher.update([0]);
        hasher.update(scoped_name.trim().as_bytes());
        hasher.update([0]);
        hasher.update(kind.as_str().as_bytes());
        let digest = hasher.finalize();

        let mut scope_hash = String::with_capacity(16);
        for byte in &digest[..8] {
            scope_hash.push_str(&format!("{byte:02x}"));
        }

        Self {
            repo: repo.trim().to_string(),
            package_path: normalize_path(package_path),
            kind,
            scope_hash,
        }
    }

    /// Parse an ID string back into its components.
    ///
    /// The repo component never contains `:` (it is a normalized
    /// `host/org/name`, `package/<name>`, or `local/<name>` form), so the
    /// first separator ends it; the final two components are kind and hash.
    pub fn parse(id: &str) -> Option<Self> {
        let (rest, scope_hash) = id.rsplit_once(':')?;
        let (rest, kind) = rest.rsplit_once(':')?;
        let (repo, package_path) = rest.split_once(':')?;
        if repo.is_empty() || scope_hash.is_empty() {
            return None;
        }
        Some(Self {
            repo: repo.to_string(),
            package_path: package_path.to_string(),
            kind: NodeKind::parse(kind),
            scope_hash: scope_hash.to_string(),
        })
    }
}

/// Normalize a path for identity purposes: forward slashes, trimmed
/// whitespace, case preserved.
pub fn normalize_path(path: &str) -> String {
    path.trim().replace('\\', "/")
}

/// Builds scoped names while walking nested source scopes.
///
/// Pushing `Outer` then `inner` yields `Outer.inner`; an empty stack yields
/// the bare name.
#[derive(Debug, Clone, Default)]
pub struct ScopePath {
    segments: Vec<String>,
}

impl ScopePath {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, segment: impl Into<String>) {
        self.segments.push(segment.into());
    }

    pub fn pop(&mut self) {
        self.segments.pop();
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Scoped name for `name` inside the current scope.
    pub fn scoped(&self, name: &str) -> String {
        if self.segments.is_empty() {
            name.to_string()
        } else {
            format!("{}.{}", self.segments.join("."), name)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_tuple_same_id() {
        let a = EntityId::generate("gh/o/r", "pkg/a", NodeKind::Function, "src/x.ts", "f");
        let b = EntityId::generate("gh/o/r", "pkg/a", NodeKind::Function, "src/x.ts", "f");
        assert_eq!(a, b);
        assert_eq!(a.to_string(), b.to_string());
    }

    #[test]
    fn distinct_tuples_distinct_ids() {
        let a = EntityId::generate("gh/o/r", "pkg/a", NodeKind::Function, "src/x.ts", "f");
        let b = EntityId::generate("gh/o/r", "pkg/a", NodeKind::Method, "src/x.ts", "f");
        let c = EntityId::generate("gh/o/r", "pkg/a", NodeKind::Function, "src/y.ts", "f");
        assert_ne!(a.scope_hash, b.scope_hash);
        assert_ne!(a.scope_hash, c.scope_hash);
    }

    #[test]
    fn path_normalization_is_identity_preserving() {
        let a = EntityId::generate("gh/o/r", "pkg", NodeKind::Class, "src\\x.ts", " Svc ");
        let b = EntityId::generate("gh/o/r", "pkg", NodeKind::Class, "src/x.ts", "Svc");
        assert_eq!(a, b);
        // Case is preserved, not folded.
        let c = EntityId::generate("gh/o/r", "pkg", NodeKind::Class, "src/X.ts", "Svc");
        assert_ne!(b.scope_hash, c.scope_hash);
    }

    #[test]
    fn parse_recovers_components() {
        let id = EntityId::generate(
            "github.com/org/repo",
            "packages/core",
            NodeKind::Method,
            "src/user.ts",
            "UserService.get_user",
        );
        let parsed = EntityId::parse(&id.to_string()).unwrap();
        assert_eq!(parsed.repo, "github.com/org/repo");
        assert_eq!(parsed.package_path, "packages/core");
        assert_eq!(parsed.kind, NodeKind::Method);
        assert_eq!(parsed.scope_hash, id.scope_hash);
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(EntityId::parse("").is_none());
        assert!(EntityId::parse("no-separators").is_none());
        assert!(EntityId::parse("a:b").is_none());
    }

    #[test]
    fn unresolved_sentinel_roundtrip() {
        let sentinel = unresolved("BaseService");
        assert_eq!(sentinel, "unresolved:BaseService");
        assert!(is_unresolved(&sentinel));
        assert_eq!(unresolved_symbol(&sentinel), Some("BaseService"));
        assert!(!is_unresolved("repo:pkg:class:0011223344556677"));
    }

    #[test]
    fn scope_path_builds_nested_names() {
        let mut scope = ScopePath::new();
        assert_eq!(scope.scoped("free"), "free");
        scope.push("Outer");
        assert_eq!(scope.scoped("Inner"), "Outer.Inner");
        scope.push("Inner");
        assert_eq!(scope.scoped("helper"), "Outer.Inner.helper");
        scope.pop();
        assert_eq!(scope.scoped("method"), "Outer.method");
    }
}
