//! The federation hub: one index database that registers per-package seeds,
//! unions their partitions into queryable views, caches query results, and
//! tracks cross-repo validation diagnostics.
//!
//! The hub is a handle ([`FederationHub`]), never ambient state: callers own
//! it and pass it where needed. The hub database has a single writer; seed
//! queries run on throwaway scratch connections.

pub mod affected;
pub mod db;
pub mod diagnostics;
pub mod manifest;
pub mod query;
pub mod registry;

pub use db::{FederationHub, HubOptions};
