//! Seed storage: the persisted per-package graph partition set.
//!
//! A seed lives under `<package>/.devac/seed` as branch-partitioned Parquet
//! files plus a `meta.json`. [`writer::SeedWriter`] mutates it under an
//! exclusive per-seed lock with an atomic tmp-file/rename/fsync commit
//! protocol; [`reader::SeedReader`] exposes the partitions as queryable
//! relations and a filtered effect iterator.

pub mod layout;
pub mod lock;
pub mod meta;
pub mod partition;
pub mod reader;
pub mod resolver;
pub mod scratch;
pub mod writer;
