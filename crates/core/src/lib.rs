//! Domain types for the scan database diagnostics: identifiers and scope,
//! the collection registry, the read-only store contract, diagnostics
//! records and the pipe-delimited report renderer.

pub mod collections;
pub mod diagnostics;
pub mod error;
pub mod report;
pub mod store;
pub mod types;
