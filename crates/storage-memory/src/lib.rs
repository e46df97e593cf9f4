//! In-memory substrate implementation.
//!
//! Implements the `vds-storage` scope traits over `im::OrdMap` with
//! structural-sharing snapshots. Suitable for tests and small embedded
//! deployments; durable backends implement the same traits elsewhere.

#![warn(missing_docs)]

mod storage;

pub use storage::MemoryStore;
