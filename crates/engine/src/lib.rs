//! Merkle tree engines and the mutation applier.
//!
//! This crate holds the storage-level core of the service:
//!
//! - [`log`] - the append-only Merkle log: appends, tree hashes, RFC 6962
//!   inclusion and consistency proofs, plus client-side verifiers
//! - [`map`] - the sparse 256-bit Merkle prefix tree: updates, audit
//!   paths, plus a client-side verifier
//! - [`apply`] - the mutation applier that dispatches one queued
//!   [`Mutation`](vds_types::Mutation) to the engines inside a transaction
//!
//! Everything here is a pure function over a storage scope. Transaction
//! lifecycle belongs to the substrate; batching and ordering belong to the
//! mutator.

#![warn(missing_docs)]

pub mod apply;
pub mod log;
pub mod map;

pub use apply::{apply_mutation, object_info, read_object_size, require_object, write_object_size};
pub use log::{AppendOutcome, DuplicatePolicy};
