//! Core types for the verifiable data structures service.
//!
//! This crate provides the foundational types used throughout the
//! implementation:
//!
//! - **Primitives**: SHA-256 [`Hash`] with RFC 6962 domain separation,
//!   the empty-subtree table for the sparse map tree
//! - **Identity**: accounts, object names, kinds and derived namespaces
//! - **Records**: tree heads, object info and the [`Mutation`] enum whose
//!   SBOR encoding is the canonical mutation-log entry
//! - **Errors**: the service-wide [`Error`] enum
//!
//! # Design Philosophy
//!
//! This crate is self-contained with minimal dependencies. It does not
//! depend on any other workspace crates, making it the foundation layer.

#![warn(missing_docs)]

mod empty;
mod error;
mod hash;
mod mutation;
mod object;
mod records;

pub use empty::{empty_subtree, MAP_DEPTH};
pub use error::{Error, Result};
pub use hash::{Hash, HexError};
pub use mutation::Mutation;
pub use object::{LogKind, Namespace, ObjectId, ObjectKind, Permission};
pub use records::{EntryRecord, MapHead, MapTreeHead, ObjectInfo, TreeHead};
