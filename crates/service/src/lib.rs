//! Service facade for verifiable logs and maps.
//!
//! Ties the layers together: every request is authorized against the
//! [`AuthorizationOracle`], reads run in one read-only scope against the
//! engines, and writes are serialized through the
//! [`BatchMutator`](vds_mutator::BatchMutator).
//!
//! A map's two internal logs are exposed through the same read surface,
//! addressed by [`LogKind`](vds_types::LogKind) - transports typically map
//! `/log/mutation` and `/log/treehead` URL suffixes onto it.

#![warn(missing_docs)]

mod auth;
mod service;

pub use auth::{AuthorizationOracle, OpenAccess};
pub use service::{ConsistencyProof, InclusionProof, LeafLocator, LocalService, MapValue};
