//! Write-path serialization for verifiable objects.
//!
//! All mutations flow through one [`BatchMutator`] per process. It owns
//! the write path for every namespace it serves: a bounded channel feeds a
//! dedicated consumer thread that groups same-namespace mutations into
//! short-lived transactions bounded by count and time.
//!
//! # Driving modes
//!
//! - **Batched** (default config): long-running hashing happens under a
//!   read-only scope with an in-memory overlay; a short write scope
//!   replays the accumulated writes at commit.
//! - **Instant** ([`MutatorConfig::instant`]): one mutation per
//!   transaction, the degenerate batch of size one.

#![warn(missing_docs)]

mod batch;

pub use batch::{BatchMutator, MutationPromise, MutatorConfig};
