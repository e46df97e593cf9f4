//! Storage traits and shared key layout.
//!
//! This crate defines the transactional key-value substrate the engines
//! run on, the bucket/key layout shared by every substrate implementation,
//! and the write overlay used by the batch mutator.
//!
//! # Design
//!
//! The engines are pure functions over scopes: they receive a
//! [`KeyReader`] or [`KeyWriter`] and never open transactions themselves.
//! Scope lifecycle (snapshotting, atomic commit, rollback) belongs to the
//! substrate behind [`StorageReader`] / [`StorageWriter`].

#![warn(missing_docs)]

pub mod keys;
mod overlay;
mod store;

pub use keys::TreeRole;
pub use overlay::{replay, WriteOp, WriteOverlay};
pub use store::{KeyReader, KeyWriter, StorageReader, StorageWriter};
