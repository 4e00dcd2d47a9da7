//! Search layer facade.
//!
//! - **[`document`]**: projection of a student into its indexed document.
//! - **[`query`]**: raw text + structured filters compiled into a [`query::CompiledQuery`].
//! - **[`visibility`]**: instructor privileges reduced to the visible course set.
//! - **[`tantivy`]**: the tantivy-backed index collaborator and its schema.
//! - **[`service`]**: the orchestrator tying the above to the student store.
//! - **[`error`]**: service and search error types.

pub mod document;
pub mod error;
pub mod query;
pub mod service;
pub mod tantivy;
pub mod visibility;
