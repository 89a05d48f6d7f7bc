//! Shellhub Document Index
//!
//! Durable keyset-paginated index of document metadata backed by SQLite,
//! the in-memory content cache, and the hierarchy resolver that walks
//! cross-document references.

mod cache;
mod error;
pub mod filter;
mod hierarchy;
mod index;
mod schema;
mod store;

pub use cache::ContentCache;
pub use error::IndexError;
pub use filter::{CompiledFilter, Filter};
pub use hierarchy::{child_ids, ContentLoader, HierarchyNode, HierarchyResolver, HIERARCHY_SEMANTIC_IDS};
pub use index::DocumentIndex;
pub use store::Store;
