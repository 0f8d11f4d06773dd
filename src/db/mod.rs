//! Document store on SQLite.
//!
//! Layout:
//! - `connection.rs`: bounded connect + ping, the shared [`Database`] handle
//! - `collection.rs`: typed collection handles (find / insert / replace / delete)
//! - `filter.rs`: equality filters compiled to `json_extract` predicates
//! - `index.rs`: index declarations and introspection types
//! - `feed.rs`: in-process change feed fed by every collection write
//! - `schema.rs`: DDL and identifier validation

pub mod collection;
pub mod connection;
pub mod feed;
pub mod filter;
pub mod index;
pub mod schema;

pub use collection::{Collection, Document};
pub use connection::{Database, connect};
pub use feed::ChangeStream;
pub use filter::Filter;
pub use index::{Direction, IndexInfo, IndexKey, IndexSpec};
