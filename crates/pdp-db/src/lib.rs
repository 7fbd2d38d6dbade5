//! The persistence layer: every table in the data model behind an async
//! facade ([`PdpDb`]) backed by a pooled, diesel-managed Postgres
//! connection, the way `aptos-indexer` hosts diesel for its own tables.

pub mod db;
pub mod models;
pub mod pool;
pub mod repo;
pub mod schema;

pub use db::PdpDb;
pub use pool::{establish_pool, run_migrations, DbError, PgPool, PgPooledConnection};
