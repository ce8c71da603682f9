//! Subscription registry: who is subscribed to what.
//!
//! Every mutation is a whole-table read-modify-write serialized behind a
//! single writer. The canonical backend keeps the table in one JSON file at
//! `<data_dir>/registry.json` and publishes changes with an atomic rename;
//! SQLite and in-memory backends implement the same [`RegistryStore`] contract.

pub mod error;
pub mod store;
pub mod store_file;
pub mod store_memory;
pub mod store_sqlite;
pub mod table;
pub mod types;

pub use {
    error::{Error, Result},
    store::RegistryStore,
    store_file::FileRegistry,
    store_memory::InMemoryRegistry,
    store_sqlite::SqliteRegistry,
    types::{Subscription, UpsertOutcome},
};

/// Run database migrations for the registry crate.
///
/// Creates the `subscriptions` table. Called by [`SqliteRegistry::new`]; call
/// it yourself before [`SqliteRegistry::with_pool`] on a shared pool.
pub async fn run_migrations(pool: &sqlx::SqlitePool) -> Result<()> {
    sqlx::migrate!("./migrations")
        .set_ignore_missing(true)
        .run(pool)
        .await?;
    Ok(())
}
