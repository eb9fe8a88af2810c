//! Storage infrastructure - run store implementations

mod factory;
mod in_memory;
pub mod migrations;
mod postgres;

pub use factory::{RunStoreFactory, StorageConfig, StorageType};
pub use in_memory::InMemoryRunStore;
pub use migrations::{run_workflow_migrations, workflow_migrations, Migration, Migrator, PostgresMigrator};
pub use postgres::{PostgresConfig, PostgresRunStore};
