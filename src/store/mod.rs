//! Relational store abstraction.
//!
//! The loaded dataset is projected into a single-table embedded SQL store.
//! The `DataStore` trait is the seam the pipeline executes validated
//! queries through; `SqliteStore` is the real backing, the mocks exist for
//! tests.

mod mock;
mod sqlite;
mod types;

pub use mock::{FailingDataStore, MockDataStore};
pub use sqlite::SqliteStore;
pub use types::ExecutionResult;

use async_trait::async_trait;

use crate::error::Result;

/// A SQL-executing backend over the loaded dataset.
#[async_trait]
pub trait DataStore: Send + Sync {
    /// Executes a read-only query and returns columns plus rows, truncated
    /// at the configured row cap.
    ///
    /// Callers must only pass statements that passed safety validation;
    /// the store itself does not re-validate.
    async fn execute_query(&self, sql: &str) -> Result<ExecutionResult>;

    /// Closes the store and releases its resources.
    async fn close(&self) -> Result<()>;
}
