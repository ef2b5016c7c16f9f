//! Mock data stores for testing.

use async_trait::async_trait;

use crate::dataset::Value;
use crate::error::{Result, TabletalkError};
use crate::store::{DataStore, ExecutionResult};

/// Mock store that returns a canned result for every query.
#[derive(Debug, Clone, Default)]
pub struct MockDataStore {
    result: ExecutionResult,
}

impl MockDataStore {
    /// Creates a mock store returning an empty result.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a mock store returning the given result.
    pub fn with_result(result: ExecutionResult) -> Self {
        Self { result }
    }

    /// Creates a mock store returning a small two-column result.
    pub fn with_sample_rows() -> Self {
        Self::with_result(ExecutionResult::with_data(
            vec!["status".to_string(), "avg_amount".to_string()],
            vec![
                vec![Value::from("open"), Value::Float(5.0)],
                vec![Value::from("paid"), Value::Float(8.75)],
            ],
        ))
    }
}

#[async_trait]
impl DataStore for MockDataStore {
    async fn execute_query(&self, _sql: &str) -> Result<ExecutionResult> {
        Ok(self.result.clone())
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

/// Mock store whose every query fails, for exercising failure paths.
#[derive(Debug, Clone, Default)]
pub struct FailingDataStore;

impl FailingDataStore {
    /// Creates a new failing store.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl DataStore for FailingDataStore {
    async fn execute_query(&self, _sql: &str) -> Result<ExecutionResult> {
        Err(TabletalkError::execution("Simulated query failure"))
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}
