//! A driver wrapper recording the statements that reach the database.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use query_engine_execution::driver::{Driver, DriverError};
use query_engine_metadata::metadata::DialectName;
use query_engine_sql::sql::execution_plan::CompiledStatement;
use query_engine_sql::sql::string::WireValue;

/// Wraps a driver, recording every statement it is asked to run. Statements can
/// be made to fail or to stall when their text contains a given fragment.
pub struct CountingDriver<D> {
    inner: D,
    dialect: Option<DialectName>,
    fail_matching: Option<String>,
    delay_matching: Option<(String, Duration)>,
    statements: Mutex<Vec<String>>,
}

impl<D: Driver> CountingDriver<D> {
    pub fn new(inner: D) -> Self {
        Self {
            inner,
            dialect: None,
            fail_matching: None,
            delay_matching: None,
            statements: Mutex::new(vec![]),
        }
    }

    /// Report another dialect than the wrapped driver's.
    pub fn with_dialect(mut self, dialect: DialectName) -> Self {
        self.dialect = Some(dialect);
        self
    }

    /// Fail statements whose text contains `fragment`.
    pub fn fail_matching(mut self, fragment: &str) -> Self {
        self.fail_matching = Some(fragment.to_string());
        self
    }

    /// Stall statements whose text contains `fragment`.
    pub fn delay_matching(mut self, fragment: &str, delay: Duration) -> Self {
        self.delay_matching = Some((fragment.to_string(), delay));
        self
    }

    /// The text of every statement run so far, in order.
    pub fn statements(&self) -> Vec<String> {
        self.statements
            .lock()
            .expect("statement log poisoned")
            .clone()
    }

    pub fn statement_count(&self) -> usize {
        self.statements().len()
    }

    async fn intercept(&self, statement: &CompiledStatement) -> Result<(), DriverError> {
        self.statements
            .lock()
            .expect("statement log poisoned")
            .push(statement.sql.clone());
        if let Some((fragment, delay)) = &self.delay_matching {
            if statement.sql.contains(fragment.as_str()) {
                tokio::time::sleep(*delay).await;
            }
        }
        match &self.fail_matching {
            Some(fragment) if statement.sql.contains(fragment.as_str()) => Err(DriverError::Other(
                format!("statement matching '{fragment}' refused"),
            )),
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl<D: Driver> Driver for CountingDriver<D> {
    fn dialect_name(&self) -> DialectName {
        self.dialect.unwrap_or_else(|| self.inner.dialect_name())
    }

    async fn fetch_all(
        &self,
        statement: &CompiledStatement,
    ) -> Result<Vec<Vec<WireValue>>, DriverError> {
        self.intercept(statement).await?;
        self.inner.fetch_all(statement).await
    }

    async fn execute(&self, statement: &CompiledStatement) -> Result<u64, DriverError> {
        self.intercept(statement).await?;
        self.inner.execute(statement).await
    }
}
