//! Statement execution engine.
//!
//! This module runs already-rendered SQL against a [`Handle`]:
//! - execute without a result set
//! - single-row fetch, translating "no rows" into `NotFound`
//! - streaming multi-row fetch, decoding each row as it arrives
//!
//! Every round trip is bounded by the statement timeout. Statements without
//! parameters go through the simple query protocol so that utility commands
//! and multi-statement scripts work.

use crate::bind::BindValue;
use crate::config::DEFAULT_STATEMENT_TIMEOUT_SECS;
use crate::db::macros::with_executor;
use crate::db::params::build_query;
use crate::error::{DalError, DalResult};
use futures_util::TryStreamExt;
use sqlx::postgres::PgRow;
use sqlx::{Executor, PgPool, Postgres, Transaction};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::debug;

/// Transaction shared by a connection and its forks. `None` once finished.
pub(crate) type SharedTx = Arc<Mutex<Option<Transaction<'static, Postgres>>>>;

/// What statements run on: the pool, or one open transaction.
#[derive(Clone)]
pub(crate) enum Handle {
    Pool(PgPool),
    Tx(SharedTx),
}

impl std::fmt::Debug for Handle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Handle::Pool(pool) => f.debug_tuple("Pool").field(pool).finish(),
            Handle::Tx(_) => f.debug_tuple("Tx").finish_non_exhaustive(),
        }
    }
}

/// Query executor that runs statements on a handle.
#[derive(Debug, Clone, Copy)]
pub struct QueryExecutor {
    statement_timeout: Duration,
}

impl QueryExecutor {
    /// Create a new query executor with the default timeout.
    pub fn new() -> Self {
        Self::with_timeout(Duration::from_secs(DEFAULT_STATEMENT_TIMEOUT_SECS))
    }

    /// Create a new query executor with a custom timeout.
    pub fn with_timeout(statement_timeout: Duration) -> Self {
        Self { statement_timeout }
    }

    pub fn statement_timeout(&self) -> Duration {
        self.statement_timeout
    }

    /// Execute a statement and return the number of affected rows.
    pub(crate) async fn execute(
        &self,
        handle: &Handle,
        sql: &str,
        params: &[BindValue],
    ) -> DalResult<u64> {
        debug!(sql = %sql, params = params.len(), "Executing statement");
        self.bounded("execute", execute_inner(handle, sql, params))
            .await
    }

    /// Fetch exactly one row.
    pub(crate) async fn fetch_one(
        &self,
        handle: &Handle,
        sql: &str,
        params: &[BindValue],
    ) -> DalResult<PgRow> {
        debug!(sql = %sql, params = params.len(), "Fetching one row");
        self.bounded("query row", fetch_one_inner(handle, sql, params))
            .await
    }

    /// Stream every row into `on_row`, stopping at the first error.
    ///
    /// Returns the number of rows decoded.
    pub(crate) async fn fetch_each<F>(
        &self,
        handle: &Handle,
        sql: &str,
        params: &[BindValue],
        on_row: F,
    ) -> DalResult<u64>
    where
        F: FnMut(&PgRow) -> DalResult<()>,
    {
        debug!(sql = %sql, params = params.len(), "Fetching rows");
        self.bounded("query", fetch_each_inner(handle, sql, params, on_row))
            .await
    }

    async fn bounded<T>(
        &self,
        operation: &str,
        fut: impl Future<Output = DalResult<T>>,
    ) -> DalResult<T> {
        match timeout(self.statement_timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(DalError::timeout(
                operation,
                self.statement_timeout.as_secs(),
            )),
        }
    }
}

impl Default for QueryExecutor {
    fn default() -> Self {
        Self::new()
    }
}

async fn execute_inner(handle: &Handle, sql: &str, params: &[BindValue]) -> DalResult<u64> {
    let result = with_executor!(handle, |exec| {
        if params.is_empty() {
            exec.execute(sql).await?
        } else {
            build_query(sql, params).execute(exec).await?
        }
    });
    Ok(result.rows_affected())
}

async fn fetch_one_inner(handle: &Handle, sql: &str, params: &[BindValue]) -> DalResult<PgRow> {
    let row = with_executor!(handle, |exec| {
        if params.is_empty() {
            exec.fetch_one(sql).await
        } else {
            build_query(sql, params).fetch_one(exec).await
        }
    });
    row.map_err(DalError::from_row_scan)
}

async fn fetch_each_inner<F>(
    handle: &Handle,
    sql: &str,
    params: &[BindValue],
    mut on_row: F,
) -> DalResult<u64>
where
    F: FnMut(&PgRow) -> DalResult<()>,
{
    with_executor!(handle, |exec| {
        let mut rows = if params.is_empty() {
            exec.fetch(sql)
        } else {
            build_query(sql, params).fetch(exec)
        };
        let mut count = 0;
        while let Some(row) = rows.try_next().await? {
            on_row(&row)?;
            count += 1;
        }
        Ok(count)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_executor_defaults() {
        let executor = QueryExecutor::new();
        assert_eq!(
            executor.statement_timeout(),
            Duration::from_secs(DEFAULT_STATEMENT_TIMEOUT_SECS)
        );
    }

    #[test]
    fn test_executor_custom_timeout() {
        let executor = QueryExecutor::with_timeout(Duration::from_secs(5));
        assert_eq!(executor.statement_timeout(), Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_timeout_reported() {
        let executor = QueryExecutor::with_timeout(Duration::from_millis(10));
        let result: DalResult<()> = executor
            .bounded("sleep", async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(())
            })
            .await;
        assert!(matches!(result, Err(DalError::Timeout { .. })));
    }
}
