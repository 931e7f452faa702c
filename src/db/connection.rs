//! CRUD dispatcher.
//!
//! A [`Connection`] pairs a handle (the pool or an open transaction) with a
//! bind store. Every operation has the same shape: ask the capability for SQL
//! (which binds its variables as a side effect), expand the template, run it,
//! and decode rows into the reader.
//!
//! # Example
//!
//! ```ignore
//! let conn = Connection::new(pool);
//! let mut widget = Widget::default();
//! conn.insert(&mut widget, &NewWidget { value: "a".into() }).await?;
//! conn.get(&mut widget, &ById(widget.id)).await?;
//! ```

use crate::bind::{BindValue, Vars, prepare};
use crate::capability::{Reader, Selector, Writer};
use crate::config::{DEFAULT_LIST_MAX, DEFAULT_STATEMENT_TIMEOUT_SECS};
use crate::db::executor::{Handle, QueryExecutor, SharedTx};
use crate::error::{DalError, DalResult};
use crate::models::{GROUP_BY_KEY, OFFSET_LIMIT_KEY, ORDER_BY_KEY, OffsetLimit, Operation};
use sqlx::{PgPool, Postgres, Row};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Runtime options shared by a connection and everything derived from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionOptions {
    /// Upper bound on any single round trip
    pub statement_timeout: Duration,
    /// Server-side maximum for List page sizes
    pub list_max: u64,
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        Self {
            statement_timeout: Duration::from_secs(DEFAULT_STATEMENT_TIMEOUT_SECS),
            list_max: DEFAULT_LIST_MAX,
        }
    }
}

/// One logical database session.
///
/// Cloning shares the bind store; [`Connection::with`] and [`Connection::tx`]
/// fork it instead. Statements issued through forks of the same transaction
/// run one at a time on the shared transaction.
#[derive(Debug, Clone)]
pub struct Connection {
    handle: Handle,
    vars: Arc<Vars>,
    executor: QueryExecutor,
    options: ConnectionOptions,
    depth: u32,
}

impl Connection {
    /// Create a connection that runs statements directly on the pool.
    pub fn new(pool: PgPool) -> Self {
        Self::with_options(pool, ConnectionOptions::default())
    }

    pub fn with_options(pool: PgPool, options: ConnectionOptions) -> Self {
        Self {
            handle: Handle::Pool(pool),
            vars: Arc::new(Vars::new()),
            executor: QueryExecutor::with_timeout(options.statement_timeout),
            options,
            depth: 0,
        }
    }

    /// The bind store used by this connection.
    pub fn vars(&self) -> &Vars {
        &self.vars
    }

    pub fn options(&self) -> &ConnectionOptions {
        &self.options
    }

    /// Transaction nesting depth: 0 outside a transaction, 1 for the
    /// outermost transaction, one more per savepoint.
    pub fn depth(&self) -> u32 {
        self.depth
    }

    pub fn in_transaction(&self) -> bool {
        matches!(self.handle, Handle::Tx(_))
    }

    /// Fork this connection with `pairs` overlaid on a copy of the bind store.
    ///
    /// The fork shares the handle, so it is still inside the same transaction.
    pub fn with<K, V>(&self, pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<BindValue>,
    {
        Self {
            handle: self.handle.clone(),
            vars: Arc::new(self.vars.fork(pairs)),
            executor: self.executor,
            options: self.options,
            depth: self.depth,
        }
    }

    /// Insert a record and read back the row the statement returns.
    pub async fn insert<R, W>(&self, reader: &mut R, writer: &W) -> DalResult<()>
    where
        R: Reader + ?Sized,
        W: Writer + ?Sized,
    {
        let sql = writer.insert(&self.vars)?;
        let row = self.fetch_one(Operation::Insert, &sql).await?;
        reader.scan(&row)
    }

    /// Update the selected record with the writer's changes.
    pub async fn patch<R, S, W>(&self, reader: &mut R, selector: &S, writer: &W) -> DalResult<()>
    where
        R: Reader + ?Sized,
        S: Selector + ?Sized,
        W: Writer + ?Sized,
    {
        let sql = selector.select(Operation::Patch, &self.vars)?;
        writer.patch(&self.vars)?;
        let row = self.fetch_one(Operation::Patch, &sql).await?;
        reader.scan(&row)
    }

    /// Delete the selected record, reading back the row it returns.
    pub async fn delete<R, S>(&self, reader: &mut R, selector: &S) -> DalResult<()>
    where
        R: Reader + ?Sized,
        S: Selector + ?Sized,
    {
        let sql = selector.select(Operation::Delete, &self.vars)?;
        let row = self.fetch_one(Operation::Delete, &sql).await?;
        reader.scan(&row)
    }

    /// Read the selected record.
    pub async fn get<R, S>(&self, reader: &mut R, selector: &S) -> DalResult<()>
    where
        R: Reader + ?Sized,
        S: Selector + ?Sized,
    {
        let sql = selector.select(Operation::Get, &self.vars)?;
        let row = self.fetch_one(Operation::Get, &sql).await?;
        reader.scan(&row)
    }

    /// Read every row of the selected list. Returns the number of rows read.
    ///
    /// The group-by, order-by and offset/limit fragments are reset before the
    /// selector runs, then appended to its statement in that order. Readers
    /// that are also [`ListReader`](crate::capability::ListReader)s first
    /// receive the total count, computed without ordering or pagination.
    pub async fn list<R, S>(&self, reader: &mut R, selector: &S) -> DalResult<u64>
    where
        R: Reader + ?Sized,
        S: Selector + ?Sized,
    {
        self.reset_list_fragments();
        let base = selector.select(Operation::List, &self.vars)?;
        self.run_list(reader, &base).await
    }

    /// Like [`Connection::list`], binding `page` after the selector runs,
    /// clamped to the configured list maximum.
    pub async fn list_page<R, S>(
        &self,
        reader: &mut R,
        selector: &S,
        page: &mut OffsetLimit,
    ) -> DalResult<u64>
    where
        R: Reader + ?Sized,
        S: Selector + ?Sized,
    {
        self.reset_list_fragments();
        let base = selector.select(Operation::List, &self.vars)?;
        page.bind(&self.vars, self.options.list_max);
        self.run_list(reader, &base).await
    }

    fn reset_list_fragments(&self) {
        for key in [GROUP_BY_KEY, ORDER_BY_KEY, OFFSET_LIMIT_KEY] {
            self.vars.set(key, "");
        }
    }

    async fn run_list<R>(&self, reader: &mut R, base: &str) -> DalResult<u64>
    where
        R: Reader + ?Sized,
    {
        if let Some(counter) = reader.as_list_reader() {
            let row = self.fetch_one(Operation::List, &count_template(base)).await?;
            counter.scan_count(&row)?;
        }

        let template =
            format!("{base} ${{{GROUP_BY_KEY}}} ${{{ORDER_BY_KEY}}} ${{{OFFSET_LIMIT_KEY}}}");
        let (sql, params) = prepare(&template, &self.vars);
        debug!(operation = %Operation::List, "Dispatching statement");
        self.executor
            .fetch_each(&self.handle, &sql, &params, |row| reader.scan(row))
            .await
    }

    /// Count the rows the selector's List statement matches, ignoring ordering
    /// and pagination.
    pub async fn count<S>(&self, selector: &S) -> DalResult<i64>
    where
        S: Selector + ?Sized,
    {
        self.reset_list_fragments();
        let base = selector.select(Operation::List, &self.vars)?;
        self.fetch_scalar(&count_template(&base)).await
    }

    /// Run a query returning one row and decode its first column.
    pub async fn fetch_scalar<T>(&self, query: &str) -> DalResult<T>
    where
        T: for<'r> sqlx::Decode<'r, Postgres> + sqlx::Type<Postgres>,
    {
        let row = self.fetch_one(Operation::None, query).await?;
        Ok(row.try_get(0)?)
    }

    /// Execute a statement that returns no rows. Returns the affected row count.
    pub async fn exec(&self, query: &str) -> DalResult<u64> {
        let (sql, params) = prepare(query, &self.vars);
        self.executor.execute(&self.handle, &sql, &params).await
    }

    /// Run `f` inside a transaction.
    ///
    /// Outside a transaction this begins one; inside, it opens a savepoint.
    /// `f` receives a connection bound to the transaction with a forked bind
    /// store. An `Err` from `f` rolls back and is returned (joined with the
    /// rollback error if that fails too); otherwise the transaction commits.
    pub async fn tx<T, F, Fut>(&self, f: F) -> DalResult<T>
    where
        F: FnOnce(Connection) -> Fut,
        Fut: Future<Output = DalResult<T>>,
    {
        let (child, scope) = self.begin().await?;
        let depth = child.depth;

        match f(child).await {
            Ok(value) => {
                scope.commit(&self.executor).await?;
                info!(depth, "Transaction committed");
                Ok(value)
            }
            Err(err) => match scope.rollback(&self.executor).await {
                Ok(()) => {
                    info!(depth, error = %err, "Transaction rolled back");
                    Err(err)
                }
                Err(rollback) => {
                    warn!(depth, error = %err, rollback_error = %rollback, "Rollback failed");
                    Err(DalError::rollback(err, rollback))
                }
            },
        }
    }

    async fn begin(&self) -> DalResult<(Connection, TxScope)> {
        let depth = self.depth + 1;
        let (shared, scope) = match &self.handle {
            Handle::Pool(pool) => {
                let tx = pool.begin().await?;
                let shared: SharedTx = Arc::new(Mutex::new(Some(tx)));
                (Arc::clone(&shared), TxScope::Root(shared))
            }
            Handle::Tx(shared) => {
                let name = format!("pgbind_sp_{depth}");
                self.executor
                    .execute(&self.handle, &format!("SAVEPOINT {name}"), &[])
                    .await?;
                let scope = TxScope::Savepoint {
                    handle: self.handle.clone(),
                    name,
                };
                (Arc::clone(shared), scope)
            }
        };
        info!(depth, "Transaction started");

        let child = Self {
            handle: Handle::Tx(shared),
            vars: Arc::new(self.vars.fork(std::iter::empty::<(String, BindValue)>())),
            executor: self.executor,
            options: self.options,
            depth,
        };
        Ok((child, scope))
    }

    /// Publish `payload` on `channel` via `pg_notify`.
    ///
    /// Inside a transaction the notification is delivered on commit.
    pub async fn notify(&self, channel: &str, payload: &str) -> DalResult<()> {
        if channel.is_empty() {
            return Err(DalError::bad_parameter("notification channel must not be empty"));
        }
        let vars = Vars::from_pairs([("channel", channel), ("payload", payload)]);
        let (sql, params) = prepare("SELECT pg_notify(@channel, @payload)", &vars);
        self.executor.execute(&self.handle, &sql, &params).await?;
        Ok(())
    }

    /// Server process id of the session serving this handle.
    pub async fn backend_pid(&self) -> DalResult<i32> {
        let row = self
            .executor
            .fetch_one(&self.handle, "SELECT pg_backend_pid() AS pid", &[])
            .await?;
        Ok(row.try_get("pid")?)
    }

    /// Cancel the running query of backend `pid`. Returns the server's verdict.
    pub async fn cancel_backend(&self, pid: i32) -> DalResult<bool> {
        self.signal_backend("pg_cancel_backend", pid).await
    }

    /// Terminate backend `pid`. Returns the server's verdict.
    pub async fn terminate_backend(&self, pid: i32) -> DalResult<bool> {
        self.signal_backend("pg_terminate_backend", pid).await
    }

    async fn signal_backend(&self, function: &str, pid: i32) -> DalResult<bool> {
        if pid == 0 {
            return Err(DalError::bad_parameter("backend pid must be non-zero"));
        }
        let vars = Vars::from_pairs([("pid", pid)]);
        let (sql, params) = prepare(&format!("SELECT {function}(@pid::int) AS ok"), &vars);
        let row = self.executor.fetch_one(&self.handle, &sql, &params).await?;
        Ok(row.try_get("ok")?)
    }

    async fn fetch_one(&self, operation: Operation, template: &str) -> DalResult<sqlx::postgres::PgRow> {
        let (sql, params) = prepare(template, &self.vars);
        debug!(operation = %operation, "Dispatching statement");
        self.executor.fetch_one(&self.handle, &sql, &params).await
    }
}

fn count_template(base: &str) -> String {
    format!("WITH sq AS ({base} ${{{GROUP_BY_KEY}}}) SELECT COUNT(*) AS \"count\" FROM sq")
}

/// How a transaction opened by [`Connection::tx`] is finished.
enum TxScope {
    Root(SharedTx),
    Savepoint { handle: Handle, name: String },
}

impl TxScope {
    async fn commit(self, executor: &QueryExecutor) -> DalResult<()> {
        match self {
            TxScope::Root(shared) => {
                let tx = shared.lock().await.take().ok_or(DalError::TransactionClosed)?;
                tx.commit().await?;
            }
            TxScope::Savepoint { handle, name } => {
                executor
                    .execute(&handle, &format!("RELEASE SAVEPOINT {name}"), &[])
                    .await?;
            }
        }
        Ok(())
    }

    async fn rollback(self, executor: &QueryExecutor) -> DalResult<()> {
        match self {
            TxScope::Root(shared) => {
                let tx = shared.lock().await.take().ok_or(DalError::TransactionClosed)?;
                tx.rollback().await?;
            }
            TxScope::Savepoint { handle, name } => {
                executor
                    .execute(&handle, &format!("ROLLBACK TO SAVEPOINT {name}"), &[])
                    .await?;
            }
        }
        Ok(())
    }
}
