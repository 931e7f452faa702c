//! Executor dispatch macro.
//!
//! A [`Handle`](crate::db::executor::Handle) is either the shared pool or a
//! shared transaction. The two executors have different types, so statement
//! code is written once and expanded for each arm.

/// Run `$body` with `$exec` bound to the executor behind `$handle`.
///
/// For a transaction handle the lock is held for the whole body, which
/// serializes statements issued through forks of the same transaction. Must
/// be used inside a function returning `DalResult`.
///
/// # Example
///
/// ```ignore
/// with_executor!(&self.handle, |exec| {
///     exec.execute("SELECT 1").await?;
/// });
/// ```
macro_rules! with_executor {
    ($handle:expr, |$exec:ident| $body:expr) => {
        match $handle {
            $crate::db::executor::Handle::Pool(pool) => {
                let $exec = pool;
                $body
            }
            $crate::db::executor::Handle::Tx(shared) => {
                let mut guard = shared.lock().await;
                let tx = guard
                    .as_mut()
                    .ok_or($crate::error::DalError::TransactionClosed)?;
                let $exec = &mut **tx;
                $body
            }
        }
    };
}

pub(crate) use with_executor;
