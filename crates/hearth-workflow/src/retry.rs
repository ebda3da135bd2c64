use tracing::{error, warn};

use crate::error::{WorkflowError, WorkflowResult};

/// Run a store call, retrying it once if SQLite reported the database busy or
/// locked. Any other failure is surfaced straight away: constraint errors and
/// the like give the same answer on a second run, and a write whose read-back
/// failed may already have landed. There is no backoff and no idempotency key.
pub(crate) fn retry_once<T>(
    what: &str,
    mut op: impl FnMut() -> anyhow::Result<T>,
) -> WorkflowResult<T> {
    match op() {
        Ok(v) => Ok(v),
        Err(first) if hearth_db::is_transient(&first) => {
            warn!("{} hit a busy database, retrying once: {:#}", what, first);
            op().map_err(|e| {
                error!("{} failed again: {:#}", what, e);
                WorkflowError::Store(e)
            })
        }
        Err(e) => {
            error!("{} failed: {:#}", what, e);
            Err(WorkflowError::Store(e))
        }
    }
}

#[cfg(test)]
mod tests {
    use rusqlite::ffi;

    use super::*;

    fn busy() -> anyhow::Error {
        rusqlite::Error::SqliteFailure(ffi::Error::new(ffi::SQLITE_BUSY), None).into()
    }

    #[test]
    fn busy_database_gets_a_second_attempt() {
        let mut calls = 0;
        let out = retry_once("flaky write", || {
            calls += 1;
            if calls == 1 {
                return Err(busy());
            }
            Ok(calls)
        });
        assert_eq!(out.unwrap(), 2);
    }

    #[test]
    fn gives_up_after_one_retry() {
        let mut calls = 0;
        let out: WorkflowResult<()> = retry_once("stuck write", || {
            calls += 1;
            Err(busy())
        });
        assert!(matches!(out, Err(WorkflowError::Store(_))));
        assert_eq!(calls, 2);
    }

    #[test]
    fn deterministic_failures_run_once() {
        let mut calls = 0;
        let out: WorkflowResult<()> = retry_once("insert review", || {
            calls += 1;
            Err(rusqlite::Error::SqliteFailure(ffi::Error::new(ffi::SQLITE_CONSTRAINT), None).into())
        });
        assert!(matches!(out, Err(WorkflowError::Store(_))));
        assert_eq!(calls, 1);

        let mut calls = 0;
        let out: WorkflowResult<()> = retry_once("read back", || {
            calls += 1;
            anyhow::bail!("booking request vanished after insert")
        });
        assert!(out.is_err());
        assert_eq!(calls, 1);
    }
}
