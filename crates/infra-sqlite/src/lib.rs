// Codesift Infrastructure - SQLite Adapters
// Implements: JobStore, ResultCache, JobQueue, DlqStore, Maintenance

mod connection;
mod dlq_store;
mod job_store;
mod maintenance_impl;
mod migration;
mod queue;
mod result_cache;

pub use connection::create_pool;
pub use dlq_store::SqliteDlqStore;
pub use job_store::SqliteJobStore;
pub use maintenance_impl::SqliteMaintenance;
pub use migration::run_migrations;
pub use queue::SqliteJobQueue;
pub use result_cache::SqliteResultCache;

use codesift_core::error::AppError;

// sqlx::Error cannot implement From for AppError here (orphan rules), so a
// helper converts at each call site.
pub(crate) fn map_sqlx_error(err: sqlx::Error) -> AppError {
    match &err {
        sqlx::Error::Database(db_err) => {
            if let Some(code) = db_err.code() {
                let code_str = code.as_ref();
                match code_str {
                    // UNIQUE constraint failed
                    "2067" | "1555" => AppError::Database(format!(
                        "unique constraint violation: {} ({})",
                        db_err.message(),
                        code_str
                    )),
                    // SQLITE_BUSY - database is locked
                    "5" => AppError::Database(format!(
                        "database locked (SQLITE_BUSY): {}",
                        db_err.message()
                    )),
                    // SQLITE_FULL
                    "13" => AppError::Database(format!("database full: {}", db_err.message())),
                    _ => AppError::Database(format!(
                        "database error [{}]: {}",
                        code_str,
                        db_err.message()
                    )),
                }
            } else {
                AppError::Database(format!("database error: {}", db_err.message()))
            }
        }
        sqlx::Error::RowNotFound => AppError::Database("row not found".to_string()),
        _ => AppError::Database(err.to_string()),
    }
}
