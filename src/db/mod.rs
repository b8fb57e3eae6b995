/// Persistence gateway.
/// Owns the connection pool and the unit-of-work wrapper every core
/// operation runs inside.

pub mod init;
pub mod models;

use crate::error::CoreError;
use rusqlite::{ffi, Connection, Result as SqliteResult};
use std::sync::Arc;
use tokio::sync::Mutex;

pub type DbPool = Arc<Mutex<Connection>>;

/// Create a connection pool (simplified for single-writer SQLite)
pub fn create_pool(db_path: &str) -> SqliteResult<DbPool> {
    let conn = Connection::open(db_path)?;
    init::initialize_database(&conn)?;
    Ok(Arc::new(Mutex::new(conn)))
}

/// Create an in-memory database for testing
#[cfg(any(test, feature = "test_utils"))]
pub fn create_test_pool() -> DbPool {
    let conn = Connection::open_in_memory().expect("Failed to create in-memory DB");
    init::initialize_database(&conn).expect("Failed to initialize DB");
    Arc::new(Mutex::new(conn))
}

/// Run one core operation as a single unit of work.
///
/// Begins a transaction, hands the operation a connection bound to it,
/// commits on success and rolls back on any error. Core managers never
/// begin, commit or roll back themselves.
pub async fn with_transaction<T, F>(pool: &DbPool, op: F) -> Result<T, CoreError>
where
    F: FnOnce(&Connection) -> Result<T, CoreError>,
{
    let mut conn = pool.lock().await;
    let tx = conn.transaction()?;

    match op(&tx) {
        Ok(value) => {
            tx.commit()?;
            Ok(value)
        }
        Err(e) => {
            log::debug!("Rolling back unit of work: {}", e);
            if let Err(rollback_err) = tx.rollback() {
                log::error!("Rollback failed: {}", rollback_err);
            }
            Err(e)
        }
    }
}

/// Whether a statement failed on a UNIQUE or PRIMARY KEY constraint
pub fn is_unique_violation(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(e, _) => {
            e.extended_code == ffi::SQLITE_CONSTRAINT_UNIQUE
                || e.extended_code == ffi::SQLITE_CONSTRAINT_PRIMARYKEY
        }
        _ => false,
    }
}

/// Translate a unique violation into the domain error for that relation
pub fn map_unique(err: rusqlite::Error, on_duplicate: CoreError) -> CoreError {
    if is_unique_violation(&err) {
        on_duplicate
    } else {
        CoreError::Database(err)
    }
}

/// Require an UPDATE to have touched exactly the row it targeted
pub fn expect_one_row(affected: usize, counter: &'static str) -> Result<(), CoreError> {
    if affected == 0 {
        log::warn!("Counter update on {} affected no rows", counter);
        return Err(CoreError::CounterUpdateFailed(counter));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::params;

    fn insert_user(conn: &Connection, id: &str) -> rusqlite::Result<usize> {
        conn.execute(
            "INSERT INTO users (id, email, password_hash, user_name, full_name, date_of_birth, created_at)
             VALUES (?1, ?2, 'x', ?1, ?1, '1990-01-01', '2025-01-01T00:00:00Z')",
            params![id, format!("{}@x.com", id)],
        )
    }

    #[tokio::test]
    async fn test_transaction_commits_on_success() {
        let pool = create_test_pool();

        with_transaction(&pool, |conn| {
            insert_user(conn, "alice")?;
            Ok(())
        })
        .await
        .expect("Transaction failed");

        let conn = pool.lock().await;
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn test_transaction_rolls_back_on_error() {
        let pool = create_test_pool();

        let result: Result<(), CoreError> = with_transaction(&pool, |conn| {
            insert_user(conn, "alice")?;
            Err(CoreError::AlreadyFollowing)
        })
        .await;
        assert!(matches!(result, Err(CoreError::AlreadyFollowing)));

        let conn = pool.lock().await;
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn test_unique_violation_detection() {
        let pool = create_test_pool();
        let conn = pool.lock().await;

        insert_user(&conn, "bob").unwrap();
        let err = insert_user(&conn, "bob").unwrap_err();

        assert!(is_unique_violation(&err));
        assert!(matches!(
            map_unique(err, CoreError::UserNameTaken),
            CoreError::UserNameTaken
        ));
        assert!(!is_unique_violation(&rusqlite::Error::QueryReturnedNoRows));
    }

    #[test]
    fn test_expect_one_row() {
        assert!(expect_one_row(1, "users.followers").is_ok());
        assert!(matches!(
            expect_one_row(0, "users.followers"),
            Err(CoreError::CounterUpdateFailed("users.followers"))
        ));
    }
}
