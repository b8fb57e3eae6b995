/// Social graph, chat membership and content ledger services.
///
/// Every manager borrows a connection that is already inside a transaction
/// (see [`crate::db::with_transaction`]) and performs one multi-statement
/// operation on it. Each counter column is paired with the relation table it
/// summarizes; the managers keep both in step.

pub mod accounts;
pub mod chat;
pub mod content;
pub mod follow;
pub mod message;

pub use accounts::Accounts;
pub use chat::ChatMembership;
pub use content::ContentLedger;
pub use follow::FollowGraph;
pub use message::MessageLedger;

use crate::error::{CoreError, Result};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};

/// How list queries report an empty result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EmptyListPolicy {
    /// Empty lists fail with the matching `No*` error.
    #[default]
    Error,
    /// Empty lists are returned as-is.
    Empty,
}

impl EmptyListPolicy {
    pub fn from_strict(strict: bool) -> Self {
        if strict {
            EmptyListPolicy::Error
        } else {
            EmptyListPolicy::Empty
        }
    }

    pub(crate) fn apply<T>(self, items: Vec<T>, when_empty: CoreError) -> Result<Vec<T>> {
        if items.is_empty() && self == EmptyListPolicy::Error {
            return Err(when_empty);
        }
        Ok(items)
    }
}

/// Fail with `UserNotFound` unless a user row with `user_id` exists
pub(crate) fn ensure_user_exists(conn: &Connection, user_id: &str) -> Result<()> {
    let found = conn
        .query_row(
            "SELECT 1 FROM users WHERE id = ?1",
            params![user_id],
            |_| Ok(()),
        )
        .optional()?;
    found.ok_or(CoreError::UserNotFound)
}

pub(crate) fn now() -> String {
    Utc::now().to_rfc3339()
}

pub(crate) fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
