/// Accounts and sessions.
/// Sign-up, sign-in, bearer session lookup, profile edits and account deletion.
use chrono::{Datelike, NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use super::chat::ChatMembership;
use super::content::ContentLedger;
use super::follow::FollowGraph;
use super::{ensure_user_exists, new_id, now, EmptyListPolicy};
use crate::db::{is_unique_violation, with_transaction, DbPool};
use crate::db::models::{SignInResponse, SignUpRequest, UpdateProfileRequest, User};
use crate::error::{CoreError, Result};

const MIN_PASSWORD_LEN: usize = 6;

/// Tunables for account handling
#[derive(Debug, Clone)]
pub struct AccountSettings {
    pub min_age: u32,
    pub session_ttl_seconds: i64,
    pub hash_cost: u32,
}

impl Default for AccountSettings {
    fn default() -> Self {
        AccountSettings {
            min_age: 13,
            session_ttl_seconds: 7 * 24 * 3600,
            hash_cost: bcrypt::DEFAULT_COST,
        }
    }
}

/// Register a new account.
///
/// The password is hashed on the blocking pool before the unit of work
/// takes the connection.
pub async fn register(
    pool: &DbPool,
    settings: &AccountSettings,
    request: &SignUpRequest,
) -> Result<User> {
    check_sign_up(request, settings)?;
    let password_hash = hash_password(request.password.clone(), settings.hash_cost).await?;
    with_transaction(pool, |conn| {
        Accounts::new(conn, settings).sign_up(request, &password_hash)
    })
    .await
}

/// Verify credentials and open a session.
///
/// The stored hash is read in one unit of work and checked on the blocking
/// pool after the connection is released; the session is opened in a second.
pub async fn sign_in(
    pool: &DbPool,
    settings: &AccountSettings,
    email: &str,
    password: &str,
) -> Result<SignInResponse> {
    let (user_id, password_hash) =
        with_transaction(pool, |conn| Accounts::new(conn, settings).credentials(email)).await?;

    if !verify_password(password.to_string(), password_hash).await? {
        return Err(CoreError::Credentials);
    }

    with_transaction(pool, |conn| Accounts::new(conn, settings).open_session(&user_id)).await
}

async fn hash_password(password: String, cost: u32) -> Result<String> {
    let hash = tokio::task::spawn_blocking(move || bcrypt::hash(password, cost)).await??;
    Ok(hash)
}

async fn verify_password(password: String, hash: String) -> Result<bool> {
    let matches = tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash)).await??;
    Ok(matches)
}

pub struct Accounts<'a> {
    conn: &'a Connection,
    settings: &'a AccountSettings,
}

impl<'a> Accounts<'a> {
    pub fn new(conn: &'a Connection, settings: &'a AccountSettings) -> Self {
        Accounts { conn, settings }
    }

    /// Insert a user with zeroed counters under an already computed hash
    pub fn sign_up(&self, request: &SignUpRequest, password_hash: &str) -> Result<User> {
        let date_of_birth = check_sign_up(request, self.settings)?;
        let id = new_id();
        let email = request.email.trim().to_lowercase();

        self.conn
            .execute(
                "INSERT INTO users (id, email, password_hash, user_name, full_name, date_of_birth, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    id,
                    email,
                    password_hash,
                    request.user_name.trim(),
                    request.full_name.trim(),
                    date_of_birth.format("%Y-%m-%d").to_string(),
                    now(),
                ],
            )
            .map_err(|e| self.map_sign_up_conflict(e, &email))?;

        log::info!("Signed up user {} ({})", id, request.user_name);
        self.get_user(&id)
    }

    /// The user id and stored password hash for `email`
    pub fn credentials(&self, email: &str) -> Result<(String, String)> {
        let email = email.trim().to_lowercase();
        self.conn
            .query_row(
                "SELECT id, password_hash FROM users WHERE email = ?1",
                params![email],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?
            .ok_or(CoreError::Credentials)
    }

    /// Issue a fresh bearer token for a verified user, dropping every expired
    /// session on the way.
    pub fn open_session(&self, user_id: &str) -> Result<SignInResponse> {
        // The account may have been deleted since its password was checked.
        ensure_user_exists(self.conn, user_id).map_err(|e| match e {
            CoreError::UserNotFound => CoreError::Credentials,
            other => other,
        })?;

        let now_ts = Utc::now().timestamp();
        let purged = self
            .conn
            .execute("DELETE FROM sessions WHERE expires_at <= ?1", params![now_ts])?;
        if purged > 0 {
            log::debug!("Purged {} expired sessions", purged);
        }

        let token = new_id();
        self.conn.execute(
            "INSERT INTO sessions (token, user_id, expires_at) VALUES (?1, ?2, ?3)",
            params![token, user_id, now_ts + self.settings.session_ttl_seconds],
        )?;

        log::debug!("Opened session for {}", user_id);
        Ok(SignInResponse {
            token,
            user: self.get_user(user_id)?,
        })
    }

    /// Resolve a live session token to its user id
    pub fn authenticate(&self, token: &str) -> Result<String> {
        self.conn
            .query_row(
                "SELECT user_id FROM sessions WHERE token = ?1 AND expires_at > ?2",
                params![token, Utc::now().timestamp()],
                |row| row.get(0),
            )
            .optional()?
            .ok_or(CoreError::Unauthenticated)
    }

    pub fn sign_out(&self, token: &str) -> Result<()> {
        let deleted = self
            .conn
            .execute("DELETE FROM sessions WHERE token = ?1", params![token])?;
        if deleted == 0 {
            return Err(CoreError::Unauthenticated);
        }
        Ok(())
    }

    pub fn get_user(&self, user_id: &str) -> Result<User> {
        let sql = format!("SELECT {} FROM users WHERE id = ?1", User::COLUMNS);
        self.conn
            .query_row(&sql, params![user_id], User::from_row)
            .optional()?
            .ok_or(CoreError::UserNotFound)
    }

    pub fn update_profile(&self, user_id: &str, update: &UpdateProfileRequest) -> Result<User> {
        if let Some(full_name) = &update.full_name {
            if full_name.trim().is_empty() {
                return Err(CoreError::InvalidInput("fullName must not be empty".to_string()));
            }
        }

        let affected = self.conn.execute(
            "UPDATE users SET
                full_name = COALESCE(?1, full_name),
                bio = COALESCE(?2, bio),
                avatar = COALESCE(?3, avatar)
             WHERE id = ?4",
            params![
                update.full_name.as_deref().map(str::trim),
                update.bio,
                update.avatar,
                user_id
            ],
        )?;
        if affected == 0 {
            return Err(CoreError::UserNotFound);
        }
        self.get_user(user_id)
    }

    /// Delete an account and everything it owns.
    ///
    /// Follow edges, likes, saves and marks are undone through their ledgers
    /// so the other side's counters stay consistent; owned photos and chats
    /// are removed; sessions go last before the user row.
    pub fn delete_account(&self, user_id: &str) -> Result<()> {
        ensure_user_exists(self.conn, user_id)?;
        let policy = EmptyListPolicy::Empty;

        FollowGraph::new(self.conn, policy).remove_all_edges(user_id)?;
        ContentLedger::new(self.conn, policy).remove_user_interactions(user_id)?;
        ChatMembership::new(self.conn, policy).remove_user_chats(user_id)?;

        self.conn
            .execute("DELETE FROM sessions WHERE user_id = ?1", params![user_id])?;
        self.conn
            .execute("DELETE FROM users WHERE id = ?1", params![user_id])?;

        log::info!("Deleted account {}", user_id);
        Ok(())
    }

    fn map_sign_up_conflict(&self, err: rusqlite::Error, email: &str) -> CoreError {
        if !is_unique_violation(&err) {
            return CoreError::Database(err);
        }
        let lookup = self
            .conn
            .query_row("SELECT 1 FROM users WHERE email = ?1", params![email], |_| Ok(()))
            .optional();
        sign_up_conflict(lookup)
    }
}

/// Name the column behind a sign-up unique violation from the email lookup
fn sign_up_conflict(email_lookup: rusqlite::Result<Option<()>>) -> CoreError {
    match email_lookup {
        Ok(Some(())) => CoreError::EmailTaken,
        Ok(None) => CoreError::UserNameTaken,
        Err(e) => CoreError::Database(e),
    }
}

/// Validate a sign-up request and return the parsed date of birth
fn check_sign_up(request: &SignUpRequest, settings: &AccountSettings) -> Result<NaiveDate> {
    validate_sign_up(request)?;

    let date_of_birth = NaiveDate::parse_from_str(&request.date_of_birth, "%Y-%m-%d")
        .map_err(|_| CoreError::InvalidInput("dateOfBirth must be YYYY-MM-DD".to_string()))?;
    let today = Utc::now().date_naive();
    if date_of_birth > today {
        return Err(CoreError::InvalidInput("dateOfBirth is in the future".to_string()));
    }
    if age_on(date_of_birth, today) < settings.min_age {
        return Err(CoreError::Underage(settings.min_age));
    }
    Ok(date_of_birth)
}

fn validate_sign_up(request: &SignUpRequest) -> Result<()> {
    let email = request.email.trim();
    let valid_email = email
        .split_once('@')
        .is_some_and(|(local, domain)| !local.is_empty() && domain.contains('.'));
    if !valid_email {
        return Err(CoreError::InvalidInput("email is not valid".to_string()));
    }
    if request.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(CoreError::InvalidInput(format!(
            "password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }
    let user_name = request.user_name.trim();
    if user_name.is_empty() || user_name.contains(char::is_whitespace) {
        return Err(CoreError::InvalidInput("userName must be a single word".to_string()));
    }
    if request.full_name.trim().is_empty() {
        return Err(CoreError::InvalidInput("fullName is required".to_string()));
    }
    Ok(())
}

/// Whole years between `born` and `today`
fn age_on(born: NaiveDate, today: NaiveDate) -> u32 {
    let mut years = today.year() - born.year();
    if (today.month(), today.day()) < (born.month(), born.day()) {
        years -= 1;
    }
    years.max(0) as u32
}
