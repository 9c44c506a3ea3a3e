//! Email/password accounts and the signed-in session.
//!
//! Credentials live next to the user profile as an Argon2id PHC string; the
//! plaintext is never stored or returned. The [`Session`] is owned by the
//! request loop and only replaced when an auth-state change happens
//! (workspace opened, sign-in, sign-out).

use crate::model::{Role, User};
use crate::store::{self, MasterRecord, StoreError};
use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use rusqlite::{Connection, OptionalExtension};
use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("invalid email or password")]
    InvalidCredentials,
    #[error("password must be at least {0} characters")]
    WeakPassword(usize),
    #[error("an account already exists for {0}")]
    EmailTaken(String),
    #[error("password hashing failed: {0}")]
    Hash(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl AuthError {
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::InvalidCredentials => "invalid_credentials",
            AuthError::WeakPassword(_) => "weak_password",
            AuthError::EmailTaken(_) => "email_taken",
            AuthError::Hash(_) => "hash_failed",
            AuthError::Store(e) => e.code(),
        }
    }
}

impl From<rusqlite::Error> for AuthError {
    fn from(e: rusqlite::Error) -> Self {
        AuthError::Store(StoreError::Query(e))
    }
}

/// Argon2id with the crate defaults, encoded as a PHC string (salt and
/// parameters included).
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| AuthError::Hash(e.to_string()))
}

/// False for a wrong password and for a stored value that is not a PHC
/// string.
pub fn verify_password(password: &str, phc: &str) -> bool {
    match PasswordHash::new(phc) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            tracing::warn!(error = %e, "stored password hash is unreadable");
            false
        }
    }
}

/// The identity a session carries; a projection of [`User`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionUser {
    pub uid: String,
    pub email: String,
    pub username: String,
    pub role: Role,
}

impl From<&User> for SessionUser {
    fn from(u: &User) -> Self {
        SessionUser {
            uid: u.id.clone(),
            email: u.email.clone(),
            username: u.username.clone(),
            role: u.role,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum Session {
    /// No auth-state event has been observed yet.
    #[default]
    Loading,
    SignedOut,
    SignedIn { user: SessionUser },
}

impl Session {
    pub fn user(&self) -> Option<&SessionUser> {
        match self {
            Session::SignedIn { user } => Some(user),
            _ => None,
        }
    }
}

/// Creates the profile and its credentials in one statement.
pub fn create_account(
    conn: &Connection,
    doc: &serde_json::Value,
    password: &str,
    min_password_len: usize,
) -> Result<User, AuthError> {
    let user = store::prepare_new::<User>(doc)?;
    if password.chars().count() < min_password_len {
        return Err(AuthError::WeakPassword(min_password_len));
    }
    if find_by_email(conn, &user.email)?.is_some() {
        return Err(AuthError::EmailTaken(user.email));
    }

    let hash = hash_password(password)?;
    conn.execute(
        "INSERT INTO users(id, username, email, role, department, timestamp, password_hash)
         VALUES(?, ?, ?, ?, ?, ?, ?)",
        (
            &user.id,
            &user.username,
            &user.email,
            user.role.as_str(),
            &user.department,
            &user.timestamp,
            &hash,
        ),
    )
    .map_err(StoreError::insert)?;
    tracing::info!(uid = %user.id, role = user.role.as_str(), "account created");
    Ok(user)
}

pub fn find_by_email(conn: &Connection, email: &str) -> Result<Option<User>, AuthError> {
    let sql = format!(
        "SELECT id, {} FROM {} WHERE email = ?",
        User::COLUMNS.join(", "),
        User::TABLE
    );
    let user = conn
        .query_row(&sql, [email.trim().to_ascii_lowercase()], |r| User::from_row(r))
        .optional()?;
    Ok(user)
}

pub fn sign_in(conn: &Connection, email: &str, password: &str) -> Result<User, AuthError> {
    let email = email.trim().to_ascii_lowercase();
    let creds: Option<(String, Option<String>)> = conn
        .query_row(
            "SELECT id, password_hash FROM users WHERE email = ?",
            [&email],
            |r| Ok((r.get(0)?, r.get(1)?)),
        )
        .optional()?;

    let Some((uid, Some(hash))) = creds else {
        tracing::warn!(%email, "sign-in for unknown account");
        return Err(AuthError::InvalidCredentials);
    };
    if !verify_password(password, &hash) {
        tracing::warn!(%email, "sign-in with wrong password");
        return Err(AuthError::InvalidCredentials);
    }

    store::get::<User>(conn, &uid)?.ok_or(AuthError::InvalidCredentials)
}
