// Accounts and credentials
// Signup, login and profile management. Credential hashing is deliberately
// opaque to the rest of the crate: a salted digest stored as "salt$hex" and
// a verify function, nothing else leaks out.

use rusqlite::Connection;
use sha2::{Digest, Sha256};

use crate::db;
use crate::error::{CoreError, CoreResult};
use crate::model::{User, UserRole};
use crate::validation::{validate_profile_update, validate_signup, ProfileUpdate, SignupInput};

// ============================================================================
// CREDENTIALS
// ============================================================================

pub fn hash_password(password: &str) -> String {
    let salt = uuid::Uuid::new_v4().simple().to_string();
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    format!("{}${:x}", salt, hasher.finalize())
}

pub fn verify_password(stored: &str, password: &str) -> bool {
    let Some((salt, digest)) = stored.split_once('$') else {
        return false;
    };
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    format!("{:x}", hasher.finalize()) == digest
}

// ============================================================================
// SIGNUP / LOGIN
// ============================================================================

/// Register a new basic user. Field constraints live in `validation`.
pub fn signup(conn: &Connection, input: &SignupInput) -> CoreResult<User> {
    validate_signup(conn, input).map_err(CoreError::Validation)?;

    let mut user = User {
        id: 0,
        role: UserRole::Basic,
        name: input.name.clone(),
        surname: input.surname.clone(),
        phone: input.phone.clone(),
        email: input.email.clone(),
        password_hash: hash_password(&input.password),
    };
    user.id = db::insert_user(conn, &user)?;
    Ok(user)
}

/// Credential check. Field-level errors mirror the login form: a missing
/// account complains about the email, a bad password about the password.
pub fn login(conn: &Connection, email: &str, password: &str) -> CoreResult<User> {
    let user = db::get_user_by_email(conn, email)?
        .ok_or_else(|| CoreError::validation("email", "no account with this email"))?;

    if !verify_password(&user.password_hash, password) {
        return Err(CoreError::validation("password", "incorrect password"));
    }

    Ok(user)
}

// ============================================================================
// PROFILE / ADMIN MANAGEMENT
// ============================================================================

/// Apply an optional-field profile patch to the acting user. The current
/// password must verify before anything is touched.
pub fn update_profile(
    conn: &Connection,
    user: &User,
    update: &ProfileUpdate,
    current_password: &str,
) -> CoreResult<User> {
    if !verify_password(&user.password_hash, current_password) {
        return Err(CoreError::validation("password_confirm", "incorrect password"));
    }
    validate_profile_update(conn, user.id, update).map_err(CoreError::Validation)?;

    let mut updated = user.clone();
    apply_update(&mut updated, update);
    db::update_user(conn, &updated)?;
    Ok(updated)
}

/// Admin-only variant: may target any user and additionally change the role.
pub fn admin_update_user(
    conn: &Connection,
    actor: &User,
    target_id: i64,
    update: &ProfileUpdate,
    role: Option<UserRole>,
) -> CoreResult<User> {
    if !actor.is_admin() {
        return Err(CoreError::authorization("admin role required"));
    }
    let user = db::get_user(conn, target_id)?.ok_or(CoreError::not_found("user", target_id))?;
    validate_profile_update(conn, user.id, update).map_err(CoreError::Validation)?;

    let mut updated = user;
    apply_update(&mut updated, update);
    if let Some(role) = role {
        updated.role = role;
    }
    db::update_user(conn, &updated)?;
    Ok(updated)
}

/// Admin-only. Cascades to the auctions the user created.
pub fn delete_user(conn: &Connection, actor: &User, target_id: i64) -> CoreResult<()> {
    if !actor.is_admin() {
        return Err(CoreError::authorization("admin role required"));
    }
    if !db::delete_user(conn, target_id)? {
        return Err(CoreError::not_found("user", target_id));
    }
    Ok(())
}

fn apply_update(user: &mut User, update: &ProfileUpdate) {
    if let Some(name) = &update.name {
        user.name = name.clone();
    }
    if let Some(surname) = &update.surname {
        user.surname = surname.clone();
    }
    if let Some(email) = &update.email {
        user.email = email.clone();
    }
    if let Some(phone) = &update.phone {
        user.phone = phone.clone();
    }
    if let Some(password) = &update.password {
        user.password_hash = hash_password(password);
    }
}

// ============================================================================
// TESTS
// ============================================================================
