// Form-level validation
// Accumulates field errors instead of failing fast, so a form can re-render
// with every complaint at once. Limits match the account and auction forms:
// names up to 50 chars, email 3..=254 and unique, password 6..=50 with a
// matching confirmation, title 3..=50, description empty or 10..=255.

use rusqlite::Connection;

use crate::db;
use crate::error::FieldError;

pub type FormResult = Result<(), Vec<FieldError>>;

// ============================================================================
// INPUT TYPES
// ============================================================================

#[derive(Debug, Clone)]
pub struct SignupInput {
    pub name: String,
    pub surname: String,
    pub email: String,
    pub phone: String,
    pub password: String,
    pub password_confirm: String,
}

/// Optional-field patch for profile and admin user management forms.
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub surname: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub password: Option<String>,
}

// ============================================================================
// SIGNUP / PROFILE
// ============================================================================

pub fn validate_signup(conn: &Connection, input: &SignupInput) -> FormResult {
    let mut errors = Vec::new();

    if input.name.chars().count() > 50 {
        errors.push(FieldError::new("name", "must be at most 50 characters"));
    }
    if input.surname.chars().count() > 50 {
        errors.push(FieldError::new("surname", "must be at most 50 characters"));
    }

    validate_email_field(conn, &input.email, None, true, &mut errors);

    if input.password.chars().count() < 6 || input.password.chars().count() > 50 {
        errors.push(FieldError::new("password", "must be 6 to 50 characters"));
    } else if input.password != input.password_confirm {
        errors.push(FieldError::new("password_confirm", "passwords must match"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Same constraints as signup, but every field is optional and the email
/// uniqueness probe ignores the user being updated.
pub fn validate_profile_update(
    conn: &Connection,
    user_id: i64,
    update: &ProfileUpdate,
) -> FormResult {
    let mut errors = Vec::new();

    if let Some(name) = &update.name {
        if name.chars().count() > 50 {
            errors.push(FieldError::new("name", "must be at most 50 characters"));
        }
    }
    if let Some(surname) = &update.surname {
        if surname.chars().count() > 50 {
            errors.push(FieldError::new("surname", "must be at most 50 characters"));
        }
    }
    if let Some(email) = &update.email {
        validate_email_field(conn, email, Some(user_id), false, &mut errors);
    }
    if let Some(password) = &update.password {
        if password.chars().count() < 6 || password.chars().count() > 50 {
            errors.push(FieldError::new("password", "must be 6 to 50 characters"));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_email_field(
    conn: &Connection,
    email: &str,
    exclude_user: Option<i64>,
    required: bool,
    errors: &mut Vec<FieldError>,
) {
    if email.is_empty() {
        if required {
            errors.push(FieldError::new("email", "required"));
        }
        return;
    }

    let len = email.chars().count();
    if len < 3 || len > 254 {
        errors.push(FieldError::new("email", "must be 3 to 254 characters"));
        return;
    }
    if !email.contains('@') {
        errors.push(FieldError::new("email", "not a valid email address"));
        return;
    }

    // Uniqueness probe; storage failure here surfaces as a field error too,
    // the caller never sees a half-validated form.
    match db::get_user_by_email(conn, email) {
        Ok(Some(existing)) if Some(existing.id) != exclude_user => {
            errors.push(FieldError::new("email", "an account with this email already exists"));
        }
        Ok(_) => {}
        Err(_) => {
            errors.push(FieldError::new("email", "could not verify email uniqueness"));
        }
    }
}

// ============================================================================
// AUCTION FORMS
// ============================================================================

pub fn validate_auction_form(
    title: &str,
    description: &str,
    start_price: f64,
    minimal_bid: f64,
) -> FormResult {
    let mut errors = Vec::new();

    let title_len = title.chars().count();
    if title_len < 3 || title_len > 50 {
        errors.push(FieldError::new("title", "must be 3 to 50 characters"));
    }

    // Description may be left empty; once present it has to carry content.
    let desc_len = description.chars().count();
    if desc_len > 0 && (desc_len < 10 || desc_len > 255) {
        errors.push(FieldError::new("description", "must be 10 to 255 characters"));
    }

    if !(start_price > 0.0) {
        errors.push(FieldError::new("start_price", "must be positive"));
    }
    if !(minimal_bid > 0.0) {
        errors.push(FieldError::new("minimal_bid", "must be positive"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::UserRole;
    use crate::testutil::{seed_user, test_conn};

    fn valid_signup() -> SignupInput {
        SignupInput {
            name: "Jana".to_string(),
            surname: "Novak".to_string(),
            email: "jana@example.com".to_string(),
            phone: "+421900111222".to_string(),
            password: "hunter22".to_string(),
            password_confirm: "hunter22".to_string(),
        }
    }

    #[test]
    fn test_signup_valid() {
        let conn = test_conn();
        assert!(validate_signup(&conn, &valid_signup()).is_ok());
    }

    #[test]
    fn test_signup_password_rules() {
        let conn = test_conn();

        let mut input = valid_signup();
        input.password = "short".to_string();
        input.password_confirm = "short".to_string();
        let errors = validate_signup(&conn, &input).unwrap_err();
        assert!(errors.iter().any(|e| e.field == "password"));

        let mut input = valid_signup();
        input.password_confirm = "different1".to_string();
        let errors = validate_signup(&conn, &input).unwrap_err();
        assert!(errors.iter().any(|e| e.field == "password_confirm"));
    }

    #[test]
    fn test_signup_email_rules() {
        let conn = test_conn();
        seed_user(&conn, UserRole::Basic, "taken@example.com");

        let mut input = valid_signup();
        input.email = "taken@example.com".to_string();
        let errors = validate_signup(&conn, &input).unwrap_err();
        assert!(errors.iter().any(|e| e.field == "email"));

        let mut input = valid_signup();
        input.email = String::new();
        let errors = validate_signup(&conn, &input).unwrap_err();
        assert_eq!(errors[0].message, "required");

        let mut input = valid_signup();
        input.email = "no-at-sign".to_string();
        assert!(validate_signup(&conn, &input).is_err());
    }

    #[test]
    fn test_signup_accumulates_errors() {
        let conn = test_conn();
        let input = SignupInput {
            name: "x".repeat(51),
            surname: "y".repeat(51),
            email: String::new(),
            phone: String::new(),
            password: "ok-length".to_string(),
            password_confirm: "mismatch!".to_string(),
        };
        let errors = validate_signup(&conn, &input).unwrap_err();
        assert_eq!(errors.len(), 4);
    }

    #[test]
    fn test_profile_update_skips_own_email() {
        let conn = test_conn();
        let user = seed_user(&conn, UserRole::Basic, "jana@example.com");
        let other = seed_user(&conn, UserRole::Basic, "peter@example.com");

        // Re-submitting your own email is fine.
        let update = ProfileUpdate {
            email: Some("jana@example.com".to_string()),
            ..ProfileUpdate::default()
        };
        assert!(validate_profile_update(&conn, user.id, &update).is_ok());

        // Someone else's is not.
        let update = ProfileUpdate {
            email: Some("peter@example.com".to_string()),
            ..ProfileUpdate::default()
        };
        assert!(validate_profile_update(&conn, user.id, &update).is_err());
        assert!(validate_profile_update(&conn, other.id, &update).is_ok());
    }

    #[test]
    fn test_auction_form_limits() {
        assert!(validate_auction_form("Vintage radio", "", 100.0, 5.0).is_ok());
        assert!(validate_auction_form("Vintage radio", "Tube radio, works", 100.0, 5.0).is_ok());

        let errors = validate_auction_form("ab", "", 100.0, 5.0).unwrap_err();
        assert!(errors.iter().any(|e| e.field == "title"));

        let errors = validate_auction_form("Vintage radio", "too short", 100.0, 5.0);
        // 9 characters: below the 10-char minimum for a non-empty description
        assert!(errors.is_err());

        let errors = validate_auction_form("Vintage radio", "", 0.0, 5.0).unwrap_err();
        assert!(errors.iter().any(|e| e.field == "start_price"));

        let errors = validate_auction_form("Vintage radio", "", 100.0, 0.0).unwrap_err();
        assert!(errors.iter().any(|e| e.field == "minimal_bid"));
    }
}
