//! Client-side credential validation.
//!
//! Runs before any Session Store call; a failure here never reaches the store.

pub const MIN_PASSWORD_LEN: usize = 6;
pub const MIN_DISPLAY_NAME_LEN: usize = 2;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("please enter a valid email address")]
    InvalidEmail,
    #[error("password must be at least {} characters", MIN_PASSWORD_LEN)]
    PasswordTooShort,
    #[error("password is required")]
    PasswordMissing,
    #[error("full name must be at least {} characters", MIN_DISPLAY_NAME_LEN)]
    DisplayNameTooShort,
    #[error("passwords do not match")]
    PasswordMismatch,
}

/// Trim and lowercase an email, rejecting anything without exactly one `@`
/// separating non-empty parts and a dotted domain.
pub fn normalize_email(email: &str) -> Result<String, ValidationError> {
    let normalized = email.trim().to_ascii_lowercase();
    let mut parts = normalized.split('@');
    let (Some(local), Some(domain), None) = (parts.next(), parts.next(), parts.next()) else {
        return Err(ValidationError::InvalidEmail);
    };
    let domain_ok = domain
        .split('.')
        .all(|label| !label.is_empty())
        && domain.contains('.');
    if local.is_empty() || !domain_ok || normalized.chars().any(char::is_whitespace) {
        return Err(ValidationError::InvalidEmail);
    }
    Ok(normalized)
}

/// Validate sign-in input; returns the normalized email.
pub fn validate_sign_in(email: &str, password: &str) -> Result<String, ValidationError> {
    let email = normalize_email(email)?;
    if password.is_empty() {
        return Err(ValidationError::PasswordMissing);
    }
    Ok(email)
}

/// Validated sign-up input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignUpInput {
    pub email: String,
    pub display_name: String,
}

/// Validate sign-up input; returns the normalized email and trimmed display name.
pub fn validate_sign_up(email: &str, password: &str, display_name: &str) -> Result<SignUpInput, ValidationError> {
    let display_name = display_name.trim();
    if display_name.chars().count() < MIN_DISPLAY_NAME_LEN {
        return Err(ValidationError::DisplayNameTooShort);
    }
    let email = normalize_email(email)?;
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ValidationError::PasswordTooShort);
    }
    Ok(SignUpInput { email, display_name: display_name.to_owned() })
}

/// Confirmation-field check used by sign-up forms.
pub fn confirm_password(password: &str, confirmation: &str) -> Result<(), ValidationError> {
    if password == confirmation { Ok(()) } else { Err(ValidationError::PasswordMismatch) }
}

#[cfg(test)]
#[path = "validate_test.rs"]
mod tests;
