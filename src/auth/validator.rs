//! Input validation for credentials

use crate::error::AuthError;

const MAX_USERNAME_LENGTH: usize = 256;

/// Performs basic input sanitation to check for malicious or malformed usernames.
fn is_valid_input(input: &str, max_length: usize) -> bool {
    !input.trim().is_empty() && input.len() <= max_length && !input.contains(['\r', '\n', '\0'])
}

/// Validates the SSH user name before it is sent to any host.
pub fn validate_user(username: &str) -> Result<(), AuthError> {
    if is_valid_input(username, MAX_USERNAME_LENGTH) && !username.contains(char::is_whitespace) {
        Ok(())
    } else {
        Err(AuthError::InvalidUser(username.to_string()))
    }
}
