//! Validation helpers for DTOs.

use validator::ValidationError;

const TOKEN_MIN_LEN: usize = 4;
const TOKEN_MAX_LEN: usize = 64;

/// Rejects values made only of whitespace.
pub fn validate_not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut err = ValidationError::new("blank");
        err.message = Some("must not be blank".into());
        return Err(err);
    }
    Ok(())
}

/// Join and supervisor tokens are 4 to 64 characters of `[A-Za-z0-9_-]`,
/// once surrounding whitespace is trimmed.
///
/// ```ignore
/// validate_join_token("incas-2025") // Ok
/// validate_join_token("abc")        // Err - too short
/// validate_join_token("incas 2025") // Err - space
/// ```
pub fn validate_join_token(token: &str) -> Result<(), ValidationError> {
    let token = token.trim();
    if !(TOKEN_MIN_LEN..=TOKEN_MAX_LEN).contains(&token.len()) {
        let mut err = ValidationError::new("join_token_length");
        err.message = Some(
            format!(
                "join token must be {TOKEN_MIN_LEN} to {TOKEN_MAX_LEN} characters (got {})",
                token.len()
            )
            .into(),
        );
        return Err(err);
    }

    if !token
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        let mut err = ValidationError::new("join_token_format");
        err.message =
            Some("join token may only contain letters, digits, '-' and '_'".into());
        return Err(err);
    }

    Ok(())
}
