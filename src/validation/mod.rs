use thiserror::Error;

pub const CARD_NUMBER_MIN_LEN: usize = 12;
pub const CARD_NUMBER_MAX_LEN: usize = 19;
pub const CVV_LEN: usize = 3;
pub const ACCOUNT_NUMBER_MIN_LEN: usize = 10;
pub const ACCOUNT_NUMBER_MAX_LEN: usize = 34;
pub const BANK_CODE_MIN_LEN: usize = 6;
pub const BANK_CODE_MAX_LEN: usize = 34;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

pub type ValidationResult = Result<(), ValidationError>;

pub fn validate_required(field: &'static str, value: &str) -> ValidationResult {
    if value.trim().is_empty() {
        return Err(ValidationError::new(field, "must not be empty"));
    }

    Ok(())
}

pub fn validate_len_range(
    field: &'static str,
    value: &str,
    min_len: usize,
    max_len: usize,
) -> ValidationResult {
    let len = value.chars().count();
    if len < min_len || len > max_len {
        return Err(ValidationError::new(
            field,
            format!("must be between {} and {} characters", min_len, max_len),
        ));
    }

    Ok(())
}

pub fn validate_exact_len(field: &'static str, value: &str, len: usize) -> ValidationResult {
    if value.chars().count() != len {
        return Err(ValidationError::new(
            field,
            format!("must be exactly {} characters", len),
        ));
    }

    Ok(())
}

pub fn validate_numeric(field: &'static str, value: &str) -> ValidationResult {
    if value.is_empty() || !value.chars().all(|ch| ch.is_ascii_digit()) {
        return Err(ValidationError::new(field, "must contain only digits"));
    }

    Ok(())
}

pub fn validate_alphanumeric(field: &'static str, value: &str) -> ValidationResult {
    if value.is_empty() || !value.chars().all(|ch| ch.is_ascii_alphanumeric()) {
        return Err(ValidationError::new(
            field,
            "must contain only letters and digits",
        ));
    }

    Ok(())
}

pub fn validate_enum(field: &'static str, value: &str, allowed: &[&str]) -> ValidationResult {
    if allowed.iter().all(|candidate| value != *candidate) {
        return Err(ValidationError::new(
            field,
            format!("must be one of: {}", allowed.join(", ")),
        ));
    }

    Ok(())
}

/// Luhn mod-10 checksum. Callers must have validated that `digits` is numeric.
pub fn luhn_valid(digits: &str) -> bool {
    let mut sum = 0u32;
    for (idx, ch) in digits.chars().rev().enumerate() {
        let Some(mut digit) = ch.to_digit(10) else {
            return false;
        };
        if idx % 2 == 1 {
            digit *= 2;
            if digit > 9 {
                digit -= 9;
            }
        }
        sum += digit;
    }

    sum % 10 == 0
}

pub fn validate_card_number(number: &str) -> ValidationResult {
    validate_required("number", number)?;
    validate_numeric("number", number)?;
    validate_len_range("number", number, CARD_NUMBER_MIN_LEN, CARD_NUMBER_MAX_LEN)?;

    if !luhn_valid(number) {
        return Err(ValidationError::new("number", "is not a valid card number"));
    }

    Ok(())
}

pub fn validate_cvv(cvv: &str) -> ValidationResult {
    validate_required("cvv", cvv)?;
    validate_numeric("cvv", cvv)?;
    validate_exact_len("cvv", cvv, CVV_LEN)
}
