use crate::constants::*;
use crate::error::AppError;
use chrono::NaiveDate;

/// Validate username (3-50 characters, ASCII letters, digits and underscores).
pub fn validate_username(username: &str) -> Result<&str, AppError> {
    let username = username.trim();
    if username.len() < MIN_USERNAME_LEN {
        return Err(AppError::invalid(
            "username",
            format!("must be at least {MIN_USERNAME_LEN} characters"),
        ));
    }
    if username.len() > MAX_USERNAME_LEN {
        return Err(AppError::invalid(
            "username",
            format!("cannot exceed {MAX_USERNAME_LEN} characters"),
        ));
    }
    if !username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        return Err(AppError::invalid(
            "username",
            "only letters, digits and underscores are allowed",
        ));
    }
    Ok(username)
}

/// Validate a first or last name.
pub fn validate_person_name<'a>(field: &'static str, name: &'a str) -> Result<&'a str, AppError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AppError::invalid(field, "cannot be empty"));
    }
    if name.chars().count() > MAX_PERSON_NAME_LEN {
        return Err(AppError::invalid(
            field,
            format!("cannot exceed {MAX_PERSON_NAME_LEN} characters"),
        ));
    }
    Ok(name)
}

/// Validate category name.
pub fn validate_category_name(name: &str) -> Result<&str, AppError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AppError::invalid("name", "cannot be empty"));
    }
    if name.chars().count() > MAX_CATEGORY_NAME_LEN {
        return Err(AppError::invalid(
            "name",
            format!("cannot exceed {MAX_CATEGORY_NAME_LEN} characters"),
        ));
    }
    Ok(name)
}

/// Validate a goal, habit or challenge title.
pub fn validate_title<'a>(field: &'static str, title: &'a str) -> Result<&'a str, AppError> {
    let title = title.trim();
    if title.is_empty() {
        return Err(AppError::invalid(field, "cannot be empty"));
    }
    if title.chars().count() > MAX_TITLE_LEN {
        return Err(AppError::invalid(
            field,
            format!("cannot exceed {MAX_TITLE_LEN} characters"),
        ));
    }
    Ok(title)
}

/// Validate a goal target value: finite and strictly positive.
pub fn validate_target_value(value: f64) -> Result<(), AppError> {
    if !value.is_finite() {
        return Err(AppError::invalid("target_value", "must be a finite number"));
    }
    if value <= 0.0 {
        return Err(AppError::invalid("target_value", "must be positive"));
    }
    Ok(())
}

/// Validate a progress snapshot value: finite, may be zero or negative.
pub fn validate_progress_value(value: f64) -> Result<(), AppError> {
    if !value.is_finite() {
        return Err(AppError::invalid("current_value", "must be a finite number"));
    }
    Ok(())
}

/// Validate habit frequency (both parts positive).
pub fn validate_frequency(frequency_type: i32, frequency_value: i32) -> Result<(), AppError> {
    if frequency_type <= 0 {
        return Err(AppError::invalid("frequency_type", "must be positive"));
    }
    if frequency_value <= 0 {
        return Err(AppError::invalid("frequency_value", "must be positive"));
    }
    Ok(())
}

/// Validate a challenge window; the end date may equal the start date.
pub fn validate_date_range(start: NaiveDate, end: NaiveDate) -> Result<(), AppError> {
    if end < start {
        return Err(AppError::invalid(
            "end_date",
            format!("{end} is before start date {start}"),
        ));
    }
    Ok(())
}

/// Validate a batch request size and chunk size.
pub fn validate_batch(items: usize, batch_size: usize) -> Result<(), AppError> {
    if items == 0 {
        return Err(AppError::invalid("items", "at least one item required"));
    }
    if items > MAX_BATCH_ITEMS {
        return Err(AppError::invalid(
            "items",
            format!("cannot exceed {MAX_BATCH_ITEMS} per request"),
        ));
    }
    if !(1..=MAX_BATCH_SIZE).contains(&batch_size) {
        return Err(AppError::invalid(
            "batch_size",
            format!("must be 1-{MAX_BATCH_SIZE}"),
        ));
    }
    Ok(())
}
