//! First-failure field checks. Callers run them in field order and stop at the
//! first violation, so the order of calls is part of the API contract.

use lazy_static::lazy_static;
use regex::Regex;

use crate::error::{AppError, AppResult};

/// Present and not blank, trimmed.
pub fn required(value: Option<String>, msg: &str) -> AppResult<String> {
    match value.map(|v| v.trim().to_string()) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(AppError::validation(msg)),
    }
}

/// Present, not blank, and kept verbatim (passwords are not trimmed).
pub fn required_raw(value: Option<&str>, msg: &str) -> AppResult<String> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v.to_string()),
        _ => Err(AppError::validation(msg)),
    }
}

pub fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

pub fn email(value: Option<String>, missing_msg: &str) -> AppResult<String> {
    let email = required(value, missing_msg)?.to_lowercase();
    if !is_valid_email(&email) {
        return Err(AppError::validation("Invalid email"));
    }
    Ok(email)
}

pub fn non_negative_int(raw: &str, msg: &str) -> AppResult<i32> {
    match raw.trim().parse::<i32>() {
        Ok(v) if v >= 0 => Ok(v),
        _ => Err(AppError::validation(msg)),
    }
}

pub fn positive_number(raw: &str, msg: &str) -> AppResult<f64> {
    match raw.trim().parse::<f64>() {
        Ok(v) if v.is_finite() && v > 0.0 => Ok(v),
        _ => Err(AppError::validation(msg)),
    }
}
