//! Field checks shared by the services
//!
//! Each returns `MarketError::InvalidInput` naming the offending field.

use chrono::NaiveDate;

use crate::db::models::parse_date;
use crate::error::MarketError;

pub fn require_non_empty(field: &str, value: &str) -> Result<(), MarketError> {
    if value.trim().is_empty() {
        return Err(MarketError::InvalidInput(format!("{} is required", field)));
    }
    Ok(())
}

pub fn require_one_of(field: &str, value: &str, allowed: &[&str]) -> Result<(), MarketError> {
    if !allowed.contains(&value) {
        return Err(MarketError::InvalidInput(format!(
            "{} must be one of: {}",
            field,
            allowed.join(", ")
        )));
    }
    Ok(())
}

/// Finite and `>= 0`
pub fn require_non_negative(field: &str, value: f64) -> Result<(), MarketError> {
    if !value.is_finite() || value < 0.0 {
        return Err(MarketError::InvalidInput(format!("{} must be zero or more", field)));
    }
    Ok(())
}

/// Finite and `> 0`
pub fn require_positive(field: &str, value: f64) -> Result<(), MarketError> {
    if !value.is_finite() || value <= 0.0 {
        return Err(MarketError::InvalidInput(format!("{} must be greater than zero", field)));
    }
    Ok(())
}

/// Parse a `YYYY-MM-DD` date
pub fn require_date(field: &str, value: &str) -> Result<NaiveDate, MarketError> {
    parse_date(value.trim()).ok_or_else(|| {
        MarketError::InvalidInput(format!("{} must be a date in YYYY-MM-DD form", field))
    })
}

/// Trimmed value, with blank strings treated as absent
pub fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|s| !s.is_empty())
}
