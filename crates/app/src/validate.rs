//! Input checks applied before anything reaches a store.

use engine::{Amount, Category};

use crate::error::{AppError, Result};

pub fn title(value: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AppError::Input("Title cannot be empty.".to_string()));
    }
    Ok(trimmed.to_string())
}

/// A positive amount with at most two decimals.
pub fn amount(value: &str) -> Result<Amount> {
    let amount: Amount = value.parse()?;
    if !amount.is_positive() {
        return Err(AppError::Input(
            "Amount must be greater than zero.".to_string(),
        ));
    }
    Ok(amount)
}

pub fn budget(value: &str) -> Result<Amount> {
    let amount: Amount = value.parse()?;
    if !amount.is_positive() {
        return Err(AppError::Input(
            "Budget must be greater than zero.".to_string(),
        ));
    }
    Ok(amount)
}

pub fn category(value: Option<&str>) -> Result<Category> {
    match value {
        Some(label) => Ok(label.parse()?),
        None => Ok(Category::default()),
    }
}
