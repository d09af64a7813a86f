pub mod featured;
pub mod trip;

use crate::error::AppError;

pub(crate) fn required_text(value: Option<&str>, name: &str) -> Result<String, AppError> {
    match value.map(str::trim) {
        Some(trimmed) if !trimmed.is_empty() => Ok(trimmed.to_string()),
        _ => Err(AppError::Validation(format!(
            "missing required field: {name}"
        ))),
    }
}
