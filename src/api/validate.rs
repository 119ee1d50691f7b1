use std::collections::HashMap;

/// Field name -> human readable constraint that was violated.
pub type FieldErrors = HashMap<String, String>;

/// Request bodies that can check their own field bounds before touching storage.
pub trait Validate {
    fn validate(&self) -> Result<(), FieldErrors>;
}

/// Records an error when `value` is outside `min..=max` characters.
/// Lengths count Unicode scalar values, not bytes.
///
/// NUL is rejected outright: Postgres text columns cannot store it.
pub fn check_length(errors: &mut FieldErrors, field: &str, value: &str, min: usize, max: Option<usize>) {
    if value.contains('\0') {
        errors.insert(field.to_string(), "must not contain NUL characters".to_string());
        return;
    }
    let len = value.chars().count();
    if len < min {
        let message = if min == 1 {
            "must not be empty".to_string()
        } else {
            format!("must be at least {} characters", min)
        };
        errors.insert(field.to_string(), message);
        return;
    }
    if let Some(max) = max {
        if len > max {
            errors.insert(field.to_string(), format!("must be at most {} characters", max));
        }
    }
}

/// Converts an accumulated error map into a result.
pub fn finish(errors: FieldErrors) -> Result<(), FieldErrors> {
    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
