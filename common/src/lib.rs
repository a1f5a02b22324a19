pub mod logger;

use validator::ValidationErrors;

/// Flattens field-level validation messages into a single `; `-separated line.
///
/// Errors without a custom message fall back to `field: code`, so a rule definition
/// that trips a built-in validator still produces a readable reason.
pub fn format_validation_errors(errors: &ValidationErrors) -> String {
    let mut messages: Vec<String> = errors
        .field_errors()
        .iter()
        .flat_map(|(field, errs)| {
            errs.iter().map(move |e| match &e.message {
                Some(m) => m.to_string(),
                None => format!("{field}: {}", e.code),
            })
        })
        .collect();
    messages.sort();
    messages.join("; ")
}
