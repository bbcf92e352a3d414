//! Rendering `validator` failures as API errors

use convert_case::{Case, Casing};
use validator::{ValidationError, ValidationErrors, ValidationErrorsKind};

use crate::error::{ApiError, ApiOperation};

const SCHEMA_KEY: &str = "__all__";

/// Turn the first validation failure into an `InvalidPayload` error
///
/// Fields are visited in name order, descending into nested structs and
/// lists. Field failures read
/// `Value '{value}' for attribute '{field}' is not of type: {rule}`; struct
/// level failures carry their own message.
pub fn format_validation_errors(operation: ApiOperation, errors: &ValidationErrors) -> ApiError {
    let message = match first_error(errors) {
        Some((SCHEMA_KEY, error)) => error
            .message
            .as_deref()
            .unwrap_or(error.code.as_ref())
            .to_string(),
        Some((field, error)) => format!(
            "Value '{}' for attribute '{}' is not of type: {}",
            rejected_value(error),
            field.to_case(Case::Camel),
            error.code
        ),
        None => errors.to_string(),
    };

    ApiError::invalid_payload(message).with_operation(operation)
}

fn first_error(errors: &ValidationErrors) -> Option<(&str, &ValidationError)> {
    let mut fields: Vec<_> = errors.errors().iter().collect();
    fields.sort_by(|a, b| a.0.cmp(b.0));

    fields.into_iter().find_map(|(field, kind)| match kind {
        ValidationErrorsKind::Field(list) => list.first().map(|error| (field.as_ref(), error)),
        ValidationErrorsKind::Struct(inner) => first_error(inner),
        ValidationErrorsKind::List(items) => items.values().find_map(|inner| first_error(inner)),
    })
}

fn rejected_value(error: &ValidationError) -> String {
    match error.params.get("value") {
        Some(serde_json::Value::String(s)) => s.clone(),
        Some(serde_json::Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}
