//! Flattening of `validator` reports into one client-facing sentence.

use validator::{Validate, ValidationErrors, ValidationErrorsKind};

/// Run the derived validation and render failures as `field: message; ...`.
pub fn check<T: Validate>(input: &T) -> Result<(), String> {
    input.validate().map_err(|errors| describe(&errors))
}

pub fn describe(errors: &ValidationErrors) -> String {
    let mut parts = Vec::new();
    collect(errors, None, &mut parts);
    parts.sort();
    parts.join("; ")
}

fn collect(errors: &ValidationErrors, prefix: Option<&str>, parts: &mut Vec<String>) {
    for (field, kind) in errors.errors() {
        let path = match prefix {
            Some(prefix) => format!("{prefix}.{field}"),
            None => field.to_string(),
        };
        match kind {
            ValidationErrorsKind::Field(failures) => {
                for failure in failures {
                    let message = failure
                        .message
                        .as_ref()
                        .map(|message| message.to_string())
                        .unwrap_or_else(|| failure.code.to_string());
                    parts.push(format!("{path}: {message}"));
                }
            }
            ValidationErrorsKind::Struct(inner) => collect(inner, Some(&path), parts),
            ValidationErrorsKind::List(items) => {
                for (index, inner) in items {
                    collect(inner, Some(&format!("{path}[{index}]")), parts);
                }
            }
        }
    }
}
