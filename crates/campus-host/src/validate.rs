//! Tool input validation against declared JSON Schema shapes.

use serde::Serialize;

/// One field-level validation failure, suitable for client display.
#[derive(Debug, Clone, Serialize)]
pub struct FieldError {
    /// JSON pointer to the offending value (`/` for the document root).
    pub path: String,
    pub message: String,
}

/// Validate `input` against a tool's declared input schema.
///
/// Returns every violation, not just the first, so clients can render
/// complete form feedback. A malformed schema is reported as a single
/// root-level error rather than a panic.
pub fn validate_input(
    schema: &serde_json::Value,
    input: &serde_json::Value,
) -> Result<(), Vec<FieldError>> {
    let compiled = match jsonschema::JSONSchema::compile(schema) {
        Ok(compiled) => compiled,
        Err(e) => {
            return Err(vec![FieldError {
                path: "/".to_string(),
                message: format!("Invalid input schema: {e}"),
            }])
        }
    };

    if let Err(errors) = compiled.validate(input) {
        let violations: Vec<FieldError> = errors
            .map(|e| {
                let path = e.instance_path.to_string();
                FieldError {
                    path: if path.is_empty() { "/".to_string() } else { path },
                    message: e.to_string(),
                }
            })
            .collect();
        return Err(violations);
    }

    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn booking_schema() -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "student_id": {"type": "string"},
                "weeks": {"type": "integer", "minimum": 1},
                "accommodation": {"type": "boolean"}
            },
            "required": ["student_id", "weeks"],
            "additionalProperties": false
        })
    }

    #[test]
    fn test_valid_input() {
        let input = json!({"student_id": "s-1", "weeks": 4, "accommodation": true});
        assert!(validate_input(&booking_schema(), &input).is_ok());
    }

    #[test]
    fn test_missing_required_field() {
        let input = json!({"student_id": "s-1"});
        let errors = validate_input(&booking_schema(), &input).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("weeks"));
    }

    #[test]
    fn test_wrong_type_reports_pointer() {
        let input = json!({"student_id": "s-1", "weeks": "four"});
        let errors = validate_input(&booking_schema(), &input).unwrap_err();
        assert_eq!(errors[0].path, "/weeks");
    }

    #[test]
    fn test_additional_property_rejected() {
        let input = json!({"student_id": "s-1", "weeks": 2, "discount": "SUMMER"});
        assert!(validate_input(&booking_schema(), &input).is_err());
    }

    #[test]
    fn test_multiple_violations_all_reported() {
        let input = json!({"weeks": 0, "accommodation": "yes"});
        let errors = validate_input(&booking_schema(), &input).unwrap_err();
        assert!(errors.len() >= 3, "expected missing field + minimum + type errors");
    }

    #[test]
    fn test_malformed_schema_is_an_error_not_a_panic() {
        let schema = json!({"type": "no-such-type"});
        let errors = validate_input(&schema, &json!({})).unwrap_err();
        assert_eq!(errors[0].path, "/");
        assert!(errors[0].message.contains("Invalid input schema"));
    }
}
