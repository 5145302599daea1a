//! Field mapping and dynamic-field inference.

use crate::browser::{DetectedField, DetectedForm};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use siphon_common::util::{looks_like_timestamp, looks_like_uuid, to_camel_case, to_snake_case};
use std::collections::HashMap;

/// Well-known kinds of per-submission values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DynamicFieldType {
    UserId,
    SessionId,
    Nonce,
    Timestamp,
    Uuid,
    CsrfToken,
    Custom,
}

/// Where a dynamic value is fetched or computed from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExtractionStrategy {
    /// Read from the DOM before submitting.
    Dom { selector: String },
    /// Fetch from an API endpoint.
    Api { endpoint: String },
    /// Read a cookie value.
    Cookie { name: String },
    /// Read a URL query parameter.
    UrlParam { name: String },
    /// Read from localStorage.
    LocalStorage { key: String },
    /// Compute fresh per submission (`now` or `uuid4`).
    Computed { producer: String },
}

/// A field whose value must be fetched or computed per submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DynamicField {
    pub name: String,
    pub value_type: DynamicFieldType,
    pub extraction: ExtractionStrategy,
}

/// Map form fields onto the wire fields of a captured body.
///
/// Exact name first, then camelCase and snake_case variants.
pub fn map_fields(fields: &[DetectedField], body_keys: &[String]) -> HashMap<String, String> {
    let mut mapping = HashMap::new();

    for field in fields {
        let name = &field.name;
        if name.is_empty() {
            continue;
        }

        let wire = if body_keys.iter().any(|k| k == name) {
            Some(name.clone())
        } else {
            let camel = to_camel_case(name);
            let snake = to_snake_case(name);
            if body_keys.iter().any(|k| *k == camel) {
                Some(camel)
            } else if body_keys.iter().any(|k| *k == snake) {
                Some(snake)
            } else {
                None
            }
        };

        if let Some(wire) = wire {
            mapping.insert(name.clone(), wire);
        }
    }

    mapping
}

/// Top-level keys of a JSON object body.
pub fn json_body_keys(body: &Value) -> Vec<String> {
    body.as_object()
        .map(|o| o.keys().cloned().collect())
        .unwrap_or_default()
}

/// Classify a field as dynamic from its name, its value shape, and (when
/// several captures exist) the cardinality of its observed values.
///
/// `observations` maps field name to the values seen across captures.
pub fn infer_dynamic_fields(
    form: &DetectedForm,
    observations: &HashMap<String, Vec<String>>,
) -> Vec<DynamicField> {
    let mut dynamic = Vec::new();

    let mut consider = |field: &DetectedField| {
        let value_type = classify_field(field, observations);
        let Some(value_type) = value_type else {
            return;
        };
        dynamic.push(DynamicField {
            name: field.name.clone(),
            value_type,
            extraction: strategy_for(value_type, field),
        });
    };

    for field in &form.fields {
        consider(field);
    }
    for field in &form.csrf_candidates {
        consider(field);
    }

    dynamic
}

fn classify_field(
    field: &DetectedField,
    observations: &HashMap<String, Vec<String>>,
) -> Option<DynamicFieldType> {
    let lower = field.name.to_lowercase();

    if lower.contains("csrf") || lower.contains("token") || lower.contains("authenticity") {
        return Some(DynamicFieldType::CsrfToken);
    }
    if lower.contains("nonce") {
        return Some(DynamicFieldType::Nonce);
    }
    if lower.contains("session") {
        return Some(DynamicFieldType::SessionId);
    }
    if lower.contains("user_id") || lower.contains("userid") || lower == "user" {
        return Some(DynamicFieldType::UserId);
    }

    if let Some(value) = &field.value {
        if looks_like_uuid(value) {
            return Some(DynamicFieldType::Uuid);
        }
        if looks_like_timestamp(value) {
            return Some(DynamicFieldType::Timestamp);
        }
    }

    // Multiple captures with more than one distinct value
    if let Some(seen) = observations.get(&field.name) {
        let mut distinct: Vec<&String> = Vec::new();
        for value in seen {
            if !distinct.contains(&value) {
                distinct.push(value);
            }
        }
        if distinct.len() > 1 {
            return Some(DynamicFieldType::Custom);
        }
    }

    None
}

fn strategy_for(value_type: DynamicFieldType, field: &DetectedField) -> ExtractionStrategy {
    match value_type {
        DynamicFieldType::CsrfToken => {
            // Prefer the field itself; a meta tag is the common fallback
            if field.selector.is_empty() {
                ExtractionStrategy::Dom {
                    selector: r#"meta[name="csrf-token"]"#.to_string(),
                }
            } else {
                ExtractionStrategy::Dom {
                    selector: field.selector.clone(),
                }
            }
        }
        DynamicFieldType::Timestamp => ExtractionStrategy::Computed {
            producer: "now".to_string(),
        },
        DynamicFieldType::Uuid => ExtractionStrategy::Computed {
            producer: "uuid4".to_string(),
        },
        DynamicFieldType::UserId | DynamicFieldType::SessionId => ExtractionStrategy::Cookie {
            name: field.name.clone(),
        },
        _ => ExtractionStrategy::Dom {
            selector: field.selector.clone(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field(name: &str, value: Option<&str>) -> DetectedField {
        DetectedField {
            name: name.to_string(),
            field_type: "text".to_string(),
            required: false,
            value: value.map(String::from),
            selector: format!("[name=\"{name}\"]"),
        }
    }

    #[test]
    fn test_exact_mapping() {
        let fields = vec![field("email_addr", None), field("full_name", None)];
        let keys = vec!["email_addr".to_string(), "full_name".to_string()];
        let mapping = map_fields(&fields, &keys);
        assert_eq!(mapping["email_addr"], "email_addr");
        assert_eq!(mapping["full_name"], "full_name");
    }

    #[test]
    fn test_camel_case_fallback() {
        let fields = vec![field("email_addr", None)];
        let keys = vec!["emailAddr".to_string()];
        let mapping = map_fields(&fields, &keys);
        assert_eq!(mapping["email_addr"], "emailAddr");
    }

    #[test]
    fn test_snake_case_fallback() {
        let fields = vec![field("fullName", None)];
        let keys = vec!["full_name".to_string()];
        let mapping = map_fields(&fields, &keys);
        assert_eq!(mapping["fullName"], "full_name");
    }

    #[test]
    fn test_unmapped_fields_are_omitted() {
        let fields = vec![field("phone", None)];
        let keys = vec!["email".to_string()];
        assert!(map_fields(&fields, &keys).is_empty());
    }

    #[test]
    fn test_csrf_field_is_dynamic() {
        let form = DetectedForm {
            selector: "form".into(),
            csrf_candidates: vec![field("csrf_token", Some("abc123"))],
            ..Default::default()
        };
        let dynamic = infer_dynamic_fields(&form, &HashMap::new());
        assert_eq!(dynamic.len(), 1);
        assert_eq!(dynamic[0].value_type, DynamicFieldType::CsrfToken);
        assert!(matches!(
            dynamic[0].extraction,
            ExtractionStrategy::Dom { .. }
        ));
    }

    #[test]
    fn test_uuid_value_is_computed() {
        let form = DetectedForm {
            selector: "form".into(),
            fields: vec![field(
                "request_ref",
                Some("550e8400-e29b-41d4-a716-446655440000"),
            )],
            ..Default::default()
        };
        let dynamic = infer_dynamic_fields(&form, &HashMap::new());
        assert_eq!(dynamic[0].value_type, DynamicFieldType::Uuid);
        assert_eq!(
            dynamic[0].extraction,
            ExtractionStrategy::Computed {
                producer: "uuid4".to_string()
            }
        );
    }

    #[test]
    fn test_timestamp_value_is_computed_now() {
        let form = DetectedForm {
            selector: "form".into(),
            fields: vec![field("ts", Some("1714003200"))],
            ..Default::default()
        };
        let dynamic = infer_dynamic_fields(&form, &HashMap::new());
        assert_eq!(dynamic[0].value_type, DynamicFieldType::Timestamp);
    }

    #[test]
    fn test_varying_value_across_captures_is_dynamic() {
        let form = DetectedForm {
            selector: "form".into(),
            fields: vec![field("challenge", None)],
            ..Default::default()
        };
        let observations = HashMap::from([(
            "challenge".to_string(),
            vec!["aaa".to_string(), "bbb".to_string()],
        )]);
        let dynamic = infer_dynamic_fields(&form, &observations);
        assert_eq!(dynamic[0].value_type, DynamicFieldType::Custom);
    }

    #[test]
    fn test_stable_plain_field_is_not_dynamic() {
        let form = DetectedForm {
            selector: "form".into(),
            fields: vec![field("email", None)],
            ..Default::default()
        };
        let observations =
            HashMap::from([("email".to_string(), vec!["a@b".to_string(), "a@b".to_string()])]);
        assert!(infer_dynamic_fields(&form, &observations).is_empty());
    }

    #[test]
    fn test_session_field_reads_cookie() {
        let form = DetectedForm {
            selector: "form".into(),
            fields: vec![field("session_id", None)],
            ..Default::default()
        };
        let dynamic = infer_dynamic_fields(&form, &HashMap::new());
        assert_eq!(dynamic[0].value_type, DynamicFieldType::SessionId);
        assert!(matches!(
            dynamic[0].extraction,
            ExtractionStrategy::Cookie { .. }
        ));
    }
}
