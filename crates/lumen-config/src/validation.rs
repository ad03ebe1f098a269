//! Structural validation of project documents.
//!
//! A project loads all-or-nothing: these checks run against the raw JSON
//! before the engine sees it, so a malformed document fails cleanly with
//! nothing half-applied. Unknown device classes are *not* an error here -
//! the engine substitutes placeholders for those - but broken structure
//! (missing sections, id collisions, empty channels) is.

use serde_json::Value;
use std::collections::HashSet;
use thiserror::Error;

/// A structural problem found in a project document.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// The top level is not an object.
    #[error("project must be a JSON object")]
    NotAnObject,

    /// A required section is missing.
    #[error("missing section '{0}'")]
    MissingSection(&'static str),

    /// A component entry is malformed.
    #[error("malformed component: {0}")]
    MalformedComponent(String),

    /// The same id appears on two components.
    #[error("duplicate component id {0}")]
    DuplicateId(u64),

    /// An id outside the valid range.
    #[error("invalid component id {0}")]
    InvalidId(u64),

    /// A channel with no patterns.
    #[error("channel {0} has no patterns")]
    EmptyChannel(u64),
}

/// Validates a full project document (the `{version, timestamp, engine, ...}`
/// wrapper).
pub fn validate_project(value: &Value) -> Result<(), ValidationError> {
    let object = value.as_object().ok_or(ValidationError::NotAnObject)?;
    if !object.contains_key("version") {
        return Err(ValidationError::MissingSection("version"));
    }
    let engine = object
        .get("engine")
        .ok_or(ValidationError::MissingSection("engine"))?;
    validate_engine_section(engine)
}

/// Validates the `engine` section.
pub fn validate_engine_section(value: &Value) -> Result<(), ValidationError> {
    let object = value.as_object().ok_or(ValidationError::NotAnObject)?;
    let channels = object
        .get("channels")
        .ok_or(ValidationError::MissingSection("channels"))?
        .as_array()
        .ok_or(ValidationError::MalformedComponent(
            "'channels' must be an array".into(),
        ))?;

    let mut seen = HashSet::new();
    for channel in channels {
        validate_component(channel, &mut seen)?;
    }
    for key in ["palette", "tempo", "audio", "output", "master"] {
        if let Some(section) = object.get(key) {
            validate_component(section, &mut seen)?;
        }
    }
    if let Some(modulators) = object
        .get("modulation")
        .and_then(Value::as_object)
        .and_then(|m| m.get("modulators"))
        .and_then(Value::as_array)
    {
        for modulator in modulators {
            validate_component(modulator, &mut seen)?;
        }
    }
    Ok(())
}

fn validate_component(value: &Value, seen: &mut HashSet<u64>) -> Result<(), ValidationError> {
    let object = value
        .as_object()
        .ok_or_else(|| ValidationError::MalformedComponent("component must be an object".into()))?;
    let id = object
        .get("id")
        .and_then(Value::as_u64)
        .ok_or_else(|| ValidationError::MalformedComponent("component missing id".into()))?;
    if id == 0 || id > u64::from(u32::MAX) {
        return Err(ValidationError::InvalidId(id));
    }
    if !seen.insert(id) {
        return Err(ValidationError::DuplicateId(id));
    }
    let class = object
        .get("class")
        .and_then(Value::as_str)
        .ok_or_else(|| ValidationError::MalformedComponent(format!("component {id} missing class")))?;

    let children = object.get("children").and_then(Value::as_object);
    if class == "channel" {
        let patterns = children
            .and_then(|c| c.get("pattern"))
            .and_then(Value::as_array)
            .map(Vec::len)
            .unwrap_or(0);
        if patterns == 0 {
            return Err(ValidationError::EmptyChannel(id));
        }
    }

    if let Some(children) = children {
        for child in children.values() {
            match child {
                Value::Array(members) => {
                    for member in members {
                        validate_component(member, seen)?;
                    }
                }
                other => validate_component(other, seen)?,
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn pattern(id: u64) -> Value {
        json!({ "id": id, "class": "solid" })
    }

    #[test]
    fn accepts_a_minimal_document() {
        let doc = json!({
            "version": 1,
            "engine": {
                "channels": [
                    { "id": 10, "class": "channel", "children": { "pattern": [pattern(11)] } }
                ]
            }
        });
        assert_eq!(validate_project(&doc), Ok(()));
    }

    #[test]
    fn rejects_missing_engine() {
        let doc = json!({ "version": 1 });
        assert_eq!(
            validate_project(&doc),
            Err(ValidationError::MissingSection("engine"))
        );
    }

    #[test]
    fn rejects_duplicate_ids() {
        let doc = json!({
            "version": 1,
            "engine": {
                "channels": [
                    { "id": 10, "class": "channel", "children": { "pattern": [pattern(10)] } }
                ]
            }
        });
        assert_eq!(
            validate_project(&doc),
            Err(ValidationError::DuplicateId(10))
        );
    }

    #[test]
    fn rejects_empty_channels() {
        let doc = json!({
            "version": 1,
            "engine": {
                "channels": [ { "id": 10, "class": "channel" } ]
            }
        });
        assert_eq!(validate_project(&doc), Err(ValidationError::EmptyChannel(10)));
    }

    #[test]
    fn rejects_id_zero() {
        let doc = json!({
            "version": 1,
            "engine": { "channels": [ { "id": 0, "class": "channel" } ] }
        });
        assert_eq!(validate_project(&doc), Err(ValidationError::InvalidId(0)));
    }
}
