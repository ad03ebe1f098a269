//! Serialized component documents.
//!
//! Every component flattens to the same JSON shape:
//!
//! ```json
//! {
//!   "id": 12,
//!   "class": "channel",
//!   "modulationColor": 4294901760,
//!   "internal": { "label": "Overhead", "active": 0, "next": 0 },
//!   "parameters": { "fader": 1.0, "enabled": true },
//!   "children": { "pattern": [ ... ], "palette": { ... } }
//! }
//! ```
//!
//! `children` maps named singletons to nested documents and array segments
//! to document arrays. Ids written during save are always the current live
//! ids; placeholder components re-emit their captured blob with the live id
//! patched in. This module is shared by project persistence and by destroy
//! commands, which capture a subtree document to rebuild on undo.

use crate::clip::{CLIP_EVENTS_VERSION, ClipEvent, ClipState};
use crate::component::{Body, Component};
use crate::error::EngineError;
use crate::param::{Param, ParamSet, ParamValue};
use crate::registry::{ComponentId, Registry};
use serde_json::{Map, Value, json};

/// Parsed form of one serialized component.
#[derive(Clone, Debug, Default)]
pub struct ComponentDoc {
    /// Id recorded in the document.
    pub id: ComponentId,
    /// Class name.
    pub class: String,
    /// Modulation accent color, packed ARGB.
    pub modulation_color: u32,
    /// Non-parameter state.
    pub internal: Map<String, Value>,
    /// Parameter values by path.
    pub parameters: Map<String, Value>,
    /// Named singleton children.
    pub children: Vec<(String, ComponentDoc)>,
    /// Index-addressed child arrays.
    pub arrays: Vec<(String, Vec<ComponentDoc>)>,
    /// The raw value, kept for placeholder round-trips.
    pub raw: Value,
}

impl ComponentDoc {
    /// Parses a document value.
    pub fn parse(value: &Value) -> Result<ComponentDoc, EngineError> {
        let object = value
            .as_object()
            .ok_or_else(|| EngineError::Serialization("component must be an object".into()))?;
        let id = object
            .get("id")
            .and_then(Value::as_u64)
            .ok_or_else(|| EngineError::Serialization("component missing id".into()))?;
        let class = object
            .get("class")
            .and_then(Value::as_str)
            .ok_or_else(|| EngineError::Serialization("component missing class".into()))?
            .to_string();

        let mut doc = ComponentDoc {
            id: ComponentId(id as u32),
            class,
            modulation_color: object
                .get("modulationColor")
                .and_then(Value::as_u64)
                .unwrap_or(0xFFFF_FFFF) as u32,
            internal: object
                .get("internal")
                .and_then(Value::as_object)
                .cloned()
                .unwrap_or_default(),
            parameters: object
                .get("parameters")
                .and_then(Value::as_object)
                .cloned()
                .unwrap_or_default(),
            children: Vec::new(),
            arrays: Vec::new(),
            raw: value.clone(),
        };

        if let Some(children) = object.get("children").and_then(Value::as_object) {
            for (segment, child) in children {
                match child {
                    Value::Array(members) => {
                        let mut docs = Vec::with_capacity(members.len());
                        for member in members {
                            docs.push(ComponentDoc::parse(member)?);
                        }
                        doc.arrays.push((segment.clone(), docs));
                    }
                    _ => doc.children.push((segment.clone(), ComponentDoc::parse(child)?)),
                }
            }
        }
        Ok(doc)
    }

    /// The document's display label, when present.
    pub fn label(&self) -> Option<&str> {
        self.internal.get("label").and_then(Value::as_str)
    }

    /// The largest id mentioned anywhere in this document.
    pub fn max_id(&self) -> ComponentId {
        let mut max = self.id;
        for (_, child) in &self.children {
            max = max.max(child.max_id());
        }
        for (_, members) in &self.arrays {
            for member in members {
                max = max.max(member.max_id());
            }
        }
        max
    }
}

/// Serializes a live component subtree.
pub fn save_component(registry: &Registry, id: ComponentId) -> Result<Value, EngineError> {
    let component = registry
        .get(id)
        .ok_or_else(|| EngineError::invalid(format!("no component {id}")))?;

    // Placeholders re-emit their captured form, with the live id patched in.
    if let Body::Placeholder(blob) = &component.body {
        let mut value = blob.clone();
        if let Some(object) = value.as_object_mut() {
            object.insert("id".into(), json!(component.id.0));
        }
        return Ok(value);
    }

    let mut internal = Map::new();
    internal.insert("label".into(), json!(component.label));
    match &component.body {
        Body::Channel(state) => {
            internal.insert("active".into(), json!(state.active));
            internal.insert("next".into(), json!(state.next));
        }
        Body::Clip(state) => {
            internal.insert("events_version".into(), json!(CLIP_EVENTS_VERSION));
            internal.insert(
                "events".into(),
                serde_json::to_value(state.events()).map_err(|e| {
                    EngineError::Serialization(format!("clip events: {e}"))
                })?,
            );
        }
        Body::Pattern(slot) => internal.extend(slot.device.save_internal()),
        Body::Effect(slot) => internal.extend(slot.device.save_internal()),
        Body::Modulator(slot) => internal.extend(slot.device.save_internal()),
        _ => {}
    }

    let mut children = Map::new();
    for child_id in &component.children {
        if let Some(child) = registry.get(*child_id) {
            children.insert(
                child.path_segment.clone(),
                save_component(registry, *child_id)?,
            );
        }
    }
    for (segment, members) in component.child_arrays() {
        let mut docs = Vec::with_capacity(members.len());
        for member in members {
            docs.push(save_component(registry, *member)?);
        }
        children.insert(segment.to_string(), Value::Array(docs));
    }

    Ok(json!({
        "id": component.id.0,
        "class": component.class(),
        "modulationColor": component.modulation_color.0,
        "internal": internal,
        "parameters": save_params(&component.params),
        "children": children,
    }))
}

/// Serializes a parameter set to primitives.
///
/// Functional and trigger parameters carry no persistent state and are
/// skipped; compound parameters store their base value.
pub fn save_params(params: &ParamSet) -> Map<String, Value> {
    let mut map = Map::new();
    for param in params.iter() {
        let value = match param.value() {
            ParamValue::Bool { value } => json!(value),
            ParamValue::Discrete { value, .. } => json!(value),
            ParamValue::Bounded { value, .. } => json!(value),
            ParamValue::Compound { base, .. } => json!(base),
            ParamValue::Text { value } => json!(value),
            ParamValue::Enum { value, .. } => json!(value),
            ParamValue::Color {
                hue,
                saturation,
                brightness,
            } => json!({
                "hue": hue,
                "saturation": saturation,
                "brightness": brightness,
            }),
            ParamValue::Mutable { value } => json!(value),
            ParamValue::Functional { .. } | ParamValue::Trigger { .. } => continue,
        };
        map.insert(param.path().to_string(), value);
    }
    map
}

/// Applies serialized parameter values onto a declared set.
///
/// Unknown paths and type mismatches are logged and skipped; a document may
/// come from an older version of a device.
pub fn apply_params(params: &mut ParamSet, map: &Map<String, Value>) {
    for (path, value) in map {
        let Some(param) = params.get_mut(path) else {
            tracing::debug!(%path, "document parameter has no declared counterpart");
            continue;
        };
        let result = apply_param(param, value);
        if let Err(error) = result {
            tracing::warn!(%path, %error, "failed to apply document parameter");
        }
    }
}

fn apply_param(param: &mut Param, value: &Value) -> Result<(), EngineError> {
    match value {
        Value::Bool(b) => param.set_bool(*b),
        Value::String(s) => param.set_text(s.clone()),
        Value::Number(_) => {
            let v = value
                .as_f64()
                .ok_or_else(|| EngineError::Serialization("bad number".into()))?;
            param.set_f64(v)
        }
        Value::Object(parts) => {
            for key in ["hue", "saturation", "brightness"] {
                if let Some(part) = parts.get(key).and_then(Value::as_f64) {
                    param.set_color_part(key, part)?;
                }
            }
            Ok(())
        }
        _ => Err(EngineError::Serialization(format!(
            "unsupported parameter value {value}"
        ))),
    }
}

/// Restores clip events captured in a document's `internal` map.
pub fn load_clip_events(internal: &Map<String, Value>) -> ClipState {
    let events: Vec<ClipEvent> = internal
        .get("events")
        .and_then(|v| serde_json::from_value(v.clone()).ok())
        .unwrap_or_default();
    ClipState::new(events)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::param::Param;

    #[test]
    fn params_round_trip() {
        let mut params = ParamSet::new();
        params.add(Param::bool("enabled", true));
        params.add(Param::discrete("count", 3, 0, 8));
        params.add(Param::bounded("fader", 0.25, 0.0, 1.0));
        params.add(Param::compound("level", 0.5, 0.0, 1.0));
        params.add(Param::text("name", "wash"));
        params.add(Param::enumeration("mode", 1, &["a", "b", "c"]));
        params.add(Param::color("color", 120.0, 100.0, 50.0));
        params.add(Param::trigger("fire"));

        let saved = save_params(&params);
        assert!(!saved.contains_key("fire"), "triggers are not persisted");

        let mut restored = ParamSet::new();
        restored.add(Param::bool("enabled", false));
        restored.add(Param::discrete("count", 0, 0, 8));
        restored.add(Param::bounded("fader", 0.0, 0.0, 1.0));
        restored.add(Param::compound("level", 0.0, 0.0, 1.0));
        restored.add(Param::text("name", ""));
        restored.add(Param::enumeration("mode", 0, &["a", "b", "c"]));
        restored.add(Param::color("color", 0.0, 0.0, 0.0));
        apply_params(&mut restored, &saved);

        assert!(restored.flag("enabled"));
        assert_eq!(restored.index("count"), 3);
        assert_eq!(restored.value("fader"), 0.25);
        assert_eq!(restored.get("level").unwrap().base_f64(), 0.5);
        assert_eq!(restored.get("name").unwrap().as_text(), Some("wash"));
        assert_eq!(restored.index("mode"), 1);
        let color = restored.color("color");
        assert_eq!(color, crate::color::Color::hsb(120.0, 1.0, 0.5));
    }

    #[test]
    fn unknown_parameter_is_skipped() {
        let mut saved = Map::new();
        saved.insert("ghost".into(), json!(1.0));
        let mut params = ParamSet::new();
        params.add(Param::bounded("real", 0.5, 0.0, 1.0));
        apply_params(&mut params, &saved);
        assert_eq!(params.value("real"), 0.5);
    }

    #[test]
    fn parse_rejects_missing_class() {
        let value = json!({ "id": 3 });
        assert!(matches!(
            ComponentDoc::parse(&value),
            Err(EngineError::Serialization(_))
        ));
    }

    #[test]
    fn max_id_spans_subtree() {
        let value = json!({
            "id": 2,
            "class": "channel",
            "children": {
                "pattern": [
                    { "id": 9, "class": "solid" },
                    { "id": 4, "class": "solid" }
                ]
            }
        });
        let doc = ComponentDoc::parse(&value).unwrap();
        assert_eq!(doc.max_id(), ComponentId(9));
        assert_eq!(doc.arrays[0].1.len(), 2);
    }
}
