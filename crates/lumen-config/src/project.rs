//! Project document save and load.
//!
//! A project is a single JSON document:
//!
//! ```json
//! {
//!   "version": 1,
//!   "timestamp": 1722470400,
//!   "engine": { ... },
//!   "externals": { }
//! }
//! ```
//!
//! The `engine` section is produced and consumed by the engine itself;
//! `externals` is reserved for host-side state saved alongside the project
//! (window layout, attached surfaces) and round-trips untouched.

use crate::error::ProjectError;
use crate::validation::validate_project;
use lumen_core::Engine;
use serde_json::{Value, json};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

/// Format version written by this runtime.
pub const PROJECT_VERSION: u64 = 1;

/// Serializes the engine into a full project document.
pub fn save_project(engine: &mut Engine) -> Result<Value, ProjectError> {
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    Ok(json!({
        "version": PROJECT_VERSION,
        "timestamp": timestamp,
        "engine": engine.save_engine_doc()?,
        "externals": {},
    }))
}

/// Validates and loads a full project document into the engine.
///
/// Nothing is loaded from a structurally invalid document. Classes the
/// engine's factory cannot construct become placeholder components that
/// re-emit their original form on the next save.
pub fn load_project(engine: &mut Engine, document: &Value) -> Result<(), ProjectError> {
    let version = document
        .get("version")
        .and_then(Value::as_u64)
        .unwrap_or(0);
    if version > PROJECT_VERSION {
        return Err(ProjectError::UnsupportedVersion(version));
    }
    validate_project(document)?;
    let engine_section = document
        .get("engine")
        .expect("validated document has an engine section");
    engine.load_engine_doc(engine_section)?;
    tracing::info!(version, "project loaded");
    Ok(())
}

/// Saves the engine to a project file.
pub fn save_project_file(engine: &mut Engine, path: impl AsRef<Path>) -> Result<(), ProjectError> {
    let path = path.as_ref();
    let document = save_project(engine)?;
    let text = serde_json::to_string_pretty(&document)?;
    std::fs::write(path, text).map_err(|e| ProjectError::write_file(path, e))?;
    tracing::info!(path = %path.display(), "project saved");
    Ok(())
}

/// Loads a project file into the engine.
pub fn load_project_file(engine: &mut Engine, path: impl AsRef<Path>) -> Result<(), ProjectError> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|e| ProjectError::read_file(path, e))?;
    let document: Value = serde_json::from_str(&text)?;
    load_project(engine, &document)
}

/// The `externals` section of a document, for host-side state.
pub fn externals(document: &Value) -> Option<&Value> {
    document.get("externals")
}
