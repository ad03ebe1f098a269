//! Project persistence for the lumen engine.
//!
//! Saves and loads the entire engine tree - channels, patterns, effects,
//! modulators, the modulation graph, and MIDI mappings - as one structured
//! JSON document with stable component ids. Loading validates structure
//! first (all-or-nothing), remaps ids that collide with live components,
//! and substitutes placeholders for classes the runtime cannot construct.
//!
//! # Example
//!
//! ```rust,no_run
//! use lumen_core::{Engine, EngineOptions};
//! use lumen_registry::DeviceRegistry;
//! use lumen_config::{save_project_file, load_project_file};
//!
//! let mut engine = Engine::new(EngineOptions::new(128), Box::new(DeviceRegistry::new()));
//! load_project_file(&mut engine, "show.lumen.json").unwrap();
//! // ... run the show ...
//! save_project_file(&mut engine, "show.lumen.json").unwrap();
//! ```

mod error;
mod project;

/// Structural validation of project documents.
pub mod validation;

pub use error::ProjectError;
pub use project::{
    PROJECT_VERSION, externals, load_project, load_project_file, save_project, save_project_file,
};
pub use validation::{ValidationError, validate_engine_section, validate_project};
