//! Device registry and factory for the lumen engine.
//!
//! Maps stable class names to constructors for the built-in patterns,
//! effects and modulators, with metadata for building pickers. The engine
//! consults the registry when a project document or an undo operation needs
//! to re-instantiate a device by name.
//!
//! # Example
//!
//! ```rust
//! use lumen_registry::{DeviceRegistry, DeviceKind};
//! use lumen_core::{DeviceFactory, DeviceInstance};
//!
//! let registry = DeviceRegistry::new();
//!
//! // List the available patterns
//! for device in registry.devices_of_kind(DeviceKind::Pattern) {
//!     println!("{}: {}", device.class, device.description);
//! }
//!
//! // Create a device by class name
//! let solid = registry.create("solid").unwrap();
//! assert!(matches!(solid, DeviceInstance::Pattern(_)));
//! ```

use lumen_core::{
    DeviceFactory, DeviceInstance, EngineError, Envelope, Lfo, Random, StepSequencer,
};
use lumen_patterns::{Chase, Decay, Desaturate, Gradient, Invert, Noise, Solid, Strobe};

/// What a registered class constructs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceKind {
    /// A frame generator.
    Pattern,
    /// A frame transformer.
    Effect,
    /// A modulation source.
    Modulator,
}

impl DeviceKind {
    /// Human-readable name for the kind.
    pub const fn name(&self) -> &'static str {
        match self {
            DeviceKind::Pattern => "Pattern",
            DeviceKind::Effect => "Effect",
            DeviceKind::Modulator => "Modulator",
        }
    }
}

/// Metadata for one registered device class.
#[derive(Debug, Clone, Copy)]
pub struct DeviceInfo {
    /// Stable class name, used in persisted documents.
    pub class: &'static str,
    /// What the class constructs.
    pub kind: DeviceKind,
    /// One-line description for pickers.
    pub description: &'static str,
}

struct Entry {
    info: DeviceInfo,
    construct: fn() -> DeviceInstance,
}

/// Registry of constructible device classes.
pub struct DeviceRegistry {
    entries: Vec<Entry>,
}

impl DeviceRegistry {
    /// A registry holding all built-in devices.
    pub fn new() -> DeviceRegistry {
        let mut registry = DeviceRegistry {
            entries: Vec::new(),
        };
        registry.install(
            DeviceInfo {
                class: "solid",
                kind: DeviceKind::Pattern,
                description: "One color across the whole model",
            },
            || DeviceInstance::Pattern(Box::new(Solid::new())),
        );
        registry.install(
            DeviceInfo {
                class: "gradient",
                kind: DeviceKind::Pattern,
                description: "Hue sweep with optional rotation",
            },
            || DeviceInstance::Pattern(Box::new(Gradient::new())),
        );
        registry.install(
            DeviceInfo {
                class: "chase",
                kind: DeviceKind::Pattern,
                description: "Moving pulse with adjustable width",
            },
            || DeviceInstance::Pattern(Box::new(Chase::new())),
        );
        registry.install(
            DeviceInfo {
                class: "noise",
                kind: DeviceKind::Pattern,
                description: "Per-point random flicker",
            },
            || DeviceInstance::Pattern(Box::new(Noise::new())),
        );
        registry.install(
            DeviceInfo {
                class: "desaturate",
                kind: DeviceKind::Effect,
                description: "Pulls colors toward gray",
            },
            || DeviceInstance::Effect(Box::new(Desaturate::new())),
        );
        registry.install(
            DeviceInfo {
                class: "invert",
                kind: DeviceKind::Effect,
                description: "Inverts the frame",
            },
            || DeviceInstance::Effect(Box::new(Invert::new())),
        );
        registry.install(
            DeviceInfo {
                class: "strobe",
                kind: DeviceKind::Effect,
                description: "Periodic blackout gate",
            },
            || DeviceInstance::Effect(Box::new(Strobe::new())),
        );
        registry.install(
            DeviceInfo {
                class: "decay",
                kind: DeviceKind::Effect,
                description: "Temporal trails",
            },
            || DeviceInstance::Effect(Box::new(Decay::new())),
        );
        registry.install(
            DeviceInfo {
                class: "lfo",
                kind: DeviceKind::Modulator,
                description: "Periodic waveshape oscillator",
            },
            || DeviceInstance::Modulator(Box::new(Lfo::new())),
        );
        registry.install(
            DeviceInfo {
                class: "envelope",
                kind: DeviceKind::Modulator,
                description: "Multi-stage triggered envelope",
            },
            || DeviceInstance::Modulator(Box::new(Envelope::new())),
        );
        registry.install(
            DeviceInfo {
                class: "random",
                kind: DeviceKind::Modulator,
                description: "Randomized target with followers",
            },
            || DeviceInstance::Modulator(Box::new(Random::new())),
        );
        registry.install(
            DeviceInfo {
                class: "step",
                kind: DeviceKind::Modulator,
                description: "Stored-value step sequencer",
            },
            || DeviceInstance::Modulator(Box::new(StepSequencer::default())),
        );
        registry
    }

    fn install(&mut self, info: DeviceInfo, construct: fn() -> DeviceInstance) {
        debug_assert!(
            self.lookup(info.class).is_none(),
            "duplicate class '{}'",
            info.class
        );
        self.entries.push(Entry { info, construct });
    }

    fn lookup(&self, class: &str) -> Option<&Entry> {
        self.entries.iter().find(|e| e.info.class == class)
    }

    /// Metadata for every registered class.
    pub fn all_devices(&self) -> impl Iterator<Item = &DeviceInfo> {
        self.entries.iter().map(|e| &e.info)
    }

    /// Metadata for classes of one kind.
    pub fn devices_of_kind(&self, kind: DeviceKind) -> Vec<&DeviceInfo> {
        self.entries
            .iter()
            .map(|e| &e.info)
            .filter(|i| i.kind == kind)
            .collect()
    }

    /// Metadata for one class, if registered.
    pub fn info(&self, class: &str) -> Option<&DeviceInfo> {
        self.lookup(class).map(|e| &e.info)
    }
}

impl Default for DeviceRegistry {
    fn default() -> Self {
        DeviceRegistry::new()
    }
}

impl DeviceFactory for DeviceRegistry {
    fn create(&self, class: &str) -> Result<DeviceInstance, EngineError> {
        self.lookup(class)
            .map(|e| (e.construct)())
            .ok_or_else(|| EngineError::Instantiation(class.to_string()))
    }

    fn classes(&self) -> Vec<&'static str> {
        self.entries.iter().map(|e| e.info.class).collect()
    }
}
