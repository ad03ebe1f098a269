//! The capability interface the mixer calls each tick.
//!
//! Patterns generate a full frame of colors; effects transform a frame in
//! place. Both are object-safe traits so channels hold runtime-chosen chains
//! of `Box<dyn Pattern>` / `Box<dyn Effect>`. The per-tick contract is two
//! methods - declare parameters once, run every frame - plus optional no-op
//! lifecycle hooks.
//!
//! Devices are user-supplied code: the engine runs them behind a panic
//! boundary, and a device that panics is marked crashed and skipped on
//! subsequent ticks.

use crate::color::Color;
use crate::error::EngineError;
use crate::modulator::Modulator;
use crate::param::ParamSet;
use crate::tempo::TempoSnapshot;

/// Per-tick context handed to a running device.
pub struct RunContext<'a> {
    /// Elapsed engine time since the previous tick, in milliseconds,
    /// already scaled by the engine speed multiplier.
    pub dt_ms: f64,
    /// The device's own parameters.
    pub params: &'a ParamSet,
    /// The engine palette swatches.
    pub palette: &'a [Color],
    /// Beat clock state for this tick.
    pub tempo: TempoSnapshot,
    /// Number of points in the frame.
    pub point_count: usize,
}

/// A per-frame color generator.
///
/// `run` fills the supplied frame from scratch; the buffer contents from the
/// previous tick are unspecified. Patterns that animate keep their own
/// elapsed-time state and advance it by `ctx.dt_ms`.
pub trait Pattern: Send {
    /// Stable class name used by the factory and persistence.
    fn class_name(&self) -> &'static str;

    /// Declares this device's parameters. Called once when the device is
    /// attached to a component.
    fn declare_params(&self, params: &mut ParamSet) {
        let _ = params;
    }

    /// The pattern became the channel's active pattern.
    fn on_active(&mut self) {}

    /// The pattern stopped being active.
    fn on_inactive(&mut self) {}

    /// A transition toward or away from this pattern began.
    fn on_transition_start(&mut self) {}

    /// The transition completed.
    fn on_transition_end(&mut self) {}

    /// Produces one frame of colors.
    fn run(&mut self, ctx: &RunContext<'_>, frame: &mut [Color]);

    /// Non-parameter state to persist in the component's `internal` map.
    fn save_internal(&self) -> serde_json::Map<String, serde_json::Value> {
        serde_json::Map::new()
    }

    /// Restores state captured by [`Pattern::save_internal`].
    fn load_internal(&mut self, internal: &serde_json::Map<String, serde_json::Value>) {
        let _ = internal;
    }
}

/// A per-frame color transformer.
///
/// `run` mutates the frame in place; `weight` in `[0, 1]` is the effect's
/// enabled fade, and an effect must be an identity transform at weight zero.
pub trait Effect: Send {
    /// Stable class name used by the factory and persistence.
    fn class_name(&self) -> &'static str;

    /// Declares this device's parameters. Called once on attach.
    fn declare_params(&self, params: &mut ParamSet) {
        let _ = params;
    }

    /// The effect was enabled.
    fn on_enable(&mut self) {}

    /// The effect was disabled.
    fn on_disable(&mut self) {}

    /// Transforms one frame in place.
    fn run(&mut self, ctx: &RunContext<'_>, frame: &mut [Color], weight: f64);

    /// Non-parameter state to persist in the component's `internal` map.
    fn save_internal(&self) -> serde_json::Map<String, serde_json::Value> {
        serde_json::Map::new()
    }

    /// Restores state captured by [`Effect::save_internal`].
    fn load_internal(&mut self, internal: &serde_json::Map<String, serde_json::Value>) {
        let _ = internal;
    }
}

/// A freshly constructed device of any kind.
pub enum DeviceInstance {
    /// A pattern generator.
    Pattern(Box<dyn Pattern>),
    /// A frame effect.
    Effect(Box<dyn Effect>),
    /// A modulation source.
    Modulator(Box<dyn Modulator>),
}

impl std::fmt::Debug for DeviceInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeviceInstance::Pattern(p) => write!(f, "Pattern({})", p.class_name()),
            DeviceInstance::Effect(e) => write!(f, "Effect({})", e.class_name()),
            DeviceInstance::Modulator(m) => write!(f, "Modulator({})", m.class_name()),
        }
    }
}

/// Constructs devices by class name.
///
/// The engine consults its factory when a project document or an undo
/// operation needs to re-instantiate a device. Unknown classes fail with
/// [`EngineError::Instantiation`]; the loader then substitutes a placeholder
/// component that preserves the original serialized form.
pub trait DeviceFactory: Send {
    /// Instantiates a device.
    fn create(&self, class: &str) -> Result<DeviceInstance, EngineError>;

    /// Class names this factory can construct.
    fn classes(&self) -> Vec<&'static str>;
}

/// A factory that knows no classes. Engines built for tests that assemble
/// devices programmatically can start from this.
#[derive(Debug, Default)]
pub struct EmptyFactory;

impl DeviceFactory for EmptyFactory {
    fn create(&self, class: &str) -> Result<DeviceInstance, EngineError> {
        Err(EngineError::Instantiation(class.to_string()))
    }

    fn classes(&self) -> Vec<&'static str> {
        Vec::new()
    }
}
