//! Modulation source contract.
//!
//! A modulator is a component whose device produces one normalized value per
//! tick. The modulation graph wires those outputs onto compound parameters.
//! Variants ship in sibling modules: [`crate::lfo`], [`crate::envelope`],
//! [`crate::random`], [`crate::step_seq`].

use crate::param::ParamSet;
use crate::tempo::TempoSnapshot;

/// Per-tick context handed to a modulator.
pub struct ModContext<'a> {
    /// Elapsed engine time since the previous tick, in milliseconds.
    pub dt_ms: f64,
    /// The modulator's own parameters.
    pub params: &'a ParamSet,
    /// Beat clock state, for tempo-locked modulators.
    pub tempo: TempoSnapshot,
}

/// A per-tick numeric signal source.
///
/// `tick` advances internal state by `ctx.dt_ms` and returns the new output
/// in `[0, 1]`. The engine calls it only while the modulator's `running`
/// parameter is set; `reset` returns internal state to its initial phase.
///
/// Edge-triggered behavior (envelope engage/release, step advance) is driven
/// through the modulator's own trigger parameters, which the modulation
/// graph or control mappings can fire.
pub trait Modulator: Send {
    /// Stable class name used by the factory and persistence.
    fn class_name(&self) -> &'static str;

    /// Declares this modulator's parameters. Called once on attach.
    fn declare_params(&self, params: &mut ParamSet) {
        let _ = params;
    }

    /// Advances by one tick and returns the new output in `[0, 1]`.
    fn tick(&mut self, ctx: &ModContext<'_>) -> f64;

    /// Returns internal state to its initial phase.
    fn reset(&mut self) {}

    /// Non-parameter state to persist in the component's `internal` map.
    fn save_internal(&self) -> serde_json::Map<String, serde_json::Value> {
        serde_json::Map::new()
    }

    /// Restores state captured by [`Modulator::save_internal`].
    fn load_internal(&mut self, internal: &serde_json::Map<String, serde_json::Value>) {
        let _ = internal;
    }
}
