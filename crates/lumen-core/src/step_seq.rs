//! Step sequencer modulator.
//!
//! Emits one stored value per step. The step index advances on the
//! `advance` trigger, on a wall-time interval, or locked to a tempo
//! division, selected by the `mode` parameter. Step values are device
//! state, persisted through the component's `internal` map.

use crate::modulator::{ModContext, Modulator};
use crate::param::{Param, ParamSet, Units};
use crate::tempo::TempoDivision;

/// Advance-mode selection, matching the `mode` enum parameter order.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum StepMode {
    /// Advance on the `advance` trigger.
    #[default]
    Trigger,
    /// Advance every `interval_ms` of wall time.
    Time,
    /// Lock the index to a tempo division of the beat grid.
    Tempo,
}

impl StepMode {
    /// Labels for the `mode` enum parameter.
    pub const LABELS: [&'static str; 3] = ["trigger", "time", "tempo"];

    fn from_index(index: i64) -> StepMode {
        match index {
            1 => StepMode::Time,
            2 => StepMode::Tempo,
            _ => StepMode::Trigger,
        }
    }
}

/// Stored-value step sequencer.
#[derive(Debug)]
pub struct StepSequencer {
    steps: Vec<f64>,
    index: usize,
    elapsed_ms: f64,
}

impl StepSequencer {
    /// A sequencer over the given step values; empty input gets one zero step.
    pub fn new(steps: Vec<f64>) -> StepSequencer {
        let steps = if steps.is_empty() { vec![0.0] } else { steps };
        StepSequencer {
            steps: steps.into_iter().map(|v| v.clamp(0.0, 1.0)).collect(),
            index: 0,
            elapsed_ms: 0.0,
        }
    }

    /// Current step index.
    pub fn index(&self) -> usize {
        self.index
    }

    /// The step values.
    pub fn steps(&self) -> &[f64] {
        &self.steps
    }

    /// Replaces the step values, clamping to `[0, 1]` and keeping the index
    /// in range.
    pub fn set_steps(&mut self, steps: Vec<f64>) {
        *self = StepSequencer::new(steps);
    }
}

impl Default for StepSequencer {
    fn default() -> Self {
        // A four-step ramp is a usable starting point before values are edited.
        StepSequencer::new(vec![0.0, 1.0 / 3.0, 2.0 / 3.0, 1.0])
    }
}

impl Modulator for StepSequencer {
    fn class_name(&self) -> &'static str {
        "step"
    }

    fn declare_params(&self, params: &mut ParamSet) {
        params.add(Param::enumeration("mode", 0, &StepMode::LABELS).with_label("Mode"));
        params.add(Param::trigger("advance").with_label("Advance"));
        params.add(
            Param::compound("interval_ms", 500.0, 10.0, 60_000.0)
                .with_label("Interval")
                .with_units(Units::Milliseconds)
                .with_exponent(2.0),
        );
        params.add(Param::enumeration(
            "tempo_division",
            4,
            &[
                "4_bars", "2_bars", "bar", "half", "quarter", "eighth", "sixteenth",
                "dotted_quarter", "triplet_eighth",
            ],
        ));
    }

    fn tick(&mut self, ctx: &ModContext<'_>) -> f64 {
        match StepMode::from_index(ctx.params.index("mode")) {
            StepMode::Trigger => {
                if ctx.params.flag("advance") {
                    self.index = (self.index + 1) % self.steps.len();
                }
            }
            StepMode::Time => {
                let interval = ctx.params.value("interval_ms").max(1.0);
                self.elapsed_ms += ctx.dt_ms;
                while self.elapsed_ms >= interval {
                    self.elapsed_ms -= interval;
                    self.index = (self.index + 1) % self.steps.len();
                }
            }
            StepMode::Tempo => {
                if ctx.tempo.running {
                    let division =
                        TempoDivision::ALL[ctx.params.index("tempo_division") as usize];
                    let beats = ctx.tempo.beat_count as f64 + ctx.tempo.basis;
                    self.index = (beats / division.beats()) as usize % self.steps.len();
                }
            }
        }
        self.steps[self.index]
    }

    fn reset(&mut self) {
        self.index = 0;
        self.elapsed_ms = 0.0;
    }

    fn save_internal(&self) -> serde_json::Map<String, serde_json::Value> {
        let mut map = serde_json::Map::new();
        map.insert("steps".into(), serde_json::json!(self.steps));
        map.insert("index".into(), serde_json::json!(self.index));
        map
    }

    fn load_internal(&mut self, internal: &serde_json::Map<String, serde_json::Value>) {
        if let Some(steps) = internal.get("steps").and_then(|v| {
            v.as_array()
                .map(|a| a.iter().filter_map(serde_json::Value::as_f64).collect::<Vec<_>>())
        }) {
            self.set_steps(steps);
        }
        if let Some(index) = internal.get("index").and_then(serde_json::Value::as_u64) {
            self.index = index as usize % self.steps.len();
        }
    }
}
