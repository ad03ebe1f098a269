//! Random flicker pattern.

use lumen_core::{Color, Param, ParamSet, Pattern, RunContext, Units};

/// Per-point random flicker.
///
/// Each point holds a brightness level that decays over time; at a
/// randomized rate, points re-spark to full. `density` sets how much of the
/// model sparkles, `decay_ms` how long each spark lingers.
#[derive(Debug)]
pub struct Noise {
    rng: oorandom::Rand64,
    levels: Vec<f64>,
}

impl Noise {
    /// Default seed, so an unseeded pattern is still deterministic.
    pub const DEFAULT_SEED: u128 = 0x6e6f697365;

    /// A new flicker field with the default seed.
    pub fn new() -> Noise {
        Noise::with_seed(Noise::DEFAULT_SEED)
    }

    /// A new flicker field with an explicit seed.
    pub fn with_seed(seed: u128) -> Noise {
        Noise {
            rng: oorandom::Rand64::new(seed),
            levels: Vec::new(),
        }
    }
}

impl Default for Noise {
    fn default() -> Self {
        Noise::new()
    }
}

impl Pattern for Noise {
    fn class_name(&self) -> &'static str {
        "noise"
    }

    fn declare_params(&self, params: &mut ParamSet) {
        params.add(Param::color("color", 0.0, 0.0, 100.0).with_label("Color"));
        params.add(Param::compound("density", 0.1, 0.0, 1.0).with_label("Density"));
        params.add(
            Param::compound("decay_ms", 400.0, 10.0, 5000.0)
                .with_label("Decay")
                .with_units(Units::Milliseconds),
        );
    }

    fn run(&mut self, ctx: &RunContext<'_>, frame: &mut [Color]) {
        self.levels.resize(frame.len(), 0.0);
        let color = ctx.params.color("color");
        let density = ctx.params.value("density");
        let decay_ms = ctx.params.value("decay_ms").max(1.0);
        // spark probability per point per tick, normalized to the decay time
        let spark_chance = density * ctx.dt_ms / decay_ms;
        let fade = ctx.dt_ms / decay_ms;

        for (level, pixel) in self.levels.iter_mut().zip(frame.iter_mut()) {
            *level = (*level - fade).max(0.0);
            if self.rng.rand_float() < spark_chance {
                *level = 1.0;
            }
            *pixel = color.scaled(*level);
        }
    }
}
