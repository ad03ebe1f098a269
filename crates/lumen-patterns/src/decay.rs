//! Temporal decay effect.

use lumen_core::{Color, Effect, Param, ParamSet, RunContext, Units};

/// Leaves trails: each point holds the brighter of the incoming color and a
/// decaying copy of what it showed last frame.
#[derive(Debug, Default)]
pub struct Decay {
    held: Vec<Color>,
}

impl Decay {
    /// A new decay effect with no held frame.
    pub fn new() -> Decay {
        Decay::default()
    }
}

impl Effect for Decay {
    fn class_name(&self) -> &'static str {
        "decay"
    }

    fn declare_params(&self, params: &mut ParamSet) {
        params.add(
            Param::compound("half_life_ms", 250.0, 10.0, 10_000.0)
                .with_label("Half-Life")
                .with_units(Units::Milliseconds)
                .with_exponent(2.0),
        );
    }

    fn run(&mut self, ctx: &RunContext<'_>, frame: &mut [Color], weight: f64) {
        self.held.resize(frame.len(), Color::BLACK);
        let half_life = ctx.params.value("half_life_ms").max(1.0);
        let retain = 0.5f64.powf(ctx.dt_ms / half_life) * weight;

        for (held, pixel) in self.held.iter_mut().zip(frame.iter_mut()) {
            let faded = held.scaled(retain);
            let brightest = Color::argb(
                pixel.a().max(faded.a()),
                pixel.r().max(faded.r()),
                pixel.g().max(faded.g()),
                pixel.b().max(faded.b()),
            );
            *held = brightest;
            *pixel = brightest;
        }
    }
}
