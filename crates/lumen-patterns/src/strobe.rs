//! Strobe gate effect.

use lumen_core::{Color, Effect, Param, ParamSet, RunContext, TempoDivision, Units};

/// Periodically gates the frame to black.
///
/// `duty` is the lit fraction of each period. The gate follows `period_ms`
/// or, with `tempo_sync`, a division of the beat grid.
#[derive(Debug, Default)]
pub struct Strobe {
    basis: f64,
}

impl Strobe {
    /// A new strobe at basis zero.
    pub fn new() -> Strobe {
        Strobe::default()
    }
}

impl Effect for Strobe {
    fn class_name(&self) -> &'static str {
        "strobe"
    }

    fn declare_params(&self, params: &mut ParamSet) {
        params.add(
            Param::compound("period_ms", 200.0, 20.0, 10_000.0)
                .with_label("Period")
                .with_units(Units::Milliseconds)
                .with_exponent(2.0),
        );
        params.add(Param::compound("duty", 0.5, 0.05, 0.95).with_label("Duty"));
        params.add(Param::bool("tempo_sync", false).with_label("Sync"));
        params.add(Param::enumeration(
            "tempo_division",
            5,
            &[
                "4_bars", "2_bars", "bar", "half", "quarter", "eighth", "sixteenth",
                "dotted_quarter", "triplet_eighth",
            ],
        ));
    }

    fn run(&mut self, ctx: &RunContext<'_>, frame: &mut [Color], weight: f64) {
        if ctx.params.flag("tempo_sync") && ctx.tempo.running {
            let division = TempoDivision::ALL[ctx.params.index("tempo_division") as usize];
            self.basis = ctx.tempo.division_basis(division);
        } else {
            let period = ctx.params.value("period_ms").max(1.0);
            self.basis = (self.basis + ctx.dt_ms / period).rem_euclid(1.0);
        }
        if self.basis < ctx.params.value("duty") {
            return;
        }
        // dark phase: pull the frame toward black by the enabled fade
        let keep = 1.0 - weight;
        for pixel in frame.iter_mut() {
            *pixel = pixel.scaled(keep);
        }
    }
}
