//! Chase pattern: a pulse moving around the model.

use lumen_core::{Color, Param, ParamSet, Pattern, RunContext, TempoDivision, Units};

/// A moving pulse with adjustable width and falloff.
///
/// The pulse position follows an internal basis advanced by `period_ms`, or
/// the beat grid when `tempo_sync` is set.
#[derive(Debug, Default)]
pub struct Chase {
    basis: f64,
}

impl Chase {
    /// A new chase at basis zero.
    pub fn new() -> Chase {
        Chase::default()
    }
}

impl Pattern for Chase {
    fn class_name(&self) -> &'static str {
        "chase"
    }

    fn declare_params(&self, params: &mut ParamSet) {
        params.add(Param::color("color", 0.0, 100.0, 100.0).with_label("Color"));
        params.add(
            Param::compound("period_ms", 2000.0, 50.0, 60_000.0)
                .with_label("Period")
                .with_units(Units::Milliseconds)
                .with_exponent(2.0),
        );
        params.add(Param::compound("width", 0.25, 0.01, 1.0).with_label("Width"));
        params.add(Param::bool("tempo_sync", false).with_label("Sync"));
        params.add(Param::enumeration(
            "tempo_division",
            2,
            &[
                "4_bars", "2_bars", "bar", "half", "quarter", "eighth", "sixteenth",
                "dotted_quarter", "triplet_eighth",
            ],
        ));
    }

    fn run(&mut self, ctx: &RunContext<'_>, frame: &mut [Color]) {
        if ctx.params.flag("tempo_sync") && ctx.tempo.running {
            let division = TempoDivision::ALL[ctx.params.index("tempo_division") as usize];
            self.basis = ctx.tempo.division_basis(division);
        } else {
            let period = ctx.params.value("period_ms").max(1.0);
            self.basis = (self.basis + ctx.dt_ms / period).rem_euclid(1.0);
        }

        let color = ctx.params.color("color");
        let width = ctx.params.value("width");
        let count = frame.len().max(1) as f64;
        for (i, pixel) in frame.iter_mut().enumerate() {
            let position = i as f64 / count;
            // circular distance from the pulse center
            let distance = (position - self.basis).rem_euclid(1.0);
            let distance = distance.min(1.0 - distance);
            let level = (1.0 - distance / (width / 2.0)).max(0.0);
            *pixel = color.scaled(level);
        }
    }

    fn save_internal(&self) -> serde_json::Map<String, serde_json::Value> {
        let mut map = serde_json::Map::new();
        map.insert("basis".into(), self.basis.into());
        map
    }

    fn load_internal(&mut self, internal: &serde_json::Map<String, serde_json::Value>) {
        if let Some(basis) = internal.get("basis").and_then(serde_json::Value::as_f64) {
            self.basis = basis.rem_euclid(1.0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lumen_core::TempoSnapshot;

    fn run(chase: &mut Chase, params: &ParamSet, points: usize, dt_ms: f64) -> Vec<Color> {
        let mut frame = vec![Color::BLACK; points];
        let ctx = RunContext {
            dt_ms,
            params,
            palette: &[],
            tempo: TempoSnapshot::default(),
            point_count: points,
        };
        chase.run(&ctx, &mut frame);
        frame
    }

    #[test]
    fn pulse_peaks_at_its_position() {
        let mut chase = Chase::new();
        let mut params = ParamSet::new();
        chase.declare_params(&mut params);
        params.get_mut("period_ms").unwrap().set_f64(1000.0).unwrap();

        // half a period moves the pulse to the middle of the model
        let frame = run(&mut chase, &params, 8, 500.0);
        assert_eq!(frame[4].r(), 255, "pulse center is lit");
        assert_eq!(frame[0].r(), 0, "far side is dark");
    }

    #[test]
    fn width_bounds_the_lit_region() {
        let mut chase = Chase::new();
        let mut params = ParamSet::new();
        chase.declare_params(&mut params);
        params.get_mut("width").unwrap().set_f64(0.1).unwrap();

        let frame = run(&mut chase, &params, 100, 0.0);
        let lit = frame.iter().filter(|c| c.r() > 0).count();
        assert!(lit <= 12, "narrow width lights few points, got {lit}");
    }
}
