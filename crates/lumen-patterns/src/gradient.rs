//! Hue gradient pattern.

use lumen_core::{Color, Param, ParamSet, Pattern, Polarity, RunContext, Units};

/// Sweeps a hue range across the model, optionally rotating over time.
#[derive(Debug, Default)]
pub struct Gradient {
    rotation: f64,
}

impl Gradient {
    /// A new gradient at rotation zero.
    pub fn new() -> Gradient {
        Gradient::default()
    }
}

impl Pattern for Gradient {
    fn class_name(&self) -> &'static str {
        "gradient"
    }

    fn declare_params(&self, params: &mut ParamSet) {
        params.add(
            Param::compound("base_hue", 0.0, 0.0, 360.0)
                .with_label("Base Hue")
                .with_units(Units::Degrees),
        );
        params.add(
            Param::compound("hue_span", 120.0, 0.0, 360.0)
                .with_label("Span")
                .with_units(Units::Degrees),
        );
        params.add(Param::compound("saturation", 1.0, 0.0, 1.0).with_label("Saturation"));
        params.add(Param::compound("brightness", 1.0, 0.0, 1.0).with_label("Brightness"));
        params.add(
            Param::bounded("rotate_hz", 0.0, -2.0, 2.0)
                .with_label("Rotate")
                .with_units(Units::Hertz)
                .with_polarity(Polarity::Bipolar),
        );
    }

    fn run(&mut self, ctx: &RunContext<'_>, frame: &mut [Color]) {
        self.rotation =
            (self.rotation + ctx.params.value("rotate_hz") * ctx.dt_ms / 1000.0).rem_euclid(1.0);
        let base = ctx.params.value("base_hue") + self.rotation * 360.0;
        let span = ctx.params.value("hue_span");
        let saturation = ctx.params.value("saturation");
        let brightness = ctx.params.value("brightness");

        let count = frame.len().max(1);
        for (i, pixel) in frame.iter_mut().enumerate() {
            let hue = base + span * (i as f64 / count as f64);
            *pixel = Color::hsb(hue, saturation, brightness);
        }
    }

    fn save_internal(&self) -> serde_json::Map<String, serde_json::Value> {
        let mut map = serde_json::Map::new();
        map.insert("rotation".into(), self.rotation.into());
        map
    }

    fn load_internal(&mut self, internal: &serde_json::Map<String, serde_json::Value>) {
        if let Some(rotation) = internal.get("rotation").and_then(serde_json::Value::as_f64) {
            self.rotation = rotation.rem_euclid(1.0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lumen_core::TempoSnapshot;

    #[test]
    fn spreads_hues_across_the_span() {
        let mut gradient = Gradient::new();
        let mut params = ParamSet::new();
        gradient.declare_params(&mut params);
        params.get_mut("hue_span").unwrap().set_f64(180.0).unwrap();

        let mut frame = vec![Color::BLACK; 4];
        let ctx = RunContext {
            dt_ms: 16.0,
            params: &params,
            palette: &[],
            tempo: TempoSnapshot::default(),
            point_count: 4,
        };
        gradient.run(&ctx, &mut frame);

        assert_eq!(frame[0], Color::RED);
        // halfway across four points: hue 90
        assert!((frame[2].hue() - 90.0).abs() < 2.0);
    }

    #[test]
    fn rotation_advances_with_time() {
        let mut gradient = Gradient::new();
        let mut params = ParamSet::new();
        gradient.declare_params(&mut params);
        params.get_mut("rotate_hz").unwrap().set_f64(1.0).unwrap();

        let mut frame = vec![Color::BLACK; 1];
        let ctx = RunContext {
            dt_ms: 250.0,
            params: &params,
            palette: &[],
            tempo: TempoSnapshot::default(),
            point_count: 1,
        };
        gradient.run(&ctx, &mut frame);
        // a quarter rotation moves the base hue 90 degrees
        assert!((frame[0].hue() - 90.0).abs() < 2.0);
    }
}
