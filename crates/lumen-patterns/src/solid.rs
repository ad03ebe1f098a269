//! Solid color pattern.

use lumen_core::{Color, Param, ParamSet, Pattern, RunContext};

/// Fills the whole model with one color.
///
/// The color is a parameter, so it can be set from a project, a control
/// surface, or OSC. The `level` compound scales brightness and is the
/// natural modulation target.
#[derive(Debug, Default)]
pub struct Solid;

impl Solid {
    /// A new solid pattern; defaults to full red.
    pub fn new() -> Solid {
        Solid
    }
}

impl Pattern for Solid {
    fn class_name(&self) -> &'static str {
        "solid"
    }

    fn declare_params(&self, params: &mut ParamSet) {
        params.add(Param::color("color", 0.0, 100.0, 100.0).with_label("Color"));
        params.add(Param::compound("level", 1.0, 0.0, 1.0).with_label("Level"));
    }

    fn run(&mut self, ctx: &RunContext<'_>, frame: &mut [Color]) {
        let color = ctx.params.color("color").scaled(ctx.params.value("level"));
        frame.fill(color);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lumen_core::TempoSnapshot;

    fn run(solid: &mut Solid, params: &ParamSet, points: usize) -> Vec<Color> {
        let mut frame = vec![Color::BLACK; points];
        let ctx = RunContext {
            dt_ms: 16.0,
            params,
            palette: &[],
            tempo: TempoSnapshot::default(),
            point_count: points,
        };
        solid.run(&ctx, &mut frame);
        frame
    }

    #[test]
    fn fills_with_the_color_parameter() {
        let mut solid = Solid::new();
        let mut params = ParamSet::new();
        solid.declare_params(&mut params);
        params
            .get_mut("color")
            .unwrap()
            .set_color_part("hue", 240.0)
            .unwrap();

        let frame = run(&mut solid, &params, 3);
        assert!(frame.iter().all(|c| *c == Color::BLUE));
    }

    #[test]
    fn level_scales_brightness() {
        let mut solid = Solid::new();
        let mut params = ParamSet::new();
        solid.declare_params(&mut params);
        params.get_mut("level").unwrap().set_f64(0.5).unwrap();

        let frame = run(&mut solid, &params, 1);
        assert_eq!(frame[0].r(), 128);
        assert_eq!(frame[0].g(), 0);
    }
}
