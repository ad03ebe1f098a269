//! Desaturation effect.

use lumen_core::{Color, Effect, Param, ParamSet, RunContext};

/// Pulls colors toward their gray value.
///
/// `amount` sets how far toward gray at full weight; the enabled fade
/// scales it, so an effect fading in desaturates gradually.
#[derive(Debug, Default)]
pub struct Desaturate;

impl Desaturate {
    /// A new desaturation effect.
    pub fn new() -> Desaturate {
        Desaturate
    }
}

impl Effect for Desaturate {
    fn class_name(&self) -> &'static str {
        "desaturate"
    }

    fn declare_params(&self, params: &mut ParamSet) {
        params.add(Param::compound("amount", 1.0, 0.0, 1.0).with_label("Amount"));
    }

    fn run(&mut self, ctx: &RunContext<'_>, frame: &mut [Color], weight: f64) {
        let amount = ctx.params.value("amount") * weight;
        if amount <= 0.0 {
            return;
        }
        for pixel in frame.iter_mut() {
            // Rec. 601 luma
            let gray = (f64::from(pixel.r()) * 0.299
                + f64::from(pixel.g()) * 0.587
                + f64::from(pixel.b()) * 0.114)
                .round() as u8;
            *pixel = pixel.lerp(Color::argb(pixel.a(), gray, gray, gray), amount);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lumen_core::TempoSnapshot;

    fn run(frame: &mut [Color], weight: f64) {
        let mut effect = Desaturate::new();
        let mut params = ParamSet::new();
        effect.declare_params(&mut params);
        let ctx = RunContext {
            dt_ms: 16.0,
            params: &params,
            palette: &[],
            tempo: TempoSnapshot::default(),
            point_count: frame.len(),
        };
        effect.run(&ctx, frame, weight);
    }

    #[test]
    fn full_weight_grays_the_frame() {
        let mut frame = [Color::RED];
        run(&mut frame, 1.0);
        assert_eq!(frame[0].r(), frame[0].g());
        assert_eq!(frame[0].g(), frame[0].b());
    }

    #[test]
    fn zero_weight_is_identity() {
        let mut frame = [Color::RED];
        run(&mut frame, 0.0);
        assert_eq!(frame[0], Color::RED);
    }
}
