//! Color inversion effect.

use lumen_core::{Color, Effect, ParamSet, RunContext};

/// Inverts the red, green and blue channels, scaled by the enabled fade.
#[derive(Debug, Default)]
pub struct Invert;

impl Invert {
    /// A new inversion effect.
    pub fn new() -> Invert {
        Invert
    }
}

impl Effect for Invert {
    fn class_name(&self) -> &'static str {
        "invert"
    }

    fn declare_params(&self, _params: &mut ParamSet) {}

    fn run(&mut self, _ctx: &RunContext<'_>, frame: &mut [Color], weight: f64) {
        for pixel in frame.iter_mut() {
            let inverted = Color::argb(
                pixel.a(),
                255 - pixel.r(),
                255 - pixel.g(),
                255 - pixel.b(),
            );
            *pixel = pixel.lerp(inverted, weight);
        }
    }
}
