//! Periodic low-frequency oscillator modulator.
//!
//! Owns a normalized *basis* phase in `[0, 1)` advanced by
//! `basis = (basis + dt / period) mod 1`, then maps the basis to an output
//! through a fixed transform pipeline:
//!
//! ```text
//! phase -> bias -> skew -> waveshape -> shape -> exp
//! ```
//!
//! Each stage is a pure function and an identity at its default parameter
//! value:
//!
//! | Stage | Parameter | Formula |
//! |-------|-----------|---------|
//! | phase | `phase` in `[0, 1)` | `b' = (b + phase) mod 1` |
//! | bias  | `bias` in `[-1, 1]` | piecewise stretch mapping the center `c = (bias+1)/2` to basis `0.5` |
//! | skew  | `skew` in `[-2, 2]` | `b' = b ^ 2^skew` |
//! | waveshape | `wave` | sine / triangle / ramp up / ramp down / square, output in `[0, 1]` |
//! | shape | `shape` in `[-2, 2]` | bipolar power: `x = 2v − 1`, `x' = sign(x)·abs(x)^2^shape` |
//! | exp   | `exp` in `[-2, 2]` | `v' = v ^ 2^exp` |
//!
//! With `tempo_sync` set, the basis locks to a [`TempoDivision`] of the beat
//! grid instead of free-running.

use crate::modulator::{ModContext, Modulator};
use crate::param::{Param, ParamSet, Polarity, Units};
use crate::tempo::TempoDivision;
use std::f64::consts::TAU;

/// Waveshape selection, matching the `wave` enum parameter order.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Waveshape {
    /// `(sin(2πb) + 1) / 2`
    #[default]
    Sine,
    /// Rises to 1 at `b = 0.5`, falls back.
    Triangle,
    /// `b`
    RampUp,
    /// `1 − b`
    RampDown,
    /// `1` for `b < 0.5`, else `0`.
    Square,
}

impl Waveshape {
    /// Labels for the `wave` enum parameter.
    pub const LABELS: [&'static str; 5] = ["sine", "triangle", "ramp_up", "ramp_down", "square"];

    fn from_index(index: i64) -> Waveshape {
        match index {
            1 => Waveshape::Triangle,
            2 => Waveshape::RampUp,
            3 => Waveshape::RampDown,
            4 => Waveshape::Square,
            _ => Waveshape::Sine,
        }
    }

    /// Maps a basis in `[0, 1)` to an output in `[0, 1]`.
    pub fn apply(self, basis: f64) -> f64 {
        match self {
            Waveshape::Sine => ((basis * TAU).sin() + 1.0) * 0.5,
            Waveshape::Triangle => {
                if basis < 0.5 {
                    2.0 * basis
                } else {
                    2.0 - 2.0 * basis
                }
            }
            Waveshape::RampUp => basis,
            Waveshape::RampDown => 1.0 - basis,
            Waveshape::Square => {
                if basis < 0.5 {
                    1.0
                } else {
                    0.0
                }
            }
        }
    }
}

#[inline]
fn apply_phase(basis: f64, phase: f64) -> f64 {
    (basis + phase).rem_euclid(1.0)
}

#[inline]
fn apply_bias(basis: f64, bias: f64) -> f64 {
    if bias == 0.0 {
        return basis;
    }
    let center = ((bias + 1.0) / 2.0).clamp(0.01, 0.99);
    if basis < center {
        0.5 * basis / center
    } else {
        0.5 + 0.5 * (basis - center) / (1.0 - center)
    }
}

#[inline]
fn apply_skew(basis: f64, skew: f64) -> f64 {
    if skew == 0.0 {
        basis
    } else {
        basis.powf(2f64.powf(skew))
    }
}

#[inline]
fn apply_shape(value: f64, shape: f64) -> f64 {
    if shape == 0.0 {
        return value;
    }
    let x = 2.0 * value - 1.0;
    let shaped = x.signum() * x.abs().powf(2f64.powf(shape));
    (shaped + 1.0) * 0.5
}

#[inline]
fn apply_exp(value: f64, exp: f64) -> f64 {
    if exp == 0.0 {
        value
    } else {
        value.powf(2f64.powf(exp))
    }
}

/// Periodic waveshape modulator.
#[derive(Debug, Default)]
pub struct Lfo {
    basis: f64,
}

impl Lfo {
    /// A new oscillator at basis zero.
    pub fn new() -> Lfo {
        Lfo::default()
    }

    /// Current basis in `[0, 1)`.
    pub fn basis(&self) -> f64 {
        self.basis
    }
}

impl Modulator for Lfo {
    fn class_name(&self) -> &'static str {
        "lfo"
    }

    fn declare_params(&self, params: &mut ParamSet) {
        params.add(
            Param::compound("period_ms", 1000.0, 10.0, 60_000.0)
                .with_label("Period")
                .with_units(Units::Milliseconds)
                .with_exponent(2.0),
        );
        params.add(Param::enumeration("wave", 0, &Waveshape::LABELS).with_label("Wave"));
        params.add(Param::bounded("phase", 0.0, 0.0, 1.0).with_label("Phase"));
        params.add(
            Param::bounded("bias", 0.0, -1.0, 1.0)
                .with_label("Bias")
                .with_polarity(Polarity::Bipolar),
        );
        params.add(
            Param::bounded("skew", 0.0, -2.0, 2.0)
                .with_label("Skew")
                .with_polarity(Polarity::Bipolar),
        );
        params.add(
            Param::bounded("shape", 0.0, -2.0, 2.0)
                .with_label("Shape")
                .with_polarity(Polarity::Bipolar),
        );
        params.add(
            Param::bounded("exp", 0.0, -2.0, 2.0)
                .with_label("Exp")
                .with_polarity(Polarity::Bipolar),
        );
        params.add(Param::bool("tempo_sync", false).with_label("Sync"));
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
        if ctx.params.flag("tempo_sync") && ctx.tempo.running {
            let division = TempoDivision::ALL[ctx.params.index("tempo_division") as usize];
            self.basis = ctx.tempo.division_basis(division);
        } else {
            let period = ctx.params.value("period_ms").max(1.0);
            self.basis = (self.basis + ctx.dt_ms / period).rem_euclid(1.0);
        }

        let b = apply_phase(self.basis, ctx.params.value("phase"));
        let b = apply_bias(b, ctx.params.value("bias"));
        let b = apply_skew(b, ctx.params.value("skew"));
        let wave = Waveshape::from_index(ctx.params.index("wave"));
        let v = wave.apply(b);
        let v = apply_shape(v, ctx.params.value("shape"));
        apply_exp(v, ctx.params.value("exp")).clamp(0.0, 1.0)
    }

    fn reset(&mut self) {
        self.basis = 0.0;
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
