//! Multi-stage envelope modulator.
//!
//! Advances through `DELAY -> ATTACK -> HOLD -> DECAY -> SUSTAIN -> RELEASE
//! -> OFF`; the `mode` parameter selects which stages participate (AD, AHD,
//! ADSR, AHDSR, DADSR, DAHDSR). Engage and release are edge-triggered
//! through the `engage` / `release` trigger parameters, which control
//! mappings or trigger modulations can fire. The `peak` cell scales the
//! attack target, letting a MIDI note-on install velocity response.

use crate::modulator::{ModContext, Modulator};
use crate::param::{Param, ParamSet, Units};

/// Envelope stage.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Stage {
    /// Quiescent at zero.
    #[default]
    Off,
    /// Waiting out the delay time.
    Delay,
    /// Ramping toward the peak.
    Attack,
    /// Holding at the peak.
    Hold,
    /// Falling toward the sustain level (or zero without sustain).
    Decay,
    /// Holding at the sustain level until released.
    Sustain,
    /// Falling from the release point to zero.
    Release,
}

/// Stage-set selection, matching the `mode` enum parameter order.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum EnvelopeMode {
    /// Attack, decay to zero.
    Ad,
    /// Attack, hold, decay to zero.
    Ahd,
    /// Attack, decay, sustain, release.
    #[default]
    Adsr,
    /// Attack, hold, decay, sustain, release.
    Ahdsr,
    /// Delayed ADSR.
    Dadsr,
    /// Delayed AHDSR.
    Dahdsr,
}

impl EnvelopeMode {
    /// Labels for the `mode` enum parameter.
    pub const LABELS: [&'static str; 6] = ["ad", "ahd", "adsr", "ahdsr", "dadsr", "dahdsr"];

    fn from_index(index: i64) -> EnvelopeMode {
        match index {
            0 => EnvelopeMode::Ad,
            1 => EnvelopeMode::Ahd,
            3 => EnvelopeMode::Ahdsr,
            4 => EnvelopeMode::Dadsr,
            5 => EnvelopeMode::Dahdsr,
            _ => EnvelopeMode::Adsr,
        }
    }

    fn has_delay(self) -> bool {
        matches!(self, EnvelopeMode::Dadsr | EnvelopeMode::Dahdsr)
    }

    fn has_hold(self) -> bool {
        matches!(
            self,
            EnvelopeMode::Ahd | EnvelopeMode::Ahdsr | EnvelopeMode::Dahdsr
        )
    }

    fn has_sustain(self) -> bool {
        !matches!(self, EnvelopeMode::Ad | EnvelopeMode::Ahd)
    }
}

/// Stage envelope generator.
#[derive(Debug, Default)]
pub struct Envelope {
    stage: Stage,
    stage_elapsed: f64,
    value: f64,
    attack_from: f64,
    release_from: f64,
}

impl Envelope {
    /// A new envelope in the off stage.
    pub fn new() -> Envelope {
        Envelope::default()
    }

    /// Current stage.
    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Current output value.
    pub fn value(&self) -> f64 {
        self.value
    }

    fn engage(&mut self, params: &ParamSet) {
        let mode = EnvelopeMode::from_index(params.index("mode"));
        let hard_reset = params.index("retrigger") == 0;
        if hard_reset || self.stage == Stage::Off {
            self.value = 0.0;
        }
        self.attack_from = self.value;
        self.stage = if mode.has_delay() {
            Stage::Delay
        } else {
            Stage::Attack
        };
        self.stage_elapsed = 0.0;
    }

    fn release(&mut self) {
        if !matches!(self.stage, Stage::Off | Stage::Release) {
            self.release_from = self.value;
            self.stage = Stage::Release;
            self.stage_elapsed = 0.0;
        }
    }

    fn enter(&mut self, stage: Stage) {
        self.stage = stage;
        self.stage_elapsed = 0.0;
    }

    fn advance(&mut self, params: &ParamSet, dt_ms: f64) {
        let mode = EnvelopeMode::from_index(params.index("mode"));
        let peak = params.value("peak").clamp(0.0, 1.0);
        let sustain = params.value("sustain").clamp(0.0, 1.0);
        let decay_target = if mode.has_sustain() { sustain } else { 0.0 };

        let mut dt_left = dt_ms;
        // Stage boundaries carry leftover time so short stages are not
        // swallowed by a long tick.
        while dt_left > 0.0 {
            let duration = match self.stage {
                Stage::Off | Stage::Sustain => {
                    self.value = if self.stage == Stage::Sustain {
                        sustain
                    } else {
                        0.0
                    };
                    return;
                }
                Stage::Delay => params.value("delay_ms"),
                Stage::Attack => params.value("attack_ms"),
                Stage::Hold => params.value("hold_ms"),
                Stage::Decay => params.value("decay_ms"),
                Stage::Release => params.value("release_ms"),
            };

            let remaining = duration - self.stage_elapsed;
            let step = dt_left.min(remaining.max(0.0));
            self.stage_elapsed += step;
            dt_left -= step;

            let t = if duration > 0.0 {
                (self.stage_elapsed / duration).clamp(0.0, 1.0)
            } else {
                1.0
            };
            self.value = match self.stage {
                Stage::Delay => self.value,
                Stage::Attack => self.attack_from + (peak - self.attack_from) * t,
                Stage::Hold => peak,
                Stage::Decay => peak + (decay_target - peak) * t,
                Stage::Release => self.release_from * (1.0 - t),
                Stage::Off | Stage::Sustain => unreachable!(),
            };

            if self.stage_elapsed >= duration {
                match self.stage {
                    Stage::Delay => self.enter(Stage::Attack),
                    Stage::Attack => {
                        if mode.has_hold() {
                            self.enter(Stage::Hold);
                        } else {
                            self.enter(Stage::Decay);
                        }
                    }
                    Stage::Hold => self.enter(Stage::Decay),
                    Stage::Decay => {
                        if mode.has_sustain() {
                            self.enter(Stage::Sustain);
                        } else {
                            self.enter(Stage::Off);
                        }
                    }
                    Stage::Release => self.enter(Stage::Off),
                    Stage::Off | Stage::Sustain => {}
                }
            }
        }
    }
}

impl Modulator for Envelope {
    fn class_name(&self) -> &'static str {
        "envelope"
    }

    fn declare_params(&self, params: &mut ParamSet) {
        params.add(Param::enumeration("mode", 2, &EnvelopeMode::LABELS).with_label("Mode"));
        params.add(
            Param::compound("delay_ms", 0.0, 0.0, 5000.0)
                .with_label("Delay")
                .with_units(Units::Milliseconds),
        );
        params.add(
            Param::compound("attack_ms", 100.0, 0.0, 5000.0)
                .with_label("Attack")
                .with_units(Units::Milliseconds),
        );
        params.add(
            Param::compound("hold_ms", 0.0, 0.0, 5000.0)
                .with_label("Hold")
                .with_units(Units::Milliseconds),
        );
        params.add(
            Param::compound("decay_ms", 500.0, 0.0, 10_000.0)
                .with_label("Decay")
                .with_units(Units::Milliseconds),
        );
        params.add(Param::compound("sustain", 0.5, 0.0, 1.0).with_label("Sustain"));
        params.add(
            Param::compound("release_ms", 500.0, 0.0, 10_000.0)
                .with_label("Release")
                .with_units(Units::Milliseconds),
        );
        params.add(Param::enumeration("retrigger", 0, &["reset", "continue"]));
        params.add(Param::trigger("engage").with_label("Engage"));
        params.add(Param::trigger("release").with_label("Release"));
        params.add(Param::mutable("peak", 1.0).with_label("Peak"));
    }

    fn tick(&mut self, ctx: &ModContext<'_>) -> f64 {
        if ctx.params.flag("engage") {
            self.engage(ctx.params);
        }
        if ctx.params.flag("release") {
            self.release();
        }
        self.advance(ctx.params, ctx.dt_ms);
        self.value.clamp(0.0, 1.0)
    }

    fn reset(&mut self) {
        *self = Envelope::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tempo::TempoSnapshot;

    fn setup() -> (Envelope, ParamSet) {
        let env = Envelope::new();
        let mut params = ParamSet::new();
        env.declare_params(&mut params);
        (env, params)
    }

    fn tick(env: &mut Envelope, params: &ParamSet, dt_ms: f64) -> f64 {
        env.tick(&ModContext {
            dt_ms,
            params,
            tempo: TempoSnapshot::default(),
        })
    }

    fn fire(params: &mut ParamSet, path: &str) {
        params.get_mut(path).unwrap().set_bool(true).unwrap();
    }

    fn clear(params: &mut ParamSet) {
        params.clear_triggers();
    }

    #[test]
    fn adsr_reaches_peak_then_sustain() {
        let (mut env, mut params) = setup();
        fire(&mut params, "engage");
        let v = tick(&mut env, &params, 100.0);
        assert!((v - 1.0).abs() < 1e-9, "attack complete at 100ms, got {v}");
        clear(&mut params);

        // decay 500ms toward sustain 0.5
        let v = tick(&mut env, &params, 250.0);
        assert!((v - 0.75).abs() < 1e-9, "half decay, got {v}");
        let v = tick(&mut env, &params, 250.0);
        assert!((v - 0.5).abs() < 1e-9, "sustain, got {v}");
        assert_eq!(env.stage(), Stage::Sustain);

        // sustain holds
        let v = tick(&mut env, &params, 5000.0);
        assert_eq!(v, 0.5);
    }

    #[test]
    fn release_decays_to_off() {
        let (mut env, mut params) = setup();
        fire(&mut params, "engage");
        tick(&mut env, &params, 600.0); // through attack + decay into sustain
        clear(&mut params);

        fire(&mut params, "release");
        let v = tick(&mut env, &params, 250.0);
        assert!((v - 0.25).abs() < 1e-9, "half release from 0.5, got {v}");
        clear(&mut params);
        let v = tick(&mut env, &params, 300.0);
        assert_eq!(v, 0.0);
        assert_eq!(env.stage(), Stage::Off);
    }

    #[test]
    fn ad_mode_finishes_without_release() {
        let (mut env, mut params) = setup();
        params.get_mut("mode").unwrap().set_f64(0.0).unwrap();
        fire(&mut params, "engage");
        tick(&mut env, &params, 100.0); // attack done
        clear(&mut params);
        let v = tick(&mut env, &params, 500.0); // full decay to zero
        assert_eq!(v, 0.0);
        assert_eq!(env.stage(), Stage::Off);
    }

    #[test]
    fn delay_defers_attack() {
        let (mut env, mut params) = setup();
        params.get_mut("mode").unwrap().set_f64(4.0).unwrap(); // DADSR
        params.get_mut("delay_ms").unwrap().set_f64(200.0).unwrap();
        fire(&mut params, "engage");
        let v = tick(&mut env, &params, 100.0);
        assert_eq!(v, 0.0);
        assert_eq!(env.stage(), Stage::Delay);
        clear(&mut params);
        let v = tick(&mut env, &params, 150.0); // 100ms delay left, 50ms into attack
        assert!((v - 0.5).abs() < 1e-9, "got {v}");
    }

    #[test]
    fn retrigger_continue_keeps_level() {
        let (mut env, mut params) = setup();
        params.get_mut("retrigger").unwrap().set_f64(1.0).unwrap();
        fire(&mut params, "engage");
        tick(&mut env, &params, 50.0); // halfway up the attack
        clear(&mut params);
        fire(&mut params, "engage");
        let v = tick(&mut env, &params, 0.0);
        assert!(v >= 0.5, "continue retrigger must not reset, got {v}");
    }

    #[test]
    fn peak_scales_attack_target() {
        let (mut env, mut params) = setup();
        params.get_mut("peak").unwrap().set_f64(0.6).unwrap();
        fire(&mut params, "engage");
        let v = tick(&mut env, &params, 100.0);
        assert!((v - 0.6).abs() < 1e-9);
    }
}
