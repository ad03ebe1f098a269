//! Bus composition, clips, trigger routing, and engine plumbing.

use lumen_core::{
    Body, ClipEvent, Color, Effect, EmptyFactory, Engine, EngineOptions, Envelope, ModContext,
    Modulator, ParamHandle, ParamSet, Pattern, RunContext, TriggerMode,
};

struct Solid(Color);

impl Pattern for Solid {
    fn class_name(&self) -> &'static str {
        "solid"
    }
    fn run(&mut self, _ctx: &RunContext<'_>, frame: &mut [Color]) {
        frame.fill(self.0);
    }
}

/// Renders the first palette swatch.
struct PaletteWash;

impl Pattern for PaletteWash {
    fn class_name(&self) -> &'static str {
        "palette_wash"
    }
    fn run(&mut self, ctx: &RunContext<'_>, frame: &mut [Color]) {
        let color = ctx.palette.first().copied().unwrap_or(Color::BLACK);
        frame.fill(color);
    }
}

struct Dim;

impl Effect for Dim {
    fn class_name(&self) -> &'static str {
        "dim"
    }
    fn run(&mut self, _ctx: &RunContext<'_>, frame: &mut [Color], weight: f64) {
        for pixel in frame.iter_mut() {
            *pixel = pixel.scaled(1.0 - 0.5 * weight);
        }
    }
}

fn engine(points: usize) -> Engine {
    Engine::new(EngineOptions::new(points), Box::new(EmptyFactory))
}

#[test]
fn group_sums_its_children() {
    let mut engine = engine(2);
    let group = engine.add_group();
    engine
        .add_channel_in_group(group, Box::new(Solid(Color::rgb(200, 0, 0))))
        .unwrap();
    engine
        .add_channel_in_group(group, Box::new(Solid(Color::rgb(0, 0, 200))))
        .unwrap();

    engine.tick(16.0);
    let frame = engine.frames().snapshot();
    assert_eq!((frame.main[0].r(), frame.main[0].b()), (200, 200));
}

#[test]
fn group_effects_shape_the_summed_frame() {
    let mut engine = engine(2);
    let group = engine.add_group();
    engine
        .add_channel_in_group(group, Box::new(Solid(Color::rgb(200, 0, 0))))
        .unwrap();
    engine.add_effect(group, Box::new(Dim)).unwrap();

    engine.tick(16.0);
    assert_eq!(engine.frames().snapshot().main[0].r(), 100);
}

#[test]
fn master_effects_apply_to_the_whole_mix() {
    let mut engine = engine(2);
    engine.add_channel(Box::new(Solid(Color::rgb(200, 0, 0))));
    engine.add_effect(engine.master(), Box::new(Dim)).unwrap();

    engine.tick(16.0);
    assert_eq!(engine.frames().snapshot().main[0].r(), 100);
}

#[test]
fn clips_replay_parameter_writes() {
    let mut engine = engine(2);
    let channel = engine.add_channel(Box::new(Solid(Color::RED)));
    let fader = ParamHandle::new(channel, "fader");
    let clip = engine
        .add_clip(
            channel,
            vec![
                ClipEvent {
                    time_ms: 100.0,
                    param: fader.clone(),
                    value: 0.5,
                },
                ClipEvent {
                    time_ms: 300.0,
                    param: fader.clone(),
                    value: 0.1,
                },
            ],
            400.0,
        )
        .unwrap();
    engine.start_clip(clip).unwrap();

    engine.tick(150.0);
    assert_eq!(engine.param(&fader).unwrap().base_f64(), 0.5);
    engine.tick(350.0);
    assert_eq!(engine.param(&fader).unwrap().base_f64(), 0.1);
}

#[test]
fn clips_keep_running_while_the_channel_is_disabled() {
    let mut engine = engine(2);
    let channel = engine.add_channel(Box::new(Solid(Color::RED)));
    let fader = ParamHandle::new(channel, "fader");
    engine
        .set_param_bool(&ParamHandle::new(channel, "enabled"), false)
        .unwrap();
    let clip = engine
        .add_clip(
            channel,
            vec![ClipEvent {
                time_ms: 50.0,
                param: fader.clone(),
                value: 0.25,
            }],
            100.0,
        )
        .unwrap();
    engine.start_clip(clip).unwrap();

    engine.tick(80.0);
    assert_eq!(engine.param(&fader).unwrap().base_f64(), 0.25);
}

#[test]
fn trigger_modulation_engages_an_envelope() {
    let mut engine = engine(1);
    let channel = engine.add_channel(Box::new(Solid(Color::RED)));
    let envelope = engine
        .add_modulator(engine.root(), Box::new(Envelope::new()))
        .unwrap();

    // wire the channel's cue button onto the envelope's engage trigger
    engine
        .add_trigger_modulation(
            ParamHandle::new(channel, "cue"),
            ParamHandle::new(envelope, "engage"),
            TriggerMode::Pulse,
        )
        .unwrap();

    engine.tick(16.0);
    engine
        .set_param_bool(&ParamHandle::new(channel, "cue"), true)
        .unwrap();
    // the rising edge fires this tick; the envelope consumes it next tick
    engine.tick(32.0);
    engine.tick(48.0);

    let Body::Modulator(slot) = &engine.registry().get(envelope).unwrap().body else {
        panic!("not a modulator");
    };
    assert!(slot.output > 0.0, "envelope engaged, got {}", slot.output);
}

#[test]
fn patterns_read_the_palette() {
    let mut engine = engine(2);
    engine.add_channel(Box::new(PaletteWash));
    engine
        .param(&ParamHandle::new(engine.palette(), "primary"))
        .expect("palette primary swatch");

    engine.tick(16.0);
    assert_eq!(engine.frames().snapshot().main[0], Color::RED);

    // move the primary swatch over OSC; the wash follows
    engine
        .osc_input()
        .send(lumen_core::OscMessage::new(
            "/lumen/palette/primary/hue",
            lumen_core::OscValue::Float(240.0),
        ))
        .unwrap();
    engine.tick(32.0);
    assert_eq!(engine.frames().snapshot().main[0], Color::BLUE);
}

#[test]
fn speed_multiplier_scales_engine_time() {
    let mut engine = engine(2);
    let channel = engine.add_channel(Box::new(Solid(Color::rgb(255, 0, 0))));
    engine
        .add_pattern(channel, Box::new(Solid(Color::rgb(0, 255, 0))))
        .unwrap();
    engine
        .set_param_bool(&ParamHandle::new(channel, "transition_enabled"), true)
        .unwrap();
    engine
        .set_param(&ParamHandle::new(channel, "transition_time_secs"), 1.0)
        .unwrap();
    engine
        .set_param(&ParamHandle::new(channel, "transition_blend_mode"), 0.0)
        .unwrap();
    engine
        .set_param(&ParamHandle::new(engine.root(), "speed"), 0.5)
        .unwrap();

    engine.go_pattern(channel, 1).unwrap();
    // 1000ms of wall time at half speed is 500ms of engine time
    engine.tick(1000.0);
    let state = engine.channel_state(channel).unwrap();
    assert!(state.is_transitioning());
    let mid = engine.frames().snapshot().main[0];
    assert_eq!((mid.r(), mid.g()), (128, 128));
}

#[test]
fn loop_tasks_and_one_shots_run_each_tick() {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    let mut engine = engine(1);
    engine.add_channel(Box::new(Solid(Color::RED)));

    let loop_count = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&loop_count);
    engine.add_loop_task(Box::new(move |_engine| {
        counter.fetch_add(1, Ordering::SeqCst);
    }));

    let sender = engine.task_sender();
    sender
        .send(Box::new(|engine: &mut Engine| {
            let handle = ParamHandle::new(engine.root(), "crossfader");
            let _ = engine.set_param(&handle, 0.9);
        }))
        .unwrap();

    engine.tick(16.0);
    engine.tick(32.0);

    assert_eq!(loop_count.load(Ordering::SeqCst), 2);
    let crossfader = ParamHandle::new(engine.root(), "crossfader");
    assert_eq!(engine.param(&crossfader).unwrap().as_f64(), 0.9);
}

#[test]
fn surface_view_reflects_the_mixer() {
    let mut engine = engine(2);
    let channel = engine.add_channel(Box::new(Solid(Color::RED)));
    engine.add_pattern(channel, Box::new(Solid(Color::BLUE))).unwrap();
    engine
        .set_param(&ParamHandle::new(channel, "fader"), 0.4)
        .unwrap();
    engine
        .set_param(&ParamHandle::new(channel, "focused_pattern_index"), 1.0)
        .unwrap();

    let view = engine.surface_view();
    assert_eq!(view.channels.len(), 1);
    let strip = &view.channels[0];
    assert_eq!(strip.id, channel);
    assert_eq!(strip.pattern_count, 2);
    assert_eq!(strip.fader, 0.4);
    assert_eq!(strip.focused_pattern, 1);
    assert_eq!(strip.focus_window, 8);
    assert_eq!(view.master, engine.master());
}

#[test]
fn modulators_honor_their_running_flag() {
    struct Counter(u64);
    impl Modulator for Counter {
        fn class_name(&self) -> &'static str {
            "counter"
        }
        fn tick(&mut self, _ctx: &ModContext<'_>) -> f64 {
            self.0 += 1;
            (self.0 % 100) as f64 / 100.0
        }
        fn declare_params(&self, _params: &mut ParamSet) {}
    }

    let mut engine = engine(1);
    engine.add_channel(Box::new(Solid(Color::RED)));
    let modulator = engine
        .add_modulator(engine.root(), Box::new(Counter(0)))
        .unwrap();

    engine.tick(16.0);
    engine
        .set_param_bool(&ParamHandle::new(modulator, "running"), false)
        .unwrap();
    engine.tick(32.0);
    engine.tick(48.0);

    let Body::Modulator(slot) = &engine.registry().get(modulator).unwrap().body else {
        panic!("not a modulator");
    };
    // one tick while running, frozen afterwards
    assert_eq!(slot.output, 0.01);
}

#[test]
fn envelope_stage_progression_through_the_engine() {
    let mut engine = engine(1);
    engine.add_channel(Box::new(Solid(Color::RED)));
    let envelope = engine
        .add_modulator(engine.root(), Box::new(Envelope::new()))
        .unwrap();
    let engage = ParamHandle::new(envelope, "engage");

    engine.tick(16.0);
    engine.set_param_bool(&engage, true).unwrap();
    // attack is 100ms; a 100ms tick lands the envelope at its peak
    engine.tick(116.0);

    let Body::Modulator(slot) = &engine.registry().get(envelope).unwrap().body else {
        panic!("not a modulator");
    };
    assert!(
        (slot.output - 1.0).abs() < 1e-9,
        "peak after attack, got {}",
        slot.output
    );
}
