//! Per-bus frame execution.
//!
//! These functions advance one bus for one tick: clip progression, the
//! transition state machine, pattern rendering, and the effects chain. They
//! operate on a registry and buffer pool passed in explicitly so the same
//! code runs on the engine thread and, in channel-threaded mode, on a
//! per-channel worker holding just its own subtree.
//!
//! User devices run behind a panic boundary: a panicking pattern, effect or
//! modulator is marked crashed, reported, and skipped on later ticks.

use crate::blend::{BlendMode, blend_buffers, copy_scaled};
use crate::buffer::BufferPool;
use crate::channel::{ChannelState, Transition, paths};
use crate::color::Color;
use crate::component::Body;
use crate::device::RunContext;
use crate::error::EngineError;
use crate::modulation::resolve_param_mut;
use crate::param::Param;
use crate::registry::{ComponentId, Registry};
use crate::tempo::TempoSnapshot;
use std::panic::{AssertUnwindSafe, catch_unwind};

/// Shared per-tick state threaded through bus execution.
pub(crate) struct TickContext<'a> {
    /// Speed-scaled elapsed time.
    pub dt_ms: f64,
    /// Beat clock state.
    pub tempo: TempoSnapshot,
    /// Palette swatches.
    pub palette: &'a [Color],
    /// Randomness for auto-cycle selection.
    pub rng: &'a mut oorandom::Rand64,
    /// Crash reports accumulated this tick.
    pub errors: &'a mut Vec<EngineError>,
}

/// Runs one top-level bus (channel or group) for this tick.
pub(crate) fn run_bus(
    registry: &mut Registry,
    buffers: &mut BufferPool,
    id: ComponentId,
    ctx: &mut TickContext<'_>,
) {
    let Some(component) = registry.get(id) else {
        return;
    };
    match &component.body {
        Body::Channel(_) => run_channel(registry, buffers, id, ctx),
        Body::Group(_) => run_group(registry, buffers, id, ctx),
        _ => {}
    }
}

fn run_channel(
    registry: &mut Registry,
    buffers: &mut BufferPool,
    id: ComponentId,
    ctx: &mut TickContext<'_>,
) {
    let Some(component) = registry.get(id) else {
        return;
    };
    let enabled = component.params.flag(paths::ENABLED);
    let cue = component.params.flag(paths::CUE);
    let clips = match &component.body {
        Body::Channel(state) => state.clips.clone(),
        _ => return,
    };

    // Clips progress even while the channel is dark.
    advance_bus_clips(registry, &clips, ctx);
    if !enabled && !cue {
        return;
    }

    auto_cycle(registry, id, ctx);

    // Advance the transition clock; completion fires the hooks.
    let mut finished: Option<(ComponentId, ComponentId)> = None;
    if let Some(component) = registry.get_mut(id)
        && let Body::Channel(state) = &mut component.body
        && state.is_transitioning()
    {
        let outgoing = state.active_pattern();
        let incoming = state.next_pattern();
        if state.advance_transition(ctx.dt_ms)
            && let (Some(from), Some(to)) = (outgoing, incoming)
        {
            finished = Some((from, to));
        }
    }
    if let Some((from, to)) = finished {
        pattern_hook(registry, from, ctx, |p| p.on_transition_end());
        pattern_hook(registry, to, ctx, |p| p.on_transition_end());
        pattern_hook(registry, from, ctx, |p| p.on_inactive());
    }

    // Render the active pattern, and the incoming one while transitioning.
    let Some(component) = registry.get(id) else {
        return;
    };
    let Body::Channel(state) = &component.body else {
        return;
    };
    let active = state.active_pattern();
    let incoming = state.next_pattern();
    let progress_blend = state
        .transition
        .as_ref()
        .map(|t| (t.progress(), t.blend));

    let Some(active) = active else {
        buffers.ensure(id).fill(Color::BLACK);
        return;
    };
    run_pattern(registry, buffers, active, ctx);
    if let Some(next) = incoming {
        run_pattern(registry, buffers, next, ctx);
    }

    // Compose the channel buffer from the pattern frames.
    {
        let (channel_buf, active_buf) = buffers.pair_mut(id, active);
        channel_buf.copy_from_slice(active_buf);
    }
    if let (Some(next), Some((progress, blend))) = (incoming, progress_blend) {
        let (channel_buf, next_buf) = buffers.pair_mut(id, next);
        blend_buffers(blend, channel_buf, next_buf, progress);
    }

    run_effect_chain(registry, buffers, id, ctx);
}

fn run_group(
    registry: &mut Registry,
    buffers: &mut BufferPool,
    id: ComponentId,
    ctx: &mut TickContext<'_>,
) {
    let Some(component) = registry.get(id) else {
        return;
    };
    let (children, clips) = match &component.body {
        Body::Group(state) => (state.channels.clone(), state.clips.clone()),
        _ => return,
    };

    advance_bus_clips(registry, &clips, ctx);
    for child in &children {
        run_bus(registry, buffers, *child, ctx);
    }

    // Sum enabled children into the group buffer.
    buffers.ensure(id).fill(Color::BLACK);
    let mut first = true;
    for child in &children {
        let Some(child_component) = registry.get(*child) else {
            continue;
        };
        if !child_component.params.flag(paths::ENABLED) {
            continue;
        }
        let fader = child_component.params.value(paths::FADER);
        let (group_buf, child_buf) = buffers.pair_mut(id, *child);
        if first {
            copy_scaled(child_buf, fader, group_buf);
            first = false;
        } else {
            blend_buffers(BlendMode::Add, group_buf, child_buf, fader);
        }
    }

    run_effect_chain(registry, buffers, id, ctx);
}

/// Applies a bus's effect chain to its own buffer.
fn run_effect_chain(
    registry: &mut Registry,
    buffers: &mut BufferPool,
    bus: ComponentId,
    ctx: &mut TickContext<'_>,
) {
    let Some(component) = registry.get(bus) else {
        return;
    };
    let effects = match &component.body {
        Body::Channel(state) => state.effects.clone(),
        Body::Group(state) => state.effects.clone(),
        Body::Master(state) => state.effects.clone(),
        _ => return,
    };
    let mut frame = buffers.take(bus);
    apply_effects(registry, &effects, &mut frame, ctx);
    buffers.put(bus, frame);
}

/// Runs an effect chain over a frame, in order, each scaled by its enabled
/// fade. Also used for the master chain over the main mix buffer.
pub(crate) fn apply_effects(
    registry: &mut Registry,
    effects: &[ComponentId],
    frame: &mut [Color],
    ctx: &mut TickContext<'_>,
) {
    for effect_id in effects {
        let Some(component) = registry.get_mut(*effect_id) else {
            continue;
        };
        let weight = if component.params.flag("enabled") {
            component.params.value("fade")
        } else {
            0.0
        };
        if weight <= 0.0 {
            continue;
        }
        let label = component.label.clone();
        let Body::Effect(slot) = &mut component.body else {
            continue;
        };
        if slot.crashed {
            continue;
        }
        let run_ctx = RunContext {
            dt_ms: ctx.dt_ms,
            params: &component.params,
            palette: ctx.palette,
            tempo: ctx.tempo,
            point_count: frame.len(),
        };
        let device = &mut slot.device;
        let result = catch_unwind(AssertUnwindSafe(|| device.run(&run_ctx, frame, weight)));
        if let Err(payload) = result {
            slot.crashed = true;
            ctx.errors.push(EngineError::CrashedDevice {
                device: label,
                message: crate::modulation::panic_text(&payload),
            });
        }
    }
}

fn run_pattern(
    registry: &mut Registry,
    buffers: &mut BufferPool,
    pattern: ComponentId,
    ctx: &mut TickContext<'_>,
) {
    let frame = buffers.ensure(pattern);
    let Some(component) = registry.get_mut(pattern) else {
        return;
    };
    let label = component.label.clone();
    let Body::Pattern(slot) = &mut component.body else {
        return;
    };
    if slot.crashed {
        frame.fill(Color::BLACK);
        return;
    }
    let run_ctx = RunContext {
        dt_ms: ctx.dt_ms,
        params: &component.params,
        palette: ctx.palette,
        tempo: ctx.tempo,
        point_count: frame.len(),
    };
    let device = &mut slot.device;
    let result = catch_unwind(AssertUnwindSafe(|| device.run(&run_ctx, frame)));
    if let Err(payload) = result {
        slot.crashed = true;
        frame.fill(Color::BLACK);
        ctx.errors.push(EngineError::CrashedDevice {
            device: label,
            message: crate::modulation::panic_text(&payload),
        });
    }
}

/// Invokes a lifecycle hook on a pattern device, behind the panic boundary.
pub(crate) fn pattern_hook(
    registry: &mut Registry,
    pattern: ComponentId,
    ctx: &mut TickContext<'_>,
    hook: impl FnOnce(&mut dyn crate::device::Pattern),
) {
    let Some(component) = registry.get_mut(pattern) else {
        return;
    };
    let label = component.label.clone();
    let Body::Pattern(slot) = &mut component.body else {
        return;
    };
    if slot.crashed {
        return;
    }
    let device = &mut slot.device;
    if let Err(payload) = catch_unwind(AssertUnwindSafe(|| hook(device.as_mut()))) {
        slot.crashed = true;
        ctx.errors.push(EngineError::CrashedDevice {
            device: label,
            message: crate::modulation::panic_text(&payload),
        });
    }
}

/// Advances a bus's clips and applies the parameter writes that fired.
pub(crate) fn advance_bus_clips(
    registry: &mut Registry,
    clips: &[ComponentId],
    ctx: &mut TickContext<'_>,
) {
    for clip_id in clips {
        let Some(component) = registry.get_mut(*clip_id) else {
            continue;
        };
        let length_ms = component.params.value("length_ms");
        let looping = component.params.flag("looping");
        let Body::Clip(state) = &mut component.body else {
            continue;
        };
        let fired = state.advance(ctx.dt_ms, length_ms, looping);
        for event in fired {
            let Some(param) = resolve_param_mut(registry, &event.param) else {
                continue;
            };
            if let Err(error) = param.set_f64(event.value) {
                tracing::warn!(%error, target = %event.param, "clip event write failed");
            }
        }
    }
}

/// Begins a pattern change on a channel, honoring its transition settings.
/// Fires the lifecycle hooks. Fails if `index` is out of range.
pub(crate) fn go_pattern(
    registry: &mut Registry,
    channel: ComponentId,
    index: usize,
    ctx: &mut TickContext<'_>,
) -> Result<(), EngineError> {
    let Some(component) = registry.get_mut(channel) else {
        return Err(EngineError::invalid(format!("no channel {channel}")));
    };
    let transition_enabled = component.params.flag(paths::TRANSITION_ENABLED);
    let duration_ms = component.params.value(paths::TRANSITION_TIME_SECS) * 1000.0;
    let blend_index = component.params.index(paths::TRANSITION_BLEND_MODE);
    let blend = BlendMode::ALL
        .get(blend_index as usize)
        .copied()
        .unwrap_or_default();

    let Body::Channel(state) = &mut component.body else {
        return Err(EngineError::invalid(format!("{channel} is not a channel")));
    };
    if index >= state.patterns.len() {
        return Err(EngineError::invalid(format!(
            "pattern index {index} out of range"
        )));
    }
    let transition = transition_enabled.then_some(Transition {
        elapsed_ms: 0.0,
        duration_ms,
        blend,
    });
    let immediate = transition.is_none();
    let Some((outgoing, incoming)) = state.go_pattern(index, transition) else {
        return Ok(());
    };

    pattern_hook(registry, incoming, ctx, |p| p.on_active());
    if immediate {
        pattern_hook(registry, outgoing, ctx, |p| p.on_inactive());
    } else {
        pattern_hook(registry, outgoing, ctx, |p| p.on_transition_start());
        pattern_hook(registry, incoming, ctx, |p| p.on_transition_start());
    }
    Ok(())
}

fn auto_cycle(registry: &mut Registry, channel: ComponentId, ctx: &mut TickContext<'_>) {
    let Some(component) = registry.get_mut(channel) else {
        return;
    };
    let enabled = component.params.flag(paths::AUTO_CYCLE_ENABLED);
    let threshold_ms = component.params.value(paths::AUTO_CYCLE_TIME_SECS) * 1000.0;
    let random_mode = component.params.index(paths::AUTO_CYCLE_MODE) == 1;
    let Body::Channel(state) = &mut component.body else {
        return;
    };
    if state.is_transitioning() {
        state.idle_ms = 0.0;
        return;
    }
    state.idle_ms += ctx.dt_ms;
    if !enabled || state.idle_ms < threshold_ms || state.patterns.len() < 2 {
        return;
    }
    state.idle_ms = 0.0;
    let active = state.active;
    let patterns = state.patterns.clone();

    // Candidates are the eligible patterns other than the active one.
    let eligible: Vec<usize> = patterns
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != active)
        .filter(|(_, id)| {
            registry
                .get(**id)
                .and_then(|c| c.params.get("auto_cycle_eligible"))
                .map(Param::as_bool)
                .unwrap_or(true)
        })
        .map(|(i, _)| i)
        .collect();
    if eligible.is_empty() {
        return;
    }
    let target = if random_mode {
        eligible[ctx.rng.rand_u64() as usize % eligible.len()]
    } else {
        // next eligible index after the active pattern, wrapping
        *eligible
            .iter()
            .find(|i| **i > active)
            .unwrap_or(&eligible[0])
    };
    if let Err(error) = go_pattern(registry, channel, target, ctx) {
        tracing::warn!(%error, "auto-cycle pattern change failed");
    }
}
