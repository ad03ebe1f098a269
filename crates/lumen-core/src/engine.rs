//! The engine: component tree root, frame loop, and mixer.
//!
//! An [`Engine`] owns the registry, the modulation graph, the MIDI/OSC
//! inboxes, the per-component frame buffers, and the double-buffered output
//! handoff. An external driver calls [`Engine::tick`] with a monotonically
//! increasing time in milliseconds - either from its own loop or through
//! [`crate::render::RenderThread`].
//!
//! # Tick order
//!
//! 1. Dispatch inbound MIDI and OSC.
//! 2. Advance the beat clock in wall time.
//! 3. Scale `dt` by the engine speed for everything below.
//! 4. Evaluate the modulation graph.
//! 5. Run loop tasks and drain the thread-safe one-shot queue.
//! 6. Run every channel (patterns, transition, effects); optionally on
//!    per-channel workers.
//! 7. Blend channels into the left / right / main working buffers by
//!    crossfade group, first contributor copying against the background.
//! 8. Crossfade the group buffers into the main mix.
//! 9. Run the master bus: clips, then its effect chain over the main mix,
//!    then the master fader.
//! 10. Accumulate the cue mix from cue-tapped channels.
//! 11. Apply the output stage and publish through the double buffer.

use crate::blend::{BlendMode, blend_buffers, copy_scaled, lerp_buffers};
use crate::buffer::BufferPool;
use crate::channel::{ChannelState, CrossfadeGroup, GroupState, MasterState, paths};
use crate::clip::{ClipEvent, ClipState};
use crate::color::Color;
use crate::component::{Body, Component, EffectSlot, ModulatorSlot, PatternSlot};
use crate::device::{DeviceFactory, DeviceInstance, Effect, Pattern};
use crate::doc::{ComponentDoc, apply_params, load_clip_events, save_component, save_params};
use crate::error::{EngineError, ErrorSink, LogSink};
use crate::midi::{MidiEngine, MidiMapping, MidiMessage};
use crate::modulation::{
    CompoundModulation, ModGraph, ModSource, ModulationId, TriggerModulation,
};
use crate::modulator::Modulator;
use crate::osc::{OSC_ROOT, OscEngine, OscMessage, OscValue};
use crate::output::DoubleBuffer;
use crate::param::{Param, ParamHandle, ParamSet, Polarity, Units};
use crate::registry::{ComponentId, Registry};
use crate::runtime::{TickContext, apply_effects, go_pattern, pattern_hook, run_bus};
use crate::surface::{ChannelView, EngineView};
use crate::tempo::Tempo;
use crossbeam_channel::{Receiver, Sender, unbounded};
use serde_json::{Value, json};
use std::sync::Arc;

/// A deferred operation enqueued from any thread, drained once per tick.
pub type EngineTask = Box<dyn FnOnce(&mut Engine) + Send>;

/// A callback run at a fixed point of every tick.
pub type LoopTask = Box<dyn FnMut(&mut Engine) + Send>;

/// Construction options.
#[derive(Clone, Copy, Debug)]
pub struct EngineOptions {
    /// Number of points in the fixture model; fixed for the engine's life.
    pub point_count: usize,
    /// Seed for the engine's deterministic randomness.
    pub seed: u64,
}

impl EngineOptions {
    /// Options for a model of `point_count` points.
    pub fn new(point_count: usize) -> EngineOptions {
        EngineOptions {
            point_count,
            seed: 0x1209,
        }
    }
}

/// Everything captured when a component subtree is destroyed, sufficient to
/// rebuild it on undo: the serialized subtree, its position, and the
/// modulation edges and MIDI mappings that referenced it.
#[derive(Debug)]
pub struct CapturedComponent {
    /// Serialized subtree document.
    pub doc: Value,
    /// Index in the owning list.
    pub index: usize,
    /// Compound edges that referenced the subtree.
    pub compounds: Vec<CompoundModulation>,
    /// Trigger edges that referenced the subtree.
    pub triggers: Vec<TriggerModulation>,
    /// MIDI mappings that targeted the subtree.
    pub midi: Vec<MidiMapping>,
}

/// How a child attaches to its parent.
enum Attach {
    Named(String),
    Array(&'static str),
}

/// The lighting engine core.
pub struct Engine {
    pub(crate) registry: Registry,
    pub(crate) root: ComponentId,
    palette: ComponentId,
    tempo_component: ComponentId,
    audio: ComponentId,
    output_settings: ComponentId,
    master: ComponentId,
    pub(crate) graph: ModGraph,
    pub(crate) midi: MidiEngine,
    osc: OscEngine,
    tempo: Tempo,
    buffers: BufferPool,
    factory: Box<dyn DeviceFactory>,
    double_buffer: Arc<DoubleBuffer>,
    // mixer working buffers
    left: Vec<Color>,
    right: Vec<Color>,
    main: Vec<Color>,
    cue: Vec<Color>,
    scratch: Vec<Color>,
    tasks_tx: Sender<EngineTask>,
    tasks_rx: Receiver<EngineTask>,
    loop_tasks: Vec<LoopTask>,
    pub(crate) undo_stack: Vec<Box<dyn crate::command::Command>>,
    pub(crate) redo_stack: Vec<Box<dyn crate::command::Command>>,
    error_sink: Box<dyn ErrorSink>,
    rng: oorandom::Rand64,
    last_tick_ms: Option<f64>,
    ticks: u64,
    started: bool,
    channel_threading: bool,
}

impl Engine {
    /// Builds an engine with the given device factory.
    pub fn new(options: EngineOptions, factory: Box<dyn DeviceFactory>) -> Engine {
        let mut registry = Registry::new();

        let mut root = Component::new("engine", Body::Group(GroupState::default()));
        root.params.add(Param::bounded("speed", 1.0, 0.0, 2.0).with_label("Speed"));
        root.params.add(Param::bool("paused", false).with_label("Paused"));
        root.params
            .add(Param::bounded("crossfader", 0.5, 0.0, 1.0).with_label("Crossfader"));
        root.params.add(
            Param::enumeration("crossfader_blend_mode", 7, &blend_labels())
                .with_label("Crossfader Blend"),
        );
        root.params
            .add(Param::bounded("fps", 60.0, 10.0, 240.0).with_label("FPS"));
        let root_id = registry.register(root);
        debug_assert_eq!(root_id, ComponentId::ROOT);

        let (tasks_tx, tasks_rx) = unbounded();
        let point_count = options.point_count;
        let mut engine = Engine {
            registry,
            root: root_id,
            palette: ComponentId::UNASSIGNED,
            tempo_component: ComponentId::UNASSIGNED,
            audio: ComponentId::UNASSIGNED,
            output_settings: ComponentId::UNASSIGNED,
            master: ComponentId::UNASSIGNED,
            graph: ModGraph::new(),
            midi: MidiEngine::new(),
            osc: OscEngine::new(),
            tempo: Tempo::new(),
            buffers: BufferPool::new(point_count),
            factory,
            double_buffer: Arc::new(DoubleBuffer::new(point_count)),
            left: vec![Color::BLACK; point_count],
            right: vec![Color::BLACK; point_count],
            main: vec![Color::BLACK; point_count],
            cue: vec![Color::BLACK; point_count],
            scratch: vec![Color::BLACK; point_count],
            tasks_tx,
            tasks_rx,
            loop_tasks: Vec::new(),
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
            error_sink: Box::new(LogSink),
            rng: oorandom::Rand64::new(u128::from(options.seed)),
            last_tick_ms: None,
            ticks: 0,
            started: false,
            channel_threading: false,
        };

        let mut palette = Component::new("palette", Body::Plain);
        palette.params.add(Param::color("primary", 0.0, 100.0, 100.0));
        palette
            .params
            .add(Param::color("secondary", 120.0, 100.0, 100.0));
        palette
            .params
            .add(Param::color("tertiary", 240.0, 100.0, 100.0));
        engine.palette = engine.attach_named(root_id, "palette", palette);

        let mut tempo = Component::new("tempo", Body::Plain);
        tempo
            .params
            .add(Param::bounded("bpm", 120.0, 20.0, 300.0).with_label("BPM"));
        tempo.params.add(Param::bool("running", true));
        tempo.params.add(
            Param::functional("period_ms", |params| 60_000.0 / params.value("bpm"))
                .with_units(Units::Milliseconds),
        );
        engine.tempo_component = engine.attach_named(root_id, "tempo", tempo);

        let mut audio = Component::new("audio", Body::Plain);
        for band in ["level", "low", "mid", "high"] {
            audio.params.add(Param::mutable(band, 0.0));
        }
        engine.audio = engine.attach_named(root_id, "audio", audio);

        let mut output = Component::new("output", Body::Plain);
        output.params.add(Param::bool("enabled", true));
        output
            .params
            .add(Param::compound("brightness", 1.0, 0.0, 1.0).with_label("Brightness"));
        engine.output_settings = engine.attach_named(root_id, "output", output);

        let mut master = Component::new("master", Body::Master(MasterState::default()));
        master
            .params
            .add(Param::compound(paths::FADER, 1.0, 0.0, 1.0).with_label("Master"));
        master.params.add(Param::bool(paths::CUE, false));
        engine.master = engine.attach_named(root_id, "master", master);

        engine
    }

    fn attach_named(
        &mut self,
        parent: ComponentId,
        segment: &str,
        mut component: Component,
    ) -> ComponentId {
        component.parent = parent;
        component.path_segment = segment.to_string();
        let id = self.registry.register(component);
        self.registry
            .get_mut(parent)
            .expect("parent is live")
            .children
            .push(id);
        id
    }

    // --- accessors ---------------------------------------------------------

    /// The engine root component id.
    pub fn root(&self) -> ComponentId {
        self.root
    }

    /// The palette component id.
    pub fn palette(&self) -> ComponentId {
        self.palette
    }

    /// The tempo component id.
    pub fn tempo_component(&self) -> ComponentId {
        self.tempo_component
    }

    /// The audio meter component id.
    pub fn audio(&self) -> ComponentId {
        self.audio
    }

    /// The output settings component id.
    pub fn output_settings(&self) -> ComponentId {
        self.output_settings
    }

    /// The master bus component id.
    pub fn master(&self) -> ComponentId {
        self.master
    }

    /// Top-level buses in mix order.
    pub fn channels(&self) -> Vec<ComponentId> {
        match &self.registry.get(self.root).expect("root is live").body {
            Body::Group(state) => state.channels.clone(),
            _ => Vec::new(),
        }
    }

    /// The fixed frame length.
    pub fn point_count(&self) -> usize {
        self.buffers.point_count()
    }

    /// Number of completed ticks.
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// The double buffer readers consume frames from.
    pub fn frames(&self) -> Arc<DoubleBuffer> {
        Arc::clone(&self.double_buffer)
    }

    /// A sender for one-shot tasks executed at the next tick.
    pub fn task_sender(&self) -> Sender<EngineTask> {
        self.tasks_tx.clone()
    }

    /// Registers a callback run at the task point of every tick.
    pub fn add_loop_task(&mut self, task: LoopTask) {
        self.loop_tasks.push(task);
    }

    /// A sender for inbound MIDI messages.
    pub fn midi_input(&self) -> Sender<MidiMessage> {
        self.midi.input()
    }

    /// A sender for inbound OSC messages.
    pub fn osc_input(&self) -> Sender<OscMessage> {
        self.osc.input()
    }

    /// The MIDI mapping table.
    pub fn midi_engine(&self) -> &MidiEngine {
        &self.midi
    }

    /// The MIDI mapping table, mutable.
    pub fn midi_engine_mut(&mut self) -> &mut MidiEngine {
        &mut self.midi
    }

    /// The component registry.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// The modulation graph.
    pub fn graph(&self) -> &ModGraph {
        &self.graph
    }

    /// Builds a device from the engine's factory.
    pub fn create_device(&self, class: &str) -> Result<DeviceInstance, EngineError> {
        self.factory.create(class)
    }

    /// The render frame rate target, for the render thread.
    pub fn fps(&self) -> f64 {
        self.registry
            .get(self.root)
            .map(|c| c.params.value("fps"))
            .unwrap_or(60.0)
    }

    /// Installs the host's error channel.
    pub fn set_error_sink(&mut self, sink: Box<dyn ErrorSink>) {
        self.error_sink = sink;
    }

    pub(crate) fn report(&self, error: &EngineError) {
        self.error_sink.report(error);
    }

    /// Resolves a parameter handle.
    pub fn param(&self, handle: &ParamHandle) -> Option<&Param> {
        crate::modulation::resolve_param(&self.registry, handle)
    }

    /// Writes a numeric value through a parameter handle.
    pub fn set_param(&mut self, handle: &ParamHandle, value: f64) -> Result<(), EngineError> {
        crate::modulation::resolve_param_mut(&mut self.registry, handle)
            .ok_or_else(|| EngineError::invalid(format!("no parameter at {handle}")))?
            .set_f64(value)
    }

    /// Writes a boolean value through a parameter handle.
    pub fn set_param_bool(&mut self, handle: &ParamHandle, value: bool) -> Result<(), EngineError> {
        crate::modulation::resolve_param_mut(&mut self.registry, handle)
            .ok_or_else(|| EngineError::invalid(format!("no parameter at {handle}")))?
            .set_bool(value)
    }

    /// Switches per-channel worker mode. Only permitted before the first
    /// tick.
    pub fn set_channel_threading(&mut self, enabled: bool) -> Result<(), EngineError> {
        if self.started {
            return Err(EngineError::Concurrency(
                "channel threading cannot change after the engine has started".into(),
            ));
        }
        self.channel_threading = enabled;
        Ok(())
    }

    // --- modulation --------------------------------------------------------

    /// Adds a compound modulation edge.
    pub fn add_modulation(
        &mut self,
        source: ModSource,
        target: ParamHandle,
        amount: f64,
        polarity: Polarity,
    ) -> Result<ModulationId, EngineError> {
        self.graph
            .add_modulation(&self.registry, source, target, amount, polarity)
    }

    /// Adds a trigger edge.
    pub fn add_trigger_modulation(
        &mut self,
        source: ParamHandle,
        target: ParamHandle,
        mode: crate::modulation::TriggerMode,
    ) -> Result<ModulationId, EngineError> {
        self.graph.add_trigger(&self.registry, source, target, mode)
    }

    /// Removes a compound modulation edge.
    pub fn remove_modulation(&mut self, id: ModulationId) -> Option<CompoundModulation> {
        self.graph.remove_modulation(&mut self.registry, id)
    }

    /// Updates a compound edge's amount.
    pub fn set_modulation_amount(
        &mut self,
        id: ModulationId,
        amount: f64,
    ) -> Result<(), EngineError> {
        self.graph.set_amount(id, amount)
    }

    /// Updates a compound edge's polarity.
    pub fn set_modulation_polarity(
        &mut self,
        id: ModulationId,
        polarity: Polarity,
    ) -> Result<(), EngineError> {
        self.graph.set_polarity(id, polarity)
    }

    // --- structure ---------------------------------------------------------

    /// Adds a pattern channel seeded with an initial pattern (channels are
    /// never empty). Returns the channel's id.
    pub fn add_channel(&mut self, initial: Box<dyn Pattern>) -> ComponentId {
        let channel = self.channel_component();
        let channel_id = self.attach_to_array(self.root, "channel", channel);
        let pattern = self.pattern_component(initial);
        let pattern_id = self.attach_to_array(channel_id, "pattern", pattern);
        let mut errors = Vec::new();
        self.with_tick_context(&mut errors, |registry, ctx| {
            pattern_hook(registry, pattern_id, ctx, |p| p.on_active());
        });
        channel_id
    }

    /// Adds an empty group bus.
    pub fn add_group(&mut self) -> ComponentId {
        let group = self.group_component();
        self.attach_to_array(self.root, "channel", group)
    }

    /// Adds a pattern channel inside a group.
    pub fn add_channel_in_group(
        &mut self,
        group: ComponentId,
        initial: Box<dyn Pattern>,
    ) -> Result<ComponentId, EngineError> {
        let group = self.registry.resolve_id(group);
        if !matches!(
            self.registry.get(group).map(|c| &c.body),
            Some(Body::Group(_))
        ) {
            return Err(EngineError::invalid(format!("{group} is not a group")));
        }
        let channel = self.channel_component();
        let channel_id = self.attach_to_array(group, "channel", channel);
        let pattern = self.pattern_component(initial);
        self.attach_to_array(channel_id, "pattern", pattern);
        Ok(channel_id)
    }

    /// Appends a pattern to a channel.
    pub fn add_pattern(
        &mut self,
        channel: ComponentId,
        device: Box<dyn Pattern>,
    ) -> Result<ComponentId, EngineError> {
        let channel = self.registry.resolve_id(channel);
        if !matches!(
            self.registry.get(channel).map(|c| &c.body),
            Some(Body::Channel(_))
        ) {
            return Err(EngineError::invalid(format!("{channel} is not a channel")));
        }
        let pattern = self.pattern_component(device);
        Ok(self.attach_to_array(channel, "pattern", pattern))
    }

    /// Appends an effect to a bus (channel, group, or master).
    pub fn add_effect(
        &mut self,
        bus: ComponentId,
        device: Box<dyn Effect>,
    ) -> Result<ComponentId, EngineError> {
        let bus = self.registry.resolve_id(bus);
        if !matches!(
            self.registry.get(bus).map(|c| &c.body),
            Some(Body::Channel(_) | Body::Group(_) | Body::Master(_))
        ) {
            return Err(EngineError::invalid(format!("{bus} is not a bus")));
        }
        let effect = self.effect_component(device);
        Ok(self.attach_to_array(bus, "effect", effect))
    }

    /// Attaches a modulator to a host component and registers it in the
    /// modulation schedule.
    pub fn add_modulator(
        &mut self,
        host: ComponentId,
        device: Box<dyn Modulator>,
    ) -> Result<ComponentId, EngineError> {
        let host = self.registry.resolve_id(host);
        if !self.registry.contains(host) {
            return Err(EngineError::invalid(format!("no component {host}")));
        }
        let modulator = self.modulator_component(device);
        Ok(self.attach_to_array(host, "modulator", modulator))
    }

    /// Appends a clip to a bus.
    pub fn add_clip(
        &mut self,
        bus: ComponentId,
        events: Vec<ClipEvent>,
        length_ms: f64,
    ) -> Result<ComponentId, EngineError> {
        let bus = self.registry.resolve_id(bus);
        if !matches!(
            self.registry.get(bus).map(|c| &c.body),
            Some(Body::Channel(_) | Body::Group(_) | Body::Master(_))
        ) {
            return Err(EngineError::invalid(format!("{bus} is not a bus")));
        }
        let mut clip = Component::new("clip", Body::Clip(ClipState::new(events)));
        clip.params.add(Param::bool("looping", false));
        clip.params
            .add(Param::bounded("length_ms", length_ms, 0.0, 3_600_000.0).with_units(Units::Milliseconds));
        Ok(self.attach_to_array(bus, "clip", clip))
    }

    /// Starts a clip from its beginning.
    pub fn start_clip(&mut self, clip: ComponentId) -> Result<(), EngineError> {
        let clip = self.registry.resolve_id(clip);
        match self.registry.get_mut(clip).map(|c| &mut c.body) {
            Some(Body::Clip(state)) => {
                state.start();
                Ok(())
            }
            _ => Err(EngineError::invalid(format!("{clip} is not a clip"))),
        }
    }

    /// Stops a running clip.
    pub fn stop_clip(&mut self, clip: ComponentId) -> Result<(), EngineError> {
        let clip = self.registry.resolve_id(clip);
        match self.registry.get_mut(clip).map(|c| &mut c.body) {
            Some(Body::Clip(state)) => {
                state.stop();
                Ok(())
            }
            _ => Err(EngineError::invalid(format!("{clip} is not a clip"))),
        }
    }

    /// Begins a pattern change on a channel, honoring its transition
    /// parameters.
    pub fn go_pattern(&mut self, channel: ComponentId, index: usize) -> Result<(), EngineError> {
        let channel = self.registry.resolve_id(channel);
        let mut errors = Vec::new();
        let result = self.with_tick_context(&mut errors, |registry, ctx| {
            go_pattern(registry, channel, index, ctx)
        });
        for error in &errors {
            self.report(error);
        }
        result
    }

    /// The channel state of a pattern channel.
    pub fn channel_state(&self, channel: ComponentId) -> Option<&ChannelState> {
        self.registry.resolve(channel)?.as_channel()
    }

    /// Removes a channel (or group) from the mixer, capturing everything an
    /// undo needs.
    pub fn remove_channel(&mut self, channel: ComponentId) -> Result<CapturedComponent, EngineError> {
        let channel = self.registry.resolve_id(channel);
        let index = self
            .channels()
            .iter()
            .position(|c| *c == channel)
            .ok_or_else(|| EngineError::invalid(format!("{channel} is not a mixer channel")))?;
        let captured = self.capture_subtree(channel, index)?;
        if let Body::Group(state) = &mut self
            .registry
            .get_mut(self.root)
            .expect("root is live")
            .body
        {
            state.channels.retain(|c| *c != channel);
        }
        self.dispose_subtree(channel);
        Ok(captured)
    }

    /// Rebuilds a channel captured by [`Engine::remove_channel`]. The
    /// subtree is re-instantiated through the load path (reclaiming its old
    /// ids where free, remapping otherwise), re-attached at its original
    /// index, and the captured modulations and MIDI mappings are re-applied.
    pub fn restore_channel(
        &mut self,
        captured: &CapturedComponent,
    ) -> Result<ComponentId, EngineError> {
        let doc = ComponentDoc::parse(&captured.doc)?;
        let id = self.instantiate_child(self.root, &Attach::Array("channel"), &doc)?;
        // reposition to the original index
        if let Body::Group(state) = &mut self
            .registry
            .get_mut(self.root)
            .expect("root is live")
            .body
            && let Some(position) = state.channels.iter().position(|c| *c == id)
        {
            let moved = state.channels.remove(position);
            let index = captured.index.min(state.channels.len());
            state.channels.insert(index, moved);
        }
        self.restore_references(captured);
        Ok(id)
    }

    /// Removes a pattern from a channel. Removing the last pattern fails;
    /// removing the active or next pattern forces the transition to settle.
    pub fn remove_pattern(
        &mut self,
        channel: ComponentId,
        index: usize,
    ) -> Result<CapturedComponent, EngineError> {
        let channel = self.registry.resolve_id(channel);
        let component = self
            .registry
            .get(channel)
            .ok_or_else(|| EngineError::invalid(format!("no channel {channel}")))?;
        let Body::Channel(state) = &component.body else {
            return Err(EngineError::invalid(format!("{channel} is not a channel")));
        };
        if index >= state.patterns.len() {
            return Err(EngineError::invalid(format!(
                "pattern index {index} out of range"
            )));
        }
        if state.patterns.len() == 1 {
            return Err(EngineError::invalid(
                "cannot remove the last pattern from a channel",
            ));
        }
        let pattern = state.patterns[index];
        let captured = self.capture_subtree(pattern, index)?;
        if let Some(Body::Channel(state)) = self.registry.get_mut(channel).map(|c| &mut c.body) {
            state.patterns.remove(index);
            state.pattern_removed(index);
        }
        self.dispose_subtree(pattern);
        Ok(captured)
    }

    /// Rebuilds a pattern captured by [`Engine::remove_pattern`] at its
    /// original index.
    pub fn restore_pattern(
        &mut self,
        channel: ComponentId,
        captured: &CapturedComponent,
    ) -> Result<ComponentId, EngineError> {
        let channel = self.registry.resolve_id(channel);
        let doc = ComponentDoc::parse(&captured.doc)?;
        let id = self.instantiate_child(channel, &Attach::Array("pattern"), &doc)?;
        if let Some(Body::Channel(state)) = self.registry.get_mut(channel).map(|c| &mut c.body)
            && let Some(position) = state.patterns.iter().position(|p| *p == id)
        {
            let moved = state.patterns.remove(position);
            let index = captured.index.min(state.patterns.len());
            state.patterns.insert(index, moved);
            if index <= state.active && !state.is_transitioning() {
                state.active += 1;
                state.next = state.active;
            }
        }
        self.restore_references(captured);
        Ok(id)
    }

    /// Disposes any component subtree: modulations and MIDI mappings that
    /// reference it are removed with it, and it is detached from its parent.
    pub fn dispose_component(&mut self, id: ComponentId) {
        let id = self.registry.resolve_id(id);
        if !self.registry.contains(id) {
            return;
        }
        let parent = self.registry.get(id).map(|c| c.parent);
        if let Some(parent) = parent
            && let Some(parent_component) = self.registry.get_mut(parent)
        {
            parent_component.children.retain(|c| *c != id);
            parent_component.modulators.retain(|c| *c != id);
            match &mut parent_component.body {
                Body::Channel(state) => {
                    if let Some(index) = state.patterns.iter().position(|p| *p == id) {
                        state.patterns.remove(index);
                        state.pattern_removed(index);
                    }
                    state.effects.retain(|c| *c != id);
                    state.clips.retain(|c| *c != id);
                }
                Body::Group(state) => {
                    state.channels.retain(|c| *c != id);
                    state.effects.retain(|c| *c != id);
                    state.clips.retain(|c| *c != id);
                }
                Body::Master(state) => {
                    state.effects.retain(|c| *c != id);
                    state.clips.retain(|c| *c != id);
                }
                _ => {}
            }
        }
        self.dispose_subtree(id);
    }

    fn capture_subtree(
        &mut self,
        id: ComponentId,
        index: usize,
    ) -> Result<CapturedComponent, EngineError> {
        let doc = save_component(&self.registry, id)?;
        let ids: std::collections::HashSet<ComponentId> =
            self.collect_subtree(id).into_iter().collect();
        let (compounds, triggers) = self.graph.remove_referencing(&mut self.registry, &ids);
        let midi = self.midi.remove_referencing(&ids);
        Ok(CapturedComponent {
            doc,
            index,
            compounds,
            triggers,
            midi,
        })
    }

    fn restore_references(&mut self, captured: &CapturedComponent) {
        for edge in &captured.compounds {
            match self.graph.add_modulation(
                &self.registry,
                edge.source.clone(),
                edge.target.clone(),
                edge.amount,
                edge.polarity,
            ) {
                Ok(id) => {
                    let _ = self.graph.set_enabled(id, edge.enabled);
                }
                Err(error) => tracing::warn!(%error, "could not restore modulation"),
            }
        }
        for edge in &captured.triggers {
            match self.graph.add_trigger(
                &self.registry,
                edge.source.clone(),
                edge.target.clone(),
                edge.mode,
            ) {
                Ok(id) => {
                    let _ = self.graph.set_enabled(id, edge.enabled);
                }
                Err(error) => tracing::warn!(%error, "could not restore trigger"),
            }
        }
        for mapping in &captured.midi {
            self.midi.restore_mapping(mapping.clone());
        }
    }

    fn collect_subtree(&self, id: ComponentId) -> Vec<ComponentId> {
        let mut ids = vec![id];
        if let Some(component) = self.registry.get(id) {
            for child in component.all_children() {
                ids.extend(self.collect_subtree(child));
            }
        }
        ids
    }

    fn dispose_subtree(&mut self, id: ComponentId) {
        let ids: std::collections::HashSet<ComponentId> =
            self.collect_subtree(id).into_iter().collect();
        // Edges and mappings referencing the subtree go with it.
        let _ = self.graph.remove_referencing(&mut self.registry, &ids);
        let _ = self.midi.remove_referencing(&ids);
        for component_id in ids {
            self.graph.unregister_modulator(component_id);
            self.buffers.remove(component_id);
            self.registry.dispose(component_id);
        }
    }

    // --- component construction -------------------------------------------

    fn channel_component(&self) -> Component {
        let mut channel = Component::new("channel", Body::Channel(ChannelState::default()));
        declare_bus_params(&mut channel.params);
        declare_channel_params(&mut channel.params);
        channel
    }

    fn group_component(&self) -> Component {
        let mut group = Component::new("group", Body::Group(GroupState::default()));
        declare_bus_params(&mut group.params);
        group
    }

    fn pattern_component(&self, device: Box<dyn Pattern>) -> Component {
        let class = device.class_name();
        let mut params = ParamSet::new();
        device.declare_params(&mut params);
        params.add(Param::bool("auto_cycle_eligible", true));
        let mut component = Component::new(
            class,
            Body::Pattern(PatternSlot {
                device,
                crashed: false,
            }),
        );
        component.params = params;
        component
    }

    fn effect_component(&self, device: Box<dyn Effect>) -> Component {
        let class = device.class_name();
        let mut params = ParamSet::new();
        device.declare_params(&mut params);
        params.add(Param::bool("enabled", true));
        params.add(Param::compound("fade", 1.0, 0.0, 1.0).with_label("Fade"));
        let mut component = Component::new(
            class,
            Body::Effect(EffectSlot {
                device,
                crashed: false,
            }),
        );
        component.params = params;
        component
    }

    fn modulator_component(&self, device: Box<dyn Modulator>) -> Component {
        let class = device.class_name();
        let mut params = ParamSet::new();
        device.declare_params(&mut params);
        params.add(Param::bool("running", true));
        let mut component = Component::new(
            class,
            Body::Modulator(ModulatorSlot {
                device,
                crashed: false,
                output: 0.0,
            }),
        );
        component.params = params;
        component
    }

    /// Registers a component and links it into a parent array segment.
    fn attach_to_array(
        &mut self,
        parent: ComponentId,
        array: &'static str,
        mut component: Component,
    ) -> ComponentId {
        component.parent = parent;
        let is_modulator = matches!(component.body, Body::Modulator(_));
        let id = self.registry.register(component);
        let parent_component = self.registry.get_mut(parent).expect("parent is live");
        match array {
            "modulator" => parent_component.modulators.push(id),
            "pattern" => {
                if let Body::Channel(state) = &mut parent_component.body {
                    state.patterns.push(id);
                }
            }
            "effect" => match &mut parent_component.body {
                Body::Channel(state) => state.effects.push(id),
                Body::Group(state) => state.effects.push(id),
                Body::Master(state) => state.effects.push(id),
                _ => {}
            },
            "clip" => match &mut parent_component.body {
                Body::Channel(state) => state.clips.push(id),
                Body::Group(state) => state.clips.push(id),
                Body::Master(state) => state.clips.push(id),
                _ => {}
            },
            "channel" => {
                if let Body::Group(state) = &mut parent_component.body {
                    state.channels.push(id);
                }
            }
            _ => {}
        }
        if is_modulator {
            self.graph.register_modulator(id);
        }
        id
    }

    // --- document instantiation -------------------------------------------

    fn instantiate_child(
        &mut self,
        parent: ComponentId,
        attach: &Attach,
        doc: &ComponentDoc,
    ) -> Result<ComponentId, EngineError> {
        let mut component = match doc.class.as_str() {
            "channel" => self.channel_component(),
            "group" => self.group_component(),
            "clip" => {
                let mut clip = Component::new("clip", Body::Clip(load_clip_events(&doc.internal)));
                clip.params.add(Param::bool("looping", false));
                clip.params.add(
                    Param::bounded("length_ms", 1000.0, 0.0, 3_600_000.0)
                        .with_units(Units::Milliseconds),
                );
                clip
            }
            class => match self.factory.create(class) {
                Ok(DeviceInstance::Pattern(device)) => self.pattern_component(device),
                Ok(DeviceInstance::Effect(device)) => self.effect_component(device),
                Ok(DeviceInstance::Modulator(device)) => self.modulator_component(device),
                Err(error) => {
                    self.report(&error);
                    tracing::warn!(class, "substituting placeholder for unknown class");
                    Component::new(class, Body::Placeholder(doc.raw.clone()))
                }
            },
        };
        let placeholder = matches!(component.body, Body::Placeholder(_));

        if let Some(label) = doc.label() {
            component.label = label.to_string();
        }
        component.modulation_color = Color(doc.modulation_color);
        apply_params(&mut component.params, &doc.parameters);
        match &mut component.body {
            Body::Pattern(slot) => slot.device.load_internal(&doc.internal),
            Body::Effect(slot) => slot.device.load_internal(&doc.internal),
            Body::Modulator(slot) => slot.device.load_internal(&doc.internal),
            _ => {}
        }

        component.parent = parent;
        if let Attach::Named(segment) = attach {
            component.path_segment = segment.clone();
        }
        let is_modulator = matches!(component.body, Body::Modulator(_));
        let id = if doc.id.is_assigned() {
            self.registry.register_with_id(component, doc.id)
        } else {
            self.registry.register(component)
        };

        // Link into the parent.
        match attach {
            Attach::Named(_) => {
                self.registry
                    .get_mut(parent)
                    .expect("parent is live")
                    .children
                    .push(id);
            }
            Attach::Array(name) => {
                let parent_component = self.registry.get_mut(parent).expect("parent is live");
                match *name {
                    "modulator" => parent_component.modulators.push(id),
                    "pattern" => {
                        if let Body::Channel(state) = &mut parent_component.body {
                            state.patterns.push(id);
                        }
                    }
                    "effect" => match &mut parent_component.body {
                        Body::Channel(state) => state.effects.push(id),
                        Body::Group(state) => state.effects.push(id),
                        Body::Master(state) => state.effects.push(id),
                        _ => {}
                    },
                    "clip" => match &mut parent_component.body {
                        Body::Channel(state) => state.clips.push(id),
                        Body::Group(state) => state.clips.push(id),
                        Body::Master(state) => state.clips.push(id),
                        _ => {}
                    },
                    "channel" => {
                        if let Body::Group(state) = &mut parent_component.body {
                            state.channels.push(id);
                        }
                    }
                    other => {
                        return Err(EngineError::Serialization(format!(
                            "unknown child array '{other}'"
                        )));
                    }
                }
            }
        }
        if is_modulator {
            self.graph.register_modulator(id);
        }

        // Placeholders keep their whole subtree inside the blob.
        if !placeholder {
            for (segment, child) in &doc.children {
                self.instantiate_child(id, &Attach::Named(segment.clone()), child)?;
            }
            for (array, members) in &doc.arrays {
                let name: &'static str = match array.as_str() {
                    "pattern" => "pattern",
                    "effect" => "effect",
                    "clip" => "clip",
                    "modulator" => "modulator",
                    "channel" => "channel",
                    other => {
                        return Err(EngineError::Serialization(format!(
                            "unknown child array '{other}'"
                        )));
                    }
                };
                for member in members {
                    self.instantiate_child(id, &Attach::Array(name), member)?;
                }
            }
        }

        // Channel post-conditions: at least one pattern, indices in range.
        if doc.class == "channel" {
            let Some(Body::Channel(state)) = self.registry.get_mut(id).map(|c| &mut c.body)
            else {
                unreachable!("just built a channel");
            };
            if state.patterns.is_empty() {
                return Err(EngineError::Serialization(format!(
                    "channel {id} has no patterns"
                )));
            }
            let last = state.patterns.len() - 1;
            state.active = (doc
                .internal
                .get("active")
                .and_then(Value::as_u64)
                .unwrap_or(0) as usize)
                .min(last);
            state.next = state.active;
        }
        Ok(id)
    }

    // --- tick --------------------------------------------------------------

    /// Advances the engine to `now_ms` (milliseconds since engine start) and
    /// publishes one frame, unless paused.
    pub fn tick(&mut self, now_ms: f64) {
        self.started = true;
        let wall_dt = (now_ms - self.last_tick_ms.unwrap_or(0.0)).max(0.0);
        self.last_tick_ms = Some(now_ms);

        // 1. inbound control
        self.midi.dispatch(&mut self.registry);
        for message in self.osc.drain() {
            if let Err(error) = self.dispatch_osc_message(&message) {
                tracing::warn!(%error, path = %message.path, "osc dispatch failed");
                self.report(&error);
            }
        }

        // 2. clock and audio always run in wall time
        let (bpm, clock_running) = {
            let tempo = self
                .registry
                .get(self.tempo_component)
                .expect("tempo is live");
            (tempo.params.value("bpm"), tempo.params.flag("running"))
        };
        self.tempo.advance(wall_dt, bpm, clock_running);

        for component in self.registry.iter_mut() {
            component.params.refresh_functional();
        }

        let (speed, paused) = {
            let root = self.registry.get(self.root).expect("root is live");
            (root.params.value("speed"), root.params.flag("paused"))
        };
        if paused {
            return;
        }

        // 3. engine time
        let dt = wall_dt * speed;
        let tempo_snapshot = self.tempo.snapshot();

        // 4. modulation graph
        for crash in self.graph.evaluate(&mut self.registry, dt, tempo_snapshot) {
            self.report(&crash);
        }

        // 5. loop tasks, then the thread-safe one-shot queue
        let mut loop_tasks = std::mem::take(&mut self.loop_tasks);
        for task in &mut loop_tasks {
            task(self);
        }
        loop_tasks.append(&mut self.loop_tasks);
        self.loop_tasks = loop_tasks;
        while let Ok(task) = self.tasks_rx.try_recv() {
            task(self);
        }

        // 6. run channels
        let palette = self.palette_colors();
        let channels = self.channels();
        let mut errors = Vec::new();
        if self.channel_threading {
            self.run_buses_parallel(&channels, dt, &palette, &mut errors);
        } else {
            let mut ctx = TickContext {
                dt_ms: dt,
                tempo: tempo_snapshot,
                palette: &palette,
                rng: &mut self.rng,
                errors: &mut errors,
            };
            for id in &channels {
                run_bus(&mut self.registry, &mut self.buffers, *id, &mut ctx);
            }
        }

        // 7. blend channels into the group buffers
        self.left.fill(Color::BLACK);
        self.right.fill(Color::BLACK);
        self.main.fill(Color::BLACK);
        let mut left_used = false;
        let mut right_used = false;
        let mut main_used = false;
        for id in &channels {
            let Some(component) = self.registry.get(*id) else {
                continue;
            };
            if !component.params.flag(paths::ENABLED) {
                continue;
            }
            let fader = component.params.value(paths::FADER);
            let group = CrossfadeGroup::from_index(component.params.index(paths::CROSSFADE_GROUP));
            let Some(frame) = self.buffers.get(*id) else {
                continue;
            };
            let (target, used) = match group {
                CrossfadeGroup::A => (&mut self.left, &mut left_used),
                CrossfadeGroup::B => (&mut self.right, &mut right_used),
                CrossfadeGroup::Bypass => (&mut self.main, &mut main_used),
            };
            if *used {
                blend_buffers(BlendMode::Add, target, frame, fader);
            } else {
                copy_scaled(frame, fader, target);
                *used = true;
            }
        }

        // 8. crossfade the group buffers into the main mix
        let (crossfader, crossfade_blend) = {
            let root = self.registry.get(self.root).expect("root is live");
            let index = root.params.index("crossfader_blend_mode") as usize;
            (
                root.params.value("crossfader"),
                BlendMode::ALL.get(index).copied().unwrap_or(BlendMode::Dissolve),
            )
        };
        if left_used && right_used {
            // Blend the dominant side over the balanced midpoint of both.
            lerp_buffers(&self.left, &self.right, 0.5, &mut self.scratch);
            let alpha = (2.0 * (crossfader - 0.5).abs()).min(1.0);
            let side = if crossfader <= 0.5 {
                &self.left
            } else {
                &self.right
            };
            blend_buffers(crossfade_blend, &mut self.scratch, side, alpha);
            if main_used {
                blend_buffers(BlendMode::Add, &mut self.main, &self.scratch, 1.0);
            } else {
                self.main.copy_from_slice(&self.scratch);
                main_used = true;
            }
        } else if left_used || right_used {
            let (side, alpha) = if left_used {
                (&self.left, (2.0 * (1.0 - crossfader)).min(1.0))
            } else {
                (&self.right, (2.0 * crossfader).min(1.0))
            };
            if main_used {
                blend_buffers(BlendMode::Add, &mut self.main, side, alpha);
            } else {
                copy_scaled(side, alpha, &mut self.main);
                main_used = true;
            }
        }
        let _ = main_used;

        // 9. master bus: clips and effects over the main mix
        let (master_effects, master_clips, master_fader, master_cue) = {
            let master = self.registry.get(self.master).expect("master is live");
            let Body::Master(state) = &master.body else {
                unreachable!("master body");
            };
            (
                state.effects.clone(),
                state.clips.clone(),
                master.params.value(paths::FADER),
                master.params.flag(paths::CUE),
            )
        };
        {
            let mut ctx = TickContext {
                dt_ms: dt,
                tempo: tempo_snapshot,
                palette: &palette,
                rng: &mut self.rng,
                errors: &mut errors,
            };
            crate::runtime::advance_bus_clips(&mut self.registry, &master_clips, &mut ctx);
            apply_effects(&mut self.registry, &master_effects, &mut self.main, &mut ctx);
        }
        if master_fader < 1.0 {
            for pixel in &mut self.main {
                *pixel = pixel.scaled(master_fader);
            }
        }

        // 10. cue mix
        self.cue.fill(Color::BLACK);
        let mut cue_active = false;
        for id in &channels {
            let Some(component) = self.registry.get(*id) else {
                continue;
            };
            if !component.params.flag(paths::CUE) {
                continue;
            }
            let Some(frame) = self.buffers.get(*id) else {
                continue;
            };
            if cue_active {
                blend_buffers(BlendMode::Add, &mut self.cue, frame, 1.0);
            } else {
                copy_scaled(frame, 1.0, &mut self.cue);
                cue_active = true;
            }
        }
        if master_cue {
            if cue_active {
                blend_buffers(BlendMode::Add, &mut self.cue, &self.main, 1.0);
            } else {
                self.cue.copy_from_slice(&self.main);
                cue_active = true;
            }
        }

        for error in &errors {
            self.report(error);
        }

        // 11. output stage, then publish
        let (output_enabled, brightness) = {
            let output = self
                .registry
                .get(self.output_settings)
                .expect("output is live");
            (
                output.params.flag("enabled"),
                output.params.value("brightness"),
            )
        };
        let scale = if output_enabled { brightness } else { 0.0 };
        if scale < 1.0 {
            for pixel in &mut self.main {
                *pixel = pixel.scaled(scale);
            }
        }

        self.double_buffer.publish(&self.main, &self.cue, cue_active);
        self.ticks += 1;
    }

    fn run_buses_parallel(
        &mut self,
        channels: &[ComponentId],
        dt: f64,
        palette: &[Color],
        errors: &mut Vec<EngineError>,
    ) {
        struct Job {
            registry: Registry,
            buffers: BufferPool,
            bus: ComponentId,
            ids: Vec<ComponentId>,
            rng: oorandom::Rand64,
            errors: Vec<EngineError>,
        }

        let tempo = self.tempo.snapshot();
        let mut jobs = Vec::with_capacity(channels.len());
        for bus in channels {
            let ids = self.collect_subtree(*bus);
            let mut registry = Registry::new();
            let mut buffers = BufferPool::new(self.buffers.point_count());
            for id in &ids {
                if let Some(component) = self.registry.dispose(*id) {
                    registry.adopt(component);
                }
                buffers.put(*id, self.buffers.take(*id));
            }
            jobs.push(Job {
                registry,
                buffers,
                bus: *bus,
                ids,
                rng: oorandom::Rand64::new(u128::from(self.rng.rand_u64())),
                errors: Vec::new(),
            });
        }

        // The scope join is the mixer's completion barrier.
        std::thread::scope(|scope| {
            for job in &mut jobs {
                scope.spawn(move || {
                    let mut ctx = TickContext {
                        dt_ms: dt,
                        tempo,
                        palette,
                        rng: &mut job.rng,
                        errors: &mut job.errors,
                    };
                    run_bus(&mut job.registry, &mut job.buffers, job.bus, &mut ctx);
                });
            }
        });

        for mut job in jobs {
            for id in &job.ids {
                if let Some(component) = job.registry.dispose(*id) {
                    self.registry.adopt(component);
                }
                self.buffers.put(*id, job.buffers.take(*id));
            }
            errors.append(&mut job.errors);
        }
    }

    fn palette_colors(&self) -> Vec<Color> {
        let Some(palette) = self.registry.get(self.palette) else {
            return Vec::new();
        };
        palette
            .params
            .iter()
            .filter_map(Param::as_color)
            .collect()
    }

    fn with_tick_context<R>(
        &mut self,
        errors: &mut Vec<EngineError>,
        f: impl FnOnce(&mut Registry, &mut TickContext<'_>) -> R,
    ) -> R {
        let tempo = self.tempo.snapshot();
        let mut ctx = TickContext {
            dt_ms: 0.0,
            tempo,
            palette: &[],
            rng: &mut self.rng,
            errors,
        };
        f(&mut self.registry, &mut ctx)
    }

    // --- OSC addressing ----------------------------------------------------

    /// The canonical OSC address of a parameter, e.g.
    /// `/lumen/channel/1/fader`.
    pub fn param_path(&self, handle: &ParamHandle) -> Option<String> {
        let mut segments = vec![handle.path.clone()];
        let mut current = self.registry.resolve_id(handle.component);
        self.registry.get(current)?.params.get(&handle.path)?;
        while current != self.root {
            let component = self.registry.get(current)?;
            let parent = self.registry.get(component.parent)?;
            if parent.children.contains(&current) {
                segments.push(component.path_segment.clone());
            } else {
                let mut found = false;
                for (name, members) in parent.child_arrays() {
                    if let Some(position) = members.iter().position(|m| *m == current) {
                        segments.push((position + 1).to_string());
                        segments.push(name.to_string());
                        found = true;
                        break;
                    }
                }
                if !found {
                    return None;
                }
            }
            current = component.parent;
        }
        let mut path = String::from(OSC_ROOT);
        for segment in segments.iter().rev() {
            path.push('/');
            path.push_str(segment);
        }
        Some(path)
    }

    /// Resolves an inbound OSC message to a parameter write.
    pub fn dispatch_osc_message(&mut self, message: &OscMessage) -> Result<(), EngineError> {
        let relative = message
            .path
            .strip_prefix(OSC_ROOT)
            .ok_or_else(|| EngineError::invalid(format!("unknown osc root: {}", message.path)))?;
        let segments: Vec<&str> = relative.split('/').filter(|s| !s.is_empty()).collect();
        if segments.is_empty() {
            return Err(EngineError::invalid("empty osc address"));
        }

        // Walk the tree as far as segments resolve to components.
        let mut current = self.root;
        let mut index = 0;
        'walk: while index < segments.len() {
            let component = self
                .registry
                .get(current)
                .ok_or_else(|| EngineError::invalid("osc address hit a dead component"))?;
            let segment = segments[index];
            for child in &component.children {
                if self
                    .registry
                    .get(*child)
                    .is_some_and(|c| c.path_segment == segment)
                {
                    current = *child;
                    index += 1;
                    continue 'walk;
                }
            }
            for (name, members) in component.child_arrays() {
                if name == segment {
                    let position: usize = segments
                        .get(index + 1)
                        .and_then(|s| s.parse().ok())
                        .ok_or_else(|| {
                            EngineError::invalid(format!("missing index after '{segment}'"))
                        })?;
                    let member = members.get(position.wrapping_sub(1)).ok_or_else(|| {
                        EngineError::invalid(format!("index {position} out of range"))
                    })?;
                    current = *member;
                    index += 2;
                    continue 'walk;
                }
            }
            break;
        }

        let remaining = &segments[index..];
        let component = self
            .registry
            .get_mut(current)
            .ok_or_else(|| EngineError::invalid("osc address hit a dead component"))?;
        let param = remaining
            .first()
            .and_then(|path| component.params.get_mut(*path))
            .ok_or_else(|| EngineError::invalid(format!("no parameter at {}", message.path)))?;
        match remaining {
            [_] => match &message.value {
                OscValue::Float(v) => param.set_f64(*v),
                OscValue::Int(v) => param.set_f64(*v as f64),
                OscValue::Bool(b) => param.set_bool(*b),
                OscValue::Text(s) => param.set_text(s.clone()),
            },
            [_, part] => {
                let value = message.value.as_f64().ok_or_else(|| {
                    EngineError::invalid("color parts take numeric arguments")
                })?;
                param.set_color_part(*part, value)
            }
            _ => Err(EngineError::invalid(format!(
                "unresolvable osc address {}",
                message.path
            ))),
        }
    }

    // --- surface views -----------------------------------------------------

    /// Builds the surface-facing view of one channel.
    pub fn channel_view(&self, channel: ComponentId) -> Option<ChannelView> {
        let component = self.registry.resolve(channel)?;
        let (pattern_count, active_pattern) = match &component.body {
            Body::Channel(state) => (state.patterns.len(), state.active),
            _ => (0, 0),
        };
        Some(ChannelView {
            id: component.id,
            label: component.label.clone(),
            fader: component.params.value(paths::FADER),
            enabled: component.params.flag(paths::ENABLED),
            cue: component.params.flag(paths::CUE),
            pattern_count,
            active_pattern,
            focused_pattern: component
                .params
                .get(paths::FOCUSED_PATTERN_INDEX)
                .map(|p| p.as_i64() as usize)
                .unwrap_or(0),
            focus_window: component
                .params
                .get(paths::FOCUS_WINDOW)
                .map(|p| p.as_i64() as usize)
                .unwrap_or(0),
        })
    }

    /// Builds the surface-facing view of the mixer.
    pub fn surface_view(&self) -> EngineView {
        EngineView {
            channels: self
                .channels()
                .iter()
                .filter_map(|id| self.channel_view(*id))
                .collect(),
            crossfader: self
                .registry
                .get(self.root)
                .map(|c| c.params.value("crossfader"))
                .unwrap_or(0.5),
            master: self.master,
        }
    }

    // --- persistence -------------------------------------------------------

    /// Serializes the engine tree to its document form. Resets the project
    /// remap table first; ids written are the current live ids.
    pub fn save_engine_doc(&mut self) -> Result<Value, EngineError> {
        self.registry.reset_project_remap();
        let root = self.registry.get(self.root).expect("root is live");
        let parameters = save_params(&root.params);
        let modulator_docs: Vec<Value> = root
            .modulators
            .clone()
            .into_iter()
            .map(|id| save_component(&self.registry, id))
            .collect::<Result<_, _>>()?;

        let channels: Vec<Value> = self
            .channels()
            .into_iter()
            .map(|id| save_component(&self.registry, id))
            .collect::<Result<_, _>>()?;

        Ok(json!({
            "parameters": parameters,
            "palette": save_component(&self.registry, self.palette)?,
            "tempo": save_component(&self.registry, self.tempo_component)?,
            "audio": save_component(&self.registry, self.audio)?,
            "output": save_component(&self.registry, self.output_settings)?,
            "master": save_component(&self.registry, self.master)?,
            "channels": channels,
            "components": {},
            "modulation": {
                "modulators": modulator_docs,
                "compounds": serde_json::to_value(self.graph.compounds())
                    .map_err(|e| EngineError::Serialization(e.to_string()))?,
                "triggers": serde_json::to_value(self.graph.triggers())
                    .map_err(|e| EngineError::Serialization(e.to_string()))?,
            },
            "osc": { "root": OSC_ROOT },
            "midi": {
                "mappings": serde_json::to_value(self.midi.mappings())
                    .map_err(|e| EngineError::Serialization(e.to_string()))?,
            },
        }))
    }

    /// Rebuilds the engine tree from a document produced by
    /// [`Engine::save_engine_doc`]. Ids that collide with live components
    /// are remapped; classes the factory cannot construct become
    /// placeholders.
    pub fn load_engine_doc(&mut self, value: &Value) -> Result<(), EngineError> {
        let object = value
            .as_object()
            .ok_or_else(|| EngineError::Serialization("engine document must be an object".into()))?;

        self.registry.reset_project_remap();

        // Parse everything up front; a structurally invalid document loads
        // nothing.
        let channel_docs: Vec<ComponentDoc> = object
            .get("channels")
            .and_then(Value::as_array)
            .map(|docs| docs.iter().map(ComponentDoc::parse).collect())
            .transpose()?
            .unwrap_or_default();
        let modulation = object.get("modulation").and_then(Value::as_object);
        let modulator_docs: Vec<ComponentDoc> = modulation
            .and_then(|m| m.get("modulators"))
            .and_then(Value::as_array)
            .map(|docs| docs.iter().map(ComponentDoc::parse).collect())
            .transpose()?
            .unwrap_or_default();
        let singleton_docs: Vec<(ComponentId, ComponentDoc)> = [
            ("palette", self.palette),
            ("tempo", self.tempo_component),
            ("audio", self.audio),
            ("output", self.output_settings),
        ]
        .into_iter()
        .filter_map(|(key, id)| object.get(key).map(|doc| (id, ComponentDoc::parse(doc))))
        .map(|(id, doc)| doc.map(|d| (id, d)))
        .collect::<Result<_, _>>()?;
        let master_doc = object
            .get("master")
            .map(ComponentDoc::parse)
            .transpose()?;

        // Reserve past the maximum id mentioned anywhere in the document.
        let mut max_id = ComponentId::UNASSIGNED;
        for doc in channel_docs
            .iter()
            .chain(modulator_docs.iter())
            .chain(singleton_docs.iter().map(|(_, d)| d))
            .chain(master_doc.iter())
        {
            max_id = max_id.max(doc.max_id());
        }
        self.registry.reserve_through(max_id);

        // Out with the current mix.
        for channel in self.channels() {
            if let Body::Group(state) = &mut self
                .registry
                .get_mut(self.root)
                .expect("root is live")
                .body
            {
                state.channels.retain(|c| *c != channel);
            }
            self.dispose_subtree(channel);
        }
        for modulator in self.registry.get(self.root).expect("root is live").modulators.clone() {
            self.dispose_component(modulator);
        }
        for master_child in {
            let master = self.registry.get(self.master).expect("master is live");
            master.all_children()
        } {
            self.dispose_component(master_child);
        }

        // Root parameters and singletons.
        if let Some(parameters) = object.get("parameters").and_then(Value::as_object) {
            let root = self.registry.get_mut(self.root).expect("root is live");
            apply_params(&mut root.params, parameters);
        }
        for (id, doc) in &singleton_docs {
            let component = self.registry.get_mut(*id).expect("singleton is live");
            if let Some(label) = doc.label() {
                component.label = label.to_string();
            }
            component.modulation_color = Color(doc.modulation_color);
            apply_params(&mut component.params, &doc.parameters);
        }
        if let Some(doc) = &master_doc {
            let component = self.registry.get_mut(self.master).expect("master is live");
            if let Some(label) = doc.label() {
                component.label = label.to_string();
            }
            apply_params(&mut component.params, &doc.parameters);
            for (array, members) in &doc.arrays {
                let name: &'static str = match array.as_str() {
                    "effect" => "effect",
                    "clip" => "clip",
                    "modulator" => "modulator",
                    _ => continue,
                };
                for member in members {
                    self.instantiate_child(self.master, &Attach::Array(name), member)?;
                }
            }
        }

        // Channels, then global modulators, then the graph edges.
        for doc in &channel_docs {
            self.instantiate_child(self.root, &Attach::Array("channel"), doc)?;
        }
        for doc in &modulator_docs {
            self.instantiate_child(self.root, &Attach::Array("modulator"), doc)?;
        }

        if let Some(modulation) = modulation {
            let compounds: Vec<CompoundModulation> = modulation
                .get("compounds")
                .map(|v| {
                    serde_json::from_value(v.clone())
                        .map_err(|e| EngineError::Serialization(format!("compounds: {e}")))
                })
                .transpose()?
                .unwrap_or_default();
            for edge in compounds {
                match self.graph.add_modulation(
                    &self.registry,
                    edge.source.clone(),
                    edge.target.clone(),
                    edge.amount,
                    edge.polarity,
                ) {
                    Ok(id) => {
                        let _ = self.graph.set_enabled(id, edge.enabled);
                    }
                    Err(error) => {
                        tracing::warn!(%error, target = %edge.target, "dropping modulation");
                    }
                }
            }
            let triggers: Vec<TriggerModulation> = modulation
                .get("triggers")
                .map(|v| {
                    serde_json::from_value(v.clone())
                        .map_err(|e| EngineError::Serialization(format!("triggers: {e}")))
                })
                .transpose()?
                .unwrap_or_default();
            for edge in triggers {
                match self.graph.add_trigger(
                    &self.registry,
                    edge.source.clone(),
                    edge.target.clone(),
                    edge.mode,
                ) {
                    Ok(id) => {
                        let _ = self.graph.set_enabled(id, edge.enabled);
                    }
                    Err(error) => {
                        tracing::warn!(%error, target = %edge.target, "dropping trigger");
                    }
                }
            }
        }

        if let Some(mappings) = object
            .get("midi")
            .and_then(Value::as_object)
            .and_then(|m| m.get("mappings"))
        {
            let mappings: Vec<MidiMapping> = serde_json::from_value(mappings.clone())
                .map_err(|e| EngineError::Serialization(format!("midi mappings: {e}")))?;
            for mapping in mappings {
                self.midi.restore_mapping(mapping);
            }
        }

        tracing::info!(
            channels = channel_docs.len(),
            components = self.registry.len(),
            "engine document loaded"
        );
        Ok(())
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("points", &self.point_count())
            .field("components", &self.registry.len())
            .field("channels", &self.channels().len())
            .field("ticks", &self.ticks)
            .finish()
    }
}

fn blend_labels() -> Vec<&'static str> {
    BlendMode::ALL.iter().map(|m| m.name()).collect()
}

fn declare_bus_params(params: &mut ParamSet) {
    params.add(Param::compound(paths::FADER, 1.0, 0.0, 1.0).with_label("Fader"));
    params.add(Param::bool(paths::ENABLED, true).with_label("Enabled"));
    params.add(Param::bool(paths::CUE, false).with_label("Cue"));
    params.add(
        Param::enumeration(paths::CROSSFADE_GROUP, 2, &CrossfadeGroup::LABELS)
            .with_label("Crossfade Group"),
    );
}

fn declare_channel_params(params: &mut ParamSet) {
    params.add(Param::bool(paths::TRANSITION_ENABLED, false).with_label("Transitions"));
    params.add(
        Param::bounded(paths::TRANSITION_TIME_SECS, 5.0, 0.0, 180.0)
            .with_label("Transition Time")
            .with_units(Units::Seconds),
    );
    params.add(
        Param::enumeration(paths::TRANSITION_BLEND_MODE, 7, &blend_labels())
            .with_label("Transition Blend"),
    );
    params.add(Param::bool(paths::AUTO_CYCLE_ENABLED, false).with_label("Auto-Cycle"));
    params.add(
        Param::bounded(paths::AUTO_CYCLE_TIME_SECS, 60.0, 1.0, 3600.0)
            .with_label("Cycle Time")
            .with_units(Units::Seconds),
    );
    params.add(Param::enumeration(paths::AUTO_CYCLE_MODE, 0, &["next", "random"]));
    params.add(Param::discrete(paths::FOCUSED_PATTERN_INDEX, 0, 0, 1024));
    params.add(Param::discrete(paths::FOCUS_WINDOW, 8, 1, 129));
}
