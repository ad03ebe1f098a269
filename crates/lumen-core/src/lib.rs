//! Lumen Core - the kernel of the lumen lighting-animation engine.
//!
//! A frame-based mixer for LED art: channels run color patterns with timed
//! cross-pattern transitions and effect chains, a modulation graph drives
//! parameter values between frames, and every edit flows through an
//! undoable command layer addressing components by stable id.
//!
//! # Core Abstractions
//!
//! ## Engine tree
//!
//! - [`Engine`] - the root: registry, mixer, frame loop
//! - [`Component`] - the universal tree node (id, params, children, body)
//! - [`Registry`] - single owner of all components, id assignment + remap
//! - [`Param`] / [`ParamSet`] - typed values with listeners and units
//!
//! ## Frame pipeline
//!
//! - [`Pattern`] / [`Effect`] - the per-tick device capability interface
//! - [`BlendMode`] - pixel operators used at every mixing step
//! - [`DoubleBuffer`] - lock-guarded render/copy frame handoff
//! - [`RenderThread`] / [`OutputThread`] - optional workers
//!
//! ## Modulation
//!
//! - [`ModGraph`] - compound and trigger edges, cycle-free by construction
//! - [`Modulator`] - per-tick signal sources: [`Lfo`], [`Envelope`],
//!   [`Random`], [`StepSequencer`]
//! - [`Tempo`] - the beat clock tempo-locked modulators follow
//!
//! ## Control
//!
//! - [`Command`] - symmetric do/undo with handle-based references
//! - [`MidiEngine`] / [`OscEngine`] - inbound control inboxes
//! - [`ControlSurface`] - the surface-facing contract
//!
//! # Example
//!
//! ```rust
//! use lumen_core::{Color, Engine, EngineOptions, EmptyFactory, Pattern, RunContext};
//!
//! struct Solid(Color);
//!
//! impl Pattern for Solid {
//!     fn class_name(&self) -> &'static str {
//!         "solid"
//!     }
//!     fn run(&mut self, _ctx: &RunContext<'_>, frame: &mut [Color]) {
//!         frame.fill(self.0);
//!     }
//! }
//!
//! let mut engine = Engine::new(EngineOptions::new(16), Box::new(EmptyFactory));
//! engine.add_channel(Box::new(Solid(Color::RED)));
//! engine.tick(16.0);
//! assert_eq!(engine.frames().snapshot().main[0], Color::RED);
//! ```

pub mod blend;
pub mod buffer;
pub mod channel;
pub mod clip;
pub mod color;
pub mod command;
pub mod component;
pub mod device;
pub mod doc;
pub mod engine;
pub mod envelope;
pub mod error;
pub mod lfo;
pub mod midi;
pub mod modulation;
pub mod modulator;
pub mod osc;
pub mod output;
pub mod param;
pub mod random;
pub mod registry;
mod runtime;
pub mod render;
pub mod step_seq;
pub mod surface;
pub mod tempo;

pub use blend::{BlendMode, blend_buffers, blend_pixel, copy_scaled, lerp_buffers};
pub use buffer::BufferPool;
pub use channel::{ChannelState, CrossfadeGroup, GroupState, MasterState, Transition, paths};
pub use clip::{ClipEvent, ClipState};
pub use color::Color;
pub use command::{
    AddChannelCommand, AddClipCommand, AddModulationCommand, Command, RemoveChannelCommand,
    RemovePatternCommand, SetParameterCommand, StartClipCommand,
};
pub use component::{Body, Component, EffectSlot, ModulatorSlot, PatternSlot};
pub use device::{DeviceFactory, DeviceInstance, Effect, EmptyFactory, Pattern, RunContext};
pub use doc::{ComponentDoc, apply_params, save_component, save_params};
pub use engine::{CapturedComponent, Engine, EngineOptions, EngineTask, LoopTask};
pub use envelope::{Envelope, EnvelopeMode, Stage};
pub use error::{EngineError, ErrorSink, LogSink};
pub use lfo::{Lfo, Waveshape};
pub use midi::{MidiBind, MidiEngine, MidiMapping, MidiMessage};
pub use modulation::{
    CompoundModulation, ModGraph, ModSource, ModulationId, TriggerMode, TriggerModulation,
    resolve_param, resolve_param_mut,
};
pub use modulator::{ModContext, Modulator};
pub use osc::{OSC_ROOT, OscEngine, OscMessage, OscValue};
pub use output::{DoubleBuffer, FrameSink, FrameSnapshot, OutputThread};
pub use param::{
    ListenerToken, Param, ParamHandle, ParamSet, ParamValue, Polarity, Units,
};
pub use random::{Random, RandomOutput};
pub use registry::{ComponentId, Registry};
pub use render::RenderThread;
pub use step_seq::{StepMode, StepSequencer};
pub use surface::{ChannelView, ControlSurface, EngineView, SurfaceRequest};
pub use tempo::{Tempo, TempoDivision, TempoSnapshot};
