//! Control-surface facing views.
//!
//! The core does not know any concrete MIDI device. A surface implementation
//! binds inbound messages to engine operations and subscribes parameter
//! listeners for lighting feedback; the engine exposes read-only views of
//! its mixer so surfaces can lay out their controls without reaching into
//! the component tree. Per-channel focus state (cursor + window) lives in
//! channel parameters and is persisted with the project, so a surface can
//! re-bind after reload.

use crate::midi::MidiMessage;
use crate::registry::ComponentId;

/// Surface-facing summary of one channel strip.
#[derive(Clone, Debug, PartialEq)]
pub struct ChannelView {
    /// The channel component's id.
    pub id: ComponentId,
    /// Display label.
    pub label: String,
    /// Current fader position.
    pub fader: f64,
    /// Whether the channel is enabled.
    pub enabled: bool,
    /// Whether the channel is cued.
    pub cue: bool,
    /// Number of patterns on the channel.
    pub pattern_count: usize,
    /// Index of the active pattern.
    pub active_pattern: usize,
    /// Persisted surface focus cursor.
    pub focused_pattern: usize,
    /// Persisted surface focus window length.
    pub focus_window: usize,
}

/// Surface-facing summary of the mixer.
#[derive(Clone, Debug, PartialEq)]
pub struct EngineView {
    /// Channel strips in mix order.
    pub channels: Vec<ChannelView>,
    /// Master crossfader position.
    pub crossfader: f64,
    /// The master bus component id.
    pub master: ComponentId,
}

/// A control surface bound to the engine.
///
/// The host owns surface instances and pumps them: inbound transport bytes
/// decode to [`MidiMessage`]s and arrive via `on_midi` together with the
/// current [`EngineView`]; the surface returns engine requests as plain
/// data, keeping the core free of any device specifics.
pub trait ControlSurface: Send {
    /// Surface name for diagnostics.
    fn name(&self) -> &str;

    /// The surface (re)bound to the engine; sent the initial view.
    fn attach(&mut self, view: &EngineView) {
        let _ = view;
    }

    /// An inbound message for this surface, with a fresh view to interpret
    /// it against. Returns the operations the surface wants performed.
    fn on_midi(&mut self, message: &MidiMessage, view: &EngineView) -> Vec<SurfaceRequest>;

    /// A parameter relevant to this surface changed; the surface may emit
    /// feedback messages for its outbound transport.
    fn feedback(&mut self, view: &EngineView) -> Vec<MidiMessage> {
        let _ = view;
        Vec::new()
    }
}

/// Engine operations a surface can request.
#[derive(Clone, Debug, PartialEq)]
pub enum SurfaceRequest {
    /// Set a channel fader.
    SetFader {
        /// Target channel.
        channel: ComponentId,
        /// New fader position.
        value: f64,
    },
    /// Toggle a channel's enabled flag.
    ToggleEnabled {
        /// Target channel.
        channel: ComponentId,
    },
    /// Toggle a channel's cue tap.
    ToggleCue {
        /// Target channel.
        channel: ComponentId,
    },
    /// Move the persisted focus cursor.
    FocusPattern {
        /// Target channel.
        channel: ComponentId,
        /// New focus index.
        index: usize,
    },
    /// Launch the focused pattern.
    GoFocusedPattern {
        /// Target channel.
        channel: ComponentId,
    },
    /// Set the master crossfader.
    SetCrossfader {
        /// New crossfader position.
        value: f64,
    },
}
