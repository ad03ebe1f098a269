//! The universal node of the engine tree.
//!
//! Every addressable thing in the engine - buses, patterns, effects,
//! modulators, clips, and the plain singletons like the palette - is one
//! concrete [`Component`] carrying the shared fields (id, class, parent,
//! parameters, children) plus a [`Body`] with the kind-specific state. The
//! registry owns all components; relationships are ids, never pointers.

use crate::channel::{ChannelState, GroupState, MasterState};
use crate::clip::ClipState;
use crate::color::Color;
use crate::device::{Effect, Pattern};
use crate::modulator::Modulator;
use crate::param::ParamSet;
use crate::registry::ComponentId;

/// A pattern device attached to a component.
pub struct PatternSlot {
    /// The device.
    pub device: Box<dyn Pattern>,
    /// Set when the device panicked; it is skipped afterwards.
    pub crashed: bool,
}

/// An effect device attached to a component.
pub struct EffectSlot {
    /// The device.
    pub device: Box<dyn Effect>,
    /// Set when the device panicked; it is skipped afterwards.
    pub crashed: bool,
}

/// A modulator device attached to a component.
pub struct ModulatorSlot {
    /// The device.
    pub device: Box<dyn Modulator>,
    /// Set when the device panicked; it is skipped afterwards.
    pub crashed: bool,
    /// The output of the most recent tick, in `[0, 1]`.
    pub output: f64,
}

/// Kind-specific component state.
pub enum Body {
    /// No kind-specific state (root, palette, audio meter, output settings).
    Plain,
    /// A pattern channel.
    Channel(ChannelState),
    /// A group of channels.
    Group(GroupState),
    /// The master bus.
    Master(MasterState),
    /// A pattern device.
    Pattern(PatternSlot),
    /// An effect device.
    Effect(EffectSlot),
    /// A modulation source.
    Modulator(ModulatorSlot),
    /// A replayable parameter-change log.
    Clip(ClipState),
    /// A component whose class could not be instantiated at load; carries
    /// the original serialized form and re-emits it on save.
    Placeholder(serde_json::Value),
}

impl std::fmt::Debug for Body {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Body::Plain => write!(f, "Plain"),
            Body::Channel(_) => write!(f, "Channel"),
            Body::Group(_) => write!(f, "Group"),
            Body::Master(_) => write!(f, "Master"),
            Body::Pattern(slot) => write!(f, "Pattern({})", slot.device.class_name()),
            Body::Effect(slot) => write!(f, "Effect({})", slot.device.class_name()),
            Body::Modulator(slot) => write!(f, "Modulator({})", slot.device.class_name()),
            Body::Clip(_) => write!(f, "Clip"),
            Body::Placeholder(_) => write!(f, "Placeholder"),
        }
    }
}

/// One node of the engine tree.
#[derive(Debug)]
pub struct Component {
    /// Registry-assigned id; [`ComponentId::UNASSIGNED`] until registered.
    pub id: ComponentId,
    class: String,
    /// Display label.
    pub label: String,
    /// Owning component, [`ComponentId::UNASSIGNED`] for the engine root.
    pub parent: ComponentId,
    /// Address segment under the parent, for named (non-array) children.
    pub path_segment: String,
    /// Accent color shown on modulation routings from this component.
    pub modulation_color: Color,
    /// The component's parameters.
    pub params: ParamSet,
    /// Named singleton children, in declaration order.
    pub children: Vec<ComponentId>,
    /// Hosted modulators, in registration order.
    pub modulators: Vec<ComponentId>,
    /// Kind-specific state.
    pub body: Body,
}

impl Component {
    /// A detached component of the given class.
    pub fn new(class: impl Into<String>, body: Body) -> Component {
        let class = class.into();
        Component {
            id: ComponentId::UNASSIGNED,
            label: class.clone(),
            class,
            parent: ComponentId::UNASSIGNED,
            path_segment: String::new(),
            modulation_color: Color::WHITE,
            params: ParamSet::new(),
            children: Vec::new(),
            modulators: Vec::new(),
            body: Body::Plain,
        }
        .with_body(body)
    }

    fn with_body(mut self, body: Body) -> Component {
        self.body = body;
        self
    }

    /// Sets the display label.
    pub fn with_label(mut self, label: impl Into<String>) -> Component {
        self.label = label.into();
        self
    }

    /// Stable class name used by the factory and persistence.
    pub fn class(&self) -> &str {
        &self.class
    }

    /// Index-addressed child arrays carried by this component's body, plus
    /// the universal modulator array. Segment names are the array element
    /// names used in paths and persisted documents.
    pub fn child_arrays(&self) -> Vec<(&'static str, &[ComponentId])> {
        let mut arrays: Vec<(&'static str, &[ComponentId])> = match &self.body {
            Body::Channel(state) => vec![
                ("pattern", state.patterns.as_slice()),
                ("effect", state.effects.as_slice()),
                ("clip", state.clips.as_slice()),
            ],
            Body::Group(state) => vec![
                ("channel", state.channels.as_slice()),
                ("effect", state.effects.as_slice()),
                ("clip", state.clips.as_slice()),
            ],
            Body::Master(state) => vec![
                ("effect", state.effects.as_slice()),
                ("clip", state.clips.as_slice()),
            ],
            _ => Vec::new(),
        };
        if !self.modulators.is_empty() {
            arrays.push(("modulator", self.modulators.as_slice()));
        }
        arrays
    }

    /// Ids of every direct child: named children, array members, modulators.
    pub fn all_children(&self) -> Vec<ComponentId> {
        let mut ids = self.children.clone();
        for (_, array) in self.child_arrays() {
            ids.extend_from_slice(array);
        }
        ids
    }

    /// The channel state, if this is a pattern channel.
    pub fn as_channel(&self) -> Option<&ChannelState> {
        match &self.body {
            Body::Channel(state) => Some(state),
            _ => None,
        }
    }

    /// The channel state mutably, if this is a pattern channel.
    pub fn as_channel_mut(&mut self) -> Option<&mut ChannelState> {
        match &mut self.body {
            Body::Channel(state) => Some(state),
            _ => None,
        }
    }
}
