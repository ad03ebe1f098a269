//! MIDI inbox and parameter mappings.
//!
//! The core owns no transport: a host feeds decoded [`MidiMessage`]s into
//! the thread-safe inbox, and the engine drains it at the top of each tick,
//! applying the registered value mappings onto parameter handles. Control
//! surfaces build on the same inbox and the surface views in
//! [`crate::surface`].

use crate::modulation::resolve_param_mut;
use crate::param::ParamHandle;
use crate::registry::{ComponentId, Registry};
use crossbeam_channel::{Receiver, Sender, unbounded};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// A decoded inbound MIDI message.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MidiMessage {
    /// Note on.
    NoteOn {
        /// MIDI channel, 0-15.
        channel: u8,
        /// Key number, 0-127.
        key: u8,
        /// Velocity, 1-127 (0 is treated as note off).
        velocity: u8,
    },
    /// Note off.
    NoteOff {
        /// MIDI channel, 0-15.
        channel: u8,
        /// Key number, 0-127.
        key: u8,
    },
    /// Continuous controller change.
    ControlChange {
        /// MIDI channel, 0-15.
        channel: u8,
        /// Controller number, 0-127.
        cc: u8,
        /// Controller value, 0-127.
        value: u8,
    },
    /// Pitch bend, 14-bit value centered at 8192.
    PitchBend {
        /// MIDI channel, 0-15.
        channel: u8,
        /// Bend value, 0-16383.
        value: u16,
    },
}

/// What a mapping listens for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MidiBind {
    /// A controller number; the 7-bit value writes the target normalized.
    ControlChange(u8),
    /// A key number; note on/off writes the target boolean.
    Note(u8),
    /// A key number; note-on velocity writes the target normalized.
    /// Typically bound to an envelope's `peak` cell.
    NoteVelocity(u8),
    /// Pitch bend; the 14-bit value writes the target normalized.
    PitchBend,
}

/// One inbound value mapping onto a parameter.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MidiMapping {
    /// Mapping id.
    pub id: u64,
    /// MIDI channel filter, 0-15.
    pub channel: u8,
    /// Matched message kind.
    pub bind: MidiBind,
    /// Parameter receiving the value.
    pub target: ParamHandle,
}

/// The engine's MIDI inbox and mapping table.
#[derive(Debug)]
pub struct MidiEngine {
    inbox_tx: Sender<MidiMessage>,
    inbox_rx: Receiver<MidiMessage>,
    mappings: Vec<MidiMapping>,
    next_id: u64,
}

impl Default for MidiEngine {
    fn default() -> Self {
        MidiEngine::new()
    }
}

impl MidiEngine {
    /// An empty mapping table with a fresh inbox.
    pub fn new() -> MidiEngine {
        let (inbox_tx, inbox_rx) = unbounded();
        MidiEngine {
            inbox_tx,
            inbox_rx,
            mappings: Vec::new(),
            next_id: 0,
        }
    }

    /// A sender the host's MIDI transport can feed from any thread.
    pub fn input(&self) -> Sender<MidiMessage> {
        self.inbox_tx.clone()
    }

    /// Registers a mapping and returns its id.
    pub fn add_mapping(&mut self, channel: u8, bind: MidiBind, target: ParamHandle) -> u64 {
        self.next_id += 1;
        self.mappings.push(MidiMapping {
            id: self.next_id,
            channel,
            bind,
            target,
        });
        self.next_id
    }

    /// Re-registers a previously captured mapping, keeping its shape but
    /// assigning a fresh id.
    pub fn restore_mapping(&mut self, mapping: MidiMapping) -> u64 {
        self.add_mapping(mapping.channel, mapping.bind, mapping.target)
    }

    /// Removes a mapping by id.
    pub fn remove_mapping(&mut self, id: u64) -> Option<MidiMapping> {
        let index = self.mappings.iter().position(|m| m.id == id)?;
        Some(self.mappings.remove(index))
    }

    /// Removes and returns every mapping targeting one of the given
    /// components. Called when a subtree is disposed.
    pub fn remove_referencing(&mut self, ids: &HashSet<ComponentId>) -> Vec<MidiMapping> {
        let mut removed = Vec::new();
        self.mappings.retain(|m| {
            let hit = ids.contains(&m.target.component);
            if hit {
                removed.push(m.clone());
            }
            !hit
        });
        removed
    }

    /// The registered mappings.
    pub fn mappings(&self) -> &[MidiMapping] {
        &self.mappings
    }

    /// Drains the inbox, applying every matching mapping. Returns the number
    /// of messages consumed.
    pub fn dispatch(&mut self, registry: &mut Registry) -> usize {
        let mut count = 0;
        while let Ok(message) = self.inbox_rx.try_recv() {
            count += 1;
            self.apply(registry, &message);
        }
        count
    }

    fn apply(&self, registry: &mut Registry, message: &MidiMessage) {
        for mapping in &self.mappings {
            let write: Option<MidiWrite> = match (*message, mapping.bind) {
                (
                    MidiMessage::ControlChange { channel, cc, value },
                    MidiBind::ControlChange(bound),
                ) if channel == mapping.channel && cc == bound => {
                    Some(MidiWrite::Normalized(f64::from(value) / 127.0))
                }
                (
                    MidiMessage::NoteOn {
                        channel,
                        key,
                        velocity,
                    },
                    MidiBind::Note(bound),
                ) if channel == mapping.channel && key == bound => {
                    Some(MidiWrite::Bool(velocity > 0))
                }
                (MidiMessage::NoteOff { channel, key }, MidiBind::Note(bound))
                    if channel == mapping.channel && key == bound =>
                {
                    Some(MidiWrite::Bool(false))
                }
                (
                    MidiMessage::NoteOn {
                        channel,
                        key,
                        velocity,
                    },
                    MidiBind::NoteVelocity(bound),
                ) if channel == mapping.channel && key == bound && velocity > 0 => {
                    Some(MidiWrite::Normalized(f64::from(velocity) / 127.0))
                }
                (MidiMessage::PitchBend { channel, value }, MidiBind::PitchBend)
                    if channel == mapping.channel =>
                {
                    Some(MidiWrite::Normalized(f64::from(value) / 16383.0))
                }
                _ => None,
            };
            let Some(write) = write else { continue };
            let Some(param) = resolve_param_mut(registry, &mapping.target) else {
                continue;
            };
            let result = match write {
                MidiWrite::Normalized(n) => param.set_normalized(n),
                MidiWrite::Bool(b) => param.set_bool(b),
            };
            if let Err(error) = result {
                tracing::warn!(%error, target = %mapping.target, "midi mapping write failed");
            }
        }
    }
}

enum MidiWrite {
    Normalized(f64),
    Bool(bool),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::{Body, Component};
    use crate::param::Param;

    fn target(registry: &mut Registry) -> ParamHandle {
        let mut component = Component::new("holder", Body::Plain);
        component.params.add(Param::bounded("fader", 0.0, 0.0, 1.0));
        component.params.add(Param::bool("enabled", false));
        let id = registry.register(component);
        ParamHandle::new(id, "fader")
    }

    #[test]
    fn cc_mapping_writes_normalized() {
        let mut registry = Registry::new();
        let mut midi = MidiEngine::new();
        let fader = target(&mut registry);
        midi.add_mapping(0, MidiBind::ControlChange(7), fader.clone());

        midi.input()
            .send(MidiMessage::ControlChange {
                channel: 0,
                cc: 7,
                value: 127,
            })
            .unwrap();
        assert_eq!(midi.dispatch(&mut registry), 1);
        let value = crate::modulation::resolve_param(&registry, &fader)
            .unwrap()
            .as_f64();
        assert_eq!(value, 1.0);
    }

    #[test]
    fn note_mapping_writes_bool() {
        let mut registry = Registry::new();
        let mut midi = MidiEngine::new();
        let fader = target(&mut registry);
        let enabled = ParamHandle::new(fader.component, "enabled");
        midi.add_mapping(1, MidiBind::Note(60), enabled.clone());

        midi.input()
            .send(MidiMessage::NoteOn {
                channel: 1,
                key: 60,
                velocity: 100,
            })
            .unwrap();
        midi.dispatch(&mut registry);
        assert!(registry.get(enabled.component).unwrap().params.flag("enabled"));

        midi.input()
            .send(MidiMessage::NoteOff { channel: 1, key: 60 })
            .unwrap();
        midi.dispatch(&mut registry);
        assert!(!registry.get(enabled.component).unwrap().params.flag("enabled"));
    }

    #[test]
    fn note_velocity_mapping_scales_target() {
        let mut registry = Registry::new();
        let mut midi = MidiEngine::new();
        let fader = target(&mut registry);
        midi.add_mapping(0, MidiBind::NoteVelocity(36), fader.clone());

        midi.input()
            .send(MidiMessage::NoteOn {
                channel: 0,
                key: 36,
                velocity: 64,
            })
            .unwrap();
        midi.dispatch(&mut registry);
        let value = crate::modulation::resolve_param(&registry, &fader)
            .unwrap()
            .as_f64();
        assert!((value - 64.0 / 127.0).abs() < 1e-9);
    }

    #[test]
    fn channel_filter_applies() {
        let mut registry = Registry::new();
        let mut midi = MidiEngine::new();
        let fader = target(&mut registry);
        midi.add_mapping(0, MidiBind::ControlChange(7), fader.clone());

        midi.input()
            .send(MidiMessage::ControlChange {
                channel: 5,
                cc: 7,
                value: 127,
            })
            .unwrap();
        midi.dispatch(&mut registry);
        let value = crate::modulation::resolve_param(&registry, &fader)
            .unwrap()
            .as_f64();
        assert_eq!(value, 0.0);
    }

    #[test]
    fn remove_referencing_captures_mappings() {
        let mut registry = Registry::new();
        let mut midi = MidiEngine::new();
        let fader = target(&mut registry);
        midi.add_mapping(0, MidiBind::ControlChange(7), fader.clone());
        midi.add_mapping(0, MidiBind::Note(1), ParamHandle::new(ComponentId(999), "x"));

        let mut ids = HashSet::new();
        ids.insert(fader.component);
        let removed = midi.remove_referencing(&ids);
        assert_eq!(removed.len(), 1);
        assert_eq!(midi.mappings().len(), 1);
    }
}
