//! The undoable command layer.
//!
//! Commands are trait objects with symmetric `perform` / `undo`. Every
//! reference a command holds is a handle - a component id resolved through
//! the registry at execution time - so commands survive the destroy/
//! recreate cycles their own undos cause. The engine keeps an undo and a
//! redo stack; a failure in either direction wipes both, because a
//! half-applied command chain is worse than an empty one.
//!
//! Repeated parameter writes from one gesture (a knob drag) coalesce: a
//! [`SetParameterCommand`] carrying the same handle and gesture token as the
//! top of the undo stack folds its new value into that entry instead of
//! pushing a new one.

use crate::clip::ClipEvent;
use crate::engine::{CapturedComponent, Engine};
use crate::error::EngineError;
use crate::modulation::{ModSource, ModulationId};
use crate::param::{ParamHandle, Polarity};
use crate::registry::ComponentId;
use std::any::Any;

/// An undoable engine operation.
pub trait Command: Send {
    /// Human-readable description for history UIs.
    fn description(&self) -> String;

    /// Applies the command.
    fn perform(&mut self, engine: &mut Engine) -> Result<(), EngineError>;

    /// Reverts the command.
    fn undo(&mut self, engine: &mut Engine) -> Result<(), EngineError>;

    /// Attempts to fold `incoming` (already performed) into this stack
    /// entry. Returns true when absorbed.
    fn coalesce(&mut self, incoming: &dyn Command) -> bool {
        let _ = incoming;
        false
    }

    /// Downcast support for coalescing.
    fn as_any(&self) -> &dyn Any;
}

impl Engine {
    /// Executes a command and pushes it onto the undo stack, clearing the
    /// redo stack. On failure both stacks are wiped and the error returned.
    pub fn perform_command(
        &mut self,
        mut command: Box<dyn Command>,
    ) -> Result<(), EngineError> {
        match command.perform(self) {
            Ok(()) => {
                self.redo_stack.clear();
                let absorbed = self
                    .undo_stack
                    .last_mut()
                    .is_some_and(|top| top.coalesce(command.as_ref()));
                if !absorbed {
                    self.undo_stack.push(command);
                }
                Ok(())
            }
            Err(error) => {
                tracing::error!(%error, command = %command.description(), "command failed");
                self.undo_stack.clear();
                self.redo_stack.clear();
                Err(error)
            }
        }
    }

    /// Undoes the most recent command. On failure both stacks are wiped.
    pub fn undo(&mut self) -> Result<(), EngineError> {
        let Some(mut command) = self.undo_stack.pop() else {
            return Ok(());
        };
        match command.undo(self) {
            Ok(()) => {
                self.redo_stack.push(command);
                Ok(())
            }
            Err(error) => {
                tracing::error!(%error, command = %command.description(), "undo failed");
                self.undo_stack.clear();
                self.redo_stack.clear();
                Err(error)
            }
        }
    }

    /// Re-applies the most recently undone command. On failure both stacks
    /// are wiped.
    pub fn redo(&mut self) -> Result<(), EngineError> {
        let Some(mut command) = self.redo_stack.pop() else {
            return Ok(());
        };
        match command.perform(self) {
            Ok(()) => {
                self.undo_stack.push(command);
                Ok(())
            }
            Err(error) => {
                tracing::error!(%error, command = %command.description(), "redo failed");
                self.undo_stack.clear();
                self.redo_stack.clear();
                Err(error)
            }
        }
    }

    /// Number of undoable entries.
    pub fn undo_depth(&self) -> usize {
        self.undo_stack.len()
    }

    /// Number of redoable entries.
    pub fn redo_depth(&self) -> usize {
        self.redo_stack.len()
    }
}

/// Sets a parameter value, coalescing within a gesture.
#[derive(Debug)]
pub struct SetParameterCommand {
    handle: ParamHandle,
    gesture: u64,
    new: f64,
    old: Option<f64>,
}

impl SetParameterCommand {
    /// A command writing `value` through `handle`. Commands created with the
    /// same `gesture` token coalesce on the undo stack.
    pub fn new(handle: ParamHandle, value: f64, gesture: u64) -> SetParameterCommand {
        SetParameterCommand {
            handle,
            gesture,
            new: value,
            old: None,
        }
    }
}

impl Command for SetParameterCommand {
    fn description(&self) -> String {
        format!("Set {}", self.handle)
    }

    fn perform(&mut self, engine: &mut Engine) -> Result<(), EngineError> {
        let param = engine
            .param(&self.handle)
            .ok_or_else(|| EngineError::invalid(format!("no parameter at {}", self.handle)))?;
        if self.old.is_none() {
            self.old = Some(param.base_f64());
        }
        engine.set_param(&self.handle, self.new)
    }

    fn undo(&mut self, engine: &mut Engine) -> Result<(), EngineError> {
        let old = self
            .old
            .ok_or_else(|| EngineError::invalid("undo before perform"))?;
        engine.set_param(&self.handle, old)
    }

    fn coalesce(&mut self, incoming: &dyn Command) -> bool {
        let Some(incoming) = incoming.as_any().downcast_ref::<SetParameterCommand>() else {
            return false;
        };
        if incoming.handle != self.handle || incoming.gesture != self.gesture {
            return false;
        }
        self.new = incoming.new;
        true
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Adds a channel seeded with a factory-built pattern.
#[derive(Debug)]
pub struct AddChannelCommand {
    pattern_class: String,
    created: Option<ComponentId>,
    captured: Option<CapturedComponent>,
}

impl AddChannelCommand {
    /// A command creating a channel whose initial pattern is built from
    /// `pattern_class` by the engine's factory.
    pub fn new(pattern_class: impl Into<String>) -> AddChannelCommand {
        AddChannelCommand {
            pattern_class: pattern_class.into(),
            created: None,
            captured: None,
        }
    }
}

impl Command for AddChannelCommand {
    fn description(&self) -> String {
        format!("Add channel ({})", self.pattern_class)
    }

    fn perform(&mut self, engine: &mut Engine) -> Result<(), EngineError> {
        if let Some(captured) = self.captured.take() {
            // redo after undo restores the captured channel
            self.created = Some(engine.restore_channel(&captured)?);
            return Ok(());
        }
        let pattern = match engine.create_device(&self.pattern_class)? {
            crate::device::DeviceInstance::Pattern(device) => device,
            _ => {
                return Err(EngineError::invalid(format!(
                    "'{}' is not a pattern class",
                    self.pattern_class
                )));
            }
        };
        self.created = Some(engine.add_channel(pattern));
        Ok(())
    }

    fn undo(&mut self, engine: &mut Engine) -> Result<(), EngineError> {
        let created = self
            .created
            .ok_or_else(|| EngineError::invalid("undo before perform"))?;
        self.captured = Some(engine.remove_channel(created)?);
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Removes a channel, capturing it for undo.
#[derive(Debug)]
pub struct RemoveChannelCommand {
    channel: ComponentId,
    captured: Option<CapturedComponent>,
}

impl RemoveChannelCommand {
    /// A command removing the given channel.
    pub fn new(channel: ComponentId) -> RemoveChannelCommand {
        RemoveChannelCommand {
            channel,
            captured: None,
        }
    }
}

impl Command for RemoveChannelCommand {
    fn description(&self) -> String {
        format!("Remove channel {}", self.channel)
    }

    fn perform(&mut self, engine: &mut Engine) -> Result<(), EngineError> {
        self.captured = Some(engine.remove_channel(self.channel)?);
        Ok(())
    }

    fn undo(&mut self, engine: &mut Engine) -> Result<(), EngineError> {
        let captured = self
            .captured
            .take()
            .ok_or_else(|| EngineError::invalid("undo before perform"))?;
        let id = engine.restore_channel(&captured)?;
        // keep addressing the restored channel on redo
        self.channel = id;
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Removes a pattern from a channel, capturing it for undo.
#[derive(Debug)]
pub struct RemovePatternCommand {
    channel: ComponentId,
    index: usize,
    captured: Option<CapturedComponent>,
}

impl RemovePatternCommand {
    /// A command removing the pattern at `index` on `channel`.
    pub fn new(channel: ComponentId, index: usize) -> RemovePatternCommand {
        RemovePatternCommand {
            channel,
            index,
            captured: None,
        }
    }
}

impl Command for RemovePatternCommand {
    fn description(&self) -> String {
        format!("Remove pattern {} from {}", self.index, self.channel)
    }

    fn perform(&mut self, engine: &mut Engine) -> Result<(), EngineError> {
        self.captured = Some(engine.remove_pattern(self.channel, self.index)?);
        Ok(())
    }

    fn undo(&mut self, engine: &mut Engine) -> Result<(), EngineError> {
        let captured = self
            .captured
            .take()
            .ok_or_else(|| EngineError::invalid("undo before perform"))?;
        engine.restore_pattern(self.channel, &captured)?;
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Adds a compound modulation edge.
#[derive(Debug)]
pub struct AddModulationCommand {
    source: ModSource,
    target: ParamHandle,
    amount: f64,
    polarity: Polarity,
    created: Option<ModulationId>,
}

impl AddModulationCommand {
    /// A command wiring `source` onto `target`.
    pub fn new(
        source: ModSource,
        target: ParamHandle,
        amount: f64,
        polarity: Polarity,
    ) -> AddModulationCommand {
        AddModulationCommand {
            source,
            target,
            amount,
            polarity,
            created: None,
        }
    }
}

impl Command for AddModulationCommand {
    fn description(&self) -> String {
        format!("Modulate {}", self.target)
    }

    fn perform(&mut self, engine: &mut Engine) -> Result<(), EngineError> {
        self.created = Some(engine.add_modulation(
            self.source.clone(),
            self.target.clone(),
            self.amount,
            self.polarity,
        )?);
        Ok(())
    }

    fn undo(&mut self, engine: &mut Engine) -> Result<(), EngineError> {
        let id = self
            .created
            .take()
            .ok_or_else(|| EngineError::invalid("undo before perform"))?;
        engine
            .remove_modulation(id)
            .ok_or_else(|| EngineError::invalid("modulation already removed"))?;
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Starts a clip; undo stops it.
#[derive(Debug)]
pub struct StartClipCommand {
    clip: ComponentId,
}

impl StartClipCommand {
    /// A command starting the given clip.
    pub fn new(clip: ComponentId) -> StartClipCommand {
        StartClipCommand { clip }
    }
}

impl Command for StartClipCommand {
    fn description(&self) -> String {
        format!("Start clip {}", self.clip)
    }

    fn perform(&mut self, engine: &mut Engine) -> Result<(), EngineError> {
        engine.start_clip(self.clip)
    }

    fn undo(&mut self, engine: &mut Engine) -> Result<(), EngineError> {
        engine.stop_clip(self.clip)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Adds a clip to a bus; undo disposes it.
#[derive(Debug)]
pub struct AddClipCommand {
    bus: ComponentId,
    events: Vec<ClipEvent>,
    length_ms: f64,
    created: Option<ComponentId>,
}

impl AddClipCommand {
    /// A command appending a clip with the given events.
    pub fn new(bus: ComponentId, events: Vec<ClipEvent>, length_ms: f64) -> AddClipCommand {
        AddClipCommand {
            bus,
            events,
            length_ms,
            created: None,
        }
    }
}

impl Command for AddClipCommand {
    fn description(&self) -> String {
        format!("Add clip to {}", self.bus)
    }

    fn perform(&mut self, engine: &mut Engine) -> Result<(), EngineError> {
        self.created = Some(engine.add_clip(self.bus, self.events.clone(), self.length_ms)?);
        Ok(())
    }

    fn undo(&mut self, engine: &mut Engine) -> Result<(), EngineError> {
        let created = self
            .created
            .take()
            .ok_or_else(|| EngineError::invalid("undo before perform"))?;
        engine.dispose_component(created);
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
