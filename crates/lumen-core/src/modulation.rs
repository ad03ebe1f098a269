//! The modulation graph.
//!
//! Directed edges from normalized sources - modulator outputs or other
//! parameters - onto compound target parameters, plus boolean trigger edges.
//! The graph is kept acyclic: adding an edge that would make any node depend
//! on itself, directly or transitively through a modulator's own parameter
//! inputs, fails with [`EngineError::Cycle`] and leaves the graph unchanged.
//!
//! # Per-tick evaluation
//!
//! 1. Tick every running modulator in registration order. A modulator's own
//!    compound parameters are refreshed immediately before its tick, so a
//!    source registered earlier in the order is seen at this tick's value
//!    and one registered later at the previous tick's value.
//! 2. Refresh every remaining compound target:
//!    `effective = clamp(base + Σ contribution, min, max)` where each
//!    contribution is `amount·source` (unipolar) or `amount·(2·source − 1)`
//!    (bipolar).
//! 3. Clear trigger parameters consumed by step 1, then fire trigger edges
//!    on the rising edge of their source: pulse mode sets the target for
//!    one tick, toggle mode flips it.

use crate::component::Body;
use crate::error::EngineError;
use crate::modulator::ModContext;
use crate::param::{Param, ParamHandle, ParamValue, Polarity};
use crate::registry::{ComponentId, Registry};
use crate::tempo::TempoSnapshot;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::panic::{AssertUnwindSafe, catch_unwind};

/// Identifier of one modulation edge.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ModulationId(pub u64);

/// A normalized modulation source.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModSource {
    /// The output of a modulator component.
    Modulator(ComponentId),
    /// Another parameter, read normalized.
    Parameter(ParamHandle),
}

/// A compound modulation edge.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CompoundModulation {
    /// Edge id.
    pub id: ModulationId,
    /// Where the value comes from.
    pub source: ModSource,
    /// The compound parameter receiving the contribution.
    pub target: ParamHandle,
    /// Contribution scale in `[-1, 1]`.
    pub amount: f64,
    /// Unipolar adds `amount·s`; bipolar adds `amount·(2s − 1)`.
    pub polarity: Polarity,
    /// Disabled edges contribute nothing but stay in the graph.
    pub enabled: bool,
}

/// Behavior of a trigger edge on the rising edge of its source.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TriggerMode {
    /// Set the target true for one tick.
    #[default]
    Pulse,
    /// Flip the target.
    Toggle,
}

/// A boolean trigger edge.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TriggerModulation {
    /// Edge id.
    pub id: ModulationId,
    /// Boolean or trigger source parameter.
    pub source: ParamHandle,
    /// Boolean target parameter.
    pub target: ParamHandle,
    /// Rising-edge behavior.
    pub mode: TriggerMode,
    /// Disabled edges never fire.
    pub enabled: bool,
    #[serde(skip)]
    prev: bool,
}

/// A node of the dependency graph used for cycle checks.
#[derive(Clone, PartialEq, Eq, Hash)]
enum Node {
    Param(ParamHandle),
    Modulator(ComponentId),
}

impl Node {
    fn of_source(source: &ModSource) -> Node {
        match source {
            ModSource::Modulator(id) => Node::Modulator(*id),
            ModSource::Parameter(handle) => Node::Param(handle.clone()),
        }
    }
}

/// The engine's modulation graph and modulator schedule.
#[derive(Debug, Default)]
pub struct ModGraph {
    /// All modulator components, in registration order.
    modulator_order: Vec<ComponentId>,
    compounds: Vec<CompoundModulation>,
    triggers: Vec<TriggerModulation>,
    /// Pulse-mode targets set last evaluation, cleared next evaluation.
    pulsed: Vec<ParamHandle>,
    next_id: u64,
}

impl ModGraph {
    /// An empty graph.
    pub fn new() -> ModGraph {
        ModGraph::default()
    }

    /// Appends a modulator to the tick schedule.
    pub fn register_modulator(&mut self, id: ComponentId) {
        if !self.modulator_order.contains(&id) {
            self.modulator_order.push(id);
        }
    }

    /// Removes a modulator from the tick schedule.
    pub fn unregister_modulator(&mut self, id: ComponentId) {
        self.modulator_order.retain(|m| *m != id);
    }

    /// Modulators in registration order.
    pub fn modulators(&self) -> &[ComponentId] {
        &self.modulator_order
    }

    /// Compound edges, in insertion order.
    pub fn compounds(&self) -> &[CompoundModulation] {
        &self.compounds
    }

    /// Trigger edges, in insertion order.
    pub fn triggers(&self) -> &[TriggerModulation] {
        &self.triggers
    }

    /// Adds a compound modulation edge.
    ///
    /// Fails with [`EngineError::Cycle`] if the edge would make any node
    /// depend on itself, or [`EngineError::InvalidCommand`] if the target is
    /// not a compound parameter. The graph is unchanged on failure.
    pub fn add_modulation(
        &mut self,
        registry: &Registry,
        source: ModSource,
        target: ParamHandle,
        amount: f64,
        polarity: Polarity,
    ) -> Result<ModulationId, EngineError> {
        let resolved = self.resolve_target(registry, &target)?;
        if !matches!(resolved, ParamValue::Compound { .. }) {
            return Err(EngineError::invalid(format!(
                "modulation target {target} is not a compound parameter"
            )));
        }
        if self.would_cycle(registry, &Node::of_source(&source), &target) {
            return Err(EngineError::Cycle);
        }
        let id = self.take_id();
        self.compounds.push(CompoundModulation {
            id,
            source,
            target,
            amount: amount.clamp(-1.0, 1.0),
            polarity,
            enabled: true,
        });
        Ok(id)
    }

    /// Adds a trigger edge from a boolean source onto a boolean target.
    ///
    /// The same cycle prohibition applies as for compound edges.
    pub fn add_trigger(
        &mut self,
        registry: &Registry,
        source: ParamHandle,
        target: ParamHandle,
        mode: TriggerMode,
    ) -> Result<ModulationId, EngineError> {
        let resolved = self.resolve_target(registry, &target)?;
        if !matches!(
            resolved,
            ParamValue::Bool { .. } | ParamValue::Trigger { .. }
        ) {
            return Err(EngineError::invalid(format!(
                "trigger target {target} is not boolean"
            )));
        }
        if self.would_cycle(registry, &Node::Param(source.clone()), &target) {
            return Err(EngineError::Cycle);
        }
        let id = self.take_id();
        self.triggers.push(TriggerModulation {
            id,
            source,
            target,
            mode,
            enabled: true,
            prev: false,
        });
        Ok(id)
    }

    /// Removes a compound edge, zeroing the target's modulation sum.
    pub fn remove_modulation(
        &mut self,
        registry: &mut Registry,
        id: ModulationId,
    ) -> Option<CompoundModulation> {
        let index = self.compounds.iter().position(|m| m.id == id)?;
        let removed = self.compounds.remove(index);
        if let Some(param) = resolve_param_mut(registry, &removed.target) {
            param.set_mod_sum(0.0);
        }
        Some(removed)
    }

    /// Removes a trigger edge.
    pub fn remove_trigger(&mut self, id: ModulationId) -> Option<TriggerModulation> {
        let index = self.triggers.iter().position(|m| m.id == id)?;
        Some(self.triggers.remove(index))
    }

    /// Updates an edge's amount.
    pub fn set_amount(&mut self, id: ModulationId, amount: f64) -> Result<(), EngineError> {
        let edge = self
            .compounds
            .iter_mut()
            .find(|m| m.id == id)
            .ok_or_else(|| EngineError::invalid(format!("no modulation {id:?}")))?;
        edge.amount = amount.clamp(-1.0, 1.0);
        Ok(())
    }

    /// Updates an edge's polarity.
    pub fn set_polarity(&mut self, id: ModulationId, polarity: Polarity) -> Result<(), EngineError> {
        let edge = self
            .compounds
            .iter_mut()
            .find(|m| m.id == id)
            .ok_or_else(|| EngineError::invalid(format!("no modulation {id:?}")))?;
        edge.polarity = polarity;
        Ok(())
    }

    /// Updates an edge's enabled flag.
    pub fn set_enabled(&mut self, id: ModulationId, enabled: bool) -> Result<(), EngineError> {
        if let Some(edge) = self.compounds.iter_mut().find(|m| m.id == id) {
            edge.enabled = enabled;
            return Ok(());
        }
        if let Some(edge) = self.triggers.iter_mut().find(|m| m.id == id) {
            edge.enabled = enabled;
            return Ok(());
        }
        Err(EngineError::invalid(format!("no modulation {id:?}")))
    }

    /// Removes and returns every edge that references any of the given
    /// components (as source or target). Called when a subtree is disposed.
    pub fn remove_referencing(
        &mut self,
        registry: &mut Registry,
        ids: &HashSet<ComponentId>,
    ) -> (Vec<CompoundModulation>, Vec<TriggerModulation>) {
        let hits: Vec<ModulationId> = self
            .compounds
            .iter()
            .filter(|m| {
                ids.contains(&m.target.component)
                    || match &m.source {
                        ModSource::Modulator(id) => ids.contains(id),
                        ModSource::Parameter(handle) => ids.contains(&handle.component),
                    }
            })
            .map(|m| m.id)
            .collect();
        let mut removed_compounds = Vec::new();
        for id in hits {
            if let Some(edge) = self.remove_modulation(registry, id) {
                removed_compounds.push(edge);
            }
        }

        let mut removed_triggers = Vec::new();
        self.triggers.retain(|m| {
            let hit = ids.contains(&m.source.component) || ids.contains(&m.target.component);
            if hit {
                removed_triggers.push(m.clone());
            }
            !hit
        });
        (removed_compounds, removed_triggers)
    }

    /// Runs the per-tick evaluation pass. Returns crash reports for
    /// modulators that panicked this tick.
    pub fn evaluate(
        &mut self,
        registry: &mut Registry,
        dt_ms: f64,
        tempo: TempoSnapshot,
    ) -> Vec<EngineError> {
        let mut crashes = Vec::new();

        // 1. Tick modulators in registration order.
        let order = self.modulator_order.clone();
        for modulator_id in order {
            self.refresh_targets_of(registry, Some(modulator_id));
            let Some(component) = registry.get_mut(modulator_id) else {
                continue;
            };
            let running = component
                .params
                .get("running")
                .map(Param::as_bool)
                .unwrap_or(true);
            if !running {
                continue;
            }
            let label = component.label.clone();
            let Body::Modulator(slot) = &mut component.body else {
                continue;
            };
            if slot.crashed {
                continue;
            }
            let ctx = ModContext {
                dt_ms,
                params: &component.params,
                tempo,
            };
            let device = &mut slot.device;
            match catch_unwind(AssertUnwindSafe(|| device.tick(&ctx))) {
                Ok(output) => slot.output = output.clamp(0.0, 1.0),
                Err(payload) => {
                    slot.crashed = true;
                    crashes.push(EngineError::CrashedDevice {
                        device: label,
                        message: panic_text(&payload),
                    });
                }
            }
        }

        // 2. Refresh the remaining compound targets.
        self.refresh_targets_of(registry, None);

        // 3. Clear consumed triggers, then fire trigger edges.
        for handle in std::mem::take(&mut self.pulsed) {
            if let Some(param) = resolve_param_mut(registry, &handle) {
                let _ = param.set_bool(false);
            }
        }
        for component in registry.iter_mut() {
            component.params.clear_triggers();
        }
        for index in 0..self.triggers.len() {
            let (source, enabled, prev) = {
                let t = &self.triggers[index];
                (t.source.clone(), t.enabled, t.prev)
            };
            let state = resolve_param(registry, &source).map(Param::as_bool).unwrap_or(false);
            self.triggers[index].prev = state;
            if !enabled || !state || prev {
                continue;
            }
            let (target, mode) = {
                let t = &self.triggers[index];
                (t.target.clone(), t.mode)
            };
            if let Some(param) = resolve_param_mut(registry, &target) {
                match mode {
                    TriggerMode::Pulse => {
                        let _ = param.set_bool(true);
                        self.pulsed.push(target);
                    }
                    TriggerMode::Toggle => {
                        let _ = param.toggle();
                    }
                }
            }
        }

        crashes
    }

    /// Refreshes compound sums for targets owned by `component`, or for all
    /// remaining targets when `None`.
    fn refresh_targets_of(&self, registry: &mut Registry, component: Option<ComponentId>) {
        let mut targets: Vec<&ParamHandle> = self
            .compounds
            .iter()
            .map(|m| &m.target)
            .filter(|t| component.is_none_or(|c| t.component == c))
            .collect();
        targets.dedup();

        for target in targets {
            let sum: f64 = self
                .compounds
                .iter()
                .filter(|m| m.enabled && &m.target == target)
                .map(|m| {
                    let s = self.source_value(registry, &m.source);
                    match m.polarity {
                        Polarity::Unipolar => m.amount * s,
                        Polarity::Bipolar => m.amount * (2.0 * s - 1.0),
                    }
                })
                .sum();
            if let Some(param) = resolve_param_mut(registry, target) {
                param.set_mod_sum(sum);
            }
        }
    }

    fn source_value(&self, registry: &Registry, source: &ModSource) -> f64 {
        match source {
            ModSource::Modulator(id) => registry
                .resolve(*id)
                .and_then(|c| match &c.body {
                    Body::Modulator(slot) => Some(slot.output),
                    _ => None,
                })
                .unwrap_or(0.0),
            ModSource::Parameter(handle) => resolve_param(registry, handle)
                .map(Param::normalized)
                .unwrap_or(0.0),
        }
    }

    fn resolve_target<'a>(
        &self,
        registry: &'a Registry,
        target: &ParamHandle,
    ) -> Result<&'a ParamValue, EngineError> {
        resolve_param(registry, target)
            .map(Param::value)
            .ok_or_else(|| EngineError::invalid(format!("no parameter at {target}")))
    }

    /// Depth-first search over the dependency graph: would `target`
    /// depending on `source` close a loop?
    fn would_cycle(&self, registry: &Registry, source: &Node, target: &ParamHandle) -> bool {
        let goal = Node::Param(target.clone());
        let mut visited = HashSet::new();
        let mut stack = vec![source.clone()];
        while let Some(node) = stack.pop() {
            if node == goal {
                return true;
            }
            if !visited.insert(node.clone()) {
                continue;
            }
            match &node {
                Node::Modulator(id) => {
                    // A modulator depends on every one of its own parameters.
                    if let Some(component) = registry.resolve(*id) {
                        for param in component.params.iter() {
                            stack.push(Node::Param(ParamHandle::new(
                                component.id,
                                param.path(),
                            )));
                        }
                    }
                }
                Node::Param(handle) => {
                    for edge in self.compounds.iter().filter(|m| &m.target == handle) {
                        stack.push(Node::of_source(&edge.source));
                    }
                    for edge in self.triggers.iter().filter(|m| &m.target == handle) {
                        stack.push(Node::Param(edge.source.clone()));
                    }
                }
            }
        }
        false
    }

    fn take_id(&mut self) -> ModulationId {
        self.next_id += 1;
        ModulationId(self.next_id)
    }
}

/// Resolves a parameter handle through the registry's remap table.
pub fn resolve_param<'a>(registry: &'a Registry, handle: &ParamHandle) -> Option<&'a Param> {
    registry.resolve(handle.component)?.params.get(&handle.path)
}

/// Resolves a parameter handle mutably.
pub fn resolve_param_mut<'a>(
    registry: &'a mut Registry,
    handle: &ParamHandle,
) -> Option<&'a mut Param> {
    registry
        .resolve_mut(handle.component)?
        .params
        .get_mut(&handle.path)
}

/// Extracts a printable message from a panic payload.
pub(crate) fn panic_text(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::{Body, Component, ModulatorSlot};
    use crate::modulator::Modulator;
    use crate::param::Param;

    struct Constant(f64);

    impl Modulator for Constant {
        fn class_name(&self) -> &'static str {
            "constant"
        }
        fn tick(&mut self, _ctx: &ModContext<'_>) -> f64 {
            self.0
        }
    }

    struct Panics;

    impl Modulator for Panics {
        fn class_name(&self) -> &'static str {
            "panics"
        }
        fn tick(&mut self, _ctx: &ModContext<'_>) -> f64 {
            panic!("boom");
        }
    }

    fn holder_with_compound(registry: &mut Registry, base: f64) -> ParamHandle {
        let mut component = Component::new("holder", Body::Plain);
        component.params.add(Param::compound("level", base, 0.0, 1.0));
        let id = registry.register(component);
        ParamHandle::new(id, "level")
    }

    fn modulator(registry: &mut Registry, graph: &mut ModGraph, device: impl Modulator + 'static, output: f64) -> ComponentId {
        let mut component = Component::new(
            "modulator",
            Body::Modulator(ModulatorSlot {
                device: Box::new(device),
                crashed: false,
                output,
            }),
        );
        component.params.add(Param::bool("running", true));
        let id = registry.register(component);
        graph.register_modulator(id);
        id
    }

    #[test]
    fn unipolar_contribution() {
        let mut registry = Registry::new();
        let mut graph = ModGraph::new();
        let target = holder_with_compound(&mut registry, 0.5);
        let lfo = modulator(&mut registry, &mut graph, Constant(0.75), 0.0);

        graph
            .add_modulation(
                &registry,
                ModSource::Modulator(lfo),
                target.clone(),
                0.5,
                Polarity::Unipolar,
            )
            .unwrap();
        graph.evaluate(&mut registry, 16.0, TempoSnapshot::default());

        let value = resolve_param(&registry, &target).unwrap().as_f64();
        assert!((value - 0.875).abs() < 1e-9, "got {value}");
    }

    #[test]
    fn bipolar_contribution() {
        let mut registry = Registry::new();
        let mut graph = ModGraph::new();
        let target = holder_with_compound(&mut registry, 0.5);
        let lfo = modulator(&mut registry, &mut graph, Constant(0.75), 0.0);

        let id = graph
            .add_modulation(
                &registry,
                ModSource::Modulator(lfo),
                target.clone(),
                0.5,
                Polarity::Bipolar,
            )
            .unwrap();
        graph.evaluate(&mut registry, 16.0, TempoSnapshot::default());

        let value = resolve_param(&registry, &target).unwrap().as_f64();
        assert!((value - 0.75).abs() < 1e-9, "got {value}");

        graph.set_amount(id, -1.0).unwrap();
        graph.evaluate(&mut registry, 16.0, TempoSnapshot::default());
        let value = resolve_param(&registry, &target).unwrap().as_f64();
        assert!((value - 0.0).abs() < 1e-9, "clamped, got {value}");
    }

    #[test]
    fn effective_clamps_to_range() {
        let mut registry = Registry::new();
        let mut graph = ModGraph::new();
        let target = holder_with_compound(&mut registry, 0.9);
        let lfo = modulator(&mut registry, &mut graph, Constant(1.0), 0.0);

        graph
            .add_modulation(
                &registry,
                ModSource::Modulator(lfo),
                target.clone(),
                1.0,
                Polarity::Unipolar,
            )
            .unwrap();
        graph.evaluate(&mut registry, 16.0, TempoSnapshot::default());
        assert_eq!(resolve_param(&registry, &target).unwrap().as_f64(), 1.0);
    }

    #[test]
    fn parameter_to_parameter_cycle_rejected() {
        let mut registry = Registry::new();
        let mut graph = ModGraph::new();
        let a = holder_with_compound(&mut registry, 0.1);
        let b = holder_with_compound(&mut registry, 0.2);

        graph
            .add_modulation(
                &registry,
                ModSource::Parameter(a.clone()),
                b.clone(),
                1.0,
                Polarity::Unipolar,
            )
            .unwrap();
        let result = graph.add_modulation(
            &registry,
            ModSource::Parameter(b.clone()),
            a.clone(),
            1.0,
            Polarity::Unipolar,
        );
        assert!(matches!(result, Err(EngineError::Cycle)));
        // the graph is unchanged
        assert_eq!(graph.compounds().len(), 1);
    }

    #[test]
    fn cycle_through_modulator_inputs_rejected() {
        let mut registry = Registry::new();
        let mut graph = ModGraph::new();
        let q = holder_with_compound(&mut registry, 0.5);
        let lfo = modulator(&mut registry, &mut graph, Constant(0.5), 0.0);
        // give the modulator a compound input parameter
        registry
            .get_mut(lfo)
            .unwrap()
            .params
            .add(Param::compound("period_ms", 1000.0, 10.0, 60_000.0));
        let period = ParamHandle::new(lfo, "period_ms");

        // q modulates the LFO's period...
        graph
            .add_modulation(
                &registry,
                ModSource::Parameter(q.clone()),
                period,
                1.0,
                Polarity::Unipolar,
            )
            .unwrap();
        // ...so the LFO's output may not modulate q
        let result = graph.add_modulation(
            &registry,
            ModSource::Modulator(lfo),
            q,
            1.0,
            Polarity::Unipolar,
        );
        assert!(matches!(result, Err(EngineError::Cycle)));
    }

    #[test]
    fn modulator_cannot_modulate_its_own_parameter() {
        let mut registry = Registry::new();
        let mut graph = ModGraph::new();
        let lfo = modulator(&mut registry, &mut graph, Constant(0.5), 0.0);
        registry
            .get_mut(lfo)
            .unwrap()
            .params
            .add(Param::compound("period_ms", 1000.0, 10.0, 60_000.0));

        let result = graph.add_modulation(
            &registry,
            ModSource::Modulator(lfo),
            ParamHandle::new(lfo, "period_ms"),
            1.0,
            Polarity::Unipolar,
        );
        assert!(matches!(result, Err(EngineError::Cycle)));
    }

    #[test]
    fn non_compound_target_rejected() {
        let mut registry = Registry::new();
        let mut graph = ModGraph::new();
        let mut component = Component::new("holder", Body::Plain);
        component.params.add(Param::bounded("plain", 0.5, 0.0, 1.0));
        let id = registry.register(component);
        let lfo = modulator(&mut registry, &mut graph, Constant(0.5), 0.0);

        let result = graph.add_modulation(
            &registry,
            ModSource::Modulator(lfo),
            ParamHandle::new(id, "plain"),
            1.0,
            Polarity::Unipolar,
        );
        assert!(matches!(result, Err(EngineError::InvalidCommand(_))));
    }

    #[test]
    fn removing_last_edge_restores_base() {
        let mut registry = Registry::new();
        let mut graph = ModGraph::new();
        let target = holder_with_compound(&mut registry, 0.25);
        let lfo = modulator(&mut registry, &mut graph, Constant(1.0), 0.0);

        let id = graph
            .add_modulation(
                &registry,
                ModSource::Modulator(lfo),
                target.clone(),
                0.5,
                Polarity::Unipolar,
            )
            .unwrap();
        graph.evaluate(&mut registry, 16.0, TempoSnapshot::default());
        assert!(resolve_param(&registry, &target).unwrap().as_f64() > 0.25);

        graph.remove_modulation(&mut registry, id);
        assert_eq!(resolve_param(&registry, &target).unwrap().as_f64(), 0.25);
    }

    #[test]
    fn crashed_modulator_is_skipped_and_reported() {
        let mut registry = Registry::new();
        let mut graph = ModGraph::new();
        let bad = modulator(&mut registry, &mut graph, Panics, 0.25);

        let crashes = graph.evaluate(&mut registry, 16.0, TempoSnapshot::default());
        assert_eq!(crashes.len(), 1);
        assert!(matches!(crashes[0], EngineError::CrashedDevice { .. }));

        // skipped thereafter, output frozen, no further reports
        let crashes = graph.evaluate(&mut registry, 16.0, TempoSnapshot::default());
        assert!(crashes.is_empty());
        match &registry.get(bad).unwrap().body {
            Body::Modulator(slot) => {
                assert!(slot.crashed);
                assert_eq!(slot.output, 0.25);
            }
            _ => unreachable!(),
        }
    }

    #[test]
    fn trigger_pulse_sets_target_for_one_evaluation() {
        let mut registry = Registry::new();
        let mut graph = ModGraph::new();
        let mut source = Component::new("holder", Body::Plain);
        source.params.add(Param::bool("gate", false));
        let source_id = registry.register(source);
        let mut target = Component::new("holder", Body::Plain);
        target.params.add(Param::bool("hit", false));
        let target_id = registry.register(target);

        graph
            .add_trigger(
                &registry,
                ParamHandle::new(source_id, "gate"),
                ParamHandle::new(target_id, "hit"),
                TriggerMode::Pulse,
            )
            .unwrap();

        // no edge yet: source is low
        graph.evaluate(&mut registry, 16.0, TempoSnapshot::default());
        assert!(!registry.get(target_id).unwrap().params.flag("hit"));

        // rising edge fires the pulse
        registry
            .get_mut(source_id)
            .unwrap()
            .params
            .get_mut("gate")
            .unwrap()
            .set_bool(true)
            .unwrap();
        graph.evaluate(&mut registry, 16.0, TempoSnapshot::default());
        assert!(registry.get(target_id).unwrap().params.flag("hit"));

        // held high: no re-fire, pulse clears
        graph.evaluate(&mut registry, 16.0, TempoSnapshot::default());
        assert!(!registry.get(target_id).unwrap().params.flag("hit"));
    }

    #[test]
    fn trigger_toggle_flips_target() {
        let mut registry = Registry::new();
        let mut graph = ModGraph::new();
        let mut source = Component::new("holder", Body::Plain);
        source.params.add(Param::bool("gate", false));
        let source_id = registry.register(source);
        let mut target = Component::new("holder", Body::Plain);
        target.params.add(Param::bool("state", false));
        let target_id = registry.register(target);

        graph
            .add_trigger(
                &registry,
                ParamHandle::new(source_id, "gate"),
                ParamHandle::new(target_id, "state"),
                TriggerMode::Toggle,
            )
            .unwrap();

        for expected in [true, false, true] {
            // raise the gate for one evaluation
            registry
                .get_mut(source_id)
                .unwrap()
                .params
                .get_mut("gate")
                .unwrap()
                .set_bool(true)
                .unwrap();
            graph.evaluate(&mut registry, 16.0, TempoSnapshot::default());
            assert_eq!(
                registry.get(target_id).unwrap().params.flag("state"),
                expected
            );
            registry
                .get_mut(source_id)
                .unwrap()
                .params
                .get_mut("gate")
                .unwrap()
                .set_bool(false)
                .unwrap();
            graph.evaluate(&mut registry, 16.0, TempoSnapshot::default());
        }
    }
}
