//! Component identity registry.
//!
//! The registry is the single owner of every live [`Component`]. It assigns
//! each one a positive, unique, monotonically increasing id, resolves ids
//! back to components, and maintains the project-load remap table that lets
//! stale ids in a loaded document (or in captured undo state) find the
//! component that absorbed them.

use crate::component::Component;
use std::collections::HashMap;

/// A component identifier. `0` is unassigned; `1` is reserved for the
/// engine root.
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    serde::Serialize,
    serde::Deserialize,
)]
#[serde(transparent)]
pub struct ComponentId(pub u32);

impl ComponentId {
    /// The id of a component not yet attached to an engine.
    pub const UNASSIGNED: ComponentId = ComponentId(0);
    /// The engine root's id.
    pub const ROOT: ComponentId = ComponentId(1);

    /// Whether this id has been assigned by a registry.
    pub fn is_assigned(self) -> bool {
        self.0 != 0
    }
}

impl std::fmt::Display for ComponentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Owner of all live components, keyed by id.
#[derive(Debug, Default)]
pub struct Registry {
    components: HashMap<ComponentId, Component>,
    next_id: u32,
    remap: HashMap<ComponentId, ComponentId>,
}

impl Registry {
    /// An empty registry. The first registered component receives id 1.
    pub fn new() -> Registry {
        Registry {
            components: HashMap::new(),
            next_id: 1,
            remap: HashMap::new(),
        }
    }

    /// Registers a component, assigning the next id if it has none.
    ///
    /// # Panics
    ///
    /// Panics if the component carries an id that is already live - an id
    /// collision outside of project load is a programming error.
    pub fn register(&mut self, mut component: Component) -> ComponentId {
        let id = if component.id.is_assigned() {
            assert!(
                !self.components.contains_key(&component.id),
                "id {} already registered",
                component.id
            );
            self.next_id = self.next_id.max(component.id.0 + 1);
            component.id
        } else {
            let id = ComponentId(self.next_id);
            self.next_id += 1;
            component.id = id;
            id
        };
        self.components.insert(id, component);
        id
    }

    /// Registers a component under a desired id from a loaded document.
    ///
    /// If the id is free it is taken verbatim and `next_id` advances past
    /// it. If it is already live, the component is registered under a fresh
    /// id and `desired -> fresh` is recorded in the remap table.
    pub fn register_with_id(&mut self, mut component: Component, desired: ComponentId) -> ComponentId {
        assert!(desired.is_assigned(), "cannot register id 0");
        if self.components.contains_key(&desired) {
            component.id = ComponentId::UNASSIGNED;
            let live = self.register(component);
            self.remap.insert(desired, live);
            tracing::debug!(%desired, %live, "remapped loaded component id");
            live
        } else {
            component.id = desired;
            self.register(component)
        }
    }

    /// Resolves an id to its live id, consulting the remap table first.
    pub fn resolve_id(&self, id: ComponentId) -> ComponentId {
        *self.remap.get(&id).unwrap_or(&id)
    }

    /// Resolves an id - remap table first, then the live table.
    pub fn resolve(&self, id: ComponentId) -> Option<&Component> {
        self.components.get(&self.resolve_id(id))
    }

    /// Resolves an id mutably.
    pub fn resolve_mut(&mut self, id: ComponentId) -> Option<&mut Component> {
        let live = self.resolve_id(id);
        self.components.get_mut(&live)
    }

    /// Looks up a live component without remapping.
    pub fn get(&self, id: ComponentId) -> Option<&Component> {
        self.components.get(&id)
    }

    /// Looks up a live component mutably without remapping.
    pub fn get_mut(&mut self, id: ComponentId) -> Option<&mut Component> {
        self.components.get_mut(&id)
    }

    /// Disjoint mutable access to several components at once.
    ///
    /// # Panics
    ///
    /// Panics if any two ids are equal.
    pub fn get_disjoint_mut<const N: usize>(
        &mut self,
        ids: [ComponentId; N],
    ) -> [Option<&mut Component>; N] {
        self.components.get_disjoint_mut(ids.each_ref())
    }

    /// Removes a component from the live table. Remap entries pointing at it
    /// remain; a later resolve simply fails.
    pub fn dispose(&mut self, id: ComponentId) -> Option<Component> {
        self.components.remove(&id)
    }

    /// Re-inserts a component under its existing id without assigning.
    /// Used to hand subtrees to per-channel workers and take them back.
    pub(crate) fn adopt(&mut self, component: Component) {
        debug_assert!(component.id.is_assigned());
        self.components.insert(component.id, component);
    }

    /// Clears the project remap table. Called at save and at new-project.
    pub fn reset_project_remap(&mut self) {
        self.remap.clear();
    }

    /// Advances the id counter so the next assignment is greater than `max`.
    /// Called before a load with the document's maximum id.
    pub fn reserve_through(&mut self, max: ComponentId) {
        self.next_id = self.next_id.max(max.0 + 1);
    }

    /// Whether the id is live.
    pub fn contains(&self, id: ComponentId) -> bool {
        self.components.contains_key(&id)
    }

    /// Number of live components.
    pub fn len(&self) -> usize {
        self.components.len()
    }

    /// Whether the registry holds no components.
    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// Iterates all live components in unspecified order.
    pub fn iter(&self) -> impl Iterator<Item = &Component> {
        self.components.values()
    }

    /// Iterates all live components mutably in unspecified order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Component> {
        self.components.values_mut()
    }

    /// Ids of all live components, in unspecified order.
    pub fn ids(&self) -> Vec<ComponentId> {
        self.components.keys().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::{Body, Component};

    fn plain(class: &str) -> Component {
        Component::new(class, Body::Plain)
    }

    #[test]
    fn ids_are_monotonic_from_one() {
        let mut reg = Registry::new();
        let a = reg.register(plain("a"));
        let b = reg.register(plain("b"));
        assert_eq!(a, ComponentId::ROOT);
        assert_eq!(b, ComponentId(2));
    }

    #[test]
    fn register_with_free_id_takes_it() {
        let mut reg = Registry::new();
        let id = reg.register_with_id(plain("a"), ComponentId(7));
        assert_eq!(id, ComponentId(7));
        // next assignment advances past the reserved id
        assert_eq!(reg.register(plain("b")), ComponentId(8));
    }

    #[test]
    fn register_with_taken_id_remaps() {
        let mut reg = Registry::new();
        let live = reg.register(plain("a"));
        let remapped = reg.register_with_id(plain("b"), live);
        assert_ne!(remapped, live);
        assert_eq!(reg.resolve_id(live), remapped);
        assert_eq!(reg.resolve(live).unwrap().class(), "b");
    }

    #[test]
    fn dispose_keeps_remap_entries() {
        let mut reg = Registry::new();
        let a = reg.register(plain("a"));
        let b = reg.register_with_id(plain("b"), a);
        reg.dispose(a);
        // project id `a` still remaps to b
        assert_eq!(reg.resolve(a).unwrap().id, b);
        reg.reset_project_remap();
        assert!(reg.resolve(a).is_none());
    }

    #[test]
    #[should_panic(expected = "already registered")]
    fn duplicate_id_panics() {
        let mut reg = Registry::new();
        let a = reg.register(plain("a"));
        let mut dup = plain("b");
        dup.id = a;
        reg.register(dup);
    }

    #[test]
    fn disjoint_access() {
        let mut reg = Registry::new();
        let a = reg.register(plain("a"));
        let b = reg.register(plain("b"));
        let [ca, cb] = reg.get_disjoint_mut([a, b]);
        assert_eq!(ca.unwrap().class(), "a");
        assert_eq!(cb.unwrap().class(), "b");
    }
}
