//! Per-component frame buffers.
//!
//! Every pattern and bus renders into its own fixed-length color buffer,
//! kept outside the component tree so the mixer can read several buffers
//! while writing another. The pool is keyed by component id; buffers are
//! created on first use and discarded when their component is disposed.

use crate::color::Color;
use crate::registry::ComponentId;
use std::collections::HashMap;

/// Pool of per-component color buffers, all of the engine's point count.
#[derive(Debug)]
pub struct BufferPool {
    point_count: usize,
    buffers: HashMap<ComponentId, Vec<Color>>,
}

impl BufferPool {
    /// A pool producing buffers of `point_count` colors.
    pub fn new(point_count: usize) -> BufferPool {
        BufferPool {
            point_count,
            buffers: HashMap::new(),
        }
    }

    /// The fixed frame length.
    pub fn point_count(&self) -> usize {
        self.point_count
    }

    /// The buffer for `id`, created black on first use.
    pub fn ensure(&mut self, id: ComponentId) -> &mut Vec<Color> {
        self.buffers
            .entry(id)
            .or_insert_with(|| vec![Color::BLACK; self.point_count])
    }

    /// Read access to a component's buffer.
    pub fn get(&self, id: ComponentId) -> Option<&[Color]> {
        self.buffers.get(&id).map(Vec::as_slice)
    }

    /// Mutable access to two distinct buffers at once.
    ///
    /// # Panics
    ///
    /// Panics if `a == b`.
    pub fn pair_mut(&mut self, a: ComponentId, b: ComponentId) -> (&mut [Color], &mut [Color]) {
        self.ensure(a);
        self.ensure(b);
        let [first, second] = self.buffers.get_disjoint_mut([&a, &b]);
        (
            first.expect("buffer just ensured"),
            second.expect("buffer just ensured"),
        )
    }

    /// Drops the buffer of a disposed component.
    pub fn remove(&mut self, id: ComponentId) {
        self.buffers.remove(&id);
    }

    /// Moves a buffer out of the pool, creating it first if needed.
    /// Used to hand buffers to per-channel workers.
    pub(crate) fn take(&mut self, id: ComponentId) -> Vec<Color> {
        self.ensure(id);
        self.buffers.remove(&id).expect("buffer just ensured")
    }

    /// Returns a buffer taken with [`BufferPool::take`].
    pub(crate) fn put(&mut self, id: ComponentId, buffer: Vec<Color>) {
        self.buffers.insert(id, buffer);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffers_are_created_black() {
        let mut pool = BufferPool::new(4);
        let buf = pool.ensure(ComponentId(3));
        assert_eq!(buf.len(), 4);
        assert!(buf.iter().all(|c| *c == Color::BLACK));
    }

    #[test]
    fn pair_mut_gives_disjoint_buffers() {
        let mut pool = BufferPool::new(2);
        let (a, b) = pool.pair_mut(ComponentId(1), ComponentId(2));
        a[0] = Color::RED;
        b[0] = Color::BLUE;
        assert_eq!(pool.get(ComponentId(1)).unwrap()[0], Color::RED);
        assert_eq!(pool.get(ComponentId(2)).unwrap()[0], Color::BLUE);
    }
}
