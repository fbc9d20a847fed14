//! The scene: ambient environment plus a flat list of top-level nodes.
//!
//! `Scene` is generic over the environment and node types so that the load
//! sequencing can be driven with plain values as well as with GPU resources.

use std::sync::Arc;

use crate::data_structures::instance::Instance;

/// Anything that can be placed in the scene with a local transform.
pub trait SceneNode {
    fn local_transform(&self) -> &Instance;

    fn set_local_transform(&mut self, instance: Instance);

    /// Apply a mutation to the local transform in place.
    fn update_local_transform(&mut self, mutation: &mut dyn FnMut(&mut Instance)) {
        let mut instance = self.local_transform().clone();
        mutation(&mut instance);
        self.set_local_transform(instance);
    }
}

#[derive(Debug)]
pub struct Scene<E, N> {
    background: Option<Arc<E>>,
    environment: Option<Arc<E>>,
    children: Vec<N>,
}

impl<E, N> Scene<E, N> {
    pub fn new() -> Self {
        Self {
            background: None,
            environment: None,
            children: Vec::new(),
        }
    }

    /// Use `map` both as backdrop and as image-based light.
    pub fn set_environment(&mut self, map: E) -> Arc<E> {
        let map = Arc::new(map);
        self.background = Some(map.clone());
        self.environment = Some(map.clone());
        map
    }

    pub fn background(&self) -> Option<&Arc<E>> {
        self.background.as_ref()
    }

    pub fn environment(&self) -> Option<&Arc<E>> {
        self.environment.as_ref()
    }

    pub fn add(&mut self, child: N) -> &mut N {
        self.children.push(child);
        let last = self.children.len() - 1;
        &mut self.children[last]
    }

    pub fn children(&self) -> &[N] {
        &self.children
    }

    pub fn children_mut(&mut self) -> &mut [N] {
        &mut self.children
    }
}

impl<E, N> Default for Scene<E, N> {
    fn default() -> Self {
        Self::new()
    }
}
