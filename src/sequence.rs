//! Two-stage asset sequencing.
//!
//! The model may only enter the scene once the environment is installed. Instead of
//! nesting the model load inside the environment callback, [`LoadSequence`] keeps an
//! explicit state and the event loop feeds it the results of both fetches:
//!
//! ```text
//! AwaitingEnvironment --ok--> AwaitingModel --ok--> Ready
//!          |                        |
//!          +--err--> Failed(Environment)  +--err--> Failed(Model)
//! ```
//!
//! Failures are logged and leave the scene untouched. Nothing is retried.

use std::fmt;

use crate::{
    data_structures::{
        instance::Instance,
        scene::{Scene, SceneNode},
    },
    resources::Progress,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadStage {
    Environment,
    Model,
}

impl fmt::Display for LoadStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadStage::Environment => f.write_str("environment"),
            LoadStage::Model => f.write_str("model"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    AwaitingEnvironment,
    AwaitingModel,
    Ready,
    Failed(LoadStage),
}

#[derive(Debug)]
pub struct LoadSequence {
    state: LoadState,
    placement: Instance,
}

impl LoadSequence {
    /// `placement` is applied to the model right after it is attached.
    pub fn new(placement: Instance) -> Self {
        Self {
            state: LoadState::AwaitingEnvironment,
            placement,
        }
    }

    pub fn state(&self) -> LoadState {
        self.state
    }

    /// Whether an environment result would currently be accepted.
    pub fn accepts_environment(&self) -> bool {
        self.state == LoadState::AwaitingEnvironment
    }

    /// Whether a model result would currently be accepted.
    pub fn accepts_model(&self) -> bool {
        self.state == LoadState::AwaitingModel
    }

    /// Handle the outcome of the environment load.
    ///
    /// Returns `true` when the model load should be started now.
    pub fn on_environment<E, N>(
        &mut self,
        scene: &mut Scene<E, N>,
        result: anyhow::Result<E>,
    ) -> bool {
        if !self.accepts_environment() {
            log::warn!(
                "Ignoring environment map delivered in state {:?}",
                self.state
            );
            return false;
        }
        match result {
            Ok(map) => {
                scene.set_environment(map);
                self.state = LoadState::AwaitingModel;
                true
            }
            Err(e) => {
                log::error!(
                    "An error occurred while loading the HDR environment map: {:#}",
                    e
                );
                self.state = LoadState::Failed(LoadStage::Environment);
                false
            }
        }
    }

    /// Handle the outcome of the model load. Returns `true` if a node was attached.
    pub fn on_model<E, N: SceneNode>(
        &mut self,
        scene: &mut Scene<E, N>,
        result: anyhow::Result<N>,
    ) -> bool {
        if !self.accepts_model() {
            log::warn!("Ignoring model delivered in state {:?}", self.state);
            return false;
        }
        match result {
            Ok(node) => {
                let node = scene.add(node);
                let placement = &self.placement;
                node.update_local_transform(&mut |local| {
                    local.scale = placement.scale;
                    local.position = placement.position;
                });
                self.state = LoadState::Ready;
                true
            }
            Err(e) => {
                log::error!("An error happened while loading the model: {:#}", e);
                self.state = LoadState::Failed(LoadStage::Model);
                false
            }
        }
    }

    pub fn on_progress(&self, progress: Progress) {
        log::info!("{}", progress);
    }
}
