//! Viewer data structures: models, textures, transforms and the scene.
//!
//! - `model` contains mesh and material definitions and the GPU form of a glTF model
//! - `texture` contains the GPU texture wrapper and creation utilities
//! - `instance` holds node transformation data
//! - `scene` holds the environment and the attached nodes

pub mod instance;
pub mod model;
pub mod scene;
pub mod texture;
