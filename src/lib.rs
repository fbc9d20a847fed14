//! hdri-viewer
//!
//! A minimal cross-platform viewer that shows a glTF model lit by a prefiltered HDR
//! environment map, natively and in the browser (WebGL2).
//!
//! High-level modules
//! - `camera`: camera, projection, uniforms and orbit controls
//! - `config`: the fixed viewer configuration
//! - `context`: GPU and window context, viewport and render targets
//! - `data_structures`: scene, model, instance and texture types
//! - `flow`: the winit event loop and the async fetch plumbing
//! - `pipelines`: skybox, PBR and environment prefiltering pipelines
//! - `render`: frame encoding and offscreen readback
//! - `resources`: fetching and decoding of HDR panoramas and glTF assets
//! - `sequence`: ordering of the environment and model loads
//! - `viewer`: the viewer state tying everything together
//!

pub mod camera;
pub mod config;
pub mod context;
pub mod data_structures;
pub mod flow;
pub mod pipelines;
pub mod render;
pub mod resources;
pub mod sequence;
pub mod viewer;

pub use config::ViewerConfig;
pub use flow::run;
pub use viewer::{Viewer, ViewerScene};

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

#[cfg(target_arch = "wasm32")]
#[wasm_bindgen(start)]
pub fn start() -> Result<(), JsValue> {
    run(ViewerConfig::default()).map_err(|e| JsValue::from_str(&format!("{:#}", e)))
}
