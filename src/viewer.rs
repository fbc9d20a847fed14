//! The viewer: one scene, one camera and the state of the asset loads.
//!
//! All state lives in [`Viewer`], so several viewers can exist side by side. The
//! event loop owns it and forwards window events and fetch results.

use std::iter;

use cgmath::Vector3;
use winit::event::WindowEvent;

use crate::{
    camera::OrbitControls,
    config::ViewerConfig,
    context::{Context, Viewport},
    data_structures::{
        instance::Instance,
        model::ModelNode,
        scene::Scene,
        texture::Texture,
    },
    pipelines::pmrem::{EnvironmentMap, PmremGenerator},
    render,
    resources::{GltfAsset, HdrImage, Progress},
    sequence::{LoadSequence, LoadState},
};

pub type ViewerScene = Scene<EnvironmentMap, ModelNode>;

#[derive(Debug)]
pub struct Viewer {
    pub ctx: Context,
    pub scene: ViewerScene,
    pub controls: OrbitControls,
    sequence: LoadSequence,
    config: ViewerConfig,
    frames: u64,
}

impl Viewer {
    pub fn new(ctx: Context, config: ViewerConfig) -> Self {
        let controls = OrbitControls::from_config(&config, ctx.viewport().element_height());
        let mut placement = Instance::new();
        placement.scale = Vector3::new(config.model_scale, config.model_scale, config.model_scale);
        placement.position = config.model_position.into();

        Self {
            ctx,
            scene: Scene::new(),
            controls,
            sequence: LoadSequence::new(placement),
            config,
            frames: 0,
        }
    }

    pub fn config(&self) -> &ViewerConfig {
        &self.config
    }

    /// Number of frames rendered so far.
    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn load_state(&self) -> LoadState {
        self.sequence.state()
    }

    /// Advance the controls, upload the camera and draw the scene once.
    pub fn frame(&mut self) -> Result<(), wgpu::SurfaceError> {
        self.controls.update(&mut self.ctx.camera.camera);
        self.ctx.write_camera();
        for child in self.scene.children_mut() {
            child.write_to_buffers(&self.ctx.queue);
        }

        let output = match &self.ctx.surface {
            Some(surface) => Some(surface.get_current_texture()?),
            None => None,
        };
        let surface_view = output
            .as_ref()
            .map(|output| output.texture.create_view(&wgpu::TextureViewDescriptor::default()));
        let view = match (&surface_view, &self.ctx.offscreen) {
            (Some(view), _) => view,
            (None, Some(offscreen)) => &offscreen.view,
            (None, None) => return Ok(()),
        };

        let mut encoder = self
            .ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Render Encoder"),
            });
        render::draw_scene(&mut encoder, &self.ctx, view, &self.scene);
        self.ctx.queue.submit(iter::once(encoder.finish()));

        if let Some(output) = output {
            output.present();
        }
        self.frames += 1;
        Ok(())
    }

    /// Follow a window resize or scale factor change.
    pub fn resize(&mut self, viewport: Viewport) {
        if self.ctx.resize(viewport) {
            self.controls.set_element_height(viewport.element_height());
        }
    }

    /// Give the controls a chance to consume the event.
    pub fn input(&mut self, event: &WindowEvent) -> bool {
        self.controls
            .handle_window_events(&self.ctx.camera.camera, event)
    }

    /// Prefilter a fetched panorama and install it as background and light.
    ///
    /// Returns `true` when the model should be fetched next.
    pub fn install_environment(&mut self, fetched: anyhow::Result<HdrImage>) -> bool {
        // a late result must not cost a full prefilter pass
        if !self.sequence.accepts_environment() {
            log::warn!(
                "Ignoring environment map delivered in state {:?}",
                self.sequence.state()
            );
            return false;
        }
        let result = fetched.and_then(|hdr| {
            let equirect = Texture::from_hdr(&self.ctx.device, &self.ctx.queue, &hdr)?;
            let generator = PmremGenerator::new(
                &self.ctx.device,
                &self.ctx.pipelines.environment_layout,
            );
            Ok(generator.from_equirectangular(&self.ctx.device, &self.ctx.queue, equirect))
        });
        self.sequence.on_environment(&mut self.scene, result)
    }

    /// Upload a fetched model and attach it to the scene.
    pub fn attach_model(&mut self, fetched: anyhow::Result<GltfAsset>) -> bool {
        // skip the upload for a model that would be rejected anyway
        if !self.sequence.accepts_model() {
            log::warn!("Ignoring model delivered in state {:?}", self.sequence.state());
            return false;
        }
        let result = fetched.and_then(|asset| {
            ModelNode::from_asset(
                &self.ctx.device,
                &self.ctx.queue,
                &asset,
                &self.ctx.pipelines.material_layout,
            )
        });
        self.sequence.on_model(&mut self.scene, result)
    }

    pub fn report_progress(&self, progress: Progress) {
        self.sequence.on_progress(progress);
    }
}
