//! Render pipelines and the shaders behind them.
//!
//! Bind group order is fixed across the PBR pipeline: material at 0, camera at 1 and
//! environment at 2. The skybox uses camera at 0 and environment at 1.

pub mod basic;
pub mod pbr;
pub mod pmrem;
pub mod skybox;

use crate::data_structures::model::material_layout;

#[derive(Debug)]
pub struct Pipelines {
    pub pbr: wgpu::RenderPipeline,
    pub skybox: wgpu::RenderPipeline,
    pub material_layout: wgpu::BindGroupLayout,
    pub environment_layout: wgpu::BindGroupLayout,
}

impl Pipelines {
    pub fn new(
        device: &wgpu::Device,
        color_format: wgpu::TextureFormat,
        sample_count: u32,
        camera_layout: &wgpu::BindGroupLayout,
    ) -> Self {
        let material_layout = material_layout(device);
        let environment_layout = pmrem::environment_layout(device);
        let pbr = pbr::mk_render_pipeline(
            device,
            color_format,
            sample_count,
            &material_layout,
            camera_layout,
            &environment_layout,
        );
        let skybox = skybox::mk_render_pipeline(
            device,
            color_format,
            sample_count,
            camera_layout,
            &environment_layout,
        );
        Self {
            pbr,
            skybox,
            material_layout,
            environment_layout,
        }
    }
}
