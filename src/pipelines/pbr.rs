use crate::data_structures::{
    instance::InstanceRaw,
    model::{ModelVertex, Vertex},
};

/// Metallic-roughness shading lit by the prefiltered environment.
pub fn mk_render_pipeline(
    device: &wgpu::Device,
    color_format: wgpu::TextureFormat,
    sample_count: u32,
    material_layout: &wgpu::BindGroupLayout,
    camera_layout: &wgpu::BindGroupLayout,
    environment_layout: &wgpu::BindGroupLayout,
) -> wgpu::RenderPipeline {
    let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("PBR Pipeline Layout"),
        bind_group_layouts: &[material_layout, camera_layout, environment_layout],
        push_constant_ranges: &[],
    });
    let shader = wgpu::ShaderModuleDescriptor {
        label: Some("PBR Shader"),
        source: wgpu::ShaderSource::Wgsl(
            concat!(include_str!("output.wgsl"), include_str!("pbr.wgsl")).into(),
        ),
    };
    super::basic::mk_render_pipeline(
        device,
        "PBR Pipeline",
        &layout,
        color_format,
        Some(super::basic::opaque_depth()),
        sample_count,
        // materials are treated as double sided
        None,
        &[ModelVertex::desc(), InstanceRaw::desc()],
        shader,
    )
}
