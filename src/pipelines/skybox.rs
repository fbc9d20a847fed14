/// Draws the environment behind everything else with a single fullscreen triangle.
pub fn mk_render_pipeline(
    device: &wgpu::Device,
    color_format: wgpu::TextureFormat,
    sample_count: u32,
    camera_layout: &wgpu::BindGroupLayout,
    environment_layout: &wgpu::BindGroupLayout,
) -> wgpu::RenderPipeline {
    let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("Skybox Pipeline Layout"),
        bind_group_layouts: &[camera_layout, environment_layout],
        push_constant_ranges: &[],
    });
    let shader = wgpu::ShaderModuleDescriptor {
        label: Some("Skybox Shader"),
        source: wgpu::ShaderSource::Wgsl(
            concat!(include_str!("output.wgsl"), include_str!("skybox.wgsl")).into(),
        ),
    };
    super::basic::mk_render_pipeline(
        device,
        "Skybox Pipeline",
        &layout,
        color_format,
        Some(super::basic::backdrop_depth()),
        sample_count,
        None,
        &[],
        shader,
    )
}
