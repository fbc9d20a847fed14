//! Prefiltered, mipmapped radiance environment maps.
//!
//! The equirectangular HDR panorama is projected onto a cube and convolved with the
//! GGX lobe once per mip level, so that mip `k` holds the reflection of a surface with
//! roughness `k / (mip_levels - 1)`. Shading then only needs one trilinear lookup.

use wgpu::util::DeviceExt;

use crate::data_structures::texture::Texture;

/// Edge length of mip 0 of the cube faces.
pub const FACE_SIZE: u32 = 256;
pub const MIP_LEVELS: u32 = 6;
/// GGX samples per texel for the rough mips.
pub const SAMPLE_COUNT: u32 = 128;

#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
pub struct EnvironmentUniform {
    mip_levels: f32,
    intensity: f32,
    _padding: [f32; 2],
}

impl EnvironmentUniform {
    pub fn new(mip_levels: u32, intensity: f32) -> Self {
        Self {
            mip_levels: mip_levels as f32,
            intensity,
            _padding: [0.0; 2],
        }
    }
}

#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
struct PrefilterUniform {
    face: f32,
    roughness: f32,
    face_size: f32,
    sample_count: f32,
}

/// Roughness stored in `mip` of a chain with `mip_levels` levels.
pub fn mip_roughness(mip: u32, mip_levels: u32) -> f32 {
    if mip_levels <= 1 {
        return 0.0;
    }
    mip as f32 / (mip_levels - 1) as f32
}

/// Layout shared by the skybox and the PBR pipeline: cube texture, sampler, uniform.
pub fn environment_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        entries: &[
            wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    multisampled: false,
                    view_dimension: wgpu::TextureViewDimension::Cube,
                    sample_type: wgpu::TextureSampleType::Float { filterable: true },
                },
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 1,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 2,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            },
        ],
        label: Some("environment_bind_group_layout"),
    })
}

/// A prefiltered cube map, ready to be used as background and image-based light.
#[derive(Debug)]
pub struct EnvironmentMap {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub sampler: wgpu::Sampler,
    pub uniform: EnvironmentUniform,
    pub buffer: wgpu::Buffer,
    pub bind_group: wgpu::BindGroup,
    mip_levels: u32,
}

impl EnvironmentMap {
    pub fn mip_levels(&self) -> u32 {
        self.mip_levels
    }

    pub fn face_size(&self) -> u32 {
        self.texture.width()
    }
}

/// Projects and convolves equirectangular panoramas into [`EnvironmentMap`]s.
///
/// Only needed while an environment is being installed; drop it afterwards.
pub struct PmremGenerator {
    pipeline: wgpu::RenderPipeline,
    source_layout: wgpu::BindGroupLayout,
    environment_layout: wgpu::BindGroupLayout,
}

impl PmremGenerator {
    pub fn new(device: &wgpu::Device, environment_layout: &wgpu::BindGroupLayout) -> Self {
        let source_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        multisampled: false,
                        view_dimension: wgpu::TextureViewDimension::D2,
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
            ],
            label: Some("pmrem_source_layout"),
        });
        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("PMREM Pipeline Layout"),
            bind_group_layouts: &[&source_layout],
            push_constant_ranges: &[],
        });
        let pipeline = crate::pipelines::basic::mk_render_pipeline(
            device,
            "PMREM Pipeline",
            &layout,
            Texture::HDR_FORMAT,
            None,
            1,
            None,
            &[],
            wgpu::ShaderModuleDescriptor {
                label: Some("PMREM Shader"),
                source: wgpu::ShaderSource::Wgsl(include_str!("pmrem.wgsl").into()),
            },
        );

        Self {
            pipeline,
            source_layout,
            environment_layout: environment_layout.clone(),
        }
    }

    /// Prefilter `equirect` into a cube map. The panorama is consumed.
    #[allow(clippy::wrong_self_convention)]
    pub fn from_equirectangular(
        &self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        equirect: Texture,
    ) -> EnvironmentMap {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("prefiltered environment"),
            size: wgpu::Extent3d {
                width: FACE_SIZE,
                height: FACE_SIZE,
                depth_or_array_layers: 6,
            },
            mip_level_count: MIP_LEVELS,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: Texture::HDR_FORMAT,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });

        let source_sampler = match &equirect.sampler {
            Some(sampler) => sampler.clone(),
            None => crate::data_structures::texture::create_default_sampler(device),
        };

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("PMREM Encoder"),
        });
        // keep the per-pass bind groups alive until submission
        let mut bind_groups = Vec::with_capacity((MIP_LEVELS * 6) as usize);
        for mip in 0..MIP_LEVELS {
            let face_size = (FACE_SIZE >> mip).max(1);
            for face in 0..6u32 {
                let uniform = PrefilterUniform {
                    face: face as f32,
                    roughness: mip_roughness(mip, MIP_LEVELS),
                    face_size: face_size as f32,
                    sample_count: SAMPLE_COUNT as f32,
                };
                let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("PMREM Uniform"),
                    contents: bytemuck::cast_slice(&[uniform]),
                    usage: wgpu::BufferUsages::UNIFORM,
                });
                let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
                    layout: &self.source_layout,
                    entries: &[
                        wgpu::BindGroupEntry {
                            binding: 0,
                            resource: wgpu::BindingResource::TextureView(&equirect.view),
                        },
                        wgpu::BindGroupEntry {
                            binding: 1,
                            resource: wgpu::BindingResource::Sampler(&source_sampler),
                        },
                        wgpu::BindGroupEntry {
                            binding: 2,
                            resource: buffer.as_entire_binding(),
                        },
                    ],
                    label: Some("pmrem_source_bind_group"),
                });
                let target = texture.create_view(&wgpu::TextureViewDescriptor {
                    label: Some("pmrem face"),
                    dimension: Some(wgpu::TextureViewDimension::D2),
                    base_mip_level: mip,
                    mip_level_count: Some(1),
                    base_array_layer: face,
                    array_layer_count: Some(1),
                    ..Default::default()
                });

                {
                    let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                        label: Some("PMREM Pass"),
                        color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                            view: &target,
                            resolve_target: None,
                            depth_slice: None,
                            ops: wgpu::Operations {
                                load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                                store: wgpu::StoreOp::Store,
                            },
                        })],
                        depth_stencil_attachment: None,
                        occlusion_query_set: None,
                        timestamp_writes: None,
                    });
                    pass.set_pipeline(&self.pipeline);
                    pass.set_bind_group(0, &bind_group, &[]);
                    pass.draw(0..3, 0..1);
                }
                bind_groups.push(bind_group);
            }
        }
        queue.submit(std::iter::once(encoder.finish()));
        drop(bind_groups);
        drop(equirect);
        log::info!(
            "Prefiltered environment into {} mips of {}px faces",
            MIP_LEVELS,
            FACE_SIZE
        );

        let view = texture.create_view(&wgpu::TextureViewDescriptor {
            label: Some("environment cube"),
            dimension: Some(wgpu::TextureViewDimension::Cube),
            ..Default::default()
        });
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("environment sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });
        let uniform = EnvironmentUniform::new(MIP_LEVELS, 1.0);
        let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Environment Buffer"),
            contents: bytemuck::cast_slice(&[uniform]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &self.environment_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&sampler),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: buffer.as_entire_binding(),
                },
            ],
            label: Some("environment_bind_group"),
        });

        EnvironmentMap {
            texture,
            view,
            sampler,
            uniform,
            buffer,
            bind_group,
            mip_levels: MIP_LEVELS,
        }
    }
}
