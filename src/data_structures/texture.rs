//! GPU textures and texture creation utilities.
//!
//! This module provides [`Texture`], a wrapper around WGPU texture resources, and
//! helpers for depth and multisample targets, solid fallback maps, 8-bit material
//! textures and half-float HDR panoramas.

use anyhow::*;
use half::f16;

use crate::resources::hdr::HdrImage;

/// A GPU texture with a view and optional sampler.
#[derive(Clone, Debug)]
pub struct Texture {
    #[allow(unused)]
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub sampler: Option<wgpu::Sampler>,
}

impl Texture {
    /// Standard depth buffer texture format (32-bit float).
    pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

    /// Format of the raw equirectangular environment.
    pub const HDR_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;

    /// Create a depth texture for depth-testing during rendering.
    ///
    /// `sample_count` has to match the colour attachment it is used with.
    pub fn create_depth_texture(
        device: &wgpu::Device,
        size: [u32; 2],
        sample_count: u32,
        label: &str,
    ) -> Self {
        let size = wgpu::Extent3d {
            width: size[0].max(1),
            height: size[1].max(1),
            depth_or_array_layers: 1,
        };
        let desc = wgpu::TextureDescriptor {
            label: Some(label),
            size,
            mip_level_count: 1,
            sample_count,
            dimension: wgpu::TextureDimension::D2,
            format: Self::DEPTH_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[Self::DEPTH_FORMAT],
        };
        let texture = device.create_texture(&desc);
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        Self {
            texture,
            view,
            sampler: None,
        }
    }

    /// Create the multisampled colour target that is resolved into the surface.
    ///
    /// Returns `None` when multisampling is disabled.
    pub fn create_msaa_target(
        device: &wgpu::Device,
        config: &wgpu::SurfaceConfiguration,
        sample_count: u32,
    ) -> Option<Self> {
        if sample_count <= 1 {
            return None;
        }
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("msaa colour target"),
            size: wgpu::Extent3d {
                width: config.width.max(1),
                height: config.height.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count,
            dimension: wgpu::TextureDimension::D2,
            format: config.format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Some(Self {
            texture,
            view,
            sampler: None,
        })
    }

    /// Create a 1x1 texture of a single colour.
    ///
    /// Used for material slots a model leaves empty so the pipeline never changes.
    pub fn create_solid(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        rgba: [u8; 4],
        srgb: bool,
        label: &str,
    ) -> Texture {
        let img = image::RgbaImage::from_pixel(1, 1, image::Rgba(rgba));
        Self::from_rgba(device, queue, &img, Some(label), srgb)
    }

    /// The blue/purple-ish colour that represents "no deformation" in a normal map.
    pub fn create_default_normal_map(device: &wgpu::Device, queue: &wgpu::Queue) -> Texture {
        Self::create_solid(device, queue, [127, 127, 255, 255], false, "default normal map")
    }

    /// Upload decoded image data.
    ///
    /// `srgb` toggles between sRGB (colour maps) and linear (data maps) sampling.
    pub fn from_rgba(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        rgba: &image::RgbaImage,
        label: Option<&str>,
        srgb: bool,
    ) -> Self {
        let dimensions = rgba.dimensions();

        let size = wgpu::Extent3d {
            width: dimensions.0,
            height: dimensions.1,
            depth_or_array_layers: 1,
        };
        let format = if srgb {
            wgpu::TextureFormat::Rgba8UnormSrgb
        } else {
            wgpu::TextureFormat::Rgba8Unorm
        };
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label,
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });

        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                aspect: wgpu::TextureAspect::All,
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
            },
            rgba,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(4 * dimensions.0),
                rows_per_image: Some(dimensions.1),
            },
            size,
        );

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let sampler = Some(create_default_sampler(device));

        Self {
            texture,
            view,
            sampler,
        }
    }

    /// Upload an equirectangular HDR image as a filterable half-float texture.
    pub fn from_hdr(device: &wgpu::Device, queue: &wgpu::Queue, hdr: &HdrImage) -> Result<Self> {
        let (width, height) = (hdr.width(), hdr.height());
        let limit = device.limits().max_texture_dimension_2d;
        if width > limit || height > limit {
            bail!(
                "HDR panorama of {}x{} exceeds the device limit of {}",
                width,
                height,
                limit
            );
        }
        let texels: Vec<u16> = hdr
            .pixels()
            .iter()
            .map(|&v| f16::from_f32(v).to_bits())
            .collect();

        let size = wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        };
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("equirectangular hdr"),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: Self::HDR_FORMAT,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                aspect: wgpu::TextureAspect::All,
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
            },
            bytemuck::cast_slice(&texels),
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                // 4 channels of 2 bytes each
                bytes_per_row: Some(8 * width),
                rows_per_image: Some(height),
            },
            size,
        );

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let sampler = Some(device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("equirectangular sampler"),
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        }));

        Ok(Self {
            texture,
            view,
            sampler,
        })
    }
}

pub fn create_default_sampler(device: &wgpu::Device) -> wgpu::Sampler {
    device.create_sampler(&wgpu::SamplerDescriptor {
        address_mode_u: wgpu::AddressMode::Repeat,
        address_mode_v: wgpu::AddressMode::Repeat,
        address_mode_w: wgpu::AddressMode::Repeat,
        mag_filter: wgpu::FilterMode::Linear,
        min_filter: wgpu::FilterMode::Linear,
        mipmap_filter: wgpu::FilterMode::Linear,
        ..Default::default()
    })
}
