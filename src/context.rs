//! GPU and window context.
//!
//! [`Context`] owns everything that talks to wgpu: surface, device, queue, the camera
//! uniform, the pipelines and the per-size render targets. It can also be created
//! without a window, in which case frames are rendered into an offscreen texture.

use std::sync::Arc;

use anyhow::Context as _;
use wgpu::util::DeviceExt;
use winit::{dpi::PhysicalSize, window::Window};

use crate::{
    camera::{Camera, CameraResources, CameraUniform, Projection},
    config::ViewerConfig,
    data_structures::texture::Texture,
    pipelines::Pipelines,
};

/// Drawable region in logical pixels plus the display scale factor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
    pub scale_factor: f64,
}

impl Viewport {
    pub fn new(width: u32, height: u32, scale_factor: f64) -> Self {
        Self {
            width,
            height,
            scale_factor,
        }
    }

    /// Build a viewport from the physical window size winit reports.
    pub fn from_physical(size: PhysicalSize<u32>, scale_factor: f64) -> Self {
        let logical = size.to_logical::<f64>(scale_factor);
        Self::new(
            logical.width.round() as u32,
            logical.height.round() as u32,
            scale_factor,
        )
    }

    /// The scale factor, capped at `max`.
    pub fn pixel_ratio(&self, max: f64) -> f64 {
        self.scale_factor.min(max)
    }

    /// Size of the render target: logical size times the capped pixel ratio.
    pub fn physical_size(&self, max_pixel_ratio: f64) -> (u32, u32) {
        let ratio = self.pixel_ratio(max_pixel_ratio);
        let scale = |v: u32| ((v as f64 * ratio).round() as u32).max(1);
        (scale(self.width), scale(self.height))
    }

    /// Height of the element in the same units as winit cursor positions.
    pub fn element_height(&self) -> f32 {
        (self.height as f64 * self.scale_factor) as f32
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

#[derive(Debug)]
pub struct Context {
    pub(crate) window: Option<Arc<Window>>,
    pub(crate) depth_texture: Texture,
    pub(crate) msaa_target: Option<Texture>,
    pub(crate) offscreen: Option<Texture>,
    pub surface: Option<wgpu::Surface<'static>>,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub config: wgpu::SurfaceConfiguration,
    pub camera: CameraResources,
    pub projection: Projection,
    pub pipelines: Pipelines,
    pub clear_colour: wgpu::Color,
    sample_count: u32,
    max_pixel_ratio: f64,
    viewport: Viewport,
}

impl Context {
    /// Set up wgpu for `window`. Surface, adapter and device failures are returned.
    pub async fn new(window: Arc<Window>, viewer: &ViewerConfig) -> anyhow::Result<Self> {
        let viewport = Viewport::from_physical(window.inner_size(), window.scale_factor());

        log::info!("WGPU setup");
        let instance = wgpu::Instance::new(&instance_descriptor());
        let surface = instance
            .create_surface(window.clone())
            .context("Unable to create a surface for the window")?;
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .context("No GPU adapter is compatible with the window surface")?;
        let (device, queue) = request_device(&adapter).await?;

        let surface_caps = surface.get_capabilities(&adapter);
        // Prefer an sRGB surface so the hardware encodes the output. Otherwise the
        // shaders do it themselves.
        let surface_format = surface_caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .or_else(|| surface_caps.formats.first().copied())
            .context("The surface reports no supported formats")?;
        let (width, height) = viewport.physical_size(viewer.max_pixel_ratio);
        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width,
            height,
            present_mode: surface_caps
                .present_modes
                .first()
                .copied()
                .unwrap_or(wgpu::PresentMode::Fifo),
            alpha_mode: surface_caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };

        let flags = adapter.get_texture_format_features(surface_format).flags;
        let sample_count = if flags.sample_count_supported(viewer.sample_count) {
            viewer.sample_count
        } else {
            log::warn!(
                "{}x MSAA is not supported for {:?}, rendering without antialiasing",
                viewer.sample_count,
                surface_format
            );
            1
        };

        Ok(Self::assemble(
            Some(window),
            Some(surface),
            device,
            queue,
            config,
            viewport,
            sample_count,
            viewer,
        ))
    }

    /// A context without window that renders into an sRGB offscreen texture.
    pub async fn headless(viewport: Viewport, viewer: &ViewerConfig) -> anyhow::Result<Self> {
        let instance = wgpu::Instance::new(&instance_descriptor());
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions::default())
            .await
            .context("No GPU adapter available")?;
        let (device, queue) = request_device(&adapter).await?;

        let format = wgpu::TextureFormat::Rgba8UnormSrgb;
        let (width, height) = viewport.physical_size(viewer.max_pixel_ratio);
        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
            format,
            width,
            height,
            present_mode: wgpu::PresentMode::Fifo,
            alpha_mode: wgpu::CompositeAlphaMode::Auto,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        let flags = adapter.get_texture_format_features(format).flags;
        let sample_count = if flags.sample_count_supported(viewer.sample_count) {
            viewer.sample_count
        } else {
            1
        };

        Ok(Self::assemble(
            None,
            None,
            device,
            queue,
            config,
            viewport,
            sample_count,
            viewer,
        ))
    }

    #[allow(clippy::too_many_arguments)]
    fn assemble(
        window: Option<Arc<Window>>,
        surface: Option<wgpu::Surface<'static>>,
        device: wgpu::Device,
        queue: wgpu::Queue,
        config: wgpu::SurfaceConfiguration,
        viewport: Viewport,
        sample_count: u32,
        viewer: &ViewerConfig,
    ) -> Self {
        let camera = Camera::new(viewer.camera_position, viewer.camera_target);
        let projection = Projection::new(
            viewport.width,
            viewport.height,
            cgmath::Deg(viewer.fovy),
            viewer.znear,
            viewer.zfar,
        );

        let mut camera_uniform = CameraUniform::new();
        camera_uniform.update_view_proj(&camera, &projection);
        camera_uniform.set_output(
            viewer.exposure,
            viewer.tone_mapping.shader_mode(),
            !config.format.is_srgb(),
        );

        let camera_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Camera Buffer"),
            contents: bytemuck::cast_slice(&[camera_uniform]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                entries: &[wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                }],
                label: Some("camera_bind_group_layout"),
            });

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: camera_buffer.as_entire_binding(),
            }],
            label: Some("camera_bind_group"),
        });

        let pipelines = Pipelines::new(&device, config.format, sample_count, &bind_group_layout);

        let camera = CameraResources {
            camera,
            uniform: camera_uniform,
            buffer: camera_buffer,
            bind_group,
            bind_group_layout,
        };

        let depth_texture = Texture::create_depth_texture(
            &device,
            [config.width, config.height],
            sample_count,
            "depth_texture",
        );
        let msaa_target = Texture::create_msaa_target(&device, &config, sample_count);
        let offscreen = surface
            .is_none()
            .then(|| create_offscreen_target(&device, &config));

        let mut ctx = Self {
            window,
            depth_texture,
            msaa_target,
            offscreen,
            surface,
            device,
            queue,
            config,
            camera,
            projection,
            pipelines,
            clear_colour: viewer.clear_colour,
            sample_count,
            max_pixel_ratio: viewer.max_pixel_ratio,
            viewport,
        };
        ctx.configure_surface();
        ctx
    }

    /// Apply a new viewport: projection aspect, surface size and render targets.
    ///
    /// A viewport without area is ignored. Returns whether anything changed.
    pub fn resize(&mut self, viewport: Viewport) -> bool {
        if viewport.is_empty() {
            return false;
        }
        self.viewport = viewport;
        self.projection.resize(viewport.width, viewport.height);

        let (width, height) = viewport.physical_size(self.max_pixel_ratio);
        self.config.width = width;
        self.config.height = height;
        self.configure_surface();

        self.depth_texture = Texture::create_depth_texture(
            &self.device,
            [width, height],
            self.sample_count,
            "depth_texture",
        );
        self.msaa_target = Texture::create_msaa_target(&self.device, &self.config, self.sample_count);
        if self.surface.is_none() {
            self.offscreen = Some(create_offscreen_target(&self.device, &self.config));
        }
        true
    }

    /// Configure the surface with the current configuration, e.g. after it was lost.
    pub fn configure_surface(&mut self) {
        if let Some(surface) = &self.surface {
            surface.configure(&self.device, &self.config);
        }
    }

    /// Renderer size in logical pixels.
    pub fn size(&self) -> (u32, u32) {
        (self.viewport.width, self.viewport.height)
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn pixel_ratio(&self) -> f64 {
        self.viewport.pixel_ratio(self.max_pixel_ratio)
    }

    pub fn sample_count(&self) -> u32 {
        self.sample_count
    }

    pub fn window(&self) -> Option<&Arc<Window>> {
        self.window.as_ref()
    }

    pub fn request_redraw(&self) {
        if let Some(window) = &self.window {
            window.request_redraw();
        }
    }

    /// Upload the camera uniform after the camera or projection moved.
    pub fn write_camera(&mut self) {
        let camera = &mut self.camera;
        camera.uniform.update_view_proj(&camera.camera, &self.projection);
        self.queue
            .write_buffer(&camera.buffer, 0, bytemuck::cast_slice(&[camera.uniform]));
    }
}

fn instance_descriptor() -> wgpu::InstanceDescriptor {
    wgpu::InstanceDescriptor {
        #[cfg(not(target_arch = "wasm32"))]
        backends: wgpu::Backends::PRIMARY,
        #[cfg(target_arch = "wasm32")]
        backends: wgpu::Backends::GL,
        ..Default::default()
    }
}

async fn request_device(adapter: &wgpu::Adapter) -> anyhow::Result<(wgpu::Device, wgpu::Queue)> {
    adapter
        .request_device(&wgpu::DeviceDescriptor {
            label: None,
            required_features: wgpu::Features::empty(),
            // WebGL doesn't support all of wgpu's features
            required_limits: if cfg!(target_arch = "wasm32") {
                wgpu::Limits::downlevel_webgl2_defaults()
            } else {
                wgpu::Limits::default()
            },
            memory_hints: Default::default(),
            experimental_features: wgpu::ExperimentalFeatures::disabled(),
            trace: wgpu::Trace::Off,
        })
        .await
        .context("Unable to create the GPU device")
}

fn create_offscreen_target(device: &wgpu::Device, config: &wgpu::SurfaceConfiguration) -> Texture {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("offscreen colour target"),
        size: wgpu::Extent3d {
            width: config.width,
            height: config.height,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: config.format,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
        view_formats: &[],
    });
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    Texture {
        texture,
        view,
        sampler: None,
    }
}
