//! Viewer configuration.
//!
//! All inputs of the viewer are fixed at compile time. [`ViewerConfig::default`]
//! describes the stock scene: a Poly Haven HDRI as background and light source, and
//! the DamagedHelmet sample model placed at the origin.

/// Remote Radiance HDR used as background and image-based light.
pub const DEFAULT_ENVIRONMENT: &str =
    "https://dl.polyhaven.org/file/ph-assets/HDRIs/hdr/1k/spree_bank_1k.hdr";

/// Model path, relative to the asset directory.
pub const DEFAULT_MODEL: &str = "DamagedHelmet.gltf";

/// How rendered radiance is compressed into displayable range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToneMapping {
    /// Clamp only.
    None,
    /// ACES filmic curve (Narkowicz fit).
    AcesFilmic,
}

impl ToneMapping {
    /// Value consumed by the shaders.
    pub(crate) fn shader_mode(self) -> f32 {
        match self {
            ToneMapping::None => 0.0,
            ToneMapping::AcesFilmic => 1.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ViewerConfig {
    pub environment_source: String,
    pub model_source: String,

    /// Vertical field of view in degrees.
    pub fovy: f32,
    pub znear: f32,
    pub zfar: f32,
    pub camera_position: [f32; 3],
    pub camera_target: [f32; 3],

    pub tone_mapping: ToneMapping,
    pub exposure: f32,
    /// Upper bound for the device pixel ratio used for the render target.
    pub max_pixel_ratio: f64,
    /// MSAA sample count, 1 disables antialiasing.
    pub sample_count: u32,
    pub clear_colour: wgpu::Color,

    pub enable_damping: bool,
    pub damping_factor: f32,

    /// Uniform scale applied to the model once it is attached.
    pub model_scale: f32,
    pub model_position: [f32; 3],
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            environment_source: DEFAULT_ENVIRONMENT.to_string(),
            model_source: DEFAULT_MODEL.to_string(),
            fovy: 75.0,
            znear: 0.1,
            zfar: 100.0,
            camera_position: [0.0, 0.0, 4.0],
            camera_target: [0.0, 0.0, 0.0],
            tone_mapping: ToneMapping::AcesFilmic,
            exposure: 1.0,
            max_pixel_ratio: 2.0,
            sample_count: 4,
            clear_colour: wgpu::Color::BLACK,
            enable_damping: true,
            damping_factor: 0.05,
            model_scale: 2.0,
            model_position: [0.0, 0.0, 0.0],
        }
    }
}
