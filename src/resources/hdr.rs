//! Radiance HDR decoding.

use anyhow::Context;
use image::ImageFormat;

use crate::resources::load_binary;

/// A decoded equirectangular panorama with RGBA `f32` texels, row-major from the top.
#[derive(Debug, Clone)]
pub struct HdrImage {
    width: u32,
    height: u32,
    pixels: Vec<f32>,
}

impl HdrImage {
    pub fn new(width: u32, height: u32, pixels: Vec<f32>) -> anyhow::Result<Self> {
        let expected = width as usize * height as usize * 4;
        anyhow::ensure!(
            pixels.len() == expected,
            "expected {} floats for a {}x{} RGBA image, got {}",
            expected,
            width,
            height,
            pixels.len()
        );
        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    /// Decode the contents of a Radiance `.hdr` file.
    pub fn decode(bytes: &[u8]) -> anyhow::Result<Self> {
        let img = image::load_from_memory_with_format(bytes, ImageFormat::Hdr)
            .context("not a valid Radiance HDR image")?;
        let rgba = img.to_rgba32f();
        let (width, height) = rgba.dimensions();
        Self::new(width, height, rgba.into_raw())
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixels(&self) -> &[f32] {
        &self.pixels
    }

    /// RGB of the texel at `(x, y)`.
    pub fn texel(&self, x: u32, y: u32) -> Option<[f32; 3]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = (y as usize * self.width as usize + x as usize) * 4;
        Some([self.pixels[i], self.pixels[i + 1], self.pixels[i + 2]])
    }
}

/// Fetch and decode the environment panorama at `source`.
pub async fn load_hdr(source: &str) -> anyhow::Result<HdrImage> {
    let bytes = load_binary(source)
        .await
        .with_context(|| format!("failed to fetch environment map {source}"))?;
    HdrImage::decode(&bytes).with_context(|| format!("failed to decode environment map {source}"))
}
