//! Frame encoding.
//!
//! A frame is a single render pass: clear, skybox if the scene has a background, then
//! every model with the PBR pipeline. With MSAA on, the pass renders into the
//! multisampled target and resolves into the output view.

use std::iter;

use anyhow::Context as _;
use instant::Duration;

use crate::{
    context::Context, data_structures::model::DrawModel, viewer::ViewerScene,
};

pub fn draw_scene(
    encoder: &mut wgpu::CommandEncoder,
    ctx: &Context,
    output: &wgpu::TextureView,
    scene: &ViewerScene,
) {
    let (view, resolve_target) = match &ctx.msaa_target {
        Some(msaa) => (&msaa.view, Some(output)),
        None => (output, None),
    };
    let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
        label: Some("Render Pass"),
        color_attachments: &[Some(wgpu::RenderPassColorAttachment {
            view,
            resolve_target,
            ops: wgpu::Operations {
                load: wgpu::LoadOp::Clear(ctx.clear_colour),
                store: wgpu::StoreOp::Store,
            },
            depth_slice: None,
        })],
        depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
            view: &ctx.depth_texture.view,
            depth_ops: Some(wgpu::Operations {
                load: wgpu::LoadOp::Clear(1.0),
                store: wgpu::StoreOp::Store,
            }),
            stencil_ops: None,
        }),
        occlusion_query_set: None,
        timestamp_writes: None,
    });

    if let Some(background) = scene.background() {
        render_pass.set_pipeline(&ctx.pipelines.skybox);
        render_pass.set_bind_group(0, &ctx.camera.bind_group, &[]);
        render_pass.set_bind_group(1, &background.bind_group, &[]);
        render_pass.draw(0..3, 0..1);
    }

    // models are only ever attached after the environment, which they are lit by
    let Some(environment) = scene.environment() else {
        return;
    };
    render_pass.set_pipeline(&ctx.pipelines.pbr);
    for model in scene.children() {
        render_pass.draw_model(model, &ctx.camera.bind_group, &environment.bind_group);
    }
}

/// Read back the offscreen target of a headless context.
pub async fn read_offscreen(ctx: &Context) -> anyhow::Result<image::RgbaImage> {
    let target = ctx
        .offscreen
        .as_ref()
        .context("Only headless contexts render offscreen")?;
    let (width, height) = (ctx.config.width, ctx.config.height);
    let unpadded = 4 * width;
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    let padded = unpadded.div_ceil(align) * align;

    let output_buffer = ctx.device.create_buffer(&wgpu::BufferDescriptor {
        size: (padded * height) as wgpu::BufferAddress,
        usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
        label: Some("Offscreen Readback"),
        mapped_at_creation: false,
    });
    let mut encoder = ctx
        .device
        .create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Readback Encoder"),
        });
    encoder.copy_texture_to_buffer(
        wgpu::TexelCopyTextureInfo {
            aspect: wgpu::TextureAspect::All,
            texture: &target.texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
        },
        wgpu::TexelCopyBufferInfo {
            buffer: &output_buffer,
            layout: wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(padded),
                rows_per_image: Some(height),
            },
        },
        wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
    );
    ctx.queue.submit(iter::once(encoder.finish()));

    let (tx, rx) = futures_intrusive::channel::shared::oneshot_channel();
    let buffer_slice = output_buffer.slice(..);
    buffer_slice.map_async(wgpu::MapMode::Read, move |result| {
        tx.send(result).ok();
    });
    ctx.device
        .poll(wgpu::PollType::Wait {
            submission_index: None,
            timeout: Some(Duration::from_secs(3)),
        })
        .context("Waiting for the readback timed out")?;
    rx.receive()
        .await
        .context("The readback was cancelled")?
        .context("Unable to map the readback buffer")?;

    let data = buffer_slice.get_mapped_range();
    let mut pixels = Vec::with_capacity((unpadded * height) as usize);
    for row in data.chunks(padded as usize) {
        pixels.extend_from_slice(&row[..unpadded as usize]);
    }
    drop(data);
    output_buffer.unmap();

    image::RgbaImage::from_raw(width, height, pixels)
        .context("Readback does not match the target size")
}
