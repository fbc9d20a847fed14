#![cfg(feature = "integration-tests")]

use hdri_viewer::{
    Viewer,
    config::ViewerConfig,
    context::{Context, Viewport},
    data_structures::{scene::SceneNode, texture::Texture},
    pipelines::pmrem::{self, PmremGenerator},
    render::read_offscreen,
    resources::{HdrImage, load_gltf},
    sequence::LoadState,
};

fn config() -> ViewerConfig {
    ViewerConfig {
        clear_colour: wgpu::Color::WHITE,
        ..ViewerConfig::default()
    }
}

async fn headless(width: u32, height: u32) -> Viewer {
    let ctx = Context::headless(Viewport::new(width, height, 1.0), &config())
        .await
        .expect("a GPU adapter is required for integration tests");
    Viewer::new(ctx, config())
}

fn panorama() -> HdrImage {
    let (width, height) = (64, 32);
    let pixels = (0..width * height)
        .flat_map(|i| {
            let v = if i % width < width / 2 { 2.0 } else { 0.25 };
            [v, v * 0.5, 0.1, 1.0]
        })
        .collect();
    HdrImage::new(width, height, pixels).expect("consistent panorama")
}

#[tokio::test]
async fn should_render_clear_colour_for_empty_scene() {
    let mut viewer = headless(64, 48).await;

    for _ in 0..3 {
        viewer.frame().expect("offscreen frames cannot lose a surface");
    }
    assert_eq!(viewer.frames(), 3);

    let img = read_offscreen(&viewer.ctx).await.expect("readback");
    assert_eq!(img.dimensions(), (64, 48));
    for pixel in img.pixels() {
        assert_eq!(*pixel, image::Rgba([255, 255, 255, 255]));
    }
}

#[tokio::test]
async fn should_prefilter_into_mipmapped_cube() {
    let viewer = headless(16, 16).await;
    let ctx = &viewer.ctx;

    let equirect = Texture::from_hdr(&ctx.device, &ctx.queue, &panorama()).expect("upload");
    let generator = PmremGenerator::new(&ctx.device, &ctx.pipelines.environment_layout);
    let map = generator.from_equirectangular(&ctx.device, &ctx.queue, equirect);

    assert_eq!(map.mip_levels(), pmrem::MIP_LEVELS);
    assert_eq!(map.face_size(), pmrem::FACE_SIZE);
    assert_eq!(map.texture.mip_level_count(), 6);
    assert_eq!(map.texture.depth_or_array_layers(), 6);
    assert_eq!(map.texture.format(), wgpu::TextureFormat::Rgba16Float);
    assert_eq!(pmrem::mip_roughness(0, 6), 0.0);
    assert_eq!(pmrem::mip_roughness(5, 6), 1.0);
}

#[tokio::test]
async fn should_keep_rendering_after_environment_failure() {
    let mut viewer = headless(32, 32).await;

    let fetch_model = viewer.install_environment(Err(anyhow::anyhow!("404 Not Found")));

    assert!(!fetch_model);
    assert!(viewer.scene.environment().is_none());
    assert_eq!(viewer.load_state(), LoadState::Failed(hdri_viewer::sequence::LoadStage::Environment));
    viewer.frame().expect("frame");
    viewer.frame().expect("frame");
    assert_eq!(viewer.frames(), 2);
}

#[tokio::test]
async fn should_install_environment_and_draw_skybox() {
    let mut viewer = headless(32, 32).await;

    assert!(viewer.install_environment(Ok(panorama())));
    assert_eq!(viewer.load_state(), LoadState::AwaitingModel);
    let background = viewer.scene.background().expect("background");
    let environment = viewer.scene.environment().expect("environment");
    assert!(std::sync::Arc::ptr_eq(background, environment));

    viewer.frame().expect("frame");
    let img = read_offscreen(&viewer.ctx).await.expect("readback");
    // the sky covers the white clear colour everywhere
    assert!(img.pixels().all(|p| *p != image::Rgba([255, 255, 255, 255])));
}

#[tokio::test]
async fn should_resize_projection_and_targets() {
    let mut viewer = headless(32, 32).await;

    viewer.resize(Viewport::new(200, 100, 1.0));
    assert_eq!(viewer.ctx.size(), (200, 100));
    assert!((viewer.ctx.projection.aspect() - 2.0).abs() < 1e-6);
    assert_eq!((viewer.ctx.config.width, viewer.ctx.config.height), (200, 100));

    // zero area is ignored
    viewer.resize(Viewport::new(0, 100, 1.0));
    assert_eq!(viewer.ctx.size(), (200, 100));

    viewer.frame().expect("frame");
    let img = read_offscreen(&viewer.ctx).await.expect("readback");
    assert_eq!(img.dimensions(), (200, 100));
}

#[tokio::test]
async fn should_attach_model_after_environment() {
    let mut viewer = headless(32, 32).await;
    let asset = load_gltf("tests/triangle_embedded.gltf", |_| ())
        .await
        .expect("embedded triangle");

    assert!(viewer.install_environment(Ok(panorama())));
    assert!(viewer.attach_model(Ok(asset)));
    assert_eq!(viewer.load_state(), LoadState::Ready);

    let children = viewer.scene.children();
    assert_eq!(children.len(), 1);
    let model = &children[0];
    assert_eq!(model.meshes.len(), 1);
    // the textured material plus the fallback
    assert_eq!(model.materials.len(), 2);
    assert_eq!(model.meshes[0].material, 0);
    let local = model.local_transform();
    assert_eq!(local.scale, cgmath::Vector3::new(2.0, 2.0, 2.0));
    assert_eq!(local.position, cgmath::Vector3::new(0.0, 0.0, 0.0));

    viewer.frame().expect("frame");
    viewer.frame().expect("frame");
    assert_eq!(viewer.frames(), 2);
}

#[tokio::test]
async fn should_not_attach_model_without_environment() {
    let mut viewer = headless(32, 32).await;
    let asset = load_gltf("tests/triangle.gltf", |_| ()).await.expect("triangle");

    assert!(!viewer.attach_model(Ok(asset)));
    assert!(viewer.scene.children().is_empty());
    assert_eq!(viewer.load_state(), LoadState::AwaitingEnvironment);
}

#[tokio::test]
async fn should_ignore_late_environment() {
    let mut viewer = headless(32, 32).await;
    assert!(viewer.install_environment(Ok(panorama())));
    let first = viewer.scene.environment().cloned().expect("environment");

    assert!(!viewer.install_environment(Ok(panorama())));

    let current = viewer.scene.environment().expect("environment");
    assert!(std::sync::Arc::ptr_eq(&first, current));
    assert_eq!(viewer.load_state(), LoadState::AwaitingModel);
}
