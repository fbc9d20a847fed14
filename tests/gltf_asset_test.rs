use hdri_viewer::{
    data_structures::model::{ModelVertex, compute_tangents},
    resources::{Progress, gltf_asset::decode_data_uri, load_gltf},
};

fn mesh_count(asset: &hdri_viewer::resources::GltfAsset) -> usize {
    asset.document.meshes().count()
}

#[tokio::test]
async fn should_load_gltf_with_external_buffer() {
    let mut reports: Vec<Progress> = Vec::new();
    let asset = load_gltf("tests/triangle.gltf", |progress| reports.push(progress))
        .await
        .expect("triangle.gltf loads");

    assert_eq!(asset.name, "tests/triangle.gltf");
    assert_eq!(mesh_count(&asset), 1);
    assert_eq!(asset.buffers.len(), 1);
    assert_eq!(asset.buffers[0].len(), 68);
    assert!(asset.images.is_empty());

    let last = reports.last().expect("at least one progress report");
    assert_eq!(last.total, Some(last.loaded));
    assert_eq!(last.percent(), Some(100.0));
}

#[tokio::test]
async fn should_load_glb_from_binary_chunk() {
    let asset = load_gltf("tests/triangle.glb", |_| ()).await.expect("triangle.glb loads");

    assert_eq!(mesh_count(&asset), 1);
    assert_eq!(asset.buffers.len(), 1);
    assert!(asset.buffers[0].len() >= 66);

    let external = load_gltf("tests/triangle.gltf", |_| ()).await.expect("triangle.gltf loads");
    assert_eq!(asset.buffers[0][..66], external.buffers[0][..66]);
}

#[tokio::test]
async fn should_decode_embedded_buffers_and_images() {
    let asset = load_gltf("tests/triangle_embedded.gltf", |_| ())
        .await
        .expect("embedded glTF loads");

    let external = load_gltf("tests/triangle.gltf", |_| ()).await.expect("triangle.gltf loads");
    assert_eq!(asset.buffers, external.buffers);

    assert_eq!(asset.images.len(), 1);
    assert_eq!(asset.images[0].dimensions(), (1, 1));
    assert_eq!(asset.images[0].get_pixel(0, 0).0, [255, 0, 0, 255]);
}

#[tokio::test]
async fn should_fail_for_missing_buffer() {
    let err = load_gltf("tests/triangle_missing_buffer.gltf", |_| ())
        .await
        .expect_err("the buffer file does not exist");

    assert!(format!("{:#}", err).contains("missing.bin"));
}

#[tokio::test]
async fn should_fail_for_short_buffer() {
    let err = load_gltf("tests/triangle_short_buffer.gltf", |_| ())
        .await
        .expect_err("the buffer is shorter than declared");

    assert!(format!("{:#}", err).contains("declares 200"));
}

#[test]
fn should_decode_base64_data_uris_only() {
    assert_eq!(
        decode_data_uri("data:application/octet-stream;base64,AAEC").expect("valid"),
        vec![0, 1, 2]
    );
    assert!(decode_data_uri("data:text/plain,hello").is_err());
    assert!(decode_data_uri("data:application/octet-stream;base64").is_err());
    assert!(decode_data_uri("data:application/octet-stream;base64,!!").is_err());
    assert!(decode_data_uri("triangle.bin").is_err());
}

fn vertex(position: [f32; 3], tex_coords: [f32; 2]) -> ModelVertex {
    ModelVertex {
        position,
        tex_coords,
        normal: [0.0, 0.0, 1.0],
        ..Default::default()
    }
}

#[test]
fn should_compute_tangents_from_uv_layout() {
    let mut vertices = vec![
        vertex([0.0, 0.0, 0.0], [0.0, 0.0]),
        vertex([1.0, 0.0, 0.0], [1.0, 0.0]),
        vertex([0.0, 1.0, 0.0], [0.0, 1.0]),
        // not referenced by any triangle
        vertex([5.0, 5.0, 5.0], [0.5, 0.5]),
    ];

    compute_tangents(&mut vertices, &[0, 1, 2]);

    for v in &vertices[..3] {
        assert_eq!(v.tangent, [1.0, 0.0, 0.0]);
        assert_eq!(v.bitangent, [0.0, -1.0, 0.0]);
    }
    assert_eq!(vertices[3].tangent, [0.0; 3]);
    assert_eq!(vertices[3].bitangent, [0.0; 3]);
}

#[test]
fn should_skip_degenerate_and_out_of_range_triangles() {
    let mut vertices = vec![
        vertex([0.0, 0.0, 0.0], [0.0, 0.0]),
        vertex([1.0, 0.0, 0.0], [0.0, 0.0]),
        vertex([0.0, 1.0, 0.0], [0.0, 0.0]),
    ];

    compute_tangents(&mut vertices, &[0, 1, 2, 0, 1, 7]);

    for v in &vertices {
        assert_eq!(v.tangent, [0.0; 3]);
        assert_eq!(v.bitangent, [0.0; 3]);
    }
}
